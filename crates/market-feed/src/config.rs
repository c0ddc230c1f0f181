//! Feed configuration.
//!
//! A single immutable [`FeedConfig`] is supplied when the feed is built.
//! Durations (de)serialize as integer milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::FeedError;
use crate::registry::{CircuitBreakerConfig, DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD};

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;

/// Default base backoff delay.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Retry policy for one provider call.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total tries is `max_attempts + 1`.
    pub max_attempts: u32,
    /// Backoff before retry `n` (0-based) is `base_delay * (n + 1)`.
    pub base_delay: Duration,
    /// Deadline raced against every attempt.
    pub per_call_timeout: Duration,
}

impl RetryConfig {
    /// Delay slept after failed attempt `attempt` (0-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: DEFAULT_RETRY_DELAY,
            per_call_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Configuration surface of the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedConfig {
    pub retry_attempts: u32,
    #[serde(rename = "retryDelayMs", with = "duration_ms")]
    pub retry_delay: Duration,
    #[serde(rename = "timeoutMs", with = "duration_ms")]
    pub timeout: Duration,
    pub fallback_enabled: bool,
    pub circuit_breaker_threshold: u32,
    #[serde(rename = "circuitBreakerCooldownMs", with = "duration_ms")]
    pub circuit_breaker_cooldown: Duration,
    /// Serve remembered live results this young before synthetic data.
    /// `None` disables the last-known-good tier.
    #[serde(rename = "staleCacheTtlMs", with = "option_duration_ms")]
    pub stale_cache_ttl: Option<Duration>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
            fallback_enabled: true,
            circuit_breaker_threshold: DEFAULT_FAILURE_THRESHOLD,
            circuit_breaker_cooldown: DEFAULT_COOLDOWN,
            stale_cache_ttl: None,
        }
    }
}

impl FeedConfig {
    /// Reject settings that would break the liveness guarantees.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.timeout.is_zero() {
            return Err(FeedError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(FeedError::InvalidConfig(
                "circuit breaker threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_attempts,
            base_delay: self.retry_delay,
            per_call_timeout: self.timeout,
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_threshold,
            cooldown: self.circuit_breaker_cooldown,
        }
    }
}

/// Serde helpers for `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serde helpers for `Option<Duration>` as integer milliseconds.
pub(crate) mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.retry_attempts, 2);
        assert_eq!(config.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.fallback_enabled);
        assert_eq!(config.circuit_breaker_threshold, 3);
        assert_eq!(config.circuit_breaker_cooldown, Duration::from_secs(300));
        assert!(config.stale_cache_ttl.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_strictly_increases() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(retry.backoff_delay(1), Duration::from_millis(2000));
        assert!(retry.backoff_delay(2) > retry.backoff_delay(1));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = FeedConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FeedError::InvalidConfig(_))));

        let config = FeedConfig {
            circuit_breaker_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FeedConfig =
            serde_json::from_str(r#"{"retryAttempts": 4, "timeoutMs": 2500, "staleCacheTtlMs": 60000}"#)
                .unwrap();
        assert_eq!(config.retry_attempts, 4);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.stale_cache_ttl, Some(Duration::from_secs(60)));
        assert!(config.fallback_enabled);
        assert_eq!(config.circuit_breaker_threshold, 3);
    }
}
