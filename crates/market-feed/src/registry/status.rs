//! Per-provider health bookkeeping.
//!
//! The registry is built once with every known provider name and injected
//! into the retry executor. Entries are never removed. Only the retry
//! executor writes to it (the mutators are crate-private); everything else
//! reads snapshots.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::errors::{FeedError, RetryClass};
use crate::models::ProviderId;

/// Last error recorded for a provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    #[serde(serialize_with = "serialize_retry_class")]
    pub class: RetryClass,
    pub at: DateTime<Utc>,
}

fn serialize_retry_class<S: serde::Serializer>(
    class: &RetryClass,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(match class {
        RetryClass::WithBackoff => "transient",
        RetryClass::Never => "permanent",
        RetryClass::CircuitOpen => "circuitOpen",
    })
}

/// Health bookkeeping for one provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_error: Option<ErrorRecord>,
}

impl ServiceStatus {
    fn new() -> Self {
        Self {
            is_healthy: true,
            consecutive_failures: 0,
            last_success_time: None,
            last_error: None,
        }
    }
}

#[derive(Debug)]
struct Entry {
    status: ServiceStatus,
    /// Tickets below this are stale: the newest success or the last reset.
    watermark: u64,
}

/// Process-lifetime map of provider name to [`ServiceStatus`].
pub struct ServiceStatusRegistry {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl ServiceStatusRegistry {
    /// Create a registry tracking the given providers, all healthy.
    pub fn new<I, P>(providers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let entries = providers
            .into_iter()
            .map(|p| {
                (
                    p.into(),
                    Entry {
                        status: ServiceStatus::new(),
                        watermark: 0,
                    },
                )
            })
            .collect();

        Self {
            entries: Mutex::new(entries),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Service status registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn entry<'a>(entries: &'a mut BTreeMap<String, Entry>, provider: &ProviderId) -> &'a mut Entry {
        entries.entry(provider.to_string()).or_insert_with(|| {
            debug!("Status registry: tracking unlisted provider '{}'", provider);
            Entry {
                status: ServiceStatus::new(),
                watermark: 0,
            }
        })
    }

    /// Mark a provider healthy after a successful call.
    pub(crate) fn record_success(&self, provider: &ProviderId, ticket: u64) {
        let mut entries = self.lock_entries();
        let entry = Self::entry(&mut entries, provider);

        entry.status.is_healthy = true;
        entry.status.consecutive_failures = 0;
        entry.status.last_success_time = Some(Utc::now());
        entry.watermark = entry.watermark.max(ticket);
    }

    /// Mark a provider unhealthy after a call exhausted its attempts.
    ///
    /// Ignored when a call started later has already succeeded, or the
    /// provider was reset after the call started.
    pub(crate) fn record_failure(&self, provider: &ProviderId, ticket: u64, error: &FeedError) {
        let mut entries = self.lock_entries();
        let entry = Self::entry(&mut entries, provider);

        if ticket < entry.watermark {
            debug!(
                "Status registry: discarding stale failure for '{}': {}",
                provider, error
            );
            return;
        }

        entry.status.is_healthy = false;
        entry.status.consecutive_failures = entry.status.consecutive_failures.saturating_add(1);
        entry.status.last_error = Some(ErrorRecord {
            message: error.to_string(),
            class: error.retry_class(),
            at: Utc::now(),
        });
    }

    /// Discard failures of calls admitted before `watermark`.
    ///
    /// Paired with [`CircuitBreaker::reset`](super::CircuitBreaker::reset) so
    /// the registry and the breaker agree on which outcomes are stale.
    pub(crate) fn reset(&self, provider: &ProviderId, watermark: u64) {
        let mut entries = self.lock_entries();
        let entry = Self::entry(&mut entries, provider);
        entry.watermark = entry.watermark.max(watermark);
    }

    /// Status of one provider.
    pub fn get(&self, provider: &str) -> Option<ServiceStatus> {
        self.lock_entries().get(provider).map(|e| e.status.clone())
    }

    /// Status of every provider, ordered by name.
    pub fn snapshot(&self) -> Vec<(String, ServiceStatus)> {
        self.lock_entries()
            .iter()
            .map(|(name, e)| (name.clone(), e.status.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn network_error() -> FeedError {
        FeedError::TransientNetwork {
            provider: "volatility".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_known_providers_start_healthy() {
        let registry = ServiceStatusRegistry::new(["market-data", "volatility"]);

        let status = registry.get("market-data").unwrap();
        assert!(status.is_healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_success_time.is_none());
        assert_eq!(registry.snapshot().len(), 2);
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_failures_accumulate_and_success_clears() {
        let registry = ServiceStatusRegistry::new(["volatility"]);
        let provider: ProviderId = Cow::Borrowed("volatility");

        registry.record_failure(&provider, 1, &network_error());
        registry.record_failure(&provider, 2, &network_error());

        let status = registry.get("volatility").unwrap();
        assert!(!status.is_healthy);
        assert_eq!(status.consecutive_failures, 2);
        let last_error = status.last_error.unwrap();
        assert_eq!(last_error.class, RetryClass::WithBackoff);
        assert!(last_error.message.contains("connection refused"));

        registry.record_success(&provider, 3);
        let status = registry.get("volatility").unwrap();
        assert!(status.is_healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_success_time.is_some());
    }

    #[test]
    fn test_stale_failure_does_not_flip_health() {
        let registry = ServiceStatusRegistry::new(["volatility"]);
        let provider: ProviderId = Cow::Borrowed("volatility");

        registry.record_success(&provider, 7);
        registry.record_failure(&provider, 5, &network_error());

        let status = registry.get("volatility").unwrap();
        assert!(status.is_healthy);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[test]
    fn test_reset_discards_failures_started_before_it() {
        let registry = ServiceStatusRegistry::new(["volatility"]);
        let provider: ProviderId = Cow::Borrowed("volatility");

        registry.reset(&provider, 4);
        registry.record_failure(&provider, 3, &network_error());
        let status = registry.get("volatility").unwrap();
        assert!(status.is_healthy);
        assert!(status.last_error.is_none());

        registry.record_failure(&provider, 4, &network_error());
        let status = registry.get("volatility").unwrap();
        assert!(!status.is_healthy);
        assert_eq!(status.consecutive_failures, 1);
    }
}
