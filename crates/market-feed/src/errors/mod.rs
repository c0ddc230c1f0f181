//! Error types and retry classification for the market feed.
//!
//! This module provides:
//! - [`FeedError`]: The error enum for every feed operation
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

use crate::models::DataKind;

/// Errors that can occur while fetching from upstream providers.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the retry executor handles the error.
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    /// Connection reset, DNS failure, 5xx response and the like.
    /// Should retry with backoff.
    #[error("Transient network error: {provider} - {message}")]
    TransientNetwork {
        /// The provider that failed
        provider: String,
        /// Error detail from the transport
        message: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The call did not settle within the per-call timeout.
    #[error("Timeout: {provider} after {after:?}")]
    Timeout {
        /// The provider that timed out
        provider: String,
        /// The deadline that elapsed
        after: Duration,
    },

    /// The circuit breaker is open for this provider.
    /// Not retried; callers go straight to fallback.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// The provider refused the request (bad parameters, auth, unsupported kind).
    /// Retrying the same request won't help.
    #[error("Rejected by {provider}: {message}")]
    Rejected {
        /// The provider that rejected the request
        provider: String,
        /// Reason given by the provider
        message: String,
    },

    /// The provider answered with a payload for another data kind.
    #[error("Payload mismatch from {provider}: expected {expected}, got {actual}")]
    PayloadMismatch {
        /// The provider that returned the payload
        provider: String,
        /// Kind that was requested
        expected: DataKind,
        /// Kind that was returned
        actual: DataKind,
    },

    /// No registered provider serves this data kind.
    #[error("No provider serves {0}")]
    NoProviderForKind(DataKind),

    /// Synthetic fallback generation itself failed.
    /// Fatal for the one request, never for the process.
    #[error("Fallback exhausted for {kind}: {message}")]
    FallbackExhausted {
        /// Kind whose fallback failed
        kind: DataKind,
        /// Failure detail
        message: String,
    },

    /// A fetch panicked; isolated to its own field of an aggregate.
    #[error("Fetch for {kind} panicked: {message}")]
    Panicked {
        /// Kind whose fetch panicked
        kind: DataKind,
        /// Panic message
        message: String,
    },

    /// Configuration rejected at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FeedError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::WithBackoff`]: Retry after the backoff delay
    /// - [`RetryClass::Never`]: Stop retrying, the failure is final for this call
    /// - [`RetryClass::CircuitOpen`]: Provider circuit is open, go to fallback
    ///
    /// # Examples
    ///
    /// ```
    /// use tradedash_market_feed::errors::{FeedError, RetryClass};
    ///
    /// let error = FeedError::RateLimited { provider: "market-data".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = FeedError::CircuitOpen { provider: "market-data".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::CircuitOpen);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::TransientNetwork { .. } | Self::RateLimited { .. } | Self::Timeout { .. } => {
                RetryClass::WithBackoff
            }

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            Self::Rejected { .. }
            | Self::PayloadMismatch { .. }
            | Self::NoProviderForKind(_)
            | Self::FallbackExhausted { .. }
            | Self::Panicked { .. }
            | Self::InvalidConfig(_) => RetryClass::Never,
        }
    }

    /// Provider the error is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::TransientNetwork { provider, .. }
            | Self::RateLimited { provider }
            | Self::Timeout { provider, .. }
            | Self::CircuitOpen { provider }
            | Self::Rejected { provider, .. }
            | Self::PayloadMismatch { provider, .. } => Some(provider),
            Self::NoProviderForKind(_)
            | Self::FallbackExhausted { .. }
            | Self::Panicked { .. }
            | Self::InvalidConfig(_) => None,
        }
    }
}
