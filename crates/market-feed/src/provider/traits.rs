//! Provider client trait definition.

use async_trait::async_trait;

use crate::errors::FeedError;
use crate::models::{DataKind, FetchParams, Payload, ProviderHealth};

/// Trait for upstream data providers.
///
/// Implement this trait to plug a new data source into the feed. Clients own
/// their transport, auth and response mapping; by the time a [`Payload`]
/// leaves `fetch` it has been validated into the arm for the requested kind.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use tradedash_market_feed::provider::ProviderClient;
///
/// struct VolatilityDesk;
///
/// #[async_trait]
/// impl ProviderClient for VolatilityDesk {
///     fn id(&self) -> &'static str {
///         "volatility"
///     }
///
///     fn kinds(&self) -> &'static [DataKind] {
///         &[DataKind::Volatility, DataKind::GammaExposure]
///     }
///
///     // ... implement fetch and health_check
/// }
/// ```
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Used for logging, circuit breaker tracking and the status registry.
    fn id(&self) -> &'static str;

    /// Data kinds this provider can serve.
    fn kinds(&self) -> &'static [DataKind];

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Whether this provider serves the given kind.
    fn serves(&self, kind: DataKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// Fetch one kind of data.
    ///
    /// Clients that support cancellation should still be prepared to be
    /// dropped mid-flight: the retry executor enforces its own deadline.
    async fn fetch(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError>;

    /// Report reachability and latency.
    async fn health_check(&self) -> ProviderHealth;
}
