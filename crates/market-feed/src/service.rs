//! Market feed facade.
//!
//! [`MarketFeed`] wires the circuit breaker, status registry, retry executor,
//! fallback chain, router, aggregator and health reporter together and
//! exposes one typed method per dashboard widget.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use log::info;

use crate::aggregator::{AggregateResult, Aggregator};
use crate::config::FeedConfig;
use crate::errors::FeedError;
use crate::health::HealthReporter;
use crate::models::{
    DataKind, FetchParams, FetchRequest, GammaData, IndexData, OptionsFlow, PayloadData,
    ProviderId, SectorData, SystemHealth, TypedResult, VixData, DEFAULT_GAMMA_SYMBOL,
    DEFAULT_INDEX_SYMBOLS,
};
use crate::provider::ProviderClient;
use crate::registry::{CircuitBreaker, CircuitState, ServiceStatus, ServiceStatusRegistry};
use crate::resilience::{FallbackChain, FallbackGenerator, RetryExecutor, SyntheticGenerator};
use crate::router::FeedRouter;

/// Resilient multi-provider feed for the dashboard.
///
/// With fallback enabled every fetch resolves to data: live when a provider
/// answers, otherwise cached or synthetic and flagged as such.
pub struct MarketFeed {
    config: FeedConfig,
    router: Arc<FeedRouter>,
    aggregator: Aggregator,
    health: HealthReporter,
    circuit_breaker: Arc<CircuitBreaker>,
    status: Arc<ServiceStatusRegistry>,
}

impl MarketFeed {
    /// Create a feed over `providers` with synthetic fallback data.
    pub fn new(
        config: FeedConfig,
        providers: Vec<Arc<dyn ProviderClient>>,
    ) -> Result<Self, FeedError> {
        Self::with_generator(config, providers, Arc::new(SyntheticGenerator::new()))
    }

    /// Create a feed with a custom fallback generator.
    pub fn with_generator(
        config: FeedConfig,
        providers: Vec<Arc<dyn ProviderClient>>,
        generator: Arc<dyn FallbackGenerator>,
    ) -> Result<Self, FeedError> {
        config.validate()?;

        let circuit_breaker = Arc::new(CircuitBreaker::with_config(
            config.circuit_breaker_config(),
        ));
        let status = Arc::new(ServiceStatusRegistry::new(
            providers.iter().map(|p| p.id()),
        ));
        let executor = RetryExecutor::new(
            config.retry_config(),
            circuit_breaker.clone(),
            status.clone(),
        );

        let mut fallback = FallbackChain::new(generator);
        if let Some(ttl) = config.stale_cache_ttl {
            fallback = fallback.with_last_known_good(ttl);
        }

        let router = Arc::new(FeedRouter::new(
            providers.clone(),
            executor,
            fallback,
            config.fallback_enabled,
        ));
        let aggregator = Aggregator::new(router.clone());
        let health = HealthReporter::new(
            providers,
            circuit_breaker.clone(),
            status.clone(),
            config.timeout,
        );

        info!(
            "Market feed ready with {} providers (fallback {})",
            router.providers().len(),
            if config.fallback_enabled { "on" } else { "off" }
        );

        Ok(Self {
            config,
            router,
            aggregator,
            health,
            circuit_breaker,
            status,
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Quotes for `symbols`, or the major indices when empty.
    pub async fn fetch_market_data<I, S>(
        &self,
        symbols: I,
    ) -> Result<TypedResult<HashMap<String, IndexData>>, FeedError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fetch_typed(index_params(symbols)).await
    }

    pub async fn fetch_sector_data(
        &self,
    ) -> Result<TypedResult<HashMap<String, SectorData>>, FeedError> {
        self.fetch_typed(FetchParams::none()).await
    }

    pub async fn fetch_vix_data(&self) -> Result<TypedResult<VixData>, FeedError> {
        self.fetch_typed(FetchParams::none()).await
    }

    /// Gamma exposure for `symbol`, SPY when omitted.
    pub async fn fetch_gamma_data(
        &self,
        symbol: Option<&str>,
    ) -> Result<TypedResult<GammaData>, FeedError> {
        self.fetch_typed(gamma_params(symbol)).await
    }

    /// Options flow, filtered to `symbol` when given.
    pub async fn fetch_options_flow(
        &self,
        symbol: Option<&str>,
    ) -> Result<TypedResult<OptionsFlow>, FeedError> {
        self.fetch_typed(FetchParams::symbol(symbol)).await
    }

    /// Every widget's data in one concurrent sweep.
    ///
    /// Market data covers `symbols` (major indices when empty); gamma is for
    /// SPY and options flow is unfiltered.
    pub async fn fetch_all_market_data<I, S>(&self, symbols: I) -> AggregateResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requests = vec![
            FetchRequest::new(DataKind::MarketData, index_params(symbols)),
            FetchRequest::new(DataKind::SectorData, FetchParams::none()),
            FetchRequest::new(DataKind::Volatility, FetchParams::none()),
            FetchRequest::new(DataKind::GammaExposure, gamma_params(None)),
            FetchRequest::new(DataKind::OptionsFlow, FetchParams::none()),
        ];
        self.aggregator.fetch_all(requests).await
    }

    /// Run the given requests through the aggregator.
    pub async fn fetch_many(&self, requests: Vec<FetchRequest>) -> AggregateResult {
        self.aggregator.fetch_all(requests).await
    }

    pub async fn get_system_health(&self) -> SystemHealth {
        self.health.system_health().await
    }

    /// Close `provider`'s circuit and zero its failure count.
    ///
    /// Failures of calls already in flight are ignored by both the breaker
    /// and the status registry.
    pub fn reset_circuit_breaker(&self, provider: &str) {
        let provider_id: ProviderId = Cow::Owned(provider.to_string());
        let watermark = self.circuit_breaker.reset(&provider_id);
        self.status.reset(&provider_id, watermark);
    }

    pub fn circuit_state(&self, provider: &str) -> CircuitState {
        let provider_id: ProviderId = Cow::Owned(provider.to_string());
        self.circuit_breaker.state(&provider_id)
    }

    pub fn service_status(&self, provider: &str) -> Option<ServiceStatus> {
        self.status.get(provider)
    }

    pub fn service_statuses(&self) -> Vec<(String, ServiceStatus)> {
        self.status.snapshot()
    }

    /// Whether a provider with this id was registered.
    pub fn has_provider(&self, provider: &str) -> bool {
        self.router.providers().iter().any(|p| p.id() == provider)
    }

    async fn fetch_typed<T: PayloadData>(
        &self,
        params: FetchParams,
    ) -> Result<TypedResult<T>, FeedError> {
        let result = self.router.fetch(T::KIND, &params).await?;
        let provider = result.source.to_string();

        result.try_map(|payload| {
            T::from_payload(payload).map_err(|other| FeedError::PayloadMismatch {
                provider,
                expected: T::KIND,
                actual: other.kind(),
            })
        })
    }
}

fn index_params<I, S>(symbols: I) -> FetchParams
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let params = FetchParams::symbols(symbols);
    if params.symbols.is_empty() {
        FetchParams::symbols(DEFAULT_INDEX_SYMBOLS)
    } else {
        params
    }
}

fn gamma_params(symbol: Option<&str>) -> FetchParams {
    let params = FetchParams::symbol(symbol);
    if params.symbols.is_empty() {
        FetchParams::symbol(Some(DEFAULT_GAMMA_SYMBOL))
    } else {
        params
    }
}
