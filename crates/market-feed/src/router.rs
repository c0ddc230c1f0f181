//! Per-kind routing across providers.
//!
//! For one data kind the router:
//! 1. Filters providers to those that serve the kind
//! 2. Orders them by priority (lower is higher priority)
//! 3. Runs each through the retry executor, stopping at the first success
//! 4. Hands the final failure to the fallback chain when fallback is enabled
//!
//! All providers for one fetch share a single deadline, so a fetch never
//! takes much longer than the configured timeout however many providers
//! serve the kind. Providers reached after the deadline are skipped.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::errors::FeedError;
use crate::models::{DataKind, FetchParams, Payload, ProviderId, TypedResult};
use crate::provider::ProviderClient;
use crate::resilience::{FallbackChain, RetryExecutor};

/// Routes fetches for a data kind to the providers that serve it.
pub struct FeedRouter {
    providers: Vec<Arc<dyn ProviderClient>>,
    executor: RetryExecutor,
    fallback: FallbackChain,
    fallback_enabled: bool,
}

impl FeedRouter {
    pub fn new(
        providers: Vec<Arc<dyn ProviderClient>>,
        executor: RetryExecutor,
        fallback: FallbackChain,
        fallback_enabled: bool,
    ) -> Self {
        Self {
            providers,
            executor,
            fallback,
            fallback_enabled,
        }
    }

    pub fn providers(&self) -> &[Arc<dyn ProviderClient>] {
        &self.providers
    }

    /// Fetch `kind`, degrading to fallback data when every provider fails.
    ///
    /// With fallback enabled this only fails with
    /// [`FeedError::FallbackExhausted`]. With fallback disabled the last
    /// provider error is returned, or [`FeedError::NoProviderForKind`].
    pub async fn fetch(
        &self,
        kind: DataKind,
        params: &FetchParams,
    ) -> Result<TypedResult<Payload>, FeedError> {
        let providers = self.ordered_providers(kind);

        let Some((last, rest)) = providers.split_last() else {
            if self.fallback_enabled {
                warn!("No provider serves {}, using fallback", kind);
                return self.fallback.resolve(kind, params);
            }
            return Err(FeedError::NoProviderForKind(kind));
        };

        let deadline = self.executor.deadline();

        for provider in rest {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            match self
                .executor
                .execute_until(&provider_id, deadline, || {
                    Self::call(provider, kind, params)
                })
                .await
            {
                Ok(result) => return Ok(self.accept(kind, params, result)),
                Err(e) => {
                    info!(
                        "Provider '{}' failed for {}: {}, trying next",
                        provider_id, kind, e
                    );
                }
            }
        }

        let provider_id: ProviderId = Cow::Borrowed(last.id());
        let operation = || Self::call(last, kind, params);

        let result = if self.fallback_enabled {
            self.executor
                .execute_or_else_until(&provider_id, deadline, operation, |_| {
                    self.fallback.resolve(kind, params)
                })
                .await?
        } else {
            self.executor
                .execute_until(&provider_id, deadline, operation)
                .await?
        };

        Ok(self.accept(kind, params, result))
    }

    async fn call(
        provider: &Arc<dyn ProviderClient>,
        kind: DataKind,
        params: &FetchParams,
    ) -> Result<Payload, FeedError> {
        let payload = provider.fetch(kind, params).await?;
        if payload.kind() != kind {
            return Err(FeedError::PayloadMismatch {
                provider: provider.id().to_string(),
                expected: kind,
                actual: payload.kind(),
            });
        }
        Ok(payload)
    }

    fn accept(
        &self,
        kind: DataKind,
        params: &FetchParams,
        result: TypedResult<Payload>,
    ) -> TypedResult<Payload> {
        debug!("{} served by '{}' ({:?})", kind, result.source, result.status);
        self.fallback.remember(kind, params, &result);
        result
    }

    fn ordered_providers(&self, kind: DataKind) -> Vec<&Arc<dyn ProviderClient>> {
        let mut providers: Vec<_> = self.providers.iter().filter(|p| p.serves(kind)).collect();
        providers.sort_by_key(|p| p.priority());
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::RetryConfig;
    use crate::models::{
        DataSource, HealthState, ProviderHealth, ResultStatus, VixData, VolatilityRegime,
    };
    use crate::registry::{CircuitBreaker, ServiceStatusRegistry};

    struct MockProvider {
        id: &'static str,
        priority: u8,
        call_count: AtomicUsize,
        should_fail: bool,
    }

    impl MockProvider {
        fn new(id: &'static str, priority: u8, should_fail: bool) -> Self {
            Self {
                id,
                priority,
                call_count: AtomicUsize::new(0),
                should_fail,
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderClient for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn kinds(&self) -> &'static [DataKind] {
            &[DataKind::Volatility]
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        async fn fetch(&self, _kind: DataKind, _params: &FetchParams) -> Result<Payload, FeedError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                return Err(FeedError::TransientNetwork {
                    provider: self.id.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(Payload::Volatility(VixData {
                value: 14.1,
                change: -0.2,
                change_percent: -1.4,
                regime: VolatilityRegime::Low,
            }))
        }

        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth::new(HealthState::Online, 5)
        }
    }

    fn router(providers: Vec<Arc<dyn ProviderClient>>, fallback_enabled: bool) -> FeedRouter {
        let ids: Vec<&'static str> = providers.iter().map(|p| p.id()).collect();
        let executor = RetryExecutor::new(
            RetryConfig {
                max_attempts: 0,
                base_delay: Duration::from_millis(10),
                per_call_timeout: Duration::from_secs(1),
            },
            Arc::new(CircuitBreaker::new()),
            Arc::new(ServiceStatusRegistry::new(ids)),
        );
        FeedRouter::new(providers, executor, FallbackChain::synthetic(), fallback_enabled)
    }

    #[tokio::test]
    async fn test_first_provider_by_priority_wins() {
        let primary = Arc::new(MockProvider::new("primary", 1, false));
        let secondary = Arc::new(MockProvider::new("secondary", 5, false));
        let router = router(vec![secondary.clone() as Arc<dyn ProviderClient>, primary.clone()], true);

        let result = router
            .fetch(DataKind::Volatility, &FetchParams::none())
            .await
            .unwrap();

        assert_eq!(result.source.as_str(), "primary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let primary = Arc::new(MockProvider::new("primary", 1, true));
        let secondary = Arc::new(MockProvider::new("secondary", 5, false));
        let router = router(vec![primary.clone() as Arc<dyn ProviderClient>, secondary.clone()], true);

        let result = router
            .fetch(DataKind::Volatility, &FetchParams::none())
            .await
            .unwrap();

        assert_eq!(result.source.as_str(), "secondary");
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_failing_degrades_to_fallback() {
        let primary = Arc::new(MockProvider::new("primary", 1, true));
        let router = router(vec![primary.clone() as Arc<dyn ProviderClient>], true);

        let result = router
            .fetch(DataKind::Volatility, &FetchParams::none())
            .await
            .unwrap();

        assert_eq!(result.source, DataSource::Fallback);
        assert_eq!(result.status, ResultStatus::Degraded);
        assert_eq!(result.data.kind(), DataKind::Volatility);
    }

    #[tokio::test]
    async fn test_fallback_disabled_propagates_error() {
        let primary = Arc::new(MockProvider::new("primary", 1, true));
        let router = router(vec![primary.clone() as Arc<dyn ProviderClient>], false);

        let error = router
            .fetch(DataKind::Volatility, &FetchParams::none())
            .await
            .unwrap_err();
        assert!(matches!(error, FeedError::TransientNetwork { .. }));
    }

    #[tokio::test]
    async fn test_unserved_kind() {
        let primary: Arc<dyn ProviderClient> = Arc::new(MockProvider::new("primary", 1, false));

        let result = router(vec![primary.clone()], true)
            .fetch(DataKind::SectorData, &FetchParams::none())
            .await
            .unwrap();
        assert!(result.is_fallback());

        let error = router(vec![primary], false)
            .fetch(DataKind::SectorData, &FetchParams::none())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            FeedError::NoProviderForKind(DataKind::SectorData)
        ));
    }
}
