//! Concurrent multi-kind fetch.
//!
//! Every request runs to completion regardless of how the others end. A
//! failure (or panic) in one field is recorded against that field and never
//! cancels or fails its siblings.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use log::{debug, error, warn};
use serde::{Serialize, Serializer};

use crate::errors::FeedError;
use crate::models::{DataKind, FetchRequest, Payload, PayloadData, TypedResult};
use crate::router::FeedRouter;

/// One failed field of an aggregate.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub kind: DataKind,
    #[serde(rename = "message", serialize_with = "serialize_error")]
    pub error: FeedError,
}

fn serialize_error<S: Serializer>(error: &FeedError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of [`Aggregator::fetch_all`].
///
/// Every requested kind has an entry in `results`; failed kinds map to
/// `None` and have exactly one matching entry in `errors`.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub results: HashMap<DataKind, Option<TypedResult<Payload>>>,
    pub errors: Vec<FieldError>,
}

impl AggregateResult {
    /// Result for `kind`, if it was requested and succeeded.
    pub fn get(&self, kind: DataKind) -> Option<&TypedResult<Payload>> {
        self.results.get(&kind).and_then(Option::as_ref)
    }

    /// Typed view of one field.
    pub fn typed<T: PayloadData>(&self) -> Option<TypedResult<T>> {
        let result = self.get(T::KIND)?.clone();
        result.try_map(T::from_payload).ok()
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Kinds served from fallback data.
    pub fn degraded_kinds(&self) -> Vec<DataKind> {
        let mut kinds: Vec<DataKind> = self
            .results
            .iter()
            .filter_map(|(kind, result)| match result {
                Some(r) if r.is_degraded() => Some(*kind),
                _ => None,
            })
            .collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

/// Fans a set of fetch requests out across the router.
pub struct Aggregator {
    router: Arc<FeedRouter>,
}

impl Aggregator {
    pub fn new(router: Arc<FeedRouter>) -> Self {
        Self { router }
    }

    /// Fetch every request concurrently and collect per-field outcomes.
    ///
    /// When a kind is requested more than once the last outcome wins.
    pub async fn fetch_all(&self, requests: Vec<FetchRequest>) -> AggregateResult {
        debug!("Aggregate fetch of {} kinds", requests.len());

        let tasks = requests.into_iter().map(|request| {
            let router = &self.router;
            async move {
                let outcome = AssertUnwindSafe(router.fetch(request.kind, &request.params))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        error!("Fetch for {} panicked: {}", request.kind, message);
                        Err(FeedError::Panicked {
                            kind: request.kind,
                            message,
                        })
                    });
                (request.kind, outcome)
            }
        });

        let mut aggregate = AggregateResult::default();
        for (kind, outcome) in join_all(tasks).await {
            aggregate.errors.retain(|e| e.kind != kind);
            match outcome {
                Ok(result) => {
                    aggregate.results.insert(kind, Some(result));
                }
                Err(error) => {
                    warn!("Aggregate field {} failed: {}", kind, error);
                    aggregate.results.insert(kind, None);
                    aggregate.errors.push(FieldError { kind, error });
                }
            }
        }

        aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::RetryConfig;
    use crate::models::{FetchParams, HealthState, ProviderHealth, VixData, VolatilityRegime};
    use crate::provider::ProviderClient;
    use crate::registry::{CircuitBreaker, ServiceStatusRegistry};
    use crate::resilience::{FallbackChain, FallbackGenerator, RetryExecutor, SyntheticGenerator};

    /// Serves volatility, panics on gamma, fails everything else.
    struct MixedProvider;

    #[async_trait]
    impl ProviderClient for MixedProvider {
        fn id(&self) -> &'static str {
            "mixed"
        }

        fn kinds(&self) -> &'static [DataKind] {
            &DataKind::ALL
        }

        async fn fetch(&self, kind: DataKind, _params: &FetchParams) -> Result<Payload, FeedError> {
            match kind {
                DataKind::Volatility => Ok(Payload::Volatility(VixData {
                    value: 22.0,
                    change: 1.0,
                    change_percent: 4.8,
                    regime: VolatilityRegime::Elevated,
                })),
                DataKind::GammaExposure => panic!("gamma model blew up"),
                _ => Err(FeedError::Rejected {
                    provider: "mixed".to_string(),
                    message: "not today".to_string(),
                }),
            }
        }

        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth::new(HealthState::Online, 1)
        }
    }

    /// Synthetic data except for options flow.
    struct NoFlowGenerator;

    impl FallbackGenerator for NoFlowGenerator {
        fn generate(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError> {
            if kind == DataKind::OptionsFlow {
                return Err(FeedError::FallbackExhausted {
                    kind,
                    message: "no flow template".to_string(),
                });
            }
            SyntheticGenerator::new().generate(kind, params)
        }
    }

    fn aggregator() -> Aggregator {
        let executor = RetryExecutor::new(
            RetryConfig {
                max_attempts: 0,
                base_delay: Duration::from_millis(1),
                per_call_timeout: Duration::from_secs(1),
            },
            Arc::new(CircuitBreaker::new()),
            Arc::new(ServiceStatusRegistry::new(["mixed"])),
        );
        let router = FeedRouter::new(
            vec![Arc::new(MixedProvider) as Arc<dyn ProviderClient>],
            executor,
            FallbackChain::new(Arc::new(NoFlowGenerator)),
            true,
        );
        Aggregator::new(Arc::new(router))
    }

    fn all_requests() -> Vec<FetchRequest> {
        DataKind::ALL
            .into_iter()
            .map(|kind| FetchRequest::new(kind, FetchParams::none()))
            .collect()
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_field() {
        let aggregate = aggregator().fetch_all(all_requests()).await;

        assert_eq!(aggregate.results.len(), 5);

        let vix = aggregate.typed::<VixData>().unwrap();
        assert_eq!(vix.source.as_str(), "mixed");
        assert_eq!(vix.data.value, 22.0);

        assert!(aggregate.get(DataKind::MarketData).unwrap().is_degraded());
        assert!(aggregate.get(DataKind::SectorData).unwrap().is_degraded());

        assert!(aggregate.results[&DataKind::OptionsFlow].is_none());
        assert!(aggregate.results[&DataKind::GammaExposure].is_none());
        assert_eq!(aggregate.errors.len(), 2);
        assert!(!aggregate.is_complete());
    }

    #[tokio::test]
    async fn test_panic_becomes_field_error() {
        let aggregate = aggregator()
            .fetch_all(vec![
                FetchRequest::new(DataKind::GammaExposure, FetchParams::symbol(Some("SPY"))),
                FetchRequest::new(DataKind::Volatility, FetchParams::none()),
            ])
            .await;

        assert_eq!(aggregate.errors.len(), 1);
        let field = &aggregate.errors[0];
        assert_eq!(field.kind, DataKind::GammaExposure);
        assert!(matches!(field.error, FeedError::Panicked { .. }));
        assert!(field.error.to_string().contains("gamma model blew up"));
        assert!(aggregate.get(DataKind::Volatility).is_some());
    }

    #[tokio::test]
    async fn test_degraded_kinds() {
        let aggregate = aggregator().fetch_all(all_requests()).await;
        assert_eq!(
            aggregate.degraded_kinds(),
            vec![DataKind::MarketData, DataKind::SectorData]
        );
    }

    #[tokio::test]
    async fn test_serializes_errors_as_messages() {
        let aggregate = aggregator()
            .fetch_all(vec![FetchRequest::new(DataKind::OptionsFlow, FetchParams::none())])
            .await;

        let json = serde_json::to_value(&aggregate).unwrap();
        assert!(json["results"]["optionsFlow"].is_null());
        assert_eq!(json["errors"][0]["kind"], "optionsFlow");
        assert!(json["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("no flow template"));
    }
}
