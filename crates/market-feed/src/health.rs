//! System health reporting.
//!
//! Health checks run concurrently, each bounded by the feed timeout. A check
//! that hangs, or panics, counts as offline for that provider only.

use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use log::{debug, warn};

use crate::models::{
    OverallHealth, ProviderHealth, ProviderHealthReport, ProviderId, SystemHealth,
};
use crate::provider::ProviderClient;
use crate::registry::{CircuitBreaker, ServiceStatusRegistry};

/// Builds [`SystemHealth`] reports for a set of providers.
pub struct HealthReporter {
    providers: Vec<Arc<dyn ProviderClient>>,
    circuit_breaker: Arc<CircuitBreaker>,
    status: Arc<ServiceStatusRegistry>,
    timeout: Duration,
}

impl HealthReporter {
    pub fn new(
        providers: Vec<Arc<dyn ProviderClient>>,
        circuit_breaker: Arc<CircuitBreaker>,
        status: Arc<ServiceStatusRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            circuit_breaker,
            status,
            timeout,
        }
    }

    /// Check every provider and reduce the results to one verdict.
    pub async fn system_health(&self) -> SystemHealth {
        let checks = self.providers.iter().map(|provider| self.check(provider));
        let per_provider = join_all(checks).await;

        let overall = OverallHealth::from_states(per_provider.iter().map(|r| r.status));
        debug!(
            "System health: {:?} across {} providers",
            overall,
            per_provider.len()
        );

        SystemHealth {
            overall,
            per_provider,
            checked_at: Utc::now(),
        }
    }

    async fn check(&self, provider: &Arc<dyn ProviderClient>) -> ProviderHealthReport {
        let provider_id: ProviderId = Cow::Borrowed(provider.id());
        let timeout_ms = self.timeout.as_millis() as u64;

        let check = AssertUnwindSafe(provider.health_check()).catch_unwind();
        let health = match tokio::time::timeout(self.timeout, check).await {
            Ok(Ok(health)) => health,
            Ok(Err(_)) => {
                warn!("Health check for '{}' panicked", provider_id);
                ProviderHealth::offline(0)
            }
            Err(_) => {
                warn!(
                    "Health check for '{}' timed out after {:?}",
                    provider_id, self.timeout
                );
                ProviderHealth::offline(timeout_ms)
            }
        };

        let consecutive_failures = self
            .status
            .get(provider.id())
            .map(|s| s.consecutive_failures)
            .unwrap_or(0);

        ProviderHealthReport {
            provider: provider_id.to_string(),
            status: health.status,
            response_time_ms: health.response_time_ms,
            circuit: self.circuit_breaker.state(&provider_id),
            consecutive_failures,
        }
    }
}
