use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::CircuitState;

/// Health of a single upstream as reported by its own health check.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthState {
    Online,
    Degraded,
    Offline,
}

/// Result of `ProviderClient::health_check`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub status: HealthState,
    pub response_time_ms: u64,
}

impl ProviderHealth {
    pub fn new(status: HealthState, response_time_ms: u64) -> Self {
        Self {
            status,
            response_time_ms,
        }
    }

    pub fn offline(response_time_ms: u64) -> Self {
        Self::new(HealthState::Offline, response_time_ms)
    }
}

/// Per-provider line of a [`SystemHealth`] report.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealthReport {
    pub provider: String,
    pub status: HealthState,
    pub response_time_ms: u64,
    /// Circuit state as of the report, evaluated against the clock.
    pub circuit: CircuitState,
    /// Failed executions since the last success.
    pub consecutive_failures: u32,
}

/// System-level verdict.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Critical,
}

impl OverallHealth {
    /// Reduce provider states to one verdict.
    ///
    /// Healthy with at least two providers online; degraded with one online
    /// or at least two degraded; critical otherwise.
    pub fn from_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = HealthState>,
    {
        let (mut online, mut degraded) = (0usize, 0usize);
        for state in states {
            match state {
                HealthState::Online => online += 1,
                HealthState::Degraded => degraded += 1,
                HealthState::Offline => {}
            }
        }

        if online >= 2 {
            Self::Healthy
        } else if online >= 1 || degraded >= 2 {
            Self::Degraded
        } else {
            Self::Critical
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub overall: OverallHealth,
    pub per_provider: Vec<ProviderHealthReport>,
    pub checked_at: DateTime<Utc>,
}
