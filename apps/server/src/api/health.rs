use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tradedash_market_feed::{CircuitState, ServiceStatus, SystemHealth};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderStatus {
    provider: String,
    circuit: CircuitState,
    #[serde(flatten)]
    status: ServiceStatus,
}

fn provider_status(state: &AppState, provider: String, status: ServiceStatus) -> ProviderStatus {
    ProviderStatus {
        circuit: state.feed.circuit_state(&provider),
        provider,
        status,
    }
}

/// Run provider health checks and reduce them to one verdict.
async fn get_system_health(State(state): State<Arc<AppState>>) -> Json<SystemHealth> {
    Json(state.feed.get_system_health().await)
}

async fn get_provider_statuses(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderStatus>> {
    let statuses = state
        .feed
        .service_statuses()
        .into_iter()
        .map(|(provider, status)| provider_status(&state, provider, status))
        .collect();
    Json(statuses)
}

/// Operator escape hatch: close a provider's circuit.
async fn reset_circuit(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> ApiResult<Json<ProviderStatus>> {
    if !state.feed.has_provider(&provider) {
        return Err(ApiError::NotFound(format!("Unknown provider '{}'", provider)));
    }

    state.feed.reset_circuit_breaker(&provider);
    tracing::info!("Circuit for '{}' reset by operator", provider);

    let status = state
        .feed
        .service_status(&provider)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown provider '{}'", provider)))?;
    Ok(Json(provider_status(&state, provider, status)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(get_system_health))
        .route("/providers/status", get(get_provider_statuses))
        .route("/providers/{provider}/circuit/reset", post(reset_circuit))
}
