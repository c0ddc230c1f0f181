use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tradedash_market_feed::{
    AggregateResult, GammaData, IndexData, OptionsFlow, SectorData, TypedResult, VixData,
};

use crate::{error::ApiResult, main_lib::AppState};

#[derive(Deserialize)]
struct SymbolsQuery {
    symbols: Option<String>,
}

impl SymbolsQuery {
    /// Comma separated list; empty means the default set.
    fn list(&self) -> Vec<String> {
        self.symbols
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Deserialize)]
struct SymbolQuery {
    symbol: Option<String>,
}

async fn get_market_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SymbolsQuery>,
) -> ApiResult<Json<TypedResult<HashMap<String, IndexData>>>> {
    let result = state.feed.fetch_market_data(query.list()).await?;
    Ok(Json(result))
}

async fn get_sector_data(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<TypedResult<HashMap<String, SectorData>>>> {
    Ok(Json(state.feed.fetch_sector_data().await?))
}

async fn get_vix_data(State(state): State<Arc<AppState>>) -> ApiResult<Json<TypedResult<VixData>>> {
    Ok(Json(state.feed.fetch_vix_data().await?))
}

async fn get_gamma_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SymbolQuery>,
) -> ApiResult<Json<TypedResult<GammaData>>> {
    Ok(Json(state.feed.fetch_gamma_data(query.symbol.as_deref()).await?))
}

async fn get_options_flow(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SymbolQuery>,
) -> ApiResult<Json<TypedResult<OptionsFlow>>> {
    Ok(Json(
        state
            .feed
            .fetch_options_flow(query.symbol.as_deref())
            .await?,
    ))
}

/// Every widget at once. Failed fields come back as `null` plus an error entry.
async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SymbolsQuery>,
) -> Json<AggregateResult> {
    Json(state.feed.fetch_all_market_data(query.list()).await)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/market", get(get_market_data))
        .route("/sectors", get(get_sector_data))
        .route("/vix", get(get_vix_data))
        .route("/gamma", get(get_gamma_data))
        .route("/flow", get(get_options_flow))
        .route("/snapshot", get(get_snapshot))
}
