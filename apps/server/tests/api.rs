use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use tradedash_server::{api::app_router, build_state, config::Config};

/// Router with no upstreams configured, so every kind is served by fallback.
fn build_test_router() -> axum::Router {
    let config = Config::default();
    let state = build_state(&config).unwrap();
    app_router(state, &config)
}

async fn call(app: axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn vix_is_served_from_fallback() {
    let (status, body) = call(build_test_router(), Method::GET, "/api/v1/vix").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "fallback");
    assert_eq!(body["status"], "degraded");
    assert!(body["data"]["value"].is_number());
}

#[tokio::test]
async fn market_data_honors_symbols() {
    let (status, body) = call(
        build_test_router(),
        Method::GET,
        "/api/v1/market?symbols=spy,qqq",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_object().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data.contains_key("SPY"));
    assert!(data.contains_key("QQQ"));
}

#[tokio::test]
async fn gamma_defaults_to_spy() {
    let (status, body) = call(build_test_router(), Method::GET, "/api/v1/gamma").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbol"], "SPY");
}

#[tokio::test]
async fn snapshot_has_every_kind() {
    let (status, body) = call(build_test_router(), Method::GET, "/api/v1/snapshot").await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_object().unwrap();
    for kind in [
        "marketData",
        "sectorData",
        "volatility",
        "gammaExposure",
        "optionsFlow",
    ] {
        assert!(results[kind].is_object(), "missing {}", kind);
    }
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn health_without_upstreams_is_critical() {
    let (status, body) = call(build_test_router(), Method::GET, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall"], "critical");
    assert_eq!(body["perProvider"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn reset_unknown_provider_is_not_found() {
    let (status, body) = call(
        build_test_router(),
        Method::POST,
        "/api/v1/providers/nobody/circuit/reset",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn fallback_disabled_maps_to_service_unavailable() {
    let mut config = Config::default();
    config.feed.fallback_enabled = false;
    let app = app_router(build_state(&config).unwrap(), &config);

    let (status, body) = call(app, Method::GET, "/api/v1/sectors").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 503);
}
