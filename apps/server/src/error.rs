use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tradedash_market_feed::FeedError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Feed(#[from] FeedError),
    #[error("{0}")]
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Feed(e) => match e {
                FeedError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                FeedError::TransientNetwork { .. }
                | FeedError::RateLimited { .. }
                | FeedError::Rejected { .. }
                | FeedError::PayloadMismatch { .. } => StatusCode::BAD_GATEWAY,
                FeedError::CircuitOpen { .. }
                | FeedError::NoProviderForKind(_)
                | FeedError::FallbackExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                FeedError::Panicked { .. } | FeedError::InvalidConfig(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        }
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
