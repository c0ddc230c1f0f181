//! Generic JSON-over-HTTP provider client.
//!
//! Talks to upstreams that expose one endpoint per data kind:
//! - `GET {base}/{kind-path}?symbols=A,B` returning a tagged [`Payload`]
//! - `GET {base}/health` for reachability
//!
//! Kind paths are `market`, `sectors`, `volatility`, `gamma` and `flow`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};

use crate::errors::FeedError;
use crate::models::{DataKind, FetchParams, HealthState, Payload, ProviderHealth};
use crate::provider::ProviderClient;

/// Transport-level timeout; the retry executor usually fires first.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Health checks slower than this report `Degraded`.
const DEGRADED_LATENCY: Duration = Duration::from_millis(2000);

/// Provider client for JSON upstreams.
pub struct HttpProviderClient {
    id: &'static str,
    kinds: &'static [DataKind],
    priority: u8,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpProviderClient {
    /// Create a client for `base_url` serving `kinds`.
    pub fn new(id: &'static str, base_url: impl Into<String>, kinds: &'static [DataKind]) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            id,
            kinds,
            priority: 10,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            client,
        }
    }

    /// Send the key as a bearer token on every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn transport_error(&self, error: reqwest::Error) -> FeedError {
        if error.is_timeout() {
            FeedError::Timeout {
                provider: self.id.to_string(),
                after: REQUEST_TIMEOUT,
            }
        } else {
            FeedError::TransientNetwork {
                provider: self.id.to_string(),
                message: format!("Request failed: {}", error),
            }
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    fn id(&self) -> &'static str {
        self.id
    }

    fn kinds(&self) -> &'static [DataKind] {
        self.kinds
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn fetch(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError> {
        let mut request = self.client.get(self.url(kind.path()));

        if !params.symbols.is_empty() {
            request = request.query(&[("symbols", params.symbols.join(","))]);
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("{} request: {} with {} symbols", self.id, kind, params.symbols.len());

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited {
                provider: self.id.to_string(),
            });
        }

        if status.is_server_error() {
            return Err(FeedError::TransientNetwork {
                provider: self.id.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Rejected {
                provider: self.id.to_string(),
                message: format!("HTTP {} - {}", status, body),
            });
        }

        let payload: Payload = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                FeedError::Rejected {
                    provider: self.id.to_string(),
                    message: format!("Invalid payload: {}", e),
                }
            }
        })?;

        if payload.kind() != kind {
            return Err(FeedError::PayloadMismatch {
                provider: self.id.to_string(),
                expected: kind,
                actual: payload.kind(),
            });
        }

        Ok(payload)
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = self.client.get(self.url("health")).send().await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => {
                if elapsed > DEGRADED_LATENCY {
                    ProviderHealth::new(HealthState::Degraded, elapsed_ms)
                } else {
                    ProviderHealth::new(HealthState::Online, elapsed_ms)
                }
            }
            Ok(response) => {
                warn!("{} health check returned HTTP {}", self.id, response.status());
                ProviderHealth::offline(elapsed_ms)
            }
            Err(e) => {
                warn!("{} health check failed: {}", self.id, e);
                ProviderHealth::offline(elapsed_ms)
            }
        }
    }
}
