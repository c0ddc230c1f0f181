//! Tradedash Market Feed Crate
//!
//! This crate provides the resilient data-fetch layer behind the trading
//! dashboard's market widgets.
//!
//! # Overview
//!
//! The market feed supports:
//! - Five data kinds: index quotes, sector performance, VIX, gamma exposure, options flow
//! - Multiple upstream providers, tried in priority order per kind
//! - Bounded retry with linear backoff and a per-call deadline
//! - Per-provider circuit breaking with lazy half-open probing
//! - Degraded mode: cached or synthetic data, always flagged as such
//!
//! # Architecture
//!
//! ```text
//!                          +------------------+
//!                          |   MarketFeed     |  (facade)
//!                          +------------------+
//!                             |            |
//!                             v            v
//!                   +------------+    +----------------+
//!                   | Aggregator |    | HealthReporter |
//!                   +------------+    +----------------+
//!                             |
//!                             v
//!                          +------------------+
//!                          |   FeedRouter     |  (per kind, by priority)
//!                          +------------------+
//!                             |            |
//!                             v            v
//!                 +---------------+    +---------------+
//!                 | RetryExecutor |    | FallbackChain |
//!                 +---------------+    +---------------+
//!                     |         |
//!                     v         v
//!         +----------------+  +-----------------------+
//!         | CircuitBreaker |  | ServiceStatusRegistry |
//!         +----------------+  +-----------------------+
//!                     |
//!                     v
//!                          +------------------+
//!                          | ProviderClient   |  (HTTP, mocks, ...)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketFeed`] - Entry point; one typed fetch per widget
//! - [`TypedResult`] - Data plus source, status and timestamp
//! - [`Payload`] - Closed set of provider responses, one arm per [`DataKind`]
//! - [`FeedError`] - Error taxonomy with retry classification
//! - [`FeedConfig`] - Immutable feed settings

pub mod aggregator;
pub mod config;
pub mod errors;
pub mod health;
pub mod models;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod router;
pub mod service;

// Re-export all public types from models
pub use models::{
    DataKind, DataSource, FetchParams, FetchRequest, FlowSentiment, FlowTrade, GammaData,
    GammaLevel, HealthState, IndexData, OptionSide, OptionsFlow, OverallHealth, Payload,
    PayloadData, ProviderHealth, ProviderHealthReport, ProviderId, ResultStatus, SectorData,
    SystemHealth, TypedResult, VixData, VolatilityRegime,
};

// Re-export provider types
pub use provider::{HttpProviderClient, ProviderClient};

// Re-export resilience types
pub use registry::{CircuitBreaker, CircuitBreakerConfig, CircuitState, ServiceStatus};
pub use resilience::{FallbackChain, FallbackGenerator, RetryExecutor, SyntheticGenerator};

// Re-export the facade and its parts
pub use aggregator::{AggregateResult, Aggregator, FieldError};
pub use config::{FeedConfig, RetryConfig};
pub use errors::{FeedError, RetryClass};
pub use health::HealthReporter;
pub use router::FeedRouter;
pub use service::MarketFeed;
