//! Shared per-provider state.
//!
//! This module holds the only mutable state shared between calls:
//! - Circuit breaking per provider
//! - Health/failure bookkeeping per provider

mod circuit_breaker;
mod status;

pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD,
};
pub use status::{ErrorRecord, ServiceStatus, ServiceStatusRegistry};
