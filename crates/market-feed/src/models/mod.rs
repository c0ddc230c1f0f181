//! Market feed models
//!
//! This module contains the core data types for feed operations:
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `kind` - Data kinds, fetch parameters and requests
//! - `payload` - Typed provider payloads (IndexData, VixData, ...)
//! - `result` - The `TypedResult` envelope returned to callers
//! - `health` - Provider and system health verdicts

mod health;
mod kind;
mod payload;
mod result;
mod types;

pub use health::{HealthState, OverallHealth, ProviderHealth, ProviderHealthReport, SystemHealth};
pub use kind::{DataKind, FetchParams, FetchRequest, DEFAULT_GAMMA_SYMBOL, DEFAULT_INDEX_SYMBOLS};
pub use payload::{
    FlowSentiment, FlowTrade, GammaData, GammaLevel, IndexData, OptionSide, OptionsFlow, Payload,
    PayloadData, SectorData, VixData, VolatilityRegime,
};
pub use result::{DataSource, ResultStatus, TypedResult};
pub use types::ProviderId;
