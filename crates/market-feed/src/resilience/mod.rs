//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to provider:
//!     -> retry.rs (circuit gate, timeout race, bounded retry with backoff)
//!     -> on failure: fallback.rs (last known good, then synthetic.rs)
//! ```

mod fallback;
mod retry;
mod synthetic;

pub use fallback::{FallbackChain, FallbackGenerator, MAX_LAST_KNOWN_GOOD};
pub use retry::RetryExecutor;
pub use synthetic::SyntheticGenerator;
