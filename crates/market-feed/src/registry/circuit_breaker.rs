//! Per-provider circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern to stop hammering a provider that
//! keeps failing. The circuit has three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Provider is failing, requests are blocked until the cooldown elapses.
//! - **HalfOpen**: Cooldown elapsed; the next call is let through as a probe.
//!
//! There is no background timer. Open -> HalfOpen is evaluated lazily when the
//! provider is next called, so a circuit that nobody calls stays open.
//!
//! Every admitted call carries a ticket. Outcomes whose ticket predates the
//! last success or the last manual reset are discarded, so a slow call that
//! was started before the provider recovered cannot re-open the circuit.
//!
//! The circuit breaker is in-memory and resets on process restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::models::ProviderId;

/// Default number of failed executions before opening the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default time an open circuit blocks calls.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// Cooldown elapsed - the next request probes the provider.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Internal circuit state for a single provider.
#[derive(Debug)]
struct Circuit {
    /// Current circuit state.
    state: CircuitState,
    /// Number of consecutive failed executions.
    failure_count: u32,
    /// When the circuit last opened.
    opened_at: Option<Instant>,
    /// Failures from tickets below this are stale.
    watermark: u64,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            watermark: 0,
        }
    }

    fn cooled_down(&self, cooldown: Duration) -> bool {
        self.opened_at
            .map(|opened| opened.elapsed() >= cooldown)
            .unwrap_or(true)
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    /// Number of failed executions before opening the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit blocks calls.
    #[serde(rename = "cooldownMs", with = "crate::config::duration_ms")]
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Permission to call a provider, handed out by [`CircuitBreaker::admit`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Admission {
    ticket: u64,
    probe: bool,
}

impl Admission {
    /// Monotonic call ticket, shared with the status registry.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Whether this call is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

/// Per-provider circuit breaker.
///
/// Thread-safe; concurrent outcomes for the same provider serialize on the
/// internal mutex so no failure increment is lost.
pub struct CircuitBreaker {
    /// Per-provider circuit states.
    circuits: Mutex<HashMap<String, Circuit>>,
    /// Last ticket handed out.
    tickets: AtomicU64,
    /// Configuration.
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            tickets: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    ///
    /// The worst case of recovering is a slightly wrong circuit state,
    /// which is better than panicking in the fetch path.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Hand out the next ticket. Callers hold the circuits lock.
    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Check if requests are allowed for a provider.
    ///
    /// Returns false only while the circuit is open and within its cooldown.
    pub fn allow(&self, provider: &ProviderId) -> bool {
        self.admit(provider).is_some()
    }

    /// Admit a call, returning the ticket its outcome must be recorded with.
    ///
    /// Handles the lazy Open -> HalfOpen transition when the cooldown has elapsed.
    pub fn admit(&self, provider: &ProviderId) -> Option<Admission> {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        let probe = match circuit.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if !circuit.cooled_down(self.config.cooldown) {
                    return None;
                }
                info!(
                    "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                    provider
                );
                circuit.state = CircuitState::HalfOpen;
                true
            }
        };

        Some(Admission {
            ticket: self.next_ticket(),
            probe,
        })
    }

    /// Record a success outside of an admitted call.
    pub fn on_success(&self, provider: &ProviderId) {
        let admission = self.fresh_admission();
        self.record_success(provider, &admission);
    }

    /// Record a failure outside of an admitted call.
    pub fn on_failure(&self, provider: &ProviderId) {
        let admission = self.fresh_admission();
        self.record_failure(provider, &admission);
    }

    fn fresh_admission(&self) -> Admission {
        let _circuits = self.lock_circuits();
        Admission {
            ticket: self.next_ticket(),
            probe: false,
        }
    }

    /// Record a successful call: zeroes the failure count and closes the circuit.
    pub fn record_success(&self, provider: &ProviderId, admission: &Admission) {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        if circuit.state != CircuitState::Closed {
            info!(
                "Circuit breaker: closing circuit for '{}' after successful {}",
                provider,
                if admission.probe { "probe" } else { "call" }
            );
        } else if circuit.failure_count > 0 {
            debug!(
                "Circuit breaker: success for '{}', failure count reset",
                provider
            );
        }

        circuit.state = CircuitState::Closed;
        circuit.failure_count = 0;
        circuit.opened_at = None;
        circuit.watermark = circuit.watermark.max(admission.ticket);
    }

    /// Record a failed call.
    ///
    /// Opens the circuit once the threshold is reached; a failed probe
    /// re-opens it and restarts the cooldown. Returns false when the outcome
    /// was stale and discarded.
    pub fn record_failure(&self, provider: &ProviderId, admission: &Admission) -> bool {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        if admission.ticket < circuit.watermark {
            debug!(
                "Circuit breaker: discarding stale failure for '{}' (ticket {} < {})",
                provider, admission.ticket, circuit.watermark
            );
            return false;
        }

        circuit.failure_count = circuit.failure_count.saturating_add(1);

        match circuit.state {
            CircuitState::Closed => {
                if circuit.failure_count >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        provider, circuit.failure_count
                    );
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Instant::now());
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, circuit.failure_count, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    "Circuit breaker: reopening circuit for '{}' after failed probe",
                    provider
                );
                circuit.state = CircuitState::Open;
                circuit.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: additional failure for '{}' (already open)",
                    provider
                );
            }
        }

        true
    }

    /// Current state for a provider, evaluated against the clock.
    ///
    /// Does not transition: an open circuit whose cooldown has elapsed is
    /// reported as HalfOpen even though nobody has probed it yet.
    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        let circuits = self.lock_circuits();

        match circuits.get(provider.as_ref()) {
            None => CircuitState::Closed,
            Some(c) if c.state == CircuitState::Open && c.cooled_down(self.config.cooldown) => {
                CircuitState::HalfOpen
            }
            Some(c) => c.state,
        }
    }

    /// Get the failure count for a provider.
    pub fn failure_count(&self, provider: &ProviderId) -> u32 {
        let circuits = self.lock_circuits();

        circuits
            .get(provider.as_ref())
            .map(|c| c.failure_count)
            .unwrap_or(0)
    }

    /// Unconditionally close the circuit for a provider and zero its count.
    ///
    /// Outcomes of calls admitted before the reset are discarded. Returns the
    /// watermark below which tickets are stale. Safe to call repeatedly.
    pub fn reset(&self, provider: &ProviderId) -> u64 {
        let mut circuits = self.lock_circuits();
        let watermark = self.tickets.load(Ordering::SeqCst) + 1;

        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        if circuit.state != CircuitState::Closed || circuit.failure_count > 0 {
            info!(
                "Circuit breaker: manually resetting circuit for '{}'",
                provider
            );
        }
        circuit.state = CircuitState::Closed;
        circuit.failure_count = 0;
        circuit.opened_at = None;
        circuit.watermark = watermark;
        watermark
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
