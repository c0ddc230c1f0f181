//! Scripted in-memory providers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tradedash_market_feed::{
    DataKind, FallbackGenerator, FeedError, FetchParams, HealthState, Payload, ProviderClient,
    ProviderHealth, SyntheticGenerator,
};

/// What a provider does on one call.
#[derive(Clone, Copy, Debug)]
pub enum Step {
    /// Answer with a valid payload after the delay.
    Succeed(Duration),
    /// Fail transiently after the delay.
    Fail(Duration),
    /// Refuse the request after the delay.
    Reject(Duration),
    /// Never answer.
    Hang,
}

/// Provider whose behavior is scripted per call and per kind.
///
/// Queued steps are consumed first, then the per-kind step, then the default.
pub struct ScriptedProvider {
    id: &'static str,
    kinds: &'static [DataKind],
    default_step: Mutex<Step>,
    per_kind: HashMap<DataKind, Step>,
    queue: Mutex<VecDeque<Step>>,
    health: HealthState,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: &'static str, kinds: &'static [DataKind], step: Step) -> Self {
        Self {
            id,
            kinds,
            default_step: Mutex::new(step),
            per_kind: HashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            health: HealthState::Online,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on(mut self, kind: DataKind, step: Step) -> Self {
        self.per_kind.insert(kind, step);
        self
    }

    pub fn then(self, step: Step) -> Self {
        self.queue.lock().unwrap().push_back(step);
        self
    }

    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = health;
        self
    }

    /// Change the default behavior of later calls.
    pub fn set_step(&self, step: Step) {
        *self.default_step.lock().unwrap() = step;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self, kind: DataKind) -> Step {
        if let Some(step) = self.queue.lock().unwrap().pop_front() {
            return step;
        }
        if let Some(step) = self.per_kind.get(&kind) {
            return *step;
        }
        *self.default_step.lock().unwrap()
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn kinds(&self) -> &'static [DataKind] {
        self.kinds
    }

    async fn fetch(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.next_step(kind) {
            Step::Succeed(delay) => {
                tokio::time::sleep(delay).await;
                SyntheticGenerator::new().generate(kind, params)
            }
            Step::Fail(delay) => {
                tokio::time::sleep(delay).await;
                Err(FeedError::TransientNetwork {
                    provider: self.id.to_string(),
                    message: "connection reset by peer".to_string(),
                })
            }
            Step::Reject(delay) => {
                tokio::time::sleep(delay).await;
                Err(FeedError::Rejected {
                    provider: self.id.to_string(),
                    message: "HTTP 400 - unknown symbol".to_string(),
                })
            }
            Step::Hang => std::future::pending().await,
        }
    }

    async fn health_check(&self) -> ProviderHealth {
        ProviderHealth::new(self.health, 40)
    }
}

/// Synthetic data for every kind except the listed one.
pub struct FailingFor(pub DataKind);

impl FallbackGenerator for FailingFor {
    fn generate(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError> {
        if kind == self.0 {
            return Err(FeedError::FallbackExhausted {
                kind,
                message: "template missing".to_string(),
            });
        }
        SyntheticGenerator::new().generate(kind, params)
    }
}

pub const INSTANT: Duration = Duration::ZERO;
pub const FAST: Duration = Duration::from_millis(200);
