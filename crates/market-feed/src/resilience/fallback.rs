//! Fallback chain for degraded mode.
//!
//! When a provider is unavailable the chain answers instead:
//! 1. Last known good live result, if enabled and younger than its TTL
//!    (`status: Cached`, original provider as source)
//! 2. Synthetic data from the generator (`source: Fallback`, `status: Degraded`)
//!
//! Only a failing generator makes the chain fail, with
//! [`FeedError::FallbackExhausted`].
//!
//! The last-known-good tier holds at most [`MAX_LAST_KNOWN_GOOD`] entries.
//! Expired entries are dropped when read and swept on every insert; when
//! full, the oldest entry is evicted.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, warn};
use tokio::time::Instant;

use crate::errors::FeedError;
use crate::models::{DataKind, FetchParams, Payload, ResultStatus, TypedResult};

use super::synthetic::SyntheticGenerator;

/// Upper bound on remembered (kind, params) results.
pub const MAX_LAST_KNOWN_GOOD: usize = 256;

/// Produces stand-in data for a kind.
pub trait FallbackGenerator: Send + Sync {
    /// Generate a payload for `kind`; must return the matching arm.
    fn generate(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError>;
}

struct LastKnownGood {
    ttl: Duration,
    entries: DashMap<(DataKind, FetchParams), (TypedResult<Payload>, Instant)>,
}

/// Ordered fallback tiers for one feed.
pub struct FallbackChain {
    generator: Arc<dyn FallbackGenerator>,
    last_known_good: Option<LastKnownGood>,
}

impl FallbackChain {
    pub fn new(generator: Arc<dyn FallbackGenerator>) -> Self {
        Self {
            generator,
            last_known_good: None,
        }
    }

    /// Chain backed by [`SyntheticGenerator`].
    pub fn synthetic() -> Self {
        Self::new(Arc::new(SyntheticGenerator::new()))
    }

    /// Serve remembered live results younger than `ttl` before synthetic data.
    pub fn with_last_known_good(mut self, ttl: Duration) -> Self {
        self.last_known_good = Some(LastKnownGood {
            ttl,
            entries: DashMap::new(),
        });
        self
    }

    /// Remember a live result for the last-known-good tier.
    ///
    /// No-op unless the tier is enabled and the result is fresh.
    pub fn remember(&self, kind: DataKind, params: &FetchParams, result: &TypedResult<Payload>) {
        let Some(cache) = &self.last_known_good else {
            return;
        };
        if result.status != ResultStatus::Success {
            return;
        }
        let ttl = cache.ttl;
        cache
            .entries
            .retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);

        let key = (kind, params.clone());
        if cache.entries.len() >= MAX_LAST_KNOWN_GOOD && !cache.entries.contains_key(&key) {
            let oldest = cache
                .entries
                .iter()
                .min_by_key(|entry| entry.value().1)
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                debug!("Last known good cache full, evicting {}", oldest.0);
                cache.entries.remove(&oldest);
            }
        }

        cache.entries.insert(key, (result.clone(), Instant::now()));
    }

    /// Synthetic payload for `kind`.
    pub fn generate(&self, kind: DataKind, params: &FetchParams) -> Result<Payload, FeedError> {
        let payload = self
            .generator
            .generate(kind, params)
            .map_err(|e| match e {
                FeedError::FallbackExhausted { .. } => e,
                other => FeedError::FallbackExhausted {
                    kind,
                    message: other.to_string(),
                },
            })?;

        if payload.kind() != kind {
            return Err(FeedError::FallbackExhausted {
                kind,
                message: format!("generator returned {}", payload.kind()),
            });
        }
        Ok(payload)
    }

    /// Walk the tiers and produce a result for `kind`.
    pub fn resolve(
        &self,
        kind: DataKind,
        params: &FetchParams,
    ) -> Result<TypedResult<Payload>, FeedError> {
        if let Some(cached) = self.cached(kind, params) {
            debug!("Serving last known good {} from '{}'", kind, cached.source);
            return Ok(cached);
        }

        match self.generate(kind, params) {
            Ok(payload) => Ok(TypedResult::degraded(payload)),
            Err(e) => {
                warn!("Fallback generation failed for {}: {}", kind, e);
                Err(e)
            }
        }
    }

    fn cached(&self, kind: DataKind, params: &FetchParams) -> Option<TypedResult<Payload>> {
        let cache = self.last_known_good.as_ref()?;
        let key = (kind, params.clone());

        let fresh = cache.entries.get(&key).map(|entry| {
            let (result, stored_at) = entry.value();
            (stored_at.elapsed() < cache.ttl).then(|| result.clone())
        })?;

        let Some(mut result) = fresh else {
            cache
                .entries
                .remove_if(&key, |_, (_, stored_at)| stored_at.elapsed() >= cache.ttl);
            return None;
        };

        result.status = ResultStatus::Cached;
        Some(result)
    }

    #[cfg(test)]
    fn remembered(&self) -> usize {
        self.last_known_good
            .as_ref()
            .map_or(0, |cache| cache.entries.len())
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::synthetic()
    }
}
