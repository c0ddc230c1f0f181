//! Bounded retry around a single provider call.
//!
//! Every call goes through the circuit breaker gate first. Admitted calls are
//! attempted up to `max_attempts + 1` times, all raced against one deadline
//! (`per_call_timeout` from invocation unless the caller supplies its own).
//! Between attempts the executor sleeps `base_delay * (attempt + 1)`; a retry
//! whose backoff would overrun the deadline is not attempted.
//!
//! The outcome of the whole call, not of each attempt, is reported to the
//! circuit breaker and the status registry.

use std::future::Future;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::errors::FeedError;
use crate::models::{ProviderId, TypedResult};
use crate::registry::{Admission, CircuitBreaker, ServiceStatusRegistry};

/// Runs provider operations with retry, timeout and circuit breaking.
pub struct RetryExecutor {
    config: RetryConfig,
    circuit_breaker: Arc<CircuitBreaker>,
    status: Arc<ServiceStatusRegistry>,
}

impl RetryExecutor {
    pub fn new(
        config: RetryConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        status: Arc<ServiceStatusRegistry>,
    ) -> Self {
        Self {
            config,
            circuit_breaker,
            status,
        }
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    pub fn status(&self) -> &Arc<ServiceStatusRegistry> {
        &self.status
    }

    /// Deadline for a call starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.config.per_call_timeout
    }

    /// Run `operation` against `provider`.
    ///
    /// Fails with [`FeedError::CircuitOpen`] without invoking the operation
    /// while the provider's circuit is open; otherwise with the last error
    /// once attempts are exhausted.
    pub async fn execute<T, Op, Fut>(
        &self,
        provider: &ProviderId,
        operation: Op,
    ) -> Result<TypedResult<T>, FeedError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        self.execute_until(provider, self.deadline(), operation).await
    }

    /// Like [`execute`](Self::execute), bounded by `deadline`.
    ///
    /// A deadline that has already passed fails with [`FeedError::Timeout`]
    /// before the circuit is consulted; the provider is not charged for it.
    pub async fn execute_until<T, Op, Fut>(
        &self,
        provider: &ProviderId,
        deadline: Instant,
        operation: Op,
    ) -> Result<TypedResult<T>, FeedError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        if Instant::now() >= deadline {
            debug!("Deadline passed before '{}' was tried", provider);
            return Err(self.timeout_error(provider));
        }

        let admission = self.circuit_breaker.admit(provider).ok_or_else(|| {
            debug!("Circuit open for '{}', short-circuiting", provider);
            FeedError::CircuitOpen {
                provider: provider.to_string(),
            }
        })?;

        let data = self.run(provider, admission, deadline, operation).await?;
        Ok(TypedResult::live(data, provider.clone()))
    }

    /// Like [`execute`](Self::execute), handing any failure to `fallback`.
    ///
    /// The fallback runs for an open circuit and for exhausted attempts alike.
    pub async fn execute_or_else<T, Op, Fut, Fb>(
        &self,
        provider: &ProviderId,
        operation: Op,
        fallback: Fb,
    ) -> Result<TypedResult<T>, FeedError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
        Fb: FnOnce(FeedError) -> Result<TypedResult<T>, FeedError>,
    {
        self.execute_or_else_until(provider, self.deadline(), operation, fallback)
            .await
    }

    /// Like [`execute_or_else`](Self::execute_or_else), bounded by `deadline`.
    pub async fn execute_or_else_until<T, Op, Fut, Fb>(
        &self,
        provider: &ProviderId,
        deadline: Instant,
        operation: Op,
        fallback: Fb,
    ) -> Result<TypedResult<T>, FeedError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
        Fb: FnOnce(FeedError) -> Result<TypedResult<T>, FeedError>,
    {
        match self.execute_until(provider, deadline, operation).await {
            Ok(result) => Ok(result),
            Err(error) => {
                info!("Falling back for '{}': {}", provider, error);
                fallback(error)
            }
        }
    }

    fn timeout_error(&self, provider: &ProviderId) -> FeedError {
        FeedError::Timeout {
            provider: provider.to_string(),
            after: self.config.per_call_timeout,
        }
    }

    async fn run<T, Op, Fut>(
        &self,
        provider: &ProviderId,
        admission: Admission,
        deadline: Instant,
        mut operation: Op,
    ) -> Result<T, FeedError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            // Losing the race drops the operation's future, so a late
            // response can never reach the breaker or the registry.
            let outcome = match tokio::time::timeout_at(deadline, operation()).await {
                Ok(result) => result,
                Err(_) => Err(self.timeout_error(provider)),
            };

            let error = match outcome {
                Ok(data) => {
                    if attempt > 0 {
                        debug!("'{}' succeeded on attempt {}", provider, attempt + 1);
                    }
                    self.circuit_breaker.record_success(provider, &admission);
                    self.status.record_success(provider, admission.ticket());
                    return Ok(data);
                }
                Err(error) => error,
            };

            let delay = self.config.backoff_delay(attempt);
            let retry = error.retry_class().is_retryable()
                && attempt < self.config.max_attempts
                && Instant::now() + delay < deadline;

            if retry {
                debug!(
                    "'{}' attempt {}/{} failed: {}; retrying in {:?}",
                    provider,
                    attempt + 1,
                    self.config.max_attempts + 1,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            warn!(
                "'{}' failed after {} attempt(s): {}",
                provider,
                attempt + 1,
                error
            );
            self.circuit_breaker.record_failure(provider, &admission);
            self.status
                .record_failure(provider, admission.ticket(), &error);
            return Err(error);
        }
    }
}
