/// Classification for retry policy.
///
/// Used by the retry executor to decide whether another attempt is worth it.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Counts as provider failure? |
/// |-------|----------------------|-----------------------------|
/// | `WithBackoff` | Yes, after backoff | Yes, once attempts run out |
/// | `Never` | No | Yes |
/// | `CircuitOpen` | No (operation never ran) | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure - network error, rate limit or timeout.
    /// Retried until the attempt budget is spent.
    WithBackoff,

    /// The request itself is bad or the failure is final.
    /// Remaining attempts are skipped.
    Never,

    /// Circuit breaker is open for this provider.
    /// The call short-circuits to fallback.
    CircuitOpen,
}

impl RetryClass {
    /// Whether another attempt against the same provider may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::WithBackoff)
    }
}
