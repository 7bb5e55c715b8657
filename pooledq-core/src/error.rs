use thiserror::Error;

/// Errors reported while constructing a queue.
///
/// Steady-state operations never fail: CAS contention is absorbed by
/// retry-with-backoff and pool exhaustion is resolved by the overflow policy.
///
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A capacity of zero was requested.
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,
    /// Rounding up to a power of two overflowed or exceeded the addressable node count.
    #[error("queue capacity {requested} cannot be rounded to an addressable power of two")]
    CapacityOverflow { requested: usize },
    /// The backoff thresholds or sleep bounds are inconsistent.
    #[error("invalid backoff configuration: {0}")]
    InvalidBackoff(&'static str),
    /// The node pool could not hand out the sentinel node.
    #[error("node pool could not provide the sentinel node")]
    SentinelUnavailable,
}
