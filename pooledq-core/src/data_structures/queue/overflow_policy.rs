/// What the node pool does when a producer finds the free-list empty.
///
/// ```text
/// EvictOldest:  free-list empty -> dequeue (and drop) the head element,
///               recycle its node, retry
/// Reject:       free-list empty -> hand the value back to the producer
/// ```
///
/// [`LockFreeQueue::enqueue`](super::LockFreeQueue::enqueue) always uses
/// `EvictOldest`; [`LockFreeQueue::try_enqueue`](super::LockFreeQueue::try_enqueue)
/// uses `Reject`.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Silently discard the oldest undequeued element.
    #[default]
    EvictOldest,
    /// Fail the insertion and return the value to the caller.
    Reject,
}
