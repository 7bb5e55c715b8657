use std::fmt;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::data_structures::internal::tagged_index::{AtomicTaggedIndex, TaggedIndex};
use crate::data_structures::queue::OverflowPolicy;
use crate::data_structures::queue::QueueCreateOptions;
use crate::data_structures::queue::node_pool::{LINKED_HOLDS, NodePool, SENTINEL_HOLDS};
use crate::error::QueueError;
use crate::preemptive_synchronization::Backoff;
use crate::trace::{debug, trace};

///
/// Bounded lock-free MPMC FIFO queue based on Michael and Scott's 'Simple, Fast,
/// and Practical Non-Blocking and Blocking Concurrent Queue Algorithms', with
/// nodes drawn from a fixed [`NodePool`] instead of the global allocator.
///
// =============================================================================
// QUEUE STRUCTURE
// =============================================================================
//
//   head                                   tail
//    │                                      │
//    ▼                                      ▼
// ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
// │ SENT │───►│  v1  │───►│  v2  │───►│  v3  │───► nil
// └──────┘    └──────┘    └──────┘    └──────┘
//
// head always points at a node whose value is gone (the sentinel, or the node
// whose value the last dequeue moved out). The first live value is head.next.
//
// INVARIANTS:
// 1. head never passes tail: a dequeue seeing head == tail with a non-nil
//    next advances tail first
// 2. tail lags the last node by at most one link in steady state; any thread
//    observing tail.next != nil helps advance it
// 3. A node returns to the pool only after both of its holds are dropped
//
// =============================================================================
// DEQUEUE HAND-OFF
// =============================================================================
//
// Before:  head ──► H ──► N ──► ...
//
// Step 1 - CAS head from H to N (winner owns N's value):
//          head ───────► N ──► ...
//
// Step 2 - Winner moves the value out of N, drops N's value hold.
// Step 3 - Winner drops H's list hold. H is now unreachable from head.
//
// A slow winner may still be at step 2 while a second dequeue moves head
// past N and drops N's list hold. N goes back to the pool only once both
// holds are gone, so its value is never overwritten before it was read.
//
// =============================================================================
// POOL EXHAUSTION
// =============================================================================
//
// enqueue() acquires nodes with OverflowPolicy::EvictOldest. With N = 4 nodes
// (3 usable) and values 1..=5:
//
//   enqueue 1,2,3  -> free stack empty
//   enqueue 4      -> evict 1, recycle its old head node, link 4
//   enqueue 5      -> evict 2, recycle, link 5
//   drain          -> 3, 4, 5
//
// try_enqueue() uses OverflowPolicy::Reject and hands the value back instead.
//
// =============================================================================
//
pub struct LockFreeQueue<T> {
    pool: NodePool<T>,
    head: CachePadded<AtomicTaggedIndex>,
    tail: CachePadded<AtomicTaggedIndex>,
    // Approximate: updated outside the CAS that actually moves an element, so
    // it may briefly go negative under contention.
    len: CachePadded<AtomicIsize>,
    evicted: AtomicUsize,
}

impl<T> LockFreeQueue<T> {
    /// Create a queue whose pool holds at least `capacity` nodes.
    ///
    /// See [`QueueCreateOptions::new`] for the rounding rules.
    ///
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Self::with_options(QueueCreateOptions::new(capacity))
    }

    pub fn with_options(options: QueueCreateOptions) -> Result<Self, QueueError> {
        let node_count = options.node_count()?;
        let pool = NodePool::new(node_count, *options.backoff());

        let sentinel = pool.pop_free().ok_or(QueueError::SentinelUnavailable)?;
        pool.node(sentinel).reset(SENTINEL_HOLDS);

        debug!(
            requested = options.capacity(),
            node_count = node_count,
            "created lock-free queue"
        );

        Ok(LockFreeQueue {
            pool,
            head: CachePadded::new(AtomicTaggedIndex::new(TaggedIndex::new(sentinel, 0))),
            tail: CachePadded::new(AtomicTaggedIndex::new(TaggedIndex::new(sentinel, 0))),
            len: CachePadded::new(AtomicIsize::new(0)),
            evicted: AtomicUsize::new(0),
        })
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Append a value, evicting the oldest element if the pool is exhausted.
    pub fn enqueue(&self, value: T) {
        // EvictOldest keeps retrying until a node frees up, so the value is
        // never handed back.
        let _ = self.push(value, OverflowPolicy::EvictOldest);
    }

    /// Append a value unless the pool is exhausted, in which case the value is
    /// returned untouched.
    ///
    /// Nodes that are momentarily in flight between a dequeue and the free
    /// stack count as used, so this may reject slightly before `capacity()`
    /// live elements are reached under contention.
    ///
    pub fn try_enqueue(&self, value: T) -> Result<(), T> {
        self.push(value, OverflowPolicy::Reject)
    }

    /// Remove and return the oldest value, or `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut backoff = Backoff::new(self.pool.backoff());

        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let next = self.pool.node(head.index()).next().load(Ordering::Acquire);

            if head != self.head.load(Ordering::Acquire) {
                backoff.snooze();
                continue;
            }

            if head.index() == tail.index() {
                if next.is_nil() {
                    return None;
                }

                // tail is lagging behind a linked node, help it along.
                let _ = self.tail.compare_exchange_weak(
                    tail,
                    tail.successor(next.index()),
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                backoff.snooze();
                continue;
            }

            if next.is_nil() {
                backoff.snooze();
                continue;
            }

            if self
                .head
                .compare_exchange_weak(
                    head,
                    head.successor(next.index()),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                // SAFETY: winning the head CAS onto `next` grants its value hold;
                // the node cannot return to the pool before we drop it below.
                let value = unsafe { self.pool.node(next.index()).take_value() };

                self.pool.drop_hold(next.index());
                self.pool.drop_hold(head.index());
                self.len.fetch_sub(1, Ordering::Release);

                return Some(value);
            }

            backoff.snooze();
        }
    }

    /// Approximate number of elements.
    ///
    /// May be transiently off under concurrent mutation; exact once all
    /// operations have completed.
    ///
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of values the queue can hold before enqueue starts evicting.
    pub fn capacity(&self) -> usize {
        self.pool.node_count() - 1
    }

    /// Approximate number of elements discarded by eviction so far.
    pub fn evicted(&self) -> usize {
        self.evicted.load(Ordering::Acquire)
    }

    /// Dequeue (and drop) every element, then reset the length counter.
    pub fn clear(&self) {
        while self.dequeue().is_some() {}
        self.len.store(0, Ordering::Release);

        debug!(evicted = self.evicted(), "cleared lock-free queue");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn push(&self, value: T, policy: OverflowPolicy) -> Result<(), T> {
        let Some(index) = self.pool.acquire(policy, || self.evict_oldest()) else {
            return Err(value);
        };

        let node = self.pool.node(index);

        // SAFETY: the node was just popped off the free stack, so this thread
        // owns it exclusively and its slot is empty.
        unsafe { node.write_value(value) };
        node.reset(LINKED_HOLDS);

        self.link(index);
        Ok(())
    }

    /// Link an owned, initialized node after the current last node.
    fn link(&self, index: u32) {
        let mut backoff = Backoff::new(self.pool.backoff());

        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let tail_node = self.pool.node(tail.index());
            let next = tail_node.next().load(Ordering::Acquire);

            if tail != self.tail.load(Ordering::Acquire) {
                backoff.snooze();
                continue;
            }

            if !next.is_nil() {
                // Another producer linked a node but has not advanced tail yet.
                let _ = self.tail.compare_exchange_weak(
                    tail,
                    tail.successor(next.index()),
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                backoff.snooze();
                continue;
            }

            if tail_node
                .next()
                .compare_exchange_weak(
                    next,
                    next.successor(index),
                    Ordering::Release,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                // Best effort: a failure means someone already helped.
                let _ = self.tail.compare_exchange(
                    tail,
                    tail.successor(index),
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                self.len.fetch_add(1, Ordering::Release);
                return;
            }

            backoff.snooze();
        }
    }

    fn evict_oldest(&self) -> bool {
        match self.dequeue() {
            Some(value) => {
                drop(value);
                self.evicted.fetch_add(1, Ordering::AcqRel);

                trace!(
                    evicted = self.evicted(),
                    "pool exhausted, evicted oldest element"
                );
                true
            }
            None => false,
        }
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // Drops every residual value and returns its node to the pool.
        self.clear();
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("evicted", &self.evicted())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .finish()
    }
}
