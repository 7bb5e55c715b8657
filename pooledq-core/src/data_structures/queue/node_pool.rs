use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_utils::CachePadded;

use crate::data_structures::internal::tagged_index::{AtomicTaggedIndex, NIL_INDEX, TaggedIndex};
use crate::data_structures::queue::OverflowPolicy;
use crate::preemptive_synchronization::{Backoff, BackoffConfig};

/// Holds on a node that was linked by an enqueue: one for its value (dropped
/// by the dequeuer that moves the value out) and one for its place in the
/// list (dropped by the dequeuer that later moves head past it).
pub(crate) const LINKED_HOLDS: u8 = 2;

/// The sentinel has no value, only its place in the list.
pub(crate) const SENTINEL_HOLDS: u8 = 1;

///
/// Fixed arena of queue nodes with a Treiber free stack over tagged indices.
///
// =============================================================================
// NODE LIFECYCLE
// =============================================================================
//
//            acquire (pop)                 enqueue (link CAS)
//   ┌──────┐ ────────────► ┌───────────┐ ──────────────────► ┌────────┐
//   │ FREE │               │ IN-FLIGHT │                     │ LINKED │
//   └──────┘ ◄──────────── └───────────┘ ◄────────────────── └────────┘
//            release (push)   holds == 0    dequeue (head CAS,
//                                           drop holds)
//
// The `next` word of a node doubles as the free-stack link while the node is
// FREE and as the queue link while it is LINKED. Every write bumps its tag.
//
// Free stack (LIFO):
//
//   free_top ──► [3] ──► [2] ──► [1] ──► [0] ──► nil
//
// Pop:   CAS free_top from (3, t) to (2, t+1)
// Push:  node.next = top; CAS free_top from (top, t) to (node, t+1)
//
// =============================================================================
//
pub(crate) struct NodePool<T> {
    nodes: Box<[PoolNode<T>]>,
    free_top: CachePadded<AtomicTaggedIndex>,
    backoff: BackoffConfig,
}

pub(crate) struct PoolNode<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    next: AtomicTaggedIndex,
    holds: AtomicU8,
}

// Safety: a value slot is only written by the thread that popped the node off
// the free stack and only read by the thread that won the head CAS onto it.
// Both hand-offs go through Release/Acquire atomics.
unsafe impl<T: Send> Send for NodePool<T> {}
unsafe impl<T: Send> Sync for NodePool<T> {}

impl<T> PoolNode<T> {
    fn new() -> Self {
        PoolNode {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            next: AtomicTaggedIndex::new(TaggedIndex::nil(0)),
            holds: AtomicU8::new(0),
        }
    }

    #[inline]
    pub(crate) fn next(&self) -> &AtomicTaggedIndex {
        &self.next
    }

    /// Prepare an acquired node for linking: clear its link and set its holds.
    #[inline]
    pub(crate) fn reset(&self, holds: u8) {
        self.next.relink(NIL_INDEX);
        self.holds.store(holds, Ordering::Relaxed);
    }

    /// Store a value into the node.
    ///
    /// # Safety
    /// - The caller must own the node exclusively (acquired, not yet linked)
    /// - The slot must not hold a live value
    #[inline]
    pub(crate) unsafe fn write_value(&self, value: T) {
        unsafe { (*self.value.get()).write(value) };
    }

    /// Move the value out of the node.
    ///
    /// # Safety
    /// - The caller must hold the node's value hold (won the head CAS onto it)
    /// - The slot must hold a live value, and is uninitialized afterwards
    #[inline]
    pub(crate) unsafe fn take_value(&self) -> T {
        unsafe { (*self.value.get()).assume_init_read() }
    }
}

impl<T> NodePool<T> {
    /// Carve `node_count` nodes and push all of them onto the free stack.
    pub(crate) fn new(node_count: usize, backoff: BackoffConfig) -> Self {
        let nodes: Box<[PoolNode<T>]> = (0..node_count).map(|_| PoolNode::new()).collect();

        let pool = NodePool {
            nodes,
            free_top: CachePadded::new(AtomicTaggedIndex::new(TaggedIndex::nil(0))),
            backoff,
        };

        for index in 0..node_count {
            pool.release(index as u32);
        }

        pool
    }

    #[inline]
    pub(crate) fn node(&self, index: u32) -> &PoolNode<T> {
        &self.nodes[index as usize]
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    // =========================================================================
    // Free stack
    // =========================================================================

    /// Pop a node off the free stack; `None` when the stack was observed empty.
    pub(crate) fn pop_free(&self) -> Option<u32> {
        let mut backoff = Backoff::new(&self.backoff);
        let mut top = self.free_top.load(Ordering::Acquire);

        while !top.is_nil() {
            // The node may be popped and relinked by another thread right
            // after this load; the tag on free_top makes the CAS below fail
            // in that case.
            let next = self.node(top.index()).next.load(Ordering::Acquire);

            match self.free_top.compare_exchange_weak(
                top,
                top.successor(next.index()),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top.index()),
                Err(actual) => {
                    backoff.snooze();
                    top = actual;
                }
            }
        }

        None
    }

    /// Push a node back onto the free stack.
    pub(crate) fn release(&self, index: u32) {
        let node = self.node(index);
        let mut backoff = Backoff::new(&self.backoff);
        let mut top = self.free_top.load(Ordering::Acquire);

        loop {
            node.next.relink(top.index());

            match self.free_top.compare_exchange_weak(
                top,
                top.successor(index),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    backoff.snooze();
                    top = actual;
                }
            }
        }
    }

    /// Give up one hold on a node; the last hold returns it to the free stack.
    pub(crate) fn drop_hold(&self, index: u32) {
        if self.node(index).holds.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.release(index);
        }
    }

    // =========================================================================
    // Acquire
    // =========================================================================

    /// Obtain an unused node, applying `policy` when the free stack is empty.
    ///
    /// `evict_oldest` must discard one element from the queue (recycling its
    /// node) and report whether it found one. Returns `None` only under
    /// [`OverflowPolicy::Reject`].
    ///
    pub(crate) fn acquire<F>(&self, policy: OverflowPolicy, mut evict_oldest: F) -> Option<u32>
    where
        F: FnMut() -> bool,
    {
        let mut backoff = Backoff::new(&self.backoff);

        loop {
            if let Some(index) = self.pop_free() {
                return Some(index);
            }

            match policy {
                OverflowPolicy::Reject => return None,
                OverflowPolicy::EvictOldest => {
                    if !evict_oldest() {
                        // Queue and free stack both look empty: the nodes are
                        // in flight between producers and consumers.
                        backoff.snooze();
                    }
                }
            }
        }
    }
}
