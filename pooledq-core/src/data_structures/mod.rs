//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`queue`] - Bounded lock-free MPMC queue over a preallocated node pool
//! - `internal` - Internal implementation details (pub(crate))

pub(crate) mod internal;
pub mod queue;

pub use queue::{DEFAULT_CAPACITY, LockFreeQueue, OverflowPolicy, QueueCreateOptions};
