//! Bounded lock-free MPMC queue and its node pool.

pub(crate) mod node_pool;

pub mod lock_free_queue;
pub mod overflow_policy;
pub mod queue_create_options;

pub use lock_free_queue::LockFreeQueue;
pub use overflow_policy::OverflowPolicy;
pub use queue_create_options::{DEFAULT_CAPACITY, QueueCreateOptions};
