pub mod common_tests;
pub mod data_structures;
pub mod error;
pub mod preemptive_synchronization;
pub mod trace;

pub use data_structures::{DEFAULT_CAPACITY, LockFreeQueue, OverflowPolicy, QueueCreateOptions};
pub use error::QueueError;
pub use preemptive_synchronization::{Backoff, BackoffConfig, BackoffPhase};

/*
Queue:
 - [x] Tagged indices for head/tail/free-list/next
 - [x] Hold counting before a node returns to the free-list
 - [x] Reject-on-full alternative to eviction
 - [ ] Batch enqueue that links a pre-built chain with one tail CAS
*/
