//! Thread-level synchronization helpers shared by the data structures.

pub mod backoff;

pub use backoff::{Backoff, BackoffConfig, BackoffPhase};
