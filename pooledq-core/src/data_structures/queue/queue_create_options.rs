use crate::data_structures::internal::tagged_index::MAX_NODES;
use crate::error::QueueError;
use crate::preemptive_synchronization::BackoffConfig;

/// Capacity used by [`QueueCreateOptions::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

// A pool of one node would be all sentinel and no payload.
//
const MIN_NODES: usize = 2;

/// Construction parameters for a [`LockFreeQueue`](super::LockFreeQueue).
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCreateOptions {
    capacity: usize,
    backoff: BackoffConfig,
}

impl QueueCreateOptions {
    /// Options for a queue whose pool holds at least `capacity` nodes.
    ///
    /// The pool size is rounded up to the next power of two; one node is
    /// reserved as the sentinel.
    ///
    pub fn new(capacity: usize) -> Self {
        QueueCreateOptions {
            capacity,
            backoff: BackoffConfig::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// The requested capacity hint.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Validates the options and computes the pool size.
    pub(crate) fn node_count(&self) -> Result<usize, QueueError> {
        self.backoff.validate()?;

        if self.capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        let node_count = self
            .capacity
            .checked_next_power_of_two()
            .filter(|count| *count <= MAX_NODES)
            .ok_or(QueueError::CapacityOverflow {
                requested: self.capacity,
            })?;

        Ok(node_count.max(MIN_NODES))
    }
}

impl Default for QueueCreateOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_count_rounding() {
        assert_eq!(QueueCreateOptions::new(1).node_count(), Ok(2));
        assert_eq!(QueueCreateOptions::new(2).node_count(), Ok(2));
        assert_eq!(QueueCreateOptions::new(3).node_count(), Ok(4));
        assert_eq!(QueueCreateOptions::new(4).node_count(), Ok(4));
        assert_eq!(QueueCreateOptions::new(1000).node_count(), Ok(1024));
        assert_eq!(QueueCreateOptions::default().node_count(), Ok(1024));
    }

    #[test]
    fn test_degenerate_capacities() {
        assert_eq!(
            QueueCreateOptions::new(0).node_count(),
            Err(QueueError::ZeroCapacity)
        );
        assert_eq!(
            QueueCreateOptions::new(usize::MAX).node_count(),
            Err(QueueError::CapacityOverflow {
                requested: usize::MAX
            })
        );
        assert_eq!(
            QueueCreateOptions::new(MAX_NODES + 1).node_count(),
            Err(QueueError::CapacityOverflow {
                requested: MAX_NODES + 1
            })
        );
    }

    #[test]
    fn test_invalid_backoff_is_rejected() {
        let options = QueueCreateOptions::new(8)
            .with_backoff(BackoffConfig::new().with_yield_after(9).with_sleep_after(1));

        assert!(matches!(
            options.node_count(),
            Err(QueueError::InvalidBackoff(_))
        ));
    }
}
