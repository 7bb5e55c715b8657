use std::hint;
use std::thread;
use std::time::Duration;

use crate::error::QueueError;

// Upper bound on the spin exponent, keeps `1 << step` meaningful even for
// configurations that spin for many steps.
//
const MAX_SPIN_SHIFT: u32 = 16;

/// Tuning knobs for the retry policy used after a failed CAS.
///
/// The policy escalates through three phases:
///
/// ```text
/// step:   0 .. yield_after        -> spin 2^step iterations
///         yield_after .. sleep_after -> thread::yield_now()
///         sleep_after ..          -> sleep min_sleep * 2^(step - sleep_after),
///                                    capped at max_sleep
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// First step at which the backoff yields instead of spinning.
    pub yield_after: u32,
    /// First step at which the backoff sleeps instead of yielding.
    pub sleep_after: u32,
    /// Sleep duration of the first sleeping step.
    pub min_sleep: Duration,
    /// Ceiling for the exponential sleep.
    pub max_sleep: Duration,
}

impl BackoffConfig {
    pub const fn new() -> Self {
        BackoffConfig {
            yield_after: 4,
            sleep_after: 8,
            min_sleep: Duration::from_nanos(100),
            max_sleep: Duration::from_micros(100),
        }
    }

    /// A policy that never sleeps, for latency sensitive callers.
    pub const fn spin_then_yield() -> Self {
        BackoffConfig {
            yield_after: 4,
            sleep_after: u32::MAX,
            min_sleep: Duration::ZERO,
            max_sleep: Duration::ZERO,
        }
    }

    pub fn with_yield_after(mut self, yield_after: u32) -> Self {
        self.yield_after = yield_after;
        self
    }

    pub fn with_sleep_after(mut self, sleep_after: u32) -> Self {
        self.sleep_after = sleep_after;
        self
    }

    pub fn with_sleep_bounds(mut self, min_sleep: Duration, max_sleep: Duration) -> Self {
        self.min_sleep = min_sleep;
        self.max_sleep = max_sleep;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), QueueError> {
        if self.sleep_after < self.yield_after {
            return Err(QueueError::InvalidBackoff(
                "sleep_after must not be smaller than yield_after",
            ));
        }

        if self.min_sleep > self.max_sleep {
            return Err(QueueError::InvalidBackoff(
                "min_sleep must not exceed max_sleep",
            ));
        }

        Ok(())
    }

    /// The action taken at a given retry step.
    pub fn phase(&self, step: u32) -> BackoffPhase {
        if step < self.yield_after {
            BackoffPhase::Spin(1 << step.min(MAX_SPIN_SHIFT))
        } else if step < self.sleep_after {
            BackoffPhase::Yield
        } else {
            let level = step - self.sleep_after;
            let factor = 1u32.checked_shl(level).unwrap_or(u32::MAX);
            let sleep = self.min_sleep.saturating_mul(factor).min(self.max_sleep);

            BackoffPhase::Sleep(sleep)
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single [`Backoff::snooze`] call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPhase {
    /// Busy-wait for the given number of `spin_loop` hints.
    Spin(u32),
    /// Give the rest of the time slice back to the scheduler.
    Yield,
    /// Park the thread for the given duration.
    Sleep(Duration),
}

/// Per-operation retry state.
///
/// Create one at the start of a CAS loop and call [`snooze`](Backoff::snooze)
/// after every failed attempt.
///
pub struct Backoff<'a> {
    config: &'a BackoffConfig,
    step: u32,
}

impl<'a> Backoff<'a> {
    pub fn new(config: &'a BackoffConfig) -> Self {
        Backoff { config, step: 0 }
    }

    /// Number of snoozes performed so far.
    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Back off according to the current step, then escalate.
    pub fn snooze(&mut self) {
        match self.config.phase(self.step) {
            BackoffPhase::Spin(iterations) => {
                for _ in 0..iterations {
                    hint::spin_loop();
                }
            }
            BackoffPhase::Yield => thread::yield_now(),
            BackoffPhase::Sleep(duration) => thread::sleep(duration),
        }

        self.step = self.step.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phases() {
        let config = BackoffConfig::default();

        assert_eq!(config.phase(0), BackoffPhase::Spin(1));
        assert_eq!(config.phase(3), BackoffPhase::Spin(8));
        assert_eq!(config.phase(4), BackoffPhase::Yield);
        assert_eq!(config.phase(7), BackoffPhase::Yield);
        assert_eq!(config.phase(8), BackoffPhase::Sleep(Duration::from_nanos(100)));
        assert_eq!(config.phase(9), BackoffPhase::Sleep(Duration::from_nanos(200)));
        assert_eq!(config.phase(12), BackoffPhase::Sleep(Duration::from_nanos(1600)));
    }

    #[test]
    fn test_sleep_is_capped() {
        let config = BackoffConfig::default();

        // 100ns * 2^10 = 102.4us > 100us
        assert_eq!(config.phase(18), BackoffPhase::Sleep(Duration::from_micros(100)));
        assert_eq!(config.phase(u32::MAX), BackoffPhase::Sleep(Duration::from_micros(100)));
    }

    #[test]
    fn test_spin_then_yield_never_sleeps() {
        let config = BackoffConfig::spin_then_yield();

        assert_eq!(config.phase(1_000_000), BackoffPhase::Yield);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_spin_shift_is_bounded() {
        let config = BackoffConfig::new().with_yield_after(64).with_sleep_after(64);

        assert_eq!(config.phase(40), BackoffPhase::Spin(1 << 16));
    }

    #[test]
    fn test_validate() {
        assert!(BackoffConfig::default().validate().is_ok());

        let inverted = BackoffConfig::new().with_yield_after(10).with_sleep_after(2);
        assert!(matches!(
            inverted.validate(),
            Err(QueueError::InvalidBackoff(_))
        ));

        let bad_bounds = BackoffConfig::new()
            .with_sleep_bounds(Duration::from_millis(2), Duration::from_millis(1));
        assert!(matches!(
            bad_bounds.validate(),
            Err(QueueError::InvalidBackoff(_))
        ));
    }

    #[test]
    fn test_snooze_advances_step() {
        let config = BackoffConfig::default();
        let mut backoff = Backoff::new(&config);

        for _ in 0..10 {
            backoff.snooze();
        }
        assert_eq!(backoff.step(), 10);

        backoff.reset();
        assert_eq!(backoff.step(), 0);
    }
}
