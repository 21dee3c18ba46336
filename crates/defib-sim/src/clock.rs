//! Virtual clock for deterministic sessions.
//!
//! Device and scenario timers never read wall time. A session only moves
//! forward when its driver advances the clock, which makes charge ramps,
//! synchronized shocks and step timeouts reproducible in tests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Virtual millisecond clock. Monotonic: it never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    now_ms: u64,
}

impl SimClock {
    /// Create a clock at time zero
    #[must_use]
    pub const fn new() -> Self {
        Self { now_ms: 0 }
    }

    /// Create a clock at a fixed time
    #[must_use]
    pub const fn starting_at(time_ms: u64) -> Self {
        Self { now_ms: time_ms }
    }

    /// Current virtual time in milliseconds
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Current virtual time as a Duration since session start
    #[must_use]
    pub const fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms)
    }

    /// Fast-forward by a number of milliseconds
    pub fn advance_by(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }

    /// Move to an absolute time. Earlier times are ignored.
    ///
    /// Returns how far the clock actually moved.
    pub fn advance_to(&mut self, time_ms: u64) -> u64 {
        let delta = time_ms.saturating_sub(self.now_ms);
        self.now_ms += delta;
        delta
    }

    /// Milliseconds elapsed since an earlier instant
    #[must_use]
    pub const fn elapsed_since(&self, earlier_ms: u64) -> u64 {
        self.now_ms.saturating_sub(earlier_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h0_clock_01_new_starts_at_zero() {
        let clock = SimClock::new();
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn h0_clock_02_advance_by() {
        let mut clock = SimClock::starting_at(1000);
        clock.advance_by(250);
        assert_eq!(clock.now_ms(), 1250);
    }

    #[test]
    fn h0_clock_03_advance_to_is_monotonic() {
        let mut clock = SimClock::starting_at(5000);
        assert_eq!(clock.advance_to(4000), 0);
        assert_eq!(clock.now_ms(), 5000);
        assert_eq!(clock.advance_to(5300), 300);
        assert_eq!(clock.now_ms(), 5300);
    }

    #[test]
    fn h0_clock_04_elapsed_since() {
        let clock = SimClock::starting_at(900);
        assert_eq!(clock.elapsed_since(400), 500);
        assert_eq!(clock.elapsed_since(1200), 0);
    }

    #[test]
    fn h0_clock_05_saturates() {
        let mut clock = SimClock::starting_at(u64::MAX - 1);
        clock.advance_by(10);
        assert_eq!(clock.now_ms(), u64::MAX);
    }
}
