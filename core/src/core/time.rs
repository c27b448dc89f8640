//! Logical clock for the consensus run.
//!
//! The protocol has no notion of wall-clock time: all scheduling is in
//! discrete, monotonically increasing ticks.

use serde::{Deserialize, Serialize};

/// Monotonic logical clock driving phase and tick advancement.
///
/// # Example
/// ```
/// use round_table_core_rs::core::time::Clock;
///
/// let mut clock = Clock::new();
/// assert_eq!(clock.current_tick(), 0);
///
/// clock.advance();
/// assert_eq!(clock.current_tick(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    current_tick: usize,
}

impl Clock {
    /// Create a new clock starting at tick 0.
    pub fn new() -> Self {
        Self { current_tick: 0 }
    }

    /// Create a clock resuming at a specific tick (checkpoint restore).
    pub fn at(tick: usize) -> Self {
        Self { current_tick: tick }
    }

    /// Advance the clock by one tick.
    pub fn advance(&mut self) {
        self.current_tick += 1;
    }

    /// Current tick number.
    pub fn current_tick(&self) -> usize {
        self.current_tick
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let clock = Clock::new();
        assert_eq!(clock.current_tick(), 0);
    }

    #[test]
    fn advances_monotonically() {
        let mut clock = Clock::new();
        for expected in 1..=10 {
            clock.advance();
            assert_eq!(clock.current_tick(), expected);
        }
    }

    #[test]
    fn resumes_at_checkpointed_tick() {
        let clock = Clock::at(42);
        assert_eq!(clock.current_tick(), 42);
    }
}
