//! Simulated wall clock
//!
//! Bombs schedule their transitions against this clock, not real time, so a
//! paused or slowed simulation pauses them too.

use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct GameWallClock {
    elapsed: Duration,
}

impl GameWallClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time point
    #[inline]
    pub fn now(&self) -> Duration {
        self.elapsed
    }

    /// Advance by one step of `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += Duration::from_secs_f32(dt);
    }
}
