//! Frame pacing for the map loop.

use std::time::{Duration, Instant};

/// Milliseconds per map frame.
pub const MAP_FRAME_TIME: u64 = 54;

/// Caps the update rate by sleeping out the remainder of each frame.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    last_tick: Instant,
}

impl Default for FrameLimiter {
    fn default() -> FrameLimiter {
        FrameLimiter {
            last_tick: Instant::now(),
        }
    }
}

impl FrameLimiter {
    pub fn new() -> FrameLimiter {
        Default::default()
    }

    /// Sleep until `frame_time` has elapsed since the previous tick.
    pub fn tick(&mut self, frame_time: Duration) {
        let elapsed = self.last_tick.elapsed();
        if let Some(delay) = frame_time.checked_sub(elapsed) {
            spin_sleep::sleep(delay);
        }
        self.last_tick = Instant::now();
    }
}
