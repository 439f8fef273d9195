//! Fixed-window message rate limit, one per connection.

use std::time::Duration;

use tokio::time::Instant;

/// Counts messages in fixed windows.
///
/// The window restarts at the first message after it elapses, so a burst
/// is judged against the window it started, not a sliding one.
#[derive(Debug)]
pub struct WindowRateLimiter {
    window: Duration,
    max: u32,
    window_start: Instant,
    count: u32,
}

impl WindowRateLimiter {
    pub fn new(window: Duration, max: u32, now: Instant) -> Self {
        Self {
            window,
            max,
            window_start: now,
            count: 0,
        }
    }

    /// Records one message at `now`. Returns `false` once the window's
    /// allowance is used up.
    pub fn allow(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) > self.window {
            self.window_start = now;
            self.count = 0;
        }
        self.count = self.count.saturating_add(1);
        self.count <= self.max
    }
}
