//! Serial rate limiting for external catalog services
//!
//! The pipeline makes one metadata call at a time per provider; this limiter
//! enforces the configured "N calls then sleep T seconds" budget.

use std::time::Duration;
use tracing::debug;

/// Counts calls and pauses after every `calls_before_pause` of them.
#[derive(Debug)]
pub struct RateLimiter {
    calls_before_pause: u32,
    pause: Duration,
    calls_made: u32,
}

impl RateLimiter {
    pub fn new(calls_before_pause: u32, pause: Duration) -> Self {
        Self {
            calls_before_pause,
            pause,
            calls_made: 0,
        }
    }

    /// Account for one external call, sleeping if the budget is spent.
    pub async fn tick(&mut self) {
        if self.calls_before_pause == 0 {
            return;
        }
        self.calls_made += 1;
        if self.calls_made >= self.calls_before_pause {
            debug!(
                calls = self.calls_made,
                pause_ms = self.pause.as_millis() as u64,
                "rate limit reached, pausing"
            );
            tokio::time::sleep(self.pause).await;
            self.calls_made = 0;
        }
    }
}
