//! Reconnect gate with a fixed cool-down.
//!
//! After a connection is lost (or never established), the next attempt is only allowed once
//! `cool_down` has passed since the previous attempt. There is no exponential growth and no
//! jitter: a dead server costs one connect attempt per cool-down, and batches that arrive in
//! between are dropped rather than queued.
//!
//! ```text
//! attempt ──► refused ─ refused ─ refused ──► attempt ──► ...
//!   t=0        t<1s                            t>=1s
//! ```

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ReconnectGate {
    cool_down: Duration,
    last_attempt: Option<Instant>,
}

impl ReconnectGate {
    pub fn new(cool_down: Duration) -> Self {
        Self {
            cool_down,
            last_attempt: None,
        }
    }

    /// Record an attempt if allowed, otherwise return the time left in the cool-down.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> Result<(), Duration> {
        if let Some(last) = self.last_attempt {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cool_down {
                return Err(self.cool_down - elapsed);
            }
        }
        self.last_attempt = Some(now);
        Ok(())
    }

    pub fn cool_down(&self) -> Duration {
        self.cool_down
    }
}

impl Default for ReconnectGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
