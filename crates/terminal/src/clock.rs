//! Time source and pacing for interaction scripts.
//!
//! Stages pace themselves with blocking sleeps; routing them through a [`Clock`]
//! lets tests run a full protocol on virtual time.

use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock with real `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_sleep_advances_now() {
        let clock = SystemClock;
        let before = clock.now();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.now().duration_since(before) >= Duration::from_millis(5));
    }
}
