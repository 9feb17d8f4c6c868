use std::thread;
use std::time::{Duration, Instant};

/// Spacing policy for outbound requests. Implementations block until the
/// next call is allowed to go out.
pub trait Throttle {
    fn wait(&mut self);
}

/// Guarantees no two calls happen closer together than `interval`.
pub struct FixedDelay {
    interval: Duration,
    last: Option<Instant>,
}

impl FixedDelay {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

impl Throttle for FixedDelay {
    fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// No spacing at all. Used by tests.
pub struct NoThrottle;

impl Throttle for NoThrottle {
    fn wait(&mut self) {}
}
