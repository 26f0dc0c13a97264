//! Per-request time source.
//!
//! The handler reads the clock exactly once per request and passes the value
//! down, so every entity in one request steps against the same `now`.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs_f64()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: f64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += seconds;
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01 as a sanity floor.
        assert!(SystemClock.now() > 1_577_836_800.0);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100.0);
        assert_eq!(clock.now(), 100.0);
        clock.advance(0.25);
        assert_eq!(clock.now(), 100.25);
        clock.set(5.0);
        assert_eq!(clock.now(), 5.0);
    }
}
