//! Time sources for checkpoints.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Mutex;

use crate::types::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock that only moves when told to, for replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    /// Clock starting at the given unix timestamp (seconds).
    pub fn at_unix(seconds: i64) -> Self {
        let start = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .unwrap_or_else(Utc::now);
        ManualClock::new(start)
    }

    pub fn set(&self, time: Timestamp) {
        if let Ok(mut now) = self.now.lock() {
            *now = time;
        }
    }

    /// Move forward by `seconds`. Steps beyond the representable range are ignored.
    pub fn advance(&self, seconds: u64) {
        let step = i64::try_from(seconds).ok().and_then(Duration::try_seconds);
        if let (Some(step), Ok(mut now)) = (step, self.now.lock()) {
            if let Some(next) = now.checked_add_signed(step) {
                *now = next;
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.lock().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_unix(1_700_000_000);
        clock.advance(60);
        assert_eq!(clock.now().timestamp(), 1_700_000_060);
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::at_unix(0);
        let later = Utc.timestamp_opt(86_400, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
