// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

/// Time source for the gateway.
///
/// Deadlines use the monotonic `now()`; only the panel clock check and the
/// daily schedule look at local calendar time.
pub trait Clock: Send {
    fn now(&self) -> Instant;
    fn local_now(&self) -> NaiveDateTime;
}

/// The host's clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug)]
struct ManualState {
    base: Instant,
    elapsed: Duration,
    local: NaiveDateTime,
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(local: NaiveDateTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                base: Instant::now(),
                elapsed: Duration::ZERO,
                local,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut ManualState) -> R) -> R {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Move both clocks forward.
    pub fn advance(&self, by: Duration) {
        self.with(|s| {
            s.elapsed += by;
            s.local += by;
        });
    }

    /// Jump the calendar clock without touching the monotonic one.
    pub fn set_local(&self, local: NaiveDateTime) {
        self.with(|s| s.local = local);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.with(|s| s.base + s.elapsed)
    }

    fn local_now(&self) -> NaiveDateTime {
        self.with(|s| s.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let other = clock.clone();
        let t0 = other.now();

        clock.advance(Duration::from_millis(1500));

        assert_eq!(other.now() - t0, Duration::from_millis(1500));
        assert_eq!(other.local_now(), start + Duration::from_millis(1500));
    }
}
