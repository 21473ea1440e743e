//! Wall-clock abstraction so cache timing can be driven by tests.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    /// Starts at `secs` seconds after the Unix epoch.
    pub fn at_secs(secs: i64) -> Self {
        Self {
            now: parking_lot::Mutex::new(DateTime::from_timestamp(secs, 0).unwrap_or_default()),
        }
    }

    pub fn set_secs(&self, secs: i64) {
        *self.now.lock() = DateTime::from_timestamp(secs, 0).unwrap_or_default();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::at_secs(100);
        assert_eq!(clock.now().timestamp(), 100);
        assert_eq!(clock.now().timestamp(), 100);

        clock.set_secs(10);
        assert_eq!(clock.now().timestamp(), 10);
    }
}
