//! Wall clock source

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};

/// Source of the current local time
pub trait Clock {
    fn now(&self) -> DateTime<Tz>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Tz> {
        (**self).now()
    }
}

/// System time viewed in a fixed timezone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Tz>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Tz>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Tz>) {
        *super::lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = super::lock(&self.now);
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        *super::lock(&self.now)
    }
}
