//! Wall-clock source in the study's reference timezone
//!
//! Every gate evaluation and submission reads the clock afresh; nothing
//! captures "now" at startup.

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Supplies the current instant in the reference timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;

    /// Calendar date in the reference timezone
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Reads the system clock and converts into the configured zone.
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

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    tz: Tz,
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self {
            tz: instant.timezone(),
            instant: Mutex::new(instant.with_timezone(&Utc)),
        }
    }

    /// Noon local time on `date`
    pub fn on_date(tz: Tz, date: NaiveDate) -> Self {
        Self::new(local_noon(tz, date))
    }

    pub fn set(&self, instant: DateTime<Tz>) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard = instant.with_timezone(&Utc);
        }
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(local_noon(self.tz, date));
    }

    pub fn advance_days(&self, days: i64) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard += Duration::days(days);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        let instant = match self.instant.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        instant.with_timezone(&self.tz)
    }
}

fn local_noon(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
