//! Clock and calendar helpers
//!
//! Times are persisted the way the settings screen shows them: "HH:MM AM/PM".
//! Weekdays are persisted as short names ("Mon".."Sun").

use crate::error::{Result, SchedulerError};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Short weekday names and their chrono counterparts, Monday first
const DAY_TABLE: [(&str, Weekday); 7] = [
    ("Mon", Weekday::Mon),
    ("Tue", Weekday::Tue),
    ("Wed", Weekday::Wed),
    ("Thu", Weekday::Thu),
    ("Fri", Weekday::Fri),
    ("Sat", Weekday::Sat),
    ("Sun", Weekday::Sun),
];

/// A wall-clock time of day at minute resolution.
///
/// Ordering is lexicographic on (hour, minute), which is what decides whether a
/// window runs overnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    /// Create a validated time of day (hour 0-23, minute 0-59)
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::invalid(format!(
                "time out of range: {}:{:02}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Truncate a clock reading to minute resolution
    pub fn of(time: &impl chrono::Timelike) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn to_naive(&self) -> chrono::NaiveTime {
        // hour and minute are validated on construction
        chrono::NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(chrono::NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_time(self.hour, self.minute))
    }
}

/// Parse a 12-hour "HH:MM AM/PM" string into a 24-hour time of day
pub fn parse_time(input: &str) -> Result<TimeOfDay> {
    let parts: Vec<&str> = input.trim().split([' ', ':']).collect();
    if parts.len() != 3 {
        return Err(SchedulerError::invalid(format!(
            "expected HH:MM AM/PM, got {:?}",
            input
        )));
    }

    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| SchedulerError::invalid(format!("invalid hour: {:?}", parts[0])))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| SchedulerError::invalid(format!("invalid minute: {:?}", parts[1])))?;

    if !(1..=12).contains(&hour) {
        return Err(SchedulerError::invalid(format!("hour must be 1-12: {}", hour)));
    }

    let hour_24 = if parts[2].eq_ignore_ascii_case("PM") {
        if hour == 12 { 12 } else { hour + 12 }
    } else if parts[2].eq_ignore_ascii_case("AM") {
        if hour == 12 { 0 } else { hour }
    } else {
        return Err(SchedulerError::invalid(format!("invalid period: {:?}", parts[2])));
    };

    TimeOfDay::new(hour_24, minute)
}

/// Format a 24-hour hour/minute pair as "HH:MM AM/PM"
pub fn format_time(hour: u32, minute: u32) -> String {
    let display_hour = if hour == 0 || hour == 12 { 12 } else { hour % 12 };
    let period = if hour >= 12 { "PM" } else { "AM" };
    format!("{:02}:{:02} {}", display_hour, minute, period)
}

/// Map a short weekday name ("Mon".."Sun") to a weekday
pub fn day_of_week(name: &str) -> Result<Weekday> {
    DAY_TABLE
        .iter()
        .find(|(short, _)| *short == name)
        .map(|(_, day)| *day)
        .ok_or_else(|| SchedulerError::invalid(format!("invalid day: {:?}", name)))
}

/// Map a weekday back to its short name
pub fn day_name(day: Weekday) -> &'static str {
    DAY_TABLE[day.num_days_from_monday() as usize].0
}

/// Parse a collection of short weekday names into a set
pub fn parse_days<I, S>(names: I) -> Result<DaySet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| day_of_week(name.as_ref()))
        .collect()
}

/// A set of weekdays, iterated Monday first.
///
/// chrono's `Weekday` is not `Ord`, so sets are kept as a bitmask over the
/// Monday-based ordinal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DaySet(u8);

impl DaySet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) -> bool {
        let bit = 1 << day.num_days_from_monday();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !(1 << day.num_days_from_monday());
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        DAY_TABLE
            .iter()
            .map(|(_, day)| *day)
            .filter(move |day| self.contains(*day))
    }

    /// Short names in Monday-first order
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|d| day_name(d).to_string()).collect()
    }
}

impl FromIterator<Weekday> for DaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = DaySet::new();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(", "))
    }
}
