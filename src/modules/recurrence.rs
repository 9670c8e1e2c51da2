//! Recurrence math - turns a weekly schedule into concrete fire instants
//!
//! Everything here is pure: callers pass in "now" and the timezone, nothing
//! touches the platform.

use crate::error::{Result, SchedulerError};
use crate::time_utils::{parse_days, parse_time, DaySet, TimeOfDay};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds subtracted from fire instants to absorb platform wake-up latency
pub const DEFAULT_LEAD_TIME_SECS: i64 = 10;

/// Largest accepted lead time; anything longer would fire a window noticeably early
pub const MAX_LEAD_TIME_SECS: i64 = 3600;

/// How far back from a fire time we look when matching it to its occurrence
const OCCURRENCE_SEARCH_HOURS: i64 = 84;

/// Which window boundary a timer represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Enable,
    Disable,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Enable => "enable",
            Edge::Disable => "disable",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which edges get the lead-time adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadPolicy {
    /// Only the enable edge fires early
    #[default]
    EnableOnly,
    /// Both edges fire early (older scheduler behaviour)
    BothEdges,
}

/// Negative offset applied to fire instants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadTime {
    pub amount: Duration,
    pub policy: LeadPolicy,
}

impl Default for LeadTime {
    fn default() -> Self {
        Self {
            amount: Duration::seconds(DEFAULT_LEAD_TIME_SECS),
            policy: LeadPolicy::EnableOnly,
        }
    }
}

impl LeadTime {
    /// Lead of `seconds`, which must lie in `0..=MAX_LEAD_TIME_SECS`
    pub fn new(seconds: i64, policy: LeadPolicy) -> Result<Self> {
        if !(0..=MAX_LEAD_TIME_SECS).contains(&seconds) {
            return Err(SchedulerError::invalid(format!(
                "lead time must be between 0 and {} seconds, got {}",
                MAX_LEAD_TIME_SECS, seconds
            )));
        }
        let amount = Duration::try_seconds(seconds)
            .ok_or_else(|| SchedulerError::invalid(format!("lead time {}s is out of range", seconds)))?;
        Ok(Self { amount, policy })
    }

    /// No adjustment at all
    pub fn none() -> Self {
        Self {
            amount: Duration::zero(),
            policy: LeadPolicy::EnableOnly,
        }
    }

    pub fn apply(&self, edge: Edge, at: DateTime<Utc>) -> DateTime<Utc> {
        match (edge, self.policy) {
            (Edge::Enable, _) | (Edge::Disable, LeadPolicy::BothEdges) => at - self.amount,
            (Edge::Disable, LeadPolicy::EnableOnly) => at,
        }
    }
}

/// A validated weekly schedule: one window per selected weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRequest {
    start: TimeOfDay,
    end: TimeOfDay,
    days: DaySet,
}

impl ScheduleRequest {
    pub fn new(start: TimeOfDay, end: TimeOfDay, days: DaySet) -> Result<Self> {
        if days.is_empty() {
            return Err(SchedulerError::invalid("at least one day must be selected"));
        }
        if start == end {
            return Err(SchedulerError::invalid(format!(
                "start and end are both {}; the window would be empty",
                start
            )));
        }
        Ok(Self { start, end, days })
    }

    /// Build a request from the persisted text forms
    pub fn parse<I, S>(start: &str, end: &str, days: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(parse_time(start)?, parse_time(end)?, parse_days(days)?)
    }

    pub fn start(&self) -> TimeOfDay {
        self.start
    }

    pub fn end(&self) -> TimeOfDay {
        self.end
    }

    pub fn days(&self) -> DaySet {
        self.days
    }

    /// End before start means the window crosses midnight
    pub fn is_overnight(&self) -> bool {
        self.end < self.start
    }

    /// Whether a time of day falls inside the window, inclusive at both ends
    pub fn contains(&self, time: TimeOfDay) -> bool {
        if self.is_overnight() {
            time >= self.start || time <= self.end
        } else {
            self.start <= time && time <= self.end
        }
    }
}

/// The enable/disable pair for one weekday, as absolute instants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpan {
    pub weekday: Weekday,
    pub enable_at: DateTime<Utc>,
    pub disable_at: DateTime<Utc>,
}

/// Resolve a local wall-clock reading to an instant.
///
/// Ambiguous readings (DST fall-back) take the earlier instant. Readings in a
/// DST gap move forward one hour.
pub fn resolve_local(tz: &Tz, date: NaiveDate, time: TimeOfDay) -> DateTime<Utc> {
    let naive = date.and_time(time.to_naive());
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Nominal (no lead) enable and disable instants for the window opening on `date`
fn nominal_window(request: &ScheduleRequest, date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let enable = resolve_local(tz, date, request.start);
    let end_date = if request.is_overnight() {
        date + Duration::days(1)
    } else {
        date
    };
    let mut disable = resolve_local(tz, end_date, request.end);
    // DST resolution can still fold the end onto or before the start
    while disable <= enable {
        disable += Duration::days(1);
    }
    (enable, disable)
}

/// The window opening on a specific local date, with lead time applied
pub fn window_for_date(request: &ScheduleRequest, date: NaiveDate, tz: &Tz, lead: LeadTime) -> WindowSpan {
    let (enable, disable) = nominal_window(request, date, tz);
    WindowSpan {
        weekday: date.weekday(),
        enable_at: lead.apply(Edge::Enable, enable),
        disable_at: lead.apply(Edge::Disable, disable),
    }
}

/// Local date of the next start of `weekday` strictly after `now`.
///
/// Starts from that weekday in the current Monday-based week and jumps exactly
/// one week if it is already at or before `now`.
pub fn next_occurrence_date(request: &ScheduleRequest, weekday: Weekday, now: &DateTime<Tz>) -> NaiveDate {
    let tz = now.timezone();
    let today = now.date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let date = monday + Duration::days(i64::from(weekday.num_days_from_monday()));

    if resolve_local(&tz, date, request.start) <= now.with_timezone(&Utc) {
        date + Duration::days(7)
    } else {
        date
    }
}

/// Next window for `weekday` whose start is still in the future
pub fn next_window(request: &ScheduleRequest, weekday: Weekday, now: &DateTime<Tz>, lead: LeadTime) -> WindowSpan {
    let date = next_occurrence_date(request, weekday, now);
    window_for_date(request, date, &now.timezone(), lead)
}

/// Local date of the `weekday` start closest to `now`.
///
/// Used when an enable timer fires: the timer may arrive a little early
/// (lead time) or late (platform delay), and either way we need the
/// occurrence it belongs to.
pub fn nearest_occurrence(request: &ScheduleRequest, weekday: Weekday, now: &DateTime<Tz>) -> NaiveDate {
    let probe = *now - Duration::hours(OCCURRENCE_SEARCH_HOURS);
    next_occurrence_date(request, weekday, &probe)
}

/// The window containing `now`, if any: the weekday that owns it and its
/// disable instant (no lead).
///
/// Today's window counts when today is selected and the time of day is
/// inside it. Failing that, the early-morning tail of yesterday's overnight
/// window counts too.
pub fn current_window(request: &ScheduleRequest, now: &DateTime<Tz>) -> Option<(Weekday, DateTime<Utc>)> {
    let tz = now.timezone();
    let today = now.date_naive();
    let time = TimeOfDay::of(now);

    if request.days.contains(today.weekday()) && request.contains(time) {
        let end_date = if request.is_overnight() && time >= request.start {
            today + Duration::days(1)
        } else {
            today
        };
        return Some((today.weekday(), resolve_local(&tz, end_date, request.end)));
    }

    let yesterday = today.pred_opt()?;
    if request.is_overnight() && request.days.contains(yesterday.weekday()) && time <= request.end {
        return Some((yesterday.weekday(), resolve_local(&tz, today, request.end)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn local(tz: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn request(start: &str, end: &str, days: &[&str]) -> ScheduleRequest {
        ScheduleRequest::parse(start, end, days).unwrap()
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(
            ScheduleRequest::parse("09:00 AM", "05:00 PM", Vec::<&str>::new()),
            Err(SchedulerError::InvalidInput(_))
        ));
        assert!(ScheduleRequest::parse("09:00 AM", "09:00 AM", ["Mon"]).is_err());
        assert!(ScheduleRequest::parse("09:00 AM", "05:00 PM", ["Mon", "Someday"]).is_err());
        assert!(ScheduleRequest::parse("25:00 AM", "05:00 PM", ["Mon"]).is_err());
    }

    #[test]
    fn test_contains() {
        let day = request("09:00 AM", "05:00 PM", &["Mon"]);
        assert!(day.contains(TimeOfDay::new(9, 0).unwrap()));
        assert!(day.contains(TimeOfDay::new(17, 0).unwrap()));
        assert!(!day.contains(TimeOfDay::new(8, 59).unwrap()));
        assert!(!day.contains(TimeOfDay::new(20, 0).unwrap()));

        let night = request("10:00 PM", "07:00 AM", &["Mon"]);
        assert!(night.is_overnight());
        assert!(night.contains(TimeOfDay::new(23, 0).unwrap()));
        assert!(night.contains(TimeOfDay::new(2, 0).unwrap()));
        assert!(night.contains(TimeOfDay::new(7, 0).unwrap()));
        assert!(!night.contains(TimeOfDay::new(12, 0).unwrap()));
    }

    #[test]
    fn test_same_day_span_length() {
        // 2024-01-01 is a Monday
        let now = local(Tz::UTC, 2024, 1, 1, 6, 0);
        for (start, end, minutes) in [
            ("09:00 AM", "05:00 PM", 480),
            ("12:00 AM", "11:59 PM", 1439),
            ("01:15 PM", "01:45 PM", 30),
        ] {
            let req = request(start, end, &["Tue"]);
            let span = next_window(&req, Weekday::Tue, &now, LeadTime::none());
            assert_eq!(span.disable_at - span.enable_at, Duration::minutes(minutes));

            let led = next_window(&req, Weekday::Tue, &now, LeadTime::default());
            assert_eq!(
                led.disable_at - led.enable_at,
                Duration::minutes(minutes) + Duration::seconds(DEFAULT_LEAD_TIME_SECS)
            );
        }
    }

    #[test]
    fn test_overnight_disable_is_next_day() {
        let now = local(Tz::UTC, 2024, 1, 1, 6, 0);
        let req = request("10:00 PM", "07:00 AM", &["Fri"]);
        let span = next_window(&req, Weekday::Fri, &now, LeadTime::none());

        assert_eq!(span.enable_at, utc(2024, 1, 5, 22, 0));
        // same-day computation would be Fri 07:00; overnight pushes it a day
        assert_eq!(span.disable_at, utc(2024, 1, 5, 7, 0) + Duration::days(1));
        assert!(span.disable_at > span.enable_at);
    }

    #[test]
    fn test_past_window_rolls_a_week() {
        // Wednesday 20:00, window already over for today
        let now = local(Tz::UTC, 2024, 1, 3, 20, 0);
        let req = request("09:00 AM", "05:00 PM", &["Wed"]);
        let span = next_window(&req, Weekday::Wed, &now, LeadTime::default());

        assert_eq!(span.enable_at, utc(2024, 1, 10, 9, 0) - Duration::seconds(10));
        assert_eq!(span.disable_at, utc(2024, 1, 10, 17, 0));
        assert_eq!(current_window(&req, &now), None);
    }

    #[test]
    fn test_start_exactly_now_rolls_a_week() {
        let now = local(Tz::UTC, 2024, 1, 3, 9, 0);
        let req = request("09:00 AM", "05:00 PM", &["Wed"]);
        let date = next_occurrence_date(&req, Weekday::Wed, &now);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn test_next_occurrence_stays_within_a_week() {
        let req = request("09:00 AM", "05:00 PM", &["Mon", "Sun"]);

        // Monday morning: Sunday is later this week
        let monday = local(Tz::UTC, 2024, 1, 1, 6, 0);
        assert_eq!(
            next_occurrence_date(&req, Weekday::Sun, &monday),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );

        // Sunday night: Monday is tomorrow
        let sunday = local(Tz::UTC, 2024, 1, 7, 22, 0);
        assert_eq!(
            next_occurrence_date(&req, Weekday::Mon, &sunday),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_current_window_overnight() {
        let req = request("10:00 PM", "07:00 AM", &["Mon"]);

        // Monday 23:00: ends Tuesday morning
        let late = local(Tz::UTC, 2024, 1, 1, 23, 0);
        assert_eq!(current_window(&req, &late), Some((Weekday::Mon, utc(2024, 1, 2, 7, 0))));

        // Monday 02:00: inside the early-morning part, ends today
        let early = local(Tz::UTC, 2024, 1, 1, 2, 0);
        assert_eq!(current_window(&req, &early), Some((Weekday::Mon, utc(2024, 1, 1, 7, 0))));

        // Tuesday 02:00: the tail of Monday night
        let tail = local(Tz::UTC, 2024, 1, 2, 2, 0);
        assert_eq!(current_window(&req, &tail), Some((Weekday::Mon, utc(2024, 1, 2, 7, 0))));

        // Tuesday 12:00: nothing
        let noon = local(Tz::UTC, 2024, 1, 2, 12, 0);
        assert_eq!(current_window(&req, &noon), None);
    }

    #[test]
    fn test_current_window_same_day() {
        let req = request("09:00 AM", "05:00 PM", &["Wed"]);
        let inside = local(Tz::UTC, 2024, 1, 3, 12, 0);
        assert_eq!(current_window(&req, &inside), Some((Weekday::Wed, utc(2024, 1, 3, 17, 0))));

        let other_day = local(Tz::UTC, 2024, 1, 4, 12, 0);
        assert_eq!(current_window(&req, &other_day), None);
    }

    #[test]
    fn test_lead_policy() {
        let at = utc(2024, 1, 1, 9, 0);
        let enable_only = LeadTime::default();
        assert_eq!(enable_only.apply(Edge::Enable, at), at - Duration::seconds(10));
        assert_eq!(enable_only.apply(Edge::Disable, at), at);

        let both = LeadTime::new(10, LeadPolicy::BothEdges).unwrap();
        assert_eq!(both.apply(Edge::Disable, at), at - Duration::seconds(10));
    }

    #[test]
    fn test_lead_time_bounds() {
        assert_eq!(LeadTime::new(0, LeadPolicy::EnableOnly).unwrap(), LeadTime::none());
        assert!(LeadTime::new(MAX_LEAD_TIME_SECS, LeadPolicy::EnableOnly).is_ok());
        assert!(matches!(
            LeadTime::new(-5, LeadPolicy::EnableOnly),
            Err(SchedulerError::InvalidInput(_))
        ));
        assert!(LeadTime::new(MAX_LEAD_TIME_SECS + 1, LeadPolicy::BothEdges).is_err());
        assert!(LeadTime::new(i64::MAX, LeadPolicy::EnableOnly).is_err());
    }

    #[test]
    fn test_nearest_occurrence_tolerates_early_and_late_fires() {
        let req = request("10:00 PM", "07:00 AM", &["Mon"]);
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let early = Tz::UTC.from_utc_datetime(&(utc(2024, 1, 1, 22, 0) - Duration::seconds(10)).naive_utc());
        assert_eq!(nearest_occurrence(&req, Weekday::Mon, &early), monday);

        let late = local(Tz::UTC, 2024, 1, 2, 20, 0);
        assert_eq!(nearest_occurrence(&req, Weekday::Mon, &late), monday);
    }

    #[test]
    fn test_dst_gap_keeps_disable_after_enable() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2024-03-10 02:00-03:00 does not exist in New York
        let req = request("02:30 AM", "03:10 AM", &["Sun"]);
        let now = local(tz, 2024, 3, 9, 12, 0);
        let span = next_window(&req, Weekday::Sun, &now, LeadTime::none());

        assert_eq!(span.enable_at, utc(2024, 3, 10, 7, 30));
        assert!(span.disable_at > span.enable_at);
    }

    #[test]
    fn test_timezone_offsets_apply() {
        let tz: Tz = "Asia/Kolkata".parse().unwrap();
        let req = request("09:00 AM", "05:00 PM", &["Tue"]);
        let now = local(tz, 2024, 1, 1, 12, 0);
        let span = next_window(&req, Weekday::Tue, &now, LeadTime::none());
        // 09:00 IST is 03:30 UTC
        assert_eq!(span.enable_at, utc(2024, 1, 2, 3, 30));
    }
}
