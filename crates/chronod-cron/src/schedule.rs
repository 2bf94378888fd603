use std::time::Duration as StdDuration;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike,
};

/// Forward search horizon for field schedules. A schedule with no match
/// within this window is considered unsatisfiable.
const SEARCH_HORIZON_DAYS: i64 = 366 * 5;

/// A parsed schedule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Five independent integer-set constraints (minute, hour, day-of-month,
    /// month, day-of-week).
    Field(FieldSchedule),
    /// Fixed duration between fires (`@every <duration>`), measured from
    /// registration rather than aligned to the calendar.
    Every(StdDuration),
}

/// Allowed-value bitmasks for the five cron fields. Bit `n` set means value
/// `n` is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchedule {
    pub(crate) minute: u64,
    pub(crate) hour: u32,
    pub(crate) dom: u32,
    pub(crate) month: u16,
    pub(crate) dow: u8,
    /// True when the day-of-month field was not `*`. Drives the classic
    /// cron OR rule for dom/dow.
    pub(crate) dom_restricted: bool,
    /// True when the day-of-week field was not `*`.
    pub(crate) dow_restricted: bool,
}

impl Schedule {
    /// Next fire time strictly after `after`, or `None` when the schedule
    /// cannot fire within the search horizon.
    ///
    /// Field schedules search the calendar field by field, coarsest first,
    /// resetting finer fields whenever a coarser one advances. Interval
    /// schedules simply add their duration.
    pub fn next_after<Tz: TimeZone>(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Schedule::Every(interval) => {
                let step = Duration::from_std(*interval).ok()?;
                after.checked_add_signed(step)
            }
            Schedule::Field(fields) => fields.next_after(after),
        }
    }
}

impl FieldSchedule {
    fn minute_matches(&self, minute: u32) -> bool {
        self.minute & (1 << minute) != 0
    }

    fn hour_matches(&self, hour: u32) -> bool {
        self.hour & (1 << hour) != 0
    }

    fn month_matches(&self, month: u32) -> bool {
        self.month & (1 << month) != 0
    }

    /// Day match combining day-of-month and day-of-week: OR when both are
    /// restricted, AND (i.e. the restricted one decides) otherwise.
    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.dom & (1 << date.day()) != 0;
        // cron counts weekdays from Sunday = 0.
        let dow = self.dow & (1 << date.weekday().num_days_from_sunday()) != 0;
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    fn next_after<Tz: TimeZone>(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        // Start at the next whole minute strictly after `after`.
        let mut t = after
            .naive_local()
            .with_second(0)?
            .with_nanosecond(0)?
            .checked_add_signed(Duration::minutes(1))?;
        let limit = t.checked_add_signed(Duration::days(SEARCH_HORIZON_DAYS))?;

        while t <= limit {
            if !self.month_matches(t.month()) {
                t = start_of_next_month(t)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hour_matches(t.hour()) {
                t = t.with_minute(0)?.checked_add_signed(Duration::hours(1))?;
                continue;
            }
            if !self.minute_matches(t.minute()) {
                t = t.checked_add_signed(Duration::minutes(1))?;
                continue;
            }
            // All fields match; map the wall-clock time back into the zone.
            match tz.from_local_datetime(&t) {
                LocalResult::Single(dt) => return Some(dt),
                LocalResult::Ambiguous(earlier, _) => return Some(earlier),
                // Inside a DST gap this wall-clock time does not exist;
                // keep searching from the next minute.
                LocalResult::None => {
                    t = t.checked_add_signed(Duration::minutes(1))?;
                }
            }
        }
        None
    }
}

fn start_of_next_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}
