//! Calendar-accurate countdown to the wedding.
//!
//! Remaining time is split into whole calendar months, then whole days, then
//! whole hours: step `now` forward by the months found, count days from there,
//! step again and count hours. Months therefore follow real month lengths
//! (adding a month to Jan 31 lands on Feb 28/29), never a 30-day constant.
//! All arithmetic is on venue wall-clock time.

use std::time::Duration;

use chrono::{Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// How often a live countdown is recomputed; hours are the finest unit shown.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeLeft {
    pub months: u32,
    pub days: u32,
    pub hours: u32,
}

impl TimeLeft {
    pub const ZERO: TimeLeft = TimeLeft {
        months: 0,
        days: 0,
        hours: 0,
    };
}

/// The moment being counted down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDate {
    At(NaiveDateTime),
    /// Looked like a date but names no real calendar day.
    Invalid,
}

impl TargetDate {
    /// Parses a `YYYY-MM-DD` setting (anything after the first ten characters
    /// is ignored) as midnight on that day. Blank or non-date text falls back
    /// to `fallback`; a date-shaped value such as `2026-02-30` is `Invalid`.
    pub fn parse(raw: Option<&str>, fallback: NaiveDate) -> Self {
        let midnight = |date: NaiveDate| Self::At(date.and_time(chrono::NaiveTime::MIN));

        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return midnight(fallback);
        };

        let head: String = raw.chars().take(10).collect();
        if !is_date_shaped(&head) {
            warn!(value = raw, "wedding date is not YYYY-MM-DD, using fallback");
            return midnight(fallback);
        }

        match NaiveDate::parse_from_str(&head, "%Y-%m-%d") {
            Ok(date) => midnight(date),
            Err(e) => {
                warn!(value = raw, error = %e, "wedding date is not a calendar day");
                Self::Invalid
            }
        }
    }

    pub fn remaining(self, now: NaiveDateTime) -> TimeLeft {
        match self {
            Self::At(target) => time_left(now, target),
            Self::Invalid => TimeLeft::ZERO,
        }
    }
}

fn is_date_shaped(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn add_months(from: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
    from.checked_add_months(Months::new(months))
}

/// Largest `m` with `from + m months <= to`.
fn whole_months(from: NaiveDateTime, to: NaiveDateTime) -> u32 {
    let span = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    let mut months = u32::try_from(span).unwrap_or(0);
    while months > 0 && add_months(from, months).map_or(true, |stepped| stepped > to) {
        months -= 1;
    }
    months
}

/// Remaining (months, days, hours) from `now` until `target`, floored and
/// zero once the target is reached.
pub fn time_left(now: NaiveDateTime, target: NaiveDateTime) -> TimeLeft {
    if target <= now {
        return TimeLeft::ZERO;
    }

    let months = whole_months(now, target);
    let after_months = add_months(now, months).unwrap_or(now);

    let days = (target - after_months).num_days().max(0);
    let after_days = after_months + chrono::Duration::days(days);

    let hours = (target - after_days).num_hours().max(0);

    TimeLeft {
        months,
        days: u32::try_from(days).unwrap_or(0),
        hours: u32::try_from(hours).unwrap_or(0),
    }
}

/// Countdown bound to the venue's clock and the configured fallback date.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    offset: FixedOffset,
    fallback: NaiveDate,
}

impl Countdown {
    pub fn new(offset: FixedOffset, fallback: NaiveDate) -> Self {
        Self { offset, fallback }
    }

    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    pub fn target(&self, setting: Option<&str>) -> TargetDate {
        TargetDate::parse(setting, self.fallback)
    }

    pub fn current(&self, setting: Option<&str>) -> TimeLeft {
        self.target(setting).remaining(self.now())
    }
}
