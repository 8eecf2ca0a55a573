// src/parser/dates.rs

//! Dates and clock times found in free text, resolved against one work week.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;

use crate::models::Weekday;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})").expect("valid regex"));

static LONG_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept?|Oct|Nov|Dec)\.?\s+(\d{1,2})",
    )
    .expect("valid regex")
});

static RANGE_WITH_MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(am|pm)\s*(?:-|–|to)+\s*(\d{1,2}):(\d{2})\s*(am|pm)")
        .expect("valid regex")
});

static RANGE_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}):?(\d{2})?\s*(am|pm)\s*(?:to|-|–)\s*(\d{1,2}):?(\d{2})?\s*(am|pm)")
        .expect("valid regex")
});

static AT_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bat\s+(\d{1,2}):?(\d{2})?\s*(am|pm)").expect("valid regex")
});

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(AM|PM)").expect("valid regex"));

/// Day and hour span parsed from text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub day: Weekday,
    pub start_hour: f64,
    pub end_hour: f64,
}

impl TimeRange {
    pub fn duration_minutes(&self) -> i64 {
        ((self.end_hour - self.start_hour) * 60.0).round() as i64
    }
}

/// The Monday to Friday dates of the week being planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekContext {
    monday: NaiveDate,
}

impl WeekContext {
    /// Build a context from any date; it is moved back to its Monday.
    pub fn new(date: NaiveDate) -> Self {
        let offset = u64::from(date.weekday().num_days_from_monday());
        Self {
            monday: date - Days::new(offset),
        }
    }

    pub fn monday(&self) -> NaiveDate {
        self.monday
    }

    fn dates(&self) -> impl Iterator<Item = (Weekday, NaiveDate)> + '_ {
        Weekday::ALL
            .into_iter()
            .map(|day| (day, self.monday + Days::new(day.index() as u64)))
    }

    /// Working day for a day of month, with a 1-based month when known.
    ///
    /// Without a month the first weekday whose day-of-month matches wins.
    pub fn weekday_for(&self, month: Option<u32>, day_of_month: u32) -> Option<Weekday> {
        self.dates()
            .find(|(_, date)| {
                date.day() == day_of_month && month.is_none_or(|m| date.month() == m)
            })
            .map(|(day, _)| day)
    }

    /// Weekday named by the first `m/d` date in `text`.
    pub fn weekday_in_slash_date(&self, text: &str) -> Option<Weekday> {
        let (month, day) = slash_date(text)?;
        self.weekday_for(Some(month), day)
    }

    /// Weekday named by the first `Month d` date in `text`.
    pub fn weekday_in_long_date(&self, text: &str) -> Option<Weekday> {
        let (month, day) = long_date(text)?;
        self.weekday_for(Some(month), day)
    }
}

/// First `m/d` pair, 1-based month.
pub fn slash_date(text: &str) -> Option<(u32, u32)> {
    let caps = SLASH_DATE.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// First month-name date (`February 11th`, `Feb 10`), 1-based month.
pub fn long_date(text: &str) -> Option<(u32, u32)> {
    let caps = LONG_DATE.captures(text)?;
    let name = caps[1].to_lowercase();
    let prefix = name.get(..3)?;
    let month = MONTHS.iter().position(|m| m.starts_with(prefix))? as u32 + 1;
    Some((month, caps[2].parse().ok()?))
}

/// Convert a 12-hour clock hour to 24-hour.
pub fn to_24_hour(hour: u32, meridiem: &str) -> u32 {
    let pm = meridiem.eq_ignore_ascii_case("pm");
    match (pm, hour) {
        (true, h) if h < 12 => h + 12,
        (false, 12) => 0,
        (_, h) => h,
    }
}

fn clock(hour: &str, minute: Option<&str>, meridiem: &str) -> Option<f64> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.map(str::parse::<u32>).transpose().ok()?.unwrap_or(0);
    Some(f64::from(to_24_hour(hour, meridiem)) + f64::from(minute) / 60.0)
}

/// Every `h:mm AM/PM` time in `text`, as fractional hours.
pub fn clock_times(text: &str) -> Vec<f64> {
    CLOCK_TIME
        .captures_iter(text)
        .filter_map(|caps| clock(&caps[1], Some(&caps[2]), &caps[3]))
        .collect()
}

/// Parse a scheduling tag such as `"Launch 2/10 from 10:00am-11:00am"`.
///
/// A date is required and must fall inside the week. Time ranges are tried
/// first, then `at 1 pm` (one hour). A bare date yields 10:00 to 11:00.
pub fn parse_tag(tag: &str, week: &WeekContext) -> Option<TimeRange> {
    if tag.trim().is_empty() {
        return None;
    }

    let (month, day_of_month) = slash_date(tag).or_else(|| long_date(tag))?;
    let day = week.weekday_for(Some(month), day_of_month)?;

    for pattern in [&*RANGE_WITH_MINUTES, &*RANGE_LOOSE] {
        if let Some(caps) = pattern.captures(tag) {
            let start = clock(&caps[1], caps.get(2).map(|m| m.as_str()), &caps[3]);
            let end = clock(&caps[4], caps.get(5).map(|m| m.as_str()), &caps[6]);
            if let (Some(start_hour), Some(end_hour)) = (start, end) {
                return Some(TimeRange {
                    day,
                    start_hour,
                    end_hour,
                });
            }
        }
    }

    if let Some(caps) = AT_TIME.captures(tag) {
        if let Some(start_hour) = clock(&caps[1], caps.get(2).map(|m| m.as_str()), &caps[3]) {
            return Some(TimeRange {
                day,
                start_hour,
                end_hour: start_hour + 1.0,
            });
        }
    }

    Some(TimeRange {
        day,
        start_hour: 10.0,
        end_hour: 11.0,
    })
}
