// src/parser/labels.rs

//! Accessibility labels: report cell labels and calendar event labels.

use crate::models::Weekday;
use crate::parser::dates::{WeekContext, clock_times, long_date};

/// Field names the report grid uses as the second segment of a compound
/// header such as `"Project (Rollup): Project Name: Acme"`.
pub const KNOWN_FIELD_NAMES: [&str; 7] = [
    "project name",
    "color block",
    "tag",
    "project setup notes",
    "owner name",
    "project task name",
    "active project sharepoint folder link",
];

/// Split a `"Header: Value"` cell label into a lowercased header and value.
///
/// When the label has three or more segments and the second one is a known
/// field name, the first two form the header. Returns `None` for labels
/// without a `": "` separator.
pub fn split_compound_header(label: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = label.split(": ").collect();
    if parts.len() < 2 {
        return None;
    }

    let middle = parts[1].trim().to_lowercase();
    let compound = parts.len() >= 3
        && !middle.is_empty()
        && KNOWN_FIELD_NAMES
            .iter()
            .any(|name| middle.contains(name) || name.contains(middle.as_str()));

    let (header, value) = if compound {
        (format!("{}: {}", parts[0], parts[1]), parts[2..].join(": "))
    } else {
        (parts[0].to_string(), parts[1..].join(": "))
    };
    Some((header.trim().to_lowercase(), value))
}

/// A calendar event decoded from its label.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarLabel {
    pub title: String,
    pub day: Weekday,
    pub start_hour: f64,
    pub end_hour: f64,
    pub organizer: String,
    pub is_launch: bool,
}

impl CalendarLabel {
    pub fn duration_minutes(&self) -> i64 {
        ((self.end_hour - self.start_hour) * 60.0).round() as i64
    }
}

/// Decode `"Title, February 10, 2026, 10:00 AM, 10:30 AM, Organizer"`.
///
/// Needs at least three comma-separated parts and a month-name date inside
/// the week. One time means a 30 minute event; no time means 9:00 to 10:00.
pub fn parse_calendar_label(label: &str, week: &WeekContext) -> Option<CalendarLabel> {
    let parts: Vec<&str> = label.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }

    let title = parts[0].to_string();
    let (month, day_of_month) = parts.iter().find_map(|part| long_date(part))?;
    let day = week.weekday_for(Some(month), day_of_month)?;

    let times: Vec<f64> = parts.iter().flat_map(|part| clock_times(part)).collect();
    let (start_hour, end_hour) = match times.as_slice() {
        [start, end, ..] => (*start, *end),
        [start] => (*start, start + 0.5),
        [] => (9.0, 10.0),
    };

    let organizer = if parts.len() > 3 {
        parts[parts.len() - 1].to_string()
    } else {
        String::new()
    };
    let is_launch = title.to_lowercase().contains("launch");

    Some(CalendarLabel {
        title,
        day,
        start_hour,
        end_hour,
        organizer,
        is_launch,
    })
}
