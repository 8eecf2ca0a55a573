// src/models/schedule.rs

//! Normalized schedule items and the weekly plan built from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A working day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    /// Working days in scan order.
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    /// Zero-based offset from Monday.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Day for a zero-based offset, wrapping every five days.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Map a chrono weekday onto a working day.
    pub fn from_chrono(day: chrono::Weekday) -> Option<Self> {
        match day {
            chrono::Weekday::Mon => Some(Weekday::Monday),
            chrono::Weekday::Tue => Some(Weekday::Tuesday),
            chrono::Weekday::Wed => Some(Weekday::Wednesday),
            chrono::Weekday::Thu => Some(Weekday::Thursday),
            chrono::Weekday::Fri => Some(Weekday::Friday),
            chrono::Weekday::Sat | chrono::Weekday::Sun => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Setup package tier, detected from the project name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Ultimate,
    Premium,
    Standard,
}

impl Tier {
    /// Estimated setup effort in hours.
    pub fn setup_hours(self) -> u32 {
        match self {
            Tier::Ultimate => 8,
            Tier::Premium => 6,
            Tier::Standard => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Ultimate => "Ultimate",
            Tier::Premium => "Premium",
            Tier::Standard => "Standard",
        }
    }

    pub fn kind(self) -> ItemKind {
        match self {
            Tier::Ultimate => ItemKind::SetupUltimate,
            Tier::Premium => ItemKind::SetupPremium,
            Tier::Standard => ItemKind::SetupStandard,
        }
    }
}

/// Kind of work a schedule item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    SetupUltimate,
    SetupPremium,
    SetupStandard,
    Revision,
    Launch,
    Meeting,
    Buffer,
    Break,
}

impl ItemKind {
    pub fn is_setup(self) -> bool {
        matches!(
            self,
            ItemKind::SetupUltimate | ItemKind::SetupPremium | ItemKind::SetupStandard
        )
    }

    /// Items whose start time is a placeholder and may be moved by the planner.
    pub fn is_flexible(self) -> bool {
        self.is_setup() || self == ItemKind::Revision
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemKind::SetupUltimate => "Setup (Ultimate)",
            ItemKind::SetupPremium => "Setup (Premium)",
            ItemKind::SetupStandard => "Setup (Standard)",
            ItemKind::Revision => "Revision",
            ItemKind::Launch => "Launch",
            ItemKind::Meeting => "Meeting",
            ItemKind::Buffer => "Buffer",
            ItemKind::Break => "Break",
        }
    }
}

/// A single block of time on the weekly plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub kind: ItemKind,
    pub title: String,
    /// Always a positive multiple of the plan granularity
    pub duration_minutes: u32,
    pub day: Weekday,
    /// Start in fractional 24h hours, e.g. `8.5` for 8:30
    pub start_hour: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Externally fixed time (real meetings)
    #[serde(default)]
    pub locked: bool,
    /// Placed by the overflow fallback and allowed to overlap
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub overflow: bool,
}

impl ScheduleItem {
    pub fn new(kind: ItemKind, title: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            kind,
            title: title.into(),
            duration_minutes,
            day: Weekday::Monday,
            start_hour: 8.0,
            source_id: None,
            locked: false,
            overflow: false,
        }
    }

    pub fn at(mut self, day: Weekday, start_hour: f64) -> Self {
        self.day = day;
        self.start_hour = start_hour;
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn duration_hours(&self) -> f64 {
        f64::from(self.duration_minutes) / 60.0
    }

    pub fn end_hour(&self) -> f64 {
        self.start_hour + self.duration_hours()
    }

    /// Whether two items share a day and their half-open intervals intersect.
    pub fn overlaps(&self, other: &ScheduleItem) -> bool {
        self.day == other.day
            && self.start_hour < other.end_hour()
            && other.start_hour < self.end_hour()
    }
}

/// Over/under capacity status for a week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityStatus {
    Under,
    Balanced,
    Over,
}

/// Weekly capacity totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacitySummary {
    pub total_available_minutes: u32,
    pub total_scheduled_minutes: u32,
    pub total_break_minutes: u32,
    pub total_buffer_minutes: u32,
    /// Scheduled minus breaks and buffers
    pub total_work_minutes: u32,
    /// Negative when over capacity
    pub remaining_minutes: i64,
    pub utilization_percent: u32,
    pub status: CapacityStatus,
}

/// Two fixed items that overlap and were left in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub day: Weekday,
    pub first: String,
    pub second: String,
}

/// The merged, fully placed week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    /// ISO date of the week's Monday
    pub week_start: chrono::NaiveDate,
    pub items: Vec<ScheduleItem>,
    pub capacity: CapacitySummary,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
}

impl WeeklyPlan {
    pub fn items_on(&self, day: Weekday) -> impl Iterator<Item = &ScheduleItem> {
        self.items.iter().filter(move |item| item.day == day)
    }

    pub fn overflow_count(&self) -> usize {
        self.items.iter().filter(|item| item.overflow).count()
    }
}
