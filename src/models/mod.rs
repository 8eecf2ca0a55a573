// src/models/mod.rs

//! Domain models for the planner.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;
mod schedule;
mod source;

// Re-export all public types
pub use config::{AggregatorConfig, Config, ImportConfig, ScheduleConfig, SourceConfig};
pub use record::{
    CalendarEvent, ClickTarget, Diag, ExtractionResult, LegacyTicket, RawRecord, ReportRow,
    RevisionTicket, StepResult, TicketStatus,
};
pub use schedule::{
    CapacityStatus, CapacitySummary, Conflict, ItemKind, ScheduleItem, Tier, WeeklyPlan, Weekday,
};
pub use source::{ImportErrorKind, ImportReport, SourceKind, SourceOutcome, SourceResult};
