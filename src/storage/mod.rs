//! Persistence for import reports and weekly plans.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── import.json           # Latest import report
//! ├── plan.json             # Latest weekly plan
//! └── weeks/                # One plan per week, overwritten on re-plan
//!     ├── 2026-02-02.json
//!     └── 2026-02-09.json
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ImportReport, WeeklyPlan};

pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Keys written, relative to the storage root
    pub locations: Vec<String>,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// A stored document with the time it was saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stored<T> {
    /// ISO 8601 timestamp of the write
    pub saved_at: DateTime<Utc>,
    pub content: T,
}

impl<T> Stored<T> {
    pub fn new(content: T) -> Self {
        Self {
            saved_at: Utc::now(),
            content,
        }
    }
}

/// Trait for plan storage backends.
#[async_trait]
pub trait PlanStorage: Send + Sync {
    /// Replace the latest import report.
    async fn write_report(&self, report: &ImportReport) -> Result<WriteMetadata>;

    /// Latest import report, if one was saved.
    async fn load_report(&self) -> Result<Option<Stored<ImportReport>>>;

    /// Save a plan as the latest and as its week's entry.
    async fn write_plan(&self, plan: &WeeklyPlan) -> Result<WriteMetadata>;

    /// The plan for a given week, or the latest when `week_start` is `None`.
    async fn load_plan(&self, week_start: Option<NaiveDate>) -> Result<Option<Stored<WeeklyPlan>>>;
}
