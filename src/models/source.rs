// src/models/source.rs

//! Import sources and their per-source outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::models::RawRecord;

/// One of the three known source applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// CRM analytics report listing setup and launch assignments
    ReportGrid,
    /// Ticketing app listing revision tickets
    Tickets,
    /// Web calendar week view
    Calendar,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::ReportGrid, SourceKind::Tickets, SourceKind::Calendar];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::ReportGrid => "report-grid",
            SourceKind::Tickets => "tickets",
            SourceKind::Calendar => "calendar",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report-grid" | "report" => Ok(SourceKind::ReportGrid),
            "tickets" | "ticket" => Ok(SourceKind::Tickets),
            "calendar" => Ok(SourceKind::Calendar),
            other => Err(AppError::validation(format!("unknown source '{other}'"))),
        }
    }
}

/// Why a source failed to produce data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportErrorKind {
    /// Authentication still required after every retry
    NeedsLogin,
    /// The readiness predicate never passed
    NotReadyTimeout,
    /// A required navigation step never succeeded
    NavigationFailed,
    /// Extraction ran cleanly but found nothing in any frame
    NoDataFound,
    /// An extractor reported a failure
    ExtractionException,
    /// The tab could not be opened or read
    HostUnavailable,
    /// The whole import ran out of time before this source settled
    ImportTimeout,
}

/// Terminal state of one source's import. Exactly one applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SourceOutcome {
    Success {
        data: Vec<RawRecord>,
    },
    NeedsLogin,
    Error {
        kind: ImportErrorKind,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diag: Option<Value>,
    },
}

impl SourceOutcome {
    pub fn error(kind: ImportErrorKind, message: impl Into<String>) -> Self {
        SourceOutcome::Error {
            kind,
            error: message.into(),
            diag: None,
        }
    }

    pub fn with_diag(self, value: Value) -> Self {
        match self {
            SourceOutcome::Error { kind, error, .. } => SourceOutcome::Error {
                kind,
                error,
                diag: Some(value),
            },
            other => other,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            SourceOutcome::Success { .. } => "success",
            SourceOutcome::NeedsLogin => "needs-login",
            SourceOutcome::Error { .. } => "error",
        }
    }
}

/// Result for a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: SourceKind,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

impl SourceResult {
    pub fn new(source: SourceKind, outcome: SourceOutcome) -> Self {
        Self { source, outcome }
    }

    /// Records for a successful source, empty otherwise.
    pub fn data(&self) -> &[RawRecord] {
        match &self.outcome {
            SourceOutcome::Success { data } => data,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Success { .. })
    }

    /// One-line human readable summary.
    pub fn describe(&self) -> String {
        match &self.outcome {
            SourceOutcome::Success { data } => format!("{}: {} records", self.source, data.len()),
            SourceOutcome::NeedsLogin => {
                format!("{}: login required, log in then retry", self.source)
            }
            SourceOutcome::Error { error, .. } => format!("{}: {}", self.source, error),
        }
    }
}

/// Combined import result, one entry per requested source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportReport {
    pub results: BTreeMap<SourceKind, SourceResult>,
}

impl ImportReport {
    pub fn insert(&mut self, result: SourceResult) {
        self.results.insert(result.source, result);
    }

    pub fn get(&self, source: SourceKind) -> Option<&SourceResult> {
        self.results.get(&source)
    }

    /// Records of a source, empty when missing or failed.
    pub fn data(&self, source: SourceKind) -> &[RawRecord] {
        self.get(source).map(SourceResult::data).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
