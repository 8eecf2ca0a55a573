// src/models/record.rs

//! Raw records and the values page functions hand back across the
//! page-execution boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form diagnostic bag (URL, counts, strategy name).
///
/// Only used for troubleshooting; control flow never looks past
/// presence or absence of a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diag(Map<String, Value>);

impl Diag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Increment a numeric counter, starting from zero.
    pub fn bump(&mut self, key: &str) {
        let current = self.0.get(key).and_then(Value::as_u64).unwrap_or(0);
        self.0.insert(key.to_string(), Value::from(current + 1));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// One row of the assignment report grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportRow {
    pub end_date: String,
    pub task_type: String,
    pub task_id: String,
    pub project_name: String,
    pub project_id: String,
    pub color_block: String,
    pub tag: String,
    pub setup_notes: String,
    pub owner_name: String,
}

/// Status icon shown in the first cell of a ticket row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Ok,
    Warning,
    Overdue,
}

/// A revision ticket read from the structured ticket table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevisionTicket {
    pub name: String,
    pub project: String,
    pub project_href: String,
    pub description: String,
    pub hours: f64,
    pub due_date: Option<String>,
    pub priority: String,
    pub created_date: String,
    pub completed: bool,
    pub status: TicketStatus,
    pub revision_label: String,
    pub web_view_url: String,
    pub assignees: Vec<String>,
}

/// A ticket read from a generic table or card element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyTicket {
    pub project_name: String,
    pub description: String,
    pub estimated_hours: f64,
    pub due_date: String,
}

/// A calendar event as exposed by its accessibility label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub label: String,
}

/// Source-specific record shape, tagged at the extraction boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "kebab-case")]
pub enum RawRecord {
    ReportRow(ReportRow),
    Revision(RevisionTicket),
    LegacyTicket(LegacyTicket),
    CalendarEvent(CalendarEvent),
}

impl RawRecord {
    /// Concatenated text values, used for garbage screening.
    pub fn text(&self) -> String {
        let parts: Vec<&String> = match self {
            RawRecord::ReportRow(r) => vec![
                &r.end_date,
                &r.task_type,
                &r.project_name,
                &r.color_block,
                &r.tag,
                &r.setup_notes,
            ],
            RawRecord::Revision(t) => vec![&t.name, &t.project, &t.description],
            RawRecord::LegacyTicket(t) => vec![&t.project_name, &t.description, &t.due_date],
            RawRecord::CalendarEvent(e) => vec![&e.label],
        };
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What an extractor returns from one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub needs_login: bool,
    pub data: Vec<RawRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub diag: Diag,
}

impl ExtractionResult {
    /// A login wall was detected; nothing else was inspected.
    pub fn login() -> Self {
        Self {
            needs_login: true,
            ..Self::default()
        }
    }

    pub fn found(data: Vec<RawRecord>, diag: Diag) -> Self {
        Self {
            needs_login: false,
            data,
            error: None,
            diag,
        }
    }

    pub fn failed(error: impl Into<String>, diag: Diag) -> Self {
        Self {
            needs_login: false,
            data: Vec::new(),
            error: Some(error.into()),
            diag,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Element a navigation step wants activated: the `index`-th match of
/// `selector` in the frame's document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClickTarget {
    pub selector: String,
    pub index: usize,
}

impl ClickTarget {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// What a navigation step returns from one frame.
///
/// Page functions cannot act on the page themselves, so `clicked` means the
/// step resolved an element to activate and `target` names it; the host
/// dispatches the click.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub clicked: bool,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ClickTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub diag: Diag,
}

impl StepResult {
    pub fn clicked(method: &str, target: ClickTarget, diag: Diag) -> Self {
        Self {
            clicked: true,
            method: method.to_string(),
            target: Some(target),
            error: None,
            diag,
        }
    }

    pub fn missed(error: impl Into<String>, diag: Diag) -> Self {
        Self {
            clicked: false,
            method: String::new(),
            target: None,
            error: Some(error.into()),
            diag,
        }
    }
}
