// src/parser/description.rs

//! Structured fields hidden in free-text ticket descriptions.

use std::sync::LazyLock;

use regex::Regex;

static HOURS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d*\.?\d+)\s*hours?\b").expect("invalid regex: hours"));

static REVISION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Design\s+Revisions?\s+[\w\-()]+").expect("invalid regex: revision label")
});

static ASSIGNEES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("invalid regex: assignees"));

static ASSIGNEE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/,\s]+").expect("invalid regex: assignee split"));

static SHAREPOINT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https://[^\s<>"]+\.sharepoint\.com[^\s<>"]*\b"#)
        .expect("invalid regex: sharepoint url")
});

/// Fields parsed out of a revision ticket description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionDetails {
    /// Zero when the description names no hours
    pub hours: f64,
    pub revision_label: String,
    pub web_view_url: String,
    pub assignees: Vec<String>,
}

/// Parse hours, revision label, assignees and a SharePoint link.
///
/// ```
/// use weekplan::parser::parse_revision_description;
///
/// let details = parse_revision_description("Design Revisions 2 (AB/CD) - 1.5 hours");
/// assert_eq!(details.hours, 1.5);
/// assert_eq!(details.revision_label, "Design Revisions 2");
/// assert_eq!(details.assignees, vec!["AB", "CD"]);
/// ```
pub fn parse_revision_description(text: &str) -> RevisionDetails {
    let mut details = RevisionDetails::default();
    if text.trim().is_empty() {
        return details;
    }

    if let Some(caps) = HOURS.captures(text) {
        details.hours = caps[1].parse().unwrap_or(0.0);
    }
    if let Some(m) = REVISION_LABEL.find(text) {
        details.revision_label = m.as_str().to_string();
    }
    if let Some(caps) = ASSIGNEES.captures(text) {
        details.assignees = ASSIGNEE_SPLIT
            .split(&caps[1])
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(m) = SHAREPOINT_URL.find(text) {
        details.web_view_url = m.as_str().to_string();
    }
    details
}
