// src/extract/calendar.rs

//! Calendar extractor: event accessibility labels from the week view.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::extract::{Extracted, run_extractor};
use crate::models::{CalendarEvent, Diag, ExtractionResult, RawRecord};
use crate::page::Frame;
use crate::utils::char_len;

static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}:\d{2}").expect("valid regex"));

static MERIDIEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(AM|PM)").expect("valid regex"));

/// Whether an accessibility label reads like a timed event.
pub fn is_event_label(label: &str) -> bool {
    char_len(label) > 20 && CLOCK.is_match(label) && MERIDIEM.is_match(label)
}

/// Extract event labels from one frame.
pub fn extract_calendar(frame: &Frame) -> ExtractionResult {
    run_extractor(frame, strategies)
}

fn strategies(frame: &Frame, diag: &mut Diag) -> Result<Extracted> {
    let mut labels = event_labels(frame, "[data-calitemid][aria-label]")?;
    if labels.is_empty() {
        diag.set("strategy", "aria-label-scan");
        labels = event_labels(frame, "[aria-label]")?;
    } else {
        diag.set("strategy", "calendar-item");
    }
    diag.set("events", labels.len());

    Ok(Extracted::Records(
        labels
            .into_iter()
            .map(|label| RawRecord::CalendarEvent(CalendarEvent { label }))
            .collect(),
    ))
}

/// Distinct event labels on elements matching `selector`, in document order.
fn event_labels(frame: &Frame, selector: &str) -> Result<Vec<String>> {
    let mut labels: Vec<String> = Vec::new();
    for element in frame.select(selector)? {
        let label = element.value().attr("aria-label").unwrap_or_default();
        if is_event_label(label) && !labels.iter().any(|seen| seen == label) {
            labels.push(label.to_string());
        }
    }
    Ok(labels)
}
