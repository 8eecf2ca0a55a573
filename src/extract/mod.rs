// src/extract/mod.rs

//! Page functions: extractors, readiness predicates and navigation steps.
//!
//! Everything here is a [`PageFn`](crate::page::PageFn). Page functions never
//! fail: errors become an `error` field, a `false` readiness answer or a
//! missed navigation step. They record diagnostics instead of logging.

pub mod calendar;
pub mod navigate;
pub mod ready;
pub mod report;
pub mod tickets;

use crate::error::Result;
use crate::models::{Diag, ExtractionResult, RawRecord};
use crate::page::Frame;
use crate::utils::truncate;

pub use calendar::extract_calendar;
pub use navigate::{click_lists_tab, click_tickets_sidebar};
pub use ready::{report_ready, tickets_table_ready};
pub use report::extract_report_grid;
pub use tickets::extract_tickets;

/// URL fragments identifying the applications' own frames.
pub const APP_FRAME_PATTERNS: [&str; 3] = ["vf.force.com", "project_cloud", "lightning"];

/// What an extraction strategy concluded.
pub(crate) enum Extracted {
    /// Zero or more records; empty means "nothing yet"
    Records(Vec<RawRecord>),
    /// The page is in a state the strategy recognizes as broken
    Failed(String),
}

/// Whether the frame is showing a sign-in form.
pub fn needs_login(frame: &Frame) -> bool {
    frame.exists(r#"input[name="username"]"#)
        || frame.exists(r#"input[name="email"]"#)
        || frame.title().to_lowercase().contains("login")
        || frame.url().to_lowercase().contains("login")
}

/// Whether the frame belongs to one of the known applications.
pub fn is_app_frame(url: &str) -> bool {
    APP_FRAME_PATTERNS.iter().any(|pattern| url.contains(pattern))
}

/// Location and shape facts recorded on every extraction.
pub fn frame_diag(frame: &Frame) -> Diag {
    let mut diag = Diag::new();
    diag.set("url", truncate(frame.url(), 120));
    diag.set("title", truncate(&frame.title(), 60));
    diag.set("tables", count(frame, "table"));
    diag.set("iframes", count(frame, "iframe"));
    diag
}

fn count(frame: &Frame, selector: &str) -> usize {
    frame.select(selector).map(|found| found.len()).unwrap_or(0)
}

/// Shared shell of every extractor: login check first, then the strategies,
/// with any error turned into an `error` result.
pub(crate) fn run_extractor(
    frame: &Frame,
    strategies: fn(&Frame, &mut Diag) -> Result<Extracted>,
) -> ExtractionResult {
    if needs_login(frame) {
        return ExtractionResult::login();
    }

    let mut diag = frame_diag(frame);
    match strategies(frame, &mut diag) {
        Ok(Extracted::Records(records)) => ExtractionResult::found(records, diag),
        Ok(Extracted::Failed(message)) => {
            diag.set("error", message.as_str());
            ExtractionResult::failed(message, diag)
        }
        Err(e) => {
            diag.set("exception", e.to_string());
            ExtractionResult::failed(format!("Extraction error: {}", e), diag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_detection() {
        let form = Frame::parse("https://app.example.com", r#"<input name="username">"#);
        assert!(needs_login(&form));

        let titled = Frame::parse(
            "https://app.example.com",
            "<html><head><title>Login | Acme</title></head></html>",
        );
        assert!(needs_login(&titled));

        let by_url = Frame::parse("https://login.example.com/", "<p>hi</p>");
        assert!(needs_login(&by_url));

        let normal = Frame::parse("https://app.example.com", "<table></table>");
        assert!(!needs_login(&normal));
    }

    #[test]
    fn test_login_short_circuits_strategies() {
        fn never(_: &Frame, _: &mut Diag) -> Result<Extracted> {
            Err(crate::error::AppError::validation("should not run"))
        }
        let frame = Frame::parse("https://app.example.com", r#"<input name="email">"#);
        let result = run_extractor(&frame, never);
        assert!(result.needs_login);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_errors_become_results() {
        fn broken(_: &Frame, _: &mut Diag) -> Result<Extracted> {
            Err(crate::error::AppError::selector("td[", "unexpected end"))
        }
        let frame = Frame::parse("https://app.example.com", "<p></p>");
        let result = run_extractor(&frame, broken);
        assert!(!result.needs_login);
        assert!(result.error.unwrap().starts_with("Extraction error"));
        assert!(result.diag.contains("exception"));
    }
}
