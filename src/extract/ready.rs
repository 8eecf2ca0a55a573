// src/extract/ready.rs

//! Readiness predicates. They answer `false` on anything unexpected,
//! including an unparsable selector.

use scraper::ElementRef;

use crate::error::Result;
use crate::extract::tickets::is_ticket_header;
use crate::page::{Frame, parse_selector, text_content};

/// The report grid has finished rendering at least one data cell.
pub fn report_ready(frame: &Frame) -> bool {
    report_check(frame).unwrap_or(false)
}

fn report_check(frame: &Frame) -> Result<bool> {
    let Some(widget) = frame.first("div.report-table-widget.widgetReady.finalState") else {
        return Ok(false);
    };
    let has = |selector: &str| -> Result<bool> {
        Ok(widget.select(&parse_selector(selector)?).next().is_some())
    };
    Ok(has("table.data-grid-full-table")? && has(r#"td[role="gridcell"]"#)?)
}

/// The ticket table shows at least one row with real cells.
pub fn tickets_table_ready(frame: &Frame) -> bool {
    tickets_table_check(frame).unwrap_or(false)
}

fn has_cells(row: Option<ElementRef<'_>>) -> Result<bool> {
    let td = parse_selector("td")?;
    Ok(row.is_some_and(|row| row.select(&td).count() > 2))
}

fn tickets_table_check(frame: &Frame) -> Result<bool> {
    if let Some(component) = frame.first("cc-sobject-table") {
        if let Some(tbody) = component.select(&parse_selector("tbody")?).next() {
            let first_row = tbody.select(&parse_selector("tr")?).next();
            if has_cells(first_row)? {
                return Ok(true);
            }
        }
    }

    let header_row = parse_selector("thead tr, tr:first-child")?;
    let data_rows = parse_selector("tbody tr, tr:not(:first-child)")?;
    for table in frame.select("table")? {
        let Some(header) = table.select(&header_row).next() else {
            continue;
        };
        if !is_ticket_header(&text_content(header).to_uppercase()) {
            continue;
        }
        let first_data = table.select(&data_rows).find(|row| row.id() != header.id());
        if has_cells(first_data)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://acme.lightning.force.com/";

    #[test]
    fn report_needs_final_state_and_a_cell() {
        let loading = r#"<div class="report-table-widget widgetReady"><table class="data-grid-full-table"><tr><td role="gridcell">x</td></tr></table></div>"#;
        assert!(!report_ready(&Frame::parse(URL, loading)));

        let empty = r#"<div class="report-table-widget widgetReady finalState"><table class="data-grid-full-table"></table></div>"#;
        assert!(!report_ready(&Frame::parse(URL, empty)));

        let done = r#"<div class="report-table-widget widgetReady finalState"><table class="data-grid-full-table"><tr><td role="gridcell">x</td></tr></table></div>"#;
        assert!(report_ready(&Frame::parse(URL, done)));
    }

    #[test]
    fn report_grid_must_sit_inside_the_finished_widget() {
        let elsewhere = r#"
            <div class="report-table-widget widgetReady finalState"><p>No rows</p></div>
            <table class="data-grid-full-table"><tr><td role="gridcell">x</td></tr></table>"#;
        assert!(!report_ready(&Frame::parse(URL, elsewhere)));
    }

    #[test]
    fn component_table_needs_real_row() {
        let shell = "<cc-sobject-table><table><tbody><tr><td></td></tr></tbody></table></cc-sobject-table>";
        assert!(!tickets_table_ready(&Frame::parse(URL, shell)));

        let rows = "<cc-sobject-table><table><tbody><tr><td>a</td><td>b</td><td>c</td></tr></tbody></table></cc-sobject-table>";
        assert!(tickets_table_ready(&Frame::parse(URL, rows)));
    }

    #[test]
    fn header_matched_table() {
        let html = r#"<table>
            <thead><tr><th>Ticket Name</th><th>Account</th><th>Due</th></tr></thead>
            <tbody><tr><td>Fix</td><td>Acme</td><td>2/10</td></tr></tbody></table>"#;
        assert!(tickets_table_ready(&Frame::parse(URL, html)));

        let other = r#"<table>
            <thead><tr><th>Report</th><th>Owner</th></tr></thead>
            <tbody><tr><td>a</td><td>b</td><td>c</td></tr></tbody></table>"#;
        assert!(!tickets_table_ready(&Frame::parse(URL, other)));
    }
}
