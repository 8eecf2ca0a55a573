// src/extract/report.rs

//! Report grid extractor.
//!
//! Three strategies, most specific first:
//! 1. The analytics report widget once it reports `widgetReady finalState`,
//!    reading cell values from their accessibility labels.
//! 2. The classic report table with fixed grouping columns.
//! 3. Any table, with columns mapped from header text.

use scraper::ElementRef;

use crate::error::Result;
use crate::extract::{Extracted, run_extractor};
use crate::models::{Diag, ExtractionResult, RawRecord, ReportRow};
use crate::page::{Frame, closest, parse_selector, text_content};
use crate::parser::split_compound_header;

/// Extract report rows from one frame.
pub fn extract_report_grid(frame: &Frame) -> ExtractionResult {
    run_extractor(frame, strategies)
}

fn strategies(frame: &Frame, diag: &mut Diag) -> Result<Extracted> {
    if let Some(found) = wave_widget(frame, diag)? {
        return Ok(found);
    }
    diag.set("strategy", "legacy-fixed-column");

    let Some(table) = find_table(frame)? else {
        diag.set("error", "no table found by any strategy");
        return Ok(Extracted::Failed("Report table not found".to_string()));
    };

    let uses_fixed_columns = table
        .select(&parse_selector("td[data-fixed-column]")?)
        .next()
        .is_some();
    let rows = if uses_fixed_columns {
        fixed_column_rows(table)?
    } else {
        diag.set("strategy", "header-mapped");
        header_mapped_rows(table)?
    };
    Ok(Extracted::Records(rows))
}

/// Grouped column values that render once for several rows.
#[derive(Debug, Default)]
struct GroupState {
    end_date: String,
    task_type: String,
    task_id: String,
}

impl GroupState {
    fn update_end_date(&mut self, text: &str) {
        if let Some(value) = group_value(text) {
            self.end_date = value.to_string();
        }
    }

    fn update_task_type(&mut self, text: &str, task_id: Option<&str>) -> bool {
        match group_value(text) {
            Some(value) => {
                self.task_type = value.to_string();
                if let Some(id) = task_id {
                    self.task_id = id.to_string();
                }
                true
            }
            None => false,
        }
    }

    fn is_known(&self) -> bool {
        !self.end_date.is_empty() && !self.task_type.is_empty()
    }
}

/// A grouping cell's value, if it carries a new one.
fn group_value(text: &str) -> Option<&str> {
    let text = text.trim();
    (!text.is_empty() && !text.starts_with("Total")).then_some(text)
}

fn wave_widget(frame: &Frame, diag: &mut Diag) -> Result<Option<Extracted>> {
    let Some(widget) = frame.first("div.report-table-widget") else {
        return Ok(None);
    };
    let finished = {
        let classes: Vec<&str> = widget.value().classes().collect();
        classes.contains(&"widgetReady") && classes.contains(&"finalState")
    };
    if !finished {
        return Ok(None);
    }
    let Some(table) = widget
        .select(&parse_selector("table.data-grid-full-table")?)
        .next()
    else {
        return Ok(None);
    };

    diag.set("strategy", "wave-analytics");
    let tr = parse_selector("tr")?;
    let th = parse_selector("th")?;
    let gridcell = parse_selector(r#"td[role="gridcell"]"#)?;
    let first_cell = parse_selector(r#"td[role="gridcell"]:first-child"#)?;
    let second_cell = parse_selector(r#"td[role="gridcell"]:nth-child(2)"#)?;
    let cell_text = parse_selector("div.wave-table-cell-text")?;
    let any_div = parse_selector("div")?;
    let link = parse_selector("a")?;

    let rows: Vec<ElementRef> = table.select(&tr).collect();
    if rows.is_empty() {
        diag.set("error", "no tr elements in wave table");
        return Ok(Some(Extracted::Failed("No rows in report table".to_string())));
    }
    diag.set("totalRows", rows.len());

    let shown_text = |cell: ElementRef| {
        cell.select(&cell_text)
            .next()
            .map(text_content)
            .unwrap_or_else(|| text_content(cell))
    };

    let mut group = GroupState::default();
    let mut records = Vec::new();
    for row in rows {
        if row.select(&th).next().is_some() {
            diag.bump("skippedRows");
            continue;
        }
        let cells: Vec<ElementRef> = row.select(&gridcell).collect();
        if cells.is_empty() {
            diag.bump("skippedRows");
            continue;
        }

        let mut fields: Vec<(String, String)> = Vec::new();
        let mut record_id = String::new();
        let mut link_seen = false;
        for cell in &cells {
            let Some(div) = cell
                .select(&cell_text)
                .next()
                .or_else(|| cell.select(&any_div).next())
            else {
                continue;
            };
            let aria = div.value().attr("aria-label").unwrap_or_default();
            if aria.contains(':') {
                if let Some(pair) = split_compound_header(aria) {
                    fields.push(pair);
                }
            }
            if !link_seen {
                if let Some(a) = cell.select(&link).next() {
                    link_seen = true;
                    record_id = a.value().attr("data-id").unwrap_or_default().to_string();
                }
            }
        }

        if text_content(row).contains("Grand Total") {
            diag.bump("skippedRows");
            continue;
        }

        if let Some(cell) = row.select(&first_cell).next() {
            group.update_end_date(&shown_text(cell));
        }
        if let Some(cell) = row.select(&second_cell).next() {
            let task_id = cell.select(&link).next().map(|a| a.value().attr("data-id").unwrap_or_default());
            group.update_task_type(&shown_text(cell), task_id);
        }
        if !group.is_known() {
            diag.bump("skippedRows");
            continue;
        }

        let mut record = ReportRow {
            end_date: group.end_date.clone(),
            task_type: group.task_type.clone(),
            task_id: group.task_id.clone(),
            project_id: record_id,
            ..ReportRow::default()
        };
        for (key, value) in fields {
            if key.contains("project") && key.contains("name") {
                record.project_name = value;
            } else if key.contains("owner") {
                record.owner_name = value;
            } else if key.contains("color") {
                record.color_block = value;
            } else if key.contains("tag") {
                record.tag = value;
            } else if key.contains("setup") || key.contains("notes") {
                record.setup_notes = value;
            }
        }
        if record.project_name.is_empty() {
            if let Some(last) = cells.last() {
                record.project_name = shown_text(*last);
            }
        }
        if record.project_name.is_empty() {
            diag.bump("skippedRows");
            continue;
        }

        records.push(RawRecord::ReportRow(record));
        diag.bump("processedRows");
    }

    Ok(Some(Extracted::Records(records)))
}

/// Locate the report table when the analytics widget is absent.
fn find_table(frame: &Frame) -> Result<Option<ElementRef<'_>>> {
    let table = parse_selector("table")?;
    if let Some(cell) = frame.first(r#"td[data-fixed-column="true"]"#) {
        if let Some(found) = closest(cell, &table) {
            return Ok(Some(found));
        }
    }

    for selector in [
        "[data-grid-full-table]",
        "table.data-grid-full-table",
        "table.slds-table",
        r#"table[role="grid"]"#,
    ] {
        if let Some(found) = frame.first(selector) {
            return Ok(Some(found));
        }
    }

    if let Some(content) = frame.first(r#".report-content, [class*="reportContent"], [class*="report-"]"#) {
        if let Some(found) = content.select(&table).next() {
            return Ok(Some(found));
        }
    }

    let tr = parse_selector("tr")?;
    Ok(frame
        .select("table")?
        .into_iter()
        .find(|candidate| candidate.select(&tr).count() > 2))
}

/// Classic report layout: `data-fixed-column="true"` cells hold the grouping
/// values, `data-fixed-column="false"` cells hold the row's fields.
fn fixed_column_rows(table: ElementRef<'_>) -> Result<Vec<RawRecord>> {
    let tr = parse_selector("tr")?;
    let fixed = parse_selector(r#"td[data-fixed-column="true"]"#)?;
    let data = parse_selector(r#"td[data-fixed-column="false"]"#)?;

    let mut group = GroupState::default();
    let mut records = Vec::new();
    for row in table.select(&tr) {
        let fixed_cells: Vec<String> = row.select(&fixed).map(text_content).collect();
        let data_cells: Vec<String> = row.select(&data).map(text_content).collect();

        if let Some(text) = fixed_cells.first() {
            let date: String = text.chars().take_while(|c| c.is_ascii_digit() || *c == '/').collect();
            if group_value(text).is_some() && !date.is_empty() {
                group.end_date = date;
            }
        }
        if let Some(text) = fixed_cells.get(1) {
            if group_value(text).is_some() {
                let task = text.split('(').next().unwrap_or_default().trim();
                if !task.is_empty() {
                    group.task_type = task.to_string();
                }
            }
        }
        if !group.is_known() {
            continue;
        }

        let cell = |i: usize| data_cells.get(i).cloned().unwrap_or_default();
        let project_name = cell(0);
        if project_name.is_empty() || project_name.starts_with("Total") {
            continue;
        }
        records.push(RawRecord::ReportRow(ReportRow {
            end_date: group.end_date.clone(),
            task_type: group.task_type.clone(),
            project_name,
            color_block: cell(1),
            tag: cell(2),
            setup_notes: cell(3),
            owner_name: cell(4),
            ..ReportRow::default()
        }));
    }
    Ok(records)
}

/// Column positions found from header text.
#[derive(Debug, Default, PartialEq)]
struct ColumnMap {
    end_date: Option<usize>,
    task_type: Option<usize>,
    project_name: Option<usize>,
    color_block: Option<usize>,
    tag: Option<usize>,
    setup_notes: Option<usize>,
    owner_name: Option<usize>,
}

impl ColumnMap {
    /// Later headers win when several match the same field.
    fn from_headers(headers: &[String]) -> Self {
        let mut map = ColumnMap::default();
        for (idx, h) in headers.iter().enumerate() {
            if h.contains("end") || h.contains("date") || h.contains("calculated") {
                map.end_date = Some(idx);
            }
            if h.contains("task") && h.contains("name") {
                map.task_type = Some(idx);
            }
            if h.contains("project") && h.contains("name") {
                map.project_name = Some(idx);
            }
            if h.contains("color") {
                map.color_block = Some(idx);
            }
            if h.contains("tag") {
                map.tag = Some(idx);
            }
            if h.contains("setup") || h.contains("notes") {
                map.setup_notes = Some(idx);
            }
            if h.contains("owner") {
                map.owner_name = Some(idx);
            }
        }

        if map == ColumnMap::default() {
            return ColumnMap {
                end_date: Some(0),
                task_type: Some(1),
                project_name: Some(2),
                color_block: Some(3),
                tag: Some(4),
                setup_notes: Some(5),
                owner_name: None,
            };
        }
        map
    }
}

fn header_mapped_rows(table: ElementRef<'_>) -> Result<Vec<RawRecord>> {
    let header_cells = parse_selector("th, td")?;
    let header = table
        .select(&parse_selector("thead tr, tr:first-child")?)
        .next();
    let headers: Vec<String> = header
        .map(|row| {
            row.select(&header_cells)
                .map(|cell| text_content(cell).to_lowercase())
                .collect()
        })
        .unwrap_or_default();
    let columns = ColumnMap::from_headers(&headers);

    let td = parse_selector("td")?;
    let mut records = Vec::new();
    for row in table.select(&parse_selector("tbody tr, tr:not(:first-child)")?) {
        if header.is_some_and(|header| header.id() == row.id()) {
            continue;
        }
        let cells: Vec<String> = row.select(&td).map(text_content).collect();
        if cells.len() < 3 {
            continue;
        }
        let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).cloned().unwrap_or_default();

        let project_name = cell(columns.project_name);
        if project_name.is_empty() || project_name.starts_with("Total") {
            continue;
        }
        let end_date = cell(columns.end_date);
        let task_type = cell(columns.task_type);
        if end_date.starts_with("Total") || task_type.starts_with("Total") {
            continue;
        }

        records.push(RawRecord::ReportRow(ReportRow {
            end_date,
            task_type,
            project_name,
            color_block: cell(columns.color_block),
            tag: cell(columns.tag),
            setup_notes: cell(columns.setup_notes),
            owner_name: cell(columns.owner_name),
            ..ReportRow::default()
        }));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "https://acme.lightning.force.com/lightning/r/Report/00O1/view";

    fn wave(rows: &str) -> String {
        format!(
            r#"<div class="report-table-widget widgetReady finalState">
                 <table class="data-grid-full-table"><tbody>
                   <tr><th>End Date</th><th>Task</th><th>Project</th></tr>
                   {rows}
                 </tbody></table>
               </div>"#
        )
    }

    fn cell(label: &str, text: &str) -> String {
        format!(
            r#"<td role="gridcell"><div class="wave-table-cell-text" aria-label="{label}">{text}</div></td>"#
        )
    }

    fn rows(result: &ExtractionResult) -> Vec<&ReportRow> {
        result
            .data
            .iter()
            .filter_map(|r| match r {
                RawRecord::ReportRow(row) => Some(row),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn wave_rows_carry_group_values_forward() {
        let html = wave(&format!(
            "<tr>{}{}{}</tr><tr>{}{}{}</tr><tr>{}{}{}</tr>",
            cell("End Date: 2/10", "2/10"),
            cell("Task Type: Launch", "Launch"),
            cell("Project (Rollup): Project Name: Acme | Redesign 2025", "Acme | Redesign 2025"),
            cell("", ""),
            cell("", ""),
            cell("Project (Rollup): Project Name: Bolt | Redesign", "Bolt | Redesign"),
            cell("", ""),
            cell("", ""),
            cell("Project (Rollup): Project Name: Cove | Redesign", "Cove | Redesign"),
        ));
        let result = extract_report_grid(&Frame::parse(APP, &html));
        let rows = rows(&result);
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.end_date, "2/10");
            assert_eq!(row.task_type, "Launch");
        }
        assert_eq!(rows[0].project_name, "Acme | Redesign 2025");
        assert_eq!(rows[2].project_name, "Cove | Redesign");
        assert_eq!(result.diag.get("strategy").unwrap(), "wave-analytics");
    }

    #[test]
    fn wave_skips_rows_before_group_and_totals() {
        let html = wave(&format!(
            "<tr>{}{}{}</tr><tr>{}{}{}</tr><tr>{}{}{}</tr>",
            cell("", ""),
            cell("", ""),
            cell("Project Name: Orphan", "Orphan"),
            cell("End Date: 2/11", "2/11"),
            cell("Task Type: Design Setup", "Design Setup"),
            cell("Project Name: Acme | Premium", "Acme | Premium"),
            cell("", "Grand Total"),
            cell("", ""),
            cell("", "3"),
        ));
        let result = extract_report_grid(&Frame::parse(APP, &html));
        let rows = rows(&result);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].project_name, "Acme | Premium");
        assert_eq!(rows[0].task_type, "Design Setup");
    }

    #[test]
    fn unfinished_widget_falls_back_to_fixed_columns() {
        let html = r#"
            <div class="report-table-widget widgetReady"></div>
            <table>
              <tr><td data-fixed-column="true">2/12/2026</td><td data-fixed-column="true">Website Launch (2)</td>
                  <td data-fixed-column="false">Acme | Redesign</td><td data-fixed-column="false">Blue</td>
                  <td data-fixed-column="false">Launch 2/12 at 1 pm</td></tr>
              <tr><td data-fixed-column="false">Bolt | Redesign</td><td data-fixed-column="false">Red</td></tr>
              <tr><td data-fixed-column="true">Total</td><td data-fixed-column="false">Total</td></tr>
            </table>"#;
        let result = extract_report_grid(&Frame::parse(APP, html));
        let rows = rows(&result);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].end_date, "2/12/2026");
        assert_eq!(rows[0].task_type, "Website Launch");
        assert_eq!(rows[0].tag, "Launch 2/12 at 1 pm");
        assert_eq!(rows[1].project_name, "Bolt | Redesign");
        assert_eq!(rows[1].task_type, "Website Launch");
    }

    #[test]
    fn generic_table_maps_columns_by_header() {
        let html = r#"
            <table>
              <thead><tr><th>Owner</th><th>Project Name</th><th>End Date</th><th>Task Name</th><th>Tag</th></tr></thead>
              <tbody>
                <tr><td>Jane</td><td>Acme | Redesign</td><td>2/10</td><td>Design Setup</td><td></td></tr>
                <tr><td>Jane</td><td>Total</td><td></td><td></td><td></td></tr>
              </tbody>
            </table>"#;
        let result = extract_report_grid(&Frame::parse(APP, html));
        let rows = rows(&result);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].owner_name, "Jane");
        assert_eq!(rows[0].task_type, "Design Setup");
        assert_eq!(rows[0].end_date, "2/10");
    }

    #[test]
    fn header_row_of_plain_cells_is_not_a_record() {
        let html = r#"
            <table class="slds-table">
              <tr><td>Project Name</td><td>End Date</td><td>Task Name</td></tr>
              <tr><td>Acme | Redesign</td><td>2/10</td><td>Design Setup</td></tr>
            </table>"#;
        let result = extract_report_grid(&Frame::parse(APP, html));
        let rows = rows(&result);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].project_name, "Acme | Redesign");
        assert_eq!(rows[0].task_type, "Design Setup");
    }

    #[test]
    fn missing_table_is_reported() {
        let result = extract_report_grid(&Frame::parse(APP, "<p>Loading…</p>"));
        assert_eq!(result.error.as_deref(), Some("Report table not found"));
        assert!(result.data.is_empty());
    }
}
