// src/extract/tickets.rs

//! Ticket extractor.
//!
//! Strategies, most specific first:
//! 1. The `cc-sobject-table` component, one revision per row.
//! 2. A plain table whose header names due date, name and project columns.
//! 3. Generic table rows read as legacy tickets.
//! 4. Inside an application frame only, a scan of card-like elements,
//!    screened against navigation chrome.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use crate::error::Result;
use crate::extract::{Extracted, is_app_frame, run_extractor};
use crate::models::{Diag, ExtractionResult, LegacyTicket, RawRecord, RevisionTicket, TicketStatus};
use crate::page::{Frame, parse_selector, text_content};
use crate::parser::parse_revision_description;
use crate::utils::{char_len, truncate};

/// Text fragments that mark a card as navigation chrome.
pub const NAV_DENYLIST: [&str; 6] = [
    "dashboards",
    "sidebar",
    "navigator",
    "tab-nav",
    "main-nav",
    "breadcrumb",
];

static CAPITALIZED_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]+\s+[A-Z]").expect("valid regex"));

static SHORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}").expect("valid regex"));

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)").expect("valid regex"));

/// Extract tickets from one frame.
pub fn extract_tickets(frame: &Frame) -> ExtractionResult {
    run_extractor(frame, strategies)
}

fn strategies(frame: &Frame, diag: &mut Diag) -> Result<Extracted> {
    if let Some(component) = frame.first("cc-sobject-table") {
        diag.set("strategy", "cc-sobject-table");
        let Some(tbody) = component.select(&parse_selector("tbody")?).next() else {
            return Ok(Extracted::Failed(
                "tbody not found in cc-sobject-table".to_string(),
            ));
        };
        let records = component_rows(tbody, diag)?;
        if !records.is_empty() {
            return Ok(Extracted::Records(records));
        }
    }

    diag.set("strategy", "semantic-header");
    let records = semantic_table_rows(frame)?;
    if !records.is_empty() {
        return Ok(Extracted::Records(records));
    }

    diag.set("strategy", "legacy-table");
    let records = legacy_rows(frame, diag)?;
    if !records.is_empty() {
        return Ok(Extracted::Records(records));
    }

    if is_app_frame(frame.url()) {
        diag.set("strategy", "card-scan");
        return Ok(Extracted::Records(card_scan(frame, diag)?));
    }
    Ok(Extracted::Records(Vec::new()))
}

/// `title` attribute of the first descendant matching `selector`.
fn titled(cell: ElementRef<'_>, selector: &str) -> Result<Option<String>> {
    Ok(cell
        .select(&parse_selector(selector)?)
        .next()
        .and_then(|el| el.value().attr("title"))
        .filter(|title| !title.is_empty())
        .map(str::to_string))
}

fn component_rows(tbody: ElementRef<'_>, diag: &mut Diag) -> Result<Vec<RawRecord>> {
    let td = parse_selector("td")?;
    let link = parse_selector("a")?;
    let checkbox = parse_selector(r#"input[type="checkbox"]"#)?;
    let error_icon = parse_selector(".slds-icon-text-error")?;
    let warning_icon = parse_selector(".slds-icon-text-warning")?;

    let rows: Vec<ElementRef> = tbody.select(&parse_selector("tr")?).collect();
    diag.set("rowsFound", rows.len());

    let mut records = Vec::new();
    for row in rows {
        let cells: Vec<ElementRef> = row.select(&td).collect();
        if cells.len() < 3 {
            continue;
        }

        let name = match cells.get(3) {
            Some(cell) => titled(*cell, "div[title]")?.unwrap_or_else(|| text_content(*cell)),
            None => String::new(),
        };
        if char_len(&name) < 2 {
            continue;
        }

        let mut ticket = RevisionTicket {
            name,
            due_date: titled(cells[2], "span[title]")?,
            ..RevisionTicket::default()
        };

        if let Some(cell) = cells.get(4) {
            if let Some(a) = cell.select(&link).next() {
                ticket.project = text_content(a);
                ticket.project_href = a.value().attr("href").unwrap_or_default().to_string();
            }
            if ticket.project.is_empty() {
                ticket.project = text_content(*cell);
            }
        }
        if let Some(cell) = cells.get(5) {
            ticket.description = titled(*cell, "div.slds-rich-text-editor__output[title]")?
                .unwrap_or_else(|| text_content(*cell));
        }
        apply_description(&mut ticket);

        if let Some(cell) = cells.get(6) {
            ticket.priority = titled(*cell, "span[title]")?.unwrap_or_else(|| text_content(*cell));
        }
        if let Some(cell) = cells.get(7) {
            ticket.created_date =
                titled(*cell, "span[title]")?.unwrap_or_else(|| text_content(*cell));
        }
        if let Some(cell) = cells.get(8) {
            ticket.completed = cell
                .select(&checkbox)
                .next()
                .is_some_and(|input| input.value().attr("checked").is_some());
        }
        ticket.status = if cells[0].select(&error_icon).next().is_some() {
            TicketStatus::Overdue
        } else if cells[0].select(&warning_icon).next().is_some() {
            TicketStatus::Warning
        } else {
            TicketStatus::Ok
        };

        records.push(RawRecord::Revision(ticket));
    }
    Ok(records)
}

fn apply_description(ticket: &mut RevisionTicket) {
    let details = parse_revision_description(&ticket.description);
    ticket.hours = details.hours;
    ticket.revision_label = details.revision_label;
    ticket.web_view_url = details.web_view_url;
    ticket.assignees = details.assignees;
}

/// Whether an uppercased header row names the ticket table's columns.
pub(crate) fn is_ticket_header(header: &str) -> bool {
    header.contains("DUE")
        && (header.contains("NAME") || header.contains("TITLE"))
        && (header.contains("PROJECT") || header.contains("ACCOUNT"))
}

/// Column positions in a ticket table, from uppercased header cells.
#[derive(Debug, Default)]
struct TicketColumns {
    due: Option<usize>,
    name: Option<usize>,
    project: Option<usize>,
    description: Option<usize>,
    priority: Option<usize>,
    created: Option<usize>,
}

impl TicketColumns {
    fn from_headers(headers: &[String]) -> Self {
        let mut columns = TicketColumns::default();
        for (idx, h) in headers.iter().enumerate() {
            let slot = if h.contains("DUE") {
                &mut columns.due
            } else if h.contains("PROJECT") || h.contains("ACCOUNT") {
                &mut columns.project
            } else if h.contains("NAME") || h.contains("TITLE") {
                &mut columns.name
            } else if h.contains("DESCRIPTION") {
                &mut columns.description
            } else if h.contains("PRIORITY") {
                &mut columns.priority
            } else if h.contains("CREATED") {
                &mut columns.created
            } else {
                continue;
            };
            slot.get_or_insert(idx);
        }
        columns
    }
}

fn semantic_table_rows(frame: &Frame) -> Result<Vec<RawRecord>> {
    let header_row = parse_selector("thead tr, tr:first-child")?;
    let header_cells = parse_selector("th, td")?;
    let data_rows = parse_selector("tbody tr, tr:not(:first-child)")?;
    let td = parse_selector("td")?;

    for table in frame.select("table")? {
        let Some(header) = table.select(&header_row).next() else {
            continue;
        };
        if !is_ticket_header(&text_content(header).to_uppercase()) {
            continue;
        }

        let headers: Vec<String> = header
            .select(&header_cells)
            .map(|cell| text_content(cell).to_uppercase())
            .collect();
        let columns = TicketColumns::from_headers(&headers);

        let mut records = Vec::new();
        for row in table.select(&data_rows) {
            if row.id() == header.id() {
                continue;
            }
            let cells: Vec<String> = row.select(&td).map(text_content).collect();
            if cells.len() < 3 {
                continue;
            }
            let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).cloned().unwrap_or_default();

            let name = cell(columns.name);
            if char_len(&name) < 2 {
                continue;
            }
            let due = cell(columns.due);
            let mut ticket = RevisionTicket {
                name,
                project: cell(columns.project),
                description: cell(columns.description),
                due_date: (!due.is_empty()).then_some(due),
                priority: cell(columns.priority),
                created_date: cell(columns.created),
                ..RevisionTicket::default()
            };
            apply_description(&mut ticket);
            records.push(RawRecord::Revision(ticket));
        }
        if !records.is_empty() {
            return Ok(records);
        }
    }
    Ok(Vec::new())
}

/// Number at the start of `text`, the way a lenient float parse reads it.
fn leading_number(text: &str) -> Option<f64> {
    LEADING_NUMBER
        .find(text.trim())
        .and_then(|m| m.as_str().parse().ok())
}

fn legacy_rows(frame: &Frame, diag: &mut Diag) -> Result<Vec<RawRecord>> {
    let rows = frame.select(r#"table tbody tr, tr.dataRow, tr[class*="Row"]"#)?;
    diag.set("matchedRows", rows.len());
    let td = parse_selector("td")?;

    let mut records = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.select(&td).map(text_content).collect();
        if cells.len() < 2 {
            continue;
        }
        if text_content(row).contains("Total") {
            continue;
        }
        let project_name = cells[0].clone();
        if char_len(&project_name) < 2 {
            continue;
        }

        let rest = &cells[2..];
        let estimated_hours = rest
            .iter()
            .filter(|text| !SHORT_DATE.is_match(text))
            .filter_map(|text| leading_number(text))
            .find(|hours| *hours > 0.0 && *hours < 100.0)
            .unwrap_or(1.0);
        let due_date = rest
            .iter()
            .find(|text| SHORT_DATE.is_match(text))
            .cloned()
            .unwrap_or_default();
        let description = if cells[1].is_empty() {
            "Revision".to_string()
        } else {
            cells[1].clone()
        };

        records.push(RawRecord::LegacyTicket(LegacyTicket {
            project_name,
            description,
            estimated_hours,
            due_date,
        }));
    }
    Ok(records)
}

/// Whether card text looks like a ticket rather than app chrome.
pub fn is_plausible_card(text: &str) -> bool {
    let lower = text.to_lowercase();
    if NAV_DENYLIST.iter().any(|pattern| lower.contains(pattern)) {
        return false;
    }
    if text.contains("Dashboards") && lower.matches("dashboards").count() > 1 {
        return false;
    }
    let len = char_len(text);
    len > 5 && len < 300 && CAPITALIZED_PAIR.is_match(text)
}

fn card_scan(frame: &Frame, diag: &mut Diag) -> Result<Vec<RawRecord>> {
    let cards = frame.select(r#"[class*="ticket"], [class*="task"], [class*="card"]"#)?;
    diag.set("cardElements", cards.len());

    Ok(cards
        .into_iter()
        .map(text_content)
        .filter(|text| is_plausible_card(text))
        .map(|text| {
            RawRecord::LegacyTicket(LegacyTicket {
                project_name: truncate(&text, 80),
                description: "Revision".to_string(),
                estimated_hours: 1.0,
                due_date: String::new(),
            })
        })
        .collect())
}
