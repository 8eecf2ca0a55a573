// src/parser/normalize.rs

//! Raw records to schedule items, one function per source shape.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::models::{
    CalendarEvent, ItemKind, LegacyTicket, RawRecord, ReportRow, RevisionTicket, ScheduleConfig,
    ScheduleItem, SourceKind, Tier, Weekday,
};
use crate::parser::dates::{WeekContext, parse_tag};
use crate::parser::labels::parse_calendar_label;

const SETUP_TASK: &str = "Design Setup";
const LAUNCH_TASK: &str = "Website Launch";
const MAX_SETUP_BLOCK_HOURS: u32 = 4;
const MAX_EVENT_MINUTES: i64 = 480;
const TICKET_START_HOUR: f64 = 15.0;

/// Detect the setup tier from a project name.
pub fn detect_tier(project_name: &str) -> Tier {
    let lower = project_name.to_lowercase();
    if lower.contains("ultimate") {
        Tier::Ultimate
    } else if lower.contains("premium") {
        Tier::Premium
    } else {
        Tier::Standard
    }
}

/// `"Chino Valley AZ | MWC Ultimate Redesign"` becomes `"Chino Valley AZ"`.
pub fn short_name(full_name: &str) -> &str {
    full_name.split('|').next().unwrap_or(full_name).trim()
}

/// Round minutes to the nearest granularity step, never below one step.
pub fn round_duration(minutes: i64, granularity: u32) -> u32 {
    let step = i64::from(granularity.max(1));
    let rounded = ((minutes as f64 / step as f64).round() as i64 * step).max(step);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Stable identifier derived from a record's content.
pub fn source_id(prefix: &str, fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", prefix, &digest[..12])
}

/// Converts one source's raw records into schedule items for a given week.
pub struct Normalizer {
    week: WeekContext,
    granularity: u32,
    work_start_hour: f64,
    work_end_hour: f64,
}

impl Normalizer {
    pub fn new(week: WeekContext, schedule: &ScheduleConfig) -> Self {
        Self {
            week,
            granularity: schedule.granularity_minutes,
            work_start_hour: schedule.work_start_hour,
            work_end_hour: schedule.work_end_hour,
        }
    }

    pub fn week(&self) -> &WeekContext {
        &self.week
    }

    /// Normalize the records a source produced.
    pub fn source(&self, kind: SourceKind, records: &[RawRecord]) -> Vec<ScheduleItem> {
        let items = match kind {
            SourceKind::ReportGrid => self.report_grid(records),
            SourceKind::Calendar => self.calendar(records),
            SourceKind::Tickets => self.tickets(records),
        };
        unique_source_ids(items)
    }

    /// Setup blocks and launches from report-grid rows.
    pub fn report_grid(&self, records: &[RawRecord]) -> Vec<ScheduleItem> {
        records
            .iter()
            .filter_map(|record| match record {
                RawRecord::ReportRow(row) => Some(row),
                _ => None,
            })
            .flat_map(|row| self.report_row(row))
            .collect()
    }

    fn report_row(&self, row: &ReportRow) -> Vec<ScheduleItem> {
        let name = short_name(&row.project_name);
        match row.task_type.trim() {
            SETUP_TASK => {
                let tier = detect_tier(&row.project_name);
                let id = source_id(
                    "report",
                    &[&row.project_name, &row.task_id, &row.end_date, SETUP_TASK],
                );
                let hours = tier.setup_hours();
                let title = format!("{} – {} Setup", name, tier.label());

                let mut blocks = vec![
                    ScheduleItem::new(tier.kind(), &title, hours.min(MAX_SETUP_BLOCK_HOURS) * 60)
                        .at(Weekday::Monday, self.work_start_hour)
                        .with_source_id(&id),
                ];
                if hours > MAX_SETUP_BLOCK_HOURS {
                    blocks.push(
                        ScheduleItem::new(
                            tier.kind(),
                            format!("{title} (cont.)"),
                            (hours - MAX_SETUP_BLOCK_HOURS) * 60,
                        )
                        .at(Weekday::Tuesday, self.work_start_hour)
                        .with_source_id(format!("{id}-2")),
                    );
                }
                blocks
            }
            LAUNCH_TASK => {
                let (day, start_hour, minutes) = match parse_tag(&row.tag, &self.week) {
                    Some(range) => (range.day, range.start_hour, range.duration_minutes()),
                    None => (Weekday::Monday, 10.0, 60),
                };
                let id = source_id("report", &[&row.project_name, &row.task_id, LAUNCH_TASK]);
                let item = ScheduleItem::new(
                    ItemKind::Launch,
                    format!("{name} – Redesign Launch"),
                    round_duration(minutes, self.granularity),
                )
                .at(day, self.snap(start_hour))
                .with_source_id(id)
                .locked(true);
                self.in_window(item).into_iter().collect()
            }
            other => {
                log::debug!("Ignoring report row with task type '{}'", other);
                Vec::new()
            }
        }
    }

    /// Meetings and launches from calendar labels.
    pub fn calendar(&self, records: &[RawRecord]) -> Vec<ScheduleItem> {
        records
            .iter()
            .filter_map(|record| match record {
                RawRecord::CalendarEvent(event) => self.calendar_event(event),
                _ => None,
            })
            .collect()
    }

    fn calendar_event(&self, event: &CalendarEvent) -> Option<ScheduleItem> {
        let parsed = parse_calendar_label(&event.label, &self.week)?;
        let minutes = parsed.duration_minutes();
        if minutes <= 0 || minutes > MAX_EVENT_MINUTES {
            log::debug!("Dropping calendar event '{}' lasting {}m", parsed.title, minutes);
            return None;
        }

        let kind = if parsed.is_launch {
            ItemKind::Launch
        } else {
            ItemKind::Meeting
        };
        let item = ScheduleItem::new(kind, &parsed.title, round_duration(minutes, self.granularity))
            .at(parsed.day, self.snap(parsed.start_hour))
            .with_source_id(source_id("calendar", &[&event.label]))
            .locked(!parsed.is_launch);
        self.in_window(item)
    }

    /// Revision items from either ticket format. Completed revisions are
    /// skipped; tickets without a usable due date are spread round-robin.
    pub fn tickets(&self, records: &[RawRecord]) -> Vec<ScheduleItem> {
        let mut next_day = 0;
        let mut items = Vec::new();

        for record in records {
            let round_robin = Weekday::from_index(next_day);
            let item = match record {
                RawRecord::Revision(ticket) if ticket.completed => continue,
                RawRecord::Revision(ticket) => self.revision(ticket, round_robin),
                RawRecord::LegacyTicket(ticket) => self.legacy_ticket(ticket, round_robin),
                _ => continue,
            };
            items.push(item);
            next_day += 1;
        }
        items
    }

    fn revision(&self, ticket: &RevisionTicket, fallback_day: Weekday) -> ScheduleItem {
        let hours = if ticket.hours > 0.0 { ticket.hours } else { 1.0 };
        let project = if ticket.project.is_empty() {
            &ticket.name
        } else {
            &ticket.project
        };
        let label = if ticket.revision_label.is_empty() {
            &ticket.name
        } else {
            &ticket.revision_label
        };
        let day = ticket
            .due_date
            .as_deref()
            .and_then(|due| self.week.weekday_in_slash_date(due))
            .unwrap_or(fallback_day);

        let id = source_id(
            "ticket",
            &[
                &ticket.name,
                project,
                &ticket.description,
                ticket.due_date.as_deref().unwrap_or_default(),
            ],
        );
        ScheduleItem::new(
            ItemKind::Revision,
            format!("{} – {}", short_name(project), label),
            round_duration((hours * 60.0).round() as i64, self.granularity),
        )
        .at(day, TICKET_START_HOUR)
        .with_source_id(id)
    }

    fn legacy_ticket(&self, ticket: &LegacyTicket, fallback_day: Weekday) -> ScheduleItem {
        let hours = if ticket.estimated_hours > 0.0 {
            ticket.estimated_hours
        } else {
            1.0
        };
        let day = self
            .week
            .weekday_in_slash_date(&ticket.due_date)
            .unwrap_or(fallback_day);

        let id = source_id(
            "ticket",
            &[&ticket.project_name, &ticket.description, &ticket.due_date],
        );
        ScheduleItem::new(
            ItemKind::Revision,
            format!("{} – Revision", ticket.project_name),
            round_duration((hours * 60.0).round() as i64, self.granularity),
        )
        .at(day, TICKET_START_HOUR)
        .with_source_id(id)
    }

    /// Snap an hour to the granularity grid.
    fn snap(&self, hour: f64) -> f64 {
        let steps_per_hour = 60.0 / f64::from(self.granularity.max(1));
        (hour * steps_per_hour).round() / steps_per_hour
    }

    fn in_window(&self, item: ScheduleItem) -> Option<ScheduleItem> {
        if item.start_hour < self.work_start_hour || item.start_hour >= self.work_end_hour {
            log::debug!(
                "Dropping '{}' starting at {} outside working hours",
                item.title,
                item.start_hour
            );
            return None;
        }
        Some(item)
    }
}

/// Suffix repeated source ids so each raw record keeps its own id.
fn unique_source_ids(mut items: Vec<ScheduleItem>) -> Vec<ScheduleItem> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for item in &mut items {
        if let Some(id) = item.source_id.take() {
            let count = seen.entry(id.clone()).or_insert(0);
            *count += 1;
            item.source_id = Some(if *count == 1 {
                id
            } else {
                format!("{}-{}", id, count)
            });
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn normalizer() -> Normalizer {
        let week = WeekContext::new(NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        Normalizer::new(week, &ScheduleConfig::default())
    }

    fn report_row(task_type: &str, project: &str, tag: &str) -> RawRecord {
        RawRecord::ReportRow(ReportRow {
            end_date: "2/10/2026".into(),
            task_type: task_type.into(),
            project_name: project.into(),
            tag: tag.into(),
            ..ReportRow::default()
        })
    }

    #[test]
    fn test_detect_tier_and_short_name() {
        assert_eq!(detect_tier("Acme | MWC Ultimate Redesign"), Tier::Ultimate);
        assert_eq!(detect_tier("Acme | Migration Premium"), Tier::Premium);
        assert_eq!(detect_tier("Acme | Redesign"), Tier::Standard);
        assert_eq!(short_name("Chino Valley AZ | MWC Ultimate Redesign 1125"), "Chino Valley AZ");
    }

    #[test]
    fn test_round_duration() {
        assert_eq!(round_duration(15, 30), 30);
        assert_eq!(round_duration(44, 30), 30);
        assert_eq!(round_duration(45, 30), 60);
        assert_eq!(round_duration(0, 30), 30);
        assert_eq!(round_duration(240, 30), 240);
    }

    #[test]
    fn test_setup_rows_split_into_blocks() {
        let items = normalizer().report_grid(&[
            report_row("Design Setup", "Acme | Ultimate Redesign", ""),
            report_row("Design Setup", "Bolt | Redesign", ""),
        ]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, ItemKind::SetupUltimate);
        assert_eq!(items[0].duration_minutes, 240);
        assert_eq!(items[1].title, "Acme – Ultimate Setup (cont.)");
        assert_eq!(items[1].duration_minutes, 240);
        assert_eq!(items[2].kind, ItemKind::SetupStandard);
        assert_eq!(items[2].duration_minutes, 180);
        assert_ne!(items[0].source_id, items[1].source_id);
    }

    #[test]
    fn test_launch_row_uses_tag_time() {
        let items = normalizer().report_grid(&[
            report_row("Website Launch", "Acme | Redesign", "Launch 2/11 at 1 pm"),
            report_row("Website Launch", "Bolt | Redesign", "TBD"),
        ]);
        assert_eq!(items[0].title, "Acme – Redesign Launch");
        assert_eq!((items[0].day, items[0].start_hour), (Weekday::Wednesday, 13.0));
        assert_eq!(items[0].duration_minutes, 60);
        assert!(items[0].locked);
        assert_eq!((items[1].day, items[1].start_hour), (Weekday::Monday, 10.0));
    }

    #[test]
    fn test_calendar_events_filtered_by_duration() {
        let records = [
            "Weekly Sync, February 10, 2026, 10:00 AM, 10:30 AM, Jane Doe",
            "Redesign Launch – Acme, February 12, 2026, 2:00 PM, 3:00 PM",
            "Conference, February 11, 2026, 8:00 AM, 5:00 PM",
            "Backwards, February 11, 2026, 11:00 AM, 10:00 AM",
        ]
        .map(|label| {
            RawRecord::CalendarEvent(CalendarEvent {
                label: label.to_string(),
            })
        });
        let items = normalizer().calendar(&records);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, ItemKind::Meeting);
        assert!(items[0].locked);
        assert_eq!(items[1].kind, ItemKind::Launch);
        assert!(!items[1].locked);
    }

    #[test]
    fn test_tickets_skip_completed_and_round_robin() {
        let records = vec![
            RawRecord::Revision(RevisionTicket {
                name: "REV-1".into(),
                project: "Acme | Redesign".into(),
                revision_label: "Design Revisions 1".into(),
                hours: 2.0,
                due_date: Some("2/12/2026".into()),
                ..RevisionTicket::default()
            }),
            RawRecord::Revision(RevisionTicket {
                name: "REV-2".into(),
                completed: true,
                ..RevisionTicket::default()
            }),
            RawRecord::LegacyTicket(LegacyTicket {
                project_name: "Bolt".into(),
                description: "Revision".into(),
                estimated_hours: 0.0,
                due_date: String::new(),
            }),
        ];
        let items = normalizer().tickets(&records);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Acme – Design Revisions 1");
        assert_eq!(items[0].day, Weekday::Thursday);
        assert_eq!(items[0].duration_minutes, 120);
        assert_eq!(items[1].title, "Bolt – Revision");
        assert_eq!(items[1].day, Weekday::Tuesday);
        assert_eq!(items[1].duration_minutes, 60);
        assert_eq!(items[1].start_hour, 15.0);
    }

    #[test]
    fn test_duplicate_records_get_distinct_ids() {
        let row = report_row("Website Launch", "Acme | Redesign", "");
        let items = normalizer().source(SourceKind::ReportGrid, &[row.clone(), row]);
        assert_eq!(items.len(), 2);
        assert_ne!(items[0].source_id, items[1].source_id);
    }
}
