// src/pipeline/plan.rs

//! Import → normalize → merge.

use crate::models::{Config, ImportReport, SourceKind, WeeklyPlan};
use crate::page::PageHost;
use crate::parser::{Normalizer, WeekContext};
use crate::pipeline::run_import;
use crate::services::MergeEngine;
use crate::utils::log;

/// Turn a finished import report into a placed week.
///
/// Failed or missing sources contribute no items.
pub fn plan_from_report(config: &Config, report: &ImportReport) -> WeeklyPlan {
    let monday = config.schedule.week_monday();
    let normalizer = Normalizer::new(WeekContext::new(monday), &config.schedule);

    let items = |kind: SourceKind| normalizer.source(kind, report.data(kind));
    let report_items = items(SourceKind::ReportGrid);
    let calendar_items = items(SourceKind::Calendar);
    let ticket_items = items(SourceKind::Tickets);
    ::log::debug!(
        "Normalized {} report, {} calendar and {} ticket items",
        report_items.len(),
        calendar_items.len(),
        ticket_items.len()
    );

    MergeEngine::new(&config.schedule).merge(monday, report_items, calendar_items, ticket_items)
}

/// Import all configured sources and plan the week from whatever arrived.
pub async fn run_plan<H>(host: &H, config: &Config) -> (ImportReport, WeeklyPlan)
where
    H: PageHost + ?Sized,
{
    log::step(1, 2, "Importing sources");
    let report = run_import(host, config, &SourceKind::ALL).await;

    log::step(2, 2, "Merging into weekly plan");
    let plan = plan_from_report(config, &report);
    log::summary(
        "Weekly plan",
        &[
            ("Week of", plan.week_start.to_string()),
            ("Items", plan.items.len().to_string()),
            (
                "Scheduled",
                log::format_minutes(i64::from(plan.capacity.total_scheduled_minutes)),
            ),
            ("Remaining", log::format_minutes(plan.capacity.remaining_minutes)),
            ("Overflow", plan.overflow_count().to_string()),
            ("Conflicts", plan.conflicts.len().to_string()),
        ],
    );
    (report, plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKind, SourceOutcome, SourceResult};

    #[test]
    fn empty_report_gives_only_defaults() {
        let mut config = Config::default();
        config.schedule.week_start = chrono::NaiveDate::from_ymd_opt(2026, 2, 9);

        let plan = plan_from_report(&config, &ImportReport::default());
        assert_eq!(plan.items.len(), 10);
        assert!(
            plan.items
                .iter()
                .all(|i| matches!(i.kind, ItemKind::Break | ItemKind::Buffer))
        );
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn failed_sources_contribute_nothing() {
        let mut config = Config::default();
        config.schedule.week_start = chrono::NaiveDate::from_ymd_opt(2026, 2, 9);
        let mut report = ImportReport::default();
        report.insert(SourceResult::new(SourceKind::Calendar, SourceOutcome::NeedsLogin));

        assert_eq!(plan_from_report(&config, &report).items.len(), 10);
    }
}
