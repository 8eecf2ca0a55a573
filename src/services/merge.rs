// src/services/merge.rs

//! Merge and reconciliation of normalized items into one placed week.
//!
//! 1. Report-grid launches that a calendar launch already covers are dropped.
//! 2. The three sources are concatenated.
//! 3. A lunch break and an admin buffer are added to every weekday.
//! 4. Flexible items (setups, then revisions) are placed first-fit. Items
//!    with no room anywhere overflow and are flagged instead of dropped.

use chrono::NaiveDate;

use crate::models::{ItemKind, ScheduleConfig, ScheduleItem, Weekday, WeeklyPlan};
use crate::services::planner::{
    WorkWindow, calculate_capacity, find_available_slot, find_conflicts,
};

pub const LUNCH_TITLE: &str = "Lunch Break";
pub const ADMIN_TITLE: &str = "Daily Admin";

/// Minimum length of a title word that counts as a launch match.
const MIN_MATCH_WORD_CHARS: usize = 4;

/// Whether a report-grid launch title shares a significant word with a
/// calendar launch title. Deliberately loose.
pub fn launches_match(report_title: &str, calendar_title: &str) -> bool {
    let calendar = calendar_title.to_lowercase();
    report_title
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '–' || c == '-')
        .any(|word| word.chars().count() >= MIN_MATCH_WORD_CHARS && calendar.contains(word))
}

/// Drop report-grid launches the calendar already has.
pub fn dedupe_launches(report: Vec<ScheduleItem>, calendar: &[ScheduleItem]) -> Vec<ScheduleItem> {
    let calendar_launches: Vec<&str> = calendar
        .iter()
        .filter(|item| item.kind == ItemKind::Launch)
        .map(|item| item.title.as_str())
        .collect();

    let (launches, mut kept): (Vec<ScheduleItem>, Vec<ScheduleItem>) = report
        .into_iter()
        .partition(|item| item.kind == ItemKind::Launch);

    for launch in launches {
        let covered = calendar_launches
            .iter()
            .any(|title| launches_match(&launch.title, title));
        if covered {
            log::debug!("Dropping report launch '{}' in favor of calendar timing", launch.title);
        } else {
            kept.push(launch);
        }
    }
    kept
}

/// Combines sources into a [`WeeklyPlan`]. Never fails.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    window: WorkWindow,
    granularity: u32,
    capacity_minutes: u32,
    lunch_hour: f64,
    admin_hour: f64,
}

impl MergeEngine {
    pub fn new(schedule: &ScheduleConfig) -> Self {
        Self {
            window: WorkWindow {
                start_hour: schedule.work_start_hour,
                end_hour: schedule.work_end_hour,
            },
            granularity: schedule.granularity_minutes,
            capacity_minutes: schedule.weekly_capacity_minutes,
            lunch_hour: schedule.lunch_hour,
            admin_hour: schedule.admin_hour,
        }
    }

    /// The per-weekday lunch and admin blocks.
    pub fn defaults(&self) -> Vec<ScheduleItem> {
        Weekday::ALL
            .iter()
            .flat_map(|day| {
                let slug = day.label().to_lowercase();
                [
                    ScheduleItem::new(ItemKind::Break, LUNCH_TITLE, self.granularity)
                        .at(*day, self.lunch_hour)
                        .with_source_id(format!("default-lunch-{}", slug)),
                    ScheduleItem::new(ItemKind::Buffer, ADMIN_TITLE, self.granularity)
                        .at(*day, self.admin_hour)
                        .with_source_id(format!("default-admin-{}", slug)),
                ]
            })
            .collect()
    }

    /// Merge the three normalized sources.
    pub fn merge(
        &self,
        week_start: NaiveDate,
        report: Vec<ScheduleItem>,
        calendar: Vec<ScheduleItem>,
        tickets: Vec<ScheduleItem>,
    ) -> WeeklyPlan {
        let mut items = dedupe_launches(report, &calendar);
        items.extend(calendar);
        items.extend(tickets);
        items.extend(self.defaults());
        self.plan(week_start, items)
    }

    /// Place flexible items and total up an already merged item list.
    pub fn plan(&self, week_start: NaiveDate, items: Vec<ScheduleItem>) -> WeeklyPlan {
        let items = self.place(items);
        let fixed: Vec<&ScheduleItem> = items.iter().filter(|i| !i.kind.is_flexible()).collect();
        let conflicts = Weekday::ALL
            .iter()
            .flat_map(|day| find_conflicts(fixed.iter().copied(), *day))
            .collect();

        WeeklyPlan {
            week_start,
            capacity: calculate_capacity(&items, self.capacity_minutes),
            items,
            conflicts,
        }
    }

    /// First-fit placement. Fixed items stay where they are; setups scan
    /// Monday to Friday, revisions start with the day they were given.
    pub fn place(&self, items: Vec<ScheduleItem>) -> Vec<ScheduleItem> {
        let (flexible, mut placed): (Vec<ScheduleItem>, Vec<ScheduleItem>) =
            items.into_iter().partition(|item| item.kind.is_flexible());
        let (setups, revisions): (Vec<ScheduleItem>, Vec<ScheduleItem>) =
            flexible.into_iter().partition(|item| item.kind.is_setup());

        for setup in setups {
            let item = self.place_one(&placed, setup, Weekday::ALL.to_vec(), Weekday::Monday);
            placed.push(item);
        }
        for revision in revisions {
            let preferred = revision.day;
            let mut days = vec![preferred];
            days.extend(Weekday::ALL.iter().copied().filter(|d| *d != preferred));
            let item = self.place_one(&placed, revision, days, preferred);
            placed.push(item);
        }
        placed
    }

    fn place_one(
        &self,
        placed: &[ScheduleItem],
        mut item: ScheduleItem,
        days: Vec<Weekday>,
        overflow_day: Weekday,
    ) -> ScheduleItem {
        item.overflow = false;
        for day in days {
            if let Some(start) = find_available_slot(placed, day, item.duration_minutes, self.window) {
                item.day = day;
                item.start_hour = start;
                return item;
            }
        }

        log::warn!(
            "No room for '{}' ({} min); overflowing onto {}",
            item.title,
            item.duration_minutes,
            overflow_day.label()
        );
        item.day = overflow_day;
        item.start_hour = self.window.start_hour;
        item.overflow = true;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MergeEngine {
        MergeEngine::new(&ScheduleConfig::default())
    }

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 9).unwrap()
    }

    fn assert_no_overlap(plan: &WeeklyPlan) {
        for (i, a) in plan.items.iter().enumerate() {
            for b in &plan.items[i + 1..] {
                if a.overlaps(b) {
                    assert!(
                        a.overflow || b.overflow || (!a.kind.is_flexible() && !b.kind.is_flexible()),
                        "{} overlaps {}",
                        a.title,
                        b.title
                    );
                }
            }
        }
    }

    #[test]
    fn calendar_launch_wins() {
        let report = vec![
            ScheduleItem::new(ItemKind::Launch, "Acme – Redesign Launch", 60).at(Weekday::Tuesday, 10.0),
            ScheduleItem::new(ItemKind::Launch, "Bolt – Redesign Launch", 60).at(Weekday::Tuesday, 10.0),
        ];
        let calendar = vec![
            ScheduleItem::new(ItemKind::Launch, "Redesign Launch – Acme, TX", 60).at(Weekday::Tuesday, 14.0),
        ];
        let kept = dedupe_launches(report, &calendar);
        // "redesign" and "launch" also match, so both report launches are covered
        assert!(kept.is_empty());

        let report = vec![ScheduleItem::new(ItemKind::Launch, "Acme – Go Live", 60)];
        let calendar = vec![ScheduleItem::new(ItemKind::Launch, "Launch: Acme, TX", 60)];
        assert!(dedupe_launches(report, &calendar).is_empty());

        let report = vec![ScheduleItem::new(ItemKind::Launch, "Cove – Go Live", 60)];
        assert_eq!(dedupe_launches(report, &calendar).len(), 1);
    }

    #[test]
    fn calendar_meetings_do_not_dedupe_launches() {
        let report = vec![ScheduleItem::new(ItemKind::Launch, "Acme – Redesign Launch", 60)];
        let calendar = vec![ScheduleItem::new(ItemKind::Meeting, "Acme kickoff", 60).locked(true)];
        assert_eq!(dedupe_launches(report, &calendar).len(), 1);
    }

    #[test]
    fn empty_sources_give_defaults_only() {
        let plan = engine().merge(week(), Vec::new(), Vec::new(), Vec::new());
        assert_eq!(plan.items.len(), 10);
        for day in Weekday::ALL {
            let kinds: Vec<ItemKind> = plan.items_on(day).map(|i| i.kind).collect();
            assert_eq!(kinds, vec![ItemKind::Break, ItemKind::Buffer]);
        }
        assert!(plan.items.iter().all(|i| i.duration_minutes == 30));
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn setup_moves_to_next_free_day() {
        let busy = vec![
            ScheduleItem::new(ItemKind::Meeting, "Workshop AM", 240).at(Weekday::Monday, 8.0).locked(true),
            ScheduleItem::new(ItemKind::Meeting, "Workshop PM", 270).at(Weekday::Monday, 12.5).locked(true),
        ];
        let setup = ScheduleItem::new(ItemKind::SetupPremium, "Acme – Premium Setup", 240);
        let plan = engine().merge(week(), vec![setup], busy, Vec::new());

        let placed = plan.items.iter().find(|i| i.kind.is_setup()).unwrap();
        assert_eq!(placed.day, Weekday::Tuesday);
        assert_eq!(placed.start_hour, 8.0);
        assert!(!placed.overflow);
        assert_no_overlap(&plan);
    }

    #[test]
    fn placement_is_idempotent() {
        let items = vec![
            ScheduleItem::new(ItemKind::SetupUltimate, "Acme – Ultimate Setup", 240),
            ScheduleItem::new(ItemKind::SetupUltimate, "Acme – Ultimate Setup (cont.)", 240),
            ScheduleItem::new(ItemKind::Revision, "Bolt – Design Revisions 1", 90).at(Weekday::Monday, 15.0),
            ScheduleItem::new(ItemKind::Meeting, "Sync", 60).at(Weekday::Monday, 9.0).locked(true),
        ];
        let engine = engine();
        let mut all = items;
        all.extend(engine.defaults());

        let once = engine.place(all);
        let twice = engine.place(once.clone());
        assert_eq!(once.len(), twice.len());
        for (item, again) in once.iter().zip(&twice) {
            assert_eq!(again.title, item.title);
            assert_eq!((again.day, again.start_hour), (item.day, item.start_hour), "{}", item.title);
        }
    }

    #[test]
    fn full_week_overflows_and_flags() {
        let engine = engine();
        let blockers: Vec<ScheduleItem> = Weekday::ALL
            .iter()
            .map(|d| ScheduleItem::new(ItemKind::Meeting, format!("Offsite {}", d.label()), 540).at(*d, 8.0).locked(true))
            .collect();
        let setup = ScheduleItem::new(ItemKind::SetupStandard, "Cove – Standard Setup", 180);
        let revision = ScheduleItem::new(ItemKind::Revision, "Cove – Revision", 60).at(Weekday::Wednesday, 15.0);

        let plan = engine.merge(week(), vec![setup], blockers, vec![revision]);
        assert_eq!(plan.overflow_count(), 2);
        let setup = plan.items.iter().find(|i| i.kind.is_setup()).unwrap();
        assert_eq!((setup.day, setup.start_hour), (Weekday::Monday, 8.0));
        let revision = plan.items.iter().find(|i| i.kind == ItemKind::Revision).unwrap();
        assert_eq!(revision.day, Weekday::Wednesday);
        // Adjacent pairs only: each offsite against that day's lunch
        assert_eq!(plan.conflicts.len(), 5);
        assert_no_overlap(&plan);
    }

    #[test]
    fn every_input_item_survives() {
        let report = vec![
            ScheduleItem::new(ItemKind::SetupStandard, "A – Standard Setup", 180),
            ScheduleItem::new(ItemKind::Launch, "A – Redesign Launch", 60).at(Weekday::Thursday, 10.0),
        ];
        let calendar = vec![ScheduleItem::new(ItemKind::Meeting, "1:1", 30).at(Weekday::Monday, 9.0).locked(true)];
        let tickets = vec![ScheduleItem::new(ItemKind::Revision, "B – Revision", 60).at(Weekday::Friday, 15.0)];
        let plan = engine().merge(week(), report, calendar, tickets);
        assert_eq!(plan.items.len(), 4 + 10);
        assert_eq!(plan.overflow_count(), 0);
        assert_no_overlap(&plan);
        let revision = plan.items.iter().find(|i| i.kind == ItemKind::Revision).unwrap();
        assert_eq!((revision.day, revision.start_hour), (Weekday::Friday, 8.0));
    }
}
