// src/services/planner.rs

//! Slot search, capacity totals and conflict detection over schedule items.

use crate::models::{
    CapacityStatus, CapacitySummary, Conflict, ItemKind, ScheduleItem, Weekday,
};

/// Minutes under capacity that still count as balanced.
const BALANCED_SLACK_MINUTES: u32 = 60;

/// Working window for one day, in fractional hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkWindow {
    pub start_hour: f64,
    pub end_hour: f64,
}

/// Items on `day`, ordered by start time.
pub fn items_for_day<'a, I>(items: I, day: Weekday) -> Vec<&'a ScheduleItem>
where
    I: IntoIterator<Item = &'a ScheduleItem>,
{
    let mut found: Vec<&ScheduleItem> = items.into_iter().filter(|i| i.day == day).collect();
    found.sort_by(|a, b| a.start_hour.total_cmp(&b.start_hour));
    found
}

/// First start hour on `day` where `duration_minutes` fits without touching
/// another item or leaving the window.
///
/// Walks the day's items by start time; the candidate jumps past each item
/// that ends after it.
pub fn find_available_slot<'a, I>(
    items: I,
    day: Weekday,
    duration_minutes: u32,
    window: WorkWindow,
) -> Option<f64>
where
    I: IntoIterator<Item = &'a ScheduleItem>,
{
    let duration = f64::from(duration_minutes) / 60.0;
    let mut candidate = window.start_hour;

    for item in items_for_day(items, day) {
        if candidate + duration <= item.start_hour {
            break;
        }
        candidate = candidate.max(item.end_hour());
    }

    (candidate + duration <= window.end_hour).then_some(candidate)
}

/// Weekly totals against `capacity_minutes`.
pub fn calculate_capacity(items: &[ScheduleItem], capacity_minutes: u32) -> CapacitySummary {
    let mut scheduled = 0u32;
    let mut breaks = 0u32;
    let mut buffers = 0u32;
    for item in items {
        scheduled += item.duration_minutes;
        match item.kind {
            ItemKind::Break => breaks += item.duration_minutes,
            ItemKind::Buffer => buffers += item.duration_minutes,
            _ => {}
        }
    }

    let status = if scheduled > capacity_minutes {
        CapacityStatus::Over
    } else if scheduled + BALANCED_SLACK_MINUTES < capacity_minutes {
        CapacityStatus::Under
    } else {
        CapacityStatus::Balanced
    };
    let utilization = if capacity_minutes == 0 {
        0
    } else {
        (f64::from(scheduled) * 100.0 / f64::from(capacity_minutes)).round() as u32
    };

    CapacitySummary {
        total_available_minutes: capacity_minutes,
        total_scheduled_minutes: scheduled,
        total_break_minutes: breaks,
        total_buffer_minutes: buffers,
        total_work_minutes: scheduled.saturating_sub(breaks + buffers),
        remaining_minutes: i64::from(capacity_minutes) - i64::from(scheduled),
        utilization_percent: utilization,
        status,
    }
}

/// Adjacent overlapping pairs on `day`, in start order.
pub fn find_conflicts<'a, I>(items: I, day: Weekday) -> Vec<Conflict>
where
    I: IntoIterator<Item = &'a ScheduleItem>,
{
    items_for_day(items, day)
        .windows(2)
        .filter(|pair| pair[0].end_hour() > pair[1].start_hour)
        .map(|pair| Conflict {
            day,
            first: pair[0].title.clone(),
            second: pair[1].title.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: WorkWindow = WorkWindow {
        start_hour: 8.0,
        end_hour: 17.0,
    };

    fn block(title: &str, day: Weekday, start: f64, minutes: u32) -> ScheduleItem {
        ScheduleItem::new(ItemKind::Meeting, title, minutes).at(day, start)
    }

    #[test]
    fn slot_search_skips_past_items() {
        let items = vec![
            block("standup", Weekday::Monday, 8.0, 60),
            block("lunch", Weekday::Monday, 12.0, 30),
            block("other day", Weekday::Tuesday, 9.0, 60),
        ];
        assert_eq!(find_available_slot(&items, Weekday::Monday, 120, WINDOW), Some(9.0));
        assert_eq!(find_available_slot(&items, Weekday::Monday, 240, WINDOW), Some(12.5));
        assert_eq!(find_available_slot(&items, Weekday::Monday, 300, WINDOW), None);
        assert_eq!(find_available_slot(&items, Weekday::Wednesday, 540, WINDOW), Some(8.0));
    }

    #[test]
    fn slot_search_handles_nested_items() {
        let items = vec![
            block("long", Weekday::Monday, 8.0, 240),
            block("inside", Weekday::Monday, 9.0, 30),
        ];
        assert_eq!(find_available_slot(&items, Weekday::Monday, 60, WINDOW), Some(12.0));
    }

    #[test]
    fn capacity_status() {
        let mut items: Vec<ScheduleItem> = (0..5)
            .map(|d| block("day", Weekday::from_index(d), 8.0, 450))
            .collect();
        items.push(ScheduleItem::new(ItemKind::Break, "Lunch Break", 30));
        items.push(ScheduleItem::new(ItemKind::Buffer, "Daily Admin", 30));
        let summary = calculate_capacity(&items, 2400);
        assert_eq!(summary.total_scheduled_minutes, 2310);
        assert_eq!(summary.total_work_minutes, 2250);
        assert_eq!(summary.remaining_minutes, 90);
        assert_eq!(summary.status, CapacityStatus::Under);
        assert_eq!(summary.utilization_percent, 96);

        items.push(block("extra", Weekday::Friday, 16.0, 60));
        assert_eq!(calculate_capacity(&items, 2400).status, CapacityStatus::Balanced);

        items.push(block("late", Weekday::Friday, 16.0, 60));
        let over = calculate_capacity(&items, 2400);
        assert_eq!(over.status, CapacityStatus::Over);
        assert_eq!(over.remaining_minutes, -30);
    }

    #[test]
    fn conflicts_are_adjacent_pairs() {
        let items = vec![
            block("b", Weekday::Monday, 9.5, 60),
            block("a", Weekday::Monday, 9.0, 60),
            block("c", Weekday::Monday, 11.0, 30),
        ];
        let conflicts = find_conflicts(&items, Weekday::Monday);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].first, "a");
        assert_eq!(conflicts[0].second, "b");
        assert!(find_conflicts(&items, Weekday::Tuesday).is_empty());
    }
}
