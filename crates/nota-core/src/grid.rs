use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::datetime::{YearMonth, start_of_week_sunday};
use crate::event::{Event, SegmentKind};

/// Six full weeks, enough for any month on any starting weekday.
pub const GRID_CELLS: usize = 42;

pub const DEFAULT_DISPLAY_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacedEvent<'a> {
    pub event: &'a Event,
    pub segment: SegmentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell<'a> {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub is_selected: bool,
    pub visible_events: Vec<PlacedEvent<'a>>,
    pub overflow_count: usize,
}

impl CalendarCell<'_> {
    /// Matching events before the display cap was applied.
    pub fn match_count(&self) -> usize {
        self.visible_events.len() + self.overflow_count
    }
}

/// Events occurring on `date`, ordered by start date. Ties keep input order.
pub fn events_on(date: NaiveDate, events: &[Event]) -> Vec<&Event> {
    let mut matched: Vec<&Event> = events.iter().filter(|event| event.occurs_on(date)).collect();
    matched.sort_by_key(|event| event.start_date());
    matched
}

/// Builds the six-week grid for `month`.
///
/// Every month chrono can fully represent gets exactly [`GRID_CELLS`] cells.
/// At the edges of chrono's range the grid never repeats a date: it starts
/// on the 1st when the preceding Sunday is unrepresentable, and stops early
/// at the end of chrono's range.
#[tracing::instrument(
    skip(month, filtered_events),
    fields(month = %month, events = filtered_events.len())
)]
pub fn build_month_grid<'a>(
    month: YearMonth,
    filtered_events: &'a [Event],
    selected_date: Option<NaiveDate>,
    display_limit: usize,
) -> Vec<CalendarCell<'a>> {
    let grid_start = start_of_week_sunday(month.first_day()).unwrap_or(month.first_day());
    let mut cells = Vec::with_capacity(GRID_CELLS);

    for date in grid_start.iter_days().take(GRID_CELLS) {
        let matched = events_on(date, filtered_events);
        let overflow_count = matched.len().saturating_sub(display_limit);

        let visible_events = matched
            .into_iter()
            .take(display_limit)
            .filter_map(|event| {
                event
                    .segment_on(date)
                    .map(|segment| PlacedEvent { event, segment })
            })
            .collect();

        cells.push(CalendarCell {
            date,
            in_current_month: month.contains(date),
            is_selected: selected_date == Some(date),
            visible_events,
            overflow_count,
        });
    }

    debug!(
        grid_start = %grid_start,
        busy_cells = cells.iter().filter(|cell| cell.match_count() > 0).count(),
        "built month grid"
    );
    cells
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Datelike, Weekday};

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn span(id: &str, start: NaiveDate, end: NaiveDate) -> Event {
        Event::new(id, id, "탁구", "운동/건강", "정기 모임", start, end)
            .expect("valid event")
    }

    fn cell_for<'c, 'a>(cells: &'c [CalendarCell<'a>], date: NaiveDate) -> &'c CalendarCell<'a> {
        cells
            .iter()
            .find(|cell| cell.date == date)
            .expect("date is on the grid")
    }

    #[test]
    fn every_month_has_42_cells_covering_the_month_once() {
        for year in [1999, 2000, 2023, 2024, 2026, 2100] {
            for month0 in 0..12 {
                let month = YearMonth::from_zero_based(year, month0).expect("valid month");
                let cells = build_month_grid(month, &[], None, DEFAULT_DISPLAY_LIMIT);
                assert_eq!(cells.len(), GRID_CELLS, "{month}");
                assert_eq!(cells[0].date.weekday(), Weekday::Sun);

                let in_month: Vec<NaiveDate> = cells
                    .iter()
                    .filter(|cell| cell.in_current_month)
                    .map(|cell| cell.date)
                    .collect();
                let expected: Vec<NaiveDate> = month
                    .first_day()
                    .iter_days()
                    .take_while(|date| month.contains(*date))
                    .collect();
                assert_eq!(in_month, expected, "{month}");

                let unique: BTreeSet<NaiveDate> = cells.iter().map(|cell| cell.date).collect();
                assert_eq!(unique.len(), GRID_CELLS);
            }
        }
    }

    #[test]
    fn grids_at_chrono_bounds_never_repeat_dates() {
        for month in [
            YearMonth::containing(NaiveDate::MAX),
            YearMonth::containing(NaiveDate::MIN),
        ] {
            let cells = build_month_grid(month, &[], None, DEFAULT_DISPLAY_LIMIT);
            let unique: BTreeSet<NaiveDate> = cells.iter().map(|cell| cell.date).collect();
            assert!(!cells.is_empty(), "{month}");
            assert!(cells.len() <= GRID_CELLS, "{month}");
            assert_eq!(unique.len(), cells.len(), "{month}");
            assert!(cells.iter().any(|cell| cell.date == month.first_day()));
        }
    }

    #[test]
    fn february_grids_start_on_the_sunday_before_the_first() {
        // 2026-02-01 is itself a Sunday; 2024-02-01 is a Thursday.
        let feb_2026 = build_month_grid(YearMonth::new(2026, 2).expect("month"), &[], None, 3);
        assert_eq!(feb_2026[0].date, day(2026, 2, 1));
        assert_eq!(feb_2026[41].date, day(2026, 3, 14));

        let feb_2024 = build_month_grid(YearMonth::new(2024, 2).expect("month"), &[], None, 3);
        assert_eq!(feb_2024[0].date, day(2024, 1, 28));
        assert!(!feb_2024[0].in_current_month);
        assert!(cell_for(&feb_2024, day(2024, 2, 29)).in_current_month);
    }

    #[test]
    fn multi_day_event_gets_a_segment_per_cell() {
        let events = vec![span("drawing", day(2024, 3, 10), day(2024, 3, 12))];
        let cells = build_month_grid(YearMonth::new(2024, 3).expect("month"), &events, None, 3);

        let kinds: Vec<SegmentKind> = [10, 11, 12]
            .into_iter()
            .map(|d| cell_for(&cells, day(2024, 3, d)).visible_events[0].segment)
            .collect();
        assert_eq!(
            kinds,
            vec![SegmentKind::Start, SegmentKind::Middle, SegmentKind::End]
        );
        assert!(cell_for(&cells, day(2024, 3, 13)).visible_events.is_empty());
    }

    #[test]
    fn events_spanning_a_month_boundary_show_on_leading_cells() {
        let events = vec![span("camp", day(2024, 2, 27), day(2024, 3, 2))];
        let cells = build_month_grid(YearMonth::new(2024, 3).expect("month"), &events, None, 3);

        let leading = cell_for(&cells, day(2024, 2, 27));
        assert!(!leading.in_current_month);
        assert_eq!(leading.visible_events[0].segment, SegmentKind::Start);
        assert_eq!(
            cell_for(&cells, day(2024, 3, 1)).visible_events[0].segment,
            SegmentKind::Middle
        );
        assert_eq!(
            cell_for(&cells, day(2024, 3, 2)).visible_events[0].segment,
            SegmentKind::End
        );
    }

    #[test]
    fn overflow_is_counted_past_the_display_limit() {
        let date = day(2024, 3, 10);
        let events: Vec<Event> = (0..5).map(|i| span(&format!("e{i}"), date, date)).collect();
        let cells = build_month_grid(YearMonth::new(2024, 3).expect("month"), &events, None, 3);

        let cell = cell_for(&cells, date);
        assert_eq!(cell.visible_events.len(), 3);
        assert_eq!(cell.overflow_count, 2);
        assert_eq!(cell.match_count(), 5);

        let quiet = cell_for(&cells, day(2024, 3, 11));
        assert_eq!(quiet.overflow_count, 0);
    }

    #[test]
    fn matches_are_ordered_by_start_date_with_stable_ties() {
        let target = day(2024, 3, 12);
        let events = vec![
            span("late", target, target),
            span("early", day(2024, 3, 9), day(2024, 3, 14)),
            span("tie-a", day(2024, 3, 11), target),
            span("tie-b", day(2024, 3, 11), day(2024, 3, 13)),
        ];
        let cells = build_month_grid(YearMonth::new(2024, 3).expect("month"), &events, None, 4);

        let order: Vec<&str> = cell_for(&cells, target)
            .visible_events
            .iter()
            .map(|placed| placed.event.id())
            .collect();
        assert_eq!(order, vec!["early", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn selection_marks_exactly_one_cell() {
        let selected = day(2024, 3, 31);
        let cells =
            build_month_grid(YearMonth::new(2024, 3).expect("month"), &[], Some(selected), 3);
        let marked: Vec<NaiveDate> = cells
            .iter()
            .filter(|cell| cell.is_selected)
            .map(|cell| cell.date)
            .collect();
        assert_eq!(marked, vec![selected]);

        let none = build_month_grid(YearMonth::new(2024, 3).expect("month"), &[], None, 3);
        assert!(none.iter().all(|cell| !cell.is_selected));
    }
}
