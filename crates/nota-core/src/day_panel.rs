use chrono::NaiveDate;
use tracing::trace;

use crate::event::Event;

/// Events on the selected date, in their original order. No selection
/// yields an empty panel.
pub fn build_day_panel(selected_date: Option<NaiveDate>, filtered_events: &[Event]) -> Vec<&Event> {
    let Some(date) = selected_date else {
        return Vec::new();
    };

    let panel: Vec<&Event> = filtered_events
        .iter()
        .filter(|event| event.occurs_on(date))
        .collect();
    trace!(date = %date, count = panel.len(), "built day panel");
    panel
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::datetime::YearMonth;
    use crate::grid::build_month_grid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn span(id: &str, start: NaiveDate, end: NaiveDate) -> Event {
        Event::new(id, id, "보드게임", "취미/문화", "정기 모임", start, end).expect("valid event")
    }

    fn sample() -> Vec<Event> {
        vec![
            span("late-start", day(2026, 1, 12), day(2026, 1, 12)),
            span("long", day(2026, 1, 3), day(2026, 1, 20)),
            span("other-day", day(2026, 1, 13), day(2026, 1, 13)),
            span("ends-today", day(2026, 1, 10), day(2026, 1, 12)),
            span("starts-today", day(2026, 1, 12), day(2026, 1, 14)),
        ]
    }

    #[test]
    fn no_selection_is_an_empty_panel() {
        assert!(build_day_panel(None, &sample()).is_empty());
    }

    #[test]
    fn panel_keeps_original_order() {
        let events = sample();
        let ids: Vec<&str> = build_day_panel(Some(day(2026, 1, 12)), &events)
            .into_iter()
            .map(Event::id)
            .collect();
        assert_eq!(ids, vec!["late-start", "long", "ends-today", "starts-today"]);
    }

    #[test]
    fn panel_agrees_with_grid_cells() {
        let events = sample();
        let month = YearMonth::new(2026, 1).expect("month");
        let cells = build_month_grid(month, &events, None, usize::MAX);

        for cell in &cells {
            let from_grid: BTreeSet<&str> = cell
                .visible_events
                .iter()
                .map(|placed| placed.event.id())
                .collect();
            let from_panel: BTreeSet<&str> = build_day_panel(Some(cell.date), &events)
                .into_iter()
                .map(Event::id)
                .collect();
            assert_eq!(from_grid, from_panel, "{}", cell.date);
        }
    }
}
