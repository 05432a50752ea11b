use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::YearMonth;
use crate::day_panel::build_day_panel;
use crate::event::Event;
use crate::filter::{ClubScope, FilterCriteria};
use crate::grid::{CalendarCell, build_month_grid};

/// What the day panel shows before the viewer picks a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialSelection {
    #[default]
    Empty,
    Today,
}

impl FromStr for InitialSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "empty" | "none" => Ok(Self::Empty),
            "today" => Ok(Self::Today),
            other => Err(anyhow!("invalid initial selection: {other} (expected empty or today)")),
        }
    }
}

/// One navigation action. The calendar never jumps more than a month at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthStep {
    Prev,
    Next,
}

impl MonthStep {
    fn delta(self) -> i32 {
        match self {
            Self::Prev => -1,
            Self::Next => 1,
        }
    }
}

impl FromStr for MonthStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "prev" | "-" | "<" => Ok(Self::Prev),
            "next" | "+" | ">" => Ok(Self::Next),
            other => Err(anyhow!("invalid month step: {other} (expected prev or next)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rsvp {
    Attend,
    Decline,
}

impl Rsvp {
    pub fn label(self) -> &'static str {
        match self {
            Self::Attend => "참여",
            Self::Decline => "불참",
        }
    }
}

impl FromStr for Rsvp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "attend" | "참여" => Ok(Self::Attend),
            "decline" | "불참" => Ok(Self::Decline),
            other => Err(anyhow!("invalid rsvp: {other}")),
        }
    }
}

/// Everything one render pass needs, derived from a single snapshot.
#[derive(Debug, Clone)]
pub struct CalendarView<'a> {
    pub month: YearMonth,
    pub label: String,
    pub selected_date: Option<NaiveDate>,
    pub cells: Vec<CalendarCell<'a>>,
    pub day_panel: Vec<&'a Event>,
}

/// Calendar page state. The page controller is the only writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarState {
    month_offset: i32,
    criteria: FilterCriteria,
    selected_date: Option<NaiveDate>,
    rsvps: BTreeMap<String, Rsvp>,
}

impl CalendarState {
    pub fn new(initial: InitialSelection, today: NaiveDate) -> Self {
        let selected_date = match initial {
            InitialSelection::Empty => None,
            InitialSelection::Today => Some(today),
        };
        Self {
            selected_date,
            ..Self::default()
        }
    }

    pub fn month_offset(&self) -> i32 {
        self.month_offset
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn visible_month(&self, today: NaiveDate) -> YearMonth {
        YearMonth::containing(today).shift(self.month_offset)
    }

    pub fn navigate(&mut self, step: MonthStep) {
        self.month_offset = self.month_offset.saturating_add(step.delta());
        debug!(offset = self.month_offset, ?step, "navigated calendar");
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.criteria.category = category.into();
    }

    pub fn set_format(&mut self, format: impl Into<String>) {
        self.criteria.format = format.into();
    }

    pub fn set_club_scope(&mut self, scope: ClubScope) {
        self.criteria.club_scope = scope;
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.criteria.search_text = text.into();
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.selected_date = Some(date);
    }

    pub fn clear_selection(&mut self) {
        self.selected_date = None;
    }

    /// "View in calendar" from a joined club's card.
    pub fn show_club_schedule(&mut self, club_name: &str) {
        self.criteria.club_scope = ClubScope::Club(club_name.to_string());
        self.selected_date = None;
    }

    pub fn record_rsvp(&mut self, event_id: impl Into<String>, rsvp: Rsvp) {
        self.rsvps.insert(event_id.into(), rsvp);
    }

    pub fn rsvp_for(&self, event_id: &str) -> Option<Rsvp> {
        self.rsvps.get(event_id).copied()
    }

    pub fn rsvps(&self) -> &BTreeMap<String, Rsvp> {
        &self.rsvps
    }

    /// Replaces the RSVP choices with ones saved by an earlier run.
    pub fn restore_rsvps(&mut self, rsvps: BTreeMap<String, Rsvp>) {
        self.rsvps = rsvps;
    }

    /// Runs the whole derivation for the current state. `filtered` must
    /// come from [`crate::filter::filter_events`] with this state's
    /// criteria; see [`CalendarState::filter`].
    #[tracing::instrument(skip(self, filtered), fields(offset = self.month_offset))]
    pub fn view<'a>(
        &self,
        filtered: &'a [Event],
        today: NaiveDate,
        display_limit: usize,
    ) -> CalendarView<'a> {
        let month = self.visible_month(today);
        CalendarView {
            month,
            label: month.label(),
            selected_date: self.selected_date,
            cells: build_month_grid(month, filtered, self.selected_date, display_limit),
            day_panel: build_day_panel(self.selected_date, filtered),
        }
    }

    pub fn filter(&self, events: &[Event], joined_clubs: &BTreeSet<String>) -> Vec<Event> {
        crate::filter::filter_events(events, &self.criteria, joined_clubs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GRID_CELLS;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn initial_state_is_unfiltered_current_month() {
        let today = day(2026, 1, 15);
        let state = CalendarState::new(InitialSelection::Empty, today);
        assert_eq!(state.month_offset(), 0);
        assert!(state.criteria().is_empty());
        assert_eq!(state.selected_date(), None);
        assert_eq!(state.visible_month(today).label(), "2026.01");

        let state = CalendarState::new(InitialSelection::Today, today);
        assert_eq!(state.selected_date(), Some(today));
    }

    #[test]
    fn navigation_moves_one_month_per_step() {
        let today = day(2026, 1, 31);
        let mut state = CalendarState::new(InitialSelection::Empty, today);

        state.navigate(MonthStep::Prev);
        assert_eq!(state.month_offset(), -1);
        assert_eq!(state.visible_month(today).label(), "2025.12");

        state.navigate(MonthStep::Next);
        state.navigate(MonthStep::Next);
        assert_eq!(state.month_offset(), 1);
        assert_eq!(state.visible_month(today).label(), "2026.02");
    }

    #[test]
    fn selecting_a_date_keeps_the_month() {
        let today = day(2026, 1, 15);
        let mut state = CalendarState::new(InitialSelection::Empty, today);
        state.navigate(MonthStep::Next);

        // a muted leading cell from January while February is shown
        state.select_date(day(2026, 1, 31));
        assert_eq!(state.month_offset(), 1);
        assert_eq!(state.selected_date(), Some(day(2026, 1, 31)));
    }

    #[test]
    fn club_schedule_sets_scope_and_clears_selection() {
        let today = day(2026, 1, 15);
        let mut state = CalendarState::new(InitialSelection::Today, today);
        state.set_search("랠리");
        state.show_club_schedule("탁구");

        assert_eq!(state.criteria().club_scope, ClubScope::Club("탁구".to_string()));
        assert_eq!(state.criteria().search_text, "랠리");
        assert_eq!(state.selected_date(), None);
    }

    #[test]
    fn view_derives_grid_and_panel_from_the_same_events() {
        let today = day(2026, 1, 7);
        let events = vec![
            Event::new(
                "evt-ar-1",
                "드로잉 연습",
                "예술",
                "취미/문화",
                "정기 모임",
                day(2026, 1, 11),
                day(2026, 1, 13),
            )
            .expect("valid event"),
            Event::new(
                "evt-tt-1",
                "점심 가볍게 랠리",
                "탁구",
                "운동/건강",
                "혼합 운영",
                day(2026, 1, 9),
                day(2026, 1, 9),
            )
            .expect("valid event"),
        ];

        let mut state = CalendarState::new(InitialSelection::Empty, today);
        state.set_category("취미/문화");
        state.select_date(day(2026, 1, 12));

        let filtered = state.filter(&events, &BTreeSet::new());
        let view = state.view(&filtered, today, 3);

        assert_eq!(view.label, "2026.01");
        assert_eq!(view.cells.len(), GRID_CELLS);
        assert_eq!(view.day_panel.len(), 1);
        assert_eq!(view.day_panel[0].id(), "evt-ar-1");

        let selected: Vec<&CalendarCell<'_>> =
            view.cells.iter().filter(|cell| cell.is_selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].visible_events.len(), 1);
    }

    #[test]
    fn rsvp_choices_are_remembered_per_event() {
        let mut state = CalendarState::default();
        state.record_rsvp("evt-tt-1", Rsvp::Attend);
        state.record_rsvp("evt-tt-1", "불참".parse().expect("rsvp label"));

        assert_eq!(state.rsvp_for("evt-tt-1"), Some(Rsvp::Decline));
        assert_eq!(state.rsvp_for("evt-bk-1"), None);
        assert_eq!(Rsvp::Attend.label(), "참여");

        let mut restored = CalendarState::default();
        restored.restore_rsvps(state.rsvps().clone());
        assert_eq!(restored.rsvp_for("evt-tt-1"), Some(Rsvp::Decline));
    }

    #[test]
    fn steps_and_selections_parse_from_words() {
        assert_eq!("next".parse::<MonthStep>().expect("step"), MonthStep::Next);
        assert_eq!("-".parse::<MonthStep>().expect("step"), MonthStep::Prev);
        assert!("+2".parse::<MonthStep>().is_err());
        assert_eq!(
            "Today".parse::<InitialSelection>().expect("selection"),
            InitialSelection::Today
        );
        assert!("yesterday".parse::<InitialSelection>().is_err());
    }
}
