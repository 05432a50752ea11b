use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::budget::{budget_summary, expense_months};
use crate::cli::Invocation;
use crate::clubs::{
    UPCOMING_LIMIT, club_scope_options, discover_clubs, events_for_club, find_club,
    joined_club_records, recent_posts, upcoming_for_joined,
};
use crate::config::Config;
use crate::datetime::parse_day_expr;
use crate::day_panel::build_day_panel;
use crate::event::Event;
use crate::filter::FilterCriteria;
use crate::members::club_roster;
use crate::render::Renderer;
use crate::seed::{SeedSnapshot, SeedStore};
use crate::state::{CalendarState, MonthStep, Rsvp};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "month", "day", "list", "clubs", "club", "mine", "upcoming", "scopes", "schedule",
        "event", "rsvp", "budget", "approvals",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Builds the page state for one invocation: configured initial selection
/// plus the filter terms typed before the command.
pub fn initial_state(
    cfg: &Config,
    filter_terms: &[String],
    today: NaiveDate,
) -> anyhow::Result<CalendarState> {
    let mut criteria = FilterCriteria::default();
    for term in filter_terms {
        criteria
            .apply_term(term)
            .with_context(|| format!("invalid filter term: {term}"))?;
    }

    let mut state = CalendarState::new(cfg.initial_selection()?, today);
    state.set_criteria(criteria);
    Ok(state)
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &SeedStore,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let snapshot = store.load()?;
    let display_limit = cfg.display_limit()?;
    let mut state = initial_state(cfg, &inv.filter_terms, today)?;
    state.restore_rsvps(store.load_rsvps()?);

    debug!(
        command = %inv.command,
        args = ?inv.command_args,
        criteria = ?state.criteria(),
        "dispatching command"
    );

    match inv.command.as_str() {
        "month" => {
            for arg in &inv.command_args {
                let step: MonthStep = arg.parse()?;
                state.navigate(step);
            }
            print_calendar(&snapshot, &state, renderer, today, display_limit)
        }
        "schedule" => {
            let club = inv
                .command_args
                .first()
                .ok_or_else(|| anyhow!("schedule requires a club name"))?;
            if !snapshot.clubs.iter().any(|known| &known.name == club) {
                info!(club = %club, "club is not in the seed; showing its events anyway");
            }
            state.show_club_schedule(club);
            print_calendar(&snapshot, &state, renderer, today, display_limit)
        }
        "day" => {
            if let Some(arg) = inv.command_args.first() {
                state.select_date(parse_day_expr(arg, today)?);
            }
            let filtered = state.filter(&snapshot.events, &snapshot.joined_clubs);
            let panel = build_day_panel(state.selected_date(), &filtered);
            renderer.print_day_panel(state.selected_date(), &panel, &state)
        }
        "list" => {
            let filtered = state.filter(&snapshot.events, &snapshot.joined_clubs);
            let rows: Vec<_> = filtered.iter().collect();
            renderer.print_event_table(&rows, &state)
        }
        "clubs" => {
            let category = inv.command_args.first().map(String::as_str).unwrap_or("");
            let keyword = inv.command_args.get(1..).unwrap_or_default().join(" ");
            let found = discover_clubs(&snapshot.clubs, category, &keyword);
            renderer.print_clubs(&found, &snapshot.joined_clubs)
        }
        "club" => {
            let name = inv
                .command_args
                .first()
                .ok_or_else(|| anyhow!("club requires a club name"))?;
            let events = events_for_club(&snapshot.events, name);
            match find_club(&snapshot.clubs, name) {
                Some(club) => {
                    let roster = club_roster(club, &snapshot.memberships, &snapshot.users);
                    let posts = recent_posts(&snapshot.posts, name);
                    renderer.print_club_detail(club, &roster, posts, &events, &state)
                }
                None => {
                    info!(club = %name, "club is not in the seed; listing its events only");
                    renderer.print_event_table(&events, &state)
                }
            }
        }
        "event" => {
            let id = inv
                .command_args
                .first()
                .ok_or_else(|| anyhow!("event requires an event id"))?;
            let event = find_event(&snapshot.events, id)?;
            renderer.print_event_detail(event, state.rsvp_for(event.id()))
        }
        "rsvp" => {
            let (id, choice) = match inv.command_args.as_slice() {
                [id, choice, ..] => (id, choice),
                _ => return Err(anyhow!("rsvp requires an event id and attend|decline")),
            };
            let event = find_event(&snapshot.events, id)?;
            let rsvp: Rsvp = choice.parse()?;
            state.record_rsvp(event.id(), rsvp);
            store.save_rsvps(state.rsvps())?;
            info!(event = event.id(), rsvp = rsvp.label(), "recorded rsvp");
            println!("{} RSVP: {}", event.title(), rsvp.label());
            Ok(())
        }
        "budget" => {
            let club_name = match inv.command_args.first() {
                Some(name) => name.clone(),
                None => snapshot
                    .clubs
                    .first()
                    .map(|club| club.name.clone())
                    .ok_or_else(|| anyhow!("budget requires a club name"))?,
            };
            let month = inv.command_args.get(1).map(String::as_str);
            let summary = budget_summary(&snapshot.expenses, &club_name, month);
            renderer.print_budget(&summary, &expense_months(&snapshot.expenses))
        }
        "approvals" => renderer.print_join_approvals(&snapshot.join_approvals),
        "mine" => {
            let mine = joined_club_records(&snapshot.clubs, &snapshot.joined_clubs);
            renderer.print_clubs(&mine, &snapshot.joined_clubs)
        }
        "upcoming" => {
            let events =
                upcoming_for_joined(&snapshot.events, &snapshot.joined_clubs, UPCOMING_LIMIT);
            renderer.print_event_table(&events, &state)
        }
        "scopes" => renderer.print_scope_options(&club_scope_options(&snapshot.clubs)),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn find_event<'a>(events: &'a [Event], id: &str) -> anyhow::Result<&'a Event> {
    events
        .iter()
        .find(|event| event.id() == id)
        .ok_or_else(|| anyhow!("unknown event: {id}"))
}

fn print_calendar(
    snapshot: &SeedSnapshot,
    state: &CalendarState,
    renderer: &Renderer,
    today: NaiveDate,
    display_limit: usize,
) -> anyhow::Result<()> {
    let filtered = state.filter(&snapshot.events, &snapshot.joined_clubs);
    let view = state.view(&filtered, today, display_limit);
    info!(
        month = %view.month,
        events = filtered.len(),
        selected = ?view.selected_date,
        "rendering calendar"
    );

    renderer.print_month(&view, display_limit)?;
    println!();
    renderer.print_day_panel(view.selected_date, &view.day_panel, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ClubScope;

    #[test]
    fn abbreviations_expand_when_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("mo", &known), Some("month"));
        assert_eq!(expand_command_abbrev("club", &known), Some("club"));
        assert_eq!(expand_command_abbrev("clu", &known), None);
        assert_eq!(expand_command_abbrev("s", &known), None);
        assert_eq!(expand_command_abbrev("sch", &known), Some("schedule"));
        assert_eq!(expand_command_abbrev("e", &known), Some("event"));
        assert_eq!(expand_command_abbrev("r", &known), Some("rsvp"));
        assert_eq!(expand_command_abbrev("b", &known), Some("budget"));
        assert_eq!(expand_command_abbrev("a", &known), Some("approvals"));
    }

    #[test]
    fn events_are_looked_up_by_exact_id() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 9).expect("valid date");
        let events = vec![
            Event::new("evt-tt-1", "점심 랠리", "탁구", "운동/건강", "혼합 운영", date, date)
                .expect("valid event"),
        ];

        let found = find_event(&events, "evt-tt-1").expect("known event");
        assert_eq!(found.title(), "점심 랠리");

        let err = find_event(&events, "evt-tt").expect_err("prefix is not an id");
        assert!(err.to_string().contains("unknown event: evt-tt"));
    }

    #[test]
    fn initial_state_applies_terms_and_config() {
        let mut cfg = Config::default();
        cfg.apply_overrides([("calendar.initial_selection".to_string(), "today".to_string())]);
        let today = NaiveDate::from_ymd_opt(2026, 1, 7).expect("valid date");

        let state = initial_state(
            &cfg,
            &["club:mine".to_string(), "format:정기 모임".to_string()],
            today,
        )
        .expect("state");
        assert_eq!(state.selected_date(), Some(today));
        assert_eq!(state.criteria().club_scope, ClubScope::Mine);
        assert_eq!(state.criteria().format, "정기 모임");

        assert!(initial_state(&cfg, &["when:later".to_string()], today).is_err());
    }
}
