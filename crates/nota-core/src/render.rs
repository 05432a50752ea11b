use std::collections::BTreeSet;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::budget::{BudgetSummary, format_won};
use crate::clubs::{Club, Post, ScopeOption};
use crate::config::Config;
use crate::datetime::format_iso_date;
use crate::event::{Event, SegmentKind};
use crate::grid::CalendarCell;
use crate::members::{ClubRoster, JoinApproval};
use crate::state::{CalendarState, CalendarView, Rsvp};

const WEEKDAY_LABELS: [&str; 7] = ["일", "월", "화", "수", "목", "금", "토"];
const CELL_WIDTH: usize = 14;
const SPORTS_CATEGORY: &str = "운동/건강";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, view))]
    pub fn print_month(&self, view: &CalendarView<'_>, display_limit: usize) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_month(out, view, display_limit)
    }

    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        view: &CalendarView<'_>,
        display_limit: usize,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", view.label)?;

        let header = WEEKDAY_LABELS
            .iter()
            .map(|label| fit(label, CELL_WIDTH))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{}", header.trim_end())?;

        for week in view.cells.chunks(7) {
            let labels = week
                .iter()
                .map(|cell| self.day_label(cell))
                .collect::<Vec<_>>();
            write_row(&mut out, &labels)?;

            for slot in 0..display_limit {
                if week.iter().all(|cell| cell.visible_events.len() <= slot) {
                    break;
                }
                let bars = week
                    .iter()
                    .map(|cell| match cell.visible_events.get(slot) {
                        Some(placed) => self.event_bar(placed.event, placed.segment),
                        None => fit("", CELL_WIDTH),
                    })
                    .collect::<Vec<_>>();
                write_row(&mut out, &bars)?;
            }

            if week.iter().any(|cell| cell.overflow_count > 0) {
                let more = week
                    .iter()
                    .map(|cell| {
                        if cell.overflow_count > 0 {
                            fit(&format!("+{} more", cell.overflow_count), CELL_WIDTH)
                        } else {
                            fit("", CELL_WIDTH)
                        }
                    })
                    .collect::<Vec<_>>();
                write_row(&mut out, &more)?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, events, state))]
    pub fn print_day_panel(
        &self,
        date: Option<NaiveDate>,
        events: &[&Event],
        state: &CalendarState,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_day_panel(out, date, events, state)
    }

    pub fn write_day_panel<W: Write>(
        &self,
        mut out: W,
        date: Option<NaiveDate>,
        events: &[&Event],
        state: &CalendarState,
    ) -> anyhow::Result<()> {
        let Some(date) = date else {
            writeln!(out, "날짜를 선택하세요")?;
            return Ok(());
        };

        writeln!(out, "{} 일정", format_iso_date(date))?;
        if events.is_empty() {
            writeln!(out, "해당 날짜에 일정이 없습니다.")?;
            return Ok(());
        }
        self.write_event_table(out, events, state)
    }

    #[tracing::instrument(skip(self, events, state))]
    pub fn print_event_table(
        &self,
        events: &[&Event],
        state: &CalendarState,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_event_table(out, events, state)
    }

    pub fn write_event_table<W: Write>(
        &self,
        out: W,
        events: &[&Event],
        state: &CalendarState,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Time".to_string(),
            "Club".to_string(),
            "Title".to_string(),
            "Place".to_string(),
            "RSVP".to_string(),
        ];

        let rows = events
            .iter()
            .map(|event| {
                let dates = event_dates(event);
                let rsvp = state
                    .rsvp_for(event.id())
                    .map(|choice| choice.label().to_string())
                    .unwrap_or_default();

                vec![
                    self.paint(event.id(), "33"),
                    dates,
                    event.time().unwrap_or("-").to_string(),
                    event.club_name().to_string(),
                    event.title().to_string(),
                    event.place().unwrap_or("-").to_string(),
                    rsvp,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, clubs, joined_clubs))]
    pub fn print_clubs(
        &self,
        clubs: &[&Club],
        joined_clubs: &BTreeSet<String>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if clubs.is_empty() {
            writeln!(out, "조건에 맞는 동아리가 없습니다.")?;
            return Ok(());
        }

        let headers = vec![
            "Name".to_string(),
            "Category".to_string(),
            "Format".to_string(),
            "Join".to_string(),
            "Mine".to_string(),
        ];
        let rows = clubs
            .iter()
            .map(|club| {
                vec![
                    club.name.clone(),
                    club.category.clone(),
                    club.format.clone(),
                    join_label(club).to_string(),
                    if joined_clubs.contains(&club.name) { "yes" } else { "" }.to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    pub fn print_scope_options(&self, options: &[ScopeOption]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = options
            .iter()
            .map(|option| vec![option.scope.as_key().to_string(), option.label.clone()])
            .collect();
        write_table(&mut out, vec!["Scope".to_string(), "Label".to_string()], rows)
    }

    #[tracing::instrument(skip(self, event, rsvp), fields(event = event.id()))]
    pub fn print_event_detail(&self, event: &Event, rsvp: Option<Rsvp>) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_event_detail(out, event, rsvp)
    }

    pub fn write_event_detail<W: Write>(
        &self,
        mut out: W,
        event: &Event,
        rsvp: Option<Rsvp>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(event.title(), "1"))?;
        writeln!(out, "동아리: {}", event.club_name())?;
        writeln!(out, "일정: {}", event_dates(event))?;
        writeln!(out, "시간: {}", event.time().unwrap_or("-"))?;
        writeln!(out, "장소: {}", event.place().unwrap_or("-"))?;
        if let Some(description) = event.description() {
            writeln!(out, "{description}")?;
        }
        if let Some(choice) = rsvp {
            writeln!(out, "RSVP: {}", choice.label())?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(club = %club.name))]
    pub fn print_club_detail(
        &self,
        club: &Club,
        roster: &ClubRoster,
        posts: &[Post],
        events: &[&Event],
        state: &CalendarState,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_club_detail(out, club, roster, posts, events, state)
    }

    pub fn write_club_detail<W: Write>(
        &self,
        mut out: W,
        club: &Club,
        roster: &ClubRoster,
        posts: &[Post],
        events: &[&Event],
        state: &CalendarState,
    ) -> anyhow::Result<()> {
        writeln!(out, "{} [{}]", self.paint(&club.name, "1"), club.category)?;
        if !club.mood_line.is_empty() {
            writeln!(out, "{}", club.mood_line)?;
        }
        writeln!(out, "운영 방식: {}", club.tags.join(" / "))?;
        writeln!(out, "가입: {}", join_label(club))?;
        writeln!(out)?;

        write_people(&mut out, "운영진", &roster.admins, "운영진 정보가 없습니다.")?;
        write_people(&mut out, "멤버", &roster.members, "멤버가 없습니다.")?;
        write_people(&mut out, "신청자", &roster.pending, "대기 중인 요청이 없습니다.")?;
        writeln!(out)?;

        if posts.is_empty() {
            writeln!(out, "등록된 글이 없습니다.")?;
        }
        for post in posts {
            writeln!(out, "{} · {}", post.kind, post.title)?;
        }
        writeln!(out)?;

        if events.is_empty() {
            writeln!(out, "예정된 일정이 없습니다.")?;
            return Ok(());
        }
        self.write_event_table(out, events, state)
    }

    #[tracing::instrument(skip_all, fields(club = %summary.club_name))]
    pub fn print_budget(
        &self,
        summary: &BudgetSummary<'_>,
        months: &[String],
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_budget(out, summary, months)
    }

    pub fn write_budget<W: Write>(
        &self,
        mut out: W,
        summary: &BudgetSummary<'_>,
        months: &[String],
    ) -> anyhow::Result<()> {
        let period = summary.month.as_deref().unwrap_or("전체 기간");
        writeln!(out, "{} 예산 ({period})", summary.club_name)?;
        writeln!(out, "지출 건수: {}건", summary.count())?;
        writeln!(out, "총 지출: {}", format_won(summary.total))?;

        if summary.expenses.is_empty() {
            writeln!(out, "지출 내역이 없습니다.")?;
        }
        for expense in &summary.expenses {
            let mut line = format!("- {} · {}", expense.title, format_won(expense.amount));
            if !expense.note.is_empty() {
                line.push_str(&format!(" · {}", expense.note));
            }
            writeln!(out, "{line}")?;
        }

        if !months.is_empty() {
            writeln!(out, "기록된 월: {}", months.join(", "))?;
        }
        Ok(())
    }

    pub fn print_join_approvals(&self, approvals: &[JoinApproval]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if approvals.is_empty() {
            writeln!(out, "대기 중인 요청이 없습니다.")?;
            return Ok(());
        }

        let rows = approvals
            .iter()
            .map(|item| vec![item.id.clone(), item.club_name.clone(), item.applicant.clone()])
            .collect();
        write_table(
            &mut out,
            vec!["ID".to_string(), "Club".to_string(), "Applicant".to_string()],
            rows,
        )
    }

    fn day_label(&self, cell: &CalendarCell<'_>) -> String {
        let day = cell.date.day();
        let text = match (cell.is_selected, cell.in_current_month) {
            (true, true) => format!("*{day}"),
            (true, false) => format!("*({day})"),
            (false, true) => format!("{day}"),
            (false, false) => format!("({day})"),
        };
        let padded = fit(&text, CELL_WIDTH);

        if cell.is_selected {
            self.paint(&padded, "7")
        } else if !cell.in_current_month {
            self.paint(&padded, "2")
        } else {
            padded
        }
    }

    fn event_bar(&self, event: &Event, segment: SegmentKind) -> String {
        let text = match segment {
            SegmentKind::Singular => event.title().to_string(),
            SegmentKind::Start => format!("[{}", event.title()),
            SegmentKind::Middle => format!("={}", event.title()),
            SegmentKind::End => format!("{}]", event.title()),
        };
        let padded = fit(&text, CELL_WIDTH);
        let code = if event.category() == SPORTS_CATEGORY { "33" } else { "36" };
        self.paint(&padded, code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn event_dates(event: &Event) -> String {
    if event.is_multi_day() {
        format!(
            "{}..{}",
            format_iso_date(event.start_date()),
            format_iso_date(event.end_date())
        )
    } else {
        format_iso_date(event.start_date())
    }
}

fn join_label(club: &Club) -> &'static str {
    if club.joins_immediately() {
        "바로 가입"
    } else {
        "승인 필요"
    }
}

fn write_people<W: Write>(
    mut writer: W,
    role: &str,
    names: &[String],
    empty: &str,
) -> anyhow::Result<()> {
    if names.is_empty() {
        writeln!(writer, "{empty}")?;
    }
    for name in names {
        writeln!(writer, "{role} - {name}")?;
    }
    Ok(())
}

fn write_row<W: Write>(mut writer: W, cells: &[String]) -> anyhow::Result<()> {
    let line = cells.join(" ");
    writeln!(writer, "{}", line.trim_end())?;
    Ok(())
}

/// Truncates to `width` display columns (Hangul counts as two) and pads
/// the rest with spaces.
fn fit(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0usize;
    let total = UnicodeWidthStr::width(text);

    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        let reserve = if total > width { 1 } else { 0 };
        if used + w + reserve > width {
            out.push('…');
            used += 1;
            break;
        }
        out.push(ch);
        used += w;
    }

    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
