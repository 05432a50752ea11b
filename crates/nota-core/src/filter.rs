use std::collections::BTreeSet;
use std::fmt;

use anyhow::anyhow;
use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

use crate::event::Event;

/// Which clubs' events the calendar
/// shows.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize
)]
#[serde(into = "String", from = "String")]
pub enum ClubScope {
  #[default]
  All,
  Mine,
  Club(String)
}

impl ClubScope {
  pub const ALL_KEY: &'static str =
    "all";
  pub const MINE_KEY: &'static str =
    "mine";

  pub fn parse(raw: &str) -> Self {
    match raw {
      | "" | Self::ALL_KEY => Self::All,
      | Self::MINE_KEY => Self::Mine,
      | name => {
        Self::Club(name.to_string())
      }
    }
  }

  pub fn as_key(&self) -> &str {
    match self {
      | Self::All => Self::ALL_KEY,
      | Self::Mine => Self::MINE_KEY,
      | Self::Club(name) => name,
    }
  }

  fn admits(
    &self,
    club_name: &str,
    joined_clubs: &BTreeSet<String>
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Mine => {
        joined_clubs.contains(club_name)
      }
      | Self::Club(name) => {
        name == club_name
      }
    }
  }
}

impl fmt::Display for ClubScope {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl From<String> for ClubScope {
  fn from(raw: String) -> Self {
    Self::parse(&raw)
  }
}

impl From<ClubScope> for String {
  fn from(scope: ClubScope) -> Self {
    scope.as_key().to_string()
  }
}

/// The calendar's active filter
/// selection. Empty strings mean "no
/// constraint".
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize
)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
  pub category:    String,
  pub format:      String,
  pub club_scope:  ClubScope,
  pub search_text: String
}

impl FilterCriteria {
  pub fn is_empty(&self) -> bool {
    self.category.is_empty()
      && self.format.is_empty()
      && self.club_scope
        == ClubScope::All
      && self.search_text.is_empty()
  }

  /// Applies one command-line filter
  /// term such as `club:mine` or
  /// `category:운동/건강`. Bare words
  /// extend the search text.
  pub fn apply_term(
    &mut self,
    term: &str
  ) -> anyhow::Result<()> {
    let Some((key, value)) =
      term.split_once(':')
    else {
      if !self.search_text.is_empty() {
        self.search_text.push(' ');
      }
      self.search_text.push_str(term);
      return Ok(());
    };

    match key {
      | "category" | "cat" => {
        self.category =
          value.to_string();
      }
      | "format" | "fmt" => {
        self.format = value.to_string();
      }
      | "club" | "scope" => {
        self.club_scope =
          ClubScope::parse(value);
      }
      | "search" => {
        self.search_text =
          value.to_string();
      }
      | other => {
        return Err(anyhow!(
          "unknown filter key \
           '{other}' in term \
           '{term}'"
        ));
      }
    }
    trace!(term, "applied filter term");
    Ok(())
  }

  pub fn matches(
    &self,
    event: &Event,
    joined_clubs: &BTreeSet<String>
  ) -> bool {
    let category_ok = self
      .category
      .is_empty()
      || self.category == event.category();
    let format_ok =
      self.format.is_empty()
        || self.format == event.format();
    let club_ok =
      self.club_scope.admits(
        event.club_name(),
        joined_clubs
      );
    let search_ok = self
      .search_text
      .is_empty()
      || event
        .title()
        .contains(&self.search_text)
      || event
        .club_name()
        .contains(&self.search_text);

    category_ok
      && format_ok
      && club_ok
      && search_ok
  }
}

/// Subsequence of `events`, original
/// order kept, that satisfies every
/// criterion.
#[tracing::instrument(skip(
  events,
  joined_clubs
), fields(total = events.len()))]
pub fn filter_events(
  events: &[Event],
  criteria: &FilterCriteria,
  joined_clubs: &BTreeSet<String>
) -> Vec<Event> {
  let matched: Vec<Event> = events
    .iter()
    .filter(|event| {
      criteria
        .matches(event, joined_clubs)
    })
    .cloned()
    .collect();
  trace!(
    matched = matched.len(),
    "filtered events"
  );
  matched
}
