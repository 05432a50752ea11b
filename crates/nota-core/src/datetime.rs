use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

pub const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

const TIMEZONE_CONFIG_FILE: &str =
  "nota-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "NOTA_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "NOTA_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "Asia/Seoul";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

/// The real-world date the month
/// offset is anchored to.
#[must_use]
pub fn project_today() -> NaiveDate {
  to_project_date(Utc::now())
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let timezone =
    match timezone_from_toml(&raw) {
      | Ok(timezone) => timezone,
      | Err(err) => {
        tracing::error!(
          file = %path.display(),
          error = %err,
          "failed parsing timezone config file"
        );
        return None;
      }
    };
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn timezone_from_toml(
  raw: &str
) -> Result<Option<String>, toml::de::Error>
{
  let parsed =
    toml::from_str::<TimezoneConfig>(
      raw
    )?;
  Ok(parsed.timezone.or_else(|| {
    parsed
      .time
      .and_then(|section| {
        section.timezone
      })
  }))
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Strict `YYYY-MM-DD`, the only date
/// shape the seed endpoint serves.
pub fn parse_iso_date(
  raw: &str
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  if trimmed.len() != 10 {
    return None;
  }
  NaiveDate::parse_from_str(
    trimmed,
    ISO_DATE_FORMAT
  )
  .ok()
}

#[must_use]
pub fn format_iso_date(
  date: NaiveDate
) -> String {
  date.format(ISO_DATE_FORMAT).to_string()
}

#[tracing::instrument(skip(today))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => Ok(today),
    | "tomorrow" => {
      add_days(today, 1).ok_or_else(
        || anyhow!("date out of range")
      )
    }
    | "yesterday" => {
      add_days(today, -1).ok_or_else(
        || anyhow!("date out of range")
      )
    }
    | _ => {
      parse_iso_date(token).ok_or_else(
        || {
          anyhow!(
            "invalid date \
             expression: {token} \
             (expected YYYY-MM-DD, \
             today, tomorrow or \
             yesterday)"
          )
        }
      )
    }
  }
}

/// `None` past chrono's date range.
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  date.checked_add_signed(
    Duration::days(days)
  )
}

/// Most recent Sunday on or before
/// `day`, if chrono can represent it.
pub fn start_of_week_sunday(
  day: NaiveDate
) -> Option<NaiveDate> {
  let diff = day
    .weekday()
    .num_days_from_sunday()
    as i64;
  add_days(day, -diff)
}

/// A calendar month, stored as its
/// first day.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash
)]
pub struct YearMonth {
  first: NaiveDate
}

impl YearMonth {
  /// `month` is 1-based (1 = January).
  pub fn new(
    year: i32,
    month: u32
  ) -> Option<Self> {
    NaiveDate::from_ymd_opt(
      year, month, 1
    )
    .map(|first| Self {
      first
    })
  }

  /// `month0` is 0-based (0 = January),
  /// the index the portal page uses.
  pub fn from_zero_based(
    year: i32,
    month0: u32
  ) -> Option<Self> {
    Self::new(
      year,
      month0.checked_add(1)?
    )
  }

  pub fn containing(
    date: NaiveDate
  ) -> Self {
    Self {
      first: date
        .with_day(1)
        .unwrap_or(date)
    }
  }

  pub fn year(self) -> i32 {
    self.first.year()
  }

  pub fn month(self) -> u32 {
    self.first.month()
  }

  pub fn month0(self) -> u32 {
    self.first.month0()
  }

  pub fn first_day(self) -> NaiveDate {
    self.first
  }

  pub fn last_day(self) -> NaiveDate {
    (28..=31)
      .rev()
      .find_map(|day| {
        self.first.with_day(day)
      })
      .unwrap_or(self.first)
  }

  pub fn days(self) -> u32 {
    self.last_day().day()
  }

  pub fn contains(
    self,
    date: NaiveDate
  ) -> bool {
    date.year() == self.year()
      && date.month() == self.month()
  }

  /// Moves by whole months; stays put
  /// if the result leaves chrono's
  /// date range.
  pub fn shift(
    self,
    months: i32
  ) -> Self {
    let index = i64::from(self.year())
      * 12
      + i64::from(self.month0())
      + i64::from(months);
    let year = index.div_euclid(12);
    let month0 =
      index.rem_euclid(12) as u32;

    i32::try_from(year)
      .ok()
      .and_then(|year| {
        Self::from_zero_based(
          year, month0
        )
      })
      .unwrap_or(self)
  }

  /// Header label, `YYYY.MM`.
  pub fn label(self) -> String {
    format!(
      "{}.{:02}",
      self.year(),
      self.month()
    )
  }
}

impl fmt::Display for YearMonth {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}",
      self.year(),
      self.month()
    )
  }
}
