use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::datetime::parse_iso_date;

/// Visual role an event plays on one calendar cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Singular,
    Start,
    Middle,
    End,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Singular => "singular",
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event {id}: invalid {field} {value:?}")]
    InvalidDate {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("event {id}: start date {start} is after end date {end}")]
    ReversedRange {
        id: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("malformed event record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Event record exactly as the seed endpoint serves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: String,
    pub title: String,
    pub club_name: String,
    pub category: String,
    pub format: String,
    pub start_date: String,
    pub end_date: String,

    #[serde(default)]
    pub time: Option<String>,

    #[serde(default)]
    pub place: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// A club activity with a validated, inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: String,
    title: String,
    club_name: String,
    category: String,
    format: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    time: Option<String>,
    place: Option<String>,
    description: Option<String>,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        club_name: impl Into<String>,
        category: impl Into<String>,
        format: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, EventError> {
        let id = id.into();
        if start_date > end_date {
            return Err(EventError::ReversedRange {
                id,
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            id,
            title: title.into(),
            club_name: club_name.into(),
            category: category.into(),
            format: format.into(),
            start_date,
            end_date,
            time: None,
            place: None,
            description: None,
        })
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_place(mut self, place: impl Into<String>) -> Self {
        self.place = Some(place.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn club_name(&self) -> &str {
        &self.club_name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn place(&self) -> Option<&str> {
        self.place.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_multi_day(&self) -> bool {
        self.start_date != self.end_date
    }

    /// Inclusive range test shared by the month grid and the day panel.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn segment_on(&self, date: NaiveDate) -> Option<SegmentKind> {
        if !self.occurs_on(date) {
            return None;
        }

        let kind = if date == self.start_date && date == self.end_date {
            SegmentKind::Singular
        } else if date == self.start_date {
            SegmentKind::Start
        } else if date == self.end_date {
            SegmentKind::End
        } else {
            SegmentKind::Middle
        };
        Some(kind)
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = EventError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let start = parse_iso_date(&raw.start_date).ok_or_else(|| EventError::InvalidDate {
            id: raw.id.clone(),
            field: "startDate",
            value: raw.start_date.clone(),
        })?;
        let end = parse_iso_date(&raw.end_date).ok_or_else(|| EventError::InvalidDate {
            id: raw.id.clone(),
            field: "endDate",
            value: raw.end_date.clone(),
        })?;

        let mut event = Event::new(
            raw.id,
            raw.title,
            raw.club_name,
            raw.category,
            raw.format,
            start,
            end,
        )?;
        event.time = raw.time.filter(|value| !value.trim().is_empty());
        event.place = raw.place.filter(|value| !value.trim().is_empty());
        event.description = raw.description.filter(|value| !value.trim().is_empty());
        Ok(event)
    }
}

#[derive(Debug, Default)]
pub struct Ingested {
    pub events: Vec<Event>,
    pub rejected: Vec<EventError>,
}

/// Validates each record on its own so one bad event never hides the rest.
#[tracing::instrument(skip(records), fields(count = records.len()))]
pub fn ingest_events(records: Vec<Value>) -> Ingested {
    let mut out = Ingested::default();

    for record in records {
        let parsed = serde_json::from_value::<RawEvent>(record)
            .map_err(EventError::from)
            .and_then(Event::try_from);

        match parsed {
            Ok(event) => out.events.push(event),
            Err(err) => {
                warn!(error = %err, "dropping event record");
                out.rejected.push(err);
            }
        }
    }

    debug!(
        accepted = out.events.len(),
        rejected = out.rejected.len(),
        "ingested events"
    );
    out
}
