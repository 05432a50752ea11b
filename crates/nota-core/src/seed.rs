use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::budget::Expense;
use crate::clubs::{Club, ClubPosts, Post};
use crate::event::{Event, ingest_events};
use crate::members::{JoinApproval, Membership, User};
use crate::state::Rsvp;

pub const SEED_FILE: &str = "club_seed.json";
pub const RSVP_FILE: &str = "rsvps.json";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedPayload {
    #[serde(default, rename = "viewer_user_id")]
    viewer_user_id: Option<String>,

    #[serde(default)]
    users: Value,

    #[serde(default)]
    clubs: Value,

    #[serde(default)]
    memberships: Value,

    #[serde(default)]
    my_clubs: Value,

    #[serde(default)]
    events: Value,

    #[serde(default)]
    join_approvals: Value,

    #[serde(default)]
    posts: Value,

    #[serde(default)]
    expenses: Value,
}

/// One fully formed load of the club page data. Replaced wholesale on
/// every refresh.
#[derive(Debug, Clone, Default)]
pub struct SeedSnapshot {
    pub viewer_user_id: Option<String>,
    pub users: Vec<User>,
    pub clubs: Vec<Club>,
    pub memberships: Vec<Membership>,
    pub joined_clubs: BTreeSet<String>,
    pub events: Vec<Event>,
    pub rejected_events: usize,
    pub join_approvals: Vec<JoinApproval>,
    pub posts: ClubPosts,
    pub expenses: Vec<Expense>,
}

impl SeedSnapshot {
    #[tracing::instrument(skip(text), fields(bytes = text.len()))]
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let payload: SeedPayload =
            serde_json::from_str(text).context("seed payload is not valid JSON")?;

        let joined_clubs = array_or_empty(payload.my_clubs, "myClubs")
            .into_iter()
            .filter_map(|value| match value {
                Value::String(name) => Some(name),
                other => {
                    warn!(value = %other, "ignoring non-string joined club");
                    None
                }
            })
            .collect();

        let ingested = ingest_events(array_or_empty(payload.events, "events"));

        Ok(Self {
            viewer_user_id: payload.viewer_user_id,
            users: records(payload.users, "users"),
            clubs: records(payload.clubs, "clubs"),
            memberships: records(payload.memberships, "memberships"),
            joined_clubs,
            events: ingested.events,
            rejected_events: ingested.rejected.len(),
            join_approvals: records(payload.join_approvals, "joinApprovals"),
            posts: club_posts(payload.posts),
            expenses: records(payload.expenses, "expenses"),
        })
    }
}

/// Decodes each element on its own; undecodable ones are logged and skipped.
fn records<T: DeserializeOwned>(value: Value, field: &str) -> Vec<T> {
    array_or_empty(value, field)
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<T>(record) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(field, error = %err, "dropping seed record");
                None
            }
        })
        .collect()
}

fn club_posts(value: Value) -> ClubPosts {
    match value {
        Value::Object(by_club) => by_club
            .into_iter()
            .map(|(club, list)| {
                let posts: Vec<Post> = records(list, "posts");
                (club, posts)
            })
            .collect(),
        Value::Null => ClubPosts::new(),
        other => {
            warn!(kind = json_kind(&other), "expected posts keyed by club; using none");
            ClubPosts::new()
        }
    }
}

fn array_or_empty(value: Value, field: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => vec![],
        other => {
            warn!(field, kind = json_kind(&other), "expected an array; using empty list");
            vec![]
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The read-only seed plus the viewer's RSVP file, both under `data_dir`.
#[derive(Debug)]
pub struct SeedStore {
    pub data_dir: PathBuf,
    pub seed_path: PathBuf,
    pub rsvp_path: PathBuf,
}

impl SeedStore {
    /// Resolves paths only; the directory is created on the first write.
    pub fn open(data_dir: &Path) -> Self {
        let data_dir = data_dir.to_path_buf();
        let seed_path = data_dir.join(SEED_FILE);
        let rsvp_path = data_dir.join(RSVP_FILE);
        info!(
            data_dir = %data_dir.display(),
            seed = %seed_path.display(),
            rsvps = %rsvp_path.display(),
            "opened seed store"
        );

        Self {
            data_dir,
            seed_path,
            rsvp_path,
        }
    }

    /// A missing or unreadable seed yields an empty snapshot so the
    /// calendar still renders; malformed JSON is reported.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<SeedSnapshot> {
        let text = match fs::read_to_string(&self.seed_path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    seed = %self.seed_path.display(),
                    "seed file not found; using empty snapshot"
                );
                return Ok(SeedSnapshot::default());
            }
            Err(err) => {
                warn!(
                    seed = %self.seed_path.display(),
                    error = %err,
                    "failed reading seed file; using empty snapshot"
                );
                return Ok(SeedSnapshot::default());
            }
        };

        let snapshot = SeedSnapshot::from_json(&text)
            .with_context(|| format!("failed to load {}", self.seed_path.display()))?;
        debug!(
            clubs = snapshot.clubs.len(),
            joined = snapshot.joined_clubs.len(),
            events = snapshot.events.len(),
            rejected = snapshot.rejected_events,
            "loaded seed snapshot"
        );
        Ok(snapshot)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_rsvps(&self) -> anyhow::Result<BTreeMap<String, Rsvp>> {
        let text = match fs::read_to_string(&self.rsvp_path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading {}", self.rsvp_path.display()));
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let rsvps: BTreeMap<String, Rsvp> = serde_json::from_str(&text)
            .with_context(|| format!("failed parsing {}", self.rsvp_path.display()))?;
        debug!(count = rsvps.len(), "loaded rsvps");
        Ok(rsvps)
    }

    #[tracing::instrument(skip(self, rsvps), fields(count = rsvps.len()))]
    pub fn save_rsvps(&self, rsvps: &BTreeMap<String, Rsvp>) -> anyhow::Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        serde_json::to_writer_pretty(&mut temp, rsvps)?;
        writeln!(temp)?;
        temp.flush()?;

        temp.persist(&self.rsvp_path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.rsvp_path.display(), err))?;
        info!(file = %self.rsvp_path.display(), "saved rsvps");
        Ok(())
    }
}
