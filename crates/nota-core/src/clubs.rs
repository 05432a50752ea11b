use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::filter::ClubScope;

/// Category chip on the discover tab that disables the category filter.
pub const ALL_CATEGORIES: &str = "전체";

pub const UPCOMING_LIMIT: usize = 3;

/// Posts shown on a club's detail view.
pub const RECENT_POSTS_LIMIT: usize = 3;

const OPEN_JOIN_POLICY: &str = "바로 가입";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub format: String,

    #[serde(default)]
    pub join_policy: String,

    #[serde(default)]
    pub mood_line: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl Club {
    /// Open clubs accept members without an approval step.
    pub fn joins_immediately(&self) -> bool {
        self.join_policy == OPEN_JOIN_POLICY
    }
}

/// A board post. `kind` is the post type label such as 공지 or 모집.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    pub title: String,
}

/// Club name to that club's posts, in board order.
pub type ClubPosts = BTreeMap<String, Vec<Post>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeOption {
    pub scope: ClubScope,
    pub label: String,
}

/// Choices for the calendar's club selector: everything, joined clubs,
/// then each club in seed order.
pub fn club_scope_options(clubs: &[Club]) -> Vec<ScopeOption> {
    let mut options = vec![
        ScopeOption {
            scope: ClubScope::All,
            label: "전체".to_string(),
        },
        ScopeOption {
            scope: ClubScope::Mine,
            label: "내 동아리".to_string(),
        },
    ];
    options.extend(clubs.iter().map(|club| ScopeOption {
        scope: ClubScope::Club(club.name.clone()),
        label: club.name.clone(),
    }));
    options
}

pub fn upcoming_for_joined<'a>(
    events: &'a [Event],
    joined_clubs: &BTreeSet<String>,
    limit: usize,
) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|event| joined_clubs.contains(event.club_name()))
        .take(limit)
        .collect()
}

pub fn events_for_club<'a>(events: &'a [Event], club_name: &str) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|event| event.club_name() == club_name)
        .collect()
}

pub fn recent_posts<'a>(posts: &'a ClubPosts, club_name: &str) -> &'a [Post] {
    posts
        .get(club_name)
        .map(|list| &list[..list.len().min(RECENT_POSTS_LIMIT)])
        .unwrap_or_default()
}

pub fn find_club<'a>(clubs: &'a [Club], name: &str) -> Option<&'a Club> {
    clubs.iter().find(|club| club.name == name)
}

pub fn joined_club_records<'a>(
    clubs: &'a [Club],
    joined_clubs: &BTreeSet<String>,
) -> Vec<&'a Club> {
    clubs
        .iter()
        .filter(|club| joined_clubs.contains(&club.name))
        .collect()
}

/// Discover tab filter. An empty or `전체` category matches any club; the
/// keyword is trimmed and matched against the club name.
pub fn discover_clubs<'a>(clubs: &'a [Club], category: &str, keyword: &str) -> Vec<&'a Club> {
    let keyword = keyword.trim();
    let any_category = category.is_empty() || category == ALL_CATEGORIES;
    clubs
        .iter()
        .filter(|club| any_category || club.category == category)
        .filter(|club| keyword.is_empty() || club.name.contains(keyword))
        .collect()
}
