use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clubs::Club;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Pending,
    #[serde(other)]
    Other,
}

/// One user's standing in one club, keyed by club id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub club_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
}

/// A pending join request as the admin approvals tab lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinApproval {
    pub id: String,
    pub club_name: String,
    pub applicant: String,

    #[serde(default, rename = "club_id")]
    pub club_id: Option<String>,

    #[serde(default, rename = "user_id")]
    pub user_id: Option<String>,
}

/// Display names for a club's people, split the way the club detail shows
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClubRoster {
    pub admins: Vec<String>,
    pub members: Vec<String>,
    pub pending: Vec<String>,
}

impl ClubRoster {
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty() && self.members.is_empty() && self.pending.is_empty()
    }
}

/// Active admins, other active members, and pending applicants of `club`,
/// in membership order. Unknown user ids fall back to the raw id.
pub fn club_roster(club: &Club, memberships: &[Membership], users: &[User]) -> ClubRoster {
    let names: HashMap<&str, &str> = users
        .iter()
        .map(|user| (user.id.as_str(), user.name.as_str()))
        .collect();
    let display = |membership: &Membership| {
        names
            .get(membership.user_id.as_str())
            .map(|name| name.to_string())
            .unwrap_or_else(|| membership.user_id.clone())
    };

    let mut roster = ClubRoster::default();
    for membership in memberships.iter().filter(|m| m.club_id == club.id) {
        match (membership.status, membership.role) {
            (MemberStatus::Active, MemberRole::Admin) => roster.admins.push(display(membership)),
            (MemberStatus::Active, _) => roster.members.push(display(membership)),
            (MemberStatus::Pending, _) => roster.pending.push(display(membership)),
            (MemberStatus::Other, _) => {}
        }
    }
    roster
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: None,
            team: None,
        }
    }

    fn membership(
        club_id: &str,
        user_id: &str,
        role: MemberRole,
        status: MemberStatus,
    ) -> Membership {
        Membership {
            club_id: club_id.to_string(),
            user_id: user_id.to_string(),
            role,
            status,
        }
    }

    fn table_tennis() -> Club {
        Club {
            id: "club-tt".to_string(),
            name: "탁구".to_string(),
            category: "운동/건강".to_string(),
            format: "혼합 운영".to_string(),
            join_policy: "바로 가입".to_string(),
            mood_line: String::new(),
            tags: vec![],
        }
    }

    #[test]
    fn roster_splits_admins_members_and_applicants() {
        let users = vec![user("user_001", "김민수"), user("user_002", "이서연")];
        let memberships = vec![
            membership("club-tt", "user_001", MemberRole::Admin, MemberStatus::Active),
            membership("club-tt", "user_002", MemberRole::Member, MemberStatus::Active),
            membership("club-bg", "user_002", MemberRole::Admin, MemberStatus::Active),
            membership("club-tt", "user_404", MemberRole::Member, MemberStatus::Pending),
            membership("club-tt", "user_002", MemberRole::Admin, MemberStatus::Other),
        ];

        let roster = club_roster(&table_tennis(), &memberships, &users);
        assert_eq!(roster.admins, vec!["김민수"]);
        assert_eq!(roster.members, vec!["이서연"]);
        assert_eq!(roster.pending, vec!["user_404"]);
    }

    #[test]
    fn pending_admins_are_applicants_not_admins() {
        let memberships = vec![membership(
            "club-tt",
            "user_003",
            MemberRole::Admin,
            MemberStatus::Pending,
        )];
        let roster = club_roster(&table_tennis(), &memberships, &[]);
        assert!(roster.admins.is_empty());
        assert_eq!(roster.pending, vec!["user_003"]);
        assert!(club_roster(&table_tennis(), &[], &[]).is_empty());
    }

    #[test]
    fn membership_records_decode_with_unknown_states() {
        let parsed: Membership = serde_json::from_str(
            r#"{"club_id": "club-cl", "user_id": "user_002",
                "role": "member", "status": "banned"}"#,
        )
        .expect("membership json");
        assert_eq!(parsed.role, MemberRole::Member);
        assert_eq!(parsed.status, MemberStatus::Other);

        let approval: JoinApproval = serde_json::from_str(
            r#"{"id": "join-club-cl-user_002", "clubName": "클래식", "applicant": "이서연",
                "club_id": "club-cl", "user_id": "user_002"}"#,
        )
        .expect("approval json");
        assert_eq!(approval.club_name, "클래식");
        assert_eq!(approval.club_id.as_deref(), Some("club-cl"));
    }
}
