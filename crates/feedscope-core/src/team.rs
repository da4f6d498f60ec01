// Team, signed-in user, and persisted preference types.

use serde::{Deserialize, Serialize};

/// A selectable scope as returned by the team directory.
///
/// Teams are immutable once fetched; the roster is replaced wholesale on
/// every refresh rather than patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Opaque identifier used as the feed scope.
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL slug, when the directory provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Avatar reference (URL or hash), when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Team {
            id: id.into(),
            name: name.into(),
            slug: None,
            avatar: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// Response body of the team directory endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TeamList {
    pub teams: Vec<Team>,
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub uid: String,
    pub username: String,
}

impl CurrentUser {
    pub fn new(uid: impl Into<String>, username: impl Into<String>) -> Self {
        CurrentUser {
            uid: uid.into(),
            username: username.into(),
        }
    }

    /// The synthesized roster entry that represents this user.
    pub fn self_entry(&self) -> Team {
        Team::new(self.uid.clone(), self.username.clone())
    }
}

/// Build a roster from fetched teams: the self entry first, then the
/// directory's teams in server order.
pub fn build_roster(user: &CurrentUser, teams: Vec<Team>) -> Vec<Team> {
    let mut roster = Vec::with_capacity(teams.len() + 1);
    roster.push(user.self_entry());
    roster.extend(teams);
    roster
}

/// The last explicitly chosen team, as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPreference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The `currentTeam` record as written to storage.
///
/// An empty record (all fields `None`, serialized as `{}`) means "prefer
/// self": choosing the personal scope clears the preference with an
/// explicit write rather than by omitting one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentTeamRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CurrentTeamRecord {
    /// The record to store after `team` was chosen by `user`.
    pub fn for_selection(team: &Team, user: &CurrentUser) -> Self {
        if team.id == user.uid {
            return CurrentTeamRecord::default();
        }
        CurrentTeamRecord {
            id: Some(team.id.clone()),
            slug: team.slug.clone(),
            name: Some(team.name.clone()),
        }
    }

    /// Interpret a stored record. Records without an id read as "prefer self".
    pub fn into_preference(self) -> Option<PersistedPreference> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(PersistedPreference {
            id,
            slug: self.slug,
            name: self.name,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> CurrentUser {
        CurrentUser::new("u_1", "ada")
    }

    #[test]
    fn roster_starts_with_self_entry() {
        let roster = build_roster(
            &user(),
            vec![Team::new("t_1", "Alpha"), Team::new("t_2", "Beta")],
        );
        assert_eq!(roster.len(), 3);
        assert_eq!(roster[0], Team::new("u_1", "ada"));
        assert_eq!(roster[1].id, "t_1");
        assert_eq!(roster[2].id, "t_2");
    }

    #[test]
    fn selecting_self_produces_empty_record() {
        let record = CurrentTeamRecord::for_selection(&user().self_entry(), &user());
        assert!(record.is_empty());
        assert_eq!(serde_json::to_string(&record).unwrap(), "{}");
    }

    #[test]
    fn selecting_team_records_id_slug_and_name() {
        let team = Team::new("t_1", "Alpha").with_slug("alpha");
        let record = CurrentTeamRecord::for_selection(&team, &user());
        assert_eq!(record.id.as_deref(), Some("t_1"));
        assert_eq!(record.slug.as_deref(), Some("alpha"));
        assert_eq!(record.name.as_deref(), Some("Alpha"));
    }

    #[test]
    fn empty_record_reads_as_no_preference() {
        let record: CurrentTeamRecord = serde_json::from_str("{}").unwrap();
        assert!(record.into_preference().is_none());

        let blank = CurrentTeamRecord {
            id: Some(String::new()),
            ..Default::default()
        };
        assert!(blank.into_preference().is_none());
    }

    #[test]
    fn team_list_ignores_unknown_fields() {
        let json = r#"{"teams":[{"id":"t_1","name":"Alpha","slug":"alpha","created":"2017-01-01","creator_id":"u_9"}]}"#;
        let list: TeamList = serde_json::from_str(json).unwrap();
        assert_eq!(list.teams.len(), 1);
        assert_eq!(list.teams[0].slug.as_deref(), Some("alpha"));
        assert!(list.teams[0].avatar.is_none());
    }
}
