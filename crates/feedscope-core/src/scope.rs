// Scope state: the roster and the active scope.
//
// Invariant: once set, `scope` is the self id or the id of a team currently
// in `roster`, and it is never cleared back to `None`.

use crate::team::{CurrentUser, Team};

#[derive(Debug, Default, Clone)]
pub struct ScopeState {
    user: Option<CurrentUser>,
    roster: Vec<Team>,
    scope: Option<String>,
}

impl ScopeState {
    pub fn new(user: Option<CurrentUser>) -> Self {
        ScopeState {
            user,
            roster: Vec::new(),
            scope: None,
        }
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn roster(&self) -> &[Team] {
        &self.roster
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn self_entry(&self) -> Option<Team> {
        self.user.as_ref().map(CurrentUser::self_entry)
    }

    /// `true` when the scope is unset or points at the signed-in user.
    pub fn scope_is_self_or_unset(&self) -> bool {
        match (&self.scope, &self.user) {
            (None, _) => true,
            (Some(scope), Some(user)) => *scope == user.uid,
            (Some(_), None) => false,
        }
    }

    pub fn find(&self, id: &str) -> Option<&Team> {
        self.roster.iter().find(|t| t.id == id)
    }

    /// Whether `id` may become the active scope.
    pub fn is_selectable(&self, id: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.uid == id) || self.find(id).is_some()
    }

    /// Whether the current scope still satisfies the invariant.
    pub fn scope_is_valid(&self) -> bool {
        self.scope.as_deref().map_or(true, |id| self.is_selectable(id))
    }

    /// Move the scope to `id`. Refused (returns `false`) when `id` is not
    /// selectable.
    pub fn set_scope(&mut self, id: &str) -> bool {
        if !self.is_selectable(id) {
            return false;
        }
        self.scope = Some(id.to_string());
        true
    }

    /// Replace the roster wholesale. Returns `false` and keeps the current
    /// roster when the new one has identical content.
    pub fn replace_roster(&mut self, roster: Vec<Team>) -> bool {
        if self.roster == roster {
            return false;
        }
        self.roster = roster;
        true
    }

    /// Switch to a different signed-in user. The previous user's roster is
    /// dropped; the scope is left for the caller to re-derive.
    pub fn set_user(&mut self, user: Option<CurrentUser>) {
        if self.user != user {
            self.roster.clear();
        }
        self.user = user;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> CurrentUser {
        CurrentUser::new("u_1", "ada")
    }

    fn roster() -> Vec<Team> {
        vec![
            ada().self_entry(),
            Team::new("t_1", "Alpha"),
            Team::new("t_2", "Beta"),
        ]
    }

    #[test]
    fn new_state_is_unset() {
        let state = ScopeState::new(Some(ada()));
        assert!(state.scope().is_none());
        assert!(state.roster().is_empty());
        assert!(state.scope_is_self_or_unset());
        assert!(state.scope_is_valid());
    }

    #[test]
    fn self_id_is_selectable_before_any_roster() {
        let mut state = ScopeState::new(Some(ada()));
        assert!(state.set_scope("u_1"));
        assert_eq!(state.scope(), Some("u_1"));
        assert!(state.scope_is_self_or_unset());
    }

    #[test]
    fn unknown_ids_are_refused() {
        let mut state = ScopeState::new(Some(ada()));
        state.replace_roster(roster());
        state.set_scope("t_1");

        assert!(!state.set_scope("t_404"));
        assert_eq!(state.scope(), Some("t_1"));
    }

    #[test]
    fn nothing_is_selectable_without_a_user_or_roster() {
        let mut state = ScopeState::new(None);
        assert!(!state.set_scope("u_1"));
        assert!(state.scope().is_none());
    }

    #[test]
    fn identical_roster_is_not_replaced() {
        let mut state = ScopeState::new(Some(ada()));
        assert!(state.replace_roster(roster()));
        assert!(!state.replace_roster(roster()));

        let mut reordered = roster();
        reordered.swap(1, 2);
        assert!(state.replace_roster(reordered));
        assert_eq!(state.roster()[1].id, "t_2");
    }

    #[test]
    fn dropping_a_team_invalidates_a_scope_on_it() {
        let mut state = ScopeState::new(Some(ada()));
        state.replace_roster(roster());
        state.set_scope("t_2");
        assert!(state.scope_is_valid());

        state.replace_roster(roster()[..2].to_vec());
        assert!(!state.scope_is_valid());
        assert!(!state.scope_is_self_or_unset());
    }

    #[test]
    fn changing_user_clears_roster() {
        let mut state = ScopeState::new(Some(ada()));
        state.replace_roster(roster());

        state.set_user(Some(ada()));
        assert_eq!(state.roster().len(), 3, "same user keeps roster");

        state.set_user(Some(CurrentUser::new("u_2", "grace")));
        assert!(state.roster().is_empty());
        assert!(state.is_selectable("u_2"));
        assert!(!state.is_selectable("u_1"));
    }
}
