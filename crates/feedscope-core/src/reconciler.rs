// Config reconciler: reads and writes the persisted "current team" record.
//
// Reading and deriving are split: `read_preference` does the I/O and
// `derive_scope` decides what the preference means for the current roster,
// so the engine can apply the result through its single scope-change path.

use std::sync::Arc;

use tracing::debug;

use crate::collab::ConfigStore;
use crate::error::StoreError;
use crate::team::{CurrentTeamRecord, CurrentUser, PersistedPreference, Team};

/// What a persisted preference resolves to against a roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// No preference: the personal scope.
    SelfEntry,
    /// The preferred team, found in the roster.
    Team(Team),
    /// A preference exists but no roster has been fetched yet.
    Deferred,
    /// The preferred team is missing from a fetched roster.
    Stale,
}

/// Resolve `preferred` against `roster` (empty until the first fetch).
pub fn derive_scope(preferred: Option<&PersistedPreference>, roster: &[Team]) -> Derivation {
    let Some(preferred) = preferred else {
        return Derivation::SelfEntry;
    };
    if roster.is_empty() {
        return Derivation::Deferred;
    }
    match roster.iter().find(|t| t.id == preferred.id) {
        Some(team) => Derivation::Team(team.clone()),
        None => Derivation::Stale,
    }
}

#[derive(Clone)]
pub struct ConfigReconciler {
    store: Arc<dyn ConfigStore>,
}

impl ConfigReconciler {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        ConfigReconciler { store }
    }

    pub async fn read_preference(&self) -> Result<Option<PersistedPreference>, StoreError> {
        self.store.read().await
    }

    /// Store `team` as the preferred scope for `user`.
    ///
    /// Choosing the user's own entry writes an empty record. Without a
    /// signed-in user nothing is written.
    pub async fn persist(&self, team: &Team, user: Option<&CurrentUser>) -> Result<(), StoreError> {
        let Some(user) = user else {
            debug!("No signed-in user, not persisting scope {}", team.id);
            return Ok(());
        };
        let record = CurrentTeamRecord::for_selection(team, user);
        debug!("Persisting current team record {:?}", record);
        self.store.write(record).await
    }
}
