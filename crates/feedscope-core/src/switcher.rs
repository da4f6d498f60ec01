// Switcher engine state and its event handlers.
//
// `Switcher` owns the scope state and the collaborators. Every mutation of
// roster or scope goes through the handlers here, which run one at a time
// on the engine task (see `runtime::run`). Persist writes are the only
// work handed off the engine task: a single writer applies them in selection
// order, and they never feed back into the state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collab::{CreateTeamLink, FeedScope, MenuChannel};
use crate::dispatch::{dispatch_click, dispatch_key, Dispatch};
use crate::online::OnlineMonitor;
use crate::protocol::{EngineEvent, HostEvent, UiUpdate, UserCommand};
use crate::reconciler::{derive_scope, ConfigReconciler, Derivation};
use crate::scope::ScopeState;
use crate::team::{CurrentTeamRecord, CurrentUser, PersistedPreference, Team};

/// How long teardown waits for in-flight config writes.
pub const PERSIST_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a `change_scope` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeChange {
    Changed,
    /// Already the active scope.
    Unchanged,
    /// No feed collaborator is attached.
    NoFeed,
    /// Neither the self id nor a team in the roster.
    NotSelectable,
}

/// Channels the engine uses to reach the rest of the widget.
pub struct SwitcherLinks {
    pub session_tx: watch::Sender<Option<CurrentUser>>,
    pub refresh_tx: mpsc::Sender<()>,
    pub ui_tx: mpsc::Sender<UiUpdate>,
}

pub struct Switcher {
    state: ScopeState,
    /// Last preference read from or written to storage.
    preferred: Option<PersistedPreference>,
    reconciler: ConfigReconciler,
    feed: Option<Arc<dyn FeedScope>>,
    menu: Option<Arc<dyn MenuChannel>>,
    create_team: Option<CreateTeamLink>,
    monitor: OnlineMonitor,
    links: SwitcherLinks,
    /// Digit keys only act while the host window is visible.
    keys_enabled: bool,
    /// Started on the first persist, stopped by `drain_persists`.
    persist_worker: Option<PersistWorker>,
    /// An update was dropped on a full UI channel; the view needs a snapshot.
    ui_stale: AtomicBool,
}

/// Background writer for chosen scopes. Jobs run one at a time in the order
/// they were queued, so the stored record is always the latest choice.
struct PersistWorker {
    tx: mpsc::UnboundedSender<(Team, CurrentUser)>,
    handle: JoinHandle<()>,
}

impl PersistWorker {
    fn spawn(reconciler: ConfigReconciler) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Team, CurrentUser)>();
        let handle = tokio::spawn(async move {
            while let Some((team, user)) = rx.recv().await {
                if let Err(e) = reconciler.persist(&team, Some(&user)).await {
                    warn!("Failed to persist scope {}: {}", team.id, e);
                }
            }
        });
        PersistWorker { tx, handle }
    }
}

impl Switcher {
    pub fn new(
        user: Option<CurrentUser>,
        reconciler: ConfigReconciler,
        feed: Option<Arc<dyn FeedScope>>,
        menu: Option<Arc<dyn MenuChannel>>,
        monitor: OnlineMonitor,
        links: SwitcherLinks,
    ) -> Self {
        Switcher {
            state: ScopeState::new(user),
            preferred: None,
            reconciler,
            feed,
            menu,
            create_team: None,
            monitor,
            links,
            keys_enabled: true,
            persist_worker: None,
            ui_stale: AtomicBool::new(false),
        }
    }

    pub fn with_create_team(mut self, link: Option<CreateTeamLink>) -> Self {
        self.create_team = link;
        self
    }

    pub fn state(&self) -> &ScopeState {
        &self.state
    }

    pub fn preferred(&self) -> Option<&PersistedPreference> {
        self.preferred.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    // -----------------------------------------------------------------------
    // Scope transitions
    // -----------------------------------------------------------------------

    /// Make `team` the active scope.
    ///
    /// Notifies the feed, updates the scope optimistically and, when
    /// `persist` is set, writes the choice in the background. A failed write
    /// is logged and does not roll the scope back.
    pub fn change_scope(&mut self, team: &Team, persist: bool) -> ScopeChange {
        if self.state.scope() == Some(team.id.as_str()) {
            return ScopeChange::Unchanged;
        }
        let Some(feed) = self.feed.clone() else {
            debug!("No feed attached, ignoring scope change to {}", team.id);
            return ScopeChange::NoFeed;
        };
        if !self.state.is_selectable(&team.id) {
            debug!("Ignoring scope change to unknown id {}", team.id);
            return ScopeChange::NotSelectable;
        }

        feed.notify(&team.id);
        self.state.set_scope(&team.id);
        info!("Scope changed to {} ({})", team.name, team.id);
        self.push_ui(UiUpdate::Scope(team.id.clone()));

        if persist {
            self.spawn_persist(team.clone());
        }
        ScopeChange::Changed
    }

    fn spawn_persist(&mut self, team: Team) {
        let Some(user) = self.state.user().cloned() else {
            return;
        };
        self.preferred = CurrentTeamRecord::for_selection(&team, &user).into_preference();

        let reconciler = &self.reconciler;
        let worker = self
            .persist_worker
            .get_or_insert_with(|| PersistWorker::spawn(reconciler.clone()));
        if let Err(mpsc::error::SendError((team, _))) = worker.tx.send((team, user)) {
            warn!("Config writer stopped, dropping persist of {}", team.id);
        }
    }

    fn apply_derivation(&mut self, derivation: Derivation) {
        let Some(self_entry) = self.state.self_entry() else {
            return;
        };
        match derivation {
            Derivation::SelfEntry => {
                self.change_scope(&self_entry, false);
            }
            Derivation::Team(team) => {
                self.change_scope(&team, false);
            }
            Derivation::Deferred => {
                // Show the personal scope until the preferred team can be
                // checked against a fetched roster.
                if self.state.scope().is_none() {
                    self.change_scope(&self_entry, false);
                }
            }
            Derivation::Stale => {
                if let Some(stale) = self.preferred.take() {
                    warn!(
                        "Preferred team {} is not in the roster, using personal scope",
                        stale.id
                    );
                }
                self.change_scope(&self_entry, false);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Read the persisted preference and apply it (without re-saving it).
    pub async fn resolve_initial_scope(&mut self) {
        if self.state.user().is_none() {
            debug!("No signed-in user, skipping scope resolution");
            return;
        }
        match self.reconciler.read_preference().await {
            Ok(preferred) => self.preferred = preferred,
            Err(e) => {
                warn!("Failed to read persisted preference: {}", e);
                return;
            }
        }
        let derivation = derive_scope(self.preferred.as_ref(), self.state.roster());
        self.apply_derivation(derivation);
    }

    /// The persisted preference changed out-of-band.
    pub async fn apply_external_change_notification(&mut self) {
        if self.state.roster().is_empty() {
            debug!("Config changed before the first roster, ignoring");
            return;
        }
        self.resolve_initial_scope().await;
    }

    pub fn on_roster_fetched(&mut self, roster: Vec<Team>, fetched_at: DateTime<Utc>) {
        let Some(user) = self.state.user() else {
            debug!("Discarding roster fetched without a signed-in user");
            return;
        };
        if roster.first().map(|t| t.id.as_str()) != Some(user.uid.as_str()) {
            debug!("Discarding roster fetched for a previous session");
            return;
        }
        self.push_ui(UiUpdate::Synced(fetched_at));

        if !self.state.replace_roster(roster) {
            debug!("Roster unchanged");
            return;
        }
        info!("Roster updated: {} teams", self.state.roster().len() - 1);
        self.push_ui(UiUpdate::Roster(self.state.roster().to_vec()));

        if self.state.scope_is_self_or_unset() {
            let derivation = derive_scope(self.preferred.as_ref(), self.state.roster());
            self.apply_derivation(derivation);
        } else if !self.state.scope_is_valid() {
            warn!("Active team left the roster, using personal scope");
            if let Some(self_entry) = self.state.self_entry() {
                self.change_scope(&self_entry, false);
            }
        }
    }

    /// A different user signed in. Sign-outs are ignored: the host tears the
    /// widget down instead.
    pub async fn on_session(&mut self, user: Option<CurrentUser>) {
        let Some(user) = user else {
            debug!("Ignoring sign-out event");
            return;
        };
        if self.state.user() == Some(&user) {
            return;
        }

        info!("Signed-in user is now {}", user.username);
        self.state.set_user(Some(user.clone()));
        self.preferred = None;
        self.links.session_tx.send_replace(Some(user.clone()));
        self.push_ui(UiUpdate::Roster(Vec::new()));

        self.change_scope(&user.self_entry(), false);
        self.resolve_initial_scope().await;

        // Fetch the new user's teams without waiting out the interval.
        let _ = self.links.refresh_tx.try_send(());
    }

    pub fn set_online(&mut self, online: bool) {
        if self.monitor.set_online(online) {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
            self.push_ui(UiUpdate::Online(online));
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    pub async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::RosterFetched { roster, fetched_at } => {
                self.on_roster_fetched(roster, fetched_at);
            }
            EngineEvent::Host(HostEvent::ConfigChanged) => {
                self.apply_external_change_notification().await;
            }
            EngineEvent::Host(HostEvent::Connectivity { online }) => {
                self.set_online(online);
            }
            EngineEvent::Host(HostEvent::Window { visible }) => {
                debug!("Host window visible: {}", visible);
                self.keys_enabled = visible;
            }
            EngineEvent::Host(HostEvent::Session { user }) => {
                self.on_session(user).await;
            }
        }
    }

    pub fn handle_command(&mut self, cmd: UserCommand) {
        let roster_len = self.state.roster().len();
        match cmd {
            UserCommand::Key(press) => {
                if !self.keys_enabled {
                    return;
                }
                if let Dispatch::Select { index, .. } = dispatch_key(&press, roster_len) {
                    self.select_index(index);
                }
            }
            UserCommand::Click(index) => {
                if let Dispatch::Select { index, .. } = dispatch_click(index, roster_len) {
                    self.select_index(index);
                }
            }
            UserCommand::OpenMenu(request) => match &self.menu {
                Some(menu) => menu.request(request),
                None => debug!("No menu channel attached"),
            },
            UserCommand::CreateTeam => match &self.create_team {
                Some(link) => {
                    info!("Opening team creation at {}", link.url);
                    link.opener.open_external(&link.url);
                }
                None => debug!("No team creation link configured"),
            },
            UserCommand::Refresh => {
                if self.links.refresh_tx.try_send(()).is_err() {
                    debug!("Refresh already pending");
                }
            }
            UserCommand::Quit => {
                // Handled by the engine loop.
            }
        }
    }

    fn select_index(&mut self, index: usize) {
        let team = self.state.roster()[index].clone();
        self.change_scope(&team, true);
    }

    /// Wait (bounded) for queued config writes, then abort the writer.
    /// A later persist starts a fresh writer.
    pub async fn drain_persists(&mut self, timeout: Duration) {
        let Some(PersistWorker { tx, mut handle }) = self.persist_worker.take() else {
            return;
        };
        drop(tx);
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            warn!("Abandoning pending config writes after {:?}", timeout);
            handle.abort();
        }
    }

    /// Push the full current state to the view.
    pub fn publish_snapshot(&self) {
        for update in self.snapshot() {
            self.push_ui(update);
        }
    }

    fn snapshot(&self) -> Vec<UiUpdate> {
        let mut updates = vec![
            UiUpdate::Online(self.monitor.is_online()),
            UiUpdate::Roster(self.state.roster().to_vec()),
        ];
        if let Some(scope) = self.state.scope() {
            updates.push(UiUpdate::Scope(scope.to_string()));
        }
        updates
    }

    /// After updates were dropped, republish the whole state once the
    /// channel has room for it. Returns `true` when the view is current.
    pub fn resync_ui(&self) -> bool {
        if !self.ui_stale.load(Ordering::Relaxed) {
            return true;
        }
        let snapshot = self.snapshot();
        if self.links.ui_tx.capacity() < snapshot.len() {
            return false;
        }
        self.ui_stale.store(false, Ordering::Relaxed);
        debug!("Republishing view state after dropped updates");
        for update in snapshot {
            self.push_ui(update);
        }
        !self.ui_stale.load(Ordering::Relaxed)
    }

    fn push_ui(&self, update: UiUpdate) {
        if self.ui_stale.load(Ordering::Relaxed) {
            // The snapshot already carries roster, scope and connectivity.
            if !self.resync_ui() || !matches!(update, UiUpdate::Synced(_)) {
                return;
            }
        }
        match self.links.ui_tx.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(update)) => {
                warn!("UI channel full, dropping {:?}", update);
                self.ui_stale.store(true, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
