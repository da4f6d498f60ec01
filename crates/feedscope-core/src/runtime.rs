// Widget lifecycle: mount, host-event subscriptions, unmount.
//
// Mounting spawns two tasks: the roster poller and the engine loop that owns
// the `Switcher`. Both stop on the widget's cancellation token. Host event
// sources are attached with `subscribe` and detached with `unsubscribe`;
// every subscription is released on unmount.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collab::{ConfigStore, CreateTeamLink, FeedScope, MenuChannel, TeamDirectory};
use crate::online::OnlineMonitor;
use crate::poller::{PollTimings, RosterPoller};
use crate::protocol::{EngineEvent, HostEvent, UiUpdate, UserCommand};
use crate::reconciler::ConfigReconciler;
use crate::switcher::{Switcher, SwitcherLinks, PERSIST_DRAIN_TIMEOUT};
use crate::team::CurrentUser;

pub const ENGINE_INBOX_CAPACITY: usize = 64;
pub const COMMAND_CAPACITY: usize = 64;

/// Upper bound on how long unmount waits for tasks before aborting them.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Everything the widget needs from its host.
pub struct WidgetParts {
    pub directory: Arc<dyn TeamDirectory>,
    pub store: Arc<dyn ConfigStore>,
    /// Without a feed, scope changes are refused.
    pub feed: Option<Arc<dyn FeedScope>>,
    pub menu: Option<Arc<dyn MenuChannel>>,
    /// Without a link, the "Create a Team" entry does nothing.
    pub create_team: Option<CreateTeamLink>,
    pub user: Option<CurrentUser>,
    pub timings: PollTimings,
    /// Connectivity at mount time.
    pub online: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// A mounted scope switcher.
pub struct Widget {
    cancel: CancellationToken,
    inbox: mpsc::Sender<EngineEvent>,
    commands: mpsc::Sender<UserCommand>,
    tasks: JoinSet<()>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_subscription: u64,
}

impl Widget {
    /// Start the poller and the engine. Must be called inside a Tokio runtime.
    pub fn mount(parts: WidgetParts, ui_tx: mpsc::Sender<UiUpdate>) -> Widget {
        let cancel = CancellationToken::new();
        let monitor = OnlineMonitor::new(parts.online);
        let (session_tx, session_rx) = watch::channel(parts.user.clone());
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (inbox_tx, inbox_rx) = mpsc::channel(ENGINE_INBOX_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);

        let poller = RosterPoller::new(parts.directory, monitor.flag(), session_rx, parts.timings);
        let switcher = Switcher::new(
            parts.user,
            ConfigReconciler::new(parts.store),
            parts.feed,
            parts.menu,
            monitor,
            SwitcherLinks {
                session_tx,
                refresh_tx,
                ui_tx,
            },
        )
        .with_create_team(parts.create_team);

        let mut tasks = JoinSet::new();
        tasks.spawn(poller.run(inbox_tx.clone(), refresh_rx, cancel.child_token()));
        tasks.spawn(run(switcher, inbox_rx, cmd_rx, cancel.clone()));
        info!("Widget mounted");

        Widget {
            cancel,
            inbox: inbox_tx,
            commands: cmd_tx,
            tasks,
            subscriptions: HashMap::new(),
            next_subscription: 0,
        }
    }

    /// Sender for user input (keys, clicks, menu, refresh, quit).
    pub fn commands(&self) -> mpsc::Sender<UserCommand> {
        self.commands.clone()
    }

    /// Token cancelled when the widget unmounts; for tasks that should
    /// share its lifetime.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Deliver a single host event. Returns `false` once the engine has stopped.
    pub async fn deliver(&self, event: HostEvent) -> bool {
        self.inbox.send(event.into()).await.is_ok()
    }

    /// Forward every event from `events` to the engine until the source
    /// closes, the subscription is cancelled, or the widget unmounts.
    pub fn subscribe(&mut self, mut events: mpsc::Receiver<HostEvent>) -> SubscriptionId {
        self.next_subscription = self.next_subscription.wrapping_add(1);
        let id = SubscriptionId(self.next_subscription);

        let token = self.cancel.child_token();
        let task_token = token.clone();
        let inbox = self.inbox.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = task_token.cancelled() => break,
                    event = events.recv() => event,
                };
                let Some(event) = event else { break };
                if inbox.send(event.into()).await.is_err() {
                    break;
                }
            }
        });

        debug!("Host event subscription {:?} attached", id);
        self.subscriptions.insert(
            id,
            Subscription {
                token,
                handle: Some(handle),
            },
        );
        id
    }

    /// Detach a subscription. Returns `false` for an unknown id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.subscriptions.remove(&id) {
            Some(sub) => {
                debug!("Host event subscription {:?} detached", id);
                drop(sub);
                true
            }
            None => false,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Stop all tasks and release every subscription.
    ///
    /// Pending config writes get a bounded grace period; anything still
    /// running after `SHUTDOWN_TIMEOUT` is aborted.
    pub async fn unmount(mut self) {
        info!("Unmounting widget");
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .subscriptions
            .drain()
            .filter_map(|(_, mut sub)| sub.handle.take())
            .collect();

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async move {
            for handle in handles {
                let _ = handle.await;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        warn!("Widget task panicked: {}", e);
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Widget tasks did not stop in time, aborting");
            self.tasks.abort_all();
        }
        info!("Widget unmounted");
    }
}

impl Drop for Widget {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Engine loop: resolves the initial scope, then applies inbox events and
/// user commands one at a time until cancelled.
pub async fn run(
    mut switcher: Switcher,
    mut inbox: mpsc::Receiver<EngineEvent>,
    mut commands: mpsc::Receiver<UserCommand>,
    cancel: CancellationToken,
) {
    info!("Scope engine started");
    switcher.publish_snapshot();

    let resolved = tokio::select! {
        _ = cancel.cancelled() => false,
        _ = switcher.resolve_initial_scope() => true,
    };

    if resolved {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(event) = inbox.recv() => {
                    switcher.handle_event(event).await;
                    switcher.resync_ui();
                }
                Some(cmd) = commands.recv() => {
                    if cmd == UserCommand::Quit {
                        info!("Quit requested");
                        cancel.cancel();
                        break;
                    }
                    switcher.handle_command(cmd);
                    switcher.resync_ui();
                }
                else => break,
            }
        }
    }

    switcher.drain_persists(PERSIST_DRAIN_TIMEOUT).await;
    info!("Scope engine stopped");
}
