// Team roster poller.
//
// Fetches the team list on a fixed schedule and hands each successful
// result to the engine inbox. The fetch is awaited inline, so there is never
// more than one request in flight; refresh requests that arrive while a
// fetch is outstanding are dropped rather than queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collab::TeamDirectory;
use crate::error::FetchError;
use crate::online::OnlineFlag;
use crate::protocol::EngineEvent;
use crate::team::{build_roster, CurrentUser, Team};

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

/// Delay between successful fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(4000);

/// Delay before retrying after a failed fetch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Delay between connectivity re-checks while offline.
pub const DEFAULT_OFFLINE_CHECK: Duration = Duration::from_millis(1000);

/// Fixed delays used by the poller. They never grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimings {
    pub interval: Duration,
    pub retry: Duration,
    pub offline_check: Duration,
}

impl Default for PollTimings {
    fn default() -> Self {
        PollTimings {
            interval: DEFAULT_POLL_INTERVAL,
            retry: DEFAULT_RETRY_DELAY,
            offline_check: DEFAULT_OFFLINE_CHECK,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Fetching,
    ScheduledWait(Duration),
}

/// Result of a single poll pass.
#[derive(Debug)]
pub enum PollOutcome {
    /// Fetched roster with the self entry at index 0.
    Success(Vec<Team>),
    Failure(FetchError),
    /// Skipped because the connectivity flag reads offline.
    Offline,
}

pub struct RosterPoller {
    directory: Arc<dyn TeamDirectory>,
    online: OnlineFlag,
    session: watch::Receiver<Option<CurrentUser>>,
    timings: PollTimings,
    phase: PollerPhase,
}

impl RosterPoller {
    pub fn new(
        directory: Arc<dyn TeamDirectory>,
        online: OnlineFlag,
        session: watch::Receiver<Option<CurrentUser>>,
        timings: PollTimings,
    ) -> Self {
        RosterPoller {
            directory,
            online,
            session,
            timings,
            phase: PollerPhase::Idle,
        }
    }

    pub fn phase(&self) -> PollerPhase {
        self.phase
    }

    /// Delay until the next pass, as decided by the last outcome.
    pub fn next_delay(&self) -> Duration {
        match self.phase {
            PollerPhase::ScheduledWait(delay) => delay,
            PollerPhase::Idle | PollerPhase::Fetching => Duration::ZERO,
        }
    }

    /// Run one pass of the state machine and leave it in `ScheduledWait`.
    pub async fn poll_once(&mut self) -> PollOutcome {
        if !self.online.is_online() {
            self.phase = PollerPhase::ScheduledWait(self.timings.offline_check);
            return PollOutcome::Offline;
        }

        // Clone out of the watch guard; it must not be held across the fetch.
        let user = self.session.borrow().clone();
        let Some(user) = user else {
            self.phase = PollerPhase::ScheduledWait(self.timings.retry);
            return PollOutcome::Failure(FetchError::NoSession);
        };

        self.phase = PollerPhase::Fetching;
        match self.directory.fetch().await {
            Ok(list) => {
                self.phase = PollerPhase::ScheduledWait(self.timings.interval);
                PollOutcome::Success(build_roster(&user, list.teams))
            }
            Err(e) => {
                self.phase = PollerPhase::ScheduledWait(self.timings.retry);
                PollOutcome::Failure(e)
            }
        }
    }

    /// Poll until `cancel` fires or the engine inbox closes.
    ///
    /// A message on `refresh` cuts the current wait short.
    pub async fn run(
        mut self,
        events: mpsc::Sender<EngineEvent>,
        mut refresh: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) {
        info!("Roster poller started");

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                PollOutcome::Success(roster) => {
                    debug!("Fetched roster with {} entries", roster.len());
                    let event = EngineEvent::RosterFetched {
                        roster,
                        fetched_at: Utc::now(),
                    };
                    if events.send(event).await.is_err() {
                        info!("Engine inbox closed, stopping roster poller");
                        break;
                    }
                }
                PollOutcome::Failure(FetchError::NoSession) => {
                    debug!("No signed-in user yet, skipping team fetch");
                }
                PollOutcome::Failure(e) => {
                    warn!("Team fetch failed, retrying in {:?}: {}", self.next_delay(), e);
                }
                PollOutcome::Offline => {
                    debug!("Offline, checking again in {:?}", self.next_delay());
                }
            }

            // Requests made during the fetch are stale now.
            while refresh.try_recv().is_ok() {}

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.next_delay()) => {}
                Some(()) = refresh.recv() => {
                    debug!("Manual refresh requested");
                }
            }
        }

        self.phase = PollerPhase::Idle;
        info!("Roster poller stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::online::OnlineMonitor;
    use crate::team::TeamList;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tokio::task::JoinHandle;

    #[derive(Default)]
    struct FakeDirectory {
        calls: AtomicUsize,
        /// Scripted responses; an empty queue answers with one team.
        responses: Mutex<VecDeque<Result<TeamList, FetchError>>>,
        /// When set, every fetch blocks until notified.
        gate: Option<Arc<Notify>>,
    }

    impl FakeDirectory {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TeamDirectory for FakeDirectory {
        async fn fetch(&self) -> Result<TeamList, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let scripted = self.responses.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(TeamList {
                    teams: vec![Team::new("t_1", "Alpha")],
                })
            })
        }
    }

    struct Harness {
        monitor: OnlineMonitor,
        session_tx: watch::Sender<Option<CurrentUser>>,
        events_rx: mpsc::Receiver<EngineEvent>,
        refresh_tx: mpsc::Sender<()>,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn spawn_poller(
        directory: Arc<FakeDirectory>,
        online: bool,
        user: Option<CurrentUser>,
    ) -> Harness {
        let monitor = OnlineMonitor::new(online);
        let (session_tx, session_rx) = watch::channel(user);
        let (events_tx, events_rx) = mpsc::channel(64);
        let (refresh_tx, refresh_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let poller = RosterPoller::new(
            directory,
            monitor.flag(),
            session_rx,
            PollTimings::default(),
        );
        let handle = tokio::spawn(poller.run(events_tx, refresh_rx, cancel.clone()));
        Harness {
            monitor,
            session_tx,
            events_rx,
            refresh_tx,
            cancel,
            handle,
        }
    }

    fn ada() -> Option<CurrentUser> {
        Some(CurrentUser::new("u_1", "ada"))
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test]
    async fn fetches_immediately_when_online() {
        tokio::time::pause();
        let dir = Arc::new(FakeDirectory::default());
        let mut h = spawn_poller(dir.clone(), true, ada());

        sleep_ms(1).await;
        assert_eq!(dir.calls(), 1);

        match h.events_rx.try_recv() {
            Ok(EngineEvent::RosterFetched { roster, .. }) => {
                assert_eq!(roster.len(), 2);
                assert_eq!(roster[0].id, "u_1");
                assert_eq!(roster[0].name, "ada");
                assert_eq!(roster[1].id, "t_1");
            }
            other => panic!("expected RosterFetched, got {:?}", other),
        }

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn success_schedules_next_fetch_after_interval() {
        tokio::time::pause();
        let dir = Arc::new(FakeDirectory::default());
        let h = spawn_poller(dir.clone(), true, ada());

        sleep_ms(1).await;
        assert_eq!(dir.calls(), 1);

        sleep_ms(3997).await; // t = 3998
        assert_eq!(dir.calls(), 1, "no fetch before the 4000 ms interval");

        sleep_ms(4).await; // t = 4002
        assert_eq!(dir.calls(), 2);

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn failure_retries_after_one_second() {
        tokio::time::pause();
        let dir = Arc::new(FakeDirectory::default());
        dir.responses
            .lock()
            .unwrap()
            .push_back(Err(FetchError::Status { status: 503 }));
        let mut h = spawn_poller(dir.clone(), true, ada());

        sleep_ms(1).await;
        assert_eq!(dir.calls(), 1);
        assert!(h.events_rx.try_recv().is_err(), "failure is not forwarded");

        sleep_ms(997).await; // t = 998
        assert_eq!(dir.calls(), 1);

        sleep_ms(4).await; // t = 1002
        assert_eq!(dir.calls(), 2);
        assert!(h.events_rx.try_recv().is_ok());

        // Back on the normal interval after recovering.
        sleep_ms(3996).await; // t = 4998
        assert_eq!(dir.calls(), 2);
        sleep_ms(4).await; // t = 5002
        assert_eq!(dir.calls(), 3);

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn offline_never_fetches_and_resumes_on_next_tick() {
        tokio::time::pause();
        let dir = Arc::new(FakeDirectory::default());
        let h = spawn_poller(dir.clone(), false, ada());

        sleep_ms(4500).await;
        assert_eq!(dir.calls(), 0, "offline poller must not hit the network");

        // Going online does not fetch by itself...
        h.monitor.set_online(true);
        sleep_ms(400).await; // t = 4900
        assert_eq!(dir.calls(), 0);

        // ...the next offline check does, exactly once.
        sleep_ms(200).await; // t = 5100
        assert_eq!(dir.calls(), 1);
        sleep_ms(3000).await; // t = 8100
        assert_eq!(dir.calls(), 1);

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn missing_session_is_a_silent_failure() {
        tokio::time::pause();
        let dir = Arc::new(FakeDirectory::default());
        let h = spawn_poller(dir.clone(), true, None);

        sleep_ms(2500).await;
        assert_eq!(dir.calls(), 0);

        h.session_tx.send(ada()).unwrap();
        sleep_ms(600).await; // t = 3100, retry tick at 3000
        assert_eq!(dir.calls(), 1);

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn refresh_during_fetch_is_suppressed() {
        tokio::time::pause();
        let gate = Arc::new(Notify::new());
        let dir = Arc::new(FakeDirectory {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let h = spawn_poller(dir.clone(), true, ada());

        sleep_ms(1).await;
        assert_eq!(dir.calls(), 1);

        for _ in 0..3 {
            h.refresh_tx.send(()).await.unwrap();
        }
        sleep_ms(10).await;
        assert_eq!(dir.calls(), 1, "refresh must not start a parallel fetch");

        gate.notify_one();
        sleep_ms(1).await;
        assert_eq!(dir.calls(), 1, "queued refreshes are dropped, not replayed");

        sleep_ms(3000).await;
        assert_eq!(dir.calls(), 1);

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn refresh_while_waiting_fetches_now() {
        tokio::time::pause();
        let dir = Arc::new(FakeDirectory::default());
        let h = spawn_poller(dir.clone(), true, ada());

        sleep_ms(100).await;
        assert_eq!(dir.calls(), 1);

        h.refresh_tx.send(()).await.unwrap();
        sleep_ms(1).await;
        assert_eq!(dir.calls(), 2);

        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_stops_all_future_ticks() {
        tokio::time::pause();
        let dir = Arc::new(FakeDirectory::default());
        let h = spawn_poller(dir.clone(), true, ada());

        sleep_ms(1).await;
        assert_eq!(dir.calls(), 1);

        h.cancel.cancel();
        h.handle.await.unwrap();

        sleep_ms(20_000).await;
        assert_eq!(dir.calls(), 1);
    }

    #[tokio::test]
    async fn poll_once_reports_phase_transitions() {
        let dir = Arc::new(FakeDirectory::default());
        let monitor = OnlineMonitor::new(false);
        let (_session_tx, session_rx) = watch::channel(ada());
        let timings = PollTimings::default();
        let mut poller = RosterPoller::new(dir.clone(), monitor.flag(), session_rx, timings);
        assert_eq!(poller.phase(), PollerPhase::Idle);

        assert!(matches!(poller.poll_once().await, PollOutcome::Offline));
        assert_eq!(
            poller.phase(),
            PollerPhase::ScheduledWait(DEFAULT_OFFLINE_CHECK)
        );

        monitor.set_online(true);
        assert!(matches!(poller.poll_once().await, PollOutcome::Success(_)));
        assert_eq!(poller.next_delay(), DEFAULT_POLL_INTERVAL);

        dir.responses
            .lock()
            .unwrap()
            .push_back(Err(FetchError::Unavailable("down".into())));
        assert!(matches!(poller.poll_once().await, PollOutcome::Failure(_)));
        assert_eq!(poller.next_delay(), DEFAULT_RETRY_DELAY);
    }
}
