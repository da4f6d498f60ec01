// Online monitor: owns the connectivity flag.
//
// The flag flips on host connectivity transitions. Nothing is triggered by
// the flip itself; the poller reads the flag at its own scheduled tick.

use tokio::sync::watch;

/// Writer side of the connectivity flag.
#[derive(Debug)]
pub struct OnlineMonitor {
    tx: watch::Sender<bool>,
}

/// Read-only view of the connectivity flag.
#[derive(Debug, Clone)]
pub struct OnlineFlag {
    rx: watch::Receiver<bool>,
}

impl OnlineMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        OnlineMonitor { tx }
    }

    pub fn flag(&self) -> OnlineFlag {
        OnlineFlag {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a transition. Returns `true` when the flag actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }
}

impl OnlineFlag {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }
}
