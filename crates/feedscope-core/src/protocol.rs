// Messages exchanged between the host, the engine, and the view.
//
// HostEvent / WidgetMessage are also the JSON wire format of the host
// bridge (see `bridge`). UserCommand flows view -> engine, UiUpdate flows
// engine -> view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::team::{CurrentUser, Team};

// ---------------------------------------------------------------------------
// Host -> widget
// ---------------------------------------------------------------------------

/// Environment events delivered by the host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostEvent {
    /// The persisted preference may have changed out-of-band.
    ConfigChanged,
    /// Connectivity transition.
    Connectivity { online: bool },
    /// The host window was shown or hidden.
    Window { visible: bool },
    /// The signed-in user changed (or signed out when `user` is null).
    Session {
        #[serde(default)]
        user: Option<CurrentUser>,
    },
}

// ---------------------------------------------------------------------------
// Widget -> host
// ---------------------------------------------------------------------------

/// Where to anchor the auxiliary menu, in host coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuRequest {
    pub x: u16,
    pub y: u16,
    pub height: u16,
    pub width: u16,
}

/// Outbound messages to the host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetMessage {
    /// Load a different scope into the feed.
    FeedScope { scope: String },
    /// Open the auxiliary menu anchored at the given bounds.
    OpenMenu(MenuRequest),
    /// Open a URL in the host's browser.
    OpenExternal { url: String },
}

// ---------------------------------------------------------------------------
// Engine inbox
// ---------------------------------------------------------------------------

/// Everything the engine loop reacts to besides user commands.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Host(HostEvent),
    /// A successful fetch, self entry already prepended.
    RosterFetched {
        roster: Vec<Team>,
        fetched_at: DateTime<Utc>,
    },
}

impl From<HostEvent> for EngineEvent {
    fn from(event: HostEvent) -> Self {
        EngineEvent::Host(event)
    }
}

// ---------------------------------------------------------------------------
// View -> engine
// ---------------------------------------------------------------------------

/// What currently holds keyboard focus in the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    /// A text-entry field; digit keys are typed, not dispatched.
    TextEntry,
    Other,
}

/// A key press described by its physical key code (e.g. `"Digit5"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub code: String,
    pub focus: FocusTarget,
}

impl KeyPress {
    pub fn new(code: impl Into<String>, focus: FocusTarget) -> Self {
        KeyPress {
            code: code.into(),
            focus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Key(KeyPress),
    /// Pointer click on the roster entry at this index.
    Click(usize),
    OpenMenu(MenuRequest),
    /// The trailing "Create a Team" entry was chosen.
    CreateTeam,
    /// Fetch the roster now instead of waiting for the next tick.
    Refresh,
    Quit,
}

// ---------------------------------------------------------------------------
// Engine -> view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Roster(Vec<Team>),
    Scope(String),
    Online(bool),
    Synced(DateTime<Utc>),
}
