// Terminal front-end for the feed scope switcher.
//
// The TUI owns a `ViewState` that mirrors what the engine has published.
// The engine pushes `UiUpdate` messages over an mpsc channel; the TUI
// applies them to `ViewState` and re-renders at ~30 fps. User input is
// translated into `UserCommand`s and sent back to the engine.

pub mod input;
pub mod layout;
pub mod widgets;

use std::io::stdout;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream};
use crossterm::execute;
use feedscope_core::protocol::{UiUpdate, UserCommand};
use feedscope_core::team::Team;
use futures_util::StreamExt;
use ratatui::layout::Rect;
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::debug;

use layout::build_layout;

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local mirror of the engine state plus purely visual state.
#[derive(Debug, Clone)]
pub struct ViewState {
    /// Roster as last published, self entry first.
    pub roster: Vec<Team>,
    /// Active scope id.
    pub scope: Option<String>,
    pub online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    /// The search field has focus.
    pub search_mode: bool,
    pub search_text: String,
    pub confirm_quit: bool,
    /// Terminal area of the last drawn frame, used for mouse hit-testing.
    pub area: Rect,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            roster: Vec::new(),
            scope: None,
            online: true,
            last_sync: None,
            search_mode: false,
            search_text: String::new(),
            confirm_quit: false,
            area: Rect::default(),
        }
    }
}

impl ViewState {
    /// Display name of the active scope.
    pub fn scope_name(&self) -> Option<&str> {
        let scope = self.scope.as_deref()?;
        Some(
            self.roster
                .iter()
                .find(|t| t.id == scope)
                .map(|t| t.name.as_str())
                .unwrap_or(scope),
        )
    }

    pub fn is_active(&self, team: &Team) -> bool {
        self.scope.as_deref() == Some(team.id.as_str())
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Roster(roster) => state.roster = roster,
        UiUpdate::Scope(scope) => state.scope = Some(scope),
        UiUpdate::Online(online) => state.online = online,
        UiUpdate::Synced(at) => state.last_sync = Some(at),
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    widgets::feed_panel::render(frame, layout.search, layout.feed, state);
    widgets::switcher_bar::render(frame, layout.switcher, layout.menu_toggle, state);
    widgets::help_bar::render(frame, layout.help_bar, state);

    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area());
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI until the user quits or the engine closes the update channel.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();
    execute!(stdout(), EnableMouseCapture)?;

    // Restore the terminal even if we panic mid-frame.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = execute!(stdout(), DisableMouseCapture);
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    None => {
                        debug!("UI channel closed, leaving TUI");
                        break;
                    }
                }
            }

            maybe_event = event_stream.next() => {
                let command = match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        input::handle_key(key_event, &mut view_state)
                    }
                    Some(Ok(Event::Mouse(mouse_event))) => {
                        input::handle_mouse(mouse_event, &view_state)
                    }
                    Some(Ok(_)) => None,
                    Some(Err(_)) | None => break,
                };
                if let Some(command) = command {
                    let quit = command == UserCommand::Quit;
                    if cmd_tx.send(command).await.is_err() || quit {
                        break;
                    }
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| {
                    view_state.area = frame.area();
                    render_frame(frame, &view_state);
                })?;
            }
        }
    }

    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
