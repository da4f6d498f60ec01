// Keyboard and mouse input handling.
//
// Translates crossterm events into `UserCommand`s for the engine, or into
// local `ViewState` changes (search field, quit confirmation). Digit keys
// are always forwarded with the current focus; the engine decides whether
// they select a scope.

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use feedscope_core::protocol::{FocusTarget, KeyPress, MenuRequest, UserCommand};
use ratatui::layout::{Position, Rect};

use crate::layout::build_layout;
use crate::widgets::switcher_bar::{create_team_rect, entry_rects, inner_area};
use crate::ViewState;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key should reach the engine, `None`
/// when it was handled locally.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Some platforms report Release as well as Press.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL)
        && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    if view_state.search_mode {
        return handle_search_mode(key_event, view_state);
    }

    match key_event.code {
        KeyCode::Char(c) if c.is_ascii_digit() => Some(digit_command(c, FocusTarget::Other)),
        KeyCode::Char('/') => {
            view_state.search_mode = true;
            None
        }
        KeyCode::Esc => {
            view_state.search_text.clear();
            None
        }
        KeyCode::Char('r') => Some(UserCommand::Refresh),
        KeyCode::Char('c') => Some(UserCommand::CreateTeam),
        KeyCode::Char('m') => Some(UserCommand::OpenMenu(menu_request(view_state.area))),
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            None
        }
        _ => None,
    }
}

fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

/// Search field has focus: characters are typed into it. Digits are still
/// reported to the engine, marked as text entry.
fn handle_search_mode(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Esc => {
            view_state.search_mode = false;
            view_state.search_text.clear();
            None
        }
        KeyCode::Enter => {
            view_state.search_mode = false;
            None
        }
        KeyCode::Backspace => {
            view_state.search_text.pop();
            None
        }
        KeyCode::Char(c) => {
            view_state.search_text.push(c);
            if c.is_ascii_digit() {
                Some(digit_command(c, FocusTarget::TextEntry))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Build a `Digit{n}` key press from the typed character.
///
/// Terminals report characters, not physical keys, so this is the digit the
/// layout produced. Where the number row needs Shift (AZERTY and similar),
/// the unshifted key yields a symbol and is not a shortcut; Shift plus the
/// key arrives as the digit and is. Modifiers are ignored for that reason.
fn digit_command(c: char, focus: FocusTarget) -> UserCommand {
    UserCommand::Key(KeyPress::new(format!("Digit{c}"), focus))
}

/// Menu request anchored at the toggle for a screen of size `area`.
pub fn menu_request(area: Rect) -> MenuRequest {
    let toggle = build_layout(area).menu_toggle;
    MenuRequest {
        x: toggle.x,
        y: toggle.y,
        height: toggle.height,
        width: toggle.width,
    }
}

/// Handle a mouse event against the last drawn frame.
///
/// A left click on the toggle opens the menu; on a roster entry it selects
/// that entry; on the trailing entry it asks to create a team. Entries are
/// not clickable while offline (they are hidden).
pub fn handle_mouse(mouse_event: MouseEvent, view_state: &ViewState) -> Option<UserCommand> {
    if mouse_event.kind != MouseEventKind::Down(MouseButton::Left) {
        return None;
    }
    let point = Position::new(mouse_event.column, mouse_event.row);
    let layout = build_layout(view_state.area);

    if layout.menu_toggle.contains(point) {
        return Some(UserCommand::OpenMenu(menu_request(view_state.area)));
    }
    if !view_state.online {
        return None;
    }
    let inner = inner_area(layout.switcher);
    if create_team_rect(inner, &view_state.roster).is_some_and(|rect| rect.contains(point)) {
        return Some(UserCommand::CreateTeam);
    }
    entry_rects(inner, &view_state.roster)
        .iter()
        .position(|rect| rect.contains(point))
        .map(UserCommand::Click)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
