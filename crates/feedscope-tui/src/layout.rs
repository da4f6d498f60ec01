// Screen layout.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +--------------------------------------------------+
// | Search (3 rows)                                   |
// +--------------------------------------------------+
// | Feed (fill)                                       |
// +---------------------------------------------+----+
// | Switcher Bar (3 rows)                        |Menu|
// +---------------------------------------------+----+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Width of the menu toggle at the right end of the switcher row.
pub const MENU_TOGGLE_WIDTH: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppLayout {
    /// Online dot, active scope, last sync time.
    pub status_bar: Rect,
    /// Feed search field.
    pub search: Rect,
    pub feed: Rect,
    /// Roster entries, bordered.
    pub switcher: Rect,
    pub menu_toggle: Rect,
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect) -> AppLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Length(3), // search
            Constraint::Min(3),    // feed
            Constraint::Length(3), // switcher row
            Constraint::Length(1), // help bar
        ])
        .split(area);

    let switcher_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(MENU_TOGGLE_WIDTH)])
        .split(vertical[3]);

    AppLayout {
        status_bar: vertical[0],
        search: vertical[1],
        feed: vertical[2],
        switcher: switcher_row[0],
        menu_toggle: switcher_row[1],
        help_bar: vertical[4],
    }
}
