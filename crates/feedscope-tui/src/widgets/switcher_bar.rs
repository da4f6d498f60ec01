// Switcher bar: one entry per roster team, a trailing "Create a Team"
// entry, and the menu toggle.
//
// Entries are laid out left to right inside the bordered bar. The same
// geometry is used for drawing and for mouse hit-testing, so a click lands
// on exactly the entry the user sees.

use feedscope_core::team::Team;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::ViewState;

pub const OFFLINE_TEXT: &str = "You're offline!";

pub const CREATE_TEAM_LABEL: &str = " + Create a Team ";

/// Gap between adjacent entries.
const ENTRY_GAP: u16 = 1;

/// Label for the roster entry at `index`. The first nine entries carry
/// their digit shortcut.
pub fn entry_label(index: usize, team: &Team) -> String {
    if index < 9 {
        format!(" {} {} ", index + 1, team.name)
    } else {
        format!(" {} ", team.name)
    }
}

/// Area inside the bar's border.
pub fn inner_area(area: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(area)
}

/// Screen rectangles of the entries that fit in `inner`, in roster order.
/// Entries that do not fit are not drawn and get no rectangle.
pub fn entry_rects(inner: Rect, roster: &[Team]) -> Vec<Rect> {
    let mut rects = Vec::with_capacity(roster.len());
    let mut x = inner.x;
    for (index, team) in roster.iter().enumerate() {
        let width = Span::raw(entry_label(index, team)).width() as u16;
        if inner.height == 0 || x.saturating_add(width) > inner.right() {
            break;
        }
        rects.push(Rect::new(x, inner.y, width, 1));
        x = x.saturating_add(width + ENTRY_GAP);
    }
    rects
}

/// Rectangle of the "Create a Team" entry, right after the last roster
/// entry. `None` before the first roster arrives, when roster entries were
/// already cut off, or when the entry itself does not fit.
pub fn create_team_rect(inner: Rect, roster: &[Team]) -> Option<Rect> {
    if roster.is_empty() || inner.height == 0 {
        return None;
    }
    let rects = entry_rects(inner, roster);
    if rects.len() < roster.len() {
        return None;
    }
    let x = rects
        .last()
        .map_or(inner.x, |last| last.right().saturating_add(ENTRY_GAP));
    let width = Span::raw(CREATE_TEAM_LABEL).width() as u16;
    if x.saturating_add(width) > inner.right() {
        return None;
    }
    Some(Rect::new(x, inner.y, width, 1))
}

pub fn render(frame: &mut Frame, area: Rect, toggle: Rect, state: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("Scopes");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !state.online {
        let offline = Paragraph::new(Span::styled(
            OFFLINE_TEXT,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(offline, inner);
    } else {
        for (index, rect) in entry_rects(inner, &state.roster).into_iter().enumerate() {
            let team = &state.roster[index];
            let style = if state.is_active(team) {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let label = Paragraph::new(Span::styled(entry_label(index, team), style));
            frame.render_widget(label, rect);
        }
        if let Some(rect) = create_team_rect(inner, &state.roster) {
            let create = Paragraph::new(Span::styled(
                CREATE_TEAM_LABEL,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ));
            frame.render_widget(create, rect);
        }
    }

    let toggle_widget = Paragraph::new(Line::from("≡"))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(toggle_widget, toggle);
}
