// Feed panel: the search field and the scoped feed view.
//
// The feed content itself belongs to the host; this panel shows which scope
// it is loaded with and the current search query.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::ViewState;

pub fn render(frame: &mut Frame, search: Rect, feed: Rect, state: &ViewState) {
    render_search(frame, search, state);
    render_feed(frame, feed, state);
}

fn render_search(frame: &mut Frame, area: Rect, state: &ViewState) {
    let border_color = if state.search_mode {
        Color::Yellow
    } else {
        Color::Gray
    };
    let content = if state.search_mode {
        Line::from(vec![
            Span::raw(state.search_text.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ])
    } else if state.search_text.is_empty() {
        Line::from(Span::styled(
            "Press / to search",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(state.search_text.clone())
    };

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title("Search"),
    );
    frame.render_widget(paragraph, area);
}

/// Lines describing the feed for the active scope.
pub fn feed_lines(state: &ViewState) -> Vec<Line<'static>> {
    let Some(name) = state.scope_name() else {
        return vec![Line::from("Waiting for a scope...")];
    };

    let mut lines = vec![Line::from(vec![
        Span::raw("Showing events for "),
        Span::styled(
            name.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ])];
    if !state.search_text.is_empty() {
        lines.push(Line::from(format!("Filtered by \"{}\"", state.search_text)));
    }
    lines
}

fn render_feed(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(feed_lines(state))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Feed"));
    frame.render_widget(paragraph, area);
}
