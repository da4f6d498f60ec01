// Status bar widget: connectivity, active scope, last sync.

use chrono::{DateTime, Local, Utc};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::ViewState;

/// Layout: [online dot] [scope] | [last sync]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (dot, dot_color) = online_indicator(state.online);
    let spans = vec![
        Span::styled(format!(" {} ", dot), Style::default().fg(dot_color)),
        Span::styled(
            format!("Scope: {}", state.scope_name().unwrap_or("--")),
            Style::default().fg(Color::White),
        ),
        Span::styled(" | ", Style::default().fg(Color::Gray)),
        Span::styled(sync_label(state.last_sync), Style::default().fg(Color::White)),
    ];

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

pub fn online_indicator(online: bool) -> (&'static str, Color) {
    if online {
        ("●", Color::Green)
    } else {
        ("●", Color::Red)
    }
}

pub fn sync_label(last_sync: Option<DateTime<Utc>>) -> String {
    match last_sync {
        Some(at) => format!("Synced {}", at.with_timezone(&Local).format("%H:%M:%S")),
        None => "Not synced yet".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_indicator_colors() {
        assert_eq!(online_indicator(true), ("●", Color::Green));
        assert_eq!(online_indicator(false), ("●", Color::Red));
    }

    #[test]
    fn sync_label_before_first_fetch() {
        assert_eq!(sync_label(None), "Not synced yet");
    }

    #[test]
    fn sync_label_shows_clock_time() {
        let label = sync_label(Some(Utc::now()));
        assert!(label.starts_with("Synced "));
        assert_eq!(label.len(), "Synced HH:MM:SS".len());
    }

    #[test]
    fn render_does_not_panic_with_defaults() {
        let backend = ratatui::backend::TestBackend::new(80, 1);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let state = ViewState::default();
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }
}
