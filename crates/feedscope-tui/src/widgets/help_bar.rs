// Help bar: key hints for the current input mode.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::ViewState;

pub fn hint_text(state: &ViewState) -> &'static str {
    if state.confirm_quit {
        " y:Quit | n:Cancel"
    } else if state.search_mode {
        " Enter:Done | Esc:Clear"
    } else {
        " q:Quit | 1-9:Switch scope | /:Search | r:Refresh | c:Create team | m:Menu"
    }
}

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        hint_text(state),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::DIM),
    )]))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
