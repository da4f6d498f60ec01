// TUI widget modules, one per screen zone.

pub mod feed_panel;
pub mod help_bar;
pub mod quit_confirm;
pub mod status_bar;
pub mod switcher_bar;
