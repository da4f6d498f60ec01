// Input dispatcher: maps digit keys and roster clicks to scope selections.

use crate::protocol::{FocusTarget, KeyPress};

/// Result of dispatching one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Select `Roster[index]` and persist the choice.
    Select {
        index: usize,
        /// The input's default action should be suppressed.
        prevent_default: bool,
    },
    Ignored,
}

/// Extract the digit 1-9 from a physical key code such as `"Digit5"`.
pub fn digit_from_code(code: &str) -> Option<usize> {
    let rest = code.strip_prefix("Digit")?;
    let mut chars = rest.chars();
    let digit = chars.next()?.to_digit(10)?;
    if chars.next().is_some() || digit == 0 {
        return None;
    }
    Some(digit as usize)
}

/// Dispatch a key press against a roster of `roster_len` entries.
pub fn dispatch_key(press: &KeyPress, roster_len: usize) -> Dispatch {
    if press.focus == FocusTarget::TextEntry {
        return Dispatch::Ignored;
    }
    let Some(digit) = digit_from_code(&press.code) else {
        return Dispatch::Ignored;
    };
    if roster_len < 2 || digit > roster_len {
        return Dispatch::Ignored;
    }
    Dispatch::Select {
        index: digit - 1,
        prevent_default: true,
    }
}

/// Dispatch a pointer click on the roster entry at `index`.
///
/// Clicks are not bound by the digit rules: any existing entry qualifies,
/// including the tenth and beyond.
pub fn dispatch_click(index: usize, roster_len: usize) -> Dispatch {
    if index >= roster_len {
        return Dispatch::Ignored;
    }
    Dispatch::Select {
        index,
        prevent_default: false,
    }
}
