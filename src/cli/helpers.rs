//! Shared helper functions for CLI commands.

use std::fmt::Display;

use console::style;

/// Print a `label: value` row aligned like the other status output.
pub fn print_field(label: &str, value: impl Display) {
    println!("{:<20} {}", format!("{}:", label), value);
}

/// Display an optional value, with a dim dash when missing.
pub fn or_dash<T: Display>(value: Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => style("-").dim().to_string(),
    }
}

/// Shorten `text` to `max` characters, ending with an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
