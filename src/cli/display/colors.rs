//! Status color mapping for CLI output.
//!
//! `console` drops styling automatically when stdout is not a terminal or
//! `NO_COLOR` is set.

use console::{style, StyledObject};

/// Returns a styled string for a task or run status.
///
/// Color scheme:
/// - Green:  completed
/// - Yellow: in progress, retrying
/// - Blue:   not started
/// - Cyan:   waiting
/// - Red:    failed
/// - Dim:    cancelled, empty
pub fn colorize_status(status: &str) -> StyledObject<&str> {
    match status.to_lowercase().as_str() {
        "completed" => style(status).green().bold(),
        "in_progress" | "retrying" => style(status).yellow(),
        "not_started" => style(status).blue(),
        "waiting" => style(status).cyan(),
        "failed" => style(status).red().bold(),
        "cancelled" | "empty" => style(status).dim(),
        _ => style(status),
    }
}

/// Styled label for detail views (bold + dimmed colon).
pub fn label(name: &str) -> String {
    format!("{}{}", style(name).bold(), style(":").dim())
}

/// Section header with underline.
pub fn section_header(title: &str) -> String {
    format!("\n{}", style(title).bold().underlined())
}
