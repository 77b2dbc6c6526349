//! Terminal styling helpers
//!
//! Colors are applied only when the stream supports them.

use indicatif::ProgressStyle;
use owo_colors::{OwoColorize, Stream, Style};
use reviewit::types::MergeRequestStatus;
use std::fmt::Display;

/// Check mark printed after a finished step
pub const CHECK: &str = "✓";

/// Semantic colors for CLI output
pub trait Stylize: Display + Sized {
    /// Secondary text
    fn muted(&self) -> String {
        paint(self, Style::new().dimmed())
    }

    /// Identifiers: ids, branches, names
    fn accent(&self) -> String {
        paint(self, Style::new().cyan())
    }

    /// Headings
    fn emphasis(&self) -> String {
        paint(self, Style::new().bold())
    }

    /// Positive outcome
    fn success(&self) -> String {
        paint(self, Style::new().green())
    }

    /// Warning or failed outcome
    fn warn(&self) -> String {
        paint(self, Style::new().yellow())
    }
}

impl<T: Display> Stylize for T {}

fn paint(value: &impl Display, style: Style) -> String {
    value
        .if_supports_color(Stream::Stdout, |text| text.style(style))
        .to_string()
}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Status colored by how it should read
pub fn status(status: MergeRequestStatus) -> String {
    match status {
        MergeRequestStatus::Open => status.accent(),
        MergeRequestStatus::Integrating => status.emphasis(),
        MergeRequestStatus::NeedsRebase => status.warn(),
        MergeRequestStatus::Accepted => status.success(),
        MergeRequestStatus::Abandoned => status.muted(),
    }
}

/// Spinner used while waiting on a job
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", ""])
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
