//! Duplicate profile report rendering.
//!
//! The report is a write-once text artifact that a separate CI step posts as
//! a pull request comment.

use super::detector::DetectionOutcome;
use crate::{Error, Result};
use std::fmt::Write as _;
use std::path::Path;

/// Headline when duplicates were found.
pub const WARNING_HEADLINE: &str =
    "Duplicate profile check: Warning - duplicate profiles detected.";

/// Headline when no duplicates were found.
pub const PASSED_HEADLINE: &str =
    "Duplicate profile check: Passed - no duplicate profiles detected.";

/// Renders the report text.
#[must_use]
pub fn render(outcome: &DetectionOutcome) -> String {
    let mut text = String::new();

    if outcome.has_duplicates() {
        text.push_str(WARNING_HEADLINE);
        text.push('\n');
        for pair in &outcome.duplicates {
            let _ = writeln!(
                text,
                "{} == {}",
                pair.new.display(),
                pair.existing.display()
            );
        }
    } else {
        text.push_str(PASSED_HEADLINE);
        text.push('\n');
    }

    if !outcome.malformed.is_empty() {
        text.push_str("\nSkipped malformed profiles:\n");
        for skipped in &outcome.malformed {
            let _ = writeln!(text, "{}: {}", skipped.path.display(), skipped.reason);
        }
    }

    text
}

/// Writes the report to `path`, replacing any previous report.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_report(path: &Path, outcome: &DetectionOutcome) -> Result<()> {
    std::fs::write(path, render(outcome))
        .map_err(|e| Error::operation("write_report", format!("{}: {e}", path.display())))
}
