//! `check-duplicates` command.

use crate::changes::read_change_list;
use crate::profiles::{DuplicateDetector, report};
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing::info;

/// Compares the changed profiles listed in `change_list` with their siblings
/// and writes the report to `output`.
///
/// The report is advisory: duplicates do not fail the command.
///
/// # Errors
///
/// Returns an error if the change list cannot be read, a profile directory
/// cannot be listed, or the report cannot be written.
pub fn cmd_check_duplicates(
    repo_root: &Path,
    change_list: &Path,
    output: &Path,
    out: &mut dyn Write,
) -> Result<ExitCode> {
    let changed = read_change_list(change_list)?;
    info!(files = changed.len(), list = %change_list.display(), "read change list");

    let outcome = DuplicateDetector::new(repo_root).check(&changed)?;
    report::write_report(output, &outcome)?;

    for pair in &outcome.duplicates {
        writeln!(
            out,
            "Found duplicate profiles: {} and {}",
            pair.new.display(),
            pair.existing.display()
        )
        .map_err(|e| Error::operation("write_output", e))?;
    }
    writeln!(out, "Report written to {}", output.display())
        .map_err(|e| Error::operation("write_output", e))?;

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PROFILE: &str = "name: switch\ncomponents:\n  - id: main\n    capabilities:\n      - id: switch\n        version: 1\n";

    #[test]
    fn test_writes_report_and_lists_pairs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let profiles = dir.path().join("drivers/SmartThings/zigbee-switch/profiles");
        fs::create_dir_all(&profiles).expect("create");
        fs::write(profiles.join("switch.yml"), PROFILE).expect("write");
        fs::write(profiles.join("switch-copy.yml"), PROFILE).expect("write");

        let list = dir.path().join("files.csv");
        fs::write(
            &list,
            "drivers/SmartThings/zigbee-switch/profiles/switch-copy.yml,README.md\n",
        )
        .expect("write");
        let report_path = dir.path().join("profile-comment-body.md");

        let mut out = Vec::new();
        let code = cmd_check_duplicates(dir.path(), &list, &report_path, &mut out).expect("run");
        assert_eq!(code, ExitCode::SUCCESS);

        let console = String::from_utf8(out).expect("utf8");
        assert!(console.contains("Found duplicate profiles: drivers/SmartThings/zigbee-switch/profiles/switch-copy.yml and drivers/SmartThings/zigbee-switch/profiles/switch.yml"));
        let written = fs::read_to_string(&report_path).expect("report");
        assert!(written.starts_with(report::WARNING_HEADLINE));
    }

    #[test]
    fn test_missing_change_list_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = cmd_check_duplicates(
            dir.path(),
            &dir.path().join("absent.csv"),
            &dir.path().join("out.md"),
            &mut Vec::new(),
        );
        assert!(result.is_err());
    }
}
