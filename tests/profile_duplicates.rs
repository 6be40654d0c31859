//! Integration tests for duplicate profile detection over a repository tree.
//!
//! Each test builds a throwaway repository with `tempfile` and runs the
//! detector the way the `check-duplicates` command does.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use driverci::profiles::report::{self, PASSED_HEADLINE, WARNING_HEADLINE};
use driverci::{DuplicateDetector, DuplicatePair};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PROFILES: &str = "drivers/SmartThings/zigbee-switch/profiles";

const SWITCH_REFRESH: &str = r"name: switch-refresh
components:
  - id: main
    capabilities:
      - id: switch
        version: 1
        config:
          values:
            - key: switch.value
              enabledValues:
                - on
                - off
      - id: refresh
        version: 1
    categories:
      - name: Switch
";

const SWITCH_REFRESH_PERMUTED: &str = r"name: switch-refresh-copy
components:
  - id: main
    capabilities:
      - id: switch
        version: 1
        config:
          values:
            - key: switch.value
              enabledValues:
                - off
                - on
      - id: refresh
        version: 1
    categories:
      - name: Switch
";

const BUTTON_FIRST: &str = r"name: button-switch
components:
  - id: main
    capabilities:
      - id: button
        version: 1
      - id: switch
        version: 1
    categories:
      - name: Switch
";

const SWITCH_FIRST: &str = r"name: switch-button
components:
  - id: main
    capabilities:
      - id: switch
        version: 1
      - id: button
        version: 1
    categories:
      - name: Switch
";

fn repo(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let profiles = dir.path().join(PROFILES);
    fs::create_dir_all(&profiles).expect("create profiles dir");
    for (name, contents) in files {
        fs::write(profiles.join(name), contents).expect("write profile");
    }
    dir
}

fn changed(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| format!("{PROFILES}/{name}"))
        .collect()
}

fn profile(name: &str) -> PathBuf {
    Path::new(PROFILES).join(name)
}

#[test]
fn test_permuted_enabled_values_are_duplicates() {
    let dir = repo(&[
        ("switch-refresh.yml", SWITCH_REFRESH),
        ("switch-refresh-copy.yml", SWITCH_REFRESH_PERMUTED),
    ]);

    let outcome = DuplicateDetector::new(dir.path())
        .check(&changed(&["switch-refresh-copy.yml"]))
        .expect("check");

    assert_eq!(
        outcome.duplicates,
        vec![DuplicatePair {
            new: profile("switch-refresh-copy.yml"),
            existing: profile("switch-refresh.yml"),
        }]
    );
    assert!(report::render(&outcome).starts_with(WARNING_HEADLINE));
}

#[test]
fn test_different_top_capability_is_not_duplicate() {
    let dir = repo(&[
        ("switch-button.yml", SWITCH_FIRST),
        ("button-switch.yml", BUTTON_FIRST),
    ]);

    let outcome = DuplicateDetector::new(dir.path())
        .check(&changed(&["button-switch.yml"]))
        .expect("check");

    assert!(!outcome.has_duplicates());
    assert_eq!(outcome.comparisons, 1);
    assert_eq!(report::render(&outcome), format!("{PASSED_HEADLINE}\n"));
}

#[test]
fn test_byte_for_byte_copy_is_duplicate() {
    let dir = repo(&[
        ("switch-refresh.yml", SWITCH_REFRESH),
        ("switch-refresh-2.yml", SWITCH_REFRESH),
    ]);

    let outcome = DuplicateDetector::new(dir.path())
        .check(&changed(&["switch-refresh-2.yml"]))
        .expect("check");

    assert_eq!(outcome.duplicates.len(), 1);
}

#[test]
fn test_pair_recorded_once_when_both_changed() {
    let dir = repo(&[
        ("a.yml", SWITCH_REFRESH),
        ("b.yml", SWITCH_REFRESH_PERMUTED),
    ]);

    let outcome = DuplicateDetector::new(dir.path())
        .check(&changed(&["a.yml", "b.yml"]))
        .expect("check");

    assert_eq!(
        outcome.duplicates,
        vec![DuplicatePair {
            new: profile("a.yml"),
            existing: profile("b.yml"),
        }]
    );
}

#[test]
fn test_non_profile_files_are_ignored() {
    let dir = repo(&[
        ("switch-refresh.yml", SWITCH_REFRESH),
        ("switch-refresh.yaml", SWITCH_REFRESH),
        ("notes.txt", SWITCH_REFRESH),
    ]);
    let fingerprints = dir.path().join("drivers/SmartThings/zigbee-switch/fingerprints.yml");
    fs::write(&fingerprints, SWITCH_REFRESH).expect("write");

    let outcome = DuplicateDetector::new(dir.path())
        .check(&[
            format!("{PROFILES}/switch-refresh.yml"),
            "drivers/SmartThings/zigbee-switch/fingerprints.yml".to_string(),
            format!("{PROFILES}/notes.txt"),
        ])
        .expect("check");

    assert!(!outcome.has_duplicates());
    assert_eq!(outcome.comparisons, 0);
}

#[test]
fn test_deleted_profile_is_skipped() {
    let dir = repo(&[("switch-refresh.yml", SWITCH_REFRESH)]);

    let outcome = DuplicateDetector::new(dir.path())
        .check(&changed(&["removed.yml"]))
        .expect("check");

    assert!(!outcome.has_duplicates());
    assert!(outcome.malformed.is_empty());
}

#[test]
fn test_malformed_sibling_is_reported_once() {
    let dir = repo(&[
        ("a.yml", SWITCH_REFRESH),
        ("b.yml", SWITCH_FIRST),
        ("broken.yml", "components:\n  - id: main\n"),
    ]);

    let outcome = DuplicateDetector::new(dir.path())
        .check(&changed(&["a.yml", "b.yml"]))
        .expect("check");

    assert!(!outcome.has_duplicates());
    assert_eq!(outcome.malformed.len(), 1);
    assert_eq!(outcome.malformed[0].path, profile("broken.yml"));

    let text = report::render(&outcome);
    assert!(text.contains("Skipped malformed profiles:\n"));
    assert!(text.contains("broken.yml: "));
}

#[test]
fn test_report_written_to_disk() {
    let dir = repo(&[
        ("a.yml", SWITCH_REFRESH),
        ("b.yml", SWITCH_REFRESH),
    ]);
    let outcome = DuplicateDetector::new(dir.path())
        .check(&changed(&["b.yml"]))
        .expect("check");

    let report_path = dir.path().join("profile-comment-body.md");
    report::write_report(&report_path, &outcome).expect("write report");

    let written = fs::read_to_string(&report_path).expect("read report");
    assert_eq!(
        written,
        format!(
            "{WARNING_HEADLINE}\n{} == {}\n",
            profile("b.yml").display(),
            profile("a.yml").display()
        )
    );
}
