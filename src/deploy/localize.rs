//! Localization of fingerprint device labels.
//!
//! A locale table is a headerless CSV of `english,localized` rows. Every
//! `deviceLabel` in a `fingerprints.yml` whose value is exactly an English
//! entry (quoted or not) is replaced with the localized text.

use crate::{Error, Result};
use regex::{NoExpand, Regex};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory of locale tables, relative to the repository root.
pub const LOCALIZATIONS_DIR: &str = "tools/localizations";

const FINGERPRINTS_FILE: &str = "fingerprints.yml";

/// One `english -> localized` label mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTranslation {
    /// English label.
    pub english: String,
    /// Localized label.
    pub localized: String,
}

/// Locale table path for `locale` (lowercased).
#[must_use]
pub fn locale_table_path(repo_root: &Path, locale: &str) -> PathBuf {
    repo_root
        .join(LOCALIZATIONS_DIR)
        .join(format!("{}.csv", locale.to_lowercase()))
}

/// Reads a locale table. Rows with fewer than two fields are ignored.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid CSV.
pub fn read_locale_table(path: &Path) -> Result<Vec<LabelTranslation>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::operation("read_locale_table", format!("{}: {e}", path.display())))?;

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| Error::operation("read_locale_table", format!("{}: {e}", path.display())))?;
        if let (Some(english), Some(localized)) = (record.get(0), record.get(1)) {
            table.push(LabelTranslation {
                english: english.to_string(),
                localized: localized.to_string(),
            });
        }
    }
    Ok(table)
}

/// Compiled label rewrites.
#[derive(Debug)]
pub struct Localizer {
    rules: Vec<(Regex, String)>,
}

impl Localizer {
    /// Compiles the rewrite for each table row.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern cannot be compiled.
    pub fn new(table: &[LabelTranslation]) -> Result<Self> {
        let rules = table
            .iter()
            .map(|row| {
                let pattern = format!(
                    r#"(?m)deviceLabel ?: "?{}"?[ \t]*$"#,
                    regex::escape(&row.english)
                );
                Regex::new(&pattern)
                    .map(|regex| (regex, format!("deviceLabel: {}", row.localized)))
                    .map_err(|e| Error::operation("compile_locale_rule", e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Applies every rule in table order.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |current, (regex, replacement)| {
                regex
                    .replace_all(&current, NoExpand(replacement))
                    .into_owned()
            })
    }

    /// Rewrites every `fingerprints.yml` below `root` and returns the files
    /// that changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a fingerprint file cannot be read or written.
    pub fn localize_tree(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut changed = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");
        for entry in walker.filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() || entry.file_name() != FINGERPRINTS_FILE {
                continue;
            }
            let path = entry.path();
            let original = std::fs::read_to_string(path)
                .map_err(|e| Error::operation("read_fingerprints", format!("{}: {e}", path.display())))?;
            let localized = self.apply(&original);
            if localized != original {
                std::fs::write(path, localized).map_err(|e| {
                    Error::operation("write_fingerprints", format!("{}: {e}", path.display()))
                })?;
                debug!(file = %path.display(), "localized fingerprints");
                changed.push(path.to_path_buf());
            }
        }
        info!(files = changed.len(), "localized fingerprint files");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn localizer() -> Localizer {
        Localizer::new(&[
            LabelTranslation {
                english: "Light".to_string(),
                localized: "Licht".to_string(),
            },
            LabelTranslation {
                english: "Dimmer (2 ch)/Switch".to_string(),
                localized: "Dimmer $1 (2 K)".to_string(),
            },
        ])
        .expect("rules compile")
    }

    #[test]
    fn test_apply_quoted_and_unquoted() {
        let text = "- id: a\n  deviceLabel: \"Light\"\n- id: b\n  deviceLabel : Light\n";
        assert_eq!(
            localizer().apply(text),
            "- id: a\n  deviceLabel: Licht\n- id: b\n  deviceLabel: Licht\n"
        );
    }

    #[test]
    fn test_apply_escapes_metacharacters_and_replacement() {
        let text = "  deviceLabel: Dimmer (2 ch)/Switch\n";
        assert_eq!(localizer().apply(text), "  deviceLabel: Dimmer $1 (2 K)\n");
    }

    #[test]
    fn test_apply_requires_whole_label() {
        let text = "  deviceLabel: Light Bulb\n";
        assert_eq!(localizer().apply(text), text);
    }

    #[test]
    fn test_read_locale_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("de.csv");
        fs::write(&path, "Light,Licht\nlonely\n\"Lock, Smart\",Schloss\n").expect("write");
        let table = read_locale_table(&path).expect("table");
        assert_eq!(table.len(), 2);
        assert_eq!(table[1].english, "Lock, Smart");
        assert_eq!(table[1].localized, "Schloss");
    }

    #[test]
    fn test_locale_table_path_lowercases() {
        assert_eq!(
            locale_table_path(Path::new("/repo"), "DE"),
            PathBuf::from("/repo/tools/localizations/de.csv")
        );
    }

    #[test]
    fn test_localize_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let switch = dir.path().join("drivers/SmartThings/zigbee-switch");
        let lock = dir.path().join("drivers/SmartThings/zwave-lock");
        fs::create_dir_all(&switch).expect("create");
        fs::create_dir_all(&lock).expect("create");
        fs::write(switch.join(FINGERPRINTS_FILE), "deviceLabel: Light\n").expect("write");
        fs::write(lock.join(FINGERPRINTS_FILE), "deviceLabel: Lock\n").expect("write");
        fs::write(switch.join("config.yml"), "deviceLabel: Light\n").expect("write");

        let changed = localizer().localize_tree(dir.path()).expect("localize");
        assert_eq!(changed, vec![switch.join(FINGERPRINTS_FILE)]);
        assert_eq!(
            fs::read_to_string(switch.join("config.yml")).expect("read"),
            "deviceLabel: Light\n"
        );
    }
}
