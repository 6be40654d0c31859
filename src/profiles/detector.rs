//! Batch duplicate detection over a change list.
//!
//! Every changed `.yml` file inside a `profiles` directory is compared with
//! the other `.yml` files of the same directory. Paths are resolved against an
//! explicit repository root; the process working directory is never changed.

use super::compare::is_duplicate;
use super::loader::load_profile;
use super::model::Profile;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};

/// Directory name that marks profile documents.
const PROFILES_DIR: &str = "profiles";

/// Extension of comparable profile documents.
const PROFILE_EXTENSION: &str = "yml";

/// A pair of profiles found to be duplicates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DuplicatePair {
    /// The changed profile, relative to the repository root.
    pub new: PathBuf,
    /// The pre-existing sibling, relative to the repository root.
    pub existing: PathBuf,
}

/// A profile excluded from comparison because it could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProfile {
    /// Profile path, relative to the repository root.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of a detection run.
#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    /// Duplicate pairs in discovery order.
    pub duplicates: Vec<DuplicatePair>,
    /// Profiles that could not be loaded.
    pub malformed: Vec<SkippedProfile>,
    /// Number of profile pairs compared.
    pub comparisons: usize,
}

impl DetectionOutcome {
    /// Returns `true` if any duplicates were found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

/// Detects duplicate profiles among the siblings of changed files.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    repo_root: PathBuf,
}

impl DuplicateDetector {
    /// Creates a detector resolving change-list paths against `repo_root`.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Returns `true` if `path` names a profile document.
    #[must_use]
    pub fn is_profile_path(path: &Path) -> bool {
        has_profile_extension(path)
            && path
                .parent()
                .is_some_and(|parent| parent.components().any(|c| c.as_os_str() == PROFILES_DIR))
    }

    /// Checks every changed profile against its siblings.
    ///
    /// Malformed documents are recorded in the outcome and skipped; the run
    /// continues.
    ///
    /// # Errors
    ///
    /// Returns an error if a profile directory cannot be listed.
    #[instrument(skip_all, fields(changed = changed.len()))]
    pub fn check(&self, changed: &[String]) -> Result<DetectionOutcome> {
        let mut run = DetectionRun::new(&self.repo_root);

        for file in changed {
            let new = PathBuf::from(file);
            if !Self::is_profile_path(&new) {
                debug!(file = %new.display(), "not a profile, skipping");
                continue;
            }
            if !self.repo_root.join(&new).is_file() {
                warn!(file = %new.display(), "changed profile no longer exists, skipping");
                continue;
            }

            info!(profile = %new.display(), "new profile, comparing to siblings");
            run.check_profile(&new)?;
        }

        Ok(run.finish())
    }
}

/// State of a single detection run.
struct DetectionRun<'a> {
    repo_root: &'a Path,
    /// Load results by relative path; `None` marks a malformed document.
    loaded: HashMap<PathBuf, Option<Rc<Profile>>>,
    recorded: BTreeSet<(PathBuf, PathBuf)>,
    outcome: DetectionOutcome,
}

impl<'a> DetectionRun<'a> {
    fn new(repo_root: &'a Path) -> Self {
        Self {
            repo_root,
            loaded: HashMap::new(),
            recorded: BTreeSet::new(),
            outcome: DetectionOutcome::default(),
        }
    }

    fn check_profile(&mut self, new: &Path) -> Result<()> {
        let Some(new_profile) = self.load(new) else {
            return Ok(());
        };

        for sibling in self.siblings(new)? {
            if self.recorded.contains(&(sibling.clone(), new.to_path_buf()))
                || self.recorded.contains(&(new.to_path_buf(), sibling.clone()))
            {
                continue;
            }
            let Some(current_profile) = self.load(&sibling) else {
                continue;
            };

            debug!(new = %new.display(), current = %sibling.display(), "comparing profiles");
            self.outcome.comparisons += 1;
            if is_duplicate(&new_profile, &current_profile) {
                info!(new = %new.display(), current = %sibling.display(), "duplicate profiles");
                self.recorded.insert((new.to_path_buf(), sibling.clone()));
                self.outcome.duplicates.push(DuplicatePair {
                    new: new.to_path_buf(),
                    existing: sibling,
                });
            }
        }

        Ok(())
    }

    /// Lists the `.yml` siblings of `profile`, sorted by name.
    fn siblings(&self, profile: &Path) -> Result<Vec<PathBuf>> {
        let relative_dir = profile.parent().unwrap_or_else(|| Path::new(""));
        let own_name = profile.file_name();
        let dir = self.repo_root.join(relative_dir);

        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::operation("list_profile_dir", format!("{}: {e}", dir.display())))?;

        let mut siblings = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| Error::operation("list_profile_dir", format!("{}: {e}", dir.display())))?;
            let name = entry.file_name();
            if Some(name.as_os_str()) == own_name {
                continue;
            }
            let relative = relative_dir.join(&name);
            if has_profile_extension(&relative) && entry.path().is_file() {
                siblings.push(relative);
            }
        }
        siblings.sort();
        Ok(siblings)
    }

    /// Loads a profile once per run.
    fn load(&mut self, relative: &Path) -> Option<Rc<Profile>> {
        if let Some(cached) = self.loaded.get(relative) {
            return cached.clone();
        }

        let loaded = match load_profile(&self.repo_root.join(relative)) {
            Ok(profile) => Some(Rc::new(profile)),
            Err(e) => {
                warn!(profile = %relative.display(), error = %e, "skipping malformed profile");
                self.outcome.malformed.push(SkippedProfile {
                    path: relative.to_path_buf(),
                    reason: skip_reason(e),
                });
                None
            },
        };
        self.loaded.insert(relative.to_path_buf(), loaded.clone());
        loaded
    }

    fn finish(self) -> DetectionOutcome {
        self.outcome
    }
}

fn has_profile_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PROFILE_EXTENSION)
}

fn skip_reason(error: Error) -> String {
    match error {
        Error::MalformedProfile { field, reason, .. } => format!("{field}: {reason}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_profile_path() {
        assert!(DuplicateDetector::is_profile_path(Path::new(
            "drivers/SmartThings/zigbee-switch/profiles/switch.yml"
        )));
        assert!(!DuplicateDetector::is_profile_path(Path::new(
            "drivers/SmartThings/zigbee-switch/profiles/switch.yaml"
        )));
        assert!(!DuplicateDetector::is_profile_path(Path::new(
            "drivers/SmartThings/zigbee-switch/config.yml"
        )));
        assert!(!DuplicateDetector::is_profile_path(Path::new("profiles.yml")));
    }

    #[test]
    fn test_skip_reason_strips_path() {
        let reason = skip_reason(Error::MalformedProfile {
            path: PathBuf::from("a/profiles/x.yml"),
            field: "components".to_string(),
            reason: "missing required field".to_string(),
        });
        assert_eq!(reason, "components: missing required field");
    }
}
