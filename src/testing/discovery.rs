//! Locating drivers and their Lua test files.
//!
//! Drivers live two levels below `<repo>/drivers` (`drivers/<partner>/<driver>`)
//! and keep their tests in `src/test/test_*.lua`.

use crate::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory holding all drivers, relative to the repository root.
pub const DRIVERS_DIR: &str = "drivers";

const SRC_DIR: &str = "src";
const TEST_DIR: &str = "test";

/// Lists `<repo>/drivers/*/*` directories, sorted.
///
/// # Errors
///
/// Returns an error if the drivers directory cannot be walked.
pub fn driver_dirs(repo_root: &Path) -> Result<Vec<PathBuf>> {
    let root = repo_root.join(DRIVERS_DIR);
    let mut dirs = Vec::new();
    for entry in WalkDir::new(&root).min_depth(2).max_depth(2).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::operation("list_drivers", e))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Returns `true` for `test_*.lua` file names.
#[must_use]
pub fn is_test_file_name(name: &str) -> bool {
    name.starts_with("test_") && name.ends_with(".lua")
}

/// Lists a driver's `src/test/test_*.lua` files, sorted.
///
/// A driver without a test directory has no tests.
#[must_use]
pub fn driver_test_files(driver_dir: &Path) -> Vec<PathBuf> {
    let test_dir = driver_dir.join(SRC_DIR).join(TEST_DIR);
    let Ok(entries) = std::fs::read_dir(&test_dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter(|entry| is_test_file_name(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    files
}

/// Lists every driver test file in the repository.
///
/// # Errors
///
/// Returns an error if the drivers directory cannot be walked.
pub fn all_test_files(repo_root: &Path) -> Result<Vec<PathBuf>> {
    Ok(driver_dirs(repo_root)?
        .iter()
        .flat_map(|driver| driver_test_files(driver))
        .collect())
}

/// The driver directory a test file belongs to (`<driver>/src/test/x.lua`).
#[must_use]
pub fn driver_of_test(test_file: &Path) -> Option<&Path> {
    test_file.parent()?.parent()?.parent()
}

/// Test files affected by a set of changed files.
///
/// For every changed path with a `src` component, all `test/test_*.lua` files
/// below its nearest `src` ancestor are affected.
#[must_use]
pub fn affected_tests(repo_root: &Path, changed: &[String]) -> BTreeSet<PathBuf> {
    let mut affected = BTreeSet::new();
    for file in changed {
        let path = repo_root.join(file);
        let Some(src) = nearest_src(&path) else {
            continue;
        };
        for entry in WalkDir::new(src).into_iter().filter_map(std::result::Result::ok) {
            let in_test_dir = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|name| name == TEST_DIR);
            if entry.file_type().is_file()
                && in_test_dir
                && is_test_file_name(&entry.file_name().to_string_lossy())
            {
                affected.insert(entry.into_path());
            }
        }
    }
    affected
}

fn nearest_src(path: &Path) -> Option<&Path> {
    path.ancestors()
        .find(|ancestor| ancestor.file_name().is_some_and(|name| name == SRC_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, "").expect("write");
    }

    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "drivers/SmartThings/zigbee-switch/src/test/test_on_off.lua");
        touch(dir.path(), "drivers/SmartThings/zigbee-switch/src/test/test_level.lua");
        touch(dir.path(), "drivers/SmartThings/zigbee-switch/src/test/helpers.lua");
        touch(dir.path(), "drivers/SmartThings/zigbee-switch/src/init.lua");
        touch(dir.path(), "drivers/SmartThings/zwave-lock/src/init.lua");
        touch(dir.path(), "drivers/SmartThings/zwave-lock/src/sub/test/test_sub.lua");
        touch(dir.path(), "drivers/Partner/bose/src/test/test_bose.lua");
        touch(dir.path(), "drivers/README.md");
        dir
    }

    #[test]
    fn test_driver_dirs_sorted() {
        let dir = repo();
        let names: Vec<String> = driver_dirs(dir.path())
            .expect("drivers")
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["bose", "zigbee-switch", "zwave-lock"]);
    }

    #[test]
    fn test_all_test_files() {
        let dir = repo();
        let files = all_test_files(dir.path()).expect("files");
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["test_bose.lua", "test_level.lua", "test_on_off.lua"]);
        assert!(
            driver_of_test(&files[0])
                .is_some_and(|driver| driver.ends_with("drivers/Partner/bose"))
        );
    }

    #[test]
    fn test_affected_tests_nearest_src() {
        let dir = repo();
        let changed = vec![
            "drivers/SmartThings/zwave-lock/src/init.lua".to_string(),
            "drivers/SmartThings/zigbee-switch/profiles/switch.yml".to_string(),
        ];
        let affected = affected_tests(dir.path(), &changed);
        assert_eq!(affected.len(), 1);
        assert!(
            affected
                .iter()
                .all(|path| path.ends_with("zwave-lock/src/sub/test/test_sub.lua"))
        );
    }

    #[test]
    fn test_affected_tests_src_dir_itself() {
        let dir = repo();
        let changed = vec!["drivers/SmartThings/zigbee-switch/src".to_string()];
        assert_eq!(affected_tests(dir.path(), &changed).len(), 2);
    }
}
