//! Change list input.
//!
//! CI writes the files touched by a pull request as a single CSV record
//! (`~/files.csv` by default). Driver lists handed over through environment
//! variables use a looser format, see [`parse_name_list`].

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Default change-list file name, relative to the home directory.
pub const DEFAULT_CHANGE_LIST: &str = "files.csv";

/// Returns the default change-list location (`$HOME/files.csv`).
#[must_use]
pub fn default_change_list_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(DEFAULT_CHANGE_LIST),
        |dirs| dirs.home_dir().join(DEFAULT_CHANGE_LIST),
    )
}

/// Reads the changed file paths from the first record of a CSV file.
///
/// Empty fields are dropped. An empty file yields an empty list.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid CSV.
pub fn read_change_list(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::operation("read_change_list", format!("{}: {e}", path.display())))?;

    let mut record = csv::StringRecord::new();
    let has_record = reader
        .read_record(&mut record)
        .map_err(|e| Error::operation("read_change_list", format!("{}: {e}", path.display())))?;
    if !has_record {
        return Ok(Vec::new());
    }

    Ok(record
        .iter()
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parses a list of names from an environment value.
///
/// Accepts JSON-ish lists (`["a", "b"]`), comma separated (`a,b`) and
/// whitespace separated (`a b`) forms.
#[must_use]
pub fn parse_name_list(value: &str) -> Vec<String> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    #[test]
    fn test_read_change_list_first_record() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "drivers/a/profiles/x.yml, drivers/a/src/init.lua,\nignored,row"
        )
        .expect("write");

        let changed = read_change_list(file.path()).expect("read");
        assert_eq!(
            changed,
            vec![
                "drivers/a/profiles/x.yml".to_string(),
                "drivers/a/src/init.lua".to_string()
            ]
        );
    }

    #[test]
    fn test_read_change_list_empty_file() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        assert!(read_change_list(file.path()).expect("read").is_empty());
    }

    #[test]
    fn test_read_change_list_missing_file() {
        let result = read_change_list(Path::new("/nonexistent/files.csv"));
        assert!(result.is_err());
    }

    #[test_case("[\"zigbee-switch\", \"zwave-lock\"]" ; "json list")]
    #[test_case("zigbee-switch,zwave-lock" ; "comma separated")]
    #[test_case("zigbee-switch zwave-lock\n" ; "whitespace separated")]
    #[test_case("['zigbee-switch','zwave-lock']" ; "single quoted")]
    fn test_parse_name_list(input: &str) {
        assert_eq!(parse_name_list(input), vec!["zigbee-switch", "zwave-lock"]);
    }

    #[test]
    fn test_parse_name_list_empty() {
        assert!(parse_name_list("[]").is_empty());
        assert!(parse_name_list("").is_empty());
    }
}
