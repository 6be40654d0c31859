//! `stamp-min-api` command.

use crate::stamp::process_directory;
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

/// Stamps `min_api_version` into every Lua test registration under `dir` and
/// prints each modified file.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `dir` is not a directory, or an error if
/// a file cannot be rewritten.
pub fn cmd_stamp(dir: &Path, api_version: u32, out: &mut dyn Write) -> Result<ExitCode> {
    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    for path in process_directory(dir, api_version)? {
        writeln!(out, "Modified: {}", path.display())
            .map_err(|e| Error::operation("write_output", e))?;
    }
    Ok(ExitCode::SUCCESS)
}
