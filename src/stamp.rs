//! `min_api_version` stamping for Lua driver tests.
//!
//! Test registrations take an optional trailing options table. This rewrites
//!
//! ```lua
//! test.register_coroutine_test(
//!   "Refresh",
//!   function()
//!   end
//! )
//! ```
//!
//! into
//!
//! ```lua
//! test.register_coroutine_test(
//!   "Refresh",
//!   function()
//!   end,
//!   {
//!      min_api_version = 19
//!   }
//! )
//! ```
//!
//! Registrations that already mention `min_api_version`, or whose last
//! argument line does not end in `end` or `}`, are left alone.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Calls whose argument lists get stamped.
pub const TARGETS: [&str; 2] = ["test.register_coroutine_test", "test.register_message_test"];

/// Default `min_api_version`.
pub const DEFAULT_API_VERSION: u32 = 19;

const MARKER: &str = "min_api_version";

/// Stamps every registration in `content`.
///
/// Returns the rewritten text, or `None` if nothing changed.
#[must_use]
pub fn insert_min_api_version(content: &str, api_version: u32) -> Option<String> {
    let mut content = content.to_string();
    let mut index = 0;
    let mut modified = false;

    while let Some(call) = find_next_target(&content, index) {
        let Some(open) = content[call..].find('(').map(|offset| call + offset) else {
            break;
        };
        let Some(close) = find_matching_paren(&content, open) else {
            break;
        };

        let block = &content[open + 1..close];
        if block.contains(MARKER) {
            index = close;
            continue;
        }

        match stamp_block(block, api_version) {
            Some(stamped) => {
                content.replace_range(open + 1..close, &stamped);
                index = open + 1 + stamped.len();
                modified = true;
            },
            None => index = close,
        }
    }

    modified.then_some(content)
}

/// Earliest target occurrence at or after `from`.
fn find_next_target(content: &str, from: usize) -> Option<usize> {
    let rest = content.get(from..)?;
    TARGETS
        .iter()
        .filter_map(|target| rest.find(target))
        .min()
        .map(|offset| from + offset)
}

/// Index of the `)` closing the `(` at `open`, counting nesting.
fn find_matching_paren(content: &str, open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    for (offset, byte) in content.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + offset);
                }
            },
            _ => {},
        }
    }
    None
}

/// Appends the options table after the last argument line.
fn stamp_block(block: &str, api_version: u32) -> Option<String> {
    let mut lines: Vec<String> = block.lines().map(str::to_string).collect();
    let last = lines.iter().rposition(|line| !line.trim().is_empty())?;

    let last_line = &lines[last];
    let stripped = last_line.trim();
    if !(stripped.ends_with("end") || stripped.ends_with('}')) {
        return None;
    }
    let indentation = last_line[..last_line.len() - last_line.trim_start().len()].to_string();

    lines[last].push(',');
    let options = [
        format!("{indentation}{{"),
        format!("{indentation}   {MARKER} = {api_version}"),
        format!("{indentation}}}\n"),
    ];
    lines.splice(last + 1..last + 1, options);
    Some(lines.join("\n"))
}

/// Stamps one file in place. Returns `true` if it was rewritten.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn process_file(path: &Path, api_version: u32) -> Result<bool> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::operation("read_lua_file", format!("{}: {e}", path.display())))?;
    let Some(stamped) = insert_min_api_version(&content, api_version) else {
        debug!(file = %path.display(), "nothing to stamp");
        return Ok(false);
    };
    std::fs::write(path, stamped)
        .map_err(|e| Error::operation("write_lua_file", format!("{}: {e}", path.display())))?;
    info!(file = %path.display(), "stamped min_api_version");
    Ok(true)
}

/// Stamps every `.lua` file below `root` and returns the modified paths.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a file cannot be
/// rewritten.
pub fn process_directory(root: &Path, api_version: u32) -> Result<Vec<PathBuf>> {
    let mut modified = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::operation("walk_lua_files", e))?;
        let is_lua = entry
            .path()
            .extension()
            .is_some_and(|extension| extension == "lua");
        if entry.file_type().is_file() && is_lua && process_file(entry.path(), api_version)? {
            modified.push(entry.into_path());
        }
    }
    Ok(modified)
}
