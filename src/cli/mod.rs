//! CLI command implementations.
//!
//! Each submodule backs one subcommand of the `driverci` binary. Commands
//! write their human-facing output to the writer they are given and return
//! the process exit code; diagnostics go through `tracing`.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `check-duplicates` | Compare changed device profiles with their siblings |
//! | `test` | Run all Lua driver tests sequentially |
//! | `test-parallel` | Run Lua driver tests with one task per driver |
//! | `deploy` | Package, upload and publish changed drivers |
//! | `stamp-min-api` | Insert `min_api_version` into Lua test registrations |
//!
//! # Example Usage
//!
//! ```bash
//! driverci check-duplicates --changed-files files.csv
//! driverci test -vv --filter zigbee-switch --junit results.xml
//! driverci test-parallel drivers/SmartThings/zigbee-switch
//! driverci stamp-min-api drivers/SmartThings --api-version 19
//! ```

mod deploy;
mod duplicates;
mod stamp;

pub use deploy::cmd_deploy;
pub use duplicates::cmd_check_duplicates;
pub use stamp::cmd_stamp;
pub use test::{TestCommand, cmd_test, cmd_test_parallel};

use crate::config::DriverCiConfig;
use crate::process::CommandRunner;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Picks the repository root.
///
/// Order: explicit `--repo-root`, the configured `repo_root`, the enclosing
/// git work tree, then the current directory.
pub fn resolve_repo_root(
    explicit: Option<&Path>,
    config: &DriverCiConfig,
    runner: &dyn CommandRunner,
) -> PathBuf {
    if let Some(path) = explicit.map(Path::to_path_buf).or_else(|| config.repo_root.clone()) {
        return path;
    }

    let args = ["rev-parse".to_string(), "--show-toplevel".to_string()];
    match runner.run("git", &args, Path::new(".")) {
        Ok(output) if output.success && !output.stdout.trim().is_empty() => {
            PathBuf::from(output.stdout.trim())
        },
        Ok(output) => {
            debug!(stderr = %output.stderr.trim(), "not inside a git work tree");
            PathBuf::from(".")
        },
        Err(e) => {
            debug!(error = %e, "git unavailable");
            PathBuf::from(".")
        },
    }
}
