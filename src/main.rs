//! Binary entry point for driverci.
//!
//! This binary provides the CLI interface for the driver CI tooling.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{ArgAction, Parser, Subcommand};
use driverci::changes;
use driverci::cli::{self, TestCommand};
use driverci::config::DriverCiConfig;
use driverci::observability;
use driverci::process::{CommandRunner, SystemRunner};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// driverci - CI tooling for the edge driver repository.
#[derive(Parser)]
#[command(name = "driverci")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(long, global = true, env = "DRIVERCI_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Repository root (default: the enclosing git work tree).
    #[arg(long, global = true)]
    repo_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check changed device profiles for duplicates of their siblings.
    CheckDuplicates {
        /// CSV file whose first record lists the changed files
        /// (default: $HOME/files.csv).
        #[arg(long)]
        changed_files: Option<PathBuf>,

        /// Report file to write.
        #[arg(short, long, default_value = "profile-comment-body.md")]
        output: PathBuf,
    },

    /// Run all driver unit tests sequentially.
    Test {
        /// Verbosity: -v status, -vv failure logs, -vvv all logs.
        #[arg(short = 'v', action = ArgAction::Count)]
        verbosity: u8,

        /// Only run test files whose path matches this regex.
        #[arg(short, long)]
        filter: Option<String>,

        /// Write a JUnit XML report to this file.
        #[arg(short, long)]
        junit: Option<PathBuf>,

        /// Run with luacov; optionally restrict coverage to tests affected by
        /// these changed files.
        #[arg(short, long, num_args = 0..)]
        coverage: Option<Vec<String>>,
    },

    /// Run driver unit tests with one task per driver.
    TestParallel {
        /// Changed driver paths; these drivers run with coverage.
        changed: Vec<String>,

        /// Worker pool size (default: CPU count).
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Package changed drivers and publish them to the release channel.
    Deploy,

    /// Insert min_api_version into Lua test registrations.
    StampMinApi {
        /// Directory to scan for .lua files.
        dir: PathBuf,

        /// min_api_version to insert (default from config, else 19).
        #[arg(long)]
        api_version: Option<u32>,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(args: Cli, config: &DriverCiConfig) -> driverci::Result<ExitCode> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let repo_root = || cli::resolve_repo_root(args.repo_root.as_deref(), config, runner.as_ref());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let code = match args.command {
        Commands::CheckDuplicates {
            changed_files,
            output,
        } => {
            let change_list = changed_files.unwrap_or_else(changes::default_change_list_path);
            cli::cmd_check_duplicates(&repo_root(), &change_list, &output, &mut out)
        },

        Commands::Test {
            verbosity,
            filter,
            junit,
            coverage,
        } => {
            let command = TestCommand {
                verbosity,
                filter,
                junit,
                coverage,
            };
            cli::cmd_test(
                &repo_root(),
                &config.tests,
                &command,
                runner.as_ref(),
                &mut out,
            )
        },

        Commands::TestParallel { changed, workers } => cli::cmd_test_parallel(
            &repo_root(),
            &config.tests,
            &changed,
            workers,
            Arc::clone(&runner),
            &mut out,
        ),

        Commands::Deploy => {
            cli::cmd_deploy(&repo_root(), &config.deploy, runner.as_ref(), &mut out)
        },

        Commands::StampMinApi { dir, api_version } => cli::cmd_stamp(
            &dir,
            api_version.unwrap_or(config.stamp.api_version),
            &mut out,
        ),
    }?;

    out.flush()
        .map_err(|e| driverci::Error::operation("flush_output", e))?;
    Ok(code)
}

/// Loads configuration.
fn load_config(path: Option<&Path>) -> driverci::Result<DriverCiConfig> {
    match path {
        Some(config_path) => DriverCiConfig::load_from_file(config_path),
        None => DriverCiConfig::load_default(),
    }
}
