//! Per-driver parallel Lua test runner.
//!
//! One task per driver directory runs on a bounded worker pool. Workers share
//! nothing; each returns a [`DriverResult`] and the caller aggregates results
//! in completion order.

use super::discovery::{driver_dirs, driver_test_files};
use super::junit::write_junit;
use super::output::{parse_blocks, suite_name};
use crate::config::TestSettings;
use crate::process::CommandRunner;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Directory for per-driver `JUnit` reports, relative to the repository root.
pub const TEST_OUTPUT_DIR: &str = "tools/test_output";

/// Directory for per-driver Cobertura reports, relative to the repository root.
pub const COVERAGE_OUTPUT_DIR: &str = "tools/coverage_output";

/// Outcome of one driver's tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverResult {
    /// Driver directory name.
    pub driver: String,
    /// Passed tests.
    pub successes: usize,
    /// Failed or errored tests.
    pub failures: usize,
    /// `<driver>: ` followed by one line per failed test, when any failed.
    pub failure_output: Option<String>,
    /// Interpreter stderr, one entry per test file that wrote any.
    pub stderr: Vec<String>,
}

impl DriverResult {
    /// The console summary line, `<driver>: passed S of T tests`.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{}: passed {} of {} tests",
            self.driver,
            self.successes,
            self.successes + self.failures
        )
    }
}

/// Options for a parallel run.
#[derive(Debug, Clone, Default)]
pub struct ParallelOptions {
    /// Pool size; CPU count when unset.
    pub workers: Option<usize>,
    /// Names of drivers changed in this build; these run with coverage.
    pub changed_drivers: BTreeSet<String>,
}

impl ParallelOptions {
    /// Builds options from changed driver paths, keeping each final path
    /// component.
    #[must_use]
    pub fn from_changed_paths(paths: &[String], workers: Option<usize>) -> Self {
        Self {
            workers,
            changed_drivers: paths
                .iter()
                .filter_map(|path| Path::new(path).file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        }
    }

    fn pool_size(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Runs one driver's test files and writes its `JUnit` report.
///
/// # Errors
///
/// Returns an error if a process cannot be spawned or the report cannot be
/// written.
#[instrument(skip(settings, runner), fields(driver = %driver_dir.display()))]
pub fn run_driver(
    repo_root: &Path,
    driver_dir: &Path,
    settings: &TestSettings,
    runner: &dyn CommandRunner,
    changed: bool,
) -> Result<DriverResult> {
    let driver = driver_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let src = driver_dir.join("src");

    let mut result = DriverResult {
        driver: driver.clone(),
        ..DriverResult::default()
    };
    let mut suites = Vec::new();
    let mut failure_output = String::new();

    for test_file in driver_test_files(driver_dir) {
        debug!(file = %test_file.display(), "running test file");
        let mut args = Vec::with_capacity(2);
        if changed {
            args.push(settings.coverage_flag.clone());
        }
        args.push(test_file.to_string_lossy().into_owned());
        let output = runner.run(&settings.interpreter, &args, &src)?;
        if !output.stderr.is_empty() {
            result.stderr.push(output.stderr);
        }

        let report = parse_blocks(&suite_name(&test_file), &output.stdout);
        result.successes += report.successes;
        result.failures += report.failures;
        failure_output.push_str(&report.failure_output);
        suites.push(report.suite);
    }

    let junit = repo_root
        .join(TEST_OUTPUT_DIR)
        .join(format!("{driver}_test_output.xml"));
    write_junit(&junit, &suites)?;

    if !failure_output.is_empty() {
        result.failure_output = Some(format!("{driver}: \n{failure_output}"));
    }

    if changed {
        let coverage = repo_root
            .join(COVERAGE_OUTPUT_DIR)
            .join(format!("{driver}_coverage.xml"));
        let args = vec![
            "-o".to_string(),
            coverage.to_string_lossy().into_owned(),
            "-c".to_string(),
            repo_root
                .join(&settings.cobertura_config)
                .to_string_lossy()
                .into_owned(),
        ];
        let output = runner.run(&settings.cobertura, &args, &src)?;
        if !output.success {
            warn!(%driver, stderr = %output.stderr.trim(), "coverage conversion failed");
        }
    }

    Ok(result)
}

/// Result of a parallel run.
#[derive(Debug, Clone, Default)]
pub struct ParallelSummary {
    /// Per-driver results in completion order.
    pub results: Vec<DriverResult>,
}

impl ParallelSummary {
    /// Returns `true` if any driver reported failures.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|result| result.failure_output.is_some())
    }

    /// Failure summaries of the drivers that failed.
    pub fn failure_outputs(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter_map(|result| result.failure_output.as_deref())
    }
}

/// Runs every driver's tests on a bounded worker pool.
///
/// `on_result` is called on the calling thread as each driver finishes.
///
/// # Errors
///
/// Returns an error if output directories cannot be created, the runtime
/// cannot start, or any driver task fails.
pub fn run_parallel(
    repo_root: &Path,
    settings: &TestSettings,
    runner: Arc<dyn CommandRunner>,
    options: &ParallelOptions,
    mut on_result: impl FnMut(&DriverResult) -> Result<()>,
) -> Result<ParallelSummary> {
    let repo_root =
        std::path::absolute(repo_root).map_err(|e| Error::operation("resolve_repo_root", e))?;
    for dir in [TEST_OUTPUT_DIR, COVERAGE_OUTPUT_DIR] {
        let path = repo_root.join(dir);
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::operation("create_output_dir", format!("{}: {e}", path.display())))?;
    }

    let drivers = driver_dirs(&repo_root)?;
    let pool_size = options.pool_size();
    info!(drivers = drivers.len(), workers = pool_size, "running driver tests");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::operation("start_runtime", e))?;

    runtime.block_on(async {
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let mut tasks = JoinSet::new();

        for driver_dir in drivers {
            let changed = driver_dir
                .file_name()
                .is_some_and(|name| options.changed_drivers.contains(&*name.to_string_lossy()));
            let task = DriverTask {
                repo_root: repo_root.clone(),
                driver_dir,
                settings: settings.clone(),
                runner: Arc::clone(&runner),
                changed,
            };
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::operation("acquire_worker", e))?;
                tokio::task::spawn_blocking(move || task.run())
                    .await
                    .map_err(|e| Error::operation("join_worker", e))?
            });
        }

        let mut summary = ParallelSummary::default();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| Error::operation("join_worker", e))??;
            on_result(&result)?;
            summary.results.push(result);
        }
        Ok(summary)
    })
}

/// Owned inputs of one worker.
struct DriverTask {
    repo_root: PathBuf,
    driver_dir: PathBuf,
    settings: TestSettings,
    runner: Arc<dyn CommandRunner>,
    changed: bool,
}

impl DriverTask {
    fn run(self) -> Result<DriverResult> {
        run_driver(
            &self.repo_root,
            &self.driver_dir,
            &self.settings,
            self.runner.as_ref(),
            self.changed,
        )
    }
}
