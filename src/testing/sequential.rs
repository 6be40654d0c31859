//! Sequential Lua test runner.
//!
//! Runs every driver test file one after the other, echoing progress to the
//! console at the requested verbosity, and optionally writes a `JUnit` report
//! and luacov coverage.

use super::discovery::{affected_tests, all_test_files, driver_of_test};
use super::junit::write_junit;
use super::output::{FileReport, TestSuite, parse_sequential, suite_name};
use crate::config::TestSettings;
use crate::process::CommandRunner;
use crate::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// How much of each test's output reaches the console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Only the `Passed X of Y tests` line of each file.
    #[default]
    TotalsOnly,
    /// Test title and status.
    TestStatus,
    /// Full logs of failed tests, title and status of the rest.
    FailureLogs,
    /// Full logs of every test.
    AllLogs,
}

impl Verbosity {
    /// Maps a `-v` count to a level; counts above 3 saturate.
    #[must_use]
    pub const fn from_count(count: u8) -> Self {
        match count {
            0 => Self::TotalsOnly,
            1 => Self::TestStatus,
            2 => Self::FailureLogs,
            _ => Self::AllLogs,
        }
    }
}

/// Which test files run with coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Coverage {
    /// No coverage.
    #[default]
    Off,
    /// Every test file.
    All,
    /// Test files affected by these changed paths.
    Changed(Vec<String>),
}

/// Options for a sequential run.
#[derive(Debug, Clone, Default)]
pub struct SequentialOptions {
    /// Console verbosity.
    pub verbosity: Verbosity,
    /// Only run test files whose path matches.
    pub filter: Option<Regex>,
    /// Where to write a `JUnit` report.
    pub junit: Option<PathBuf>,
    /// Coverage selection.
    pub coverage: Coverage,
}

/// Result of a sequential run.
#[derive(Debug, Clone, Default)]
pub struct SequentialSummary {
    /// Tests started across all files.
    pub total_tests: usize,
    /// Tests passed across all files.
    pub total_passes: usize,
    /// Failure descriptions per test file.
    pub failures: BTreeMap<PathBuf, Vec<String>>,
    /// One suite per test file, in run order.
    pub suites: Vec<TestSuite>,
}

impl SequentialSummary {
    /// Returns `true` if any file recorded a failure.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs all driver tests below `repo_root`.
///
/// # Errors
///
/// Returns an error if the drivers cannot be listed, a process cannot be
/// spawned, or the console or `JUnit` report cannot be written.
#[instrument(skip_all, fields(repo = %repo_root.display()))]
pub fn run_tests(
    repo_root: &Path,
    settings: &TestSettings,
    runner: &dyn CommandRunner,
    options: &SequentialOptions,
    out: &mut dyn Write,
) -> Result<SequentialSummary> {
    let repo_root = std::path::absolute(repo_root).map_err(|e| Error::operation("resolve_repo_root", e))?;
    let covered = match &options.coverage {
        Coverage::Off => BTreeSet::new(),
        Coverage::All => all_test_files(&repo_root)?.into_iter().collect(),
        Coverage::Changed(changed) => affected_tests(&repo_root, changed),
    };
    let luacov_config = repo_root.join(&settings.luacov_config);

    let mut summary = SequentialSummary::default();
    for test_file in all_test_files(&repo_root)? {
        if let Some(filter) = &options.filter {
            if !filter.is_match(&test_file.to_string_lossy()) {
                debug!(file = %test_file.display(), "filtered out");
                continue;
            }
        }
        let with_coverage = covered.contains(&test_file);
        run_file(
            &test_file,
            settings,
            runner,
            options.verbosity,
            with_coverage,
            out,
            &mut summary,
        )?;

        if with_coverage {
            let cwd = src_dir(&test_file)?;
            let output = runner.run(
                &settings.luacov,
                &[format!("-c={}", luacov_config.display())],
                cwd,
            )?;
            if !output.success {
                warn!(stderr = %output.stderr.trim(), "luacov report failed");
            }
        }
    }

    let totals = format!(
        "Total unit tests passes: {}/{}",
        summary.total_passes, summary.total_tests
    );
    let frame = "#".repeat(totals.len());
    emit(out, &format!("{frame}\n{totals}\n{frame}\n"))?;

    if let Some(junit) = &options.junit {
        write_junit(junit, &summary.suites)?;
        info!(path = %junit.display(), "wrote JUnit report");
    }

    for (file, failures) in &summary.failures {
        let mut listing = format!("Unit test failures in {}:\n", file.display());
        for failure in failures {
            listing.push_str(&format!("    {failure}\n"));
        }
        emit(out, &listing)?;
    }

    Ok(summary)
}

fn run_file(
    test_file: &Path,
    settings: &TestSettings,
    runner: &dyn CommandRunner,
    verbosity: Verbosity,
    with_coverage: bool,
    out: &mut dyn Write,
    summary: &mut SequentialSummary,
) -> Result<()> {
    let header = format!("## Running tests from {}", test_file.display());
    let frame = "#".repeat(header.len());
    emit(out, &format!("{frame}\n{header}\n"))?;

    let mut args = Vec::with_capacity(2);
    if with_coverage {
        args.push(settings.coverage_flag.clone());
    }
    args.push(test_file.to_string_lossy().into_owned());
    let output = runner.run(&settings.interpreter, &args, src_dir(test_file)?)?;

    let source = match std::fs::read_to_string(test_file) {
        Ok(source) => source,
        Err(e) => {
            warn!(file = %test_file.display(), error = %e, "cannot read test source; line numbers unavailable");
            String::new()
        },
    };
    let report = parse_sequential(
        &suite_name(test_file),
        &source,
        &output.stdout,
        &output.stderr,
    );
    print_cases(&report, verbosity, out)?;
    emit(out, &format!("{frame}\n"))?;

    summary.total_tests += report.test_count;
    summary.total_passes += report.passes;
    if !report.failures.is_empty() {
        summary
            .failures
            .insert(test_file.to_path_buf(), report.failures);
    }
    summary.suites.push(report.suite);
    Ok(())
}

fn print_cases(report: &FileReport, verbosity: Verbosity, out: &mut dyn Write) -> Result<()> {
    for case in &report.case_logs {
        let title_and_status = format!("{}\n{}\n", case.title, case.status);
        match verbosity {
            Verbosity::TotalsOnly => {},
            Verbosity::TestStatus => emit(out, &title_and_status)?,
            Verbosity::FailureLogs if case.failed => emit(out, &case.logs)?,
            Verbosity::FailureLogs => emit(out, &title_and_status)?,
            Verbosity::AllLogs => emit(out, &case.logs)?,
        }
    }
    if verbosity == Verbosity::TotalsOnly {
        if let Some(totals) = &report.totals_line {
            emit(out, &format!("{totals}\n"))?;
        }
    }
    Ok(())
}

/// The `<driver>/src` directory a test file runs in.
fn src_dir(test_file: &Path) -> Result<&Path> {
    driver_of_test(test_file)
        .and_then(|_| test_file.parent())
        .and_then(Path::parent)
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "test file outside a driver: {}",
                test_file.display()
            ))
        })
}

pub(crate) fn emit(out: &mut dyn Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .map_err(|e| Error::operation("write_console", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CommandOutput, MockRunner};
    use std::fs;

    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (driver, test) in [
            ("SmartThings/zigbee-switch", "test_on_off.lua"),
            ("SmartThings/zwave-lock", "test_lock.lua"),
        ] {
            let test_dir = dir.path().join("drivers").join(driver).join("src/test");
            fs::create_dir_all(&test_dir).expect("create dirs");
            fs::write(
                test_dir.join(test),
                "test.register_message_test(\n  \"Good\",\n  {})\ntest.register_message_test(\n  \"Bad\",\n  {})\n",
            )
            .expect("write");
        }
        dir
    }

    fn respond(call: &crate::process::Invocation) -> CommandOutput {
        let file = call.args.last().cloned().unwrap_or_default();
        if call.program == "luacov" {
            CommandOutput::ok("")
        } else if file.contains("test_lock") {
            CommandOutput::ok(
                "Running test \"Good\"\n----\nPASSED\nRunning test \"Bad\"\n----\nexpected\nFAILED\nPassed 1 of 2 tests\n",
            )
        } else {
            CommandOutput::ok("Running test \"Good\"\n----\nPASSED\nPassed 1 of 1 tests\n")
        }
    }

    fn run(options: &SequentialOptions) -> (SequentialSummary, String, Vec<crate::process::Invocation>) {
        let dir = repo();
        let runner = MockRunner::new(respond);
        let mut out = Vec::new();
        let summary = run_tests(dir.path(), &TestSettings::default(), &runner, options, &mut out)
            .expect("run should succeed");
        (summary, String::from_utf8_lossy(&out).into_owned(), runner.recorded())
    }

    #[test]
    fn test_run_tests_totals_and_failures() {
        let (summary, console, calls) = run(&SequentialOptions::default());
        assert_eq!(summary.total_tests, 3);
        assert_eq!(summary.total_passes, 2);
        assert!(summary.has_failures());
        assert_eq!(summary.suites.len(), 2);
        assert!(console.contains("Total unit tests passes: 2/3"));
        assert!(console.contains("Passed 1 of 2 tests"));
        assert!(console.contains("    Bad [line 5]"));
        assert!(console.contains("Unit test failures in"));
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|call| call.cwd.ends_with("src")));
        assert!(calls.iter().all(|call| call.args.len() == 1));
    }

    #[test]
    fn test_run_tests_filter() {
        let options = SequentialOptions {
            filter: Some(Regex::new("zigbee").expect("regex")),
            ..SequentialOptions::default()
        };
        let (summary, _, calls) = run(&options);
        assert_eq!(summary.total_tests, 1);
        assert!(!summary.has_failures());
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_run_tests_status_verbosity() {
        let options = SequentialOptions {
            verbosity: Verbosity::TestStatus,
            ..SequentialOptions::default()
        };
        let (_, console, _) = run(&options);
        assert!(console.contains("Running test \"Bad\"\nFAILED\n"));
        assert!(!console.contains("Passed 1 of 1 tests"));
    }

    #[test]
    fn test_run_tests_failure_logs_verbosity() {
        let options = SequentialOptions {
            verbosity: Verbosity::FailureLogs,
            ..SequentialOptions::default()
        };
        let (_, console, _) = run(&options);
        assert!(console.contains("expected\nFAILED\n"));
    }

    #[test]
    fn test_run_tests_coverage_for_changed_driver() {
        let options = SequentialOptions {
            coverage: Coverage::Changed(vec![
                "drivers/SmartThings/zwave-lock/src/init.lua".to_string(),
            ]),
            ..SequentialOptions::default()
        };
        let (_, _, calls) = run(&options);
        let lock_run = calls
            .iter()
            .find(|call| call.args.last().is_some_and(|arg| arg.contains("test_lock")))
            .expect("lock test ran");
        assert_eq!(lock_run.args[0], "-lluacov");
        let luacov = calls
            .iter()
            .find(|call| call.program == "luacov")
            .expect("luacov ran");
        assert!(luacov.args[0].starts_with("-c="));
        assert!(luacov.args[0].ends_with(".circleci/config.luacov"));
        assert_eq!(calls.iter().filter(|call| call.program == "luacov").count(), 1);
    }

    #[test]
    fn test_run_tests_coverage_for_every_file() {
        let options = SequentialOptions {
            coverage: Coverage::All,
            ..SequentialOptions::default()
        };
        let (_, _, calls) = run(&options);

        let lua_runs: Vec<_> = calls.iter().filter(|call| call.program == "lua").collect();
        assert_eq!(lua_runs.len(), 2);
        assert!(lua_runs.iter().all(|call| call.args[0] == "-lluacov"));

        let luacov_runs: Vec<_> = calls.iter().filter(|call| call.program == "luacov").collect();
        assert_eq!(luacov_runs.len(), 2);
        assert!(luacov_runs.iter().any(|call| call.cwd.ends_with("zigbee-switch/src")));
        assert!(luacov_runs.iter().any(|call| call.cwd.ends_with("zwave-lock/src")));
    }

    #[test]
    fn test_unreadable_source_still_reports_failures() {
        let dir = repo();
        let lock_test = dir
            .path()
            .join("drivers/SmartThings/zwave-lock/src/test/test_lock.lua");
        fs::write(&lock_test, [0xff, 0xfe, 0x00]).expect("write invalid utf-8");

        let runner = MockRunner::new(respond);
        let mut out = Vec::new();
        let summary = run_tests(
            dir.path(),
            &TestSettings::default(),
            &runner,
            &SequentialOptions::default(),
            &mut out,
        )
        .expect("run should succeed");

        assert_eq!(summary.total_tests, 3);
        let failures = summary
            .failures
            .iter()
            .find(|(file, _)| file.ends_with("test/test_lock.lua"))
            .map(|(_, failures)| failures)
            .expect("lock failures recorded");
        assert_eq!(failures, &vec!["Bad [line ?]".to_string()]);
    }

    #[test]
    fn test_run_tests_writes_junit() {
        let junit_dir = tempfile::tempdir().expect("tempdir");
        let junit = junit_dir.path().join("results.xml");
        let options = SequentialOptions {
            junit: Some(junit.clone()),
            ..SequentialOptions::default()
        };
        run(&options);
        let xml = fs::read_to_string(junit).expect("junit written");
        assert!(xml.contains("name=\"test lock\""));
        assert!(xml.contains("name=\"test on off\""));
    }

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(Verbosity::from_count(0), Verbosity::TotalsOnly);
        assert_eq!(Verbosity::from_count(2), Verbosity::FailureLogs);
        assert_eq!(Verbosity::from_count(9), Verbosity::AllLogs);
    }
}
