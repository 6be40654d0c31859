//! Parsing of Lua test interpreter output.
//!
//! The driver test framework prints one `Running test "<name>"` line per test,
//! then the test's own log lines, then a line containing `PASSED` or `FAILED`.
//! A well-behaved file ends with `Passed X of Y tests`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Marker that turns a failed test into an error.
const TRACEBACK: &str = "traceback";

/// Recorded when the interpreter's own totals disagree with the parsed ones.
pub const COUNT_MISMATCH: &str = "Unexpected difference in test counts";

static TEST_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Running test "([^"]+)""#).unwrap_or_else(|_| unreachable!("static regex"))
});

static TOTALS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Passed (\d+) of (\d+) tests").unwrap_or_else(|_| unreachable!("static regex"))
});

static TEST_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)Running test "(.*?)".+?-{2,}.*?(PASSED|FAILED)"#)
        .unwrap_or_else(|_| unreachable!("static regex"))
});

/// How a test case ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    /// The test passed.
    Passed,
    /// An assertion failed.
    Failed {
        /// The status line or short message.
        message: String,
    },
    /// The test raised an error (its output contains a traceback).
    Errored {
        /// The status line or short message.
        message: String,
    },
}

impl TestOutcome {
    /// Returns `true` unless the case passed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self, Self::Passed)
    }

    fn from_failure(message: &str, output: &str) -> Self {
        if output.contains(TRACEBACK) {
            Self::Errored {
                message: message.to_string(),
            }
        } else {
            Self::Failed {
                message: message.to_string(),
            }
        }
    }
}

/// A single test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Test name as printed by the framework.
    pub name: String,
    /// First line of the test file mentioning the name, if found.
    pub line: Option<usize>,
    /// Captured output of the test.
    pub stdout: String,
    /// Result.
    pub outcome: TestOutcome,
}

/// All test cases of one test file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    /// Suite name, derived from the file name.
    pub name: String,
    /// Cases in output order.
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    /// Creates an empty suite.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    /// Number of cases.
    #[must_use]
    pub fn tests(&self) -> usize {
        self.cases.len()
    }

    /// Number of passed cases.
    #[must_use]
    pub fn passes(&self) -> usize {
        self.count(|outcome| matches!(outcome, TestOutcome::Passed))
    }

    /// Number of failed cases.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.count(|outcome| matches!(outcome, TestOutcome::Failed { .. }))
    }

    /// Number of errored cases.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.count(|outcome| matches!(outcome, TestOutcome::Errored { .. }))
    }

    fn count(&self, predicate: impl Fn(&TestOutcome) -> bool) -> usize {
        self.cases.iter().filter(|case| predicate(&case.outcome)).count()
    }
}

/// Derives the suite name from a test file: `test_switch_level.lua` becomes
/// `test switch level`.
#[must_use]
pub fn suite_name(test_file: &Path) -> String {
    test_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}

/// Console view of one finished test, used for verbose printing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseLog {
    /// The `Running test` line.
    pub title: String,
    /// The `PASSED`/`FAILED` line.
    pub status: String,
    /// Non-blank lines printed since the previous test finished.
    pub logs: String,
    /// Whether the test failed.
    pub failed: bool,
}

/// Parsed result of one test file run by the sequential runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    /// Suite with every parsed case.
    pub suite: TestSuite,
    /// Number of `Running test` lines seen.
    pub test_count: usize,
    /// Number of passed tests.
    pub passes: usize,
    /// Failure descriptions for the summary.
    pub failures: Vec<String>,
    /// The interpreter's `Passed X of Y tests` line, when present.
    pub totals_line: Option<String>,
    /// Finished tests in order.
    pub case_logs: Vec<CaseLog>,
}

struct OpenCase {
    name: String,
    line: Option<usize>,
    stdout: String,
}

/// Parses line-oriented interpreter output.
///
/// `source` is the test file's text, used to locate the line on which each
/// test is named. Status lines arriving with no open test case are ignored.
#[must_use]
pub fn parse_sequential(suite: &str, source: &str, stdout: &str, stderr: &str) -> FileReport {
    let mut report = FileReport {
        suite: TestSuite::new(suite),
        ..FileReport::default()
    };
    let mut open: Option<OpenCase> = None;
    let mut pending = CaseLog::default();
    let mut last_line = "";

    for line in stdout.split('\n') {
        if let Some(case) = open.as_mut() {
            case.stdout.push_str(line);
            case.stdout.push('\n');
        }
        let blank = line.trim().is_empty();
        if !blank {
            pending.logs.push_str(line);
            pending.logs.push('\n');
        }

        if let Some(captures) = TEST_START.captures(line) {
            let name = captures[1].to_string();
            pending.title = line.to_string();
            open = Some(OpenCase {
                line: find_line(source, &name),
                name,
                stdout: String::new(),
            });
            report.test_count += 1;
        } else if line.contains("PASSED") {
            if let Some(case) = open.take() {
                report.passes += 1;
                report.suite.cases.push(TestCase {
                    name: case.name,
                    line: case.line,
                    stdout: case.stdout,
                    outcome: TestOutcome::Passed,
                });
                pending.status = line.to_string();
                report.case_logs.push(std::mem::take(&mut pending));
            }
        } else if line.contains("FAILED") {
            if let Some(case) = open.take() {
                let line_label = case
                    .line
                    .map_or_else(|| "?".to_string(), |number| number.to_string());
                report
                    .failures
                    .push(format!("{} [line {line_label}]", case.name));
                report.suite.cases.push(TestCase {
                    outcome: TestOutcome::from_failure(line, &case.stdout),
                    name: case.name,
                    line: case.line,
                    stdout: case.stdout,
                });
                pending.status = line.to_string();
                pending.failed = true;
                report.case_logs.push(std::mem::take(&mut pending));
            }
        }

        if !blank {
            last_line = line;
        }
    }

    match TOTALS.captures(last_line) {
        Some(captures) => {
            report.totals_line = Some(last_line.to_string());
            let reported_passes = captures[1].parse::<usize>().ok();
            let reported_tests = captures[2].parse::<usize>().ok();
            if reported_passes != Some(report.passes) || reported_tests != Some(report.test_count)
            {
                report.failures.push(COUNT_MISMATCH.to_string());
            }
        },
        None => {
            report
                .failures
                .push(stderr.split('\n').collect::<Vec<_>>().join("\n    "));
            report.suite.cases.push(TestCase {
                name: suite.to_string(),
                line: None,
                stdout: stderr.to_string(),
                outcome: TestOutcome::Errored {
                    message: "FAILED".to_string(),
                },
            });
        },
    }

    report
}

fn find_line(source: &str, name: &str) -> Option<usize> {
    source
        .lines()
        .position(|line| line.contains(name))
        .map(|index| index + 1)
}

/// Parsed result of one test file run by the parallel runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    /// Suite with every parsed case.
    pub suite: TestSuite,
    /// Passed tests.
    pub successes: usize,
    /// Failed or errored tests.
    pub failures: usize,
    /// One tab-indented line per failed test.
    pub failure_output: String,
}

/// Parses interpreter output as whole test blocks.
///
/// Each block runs from `Running test "<name>"` through a dashed separator to
/// the next `PASSED` or `FAILED`.
#[must_use]
pub fn parse_blocks(suite: &str, stdout: &str) -> BlockReport {
    let mut report = BlockReport {
        suite: TestSuite::new(suite),
        ..BlockReport::default()
    };

    for captures in TEST_BLOCK.captures_iter(stdout) {
        let block = &captures[0];
        let name = captures[1].to_string();
        let outcome = if &captures[2] == "FAILED" {
            report.failures += 1;
            if block.contains(TRACEBACK) {
                report
                    .failure_output
                    .push_str(&format!("\t{suite} ERROR in {name}\n"));
                TestOutcome::Errored {
                    message: "ERROR".to_string(),
                }
            } else {
                report
                    .failure_output
                    .push_str(&format!("\t{suite} FAILED on {name}\n"));
                TestOutcome::Failed {
                    message: "FAILED".to_string(),
                }
            }
        } else {
            report.successes += 1;
            TestOutcome::Passed
        };
        report.suite.cases.push(TestCase {
            name,
            line: None,
            stdout: block.to_string(),
            outcome,
        });
    }

    report
}
