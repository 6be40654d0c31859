//! Lua driver test runners.
//!
//! Two runners share discovery, output parsing and `JUnit` writing:
//!
//! - [`sequential`] runs test files one by one with console verbosity levels,
//!   a path filter and luacov coverage for tests affected by a change.
//! - [`parallel`] runs one task per driver on a bounded worker pool and
//!   writes a report per driver, converting coverage for changed drivers.

pub mod discovery;
pub mod junit;
pub mod output;
pub mod parallel;
pub mod sequential;

pub use output::{TestCase, TestOutcome, TestSuite};
pub use parallel::{DriverResult, ParallelOptions, ParallelSummary, run_parallel};
pub use sequential::{Coverage, SequentialOptions, SequentialSummary, Verbosity, run_tests};
