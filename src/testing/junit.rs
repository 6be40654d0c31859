//! `JUnit` XML reports.

use super::output::{TestOutcome, TestSuite};
use crate::{Error, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io;
use std::path::Path;

/// Renders suites as a `<testsuites>` document.
///
/// # Errors
///
/// Returns an error if XML serialization fails.
pub fn to_xml(suites: &[TestSuite]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    write_document(&mut writer, suites).map_err(|e| Error::operation("write_junit", e))?;
    String::from_utf8(writer.into_inner()).map_err(|e| Error::operation("write_junit", e))
}

/// Writes suites to `path` as `JUnit` XML.
///
/// # Errors
///
/// Returns an error if rendering or writing the file fails.
pub fn write_junit(path: &Path, suites: &[TestSuite]) -> Result<()> {
    let xml = to_xml(suites)?;
    std::fs::write(path, xml)
        .map_err(|e| Error::operation("write_junit", format!("{}: {e}", path.display())))
}

fn write_document<W: io::Write>(writer: &mut Writer<W>, suites: &[TestSuite]) -> io::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let tests: usize = suites.iter().map(TestSuite::tests).sum();
    let failures: usize = suites.iter().map(TestSuite::failures).sum();
    let errors: usize = suites.iter().map(TestSuite::errors).sum();

    let root = BytesStart::new("testsuites").with_attributes([
        ("disabled", "0"),
        ("errors", errors.to_string().as_str()),
        ("failures", failures.to_string().as_str()),
        ("tests", tests.to_string().as_str()),
        ("time", "0.0"),
    ]);
    writer.write_event(Event::Start(root))?;
    for suite in suites {
        write_suite(writer, suite)?;
    }
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;
    Ok(())
}

fn write_suite<W: io::Write>(writer: &mut Writer<W>, suite: &TestSuite) -> io::Result<()> {
    let start = BytesStart::new("testsuite").with_attributes([
        ("disabled", "0"),
        ("errors", suite.errors().to_string().as_str()),
        ("failures", suite.failures().to_string().as_str()),
        ("name", suite.name.as_str()),
        ("skipped", "0"),
        ("tests", suite.tests().to_string().as_str()),
        ("time", "0"),
    ]);
    writer.write_event(Event::Start(start))?;

    for case in &suite.cases {
        let line = case.line.map(|line| line.to_string());
        let mut start = BytesStart::new("testcase");
        start.push_attribute(("name", case.name.as_str()));
        if let Some(line) = line.as_deref() {
            start.push_attribute(("line", line));
        }
        writer.write_event(Event::Start(start))?;

        match &case.outcome {
            TestOutcome::Passed => {},
            TestOutcome::Failed { message } => {
                write_detail(writer, "failure", message, &case.stdout)?;
            },
            TestOutcome::Errored { message } => {
                write_detail(writer, "error", message, &case.stdout)?;
            },
        }

        if !case.stdout.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("system-out")))?;
            writer.write_event(Event::Text(BytesText::new(&case.stdout)))?;
            writer.write_event(Event::End(BytesEnd::new("system-out")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    Ok(())
}

fn write_detail<W: io::Write>(
    writer: &mut Writer<W>,
    kind: &str,
    message: &str,
    output: &str,
) -> io::Result<()> {
    let start = BytesStart::new(kind).with_attributes([("type", kind), ("message", message)]);
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(output)))?;
    writer.write_event(Event::End(BytesEnd::new(kind)))?;
    Ok(())
}
