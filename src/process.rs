//! Subprocess seam.
//!
//! The Lua interpreter, the coverage tools and `zip` are external programs.
//! They are invoked through [`CommandRunner`] so the runners and the deploy
//! pipeline can be exercised without any of them installed. Every invocation
//! names its working directory explicitly.

use crate::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates a failed output with the given stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs external programs.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` in `cwd` and waits for it to finish.
    ///
    /// A non-zero exit is not an error; inspect [`CommandOutput::success`].
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput>;
}

/// Runs programs with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        debug!(program, ?args, cwd = %cwd.display(), "spawning process");

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| Error::operation(format!("spawn {program}"), e))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A recorded invocation.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: std::path::PathBuf,
}

#[cfg(test)]
type Responder = Box<dyn Fn(&Invocation) -> CommandOutput + Send + Sync>;

/// Mock runner answering every call through a closure.
#[cfg(test)]
pub struct MockRunner {
    respond: Responder,
    /// Calls made so far.
    pub calls: std::sync::Mutex<Vec<Invocation>>,
}

#[cfg(test)]
impl MockRunner {
    /// Creates a runner that answers with `respond`.
    pub fn new(respond: impl Fn(&Invocation) -> CommandOutput + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of the recorded calls.
    pub fn recorded(&self) -> Vec<Invocation> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        let invocation = Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        };
        let output = (self.respond)(&invocation);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation);
        }
        Ok(output)
    }
}
