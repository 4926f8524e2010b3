//! Mock shell adapter for testing.
//!
//! Pre-programmed outputs are keyed by program name. Programs not marked
//! available report `false` from `is_available`, which is how scanner tests
//! exercise the "not installed" path.

use crate::error::{Result, StorylineError};
use crate::tools::shell::{CommandOutput, ShellAdapter};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One recorded invocation: (program, args, working directory).
pub type CommandHistoryEntry = (String, Vec<String>, Option<PathBuf>);

/// Canned response for a program.
#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    Timeout,
}

#[derive(Debug, Default)]
struct Inner {
    responses: HashMap<String, Response>,
    available: HashSet<String>,
    history: Vec<CommandHistoryEntry>,
}

/// Mock shell adapter for testing.
///
/// # Examples
///
/// ```
/// use storyline_core::tools::shell::{CommandOutput, ShellAdapter};
/// use storyline_core::tools::shell_mock::MockShellAdapter;
/// use std::time::Duration;
///
/// let shell = MockShellAdapter::new();
/// shell.set_output("semgrep", CommandOutput {
///     exit_code: 0,
///     stdout: r#"{"results":[]}"#.to_string(),
///     stderr: String::new(),
/// });
///
/// assert!(shell.is_available("semgrep"));
/// let output = shell.run("semgrep", &[], None, Duration::from_secs(1)).unwrap();
/// assert!(output.success());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockShellAdapter {
    inner: Arc<Mutex<Inner>>,
}

impl MockShellAdapter {
    /// Creates a mock where no program is available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output for a program and marks it available.
    pub fn set_output(&self, program: &str, output: CommandOutput) {
        let mut inner = self.lock();
        inner.available.insert(program.to_string());
        inner
            .responses
            .insert(program.to_string(), Response::Output(output));
    }

    /// Makes a program available but always time out.
    pub fn set_timeout(&self, program: &str) {
        let mut inner = self.lock();
        inner.available.insert(program.to_string());
        inner.responses.insert(program.to_string(), Response::Timeout);
    }

    /// Returns the history of executed commands.
    pub fn get_history(&self) -> Vec<CommandHistoryEntry> {
        self.lock().history.clone()
    }

    /// Returns the number of times a program was executed.
    pub fn command_count(&self, program: &str) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|(p, _, _)| p == program)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ShellAdapter for MockShellAdapter {
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut inner = self.lock();
        inner.history.push((
            program.to_string(),
            args.to_vec(),
            cwd.map(Path::to_path_buf),
        ));

        match inner.responses.get(program) {
            Some(Response::Output(output)) => Ok(output.clone()),
            Some(Response::Timeout) => Err(StorylineError::CommandTimeout(timeout.as_secs())),
            None => Err(StorylineError::ShellCommandFailed(format!(
                "no output configured for {program}"
            ))),
        }
    }

    fn is_available(&self, program: &str) -> bool {
        self.lock().available.contains(program)
    }
}
