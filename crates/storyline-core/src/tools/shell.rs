//! Shell adapter trait and operations.
//!
//! External scanners run through this trait so the workflow can be tested
//! against canned command output.

use crate::error::Result;
use std::path::Path;
use std::time::Duration;

/// Shell command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code from the command (-1 when killed by a signal).
    pub exit_code: i32,

    /// Standard output from the command.
    pub stdout: String,

    /// Standard error output from the command.
    pub stderr: String,
}

impl CommandOutput {
    /// Checks if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Shell adapter trait.
///
/// Runs a program directly (no shell interpolation) with a bounded time
/// budget.
pub trait ShellAdapter: Send + Sync {
    /// Executes a program and waits for completion.
    ///
    /// # Arguments
    ///
    /// * `program` - Executable name or path.
    /// * `args` - Arguments passed verbatim.
    /// * `cwd` - Working directory for the command (optional).
    /// * `timeout` - Maximum wall time before the process is killed.
    ///
    /// # Returns
    ///
    /// The command output including exit code, stdout, and stderr. A
    /// non-zero exit code is not an error; check [`CommandOutput::success`].
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::ShellCommandFailed` if the program cannot be
    /// started and `StorylineError::CommandTimeout` if it exceeds `timeout`.
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput>;

    /// Checks whether `program` can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool;
}
