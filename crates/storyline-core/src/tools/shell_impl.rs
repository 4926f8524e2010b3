//! Standard shell adapter implementation.
//!
//! Commands run on a throwaway current-thread tokio runtime so the caller
//! stays synchronous while the child gets a real timeout.

use crate::error::{Result, StorylineError};
use crate::tools::shell::{CommandOutput, ShellAdapter};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Standard shell adapter using `tokio::process::Command`.
#[derive(Debug, Default)]
pub struct StdShellAdapter;

impl StdShellAdapter {
    /// Creates a new standard shell adapter.
    pub fn new() -> Self {
        Self
    }

    async fn execute(
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| {
            StorylineError::ShellCommandFailed(format!("failed to execute {program}: {e}"))
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| StorylineError::CommandTimeout(timeout.as_secs()))?
            .map_err(|e| StorylineError::ShellCommandFailed(format!("{program}: {e}")))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

impl ShellAdapter for StdShellAdapter {
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(Self::execute(program, args, cwd, timeout))
    }

    fn is_available(&self, program: &str) -> bool {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return candidate.is_file();
        }

        std::env::var_os("PATH").is_some_and(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let full = dir.join(program);
                full.is_file() || (cfg!(windows) && full.with_extension("exe").is_file())
            })
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_simple_command() {
        let adapter = StdShellAdapter::new();
        let output = adapter
            .run("echo", &["hello".to_string()], None, Duration::from_secs(10))
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_with_cwd() {
        let adapter = StdShellAdapter::new();
        let output = adapter
            .run("pwd", &[], Some(Path::new("/tmp")), Duration::from_secs(10))
            .unwrap();

        assert!(output.success());
        assert!(output.stdout.trim().contains("tmp"));
    }

    #[test]
    fn test_run_failing_command() {
        let adapter = StdShellAdapter::new();
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        let output = adapter
            .run("sh", &args, None, Duration::from_secs(10))
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
    }

    #[test]
    fn test_run_missing_program() {
        let adapter = StdShellAdapter::new();
        let result = adapter.run(
            "storyline-definitely-not-installed",
            &[],
            None,
            Duration::from_secs(10),
        );
        assert!(matches!(
            result.unwrap_err(),
            StorylineError::ShellCommandFailed(_)
        ));
    }

    #[test]
    fn test_run_times_out() {
        let adapter = StdShellAdapter::new();
        let result = adapter.run(
            "sleep",
            &["5".to_string()],
            None,
            Duration::from_millis(100),
        );
        assert!(matches!(result.unwrap_err(), StorylineError::CommandTimeout(_)));
    }

    #[test]
    fn test_is_available() {
        let adapter = StdShellAdapter::new();
        assert!(adapter.is_available("sh"));
        assert!(!adapter.is_available("storyline-definitely-not-installed"));
    }
}
