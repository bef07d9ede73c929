//! External command invocation

use std::process::Command;

use tracing::debug;

use crate::error::{NfsError, Result};

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; -1 when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout and stderr joined with `:`, for error reports.
    pub fn combined(&self) -> String {
        format!("{}:{}", self.stdout, self.stderr)
    }
}

/// Runs external commands and captures their result.
///
/// A non-zero exit is not an error at this level; callers inspect
/// `exit_code` themselves. Only failing to start the process is.
pub trait CommandRunner: Send + Sync {
    fn invoke(&self, argv: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as child processes, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn invoke(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| NfsError::Config {
            reason: "empty command line".to_string(),
        })?;

        debug!(command = ?argv, "running command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| NfsError::Spawn {
                command: program.clone(),
                source,
            })?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = ?argv, exit_code = result.exit_code, "command finished");
        Ok(result)
    }
}
