//! One-shot command execution for the upload/maintenance panel.
//!
//! The command line is tokenized with shell quoting rules and run without a
//! shell, with captured output and a hard timeout.

use crate::errors::ApiError;
use serde::Serialize;
use std::time::Duration;
use tokio::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Serialize)]
pub struct ExecOutcome {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` with a timeout, capturing both output streams.
///
/// Tokenization follows shell quoting rules but no shell is involved, so
/// pipes and redirection are not available. A command that outlives the
/// timeout is killed and reported as an error.
pub async fn run_command(command: &str, timeout: Duration) -> Result<ExecOutcome, ApiError> {
    let tokens = shell_words::split(command)
        .map_err(|err| ApiError::InvalidInput(format!("Unable to parse command: {}", err)))?;
    let Some((program, args)) = tokens.split_first() else {
        return Err(ApiError::InvalidInput("Empty command".to_string()));
    };

    let child = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| ApiError::InvalidInput(format!("Unable to start command: {}", err)))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            ApiError::InvalidInput(format!(
                "Command timed out after {} seconds",
                timeout.as_secs()
            ))
        })?
        .map_err(|err| ApiError::InvalidInput(format!("Command failed: {}", err)))?;

    Ok(ExecOutcome {
        returncode: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
