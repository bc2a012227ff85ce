//! Timeout-bounded execution of external commands.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Runs an external command with a wall-clock timeout, capturing its output.
///
/// The child process is killed if the timeout elapses before it exits.
pub async fn run_command(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<Output> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.kill_on_drop(true);

    debug!("Running: {program} {}", args.join(" "));

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .with_context(|| format!("{program} timed out after {}s", timeout.as_secs()))?
        .with_context(|| format!("failed to run {program}"))?;
    Ok(output)
}

/// Trimmed stderr of a finished command, for diagnostics.
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
