//! Clone worker.
//!
//! Clones one repository and, when the fresh clone carries a dependency
//! manifest, installs it with the venv's pip. The clone alone decides
//! success: a failed install only changes the message.

use anyhow::{Result, bail};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::models::{CloneTask, CommandSet};
use crate::backend::utils::{ensure_directory, run_command, stderr_text};

pub(crate) const CLONE_TIMEOUT: Duration = Duration::from_secs(300);
pub(crate) const INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Dependency manifest probed for at the root of a fresh clone.
const MANIFEST: &str = "requirements.txt";

/// The venv's pip as invoked from inside a fresh clone, which sits two
/// levels below the application root.
fn pip_program(commands: &CommandSet) -> String {
    if Path::new(&commands.pip).is_absolute() {
        commands.pip.clone()
    } else {
        format!("../../{}", commands.pip)
    }
}

/// Clones one repository, converting every failure into a result message.
pub async fn clone_one(
    commands: &CommandSet,
    cancel: &CancellationToken,
    task: &CloneTask,
) -> (bool, String) {
    match try_clone(commands, cancel, task).await {
        Ok(outcome) => outcome,
        Err(err) => (false, format!("Clone error for {}: {err}", task.name)),
    }
}

async fn try_clone(
    commands: &CommandSet,
    cancel: &CancellationToken,
    task: &CloneTask,
) -> Result<(bool, String)> {
    if cancel.is_cancelled() {
        bail!("cancelled");
    }

    ensure_directory(&task.dest_dir).await?;

    let output = run_command(
        &commands.git,
        &["clone", task.url.as_str()],
        Some(&task.dest_dir),
        CLONE_TIMEOUT,
    )
    .await?;
    if cancel.is_cancelled() {
        bail!("cancelled");
    }
    if !output.status.success() {
        return Ok((
            false,
            format!("Git clone failed for {}: {}", task.name, stderr_text(&output)),
        ));
    }

    let repo_dir = task.dest_dir.join(&task.name);
    if !repo_dir.join(MANIFEST).exists() {
        return Ok((true, format!("Cloned: {}", task.name)));
    }

    // Install failure (or timeout) never downgrades the clone itself.
    let installed = run_command(
        &pip_program(commands),
        &["install", "-r", MANIFEST],
        Some(&repo_dir),
        INSTALL_TIMEOUT,
    )
    .await;
    Ok(match installed {
        Ok(out) if out.status.success() => (true, format!("Cloned and installed: {}", task.name)),
        _ => (true, format!("Cloned (pip install failed): {}", task.name)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn task(dest_dir: &Path) -> CloneTask {
        CloneTask {
            url: "https://github.com/example/demo-node.git".into(),
            dest_dir: dest_dir.to_path_buf(),
            name: "demo-node".into(),
        }
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Stub git that creates the repository directory like a real clone.
    fn stub_git(dir: &Path, with_manifest: bool) -> String {
        let body = if with_manifest {
            "d=$(basename \"$2\" .git); mkdir -p \"$d\"; touch \"$d\"/requirements.txt"
        } else {
            "mkdir -p \"$(basename \"$2\" .git)\""
        };
        write_script(dir, "git", body)
    }

    /// Stub pip that appends each invocation to a log file.
    fn stub_pip(dir: &Path, log: &Path, exit: u8) -> String {
        let body = format!("printf '%s\\n' \"$*\" >> \"{}\"; exit {exit}", log.display());
        write_script(dir, "pip", &body)
    }

    #[tokio::test]
    async fn clone_without_manifest_skips_install() {
        let tools = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let pip_log = tools.path().join("pip.log");
        let commands = CommandSet {
            git: stub_git(tools.path(), false),
            pip: stub_pip(tools.path(), &pip_log, 0),
            ..CommandSet::default()
        };

        let (success, message) =
            clone_one(&commands, &CancellationToken::new(), &task(dest.path())).await;
        assert!(success);
        assert_eq!(message, "Cloned: demo-node");
        assert!(!pip_log.exists(), "pip must not run without a manifest");
    }

    #[tokio::test]
    async fn clone_with_manifest_installs_once() {
        let tools = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let pip_log = tools.path().join("pip.log");
        let commands = CommandSet {
            git: stub_git(tools.path(), true),
            pip: stub_pip(tools.path(), &pip_log, 0),
            ..CommandSet::default()
        };

        let (success, message) =
            clone_one(&commands, &CancellationToken::new(), &task(dest.path())).await;
        assert!(success);
        assert_eq!(message, "Cloned and installed: demo-node");
        let log = std::fs::read_to_string(&pip_log).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert_eq!(log.trim(), "install -r requirements.txt");
    }

    #[tokio::test]
    async fn install_failure_keeps_clone_success() {
        let tools = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let pip_log = tools.path().join("pip.log");
        let commands = CommandSet {
            git: stub_git(tools.path(), true),
            pip: stub_pip(tools.path(), &pip_log, 1),
            ..CommandSet::default()
        };

        let (success, message) =
            clone_one(&commands, &CancellationToken::new(), &task(dest.path())).await;
        assert!(success);
        assert_eq!(message, "Cloned (pip install failed): demo-node");
    }

    #[tokio::test]
    async fn clone_failure_reports_stderr() {
        let tools = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let commands = CommandSet {
            git: write_script(tools.path(), "git", "echo 'fatal: repository not found' >&2; exit 128"),
            ..CommandSet::default()
        };

        let (success, message) =
            clone_one(&commands, &CancellationToken::new(), &task(dest.path())).await;
        assert!(!success);
        assert_eq!(
            message,
            "Git clone failed for demo-node: fatal: repository not found"
        );
    }

    #[tokio::test]
    async fn creates_destination_directory() {
        let tools = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("custom_nodes");
        let commands = CommandSet {
            git: stub_git(tools.path(), false),
            ..CommandSet::default()
        };

        let (success, _) = clone_one(
            &commands,
            &CancellationToken::new(),
            &CloneTask {
                url: "https://github.com/example/demo-node.git".into(),
                dest_dir: dest.clone(),
                name: "demo-node".into(),
            },
        )
        .await;
        assert!(success);
        assert!(dest.join("demo-node").is_dir());
    }

    #[tokio::test]
    async fn cancellation_during_clone_fails_the_task() {
        let tools = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let commands = CommandSet {
            git: write_script(
                tools.path(),
                "git",
                "sleep 0.3; mkdir -p \"$(basename \"$2\" .git)\"",
            ),
            ..CommandSet::default()
        };

        let cancel = CancellationToken::new();
        let task = task(dest.path());
        let clone = clone_one(&commands, &cancel, &task);
        let trigger = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        };
        let ((success, message), ()) = tokio::join!(clone, trigger);
        assert!(!success);
        assert_eq!(message, "Clone error for demo-node: cancelled");
    }
}
