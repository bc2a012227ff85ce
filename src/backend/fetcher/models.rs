use std::path::PathBuf;

/// A single file to download.
///
/// `token` is only populated for URLs on the token-gated host; everything
/// else goes straight to the fallback fetcher.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub url: String,
    pub dest_path: PathBuf,
    pub token: Option<String>,
    pub name: String,
}

impl DownloadTask {
    /// File name used in user-facing status messages.
    pub fn file_name(&self) -> String {
        self.dest_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// A single repository to clone.
///
/// The clone command runs with `dest_dir` as its working directory and
/// creates `dest_dir/<name>`.
#[derive(Debug, Clone)]
pub struct CloneTask {
    pub url: String,
    pub dest_dir: PathBuf,
    pub name: String,
}

/// Outcome of one fetch task. Produced exactly once per submitted task.
#[derive(Debug, Clone)]
pub struct TaskResult<T> {
    pub task: T,
    pub success: bool,
    pub message: String,
}

impl<T> TaskResult<T> {
    pub fn new(task: T, success: bool, message: String) -> Self {
        Self {
            task,
            success,
            message,
        }
    }

    pub fn failed(task: T, message: String) -> Self {
        Self::new(task, false, message)
    }
}

/// External programs the workers shell out to.
///
/// Overridable so tests can substitute stub scripts for the real tools.
#[derive(Debug, Clone)]
pub struct CommandSet {
    /// Unauthenticated fallback fetcher, invoked as `<fetcher> -O <dest> <url>`.
    pub fetcher: String,
    /// Version-control tool, invoked as `<git> clone <url>`.
    pub git: String,
    /// Interpreter used to create the virtual environment.
    pub python: String,
    /// The venv's pip. A relative path is resolved against the application
    /// root; workers running deeper in the tree adjust for their own cwd.
    pub pip: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            fetcher: "wget".into(),
            git: "git".into(),
            python: "python3".into(),
            pip: "venv/bin/pip".into(),
        }
    }
}
