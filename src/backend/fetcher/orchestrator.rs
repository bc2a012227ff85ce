//! Parallel fetch orchestrator.
//!
//! Runs all downloads and clones across two independently bounded pools and
//! consumes their completions through a single merged stream, so the shared
//! progress counter never races and the sink sees exactly one update per
//! finished task.

use anyhow::Result;
use futures_util::stream::{self, StreamExt};
use log::{info, warn};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::download::TRANSFER_TIMEOUT;
use super::models::{CloneTask, CommandSet, DownloadTask, TaskResult};
use super::progress::ProgressSink;
use super::{clone, download};

/// Concurrent transfer slots for the download pool.
pub const DOWNLOAD_WORKERS: usize = 10;
/// Concurrent slots for the clone pool.
pub const CLONE_WORKERS: usize = 6;

enum Completed {
    Download(TaskResult<DownloadTask>),
    Clone(TaskResult<CloneTask>),
}

/// Runs fetch tasks with bounded parallelism and aggregated progress.
pub struct FetchOrchestrator {
    client: Client,
    commands: Arc<CommandSet>,
    download_workers: usize,
    clone_workers: usize,
    cancel: CancellationToken,
}

impl FetchOrchestrator {
    pub fn new() -> Result<Self> {
        Self::with_commands(CommandSet::default())
    }

    pub fn with_commands(commands: CommandSet) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .read_timeout(TRANSFER_TIMEOUT)
            .user_agent(concat!("comfy-launcher/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            commands: Arc::new(commands),
            download_workers: DOWNLOAD_WORKERS,
            clone_workers: CLONE_WORKERS,
            cancel: CancellationToken::new(),
        })
    }

    /// Overrides the per-pool worker ceilings.
    pub fn with_worker_limits(mut self, download_workers: usize, clone_workers: usize) -> Self {
        self.download_workers = download_workers.max(1);
        self.clone_workers = clone_workers.max(1);
        self
    }

    /// External programs the workers shell out to.
    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Token that makes in-flight and queued tasks resolve as failed results.
    /// The run still drains to completion; nothing is dropped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every task to completion and returns one result per task.
    ///
    /// The sink, when supplied, is invoked exactly once per finished task
    /// with a monotonically non-decreasing percentage ending at 100. With no
    /// tasks at all the sink is never invoked.
    pub async fn run(
        &self,
        download_tasks: Vec<DownloadTask>,
        clone_tasks: Vec<CloneTask>,
        progress: Option<&dyn ProgressSink>,
    ) -> (Vec<TaskResult<DownloadTask>>, Vec<TaskResult<CloneTask>>) {
        let total = download_tasks.len() + clone_tasks.len();
        let mut download_results = Vec::with_capacity(download_tasks.len());
        let mut clone_results = Vec::with_capacity(clone_tasks.len());
        if total == 0 {
            return (download_results, clone_results);
        }

        info!(
            "Fetching {} downloads and {} clones",
            download_tasks.len(),
            clone_tasks.len()
        );

        let downloads = stream::iter(download_tasks.into_iter().map(|task| {
            let client = self.client.clone();
            let commands = self.commands.clone();
            let cancel = self.cancel.clone();
            async move {
                let fallback = task.clone();
                let worker = tokio::spawn(async move {
                    let (success, message) =
                        download::download_one(&client, &commands, &cancel, &task).await;
                    TaskResult::new(task, success, message)
                });
                Completed::Download(worker.await.unwrap_or_else(|err| {
                    let name = fallback.file_name();
                    TaskResult::failed(fallback, format!("Worker failed for {name}: {err}"))
                }))
            }
        }))
        .buffer_unordered(self.download_workers);

        let clones = stream::iter(clone_tasks.into_iter().map(|task| {
            let commands = self.commands.clone();
            let cancel = self.cancel.clone();
            async move {
                let fallback = task.clone();
                let worker = tokio::spawn(async move {
                    let (success, message) = clone::clone_one(&commands, &cancel, &task).await;
                    TaskResult::new(task, success, message)
                });
                Completed::Clone(worker.await.unwrap_or_else(|err| {
                    let name = fallback.name.clone();
                    TaskResult::failed(fallback, format!("Worker failed for {name}: {err}"))
                }))
            }
        }))
        .buffer_unordered(self.clone_workers);

        // Single consumer over both pools: result recorded, then counter
        // incremented, then the sink notified, for one task at a time.
        let completions = stream::select(downloads, clones);
        futures_util::pin_mut!(completions);

        let mut completed = 0usize;
        while let Some(done) = completions.next().await {
            let (kind, success, message) = match &done {
                Completed::Download(r) => ("Download", r.success, r.message.clone()),
                Completed::Clone(r) => ("Clone", r.success, r.message.clone()),
            };
            if success {
                info!("{kind}: {message}");
            } else {
                warn!("{kind}: {message}");
            }
            match done {
                Completed::Download(result) => download_results.push(result),
                Completed::Clone(result) => clone_results.push(result),
            }

            completed += 1;
            if let Some(sink) = progress {
                let percent = (completed * 100 / total) as u8;
                sink.update_with_message(percent, &message);
            }
        }

        (download_results, clone_results)
    }
}
