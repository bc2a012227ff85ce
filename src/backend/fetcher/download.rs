//! Download worker.
//!
//! Prefers an authenticated streaming transfer for token-gated URLs and
//! falls back to the external fetcher on any failure. Never propagates an
//! error past this boundary: every outcome becomes a `(success, message)`
//! pair.

use anyhow::{Result, bail};
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::models::{CommandSet, DownloadTask};
use crate::backend::utils::{ensure_parent_directory, run_command, stderr_text};

/// Wall-clock limit for a single transfer, authenticated or fallback.
pub(crate) const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetches one file, trying the authenticated path first when a token applies.
pub async fn download_one(
    client: &Client,
    commands: &CommandSet,
    cancel: &CancellationToken,
    task: &DownloadTask,
) -> (bool, String) {
    let file = task.file_name();

    if cancel.is_cancelled() {
        return (false, format!("Cancelled: {file}"));
    }

    if let Err(err) = ensure_parent_directory(&task.dest_path).await {
        return (false, format!("Download failed for {file}: {err}"));
    }

    if let Some(token) = &task.token {
        match stream_authenticated(client, cancel, task, token).await {
            Ok(()) => return (true, format!("Downloaded: {file}")),
            Err(err) => {
                // A rejected token degrades to an anonymous download, which
                // may well fail again. Call it out so the user can tell a bad
                // token apart from a flaky network.
                if is_auth_rejection(&err) {
                    warn!("Token rejected for {}: {err}", task.url);
                } else {
                    warn!("Authenticated download failed for {}: {err}", task.url);
                }
            }
        }
        if cancel.is_cancelled() {
            return (false, format!("Cancelled: {file}"));
        }
    }

    let dest = task.dest_path.display().to_string();
    match run_command(
        &commands.fetcher,
        &["-O", dest.as_str(), task.url.as_str()],
        None,
        TRANSFER_TIMEOUT,
    )
    .await
    {
        Ok(output) if output.status.success() => (true, format!("Downloaded (wget): {file}")),
        Ok(output) => (
            false,
            format!("wget failed for {file}: {}", stderr_text(&output)),
        ),
        Err(err) => (false, format!("Download failed for {file}: {err}")),
    }
}

/// Streams the response body to disk under a bearer token.
async fn stream_authenticated(
    client: &Client,
    cancel: &CancellationToken,
    task: &DownloadTask,
    token: &str,
) -> Result<()> {
    let response = client.get(&task.url).bearer_auth(token).send().await?;
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        bail!("authorization rejected (HTTP {status})");
    }
    if !status.is_success() {
        bail!("HTTP {status}");
    }

    debug!("Streaming {} to {:?}", task.url, task.dest_path);

    let mut file = File::create(&task.dest_path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            bail!("cancelled mid-transfer");
        }
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

fn is_auth_rejection(err: &anyhow::Error) -> bool {
    err.to_string().contains("authorization rejected")
}
