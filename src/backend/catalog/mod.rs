//! Download library and task-list construction.
//!
//! Flattens the catalog plus the user's selection snapshot into the fetch
//! task lists the orchestrator consumes. Entries with unresolvable URLs or
//! filenames are dropped silently; `required` entries are always included.

pub mod defaults;
/// Data models for the catalog and selection snapshot.
pub mod models;

pub use models::{CUSTOM_NODES_CATEGORY, Catalog, CatalogEntry, Category, RepoEntry, Selection};

use std::path::Path;

use crate::backend::fetcher::{CloneTask, DownloadTask};

/// Host whose downloads accept a bearer token for authenticated transfers.
pub const TOKEN_GATED_HOST: &str = "civitai.com";

fn is_token_gated(url: &str) -> bool {
    url.contains(TOKEN_GATED_HOST)
}

/// Last path segment of the URL with any query string stripped.
fn filename_from_url(url: &str) -> Option<String> {
    let segment = url.split('/').next_back()?.split('?').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

fn resolve_filename(entry: &CatalogEntry, url: &str) -> Option<String> {
    entry
        .filename
        .clone()
        .filter(|f| !f.is_empty())
        .or_else(|| filename_from_url(url))
}

/// Builds the download task list for every required or selected entry.
///
/// `app_dir` is the application root the catalog's destination directories
/// are relative to. The token is attached only to token-gated URLs.
pub fn build_download_tasks(
    catalog: &Catalog,
    selection: &Selection,
    app_dir: &Path,
    token: Option<&str>,
) -> Vec<DownloadTask> {
    let mut tasks = Vec::new();
    for category in &catalog.categories {
        for (index, entry) in category.entries.iter().enumerate() {
            if !entry.required && !selection.is_enabled(&category.id, index) {
                continue;
            }
            let Some(url) = entry.resolved_url() else {
                continue;
            };
            let Some(filename) = resolve_filename(entry, url) else {
                continue;
            };
            let dest_dir = entry
                .dest_dir
                .clone()
                .unwrap_or_else(|| format!("models/{}", category.id));
            tasks.push(DownloadTask {
                url: url.to_string(),
                dest_path: app_dir.join(dest_dir).join(filename),
                token: token.filter(|_| is_token_gated(url)).map(String::from),
                name: entry.name.clone(),
            });
        }
    }
    tasks
}

/// Builds the clone task list for every required or selected custom node.
pub fn build_clone_tasks(catalog: &Catalog, selection: &Selection, app_dir: &Path) -> Vec<CloneTask> {
    let dest_dir = app_dir.join("custom_nodes");
    catalog
        .custom_nodes
        .iter()
        .enumerate()
        .filter(|(index, node)| {
            node.required || selection.is_enabled(CUSTOM_NODES_CATEGORY, *index)
        })
        .map(|(_, node)| CloneTask {
            url: node.url.clone(),
            dest_dir: dest_dir.clone(),
            name: node.name.clone(),
        })
        .collect()
}
