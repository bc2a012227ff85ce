//! Parallel fetching of model artifacts and custom-node repositories.
//!
//! Downloads and clones run concurrently across two independently bounded
//! pools; every submitted task produces exactly one result and one progress
//! update, and no worker failure ever aborts the batch.

pub mod clone;
pub mod download;
/// Data models for fetch tasks and their results.
pub mod models;
pub mod orchestrator;
pub mod progress;

pub use models::{CloneTask, CommandSet, DownloadTask, TaskResult};
pub use orchestrator::FetchOrchestrator;
pub use progress::ProgressSink;
