//! Shared utilities for the backend.

pub mod command;
pub mod files;

pub use command::{run_command, stderr_text};
pub use files::{ensure_directory, ensure_parent_directory};
