//! Backend of the launcher.

pub mod catalog;
pub mod fetcher;
pub mod installer;
pub mod utils;

pub use fetcher::FetchOrchestrator;
pub use installer::Installer;
