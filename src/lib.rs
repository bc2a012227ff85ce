//! Provisioning backend for a local ComfyUI installation.

pub mod backend;
