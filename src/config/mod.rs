// src/config/mod.rs

//! Configuration loading and validation for pullsync.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and layer env overrides on top (`loader.rs`).
//! - Validate basic invariants and produce the immutable [`SyncConfig`]
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{apply_env_overrides, load, load_and_validate, load_from_path};
pub use model::{
    HealthSection, LocalSection, RawSyncConfig, RemoteSection, SyncConfig, SyncSection,
    TimeoutSection,
};
