// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only startup concerns (config, logging, binding the health listener)
//! surface as `Err`. Everything that talks to the remote host reports
//! failure as a value instead; see [`crate::exec::CommandResult`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PullsyncError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PullsyncError>;
