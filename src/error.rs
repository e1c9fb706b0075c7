// ABOUTME: Application-wide error types for sandcastle.
// ABOUTME: Wraps config, runtime detection, and sandbox lifecycle failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("environment variable {var} (for sandbox variable {key}) is not set")]
    MissingEnvVar { key: String, var: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid owner key: {0}")]
    OwnerKey(#[from] crate::types::OwnerKeyError),

    #[error(transparent)]
    Runtime(#[from] crate::runtime::RuntimeError),

    #[error(transparent)]
    Sandbox(#[from] crate::sandbox::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
