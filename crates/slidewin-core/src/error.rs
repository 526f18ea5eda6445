//! Error types for slidewin-core.

use thiserror::Error;

/// Error type for slidewin-core operations.
///
/// Processing never fails: invalid parameters are clamped at the setter.
/// Errors only come out of configuration validation and state restore.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unsupported state version: {0}")]
    UnsupportedVersion(u32),

    #[error("State size mismatch for {field}: expected {expected}, found {found}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Window size {size} rejected by {op}")]
    RejectedWindowSize { op: &'static str, size: usize },

    #[error("Corrupt state: {0}")]
    CorruptState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
