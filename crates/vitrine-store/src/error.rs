//! Error types for durable stores.

use std::path::PathBuf;

/// Errors that can occur when talking to a durable backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend cannot be reached.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be encoded or decoded.
    #[error("serialization error in {path}: {reason}")]
    Serialization { path: PathBuf, reason: String },

    /// A key pattern could not be compiled.
    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A timeout occurred while waiting for the backend.
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl StoreError {
    /// Creates a new unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Serialization {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}
