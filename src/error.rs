use std::io;

use thiserror::Error;

/// Failures of the durable storage backend. Always recoverable: the cache
/// keeps serving from memory.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("durable storage unavailable: {0}")]
    Unavailable(String),
    #[error("durable storage io error: {0}")]
    Io(#[from] io::Error),
}

/// Failures reported by the host while loading a media source or image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to load `{url}`: {reason}")]
    Failed { url: String, reason: String },
    #[error("unsupported media source `{0}`")]
    Unsupported(String),
}

impl LoadError {
    pub fn failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown effective connection type `{0}`")]
pub struct NetworkHintError(pub String);
