use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by document stores and the matching engine.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} with ID '{id}' already exists")]
    Conflict { kind: &'static str, id: String },

    #[error("{0}")]
    Invalid(String),

    #[error("no matching configurations found")]
    NoMatch,

    #[error("I/O error for {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{location} could not be parsed: {message}")]
    Corrupt { location: String, message: String },

    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_yaml::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
