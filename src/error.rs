//! Crate-wide error taxonomy.

use thiserror::Error;

/// Top-level error type each component's local errors convert into at a
/// task boundary (per-watcher, per-record).
#[derive(Error, Debug)]
pub enum LogwatchError {
    #[error("ssh authentication rejected: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timestamp parse error: {0}")]
    Parse(String),

    #[error("metadata store error: {0}")]
    Store(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for LogwatchError {
    fn from(e: std::io::Error) -> Self {
        LogwatchError::Io(e.to_string())
    }
}

impl From<tantivy::TantivyError> for LogwatchError {
    fn from(e: tantivy::TantivyError) -> Self {
        LogwatchError::Index(e.to_string())
    }
}

impl From<crate::store::StoreError> for LogwatchError {
    fn from(e: crate::store::StoreError) -> Self {
        LogwatchError::Store(e.to_string())
    }
}
