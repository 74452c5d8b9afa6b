//! Error types
//!
//! Storage operations themselves never fail: malformed content degrades to the raw
//! stored text and missing keys are `None`. Errors only come from typed access,
//! configuration and construction.

use thiserror::Error;

/// Errors surfaced by the storage crate
#[derive(Error, Debug)]
pub enum StorageError {
    /// A typed value could not be represented as JSON
    #[error("cannot serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored value did not match the requested type
    #[error("cannot deserialize value for key '{key}': {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Backends schedule deferred work on tokio and need a runtime to exist
    #[error("no tokio runtime available to schedule deferred delivery")]
    NoRuntime,
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
