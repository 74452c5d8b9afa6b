//! ferrum-storage - An asynchronous key/value storage contract with change notification
//!
//! Modules:
//! - `storage` defines the backend contract and the in-memory backend
//! - `dispatch` delivers completions and change events on a later turn
//! - `config` and `error` carry the ambient configuration and error types

pub mod config;
pub mod dispatch;
pub mod error;
pub mod storage;

/// Re-export commonly used types
pub use config::StorageConfig;
pub use dispatch::Completion;
pub use error::{StorageError, StorageResult};
pub use storage::{
    ChangeEvent, ChangeRecord, ItemMap, MemoryStorage, Observer, Storage, StorageExt,
};
