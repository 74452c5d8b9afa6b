//! Storage configuration

use crate::error::{StorageError, StorageResult};
use serde::Deserialize;
use std::path::Path;

/// Default number of slots reserved in a fresh map
pub const DEFAULT_CAPACITY: usize = 1024;

/// Configuration for a storage instance
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Name reported in log records and stats
    pub name: String,

    /// Initial capacity of the key map
    pub initial_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            name: "memory".to_string(),
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl StorageConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> StorageResult<Self> {
        let config: StorageConfig = serde_json::from_str(text)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.name.trim().is_empty() {
            return Err(StorageError::Config("name must not be empty".to_string()));
        }
        Ok(())
    }
}
