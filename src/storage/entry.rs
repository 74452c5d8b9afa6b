//! Stored entry representation

use serde_json::Value;
use tracing::trace;

/// A single stored value, kept in serialized form
///
/// Values are encoded to canonical JSON text on write and decoded on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    raw: String,
}

impl Entry {
    /// Serialize a value into a new entry
    pub fn encode(value: &Value) -> Self {
        Entry {
            raw: value.to_string(),
        }
    }

    /// Wrap already-serialized text without checking it
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Entry { raw: raw.into() }
    }

    /// The stored text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parse the stored text
    pub fn try_decode(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.raw)
    }

    /// Parse the stored text, falling back to the text itself when it is not JSON
    pub fn decode(&self) -> Value {
        match self.try_decode() {
            Ok(value) => value,
            Err(e) => {
                trace!(error = %e, "Stored text is not JSON, returning it raw");
                Value::String(self.raw.clone())
            }
        }
    }

    /// Approximate memory usage of this entry in bytes
    pub fn memory_usage(&self) -> usize {
        self.raw.capacity() + std::mem::size_of::<String>()
    }
}
