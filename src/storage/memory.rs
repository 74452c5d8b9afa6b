//! In-memory storage backend

use super::change::{ChangeEvent, ChangeRecord};
use super::entry::Entry;
use super::observer::{Observer, ObserverSet};
use super::{ItemMap, Storage};
use crate::config::StorageConfig;
use crate::dispatch::{Completion, Dispatcher};
use crate::error::StorageResult;
use serde_json::Value;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Type alias for our hash map with SipHasher
type StoreMap = HashMap<String, Entry, BuildHasherDefault<SipHasher13>>;

/// In-memory storage backend
///
/// Keeps every value as serialized JSON text, exactly like a persistent backend
/// would, and decodes it again on each read. Nothing survives the process.
pub struct MemoryStorage {
    /// Instance name, for logs and stats
    name: String,

    /// The main storage map
    store: Mutex<StoreMap>,

    /// Registered change observers
    observers: ObserverSet,

    /// Deferred delivery of completions and change events
    dispatcher: Dispatcher,
}

impl MemoryStorage {
    /// Create a storage with the default configuration
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> StorageResult<Self> {
        Self::with_config(StorageConfig::default())
    }

    /// Create a storage from an explicit configuration
    pub fn with_config(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::spawn(&config.name)?;

        info!(
            storage = %config.name,
            capacity = config.initial_capacity,
            "Memory storage created"
        );

        Ok(MemoryStorage {
            store: Mutex::new(HashMap::with_capacity_and_hasher(
                config.initial_capacity,
                BuildHasherDefault::<SipHasher13>::default(),
            )),
            name: config.name,
            observers: ObserverSet::new(),
            dispatcher,
        })
    }

    fn lock_store(&self) -> MutexGuard<'_, StoreMap> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue delivery of `event` to the observers registered at delivery time
    fn emit(&self, event: ChangeEvent) {
        if event.is_empty() {
            return;
        }
        let observers = self.observers.clone();
        self.dispatcher.defer(move || observers.notify(&event));
    }

    /// Store text verbatim, bypassing serialization and notification
    ///
    /// Models content written by something other than this storage, such as a
    /// foreign writer sharing a persistent medium.
    pub fn insert_raw(&self, key: impl Into<String>, raw: impl Into<String>) {
        self.lock_store().insert(key.into(), Entry::from_raw(raw));
    }

    /// The stored text for `key`, if any
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.lock_store().get(key).map(|entry| entry.raw().to_string())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_store().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock_store().contains_key(key)
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock_store().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Approximate memory usage of stored data in bytes
    pub fn memory_usage(&self) -> usize {
        self.lock_store()
            .iter()
            .map(|(key, entry)| key.len() + entry.memory_usage())
            .sum()
    }

    /// Get statistics about the storage
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            name: self.name.clone(),
            keys: self.len(),
            observers: self.observers.len(),
            used_memory_bytes: self.memory_usage(),
        }
    }
}

impl Storage for MemoryStorage {
    fn add_observer(&self, observer: Observer) {
        self.observers.add(observer);
        debug!(storage = %self.name, observers = self.observers.len(), "Observer added");
    }

    fn remove_observer(&self, observer: &Observer) {
        if self.observers.remove(observer) {
            debug!(storage = %self.name, observers = self.observers.len(), "Observer removed");
        }
    }

    fn clear(&self) -> Completion<()> {
        let drained: Vec<(String, Entry)> = self.lock_store().drain().collect();
        debug!(storage = %self.name, keys = drained.len(), "clear");

        let event = drained
            .into_iter()
            .map(|(key, entry)| (key, ChangeRecord::new(Some(entry.decode()), None)))
            .collect();
        self.emit(event);

        self.dispatcher.complete(())
    }

    fn get_item(&self, key: &str) -> Completion<Option<Value>> {
        let value = self.lock_store().get(key).map(Entry::decode);
        debug!(storage = %self.name, key, found = value.is_some(), "get_item");

        self.dispatcher.complete(value)
    }

    fn get_items(&self, keys: Option<&mut Vec<String>>) -> Completion<ItemMap> {
        let store = self.lock_store();
        let items: ItemMap = match keys {
            Some(keys) => {
                keys.retain(|key| store.contains_key(key));
                keys.iter()
                    .filter_map(|key| store.get(key).map(|entry| (key.clone(), entry.decode())))
                    .collect()
            }
            None => store
                .iter()
                .map(|(key, entry)| (key.clone(), entry.decode()))
                .collect(),
        };
        drop(store);
        debug!(storage = %self.name, found = items.len(), "get_items");

        self.dispatcher.complete(items)
    }

    fn set_item(&self, key: &str, value: Value) -> Completion<()> {
        let previous = self
            .lock_store()
            .insert(key.to_string(), Entry::encode(&value));
        debug!(storage = %self.name, key, replaced = previous.is_some(), "set_item");

        let mut event = ChangeEvent::new();
        event.insert(
            key,
            ChangeRecord::new(previous.as_ref().map(Entry::decode), Some(value)),
        );
        self.emit(event);

        self.dispatcher.complete(())
    }

    fn set_items(&self, items: ItemMap) -> Completion<()> {
        let mut event = ChangeEvent::new();
        {
            let mut store = self.lock_store();
            for (key, value) in items {
                let previous = store.insert(key.clone(), Entry::encode(&value));
                event.insert(
                    key,
                    ChangeRecord::new(previous.as_ref().map(Entry::decode), Some(value)),
                );
            }
        }
        debug!(storage = %self.name, keys = event.len(), "set_items");
        self.emit(event);

        self.dispatcher.complete(())
    }

    fn remove_item(&self, key: &str) -> Completion<()> {
        let removed = self.lock_store().remove(key).is_some();
        debug!(storage = %self.name, key, removed, "remove_item");

        self.dispatcher.complete(())
    }

    fn remove_items(&self, keys: &[String]) -> Completion<()> {
        let removed = {
            let mut store = self.lock_store();
            keys.iter().filter(|key| store.remove(key.as_str()).is_some()).count()
        };
        debug!(storage = %self.name, requested = keys.len(), removed, "remove_items");

        self.dispatcher.complete(())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("name", &self.name)
            .field("keys", &self.len())
            .field("observers", &self.observers)
            .finish()
    }
}

/// Statistics about a memory storage
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    pub name: String,
    pub keys: usize,
    pub observers: usize,
    pub used_memory_bytes: usize,
}
