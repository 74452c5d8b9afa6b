//! Storage contract
//!
//! Defines the operations every backend provides and the shape of the change
//! notifications they emit. Backends differ only in where values live; callers
//! see the same behavior from each of them:
//! - mutations apply to the backend state when the method is called
//! - results and observer notifications are delivered on a later turn
//! - one change event per `clear`, `set_item` or `set_items` call, none for removals
//! - reads never fail: unparseable stored text comes back as a raw string

mod change;
mod entry;
mod memory;
mod observer;

pub use change::{ChangeEvent, ChangeRecord};
pub use entry::Entry;
pub use memory::{MemoryStorage, StorageStats};
pub use observer::{Observer, ObserverFn, ObserverSet};

use crate::dispatch::Completion;
use crate::error::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;

/// Key to value mapping used by the batched operations
pub type ItemMap = BTreeMap<String, Value>;

/// Asynchronous key/value storage with change notification
///
/// Every operation returns a [`Completion`]. Awaiting it waits for the deferred
/// delivery turn; dropping it is the same as passing no callback. The operation
/// itself has already taken effect when the method returns.
pub trait Storage: Send + Sync {
    /// Register an observer for every future change event
    ///
    /// Registering the same observer twice delivers each event to it twice.
    fn add_observer(&self, observer: Observer);

    /// Remove the first registration of `observer`, if any
    fn remove_observer(&self, observer: &Observer);

    /// Remove every key
    ///
    /// Emits one event with a deletion record for each key that was present.
    fn clear(&self) -> Completion<()>;

    /// Look up a single key
    fn get_item(&self, key: &str) -> Completion<Option<Value>>;

    /// Look up several keys at once
    ///
    /// `None` reads every key currently stored. When a key list is given, keys that
    /// are not stored are left out of the result and also removed from the list
    /// itself, so afterwards it names exactly the keys that were found.
    fn get_items(&self, keys: Option<&mut Vec<String>>) -> Completion<ItemMap>;

    /// Store a value, emitting a single-key change event
    fn set_item(&self, key: &str, value: Value) -> Completion<()>;

    /// Store several values, emitting one change event covering all of them
    fn set_items(&self, items: ItemMap) -> Completion<()>;

    /// Delete a key
    ///
    /// Removals do not notify observers.
    fn remove_item(&self, key: &str) -> Completion<()>;

    /// Delete several keys, without notifying observers
    fn remove_items(&self, keys: &[String]) -> Completion<()>;
}

/// Typed access on top of any [`Storage`]
pub trait StorageExt: Storage {
    /// Serialize `value` and store it under `key`
    ///
    /// Fails before touching the storage when `value` has no JSON representation.
    fn set_value<T>(&self, key: &str, value: &T) -> StorageResult<Completion<()>>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        Ok(self.set_item(key, value))
    }

    /// Read `key` and deserialize it as `T`
    fn get_value<T>(&self, key: &str) -> impl Future<Output = StorageResult<Option<T>>> + Send
    where
        T: DeserializeOwned,
    {
        let pending = self.get_item(key);
        let key = key.to_string();
        async move {
            match pending.await {
                Some(value) => serde_json::from_value(value)
                    .map(Some)
                    .map_err(|source| StorageError::Deserialize { key, source }),
                None => Ok(None),
            }
        }
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}
