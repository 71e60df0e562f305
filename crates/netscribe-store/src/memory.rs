//! In-memory storage with the same contract as [`SqliteStore`](crate::SqliteStore).

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::keys;
use crate::types::{Storage, StorageChange, CHANGE_CHANNEL_CAPACITY};
use netscribe_core::{Error, Result};

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    collections: HashMap<String, Vec<Value>>,
}

/// Ephemeral store; a single lock makes every operation atomic.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.lock().values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        if keys::is_collection(key) {
            return Err(Error::Storage(format!("{} is a collection", key)));
        }
        let mut inner = self.inner.lock();
        let old_value = inner.values.insert(key.to_string(), value.clone());
        // Sent under the lock so notifications follow write order.
        let _ = self.changes.send(StorageChange::Value {
            key: key.to_string(),
            old_value,
            new_value: Some(value),
        });
        Ok(())
    }

    fn append(&self, key: &str, entry: Value) -> Result<usize> {
        let mut inner = self.inner.lock();
        let list = inner.collections.entry(key.to_string()).or_default();
        list.push(entry);
        let total = list.len();
        let _ = self.changes.send(StorageChange::Appended {
            key: key.to_string(),
            total,
        });
        Ok(total)
    }

    fn entries(&self, key: &str) -> Result<Vec<Value>> {
        Ok(self
            .inner
            .lock()
            .collections
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    fn count(&self, key: &str) -> Result<usize> {
        Ok(self.inner.lock().collections.get(key).map_or(0, Vec::len))
    }

    fn clear_collection(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.collections.remove(key);
        let _ = self.changes.send(StorageChange::Cleared {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
