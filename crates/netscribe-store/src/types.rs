//! Storage trait and change notifications.

use netscribe_core::Result;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the change-notification channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A single write observed by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StorageChange {
    /// A scalar value was written.
    Value {
        key: String,
        #[serde(rename = "oldValue")]
        old_value: Option<Value>,
        #[serde(rename = "newValue")]
        new_value: Option<Value>,
    },
    /// An entry was appended to a collection.
    Appended { key: String, total: usize },
    /// A collection was reset to empty.
    Cleared { key: String },
}

impl StorageChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Value { key, .. } | Self::Appended { key, .. } | Self::Cleared { key } => key,
        }
    }
}

/// Extension-local key/value storage shared by all contexts.
///
/// Collections are append-only from the writer's point of view: `append`
/// is atomic, so two contexts appending concurrently never lose an entry.
pub trait Storage: Send + Sync {
    /// Read a scalar value.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a scalar value and notify subscribers.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Atomically append an entry to a collection. Returns the new length.
    fn append(&self, key: &str, entry: Value) -> Result<usize>;

    /// All entries of a collection in append order.
    fn entries(&self, key: &str) -> Result<Vec<Value>>;

    /// Number of entries in a collection.
    fn count(&self, key: &str) -> Result<usize> {
        Ok(self.entries(key)?.len())
    }

    /// Reset a collection to empty.
    fn clear_collection(&self, key: &str) -> Result<()>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    /// Read a text value, treating absence as empty.
    fn get_string(&self, key: &str) -> Result<String> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    /// Read a boolean value, treating absence as `false`.
    fn get_bool(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.and_then(|v| v.as_bool()).unwrap_or(false))
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
