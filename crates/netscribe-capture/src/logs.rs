//! Typed access to the persisted log collections.

use tracing::warn;

use crate::types::{CapturedLogLine, NetworkLogEntry};
use netscribe_core::Result;
use netscribe_store::keys;
use netscribe_store::Storage;

/// Append a console line. Returns the collection's new length.
pub fn append_console_line(storage: &dyn Storage, line: &CapturedLogLine) -> Result<usize> {
    storage.append(keys::CONSOLE_LOGS, serde_json::to_value(line)?)
}

/// Append a page-side network record. Returns the collection's new length.
pub fn append_network_entry(storage: &dyn Storage, entry: &NetworkLogEntry) -> Result<usize> {
    storage.append(keys::NETWORK_LOGS, serde_json::to_value(entry)?)
}

/// All console lines in capture order. Entries that no longer decode are skipped.
pub fn console_lines(storage: &dyn Storage) -> Result<Vec<CapturedLogLine>> {
    decode_all(storage, keys::CONSOLE_LOGS)
}

/// All page-side network records in capture order.
pub fn network_entries(storage: &dyn Storage) -> Result<Vec<NetworkLogEntry>> {
    decode_all(storage, keys::NETWORK_LOGS)
}

fn decode_all<T: serde::de::DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Vec<T>> {
    let entries = storage.entries(key)?;
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value(entry) {
            Ok(item) => out.push(item),
            Err(e) => warn!("Skipping undecodable {} entry: {}", key, e),
        }
    }
    Ok(out)
}
