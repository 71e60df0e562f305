//! SQLite-backed extension storage.
//!
//! Settings are rows in `settings`; every collection entry is its own row
//! in `collection_entries`, so an append is a single `INSERT` and never a
//! read-modify-write of the whole collection.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::keys;
use crate::schema::SCHEMA_SQL;
use crate::types::{now_millis, Storage, StorageChange, CHANGE_CHANNEL_CAPACITY};
use netscribe_core::{Error, Result};

/// SQLite store shared by the background host and every page relay.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    changes: broadcast::Sender<StorageChange>,
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/storage/`). The file will be `db_dir/netscribe.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("netscribe.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            changes,
        };

        info!(
            "SqliteStore initialized: path={}",
            store.db_path.display()
        );
        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    /// Path of the underlying database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn notify(&self, change: StorageChange) {
        // No subscribers is fine; nobody is mirroring this key yet.
        let _ = self.changes.send(change);
    }
}

impl Storage for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .prepare_cached("SELECT value_json FROM settings WHERE key = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        if keys::is_collection(key) {
            return Err(Error::Storage(format!("{} is a collection", key)));
        }
        let json = serde_json::to_string(&value)?;
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(e.to_string()))?;
        let old: Option<String> = tx
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(
            "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json,
                                            updated_at = excluded.updated_at",
            params![key, json, now_millis()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        let old_value = old.and_then(|s| serde_json::from_str(&s).ok());

        debug!("Stored {} = {}", key, json);
        // Still holding the connection: notifications follow commit order.
        self.notify(StorageChange::Value {
            key: key.to_string(),
            old_value,
            new_value: Some(value),
        });
        Ok(())
    }

    fn append(&self, key: &str, entry: Value) -> Result<usize> {
        let json = serde_json::to_string(&entry)?;
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(
            "INSERT INTO collection_entries (collection, entry_json, created_at) VALUES (?1, ?2, ?3)",
            params![key, json, now_millis()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        let total: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM collection_entries WHERE collection = ?1",
                params![key],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        let total = total as usize;

        self.notify(StorageChange::Appended {
            key: key.to_string(),
            total,
        });
        Ok(total)
    }

    fn entries(&self, key: &str) -> Result<Vec<Value>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT entry_json FROM collection_entries WHERE collection = ?1 ORDER BY id ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| Error::Database(e.to_string()))?;
            entries.push(serde_json::from_str(&raw)?);
        }
        Ok(entries)
    }

    fn count(&self, key: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let total: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM collection_entries WHERE collection = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![key], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(total as usize)
    }

    fn clear_collection(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM collection_entries WHERE collection = ?1",
                params![key],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        info!("Cleared {} ({} entries)", key, deleted);
        self.notify(StorageChange::Cleared {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
