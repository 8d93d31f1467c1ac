//! Best-effort key-value cache shared by the translator and the summarizer.
//!
//! Entries never expire. A cached value is only invalidated by a change in its
//! key, which is why every key embeds all the inputs that shape the value
//! (style, model and, for summaries, a schema version tag).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::settings::{SummaryModel, TranslationStyle};

const SUMMARY_SCHEMA_VERSION: &str = "v3";

/// Cache key for a translated title.
pub fn title_key(id: u64, style: TranslationStyle) -> String {
    format!("hn_title_{}_{}", id, style.as_str())
}

/// Cache key for an article summary. The whole url is encoded, so urls that
/// share a long prefix still get distinct keys.
pub fn summary_key(url: &str, model: SummaryModel, style: TranslationStyle) -> String {
    format!(
        "hn_summary_{}_{}_{}_{}",
        SUMMARY_SCHEMA_VERSION,
        URL_SAFE_NO_PAD.encode(url.as_bytes()),
        model.as_str(),
        style.as_str()
    )
}

/// Raw string storage behind the cache.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store. With a capacity it refuses new keys once full, the way a
/// browser origin refuses writes past its storage quota.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if let Some(capacity) = self.capacity {
            if !entries.contains_key(key) && entries.len() >= capacity {
                return Err(StoreError::Quota { capacity });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// SQLite-backed store, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let value = conn
            .query_row("SELECT value FROM cache WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;

        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        conn.execute(
            "INSERT INTO cache (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;

        Ok(())
    }
}

/// JSON layer over a [`KeyValueStore`]. Never fails: unreadable entries read
/// as absent and rejected writes are dropped.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// SQLite cache at `path`. Falls back to memory when the database cannot
    /// be opened, since the cache only saves requests.
    pub fn open(path: &Path) -> Self {
        match SqliteStore::open(path) {
            Ok(store) => Self::new(Arc::new(store)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "falling back to in-memory cache");
                Self::in_memory()
            }
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read error");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "cache entry could not be decoded");
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache value could not be encoded");
                return;
            }
        };

        if let Err(e) = self.store.set(key, &raw) {
            tracing::warn!(key, error = %e, "cache write error");
        }
    }
}
