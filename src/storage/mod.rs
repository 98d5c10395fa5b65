//! Persistent store adapter
//!
//! Two kinds of durable state exist:
//! - three small strings (app identifier, app secret, saved session) behind [`SettingsStore`]
//! - one reusable cache slot holding the most recently acquired media, behind [`CacheSlot`]
//!
//! Clearing both returns the application to its configuration-required state.
//!
//! ## Submodules
//!
//! - [`sqlite`] - SQLite-backed settings with schema migrations
//! - [`slot`] - file-backed and in-memory cache slots

use crate::Result;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub mod slot;
pub mod sqlite;

pub use slot::{CacheSlot, FileCacheSlot, MemoryCacheSlot, SlotWriter};
pub use sqlite::SqliteSettings;

/// Setting keys
pub mod keys {
    /// Numeric app identifier, stored as its decimal string
    pub const API_ID: &str = "teletv_api_id";
    /// App secret
    pub const API_HASH: &str = "teletv_api_hash";
    /// Saved session string from the last successful login
    pub const SESSION: &str = "telesession";

    /// Every key the application writes
    pub const ALL: [&str; 3] = [API_ID, API_HASH, SESSION];
}

/// Key-value persistence of small strings
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    /// Value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every stored value
    async fn clear(&self) -> Result<()>;

    /// Release any underlying connection
    async fn close(&self) {}
}

/// Settings kept in process memory
///
/// For hosts without a filesystem and for tests. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.values.lock().await.clear();
        Ok(())
    }
}
