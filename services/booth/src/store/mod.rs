//! services/booth/src/store/mod.rs
//!
//! Typed access to the durable key/value medium. Reads go through a migration
//! closure so older layouts are repaired on load; writes always replace the whole
//! value under a key.

pub mod records;
pub mod settings;

use dream_booth_core::ports::{KeyValueStore, PortError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub use settings::{BootstrapOutcome, SettingsStore};

pub const SETTINGS_KEY: &str = "dream-booth-settings";
pub const HISTORY_KEY: &str = "dream-booth-history";
pub const CUSTOM_TEMPLATES_KEY: &str = "dream-booth-custom-templates";

/// Failures on the write path. Reads never fail; they fall back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded: {0}")]
    Quota(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(PortError),
}

impl From<PortError> for StoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::QuotaExceeded(message) => StoreError::Quota(message),
            other => StoreError::Backend(other),
        }
    }
}

pub struct PersistentStore {
    kv: Arc<dyn KeyValueStore>,
}

impl PersistentStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Loads `key` and passes the raw JSON through `migrate`.
    ///
    /// A missing key, an unreadable medium, unparsable JSON, or a failed migration
    /// all yield `T::default()`; the last three are logged.
    pub async fn load<T, F>(&self, key: &str, migrate: F) -> T
    where
        T: Default,
        F: FnOnce(serde_json::Value) -> Result<T, StoreError>,
    {
        let raw = match self.kv.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "Nothing stored yet");
                return T::default();
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored data, starting empty");
                return T::default();
            }
        };

        let value = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Stored data is corrupt, starting empty");
                return T::default();
            }
        };

        match migrate(value) {
            Ok(migrated) => migrated,
            Err(e) => {
                warn!(key, error = %e, "Stored data could not be migrated, starting empty");
                T::default()
            }
        }
    }

    /// Serializes and writes the full value.
    pub async fn save<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value)?;
        self.kv.set(key, &json).await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.kv.remove(key).await?;
        Ok(())
    }
}
