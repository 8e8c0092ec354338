//! services/booth/src/store/settings.rs
//!
//! The single settings record, read-modify-written as a whole on every update.

use crate::error::BoothResult;
use crate::store::records::{migrate_settings, StoredSettings};
use crate::store::{PersistentStore, SETTINGS_KEY};
use dream_booth_core::domain::{Settings, SettingsPatch};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Query parameter carrying a raw API key.
const API_KEY_PARAM: &str = "apiKey";
/// Query parameter carrying `{"key": ..., "url": ...}` as JSON.
const SETTINGS_PARAM: &str = "settings";

#[derive(Deserialize)]
struct BootstrapSettings {
    key: Option<String>,
    url: Option<String>,
}

/// Result of consuming bootstrap parameters from a launch address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
    /// The address with the bootstrap parameters removed.
    pub address: String,
    /// False if the settings were applied in memory but could not be written.
    pub persisted: bool,
}

pub struct SettingsStore {
    store: Arc<PersistentStore>,
    current: RwLock<Settings>,
}

impl SettingsStore {
    pub async fn load(store: Arc<PersistentStore>) -> Self {
        let settings = store.load(SETTINGS_KEY, migrate_settings).await;
        Self {
            store,
            current: RwLock::new(settings),
        }
    }

    pub async fn get(&self) -> Settings {
        self.current.read().await.clone()
    }

    pub async fn has_api_key(&self) -> bool {
        self.current.read().await.has_api_key()
    }

    /// Merges `patch` into the current settings and writes the full record.
    ///
    /// On a storage failure the merged settings stay in effect for this session and
    /// the error is returned so the caller can say the change was not saved.
    pub async fn update(&self, patch: SettingsPatch) -> BoothResult<Settings> {
        let mut current = self.current.write().await;
        let updated = patch.apply(current.clone());
        *current = updated.clone();
        self.store
            .save(SETTINGS_KEY, &StoredSettings::from_domain(&updated))
            .await?;
        Ok(updated)
    }

    /// Consumes `apiKey` / `settings` query parameters from a launch address.
    ///
    /// Returns `None` when the address carries neither, so reloading the cleaned
    /// address never re-applies them.
    pub async fn apply_bootstrap(&self, address: &str) -> Option<BootstrapOutcome> {
        let mut url = match url::Url::parse(address) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Launch address is not a valid URL, ignoring bootstrap parameters");
                return None;
            }
        };

        let mut settings_param = None;
        let mut api_key_param = None;
        let mut consumed = false;
        let mut remaining = Vec::new();
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                SETTINGS_PARAM => {
                    consumed = true;
                    settings_param = Some(value.into_owned());
                }
                API_KEY_PARAM => {
                    consumed = true;
                    api_key_param = Some(value.into_owned());
                }
                _ => remaining.push((name.to_string(), value.to_string())),
            }
        }

        // The explicit apiKey wins over settings.key wherever it sits in the query.
        let mut patch = SettingsPatch::default();
        if let Some(raw) = settings_param {
            match serde_json::from_str::<BootstrapSettings>(&raw) {
                Ok(parsed) => {
                    patch.api_key = parsed.key.filter(|k| !k.is_empty());
                    patch.api_base_url = parsed.url.filter(|u| !u.is_empty());
                }
                Err(e) => warn!(error = %e, "Ignoring unreadable settings parameter"),
            }
        }
        if let Some(key) = api_key_param.filter(|k| !k.is_empty()) {
            patch.api_key = Some(key);
        }

        if !consumed {
            return None;
        }

        if remaining.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(remaining);
        }

        let persisted = if patch.is_empty() {
            true
        } else {
            match self.update(patch).await {
                Ok(_) => {
                    info!("Applied settings from launch parameters");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Launch settings applied but not saved");
                    false
                }
            }
        };

        Some(BootstrapOutcome {
            address: url.to_string(),
            persisted,
        })
    }
}
