//! services/booth/src/app.rs
//!
//! Builds every service exactly once and wires them together. A UI holds one
//! `AppState` for its whole lifetime and talks to the services through it.

use crate::adapters::{FileBlobStore, HttpImageFetcher, HttpImageGenerator, SqliteKvStore};
use crate::blob_cache::BlobCache;
use crate::config::Config;
use crate::engine::LifecycleEngine;
use crate::error::{BoothError, BoothResult};
use crate::history::HistoryManager;
use crate::store::{PersistentStore, SettingsStore};
use crate::telemetry;
use crate::templates::TemplateRegistry;
use dream_booth_core::ports::{
    BlobStore, ImageFetchService, ImageGenerationService, KeyValueStore, PortError,
};
use std::sync::Arc;
use tracing::info;

const DATABASE_FILE: &str = "booth.db";

/// The concrete port implementations the services run on.
pub struct Adapters {
    pub kv: Arc<dyn KeyValueStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub generator: Arc<dyn ImageGenerationService>,
    pub fetcher: Arc<dyn ImageFetchService>,
}

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<PersistentStore>,
    pub settings: Arc<SettingsStore>,
    pub templates: Arc<TemplateRegistry>,
    pub history: Arc<HistoryManager>,
    pub blob_cache: Arc<BlobCache>,
    pub engine: LifecycleEngine,
}

impl AppState {
    /// Loads configuration from the environment, installs logging and starts up.
    pub async fn from_env() -> BoothResult<Self> {
        let config = Config::from_env()?;
        telemetry::init(config.log_level);
        info!("Configuration loaded. Starting booth...");
        Self::start(config).await
    }

    /// Starts on disk under `config.data_dir`, talking to the image service over HTTP.
    pub async fn start(config: Config) -> BoothResult<Self> {
        // --- 1. Open durable storage ---
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let kv = SqliteKvStore::open(config.data_dir.join(DATABASE_FILE), None).await?;
        let blobs = FileBlobStore::open(config.data_dir.join("images")).await?;
        info!(data_dir = %config.data_dir.display(), "Storage opened");

        // --- 2. Initialize HTTP adapters ---
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BoothError::Port(PortError::Unexpected(e.to_string())))?;
        let generator = HttpImageGenerator::new(client.clone());
        let fetcher = HttpImageFetcher::new(client);

        let adapters = Adapters {
            kv: Arc::new(kv),
            blobs: Arc::new(blobs),
            generator: Arc::new(generator),
            fetcher: Arc::new(fetcher),
        };
        Ok(Self::with_adapters(config, adapters).await)
    }

    /// Builds the services on top of arbitrary adapters.
    pub async fn with_adapters(config: Config, adapters: Adapters) -> Self {
        let store = Arc::new(PersistentStore::new(adapters.kv));
        let settings = Arc::new(SettingsStore::load(store.clone()).await);
        let templates = Arc::new(TemplateRegistry::load(store.clone(), settings.clone()).await);
        let blob_cache = Arc::new(BlobCache::new(adapters.blobs, adapters.fetcher));
        let history = Arc::new(HistoryManager::load(store.clone(), Some(blob_cache.clone())).await);

        let result_cache = config.cache_results.then(|| blob_cache.clone());
        let engine = LifecycleEngine::new(
            adapters.generator,
            settings.clone(),
            templates.clone(),
            history.clone(),
            result_cache,
            config.timing.clone(),
        );

        info!(
            history = history.len().await,
            has_api_key = settings.has_api_key().await,
            "Booth ready"
        );

        Self {
            config: Arc::new(config),
            store,
            settings,
            templates,
            history,
            blob_cache,
            engine,
        }
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}
