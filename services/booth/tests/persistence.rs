//! Loading data written by older builds, and surviving restarts on disk.

use booth_lib::adapters::{MemoryBlobStore, MemoryKvStore};
use booth_lib::app::{Adapters, AppState};
use booth_lib::config::Config;
use booth_lib::history::HistoryFilter;
use booth_lib::layout::grid_position;
use booth_lib::store::{CUSTOM_TEMPLATES_KEY, HISTORY_KEY, SETTINGS_KEY};
use async_trait::async_trait;
use bytes::Bytes;
use dream_booth_core::domain::{
    ImageRef, PhotoRecord, Position, SettingsPatch, DEFAULT_MODEL_ID, DEFAULT_TEMPLATE_ID,
};
use dream_booth_core::ports::{
    GeneratedImage, GenerationRequest, ImageFetchService, ImageGenerationService, PortError,
    PortResult,
};
use std::sync::Arc;

struct Unreachable;

#[async_trait]
impl ImageGenerationService for Unreachable {
    async fn generate(&self, _request: &GenerationRequest) -> PortResult<GeneratedImage> {
        Err(PortError::Remote("offline".into()))
    }
}

#[async_trait]
impl ImageFetchService for Unreachable {
    async fn fetch(&self, _url: &str) -> PortResult<Bytes> {
        Err(PortError::Remote("offline".into()))
    }
}

async fn app_on(kv: Arc<MemoryKvStore>) -> AppState {
    let adapters = Adapters {
        kv,
        blobs: Arc::new(MemoryBlobStore::new()),
        generator: Arc::new(Unreachable),
        fetcher: Arc::new(Unreachable),
    };
    AppState::with_adapters(Config::default(), adapters).await
}

const LEGACY_HISTORY: &str = r#"[
    {"name": "Ava", "dream": "astronaut", "originalPhoto": "data:,a", "resultPhoto": "https://cdn/a.png", "timestamp": 1700000000000},
    {"id": "keep-me", "name": "Ben", "dream": "chef", "originalPhoto": "data:,b", "resultPhoto": "https://cdn/b.png", "timestamp": 1690000000000, "isOnCanvas": false},
    {"name": "Cy", "dream": "diver", "originalImageRef": "data:,c", "resultImageRef": "https://cdn/c.png", "createdAt": 1680000000000, "position": {"x": 7.0, "y": 8.0}, "isParked": false},
    {"name": "broken entry without images"}
]"#;

#[tokio::test]
async fn legacy_layouts_are_migrated_on_load() {
    let kv = Arc::new(MemoryKvStore::new());
    kv.insert_raw(HISTORY_KEY, LEGACY_HISTORY).await;
    kv.insert_raw(
        SETTINGS_KEY,
        r#"{"baseUrl": "https://proxy.example/v1", "apiKey": "sk-old", "modelName": "", "customPrompt": "Paint {dream}", "timeout": 120000}"#,
    )
    .await;

    let app = app_on(kv).await;

    let entries = app.history.list(HistoryFilter::default()).await;
    assert_eq!(entries.len(), 3);

    assert_eq!(entries[0].id, "legacy-0");
    assert_eq!(entries[0].position, grid_position(0));
    assert!(!entries[0].is_parked);
    assert_eq!(entries[0].result_image_ref, ImageRef::from("https://cdn/a.png"));
    assert_eq!(entries[0].source_result_ref, entries[0].result_image_ref);
    assert_eq!(entries[0].created_at.timestamp_millis(), 1_700_000_000_000);

    assert_eq!(entries[1].id, "keep-me");
    assert_eq!(entries[1].position, grid_position(1));
    assert!(entries[1].is_parked);

    assert_eq!(entries[2].position, Position::new(7.0, 8.0));
    assert_ne!(entries[0].position, entries[1].position);

    let settings = app.settings.get().await;
    assert_eq!(settings.api_base_url, "https://proxy.example/v1");
    assert_eq!(settings.api_key, "sk-old");
    assert_eq!(settings.model_id, DEFAULT_MODEL_ID);
    assert_eq!(settings.custom_prompt_override.as_deref(), Some("Paint {dream}"));
    assert_eq!(settings.request_timeout_secs, 120);
    assert_eq!(app.templates.prompt_source().await, "Paint {dream}");
}

#[tokio::test]
async fn corrupt_values_load_as_defaults() {
    let kv = Arc::new(MemoryKvStore::new());
    kv.insert_raw(HISTORY_KEY, "{not json").await;
    kv.insert_raw(SETTINGS_KEY, "[1, 2, 3]").await;
    kv.insert_raw(CUSTOM_TEMPLATES_KEY, "\"nope\"").await;

    let app = app_on(kv).await;
    assert!(app.history.is_empty().await);
    assert_eq!(app.settings.get().await.active_template_id, DEFAULT_TEMPLATE_ID);
    assert!(app.templates.list().await.iter().all(|t| t.is_built_in));
}

#[tokio::test]
async fn state_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = || Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    let template_id = {
        let app = AppState::start(config()).await.unwrap();
        app.settings
            .update(SettingsPatch {
                api_key: Some("sk-disk".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let template = app.templates.add("Robot", "A robot {dream}").await.unwrap();
        app.templates.set_active(&template.id).await.unwrap();

        let mut photo = PhotoRecord::captured(ImageRef::from("data:,disk"));
        photo.dream_text = "engineer".into();
        photo.result_image = Some(ImageRef::from("data:image/png;base64,iVBORw0KGgo="));
        app.history.archive(photo).await.unwrap();
        app.shutdown();
        template.id
    };

    let app = AppState::start(config()).await.unwrap();
    assert_eq!(app.settings.get().await.api_key, "sk-disk");
    assert_eq!(app.templates.active().await.id, template_id);
    let entries = app.history.list(HistoryFilter::default()).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].dream, "engineer");
}
