//! services/booth/src/store/records.rs
//!
//! "Impure" persisted shapes for the JSON stores and the conversions to and from
//! the core domain types. Every reader here tolerates the older layouts, which is
//! where the migration chain lives.

use crate::layout::grid_position;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use dream_booth_core::domain::{
    HistoryRecord, ImageRef, Position, PromptTemplate, Settings, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct StoredPosition {
    pub x: f64,
    pub y: f64,
}

impl From<StoredPosition> for Position {
    fn from(p: StoredPosition) -> Self {
        Position::new(p.x, p.y)
    }
}

impl From<Position> for StoredPosition {
    fn from(p: Position) -> Self {
        Self { x: p.x, y: p.y }
    }
}

//=========================================================================================
// History
//=========================================================================================

/// One history entry as written to disk. Older entries used `originalPhoto`,
/// `resultPhoto` and `timestamp`, and had neither a position nor a parked flag;
/// some intermediate builds stored `isOnCanvas` instead of `isParked`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoredHistoryRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dream: String,
    #[serde(alias = "originalPhoto")]
    pub original_image_ref: String,
    #[serde(alias = "resultPhoto")]
    pub result_image_ref: String,
    /// Absent in older layouts, where the result had never been swapped for a cached copy.
    #[serde(default)]
    pub source_result_ref: Option<String>,
    #[serde(alias = "timestamp", default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub position: Option<StoredPosition>,
    #[serde(default)]
    pub is_parked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_on_canvas: Option<bool>,
}

impl StoredHistoryRecord {
    pub fn from_domain(record: &HistoryRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            name: record.name.clone(),
            dream: record.dream.clone(),
            original_image_ref: record.original_image_ref.as_str().to_string(),
            result_image_ref: record.result_image_ref.as_str().to_string(),
            source_result_ref: Some(record.source_result_ref.as_str().to_string()),
            created_at: Some(record.created_at),
            position: Some(record.position.into()),
            is_parked: Some(record.is_parked),
            is_on_canvas: None,
        }
    }

    /// Fills in whatever an older layout left out. `index` is the entry's place in
    /// the stored list and drives the default position.
    pub fn into_domain(self, index: usize) -> HistoryRecord {
        let is_parked = match (self.is_parked, self.is_on_canvas) {
            (Some(parked), _) => parked,
            (None, Some(on_canvas)) => !on_canvas,
            (None, None) => false,
        };
        HistoryRecord {
            id: self.id.unwrap_or_else(|| format!("legacy-{}", index)),
            name: self.name,
            dream: self.dream,
            original_image_ref: ImageRef::new(self.original_image_ref),
            source_result_ref: ImageRef::new(
                self.source_result_ref
                    .unwrap_or_else(|| self.result_image_ref.clone()),
            ),
            result_image_ref: ImageRef::new(self.result_image_ref),
            created_at: self.created_at.unwrap_or_default(),
            position: self
                .position
                .map(Position::from)
                .unwrap_or_else(|| grid_position(index)),
            is_parked,
        }
    }
}

/// Migration chain for the history list. Entries that cannot be repaired are dropped.
pub fn migrate_history(raw: serde_json::Value) -> Result<Vec<HistoryRecord>, StoreError> {
    let serde_json::Value::Array(items) = raw else {
        warn!("Stored history is not a list, ignoring it");
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<StoredHistoryRecord>(item) {
            Ok(stored) => records.push(stored.into_domain(index)),
            Err(e) => warn!(index, error = %e, "Skipping unreadable history entry"),
        }
    }
    Ok(records)
}

pub fn history_to_stored(records: &[HistoryRecord]) -> Vec<StoredHistoryRecord> {
    records.iter().map(StoredHistoryRecord::from_domain).collect()
}

//=========================================================================================
// Settings
//=========================================================================================

/// The settings record. The first layout used `baseUrl`, `modelName`,
/// `customPrompt` and a millisecond `timeout`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    #[serde(default, alias = "baseUrl")]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, alias = "modelName")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub active_template_id: Option<String>,
    #[serde(default, alias = "customPrompt")]
    pub custom_prompt_override: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, rename = "timeout", skip_serializing)]
    pub legacy_timeout_ms: Option<u64>,
}

impl StoredSettings {
    pub fn from_domain(settings: &Settings) -> Self {
        Self {
            api_base_url: Some(settings.api_base_url.clone()),
            api_key: Some(settings.api_key.clone()),
            model_id: Some(settings.model_id.clone()),
            active_template_id: Some(settings.active_template_id.clone()),
            custom_prompt_override: settings.custom_prompt_override.clone(),
            request_timeout_secs: Some(settings.request_timeout_secs),
            legacy_timeout_ms: None,
        }
    }

    pub fn into_domain(self) -> Settings {
        let defaults = Settings::default();
        let request_timeout_secs = self
            .request_timeout_secs
            .or_else(|| self.legacy_timeout_ms.map(|ms| (ms / 1000).max(1)))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Settings {
            api_base_url: non_empty(self.api_base_url).unwrap_or(defaults.api_base_url),
            api_key: self.api_key.unwrap_or_default(),
            model_id: non_empty(self.model_id).unwrap_or(defaults.model_id),
            active_template_id: non_empty(self.active_template_id)
                .unwrap_or(defaults.active_template_id),
            custom_prompt_override: non_empty(self.custom_prompt_override),
            request_timeout_secs,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Settings stored in any known layout; missing fields take their defaults.
pub fn migrate_settings(raw: serde_json::Value) -> Result<Settings, StoreError> {
    let stored: StoredSettings = serde_json::from_value(raw)?;
    Ok(stored.into_domain())
}

//=========================================================================================
// Custom Templates
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoredTemplate {
    pub id: String,
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub is_built_in: bool,
}

impl StoredTemplate {
    pub fn from_domain(template: &PromptTemplate) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            template: template.template_text.clone(),
            is_built_in: false,
        }
    }

    /// Custom templates are never built-in, whatever the stored flag says.
    pub fn into_domain(self) -> PromptTemplate {
        PromptTemplate {
            id: self.id,
            name: self.name,
            template_text: self.template,
            is_built_in: false,
        }
    }
}

pub fn migrate_templates(raw: serde_json::Value) -> Result<Vec<PromptTemplate>, StoreError> {
    let serde_json::Value::Array(items) = raw else {
        warn!("Stored templates are not a list, ignoring them");
        return Ok(Vec::new());
    };
    let mut templates = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<StoredTemplate>(item) {
            Ok(stored) => templates.push(stored.into_domain()),
            Err(e) => warn!(index, error = %e, "Skipping unreadable template"),
        }
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_positions_get_distinct_grid_slots() {
        let raw = serde_json::Value::Array(
            (0..10)
                .map(|i| {
                    json!({
                        "id": format!("h{i}"),
                        "name": "",
                        "dream": "pilot",
                        "originalImageRef": "data:,o",
                        "resultImageRef": format!("https://cdn/{i}.png"),
                        "createdAt": 1_700_000_000_000i64 + i
                    })
                })
                .collect(),
        );

        let records = migrate_history(raw).unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[7].position, grid_position(7));
        assert_ne!(records[7].position, records[2].position);
        assert!(records.iter().all(|r| !r.is_parked));
    }

    #[test]
    fn first_generation_layout_migrates() {
        let raw = json!([{
            "id": "1700000000000",
            "name": "Mia",
            "dream": "astronaut",
            "originalPhoto": "data:image/jpeg;base64,AAAA",
            "resultPhoto": "https://cdn/a.png",
            "timestamp": 1_700_000_000_000i64
        }]);

        let records = migrate_history(raw).unwrap();
        let record = &records[0];
        assert_eq!(record.id, "1700000000000");
        assert_eq!(record.original_image_ref.as_str(), "data:image/jpeg;base64,AAAA");
        assert_eq!(record.result_image_ref.as_str(), "https://cdn/a.png");
        assert_eq!(record.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(record.position, grid_position(0));
    }

    #[test]
    fn on_canvas_flag_maps_to_parked() {
        let raw = json!([
            {"originalImageRef": "a", "resultImageRef": "b", "isOnCanvas": false},
            {"originalImageRef": "c", "resultImageRef": "d", "isOnCanvas": true},
            {"originalImageRef": "e", "resultImageRef": "f", "isParked": true, "isOnCanvas": true}
        ]);
        let records = migrate_history(raw).unwrap();
        assert!(records[0].is_parked);
        assert!(!records[1].is_parked);
        assert!(records[2].is_parked);
        assert_eq!(records[1].id, "legacy-1");
    }

    #[test]
    fn unreadable_entries_are_skipped() {
        let raw = json!([
            {"originalImageRef": "a", "resultImageRef": "b"},
            {"name": "no images"},
            42
        ]);
        assert_eq!(migrate_history(raw).unwrap().len(), 1);
        assert!(migrate_history(json!({"oops": true})).unwrap().is_empty());
    }

    #[test]
    fn stored_history_keeps_every_field() {
        let record = HistoryRecord {
            id: "x-archive".into(),
            name: "Leo".into(),
            dream: "chef".into(),
            original_image_ref: ImageRef::from("data:,o"),
            result_image_ref: ImageRef::cached("x-archive"),
            source_result_ref: ImageRef::from("https://cdn/x.png"),
            created_at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            position: Position::new(1.5, -2.0),
            is_parked: true,
        };
        let json = serde_json::to_value(history_to_stored(std::slice::from_ref(&record))).unwrap();
        assert!(json[0].get("isOnCanvas").is_none());
        assert_eq!(json[0]["isParked"], json!(true));
        let back = migrate_history(json).unwrap();
        assert_eq!(back[0], record);
    }

    #[test]
    fn legacy_settings_layout() {
        let settings = migrate_settings(json!({
            "apiKey": "sk-old",
            "baseUrl": "https://proxy.example/v1",
            "modelName": "gemini-3-pro-image-preview-2k",
            "timeout": 120000,
            "customPrompt": ""
        }))
        .unwrap();
        assert_eq!(settings.api_key, "sk-old");
        assert_eq!(settings.api_base_url, "https://proxy.example/v1");
        assert_eq!(settings.model_id, "gemini-3-pro-image-preview-2k");
        assert_eq!(settings.request_timeout_secs, 120);
        assert_eq!(settings.custom_prompt_override, None);
        assert_eq!(settings.active_template_id, Settings::default().active_template_id);
    }

    #[test]
    fn stored_templates_are_never_built_in() {
        let templates = migrate_templates(json!([
            {"id": "custom-1", "name": "Knight", "template": "A knight who {dream}", "isBuiltIn": true}
        ]))
        .unwrap();
        assert!(!templates[0].is_built_in);
        assert_eq!(templates[0].template_text, "A knight who {dream}");
    }
}
