//! crates/dream_booth_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Identifier of a photo while it is owned by the lifecycle engine.
pub type PhotoId = Uuid;

/// Vertical distance a freshly ejected print slides while its eject animation runs.
pub const EJECT_TRAVEL: f64 = 120.0;

/// A point on the unbounded canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

//=========================================================================================
// Image References
//=========================================================================================

/// How an `ImageRef` can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// An inline `data:` encoding.
    Data,
    /// An `http(s)` URL that may expire.
    Remote,
    /// A key into the local blob cache (`blob:{id}`).
    Cached,
    /// A `file://` path on the local machine.
    Local,
    Other,
}

/// A reference to an image: URL, inline encoding, or blob cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    pub const CACHED_PREFIX: &'static str = "blob:";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds the reference under which the blob cache stores `id`.
    pub fn cached(id: &str) -> Self {
        Self(format!("{}{}", Self::CACHED_PREFIX, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn kind(&self) -> ImageKind {
        let value = self.0.as_str();
        if value.starts_with("data:") {
            ImageKind::Data
        } else if value.starts_with("http://") || value.starts_with("https://") {
            ImageKind::Remote
        } else if value.starts_with(Self::CACHED_PREFIX) {
            ImageKind::Cached
        } else if value.starts_with("file://") {
            ImageKind::Local
        } else {
            ImageKind::Other
        }
    }

    /// The blob cache key if this is a `blob:` reference.
    pub fn cache_key(&self) -> Option<&str> {
        self.0.strip_prefix(Self::CACHED_PREFIX)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ImageRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

//=========================================================================================
// Photo Lifecycle
//=========================================================================================

/// The lifecycle phase of a photo, carrying the data that only exists in that phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Captured,
    Confirming,
    Ejecting { progress: u8 },
    Generating,
    Developing { progress: u8 },
    Failed { message: String },
    Archived,
}

/// Payload-free mirror of `Phase`, handy for events and comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Captured,
    Confirming,
    Ejecting,
    Generating,
    Developing,
    Failed,
    Archived,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Captured => PhaseKind::Captured,
            Phase::Confirming => PhaseKind::Confirming,
            Phase::Ejecting { .. } => PhaseKind::Ejecting,
            Phase::Generating => PhaseKind::Generating,
            Phase::Developing { .. } => PhaseKind::Developing,
            Phase::Failed { .. } => PhaseKind::Failed,
            Phase::Archived => PhaseKind::Archived,
        }
    }
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Captured => "captured",
            PhaseKind::Confirming => "confirming",
            PhaseKind::Ejecting => "ejecting",
            PhaseKind::Generating => "generating",
            PhaseKind::Developing => "developing",
            PhaseKind::Failed => "failed",
            PhaseKind::Archived => "archived",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A photo travelling through the capture → generate → develop pipeline.
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub original_image: ImageRef,
    pub display_name: String,
    pub dream_text: String,
    pub result_image: Option<ImageRef>,
    pub phase: Phase,
    pub position: Position,
    pub is_dragging: bool,
    /// Set once the user has moved the print; the eject slide no longer applies.
    pub pinned: bool,
    /// Prompt frozen at confirmation time, reused verbatim by retries.
    pub prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PhotoRecord {
    /// A fresh record for a just-captured image.
    pub fn captured(original_image: ImageRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_image,
            display_name: String::new(),
            dream_text: String::new(),
            result_image: None,
            phase: Phase::Captured,
            position: Position::default(),
            is_dragging: false,
            pinned: false,
            prompt: None,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    /// Eject progress or develop progress, depending on the phase; 0 elsewhere.
    pub fn progress(&self) -> u8 {
        match self.phase {
            Phase::Ejecting { progress } | Phase::Developing { progress } => progress,
            _ => 0,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed { message } => Some(message),
            _ => None,
        }
    }

    /// True once the eject animation has begun; the print is on the canvas from then on.
    pub fn has_ejected(&self) -> bool {
        matches!(
            self.kind(),
            PhaseKind::Ejecting | PhaseKind::Generating | PhaseKind::Developing | PhaseKind::Failed
        )
    }

    /// Where the print is drawn right now, including the eject slide.
    pub fn display_position(&self) -> Position {
        match self.phase {
            Phase::Ejecting { progress } if !self.pinned => {
                let remaining = f64::from(100u8.saturating_sub(progress)) / 100.0;
                self.position.offset(0.0, EJECT_TRAVEL * remaining)
            }
            _ => self.position,
        }
    }
}

//=========================================================================================
// History, Templates, Settings
//=========================================================================================

/// A completed generation kept in the local archive.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: String,
    pub name: String,
    pub dream: String,
    pub original_image_ref: ImageRef,
    pub result_image_ref: ImageRef,
    /// The result as the image service returned it. Stays put when
    /// `result_image_ref` is swapped for a cached copy.
    pub source_result_ref: ImageRef,
    pub created_at: DateTime<Utc>,
    pub position: Position,
    /// `false` while shown on the main canvas, `true` once collected into the gallery.
    pub is_parked: bool,
}

impl HistoryRecord {
    /// The archive id for a photo: its own id plus a suffix that keeps the namespaces apart.
    pub fn id_for_photo(photo_id: PhotoId) -> String {
        format!("{}-archive", photo_id)
    }
}

/// A named prompt pattern with a `{dream}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub template_text: String,
    pub is_built_in: bool,
}

pub const DEFAULT_API_BASE_URL: &str = "https://api.tu-zi.com/v1";
pub const DEFAULT_MODEL_ID: &str = "gemini-3-pro-image-preview-vip";
pub const DEFAULT_TEMPLATE_ID: &str = "builtin-dream";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

/// User settings, always read and written as one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub api_key: String,
    pub model_id: String,
    pub active_template_id: String,
    pub custom_prompt_override: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            active_template_id: DEFAULT_TEMPLATE_ID.to_string(),
            custom_prompt_override: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// A typed partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub model_id: Option<String>,
    pub active_template_id: Option<String>,
    /// `Some(None)` clears the override.
    pub custom_prompt_override: Option<Option<String>>,
    pub request_timeout_secs: Option<u64>,
}

impl SettingsPatch {
    pub fn apply(self, mut settings: Settings) -> Settings {
        if let Some(v) = self.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = self.api_key {
            settings.api_key = v;
        }
        if let Some(v) = self.model_id {
            settings.model_id = v;
        }
        if let Some(v) = self.active_template_id {
            settings.active_template_id = v;
        }
        if let Some(v) = self.custom_prompt_override {
            settings.custom_prompt_override = v;
        }
        if let Some(v) = self.request_timeout_secs {
            settings.request_timeout_secs = v;
        }
        settings
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ref_kinds() {
        assert_eq!(ImageRef::from("data:image/png;base64,AAA").kind(), ImageKind::Data);
        assert_eq!(ImageRef::from("https://cdn.example/x.png").kind(), ImageKind::Remote);
        assert_eq!(ImageRef::cached("abc").kind(), ImageKind::Cached);
        assert_eq!(ImageRef::cached("abc").cache_key(), Some("abc"));
        assert_eq!(ImageRef::from("file:///tmp/a.png").kind(), ImageKind::Local);
    }

    #[test]
    fn eject_slide_stops_once_pinned() {
        let mut record = PhotoRecord::captured(ImageRef::from("data:,x"));
        record.position = Position::new(10.0, 20.0);
        record.phase = Phase::Ejecting { progress: 50 };
        assert_eq!(record.display_position(), Position::new(10.0, 20.0 + EJECT_TRAVEL / 2.0));

        record.pinned = true;
        assert_eq!(record.display_position(), Position::new(10.0, 20.0));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let patch = SettingsPatch {
            api_key: Some("sk-1".to_string()),
            custom_prompt_override: Some(Some("draw {dream}".to_string())),
            ..Default::default()
        };
        let updated = patch.apply(Settings::default());
        assert_eq!(updated.api_key, "sk-1");
        assert_eq!(updated.model_id, DEFAULT_MODEL_ID);
        assert_eq!(updated.custom_prompt_override.as_deref(), Some("draw {dream}"));

        let cleared = SettingsPatch {
            custom_prompt_override: Some(None),
            ..Default::default()
        }
        .apply(updated);
        assert_eq!(cleared.custom_prompt_override, None);
    }

    #[test]
    fn progress_and_error_follow_phase() {
        let mut record = PhotoRecord::captured(ImageRef::from("data:,x"));
        record.phase = Phase::Developing { progress: 30 };
        assert_eq!(record.progress(), 30);
        assert_eq!(record.error_message(), None);

        record.phase = Phase::Failed { message: "boom".into() };
        assert_eq!(record.progress(), 0);
        assert_eq!(record.error_message(), Some("boom"));
    }
}
