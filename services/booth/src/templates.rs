//! services/booth/src/templates.rs
//!
//! Built-in and user-defined prompt templates, and the active selection.
//! The built-ins are three open templates followed by one per dream preset.

use crate::error::{BoothError, BoothResult};
use crate::presets::dream_presets;
use crate::store::records::{migrate_templates, StoredTemplate};
use crate::store::{PersistentStore, SettingsStore, CUSTOM_TEMPLATES_KEY};
use dream_booth_core::domain::{PromptTemplate, SettingsPatch, DEFAULT_TEMPLATE_ID};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// The token replaced by the user's dream text.
pub const DREAM_PLACEHOLDER: &str = "{dream}";

const DREAM_TEMPLATE: &str = "Create a new picture from this photo.

The child's dream is: {dream}

Requirements:
1. Keep the child's facial features exactly the same, including expression.
2. Dress the child in clothing or gear that fits the dream.
3. The background should match the scene of the dream.
4. Overall mood: happy, confident, full of hope.";

const CARTOON_TEMPLATE: &str = "Transform this child photo into a cute young {dream}.
IMPORTANT: Keep the child's face exactly the same, maintain facial features and expression.
Style: Bright, colorful, child-friendly cartoon/Disney Pixar style.
Background: Appropriate environment for the dream.
Mood: Happy, confident, inspiring.";

const PORTRAIT_TEMPLATE: &str = "A professional studio portrait of the person in this photo as {dream}.
Keep their face and expression unchanged. Soft key light, shallow depth of field,
realistic textures, tasteful color grading.";

/// Templates shipped with the application. Always listed first, never editable.
pub fn built_in_templates() -> Vec<PromptTemplate> {
    let open = [
        (DEFAULT_TEMPLATE_ID, "Dream", DREAM_TEMPLATE),
        ("builtin-cartoon", "Cartoon", CARTOON_TEMPLATE),
        ("builtin-portrait", "Portrait", PORTRAIT_TEMPLATE),
    ]
    .into_iter()
    .map(|(id, name, text)| PromptTemplate {
        id: id.to_string(),
        name: name.to_string(),
        template_text: text.to_string(),
        is_built_in: true,
    });

    // Preset prompts are complete; the typed dream is not substituted into them.
    let presets = dream_presets().iter().map(|preset| PromptTemplate {
        id: preset.template_id(),
        name: preset.name.to_string(),
        template_text: preset.prompt(),
        is_built_in: true,
    });

    open.chain(presets).collect()
}

/// Substitutes every placeholder with the trimmed dream. Templates without a
/// placeholder are returned unchanged.
pub fn render(template_text: &str, dream: &str) -> String {
    template_text.replace(DREAM_PLACEHOLDER, dream.trim())
}

pub struct TemplateRegistry {
    store: Arc<PersistentStore>,
    settings: Arc<SettingsStore>,
    built_ins: Vec<PromptTemplate>,
    custom: RwLock<Vec<PromptTemplate>>,
}

impl TemplateRegistry {
    pub async fn load(store: Arc<PersistentStore>, settings: Arc<SettingsStore>) -> Self {
        let custom = store.load(CUSTOM_TEMPLATES_KEY, migrate_templates).await;
        Self {
            store,
            settings,
            built_ins: built_in_templates(),
            custom: RwLock::new(custom),
        }
    }

    /// Built-ins first, then custom templates in creation order.
    pub async fn list(&self) -> Vec<PromptTemplate> {
        let custom = self.custom.read().await;
        self.built_ins.iter().chain(custom.iter()).cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<PromptTemplate> {
        self.list().await.into_iter().find(|t| t.id == id)
    }

    pub async fn add(&self, name: &str, text: &str) -> BoothResult<PromptTemplate> {
        let name = name.trim();
        let text = text.trim();
        if name.is_empty() {
            return Err(BoothError::Validation("template name is required".to_string()));
        }
        if text.is_empty() {
            return Err(BoothError::Validation("template text is required".to_string()));
        }

        let template = PromptTemplate {
            id: format!("custom-{}", Uuid::new_v4()),
            name: name.to_string(),
            template_text: text.to_string(),
            is_built_in: false,
        };

        let mut custom = self.custom.write().await;
        custom.push(template.clone());
        self.persist(&custom).await?;
        info!(id = %template.id, "Added prompt template");
        Ok(template)
    }

    /// Deletes a custom template. Built-in and unknown ids are ignored.
    ///
    /// Removing the active template moves the selection back to the default built-in.
    pub async fn remove(&self, id: &str) -> BoothResult<()> {
        if self.built_ins.iter().any(|t| t.id == id) {
            return Ok(());
        }

        {
            let mut custom = self.custom.write().await;
            let before = custom.len();
            custom.retain(|t| t.id != id);
            if custom.len() == before {
                return Ok(());
            }
            self.persist(&custom).await?;
        }

        if self.settings.get().await.active_template_id == id {
            self.settings
                .update(SettingsPatch {
                    active_template_id: Some(DEFAULT_TEMPLATE_ID.to_string()),
                    custom_prompt_override: Some(None),
                    ..Default::default()
                })
                .await?;
        }
        Ok(())
    }

    /// The template after `current_id` in list order, wrapping around.
    pub async fn cycle(&self, current_id: &str) -> PromptTemplate {
        let all = self.list().await;
        let next = all
            .iter()
            .position(|t| t.id == current_id)
            .map(|index| (index + 1) % all.len())
            .unwrap_or(0);
        all[next].clone()
    }

    /// The active template, falling back to the default if the stored id is gone.
    pub async fn active(&self) -> PromptTemplate {
        let active_id = self.settings.get().await.active_template_id;
        match self.get(&active_id).await {
            Some(template) => template,
            None => self.built_ins[0].clone(),
        }
    }

    pub async fn set_active(&self, id: &str) -> BoothResult<PromptTemplate> {
        let template = self
            .get(id)
            .await
            .ok_or_else(|| BoothError::NotFound(format!("template {}", id)))?;
        self.settings
            .update(SettingsPatch {
                active_template_id: Some(template.id.clone()),
                ..Default::default()
            })
            .await?;
        Ok(template)
    }

    /// The text prompts are rendered from: the custom override if set, else the active template.
    pub async fn prompt_source(&self) -> String {
        match self.settings.get().await.custom_prompt_override {
            Some(text) if !text.trim().is_empty() => text,
            _ => self.active().await.template_text,
        }
    }

    async fn persist(&self, custom: &[PromptTemplate]) -> BoothResult<()> {
        if custom.is_empty() {
            self.store.remove(CUSTOM_TEMPLATES_KEY).await?;
            return Ok(());
        }
        let stored: Vec<StoredTemplate> = custom.iter().map(StoredTemplate::from_domain).collect();
        self.store.save(CUSTOM_TEMPLATES_KEY, &stored).await?;
        Ok(())
    }
}
