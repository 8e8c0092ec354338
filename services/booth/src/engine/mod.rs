//! services/booth/src/engine/mod.rs
//!
//! The photo lifecycle engine. Owns every in-flight photo from capture until it is
//! archived or discarded, and drives each one through eject, generation and develop
//! on its own worker task.
//!
//! All state sits behind one async mutex that is never held across a port call.
//! A worker re-checks, after every await, that its record still exists and that the
//! result belongs to the record's current generation attempt.

pub mod events;
mod state;
mod worker;

pub use events::LifecycleEvent;

use crate::blob_cache::BlobCache;
use crate::config::LifecycleTiming;
use crate::error::{BoothError, BoothResult};
use crate::history::{ArchiveOutcome, HistoryManager};
use crate::layout::grid_position;
use crate::store::SettingsStore;
use crate::templates::{render, TemplateRegistry};
use dream_booth_core::domain::{
    HistoryRecord, ImageRef, Phase, PhaseKind, PhotoId, PhotoRecord, Position,
};
use dream_booth_core::ports::ImageGenerationService;
use state::EngineState;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Most prints a single confirmation may produce.
pub const MAX_VARIANTS: usize = 4;

const EVENT_CAPACITY: usize = 256;

/// Cheap to clone; every clone drives the same engine.
#[derive(Clone)]
pub struct LifecycleEngine {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<EngineState>,
    generator: Arc<dyn ImageGenerationService>,
    settings: Arc<SettingsStore>,
    templates: Arc<TemplateRegistry>,
    history: Arc<HistoryManager>,
    blob_cache: Option<Arc<BlobCache>>,
    timing: LifecycleTiming,
    events: broadcast::Sender<LifecycleEvent>,
    shutdown: CancellationToken,
}

impl LifecycleEngine {
    pub fn new(
        generator: Arc<dyn ImageGenerationService>,
        settings: Arc<SettingsStore>,
        templates: Arc<TemplateRegistry>,
        history: Arc<HistoryManager>,
        blob_cache: Option<Arc<BlobCache>>,
        timing: LifecycleTiming,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState::default()),
                generator,
                settings,
                templates,
                history,
                blob_cache,
                timing,
                events,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    /// Takes a new photo and puts it up for confirmation.
    ///
    /// Only one photo may await confirmation at a time; a second capture fails with
    /// `ConcurrentCapture` and leaves the pending one untouched.
    pub async fn capture(&self, image: ImageRef) -> BoothResult<PhotoRecord> {
        let mut state = self.inner.state.lock().await;
        if state.confirming.is_some() {
            return Err(BoothError::ConcurrentCapture);
        }

        let mut record = PhotoRecord::captured(image);
        let id = record.id;
        self.emit(LifecycleEvent::Captured { id });

        record.phase = Phase::Confirming;
        state.insert(record.clone(), None);
        state.confirming = Some(id);
        self.emit(LifecycleEvent::PhaseChanged {
            id,
            phase: PhaseKind::Confirming,
        });

        info!(id = %id, "Photo captured");
        Ok(record)
    }

    /// Drops the photo awaiting confirmation.
    pub async fn cancel_capture(&self, id: PhotoId) -> BoothResult<()> {
        let mut state = self.inner.state.lock().await;
        let record = state
            .get(id)
            .ok_or_else(|| BoothError::NotFound(format!("photo {}", id)))?;
        if state.confirming != Some(id) {
            return Err(BoothError::InvalidTransition {
                id,
                phase: record.kind(),
                action: "cancel capture of",
            });
        }
        state.remove(id);
        self.emit(LifecycleEvent::Discarded { id });
        info!(id = %id, "Capture cancelled");
        Ok(())
    }

    /// Confirms the pending photo and starts `count` independent generations of it.
    ///
    /// Input problems are reported before anything changes: no record is created and
    /// the confirming photo stays where it is.
    pub async fn confirm_and_generate(
        &self,
        id: PhotoId,
        name: &str,
        dream: &str,
        count: usize,
    ) -> BoothResult<Vec<PhotoId>> {
        let dream = dream.trim();
        if dream.is_empty() {
            return Err(BoothError::Validation("a dream is required".to_string()));
        }
        if !(1..=MAX_VARIANTS).contains(&count) {
            return Err(BoothError::Validation(format!(
                "variant count must be between 1 and {}, got {}",
                MAX_VARIANTS, count
            )));
        }
        if !self.inner.settings.has_api_key().await {
            return Err(BoothError::MissingCredentials);
        }

        let prompt = render(&self.inner.templates.prompt_source().await, dream);

        let mut state = self.inner.state.lock().await;
        let pending = state
            .get(id)
            .ok_or_else(|| BoothError::NotFound(format!("photo {}", id)))?;
        if state.confirming != Some(id) {
            return Err(BoothError::InvalidTransition {
                id,
                phase: pending.kind(),
                action: "confirm",
            });
        }
        let original = pending.original_image.clone();
        state.remove(id);

        let mut spawned = Vec::with_capacity(count);
        for index in 0..count {
            let mut record = PhotoRecord::captured(original.clone());
            record.display_name = name.trim().to_string();
            record.dream_text = dream.to_string();
            record.prompt = Some(prompt.clone());
            record.phase = Phase::Ejecting { progress: 0 };
            record.position = grid_position(state.next_slot);
            state.next_slot += 1;

            let ticker = self.inner.shutdown.child_token();
            let record_id = record.id;
            state.insert(record, Some(ticker.clone()));
            spawned.push(record_id);

            let delay = self.inner.timing.stagger * index as u32;
            tokio::spawn(self.clone().run_print(record_id, delay, ticker));
        }

        self.emit(LifecycleEvent::Confirmed {
            id,
            spawned: spawned.clone(),
        });
        for record_id in &spawned {
            self.emit(LifecycleEvent::PhaseChanged {
                id: *record_id,
                phase: PhaseKind::Ejecting,
            });
        }
        info!(id = %id, count, "Generation confirmed");
        Ok(spawned)
    }

    /// Runs a failed generation again with the prompt and image it was confirmed with.
    pub async fn retry(&self, id: PhotoId) -> BoothResult<()> {
        if !self.inner.settings.has_api_key().await {
            return Err(BoothError::MissingCredentials);
        }

        let (attempt, ticker) = {
            let mut state = self.inner.state.lock().await;
            let record = state
                .get(id)
                .ok_or_else(|| BoothError::NotFound(format!("photo {}", id)))?;
            if record.kind() != PhaseKind::Failed {
                return Err(BoothError::InvalidTransition {
                    id,
                    phase: record.kind(),
                    action: "retry",
                });
            }
            let ticker = state
                .ticker(id)
                .unwrap_or_else(|| self.inner.shutdown.child_token());
            let attempt = self.enter_generating(&mut state, id);
            (attempt, ticker)
        };

        info!(id = %id, attempt, "Retrying generation");
        tokio::spawn(self.clone().generate_and_develop(id, attempt, ticker));
        Ok(())
    }

    /// Removes a photo that has not been archived. An outstanding generation call is
    /// left to finish; its result is dropped.
    pub async fn discard(&self, id: PhotoId) -> BoothResult<()> {
        let mut state = self.inner.state.lock().await;
        state
            .remove(id)
            .ok_or_else(|| BoothError::NotFound(format!("photo {}", id)))?;
        self.emit(LifecycleEvent::Discarded { id });
        info!(id = %id, "Photo discarded");
        Ok(())
    }

    /// Finishes the develop reveal at once and archives the photo.
    ///
    /// A photo already archived by its own develop timer is a no-op.
    pub async fn complete_development(&self, id: PhotoId) -> BoothResult<()> {
        {
            let state = self.inner.state.lock().await;
            if state.is_finalized(id) {
                debug!(id = %id, "Photo already archived");
                return Ok(());
            }
            let record = state
                .get(id)
                .ok_or_else(|| BoothError::NotFound(format!("photo {}", id)))?;
            if record.kind() != PhaseKind::Developing {
                return Err(BoothError::InvalidTransition {
                    id,
                    phase: record.kind(),
                    action: "complete development of",
                });
            }
        }
        self.finalize(id).await
    }

    /// Moves a print on the canvas. Only prints that have started ejecting can move.
    pub async fn reposition(&self, id: PhotoId, position: Position) -> BoothResult<()> {
        let mut state = self.inner.state.lock().await;
        let record = Self::movable(&mut state, id, "move")?;
        record.position = position;
        record.pinned = true;
        Ok(())
    }

    /// Starts a drag. The print is pinned where it is currently drawn, so an eject
    /// slide in progress stops moving it. Progress keeps running while dragged.
    pub async fn begin_drag(&self, id: PhotoId) -> BoothResult<()> {
        let mut state = self.inner.state.lock().await;
        let record = Self::movable(&mut state, id, "drag")?;
        record.position = record.display_position();
        record.pinned = true;
        record.is_dragging = true;
        Ok(())
    }

    pub async fn end_drag(&self, id: PhotoId) -> BoothResult<()> {
        let mut state = self.inner.state.lock().await;
        let record = Self::movable(&mut state, id, "drop")?;
        record.is_dragging = false;
        Ok(())
    }

    pub async fn get(&self, id: PhotoId) -> Option<PhotoRecord> {
        self.inner.state.lock().await.get(id).cloned()
    }

    /// Every live photo in capture order.
    pub async fn records(&self) -> Vec<PhotoRecord> {
        self.inner.state.lock().await.ordered()
    }

    /// Stops every animation ticker. Outstanding network calls are not interrupted.
    pub fn shutdown(&self) {
        info!("Shutting down lifecycle engine");
        self.inner.shutdown.cancel();
    }

    //=====================================================================================
    // Internal helpers shared with the worker
    //=====================================================================================

    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn movable<'a>(
        state: &'a mut EngineState,
        id: PhotoId,
        action: &'static str,
    ) -> BoothResult<&'a mut PhotoRecord> {
        let record = state
            .get_mut(id)
            .ok_or_else(|| BoothError::NotFound(format!("photo {}", id)))?;
        if !record.has_ejected() {
            return Err(BoothError::InvalidTransition {
                id,
                phase: record.kind(),
                action,
            });
        }
        Ok(record)
    }

    /// Moves a record into `Generating` under a fresh attempt number.
    fn enter_generating(&self, state: &mut EngineState, id: PhotoId) -> u32 {
        let attempt = state.next_attempt(id);
        if let Some(record) = state.get_mut(id) {
            record.phase = Phase::Generating;
        }
        self.emit(LifecycleEvent::PhaseChanged {
            id,
            phase: PhaseKind::Generating,
        });
        attempt
    }

    /// Hands a developed photo to history, exactly once per id.
    async fn finalize(&self, id: PhotoId) -> BoothResult<()> {
        let record = {
            let mut state = self.inner.state.lock().await;
            let developing = state
                .get(id)
                .is_some_and(|record| record.kind() == PhaseKind::Developing);
            if !developing || !state.claim_finalization(id) {
                return Ok(());
            }
            let Some(mut record) = state.remove(id) else {
                return Ok(());
            };
            record.phase = Phase::Archived;
            record
        };
        self.emit(LifecycleEvent::PhaseChanged {
            id,
            phase: PhaseKind::Archived,
        });

        match self.inner.history.archive(record).await {
            Ok(ArchiveOutcome::Added(entry)) => {
                self.cache_result(&entry).await;
                self.emit(LifecycleEvent::Archived {
                    id,
                    history_id: entry.id,
                });
                Ok(())
            }
            Ok(ArchiveOutcome::Duplicate) => {
                self.emit(LifecycleEvent::ArchiveSkipped { id });
                Ok(())
            }
            Err(e) => {
                error!(id = %id, error = %e, "Failed to save archived photo");
                self.emit(LifecycleEvent::SaveFailed {
                    id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn cache_result(&self, entry: &HistoryRecord) {
        let Some(cache) = &self.inner.blob_cache else {
            return;
        };
        if !cache.put(&entry.id, &entry.result_image_ref).await {
            return;
        }
        if let Err(e) = self
            .inner
            .history
            .attach_cached_result(&entry.id, ImageRef::cached(&entry.id))
            .await
        {
            warn!(id = %entry.id, error = %e, "Cached result could not be linked to history");
        }
    }
}
