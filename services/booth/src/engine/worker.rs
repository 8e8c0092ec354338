//! services/booth/src/engine/worker.rs
//!
//! The per-print background task: wait for its stagger slot, play the eject
//! animation, call the image service, play the develop reveal, then archive.

use super::{LifecycleEngine, LifecycleEvent};
use crate::error::BoothError;
use dream_booth_core::domain::{Phase, PhaseKind, PhotoId};
use dream_booth_core::ports::{GenerationRequest, PortError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl LifecycleEngine {
    /// Drives a freshly confirmed print from `Ejecting` to the end of its first attempt.
    pub(super) async fn run_print(self, id: PhotoId, delay: Duration, ticker: CancellationToken) {
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = ticker.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if !self
            .animate(id, &ticker, PhaseKind::Ejecting, self.inner.timing.eject)
            .await
        {
            return;
        }

        let attempt = {
            let mut state = self.inner.state.lock().await;
            match state.get(id) {
                Some(record) if record.kind() == PhaseKind::Ejecting => {}
                _ => return,
            }
            self.enter_generating(&mut state, id)
        };
        self.generate_and_develop(id, attempt, ticker).await;
    }

    /// One generation attempt, followed by the develop reveal and archival on success.
    pub(super) async fn generate_and_develop(
        self,
        id: PhotoId,
        attempt: u32,
        ticker: CancellationToken,
    ) {
        if !self.generate(id, attempt, &ticker).await {
            return;
        }
        if !self
            .animate(id, &ticker, PhaseKind::Developing, self.inner.timing.develop)
            .await
        {
            return;
        }
        if let Err(e) = self.finalize(id).await {
            warn!(id = %id, error = %e, "Developed photo was not saved");
        }
    }

    /// Calls the image service for `attempt`. Returns `true` if the record moved on
    /// to `Developing`.
    async fn generate(&self, id: PhotoId, attempt: u32, ticker: &CancellationToken) -> bool {
        let (prompt, reference_image) = {
            let state = self.inner.state.lock().await;
            match state.get(id) {
                Some(record) => (
                    record.prompt.clone().unwrap_or_default(),
                    record.original_image.clone(),
                ),
                None => return false,
            }
        };

        let settings = self.inner.settings.get().await;
        let outcome = if settings.has_api_key() {
            let limit = Duration::from_secs(settings.request_timeout_secs);
            let request = GenerationRequest {
                prompt,
                reference_image,
                model_id: settings.model_id,
                api_base_url: settings.api_base_url,
                api_key: settings.api_key,
                timeout: limit,
            };
            debug!(id = %id, attempt, "Requesting image generation");
            // The call runs to completion even if the record is discarded meanwhile.
            // The outer bound also covers generators that ignore `request.timeout`.
            match tokio::time::timeout(limit, self.inner.generator.generate(&request)).await {
                Ok(result) => result,
                Err(_) => Err(PortError::Timeout(limit)),
            }
        } else {
            Err(PortError::Unexpected("no API key configured".to_string()))
        };

        let mut state = self.inner.state.lock().await;
        let current = state.is_current_attempt(id, attempt)
            && state
                .get(id)
                .is_some_and(|record| record.kind() == PhaseKind::Generating);
        if !current || ticker.is_cancelled() {
            debug!(id = %id, attempt, "Dropping stale generation result");
            return false;
        }
        let Some(record) = state.get_mut(id) else {
            return false;
        };

        match outcome {
            Ok(generated) => {
                record.result_image = Some(generated.image);
                record.phase = Phase::Developing { progress: 0 };
                info!(id = %id, attempt, "Image generated");
                self.emit(LifecycleEvent::PhaseChanged {
                    id,
                    phase: PhaseKind::Developing,
                });
                true
            }
            Err(e) => {
                let failure = BoothError::RemoteGeneration(failure_detail(&e));
                warn!(id = %id, attempt, error = %failure, "Image generation failed");
                let message = failure.to_string();
                record.phase = Phase::Failed {
                    message: message.clone(),
                };
                self.emit(LifecycleEvent::PhaseChanged {
                    id,
                    phase: PhaseKind::Failed,
                });
                self.emit(LifecycleEvent::Failed { id, message });
                false
            }
        }
    }

    /// Advances the progress of `phase` to 100 over `duration`, one tick at a time.
    /// Returns `false` if the record was cancelled, removed, or left the phase.
    async fn animate(
        &self,
        id: PhotoId,
        ticker: &CancellationToken,
        phase: PhaseKind,
        duration: Duration,
    ) -> bool {
        let tick = self.inner.timing.tick;
        let steps = (duration.as_millis() / tick.as_millis().max(1)).clamp(1, 10_000) as u32;

        for step in 1..=steps {
            tokio::select! {
                biased;
                _ = ticker.cancelled() => return false,
                _ = tokio::time::sleep(tick) => {}
            }

            let progress = (step * 100 / steps) as u8;
            let mut state = self.inner.state.lock().await;
            let Some(record) = state.get_mut(id) else {
                return false;
            };
            match (&mut record.phase, phase) {
                (Phase::Ejecting { progress: current }, PhaseKind::Ejecting)
                | (Phase::Developing { progress: current }, PhaseKind::Developing) => {
                    *current = progress;
                }
                _ => return false,
            }
            self.emit(LifecycleEvent::Progress {
                id,
                phase,
                progress,
            });
        }
        true
    }
}

fn failure_detail(error: &PortError) -> String {
    match error {
        PortError::Timeout(limit) => format!("timed out after {} seconds", limit.as_secs()),
        PortError::Remote(detail) => detail.clone(),
        other => other.to_string(),
    }
}
