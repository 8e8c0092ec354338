//! services/booth/src/engine/events.rs
//!
//! Notifications broadcast by the lifecycle engine. A UI subscribes and redraws from
//! them instead of polling.

use dream_booth_core::domain::{PhaseKind, PhotoId};
use serde::{Serialize, Serializer};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A new photo is waiting for its dream text.
    Captured { id: PhotoId },

    /// The confirming photo was consumed and replaced by `spawned` prints.
    Confirmed { id: PhotoId, spawned: Vec<PhotoId> },

    PhaseChanged {
        id: PhotoId,
        #[serde(serialize_with = "phase_name")]
        phase: PhaseKind,
    },

    /// Eject or develop progress, 0 to 100.
    Progress {
        id: PhotoId,
        #[serde(serialize_with = "phase_name")]
        phase: PhaseKind,
        progress: u8,
    },

    Failed { id: PhotoId, message: String },

    /// The photo now lives in history under `history_id`.
    Archived { id: PhotoId, history_id: String },

    /// History already held this result; nothing new was written.
    ArchiveSkipped { id: PhotoId },

    /// The photo left the engine but its history entry could not be written.
    SaveFailed { id: PhotoId, message: String },

    Discarded { id: PhotoId },
}

fn phase_name<S: Serializer>(phase: &PhaseKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(phase.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn events_serialize_with_type_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(LifecycleEvent::PhaseChanged {
            id,
            phase: PhaseKind::Developing,
        })
        .unwrap();
        assert_eq!(json["type"], "phase_changed");
        assert_eq!(json["phase"], "developing");
        assert_eq!(json["id"], id.to_string());
    }
}
