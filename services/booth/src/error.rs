//! services/booth/src/error.rs
//!
//! Defines the primary error type for the booth service.

use crate::config::ConfigError;
use crate::store::StoreError;
use dream_booth_core::domain::{PhaseKind, PhotoId};
use dream_booth_core::ports::PortError;

/// The primary error type for the `booth` service.
#[derive(Debug, thiserror::Error)]
pub enum BoothError {
    /// A required input was empty or out of range. Reported inline, never logged as a failure.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No API key is configured; the caller should ask for credentials and try again.
    #[error("No API key configured")]
    MissingCredentials,

    /// The image service failed, timed out, or answered with something unusable.
    #[error("Image generation failed: {0}")]
    RemoteGeneration(String),

    /// A durable write was rejected. The in-memory state still holds the change.
    #[error("Changes were not saved: {0}")]
    Storage(#[from] StoreError),

    /// A capture is already waiting for confirmation.
    #[error("Another capture is already awaiting confirmation")]
    ConcurrentCapture,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot {action} photo {id} while it is {phase}")]
    InvalidTransition {
        id: PhotoId,
        phase: PhaseKind,
        action: &'static str,
    },

    /// Opening or migrating the settings database failed.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (e.g., creating the data directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience type alias for `Result<T, BoothError>`.
pub type BoothResult<T> = Result<T, BoothError>;
