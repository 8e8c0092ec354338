//! services/booth/src/telemetry.rs
//!
//! Tracing subscriber setup for hosts embedding the booth.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Returns `false` if one was already installed.
pub fn init(level: Level) -> bool {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
