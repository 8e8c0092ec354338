pub mod adapters;
pub mod app;
pub mod blob_cache;
pub mod config;
pub mod data_url;
pub mod engine;
pub mod error;
pub mod history;
pub mod layout;
pub mod presets;
pub mod store;
pub mod telemetry;
pub mod templates;
