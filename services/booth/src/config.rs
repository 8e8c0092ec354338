//! services/booth/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Animation pacing for the photo lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleTiming {
    /// How long a print takes to slide out of the camera.
    pub eject: Duration,
    /// How long the developed image takes to fully reveal.
    pub develop: Duration,
    /// Delay between the starts of sibling generations.
    pub stagger: Duration,
    /// Progress update interval.
    pub tick: Duration,
}

impl Default for LifecycleTiming {
    fn default() -> Self {
        Self {
            eject: Duration::from_millis(1500),
            develop: Duration::from_millis(4000),
            stagger: Duration::from_millis(400),
            tick: Duration::from_millis(50),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: Level,
    pub timing: LifecycleTiming,
    /// Copy finished results into the local blob cache so expiring URLs stay viewable.
    pub cache_results: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./booth-data"),
            log_level: Level::INFO,
            timing: LifecycleTiming::default(),
            cache_results: true,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = lookup("BOOTH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Lifecycle pacing ---
        let timing = LifecycleTiming {
            eject: millis_var(&lookup, "BOOTH_EJECT_MS", defaults.timing.eject)?,
            develop: millis_var(&lookup, "BOOTH_DEVELOP_MS", defaults.timing.develop)?,
            stagger: millis_var(&lookup, "BOOTH_STAGGER_MS", defaults.timing.stagger)?,
            tick: millis_var(&lookup, "BOOTH_TICK_MS", defaults.timing.tick)?,
        };
        if timing.tick.is_zero() {
            return Err(ConfigError::InvalidValue(
                "BOOTH_TICK_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let cache_results = match lookup("BOOTH_CACHE_RESULTS") {
            None => defaults.cache_results,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "BOOTH_CACHE_RESULTS".to_string(),
                        format!("'{}' is not a boolean", raw),
                    ))
                }
            },
        };

        Ok(Self {
            data_dir,
            log_level,
            timing,
            cache_results,
        })
    }
}

fn millis_var<F>(lookup: &F, name: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./booth-data"));
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.timing, LifecycleTiming::default());
        assert!(config.cache_results);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOOTH_DATA_DIR", "/tmp/booth"),
            ("RUST_LOG", "debug"),
            ("BOOTH_EJECT_MS", "10"),
            ("BOOTH_CACHE_RESULTS", "off"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/booth"));
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.timing.eject, Duration::from_millis(10));
        assert!(!config.cache_results);
    }

    #[test]
    fn rejects_bad_values() {
        let err = Config::from_lookup(lookup_from(&[("BOOTH_DEVELOP_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "BOOTH_DEVELOP_MS"));

        let err = Config::from_lookup(lookup_from(&[("BOOTH_TICK_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "BOOTH_TICK_MS"));

        let err = Config::from_lookup(lookup_from(&[("RUST_LOG", "chatty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "RUST_LOG"));
    }
}
