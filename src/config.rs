//! Engine settings loading.
//!
//! Operational knobs that do not live on the books themselves: the trash
//! verification retry budget and the reconciliation tolerance. Settings come
//! from an optional TOML file (path in `BUCKET_MIRROR_CONFIG`, default
//! `bucketmirror.toml`) with environment variable overrides on top; every
//! knob has a sensible default so running with no configuration at all is
//! fine.

use std::{path::Path, time::Duration};

use serde::Deserialize;
use tracing::info;

use crate::{
    core::cleanup::VerifyOptions,
    errors::{Error, Result},
};

/// Environment variable naming the settings file.
pub const CONFIG_PATH_VAR: &str = "BUCKET_MIRROR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "bucketmirror.toml";

/// Engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rounds of trash verification before giving up.
    pub verify_max_retries: u32,
    /// Fixed delay between verification rounds, in milliseconds.
    pub verify_delay_ms: u64,
    /// Absolute tolerance for GL vs Bucket balance comparison.
    pub balance_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_max_retries: 5,
            verify_delay_ms: 500,
            balance_tolerance: 0.01,
        }
    }
}

impl EngineConfig {
    /// Loads settings: `.env`, then the optional TOML file, then
    /// environment overrides. A missing file is not an error.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        info!(?config, "engine configuration loaded");
        Ok(config)
    }

    /// Parses settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
            message: format!("Failed to read config file: {e}"),
        })?;
        toml::from_str(&contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config file: {e}"),
        })
    }

    /// Applies `BUCKET_MIRROR_*` environment overrides in place. Unparsable
    /// values are ignored in favor of the current setting.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = parse_override::<u32>(&get, "BUCKET_MIRROR_VERIFY_RETRIES") {
            self.verify_max_retries = v;
        }
        if let Some(v) = parse_override::<u64>(&get, "BUCKET_MIRROR_VERIFY_DELAY_MS") {
            self.verify_delay_ms = v;
        }
        if let Some(v) = parse_override::<f64>(&get, "BUCKET_MIRROR_BALANCE_TOLERANCE") {
            self.balance_tolerance = v;
        }
    }

    /// The verification retry policy derived from these settings.
    #[must_use]
    pub fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            max_retries: self.verify_max_retries,
            delay: Duration::from_millis(self.verify_delay_ms),
        }
    }
}

fn parse_override<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    get(name)?.trim().parse().ok()
}
