//! Lexicon configuration
//!
//! Resolved from, lowest to highest priority:
//! 1. built-in defaults
//! 2. an optional JSON file
//! 3. `ROOTS_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "ROOTS_DB_PATH";
/// Environment variable overriding the gloss endpoint; empty disables fetching
pub const GLOSS_ENDPOINT_ENV: &str = "ROOTS_GLOSS_ENDPOINT";
/// Environment variable overriding the gloss timeout in seconds
pub const GLOSS_TIMEOUT_ENV: &str = "ROOTS_GLOSS_TIMEOUT_SECS";

pub const DEFAULT_GLOSS_ENDPOINT: &str = "https://api.quran.com/api/v4/verses/by_key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub db_path: PathBuf,
    /// `None` runs without a gloss service
    pub gloss_endpoint: Option<String>,
    pub gloss_timeout_secs: u64,
    pub gloss_language: String,
    pub default_related_limit: usize,
    pub max_related_limit: usize,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    /// Neighbouring verses returned by `context`
    pub context_size: u16,
    pub strip_bismillah: bool,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/quran.db"),
            gloss_endpoint: Some(DEFAULT_GLOSS_ENDPOINT.to_string()),
            gloss_timeout_secs: 10,
            gloss_language: "en".to_string(),
            default_related_limit: 10,
            max_related_limit: 25,
            default_search_limit: 25,
            max_search_limit: 50,
            context_size: 6,
            strip_bismillah: true,
        }
    }
}

impl LexiconConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Defaults, then `path` if given, then the environment. The result is
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ROOTS_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = lookup(DB_PATH_ENV) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(endpoint) = lookup(GLOSS_ENDPOINT_ENV) {
            let endpoint = endpoint.trim();
            self.gloss_endpoint = (!endpoint.is_empty()).then(|| endpoint.to_string());
        }
        if let Some(secs) = lookup(GLOSS_TIMEOUT_ENV) {
            self.gloss_timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a whole number of seconds, got {:?}", GLOSS_TIMEOUT_ENV, secs))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("gloss_timeout_secs", self.gloss_timeout_secs as usize),
            ("default_related_limit", self.default_related_limit),
            ("max_related_limit", self.max_related_limit),
            ("default_search_limit", self.default_search_limit),
            ("max_search_limit", self.max_search_limit),
            ("context_size", usize::from(self.context_size)),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
            }
        }
        if self.default_related_limit > self.max_related_limit {
            return Err(ConfigError::Invalid(
                "default_related_limit exceeds max_related_limit".to_string(),
            ));
        }
        if self.default_search_limit > self.max_search_limit {
            return Err(ConfigError::Invalid(
                "default_search_limit exceeds max_search_limit".to_string(),
            ));
        }
        if self.gloss_language.trim().is_empty() {
            return Err(ConfigError::Invalid("gloss_language is empty".to_string()));
        }
        Ok(())
    }

    pub fn gloss_timeout(&self) -> Duration {
        Duration::from_secs(self.gloss_timeout_secs)
    }

    /// Clamp a caller's related-verse limit to `[1, max_related_limit]`.
    pub fn related_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_related_limit)
            .clamp(1, self.max_related_limit)
    }

    /// Clamp a caller's search limit to `[1, max_search_limit]`.
    pub fn search_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_search_limit)
            .clamp(1, self.max_search_limit)
    }
}
