//! Configuration types for PyKitchen.
//!
//! Configuration is read from `pykitchen.json`. Every field has a default,
//! so a missing file or an empty object yields a playable setup with the
//! bundled catalog and offline hints unless an API key is present.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{KitchenError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "pykitchen.json";

/// Default model identifier for generated hints.
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

/// Default environment variable holding the hint API key.
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default endpoint of the Generative Language API.
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// Default timeout in seconds for a hint request.
const fn default_hint_timeout() -> u64 {
    20
}

/// Default pause between a successful run and the next order.
const fn default_advance_delay_ms() -> u64 {
    1500
}

/// Default pause before suggesting the hint feature.
const fn default_nudge_delay_ms() -> u64 {
    800
}

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to a catalog JSON file. The bundled catalog is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// Hint advisor settings.
    #[serde(default)]
    pub hint: HintConfig,

    /// Timed pauses between game events.
    #[serde(default)]
    pub pacing: PacingConfig,
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            KitchenError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `pykitchen.json` from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `KitchenError::ConfigValidationError` if the values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(KitchenError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| KitchenError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - `catalog`, when set, must not be blank
    /// - `hint.model` and `hint.apiKeyEnv` must not be blank
    /// - `hint.baseUrl` must be an http(s) URL
    /// - `hint.timeoutSeconds` must be greater than 0
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(KitchenError::config_validation(
                "catalog path must not be empty",
                "Remove 'catalog' from your pykitchen.json to use the bundled catalog",
            ));
        }

        if self.hint.model.trim().is_empty() {
            return Err(KitchenError::config_validation(
                "hint.model must not be empty",
                "Set hint.model to a model identifier such as 'gemini-2.5-flash' in your pykitchen.json",
            ));
        }

        if self.hint.api_key_env.trim().is_empty() {
            return Err(KitchenError::config_validation(
                "hint.apiKeyEnv must not be empty",
                "Set hint.apiKeyEnv to the environment variable holding your API key (default: GEMINI_API_KEY)",
            ));
        }

        if !(self.hint.base_url.starts_with("http://") || self.hint.base_url.starts_with("https://")) {
            return Err(KitchenError::config_validation(
                format!("hint.baseUrl '{}' is not an http(s) URL", self.hint.base_url),
                "Set hint.baseUrl to a URL starting with https:// in your pykitchen.json",
            ));
        }

        if self.hint.timeout_seconds == 0 {
            return Err(KitchenError::config_validation(
                "hint.timeoutSeconds must be greater than 0",
                "Set hint.timeoutSeconds to at least 1 second in your pykitchen.json",
            ));
        }

        Ok(())
    }

    /// Loads the configured catalog, or the bundled one.
    ///
    /// Relative catalog paths are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if the file cannot be read, parsed or validated.
    pub fn load_catalog(&self, base_dir: &Path) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load_from_file(&base_dir.join(path)),
            None => Catalog::builtin(),
        }
    }
}

/// Where generated hints come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HintProvider {
    /// Google Gemini through the Generative Language API (default).
    #[default]
    Gemini,
    /// Static hints only, even when an API key is present.
    Offline,
}

impl HintProvider {
    /// Parses a string into a `HintProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for HintProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid hint provider '{s}': expected one of 'gemini', 'offline'"
            ))
        })
    }
}

impl Serialize for HintProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Gemini => "gemini",
            Self::Offline => "offline",
        };
        serializer.serialize_str(s)
    }
}

/// Hint advisor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintConfig {
    /// Hint source.
    #[serde(default)]
    pub provider: HintProvider,

    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable the API key is read from.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on a single hint request, in seconds.
    #[serde(default = "default_hint_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            provider: HintProvider::default(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_seconds: default_hint_timeout(),
        }
    }
}

/// Timed pauses between game events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingConfig {
    /// Pause between a successful run and the next order, in milliseconds.
    #[serde(default = "default_advance_delay_ms")]
    pub advance_delay_ms: u64,

    /// Pause before the "press hint" nudge, in milliseconds.
    #[serde(default = "default_nudge_delay_ms")]
    pub nudge_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            advance_delay_ms: default_advance_delay_ms(),
            nudge_delay_ms: default_nudge_delay_ms(),
        }
    }
}

impl PacingConfig {
    /// Pacing without pauses, for scripted play.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            advance_delay_ms: 0,
            nudge_delay_ms: 0,
        }
    }

    /// Delay before advancing to the next order.
    #[must_use]
    pub const fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.advance_delay_ms)
    }

    /// Delay before the hint nudge.
    #[must_use]
    pub const fn nudge_delay(&self) -> Duration {
        Duration::from_millis(self.nudge_delay_ms)
    }
}
