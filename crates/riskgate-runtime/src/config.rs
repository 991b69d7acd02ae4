//! Runtime configuration, loaded from YAML or JSON.
//!
//! Every section has defaults, so an empty document is a valid config:
//!
//! ```yaml
//! provider:
//!   kind: openai
//!   options:
//!     base_url: https://api.openai.com/v1   # api_key falls back to OPENAI_API_KEY
//! generation:
//!   model: gpt-4o-mini
//!   temperature: 0.0
//!   max_tokens: 800
//!   timeout: 30s
//! retrieval:
//!   k: 4
//! grounding:
//!   threshold: 0.75
//! audit:
//!   enabled: true
//!   directory: reports/raw_responses
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::providers::CompletionConfig;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub grounding: GroundingSettings,
    pub audit: AuditSettings,
}

/// Which provider to build and its provider-specific options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: String,

    /// Passed verbatim to the provider factory.
    pub options: JsonValue,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: "openai".to_string(),
            options: JsonValue::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,

    /// 0.0 keeps generation as repeatable as the backend allows.
    pub temperature: f32,

    pub max_tokens: u32,

    /// Upper bound on one generation call, e.g. "30s" or "1m 30s".
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 800,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GenerationSettings {
    /// The per-request settings handed to the provider.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Passages retrieved per transaction.
    pub k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: crate::retrieval::DEFAULT_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundingSettings {
    pub threshold: f64,
}

impl Default for GroundingSettings {
    fn default() -> Self {
        Self {
            threshold: riskgate_core::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub enabled: bool,

    /// Daily JSONL files are written here.
    pub directory: PathBuf,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("reports/raw_responses"),
        }
    }
}

/// Serde helpers for `Duration` as a humantime string ("30s", "2m").
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl RuntimeConfig {
    /// Parse a config from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.kind.trim().is_empty() {
            return Err(ConfigError::Validation("provider.kind is empty".to_string()));
        }

        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::Validation("generation.model is empty".to_string()));
        }

        let temperature = self.generation.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Validation(format!(
                "generation.temperature must be within [0, 2], got {}",
                temperature
            )));
        }

        if self.retrieval.k == 0 {
            return Err(ConfigError::Validation(
                "retrieval.k must be at least 1".to_string(),
            ));
        }

        let threshold = self.grounding.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Validation(format!(
                "grounding.threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        Ok(())
    }
}
