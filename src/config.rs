//! Probe configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read probe config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse probe config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid probe config: {0}")]
    Invalid(String),
}

/// Knobs for a probe run. Every field has a default, so a partial JSON file
/// (or `{}`) is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Cap on samples classified individually (k). Temporal metrics always
    /// use every sample regardless of this cap.
    pub max_classified_samples: usize,
    /// OpenRouter model id used by the semantic classifier.
    pub classifier_model: String,
    /// OpenRouter model id used to generate samples.
    pub generator_model: String,
    pub classifier_temperature: f32,
    pub generation_temperature: f32,
    pub max_classifier_tokens: u32,
    pub max_generation_tokens: u32,
    /// Samples to generate when the request supplies none.
    pub default_sample_count: usize,
    /// Concurrent generation requests.
    pub generation_concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_classified_samples: 10,
            classifier_model: "openai/gpt-4o-mini".to_string(),
            generator_model: "openai/gpt-4o-mini".to_string(),
            classifier_temperature: 0.0,
            generation_temperature: 0.9,
            max_classifier_tokens: 600,
            max_generation_tokens: 512,
            default_sample_count: 5,
            generation_concurrency: 4,
        }
    }
}

impl ProbeConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ProbeConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_classified_samples == 0 {
            return Err(ConfigError::Invalid(
                "max_classified_samples must be >= 1".to_string(),
            ));
        }
        if self.classifier_model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "classifier_model must be non-empty".to_string(),
            ));
        }
        if self.generation_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "generation_concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
