//! Typed engine configuration.
//!
//! Every section is optional in the file; missing fields take the defaults
//! below.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::validate::{ValidationError, ValidationResult};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Schema version of the file.
    pub schema_version: String,

    /// Inference engine limits.
    pub inference: InferenceConfig,

    /// Parameter learning settings.
    pub learning: LearningConfig,

    /// Logging defaults (environment variables override these).
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            inference: InferenceConfig::default(),
            learning: LearningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Limits for the forward filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Largest joint state space over the finite variables of one slice.
    pub max_joint_states: usize,

    /// Largest `n` accepted by a predictive query.
    pub max_predictive_horizon: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_joint_states: 1 << 16,
            max_predictive_horizon: 10_000,
        }
    }
}

/// Maximum-likelihood learning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Pseudo-count added to every multinomial cell.
    pub multinomial_pseudocount: f64,

    /// Seed for random parameter initialization.
    pub seed: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            multinomial_pseudocount: 1.0,
            seed: 0,
        }
    }
}

/// Logging defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of error, warn, info, debug, trace.
    pub level: String,

    /// `human` or `jsonl`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "human".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file.
    ///
    /// `.json` files are parsed as JSON; anything else as TOML.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> ValidationResult<Self> {
        toml::from_str(content)
            .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))
    }

    /// Parse configuration from a JSON string.
    pub fn from_json_str(content: &str) -> ValidationResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }
}
