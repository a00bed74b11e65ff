//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::engine::EngineConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: [&str; 2] = ["human", "jsonl"];

/// Validate an engine configuration semantically.
pub fn validate_config(config: &EngineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.inference.max_joint_states == 0 {
        return Err(ValidationError::InvalidValue {
            field: "inference.max_joint_states".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    let pseudocount = config.learning.multinomial_pseudocount;
    if !pseudocount.is_finite() || pseudocount < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "learning.multinomial_pseudocount".to_string(),
            message: format!("Must be finite and non-negative, got {}", pseudocount),
        });
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ValidationError::InvalidValue {
            field: "logging.level".to_string(),
            message: format!("Must be one of {:?}, got {}", LOG_LEVELS, config.logging.level),
        });
    }

    let format = config.logging.format.to_ascii_lowercase();
    if !LOG_FORMATS.contains(&format.as_str()) {
        return Err(ValidationError::InvalidValue {
            field: "logging.format".to_string(),
            message: format!(
                "Must be one of {:?}, got {}",
                LOG_FORMATS, config.logging.format
            ),
        });
    }

    Ok(())
}
