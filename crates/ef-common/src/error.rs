//! Error types for the exponential-family DBN engine.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for callers that retry or rebind
//!
//! # Structured Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 30,
//!   "category": "unsupported",
//!   "message": "truncated_exponential does not support update_natural_from_moment",
//!   "recoverable": false,
//!   "context": { "family": "truncated_exponential", "operation": "update_natural_from_moment" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Model or engine configuration errors.
    Config,
    /// An operation was called in the wrong state or with invalid input.
    Precondition,
    /// A family does not implement the requested operation.
    Unsupported,
    /// Inference and numerical errors.
    Inference,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Precondition => write!(f, "precondition"),
            ErrorCategory::Unsupported => write!(f, "unsupported"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {message} (offending: {})", .offending.join(", "))]
    Configuration {
        message: String,
        offending: Vec<String>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    // Precondition errors (20-29)
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("no posterior available: no evidence has been incorporated")]
    NoPosterior,

    // Unsupported operations (30-39)
    #[error("{family} does not support {operation}")]
    Unsupported {
        family: &'static str,
        operation: &'static str,
    },

    // Inference errors (40-49)
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a configuration error naming the offending items.
    pub fn configuration<I, S>(message: impl Into<String>, offending: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Error::Configuration {
            message: message.into(),
            offending: offending.into_iter().map(Into::into).collect(),
        }
    }

    /// Build an unsupported-operation error.
    pub fn unsupported(family: &'static str, operation: &'static str) -> Self {
        Error::Unsupported { family, operation }
    }

    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Precondition errors
    /// - 30-39: Unsupported operations
    /// - 40-49: Inference and numerical errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Configuration { .. } => 10,
            Error::Config(_) => 11,
            Error::Precondition(_) => 20,
            Error::DimensionMismatch { .. } => 21,
            Error::UnknownVariable(_) => 22,
            Error::NoPosterior => 23,
            Error::Unsupported { .. } => 30,
            Error::Inference(_) => 40,
            Error::NumericalInstability(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Toml(_) => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Configuration { .. } | Error::Config(_) => ErrorCategory::Config,

            Error::Precondition(_)
            | Error::DimensionMismatch { .. }
            | Error::UnknownVariable(_)
            | Error::NoPosterior => ErrorCategory::Precondition,

            Error::Unsupported { .. } => ErrorCategory::Unsupported,

            Error::Inference(_) | Error::NumericalInstability(_) => ErrorCategory::Inference,

            Error::Io(_) | Error::Json(_) | Error::Toml(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Recoverable errors may be resolved by:
    /// - Fixing the model or configuration and rebinding
    /// - Calling the operation again after the missing step (e.g. evidence)
    /// - Reinitializing parameters
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Configuration { .. } => true,
            Error::Config(_) => true,

            Error::Precondition(_) => true,
            Error::DimensionMismatch { .. } => false, // Caller bug
            Error::UnknownVariable(_) => false,
            Error::NoPosterior => true, // Add evidence and run inference

            // The family will never support it
            Error::Unsupported { .. } => false,

            // Evidence is discarded; the previous belief is intact
            Error::Inference(_) => true,
            Error::NumericalInstability(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => true,
            Error::Toml(_) => true,
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., offending variables).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::Configuration { offending, .. } => {
                context.insert("offending".to_string(), serde_json::json!(offending));
            }
            Error::DimensionMismatch { expected, actual } => {
                context.insert("expected".to_string(), serde_json::json!(expected));
                context.insert("actual".to_string(), serde_json::json!(actual));
            }
            Error::UnknownVariable(name) => {
                context.insert("variable".to_string(), serde_json::json!(name));
            }
            Error::Unsupported { family, operation } => {
                context.insert("family".to_string(), serde_json::json!(family));
                context.insert("operation".to_string(), serde_json::json!(operation));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
