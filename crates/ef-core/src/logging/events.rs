//! Structured event definitions for logging.
//!
//! Events follow a consistent schema for machine-parseable JSONL output.
//! All events carry the engine's run_id and the stage that emitted them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of an engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Engine construction and configuration.
    Init,
    /// Binding a model to the engine.
    Bind,
    /// Evidence validation and queueing.
    Evidence,
    /// Belief propagation over time slices.
    Infer,
    /// Posterior queries.
    Query,
    /// Parameter learning.
    Learn,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Bind => "bind",
            Stage::Evidence => "evidence",
            Stage::Infer => "infer",
            Stage::Query => "query",
            Stage::Learn => "learn",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Model lifecycle
    pub const MODEL_BOUND: &str = "model.bound";
    pub const MODEL_REJECTED: &str = "model.rejected";
    pub const ENGINE_RESET: &str = "engine.reset";

    // Evidence stage
    pub const EVIDENCE_ADDED: &str = "evidence.added";
    pub const EVIDENCE_REJECTED: &str = "evidence.rejected";

    // Infer stage
    pub const INFER_STARTED: &str = "infer.started";
    pub const INFER_SLICE_DONE: &str = "infer.slice_done";
    pub const INFER_FINISHED: &str = "infer.finished";
    pub const INFER_FAILED: &str = "infer.failed";

    // Query stage
    pub const POSTERIOR_QUERIED: &str = "posterior.queried";

    // Learn stage
    pub const LEARN_SEQUENCE_ADDED: &str = "learn.sequence_added";
    pub const LEARN_COMMITTED: &str = "learn.committed";
}

/// A structured log event for JSONL output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// Log level.
    pub level: Level,

    /// Event name (e.g., "model.bound", "infer.finished").
    pub event: String,

    /// Unique ID of the engine instance.
    pub run_id: String,

    /// Current stage.
    pub stage: Stage,

    /// Human-readable message.
    pub message: String,

    /// Additional structured fields (stable keys).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,

    /// Time slice the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_id: Option<u64>,
}

impl LogEvent {
    /// Create a new log event with required fields.
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            stage,
            message: message.into(),
            fields: HashMap::new(),
            time_id: None,
        }
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Set the time slice.
    pub fn with_time_id(mut self, time_id: u64) -> Self {
        self.time_id = Some(time_id);
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Context for generating log events with a consistent run ID.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID of the engine instance.
    pub run_id: String,
}

impl LogContext {
    /// Create a new log context.
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }

    /// Create a context with a freshly generated run ID.
    pub fn generate() -> Self {
        Self::new(super::generate_run_id())
    }

    /// Create an event with this context.
    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent::new(level, event, &self.run_id, stage, message)
    }

    /// Shortcut for info-level event.
    pub fn info(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    /// Shortcut for debug-level event.
    pub fn debug(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Debug, event, stage, message)
    }
}
