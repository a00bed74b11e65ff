//! Dynamic inference over a bound network.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --set_model--> Ready --add_dynamic_evidence / run_inference--> Evidenced
//!                       ^                                                 |
//!                       +--------------------- reset ---------------------+
//! ```
//!
//! Evidence is validated when added and incorporated only by
//! [`DynamicInference::run_inference`]. Posterior queries take `&self` and
//! never change the belief.

pub mod assignment;
pub mod forward;
pub(crate) mod joint;

pub use assignment::DynamicAssignment;
pub use forward::ForwardFilter;

use crate::distribution::UnivariateDistribution;
use crate::model::DynamicBayesianNetwork;
use crate::variables::Variable;
use ef_common::{Result, TimeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of an inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No model bound.
    Idle,
    /// Model bound, no evidence incorporated yet.
    Ready,
    /// At least one batch of evidence incorporated.
    Evidenced,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Idle => "idle",
            EngineState::Ready => "ready",
            EngineState::Evidenced => "evidenced",
        };
        write!(f, "{}", s)
    }
}

/// Contract of a dynamic inference engine.
pub trait DynamicInference {
    /// Bind a network. Valid from `Idle` and `Ready`; discards pending
    /// evidence and any belief.
    fn set_model(&mut self, model: Arc<DynamicBayesianNetwork>) -> Result<()>;

    /// The bound network.
    fn original_model(&self) -> Result<&Arc<DynamicBayesianNetwork>>;

    /// Validate and queue one time-stamped assignment.
    fn add_dynamic_evidence(&mut self, assignment: DynamicAssignment) -> Result<()>;

    /// Incorporate all pending evidence. A no-op when nothing is pending.
    fn run_inference(&mut self) -> Result<()>;

    /// Drop evidence and belief, keeping the model.
    fn reset(&mut self) -> Result<()>;

    /// Posterior of `variable` at [`time_of_last_evidence`](Self::time_of_last_evidence).
    fn filtered_posterior(&self, variable: &Variable) -> Result<UnivariateDistribution>;

    /// Posterior of `variable` `steps` slices after the last evidence.
    fn predictive_posterior(&self, variable: &Variable, steps: u64) -> Result<UnivariateDistribution>;

    /// Time of the latest incorporated evidence.
    fn time_of_last_evidence(&self) -> Option<TimeId>;

    /// Time the most recent successful posterior query referred to.
    fn time_of_posterior(&self) -> Option<TimeId>;

    fn state(&self) -> EngineState;
}
