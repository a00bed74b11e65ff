//! Exponential-family core and dynamic inference for dynamic Bayesian networks.
//!
//! This library provides:
//! - Parameter vectors and the exponential-family contract
//! - Truncated exponential, Normal, Gamma and Multinomial families
//! - Conditional distributions over finite parent configurations
//! - Variables, the two-slice DAG and the dynamic network container
//! - Exact forward filtering with filtered and predictive posteriors
//! - Maximum-likelihood parameter learning from complete sequences
//! - A conversion seam for externally described networks

pub mod distribution;
pub mod exponential_family;
pub mod inference;
pub mod learning;
pub mod logging;
pub mod model;
pub mod variables;

pub use distribution::UnivariateDistribution;
pub use ef_common::{Error, ErrorCategory, Result, SequenceId, TimeId, VariableId};
pub use ef_config::EngineConfig;
pub use exponential_family::{
    new_distribution, ConditionalDistribution, ExponentialFamily, ParameterVector,
};
pub use inference::{DynamicAssignment, DynamicInference, EngineState, ForwardFilter};
pub use learning::MaximumLikelihood;
pub use model::{DynamicBayesianNetwork, DynamicDag};
pub use variables::{DistributionType, DynamicVariables, StateSpaceKind, StateSpaceType, Variable};
