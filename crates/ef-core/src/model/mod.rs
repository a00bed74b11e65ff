//! Network structure and parameters.

pub mod bridge;
pub mod dag;
pub mod network;

pub use bridge::{
    DescriptionConverter, DistributionDescription, NetworkConverter, NetworkDescription, ParentRef,
    StateSpaceDescription, VariableDescription,
};
pub use dag::DynamicDag;
pub use network::DynamicBayesianNetwork;
