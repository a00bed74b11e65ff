//! Log-domain math utilities for exponential-family models.

pub mod math;

pub use math::gamma::*;
pub use math::normal::*;
pub use math::stable::*;
