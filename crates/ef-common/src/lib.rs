//! Common types for the exponential-family DBN workspace.
//!
//! This crate provides foundational types shared by the other crates:
//! - The unified error taxonomy with stable codes
//! - Identifier newtypes for variables and time slices

pub mod error;
pub mod id;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use id::{SequenceId, TimeId, VariableId};
