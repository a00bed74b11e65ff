//! Identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-slice index of a dynamic model. Slice 0 uses the time-0
/// distributions; every later slice uses the transition distributions.
pub type TimeId = u64;

/// Identifier of a data sequence. Evidence from different sequences is
/// never mixed by the engine.
pub type SequenceId = u64;

/// Index of a variable inside its owning variable set.
///
/// Present variables and their interface twins get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub usize);

impl VariableId {
    /// Position of the variable in its set.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<usize> for VariableId {
    fn from(index: usize) -> Self {
        VariableId(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_id_display() {
        assert_eq!(VariableId(3).to_string(), "v3");
        assert_eq!(VariableId::from(7).index(), 7);
    }

    #[test]
    fn test_variable_id_serializes_transparently() {
        let json = serde_json::to_string(&VariableId(4)).unwrap();
        assert_eq!(json, "4");
        let back: VariableId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VariableId(4));
    }
}
