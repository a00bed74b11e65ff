//! Time-stamped observations.

use crate::variables::Variable;
use ef_common::{SequenceId, TimeId, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed values of some present variables at one time slice.
///
/// Built once and consumed by value:
///
/// ```ignore
/// let e = DynamicAssignment::new(3).with_value(&weather, 1.0);
/// engine.add_dynamic_evidence(e)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicAssignment {
    time_id: TimeId,
    #[serde(default)]
    sequence_id: SequenceId,
    values: BTreeMap<VariableId, f64>,
}

impl DynamicAssignment {
    pub fn new(time_id: TimeId) -> Self {
        Self {
            time_id,
            sequence_id: 0,
            values: BTreeMap::new(),
        }
    }

    pub fn with_sequence(mut self, sequence_id: SequenceId) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    /// Observe `variable = value`. A later call for the same variable wins.
    pub fn with_value(mut self, variable: &Variable, value: f64) -> Self {
        self.values.insert(variable.id(), value);
        self
    }

    pub fn time_id(&self) -> TimeId {
        self.time_id
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    pub fn value(&self, variable: &Variable) -> Option<f64> {
        self.values.get(&variable.id()).copied()
    }

    pub fn value_by_id(&self, id: VariableId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    /// Observed (id, value) pairs in id order.
    pub fn values(&self) -> impl Iterator<Item = (VariableId, f64)> + '_ {
        self.values.iter().map(|(id, v)| (*id, *v))
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.values.contains_key(&variable.id())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
