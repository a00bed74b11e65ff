//! Joint state space over the finite variables of one slice.

use crate::variables::{DynamicVariables, Variable};
use ef_common::{Error, Result};
use std::sync::Arc;

/// Mixed-radix enumeration of the finite present variables, last variable
/// fastest.
#[derive(Debug, Clone)]
pub(crate) struct JointSpace {
    finite: Vec<Arc<Variable>>,
    radix: Vec<usize>,
    /// Position inside `finite` by present-variable index.
    slots: Vec<Option<usize>>,
    size: usize,
}

impl JointSpace {
    /// Enumerate `variables`, refusing joint spaces larger than `max_states`.
    pub(crate) fn new(variables: &DynamicVariables, max_states: usize) -> Result<Self> {
        let finite: Vec<Arc<Variable>> = variables.iter().filter(|v| v.is_finite()).cloned().collect();
        let radix: Vec<usize> = finite
            .iter()
            .map(|v| v.number_of_states().unwrap_or(1))
            .collect();
        let offending = || finite.iter().map(|v| v.name().to_string()).collect::<Vec<_>>();
        let size = radix
            .iter()
            .try_fold(1usize, |acc, r| acc.checked_mul(*r))
            .filter(|size| *size <= max_states)
            .ok_or_else(|| {
                Error::configuration(
                    format!("joint state space exceeds {} states", max_states),
                    offending(),
                )
            })?;

        let mut slots = vec![None; variables.len()];
        for (slot, variable) in finite.iter().enumerate() {
            slots[variable.index()] = Some(slot);
        }
        Ok(Self {
            finite,
            radix,
            slots,
            size,
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Position of a present (or interface) variable's digit.
    pub(crate) fn slot_of(&self, variable: &Variable) -> Option<usize> {
        self.slots.get(variable.index()).copied().flatten()
    }

    pub(crate) fn finite(&self) -> &[Arc<Variable>] {
        &self.finite
    }

    /// Digits of joint state `index`.
    pub(crate) fn digits(&self, index: usize) -> Vec<usize> {
        let mut rest = index;
        let mut digits = vec![0; self.radix.len()];
        for (digit, radix) in digits.iter_mut().zip(&self.radix).rev() {
            *digit = rest % radix;
            rest /= radix;
        }
        digits
    }

    /// Digits of every joint state, in index order.
    pub(crate) fn all_digits(&self) -> Vec<Vec<usize>> {
        (0..self.size).map(|j| self.digits(j)).collect()
    }
}
