//! Conditional distributions p(X | parents) over finite parents.
//!
//! One family instance per parent configuration. Configurations are
//! numbered in mixed radix with the last parent varying fastest, so the
//! configuration `[s_0, .., s_{n-1}]` has index
//! `((s_0 · r_1 + s_1) · r_2 + ..) · r_{n-1} + s_{n-1}`.

use super::{check_dimension, new_distribution, ExponentialFamily};
use super::{ParameterVector, SufficientStatistics};
use crate::variables::Variable;
use ef_common::{Error, Result};
use rand::RngCore;
use std::sync::Arc;

#[derive(Debug)]
pub struct ConditionalDistribution {
    variable: Arc<Variable>,
    parents: Vec<Arc<Variable>>,
    radix: Vec<usize>,
    components: Vec<Box<dyn ExponentialFamily>>,
}

impl ConditionalDistribution {
    /// Default-initialised components for every parent configuration.
    ///
    /// Every parent must be finite and distinct from `variable`.
    pub fn new(variable: Arc<Variable>, parents: Vec<Arc<Variable>>) -> Result<Self> {
        let offending: Vec<String> = parents
            .iter()
            .filter(|p| !p.is_finite())
            .map(|p| p.name().to_string())
            .collect();
        if !offending.is_empty() {
            return Err(Error::configuration(
                format!("parents of {} must be finite", variable.name()),
                offending,
            ));
        }
        if parents.iter().any(|p| p.id() == variable.id()) {
            return Err(Error::configuration(
                "a variable cannot be its own parent",
                [variable.name()],
            ));
        }

        let radix: Vec<usize> = parents
            .iter()
            .map(|p| p.number_of_states().unwrap_or(1))
            .collect();
        let configurations = radix
            .iter()
            .try_fold(1usize, |acc, r| acc.checked_mul(*r))
            .ok_or_else(|| {
                Error::configuration(
                    format!("parent configurations of {} overflow", variable.name()),
                    parents.iter().map(|p| p.name().to_string()),
                )
            })?;

        let components = (0..configurations)
            .map(|_| new_distribution(Arc::clone(&variable)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            variable,
            parents,
            radix,
            components,
        })
    }

    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    pub fn parents(&self) -> &[Arc<Variable>] {
        &self.parents
    }

    pub fn number_of_parent_configurations(&self) -> usize {
        self.components.len()
    }

    /// Mixed-radix index of a parent configuration.
    pub fn parent_configuration_index(&self, parent_states: &[usize]) -> Result<usize> {
        check_dimension(self.radix.len(), parent_states.len())?;
        let mut index = 0usize;
        for ((state, radix), parent) in parent_states.iter().zip(&self.radix).zip(&self.parents) {
            if state >= radix {
                return Err(Error::Precondition(format!(
                    "state {} out of range for parent {} ({} states)",
                    state,
                    parent.name(),
                    radix
                )));
            }
            index = index * radix + state;
        }
        Ok(index)
    }

    /// Parent states of configuration `index`.
    pub fn parent_configuration(&self, index: usize) -> Result<Vec<usize>> {
        if index >= self.components.len() {
            return Err(Error::Precondition(format!(
                "parent configuration {} out of range ({})",
                index,
                self.components.len()
            )));
        }
        let mut rest = index;
        let mut states = vec![0; self.radix.len()];
        for (slot, radix) in states.iter_mut().zip(&self.radix).rev() {
            *slot = rest % radix;
            rest /= radix;
        }
        Ok(states)
    }

    pub fn component(&self, index: usize) -> Result<&dyn ExponentialFamily> {
        self.components
            .get(index)
            .map(|c| c.as_ref())
            .ok_or_else(|| self.out_of_range(index))
    }

    pub fn component_mut(&mut self, index: usize) -> Result<&mut dyn ExponentialFamily> {
        let len = self.components.len();
        match self.components.get_mut(index) {
            Some(component) => Ok(component.as_mut()),
            None => Err(Error::Precondition(format!(
                "parent configuration {} out of range ({})",
                index, len
            ))),
        }
    }

    /// Component for the given parent states.
    pub fn component_for(&self, parent_states: &[usize]) -> Result<&dyn ExponentialFamily> {
        let index = self.parent_configuration_index(parent_states)?;
        self.component(index)
    }

    /// Replace one component. It must be bound to this distribution's variable.
    pub fn set_component(&mut self, index: usize, component: Box<dyn ExponentialFamily>) -> Result<()> {
        if component.variable().id() != self.variable.id()
            || component.distribution_type() != self.variable.distribution_type()
        {
            return Err(Error::Precondition(format!(
                "component for {} is bound to {} ({})",
                self.variable.name(),
                component.variable().name(),
                component.distribution_type()
            )));
        }
        if index >= self.components.len() {
            return Err(self.out_of_range(index));
        }
        self.components[index] = component;
        Ok(())
    }

    pub fn components(&self) -> impl Iterator<Item = &dyn ExponentialFamily> {
        self.components.iter().map(|c| c.as_ref())
    }

    /// log p(value | parent_states).
    pub fn log_conditional_probability(&self, value: f64, parent_states: &[usize]) -> Result<f64> {
        self.component_for(parent_states)?.log_probability(value)
    }

    /// Statistics of one observation laid out in blocks, one per configuration,
    /// with only the active configuration's block filled.
    pub fn sufficient_statistics(&self, value: f64, parent_states: &[usize]) -> Result<SufficientStatistics> {
        let index = self.parent_configuration_index(parent_states)?;
        let component = self.component(index)?;
        let block = component.size_of_sufficient_statistics();
        let local = component.sufficient_statistics(value)?;
        let mut stats = ParameterVector::zeros(self.size_of_sufficient_statistics());
        for (offset, v) in local.iter().enumerate() {
            stats[index * block + offset] = *v;
        }
        Ok(stats)
    }

    pub fn size_of_sufficient_statistics(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.size_of_sufficient_statistics())
            .sum()
    }

    pub fn random_initialization(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        for component in &mut self.components {
            component.random_initialization(rng)?;
        }
        Ok(())
    }

    pub fn fix_numerical_instability(&mut self) {
        for component in &mut self.components {
            component.fix_numerical_instability();
        }
    }

    /// Independent copy bound to `variable` and `parents`.
    pub fn deep_copy(&self, variable: Arc<Variable>, parents: Vec<Arc<Variable>>) -> Result<Self> {
        check_dimension(self.parents.len(), parents.len())?;
        let radix: Vec<usize> = parents
            .iter()
            .map(|p| p.number_of_states().unwrap_or(0))
            .collect();
        if radix != self.radix || variable.distribution_type() != self.variable.distribution_type() {
            return Err(Error::Precondition(format!(
                "cannot rebind {} onto {} with a different shape",
                self.variable.name(),
                variable.name()
            )));
        }
        Ok(Self {
            components: self
                .components
                .iter()
                .map(|c| c.deep_copy(Arc::clone(&variable)))
                .collect(),
            variable,
            parents,
            radix,
        })
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::Precondition(format!(
            "parent configuration {} out of range ({})",
            index,
            self.components.len()
        ))
    }
}

impl Clone for ConditionalDistribution {
    fn clone(&self) -> Self {
        Self {
            variable: Arc::clone(&self.variable),
            parents: self.parents.clone(),
            radix: self.radix.clone(),
            components: self
                .components
                .iter()
                .map(|c| c.deep_copy(Arc::clone(&self.variable)))
                .collect(),
        }
    }
}
