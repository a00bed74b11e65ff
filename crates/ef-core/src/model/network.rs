//! Dynamic Bayesian network: variables, DAG and conditional distributions
//! for the first slice and for the transition.

use super::dag::DynamicDag;
use crate::exponential_family::ConditionalDistribution;
use crate::inference::DynamicAssignment;
use crate::variables::{DynamicVariables, Variable};
use ef_common::{Error, Result};
use rand::RngCore;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DynamicBayesianNetwork {
    variables: Arc<DynamicVariables>,
    dag: DynamicDag,
    time0: Vec<ConditionalDistribution>,
    time_t: Vec<ConditionalDistribution>,
}

impl DynamicBayesianNetwork {
    /// Validate `dag` and attach a default distribution to every variable in
    /// both slices.
    pub fn new(dag: DynamicDag) -> Result<Self> {
        dag.validate()?;
        let variables = Arc::clone(dag.variables());
        let mut time0 = Vec::with_capacity(variables.len());
        let mut time_t = Vec::with_capacity(variables.len());
        for variable in variables.iter() {
            time0.push(ConditionalDistribution::new(
                Arc::clone(variable),
                dag.parents_time0(variable)?.to_vec(),
            )?);
            time_t.push(ConditionalDistribution::new(
                Arc::clone(variable),
                dag.parents_time_t(variable)?.to_vec(),
            )?);
        }
        Ok(Self {
            variables,
            dag,
            time0,
            time_t,
        })
    }

    pub fn variables(&self) -> &Arc<DynamicVariables> {
        &self.variables
    }

    pub fn dag(&self) -> &DynamicDag {
        &self.dag
    }

    pub fn conditional_time0(&self, variable: &Variable) -> Result<&ConditionalDistribution> {
        let slot = self.present_slot(variable)?;
        Ok(&self.time0[slot])
    }

    pub fn conditional_time_t(&self, variable: &Variable) -> Result<&ConditionalDistribution> {
        let slot = self.present_slot(variable)?;
        Ok(&self.time_t[slot])
    }

    pub fn conditional_time0_mut(&mut self, variable: &Variable) -> Result<&mut ConditionalDistribution> {
        let slot = self.present_slot(variable)?;
        Ok(&mut self.time0[slot])
    }

    pub fn conditional_time_t_mut(&mut self, variable: &Variable) -> Result<&mut ConditionalDistribution> {
        let slot = self.present_slot(variable)?;
        Ok(&mut self.time_t[slot])
    }

    /// First-slice distributions in variable order.
    pub fn conditionals_time0(&self) -> &[ConditionalDistribution] {
        &self.time0
    }

    /// Transition distributions in variable order.
    pub fn conditionals_time_t(&self) -> &[ConditionalDistribution] {
        &self.time_t
    }

    pub fn random_initialization(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        for cd in self.time0.iter_mut().chain(self.time_t.iter_mut()) {
            cd.random_initialization(rng)?;
        }
        Ok(())
    }

    pub fn fix_numerical_instability(&mut self) {
        for cd in self.time0.iter_mut().chain(self.time_t.iter_mut()) {
            cd.fix_numerical_instability();
        }
    }

    /// Joint log-probability of a fully observed first slice.
    pub fn log_probability_time0(&self, slice: &DynamicAssignment) -> Result<f64> {
        self.time0.iter().try_fold(0.0, |acc, cd| -> Result<f64> {
            let value = require_value(slice, cd.variable())?;
            let states = parent_states(cd, &self.variables, slice, None)?;
            Ok(acc + cd.log_conditional_probability(value, &states)?)
        })
    }

    /// Joint log-probability of a fully observed slice given the previous one.
    pub fn log_probability_transition(
        &self,
        previous: &DynamicAssignment,
        current: &DynamicAssignment,
    ) -> Result<f64> {
        self.time_t.iter().try_fold(0.0, |acc, cd| -> Result<f64> {
            let value = require_value(current, cd.variable())?;
            let states = parent_states(cd, &self.variables, current, Some(previous))?;
            Ok(acc + cd.log_conditional_probability(value, &states)?)
        })
    }

    /// Ancestral sample of slices `0..length`.
    ///
    /// Families without a univariate form (the truncated exponential)
    /// surface `Error::Unsupported`.
    pub fn sample_sequence(&self, length: usize, rng: &mut dyn RngCore) -> Result<Vec<DynamicAssignment>> {
        let order_time0 = self.dag.topological_order_time0()?;
        let order_time_t = self.dag.topological_order_time_t()?;
        let mut sequence: Vec<DynamicAssignment> = Vec::with_capacity(length);
        for t in 0..length {
            let (order, slice) = if t == 0 {
                (&order_time0, &self.time0)
            } else {
                (&order_time_t, &self.time_t)
            };
            let mut current = DynamicAssignment::new(t as u64);
            for &i in order {
                let cd = &slice[i];
                let states = parent_states(cd, &self.variables, &current, sequence.last())?;
                let value = cd
                    .component_for(&states)?
                    .to_univariate_distribution()?
                    .sample(rng)?;
                current = current.with_value(cd.variable(), value);
            }
            sequence.push(current);
        }
        Ok(sequence)
    }

    fn present_slot(&self, variable: &Variable) -> Result<usize> {
        self.variables.check_member(variable)?;
        if variable.is_interface() {
            return Err(Error::Precondition(format!(
                "{} is an interface variable and has no distribution",
                variable.name()
            )));
        }
        Ok(variable.index())
    }
}

fn require_value(slice: &DynamicAssignment, variable: &Variable) -> Result<f64> {
    slice.value(variable).ok_or_else(|| {
        Error::Precondition(format!(
            "slice {} has no value for {}",
            slice.time_id(),
            variable.name()
        ))
    })
}

/// Parent states of `cd`, reading present parents from `current` and
/// interface parents from `previous`.
pub(crate) fn parent_states(
    cd: &ConditionalDistribution,
    variables: &DynamicVariables,
    current: &DynamicAssignment,
    previous: Option<&DynamicAssignment>,
) -> Result<Vec<usize>> {
    cd.parents()
        .iter()
        .map(|parent| {
            let value = if parent.is_interface() {
                let present = variables
                    .present(parent.index())
                    .ok_or_else(|| Error::UnknownVariable(parent.name().to_string()))?;
                previous.and_then(|slice| slice.value(present))
            } else {
                current.value(parent)
            };
            let value = value.ok_or_else(|| {
                Error::Precondition(format!(
                    "no value for parent {} of {}",
                    parent.name(),
                    cd.variable().name()
                ))
            })?;
            parent.state_index(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exponential_family::{Multinomial, ParameterVector};
    use crate::variables::DistributionType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chain() -> (DynamicBayesianNetwork, Arc<Variable>, Arc<Variable>) {
        let mut vars = DynamicVariables::new();
        let s = vars.new_multinomial_variable("S", 2).unwrap();
        let x = vars.new_real_variable("X", DistributionType::Normal).unwrap();
        let vars = Arc::new(vars);
        let s_prev = Arc::clone(vars.interface_of(&s).unwrap());
        let mut dag = DynamicDag::new(Arc::clone(&vars));
        dag.add_parent_time0(&x, &s).unwrap();
        dag.add_parent_time_t(&x, &s).unwrap();
        dag.add_parent_time_t(&s, &s_prev).unwrap();
        (DynamicBayesianNetwork::new(dag).unwrap(), s, x)
    }

    #[test]
    fn test_default_distributions() {
        let (net, s, x) = chain();
        assert_eq!(net.conditional_time0(&s).unwrap().number_of_parent_configurations(), 1);
        assert_eq!(net.conditional_time_t(&s).unwrap().number_of_parent_configurations(), 2);
        assert_eq!(net.conditional_time_t(&x).unwrap().number_of_parent_configurations(), 2);
        let s_prev = net.variables().interface_of(&s).unwrap();
        assert!(net.conditional_time0(s_prev).is_err());
    }

    #[test]
    fn test_log_probability_time0() {
        let (mut net, s, x) = chain();
        let prior = Multinomial::with_probabilities(Arc::clone(&s), &[0.25, 0.75]).unwrap();
        net.conditional_time0_mut(&s)
            .unwrap()
            .set_component(0, Box::new(prior))
            .unwrap();
        let slice = DynamicAssignment::new(0).with_value(&s, 1.0).with_value(&x, 0.0);
        let lp = net.log_probability_time0(&slice).unwrap();
        let expected = 0.75f64.ln() + ef_math::normal_log_pdf(0.0, 0.0, 1.0);
        assert!((lp - expected).abs() < 1e-12);

        let partial = DynamicAssignment::new(0).with_value(&s, 1.0);
        assert!(matches!(
            net.log_probability_time0(&partial),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn test_transition_reads_previous_slice() {
        let (mut net, s, x) = chain();
        let sticky = ParameterVector::from_vec(vec![0.9f64.ln(), 0.1f64.ln()]);
        net.conditional_time_t_mut(&s)
            .unwrap()
            .component_mut(0)
            .unwrap()
            .set_natural_parameters(sticky)
            .unwrap();
        let prev = DynamicAssignment::new(0).with_value(&s, 0.0).with_value(&x, 0.0);
        let cur = DynamicAssignment::new(1).with_value(&s, 0.0).with_value(&x, 0.0);
        let lp = net.log_probability_transition(&prev, &cur).unwrap();
        let expected = 0.9f64.ln() + ef_math::normal_log_pdf(0.0, 0.0, 1.0);
        assert!((lp - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sample_sequence() {
        let (mut net, s, x) = chain();
        let mut rng = StdRng::seed_from_u64(21);
        net.random_initialization(&mut rng).unwrap();
        let seq = net.sample_sequence(5, &mut rng).unwrap();
        assert_eq!(seq.len(), 5);
        for (t, slice) in seq.iter().enumerate() {
            assert_eq!(slice.time_id(), t as u64);
            assert!(s.state_index(slice.value(&s).unwrap()).is_ok());
            assert!(slice.value(&x).unwrap().is_finite());
        }
        assert!(net.log_probability_time0(&seq[0]).unwrap().is_finite());
        assert!(net.log_probability_transition(&seq[0], &seq[1]).unwrap().is_finite());
    }

    #[test]
    fn test_truncated_exponential_cannot_be_sampled() {
        let mut vars = DynamicVariables::new();
        vars.new_real_variable("R", DistributionType::TruncatedExponential)
            .unwrap();
        let net = DynamicBayesianNetwork::new(DynamicDag::new(Arc::new(vars))).unwrap();
        let err = net
            .sample_sequence(1, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }
}
