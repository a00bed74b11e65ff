//! Categorical distribution over the states of a finite variable.
//!
//! η_k = ln p_k up to an additive constant, with −∞ marking a structural
//! zero. s(x) is the one-hot indicator of state x, m = softmax(η) and
//! A(η) = log-sum-exp(η).

use super::{check_dimension, check_family, ExponentialFamily};
use super::{MomentParameters, NaturalParameters, ParameterVector, SufficientStatistics};
use crate::distribution::UnivariateDistribution;
use crate::variables::{DistributionType, Variable};
use ef_common::{Error, Result};
use ef_math::log_sum_exp;
use rand::{Rng, RngCore};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Multinomial {
    variable: Arc<Variable>,
    states: usize,
    natural: NaturalParameters,
    moment: MomentParameters,
}

impl Multinomial {
    /// Uniform distribution over the states of `variable`.
    pub fn new(variable: Arc<Variable>) -> Result<Self> {
        check_family(&variable, DistributionType::Multinomial)?;
        let states = variable.number_of_states().ok_or_else(|| {
            Error::configuration("multinomial needs a finite variable", [variable.name()])
        })?;
        let uniform = 1.0 / states as f64;
        Ok(Self {
            variable,
            states,
            natural: ParameterVector::from_vec(vec![uniform.ln(); states]),
            moment: ParameterVector::from_vec(vec![uniform; states]),
        })
    }

    /// Bind with explicit probabilities (normalised on the way in).
    pub fn with_probabilities(variable: Arc<Variable>, probabilities: &[f64]) -> Result<Self> {
        let mut dist = Self::new(variable)?;
        dist.set_moment_parameters(ParameterVector::from_vec(probabilities.to_vec()))?;
        Ok(dist)
    }

    pub fn number_of_states(&self) -> usize {
        self.states
    }

    /// Probability of state `k`.
    pub fn probability(&self, k: usize) -> f64 {
        self.moment.as_slice().get(k).copied().unwrap_or(0.0)
    }

    pub fn probabilities(&self) -> &[f64] {
        self.moment.as_slice()
    }
}

fn softmax(natural: &NaturalParameters) -> Result<Vec<f64>> {
    if natural.iter().any(|v| v.is_nan() || *v == f64::INFINITY) {
        return Err(Error::Precondition(
            "multinomial natural parameters must not be NaN or +inf".into(),
        ));
    }
    let log_z = log_sum_exp(natural.as_slice());
    if !log_z.is_finite() {
        return Err(Error::Precondition(
            "multinomial needs at least one state with finite natural parameter".into(),
        ));
    }
    Ok(natural.iter().map(|v| (v - log_z).exp()).collect())
}

impl ExponentialFamily for Multinomial {
    fn distribution_type(&self) -> DistributionType {
        DistributionType::Multinomial
    }

    fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    fn size_of_sufficient_statistics(&self) -> usize {
        self.states
    }

    fn create_init_sufficient_statistics(&self) -> SufficientStatistics {
        ParameterVector::from_vec(vec![1.0 / self.states as f64; self.states])
    }

    fn natural_parameters(&self) -> &NaturalParameters {
        &self.natural
    }

    fn moment_parameters(&self) -> &MomentParameters {
        &self.moment
    }

    fn set_natural_parameters(&mut self, natural: NaturalParameters) -> Result<()> {
        check_dimension(self.states, natural.len())?;
        let previous = std::mem::replace(&mut self.natural, natural);
        if let Err(err) = self.update_moment_from_natural() {
            self.natural = previous;
            return Err(err);
        }
        Ok(())
    }

    fn set_moment_parameters(&mut self, moments: MomentParameters) -> Result<()> {
        check_dimension(self.states, moments.len())?;
        let previous = std::mem::replace(&mut self.moment, moments);
        if let Err(err) = self.update_natural_from_moment() {
            self.moment = previous;
            return Err(err);
        }
        Ok(())
    }

    fn in_support(&self, value: f64) -> bool {
        self.variable.state_space().contains(value)
    }

    fn sufficient_statistics(&self, value: f64) -> Result<SufficientStatistics> {
        let k = self.variable.state_index(value)?;
        let mut stats = self.create_zero_sufficient_statistics();
        stats[k] = 1.0;
        Ok(stats)
    }

    fn log_base_measure(&self, _value: f64) -> f64 {
        0.0
    }

    fn log_normalizer(&self) -> Result<f64> {
        let log_z = log_sum_exp(self.natural.as_slice());
        if !log_z.is_finite() {
            return Err(Error::Precondition(format!(
                "log normalizer of {} is {}",
                self.variable.name(),
                log_z
            )));
        }
        Ok(log_z)
    }

    fn update_moment_from_natural(&mut self) -> Result<()> {
        self.moment = ParameterVector::from_vec(softmax(&self.natural)?);
        Ok(())
    }

    fn update_natural_from_moment(&mut self) -> Result<()> {
        if self.moment.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(Error::Precondition(format!(
                "multinomial moments of {} must be finite and non-negative",
                self.variable.name()
            )));
        }
        let total: f64 = self.moment.iter().sum();
        if total <= 0.0 {
            return Err(Error::Precondition(format!(
                "multinomial moments of {} sum to zero",
                self.variable.name()
            )));
        }
        let probabilities: Vec<f64> = self.moment.iter().map(|m| m / total).collect();
        self.natural = probabilities.iter().map(|p| p.ln()).collect::<Vec<_>>().into();
        self.moment = probabilities.into();
        Ok(())
    }

    fn fix_numerical_instability(&mut self) {
        let max = self
            .natural
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY || self.natural.iter().any(|v| v.is_nan()) {
            let uniform = 1.0 / self.states as f64;
            self.natural = ParameterVector::from_vec(vec![uniform.ln(); self.states]);
            self.moment = ParameterVector::from_vec(vec![uniform; self.states]);
            return;
        }
        for k in 0..self.states {
            let v = self.natural[k];
            // +inf collapses onto the largest finite entry
            self.natural[k] = if v == f64::INFINITY { 0.0 } else { v - max };
        }
        if let Ok(moment) = softmax(&self.natural) {
            self.moment = moment.into();
        }
    }

    fn random_initialization(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let draws: Vec<f64> = (0..self.states).map(|_| rng.random::<f64>() + f64::EPSILON).collect();
        let total: f64 = draws.iter().sum();
        self.natural = draws.iter().map(|u| (u / total).ln()).collect::<Vec<_>>().into();
        self.fix_numerical_instability();
        self.update_moment_from_natural()
    }

    fn deep_copy(&self, variable: Arc<Variable>) -> Box<dyn ExponentialFamily> {
        Box::new(Multinomial {
            variable,
            states: self.states,
            natural: self.natural.clone(),
            moment: self.moment.clone(),
        })
    }

    fn to_univariate_distribution(&self) -> Result<UnivariateDistribution> {
        Ok(UnivariateDistribution::Multinomial {
            probabilities: softmax(&self.natural)?,
        })
    }

    /// η_k − A(η) directly; the generic dot product would form 0 · (−∞).
    fn log_probability(&self, value: f64) -> Result<f64> {
        if !self.in_support(value) {
            return Ok(f64::NEG_INFINITY);
        }
        let k = self.variable.state_index(value)?;
        Ok(self.natural[k] - self.log_normalizer()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::DynamicVariables;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn c(states: usize) -> Arc<Variable> {
        let mut vars = DynamicVariables::new();
        vars.new_multinomial_variable("C", states).unwrap()
    }

    #[test]
    fn test_uniform_default() {
        let dist = Multinomial::new(c(4)).unwrap();
        assert_eq!(dist.probabilities(), &[0.25; 4]);
        assert!((dist.log_probability(2.0).unwrap() - 0.25f64.ln()).abs() < 1e-12);
        assert_eq!(dist.log_probability(4.0).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_structural_zero() {
        let dist = Multinomial::with_probabilities(c(3), &[0.0, 3.0, 1.0]).unwrap();
        assert_eq!(dist.natural_parameters().get(0), f64::NEG_INFINITY);
        assert_eq!(dist.log_probability(0.0).unwrap(), f64::NEG_INFINITY);
        assert!((dist.probability(1) - 0.75).abs() < 1e-12);
        assert!((dist.log_probability(2.0).unwrap() - 0.25f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_natural_round_trip_is_shift_invariant() {
        let mut dist = Multinomial::new(c(3)).unwrap();
        dist.set_natural_parameters(ParameterVector::from_vec(vec![10.0, 11.0, 12.0]))
            .unwrap();
        let p = dist.probabilities().to_vec();
        dist.set_moment_parameters(ParameterVector::from_vec(p.clone()))
            .unwrap();
        for (a, b) in dist.probabilities().iter().zip(&p) {
            assert!((a - b).abs() < 1e-12);
        }
        let eta = dist.natural_parameters();
        assert!((eta[2] - eta[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_moments_rejected() {
        let mut dist = Multinomial::new(c(2)).unwrap();
        assert!(dist
            .set_moment_parameters(ParameterVector::from_vec(vec![0.0, 0.0]))
            .is_err());
        assert_eq!(dist.probabilities(), &[0.5, 0.5]);
        assert!(dist
            .set_natural_parameters(ParameterVector::from_vec(vec![f64::NEG_INFINITY; 2]))
            .is_err());
    }

    #[test]
    fn test_sufficient_statistics_one_hot() {
        let dist = Multinomial::new(c(3)).unwrap();
        assert_eq!(dist.sufficient_statistics(1.0).unwrap().as_slice(), &[0.0, 1.0, 0.0]);
        assert!(dist.sufficient_statistics(1.5).is_err());
    }

    #[test]
    fn test_fix_recentres() {
        let mut dist = Multinomial::new(c(2)).unwrap();
        dist.natural = ParameterVector::from_vec(vec![800.0, 801.0]);
        dist.fix_numerical_instability();
        assert_eq!(dist.natural_parameters().get(1), 0.0);
        assert!((dist.log_normalizer().unwrap() - (1.0 + (-1.0f64).exp()).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_random_initialization_normalised() {
        let mut dist = Multinomial::new(c(5)).unwrap();
        dist.random_initialization(&mut StdRng::seed_from_u64(5)).unwrap();
        let total: f64 = dist.probabilities().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(dist.probabilities().iter().all(|p| *p > 0.0));
    }
}
