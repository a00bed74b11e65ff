//! Univariate Normal family.
//!
//! η = (μ/σ², −1/(2σ²)), s(x) = (x, x²), m = (μ, μ² + σ²),
//! A(η) = −η₁²/(4η₂) − ½ ln(−2η₂), log h = −½ ln 2π.

use super::{check_dimension, check_family, ExponentialFamily};
use super::{MomentParameters, NaturalParameters, ParameterVector, SufficientStatistics};
use crate::distribution::UnivariateDistribution;
use crate::variables::{DistributionType, Variable};
use ef_common::{Error, Result};
use ef_math::HALF_LN_2PI;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;

/// Variance floor applied by `fix_numerical_instability`.
pub const MIN_VARIANCE: f64 = 1e-10;

/// Variance ceiling applied by `fix_numerical_instability`.
pub const MAX_VARIANCE: f64 = 1e10;

/// Spread of the random initial mean.
const RANDOM_MEAN_SCALE: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct Normal {
    variable: Arc<Variable>,
    natural: NaturalParameters,
    moment: MomentParameters,
}

impl Normal {
    /// Standard normal bound to `variable`.
    pub fn new(variable: Arc<Variable>) -> Result<Self> {
        Self::with_mean_variance(variable, 0.0, 1.0)
    }

    pub fn with_mean_variance(variable: Arc<Variable>, mean: f64, variance: f64) -> Result<Self> {
        check_family(&variable, DistributionType::Normal)?;
        let (natural, moment) = parameters_of(mean, variance)?;
        Ok(Self {
            variable,
            natural,
            moment,
        })
    }

    pub fn mean(&self) -> f64 {
        self.moment[0]
    }

    pub fn variance(&self) -> f64 {
        self.moment[1] - self.moment[0] * self.moment[0]
    }
}

fn parameters_of(mean: f64, variance: f64) -> Result<(NaturalParameters, MomentParameters)> {
    if !mean.is_finite() || !variance.is_finite() || variance <= 0.0 {
        return Err(Error::Precondition(format!(
            "normal needs a finite mean and positive variance, got mean={} variance={}",
            mean, variance
        )));
    }
    let natural = ParameterVector::from_vec(vec![mean / variance, -0.5 / variance]);
    let moment = ParameterVector::from_vec(vec![mean, mean * mean + variance]);
    Ok((natural, moment))
}

/// (mean, variance) encoded by natural parameters.
fn mean_variance_of(natural: &NaturalParameters) -> Result<(f64, f64)> {
    let (eta1, eta2) = (natural[0], natural[1]);
    if !eta1.is_finite() || !eta2.is_finite() || eta2 >= 0.0 {
        return Err(Error::Precondition(format!(
            "normal needs eta2 < 0 and finite naturals, got ({}, {})",
            eta1, eta2
        )));
    }
    let variance = -0.5 / eta2;
    Ok((eta1 * variance, variance))
}

impl ExponentialFamily for Normal {
    fn distribution_type(&self) -> DistributionType {
        DistributionType::Normal
    }

    fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    fn size_of_sufficient_statistics(&self) -> usize {
        2
    }

    fn create_init_sufficient_statistics(&self) -> SufficientStatistics {
        ParameterVector::from_vec(vec![0.0, 1.0])
    }

    fn natural_parameters(&self) -> &NaturalParameters {
        &self.natural
    }

    fn moment_parameters(&self) -> &MomentParameters {
        &self.moment
    }

    fn set_natural_parameters(&mut self, natural: NaturalParameters) -> Result<()> {
        check_dimension(2, natural.len())?;
        let previous = std::mem::replace(&mut self.natural, natural);
        if let Err(err) = self.update_moment_from_natural() {
            self.natural = previous;
            return Err(err);
        }
        Ok(())
    }

    fn set_moment_parameters(&mut self, moments: MomentParameters) -> Result<()> {
        check_dimension(2, moments.len())?;
        let previous = std::mem::replace(&mut self.moment, moments);
        if let Err(err) = self.update_natural_from_moment() {
            self.moment = previous;
            return Err(err);
        }
        Ok(())
    }

    fn in_support(&self, value: f64) -> bool {
        value.is_finite()
    }

    fn sufficient_statistics(&self, value: f64) -> Result<SufficientStatistics> {
        if !self.in_support(value) {
            return Err(Error::Precondition(format!(
                "{} is not a finite value for {}",
                value,
                self.variable.name()
            )));
        }
        Ok(ParameterVector::from_vec(vec![value, value * value]))
    }

    fn log_base_measure(&self, _value: f64) -> f64 {
        -HALF_LN_2PI
    }

    fn log_normalizer(&self) -> Result<f64> {
        let (eta1, eta2) = (self.natural[0], self.natural[1]);
        mean_variance_of(&self.natural)?;
        Ok(-eta1 * eta1 / (4.0 * eta2) - 0.5 * (-2.0 * eta2).ln())
    }

    fn update_moment_from_natural(&mut self) -> Result<()> {
        let (mean, variance) = mean_variance_of(&self.natural)?;
        self.moment[0] = mean;
        self.moment[1] = mean * mean + variance;
        Ok(())
    }

    fn update_natural_from_moment(&mut self) -> Result<()> {
        let mean = self.moment[0];
        let variance = self.moment[1] - mean * mean;
        let (natural, moment) = parameters_of(mean, variance)?;
        self.natural = natural;
        self.moment = moment;
        Ok(())
    }

    fn fix_numerical_instability(&mut self) {
        let (mean, variance) = match mean_variance_of(&self.natural) {
            Ok((mean, variance)) => (mean, variance.clamp(MIN_VARIANCE, MAX_VARIANCE)),
            Err(_) => (0.0, MAX_VARIANCE),
        };
        let mean = if mean.is_finite() { mean } else { 0.0 };
        if let Ok((natural, moment)) = parameters_of(mean, variance) {
            self.natural = natural;
            self.moment = moment;
        }
    }

    fn random_initialization(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let z: f64 = StandardNormal.sample(rng);
        let mean = z * RANDOM_MEAN_SCALE;
        let variance = rng.random_range(0.5..2.0);
        let (natural, _) = parameters_of(mean, variance)?;
        self.natural = natural;
        self.fix_numerical_instability();
        self.update_moment_from_natural()
    }

    fn deep_copy(&self, variable: Arc<Variable>) -> Box<dyn ExponentialFamily> {
        Box::new(Normal {
            variable,
            natural: self.natural.clone(),
            moment: self.moment.clone(),
        })
    }

    fn to_univariate_distribution(&self) -> Result<UnivariateDistribution> {
        let (mean, variance) = mean_variance_of(&self.natural)?;
        Ok(UnivariateDistribution::Normal { mean, variance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::DynamicVariables;
    use ef_math::normal_log_pdf;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn x() -> Arc<Variable> {
        let mut vars = DynamicVariables::new();
        vars.new_real_variable("X", DistributionType::Normal).unwrap()
    }

    #[test]
    fn test_log_probability_matches_density() {
        let dist = Normal::with_mean_variance(x(), 1.5, 4.0).unwrap();
        for v in [-3.0, 0.0, 1.5, 7.25] {
            let lp = dist.log_probability(v).unwrap();
            assert!((lp - normal_log_pdf(v, 1.5, 4.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_moment_round_trip() {
        let mut dist = Normal::new(x()).unwrap();
        dist.set_moment_parameters(ParameterVector::from_vec(vec![2.0, 13.0]))
            .unwrap();
        assert!((dist.mean() - 2.0).abs() < 1e-12);
        assert!((dist.variance() - 9.0).abs() < 1e-12);
        let eta = dist.natural_parameters().clone();
        assert!((eta[0] - 2.0 / 9.0).abs() < 1e-12);
        assert!((eta[1] + 1.0 / 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_moments_keep_previous_pair() {
        let mut dist = Normal::with_mean_variance(x(), 1.0, 2.0).unwrap();
        let before = dist.natural_parameters().clone();
        // m2 < m1^2 means negative variance
        let err = dist
            .set_moment_parameters(ParameterVector::from_vec(vec![3.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(dist.natural_parameters(), &before);
        assert!((dist.mean() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_positive_eta2_rejected() {
        let mut dist = Normal::new(x()).unwrap();
        assert!(dist
            .set_natural_parameters(ParameterVector::from_vec(vec![0.0, 0.5]))
            .is_err());
        assert!(matches!(
            dist.set_natural_parameters(ParameterVector::zeros(3)),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_fix_clamps_variance() {
        let mut dist = Normal::with_mean_variance(x(), 5.0, 1e-14).unwrap();
        dist.fix_numerical_instability();
        assert!((dist.variance() - MIN_VARIANCE).abs() < 1e-12);
        assert!((dist.mean() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_random_initialization_consistent() {
        let mut dist = Normal::new(x()).unwrap();
        dist.random_initialization(&mut StdRng::seed_from_u64(7)).unwrap();
        let mut check = dist.clone();
        check.update_natural_from_moment().unwrap();
        let diff = check
            .natural_parameters()
            .max_abs_diff(dist.natural_parameters())
            .unwrap();
        assert!(diff < 1e-9);
        assert!((0.5..2.0).contains(&dist.variance()));
    }

    #[test]
    fn test_to_univariate() {
        let dist = Normal::with_mean_variance(x(), -1.0, 0.25).unwrap();
        match dist.to_univariate_distribution().unwrap() {
            UnivariateDistribution::Normal { mean, variance } => {
                assert!((mean + 1.0).abs() < 1e-12);
                assert!((variance - 0.25).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
