//! Exponential-family distributions.
//!
//! Every family stores a natural parameter vector η and its dual moment
//! vector m = ∇A(η) and evaluates
//!
//! ```text
//! log p(x) = η·s(x) + log h(x) − A(η)
//! ```
//!
//! Generic code works only through [`ExponentialFamily`]; it never looks at
//! a family's internals. New families plug in by implementing the trait and
//! adding a [`DistributionType`] arm to [`new_distribution`].
//!
//! # Commit discipline
//!
//! Parameter vectors are owned exclusively by their instance. The setters
//! and the two `update_*` methods are the only paths that change them, and a
//! setter whose resynchronisation fails leaves the previous pair in place.

pub mod conditional;
pub mod gamma;
pub mod multinomial;
pub mod normal;
pub mod truncated_exponential;
pub mod vector;

pub use conditional::ConditionalDistribution;
pub use gamma::Gamma;
pub use multinomial::Multinomial;
pub use normal::Normal;
pub use truncated_exponential::TruncatedExponential;
pub use vector::{MomentParameters, NaturalParameters, ParameterVector, SufficientStatistics};

use crate::distribution::UnivariateDistribution;
use crate::variables::{DistributionType, Variable};
use ef_common::{Error, Result};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;

/// The contract every distribution family satisfies.
pub trait ExponentialFamily: fmt::Debug + Send + Sync {
    /// Family tag of this instance.
    fn distribution_type(&self) -> DistributionType;

    /// The variable this distribution is bound to.
    fn variable(&self) -> &Arc<Variable>;

    /// Dimensionality of η, m and s(x).
    fn size_of_sufficient_statistics(&self) -> usize;

    fn create_zero_natural_parameters(&self) -> NaturalParameters {
        ParameterVector::zeros(self.size_of_sufficient_statistics())
    }

    fn create_zero_moment_parameters(&self) -> MomentParameters {
        ParameterVector::zeros(self.size_of_sufficient_statistics())
    }

    fn create_zero_sufficient_statistics(&self) -> SufficientStatistics {
        ParameterVector::zeros(self.size_of_sufficient_statistics())
    }

    /// Statistics of a typical observation, used to seed accumulators.
    fn create_init_sufficient_statistics(&self) -> SufficientStatistics;

    fn natural_parameters(&self) -> &NaturalParameters;

    fn moment_parameters(&self) -> &MomentParameters;

    /// Expected sufficient statistics. Same as the moment parameters.
    fn expected_parameters(&self) -> &MomentParameters {
        self.moment_parameters()
    }

    /// Replace η and recompute m. On failure the previous pair is kept.
    fn set_natural_parameters(&mut self, natural: NaturalParameters) -> Result<()>;

    /// Replace m and recompute η. On failure the previous pair is kept.
    fn set_moment_parameters(&mut self, moments: MomentParameters) -> Result<()>;

    /// Whether `value` lies in the support.
    fn in_support(&self, value: f64) -> bool;

    /// s(x) for one observation.
    fn sufficient_statistics(&self, value: f64) -> Result<SufficientStatistics>;

    /// log h(x).
    fn log_base_measure(&self, value: f64) -> f64;

    /// A(η) for the current natural parameters.
    fn log_normalizer(&self) -> Result<f64>;

    /// Recompute m from η.
    fn update_moment_from_natural(&mut self) -> Result<()>;

    /// Recompute η from m. Families without an inverse map return
    /// [`Error::Unsupported`].
    fn update_natural_from_moment(&mut self) -> Result<()>;

    /// Move η back into the domain of the normalizer. Leaves the pair
    /// consistent. A no-op when η is already safe.
    fn fix_numerical_instability(&mut self);

    /// Draw fresh parameters, fix them, and recompute moments.
    fn random_initialization(&mut self, rng: &mut dyn RngCore) -> Result<()>;

    /// Independent copy bound to `variable`.
    fn deep_copy(&self, variable: Arc<Variable>) -> Box<dyn ExponentialFamily>;

    /// A directly queryable distribution equal to this one.
    fn to_univariate_distribution(&self) -> Result<UnivariateDistribution>;

    /// log p(x); NEG_INFINITY outside the support.
    fn log_probability(&self, value: f64) -> Result<f64> {
        if !self.in_support(value) {
            return Ok(f64::NEG_INFINITY);
        }
        let statistics = self.sufficient_statistics(value)?;
        let linear = statistics.dot(self.natural_parameters())?;
        Ok(linear + self.log_base_measure(value) - self.log_normalizer()?)
    }
}

/// Fresh distribution of the family declared by `variable`.
pub fn new_distribution(variable: Arc<Variable>) -> Result<Box<dyn ExponentialFamily>> {
    Ok(match variable.distribution_type() {
        DistributionType::Multinomial => Box::new(Multinomial::new(variable)?),
        DistributionType::Normal => Box::new(Normal::new(variable)?),
        DistributionType::Gamma => Box::new(Gamma::new(variable)?),
        DistributionType::TruncatedExponential => Box::new(TruncatedExponential::new(variable)?),
    })
}

/// Fail with `DimensionMismatch` unless `actual == expected`.
pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Fail with a configuration error unless `variable` declares `expected`.
pub(crate) fn check_family(variable: &Variable, expected: DistributionType) -> Result<()> {
    if variable.distribution_type() != expected {
        return Err(Error::configuration(
            format!(
                "variable declares {}, cannot bind {}",
                variable.distribution_type(),
                expected
            ),
            [variable.name()],
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::DynamicVariables;

    #[test]
    fn test_registry_matches_declared_family() {
        let mut vars = DynamicVariables::new();
        let c = vars.new_multinomial_variable("C", 4).unwrap();
        let x = vars.new_real_variable("X", DistributionType::Normal).unwrap();
        let g = vars.new_real_variable("G", DistributionType::Gamma).unwrap();
        let r = vars
            .new_real_variable("R", DistributionType::TruncatedExponential)
            .unwrap();

        let dists: Vec<_> = [c, x, g, r]
            .into_iter()
            .map(|v| new_distribution(v).unwrap())
            .collect();
        let sizes: Vec<_> = dists.iter().map(|d| d.size_of_sufficient_statistics()).collect();
        assert_eq!(sizes, vec![4, 2, 2, 1]);
        assert_eq!(dists[3].distribution_type(), DistributionType::TruncatedExponential);
        for d in &dists {
            assert_eq!(d.create_zero_natural_parameters().len(), d.size_of_sufficient_statistics());
            assert_eq!(
                d.create_init_sufficient_statistics().len(),
                d.size_of_sufficient_statistics()
            );
        }
    }

    #[test]
    fn test_log_probability_integrates_to_one() {
        let mut vars = DynamicVariables::new();
        let r = vars
            .new_real_variable("R", DistributionType::TruncatedExponential)
            .unwrap();
        let dist = TruncatedExponential::with_delta(r, 2.5).unwrap();

        // Midpoint rule over [0, 1]
        let n = 20_000;
        let h = 1.0 / n as f64;
        let total: f64 = (0..n)
            .map(|i| dist.log_probability((i as f64 + 0.5) * h).unwrap().exp() * h)
            .sum();
        assert!((total - 1.0).abs() < 1e-6, "total = {total}");
        assert_eq!(dist.log_probability(1.5).unwrap(), f64::NEG_INFINITY);
    }
}
