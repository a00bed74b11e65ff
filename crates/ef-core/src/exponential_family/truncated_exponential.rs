//! Exponential distribution truncated to [0, 1].
//!
//! One natural parameter δ; the density is `δ e^{δx} / (e^δ − 1)` on [0, 1],
//! so s(x) = x, h(x) = 1 and
//!
//! ```text
//! A(δ) = ln(e^δ − 1) − ln δ      δ > 0
//! A(δ) = ln(1 − e^δ) − ln(−δ)    δ < 0
//! A(δ) ≈ δ − ln δ                δ > ASYMPTOTE_THRESHOLD
//! ```
//!
//! A is undefined at δ = 0 (the limit is 0). Every routine reports δ = 0 as
//! a precondition violation; [`TruncatedExponential::fix_numerical_instability`]
//! moves δ off zero.
//!
//! There is no closed-form inverse from the moment to δ, and no standalone
//! univariate distribution object for this family. Sampling goes through the
//! closed-form inverse CDF instead.

use super::{check_dimension, check_family, ExponentialFamily};
use super::{MomentParameters, NaturalParameters, ParameterVector, SufficientStatistics};
use crate::distribution::UnivariateDistribution;
use crate::variables::{DistributionType, Variable};
use ef_common::{Error, Result};
use ef_math::log_sub_exp;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;

/// Above this δ the normalizer and inverse CDF use their asymptotic forms.
pub const ASYMPTOTE_THRESHOLD: f64 = 100.0;

/// Smallest |δ| left in place by `fix_numerical_instability`.
pub const MIN_ABS_DELTA: f64 = 1e-4;

/// δ of a freshly constructed distribution.
pub const DEFAULT_DELTA: f64 = 0.1;

/// Random initialization draws δ = N(0,1) · UniformInt[0, RANDOM_SCALE_BOUND).
pub const RANDOM_SCALE_BOUND: u32 = 100;

/// Statistic used to seed accumulators.
const INIT_STATISTIC: f64 = 0.1;

const FAMILY: &str = "truncated_exponential";

#[derive(Debug, Clone)]
pub struct TruncatedExponential {
    variable: Arc<Variable>,
    natural: NaturalParameters,
    moment: MomentParameters,
}

impl TruncatedExponential {
    /// Bind to `variable` with δ = [`DEFAULT_DELTA`].
    pub fn new(variable: Arc<Variable>) -> Result<Self> {
        Self::with_delta(variable, DEFAULT_DELTA)
    }

    /// Bind to `variable` with an initial δ (must be finite and non-zero).
    pub fn with_delta(variable: Arc<Variable>, delta: f64) -> Result<Self> {
        check_family(&variable, DistributionType::TruncatedExponential)?;
        let moment = moment_of(delta)?;
        Ok(Self {
            variable,
            natural: ParameterVector::from_vec(vec![delta]),
            moment: ParameterVector::from_vec(vec![moment]),
        })
    }

    /// Current natural parameter.
    pub fn delta(&self) -> f64 {
        self.natural[0]
    }

    /// P(X ≤ ρ) = (e^{δρ} − 1) / (e^δ − 1).
    ///
    /// Evaluated in log space so large |δ| neither overflows nor cancels.
    pub fn cumulative_distribution(&self, rho: f64) -> Result<f64> {
        let delta = checked_delta(self.delta())?;
        if rho.is_nan() {
            return Err(Error::Precondition("cumulative_distribution of NaN".into()));
        }
        if rho <= 0.0 {
            return Ok(0.0);
        }
        if rho >= 1.0 {
            return Ok(1.0);
        }
        let log_cdf = if delta > 0.0 {
            log_sub_exp(delta * rho, 0.0) - log_sub_exp(delta, 0.0)
        } else {
            log_sub_exp(0.0, delta * rho) - log_sub_exp(0.0, delta)
        };
        Ok(log_cdf.exp().clamp(0.0, 1.0))
    }

    /// Quantile function: ln(1 + u(e^δ − 1)) / δ, or ln(u)/δ + 1 above the
    /// asymptote threshold.
    pub fn inverse_cumulative_distribution(&self, uniform: f64) -> Result<f64> {
        let delta = checked_delta(self.delta())?;
        check_uniform(uniform)?;
        let x = if delta > ASYMPTOTE_THRESHOLD {
            uniform.ln() / delta + 1.0
        } else {
            (uniform * delta.exp_m1()).ln_1p() / delta
        };
        Ok(x.clamp(0.0, 1.0))
    }

    /// ∂/∂δ of the quantile at `uniform`, for reparameterised gradients.
    pub fn gradient_inverse_cumulative_distribution(&self, uniform: f64) -> Result<f64> {
        let delta = checked_delta(self.delta())?;
        check_uniform(uniform)?;
        let gradient = if delta > ASYMPTOTE_THRESHOLD {
            -(uniform.ln() + delta) / (delta * delta)
                + 1.0 / (delta * ((-delta).exp() * (1.0 / uniform - 1.0) + 1.0))
        } else {
            let inner = 1.0 + uniform * delta.exp_m1();
            -inner.ln() / (delta * delta) + uniform * delta.exp() / (delta * inner)
        };
        if !gradient.is_finite() {
            return Err(Error::NumericalInstability(format!(
                "quantile gradient at u={} for delta={}",
                uniform, delta
            )));
        }
        Ok(gradient)
    }

    /// Draw one value by inverting the CDF at a uniform in (0, 1].
    pub fn sample(&self, rng: &mut dyn RngCore) -> Result<f64> {
        let uniform = 1.0 - rng.random::<f64>();
        self.inverse_cumulative_distribution(uniform)
    }
}

fn checked_delta(delta: f64) -> Result<f64> {
    if delta == 0.0 {
        return Err(Error::Precondition(
            "truncated exponential is undefined at delta = 0".into(),
        ));
    }
    if !delta.is_finite() {
        return Err(Error::Precondition(format!(
            "truncated exponential needs a finite delta, got {}",
            delta
        )));
    }
    Ok(delta)
}

fn check_uniform(uniform: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&uniform) {
        return Err(Error::Precondition(format!(
            "quantile argument must lie in [0, 1], got {}",
            uniform
        )));
    }
    Ok(())
}

/// m = 1/(1 − e^{−δ}) − 1/δ, evaluated as written.
fn moment_of(delta: f64) -> Result<f64> {
    let delta = checked_delta(delta)?;
    let moment = -1.0 / (-delta).exp_m1() - 1.0 / delta;
    if !moment.is_finite() {
        return Err(Error::NumericalInstability(format!(
            "moment is not finite for delta={}",
            delta
        )));
    }
    Ok(moment)
}

impl ExponentialFamily for TruncatedExponential {
    fn distribution_type(&self) -> DistributionType {
        DistributionType::TruncatedExponential
    }

    fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    fn size_of_sufficient_statistics(&self) -> usize {
        1
    }

    fn create_init_sufficient_statistics(&self) -> SufficientStatistics {
        ParameterVector::from_vec(vec![INIT_STATISTIC])
    }

    fn natural_parameters(&self) -> &NaturalParameters {
        &self.natural
    }

    fn moment_parameters(&self) -> &MomentParameters {
        &self.moment
    }

    fn set_natural_parameters(&mut self, natural: NaturalParameters) -> Result<()> {
        check_dimension(1, natural.len())?;
        let moment = moment_of(natural[0])?;
        self.natural = natural;
        self.moment[0] = moment;
        Ok(())
    }

    fn set_moment_parameters(&mut self, moments: MomentParameters) -> Result<()> {
        check_dimension(1, moments.len())?;
        let previous = std::mem::replace(&mut self.moment, moments);
        if let Err(err) = self.update_natural_from_moment() {
            self.moment = previous;
            return Err(err);
        }
        Ok(())
    }

    fn in_support(&self, value: f64) -> bool {
        (0.0..=1.0).contains(&value)
    }

    fn sufficient_statistics(&self, value: f64) -> Result<SufficientStatistics> {
        if !self.in_support(value) {
            return Err(Error::Precondition(format!(
                "{} is outside [0, 1] for {}",
                value,
                self.variable.name()
            )));
        }
        Ok(ParameterVector::from_vec(vec![value]))
    }

    fn log_base_measure(&self, _value: f64) -> f64 {
        0.0
    }

    fn log_normalizer(&self) -> Result<f64> {
        let delta = checked_delta(self.delta())?;
        if delta > ASYMPTOTE_THRESHOLD {
            Ok(delta - delta.ln())
        } else if delta > 0.0 {
            Ok(log_sub_exp(delta, 0.0) - delta.ln())
        } else {
            Ok(log_sub_exp(0.0, delta) - (-delta).ln())
        }
    }

    fn update_moment_from_natural(&mut self) -> Result<()> {
        self.moment[0] = moment_of(self.delta())?;
        Ok(())
    }

    fn update_natural_from_moment(&mut self) -> Result<()> {
        Err(Error::unsupported(FAMILY, "update_natural_from_moment"))
    }

    fn fix_numerical_instability(&mut self) {
        let delta = self.delta();
        if delta.abs() < MIN_ABS_DELTA {
            let fixed = if delta < 0.0 { -MIN_ABS_DELTA } else { MIN_ABS_DELTA };
            self.natural[0] = fixed;
            if let Ok(moment) = moment_of(fixed) {
                self.moment[0] = moment;
            }
        }
    }

    fn random_initialization(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let z: f64 = StandardNormal.sample(rng);
        let scale = rng.random_range(0..RANDOM_SCALE_BOUND) as f64;
        self.natural[0] = z * scale;
        self.fix_numerical_instability();
        self.update_moment_from_natural()
    }

    fn deep_copy(&self, variable: Arc<Variable>) -> Box<dyn ExponentialFamily> {
        Box::new(TruncatedExponential {
            variable,
            natural: self.natural.clone(),
            moment: self.moment.clone(),
        })
    }

    fn to_univariate_distribution(&self) -> Result<UnivariateDistribution> {
        Err(Error::unsupported(FAMILY, "to_univariate_distribution"))
    }
}
