//! Gamma family in shape/rate form.
//!
//! η = (α − 1, −β), s(x) = (ln x, x), h(x) = 1 on x > 0,
//! A(η) = ln Γ(α) − α ln β, m = (ψ(α) − ln β, α/β).
//!
//! The moment → natural map has no closed form: α solves
//! ln α − ψ(α) = ln m₂ − m₁, found by Newton iteration from Minka's
//! approximation, then β = α / m₂.

use super::{check_dimension, check_family, ExponentialFamily};
use super::{MomentParameters, NaturalParameters, ParameterVector, SufficientStatistics};
use crate::distribution::UnivariateDistribution;
use crate::variables::{DistributionType, Variable};
use ef_common::{Error, Result};
use ef_math::{digamma, log_gamma, trigamma};
use rand::{Rng, RngCore};
use std::sync::Arc;

/// Shape floor applied by `fix_numerical_instability`.
pub const MIN_SHAPE: f64 = 1e-6;

/// Rate floor applied by `fix_numerical_instability`.
pub const MIN_RATE: f64 = 1e-10;

/// Iteration cap of the shape solver.
pub const MAX_NEWTON_ITERATIONS: usize = 100;

/// Relative step below which the shape solver stops.
pub const NEWTON_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Gamma {
    variable: Arc<Variable>,
    natural: NaturalParameters,
    moment: MomentParameters,
}

impl Gamma {
    /// Gamma(1, 1), the unit exponential.
    pub fn new(variable: Arc<Variable>) -> Result<Self> {
        Self::with_shape_rate(variable, 1.0, 1.0)
    }

    pub fn with_shape_rate(variable: Arc<Variable>, shape: f64, rate: f64) -> Result<Self> {
        check_family(&variable, DistributionType::Gamma)?;
        let natural = ParameterVector::from_vec(vec![shape - 1.0, -rate]);
        let moment = moments_of(shape, rate)?;
        Ok(Self {
            variable,
            natural,
            moment,
        })
    }

    pub fn shape(&self) -> f64 {
        self.natural[0] + 1.0
    }

    pub fn rate(&self) -> f64 {
        -self.natural[1]
    }
}

fn check_shape_rate(shape: f64, rate: f64) -> Result<()> {
    if !shape.is_finite() || !rate.is_finite() || shape <= 0.0 || rate <= 0.0 {
        return Err(Error::Precondition(format!(
            "gamma needs positive finite shape and rate, got shape={} rate={}",
            shape, rate
        )));
    }
    Ok(())
}

fn moments_of(shape: f64, rate: f64) -> Result<MomentParameters> {
    check_shape_rate(shape, rate)?;
    Ok(ParameterVector::from_vec(vec![
        digamma(shape) - rate.ln(),
        shape / rate,
    ]))
}

/// Solve ln α − ψ(α) = `target` for α > 0.
fn solve_shape(target: f64) -> Result<f64> {
    let s = target;
    let mut alpha = (3.0 - s + ((s - 3.0).powi(2) + 24.0 * s).sqrt()) / (12.0 * s);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let f = alpha.ln() - digamma(alpha) - s;
        let df = 1.0 / alpha - trigamma(alpha);
        let mut step = f / df;
        if !step.is_finite() {
            break;
        }
        while alpha - step <= 0.0 {
            step /= 2.0;
        }
        alpha -= step;
        if (step / alpha).abs() < NEWTON_TOLERANCE {
            return Ok(alpha);
        }
    }
    Err(Error::NumericalInstability(format!(
        "gamma shape solver did not converge for ln(m2) - m1 = {}",
        target
    )))
}

impl ExponentialFamily for Gamma {
    fn distribution_type(&self) -> DistributionType {
        DistributionType::Gamma
    }

    fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    fn size_of_sufficient_statistics(&self) -> usize {
        2
    }

    fn create_init_sufficient_statistics(&self) -> SufficientStatistics {
        // Statistics of Gamma(1, 1)
        ParameterVector::from_vec(vec![digamma(1.0), 1.0])
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
        value > 0.0 && value.is_finite()
    }

    fn sufficient_statistics(&self, value: f64) -> Result<SufficientStatistics> {
        if !self.in_support(value) {
            return Err(Error::Precondition(format!(
                "{} is outside (0, inf) for {}",
                value,
                self.variable.name()
            )));
        }
        Ok(ParameterVector::from_vec(vec![value.ln(), value]))
    }

    fn log_base_measure(&self, _value: f64) -> f64 {
        0.0
    }

    fn log_normalizer(&self) -> Result<f64> {
        let (shape, rate) = (self.shape(), self.rate());
        check_shape_rate(shape, rate)?;
        Ok(log_gamma(shape) - shape * rate.ln())
    }

    fn update_moment_from_natural(&mut self) -> Result<()> {
        self.moment = moments_of(self.shape(), self.rate())?;
        Ok(())
    }

    fn update_natural_from_moment(&mut self) -> Result<()> {
        let (m1, m2) = (self.moment[0], self.moment[1]);
        if !m1.is_finite() || !m2.is_finite() || m2 <= 0.0 {
            return Err(Error::Precondition(format!(
                "gamma moments need finite E[ln x] and positive E[x], got ({}, {})",
                m1, m2
            )));
        }
        // Jensen: ln E[x] > E[ln x] for any non-degenerate law
        let gap = m2.ln() - m1;
        if gap <= 0.0 {
            return Err(Error::Precondition(format!(
                "gamma moments need ln(E[x]) > E[ln x], got gap {}",
                gap
            )));
        }
        let shape = solve_shape(gap)?;
        let rate = shape / m2;
        self.natural = ParameterVector::from_vec(vec![shape - 1.0, -rate]);
        self.moment = moments_of(shape, rate)?;
        Ok(())
    }

    fn fix_numerical_instability(&mut self) {
        let shape = self.shape();
        let rate = self.rate();
        let shape = if shape.is_finite() { shape.max(MIN_SHAPE) } else { 1.0 };
        let rate = if rate.is_finite() { rate.max(MIN_RATE) } else { 1.0 };
        if let Ok(moment) = moments_of(shape, rate) {
            self.natural = ParameterVector::from_vec(vec![shape - 1.0, -rate]);
            self.moment = moment;
        }
    }

    fn random_initialization(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let shape = rng.random_range(0.5..5.0);
        let rate = rng.random_range(0.5..5.0);
        self.natural = ParameterVector::from_vec(vec![shape - 1.0, -rate]);
        self.fix_numerical_instability();
        self.update_moment_from_natural()
    }

    fn deep_copy(&self, variable: Arc<Variable>) -> Box<dyn ExponentialFamily> {
        Box::new(Gamma {
            variable,
            natural: self.natural.clone(),
            moment: self.moment.clone(),
        })
    }

    fn to_univariate_distribution(&self) -> Result<UnivariateDistribution> {
        let (shape, rate) = (self.shape(), self.rate());
        check_shape_rate(shape, rate)?;
        Ok(UnivariateDistribution::Gamma { shape, rate })
    }
}
