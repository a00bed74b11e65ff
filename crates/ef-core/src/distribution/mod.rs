//! Directly queryable univariate distributions.
//!
//! These are the values handed back by posterior queries and by
//! `ExponentialFamily::to_univariate_distribution`. They carry plain
//! parameters rather than natural/moment pairs.

use ef_common::{Error, Result};
use ef_math::{
    digamma, gamma_cdf, gamma_log_pdf, gamma_q, log_gamma, log_sum_exp, normal_cdf, normal_entropy,
    normal_log_pdf,
};
use rand::distr::weighted::WeightedIndex;
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnivariateDistribution {
    Normal {
        mean: f64,
        variance: f64,
    },
    Gamma {
        shape: f64,
        rate: f64,
    },
    /// Probabilities over state indices `0..K`.
    Multinomial {
        probabilities: Vec<f64>,
    },
    /// Weighted mixture; weights sum to one.
    Mixture {
        weights: Vec<f64>,
        components: Vec<UnivariateDistribution>,
    },
    /// All mass on one value.
    Degenerate {
        value: f64,
    },
}

impl UnivariateDistribution {
    pub fn log_density(&self, x: f64) -> f64 {
        match self {
            UnivariateDistribution::Normal { mean, variance } => normal_log_pdf(x, *mean, *variance),
            UnivariateDistribution::Gamma { shape, rate } => {
                if x <= 0.0 {
                    f64::NEG_INFINITY
                } else {
                    gamma_log_pdf(x, *shape, *rate)
                }
            }
            UnivariateDistribution::Multinomial { probabilities } => state_of(x, probabilities.len())
                .map(|k| probabilities[k].ln())
                .unwrap_or(f64::NEG_INFINITY),
            UnivariateDistribution::Mixture {
                weights,
                components,
            } => {
                let terms: Vec<f64> = weights
                    .iter()
                    .zip(components)
                    .map(|(w, c)| w.ln() + c.log_density(x))
                    .collect();
                log_sum_exp(&terms)
            }
            UnivariateDistribution::Degenerate { value } => {
                if x == *value {
                    0.0
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    pub fn density(&self, x: f64) -> f64 {
        self.log_density(x).exp()
    }

    /// P(X ≤ x).
    pub fn cdf(&self, x: f64) -> f64 {
        match self {
            UnivariateDistribution::Normal { mean, variance } => normal_cdf(x, *mean, *variance),
            UnivariateDistribution::Gamma { shape, rate } => gamma_cdf(x, *shape, *rate),
            UnivariateDistribution::Multinomial { probabilities } => {
                if x < 0.0 {
                    return 0.0;
                }
                let upto = x.floor();
                probabilities
                    .iter()
                    .enumerate()
                    .take_while(|(k, _)| (*k as f64) <= upto)
                    .map(|(_, p)| p)
                    .sum::<f64>()
                    .min(1.0)
            }
            UnivariateDistribution::Mixture {
                weights,
                components,
            } => weights.iter().zip(components).map(|(w, c)| w * c.cdf(x)).sum(),
            UnivariateDistribution::Degenerate { value } => {
                if x >= *value {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// P(X > x). The gamma tail is computed directly so it keeps its
    /// precision where the CDF rounds to one.
    pub fn survival(&self, x: f64) -> f64 {
        match self {
            UnivariateDistribution::Gamma { shape, rate } => {
                if x <= 0.0 {
                    1.0
                } else {
                    gamma_q(*shape, rate * x)
                }
            }
            UnivariateDistribution::Mixture {
                weights,
                components,
            } => weights.iter().zip(components).map(|(w, c)| w * c.survival(x)).sum(),
            _ => 1.0 - self.cdf(x),
        }
    }

    /// Entropy in nats: differential for the continuous families, Shannon
    /// for the discrete ones. Mixtures have no closed form.
    pub fn entropy(&self) -> Result<f64> {
        match self {
            UnivariateDistribution::Normal { variance, .. } => Ok(normal_entropy(*variance)),
            UnivariateDistribution::Gamma { shape, rate } => {
                Ok(shape - rate.ln() + log_gamma(*shape) + (1.0 - shape) * digamma(*shape))
            }
            UnivariateDistribution::Multinomial { probabilities } => Ok(-probabilities
                .iter()
                .filter(|p| **p > 0.0)
                .map(|p| p * p.ln())
                .sum::<f64>()),
            UnivariateDistribution::Mixture { .. } => Err(Error::unsupported("mixture", "entropy")),
            UnivariateDistribution::Degenerate { .. } => Ok(0.0),
        }
    }

    pub fn mean(&self) -> f64 {
        match self {
            UnivariateDistribution::Normal { mean, .. } => *mean,
            UnivariateDistribution::Gamma { shape, rate } => shape / rate,
            UnivariateDistribution::Multinomial { probabilities } => probabilities
                .iter()
                .enumerate()
                .map(|(k, p)| k as f64 * p)
                .sum(),
            UnivariateDistribution::Mixture {
                weights,
                components,
            } => weights.iter().zip(components).map(|(w, c)| w * c.mean()).sum(),
            UnivariateDistribution::Degenerate { value } => *value,
        }
    }

    pub fn variance(&self) -> f64 {
        match self {
            UnivariateDistribution::Normal { variance, .. } => *variance,
            UnivariateDistribution::Gamma { shape, rate } => shape / (rate * rate),
            UnivariateDistribution::Multinomial { probabilities } => {
                let mean = self.mean();
                probabilities
                    .iter()
                    .enumerate()
                    .map(|(k, p)| p * (k as f64 - mean).powi(2))
                    .sum()
            }
            UnivariateDistribution::Mixture {
                weights,
                components,
            } => {
                // Law of total variance
                let mean = self.mean();
                weights
                    .iter()
                    .zip(components)
                    .map(|(w, c)| w * (c.variance() + (c.mean() - mean).powi(2)))
                    .sum()
            }
            UnivariateDistribution::Degenerate { .. } => 0.0,
        }
    }

    /// State probabilities of a multinomial.
    pub fn probabilities(&self) -> Option<&[f64]> {
        match self {
            UnivariateDistribution::Multinomial { probabilities } => Some(probabilities),
            _ => None,
        }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> Result<f64> {
        match self {
            UnivariateDistribution::Normal { mean, variance } => {
                let z: f64 = StandardNormal.sample(rng);
                Ok(mean + z * variance.sqrt())
            }
            UnivariateDistribution::Gamma { shape, rate } => {
                let gamma = rand_distr::Gamma::new(*shape, 1.0 / rate)
                    .map_err(|e| Error::Precondition(format!("invalid gamma: {}", e)))?;
                Ok(gamma.sample(rng))
            }
            UnivariateDistribution::Multinomial { probabilities } => {
                Ok(weighted_index(probabilities)?.sample(rng) as f64)
            }
            UnivariateDistribution::Mixture {
                weights,
                components,
            } => {
                let k = weighted_index(weights)?.sample(rng);
                components[k].sample(rng)
            }
            UnivariateDistribution::Degenerate { value } => Ok(*value),
        }
    }
}

fn state_of(x: f64, states: usize) -> Option<usize> {
    if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x < states as f64 {
        Some(x as usize)
    } else {
        None
    }
}

fn weighted_index(weights: &[f64]) -> Result<WeightedIndex<f64>> {
    WeightedIndex::new(weights).map_err(|e| Error::Precondition(format!("invalid weights: {}", e)))
}
