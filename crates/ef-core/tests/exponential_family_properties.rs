//! Property-based tests for the exponential-family implementations.

use ef_core::exponential_family::{Gamma, Multinomial, Normal, TruncatedExponential};
use ef_core::{DistributionType, DynamicVariables, Error, ExponentialFamily, ParameterVector, Variable};
use proptest::prelude::*;
use std::sync::Arc;

const TOL: f64 = 1e-9;

fn real(distribution: DistributionType) -> Arc<Variable> {
    let mut vars = DynamicVariables::new();
    vars.new_real_variable("X", distribution).unwrap()
}

fn finite(states: usize) -> Arc<Variable> {
    let mut vars = DynamicVariables::new();
    vars.new_multinomial_variable("K", states).unwrap()
}

fn truncated(delta: f64) -> TruncatedExponential {
    TruncatedExponential::with_delta(real(DistributionType::TruncatedExponential), delta).unwrap()
}

fn normalizer(delta: f64) -> f64 {
    truncated(delta).log_normalizer().unwrap()
}

fn moment(delta: f64) -> f64 {
    truncated(delta).moment_parameters()[0]
}

// ============================================================================
// Truncated exponential
// ============================================================================

#[test]
fn truncated_exponential_reference_values() {
    let te = truncated(0.1);
    assert_eq!(te.natural_parameters().as_slice(), &[0.1]);
    let expected_moment = 0.1f64.exp() / (0.1f64.exp() - 1.0) - 1.0 / 0.1;
    assert!((te.moment_parameters()[0] - expected_moment).abs() < 1e-12);
    assert!((te.moment_parameters()[0] - 0.508_331_945).abs() < 1e-9);
    let expected_normalizer = (0.1f64.exp() - 1.0).ln() - 0.1f64.ln();
    assert!((te.log_normalizer().unwrap() - expected_normalizer).abs() < 1e-12);
}

#[test]
fn truncated_exponential_has_no_inverse_map() {
    let mut te = truncated(0.1);
    let err = te
        .set_moment_parameters(ParameterVector::from_vec(vec![0.7]))
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported { .. }));
    assert!(matches!(te.update_natural_from_moment(), Err(Error::Unsupported { .. })));
    assert_eq!(te.natural_parameters().as_slice(), &[0.1]);
}

#[test]
fn truncated_exponential_zero_delta_is_rejected() {
    let variable = real(DistributionType::TruncatedExponential);
    assert!(matches!(
        TruncatedExponential::with_delta(variable, 0.0),
        Err(Error::Precondition(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The asymptotic branch joins the exact one at the threshold.
    #[test]
    fn normalizer_continuous_at_threshold(eps in 1e-9..1e-3f64) {
        let below = normalizer(100.0 - eps);
        let above = normalizer(100.0 + eps);
        prop_assert!((below - above).abs() < 2.0 * eps + TOL, "{} vs {}", below, above);
    }

    /// A(δ) → 0 from both sides of the removable singularity.
    #[test]
    fn normalizer_continuous_around_zero(delta in 1e-6..1e-3f64) {
        let pos = normalizer(delta);
        let neg = normalizer(-delta);
        prop_assert!(pos.abs() < delta, "A({}) = {}", delta, pos);
        prop_assert!(neg.abs() < delta, "A({}) = {}", -delta, neg);
        prop_assert!((pos - neg - delta).abs() < 1e-6);
    }

    /// E[x] increases with δ and stays inside (0, 1).
    #[test]
    fn moment_is_monotone(a in -200.0..200.0f64, step in 1e-3..10.0f64) {
        prop_assume!(a.abs() > 1e-3 && (a + step).abs() > 1e-3);
        let lo = moment(a);
        let hi = moment(a + step);
        prop_assert!(lo > 0.0 && lo < 1.0);
        prop_assert!(hi > lo, "m({}) = {} > m({}) = {}", a, lo, a + step, hi);
    }

    /// The density integrates to one.
    #[test]
    fn density_integrates_to_one(delta in -50.0..50.0f64) {
        prop_assume!(delta.abs() > 1e-3);
        let te = truncated(delta);
        let n = 4000;
        let h = 1.0 / n as f64;
        let integral: f64 = (0..n)
            .map(|i| te.log_probability((i as f64 + 0.5) * h).unwrap().exp() * h)
            .sum();
        prop_assert!((integral - 1.0).abs() < 1e-4, "integral {} at δ={}", integral, delta);
    }

    /// The inverse CDF inverts the CDF.
    #[test]
    fn quantile_inverts_cdf(delta in -300.0..300.0f64, u in 0.001..0.999f64) {
        prop_assume!(delta.abs() > 1e-3);
        let te = truncated(delta);
        let x = te.inverse_cumulative_distribution(u).unwrap();
        prop_assert!((0.0..=1.0).contains(&x));
        let back = te.cumulative_distribution(x).unwrap();
        prop_assert!((back - u).abs() < 1e-6, "F(F⁻¹({})) = {} at δ={}", u, back, delta);
    }

    /// A deep copy shares no parameter storage with its source.
    #[test]
    fn deep_copy_is_independent(delta in 0.5..20.0f64, other in -20.0..-0.5f64) {
        let original = truncated(delta);
        let mut copy = original.deep_copy(real(DistributionType::TruncatedExponential));
        copy.set_natural_parameters(ParameterVector::from_vec(vec![other])).unwrap();
        prop_assert_eq!(original.natural_parameters().as_slice(), &[delta]);
        prop_assert!((original.moment_parameters()[0] - moment(delta)).abs() < TOL);
        prop_assert_eq!(copy.natural_parameters().as_slice(), &[other]);
    }
}

// ============================================================================
// Round trips through the inverse moment map
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn normal_round_trip(mean in -100.0..100.0f64, variance in 1e-3..1e3f64) {
        let mut normal = Normal::with_mean_variance(real(DistributionType::Normal), mean, variance).unwrap();
        let natural = normal.natural_parameters().clone();
        let moments = normal.moment_parameters().clone();
        normal.set_moment_parameters(moments).unwrap();
        let drift = normal.natural_parameters().max_abs_diff(&natural).unwrap();
        prop_assert!(drift < 1e-6 * (1.0 + natural[0].abs().max(natural[1].abs())), "drift {}", drift);
    }

    #[test]
    fn gamma_round_trip(shape in 0.05..50.0f64, rate in 0.05..50.0f64) {
        let mut gamma = Gamma::with_shape_rate(real(DistributionType::Gamma), shape, rate).unwrap();
        let moments = gamma.moment_parameters().clone();
        gamma.set_moment_parameters(moments).unwrap();
        prop_assert!((gamma.shape() - shape).abs() < 1e-6 * shape.max(1.0), "shape {} vs {}", gamma.shape(), shape);
        prop_assert!((gamma.rate() - rate).abs() < 1e-6 * rate.max(1.0), "rate {} vs {}", gamma.rate(), rate);
    }

    #[test]
    fn multinomial_round_trip(raw in prop::collection::vec(0.01..1.0f64, 2..8)) {
        let total: f64 = raw.iter().sum();
        let probabilities: Vec<f64> = raw.iter().map(|p| p / total).collect();
        let variable = finite(probabilities.len());
        let mut multinomial = Multinomial::with_probabilities(variable, &probabilities).unwrap();
        let moments = multinomial.moment_parameters().clone();
        multinomial.set_moment_parameters(moments).unwrap();
        for (k, p) in probabilities.iter().enumerate() {
            prop_assert!((multinomial.probability(k) - p).abs() < 1e-12);
        }
        prop_assert!(multinomial.log_normalizer().unwrap().is_finite());
    }

    /// Natural parameters are only defined up to a constant shift.
    #[test]
    fn multinomial_shift_invariant(raw in prop::collection::vec(-5.0..5.0f64, 2..6), shift in -50.0..50.0f64) {
        let variable = finite(raw.len());
        let mut a = Multinomial::new(Arc::clone(&variable)).unwrap();
        let mut b = Multinomial::new(variable).unwrap();
        a.set_natural_parameters(ParameterVector::from_vec(raw.clone())).unwrap();
        b.set_natural_parameters(ParameterVector::from_vec(raw.iter().map(|x| x + shift).collect())).unwrap();
        for k in 0..raw.len() {
            let (pa, pb) = (a.log_probability(k as f64).unwrap(), b.log_probability(k as f64).unwrap());
            prop_assert!((pa - pb).abs() < 1e-9);
        }
    }
}
