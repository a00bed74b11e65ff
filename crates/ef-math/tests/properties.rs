//! Property-based tests for ef-math numerical functions.
//!
//! Uses proptest to verify mathematical identities hold across many random inputs.

use proptest::prelude::*;
use ef_math::{
    digamma, gamma_cdf, log_add_exp, log_gamma, log_normalize, log_sub_exp, log_sum_exp,
    normal_cdf, trigamma,
};

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

/// Extended tolerance where series approximations carry some error.
const SERIES_TOL: f64 = 1e-8;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() && b.is_infinite() {
        return a.signum() == b.signum();
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log-sum-exp family
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// log_sum_exp is commutative.
    #[test]
    fn log_sum_exp_commutative(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        let ab = log_sum_exp(&[a, b]);
        let ba = log_sum_exp(&[b, a]);
        prop_assert!(approx_eq(ab, ba, TOL), "lse([{},{}])={} != {}", a, b, ab, ba);
    }

    /// log_add_exp matches log_sum_exp for 2 elements.
    #[test]
    fn log_add_exp_matches_log_sum_exp(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        prop_assert!(approx_eq(log_add_exp(a, b), log_sum_exp(&[a, b]), TOL));
    }

    /// log_sub_exp inverts log_add_exp.
    #[test]
    fn log_sub_exp_inverts_log_add_exp(a in -50.0..50.0f64, diff in 0.01..50.0f64) {
        let b = a - diff;
        let sum = log_add_exp(a, b);
        let back = log_sub_exp(sum, b);
        prop_assert!(approx_eq(back, a, 1e-9), "log_sub_exp(lae({a},{b}),{b})={back}");
    }

    /// No overflow with large log-weights.
    #[test]
    fn log_sum_exp_no_overflow(a in 500.0..700.0f64, b in 500.0..700.0f64) {
        let result = log_sum_exp(&[a, b]);
        prop_assert!(result.is_finite());
        prop_assert!(result >= a.max(b) - TOL);
    }

    /// After normalization the weights log-sum to zero.
    #[test]
    fn log_normalize_yields_distribution(ws in prop::collection::vec(-200.0..200.0f64, 1..12)) {
        let mut ws = ws;
        log_normalize(&mut ws);
        prop_assert!(approx_eq(log_sum_exp(&ws), 0.0, 1e-9));
    }
}

// ============================================================================
// Gamma-function family
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// log Γ(z+1) = log Γ(z) + log z.
    #[test]
    fn log_gamma_recurrence(z in 1.0..100.0f64) {
        prop_assert!(approx_eq(log_gamma(z + 1.0), log_gamma(z) + z.ln(), SERIES_TOL));
    }

    /// ψ(x+1) = ψ(x) + 1/x.
    #[test]
    fn digamma_recurrence(x in 0.05..200.0f64) {
        prop_assert!(approx_eq(digamma(x + 1.0), digamma(x) + 1.0 / x, SERIES_TOL));
    }

    /// ψ'(x) = ψ'(x+1) + 1/x².
    #[test]
    fn trigamma_recurrence(x in 0.05..200.0f64) {
        prop_assert!(approx_eq(trigamma(x), trigamma(x + 1.0) + 1.0 / (x * x), SERIES_TOL));
    }

    /// ψ is strictly increasing on the positive axis.
    #[test]
    fn digamma_increasing(x in 0.01..100.0f64, dx in 0.001..10.0f64) {
        prop_assert!(digamma(x + dx) > digamma(x));
    }

    /// ln x - ψ(x) is positive for x > 0 (needed by the Gamma moment inverse).
    #[test]
    fn log_minus_digamma_positive(x in 0.01..1.0e4f64) {
        prop_assert!(x.ln() - digamma(x) > 0.0);
    }
}

// ============================================================================
// CDFs
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn gamma_cdf_monotone(alpha in 0.2..20.0f64, beta in 0.1..10.0f64, x in 0.0..30.0f64, dx in 0.01..5.0f64) {
        let lo = gamma_cdf(x, alpha, beta);
        let hi = gamma_cdf(x + dx, alpha, beta);
        prop_assert!((0.0..=1.0).contains(&lo));
        prop_assert!(hi >= lo - 1e-12);
    }

    #[test]
    fn normal_cdf_in_unit_interval(mean in -50.0..50.0f64, var in 0.01..100.0f64, x in -100.0..100.0f64) {
        let c = normal_cdf(x, mean, var);
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&c));
    }
}

#[test]
fn edge_case_empty_log_sum_exp() {
    assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
}

#[test]
fn edge_case_nan_propagation() {
    assert!(log_sum_exp(&[1.0, f64::NAN]).is_nan());
    assert!(log_add_exp(f64::NAN, 1.0).is_nan());
    assert!(digamma(f64::NAN).is_nan());
}
