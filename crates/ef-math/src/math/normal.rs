//! Normal distribution helpers.

use std::f64::consts::{PI, SQRT_2};

/// 0.5 * ln(2*pi), the log base measure of the Normal family.
pub const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// Log density of `N(mean, variance)` at `x`.
///
/// Returns NaN for a non-positive variance.
pub fn normal_log_pdf(x: f64, mean: f64, variance: f64) -> f64 {
    if x.is_nan() || mean.is_nan() || variance.is_nan() || variance <= 0.0 {
        return f64::NAN;
    }
    let z = x - mean;
    -HALF_LN_2PI - 0.5 * variance.ln() - z * z / (2.0 * variance)
}

/// CDF of `N(mean, variance)` at `x`.
pub fn normal_cdf(x: f64, mean: f64, variance: f64) -> f64 {
    if x.is_nan() || mean.is_nan() || variance.is_nan() || variance <= 0.0 {
        return f64::NAN;
    }
    let z = (x - mean) / (variance.sqrt() * SQRT_2);
    0.5 * (1.0 + erf(z))
}

/// Error function.
///
/// Abramowitz & Stegun 7.1.26 rational approximation, absolute error below
/// 1.5e-7 over the real line.
pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let a1 = 0.254_829_592;
    let a2 = -0.284_496_736;
    let a3 = 1.421_413_741;
    let a4 = -1.453_152_027;
    let a5 = 1.061_405_429;
    let p = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

/// Differential entropy of `N(·, variance)`.
pub fn normal_entropy(variance: f64) -> f64 {
    0.5 * (2.0 * PI * std::f64::consts::E * variance).ln()
}
