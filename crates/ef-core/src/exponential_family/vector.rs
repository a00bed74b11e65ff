//! Fixed-size parameter vectors.
//!
//! One container serves natural parameters, moment parameters and sufficient
//! statistics. Binary operations check dimensions and report
//! [`Error::DimensionMismatch`] instead of truncating.

use ef_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A fixed-length real vector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(Vec<f64>);

/// Canonical parameters in which the log-density is linear in the statistics.
pub type NaturalParameters = ParameterVector;

/// Expected sufficient statistics.
pub type MomentParameters = ParameterVector;

/// Summary of one observation.
pub type SufficientStatistics = ParameterVector;

impl ParameterVector {
    /// Zero-filled vector of length `len`.
    pub fn zeros(len: usize) -> Self {
        ParameterVector(vec![0.0; len])
    }

    /// Wrap an existing vector.
    pub fn from_vec(values: Vec<f64>) -> Self {
        ParameterVector(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element `i`. Panics when out of bounds, like slice indexing.
    pub fn get(&self, i: usize) -> f64 {
        self.0[i]
    }

    /// Set element `i`. Panics when out of bounds, like slice indexing.
    pub fn set(&mut self, i: usize, value: f64) {
        self.0[i] = value;
    }

    /// Reset every element to zero.
    pub fn zero(&mut self) {
        self.0.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Overwrite with the contents of `other`.
    pub fn copy_from(&mut self, other: &ParameterVector) -> Result<()> {
        self.check_len(other)?;
        self.0.copy_from_slice(&other.0);
        Ok(())
    }

    /// Elementwise `self += other`.
    pub fn sum(&mut self, other: &ParameterVector) -> Result<()> {
        self.check_len(other)?;
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a += b;
        }
        Ok(())
    }

    /// Elementwise `self -= other`.
    pub fn subtract(&mut self, other: &ParameterVector) -> Result<()> {
        self.check_len(other)?;
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a -= b;
        }
        Ok(())
    }

    /// Multiply every element by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.0.iter_mut().for_each(|v| *v *= factor);
    }

    /// Divide every element by `divisor`.
    pub fn divide_by(&mut self, divisor: f64) {
        self.0.iter_mut().for_each(|v| *v /= divisor);
    }

    /// Inner product.
    pub fn dot(&self, other: &ParameterVector) -> Result<f64> {
        self.check_len(other)?;
        Ok(self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum())
    }

    /// Copy of the elements `[start, start + len)`.
    pub fn block(&self, start: usize, len: usize) -> Result<ParameterVector> {
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.len())
            .ok_or(Error::DimensionMismatch {
                expected: start.saturating_add(len),
                actual: self.len(),
            })?;
        Ok(ParameterVector(self.0[start..end].to_vec()))
    }

    /// Largest absolute elementwise difference.
    pub fn max_abs_diff(&self, other: &ParameterVector) -> Result<f64> {
        self.check_len(other)?;
        Ok(self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    fn check_len(&self, other: &ParameterVector) -> Result<()> {
        if self.len() != other.len() {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(())
    }
}

impl Index<usize> for ParameterVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for ParameterVector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

impl From<Vec<f64>> for ParameterVector {
    fn from(values: Vec<f64>) -> Self {
        ParameterVector(values)
    }
}
