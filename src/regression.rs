//! Ordinary least squares fit of the Gibbs-Helmholtz relation
//!
//! The physical model asserts ln(gamma) is linear in 1/T, so every group
//! is fit as `y = intercept + slope * x` with `x = 1/temperature` and
//! `y = ln(property_value)`. R² close to 1 means the group's measurements
//! are internally consistent with the model.

use crate::model::{GroupKind, MeasurementRecord, ReferenceGroup};
use serde::{Deserialize, Serialize};

/// Fitted line parameters for one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    /// Slope of ln(gamma) vs 1/T
    pub slope: f64,
    /// Intercept of ln(gamma) vs 1/T
    pub intercept: f64,
    /// Squared Pearson correlation of the fit
    pub r_squared: f64,
}

impl LineFit {
    /// Predicted ordinate at `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit an OLS line through `(x, y)` pairs.
///
/// Returns `None` for degenerate inputs: mismatched or < 2 points, zero
/// variance in `x` (vertical line), or non-finite inputs. When `y` has
/// zero variance the fit is a horizontal line with `r_squared = 0`.
#[must_use]
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<LineFit> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx <= 0.0 || !sxx.is_finite() {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r_squared = if syy > 0.0 {
        ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    if !slope.is_finite() || !intercept.is_finite() || !r_squared.is_finite() {
        return None;
    }

    Some(LineFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Fit the Gibbs-Helmholtz line to one group's measurements.
///
/// Degenerate cases produce `None` and exclude the group from every
/// downstream comparison that needs a fitted line: fewer than 2 samples,
/// a non-positive temperature or property value, or a pooled group still
/// below the minimum-population threshold (a pooled bucket that small
/// carries no provenance signal worth fitting).
#[must_use]
pub fn fit_group(group: &ReferenceGroup, min_group_size: usize) -> Option<LineFit> {
    if group.kind == GroupKind::Pooled && group.len() < min_group_size {
        return None;
    }
    if group.len() < 2 || group.members.iter().any(|m| !m.is_transformable()) {
        return None;
    }
    let x: Vec<f64> = group
        .members
        .iter()
        .map(MeasurementRecord::inverse_temperature)
        .collect();
    let y: Vec<f64> = group
        .members
        .iter()
        .map(MeasurementRecord::ln_property)
        .collect();
    fit_line(&x, &y)
}

/// Adjusted R²: `1 − (1−R²)(n−1)/(n−2)`. Defined only for n > 2.
#[must_use]
pub fn adjusted_r_squared(r_squared: f64, sample_count: usize) -> Option<f64> {
    if sample_count <= 2 {
        return None;
    }
    let n = sample_count as f64;
    Some(1.0 - (1.0 - r_squared) * (n - 1.0) / (n - 2.0))
}

/// Residual sum of squares of `(x, y)` against a fitted line.
#[must_use]
pub fn residual_sum_of_squares(fit: &LineFit, x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - fit.predict(xi);
            r * r
        })
        .sum()
}
