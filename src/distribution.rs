//! Grid-to-distribution helpers: validation, normalization, marginals.
//!
//! Validation never rescales. Normalization happens in [`normalize_mass`] and in
//! [`Marginal`], whose weights are documented as normalized.

use crate::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Explicit normalization to the simplex via `p_i / sum(p)`, with checks.
///
/// A zero total is reported as [`Error::Degenerate`] instead of producing NaN.
pub fn normalize_mass(p: &ArrayView1<f64>) -> Result<Array1<f64>> {
    if p.is_empty() {
        return Err(Error::Domain("mass vector must be non-empty"));
    }
    if p.iter().any(|&x| !x.is_finite()) {
        return Err(Error::Domain("mass vector contains non-finite values"));
    }
    if p.iter().any(|&x| x < 0.0) {
        return Err(Error::Domain("mass vector must be nonnegative to normalize"));
    }
    let s: f64 = p.sum();
    if !(s > 0.0) {
        return Err(Error::Degenerate("mass vector has zero total mass"));
    }
    Ok(p.mapv(|x| x / s))
}

/// Reject empty grids and grids holding NaN/Inf.
pub fn validate_grid(grid: &ArrayView2<f64>) -> Result<()> {
    if grid.is_empty() {
        return Err(Error::Domain("grid must be non-empty"));
    }
    if grid.iter().any(|&z| !z.is_finite()) {
        return Err(Error::Domain("grid contains non-finite values"));
    }
    Ok(())
}

/// Like [`validate_grid`], and additionally require nonnegative values so the grid
/// can be read as a (unnormalized) mass distribution.
pub fn validate_mass_grid(grid: &ArrayView2<f64>) -> Result<()> {
    validate_grid(grid)?;
    if grid.iter().any(|&z| z < 0.0) {
        return Err(Error::Domain(
            "grid must be nonnegative to be used as a mass distribution",
        ));
    }
    Ok(())
}

/// Node locations `i * step` for `i in 0..n`.
pub fn node_positions(n: usize, step: f64) -> Array1<f64> {
    Array1::from_shape_fn(n, |i| i as f64 * step)
}

/// Arithmetic mean over every cell of `grid`.
pub fn mean_elevation(grid: &ArrayView2<f64>) -> Result<f64> {
    validate_grid(grid)?;
    grid.mean().ok_or(Error::Domain("grid must be non-empty"))
}

/// A 1D marginal of a grid: node positions plus **normalized** weights.
///
/// Individual cells may be negative (below-datum elevations); only the axis sums act as
/// weights, and those must be nonnegative with a positive total.
#[derive(Debug, Clone, PartialEq)]
pub struct Marginal {
    /// Node locations `i * step`.
    pub positions: Array1<f64>,
    /// Weights, summing to 1.
    pub weights: Array1<f64>,
}

impl Marginal {
    /// x-marginal: sum over axis 0 (one weight per column), positions `i * dx`.
    pub fn x(grid: &ArrayView2<f64>, dx: f64) -> Result<Self> {
        Self::along(grid, Axis(0), dx)
    }

    /// y-marginal: sum over axis 1 (one weight per row), positions `j * dy`.
    pub fn y(grid: &ArrayView2<f64>, dy: f64) -> Result<Self> {
        Self::along(grid, Axis(1), dy)
    }

    fn along(grid: &ArrayView2<f64>, axis: Axis, step: f64) -> Result<Self> {
        if !(step > 0.0) || !step.is_finite() {
            return Err(Error::Domain("grid step must be positive and finite"));
        }
        validate_grid(grid)?;
        let sums = grid.sum_axis(axis);
        if sums.iter().any(|&w| w < 0.0) {
            return Err(Error::Domain("grid marginal has a negative axis sum"));
        }
        let weights = normalize_mass(&sums.view()).map_err(|e| match e {
            Error::Degenerate(_) => Error::Degenerate("grid marginal has zero total mass"),
            other => other,
        })?;
        Ok(Self {
            positions: node_positions(weights.len(), step),
            weights,
        })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
