//! Grid cells as weighted point sets, and squared-Euclidean cost matrices between them.
//!
//! [`PointSet`] is the single owner of “which flat index is which cell”. Both the cost
//! matrix rows/columns and the mass vectors handed to a transport solver are produced by
//! a `PointSet`, so they always agree on ordering.

use crate::distribution::{normalize_mass, validate_mass_grid};
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2};

/// How grid indices are turned into coordinates along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "lowercase"))]
pub enum GridSampling {
    /// `arange(0, dim, step)`: coordinates `i * step` while `i * step < dim`.
    ///
    /// This samples `ceil(dim / step)` coordinates, which only equals `dim` when
    /// `step == 1` (or, more generally, when the count happens to line up). A mismatch is
    /// reported as [`Error::Shape`] rather than producing a cost matrix whose points
    /// do not correspond to grid cells.
    #[default]
    Arange,
    /// Coordinates `i * step` for every `i in 0..dim`.
    Scaled,
}

impl GridSampling {
    /// Coordinates along an axis with `dim` cells.
    pub fn coordinates(self, dim: usize, step: f64) -> Result<Array1<f64>> {
        if !(step > 0.0) || !step.is_finite() {
            return Err(Error::Domain("grid step must be positive and finite"));
        }
        let count = match self {
            GridSampling::Arange => (dim as f64 / step).ceil() as usize,
            GridSampling::Scaled => dim,
        };
        if count != dim {
            log::warn!(
                "arange(0, {dim}, {step}) yields {count} coordinates for an axis of {dim} cells"
            );
            return Err(Error::Shape(
                "arange sampling does not yield one coordinate per grid cell \
                 (use GridSampling::Scaled)",
            ));
        }
        Ok(Array1::from_shape_fn(count, |i| i as f64 * step))
    }
}

/// The cells of a `rows × cols` grid as 2D points.
///
/// Point `k` is cell `(k / cols, k % cols)`, i.e. row-major order, which is the logical
/// iteration order of an `ndarray` grid. Its position is `(row_coords[r], col_coords[c])`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    rows: usize,
    cols: usize,
    row_coords: Array1<f64>,
    col_coords: Array1<f64>,
}

impl PointSet {
    /// Point set for a grid of `shape = (rows, cols)` with the same `step` on both axes.
    pub fn new(shape: (usize, usize), step: f64, sampling: GridSampling) -> Result<Self> {
        let (rows, cols) = shape;
        if rows == 0 || cols == 0 {
            return Err(Error::Domain("grid must be non-empty"));
        }
        Ok(Self {
            rows,
            cols,
            row_coords: sampling.coordinates(rows, step)?,
            col_coords: sampling.coordinates(cols, step)?,
        })
    }

    /// Point set matching `grid`'s shape.
    pub fn for_grid(grid: &ArrayView2<f64>, step: f64, sampling: GridSampling) -> Result<Self> {
        Self::new(grid.dim(), step, sampling)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid cell `(row, col)` of point `k`.
    #[inline]
    pub fn cell(&self, k: usize) -> (usize, usize) {
        (k / self.cols, k % self.cols)
    }

    /// Position of point `k`.
    #[inline]
    pub fn position(&self, k: usize) -> [f64; 2] {
        let (r, c) = self.cell(k);
        [self.row_coords[r], self.col_coords[c]]
    }

    /// All positions as an `n × 2` matrix (row `k` is point `k`).
    pub fn positions(&self) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((self.len(), 2));
        for k in 0..self.len() {
            let [y, x] = self.position(k);
            out[[k, 0]] = y;
            out[[k, 1]] = x;
        }
        out
    }

    /// Normalize `grid` to unit mass and flatten it in this point set's order.
    ///
    /// Fails with [`Error::Shape`] if `grid` is not the grid this point set describes and
    /// with [`Error::Degenerate`] if the grid has zero total mass.
    pub fn masses(&self, grid: &ArrayView2<f64>) -> Result<Array1<f64>> {
        if grid.dim() != self.shape() {
            return Err(Error::Shape("grid shape does not match the point set"));
        }
        validate_mass_grid(grid)?;
        let flat: Array1<f64> = grid.iter().copied().collect();
        normalize_mass(&flat.view()).map_err(|e| match e {
            Error::Degenerate(_) => Error::Degenerate("grid has zero total mass"),
            other => other,
        })
    }
}

/// Squared Euclidean distance matrix between the rows of `x` (`n × d`) and `y` (`m × d`).
///
/// Output has shape `n × m`.
pub fn sqeuclidean_cost_matrix(x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> Result<Array2<f64>> {
    if x.ncols() != y.ncols() {
        return Err(Error::Shape("x and y must have the same dimension"));
    }
    if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
        return Err(Error::Domain("x/y contain NaN/Inf"));
    }
    let n = x.nrows();
    let m = y.nrows();
    log::debug!(
        "building {n}x{m} cost matrix ({:.1} MiB)",
        (n * m * std::mem::size_of::<f64>()) as f64 / (1024.0 * 1024.0)
    );
    let mut cost = Array2::<f64>::zeros((n, m));
    for i in 0..n {
        let xi = x.row(i);
        for j in 0..m {
            let yj = y.row(j);
            let mut s = 0.0f64;
            for k in 0..xi.len() {
                let d = xi[k] - yj[k];
                s += d * d;
            }
            cost[[i, j]] = s;
        }
    }
    Ok(cost)
}
