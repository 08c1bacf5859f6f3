//! Exact-transport objective between two landscapes.
//!
//! Each grid is read as a discrete measure: cell `(r, c)` is a point carrying mass
//! `z[r, c] / Σz`. The objective is the earth mover's distance between the source and
//! target measures under the squared-Euclidean ground cost.
//!
//! The cost matrix is built once ([`calculate_cost_matrix`]) and may be reused across
//! many loss evaluations ([`calculate_ot_loss`]). It carries the [`PointSet`]s it was built
//! from, and the loss derives its mass vectors from those same point sets.

use crate::points::{GridSampling, PointSet};
use crate::solver::{ExactSolver, TransportPlan, TransportSolver};
use crate::{Error, Result};
use ndarray::{Array2, ArrayView2};

/// Default pivot budget for the exact solver.
pub const DEFAULT_MAX_NUM_ITERATIONS: usize = 10_000_000;

/// Settings for the exact-transport pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExactTransportConfig {
    /// Grid step of the target landscape (both axes).
    pub target_dx: f64,
    /// Grid step of the source landscape (both axes).
    pub source_dx: f64,
    /// How grid indices become coordinates.
    pub sampling: GridSampling,
    /// Solver iteration cap.
    pub max_num_iterations: usize,
}

impl Default for ExactTransportConfig {
    fn default() -> Self {
        Self {
            target_dx: 1.0,
            source_dx: 1.0,
            sampling: GridSampling::Arange,
            max_num_iterations: DEFAULT_MAX_NUM_ITERATIONS,
        }
    }
}

/// Squared-Euclidean cost between every source cell and every target cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    /// Shape `(source.len(), target.len())`.
    pub cost: Array2<f64>,
    /// Row index space.
    pub source: PointSet,
    /// Column index space.
    pub target: PointSet,
}

impl CostMatrix {
    /// `(number of source points, number of target points)`.
    pub fn dim(&self) -> (usize, usize) {
        self.cost.dim()
    }
}

/// [`calculate_cost_matrix`] with an explicit sampling rule and solver.
pub fn calculate_cost_matrix_with_solver(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    target_dx: f64,
    source_dx: f64,
    sampling: GridSampling,
    solver: &impl TransportSolver,
) -> Result<CostMatrix> {
    let target_points = PointSet::for_grid(target, target_dx, sampling)?;
    let source_points = PointSet::for_grid(source, source_dx, sampling)?;
    let cost = solver.pairwise_cost(
        &source_points.positions().view(),
        &target_points.positions().view(),
    )?;
    if cost.dim() != (source_points.len(), target_points.len()) {
        return Err(Error::Shape("solver returned a cost matrix of the wrong shape"));
    }
    Ok(CostMatrix {
        cost,
        source: source_points,
        target: target_points,
    })
}

/// [`calculate_cost_matrix`] with an explicit sampling rule.
pub fn calculate_cost_matrix_with(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    target_dx: f64,
    source_dx: f64,
    sampling: GridSampling,
) -> Result<CostMatrix> {
    calculate_cost_matrix_with_solver(target, source, target_dx, source_dx, sampling, &ExactSolver)
}

/// Cost matrix between the cells of `source` (rows) and `target` (columns).
///
/// - `target_dx`, `source_dx`: grid step of each landscape, applied to both of its axes.
/// - Coordinates follow [`GridSampling::Arange`]; a step that does not give one coordinate
///   per cell is rejected with [`Error::Shape`].
pub fn calculate_cost_matrix(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    target_dx: f64,
    source_dx: f64,
) -> Result<CostMatrix> {
    calculate_cost_matrix_with(target, source, target_dx, source_dx, GridSampling::Arange)
}

/// Optimal plan moving `source` onto `target` under `cost`, computed by `solver`.
pub fn calculate_ot_plan_with_solver(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    cost: &CostMatrix,
    max_num_iterations: usize,
    solver: &impl TransportSolver,
) -> Result<TransportPlan> {
    if max_num_iterations == 0 {
        return Err(Error::Domain("max_num_iterations must be >= 1"));
    }
    let a = cost.source.masses(source)?;
    let b = cost.target.masses(target)?;
    if cost.dim() != (a.len(), b.len()) {
        return Err(Error::Shape(
            "cost matrix shape does not match the source/target point counts",
        ));
    }
    log::debug!(
        "ot: {} source points -> {} target points",
        a.len(),
        b.len()
    );
    solver.emd(&a.view(), &b.view(), &cost.cost.view(), max_num_iterations)
}

/// [`calculate_ot_plan_with_solver`] with the exact in-crate solver.
pub fn calculate_ot_plan(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    cost: &CostMatrix,
    max_num_iterations: usize,
) -> Result<TransportPlan> {
    calculate_ot_plan_with_solver(target, source, cost, max_num_iterations, &ExactSolver)
}

/// Minimum cost of transporting the normalized `source` onto the normalized `target`.
///
/// `cost` must come from [`calculate_cost_matrix`] (or `_with_solver`) for grids of the same
/// shapes; its point sets decide how the grids are flattened.
pub fn calculate_ot_loss(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    cost: &CostMatrix,
    max_num_iterations: usize,
) -> Result<f64> {
    Ok(calculate_ot_plan(target, source, cost, max_num_iterations)?.cost)
}

/// Build the cost matrix and solve in one call, driven by `cfg`.
pub fn exact_transport(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    cfg: &ExactTransportConfig,
    solver: &impl TransportSolver,
) -> Result<TransportPlan> {
    let cost = calculate_cost_matrix_with_solver(
        target,
        source,
        cfg.target_dx,
        cfg.source_dx,
        cfg.sampling,
        solver,
    )?;
    calculate_ot_plan_with_solver(target, source, &cost, cfg.max_num_iterations, solver)
}
