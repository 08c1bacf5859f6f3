//! Marginal Wasserstein objective between two landscapes.
//!
//! \[
//! H(t,s) = W_2^2(t_x, s_x) + W_2^2(t_y, s_y) + \mu P^2,
//! \qquad P = \operatorname{mean}(t) - \operatorname{mean}(s),
//! \]
//!
//! where `t_x`, `s_x` are the normalized column sums (x-marginals, node spacing `dx`) and
//! `t_y`, `s_y` the normalized row sums (y-marginals, node spacing `dy`).
//!
//! Every term is a square, so `H >= 0`, `H(t,t) = 0` and `H(t,s) = H(s,t)`.

use crate::distribution::{mean_elevation, Marginal};
use crate::solver::{ExactSolver, TransportSolver};
use crate::{Error, Result};
use ndarray::ArrayView2;

/// Scalars of the marginal objective.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectiveConfig {
    /// Weight `μ` of the squared mean-elevation difference.
    pub mu: f64,
    /// Spacing of x nodes (between columns).
    pub dx: f64,
    /// Spacing of y nodes (between rows).
    pub dy: f64,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            mu: 10_000.0,
            dx: 1.0,
            dy: 1.0,
        }
    }
}

impl ObjectiveConfig {
    fn validate(&self) -> Result<()> {
        if !self.mu.is_finite() || self.mu < 0.0 {
            return Err(Error::Domain("mu must be finite and >= 0"));
        }
        if !(self.dx > 0.0) || !self.dx.is_finite() {
            return Err(Error::Domain("dx must be positive and finite"));
        }
        if !(self.dy > 0.0) || !self.dy.is_finite() {
            return Err(Error::Domain("dy must be positive and finite"));
        }
        Ok(())
    }
}

/// The individual terms of `H`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectiveBreakdown {
    /// \(W_2^2\) between the x-marginals.
    pub w2x_squared: f64,
    /// \(W_2^2\) between the y-marginals.
    pub w2y_squared: f64,
    /// `P = mean(target) - mean(source)`.
    pub mean_difference: f64,
    /// `mu * P^2`.
    pub penalty: f64,
    /// `H`.
    pub total: f64,
}

/// All terms of `H(target, source)` using `solver` for the 1D transport problems.
pub fn objective_breakdown_with_solver(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    cfg: &ObjectiveConfig,
    solver: &impl TransportSolver,
) -> Result<ObjectiveBreakdown> {
    cfg.validate()?;
    if target.dim() != source.dim() {
        return Err(Error::Shape("target and source grids must have the same shape"));
    }

    let tx = Marginal::x(target, cfg.dx)?;
    let sx = Marginal::x(source, cfg.dx)?;
    let ty = Marginal::y(target, cfg.dy)?;
    let sy = Marginal::y(source, cfg.dy)?;

    // Both sides share the target's node locations (same shape, same spacing).
    let w2x_squared = solver.wasserstein_1d(
        &tx.positions.view(),
        &tx.positions.view(),
        &tx.weights.view(),
        &sx.weights.view(),
        2.0,
    )?;
    let w2y_squared = solver.wasserstein_1d(
        &ty.positions.view(),
        &ty.positions.view(),
        &ty.weights.view(),
        &sy.weights.view(),
        2.0,
    )?;

    let mean_difference = mean_elevation(target)? - mean_elevation(source)?;
    let penalty = cfg.mu * mean_difference * mean_difference;
    let total = w2x_squared + w2y_squared + penalty;

    log::debug!(
        "objective: w2x^2={w2x_squared:.6e} w2y^2={w2y_squared:.6e} \
         P={mean_difference:.6e} H={total:.6e}"
    );

    Ok(ObjectiveBreakdown {
        w2x_squared,
        w2y_squared,
        mean_difference,
        penalty,
        total,
    })
}

/// [`objective_breakdown_with_solver`] with the exact in-crate solver.
pub fn objective_breakdown(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    cfg: &ObjectiveConfig,
) -> Result<ObjectiveBreakdown> {
    objective_breakdown_with_solver(target, source, cfg, &ExactSolver)
}

/// `H(target, source)` for the given `mu`, `dx`, `dy`.
///
/// - `target`, `source`: same-shaped, finite elevation grids. Cells may be negative, but every
///   row and column sum must be nonnegative and the totals positive, since the axis sums are
///   the transport weights.
/// - `mu`: weight of the squared mean-elevation difference.
/// - `dx`, `dy`: node spacing along columns / rows (`1.0` for index units).
pub fn calculate_objective_function(
    target: &ArrayView2<f64>,
    source: &ArrayView2<f64>,
    mu: f64,
    dx: f64,
    dy: f64,
) -> Result<f64> {
    let cfg = ObjectiveConfig { mu, dx, dy };
    Ok(objective_breakdown(target, source, &cfg)?.total)
}
