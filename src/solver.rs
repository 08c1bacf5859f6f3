//! The transport-solver capability consumed by the objective pipelines.
//!
//! Both objectives only need three operations from an OT backend:
//!
//! - a 1D Wasserstein loss between weighted supports,
//! - a pairwise ground-cost matrix between point sets,
//! - an exact (or, for approximate backends, documented-as-approximate) transport plan.
//!
//! [`ExactSolver`] implements them in-crate ([`crate::wasserstein`], [`crate::emd`]).
//! With the `sinkhorn` feature, [`SinkhornSolver`] swaps the plan computation for an
//! entropic one from `wass`.

use crate::points::sqeuclidean_cost_matrix;
use crate::Result;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// One nonzero entry of a transport plan: `mass` moves from `source` to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Flow {
    pub source: usize,
    pub target: usize,
    pub mass: f64,
}

/// A (sparse) transport plan and its total cost \(\langle C, \pi\rangle\).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TransportPlan {
    /// `(number of sources, number of targets)`.
    pub shape: (usize, usize),
    /// Entries with positive mass.
    pub flows: Vec<Flow>,
    /// Total transport cost.
    pub cost: f64,
    /// Solver iterations used (pivots for the exact solver).
    pub iterations: usize,
}

impl TransportPlan {
    /// Expand into a dense `shape.0 × shape.1` coupling matrix.
    pub fn dense(&self) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros(self.shape);
        for f in &self.flows {
            out[[f.source, f.target]] += f.mass;
        }
        out
    }

    /// Total mass moved.
    pub fn mass(&self) -> f64 {
        self.flows.iter().map(|f| f.mass).sum()
    }
}

/// Optimal-transport backend.
pub trait TransportSolver {
    /// \(W_p^p\) between two weighted 1D supports (weights already normalized).
    fn wasserstein_1d(
        &self,
        u_values: &ArrayView1<f64>,
        v_values: &ArrayView1<f64>,
        u_weights: &ArrayView1<f64>,
        v_weights: &ArrayView1<f64>,
        p: f64,
    ) -> Result<f64>;

    /// Ground cost between the rows of `x` and `y`. Squared Euclidean by default.
    fn pairwise_cost(&self, x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> Result<Array2<f64>> {
        sqeuclidean_cost_matrix(x, y)
    }

    /// Transport plan from `a` (rows of `cost`) to `b` (columns of `cost`).
    fn emd(
        &self,
        a: &ArrayView1<f64>,
        b: &ArrayView1<f64>,
        cost: &ArrayView2<f64>,
        max_iter: usize,
    ) -> Result<TransportPlan>;

    /// Cost of [`Self::emd`] only.
    fn emd2(
        &self,
        a: &ArrayView1<f64>,
        b: &ArrayView1<f64>,
        cost: &ArrayView2<f64>,
        max_iter: usize,
    ) -> Result<f64> {
        Ok(self.emd(a, b, cost, max_iter)?.cost)
    }
}

/// Exact in-crate backend: quantile matching in 1D, transportation simplex otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactSolver;

impl TransportSolver for ExactSolver {
    fn wasserstein_1d(
        &self,
        u_values: &ArrayView1<f64>,
        v_values: &ArrayView1<f64>,
        u_weights: &ArrayView1<f64>,
        v_weights: &ArrayView1<f64>,
        p: f64,
    ) -> Result<f64> {
        crate::wasserstein::wasserstein_1d(u_values, v_values, u_weights, v_weights, p)
    }

    fn emd(
        &self,
        a: &ArrayView1<f64>,
        b: &ArrayView1<f64>,
        cost: &ArrayView2<f64>,
        max_iter: usize,
    ) -> Result<TransportPlan> {
        crate::emd::solve(a, b, cost, max_iter)
    }
}

/// Entropic OT backend (log-domain Sinkhorn from `wass`).
///
/// Notes:
/// - This is **not** the exact earth mover's distance. The returned cost is
///   \(\langle C, \pi_\varepsilon\rangle\) for the entropic plan, which is biased upward.
/// - Computation happens in `f32`.
/// - Failure to reach `tol` within `max_iter` is reported as [`crate::Error::NonConvergence`].
#[cfg(feature = "sinkhorn")]
#[derive(Debug, Clone, Copy)]
pub struct SinkhornSolver {
    /// Entropic regularization `ε`.
    pub reg: f64,
    /// Marginal-error tolerance.
    pub tol: f64,
}

#[cfg(feature = "sinkhorn")]
impl Default for SinkhornSolver {
    fn default() -> Self {
        Self { reg: 0.05, tol: 1e-4 }
    }
}

#[cfg(feature = "sinkhorn")]
impl TransportSolver for SinkhornSolver {
    fn wasserstein_1d(
        &self,
        u_values: &ArrayView1<f64>,
        v_values: &ArrayView1<f64>,
        u_weights: &ArrayView1<f64>,
        v_weights: &ArrayView1<f64>,
        p: f64,
    ) -> Result<f64> {
        // The 1D problem has a closed form; no reason to regularize it.
        crate::wasserstein::wasserstein_1d(u_values, v_values, u_weights, v_weights, p)
    }

    fn emd(
        &self,
        a: &ArrayView1<f64>,
        b: &ArrayView1<f64>,
        cost: &ArrayView2<f64>,
        max_iter: usize,
    ) -> Result<TransportPlan> {
        use crate::Error;

        if cost.dim() != (a.len(), b.len()) {
            return Err(Error::Shape("cost matrix must have shape (a.len(), b.len())"));
        }
        if !(self.reg > 0.0) || !self.reg.is_finite() {
            return Err(Error::Domain("reg must be positive and finite"));
        }
        if !(self.tol > 0.0) || !self.tol.is_finite() {
            return Err(Error::Domain("tol must be positive and finite"));
        }
        if max_iter == 0 {
            return Err(Error::Domain("max_iter must be >= 1"));
        }

        let a32 = a.mapv(|x| x as f32);
        let b32 = b.mapv(|x| x as f32);
        let c32 = cost.mapv(|x| x as f32);
        let (plan, dist, iters) = wass::sinkhorn_log_with_convergence(
            &a32,
            &b32,
            &c32,
            self.reg as f32,
            max_iter,
            self.tol as f32,
        )
        .map_err(|_| Error::NonConvergence { max_iter })?;

        let flows = plan
            .indexed_iter()
            .filter(|(_, &m)| m > 0.0)
            .map(|((i, j), &m)| Flow {
                source: i,
                target: j,
                mass: m as f64,
            })
            .collect();
        Ok(TransportPlan {
            shape: cost.dim(),
            flows,
            cost: dist as f64,
            iterations: iters as usize,
        })
    }
}
