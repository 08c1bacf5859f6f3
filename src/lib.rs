//! # terrawass
//!
//! Optimal-transport objective functions for comparing two elevation grids (landscapes).
//!
//! Two independent pipelines:
//!
//! - **Marginal Wasserstein objective** ([`objective`]): collapse each grid to its x- and
//!   y-marginals, take the squared 1D Wasserstein-2 distance along each axis, and add a
//!   mean-elevation penalty:
//!   \[
//!   H(t,s) = W_{2,x}^2 + W_{2,y}^2 + \mu P^2,\quad P = \bar z_t - \bar z_s.
//!   \]
//! - **Exact transport objective** ([`exact`]): treat each normalized grid as a discrete
//!   measure on its cell positions and solve the earth mover's problem with a
//!   squared-Euclidean ground cost.
//!
//! ## Public invariants (must not change)
//!
//! - **No hidden normalization**: functions that normalize say so in their name or doc comment.
//! - **No NaN on degenerate input**: zero-mass grids return [`Error::Degenerate`].
//! - **Cell ordering is owned by [`points::PointSet`]**: the cost matrix and the mass vectors
//!   are built from the same point set, so they cannot disagree on flattening order.
//! - **Solvers are injected**: every pipeline has a `*_with_solver` form taking
//!   any [`solver::TransportSolver`]; the plain forms use [`solver::ExactSolver`].
//!
//! ## Module map
//!
//! - `distribution`: mass normalization, grid marginals, node positions
//! - `points`: grid point sets and squared-Euclidean cost matrices
//! - `wasserstein`: closed-form 1D Wasserstein loss (quantile matching)
//! - `emd`: exact discrete OT (transportation simplex) with an iteration cap
//! - `solver`: the `TransportSolver` capability and its implementations
//! - `objective`: the marginal objective `H`
//! - `exact`: cost matrix + exact OT loss `W`
//! - `io`: `.npy` grid loading and writing

pub mod distribution;
pub mod emd;
pub mod exact;
pub mod io;
pub mod objective;
pub mod points;
pub mod solver;
pub mod wasserstein;

pub use exact::{
    calculate_cost_matrix, calculate_cost_matrix_with, calculate_ot_loss, calculate_ot_plan,
    exact_transport, CostMatrix, ExactTransportConfig,
};
pub use io::{load_grid, save_grid};
pub use objective::{calculate_objective_function, ObjectiveBreakdown, ObjectiveConfig};
pub use points::{GridSampling, PointSet};
pub use solver::{ExactSolver, TransportPlan, TransportSolver};

/// terrawass error variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape mismatch: {0}")]
    Shape(&'static str),
    #[error("domain error: {0}")]
    Domain(&'static str),
    #[error("degenerate input: {0}")]
    Degenerate(&'static str),
    #[error("transport solver did not converge within {max_iter} iterations")]
    NonConvergence { max_iter: usize },
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("failed to read .npy grid")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),
    #[error("failed to write .npy grid")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),
}

pub type Result<T> = std::result::Result<T, Error>;
