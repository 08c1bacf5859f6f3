//! Exact discrete optimal transport (earth mover's distance).
//!
//! Solves
//! \[
//! \min_{\pi \ge 0} \langle C, \pi \rangle
//! \quad\text{s.t.}\quad \pi \mathbf 1 = a,\ \pi^\top \mathbf 1 = b
//! \]
//! with the transportation simplex (u–v / MODI method) on the bipartite network:
//!
//! 1. Northwest-corner initial basis: `m + n - 1` basic cells forming a spanning tree over
//!    the `m` row nodes and `n` column nodes (degenerate zero-flow cells included).
//! 2. Dual potentials `u_i + v_j = C_ij` on basic cells, solved along the tree.
//! 3. Pricing: the entering cell is the most negative reduced cost `C_ij - u_i - v_j`
//!    inside a block of cells (block search); if no cell is below `-eps`, the basis is optimal.
//! 4. The entering cell closes a unique cycle with the tree path between its row and column.
//!    Flow `θ` (the ratio test minimum) is pushed around the cycle and the limiting cell leaves.
//!
//! After a run of degenerate pivots (`θ = 0`) the solver switches to Bland's rule (smallest
//! eligible cell enters, smallest tied cell leaves) until the next non-degenerate pivot,
//! which rules out cycling.
//!
//! Every pivot counts as one iteration. If an optimal basis is not certified within
//! `max_iter` pivots, [`Error::NonConvergence`] is returned.

use crate::solver::{Flow, TransportPlan};
use crate::{Error, Result};
use ndarray::{ArrayView1, ArrayView2};

/// Relative tolerance on total masses (`|Σa − Σb| <= MASS_TOL · max(Σa, Σb)`).
pub const MASS_TOL: f64 = 1e-7;

/// Reduced costs above `-REDUCED_COST_TOL · max|C|` are treated as nonnegative.
pub const REDUCED_COST_TOL: f64 = 1e-10;

const NONE: usize = usize::MAX;

struct Basis {
    m: usize,
    n: usize,
    /// Per basic slot: row, col, flow.
    row: Vec<usize>,
    col: Vec<usize>,
    flow: Vec<f64>,
    /// Node -> basic slots touching it. Rows are nodes `0..m`, columns `m..m+n`.
    adj: Vec<Vec<usize>>,
    /// Cell `i * n + j` -> slot, or `NONE` if nonbasic.
    slot_of: Vec<usize>,
}

impl Basis {
    fn northwest_corner(a: &ArrayView1<f64>, b: &ArrayView1<f64>, b_scale: f64) -> Self {
        let m = a.len();
        let n = b.len();
        let mut basis = Self {
            m,
            n,
            row: Vec::with_capacity(m + n - 1),
            col: Vec::with_capacity(m + n - 1),
            flow: Vec::with_capacity(m + n - 1),
            adj: vec![Vec::new(); m + n],
            slot_of: vec![NONE; m * n],
        };

        let mut supply: Vec<f64> = a.to_vec();
        let mut demand: Vec<f64> = b.iter().map(|&x| x * b_scale).collect();
        let (mut i, mut j) = (0usize, 0usize);
        loop {
            let x = supply[i].min(demand[j]).max(0.0);
            supply[i] -= x;
            demand[j] -= x;
            basis.push(i, j, x);
            if i == m - 1 && j == n - 1 {
                break;
            }
            let advance_row = if i == m - 1 {
                false
            } else if j == n - 1 {
                true
            } else {
                supply[i] <= demand[j]
            };
            if advance_row {
                i += 1;
            } else {
                j += 1;
            }
        }
        debug_assert_eq!(basis.row.len(), m + n - 1);
        basis
    }

    fn push(&mut self, i: usize, j: usize, x: f64) {
        let slot = self.row.len();
        self.row.push(i);
        self.col.push(j);
        self.flow.push(x);
        self.link(slot);
    }

    fn link(&mut self, slot: usize) {
        let (i, j) = (self.row[slot], self.col[slot]);
        self.adj[i].push(slot);
        self.adj[self.m + j].push(slot);
        self.slot_of[i * self.n + j] = slot;
    }

    fn unlink(&mut self, slot: usize) {
        let (i, j) = (self.row[slot], self.col[slot]);
        self.adj[i].retain(|&s| s != slot);
        self.adj[self.m + j].retain(|&s| s != slot);
        self.slot_of[i * self.n + j] = NONE;
    }

    /// The node at the other end of `slot`, seen from `node`.
    #[inline]
    fn other(&self, slot: usize, node: usize) -> usize {
        if node < self.m {
            self.m + self.col[slot]
        } else {
            self.row[slot]
        }
    }

    /// Solve `u_i + v_j = C_ij` over the spanning tree, with `u_0 = 0`.
    fn potentials(&self, cost: &ArrayView2<f64>, u: &mut [f64], v: &mut [f64], seen: &mut [bool]) {
        seen.fill(false);
        let mut stack = vec![0usize];
        seen[0] = true;
        u[0] = 0.0;
        while let Some(node) = stack.pop() {
            for &slot in &self.adj[node] {
                let next = self.other(slot, node);
                if seen[next] {
                    continue;
                }
                seen[next] = true;
                let (i, j) = (self.row[slot], self.col[slot]);
                if next < self.m {
                    u[i] = cost[[i, j]] - v[j];
                } else {
                    v[j] = cost[[i, j]] - u[i];
                }
                stack.push(next);
            }
        }
    }

    /// Slots on the tree path from row node `from_row` to column node `m + to_col`,
    /// ordered starting at the row end.
    fn tree_path(&self, from_row: usize, to_col: usize, parent: &mut [usize]) -> Vec<usize> {
        let start = self.m + to_col;
        parent.fill(NONE);
        // BFS from the column end; parent[node] = slot used to reach node.
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        let mut reached = false;
        let mut visited = vec![false; self.m + self.n];
        visited[start] = true;
        while let Some(node) = queue.pop_front() {
            if node == from_row {
                reached = true;
                break;
            }
            for &slot in &self.adj[node] {
                let next = self.other(slot, node);
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                parent[next] = slot;
                queue.push_back(next);
            }
        }
        debug_assert!(reached, "basis must be a spanning tree");

        let mut path = Vec::new();
        let mut node = from_row;
        while node != start {
            let slot = parent[node];
            path.push(slot);
            node = self.other(slot, node);
        }
        path
    }
}

struct Pricing {
    block: usize,
    next: usize,
}

impl Pricing {
    fn new(cells: usize) -> Self {
        let block = ((cells as f64).sqrt().ceil() as usize).max(10).min(cells);
        Self { block, next: 0 }
    }

    /// Most negative reduced cost within the first block (scanning cyclically) that has one.
    fn block_search(
        &mut self,
        basis: &Basis,
        cost: &ArrayView2<f64>,
        u: &[f64],
        v: &[f64],
        eps: f64,
    ) -> Option<usize> {
        let total = basis.m * basis.n;
        let mut best = None;
        let mut best_rc = -eps;
        let mut e = self.next;
        let mut in_block = 0usize;
        for _ in 0..total {
            if basis.slot_of[e] == NONE {
                let (i, j) = (e / basis.n, e % basis.n);
                let rc = cost[[i, j]] - u[i] - v[j];
                if rc < best_rc {
                    best_rc = rc;
                    best = Some(e);
                }
            }
            e += 1;
            if e == total {
                e = 0;
            }
            in_block += 1;
            if in_block == self.block {
                if best.is_some() {
                    break;
                }
                in_block = 0;
            }
        }
        self.next = e;
        best
    }

    /// Bland's rule: the first eligible cell in index order.
    fn first_eligible(
        basis: &Basis,
        cost: &ArrayView2<f64>,
        u: &[f64],
        v: &[f64],
        eps: f64,
    ) -> Option<usize> {
        (0..basis.m * basis.n).find(|&e| {
            if basis.slot_of[e] != NONE {
                return false;
            }
            let (i, j) = (e / basis.n, e % basis.n);
            cost[[i, j]] - u[i] - v[j] < -eps
        })
    }
}

fn validate(
    a: &ArrayView1<f64>,
    b: &ArrayView1<f64>,
    cost: &ArrayView2<f64>,
    max_iter: usize,
) -> Result<(f64, f64)> {
    if a.is_empty() || b.is_empty() {
        return Err(Error::Domain("a and b must be non-empty"));
    }
    if cost.dim() != (a.len(), b.len()) {
        return Err(Error::Shape("cost matrix must have shape (a.len(), b.len())"));
    }
    if max_iter == 0 {
        return Err(Error::Domain("max_iter must be >= 1"));
    }
    if a.iter().chain(b.iter()).any(|&x| x < 0.0 || !x.is_finite()) {
        return Err(Error::Domain("a and b must be finite and nonnegative"));
    }
    if cost.iter().any(|c| !c.is_finite()) {
        return Err(Error::Domain("cost matrix contains NaN/Inf"));
    }
    let sa = a.sum();
    let sb = b.sum();
    if !(sa > 0.0) || !(sb > 0.0) {
        return Err(Error::Degenerate("a and b must have positive total mass"));
    }
    if (sa - sb).abs() > MASS_TOL * sa.max(sb) {
        return Err(Error::Domain("a and b must have the same total mass"));
    }
    Ok((sa, sb))
}

/// Exact minimum-cost transport plan from `a` to `b` under `cost`.
///
/// - `a`: source masses (`m`), rows of `cost`
/// - `b`: target masses (`n`), columns of `cost`
/// - `a` and `b` must be nonnegative with equal totals (within [`MASS_TOL`]); `b` is
///   rescaled to `Σa` internally to absorb the roundoff.
/// - `max_iter`: maximum number of simplex pivots (must be >= 1)
pub fn solve(
    a: &ArrayView1<f64>,
    b: &ArrayView1<f64>,
    cost: &ArrayView2<f64>,
    max_iter: usize,
) -> Result<TransportPlan> {
    let (sa, sb) = validate(a, b, cost, max_iter)?;
    let (m, n) = (a.len(), b.len());

    let scale = cost.iter().fold(0.0f64, |acc, &c| acc.max(c.abs())).max(1.0);
    let eps = REDUCED_COST_TOL * scale;

    let mut basis = Basis::northwest_corner(a, b, sa / sb);
    let mut pricing = Pricing::new(m * n);
    let mut u = vec![0.0f64; m];
    let mut v = vec![0.0f64; n];
    let mut seen = vec![false; m + n];
    let mut parent = vec![NONE; m + n];

    let degenerate_limit = m + n;
    let mut degenerate_run = 0usize;
    let mut iterations = 0usize;

    log::debug!("emd: {m}x{n} problem, max_iter={max_iter}");

    loop {
        basis.potentials(cost, &mut u, &mut v, &mut seen);

        let bland = degenerate_run >= degenerate_limit;
        let entering = if bland {
            Pricing::first_eligible(&basis, cost, &u, &v, eps)
        } else {
            pricing.block_search(&basis, cost, &u, &v, eps)
        };
        let Some(e) = entering else {
            break;
        };
        if iterations == max_iter {
            log::warn!("emd: no optimality certificate after {max_iter} pivots");
            return Err(Error::NonConvergence { max_iter });
        }

        let (ei, ej) = (e / n, e % n);
        let path = basis.tree_path(ei, ej, &mut parent);
        debug_assert!(path.len() % 2 == 1);

        // Even positions lose flow, odd positions gain it.
        let mut leaving = NONE;
        let mut theta = f64::INFINITY;
        for (k, &slot) in path.iter().enumerate() {
            if k % 2 != 0 {
                continue;
            }
            let f = basis.flow[slot];
            let better = if f < theta {
                true
            } else if bland && f == theta {
                let cell = |s: usize| basis.row[s] * n + basis.col[s];
                cell(slot) < cell(leaving)
            } else {
                false
            };
            if better {
                theta = f;
                leaving = slot;
            }
        }
        debug_assert!(leaving != NONE);

        for (k, &slot) in path.iter().enumerate() {
            if k % 2 == 0 {
                basis.flow[slot] = (basis.flow[slot] - theta).max(0.0);
            } else {
                basis.flow[slot] += theta;
            }
        }

        basis.unlink(leaving);
        basis.row[leaving] = ei;
        basis.col[leaving] = ej;
        basis.flow[leaving] = theta;
        basis.link(leaving);

        if theta > 0.0 {
            degenerate_run = 0;
        } else {
            degenerate_run += 1;
        }
        iterations += 1;
        if iterations % 10_000 == 0 {
            log::debug!("emd: {iterations} pivots");
        }
    }

    let mut flows = Vec::new();
    let mut total = 0.0f64;
    for slot in 0..basis.row.len() {
        let mass = basis.flow[slot];
        if mass > 0.0 {
            let (i, j) = (basis.row[slot], basis.col[slot]);
            total += mass * cost[[i, j]];
            flows.push(Flow {
                source: i,
                target: j,
                mass,
            });
        }
    }
    log::debug!("emd: optimal after {iterations} pivots, cost={total:.6e}");

    Ok(TransportPlan {
        shape: (m, n),
        flows,
        cost: total,
        iterations,
    })
}
