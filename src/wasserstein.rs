//! Closed-form 1D Wasserstein loss between two weighted empirical distributions.
//!
//! For measures on the real line the optimal coupling is monotone, so
//! \[
//! W_p^p(\mu,\nu) = \int_0^1 |F_\mu^{-1}(q) - F_\nu^{-1}(q)|^p \, dq,
//! \]
//! and for discrete measures the integrand is piecewise constant between the merged
//! cumulative weights of both inputs. This module evaluates that sum exactly.
//!
//! The returned scalar is the **p-th power** \(W_p^p\) (no root is taken), so with `p = 2`
//! it is the squared Wasserstein-2 distance.

use crate::{Error, Result};
use ndarray::ArrayView1;

/// Tolerance for “weights sum to one”.
pub const SIMPLEX_TOL: f64 = 1e-6;

fn check_side(values: &ArrayView1<f64>, weights: &ArrayView1<f64>) -> Result<()> {
    if values.is_empty() {
        return Err(Error::Domain("support must be non-empty"));
    }
    if values.len() != weights.len() {
        return Err(Error::Shape("values and weights must have the same length"));
    }
    if values.iter().any(|&x| !x.is_finite()) {
        return Err(Error::Domain("support values must be finite"));
    }
    if weights.iter().any(|&w| w < 0.0 || !w.is_finite()) {
        return Err(Error::Domain("weights must be finite and nonnegative"));
    }
    if (weights.sum() - 1.0).abs() > SIMPLEX_TOL {
        return Err(Error::Domain("weights must sum to 1"));
    }
    Ok(())
}

/// Sort `(value, weight)` pairs by value and return `(sorted values, cumulative weights)`.
fn sorted_cdf(values: &ArrayView1<f64>, weights: &ArrayView1<f64>) -> (Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut xs = Vec::with_capacity(order.len());
    let mut cws = Vec::with_capacity(order.len());
    let mut acc = 0.0f64;
    for i in order {
        acc += weights[i];
        xs.push(values[i]);
        cws.push(acc);
    }
    (xs, cws)
}

/// Generalized inverse CDF: the first support point whose cumulative weight reaches `q`.
#[inline]
fn quantile(xs: &[f64], cws: &[f64], q: f64) -> f64 {
    // `searchsorted(cws, q, side="left")`, clipped to the last index for roundoff at q ≈ 1.
    let idx = cws.partition_point(|&c| c < q);
    xs[idx.min(xs.len() - 1)]
}

/// \(W_p^p\) between `Σ u_weights[i] δ(u_values[i])` and `Σ v_weights[j] δ(v_values[j])`.
///
/// - `u_values`/`v_values` need not be sorted and need not have the same length.
/// - Weights must be nonnegative and each sum to 1 (within [`SIMPLEX_TOL`]); this function
///   does **not** normalize.
/// - `p` must be finite and `>= 1`.
pub fn wasserstein_1d(
    u_values: &ArrayView1<f64>,
    v_values: &ArrayView1<f64>,
    u_weights: &ArrayView1<f64>,
    v_weights: &ArrayView1<f64>,
    p: f64,
) -> Result<f64> {
    if !p.is_finite() || p < 1.0 {
        return Err(Error::Domain("p must be finite and >= 1"));
    }
    check_side(u_values, u_weights)?;
    check_side(v_values, v_weights)?;

    let (ux, ucw) = sorted_cdf(u_values, u_weights);
    let (vx, vcw) = sorted_cdf(v_values, v_weights);

    let mut qs: Vec<f64> = Vec::with_capacity(ucw.len() + vcw.len());
    qs.extend_from_slice(&ucw);
    qs.extend_from_slice(&vcw);
    qs.sort_by(f64::total_cmp);

    let mut cost = 0.0f64;
    let mut prev = 0.0f64;
    for &q in &qs {
        let delta = q - prev;
        prev = q;
        if delta <= 0.0 {
            continue;
        }
        let diff = (quantile(&ux, &ucw, q) - quantile(&vx, &vcw, q)).abs();
        let term = if p == 1.0 {
            diff
        } else if p == 2.0 {
            diff * diff
        } else {
            diff.powf(p)
        };
        cost += delta * term;
    }
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};
    use proptest::prelude::*;

    fn random_simplex(n: usize, seed: u64) -> Array1<f64> {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;
        use rand_distr::{Distribution, StandardNormal};

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut w = Array1::<f64>::zeros(n);
        for x in w.iter_mut() {
            let u: f64 = StandardNormal.sample(&mut rng);
            *x = u.abs() + 1e-3;
        }
        let s = w.sum();
        w / s
    }

    #[test]
    fn dirac_to_dirac_is_squared_displacement() {
        let xs = array![0.0, 1.0, 2.0, 3.0];
        let a = array![1.0, 0.0, 0.0, 0.0];
        let b = array![0.0, 0.0, 0.0, 1.0];
        let w2 = wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &b.view(), 2.0).unwrap();
        let w1 = wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &b.view(), 1.0).unwrap();
        assert!((w2 - 9.0).abs() < 1e-12, "w2={w2}");
        assert!((w1 - 3.0).abs() < 1e-12, "w1={w1}");
    }

    #[test]
    fn half_split_moves_half_mass() {
        // Half the mass moves by 1; the other half stays.
        let xs = array![0.0, 1.0];
        let a = array![1.0, 0.0];
        let b = array![0.5, 0.5];
        let w2 = wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &b.view(), 2.0).unwrap();
        assert!((w2 - 0.5).abs() < 1e-12, "w2={w2}");
    }

    #[test]
    fn unsorted_supports_match_sorted_ones() {
        let u = array![2.0, 0.0, 1.0];
        let uw = array![0.2, 0.5, 0.3];
        let u_sorted = array![0.0, 1.0, 2.0];
        let uw_sorted = array![0.5, 0.3, 0.2];
        let v = array![0.5, 1.5];
        let vw = array![0.4, 0.6];
        let a = wasserstein_1d(&u.view(), &v.view(), &uw.view(), &vw.view(), 2.0).unwrap();
        let b = wasserstein_1d(
            &u_sorted.view(),
            &v.view(),
            &uw_sorted.view(),
            &vw.view(),
            2.0,
        )
        .unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn error_contracts() {
        let xs = array![0.0, 1.0];
        let a = array![0.5, 0.5];
        let short = array![1.0];
        let unnormalized = array![1.0, 1.0];
        let negative = array![1.5, -0.5];
        assert!(wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &a.view(), 0.5).is_err());
        assert!(wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &a.view(), f64::NAN).is_err());
        assert!(matches!(
            wasserstein_1d(&xs.view(), &xs.view(), &short.view(), &a.view(), 2.0),
            Err(Error::Shape(_))
        ));
        for bad in [&unnormalized, &negative] {
            assert!(wasserstein_1d(&xs.view(), &xs.view(), &bad.view(), &a.view(), 2.0).is_err());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            .. ProptestConfig::default()
        })]
        #[test]
        fn prop_w1_matches_cdf_difference_on_a_grid(
            n in 1usize..40,
            seed in any::<u64>(),
            step in 0.1f64..10.0f64,
        ) {
            // On a regular support, W1 = Σ |F_u(x_i) - F_v(x_i)| * step.
            let xs = Array1::from_shape_fn(n, |i| i as f64 * step);
            let a = random_simplex(n, seed);
            let b = random_simplex(n, seed.wrapping_add(1));

            let w1 = wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &b.view(), 1.0).unwrap();

            let mut fa = 0.0;
            let mut fb = 0.0;
            let mut expect = 0.0;
            for i in 0..n.saturating_sub(1) {
                fa += a[i];
                fb += b[i];
                expect += (fa - fb).abs() * step;
            }
            prop_assert!((w1 - expect).abs() <= 1e-9 * (1.0 + expect), "w1={w1} expect={expect}");
        }

        #[test]
        fn prop_w2_symmetric_nonnegative_and_zero_on_diagonal(
            n in 1usize..40,
            seed in any::<u64>(),
        ) {
            let xs = Array1::from_shape_fn(n, |i| i as f64);
            let a = random_simplex(n, seed);
            let b = random_simplex(n, seed ^ 0x9e37_79b9);

            let ab = wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &b.view(), 2.0).unwrap();
            let ba = wasserstein_1d(&xs.view(), &xs.view(), &b.view(), &a.view(), 2.0).unwrap();
            let aa = wasserstein_1d(&xs.view(), &xs.view(), &a.view(), &a.view(), 2.0).unwrap();

            prop_assert!(ab >= 0.0);
            prop_assert!((ab - ba).abs() <= 1e-12 * (1.0 + ab));
            prop_assert!(aa.abs() <= 1e-12, "W2^2(a,a)={aa}");
        }
    }
}
