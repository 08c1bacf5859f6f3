use ndarray::{array, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use terrawass::exact::{calculate_ot_plan_with_solver, exact_transport};
use terrawass::{
    calculate_cost_matrix, calculate_cost_matrix_with, calculate_ot_loss, calculate_ot_plan, Error,
    ExactSolver, ExactTransportConfig, GridSampling, TransportSolver,
};

fn random_landscape(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let u = Uniform::new(0.0f64, 1.0).unwrap();
    Array2::from_shape_fn((rows, cols), |_| u.sample(&mut rng))
}

#[test]
fn diagonal_pair_is_separated_by_the_exact_objective() {
    let t = array![[2.0, 0.0], [0.0, 2.0]];
    let s = array![[0.0, 2.0], [2.0, 0.0]];
    let c = calculate_cost_matrix(&t.view(), &s.view(), 1.0, 1.0).unwrap();
    let w = calculate_ot_loss(&t.view(), &s.view(), &c, 10_000_000).unwrap();
    assert!((w - 1.0).abs() < 1e-12, "w={w}");
}

#[test]
fn plan_respects_both_marginals() {
    let t = random_landscape(5, 4, 11);
    let s = random_landscape(3, 6, 12);
    let c = calculate_cost_matrix(&t.view(), &s.view(), 1.0, 1.0).unwrap();
    assert_eq!(c.dim(), (18, 20));

    let plan = calculate_ot_plan(&t.view(), &s.view(), &c, 1_000_000).unwrap();
    let a = c.source.masses(&s.view()).unwrap();
    let b = c.target.masses(&t.view()).unwrap();
    let d = plan.dense();
    for i in 0..a.len() {
        assert!((d.row(i).sum() - a[i]).abs() < 1e-9);
    }
    for j in 0..b.len() {
        assert!((d.column(j).sum() - b[j]).abs() < 1e-9);
    }
    assert!(d.iter().all(|&x| x >= 0.0));

    let recomputed: f64 = (&d * &c.cost).sum();
    assert!((recomputed - plan.cost).abs() <= 1e-9 * (1.0 + plan.cost));
}

#[test]
fn exact_loss_is_symmetric_and_zero_on_the_diagonal() {
    for seed in 0..6u64 {
        let t = random_landscape(4, 5, seed);
        let s = random_landscape(4, 5, seed + 100);
        let c_ts = calculate_cost_matrix(&t.view(), &s.view(), 1.0, 1.0).unwrap();
        let c_st = calculate_cost_matrix(&s.view(), &t.view(), 1.0, 1.0).unwrap();
        let c_tt = calculate_cost_matrix(&t.view(), &t.view(), 1.0, 1.0).unwrap();

        let ts = calculate_ot_loss(&t.view(), &s.view(), &c_ts, 1_000_000).unwrap();
        let st = calculate_ot_loss(&s.view(), &t.view(), &c_st, 1_000_000).unwrap();
        let tt = calculate_ot_loss(&t.view(), &t.view(), &c_tt, 1_000_000).unwrap();

        assert!(ts >= 0.0);
        assert!((ts - st).abs() <= 1e-7 * (1.0 + ts), "ts={ts} st={st}");
        assert!(tt.abs() <= 1e-9, "tt={tt}");
    }
}

#[test]
fn exact_loss_dominates_the_marginal_terms() {
    // The coupling projected to each axis is a coupling of the marginals, so
    // W >= W2x^2 + W2y^2 for the same node spacing.
    use terrawass::objective::objective_breakdown;
    use terrawass::ObjectiveConfig;

    for seed in 0..6u64 {
        let t = random_landscape(5, 5, seed);
        let s = random_landscape(5, 5, seed + 7);
        let c = calculate_cost_matrix(&t.view(), &s.view(), 1.0, 1.0).unwrap();
        let w = calculate_ot_loss(&t.view(), &s.view(), &c, 1_000_000).unwrap();
        let h = objective_breakdown(&t.view(), &s.view(), &ObjectiveConfig::default()).unwrap();
        let marginal = h.w2x_squared + h.w2y_squared;
        assert!(w + 1e-7 >= marginal, "seed={seed}: W={w} marginal={marginal}");
    }
}

#[test]
fn cost_matrix_can_be_reused_across_sources() {
    let t = random_landscape(4, 4, 1);
    let c = calculate_cost_matrix(&t.view(), &t.view(), 1.0, 1.0).unwrap();
    let mut losses = Vec::new();
    for seed in 2..6u64 {
        let s = random_landscape(4, 4, seed);
        losses.push(calculate_ot_loss(&t.view(), &s.view(), &c, 1_000_000).unwrap());
    }
    assert!(losses.iter().all(|&w| w > 0.0 && w.is_finite()));
}

#[test]
fn solver_injection_matches_the_default_pipeline() {
    let t = random_landscape(3, 4, 21);
    let s = random_landscape(3, 4, 22);
    let c = calculate_cost_matrix(&t.view(), &s.view(), 1.0, 1.0).unwrap();
    let direct = calculate_ot_loss(&t.view(), &s.view(), &c, 100_000).unwrap();
    let injected = calculate_ot_plan_with_solver(&t.view(), &s.view(), &c, 100_000, &ExactSolver)
        .unwrap()
        .cost;
    assert_eq!(direct, injected);

    let a = c.source.masses(&s.view()).unwrap();
    let b = c.target.masses(&t.view()).unwrap();
    let emd2 = ExactSolver.emd2(&a.view(), &b.view(), &c.cost.view(), 100_000).unwrap();
    assert_eq!(direct, emd2);
}

#[test]
fn iteration_cap_surfaces_as_non_convergence() {
    let t = random_landscape(6, 6, 31);
    let s = random_landscape(6, 6, 32);
    let c = calculate_cost_matrix(&t.view(), &s.view(), 1.0, 1.0).unwrap();

    let plan = calculate_ot_plan(&t.view(), &s.view(), &c, 1_000_000).unwrap();
    // Pivoting is deterministic: any cap below the pivots actually needed must trip.
    assert!(plan.iterations > 1, "iterations={}", plan.iterations);
    let cap = plan.iterations - 1;
    match calculate_ot_loss(&t.view(), &s.view(), &c, cap) {
        Err(Error::NonConvergence { max_iter }) => assert_eq!(max_iter, cap),
        other => panic!("expected NonConvergence, got {other:?}"),
    }
    assert!(matches!(
        calculate_ot_loss(&t.view(), &s.view(), &c, 1),
        Err(Error::NonConvergence { max_iter: 1 })
    ));
}

#[test]
fn arange_sampling_mismatch_is_reported_and_scaled_sampling_works() {
    let t = random_landscape(6, 6, 3);
    let s = random_landscape(6, 6, 4);
    assert!(matches!(
        calculate_cost_matrix(&t.view(), &s.view(), 4.0, 4.0),
        Err(Error::Shape(_))
    ));

    let unit = calculate_cost_matrix_with(&t.view(), &s.view(), 1.0, 1.0, GridSampling::Scaled)
        .unwrap();
    let w1 = calculate_ot_loss(&t.view(), &s.view(), &unit, 1_000_000).unwrap();

    let cfg = ExactTransportConfig {
        target_dx: 4.0,
        source_dx: 4.0,
        sampling: GridSampling::Scaled,
        ..ExactTransportConfig::default()
    };
    let w4 = exact_transport(&t.view(), &s.view(), &cfg, &ExactSolver).unwrap().cost;
    // Scaling every coordinate by 4 scales squared distances by 16.
    assert!((w4 - 16.0 * w1).abs() <= 1e-8 * (1.0 + w4), "w1={w1} w4={w4}");
}
