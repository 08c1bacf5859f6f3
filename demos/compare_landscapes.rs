//! Compare a few synthetic landscapes with both objectives, minimal runnable demo.
//!
//! Prints, for each candidate against a Gaussian-hill target:
//! - the marginal objective `H` and its terms
//! - the exact transport loss `W`

use ndarray::Array2;
use terrawass::objective::objective_breakdown;
use terrawass::{calculate_cost_matrix, calculate_ot_loss, ObjectiveConfig};

fn hill(n: usize, cy: f64, cx: f64, width: f64, height: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(r, c)| {
        let dy = r as f64 - cy;
        let dx = c as f64 - cx;
        0.1 + height * (-(dy * dy + dx * dx) / (2.0 * width * width)).exp()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let n = 12usize;
    let target = hill(n, 5.5, 5.5, 2.0, 1.0);

    let candidates = [
        ("same", target.clone()),
        ("shifted", hill(n, 3.0, 7.0, 2.0, 1.0)),
        ("wider", hill(n, 5.5, 5.5, 3.5, 1.0)),
        ("taller", hill(n, 5.5, 5.5, 2.0, 2.0)),
    ];

    let cfg = ObjectiveConfig::default();
    for (name, source) in &candidates {
        let h = objective_breakdown(&target.view(), &source.view(), &cfg)?;
        let cost = calculate_cost_matrix(&target.view(), &source.view(), 1.0, 1.0)?;
        let w = calculate_ot_loss(&target.view(), &source.view(), &cost, 1_000_000)?;
        println!(
            "{name:>8}: H={:.6} (w2x^2={:.4}, w2y^2={:.4}, P={:+.4})  W={:.6}",
            h.total, h.w2x_squared, h.w2y_squared, h.mean_difference, w
        );
    }
    Ok(())
}
