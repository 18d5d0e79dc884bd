//! Spectral initialisation through structured random operators.
//!
//! Sweeps the output size for a synthetic phase phantom and reports how well
//! the spectral estimate `A†(y)` lines up with the truth, then compares the
//! three transform families at a fixed oversampling ratio.
//!
//! Run: `RUST_LOG=structured_pr=debug cargo run --example structured_spectral --release`

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use structured_pr::metrics::cosine_similarity;
use structured_pr::signal::phase_encode;
use structured_pr::{PhysicsConfig, Result, Signal, TransformKind};
use tracing_subscriber::EnvFilter;

const SIDE: usize = 32;

// ─── Phantom ──────────────────────────────────────────────────────────────────

/// A disk over a diagonal ramp, values in [0, 1], encoded as a phase object.
fn phantom() -> Signal {
    let c = (SIDE as f64 - 1.0) / 2.0;
    let img = Array3::from_shape_fn((1, SIDE, SIDE), |(_, i, j)| {
        let (y, x) = (i as f64 - c, j as f64 - c);
        let ramp = (i + j) as f64 / (2.0 * (SIDE - 1) as f64);
        let disk = if (x * x + y * y).sqrt() < SIDE as f64 / 4.0 { 0.5 } else { 0.0 };
        (0.5 * ramp + disk).min(1.0)
    });
    phase_encode(&img)
}

fn config_json(output: usize, transform: TransformKind) -> String {
    format!(
        r#"{{
            "seed": 0,
            "operator": {{
                "input_shape": [1, {SIDE}, {SIDE}],
                "output_shape": [1, {output}, {output}],
                "n_layers": 2.5,
                "transform": "{transform}",
                "diagonal_modes": [{{"kind": "uniform-phase"}}]
            }},
            "spectral": {{"n_iter": 50, "lambda": 10.0}}
        }}"#
    )
}

fn run(output: usize, transform: TransformKind, x: &Signal) -> Result<f64> {
    let config = PhysicsConfig::from_json_str(&config_json(output, transform))?;
    let physics = config.build()?;
    let y = physics.a(x)?;
    let mut rng = StdRng::seed_from_u64(1);
    let x_hat = physics.a_dagger(&y, &mut rng)?;
    Ok(cosine_similarity(&x_hat, x))
}

// ─── Sweep 1: oversampling ratio ──────────────────────────────────────────────

fn sweep_output_size(x: &Signal) -> Result<()> {
    println!("\n══════════════════════════════════════════════════════════");
    println!("SWEEP 1 — Cosine similarity vs oversampling ratio (fourier2, FDFDF)");
    println!("══════════════════════════════════════════════════════════");
    println!("  {:>8}  {:>8}  {:>10}", "output", "m / n", "cos sim");
    for output in [32, 40, 48, 64, 96] {
        let ratio = (output * output) as f64 / (SIDE * SIDE) as f64;
        let sim = run(output, TransformKind::Fourier2, x)?;
        println!("  {:>8}  {:>8.2}  {:>10.4}", format!("{output}x{output}"), ratio, sim);
    }
    Ok(())
}

// ─── Sweep 2: transform family ────────────────────────────────────────────────

fn compare_transforms(x: &Signal) -> Result<()> {
    println!("\n══════════════════════════════════════════════════════════");
    println!("SWEEP 2 — Transform family at 64x64 (m / n = 4)");
    println!("══════════════════════════════════════════════════════════");
    for transform in [TransformKind::Fourier2, TransformKind::Cosine2, TransformKind::Hadamard2] {
        let sim = run(64, transform, x)?;
        println!("  {:<10}  cos sim = {sim:.4}", transform.name());
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let x = phantom();
    sweep_output_size(&x)?;
    compare_transforms(&x)?;
    Ok(())
}
