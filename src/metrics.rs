//! Reconstruction quality up to the global phase ambiguity of phase retrieval.

use crate::signal::{norm, vdot, Signal};

/// `|⟨a, b⟩| / (‖a‖ ‖b‖)`, in `[0, 1]` and invariant to `a ↦ e^{iθ} a`.
///
/// Zero signals have similarity 0 with everything.
pub fn cosine_similarity(a: &Signal, b: &Signal) -> f64 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    vdot(a, b).norm() / denom
}

/// Rotate `x_hat` by the single phase that best aligns it with `x`.
pub fn correct_global_phase(x_hat: &Signal, x: &Signal) -> Signal {
    let c = vdot(x_hat, x);
    if c.norm() == 0.0 {
        return x_hat.clone();
    }
    let phase = c / c.norm();
    x_hat.mapv(|v| v * phase)
}

/// Relative error `‖x̂ − x‖ / ‖x‖` after phase correction.
pub fn relative_error(x_hat: &Signal, x: &Signal) -> f64 {
    let aligned = correct_global_phase(x_hat, x);
    let diff = &aligned - x;
    let scale = norm(x);
    if scale == 0.0 {
        return norm(&diff);
    }
    norm(&diff) / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{random_signal, Cx};
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn phase(theta: f64) -> Cx {
        Cx::from_polar(1.0, theta)
    }

    #[test]
    fn similarity_ignores_global_phase() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = random_signal((1, 4, 4), &mut rng);
        let rotated = x.mapv(|v| v * phase(1.234) * 3.0);
        assert_abs_diff_eq!(cosine_similarity(&rotated, &x), 1.0, epsilon = 1e-12);

        let other = random_signal((1, 4, 4), &mut rng);
        let s = cosine_similarity(&other, &x);
        assert!((0.0..1.0).contains(&s), "unrelated signals: {s}");
        assert_eq!(cosine_similarity(&Signal::zeros((1, 4, 4)), &x), 0.0);
    }

    #[test]
    fn phase_correction_restores_the_signal() {
        let mut rng = StdRng::seed_from_u64(1);
        let x = random_signal((2, 3, 3), &mut rng);
        let rotated = x.mapv(|v| v * phase(-2.5));
        assert!(relative_error(&rotated, &x) < 1e-12);

        let aligned = correct_global_phase(&rotated, &x);
        let c = vdot(&aligned, &x);
        assert_abs_diff_eq!(c.im, 0.0, epsilon = 1e-12);
        assert!(c.re > 0.0);
    }
}
