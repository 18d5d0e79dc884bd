//! Signal and measurement containers plus the small amount of complex linear
//! algebra every other module leans on.
//!
//! A signal is a `(channels, height, width)` complex array, viewed as a vector
//! in `C^n` with `n = channels · height · width`.  Measurements share the same
//! rank but are real and non-negative.

use ndarray::Array3;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{PhysicsError, Result};

pub type Cx = Complex64;

/// `(channels, height, width)`.
pub type Shape = (usize, usize, usize);

pub type Signal = Array3<Cx>;

pub type Measurement = Array3<f64>;

/// Total number of elements described by `shape`.
pub fn numel(shape: Shape) -> usize {
    shape.0 * shape.1 * shape.2
}

/// Reject `x` unless it has exactly `expected` shape.
pub fn check_shape<T>(what: &'static str, x: &Array3<T>, expected: Shape) -> Result<()> {
    let actual = x.dim();
    if actual != expected {
        return Err(PhysicsError::ShapeMismatch { what, expected, actual });
    }
    Ok(())
}

// ─── Inner products and norms ─────────────────────────────────────────────────

/// `⟨a, b⟩ = Σ conj(a_i) · b_i`, linear in the second argument.
pub fn vdot(a: &Signal, b: &Signal) -> Cx {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

/// Euclidean norm `‖a‖₂`.
pub fn norm(a: &Signal) -> f64 {
    a.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt()
}

/// Scale `a` to unit norm in place; returns the previous norm.
///
/// A zero signal is left untouched.
pub fn normalize(a: &mut Signal) -> f64 {
    let n = norm(a);
    if n > 0.0 {
        a.mapv_inplace(|c| c / n);
    }
    n
}

// ─── Signal constructors ──────────────────────────────────────────────────────

/// Standard circular complex Gaussian signal: real and imaginary parts are
/// i.i.d. `N(0, 1/2)`, so `E[|x_i|²] = 1`.
pub fn random_signal<R: Rng + ?Sized>(shape: Shape, rng: &mut R) -> Signal {
    let s = std::f64::consts::FRAC_1_SQRT_2;
    Array3::from_shape_simple_fn(shape, || {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        Cx::new(re * s, im * s)
    })
}

/// Encode a real image with values in `[0, 1]` as a unit-magnitude phase
/// object: `x = exp(iπ·img − iπ/2)`.
pub fn phase_encode(image: &Array3<f64>) -> Signal {
    image.mapv(|v| Cx::from_polar(1.0, std::f64::consts::PI * v - std::f64::consts::FRAC_PI_2))
}

/// Entrywise squared magnitude, the map that discards phase.
pub fn squared_magnitude(x: &Signal) -> Measurement {
    x.mapv(|c| c.norm_sqr())
}
