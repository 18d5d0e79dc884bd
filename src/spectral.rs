//! Spectral initialisation.
//!
//! Estimates the signal as the leading eigenvector of
//!
//! ```text
//! M = Bᴴ · diag(T(y / mean(y))) · B
//! ```
//!
//! by shifted power iteration, `x ← normalize(M x + λ x)`.  `M` is never
//! formed: each step is one `apply`, one reweighting and one `adjoint`.  The
//! estimate is finally rescaled so that `‖B x̂‖² = Σ y`, which matches the
//! energy of the measurements.
//!
//! There is no convergence test; the iteration budget is the stopping rule.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PhysicsError, Result};
use crate::operator::LinearOperator;
use crate::signal::{check_shape, norm, normalize, random_signal, Cx, Measurement, Signal};

/// Lower clip of the default preprocessing.
const PREPROCESS_FLOOR: f64 = -5.0;

/// Measurement weighting `T` applied before power iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocessing {
    /// `max(1 − 1/y, −5)`.
    #[default]
    Default,
    /// Weights are the normalised measurements themselves.
    Identity,
}

impl Preprocessing {
    pub fn apply(self, y: &Measurement) -> Measurement {
        match self {
            Self::Default => default_preprocessing(y),
            Self::Identity => y.clone(),
        }
    }
}

/// `max(1 − 1/y, −5)` entrywise; zero measurements map to the floor.
pub fn default_preprocessing(y: &Measurement) -> Measurement {
    y.mapv(|v| (1.0 - 1.0 / v).max(PREPROCESS_FLOOR))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    pub n_iter: usize,
    /// Diagonal shift `λ`; keeps the iteration on the top of the spectrum
    /// when the weights go negative.
    pub lambda: f64,
    pub preprocessing: Preprocessing,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self { n_iter: 50, lambda: 10.0, preprocessing: Preprocessing::Default }
    }
}

/// Spectral estimate starting from a standard complex Gaussian draw.
pub fn spectral_init<B, R>(
    b: &B,
    y: &Measurement,
    config: &SpectralConfig,
    rng: &mut R,
) -> Result<Signal>
where
    B: LinearOperator + ?Sized,
    R: Rng + ?Sized,
{
    let x0 = random_signal(b.input_shape(), rng);
    spectral_init_from(b, y, config, x0)
}

/// Spectral estimate from a caller-supplied start vector.
pub fn spectral_init_from<B>(
    b: &B,
    y: &Measurement,
    config: &SpectralConfig,
    x0: Signal,
) -> Result<Signal>
where
    B: LinearOperator + ?Sized,
{
    check_shape("measurement", y, b.output_shape())?;
    check_shape("spectral start vector", &x0, b.input_shape())?;
    let total: f64 = y.sum();
    let mean = total / y.len() as f64;
    if !(mean > 0.0 && mean.is_finite()) {
        return Err(PhysicsError::InvalidParameter(format!(
            "spectral initialisation needs measurements with a positive finite mean, got {mean}"
        )));
    }
    let weights = config.preprocessing.apply(&(y / mean));

    let mut x = x0;
    normalize(&mut x);
    for _ in 0..config.n_iter {
        let mut z = b.apply(&x)?;
        z.zip_mut_with(&weights, |c, w| *c *= *w);
        let mut next = b.adjoint(&z)?;
        next.scaled_add(Cx::new(config.lambda, 0.0), &x);
        if normalize(&mut next) == 0.0 {
            break;
        }
        x = next;
    }

    let predicted = norm(&b.apply(&x)?).powi(2);
    let scale = if predicted > 0.0 { (total / predicted).sqrt() } else { 1.0 };
    x.mapv_inplace(|c| c * scale);
    debug!(
        n_iter = config.n_iter,
        lambda = config.lambda,
        preprocessing = ?config.preprocessing,
        scale,
        "spectral initialisation finished"
    );
    Ok(x)
}
