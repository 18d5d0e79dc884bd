//! Error taxonomy for operator construction and evaluation.
//!
//! Configuration errors are raised while an operator is being built; invariant
//! violations are raised where the invariant is checked.  Nothing here is
//! transient, so no caller is expected to retry.

use thiserror::Error;

use crate::shape::SamplingMode;
use crate::signal::Shape;

#[derive(Debug, Error)]
pub enum PhysicsError {
    // ── configuration ────────────────────────────────────────────────────────
    #[error("unsupported diagonal mode: {0}")]
    UnsupportedMode(String),

    #[error("unsupported transform: {0}")]
    UnsupportedTransform(String),

    #[error("n_layers must be an integer or an integer plus 0.5 in [0, 1024], got {0}")]
    InvalidLayerCount(f64),

    #[error(
        "height and width disagree on the sampling direction \
         (input {input:?}, output {output:?})"
    )]
    InconsistentSampling { input: Shape, output: Shape },

    #[error("input has {input} channels but output has {output}")]
    ChannelMismatch { input: usize, output: usize },

    #[error("{transform} needs power-of-two sides, got {height}x{width}")]
    NonPowerOfTwo {
        transform: &'static str,
        height: usize,
        width: usize,
    },

    #[error("expected {expected} diagonal modes (one per layer), got {actual}")]
    ModeCount { expected: usize, actual: usize },

    #[error("invalid distribution parameter: {0}")]
    InvalidParameter(String),

    // ── evaluation ───────────────────────────────────────────────────────────
    #[error("{what} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Shape,
        actual: Shape,
    },

    #[error("dense forward matrix needs an oversampling operator, this one is {0}")]
    RequiresOversampling(SamplingMode),

    #[error("the linear operator has been released")]
    Released,

    // ── invariant violations ─────────────────────────────────────────────────
    #[error("diagonal magnitudes are not all 1 (largest deviation {0:e})")]
    NonUnitMagnitude(f64),

    #[error("x = {x} lies outside the Marchenko-Pastur support [{min}, {max}]")]
    OutOfSupport { x: f64, min: f64, max: f64 },

    // ── plumbing ─────────────────────────────────────────────────────────────
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PhysicsError> = std::result::Result<T, E>;
