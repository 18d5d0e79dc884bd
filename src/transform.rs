//! Orthonormal transforms over the spatial axes of a `(C, H, W)` signal.
//!
//! Every transform here is unitary, so its adjoint is its inverse.  The
//! structured operator relies on that to build an exact adjoint without ever
//! forming a matrix.
//!
//! - **Fourier2**: 2-D DFT along `(H, W)` with `1/√(HW)` scaling, `rustfft`
//!   plans built once per transform.
//! - **Cosine2**: DCT-II along `W` then `H`, each with orthonormal row scaling
//!   (`√(1/N)` for `k = 0`, `√(2/N)` otherwise).  Applied as a dense `N × N`
//!   real matrix per axis; the inverse is the transpose.
//! - **Hadamard1 / Hadamard2**: fast Walsh–Hadamard transform along `W` (or
//!   `W` then `H`) with `1/√N` scaling.  Self-inverse; sides must be powers of
//!   two.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, Array3, Axis};
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::signal::{Cx, Signal};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    #[default]
    #[serde(rename = "fourier2", alias = "fft")]
    Fourier2,
    #[serde(rename = "cosine2", alias = "dct")]
    Cosine2,
    #[serde(rename = "hadamard1")]
    Hadamard1,
    #[serde(rename = "hadamard2", alias = "hadamard")]
    Hadamard2,
}

impl TransformKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "fourier2" | "fft" => Ok(Self::Fourier2),
            "cosine2" | "dct" => Ok(Self::Cosine2),
            "hadamard1" => Ok(Self::Hadamard1),
            "hadamard2" | "hadamard" => Ok(Self::Hadamard2),
            other => Err(PhysicsError::UnsupportedTransform(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fourier2 => "fourier2",
            Self::Cosine2 => "cosine2",
            Self::Hadamard1 => "hadamard1",
            Self::Hadamard2 => "hadamard2",
        }
    }

    /// Whether the middle shape must have power-of-two sides.
    pub fn requires_power_of_two(self) -> bool {
        matches!(self, Self::Hadamard1 | Self::Hadamard2)
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Plans ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Plan {
    Fourier {
        rows_fwd: Arc<dyn Fft<f64>>,
        rows_inv: Arc<dyn Fft<f64>>,
        cols_fwd: Arc<dyn Fft<f64>>,
        cols_inv: Arc<dyn Fft<f64>>,
    },
    Cosine {
        /// `W × W`, applied along rows.
        rows: Array2<f64>,
        /// `H × H`, applied along columns.
        cols: Array2<f64>,
    },
    Hadamard {
        both_axes: bool,
    },
}

/// A unitary transform bound to a fixed `(H, W)` plane.
#[derive(Clone)]
pub struct Transform {
    kind: TransformKind,
    height: usize,
    width: usize,
    plan: Plan,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("kind", &self.kind)
            .field("height", &self.height)
            .field("width", &self.width)
            .finish()
    }
}

impl Transform {
    pub fn new(kind: TransformKind, height: usize, width: usize) -> Result<Self> {
        let plan = match kind {
            TransformKind::Fourier2 => {
                let mut planner = FftPlanner::<f64>::new();
                Plan::Fourier {
                    rows_fwd: planner.plan_fft_forward(width),
                    rows_inv: planner.plan_fft_inverse(width),
                    cols_fwd: planner.plan_fft_forward(height),
                    cols_inv: planner.plan_fft_inverse(height),
                }
            }
            TransformKind::Cosine2 => Plan::Cosine {
                rows: dct_matrix(width),
                cols: dct_matrix(height),
            },
            TransformKind::Hadamard1 => {
                if !width.is_power_of_two() {
                    return Err(PhysicsError::NonPowerOfTwo {
                        transform: kind.name(),
                        height,
                        width,
                    });
                }
                Plan::Hadamard { both_axes: false }
            }
            TransformKind::Hadamard2 => {
                if !(width.is_power_of_two() && height.is_power_of_two()) {
                    return Err(PhysicsError::NonPowerOfTwo {
                        transform: kind.name(),
                        height,
                        width,
                    });
                }
                Plan::Hadamard { both_axes: true }
            }
        };
        Ok(Self { kind, height, width, plan })
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Apply the transform in place.
    pub fn forward(&self, x: &mut Signal) {
        debug_assert_eq!((x.dim().1, x.dim().2), (self.height, self.width));
        match &self.plan {
            Plan::Fourier { rows_fwd, cols_fwd, .. } => {
                for_each_lane(x, Axis(2), |lane| rows_fwd.process(lane));
                for_each_lane(x, Axis(1), |lane| cols_fwd.process(lane));
                let s = 1.0 / ((self.height * self.width) as f64).sqrt();
                x.mapv_inplace(|c| c * s);
            }
            Plan::Cosine { rows, cols } => {
                for_each_lane(x, Axis(2), |lane| real_matvec(rows, lane, false));
                for_each_lane(x, Axis(1), |lane| real_matvec(cols, lane, false));
            }
            Plan::Hadamard { both_axes } => hadamard(x, *both_axes),
        }
    }

    /// Apply the inverse (equivalently, the adjoint) in place.
    pub fn inverse(&self, x: &mut Signal) {
        debug_assert_eq!((x.dim().1, x.dim().2), (self.height, self.width));
        match &self.plan {
            Plan::Fourier { rows_inv, cols_inv, .. } => {
                for_each_lane(x, Axis(1), |lane| cols_inv.process(lane));
                for_each_lane(x, Axis(2), |lane| rows_inv.process(lane));
                let s = 1.0 / ((self.height * self.width) as f64).sqrt();
                x.mapv_inplace(|c| c * s);
            }
            Plan::Cosine { rows, cols } => {
                for_each_lane(x, Axis(1), |lane| real_matvec(cols, lane, true));
                for_each_lane(x, Axis(2), |lane| real_matvec(rows, lane, true));
            }
            Plan::Hadamard { both_axes } => hadamard(x, *both_axes),
        }
    }

    /// Dense matrix of the transform acting on a flattened `(C, H, W)` signal
    /// (row-major), built column by column from basis signals.
    pub fn matrix(&self, channels: usize) -> Array2<Cx> {
        let n = channels * self.height * self.width;
        let mut mat = Array2::zeros((n, n));
        let mut basis = Array3::zeros((channels, self.height, self.width));
        for j in 0..n {
            basis.fill(Cx::new(0.0, 0.0));
            if let Some(e) = basis.iter_mut().nth(j) {
                *e = Cx::new(1.0, 0.0);
            }
            self.forward(&mut basis);
            for (i, v) in basis.iter().enumerate() {
                mat[[i, j]] = *v;
            }
        }
        mat
    }
}

// ─── Lane kernels ─────────────────────────────────────────────────────────────

/// Run `f` over every 1-D lane of `x` along `axis`.  Lanes are copied into a
/// contiguous buffer so the kernel never sees a strided view.
fn for_each_lane<F>(x: &mut Signal, axis: Axis, mut f: F)
where
    F: FnMut(&mut [Cx]),
{
    let len = x.len_of(axis);
    let mut buf = vec![Cx::new(0.0, 0.0); len];
    for mut lane in x.lanes_mut(axis) {
        for (b, v) in buf.iter_mut().zip(lane.iter()) {
            *b = *v;
        }
        f(&mut buf);
        for (v, b) in lane.iter_mut().zip(&buf) {
            *v = *b;
        }
    }
}

/// Orthonormal DCT-II matrix: `C[k, n] = s_k · cos(π k (2n + 1) / 2N)`.
fn dct_matrix(n: usize) -> Array2<f64> {
    let nf = n as f64;
    Array2::from_shape_fn((n, n), |(k, j)| {
        let s = if k == 0 { (1.0 / nf).sqrt() } else { (2.0 / nf).sqrt() };
        s * (std::f64::consts::PI * k as f64 * (2 * j + 1) as f64 / (2.0 * nf)).cos()
    })
}

/// `lane ← M · lane` (or `Mᵀ · lane` when `transpose`).
fn real_matvec(m: &Array2<f64>, lane: &mut [Cx], transpose: bool) {
    let input = lane.to_vec();
    for (i, out) in lane.iter_mut().enumerate() {
        *out = input
            .iter()
            .enumerate()
            .map(|(j, v)| v * if transpose { m[[j, i]] } else { m[[i, j]] })
            .sum();
    }
}

fn hadamard(x: &mut Signal, both_axes: bool) {
    for_each_lane(x, Axis(2), fwht);
    if both_axes {
        for_each_lane(x, Axis(1), fwht);
    }
}

/// In-place orthonormal fast Walsh–Hadamard transform (natural ordering).
fn fwht(buf: &mut [Cx]) {
    let n = buf.len();
    let mut h = 1;
    while h < n {
        for start in (0..n).step_by(2 * h) {
            for i in start..start + h {
                let a = buf[i];
                let b = buf[i + h];
                buf[i] = a + b;
                buf[i + h] = a - b;
            }
        }
        h *= 2;
    }
    let s = 1.0 / (n as f64).sqrt();
    buf.iter_mut().for_each(|v| *v *= s);
}
