//! Dense complex Gaussian sensing operator.
//!
//! `B ∈ C^{m×n}` with i.i.d. entries `N(0, 1/2m) + i·N(0, 1/2m)`, so every
//! column has unit expected energy and `E‖Bx‖² = ‖x‖²`.  Signals of any
//! `(C, H, W)` shape are flattened row-major; measurements come out as
//! `(1, 1, m)`.  Used as the unstructured baseline `B` for phase retrieval.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::error::{PhysicsError, Result};
use crate::operator::LinearOperator;
use crate::signal::{check_shape, numel, Cx, Shape, Signal};

const CGLS_TOL: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct GaussianOperator {
    input: Shape,
    matrix: Array2<Cx>,
}

impl GaussianOperator {
    pub fn new<R: Rng + ?Sized>(m: usize, input: Shape, rng: &mut R) -> Result<Self> {
        if m == 0 || numel(input) == 0 {
            return Err(PhysicsError::InvalidParameter(format!(
                "gaussian operator needs m > 0 and a non-empty input, got m = {m}, input {input:?}"
            )));
        }
        let s = (0.5 / m as f64).sqrt();
        let matrix = Array2::from_shape_simple_fn((m, numel(input)), || {
            let re: f64 = rng.sample(StandardNormal);
            let im: f64 = rng.sample(StandardNormal);
            Cx::new(re * s, im * s)
        });
        Ok(Self { input, matrix })
    }

    /// Wrap an explicit `m × numel(input)` matrix.
    pub fn from_matrix(matrix: Array2<Cx>, input: Shape) -> Result<Self> {
        if matrix.ncols() != numel(input) || matrix.nrows() == 0 {
            return Err(PhysicsError::InvalidParameter(format!(
                "matrix is {}x{} but the input {input:?} has {} elements",
                matrix.nrows(),
                matrix.ncols(),
                numel(input)
            )));
        }
        Ok(Self { input, matrix })
    }

    pub fn matrix(&self) -> &Array2<Cx> {
        &self.matrix
    }

    pub fn m(&self) -> usize {
        self.matrix.nrows()
    }

    fn matvec(&self, v: &Array1<Cx>) -> Array1<Cx> {
        self.matrix.dot(v)
    }

    /// `Bᴴ r = conj(Bᵀ conj(r))`.
    fn rmatvec(&self, r: &Array1<Cx>) -> Array1<Cx> {
        self.matrix.t().dot(&r.mapv(|c| c.conj())).mapv(|c| c.conj())
    }
}

fn flatten(x: &Signal) -> Array1<Cx> {
    x.iter().copied().collect()
}

fn energy(v: &Array1<Cx>) -> f64 {
    v.iter().map(|c| c.norm_sqr()).sum()
}

impl LinearOperator for GaussianOperator {
    fn input_shape(&self) -> Shape {
        self.input
    }

    fn output_shape(&self) -> Shape {
        (1, 1, self.m())
    }

    fn apply(&self, x: &Signal) -> Result<Signal> {
        check_shape("gaussian operator input", x, self.input)?;
        Ok(self.matvec(&flatten(x)).into_shape(self.output_shape())?)
    }

    fn adjoint(&self, y: &Signal) -> Result<Signal> {
        check_shape("gaussian operator output", y, self.output_shape())?;
        Ok(self.rmatvec(&flatten(y)).into_shape(self.input)?)
    }

    /// Least-squares (minimum-norm when `m < n`) solution of `B x = y` by
    /// conjugate gradients on the normal equations.
    fn pseudo_inverse(&self, y: &Signal) -> Result<Signal> {
        check_shape("gaussian operator output", y, self.output_shape())?;
        let n = self.matrix.ncols();
        let mut x = Array1::<Cx>::zeros(n);
        let mut r = flatten(y);
        let mut s = self.rmatvec(&r);
        let mut p = s.clone();
        let mut gamma = energy(&s);
        let stop = CGLS_TOL * gamma.sqrt();

        let mut iterations = 0;
        while iterations < 2 * n + 10 && gamma.sqrt() > stop && gamma > 0.0 {
            let q = self.matvec(&p);
            let alpha = gamma / energy(&q);
            x.scaled_add(Cx::new(alpha, 0.0), &p);
            r.scaled_add(Cx::new(-alpha, 0.0), &q);
            s = self.rmatvec(&r);
            let next = energy(&s);
            p = &s + &p.mapv(|c| c * (next / gamma));
            gamma = next;
            iterations += 1;
        }
        debug!(iterations, normal_residual = gamma.sqrt(), "cgls finished");
        Ok(x.into_shape(self.input)?)
    }

    fn squared_mean(&self) -> Option<f64> {
        let len = self.matrix.len() as f64;
        let mean: Cx = self.matrix.iter().sum::<Cx>() / len;
        let var = self.matrix.iter().map(|v| (v - mean).norm_sqr()).sum::<f64>() / len;
        Some(var + mean.norm_sqr())
    }
}
