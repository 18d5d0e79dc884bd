//! Marchenko–Pastur law: the limiting eigenvalue density of `(1/m)·GᴴG` for an
//! `m × n` Gaussian matrix with entry variance `σ²`.
//!
//! ## Parameterisation
//!
//! With aspect ratio `γ = n / m`:
//!
//! ```text
//! support  = [σ²(1 − √γ)², σ²(1 + √γ)²]
//! pdf(x)   = √((b − x)(x − a)) / (2π σ² γ x)
//! ```
//!
//! For `γ > 1` the law also carries an atom of weight `1 − 1/γ` at zero.  The
//! sampler only draws from the continuous part, so `mean()` and `var()` report
//! the moments of that conditional law:
//!
//! ```text
//! mean = σ² · max(1, γ)
//! var  = σ⁴ · γ
//! ```
//!
//! ## Sampling
//!
//! Acceptance–rejection against the bounding box
//! `[min_support, max_support] × [0, max_pdf]`.  `max_pdf` is located once at
//! construction on an interior grid; at `γ = 1` the density has an integrable
//! `1/√x` singularity at zero, so the grid maximum acts as a cap there.

use rand::Rng;
use tracing::trace;

use crate::error::{PhysicsError, Result};

const PDF_GRID: usize = 10_000;

#[derive(Clone, Debug)]
pub struct MarchenkoPastur {
    gamma: f64,
    sigma: f64,
    min_supp: f64,
    max_supp: f64,
    max_pdf: f64,
}

impl MarchenkoPastur {
    /// `m` rows, `n` columns.  When `sigma` is `None` it defaults to
    /// `(1 + γ)^(-1/4)`, which makes the second moment `E[x²]` equal to one.
    pub fn new(m: usize, n: usize, sigma: Option<f64>) -> Result<Self> {
        if m == 0 || n == 0 {
            return Err(PhysicsError::InvalidParameter(format!(
                "Marchenko-Pastur needs m, n > 0 (got m={m}, n={n})"
            )));
        }
        let gamma = n as f64 / m as f64;
        let sigma = sigma.unwrap_or_else(|| (1.0 + gamma).powf(-0.25));
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(PhysicsError::InvalidParameter(format!(
                "Marchenko-Pastur sigma must be positive and finite, got {sigma}"
            )));
        }
        let s2 = sigma * sigma;
        let min_supp = s2 * (1.0 - gamma.sqrt()).powi(2);
        let max_supp = s2 * (1.0 + gamma.sqrt()).powi(2);

        let mut law = Self { gamma, sigma, min_supp, max_supp, max_pdf: 0.0 };
        law.max_pdf = law.grid_max_pdf();
        Ok(law)
    }

    /// Largest density value over the open support, sampled on a uniform grid.
    fn grid_max_pdf(&self) -> f64 {
        let width = self.max_supp - self.min_supp;
        (1..PDF_GRID)
            .map(|i| self.density(self.min_supp + width * i as f64 / PDF_GRID as f64))
            .fold(0.0, f64::max)
    }

    fn density(&self, x: f64) -> f64 {
        let s2 = self.sigma * self.sigma;
        ((self.max_supp - x) * (x - self.min_supp)).max(0.0).sqrt()
            / (2.0 * std::f64::consts::PI * s2 * self.gamma * x)
    }

    /// Density at `x`.  Fails when `x` is outside the support.
    pub fn pdf(&self, x: f64) -> Result<f64> {
        if !(x >= self.min_supp && x <= self.max_supp) {
            return Err(PhysicsError::OutOfSupport {
                x,
                min: self.min_supp,
                max: self.max_supp,
            });
        }
        Ok(self.density(x))
    }

    /// Draw `count` i.i.d. samples by acceptance–rejection.
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<Vec<f64>> {
        let mut samples = Vec::with_capacity(count);
        let mut proposals = 0usize;
        while samples.len() < count {
            proposals += 1;
            let x = rng.gen_range(self.min_supp..=self.max_supp);
            let y = rng.gen_range(0.0..=self.max_pdf);
            if y < self.pdf(x)? {
                samples.push(x);
            }
        }
        trace!(
            accepted = count,
            proposals,
            gamma = self.gamma,
            "marchenko-pastur rejection sampling"
        );
        Ok(samples)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn support(&self) -> (f64, f64) {
        (self.min_supp, self.max_supp)
    }

    pub fn max_pdf(&self) -> f64 {
        self.max_pdf
    }

    pub fn mean(&self) -> f64 {
        self.sigma * self.sigma * self.gamma.max(1.0)
    }

    pub fn var(&self) -> f64 {
        self.sigma.powi(4) * self.gamma
    }
}
