//! The phase-retrieval measurement model `A(x) = |B x|²`.
//!
//! [`PhaseRetrieval`] owns a linear operator `B` handed to it by the caller
//! and exposes what reconstruction code needs on top of it:
//!
//! - `a` / `forward`: noiseless and observed measurements,
//! - `a_dagger` / `a_adjoint`: the spectral estimate, standing in for the
//!   adjoint that a nonlinear map does not have,
//! - `b_apply` / `b_adjoint` / `b_dagger`: the linear layer itself,
//! - `a_vjp`: the exact vector-Jacobian product `2 Bᴴ(B x ⊙ v)`,
//! - `release_memory`: drop `B` early; later calls fail with `Released`.
//!
//! The observation chain is `sensor(noise(A x))`.

use rand::Rng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PhysicsError, Result};
use crate::gaussian::GaussianOperator;
use crate::operator::LinearOperator;
use crate::signal::{numel, squared_magnitude, Measurement, Shape, Signal};
use crate::spectral::{spectral_init, SpectralConfig};
use crate::structured::{StructuredConfig, StructuredRandomOperator};

// ─── Measurement channel ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Noise {
    #[default]
    None,
    /// Additive `N(0, sigma²)`.
    Gaussian { sigma: f64 },
    /// Photon counting: `Poisson(gain · y) / gain`.
    Poisson { gain: f64 },
}

impl Noise {
    pub fn apply<R: Rng + ?Sized>(&self, y: Measurement, rng: &mut R) -> Result<Measurement> {
        match *self {
            Noise::None => Ok(y),
            Noise::Gaussian { sigma } => {
                if !(sigma >= 0.0) {
                    return Err(PhysicsError::InvalidParameter(format!(
                        "noise sigma must be >= 0, got {sigma}"
                    )));
                }
                Ok(y.mapv(|v| v + sigma * rng.sample::<f64, _>(StandardNormal)))
            }
            Noise::Poisson { gain } => {
                if !(gain > 0.0) {
                    return Err(PhysicsError::InvalidParameter(format!(
                        "poisson gain must be > 0, got {gain}"
                    )));
                }
                let mut out = y;
                for v in out.iter_mut() {
                    let rate = gain * *v;
                    *v = if rate > 0.0 {
                        let dist = Poisson::new(rate).map_err(|e| {
                            PhysicsError::InvalidParameter(format!("poisson rate {rate}: {e}"))
                        })?;
                        dist.sample(rng) / gain
                    } else {
                        0.0
                    };
                }
                Ok(out)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Sensor {
    #[default]
    Identity,
    /// Detector saturation: `min(y, max)`.
    Saturate { max: f64 },
}

impl Sensor {
    pub fn apply(&self, y: Measurement) -> Measurement {
        match *self {
            Sensor::Identity => y,
            Sensor::Saturate { max } => y.mapv(|v| v.min(max)),
        }
    }
}

// ─── Phase retrieval ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PhaseRetrieval<B> {
    b: Option<B>,
    name: String,
    noise: Noise,
    sensor: Sensor,
    spectral: SpectralConfig,
}

impl<B: LinearOperator> PhaseRetrieval<B> {
    pub fn new(b: B) -> Self {
        let m = numel(b.output_shape());
        Self {
            b: Some(b),
            name: format!("PR_m{m}"),
            noise: Noise::default(),
            sensor: Sensor::default(),
            spectral: SpectralConfig::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_noise(mut self, noise: Noise) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn with_spectral(mut self, spectral: SpectralConfig) -> Self {
        self.spectral = spectral;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spectral_config(&self) -> &SpectralConfig {
        &self.spectral
    }

    /// The linear operator, unless it has been released.
    pub fn b(&self) -> Result<&B> {
        self.b.as_ref().ok_or(PhysicsError::Released)
    }

    pub fn input_shape(&self) -> Result<Shape> {
        Ok(self.b()?.input_shape())
    }

    pub fn measurement_count(&self) -> Result<usize> {
        Ok(numel(self.b()?.output_shape()))
    }

    /// `A(x) = |B x|²`, entrywise and therefore non-negative.
    pub fn a(&self, x: &Signal) -> Result<Measurement> {
        Ok(squared_magnitude(&self.b()?.apply(x)?))
    }

    /// Observed measurement `sensor(noise(A x))`.
    pub fn forward<R: Rng + ?Sized>(&self, x: &Signal, rng: &mut R) -> Result<Measurement> {
        let y = self.noise.apply(self.a(x)?, rng)?;
        Ok(self.sensor.apply(y))
    }

    /// Spectral estimate of the signal behind `y`.
    pub fn a_dagger<R: Rng + ?Sized>(&self, y: &Measurement, rng: &mut R) -> Result<Signal> {
        spectral_init(self.b()?, y, &self.spectral, rng)
    }

    /// Same as [`Self::a_dagger`].
    pub fn a_adjoint<R: Rng + ?Sized>(&self, y: &Measurement, rng: &mut R) -> Result<Signal> {
        self.a_dagger(y, rng)
    }

    pub fn b_apply(&self, x: &Signal) -> Result<Signal> {
        self.b()?.apply(x)
    }

    pub fn b_adjoint(&self, y: &Signal) -> Result<Signal> {
        self.b()?.adjoint(y)
    }

    /// `B† y`, the linear operator's own pseudo-inverse.
    pub fn b_dagger(&self, y: &Signal) -> Result<Signal> {
        self.b()?.pseudo_inverse(y)
    }

    /// `2 Bᴴ(B x ⊙ v)`: the gradient of `x ↦ Σ v_i A(x)_i`.
    pub fn a_vjp(&self, x: &Signal, v: &Measurement) -> Result<Signal> {
        let b = self.b()?;
        let mut z = b.apply(x)?;
        if z.dim() != v.dim() {
            return Err(PhysicsError::ShapeMismatch {
                what: "vjp cotangent",
                expected: z.dim(),
                actual: v.dim(),
            });
        }
        z.zip_mut_with(v, |c, w| *c *= 2.0 * *w);
        b.adjoint(&z)
    }

    /// Second moment of the random modulation of `B`.  `Ok(None)` when `B`
    /// has no random layers.
    pub fn a_squared_mean(&self) -> Result<Option<f64>> {
        Ok(self.b()?.squared_mean())
    }

    /// Drop `B` now rather than when `self` goes out of scope.
    pub fn release_memory(&mut self) {
        if self.b.take().is_some() {
            debug!(name = %self.name, "released linear operator");
        }
    }
}

impl PhaseRetrieval<GaussianOperator> {
    /// Unstructured baseline with a dense Gaussian `B` of `m` rows.
    pub fn random<R: Rng + ?Sized>(m: usize, img_shape: Shape, rng: &mut R) -> Result<Self> {
        let b = GaussianOperator::new(m, img_shape, rng)?;
        Ok(Self::new(b).with_name(format!("RPR_m{m}")))
    }
}

impl PhaseRetrieval<StructuredRandomOperator> {
    /// Phase retrieval through a structured random operator.
    pub fn structured<R: Rng + ?Sized>(config: &StructuredConfig, rng: &mut R) -> Result<Self> {
        let b = StructuredRandomOperator::new(config, rng)?;
        let m = numel(b.output_shape());
        Ok(Self::new(b).with_name(format!("PRPR_m{m}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DiagonalMode;
    use crate::metrics::cosine_similarity;
    use crate::signal::{norm, phase_encode, random_signal, vdot, Cx};
    use crate::spectral::Preprocessing;
    use crate::transform::TransformKind;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn phantom_3x3() -> Signal {
        let img = Array3::from_shape_fn((1, 3, 3), |(_, i, j)| (i * 3 + j) as f64 / 8.0);
        phase_encode(&img)
    }

    fn structured(
        input: Shape,
        output: Shape,
        n_layers: f64,
        seed: u64,
    ) -> PhaseRetrieval<StructuredRandomOperator> {
        let config = StructuredConfig::new(input, output, n_layers);
        PhaseRetrieval::structured(&config, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    // ─── Test 1: non-negativity ──────────────────────────────────────────────

    #[test]
    fn measurements_are_non_negative() {
        let mut rng = StdRng::seed_from_u64(0);
        let gaussian = PhaseRetrieval::random(30, (1, 4, 4), &mut rng).unwrap();
        let physics = structured((1, 4, 4), (1, 7, 7), 2.5, 1);
        for _ in 0..5 {
            let x = random_signal((1, 4, 4), &mut rng);
            assert!(gaussian.a(&x).unwrap().iter().all(|&v| v >= 0.0));
            assert!(physics.a(&x).unwrap().iter().all(|&v| v >= 0.0));
        }
    }

    // ─── Test 2: VJP against central differences ─────────────────────────────

    /// `φ(x) = Σ v_i A(x)_i` is a real quadratic, so the central difference
    /// is exact up to rounding and must equal `Re⟨vjp, d⟩`.
    #[test]
    fn vjp_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(2);
        let physics = structured((1, 5, 5), (1, 8, 8), 2.0, 3);
        let x = random_signal((1, 5, 5), &mut rng);
        let v = Array3::from_shape_simple_fn((1, 8, 8), || rng.gen_range(-1.0..1.0));
        let g = physics.a_vjp(&x, &v).unwrap();

        let phi = |x: &Signal| -> f64 { (&physics.a(x).unwrap() * &v).sum() };
        for h in [1e-2, 1e-4] {
            let d = random_signal((1, 5, 5), &mut rng);
            let xp = &x + &d.mapv(|c| c * h);
            let xm = &x - &d.mapv(|c| c * h);
            let fd = (phi(&xp) - phi(&xm)) / (2.0 * h);
            let analytic = vdot(&g, &d).re;
            println!("  h = {h:e}: finite difference {fd:.10}, analytic {analytic:.10}");
            assert_relative_eq!(fd, analytic, max_relative = 1e-6);
        }
    }

    #[test]
    fn vjp_rejects_mismatched_cotangent() {
        let physics = structured((1, 4, 4), (1, 6, 6), 1.0, 4);
        let x = Signal::zeros((1, 4, 4));
        assert!(matches!(
            physics.a_vjp(&x, &Measurement::zeros((1, 4, 4))),
            Err(PhysicsError::ShapeMismatch { .. })
        ));
    }

    // ─── Test 3: golden scenarios ────────────────────────────────────────────

    /// Dense Gaussian `m = 10` on `(1, 3, 3)` drawn from `seed_from_u64(0)`,
    /// measuring the phase-encoded ramp `(3i + j) / 8`.
    const GAUSSIAN_GOLDEN: [f64; 10] = [
        1.0136117526464796,
        2.3363208771242836,
        0.4276821809849863,
        0.27284769968445266,
        1.279285232414289,
        0.06926070001984794,
        0.013057416749264016,
        1.68851053747885,
        1.3165933759795732,
        1.0308018940905257,
    ];

    #[test]
    fn gaussian_golden_measurement() {
        let x = phantom_3x3();
        assert!(x.iter().all(|c| (c.norm() - 1.0).abs() < 1e-15));

        let physics = PhaseRetrieval::random(10, (1, 3, 3), &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(physics.name(), "RPR_m10");
        let m00 = physics.b().unwrap().matrix()[[0, 0]];
        assert_relative_eq!(m00.re, 0.15938983464636686, max_relative = 1e-12);
        assert_relative_eq!(m00.im, 0.19192874623105702, max_relative = 1e-12);

        let y = physics.a(&x).unwrap();
        assert_eq!(y.dim(), (1, 1, 10));
        for (i, (got, want)) in y.iter().zip(GAUSSIAN_GOLDEN.iter()).enumerate() {
            println!("  y[{i}] = {got:.16}  (golden {want:.16})");
            assert_relative_eq!(*got, *want, max_relative = 1e-9);
        }

        let mat = physics.b().unwrap().matrix();
        for (i, row) in mat.rows().into_iter().enumerate() {
            let bx: Cx = row.iter().zip(x.iter()).map(|(a, b)| a * b).sum();
            assert_relative_eq!(y[[0, 0, i]], bx.norm_sqr(), max_relative = 1e-12);
        }
    }

    /// A lone orthonormal 2-D DFT maps the ramp `e^{2πik/3}` on a 3×3 grid to
    /// a single spike of height 3, so `A x` is 9 in one bin and 0 elsewhere.
    #[test]
    fn fourier_golden_measurement() {
        let physics = structured((1, 3, 3), (1, 3, 3), 0.5, 0);
        assert_eq!(physics.name(), "PRPR_m9");
        let x = Array3::from_shape_fn((1, 3, 3), |(_, _, k)| {
            Cx::from_polar(1.0, 2.0 * std::f64::consts::PI * k as f64 / 3.0)
        });
        let y = physics.a(&x).unwrap();
        let mut expected = Array3::<f64>::zeros((1, 3, 3));
        expected[[0, 0, 1]] = 9.0;
        for (got, want) in y.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    // ─── Test 4: measurement channel ─────────────────────────────────────────

    #[test]
    fn noise_and_sensor_compose() {
        let mut rng = StdRng::seed_from_u64(5);
        let x = random_signal((1, 6, 6), &mut rng);
        let clean = structured((1, 6, 6), (1, 10, 10), 2.0, 6);
        let y = clean.a(&x).unwrap();
        assert_eq!(clean.forward(&x, &mut rng).unwrap(), y);

        let cap = y.iter().cloned().fold(0.0, f64::max) / 2.0;
        let saturated =
            structured((1, 6, 6), (1, 10, 10), 2.0, 6).with_sensor(Sensor::Saturate { max: cap });
        let ys = saturated.forward(&x, &mut rng).unwrap();
        assert!(ys.iter().all(|&v| v <= cap));
        assert!(ys.iter().zip(y.iter()).all(|(s, c)| *s == c.min(cap)));

        let noisy =
            structured((1, 6, 6), (1, 10, 10), 2.0, 6).with_noise(Noise::Gaussian { sigma: 0.01 });
        let yn = noisy.forward(&x, &mut rng).unwrap();
        let rms = ((&yn - &y).mapv(|d| d * d).mean().unwrap()).sqrt();
        assert!(rms > 0.005 && rms < 0.02, "gaussian noise rms {rms}");
    }

    #[test]
    fn poisson_noise_concentrates_at_high_gain() {
        let mut rng = StdRng::seed_from_u64(8);
        let y = Array3::from_elem((1, 20, 20), 2.0);
        let noisy = Noise::Poisson { gain: 1e4 }.apply(y.clone(), &mut rng).unwrap();
        let mean = noisy.mean().unwrap();
        assert_relative_eq!(mean, 2.0, max_relative = 5e-3);
        assert!(noisy.iter().all(|&v| v >= 0.0));
        assert!(Noise::Poisson { gain: 0.0 }.apply(y, &mut rng).is_err());
    }

    // ─── Test 5: linear layer access and release ─────────────────────────────

    #[test]
    fn b_dagger_is_the_adjoint_for_structured_operators() {
        let mut rng = StdRng::seed_from_u64(9);
        let physics = structured((1, 4, 4), (1, 6, 6), 2.0, 10);
        let y = random_signal((1, 6, 6), &mut rng);
        assert_eq!(physics.b_dagger(&y).unwrap(), physics.b_adjoint(&y).unwrap());

        // Isometry: B† B x = x in the oversampling regime.
        let x = random_signal((1, 4, 4), &mut rng);
        let back = physics.b_dagger(&physics.b_apply(&x).unwrap()).unwrap();
        assert!(norm(&(&back - &x)) < 1e-12 * norm(&x));
    }

    #[test]
    fn release_memory_invalidates_the_operator() {
        let mut physics = structured((1, 4, 4), (1, 6, 6), 1.0, 11);
        assert_eq!(physics.measurement_count().unwrap(), 36);
        assert_abs_diff_eq!(physics.a_squared_mean().unwrap().unwrap(), 1.0, epsilon = 1e-12);

        physics.release_memory();
        let x = Signal::zeros((1, 4, 4));
        assert!(matches!(physics.a(&x), Err(PhysicsError::Released)));
        assert!(matches!(physics.a_squared_mean(), Err(PhysicsError::Released)));
        assert!(matches!(
            physics.a_dagger(&Measurement::ones((1, 6, 6)), &mut StdRng::seed_from_u64(0)),
            Err(PhysicsError::Released)
        ));
        // A second release is a no-op.
        physics.release_memory();
    }

    #[test]
    fn squared_mean_is_not_applicable_without_diagonals() {
        let physics = structured((1, 4, 4), (1, 4, 4), 0.5, 12);
        assert_eq!(physics.a_squared_mean().unwrap(), None);
    }

    // ─── Test 6: spectral estimate through a structured operator ─────────────

    #[test]
    fn a_dagger_recovers_the_signal_direction() {
        let mut rng = StdRng::seed_from_u64(13);
        let config = StructuredConfig::new((1, 6, 6), (1, 24, 24), 2.0)
            .with_transform(TransformKind::Fourier2)
            .with_diagonal_mode(DiagonalMode::UniformPhase);
        let physics = PhaseRetrieval::structured(&config, &mut rng)
            .unwrap()
            .with_spectral(SpectralConfig { n_iter: 100, ..SpectralConfig::default() });
        let x = random_signal((1, 6, 6), &mut rng);
        let y = physics.a(&x).unwrap();
        let x_hat = physics.a_adjoint(&y, &mut rng).unwrap();
        let sim = cosine_similarity(&x_hat, &x);
        println!("  structured m/n = 16: cosine similarity {sim:.4}");
        assert!(sim > 0.5, "spectral estimate too far from the truth: {sim:.4}");

        let identity = physics.with_spectral(SpectralConfig {
            n_iter: 100,
            lambda: 0.0,
            preprocessing: Preprocessing::Identity,
        });
        let x_hat = identity.a_dagger(&y, &mut rng).unwrap();
        assert_eq!(x_hat.dim(), (1, 6, 6));
    }

    #[test]
    fn generic_wrapper_name() {
        let mut rng = StdRng::seed_from_u64(14);
        let b = GaussianOperator::new(12, (1, 2, 2), &mut rng).unwrap();
        let physics = PhaseRetrieval::new(b);
        assert_eq!(physics.name(), "PR_m12");
        assert_eq!(physics.input_shape().unwrap(), (1, 2, 2));
    }
}
