//! Random diagonal generators for the modulation layers.
//!
//! Every mode is normalised so that `E[|d|²] = 1` under the complex
//! convention.  Modes that draw the real and imaginary parts independently
//! scale each part to variance ½:
//!
//! | mode                | construction                          | per-part variance |
//! |---------------------|---------------------------------------|-------------------|
//! | `uniform-phase`     | `exp(iθ)`, `θ ~ U[0, 2π)`             | —                 |
//! | `uniform-magnitude` | `√3 · U[0, 1)` (real, non-negative)   | —                 |
//! | `gaussian`          | `N(0, ½) + i N(0, ½)`                 | ½                 |
//! | `laplace`           | `Laplace(0, ½)` per part              | 2b² = ½           |
//! | `student-t`         | `t(ν) · √((ν − 2)/(2ν))` per part     | ½                 |
//! | `marchenko-pastur`  | `√x`, `x ~ MP(m, n)` with `E[x] = 1`  | —                 |
//! | `uniform`           | `√6 · (U[0,1) − ½)` per part          | ½                 |
//! | `triangular`        | symmetric triangle on `[−√3, √3]`     | ½                 |
//! | `polar4`            | uniform over `{1, −1, i, −i}`         | —                 |
//!
//! Two post-processing switches apply after any mode: `unit_mag` projects
//! every entry onto the unit circle, and `complex = false` keeps `√2 · Re(d)`,
//! which preserves the second moment.
//!
//! A `range` other than `√3` scales `uniform-magnitude` away from unit power.
//! Both `range` and the Student-t `ν` fall back to [`DistributionConfig`]
//! when the mode leaves them unset.

use std::f64::consts::{PI, SQRT_2};

use ndarray::Array3;
use rand::Rng;
use rand_distr::{Exp1, StandardNormal, StudentT};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::marchenko_pastur::MarchenkoPastur;
use crate::signal::{numel, Cx, Shape, Signal};

const UNIT_MAG_TOL: f64 = 1e-6;

/// Knobs shared by every mode.  `m` and `n` are the operator's output and
/// input element counts; the structured operator fills them in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    pub m: usize,
    pub n: usize,
    pub range: Option<f64>,
    pub degree_of_freedom: Option<f64>,
    pub unit_mag: bool,
    pub complex: bool,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            m: 1,
            n: 1,
            range: None,
            degree_of_freedom: None,
            unit_mag: false,
            complex: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DiagonalMode {
    #[default]
    UniformPhase,
    /// `range` falls back to `DistributionConfig::range`, then to `√3`.
    UniformMagnitude {
        #[serde(default)]
        range: Option<f64>,
    },
    Gaussian,
    Laplace,
    /// `degree_of_freedom` falls back to `DistributionConfig::degree_of_freedom`.
    StudentT {
        #[serde(default)]
        degree_of_freedom: Option<f64>,
    },
    #[serde(alias = "marchenko")]
    MarchenkoPastur,
    Uniform,
    Triangular,
    Polar4,
}

impl DiagonalMode {
    /// Parse a mode name, pulling any payload the mode needs out of `config`.
    pub fn from_name(name: &str, config: &DistributionConfig) -> Result<Self> {
        let mode = match name {
            "uniform_phase" | "uniform-phase" => Self::UniformPhase,
            "uniform_magnitude" | "uniform-magnitude" => {
                Self::UniformMagnitude { range: config.range }
            }
            "gaussian" => Self::Gaussian,
            "laplace" => Self::Laplace,
            "student-t" | "student_t" => {
                if config.degree_of_freedom.is_none() {
                    return Err(PhysicsError::InvalidParameter(
                        "student-t needs degree_of_freedom".into(),
                    ));
                }
                Self::StudentT { degree_of_freedom: config.degree_of_freedom }
            }
            "marchenko" | "marchenko-pastur" | "marchenko_pastur" => Self::MarchenkoPastur,
            "uniform" => Self::Uniform,
            "triangular" => Self::Triangular,
            "polar4" => Self::Polar4,
            other => return Err(PhysicsError::UnsupportedMode(other.to_string())),
        };
        Ok(mode)
    }
}

/// Envelope applied once on top of the first diagonal layer to reshape the
/// operator's singular-value profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SpectrumMode {
    /// All ones: no reshaping.
    #[default]
    Unit,
    /// Singular values of a Gaussian matrix with the operator's aspect ratio.
    MarchenkoPastur,
    /// Magnitudes of a diagonal drawn from `mode`.
    Magnitude { mode: DiagonalMode },
}

// ─── Scalar samplers ──────────────────────────────────────────────────────────

/// Symmetric triangular law on `[−a, a]` via the inverse CDF.  Variance `a²/6`.
pub fn sample_triangular<R: Rng + ?Sized>(a: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    if u < 0.5 {
        -a + (2.0 * u * a * a).sqrt()
    } else {
        a - (2.0 * (1.0 - u) * a * a).sqrt()
    }
}

/// Laplace(0, b) as a signed standard exponential.  Variance `2b²`.
fn sample_laplace<R: Rng + ?Sized>(b: f64, rng: &mut R) -> f64 {
    let e: f64 = rng.sample(Exp1);
    if rng.gen::<bool>() {
        b * e
    } else {
        -b * e
    }
}

// ─── Diagonal generation ──────────────────────────────────────────────────────

/// Draw a diagonal of the given shape.
pub fn generate_diagonal<R: Rng + ?Sized>(
    shape: Shape,
    mode: &DiagonalMode,
    config: &DistributionConfig,
    rng: &mut R,
) -> Result<Signal> {
    let mut diag = match mode {
        DiagonalMode::UniformPhase => {
            Array3::from_shape_simple_fn(shape, || Cx::from_polar(1.0, 2.0 * PI * rng.gen::<f64>()))
        }
        DiagonalMode::UniformMagnitude { range } => {
            let r = range.or(config.range).unwrap_or(3f64.sqrt());
            Array3::from_shape_simple_fn(shape, || Cx::new(r * rng.gen::<f64>(), 0.0))
        }
        DiagonalMode::Gaussian => {
            let s = std::f64::consts::FRAC_1_SQRT_2;
            Array3::from_shape_simple_fn(shape, || {
                let re: f64 = rng.sample(StandardNormal);
                let im: f64 = rng.sample(StandardNormal);
                Cx::new(s * re, s * im)
            })
        }
        DiagonalMode::Laplace => Array3::from_shape_simple_fn(shape, || {
            Cx::new(sample_laplace(0.5, rng), sample_laplace(0.5, rng))
        }),
        DiagonalMode::StudentT { degree_of_freedom } => {
            let df = degree_of_freedom.or(config.degree_of_freedom).ok_or_else(|| {
                PhysicsError::InvalidParameter("student-t needs degree_of_freedom".into())
            })?;
            if !(df > 2.0) {
                return Err(PhysicsError::InvalidParameter(format!(
                    "student-t needs degree_of_freedom > 2 for finite variance, got {df}"
                )));
            }
            let t = StudentT::new(df)
                .map_err(|e| PhysicsError::InvalidParameter(format!("student-t: {e}")))?;
            let scale = ((df - 2.0) / df / 2.0).sqrt();
            Array3::from_shape_simple_fn(shape, || {
                let re: f64 = rng.sample(&t);
                let im: f64 = rng.sample(&t);
                Cx::new(scale * re, scale * im)
            })
        }
        DiagonalMode::MarchenkoPastur => {
            let gamma = config.n as f64 / config.m.max(1) as f64;
            let law = MarchenkoPastur::new(config.m, config.n, Some(gamma.max(1.0).powf(-0.5)))?;
            let xs = law.sample(numel(shape), rng)?;
            Array3::from_shape_vec(shape, xs.into_iter().map(|x| Cx::new(x.sqrt(), 0.0)).collect())?
        }
        DiagonalMode::Uniform => {
            let s = 6f64.sqrt();
            Array3::from_shape_simple_fn(shape, || {
                let re = s * (rng.gen::<f64>() - 0.5);
                let im = s * (rng.gen::<f64>() - 0.5);
                Cx::new(re, im)
            })
        }
        DiagonalMode::Triangular => {
            let a = 3f64.sqrt();
            Array3::from_shape_simple_fn(shape, || {
                Cx::new(sample_triangular(a, rng), sample_triangular(a, rng))
            })
        }
        DiagonalMode::Polar4 => {
            const ALPHABET: [Cx; 4] = [
                Cx::new(1.0, 0.0),
                Cx::new(-1.0, 0.0),
                Cx::new(0.0, 1.0),
                Cx::new(0.0, -1.0),
            ];
            Array3::from_shape_simple_fn(shape, || ALPHABET[rng.gen_range(0..ALPHABET.len())])
        }
    };

    if config.unit_mag {
        diag.mapv_inplace(|c| c / c.norm());
        let worst = diag.iter().map(|c| (c.norm() - 1.0).abs()).fold(0.0, f64::max);
        if !(worst <= UNIT_MAG_TOL) {
            return Err(PhysicsError::NonUnitMagnitude(worst));
        }
    }
    if !config.complex {
        diag.mapv_inplace(|c| Cx::new(c.re * SQRT_2, 0.0));
    }
    Ok(diag)
}

/// Draw the spectrum envelope.  Always real and non-negative.
pub fn generate_spectrum<R: Rng + ?Sized>(
    shape: Shape,
    mode: &SpectrumMode,
    config: &DistributionConfig,
    rng: &mut R,
) -> Result<Signal> {
    match mode {
        SpectrumMode::Unit => Ok(Array3::from_elem(shape, Cx::new(1.0, 0.0))),
        SpectrumMode::MarchenkoPastur => {
            let plain = DistributionConfig { unit_mag: false, complex: true, ..config.clone() };
            generate_diagonal(shape, &DiagonalMode::MarchenkoPastur, &plain, rng)
        }
        SpectrumMode::Magnitude { mode } => {
            let plain = DistributionConfig { unit_mag: false, complex: true, ..config.clone() };
            let d = generate_diagonal(shape, mode, &plain, rng)?;
            Ok(d.mapv(|c| Cx::new(c.norm(), 0.0)))
        }
    }
}
