//! Structured random sensing operator
//!
//! ```text
//! B = Exit · F D_{N−1} · … · F D_1 · F D_0 · [F] · Enter
//! ```
//!
//! where `F` is a fixed unitary transform, `D_i` are random diagonals, `[F]` is
//! the optional leading transform encoded by a fractional `n_layers = N + ½`,
//! and `Enter`/`Exit` are the pad/trim steps chosen by [`ShapeAdapter`].
//!
//! ## Representation
//!
//! The operator is an immutable list of [`Layer`] descriptors.  `apply` walks
//! the list forward; `adjoint` walks it backwards, replacing each transform by
//! its inverse and each diagonal by its conjugate, and swapping pad for trim at
//! the boundaries.  Diagonals live behind `Arc`, so `shared_weights` makes
//! every diagonal slot point at one buffer rather than at copies of it.
//!
//! ## Conventions
//!
//! - Diagonals and the spectrum are drawn at the middle shape.
//! - A non-unit spectrum is its own layer directly after the first diagonal
//!   (the last layer when there are no diagonals).  It is never folded into
//!   `D_0`.
//! - The structure tag reads like the matrix product: `n_layers = 2.5` gives
//!   `"FDFDF"`, the rightmost `F` being the leading transform.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::distribution::{
    generate_diagonal, generate_spectrum, DiagonalMode, DistributionConfig, SpectrumMode,
};
use crate::error::{PhysicsError, Result};
use crate::operator::LinearOperator;
use crate::shape::{Padding, SamplingMode, ShapeAdapter};
use crate::signal::{check_shape, numel, Cx, Shape, Signal};
use crate::transform::{Transform, TransformKind};

// ─── Layer count ──────────────────────────────────────────────────────────────

/// Upper bound on `n_layers`.
pub const MAX_LAYERS: f64 = 1024.0;

/// `n_layers` split into its diagonal count and the half-layer flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerCount {
    diagonals: usize,
    leading_transform: bool,
}

impl LayerCount {
    pub fn new(n_layers: f64) -> Result<Self> {
        let whole = n_layers.floor();
        let frac = n_layers - whole;
        let in_range = n_layers.is_finite() && (0.0..=MAX_LAYERS).contains(&n_layers);
        if !in_range || !(frac == 0.0 || frac == 0.5) {
            return Err(PhysicsError::InvalidLayerCount(n_layers));
        }
        Ok(Self { diagonals: whole as usize, leading_transform: frac == 0.5 })
    }

    pub fn diagonals(self) -> usize {
        self.diagonals
    }

    pub fn has_leading_transform(self) -> bool {
        self.leading_transform
    }

    pub fn value(self) -> f64 {
        self.diagonals as f64 + if self.leading_transform { 0.5 } else { 0.0 }
    }

    /// `"FD"` per diagonal layer, then `"F"` for the leading transform.
    pub fn structure(self) -> String {
        let mut tag = "FD".repeat(self.diagonals);
        if self.leading_transform {
            tag.push('F');
        }
        tag
    }
}

impl TryFrom<f64> for LayerCount {
    type Error = PhysicsError;

    fn try_from(n_layers: f64) -> Result<Self> {
        Self::new(n_layers)
    }
}

/// Structure tag for `n_layers`, e.g. `2.5 → "FDFDF"`.
pub fn get_structure(n_layers: f64) -> Result<String> {
    Ok(LayerCount::new(n_layers)?.structure())
}

// ─── Layers ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Transform,
    /// Index into the operator's diagonal slots.
    Diagonal(usize),
    Spectrum,
}

fn layer_plan(count: LayerCount, with_spectrum: bool) -> Vec<Layer> {
    let mut layers = Vec::with_capacity(2 * count.diagonals() + 2);
    if count.has_leading_transform() {
        layers.push(Layer::Transform);
    }
    for i in 0..count.diagonals() {
        layers.push(Layer::Diagonal(i));
        if i == 0 && with_spectrum {
            layers.push(Layer::Spectrum);
        }
        layers.push(Layer::Transform);
    }
    if count.diagonals() == 0 && with_spectrum {
        layers.push(Layer::Spectrum);
    }
    layers
}

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_modes() -> Vec<DiagonalMode> {
    vec![DiagonalMode::UniformPhase]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredConfig {
    pub input_shape: Shape,
    /// Defaults to `input_shape`.
    #[serde(default)]
    pub output_shape: Option<Shape>,
    pub n_layers: f64,
    #[serde(default)]
    pub transform: TransformKind,
    /// One mode for every layer, or exactly one per layer.
    #[serde(default = "default_modes")]
    pub diagonal_modes: Vec<DiagonalMode>,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub spectrum: SpectrumMode,
    #[serde(default)]
    pub shared_weights: bool,
    /// Force a power-of-two middle shape even for non-Hadamard transforms.
    #[serde(default)]
    pub power_of_two: bool,
}

impl StructuredConfig {
    pub fn new(input_shape: Shape, output_shape: Shape, n_layers: f64) -> Self {
        Self {
            input_shape,
            output_shape: Some(output_shape),
            n_layers,
            transform: TransformKind::default(),
            diagonal_modes: default_modes(),
            distribution: DistributionConfig::default(),
            spectrum: SpectrumMode::default(),
            shared_weights: false,
            power_of_two: false,
        }
    }

    pub fn with_transform(mut self, transform: TransformKind) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_diagonal_mode(mut self, mode: DiagonalMode) -> Self {
        self.diagonal_modes = vec![mode];
        self
    }

    pub fn with_diagonal_modes(mut self, modes: Vec<DiagonalMode>) -> Self {
        self.diagonal_modes = modes;
        self
    }

    pub fn with_distribution(mut self, distribution: DistributionConfig) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_spectrum(mut self, spectrum: SpectrumMode) -> Self {
        self.spectrum = spectrum;
        self
    }

    pub fn with_shared_weights(mut self, shared: bool) -> Self {
        self.shared_weights = shared;
        self
    }

    pub fn with_power_of_two(mut self, power_of_two: bool) -> Self {
        self.power_of_two = power_of_two;
        self
    }

    pub fn output(&self) -> Shape {
        self.output_shape.unwrap_or(self.input_shape)
    }
}

// ─── Operator ─────────────────────────────────────────────────────────────────

/// Matrix-free `B`.  Immutable after construction; safe to evaluate from
/// several threads at once.
#[derive(Clone)]
pub struct StructuredRandomOperator {
    shapes: ShapeAdapter,
    transform: Transform,
    count: LayerCount,
    layers: Vec<Layer>,
    diagonals: Vec<Arc<Signal>>,
    spectrum: Option<Arc<Signal>>,
}

impl fmt::Debug for StructuredRandomOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredRandomOperator")
            .field("structure", &self.structure())
            .field("mode", &self.shapes.mode())
            .field("input", &self.shapes.input())
            .field("middle", &self.shapes.middle())
            .field("output", &self.shapes.output())
            .field("transform", &self.transform.kind())
            .field("layers", &self.layers)
            .finish()
    }
}

impl StructuredRandomOperator {
    /// Draw every diagonal (and the spectrum) from `rng`, in layer order.
    pub fn new<R: Rng + ?Sized>(config: &StructuredConfig, rng: &mut R) -> Result<Self> {
        let count = LayerCount::new(config.n_layers)?;
        let input = config.input_shape;
        let output = config.output();
        let power_of_two = config.power_of_two || config.transform.requires_power_of_two();
        let shapes = ShapeAdapter::new(input, output, power_of_two)?;
        let middle = shapes.middle();
        let transform = Transform::new(config.transform, middle.1, middle.2)?;

        let modes = &config.diagonal_modes;
        if !(modes.len() == 1 || modes.len() == count.diagonals()) {
            return Err(PhysicsError::ModeCount {
                expected: count.diagonals(),
                actual: modes.len(),
            });
        }
        let mode_for = |i: usize| if modes.len() == 1 { &modes[0] } else { &modes[i] };

        let distribution = DistributionConfig {
            m: numel(output),
            n: numel(input),
            ..config.distribution.clone()
        };

        let diagonals = if count.diagonals() == 0 {
            Vec::new()
        } else if config.shared_weights {
            let shared = Arc::new(generate_diagonal(middle, mode_for(0), &distribution, rng)?);
            vec![shared; count.diagonals()]
        } else {
            (0..count.diagonals())
                .map(|i| generate_diagonal(middle, mode_for(i), &distribution, rng).map(Arc::new))
                .collect::<Result<Vec<_>>>()?
        };

        let spectrum = match &config.spectrum {
            SpectrumMode::Unit => None,
            mode => Some(Arc::new(generate_spectrum(middle, mode, &distribution, rng)?)),
        };

        let layers = layer_plan(count, spectrum.is_some());
        let op = Self { shapes, transform, count, layers, diagonals, spectrum };
        debug!(
            structure = %op.structure(),
            mode = %op.shapes.mode(),
            input = ?input,
            middle = ?middle,
            output = ?output,
            transform = %config.transform,
            shared_weights = config.shared_weights,
            "built structured random operator"
        );
        Ok(op)
    }

    pub fn shapes(&self) -> &ShapeAdapter {
        &self.shapes
    }

    pub fn mode(&self) -> SamplingMode {
        self.shapes.mode()
    }

    pub fn layer_count(&self) -> LayerCount {
        self.count
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn diagonals(&self) -> &[Arc<Signal>] {
        &self.diagonals
    }

    pub fn spectrum(&self) -> Option<&Signal> {
        self.spectrum.as_deref()
    }

    pub fn transform_kind(&self) -> TransformKind {
        self.transform.kind()
    }

    /// Structure tag derived from the layer list (spectrum layers omitted).
    pub fn structure(&self) -> String {
        self.layers
            .iter()
            .rev()
            .filter_map(|l| match l {
                Layer::Transform => Some('F'),
                Layer::Diagonal(_) => Some('D'),
                Layer::Spectrum => None,
            })
            .collect()
    }

    fn modulation(&self, layer: Layer) -> Option<&Signal> {
        match layer {
            Layer::Diagonal(i) => Some(&*self.diagonals[i]),
            Layer::Spectrum => self.spectrum.as_deref(),
            Layer::Transform => None,
        }
    }

    /// Dense `m × n` matrix of `B` for small oversampling operators, composed
    /// from explicit transform, diagonal and selection matrices.
    pub fn forward_matrix(&self) -> Result<Array2<Cx>> {
        if self.shapes.mode() != SamplingMode::Oversampling {
            return Err(PhysicsError::RequiresOversampling(self.shapes.mode()));
        }
        let middle = self.shapes.middle();
        let t = self.transform.matrix(middle.0);

        let mut mat = embedding(self.shapes.input(), middle, self.shapes.enter_padding());
        for &layer in &self.layers {
            mat = match (layer, self.modulation(layer)) {
                (Layer::Transform, _) => t.dot(&mat),
                (_, Some(d)) => {
                    let diag = Array2::from_diag(&Array1::from_iter(d.iter().copied()));
                    diag.dot(&mat)
                }
                (_, None) => mat,
            };
        }
        let exit = embedding(self.shapes.output(), middle, self.shapes.exit_padding());
        Ok(exit.t().dot(&mat))
    }
}

/// `numel(outer) × numel(inner)` zero-padding matrix placing `inner` at the
/// `p` offsets of `outer`.
fn embedding(inner: Shape, outer: Shape, p: Padding) -> Array2<Cx> {
    let mut e = Array2::zeros((numel(outer), numel(inner)));
    for c in 0..inner.0 {
        for i in 0..inner.1 {
            for j in 0..inner.2 {
                let col = (c * inner.1 + i) * inner.2 + j;
                let row = (c * outer.1 + i + p.top) * outer.2 + j + p.left;
                e[[row, col]] = Cx::new(1.0, 0.0);
            }
        }
    }
    e
}

impl LinearOperator for StructuredRandomOperator {
    fn input_shape(&self) -> Shape {
        self.shapes.input()
    }

    fn output_shape(&self) -> Shape {
        self.shapes.output()
    }

    fn apply(&self, x: &Signal) -> Result<Signal> {
        check_shape("structured operator input", x, self.shapes.input())?;
        let mut z = self.shapes.enter(x);
        for &layer in &self.layers {
            match (layer, self.modulation(layer)) {
                (Layer::Transform, _) => self.transform.forward(&mut z),
                (_, Some(d)) => z *= d,
                (_, None) => {}
            }
        }
        Ok(self.shapes.exit(&z))
    }

    fn adjoint(&self, y: &Signal) -> Result<Signal> {
        check_shape("structured operator output", y, self.shapes.output())?;
        let mut z = self.shapes.exit_adjoint(y);
        for &layer in self.layers.iter().rev() {
            match (layer, self.modulation(layer)) {
                (Layer::Transform, _) => self.transform.inverse(&mut z),
                (_, Some(d)) => Zip::from(&mut z).and(d).for_each(|v, w| *v *= w.conj()),
                (_, None) => {}
            }
        }
        Ok(self.shapes.enter_adjoint(&z))
    }

    /// Second moment of the first diagonal layer.  `None`, with a warning,
    /// when the operator has no diagonal layers.
    fn squared_mean(&self) -> Option<f64> {
        let Some(d) = self.diagonals.first() else {
            warn!(
                structure = %self.structure(),
                "no diagonal layers; the squared mean of a bare transform is not defined"
            );
            return None;
        };
        let len = d.len() as f64;
        let mean: Cx = d.iter().sum::<Cx>() / len;
        let var = d.iter().map(|v| (v - mean).norm_sqr()).sum::<f64>() / len;
        Some(var + mean.norm_sqr())
    }
}
