//! Forward models for phase retrieval with structured random operators.
//!
//! The measurement model is `A(x) = |B x|²` where `B` is either a dense
//! complex Gaussian matrix or a matrix-free product of fixed unitary
//! transforms and random diagonals,
//!
//! ```text
//! B = Exit · F D_{N−1} · … · F D_0 · [F] · Enter
//! ```
//!
//! with zero-padding/trimming at the ends to move between input and output
//! sizes.
//!
//! # Modules
//!
//! - [`signal`]            — signal/measurement containers, `vdot`, norms, test signals
//! - [`transform`]         — orthonormal 2-D Fourier, 2-D cosine, 1-D/2-D Hadamard
//! - [`shape`]             — sampling mode, middle shape, pad/trim pairs
//! - [`marchenko_pastur`]  — Marchenko–Pastur density and rejection sampler
//! - [`distribution`]      — random diagonals and spectra with `E|d|² = 1`
//! - [`operator`]          — the `LinearOperator` trait (`apply`, `adjoint`, `pseudo_inverse`)
//! - [`structured`]        — `StructuredRandomOperator` and its layer list
//! - [`gaussian`]          — dense Gaussian baseline with a CGLS pseudo-inverse
//! - [`phase_retrieval`]   — `A`, its VJP, noise and sensor, spectral `A†`
//! - [`spectral`]          — spectral initialisation by shifted power iteration
//! - [`metrics`]           — cosine similarity up to a global phase
//! - [`config`]            — JSON configuration of a full setup
//!
//! # Running tests
//!
//! ```bash
//! cargo test -- --nocapture
//! ```

pub mod config;
pub mod distribution;
pub mod error;
pub mod gaussian;
pub mod marchenko_pastur;
pub mod metrics;
pub mod operator;
pub mod phase_retrieval;
pub mod shape;
pub mod signal;
pub mod spectral;
pub mod structured;
pub mod transform;

pub use config::PhysicsConfig;
pub use distribution::{DiagonalMode, DistributionConfig, SpectrumMode};
pub use error::{PhysicsError, Result};
pub use gaussian::GaussianOperator;
pub use operator::LinearOperator;
pub use phase_retrieval::{Noise, PhaseRetrieval, Sensor};
pub use shape::SamplingMode;
pub use signal::{Cx, Measurement, Shape, Signal};
pub use spectral::{Preprocessing, SpectralConfig};
pub use structured::{get_structure, StructuredConfig, StructuredRandomOperator};
pub use transform::TransformKind;
