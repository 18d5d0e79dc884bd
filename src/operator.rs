//! The linear-operator seam between sensing matrices and the phase-retrieval
//! wrapper.

use crate::error::Result;
use crate::signal::{Shape, Signal};

/// A linear map `B: C^n → C^m` with an exact adjoint.
///
/// Implementors must satisfy `⟨B x, y⟩ = ⟨x, Bᴴ y⟩` to machine precision;
/// gradient and spectral code downstream assume it.
pub trait LinearOperator: Send + Sync {
    fn input_shape(&self) -> Shape;

    fn output_shape(&self) -> Shape;

    fn apply(&self, x: &Signal) -> Result<Signal>;

    fn adjoint(&self, y: &Signal) -> Result<Signal>;

    /// Pseudo-inverse `B†`.  Defaults to the adjoint, which is exact for
    /// operators with orthonormal columns.
    fn pseudo_inverse(&self, y: &Signal) -> Result<Signal> {
        self.adjoint(y)
    }

    /// Second moment `Var(b) + |E b|²` of the random entries, or `None` when the
    /// operator has no random entries.
    fn squared_mean(&self) -> Option<f64>;
}
