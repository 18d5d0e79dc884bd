//! Shape adaptation between the input, the "middle" shape the layers run at,
//! and the output.
//!
//! ## Policy
//!
//! | sampling      | middle shape | on entry        | on exit           |
//! |---------------|--------------|-----------------|-------------------|
//! | oversampling  | output       | pad to output   | —                 |
//! | undersampling | input        | —               | trim to output    |
//! | equisampling  | input        | —               | —                 |
//! | power-of-two  | 2^⌈log₂ max⌉ | pad to middle   | trim to output    |
//!
//! Padding splits each axis difference `d` as `⌈d/2⌉` leading and `⌊d/2⌋`
//! trailing; trimming removes exactly those offsets.  Zero-padding and
//! restriction to the original support are each other's adjoints, so the
//! exit step's adjoint is a pad and the entry step's adjoint is a trim.
//! Channels are never padded.

use std::cmp::Ordering;
use std::fmt;

use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::signal::{numel, Shape, Signal};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    Oversampling,
    Undersampling,
    Equisampling,
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Oversampling => "oversampling",
            Self::Undersampling => "undersampling",
            Self::Equisampling => "equisampling",
        })
    }
}

/// Zero borders added around the `(H, W)` plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Padding {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Padding {
    /// Borders that take a `small` plane to a `large` one.
    pub fn between(small: (usize, usize), large: (usize, usize)) -> Self {
        let dh = large.0 - small.0;
        let dw = large.1 - small.1;
        Self {
            top: dh.div_ceil(2),
            bottom: dh / 2,
            left: dw.div_ceil(2),
            right: dw / 2,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Zero-pad the spatial plane of `x`.
pub fn pad(x: &Signal, p: &Padding) -> Signal {
    if p.is_identity() {
        return x.clone();
    }
    let (c, h, w) = x.dim();
    let mut out = Array3::zeros((c, h + p.top + p.bottom, w + p.left + p.right));
    out.slice_mut(s![.., p.top..p.top + h, p.left..p.left + w]).assign(x);
    out
}

/// Cut `p` away from the spatial plane of `x`.
pub fn trim(x: &Signal, p: &Padding) -> Signal {
    if p.is_identity() {
        return x.clone();
    }
    let (_, h, w) = x.dim();
    x.slice(s![.., p.top..h - p.bottom, p.left..w - p.right]).to_owned()
}

fn direction(input: usize, output: usize) -> Ordering {
    input.cmp(&output)
}

/// Derived geometry of a structured operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeAdapter {
    input: Shape,
    output: Shape,
    middle: Shape,
    mode: SamplingMode,
    /// input → middle
    enter: Padding,
    /// middle → output (as a trim)
    exit: Padding,
}

impl ShapeAdapter {
    pub fn new(input: Shape, output: Shape, power_of_two: bool) -> Result<Self> {
        if input.0 != output.0 {
            return Err(PhysicsError::ChannelMismatch { input: input.0, output: output.0 });
        }
        let mode = match (direction(input.1, output.1), direction(input.2, output.2)) {
            (Ordering::Equal, Ordering::Equal) => SamplingMode::Equisampling,
            (Ordering::Less | Ordering::Equal, Ordering::Less | Ordering::Equal) => {
                SamplingMode::Oversampling
            }
            (Ordering::Greater | Ordering::Equal, Ordering::Greater | Ordering::Equal) => {
                SamplingMode::Undersampling
            }
            _ => return Err(PhysicsError::InconsistentSampling { input, output }),
        };
        debug_assert_eq!(
            mode == SamplingMode::Oversampling,
            numel(output) > numel(input),
            "per-axis direction and element counts agree"
        );

        let middle = if power_of_two {
            (
                input.0,
                input.1.max(output.1).next_power_of_two(),
                input.2.max(output.2).next_power_of_two(),
            )
        } else {
            match mode {
                SamplingMode::Oversampling => output,
                SamplingMode::Undersampling | SamplingMode::Equisampling => input,
            }
        };
        let enter = Padding::between((input.1, input.2), (middle.1, middle.2));
        let exit = Padding::between((output.1, output.2), (middle.1, middle.2));
        Ok(Self { input, output, middle, mode, enter, exit })
    }

    pub fn input(&self) -> Shape {
        self.input
    }

    pub fn output(&self) -> Shape {
        self.output
    }

    pub fn middle(&self) -> Shape {
        self.middle
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn enter_padding(&self) -> Padding {
        self.enter
    }

    pub fn exit_padding(&self) -> Padding {
        self.exit
    }

    /// Input → middle.
    pub fn enter(&self, x: &Signal) -> Signal {
        pad(x, &self.enter)
    }

    /// Middle → output.
    pub fn exit(&self, x: &Signal) -> Signal {
        trim(x, &self.exit)
    }

    /// Adjoint of [`Self::exit`]: output → middle.
    pub fn exit_adjoint(&self, y: &Signal) -> Signal {
        pad(y, &self.exit)
    }

    /// Adjoint of [`Self::enter`]: middle → input.
    pub fn enter_adjoint(&self, y: &Signal) -> Signal {
        trim(y, &self.enter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{random_signal, vdot};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sampling_mode_follows_axis_directions() {
        let mode = |o: Shape| ShapeAdapter::new((1, 8, 8), o, false).unwrap().mode();
        assert_eq!(mode((1, 12, 12)), SamplingMode::Oversampling);
        assert_eq!(mode((1, 8, 12)), SamplingMode::Oversampling);
        assert_eq!(mode((1, 5, 8)), SamplingMode::Undersampling);
        assert_eq!(mode((1, 8, 8)), SamplingMode::Equisampling);
    }

    #[test]
    fn mixed_directions_are_rejected() {
        // Taller but narrower.
        let err = ShapeAdapter::new((1, 8, 8), (1, 10, 6), false).unwrap_err();
        assert!(matches!(err, PhysicsError::InconsistentSampling { .. }));
        let err = ShapeAdapter::new((1, 8, 8), (3, 8, 8), false).unwrap_err();
        assert!(matches!(err, PhysicsError::ChannelMismatch { input: 1, output: 3 }));
    }

    #[test]
    fn padding_splits_odd_differences_toward_the_leading_edge() {
        let p = Padding::between((4, 4), (9, 6));
        assert_eq!(p, Padding { top: 3, bottom: 2, left: 1, right: 1 });
    }

    /// trim(pad(x)) == x exactly, for even and odd differences.
    #[test]
    fn trim_inverts_pad() {
        let mut rng = StdRng::seed_from_u64(8);
        let pairs = [((3, 3), (3, 3)), ((3, 3), (4, 4)), ((5, 4), (8, 9)), ((2, 7), (9, 7))];
        for &(small, large) in &pairs {
            let x = random_signal((2, small.0, small.1), &mut rng);
            let p = Padding::between(small, large);
            let padded = pad(&x, &p);
            assert_eq!(padded.dim(), (2, large.0, large.1));
            assert_eq!(trim(&padded, &p), x, "{small:?} → {large:?}");
        }
    }

    /// ⟨pad(x), y⟩ = ⟨x, trim(y)⟩.
    #[test]
    fn pad_and_trim_are_adjoint() {
        let mut rng = StdRng::seed_from_u64(9);
        let p = Padding::between((5, 3), (8, 8));
        let x = random_signal((1, 5, 3), &mut rng);
        let y = random_signal((1, 8, 8), &mut rng);
        let lhs = vdot(&pad(&x, &p), &y);
        let rhs = vdot(&x, &trim(&y, &p));
        assert!((lhs - rhs).norm() < 1e-12);
    }

    #[test]
    fn middle_shape_policy() {
        let a = ShapeAdapter::new((1, 5, 5), (1, 9, 9), false).unwrap();
        assert_eq!(a.middle(), (1, 9, 9));
        assert!(a.exit_padding().is_identity());

        let a = ShapeAdapter::new((1, 9, 9), (1, 5, 5), false).unwrap();
        assert_eq!(a.middle(), (1, 9, 9));
        assert!(a.enter_padding().is_identity());
        assert_eq!(a.exit_padding(), Padding { top: 2, bottom: 2, left: 2, right: 2 });

        // Power of two overrides either direction.
        let a = ShapeAdapter::new((1, 5, 5), (1, 3, 6), false);
        assert!(a.is_err());
        let a = ShapeAdapter::new((1, 9, 9), (1, 5, 5), true).unwrap();
        assert_eq!(a.middle(), (1, 16, 16));
        assert_eq!(a.mode(), SamplingMode::Undersampling);
        let x = Signal::zeros((1, 9, 9));
        assert_eq!(a.exit(&a.enter(&x)).dim(), (1, 5, 5));
    }
}
