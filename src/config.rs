//! Top-level JSON configuration for a structured phase-retrieval setup.
//!
//! ```json
//! {
//!   "seed": 7,
//!   "operator": { "input_shape": [1, 32, 32], "output_shape": [1, 64, 64], "n_layers": 2.5 },
//!   "spectral": { "n_iter": 50, "lambda": 10.0 },
//!   "noise": { "kind": "poisson", "gain": 100.0 }
//! }
//! ```

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::phase_retrieval::{Noise, PhaseRetrieval, Sensor};
use crate::spectral::SpectralConfig;
use crate::structured::{StructuredConfig, StructuredRandomOperator};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Seed for the operator's random diagonals.
    #[serde(default)]
    pub seed: u64,
    pub operator: StructuredConfig,
    #[serde(default)]
    pub spectral: SpectralConfig,
    #[serde(default)]
    pub noise: Noise,
    #[serde(default)]
    pub sensor: Sensor,
}

impl PhysicsConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        // Surface a bad n_layers at load time rather than at build time.
        crate::structured::LayerCount::new(config.operator.n_layers)?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the configured model, drawing its diagonals from `seed`.
    pub fn build(&self) -> Result<PhaseRetrieval<StructuredRandomOperator>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        Ok(PhaseRetrieval::structured(&self.operator, &mut rng)?
            .with_spectral(self.spectral.clone())
            .with_noise(self.noise)
            .with_sensor(self.sensor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DiagonalMode;
    use crate::error::PhysicsError;
    use crate::signal::random_signal;
    use crate::transform::TransformKind;

    const JSON: &str = r#"{
        "seed": 7,
        "operator": {
            "input_shape": [1, 4, 4],
            "output_shape": [1, 8, 8],
            "n_layers": 2.5,
            "transform": "hadamard",
            "diagonal_modes": [{"kind": "polar4"}]
        },
        "spectral": {"n_iter": 20},
        "noise": {"kind": "gaussian", "sigma": 0.1},
        "sensor": {"kind": "saturate", "max": 4.0}
    }"#;

    #[test]
    fn parses_with_defaults() {
        let config = PhysicsConfig::from_json_str(JSON).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.operator.transform, TransformKind::Hadamard2);
        assert_eq!(config.operator.diagonal_modes, vec![DiagonalMode::Polar4]);
        assert_eq!(config.spectral.n_iter, 20);
        assert_eq!(config.spectral.lambda, 10.0);
        assert_eq!(config.noise, Noise::Gaussian { sigma: 0.1 });
        assert_eq!(config.sensor, Sensor::Saturate { max: 4.0 });

        let back = PhysicsConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn build_is_reproducible() {
        let config = PhysicsConfig::from_json_str(JSON).unwrap();
        let a = config.build().unwrap();
        let b = config.build().unwrap();
        assert_eq!(a.name(), "PRPR_m64");
        assert_eq!(a.b().unwrap().structure(), "FDFDF");
        let x = random_signal((1, 4, 4), &mut StdRng::seed_from_u64(0));
        assert_eq!(a.a(&x).unwrap(), b.a(&x).unwrap());
    }

    #[test]
    fn rejects_bad_input() {
        let bad_layers = JSON.replace("2.5", "1.7");
        assert!(matches!(
            PhysicsConfig::from_json_str(&bad_layers),
            Err(PhysicsError::InvalidLayerCount(_))
        ));
        let bad_transform = JSON.replace("\"hadamard\"", "\"wavelet\"");
        assert!(matches!(PhysicsConfig::from_json_str(&bad_transform), Err(PhysicsError::Json(_))));
        assert!(matches!(
            PhysicsConfig::from_path("/nonexistent/physics.json"),
            Err(PhysicsError::Io(_))
        ));
    }
}
