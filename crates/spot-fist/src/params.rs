use serde::{Deserialize, Serialize};

use crate::error::FistError;
use crate::reproducibility::SeedPolicy;
use crate::transport::MatchingPolicy;

/// Parameters of a registration run.
///
/// Every field has a default, so a partial JSON document is enough to
/// configure a run:
///
/// ```
/// use spot_fist::FistParams;
///
/// let params: FistParams = serde_json::from_str(r#"{ "num_directions": 32 }"#).unwrap();
/// assert_eq!(params.num_directions, 32);
/// assert_eq!(params.max_iterations, FistParams::default().max_iterations);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FistParams {
    /// Number of random slice directions drawn at every iteration.
    pub num_directions: usize,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Fraction of the smaller cloud matched in every slice, in `(0, 1]`.
    pub ratio: f64,
    /// Stop when the incremental rotation angle (radians) is below this value
    /// and the translation criterion holds too.
    pub rotation_tolerance: f64,
    /// Stop when the incremental translation norm is below this value and the
    /// rotation criterion holds too.
    pub translation_tolerance: f64,
    /// With `estimate_scale`, stop only when the incremental scale is within
    /// this distance of `1` and the other criteria hold too. Ignored for
    /// rigid runs, whose scale is always `1`.
    pub scale_tolerance: f64,
    /// How the partial subset of every slice is selected.
    pub policy: MatchingPolicy,
    /// Estimate an isotropic scale along with the rigid motion.
    pub estimate_scale: bool,
    /// Explicit seed. Overrides the process-wide reproducibility toggle.
    pub seed: Option<u64>,
    /// Side of the boxes used to synthesize random clouds.
    pub radius: f64,
    /// Number of directions processed by one parallel task.
    pub directions_per_chunk: usize,
}

impl Default for FistParams {
    fn default() -> Self {
        Self {
            num_directions: 100,
            max_iterations: 200,
            ratio: 1.0,
            rotation_tolerance: 1e-6,
            translation_tolerance: 1e-6,
            scale_tolerance: 1e-6,
            policy: MatchingPolicy::default(),
            estimate_scale: false,
            seed: None,
            radius: 1.0,
            directions_per_chunk: 8,
        }
    }
}

impl FistParams {
    /// Check the parameters. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), FistError> {
        if self.num_directions == 0 {
            return Err(FistError::InvalidConfiguration(
                "num_directions must be greater than 0".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(FistError::InvalidConfiguration(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(FistError::InvalidConfiguration(format!(
                "ratio must be in (0, 1], got {}",
                self.ratio
            )));
        }
        for (name, value) in [
            ("rotation_tolerance", self.rotation_tolerance),
            ("translation_tolerance", self.translation_tolerance),
            ("scale_tolerance", self.scale_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FistError::InvalidConfiguration(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(FistError::InvalidConfiguration(format!(
                "radius must be a finite positive number, got {}",
                self.radius
            )));
        }
        if self.directions_per_chunk == 0 {
            return Err(FistError::InvalidConfiguration(
                "directions_per_chunk must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The seed policy of a run using these parameters.
    pub fn seed_policy(&self) -> SeedPolicy {
        SeedPolicy::resolve(self.seed)
    }
}
