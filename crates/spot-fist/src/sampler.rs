use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::reproducibility::SeedPolicy;

/// Error types for the sampler module.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SamplerError {
    /// The sampler was used before a random engine was configured.
    #[error("Random state used before initialization")]
    UninitializedRandomState,
}

// uniform draws are kept away from 0 and 1 so ln() stays finite
const UNIFORM_LOW: f64 = 1e-12;
const UNIFORM_HIGH: f64 = 1.0 - 1e-12;

/// A unit vector in 3d.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction([f64; 3]);

impl Direction {
    /// Normalize `v` into a direction. Returns `None` for a (near) zero vector.
    pub fn new(v: [f64; 3]) -> Option<Self> {
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if !norm.is_finite() || norm < 1e-12 {
            return None;
        }
        Some(Self([v[0] / norm, v[1] / norm, v[2] / norm]))
    }

    /// The components of the unit vector.
    #[inline]
    pub fn as_array(&self) -> &[f64; 3] {
        &self.0
    }
}

/// Source of uniformly distributed directions on the unit sphere.
///
/// The sampler owns its engine; it is meant to be driven by a single
/// coordinating thread that hands the directions out to workers.
#[derive(Debug, Clone)]
pub struct DirectionSampler {
    rng: Option<StdRng>,
}

impl DirectionSampler {
    /// Create a sampler seeded according to `policy`.
    pub fn new(policy: SeedPolicy) -> Self {
        let mut sampler = Self::uninitialized();
        sampler.initialize(policy);
        sampler
    }

    /// Create a sampler without a random engine. Every draw fails until
    /// [`DirectionSampler::initialize`] is called.
    pub fn uninitialized() -> Self {
        Self { rng: None }
    }

    /// (Re)seed the random engine.
    pub fn initialize(&mut self, policy: SeedPolicy) {
        self.rng = Some(match policy {
            SeedPolicy::Fixed(seed) => StdRng::seed_from_u64(seed),
            SeedPolicy::Entropy => StdRng::from_os_rng(),
        });
    }

    /// Whether a random engine is configured.
    pub fn is_initialized(&self) -> bool {
        self.rng.is_some()
    }

    /// Draw a uniform value in `[1e-12, 1 - 1e-12]`.
    pub fn uniform(&mut self) -> Result<f64, SamplerError> {
        let rng = self
            .rng
            .as_mut()
            .ok_or(SamplerError::UninitializedRandomState)?;
        Ok(rng.random::<f64>().clamp(UNIFORM_LOW, UNIFORM_HIGH))
    }

    /// Draw a standard normal value with the Box-Muller transform.
    fn gaussian(&mut self) -> Result<f64, SamplerError> {
        let u1 = self.uniform()?;
        let u2 = self.uniform()?;
        Ok((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos())
    }

    /// Draw the next direction, uniform on the unit sphere.
    pub fn next_direction(&mut self) -> Result<Direction, SamplerError> {
        loop {
            let v = [self.gaussian()?, self.gaussian()?, self.gaussian()?];
            if let Some(direction) = Direction::new(v) {
                return Ok(direction);
            }
        }
    }

    /// Draw `k` directions.
    pub fn directions(&mut self, k: usize) -> Result<Vec<Direction>, SamplerError> {
        (0..k).map(|_| self.next_direction()).collect()
    }
}
