use crate::rigid::RigidFitError;
use crate::sampler::SamplerError;

/// Error types for a registration run.
#[derive(Debug, thiserror::Error)]
pub enum FistError {
    /// The run parameters or the input clouds are not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The direction sampler failed.
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    /// The rigid fit failed outside of the iteration loop.
    #[error(transparent)]
    RigidFit(#[from] RigidFitError),

    /// The engine reached a terminal state and must be reset first.
    #[error("The engine is in a terminal state ({0}); call reset() first")]
    Terminated(&'static str),
}
