#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Per-source-point accumulation of 1d displacements.
pub mod aggregator;

/// The iteration driver.
pub mod engine;

mod error;
pub use error::FistError;

/// Parameters of a registration run.
pub mod params;

/// Process-wide seeding control.
pub mod reproducibility;

/// Weighted Kabsch/Umeyama fit.
pub mod rigid;

/// Random slice directions.
pub mod sampler;

/// Projection of point clouds on a direction.
pub mod slicer;

/// Phase timings.
pub mod timings;

/// One dimensional partial transport.
pub mod transport;

/// High level registration interface.
pub mod wrappers;

pub use engine::{EngineState, FistEngine, IterationReport};
pub use params::FistParams;
pub use reproducibility::{reproducible_runs_enabled, set_enable_reproducible_runs, SeedPolicy};
pub use wrappers::FistRegistration;
