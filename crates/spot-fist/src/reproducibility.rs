use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Seed used by every sampler while reproducible runs are enabled.
pub const REPRODUCIBLE_SEED: u64 = 10;

static REPRODUCIBLE_RUNS: AtomicBool = AtomicBool::new(true);

/// Enable or disable reproducible runs for the whole process.
///
/// Only samplers created after the call are affected, so set it before
/// building any engine.
pub fn set_enable_reproducible_runs(enable: bool) {
    REPRODUCIBLE_RUNS.store(enable, Ordering::SeqCst);
}

/// Whether reproducible runs are currently enabled. Defaults to `true`.
pub fn reproducible_runs_enabled() -> bool {
    REPRODUCIBLE_RUNS.load(Ordering::SeqCst)
}

/// How a random engine gets its seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedPolicy {
    /// Seed with a fixed value; runs are bit-reproducible.
    Fixed(u64),
    /// Seed from the operating system entropy source.
    Entropy,
}

impl SeedPolicy {
    /// The policy implied by the process-wide toggle.
    pub fn from_process() -> Self {
        if reproducible_runs_enabled() {
            SeedPolicy::Fixed(REPRODUCIBLE_SEED)
        } else {
            SeedPolicy::Entropy
        }
    }

    /// An explicit seed wins over the process-wide toggle.
    pub fn resolve(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => SeedPolicy::Fixed(seed),
            None => Self::from_process(),
        }
    }
}
