use std::ops::ControlFlow;

use rayon::prelude::*;
use spot_3d::linalg::norm3;
use spot_3d::pointcloud::{PointCloud, Scalar};
use spot_3d::rigid::RigidTransform;

use crate::aggregator::DisplacementAggregator;
use crate::error::FistError;
use crate::params::FistParams;
use crate::rigid::{fit_transformation, RigidFitError};
use crate::sampler::{Direction, DirectionSampler};
use crate::slicer::project_into;
use crate::timings::TimingsLogger;
use crate::transport::{match_sorted, optimal_table_cells, MatchingPolicy, MAX_OPTIMAL_CELLS};

/// Timing phase covering a whole iteration.
pub const PHASE_ITERATION: &str = "iteration";
/// Timing phase covering slicing, matching and accumulation.
pub const PHASE_SLICING: &str = "slicing";
/// Timing phase covering the rigid fit and its application.
pub const PHASE_FIT: &str = "fit";

/// Lifecycle of a [`FistEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Configured, no iteration run yet.
    Initialized,
    /// At least one iteration run, not finished.
    Iterating,
    /// The last increment was below every tolerance.
    Converged,
    /// The iteration cap was hit before convergence.
    MaxIterationsReached,
}

impl EngineState {
    /// Whether the engine refuses further steps.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineState::Converged | EngineState::MaxIterationsReached
        )
    }

    fn name(&self) -> &'static str {
        match self {
            EngineState::Initialized => "initialized",
            EngineState::Iterating => "iterating",
            EngineState::Converged => "converged",
            EngineState::MaxIterationsReached => "max iterations reached",
        }
    }
}

/// What happened during one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// Zero-based iteration number.
    pub iteration: usize,
    /// Transform applied to the working source in this iteration.
    pub increment: RigidTransform,
    /// Angle of the incremental rotation, in radians.
    pub rotation_change: f64,
    /// Norm of the incremental translation.
    pub translation_change: f64,
    /// Distance of the incremental scale from `1`.
    pub scale_change: f64,
    /// Mean squared 1d transport cost over all the matched pairs of the
    /// iteration.
    pub sliced_distance: f64,
    /// Number of source points matched in at least one slice.
    pub num_matched: usize,
    /// The rigid fit was degenerate and the increment is the identity.
    pub degenerate: bool,
    /// State of the engine after the iteration.
    pub state: EngineState,
}

// result of the slices handled by one parallel task
struct ChunkResult {
    aggregator: DisplacementAggregator,
    cost: f64,
    num_pairs: usize,
}

/// Fast Iterative Sliced Transport registration of a source cloud onto a
/// target cloud.
///
/// ```
/// use spot_3d::pointcloud::PointCloud;
/// use spot_3d::rigid::RigidTransform;
/// use spot_fist::{EngineState, FistEngine, FistParams};
///
/// let source = PointCloud::new(
///     (0..64)
///         .map(|i| [(i % 4) as f64, ((i / 4) % 4) as f64 * 0.7, (i / 16) as f64 * 0.4])
///         .collect(),
/// );
/// let target = source.transformed(&RigidTransform::new(
///     [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
///     [0.1, 0.0, -0.1],
/// ));
///
/// let params = FistParams { num_directions: 32, seed: Some(1), ..Default::default() };
/// let mut engine = FistEngine::new(source, target, params).unwrap();
/// let state = engine.run().unwrap();
/// assert!(state.is_terminal());
/// ```
#[derive(Debug)]
pub struct FistEngine<T: Scalar = f64> {
    initial_source: PointCloud<T>,
    source: PointCloud<T>,
    target: PointCloud<T>,
    params: FistParams,
    initial_sampler: DirectionSampler,
    sampler: DirectionSampler,
    state: EngineState,
    transform: RigidTransform,
    iteration: usize,
    history: Vec<IterationReport>,
    timings: Option<TimingsLogger>,
}

impl<T: Scalar> FistEngine<T> {
    /// Create an engine registering `source` onto `target`.
    ///
    /// # Errors
    ///
    /// [`FistError::InvalidConfiguration`] when the parameters are invalid,
    /// one of the clouds is empty, or [`MatchingPolicy::Optimal`] would need
    /// more than [`MAX_OPTIMAL_CELLS`] table cells per slice.
    pub fn new(
        source: PointCloud<T>,
        target: PointCloud<T>,
        params: FistParams,
    ) -> Result<Self, FistError> {
        let sampler = DirectionSampler::new(params.seed_policy());
        Self::with_sampler(source, target, params, sampler)
    }

    /// Create an engine drawing its directions from `sampler`, which may
    /// already have been used, e.g. to synthesize the clouds.
    ///
    /// [`FistEngine::reset`] restores the sampler to the state it has here.
    /// An uninitialized sampler makes every [`FistEngine::step`] fail.
    ///
    /// # Errors
    ///
    /// Same as [`FistEngine::new`].
    pub fn with_sampler(
        source: PointCloud<T>,
        target: PointCloud<T>,
        params: FistParams,
        sampler: DirectionSampler,
    ) -> Result<Self, FistError> {
        params.validate()?;
        if source.is_empty() || target.is_empty() {
            return Err(FistError::InvalidConfiguration(format!(
                "point clouds must not be empty: source ({}), target ({})",
                source.len(),
                target.len()
            )));
        }

        if params.policy == MatchingPolicy::Optimal {
            let cells = optimal_table_cells(source.len(), target.len(), params.ratio);
            if cells > MAX_OPTIMAL_CELLS {
                return Err(FistError::InvalidConfiguration(format!(
                    "optimal matching of {} source and {} target points with ratio {} \
                     needs {cells} table cells per slice, more than {MAX_OPTIMAL_CELLS}",
                    source.len(),
                    target.len(),
                    params.ratio
                )));
            }
        }

        log::debug!(
            "FIST engine: {} source points, {} target points, {:?}",
            source.len(),
            target.len(),
            params.seed_policy()
        );

        Ok(Self {
            initial_source: source.clone(),
            source,
            target,
            params,
            initial_sampler: sampler.clone(),
            sampler,
            state: EngineState::Initialized,
            transform: RigidTransform::identity(),
            iteration: 0,
            history: Vec::new(),
            timings: None,
        })
    }

    /// Record phase timings from now on, or stop recording them.
    pub fn enable_timings(&mut self, enable: bool) {
        self.timings = if enable {
            Some(self.timings.take().unwrap_or_default())
        } else {
            None
        };
    }

    /// Run one iteration.
    ///
    /// # Errors
    ///
    /// * [`FistError::Terminated`] when the engine already converged or hit the
    ///   iteration cap.
    /// * [`FistError::Sampler`] when no direction can be drawn.
    pub fn step(&mut self) -> Result<IterationReport, FistError> {
        if self.state.is_terminal() {
            return Err(FistError::Terminated(self.state.name()));
        }
        self.state = EngineState::Iterating;

        let iteration_phase = self.timings.as_ref().map(|t| t.start(PHASE_ITERATION));

        let directions = self.sampler.directions(self.params.num_directions)?;

        let (aggregator, cost, num_pairs) = {
            let _phase = self.timings.as_ref().map(|t| t.start(PHASE_SLICING));
            self.slice_all(&directions)
        };

        let fit_phase = self.timings.as_ref().map(|t| t.start(PHASE_FIT));
        let displacements = aggregator.finalize();
        let source_points = self.source.to_f64_points();
        let pseudo_targets = displacements.pseudo_targets(&self.source);

        let (increment, degenerate) = match fit_transformation(
            &source_points,
            &pseudo_targets,
            &displacements.weights(),
            self.params.estimate_scale,
        ) {
            Ok(increment) => (increment, false),
            Err(RigidFitError::DegenerateInput(reason)) => {
                log::warn!(
                    "iteration {}: degenerate fit, keeping the previous transform ({reason})",
                    self.iteration
                );
                (RigidTransform::identity(), true)
            }
            Err(e) => return Err(e.into()),
        };

        if !degenerate {
            self.source.transform_inplace(&increment);
            self.transform = increment.compose(&self.transform);
        }
        drop(fit_phase);

        let rotation_change = increment.rotation_angle();
        let translation_change = norm3(&increment.translation);
        let scale_change = (increment.scale - 1.0).abs();
        let converged = !degenerate
            && rotation_change < self.params.rotation_tolerance
            && translation_change < self.params.translation_tolerance
            && (!self.params.estimate_scale || scale_change < self.params.scale_tolerance);

        self.iteration += 1;
        self.state = if converged {
            EngineState::Converged
        } else if self.iteration >= self.params.max_iterations {
            EngineState::MaxIterationsReached
        } else {
            EngineState::Iterating
        };

        let report = IterationReport {
            iteration: self.iteration - 1,
            increment,
            rotation_change,
            translation_change,
            scale_change,
            sliced_distance: if num_pairs > 0 {
                cost / num_pairs as f64
            } else {
                0.0
            },
            num_matched: displacements.num_matched(),
            degenerate,
            state: self.state,
        };

        log::debug!(
            "Iteration: {} rotation change: {:e} translation change: {:e} sliced distance: {:e}",
            report.iteration,
            rotation_change,
            translation_change,
            report.sliced_distance
        );
        if converged {
            log::debug!("FIST converged in {} iterations", self.iteration);
        }

        drop(iteration_phase);
        self.history.push(report.clone());

        Ok(report)
    }

    // slices the directions in fixed-size chunks and reduces the chunks in
    // order, so the sums do not depend on the number of threads
    fn slice_all(&self, directions: &[Direction]) -> (DisplacementAggregator, f64, usize) {
        let num_source = self.source.len();
        let chunks = directions
            .par_chunks(self.params.directions_per_chunk)
            .map(|chunk| {
                let mut result = ChunkResult {
                    aggregator: DisplacementAggregator::new(num_source),
                    cost: 0.0,
                    num_pairs: 0,
                };
                let mut source_proj = Vec::with_capacity(num_source);
                let mut target_proj = Vec::with_capacity(self.target.len());
                for direction in chunk {
                    project_into(&self.source, direction, &mut source_proj);
                    project_into(&self.target, direction, &mut target_proj);
                    let matches = match_sorted(
                        &source_proj,
                        &target_proj,
                        self.params.ratio,
                        self.params.policy,
                    );
                    result.cost += matches.iter().map(|m| m.cost()).sum::<f64>();
                    result.num_pairs += matches.len();
                    result.aggregator.accumulate(&matches, direction);
                }
                result
            })
            .collect::<Vec<_>>();

        let mut aggregator = DisplacementAggregator::new(num_source);
        let mut cost = 0.0;
        let mut num_pairs = 0;
        for chunk in &chunks {
            aggregator.merge(&chunk.aggregator);
            cost += chunk.cost;
            num_pairs += chunk.num_pairs;
        }
        (aggregator, cost, num_pairs)
    }

    /// Iterate until convergence or the iteration cap.
    pub fn run(&mut self) -> Result<EngineState, FistError> {
        self.run_with_callback(|_| ControlFlow::Continue(()))
    }

    /// Iterate until convergence, the iteration cap, or until `callback`
    /// breaks.
    ///
    /// The callback sees the report of every iteration. A break stops the
    /// run at the iteration boundary and leaves the engine resumable.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EngineState, FistError>
    where
        F: FnMut(&IterationReport) -> ControlFlow<()>,
    {
        loop {
            let report = self.step()?;
            if callback(&report).is_break() || report.state.is_terminal() {
                return Ok(self.state);
            }
        }
    }

    /// Restore the initial source cloud, the identity transform and the
    /// initial random state.
    pub fn reset(&mut self) {
        self.source = self.initial_source.clone();
        self.sampler = self.initial_sampler.clone();
        self.state = EngineState::Initialized;
        self.transform = RigidTransform::identity();
        self.iteration = 0;
        self.history.clear();
        if let Some(timings) = &self.timings {
            timings.reset();
        }
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Cumulative transform from the initial source to its current position.
    pub fn transform(&self) -> &RigidTransform {
        &self.transform
    }

    /// Cumulative rotation.
    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        self.transform.matrix()
    }

    /// Cumulative translation.
    pub fn translation(&self) -> &[f64; 3] {
        self.transform.translation()
    }

    /// Cumulative scale.
    pub fn scale(&self) -> f64 {
        self.transform.scale()
    }

    /// Number of iterations run since creation or the last reset.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    /// The working copy of the source, moved by the cumulative transform.
    pub fn source(&self) -> &PointCloud<T> {
        &self.source
    }

    /// The target cloud.
    pub fn target(&self) -> &PointCloud<T> {
        &self.target
    }

    /// Parameters of the run.
    pub fn params(&self) -> &FistParams {
        &self.params
    }

    /// Reports of every iteration run so far.
    pub fn history(&self) -> &[IterationReport] {
        &self.history
    }

    /// Recorded timings, if enabled.
    pub fn timings(&self) -> Option<&TimingsLogger> {
        self.timings.as_ref()
    }

    /// Take the recorded timings out of the engine.
    pub fn take_timings(&mut self) -> Option<TimingsLogger> {
        self.timings.take()
    }
}
