use std::time::Duration;

use spot_3d::pointcloud::PointCloud;
use spot_3d::rigid::RigidTransform;

use crate::engine::{EngineState, FistEngine, IterationReport, PHASE_ITERATION};
use crate::error::FistError;
use crate::params::FistParams;
use crate::sampler::DirectionSampler;
use crate::timings::TimingsLogger;

pub use crate::reproducibility::{reproducible_runs_enabled, set_enable_reproducible_runs};

/// Offset, in units of the radius, of the box holding the random target.
pub const RANDOM_TARGET_OFFSET: [f64; 3] = [4.0, 6.0, 8.0];

/// A ready-to-run registration problem.
///
/// Points are stored in single precision. The source and target clouds are
/// never modified; every call to [`FistRegistration::compute_transformation`]
/// starts again from the identity with the same random state.
///
/// Random clouds and the directions of their registration come from one
/// stream: the engine continues the sampler where the cloud synthesis left
/// it.
///
/// ```
/// use spot_fist::FistRegistration;
///
/// let mut registration = FistRegistration::random_point_clouds(70, 100, 1.0).unwrap();
/// registration.set_maximum_iterations(5);
/// registration.set_maximum_directions(16);
/// registration.compute_transformation(false).unwrap();
/// let translation = registration.translation();
/// assert!(translation[2] > 0.0);
/// ```
#[derive(Debug)]
pub struct FistRegistration {
    source: PointCloud<f32>,
    target: PointCloud<f32>,
    params: FistParams,
    known: Option<RigidTransform>,
    computed: RigidTransform,
    registered: Option<PointCloud<f32>>,
    state: Option<EngineState>,
    history: Vec<IterationReport>,
    timings: Option<TimingsLogger>,
    sampler: Option<DirectionSampler>,
}

/// Fill two boxes with uniform points drawn from `sampler`: `num_source`
/// points in `[0, radius)³`, then `num_target` points in the same box moved
/// by [`RANDOM_TARGET_OFFSET`] times the radius.
pub fn random_boxes(
    sampler: &mut DirectionSampler,
    num_source: usize,
    num_target: usize,
    radius: f64,
) -> Result<(PointCloud<f32>, PointCloud<f32>), FistError> {
    let mut draw = |offset: [f64; 3]| -> Result<[f32; 3], FistError> {
        Ok([
            ((sampler.uniform()? + offset[0]) * radius) as f32,
            ((sampler.uniform()? + offset[1]) * radius) as f32,
            ((sampler.uniform()? + offset[2]) * radius) as f32,
        ])
    };
    let source = (0..num_source)
        .map(|_| draw([0.0; 3]))
        .collect::<Result<Vec<_>, _>>()?;
    let target = (0..num_target)
        .map(|_| draw(RANDOM_TARGET_OFFSET))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((PointCloud::new(source), PointCloud::new(target)))
}

impl FistRegistration {
    /// Register `source` onto `target` with the default parameters.
    pub fn from_point_clouds(
        source: PointCloud<f32>,
        target: PointCloud<f32>,
    ) -> Result<Self, FistError> {
        Self::with_params(source, target, FistParams::default())
    }

    /// Register `source` onto `target` with explicit parameters.
    pub fn with_params(
        source: PointCloud<f32>,
        target: PointCloud<f32>,
        params: FistParams,
    ) -> Result<Self, FistError> {
        params.validate()?;
        if source.is_empty() || target.is_empty() {
            return Err(FistError::InvalidConfiguration(format!(
                "point clouds must not be empty: source ({}), target ({})",
                source.len(),
                target.len()
            )));
        }
        Ok(Self {
            source,
            target,
            params,
            known: None,
            computed: RigidTransform::identity(),
            registered: None,
            state: None,
            history: Vec::new(),
            timings: None,
            sampler: None,
        })
    }

    /// Two random clouds: `num_source` points uniform in `[0, radius)³` and
    /// `num_target` points uniform in the same box moved by
    /// [`RANDOM_TARGET_OFFSET`] times the radius. `ratio` is the match ratio.
    pub fn random_point_clouds(
        num_source: usize,
        num_target: usize,
        ratio: f64,
    ) -> Result<Self, FistError> {
        Self::random_point_clouds_with_params(
            num_source,
            num_target,
            FistParams {
                ratio,
                ..Default::default()
            },
        )
    }

    /// Same as [`FistRegistration::random_point_clouds`] with explicit
    /// parameters; the radius and the seed are taken from `params`.
    pub fn random_point_clouds_with_params(
        num_source: usize,
        num_target: usize,
        params: FistParams,
    ) -> Result<Self, FistError> {
        params.validate()?;
        let mut sampler = DirectionSampler::new(params.seed_policy());
        let (source, target) = random_boxes(&mut sampler, num_source, num_target, params.radius)?;

        let mut registration = Self::with_params(source, target, params)?;
        registration.sampler = Some(sampler);
        Ok(registration)
    }

    /// The target is a copy of `points` moved by a known similarity
    /// `p -> scale * rotation * p + translation`.
    pub fn same_model(
        points: PointCloud<f32>,
        rotation: [[f64; 3]; 3],
        translation: [f64; 3],
        scale: f64,
    ) -> Result<Self, FistError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(FistError::InvalidConfiguration(format!(
                "scale must be a finite positive number, got {scale}"
            )));
        }
        let known = RigidTransform::with_scale(rotation, translation, scale);
        let target = points.transformed(&known);
        let mut registration = Self::from_point_clouds(points, target)?;
        registration.known = Some(known);
        Ok(registration)
    }

    /// Run the registration. With `enable_timings` the phase timings are
    /// recorded and logged at the end.
    pub fn compute_transformation(&mut self, enable_timings: bool) -> Result<(), FistError> {
        let (source, target, params) =
            (self.source.clone(), self.target.clone(), self.params.clone());
        let mut engine = match &self.sampler {
            Some(sampler) => FistEngine::with_sampler(source, target, params, sampler.clone())?,
            None => FistEngine::new(source, target, params)?,
        };
        engine.enable_timings(enable_timings);

        let state = engine.run()?;
        log::info!(
            "Registration done: {} iterations, {:?}",
            engine.iterations(),
            state
        );

        self.computed = *engine.transform();
        self.state = Some(state);
        self.history = engine.history().to_vec();
        self.timings = engine.take_timings();
        self.registered = Some(engine.source().clone());

        if enable_timings {
            self.print_timings(
                &format!(
                    "After registering {} to {} points, transformation is:",
                    self.source.len(),
                    self.target.len()
                ),
                "[Final transformation] ",
            );
        }
        Ok(())
    }

    /// Draw the directions of the next runs from `sampler` instead of a
    /// sampler seeded from the parameters.
    ///
    /// Pass the sampler that synthesized the clouds so that the directions
    /// continue its stream rather than replay it.
    pub fn set_sampler(&mut self, sampler: DirectionSampler) {
        self.sampler = Some(sampler);
    }

    /// Set the iteration cap.
    pub fn set_maximum_iterations(&mut self, max_iterations: usize) {
        log::debug!(
            "maximum iterations: {} -> {}",
            self.params.max_iterations,
            max_iterations
        );
        self.params.max_iterations = max_iterations;
    }

    /// Set the number of directions drawn per iteration.
    pub fn set_maximum_directions(&mut self, num_directions: usize) {
        log::debug!(
            "maximum directions: {} -> {}",
            self.params.num_directions,
            num_directions
        );
        self.params.num_directions = num_directions;
    }

    /// Parameters used by the next run.
    pub fn params(&self) -> &FistParams {
        &self.params
    }

    /// Mutable access to the parameters of the next run.
    pub fn params_mut(&mut self) -> &mut FistParams {
        &mut self.params
    }

    /// The computed transform.
    pub fn transform(&self) -> &RigidTransform {
        &self.computed
    }

    /// The computed rotation.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        self.computed.rotation
    }

    /// The computed translation.
    pub fn translation(&self) -> [f64; 3] {
        self.computed.translation
    }

    /// The computed scale; `1.0` unless scale estimation is enabled.
    pub fn scaling(&self) -> f64 {
        self.computed.scale
    }

    /// The computed transform as a homogeneous matrix.
    pub fn matrix4(&self) -> [[f64; 4]; 4] {
        self.computed.matrix4()
    }

    /// Final state of the last run, if any.
    pub fn state(&self) -> Option<EngineState> {
        self.state
    }

    /// Iteration reports of the last run.
    pub fn history(&self) -> &[IterationReport] {
        &self.history
    }

    /// The transform applied to build the target, for [`FistRegistration::same_model`].
    pub fn known_transform(&self) -> Option<&RigidTransform> {
        self.known.as_ref()
    }

    /// The known rotation, identity when there is none.
    pub fn known_matrix(&self) -> [[f64; 3]; 3] {
        self.known.unwrap_or_default().rotation
    }

    /// The known translation, zero when there is none.
    pub fn known_translation(&self) -> [f64; 3] {
        self.known.unwrap_or_default().translation
    }

    /// The known scale, one when there is none.
    pub fn known_scaling(&self) -> f64 {
        self.known.unwrap_or_default().scale
    }

    /// The source cloud.
    pub fn source_point_cloud(&self) -> &PointCloud<f32> {
        &self.source
    }

    /// The target cloud.
    pub fn target_point_cloud(&self) -> &PointCloud<f32> {
        &self.target
    }

    /// The source moved by the last computed transform.
    pub fn registered_point_cloud(&self) -> Option<&PointCloud<f32>> {
        self.registered.as_ref()
    }

    /// Number of source points.
    pub fn source_size(&self) -> usize {
        self.source.len()
    }

    /// Number of target points.
    pub fn target_size(&self) -> usize {
        self.target.len()
    }

    /// Timings of the last run, if they were enabled.
    pub fn timings(&self) -> Option<&TimingsLogger> {
        self.timings.as_ref()
    }

    /// Log the timings of the last run.
    pub fn print_timings(&self, message: &str, prefix: &str) {
        match &self.timings {
            Some(timings) => timings.print_timings(message, prefix),
            None => log::warn!("no timings recorded"),
        }
    }

    /// Sum of the iteration times of the last run; zero without timings.
    pub fn total_running_time(&self) -> Duration {
        self.timings
            .as_ref()
            .map(|t| t.total_running_time(PHASE_ITERATION))
            .unwrap_or_default()
    }

    /// Duration of iteration `lap` of the last run; zero when unknown.
    pub fn running_time(&self, lap: usize) -> Duration {
        self.timings
            .as_ref()
            .and_then(|t| t.lap(PHASE_ITERATION, lap))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_random_point_clouds_layout() -> Result<(), Box<dyn std::error::Error>> {
        let registration = FistRegistration::random_point_clouds(70, 100, 0.5)?;
        assert_eq!(registration.source_size(), 70);
        assert_eq!(registration.target_size(), 100);
        assert_relative_eq!(registration.params().ratio, 0.5);

        let source_min = registration.source_point_cloud().min_bound();
        let source_max = registration.source_point_cloud().max_bound();
        let target_min = registration.target_point_cloud().min_bound();
        let target_max = registration.target_point_cloud().max_bound();
        for k in 0..3 {
            assert!(source_min[k] >= 0.0 && source_max[k] <= 1.0);
            assert!(target_min[k] >= RANDOM_TARGET_OFFSET[k]);
            assert!(target_max[k] <= RANDOM_TARGET_OFFSET[k] + 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_ratio() {
        let res = FistRegistration::random_point_clouds(10, 10, 0.0);
        assert!(matches!(res, Err(FistError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_known_transform() -> Result<(), Box<dyn std::error::Error>> {
        let points = PointCloud::new(vec![[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let registration = FistRegistration::same_model(
            points,
            [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            [1.0, 2.0, 3.0],
            2.0,
        )?;
        assert_eq!(registration.known_scaling(), 2.0);
        assert_eq!(registration.known_translation(), [1.0, 2.0, 3.0]);
        assert_eq!(registration.target_point_cloud().point_f64(1), [1.0, 4.0, 3.0]);
        assert!(registration.state().is_none());
        assert_eq!(registration.total_running_time(), Duration::ZERO);
        Ok(())
    }

    #[test]
    fn test_setters_are_validated_at_run() -> Result<(), Box<dyn std::error::Error>> {
        let mut registration = FistRegistration::random_point_clouds(20, 20, 1.0)?;
        registration.set_maximum_directions(0);
        assert!(matches!(
            registration.compute_transformation(false),
            Err(FistError::InvalidConfiguration(_))
        ));
        Ok(())
    }

    #[test]
    fn test_random_clouds_and_directions_share_one_stream() -> Result<(), Box<dyn std::error::Error>>
    {
        let params = FistParams {
            num_directions: 16,
            max_iterations: 1,
            seed: Some(5),
            ..Default::default()
        };
        let mut registration =
            FistRegistration::random_point_clouds_with_params(30, 40, params.clone())?;
        registration.compute_transformation(false)?;

        let mut sampler = DirectionSampler::new(params.seed_policy());
        let (source, target) = random_boxes(&mut sampler, 30, 40, params.radius)?;
        assert_eq!(&source, registration.source_point_cloud());
        assert_eq!(&target, registration.target_point_cloud());

        let mut shared =
            FistEngine::with_sampler(source.clone(), target.clone(), params.clone(), sampler)?;
        shared.run()?;
        assert_eq!(registration.transform(), shared.transform());

        // restarting the stream would reuse the uniforms of the source points
        let mut restarted = FistEngine::new(source, target, params)?;
        restarted.run()?;
        assert_ne!(registration.transform(), restarted.transform());

        // a second run starts from the same random state
        let first = *registration.transform();
        registration.compute_transformation(false)?;
        assert_eq!(&first, registration.transform());
        Ok(())
    }

    #[test]
    fn test_set_sampler_drives_the_engine() -> Result<(), Box<dyn std::error::Error>> {
        let mut sampler = DirectionSampler::new(crate::reproducibility::SeedPolicy::Fixed(8));
        let (points, _) = random_boxes(&mut sampler, 40, 0, 1.0)?;
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

        let mut registration =
            FistRegistration::same_model(points.clone(), identity, [0.1, 0.0, 0.0], 1.0)?;
        registration.set_maximum_iterations(1);
        registration.set_sampler(sampler.clone());
        registration.compute_transformation(false)?;

        let mut engine = FistEngine::with_sampler(
            points,
            registration.target_point_cloud().clone(),
            registration.params().clone(),
            sampler,
        )?;
        engine.run()?;
        assert_eq!(registration.transform(), engine.transform());
        Ok(())
    }
}
