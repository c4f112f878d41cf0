use spot_fist::reproducibility::REPRODUCIBLE_SEED;
use spot_fist::sampler::DirectionSampler;
use spot_fist::{
    reproducible_runs_enabled, set_enable_reproducible_runs, FistParams, FistRegistration,
    SeedPolicy,
};

// the toggle is process-wide, so everything touching it lives in one test
#[test]
fn toggle_controls_the_seed_policy() -> Result<(), Box<dyn std::error::Error>> {
    assert!(reproducible_runs_enabled());
    assert_eq!(SeedPolicy::from_process(), SeedPolicy::Fixed(REPRODUCIBLE_SEED));

    set_enable_reproducible_runs(false);
    assert!(!reproducible_runs_enabled());
    assert_eq!(SeedPolicy::from_process(), SeedPolicy::Entropy);

    let a = DirectionSampler::new(SeedPolicy::from_process()).directions(8)?;
    let b = DirectionSampler::new(SeedPolicy::from_process()).directions(8)?;
    assert_ne!(a, b);

    // an explicit seed still gives reproducible clouds
    let params = FistParams {
        seed: Some(99),
        ..Default::default()
    };
    let first = FistRegistration::random_point_clouds_with_params(50, 60, params.clone())?;
    let second = FistRegistration::random_point_clouds_with_params(50, 60, params)?;
    assert_eq!(first.source_point_cloud(), second.source_point_cloud());

    let first = FistRegistration::random_point_clouds(50, 60, 1.0)?;
    let second = FistRegistration::random_point_clouds(50, 60, 1.0)?;
    assert_ne!(first.source_point_cloud(), second.source_point_cloud());

    set_enable_reproducible_runs(true);
    let first = FistRegistration::random_point_clouds(50, 60, 1.0)?;
    let second = FistRegistration::random_point_clouds(50, 60, 1.0)?;
    assert_eq!(first.source_point_cloud(), second.source_point_cloud());
    Ok(())
}
