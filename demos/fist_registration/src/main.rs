use argh::FromArgs;
use serde::Serialize;
use std::path::{Path, PathBuf};

use spot::fist::sampler::DirectionSampler;
use spot::fist::wrappers::random_boxes;
use spot::fist::{self, FistParams, FistRegistration};
use spot::s3d::transforms::axis_angle_to_rotation_matrix;

#[derive(FromArgs)]
/// Example of FIST registration on synthetic point clouds
struct Args {
    /// path to a json file with the registration parameters
    #[argh(option)]
    config: Option<PathBuf>,

    /// number of source points
    #[argh(option, default = "700")]
    num_source: usize,

    /// number of target points
    #[argh(option, default = "1000")]
    num_target: usize,

    /// match ratio, overrides the config
    #[argh(option)]
    ratio: Option<f64>,

    /// maximum number of iterations, overrides the config
    #[argh(option)]
    iterations: Option<usize>,

    /// number of directions per iteration, overrides the config
    #[argh(option)]
    directions: Option<usize>,

    /// register the source onto a copy of itself rotated by this angle (radians)
    /// around the z axis, instead of a random target
    #[argh(option)]
    same_model_angle: Option<f64>,

    /// use a fresh random seed on every run
    #[argh(switch)]
    non_reproducible: bool,

    /// record and print the timings
    #[argh(switch)]
    timings: bool,

    /// write the result as json to this path instead of stdout
    #[argh(option)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct RegistrationOutput {
    source_size: usize,
    target_size: usize,
    iterations: usize,
    state: String,
    matrix: [[f64; 4]; 4],
    scaling: f64,
    known_matrix: Option<[[f64; 3]; 3]>,
    total_running_time_ms: f64,
}

fn load_params(path: &Path) -> Result<FistParams, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    let params: FistParams = serde_json::from_reader(std::io::BufReader::new(file))?;
    params.validate()?;
    Ok(params)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    fist::set_enable_reproducible_runs(!args.non_reproducible);

    let mut params = match &args.config {
        Some(path) => load_params(path)?,
        None => FistParams::default(),
    };
    if let Some(ratio) = args.ratio {
        params.ratio = ratio;
    }
    if let Some(iterations) = args.iterations {
        params.max_iterations = iterations;
    }
    if let Some(directions) = args.directions {
        params.num_directions = directions;
    }
    log::debug!("params: {:?}", params);

    let mut registration = match args.same_model_angle {
        Some(angle) => {
            params.validate()?;
            let mut sampler = DirectionSampler::new(params.seed_policy());
            let (points, _) = random_boxes(&mut sampler, args.num_source, 0, params.radius)?;
            let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], angle)?;
            let mut registration =
                FistRegistration::same_model(points, rotation, [0.1, -0.1, 0.2], 1.0)?;
            *registration.params_mut() = params;
            registration.set_sampler(sampler);
            registration
        }
        None => FistRegistration::random_point_clouds_with_params(
            args.num_source,
            args.num_target,
            params,
        )?,
    };
    println!(
        "Source cloud: #{} points, target cloud: #{} points",
        registration.source_size(),
        registration.target_size()
    );

    registration.compute_transformation(args.timings)?;

    let output = RegistrationOutput {
        source_size: registration.source_size(),
        target_size: registration.target_size(),
        iterations: registration.history().len(),
        state: format!("{:?}", registration.state()),
        matrix: registration.matrix4(),
        scaling: registration.scaling(),
        known_matrix: registration.known_transform().map(|t| t.rotation),
        total_running_time_ms: registration.total_running_time().as_secs_f64() * 1e3,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match args.output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
