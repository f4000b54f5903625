use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use handeye_pipeline::{
    calibrate_from_file, CalibrationReport, CalibrationResult, CommandSource, ReaderCommands,
    ReplayPoseSource, SessionConfig, SessionController,
};
use handeye_solver::TsaiLenzSolver;
use log::info;

/// Hand-eye calibration: capture robot/camera pose pairs and solve AX = XB.
#[derive(Debug, Parser)]
#[command(author, version, about = "Hand-eye calibration data collection and solve")]
struct Args {
    /// Optional path to a JSON SessionConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON list of recorded transforms replayed as the live pose source.
    #[arg(long)]
    poses: Option<PathBuf>,

    /// Calibrate from the load file instead of capturing interactively.
    #[arg(long)]
    load: bool,

    /// Record file read in load mode.
    #[arg(long)]
    load_file: Option<PathBuf>,

    /// Record file rewritten after every capture.
    #[arg(long)]
    record_file: Option<PathBuf>,

    /// Calibration result file.
    #[arg(long)]
    result_file: Option<PathBuf>,

    #[arg(long)]
    base_frame: Option<String>,

    #[arg(long)]
    effector_frame: Option<String>,

    #[arg(long)]
    camera_frame: Option<String>,

    #[arg(long)]
    fiducial_frame: Option<String>,

    /// Bounded wait per pose lookup, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip the Levenberg-Marquardt refinement.
    #[arg(long)]
    no_refine: bool,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn build_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => load_json_file::<SessionConfig>(path)?,
        None => SessionConfig::default(),
    };

    if args.load {
        config.load_transforms_from_file = true;
    }
    if let Some(path) = &args.load_file {
        config.load_file = path.clone();
    }
    if let Some(path) = &args.record_file {
        config.record_file = path.clone();
    }
    if let Some(path) = &args.result_file {
        config.result_file = path.clone();
    }
    let frames = &mut config.frames;
    if let Some(name) = &args.base_frame {
        frames.robot_base = name.clone();
    }
    if let Some(name) = &args.effector_frame {
        frames.robot_effector = name.clone();
    }
    if let Some(name) = &args.camera_frame {
        frames.camera = name.clone();
    }
    if let Some(name) = &args.fiducial_frame {
        frames.fiducial = name.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.lookup_timeout_ms = ms;
    }
    if args.no_refine {
        config.solver.refine = false;
    }

    config.validate()?;
    Ok(config)
}

fn run_interactive<C: CommandSource + ?Sized>(
    config: SessionConfig,
    poses_path: Option<&Path>,
    commands: &mut C,
) -> Result<Option<CalibrationResult>> {
    let poses_path = poses_path.context("--poses is required for interactive capture")?;
    let poses = ReplayPoseSource::from_json_file(poses_path)?;
    let solver = TsaiLenzSolver::new(config.solver);

    info!(
        "capturing {} -> {} and {} -> {}",
        config.frames.robot_base,
        config.frames.robot_effector,
        config.frames.fiducial,
        config.frames.camera
    );
    let mut controller = SessionController::new(config, poses, solver);
    Ok(controller.run(commands)?)
}

fn run(config: SessionConfig, poses_path: Option<&Path>) -> Result<Option<CalibrationResult>> {
    if config.load_transforms_from_file {
        let load_file = config.load_file.clone();
        let solver = TsaiLenzSolver::new(config.solver);
        let result = calibrate_from_file(config, solver)
            .with_context(|| format!("calibration from {} failed", load_file.display()))?;
        return Ok(Some(result));
    }

    let mut commands = ReaderCommands::new(io::stdin().lock());
    run_interactive(config, poses_path, &mut commands)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    let frames = config.frames.clone();

    if let Some(result) = run(config, args.poses.as_deref())? {
        println!("{}", CalibrationReport::new(&frames, &result));
    }
    Ok(())
}
