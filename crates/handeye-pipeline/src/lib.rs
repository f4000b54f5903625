//! Transform-pair acquisition pipeline for hand-eye calibration.
//!
//! Poses of the robot chain (`base_se3_effector`) and of the camera chain
//! (`fiducial_se3_camera`) are captured in pairs, reduced to motions relative
//! to the first pair, persisted after every change and finally handed to a
//! [`handeye_solver::HandEyeSolver`].
//!
//! ```no_run
//! use handeye_pipeline::{ReplayPoseSource, ScriptedCommands, SessionConfig, SessionController};
//! use handeye_solver::TsaiLenzSolver;
//! # fn main() -> anyhow::Result<()> {
//! let config = SessionConfig::default();
//! let poses = ReplayPoseSource::from_json_file("poses.json".as_ref())?;
//! let solver = TsaiLenzSolver::new(config.solver);
//! let mut controller = SessionController::new(config, poses, solver);
//! let result = controller.run(&mut ScriptedCommands::parse("ssssssq"))?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pose_source;
pub mod reducer;
pub mod report;
pub mod session;
pub mod store;

pub use codec::{read_pairs, read_result, write_pairs, write_result, ResultFile};
pub use config::{FrameNames, SessionConfig};
pub use error::{PipelineError, PoseLookupError};
pub use orchestrator::{CalibrationOrchestrator, CalibrationResult};
pub use pose_source::{
    ChannelPoseSource, PoseSource, ReplayPoseSource, StampedTransform, StaticPoseSource,
};
pub use reducer::{reduce, ReducedMotions, Reference};
pub use report::CalibrationReport;
pub use session::{
    calibrate_from_file, Command, CommandSource, ReaderCommands, ScriptedCommands, Session,
    SessionController, SessionState, StepOutcome,
};
pub use store::{Appended, TransformPairStore};
