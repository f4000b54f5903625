//! Session configuration.
//!
//! Defaults mirror a typical eye-in-hand setup with an AR marker as fiducial.

use std::path::PathBuf;
use std::time::Duration;

use handeye_solver::TsaiLenzOptions;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Names of the four frames involved in a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameNames {
    /// Robot base frame (parent of the robot chain lookup).
    pub robot_base: String,
    /// Robot end-effector frame (child of the robot chain lookup).
    pub robot_effector: String,
    /// Camera frame (child of the camera chain lookup).
    pub camera: String,
    /// Fiducial frame (parent of the camera chain lookup).
    pub fiducial: String,
}

impl Default for FrameNames {
    fn default() -> Self {
        Self {
            robot_base: "/base_link".to_string(),
            robot_effector: "/ee_fixed_link".to_string(),
            camera: "/camera_2_link".to_string(),
            fiducial: "/camera_2/ar_marker_0".to_string(),
        }
    }
}

/// Configuration for a calibration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub frames: FrameNames,

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────
    /// Record file rewritten after every capture.
    pub record_file: PathBuf,
    /// Record file read in load-and-calibrate mode.
    pub load_file: PathBuf,
    /// Calibration result file.
    pub result_file: PathBuf,
    /// Skip interactive capture: load `load_file` and calibrate immediately.
    pub load_transforms_from_file: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Capture loop
    // ─────────────────────────────────────────────────────────────────────────
    /// Bounded wait for each pose lookup (milliseconds).
    pub lookup_timeout_ms: u64,
    /// Delay between command polls (milliseconds).
    pub poll_interval_ms: u64,
    /// Motion pairs below which finalizing only warns.
    pub min_motions: usize,

    pub solver: TsaiLenzOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frames: FrameNames::default(),
            record_file: PathBuf::from("TransformPairsInput.json"),
            load_file: PathBuf::from("TransformPairsOutput.json"),
            result_file: PathBuf::from("CalibratedTransform.json"),
            load_transforms_from_file: false,
            lookup_timeout_ms: 10_000,
            poll_interval_ms: 100, // 10 Hz
            min_motions: 5,
            solver: TsaiLenzOptions::default(),
        }
    }
}

impl SessionConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configurations the session cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let frames = [
            ("robot_base", &self.frames.robot_base),
            ("robot_effector", &self.frames.robot_effector),
            ("camera", &self.frames.camera),
            ("fiducial", &self.frames.fiducial),
        ];
        for (name, value) in frames {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "frame name `{name}` is empty"
                )));
            }
        }
        let files = [
            ("record_file", &self.record_file),
            ("load_file", &self.load_file),
            ("result_file", &self.result_file),
        ];
        for (name, path) in files {
            if path.as_os_str().is_empty() {
                return Err(PipelineError::InvalidConfig(format!("`{name}` is empty")));
            }
        }
        if self.solver.min_motion_angle_deg < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "min_motion_angle_deg must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
