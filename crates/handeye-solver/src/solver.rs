use anyhow::Result;
use handeye_core::{Iso3, Real, RelativeMotion};
use log::info;
use serde::{Deserialize, Serialize};

use crate::linear::{build_motion_pairs, estimate_handeye_linear};
use crate::refine::{cost, refine_handeye, RefineOptions};

/// How the solver run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationType {
    /// The optimizer met one of its convergence criteria.
    Convergence,
    /// The optimizer stopped without meeting a convergence criterion.
    NoConvergence,
    /// Only the closed-form estimate was computed.
    LinearOnly,
}

impl std::fmt::Display for TerminationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationType::Convergence => write!(f, "CONVERGENCE"),
            TerminationType::NoConvergence => write!(f, "NO_CONVERGENCE"),
            TerminationType::LinearOnly => write!(f, "LINEAR_ONLY"),
        }
    }
}

/// Convergence diagnostics of a solver run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    /// Cost `0.5 * ||r||²` at the initial estimate.
    pub initial_cost: Real,
    /// Cost at the returned estimate.
    pub final_cost: Real,
    pub termination: TerminationType,
    /// Backend-specific termination detail.
    pub message: String,
    /// Steps that decreased the cost.
    pub num_successful_steps: usize,
    /// Steps that were rejected.
    pub num_unsuccessful_steps: usize,
}

impl SolverReport {
    pub fn change_cost(&self) -> Real {
        self.initial_cost - self.final_cost
    }

    pub fn num_iterations(&self) -> usize {
        self.num_successful_steps + self.num_unsuccessful_steps
    }

    /// One-line summary in the spirit of a solver brief report.
    pub fn brief(&self) -> String {
        format!(
            "{}: initial cost {:.6e}, final cost {:.6e}, {} iterations ({} successful)",
            self.termination,
            self.initial_cost,
            self.final_cost,
            self.num_iterations(),
            self.num_successful_steps
        )
    }
}

/// Solver output: `effector_se3_camera` plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandEyeSolution {
    pub transform: Iso3,
    pub report: SolverReport,
}

/// AX = XB solver over index-aligned relative motions.
///
/// `robot[i]` and `camera[i]` are the robot-chain and camera-chain motions of
/// the same capture, both relative to the same reference capture.
pub trait HandEyeSolver {
    fn solve(&self, robot: &[RelativeMotion], camera: &[RelativeMotion])
        -> Result<HandEyeSolution>;
}

impl<S: HandEyeSolver + ?Sized> HandEyeSolver for Box<S> {
    fn solve(
        &self,
        robot: &[RelativeMotion],
        camera: &[RelativeMotion],
    ) -> Result<HandEyeSolution> {
        (**self).solve(robot, camera)
    }
}

/// Options for [`TsaiLenzSolver`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TsaiLenzOptions {
    /// Minimum rotation (degrees) for a motion pair to be used.
    pub min_motion_angle_deg: Real,
    /// Run Levenberg–Marquardt refinement after the linear estimate.
    pub refine: bool,
    pub refine_opts: RefineOptions,
}

impl Default for TsaiLenzOptions {
    fn default() -> Self {
        Self {
            min_motion_angle_deg: 1.0,
            refine: true,
            refine_opts: RefineOptions::default(),
        }
    }
}

/// Tsai–Lenz initialisation followed by optional LM refinement.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsaiLenzSolver {
    pub opts: TsaiLenzOptions,
}

impl TsaiLenzSolver {
    pub fn new(opts: TsaiLenzOptions) -> Self {
        Self { opts }
    }
}

impl HandEyeSolver for TsaiLenzSolver {
    fn solve(
        &self,
        robot: &[RelativeMotion],
        camera: &[RelativeMotion],
    ) -> Result<HandEyeSolution> {
        let pairs = build_motion_pairs(robot, camera, self.opts.min_motion_angle_deg)?;
        info!(
            "solving hand-eye from {} motions ({} usable pairs)",
            robot.len(),
            pairs.len()
        );
        let x0 = estimate_handeye_linear(&pairs)?;

        if !self.opts.refine {
            let c = cost(&pairs, &x0);
            return Ok(HandEyeSolution {
                transform: x0,
                report: SolverReport {
                    initial_cost: c,
                    final_cost: c,
                    termination: TerminationType::LinearOnly,
                    message: "refinement disabled".to_string(),
                    num_successful_steps: 0,
                    num_unsuccessful_steps: 0,
                },
            });
        }

        let (transform, report) = refine_handeye(&pairs, &x0, &self.opts.refine_opts);
        Ok(HandEyeSolution { transform, report })
    }
}
