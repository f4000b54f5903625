//! Calibration step: check the motion lists and run the solver.
//!
//! Robot and camera motions must have equal length; the solver's anyhow error
//! is wrapped in [`PipelineError::Solver`].

use handeye_core::{Iso3, RelativeMotion};
use handeye_solver::{HandEyeSolver, SolverReport};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Solved end-effector → camera transform with solver diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub effector_se3_camera: Iso3,
    pub report: SolverReport,
}

/// Validates motion lists and hands them to a [`HandEyeSolver`].
#[derive(Debug, Clone, Default)]
pub struct CalibrationOrchestrator<S> {
    solver: S,
}

impl<S: HandEyeSolver> CalibrationOrchestrator<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Run the solver on index-aligned motion lists.
    ///
    /// Mismatched lengths are an internal defect and reported as
    /// [`PipelineError::DataInconsistency`]. Minimum-count policy is left to
    /// the caller.
    pub fn estimate(
        &self,
        robot: &[RelativeMotion],
        camera: &[RelativeMotion],
    ) -> Result<CalibrationResult, PipelineError> {
        if robot.len() != camera.len() {
            return Err(PipelineError::DataInconsistency(format!(
                "{} robot motions vs {} camera motions",
                robot.len(),
                camera.len()
            )));
        }

        let solution = self
            .solver
            .solve(robot, camera)
            .map_err(PipelineError::Solver)?;
        info!("calibration finished: {}", solution.report.brief());

        Ok(CalibrationResult {
            effector_se3_camera: solution.transform,
            report: solution.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use handeye_solver::{HandEyeSolution, TerminationType};
    use std::cell::Cell;

    struct CountingSolver {
        calls: Cell<usize>,
    }

    impl HandEyeSolver for CountingSolver {
        fn solve(
            &self,
            robot: &[RelativeMotion],
            _camera: &[RelativeMotion],
        ) -> anyhow::Result<HandEyeSolution> {
            self.calls.set(self.calls.get() + 1);
            if robot.is_empty() {
                bail!("nothing to solve");
            }
            Ok(HandEyeSolution {
                transform: Iso3::identity(),
                report: SolverReport {
                    initial_cost: 1.0,
                    final_cost: 0.0,
                    termination: TerminationType::Convergence,
                    message: "stub".to_string(),
                    num_successful_steps: 1,
                    num_unsuccessful_steps: 0,
                },
            })
        }
    }

    fn orchestrator() -> CalibrationOrchestrator<CountingSolver> {
        CalibrationOrchestrator::new(CountingSolver {
            calls: Cell::new(0),
        })
    }

    #[test]
    fn mismatched_lengths_never_reach_solver() {
        let orch = orchestrator();
        let err = orch
            .estimate(&[RelativeMotion::default()], &[])
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataInconsistency(_)));
        assert_eq!(orch.solver().calls.get(), 0);
    }

    #[test]
    fn solver_failure_is_wrapped() {
        let orch = orchestrator();
        let err = orch.estimate(&[], &[]).unwrap_err();
        assert!(matches!(err, PipelineError::Solver(_)));
        assert!(err.to_string().contains("nothing to solve"));
    }

    #[test]
    fn solution_is_wrapped_into_result() {
        let orch = orchestrator();
        let motions = [RelativeMotion::default(); 2];
        let result = orch.estimate(&motions, &motions).unwrap();
        assert_eq!(result.effector_se3_camera, Iso3::identity());
        assert_eq!(result.report.termination, TerminationType::Convergence);
    }
}
