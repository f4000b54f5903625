//! Human-readable calibration report.

use std::fmt;

use handeye_core::Iso3;

use crate::config::FrameNames;
use crate::orchestrator::CalibrationResult;

/// Formats a [`CalibrationResult`] for the terminal.
pub struct CalibrationReport<'a> {
    frames: &'a FrameNames,
    result: &'a CalibrationResult,
}

impl<'a> CalibrationReport<'a> {
    pub fn new(frames: &'a FrameNames, result: &'a CalibrationResult) -> Self {
        Self { frames, result }
    }
}

fn write_translation(f: &mut fmt::Formatter<'_>, x: &Iso3) -> fmt::Result {
    let t = x.translation.vector;
    writeln!(f, "Translation (x, y, z): [{:.6}, {:.6}, {:.6}]", t.x, t.y, t.z)
}

fn write_quaternion(f: &mut fmt::Formatter<'_>, x: &Iso3) -> fmt::Result {
    let q = x.rotation.quaternion().coords;
    writeln!(
        f,
        "Rotation quaternion (x, y, z, w): [{:.6}, {:.6}, {:.6}, {:.6}]",
        q.x, q.y, q.z, q.w
    )
}

impl fmt::Display for CalibrationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ee = &self.frames.robot_effector;
        let cam = &self.frames.camera;
        let x = &self.result.effector_se3_camera;

        writeln!(f, "Result from {ee} to {cam}:")?;
        let m = x.to_homogeneous();
        for r in 0..4 {
            writeln!(
                f,
                "  [{:>10.6} {:>10.6} {:>10.6} {:>10.6}]",
                m[(r, 0)],
                m[(r, 1)],
                m[(r, 2)],
                m[(r, 3)]
            )?;
        }
        write_translation(f, x)?;
        write_quaternion(f, x)?;
        let (roll, pitch, yaw) = x.rotation.euler_angles();
        writeln!(f, "Rotation (roll, pitch, yaw): [{roll:.6}, {pitch:.6}, {yaw:.6}]")?;

        let t = x.translation.vector;
        let q = x.rotation.quaternion().coords;
        writeln!(
            f,
            "Publish with: static_transform_publisher {:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {ee} {cam}",
            t.x, t.y, t.z, q.x, q.y, q.z, q.w
        )?;

        let inv = x.inverse();
        writeln!(f, "Inverted transform from {cam} to {ee}:")?;
        write_translation(f, &inv)?;
        write_quaternion(f, &inv)?;

        write!(f, "Solver: {}", self.result.report.brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::Vec3;
    use handeye_solver::{SolverReport, TerminationType};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn report_lists_all_sections() {
        let frames = FrameNames::default();
        let result = CalibrationResult {
            effector_se3_camera: Iso3::new(
                Vec3::new(0.1, 0.0, 0.05),
                Vec3::new(0.0, 0.0, FRAC_PI_2),
            ),
            report: SolverReport {
                initial_cost: 1e-3,
                final_cost: 1e-9,
                termination: TerminationType::Convergence,
                message: String::new(),
                num_successful_steps: 3,
                num_unsuccessful_steps: 1,
            },
        };
        let text = CalibrationReport::new(&frames, &result).to_string();

        assert!(text.contains("Result from /ee_fixed_link to /camera_2_link"));
        assert!(text.contains("Translation (x, y, z): [0.100000, 0.000000, 0.050000]"));
        assert!(text.contains("roll, pitch, yaw"));
        assert!(text.contains("1.570796]"));
        assert!(text.contains("static_transform_publisher"));
        assert!(text.contains("Inverted transform from /camera_2_link to /ee_fixed_link"));
        // Inverse of a quarter turn about Z with t = (0.1, 0, 0.05).
        assert!(text.contains("0.100000, -0.050000]"));
        assert!(text.contains("CONVERGENCE"));
    }
}
