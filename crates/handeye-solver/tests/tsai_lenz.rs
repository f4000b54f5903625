//! Integration test for the default hand-eye solver.
//!
//! Validates that the Tsai–Lenz + LM solver:
//! 1. recovers the ground-truth effector->camera transform from exact data,
//! 2. stays close to it when the camera chain carries small deterministic noise,
//! 3. reports consistent diagnostics.

use handeye_core::{Iso3, Real, RelativeMotion};
use handeye_solver::{HandEyeSolver, TerminationType, TsaiLenzOptions, TsaiLenzSolver};
use nalgebra::{Rotation3, Translation3};

fn make_iso(angles: (Real, Real, Real), t: (Real, Real, Real)) -> Iso3 {
    let rot = Rotation3::from_euler_angles(angles.0, angles.1, angles.2);
    Iso3::from_parts(Translation3::new(t.0, t.1, t.2), rot.into())
}

/// Absolute effector/camera poses for a static fiducial seen by a wrist camera.
fn capture_poses(x_gt: &Iso3, count: usize) -> Vec<(Iso3, Iso3)> {
    let base_se3_fiducial = make_iso((0.05, -0.02, 0.3), (0.6, 0.1, 0.0));
    (0..count)
        .map(|k| {
            let kf = k as Real;
            let effector = make_iso(
                (0.2 * (0.7 * kf).sin(), 0.25 * (0.5 * kf).cos(), 0.3 * (0.9 * kf).sin()),
                (0.4 + 0.05 * kf, -0.1 + 0.03 * kf, 0.5 - 0.02 * kf),
            );
            let camera = base_se3_fiducial.inverse() * effector * x_gt;
            (effector, camera)
        })
        .collect()
}

fn relative_motions(poses: &[(Iso3, Iso3)]) -> (Vec<RelativeMotion>, Vec<RelativeMotion>) {
    let (e0, c0) = poses[0];
    poses[1..]
        .iter()
        .map(|(e, c)| {
            (
                RelativeMotion::from_isometry(&(e0.inverse() * e)),
                RelativeMotion::from_isometry(&(c0.inverse() * c)),
            )
        })
        .unzip()
}

fn pose_error(a: &Iso3, b: &Iso3) -> (Real, Real) {
    let dt = (a.translation.vector - b.translation.vector).norm();
    (dt, a.rotation.angle_to(&b.rotation))
}

#[test]
fn exact_data_recovers_ground_truth() {
    let x_gt = make_iso((0.1, -0.2, 1.2), (0.03, -0.06, 0.11));
    let poses = capture_poses(&x_gt, 8);
    let (robot, camera) = relative_motions(&poses);

    let solution = TsaiLenzSolver::default().solve(&robot, &camera).unwrap();
    let (dt, ang) = pose_error(&solution.transform, &x_gt);

    assert!(dt < 1e-6, "translation error too large: {}", dt);
    assert!(ang < 1e-6, "rotation error too large: {}", ang);
    assert_ne!(solution.report.termination, TerminationType::LinearOnly);
    assert!(solution.report.final_cost <= solution.report.initial_cost + 1e-15);
}

#[test]
fn noisy_camera_chain_stays_close() {
    let x_gt = make_iso((-0.3, 0.1, 0.4), (0.0, 0.05, 0.15));
    let mut poses = capture_poses(&x_gt, 10);
    for (k, (_, camera)) in poses.iter_mut().enumerate() {
        let kf = k as Real;
        let jitter = make_iso(
            (1e-3 * (3.1 * kf).sin(), 1e-3 * (1.7 * kf).cos(), -1e-3 * (2.3 * kf).sin()),
            (5e-4 * (1.3 * kf).cos(), -5e-4 * (0.7 * kf).sin(), 5e-4 * (2.9 * kf).cos()),
        );
        *camera *= jitter;
    }
    let (robot, camera) = relative_motions(&poses);

    let solution = TsaiLenzSolver::default().solve(&robot, &camera).unwrap();
    let (dt, ang) = pose_error(&solution.transform, &x_gt);

    assert!(dt < 2e-2, "translation error too large: {}", dt);
    assert!(ang < 1e-2, "rotation error too large: {}", ang);
    assert!(solution.report.final_cost <= solution.report.initial_cost + 1e-15);
}

#[test]
fn linear_only_report() {
    let x_gt = make_iso((0.1, 0.2, -0.3), (0.1, 0.0, 0.05));
    let (robot, camera) = relative_motions(&capture_poses(&x_gt, 5));

    let solver = TsaiLenzSolver::new(TsaiLenzOptions {
        refine: false,
        ..TsaiLenzOptions::default()
    });
    let solution = solver.solve(&robot, &camera).unwrap();

    assert_eq!(solution.report.termination, TerminationType::LinearOnly);
    assert_eq!(solution.report.num_iterations(), 0);
    assert_eq!(solution.report.change_cost(), 0.0);
    let (dt, ang) = pose_error(&solution.transform, &x_gt);
    assert!(dt < 1e-6 && ang < 1e-6, "dt={} ang={}", dt, ang);
}
