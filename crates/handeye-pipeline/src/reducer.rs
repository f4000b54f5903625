//! Reduction of absolute pose pairs to motions relative to a reference pair.
//!
//! For a reference pair `(E₀, C₀)` and a later pair `(Eᵢ, Cᵢ)` the motions are
//! `Aᵢ = E₀⁻¹ Eᵢ` (robot chain) and `Bᵢ = C₀⁻¹ Cᵢ` (camera chain). With
//! `X = effector_se3_camera` they satisfy `Aᵢ X = X Bᵢ`.
//!
//! Poses are already rigid here: matrices are checked and projected onto
//! SO(3) when they enter the pipeline (record files, pose sources).

use handeye_core::{Iso3, PosePair, RelativeMotion};
use log::debug;

/// Cached inverses of the first pair of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reference {
    pair: PosePair,
    robot_inverse: Iso3,
    camera_inverse: Iso3,
}

impl Reference {
    pub fn new(pair: &PosePair) -> Self {
        Self {
            pair: *pair,
            robot_inverse: pair.robot.inverse(),
            camera_inverse: pair.camera.inverse(),
        }
    }

    /// The pair this reference was built from.
    pub fn pair(&self) -> &PosePair {
        &self.pair
    }

    /// Relative transforms `(E₀⁻¹ Eᵢ, C₀⁻¹ Cᵢ)`.
    pub fn relative_transforms(&self, pair: &PosePair) -> (Iso3, Iso3) {
        (
            self.robot_inverse * pair.robot,
            self.camera_inverse * pair.camera,
        )
    }

    /// Robot and camera motion of `pair` relative to this reference.
    pub fn relative(&self, pair: &PosePair) -> (RelativeMotion, RelativeMotion) {
        let (robot, camera) = self.relative_transforms(pair);

        debug!(
            "relative EE transform: t = [{:.5}, {:.5}, {:.5}]",
            robot.translation.vector.x,
            robot.translation.vector.y,
            robot.translation.vector.z
        );
        debug!(
            "relative camera transform: t = [{:.5}, {:.5}, {:.5}]",
            camera.translation.vector.x,
            camera.translation.vector.y,
            camera.translation.vector.z
        );
        debug!(
            "L2Norm EE vs Cam: {:.5} vs {:.5}",
            robot.translation.vector.norm(),
            camera.translation.vector.norm()
        );

        (
            RelativeMotion::from_isometry(&robot),
            RelativeMotion::from_isometry(&camera),
        )
    }
}

/// Index-aligned motion lists derived from a pair sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducedMotions {
    pub robot: Vec<RelativeMotion>,
    pub camera: Vec<RelativeMotion>,
}

impl ReducedMotions {
    pub fn len(&self) -> usize {
        self.robot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robot.is_empty()
    }
}

/// Reduce `pairs` to motions relative to `pairs[0]`.
///
/// Produces `pairs.len() - 1` motions per stream (none for fewer than two
/// pairs). Pure: the same input always yields the same output.
pub fn reduce(pairs: &[PosePair]) -> ReducedMotions {
    let Some((first, rest)) = pairs.split_first() else {
        return ReducedMotions::default();
    };
    let reference = Reference::new(first);
    let (robot, camera) = rest.iter().map(|p| reference.relative(p)).unzip();
    ReducedMotions { robot, camera }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::Vec3;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn pair(robot: Iso3, camera: Iso3) -> PosePair {
        PosePair::new(robot, camera)
    }

    #[test]
    fn fewer_than_two_pairs_give_no_motions() {
        assert!(reduce(&[]).is_empty());
        let one = [pair(Iso3::identity(), Iso3::identity())];
        assert!(reduce(&one).is_empty());
    }

    #[test]
    fn identical_pose_gives_zero_motion() {
        let p = pair(
            Iso3::new(Vec3::new(0.3, 0.1, 0.2), Vec3::new(0.1, 0.2, 0.3)),
            Iso3::new(Vec3::new(-0.2, 0.4, 1.0), Vec3::new(0.0, 0.5, 0.0)),
        );
        let motions = reduce(&[p, p]);
        assert_eq!(motions.len(), 1);
        assert!(motions.robot[0].angle() < 1e-6);
        assert!(motions.robot[0].translation.norm() < 1e-12);
        assert!(motions.camera[0].angle() < 1e-6);
        assert!(motions.camera[0].translation.norm() < 1e-12);
    }

    #[test]
    fn half_turn_recovers_axis_and_angle() {
        let axis = Vec3::new(1.0, 2.0, -1.0).normalize();
        let base = pair(Iso3::identity(), Iso3::identity());
        let turned = pair(Iso3::new(Vec3::zeros(), axis * PI), Iso3::identity());

        let motions = reduce(&[base, turned]);
        let m = motions.robot[0];
        assert!((m.angle() - PI).abs() < 1e-9);
        let got_axis = m.axis().unwrap();
        assert!(got_axis.cross(&axis).norm() < 1e-6);
    }

    #[test]
    fn motion_is_relative_to_reference_not_world() {
        let reference = Iso3::new(Vec3::new(1.0, 1.0, 0.0), Vec3::new(0.0, 0.0, FRAC_PI_2));
        let step = Iso3::new(Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.3, 0.0, 0.0));
        let later = reference * step;

        let motions = reduce(&[
            pair(reference, Iso3::identity()),
            pair(later, Iso3::identity()),
        ]);
        let back = motions.robot[0].to_isometry();
        assert!((back.to_homogeneous() - step.to_homogeneous()).norm() < 1e-9);
    }

    #[test]
    fn reduce_is_idempotent() {
        let pairs: Vec<_> = (0..4)
            .map(|i| {
                let s = i as f64 * 0.2;
                pair(
                    Iso3::new(Vec3::new(s, 0.1, -s), Vec3::new(s, 0.0, 0.5 * s)),
                    Iso3::new(Vec3::new(0.0, s, 1.0), Vec3::new(0.0, s, -s)),
                )
            })
            .collect();
        assert_eq!(reduce(&pairs), reduce(&pairs));
    }

    #[test]
    fn incremental_reference_matches_batch() {
        let pairs = [
            pair(Iso3::identity(), Iso3::identity()),
            pair(
                Iso3::new(Vec3::new(0.2, 0.0, 0.0), Vec3::new(0.0, 0.4, 0.0)),
                Iso3::new(Vec3::new(0.0, 0.1, 0.0), Vec3::new(0.4, 0.0, 0.0)),
            ),
        ];
        let reference = Reference::new(&pairs[0]);
        let (robot, camera) = reference.relative(&pairs[1]);
        let batch = reduce(&pairs);
        assert_eq!(batch.robot[0], robot);
        assert_eq!(batch.camera[0], camera);
        assert_eq!(reference.pair(), &pairs[0]);
    }
}
