//! Pose pairs and relative motions.

use nalgebra::Translation3;
use serde::{Deserialize, Serialize};

use crate::math::{exp_so3, log_so3, Iso3, Real, Vec3, ANGLE_EPS};

/// Robot and camera poses captured at the same logical instant.
///
/// `robot` is `base_se3_effector`, `camera` is `fiducial_se3_camera`.
/// A pair is only ever built with both poses present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosePair {
    pub robot: Iso3,
    pub camera: Iso3,
}

impl PosePair {
    pub fn new(robot: Iso3, camera: Iso3) -> Self {
        Self { robot, camera }
    }
}

/// Motion relative to a reference pose, in solver form.
///
/// `rotation` is the axis-angle vector (angle × unit axis, angle in `[0, π]`),
/// `translation` the translation of the relative transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelativeMotion {
    pub rotation: Vec3,
    pub translation: Vec3,
}

impl RelativeMotion {
    /// Decompose a relative transform into axis-angle + translation.
    pub fn from_isometry(iso: &Iso3) -> Self {
        Self {
            rotation: log_so3(&iso.rotation),
            translation: iso.translation.vector,
        }
    }

    /// Rebuild the relative transform.
    pub fn to_isometry(&self) -> Iso3 {
        Iso3::from_parts(
            Translation3::from(self.translation),
            exp_so3(&self.rotation),
        )
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> Real {
        self.rotation.norm()
    }

    /// Unit rotation axis, `None` for a (near) pure translation.
    pub fn axis(&self) -> Option<Vec3> {
        let angle = self.angle();
        (angle >= ANGLE_EPS).then(|| self.rotation / angle)
    }
}
