//! Mathematical utilities and type definitions.
//!
//! Rigid transforms are stored as [`Iso3`], so rotations are orthonormal by
//! construction. Data entering from the outside world (files, pose services)
//! arrives as 4×4 homogeneous matrices and is checked here.

use log::warn;
use nalgebra::{Isometry3, Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3};
use thiserror::Error;

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// Unit quaternion with [`Real`] components.
pub type Quat = UnitQuaternion<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Row-major 4×4 block as stored in record and result files.
pub type MatRows = [[Real; 4]; 4];

/// Maximum Frobenius deviation of `RᵀR` from identity accepted as a rotation.
pub const RIGIDITY_TOLERANCE: Real = 1e-6;

/// Rotation angles below this are treated as the identity rotation.
pub const ANGLE_EPS: Real = 1e-12;

/// Reasons a 4×4 matrix is not a rigid transform.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RigidityError {
    #[error("matrix contains non-finite entries")]
    NonFinite,
    #[error("bottom row is not [0 0 0 1]")]
    NotAffine,
    #[error("rotation block is not orthonormal (|RᵀR - I| = {0:.3e})")]
    NotOrthonormal(Real),
    #[error("rotation block is a reflection (det = {0:.6})")]
    Reflection(Real),
    #[error("svd failed while projecting onto SO(3)")]
    SvdFailed,
}

/// Frobenius norm of `RᵀR - I`.
pub fn orthonormality_error(r: &Mat3) -> Real {
    (r.transpose() * r - Mat3::identity()).norm()
}

/// Check that `r` is a proper rotation within `tol`.
pub fn check_rotation(r: &Mat3, tol: Real) -> Result<(), RigidityError> {
    let err = orthonormality_error(r);
    if err > tol {
        return Err(RigidityError::NotOrthonormal(err));
    }
    let det = r.determinant();
    if det < 0.0 {
        return Err(RigidityError::Reflection(det));
    }
    Ok(())
}

/// Project a general 3x3 matrix to the closest rotation matrix (SO(3))
/// using SVD.
pub fn project_to_so3(m: &Mat3) -> Result<Mat3, RigidityError> {
    let svd = m.svd(true, true);
    let u = svd.u.ok_or(RigidityError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RigidityError::SvdFailed)?;
    let mut r = u * v_t;

    // Ensure det(R) > 0
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }
    Ok(r)
}

fn check_frame(m: &Mat4) -> Result<(), RigidityError> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(RigidityError::NonFinite);
    }
    let bottom = m.fixed_view::<1, 4>(3, 0);
    let expected = [0.0, 0.0, 0.0, 1.0];
    if bottom
        .iter()
        .zip(expected.iter())
        .any(|(a, b)| (a - b).abs() > RIGIDITY_TOLERANCE)
    {
        return Err(RigidityError::NotAffine);
    }
    Ok(())
}

fn iso_from_parts(rot: Mat3, t: Vec3) -> Iso3 {
    let rot = Rotation3::from_matrix_unchecked(rot);
    Iso3::from_parts(Translation3::from(t), UnitQuaternion::from_rotation_matrix(&rot))
}

/// Convert a homogeneous matrix into a rigid transform, rejecting anything
/// whose rotation block is not a rotation within `tol`.
pub fn iso_from_matrix(m: &Mat4, tol: Real) -> Result<Iso3, RigidityError> {
    check_frame(m)?;
    let rot: Mat3 = m.fixed_view::<3, 3>(0, 0).into_owned();
    check_rotation(&rot, tol)?;
    let t: Vec3 = m.fixed_view::<3, 1>(0, 3).into_owned();
    Ok(iso_from_parts(rot, t))
}

/// Convert a homogeneous matrix into a rigid transform, projecting the
/// rotation block onto SO(3) when it is outside [`RIGIDITY_TOLERANCE`].
///
/// Non-finite or non-affine matrices are still rejected. A projected matrix is
/// reported with a warning; the sample keeps its place in the sequence.
pub fn iso_from_matrix_projected(m: &Mat4) -> Result<Iso3, RigidityError> {
    match iso_from_matrix(m, RIGIDITY_TOLERANCE) {
        Ok(iso) => Ok(iso),
        Err(err @ (RigidityError::NotOrthonormal(_) | RigidityError::Reflection(_))) => {
            warn!("projecting non-rigid transform onto SO(3): {err}");
            let rot = project_to_so3(&m.fixed_view::<3, 3>(0, 0).into_owned())?;
            let t: Vec3 = m.fixed_view::<3, 1>(0, 3).into_owned();
            Ok(iso_from_parts(rot, t))
        }
        Err(err) => Err(err),
    }
}

/// Homogeneous 4×4 matrix of a rigid transform.
pub fn iso_to_matrix(iso: &Iso3) -> Mat4 {
    iso.to_homogeneous()
}

/// Row-major rows of a 4×4 matrix.
pub fn matrix_to_rows(m: &Mat4) -> MatRows {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    rows
}

/// 4×4 matrix from row-major rows.
pub fn matrix_from_rows(rows: &MatRows) -> Mat4 {
    Mat4::from_fn(|r, c| rows[r][c])
}

/// log: SO(3) -> so(3) as a 3-vector (axis * angle).
///
/// The angle is in `[0, π]`; rotations below [`ANGLE_EPS`] map to zero.
pub fn log_so3(rot: &Quat) -> Vec3 {
    let angle = rot.angle();
    if angle < ANGLE_EPS {
        return Vec3::zeros();
    }
    match rot.axis() {
        Some(axis) => axis.into_inner() * angle,
        None => Vec3::zeros(),
    }
}

/// exp: so(3) -> SO(3) from an axis-angle 3-vector.
pub fn exp_so3(v: &Vec3) -> Quat {
    UnitQuaternion::from_scaled_axis(*v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn log_identity_is_zero() {
        let v = log_so3(&Quat::identity());
        assert_eq!(v, Vec3::zeros());
    }

    #[test]
    fn log_half_turn_recovers_axis() {
        let axis = Vec3::new(1.0, 2.0, -0.5).normalize();
        let q = exp_so3(&(axis * PI));
        let v = log_so3(&q);

        assert!((v.norm() - PI).abs() < 1e-9, "angle {}", v.norm());
        let cos = v.normalize().dot(&axis).abs();
        assert!((cos - 1.0).abs() < 1e-9, "axis not parallel: cos={}", cos);
    }

    #[test]
    fn log_exp_quarter_turn() {
        let v = Vec3::new(0.0, 0.0, FRAC_PI_2);
        let back = log_so3(&exp_so3(&v));
        assert!((back - v).norm() < 1e-12);
    }

    #[test]
    fn matrix_rows_roundtrip() {
        let iso = Iso3::new(Vec3::new(0.1, -0.2, 0.3), Vec3::new(0.3, 0.2, -0.1));
        let m = iso_to_matrix(&iso);
        let rows = matrix_to_rows(&m);
        assert_eq!(rows[3], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(matrix_from_rows(&rows), m);

        let back = iso_from_matrix(&m, RIGIDITY_TOLERANCE).unwrap();
        assert!((back.to_homogeneous() - m).norm() < 1e-12);
    }

    #[test]
    fn rejects_reflection_and_scale() {
        let mut m = Mat4::identity();
        m[(2, 2)] = -1.0;
        assert!(matches!(
            iso_from_matrix(&m, RIGIDITY_TOLERANCE),
            Err(RigidityError::Reflection(_))
        ));

        let mut m = Mat4::identity();
        m[(0, 0)] = 2.0;
        assert!(matches!(
            iso_from_matrix(&m, RIGIDITY_TOLERANCE),
            Err(RigidityError::NotOrthonormal(_))
        ));
    }

    #[test]
    fn rejects_non_affine_and_nan() {
        let mut m = Mat4::identity();
        m[(3, 0)] = 0.5;
        assert_eq!(
            iso_from_matrix_projected(&m),
            Err(RigidityError::NotAffine)
        );

        let mut m = Mat4::identity();
        m[(1, 3)] = Real::NAN;
        assert_eq!(
            iso_from_matrix_projected(&m),
            Err(RigidityError::NonFinite)
        );
    }

    #[test]
    fn projection_repairs_slight_drift() {
        let iso = Iso3::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.4, 0.0));
        let mut m = iso_to_matrix(&iso);
        m[(0, 0)] += 1e-3;

        let repaired = iso_from_matrix_projected(&m).unwrap();
        let r = repaired.rotation.to_rotation_matrix().into_inner();
        assert!(orthonormality_error(&r) < 1e-9);
        assert!((repaired.translation.vector - Vec3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
        assert!(repaired.rotation.angle_to(&iso.rotation) < 1e-2);
    }
}
