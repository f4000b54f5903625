//! Hand-eye calibration (AX = XB) using Tsai–Lenz.
//!
//! Provides a linear initialization from relative motion streams, returning
//! the rigid transform between the effector and camera frames.

use anyhow::Result;
use handeye_core::{exp_so3, log_so3, Iso3, Mat3, Quat, Real, RelativeMotion, Vec3};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix4, Quaternion, Translation3, UnitQuaternion};

/// Motion pair for Tsai–Lenz AX = XB:
/// A: relative motion in the robot chain (base->effector)
/// B: relative motion in the camera chain (fiducial->camera)
#[derive(Debug, Clone, Copy)]
pub struct MotionPair {
    pub rot_a: Quat,
    pub rot_b: Quat,
    pub tra_a: Vec3,
    pub tra_b: Vec3,
}

impl MotionPair {
    fn from_isometries(a: &Iso3, b: &Iso3) -> Self {
        Self {
            rot_a: canonical(a.rotation),
            rot_b: canonical(b.rotation),
            tra_a: a.translation.vector,
            tra_b: b.translation.vector,
        }
    }

    fn from_motions(a: &RelativeMotion, b: &RelativeMotion) -> Self {
        Self {
            rot_a: canonical(exp_so3(&a.rotation)),
            rot_b: canonical(exp_so3(&b.rotation)),
            tra_a: a.translation,
            tra_b: b.translation,
        }
    }

    /// Smaller of the two rotation angles.
    fn min_angle(&self) -> Real {
        self.rot_a.angle().min(self.rot_b.angle())
    }
}

/// Keep the scalar part non-negative so A and B quaternions share a sign.
fn canonical(q: Quat) -> Quat {
    if q.w < 0.0 {
        UnitQuaternion::new_unchecked(-q.into_inner())
    } else {
        q
    }
}

/// Build all usable motion pairs from reference-relative motion streams.
///
/// Every motion `A_i = E_0⁻¹ E_i` is itself an AX = XB pair; in addition every
/// difference `A_i⁻¹ A_j` (i < j) is used so that small datasets still give
/// well-spread rotation axes. Pairs whose rotation in either chain is below
/// `min_angle_deg` are discarded.
pub fn build_motion_pairs(
    robot: &[RelativeMotion],
    camera: &[RelativeMotion],
    min_angle_deg: Real,
) -> Result<Vec<MotionPair>> {
    if robot.len() != camera.len() {
        anyhow::bail!(
            "inconsistent hand-eye input sizes: robot {} vs camera {}",
            robot.len(),
            camera.len()
        );
    }
    if robot.is_empty() {
        anyhow::bail!("need at least 1 motion pair, got 0");
    }

    let num = robot.len();
    let min_angle = min_angle_deg.to_radians();
    let robot_iso: Vec<Iso3> = robot.iter().map(RelativeMotion::to_isometry).collect();
    let camera_iso: Vec<Iso3> = camera.iter().map(RelativeMotion::to_isometry).collect();

    let mut candidates = Vec::with_capacity(num + num * (num - 1) / 2);
    for (a, b) in robot.iter().zip(camera) {
        candidates.push(MotionPair::from_motions(a, b));
    }
    for i in 0..num {
        for j in (i + 1)..num {
            let a = robot_iso[i].inverse() * robot_iso[j];
            let b = camera_iso[i].inverse() * camera_iso[j];
            candidates.push(MotionPair::from_isometries(&a, &b));
        }
    }

    let pairs: Vec<MotionPair> = candidates
        .into_iter()
        .filter(|p| {
            let keep = p.min_angle() >= min_angle;
            if !keep {
                debug!(
                    "motion pair rejected: small rotation {:.3} deg",
                    p.min_angle().to_degrees()
                );
            }
            keep
        })
        .collect();

    if pairs.is_empty() {
        anyhow::bail!("no valid motion pairs after filtering");
    }
    if !has_distinct_axes(&pairs) {
        warn!("all robot rotation axes are parallel; hand-eye rotation is poorly constrained");
    }

    Ok(pairs)
}

fn has_distinct_axes(pairs: &[MotionPair]) -> bool {
    let axes: Vec<Vec3> = pairs
        .iter()
        .filter_map(|p| p.rot_a.axis().map(|a| a.into_inner()))
        .collect();
    axes.iter()
        .enumerate()
        .any(|(i, a)| axes[i + 1..].iter().any(|b| a.cross(b).norm() > 1e-3))
}

// ---------- Tsai–Lenz rotation over all pairs ----------

fn estimate_rotation(pairs: &[MotionPair]) -> Result<Quat> {
    fn quat_left(q: &Quat) -> Matrix4<Real> {
        let w = q.w;
        let (x, y, z) = (q.i, q.j, q.k);
        Matrix4::new(w, -x, -y, -z, x, w, -z, y, y, z, w, -x, z, -y, x, w)
    }

    fn quat_right(q: &Quat) -> Matrix4<Real> {
        let w = q.w;
        let (x, y, z) = (q.i, q.j, q.k);
        Matrix4::new(w, -x, -y, -z, x, w, z, -y, y, -z, w, x, z, y, -x, w)
    }

    let mut m = DMatrix::<Real>::zeros(4 * pairs.len(), 4);
    for (idx, p) in pairs.iter().enumerate() {
        m.view_mut((4 * idx, 0), (4, 4))
            .copy_from(&(quat_left(&p.rot_a) - quat_right(&p.rot_b)));
    }

    let svd = m.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| anyhow::anyhow!("svd failed during hand-eye rotation estimation"))?;
    let q_vec = v_t.row(v_t.nrows() - 1);

    let q = Quaternion::new(q_vec[0], q_vec[1], q_vec[2], q_vec[3]);
    Ok(canonical(UnitQuaternion::from_quaternion(q)))
}

// ---------- Tsai–Lenz translation over all pairs ----------

fn estimate_translation(pairs: &[MotionPair], rot_x: &Quat) -> Result<Vec3> {
    let rot_x = rot_x.to_rotation_matrix().into_inner();
    let mut mat_c = DMatrix::<Real>::zeros(3 * pairs.len(), 3);
    let mut vec_w = DVector::<Real>::zeros(3 * pairs.len());

    for (idx, p) in pairs.iter().enumerate() {
        let rot_a: Mat3 = p.rot_a.to_rotation_matrix().into_inner();
        mat_c
            .view_mut((3 * idx, 0), (3, 3))
            .copy_from(&(rot_a - Mat3::identity()));
        vec_w
            .rows_mut(3 * idx, 3)
            .copy_from(&(rot_x * p.tra_b - p.tra_a));
    }

    ridge_llsq(&mat_c, &vec_w, 1e-12)
}

/// Linear Tsai–Lenz estimate of `X = effector_se3_camera`.
pub fn estimate_handeye_linear(pairs: &[MotionPair]) -> Result<Iso3> {
    let rot_x = estimate_rotation(pairs)?;
    let tra_x = estimate_translation(pairs, &rot_x)?;
    debug!(
        "linear hand-eye: |t| = {:.4}, angle = {:.3} deg (axis-angle {:?})",
        tra_x.norm(),
        rot_x.angle().to_degrees(),
        log_so3(&rot_x)
    );
    Ok(Iso3::from_parts(Translation3::from(tra_x), rot_x))
}

/// Ridge-regularized least squares:
/// min ||A x - b||^2 + λ ||x||^2
fn ridge_llsq(a: &DMatrix<Real>, b: &DVector<Real>, lambda: Real) -> Result<Vec3> {
    let m = a.nrows();
    let n = a.ncols();
    if n != 3 {
        anyhow::bail!("linear solve failed during hand-eye estimation");
    }

    // Build augmented system [A; sqrt(λ) I] x ≈ [b; 0]
    let mut a_aug = DMatrix::<Real>::zeros(m + n, n);
    a_aug.view_mut((0, 0), (m, n)).copy_from(a);
    let sqrt_lambda = lambda.sqrt();
    for i in 0..n {
        a_aug[(m + i, i)] = sqrt_lambda;
    }

    let mut b_aug = DVector::<Real>::zeros(m + n);
    b_aug.rows_mut(0, m).copy_from(b);

    let svd = a_aug.svd(true, true);
    let x = svd
        .solve(&b_aug, 1e-12)
        .map_err(|_| anyhow::anyhow!("linear solve failed during hand-eye estimation"))?;

    Ok(Vec3::new(x[0], x[1], x[2]))
}
