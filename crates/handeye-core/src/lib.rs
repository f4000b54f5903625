//! Core math and data model for `handeye-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Mat4`, `Iso3`, ...),
//! - rigid-transform helpers (4×4 conversion, SO(3) projection, axis-angle),
//! - the pose-pair data model shared by the solver and the pipeline
//!   ([`PosePair`], [`RelativeMotion`]).
//!
//! Conventions:
//! - robot poses are `base_se3_effector` (effector in base frame),
//! - camera poses are `fiducial_se3_camera` (camera in fiducial frame),
//! - the hand-eye result is `effector_se3_camera`.

/// Linear algebra type aliases and rigid-transform helpers.
pub mod math;
/// Pose pairs and relative motions.
pub mod pose;

pub use math::*;
pub use pose::*;
