//! Hand-eye solvers for the AX = XB formulation.
//!
//! The pipeline treats the solver as a pure function: two index-aligned lists
//! of relative motions in, one rigid transform plus a [`SolverReport`] out.
//! Anything implementing [`HandEyeSolver`] can be plugged into the pipeline.
//!
//! The default [`TsaiLenzSolver`] combines:
//! - a linear Tsai–Lenz initialisation over all motion pairs ([`linear`]),
//! - Levenberg–Marquardt refinement of the AX = XB residual ([`refine`]).

pub mod linear;
pub mod refine;
mod solver;

pub use linear::{build_motion_pairs, estimate_handeye_linear, MotionPair};
pub use refine::{refine_handeye, RefineOptions};
pub use solver::{
    HandEyeSolution, HandEyeSolver, SolverReport, TerminationType, TsaiLenzOptions,
    TsaiLenzSolver,
};
