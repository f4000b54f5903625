//! Levenberg–Marquardt refinement of the AX = XB residual.
//!
//! Parameters are `[ω; t]` with `ω` the axis-angle of `R_X`. Per motion pair
//! the residual stacks
//! - rotation: `log((R_X R_B)⁻¹ R_A R_X)`,
//! - translation: `(R_A t_X + t_A) - (R_X t_B + t_X)`.

use handeye_core::{exp_so3, log_so3, Iso3, Real, Vec3};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn, Translation3};
use serde::{Deserialize, Serialize};

use crate::linear::MotionPair;
use crate::solver::{SolverReport, TerminationType};

const NUM_PARAMS: usize = 6;
const FD_STEP: Real = 1e-7;

/// Options for the nonlinear refinement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineOptions {
    /// Maximum number of solver iterations; the LM backend interprets this
    /// as its patience (`max_iters * (n + 1)` evaluations).
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction.
    pub ftol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
    /// Orthogonality/gradient tolerance.
    pub gtol: Real,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
        }
    }
}

fn params_to_iso(x: &DVector<Real>) -> Iso3 {
    let rot = exp_so3(&Vec3::new(x[0], x[1], x[2]));
    Iso3::from_parts(Translation3::new(x[3], x[4], x[5]), rot)
}

fn iso_to_params(iso: &Iso3) -> DVector<Real> {
    let w = log_so3(&iso.rotation);
    let t = iso.translation.vector;
    DVector::from_column_slice(&[w.x, w.y, w.z, t.x, t.y, t.z])
}

/// Stacked AX = XB residual for all pairs.
pub(crate) fn residuals(pairs: &[MotionPair], x: &Iso3) -> DVector<Real> {
    let rot_x = x.rotation;
    let rot_x_mat = rot_x.to_rotation_matrix();
    let tra_x = x.translation.vector;

    let mut r = DVector::<Real>::zeros(6 * pairs.len());
    for (idx, p) in pairs.iter().enumerate() {
        let lhs = p.rot_a * rot_x;
        let rhs = rot_x * p.rot_b;
        let e_rot = log_so3(&(rhs.inverse() * lhs));
        let e_tra =
            (p.rot_a.to_rotation_matrix() * tra_x + p.tra_a) - (rot_x_mat * p.tra_b + tra_x);
        r.rows_mut(6 * idx, 3).copy_from(&e_rot);
        r.rows_mut(6 * idx + 3, 3).copy_from(&e_tra);
    }
    r
}

/// `0.5 * ||r||²` at `x`.
pub(crate) fn cost(pairs: &[MotionPair], x: &Iso3) -> Real {
    0.5 * residuals(pairs, x).norm_squared()
}

#[derive(Debug, Default)]
struct StepTally {
    best_cost: Real,
    best_params: Option<DVector<Real>>,
    successful: usize,
    unsuccessful: usize,
}

struct AxxbProblem<'a> {
    pairs: &'a [MotionPair],
    params: DVector<Real>,
    tally: StepTally,
}

impl<'a> AxxbProblem<'a> {
    fn new(pairs: &'a [MotionPair], x0: DVector<Real>) -> Self {
        let best_cost = cost(pairs, &params_to_iso(&x0));
        Self {
            pairs,
            tally: StepTally {
                best_cost,
                best_params: Some(x0.clone()),
                ..StepTally::default()
            },
            params: x0,
        }
    }

    fn eval(&self, x: &DVector<Real>) -> DVector<Real> {
        residuals(self.pairs, &params_to_iso(x))
    }
}

impl LeastSquaresProblem<Real, Dyn, Dyn> for AxxbProblem<'_> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);

        // Restoring the last accepted point is not a step.
        if self.tally.best_params.as_ref() == Some(x) {
            return;
        }
        let c = 0.5 * self.eval(x).norm_squared();
        if c < self.tally.best_cost {
            self.tally.successful += 1;
            self.tally.best_cost = c;
            self.tally.best_params = Some(x.clone());
        } else {
            self.tally.unsuccessful += 1;
        }
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.eval(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let r0 = self.eval(&self.params);
        let mut jac = DMatrix::<Real>::zeros(r0.len(), NUM_PARAMS);
        for c in 0..NUM_PARAMS {
            let mut xp = self.params.clone();
            let mut xm = self.params.clone();
            xp[c] += FD_STEP;
            xm[c] -= FD_STEP;
            let col = (self.eval(&xp) - self.eval(&xm)) / (2.0 * FD_STEP);
            jac.set_column(c, &col);
        }
        Some(jac)
    }
}

/// Refine an initial hand-eye estimate over `pairs`.
///
/// Returns the refined transform and a report whose `initial_cost` is the
/// cost at `x0`.
pub fn refine_handeye(
    pairs: &[MotionPair],
    x0: &Iso3,
    opts: &RefineOptions,
) -> (Iso3, SolverReport) {
    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_patience(opts.max_iters.max(1));

    let problem = AxxbProblem::new(pairs, iso_to_params(x0));
    let initial_cost = problem.tally.best_cost;

    let (problem, report) = lm.minimize(problem);
    // The backend may stop on a rejected trial point; keep the best accepted one.
    let best = problem.tally.best_params.as_ref().unwrap_or(&problem.params);
    let x_opt = params_to_iso(best);
    let final_cost = cost(pairs, &x_opt);

    debug!(
        "LM refinement: {:?} after {} evaluations, cost {:.3e} -> {:.3e}",
        report.termination, report.number_of_evaluations, initial_cost, final_cost
    );

    let termination = if report.termination.was_successful() {
        TerminationType::Convergence
    } else {
        TerminationType::NoConvergence
    };

    (
        x_opt,
        SolverReport {
            initial_cost,
            final_cost,
            termination,
            message: format!("{:?}", report.termination),
            num_successful_steps: problem.tally.successful,
            num_unsuccessful_steps: problem.tally.unsuccessful,
        },
    )
}
