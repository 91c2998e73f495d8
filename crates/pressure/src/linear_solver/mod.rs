//! Iterative solvers for the pressure system.
//!
//! - [`JacobiSolver`]: weighted Jacobi, parallel per row
//! - [`GaussSeidelSolver`]: Gauss-Seidel / SOR, natural or red-black order
//! - [`ConjugateGradientSolver`]: unpreconditioned CG
//! - [`IccgSolver`]: CG with an incomplete Cholesky preconditioner
//!
//! All of them treat `x` as the initial guess, keep no state between calls
//! and measure convergence with the max-norm of `b - A x` against
//! [`IterationControl::threshold`].

mod cg;
mod gauss_seidel;
mod jacobi;
pub mod vector_ops;

pub use cg::{ConjugateGradientSolver, IccgSolver, IncompleteCholesky};
pub use gauss_seidel::GaussSeidelSolver;
pub use jacobi::JacobiSolver;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{LinearSolverKind, PressureSolverConfig};
use crate::constants::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_RELATIVE_TOLERANCE, DEFAULT_RESIDUAL_CHECK_INTERVAL,
    DEFAULT_TOLERANCE,
};
use crate::system::LinearOperator;

/// Why an iterative solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// Residual at or below the control's threshold
    Converged,
    /// Iteration cap hit; `x` holds the last iterate
    MaxIterationsReached,
    /// Search direction lost positive curvature (CG family)
    Breakdown,
}

/// Outcome of one linear solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolverStatus,
    pub iterations: usize,
    /// ||b - A x||∞ at exit
    pub residual: f64,
    /// ||b - A x0||∞
    pub initial_residual: f64,
}

impl SolveReport {
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    pub(crate) fn converged_at_start(residual: f64) -> Self {
        Self {
            status: SolverStatus::Converged,
            iterations: 0,
            residual,
            initial_residual: residual,
        }
    }
}

/// Stopping rule shared by every solver.
///
/// A solve converges once `||b - A x||∞ <= max(tolerance, relative_tolerance * ||b||∞)`.
/// The right-hand side of the pressure system scales with `ρ/dt`, so a purely
/// absolute target would sit below round-off for dense fluids or small steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationControl {
    /// Absolute max-norm residual target
    pub tolerance: f64,
    /// Residual target as a fraction of `||b||∞`
    pub relative_tolerance: f64,
    pub max_iterations: usize,
    /// Stationary methods evaluate the residual every this many sweeps
    pub residual_check_interval: usize,
}

impl Default for IterationControl {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            relative_tolerance: DEFAULT_RELATIVE_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            residual_check_interval: DEFAULT_RESIDUAL_CHECK_INTERVAL,
        }
    }
}

impl IterationControl {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            ..Default::default()
        }
    }

    pub fn with_relative_tolerance(mut self, relative_tolerance: f64) -> Self {
        self.relative_tolerance = relative_tolerance;
        self
    }

    /// Residual at which a solve of `A x = b` with `||b||∞ = rhs_norm` stops.
    #[inline]
    pub fn threshold(&self, rhs_norm: f64) -> f64 {
        self.tolerance.max(self.relative_tolerance * rhs_norm)
    }

    /// Whether a stationary solver should measure the residual after
    /// sweep `iteration` (1-based).
    #[inline]
    pub(crate) fn should_check(&self, iteration: usize) -> bool {
        iteration % self.residual_check_interval.max(1) == 0 || iteration == self.max_iterations
    }
}

/// Solves `A x = b` for a symmetric positive (semi-)definite operator.
pub trait LinearSolver: fmt::Debug + Send + Sync {
    /// `x` is the initial guess on entry and the solution on exit.
    fn solve(&self, a: &dyn LinearOperator, b: &[f64], x: &mut [f64]) -> SolveReport;

    fn name(&self) -> &'static str;
}

/// Instantiate the solver selected by `config`.
pub fn create_linear_solver(config: &PressureSolverConfig) -> Box<dyn LinearSolver> {
    let control = config.iteration_control();
    match config.linear_solver {
        LinearSolverKind::Jacobi { relaxation } => {
            Box::new(JacobiSolver::new(control).with_relaxation(relaxation))
        }
        LinearSolverKind::GaussSeidel {
            sor_factor,
            red_black,
        } => Box::new(
            GaussSeidelSolver::new(control)
                .with_sor_factor(sor_factor)
                .with_red_black(red_black),
        ),
        LinearSolverKind::ConjugateGradient => Box::new(ConjugateGradientSolver::new(control)),
        LinearSolverKind::Iccg => Box::new(IccgSolver::new(control)),
    }
}
