//! Weighted Jacobi iteration.
//!
//! x_new[i] = (1 - ω) x[i] + ω (b[i] - Σ a_ij x[j]) / a_ii
//!
//! Every row reads only the previous iterate, so rows update in parallel.

use rayon::prelude::*;

use crate::constants::DEFAULT_JACOBI_RELAXATION;
use crate::system::LinearOperator;

use super::vector_ops::{norm_inf, residual};
use super::{IterationControl, LinearSolver, SolveReport, SolverStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobiSolver {
    control: IterationControl,
    relaxation: f64,
}

impl JacobiSolver {
    pub fn new(control: IterationControl) -> Self {
        Self {
            control,
            relaxation: DEFAULT_JACOBI_RELAXATION,
        }
    }

    /// ω in (0, 1]; 1 is plain Jacobi.
    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    pub fn relaxation(&self) -> f64 {
        self.relaxation
    }
}

impl Default for JacobiSolver {
    fn default() -> Self {
        Self::new(IterationControl::default())
    }
}

impl LinearSolver for JacobiSolver {
    fn solve(&self, a: &dyn LinearOperator, b: &[f64], x: &mut [f64]) -> SolveReport {
        let n = a.dim();
        debug_assert_eq!(b.len(), n);
        debug_assert_eq!(x.len(), n);

        let threshold = self.control.threshold(norm_inf(b));
        let mut r = vec![0.0; n];
        let initial_residual = residual(a, b, x, &mut r);
        if initial_residual <= threshold {
            return SolveReport::converged_at_start(initial_residual);
        }

        let omega = self.relaxation;
        let mut next = vec![0.0; n];
        let mut last_residual = initial_residual;

        for iteration in 1..=self.control.max_iterations {
            {
                let current: &[f64] = x;
                next.par_iter_mut().enumerate().for_each(|(row, out)| {
                    let diag = a.diagonal(row);
                    if diag == 0.0 {
                        *out = current[row];
                        return;
                    }
                    let mut sum = b[row];
                    a.for_each_neighbor(row, &mut |col, coeff| sum -= coeff * current[col]);
                    *out = (1.0 - omega) * current[row] + omega * sum / diag;
                });
            }
            x.copy_from_slice(&next);

            if self.control.should_check(iteration) {
                last_residual = residual(a, b, x, &mut r);
                log::trace!("Jacobi iter {}: residual = {:.6e}", iteration, last_residual);
                if last_residual <= threshold {
                    return SolveReport {
                        status: SolverStatus::Converged,
                        iterations: iteration,
                        residual: last_residual,
                        initial_residual,
                    };
                }
            }
        }

        SolveReport {
            status: SolverStatus::MaxIterationsReached,
            iterations: self.control.max_iterations,
            residual: last_residual,
            initial_residual,
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_solver::test_support::poisson_1d;

    #[test]
    fn test_jacobi_converges_on_1d_poisson() {
        let a = poisson_1d(8);
        let b = vec![1.0; 8];
        let mut x = vec![0.0; 8];
        let solver = JacobiSolver::new(IterationControl::new(1e-8, 2000));
        let report = solver.solve(&a, &b, &mut x);
        assert!(report.is_converged(), "{:?}", report);
        // Exact solution of -x'' = 1 with zero ends: x_i = (i+1)(n-i)/2
        for (i, xi) in x.iter().enumerate() {
            let exact = ((i + 1) * (8 - i)) as f64 / 2.0;
            assert!((xi - exact).abs() < 1e-6, "x[{}] = {}, expected {}", i, xi, exact);
        }
    }

    #[test]
    fn test_zero_rhs_converges_immediately() {
        let a = poisson_1d(4);
        let mut x = vec![0.0; 4];
        let report = JacobiSolver::default().solve(&a, &[0.0; 4], &mut x);
        assert_eq!(report.iterations, 0);
        assert!(report.is_converged());
    }

    #[test]
    fn test_iteration_cap_reports_residual() {
        let a = poisson_1d(32);
        let b = vec![1.0; 32];
        let mut x = vec![0.0; 32];
        let solver = JacobiSolver::new(IterationControl::new(1e-12, 3));
        let report = solver.solve(&a, &b, &mut x);
        assert_eq!(report.status, SolverStatus::MaxIterationsReached);
        assert_eq!(report.iterations, 3);
        assert!(report.residual > 1e-12);
        assert!(report.residual <= report.initial_residual);
    }
}
