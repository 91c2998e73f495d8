//! Grid pressure solvers: the entry point of the projection.
//!
//! One call runs the whole pipeline:
//! 1. check that input and output grids match and `dt` is usable
//! 2. classify cells and faces
//! 3. constrain a working copy of the input on solid faces
//! 4. assemble the Poisson system in the requested layout
//! 5. solve it
//! 6. subtract the pressure gradient into the output grid
//!
//! Everything that can fail happens before step 6, so an error never leaves
//! `output` partially written.

use std::fmt;

use crate::boundary::{BoundaryConditionSolver, Boundaries, FaceSampledBoundaryConditionSolver};
use crate::config::PressureSolverConfig;
use crate::error::PressureError;
use crate::grid::{CellCenteredScalarGrid2, FaceCenteredGrid2};
use crate::linear_solver::vector_ops::norm_inf;
use crate::linear_solver::{create_linear_solver, LinearSolver, SolveReport, SolverStatus};
use crate::projection::{apply_pressure_gradient, max_fluid_divergence};
use crate::system::{build_system, SystemLayout};

/// Result of a successful projection.
#[derive(Debug, Clone)]
pub struct ProjectionReport {
    /// Solved pressure; zero outside fluid cells
    pub pressure: CellCenteredScalarGrid2,
    pub solve: SolveReport,
    pub layout: SystemLayout,
    /// Cells that received a pressure unknown
    pub fluid_cells: usize,
    /// Row-major indices of fluid cells excluded because all their faces
    /// were solid
    pub isolated_cells: Vec<usize>,
    /// Largest |∇·u| over fluid cells of the output
    pub max_divergence: f64,
}

impl ProjectionReport {
    pub fn is_converged(&self) -> bool {
        self.solve.is_converged()
    }
}

/// Makes a staggered velocity field divergence-free.
pub trait GridPressureSolver: fmt::Debug + Send + Sync {
    /// Project `input` into `output`.
    ///
    /// `input` and `output` must share the same [`GridIndexSpace`](crate::GridIndexSpace).
    /// Failure to reach the linear tolerance is not an error: the best-effort
    /// pressure is applied and the report says so.
    fn solve(
        &self,
        input: &FaceCenteredGrid2,
        dt: f64,
        output: &mut FaceCenteredGrid2,
        boundaries: &Boundaries<'_>,
        layout: SystemLayout,
    ) -> Result<ProjectionReport, PressureError>;

    /// Boundary handling this solver was designed for.
    fn suggested_boundary_condition_solver(&self) -> Box<dyn BoundaryConditionSolver>;
}

/// Single-phase (fluid / air / solid) pressure projection.
#[derive(Debug)]
pub struct SinglePhasePressureSolver {
    config: PressureSolverConfig,
    boundary_solver: Box<dyn BoundaryConditionSolver>,
    linear_solver: Box<dyn LinearSolver>,
}

impl SinglePhasePressureSolver {
    /// Fails with [`PressureError::Config`] if `config` does not validate.
    pub fn new(config: PressureSolverConfig) -> Result<Self, PressureError> {
        config.validate()?;
        let linear_solver = create_linear_solver(&config);
        Ok(Self {
            config,
            boundary_solver: Box::new(FaceSampledBoundaryConditionSolver::default()),
            linear_solver,
        })
    }

    /// Replace the boundary condition strategy.
    pub fn with_boundary_condition_solver(
        mut self,
        boundary_solver: Box<dyn BoundaryConditionSolver>,
    ) -> Self {
        self.boundary_solver = boundary_solver;
        self
    }

    /// Replace the linear solver built from the configuration.
    pub fn with_linear_solver(mut self, linear_solver: Box<dyn LinearSolver>) -> Self {
        self.linear_solver = linear_solver;
        self
    }

    pub fn config(&self) -> &PressureSolverConfig {
        &self.config
    }

    pub fn boundary_condition_solver(&self) -> &dyn BoundaryConditionSolver {
        self.boundary_solver.as_ref()
    }

    pub fn linear_solver(&self) -> &dyn LinearSolver {
        self.linear_solver.as_ref()
    }
}

impl Default for SinglePhasePressureSolver {
    fn default() -> Self {
        Self {
            config: PressureSolverConfig::default(),
            boundary_solver: Box::new(FaceSampledBoundaryConditionSolver::default()),
            linear_solver: create_linear_solver(&PressureSolverConfig::default()),
        }
    }
}

impl GridPressureSolver for SinglePhasePressureSolver {
    fn solve(
        &self,
        input: &FaceCenteredGrid2,
        dt: f64,
        output: &mut FaceCenteredGrid2,
        boundaries: &Boundaries<'_>,
        layout: SystemLayout,
    ) -> Result<ProjectionReport, PressureError> {
        let space = *input.space();
        if output.space() != &space {
            return Err(PressureError::ShapeMismatch {
                input: space,
                output: *output.space(),
            });
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PressureError::InvalidTimeStep(dt));
        }
        let density = self.config.density;

        let markers = self.boundary_solver.classify(&space, boundaries)?;
        let mut constrained = input.clone();
        self.boundary_solver
            .constrain_velocity(&markers, boundaries.velocity, &mut constrained)?;

        let system = build_system(&markers, &constrained, density, dt, layout);
        let mut x = vec![0.0; system.dim()];
        let solve = self
            .linear_solver
            .solve(system.operator(), system.rhs(), &mut x);

        match solve.status {
            SolverStatus::Converged => log::debug!(
                "{} converged in {} iterations (residual {:.3e})",
                self.linear_solver.name(),
                solve.iterations,
                solve.residual
            ),
            SolverStatus::MaxIterationsReached | SolverStatus::Breakdown => log::warn!(
                "{} stopped without converging ({:?}) after {} iterations: residual {:.3e}, threshold {:.3e}",
                self.linear_solver.name(),
                solve.status,
                solve.iterations,
                solve.residual,
                self.config
                    .iteration_control()
                    .threshold(norm_inf(system.rhs()))
            ),
        }

        let mut pressure = CellCenteredScalarGrid2::new(space);
        system.scatter(&x, &mut pressure);
        apply_pressure_gradient(&markers, &pressure, &constrained, density, dt, output);

        let max_divergence = max_fluid_divergence(&markers, output);
        log::debug!(
            "Projected {}: {} fluid cells, {} isolated, max divergence {:.3e}",
            space,
            markers.fluid_count(),
            markers.isolated().len(),
            max_divergence
        );

        Ok(ProjectionReport {
            pressure,
            solve,
            layout,
            fluid_cells: markers.fluid_count(),
            isolated_cells: markers.isolated().to_vec(),
            max_divergence,
        })
    }

    fn suggested_boundary_condition_solver(&self) -> Box<dyn BoundaryConditionSolver> {
        Box::new(FaceSampledBoundaryConditionSolver::default())
    }
}
