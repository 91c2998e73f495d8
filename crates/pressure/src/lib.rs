//! Pressure projection for 2D staggered-grid incompressible flow
//!
//! Takes an intermediate velocity field (after advection and body forces)
//! and removes its divergence by solving a pressure Poisson equation,
//! honoring solid obstacles, moving boundaries and a free surface.
//!
//! # Example
//!
//! ```
//! use glam::DVec2;
//! use pressure::{
//!     Boundaries, FaceCenteredGrid2, GridIndexSpace, GridPressureSolver,
//!     SinglePhasePressureSolver, SystemLayout,
//! };
//!
//! let space = GridIndexSpace::uniform(4, 4, 1.0);
//! let input = FaceCenteredGrid2::with_velocity(space, DVec2::new(1.0, 0.0));
//! let mut output = FaceCenteredGrid2::new(space);
//!
//! let solver = SinglePhasePressureSolver::default();
//! let report = solver
//!     .solve(&input, 0.1, &mut output, &Boundaries::default(), SystemLayout::Dense)
//!     .unwrap();
//!
//! // Uniform flow is already divergence-free
//! assert!(report.is_converged());
//! assert!(report.pressure.data().iter().all(|p| p.abs() < 1e-9));
//! assert!((output.u_at(2, 2) - 1.0).abs() < 1e-9);
//! ```

pub mod boundary;
pub mod config;
pub mod constants;
pub mod error;
pub mod field;
pub mod geometry;
pub mod grid;
pub mod linear_solver;
pub mod marker;
pub mod projection;
pub mod serde_utils;
pub mod solver;
pub mod system;

pub use boundary::{
    BlockedBoundaryConditionSolver, Boundaries, BoundaryConditionSolver,
    FaceSampledBoundaryConditionSolver, FluidRegion, SolidRegion,
};
pub use config::{LinearSolverKind, PressureSolverConfig};
pub use error::{ConfigError, FieldKind, PressureError};
pub use field::{
    ConstantScalarField2, ConstantVectorField2, FnScalarField2, FnVectorField2, ScalarField2,
    VectorField2,
};
pub use glam::DVec2;
pub use grid::{CellCenteredScalarGrid2, FaceCenteredGrid2, GridIndexSpace};
pub use linear_solver::{
    ConjugateGradientSolver, GaussSeidelSolver, IccgSolver, IterationControl, JacobiSolver,
    LinearSolver, SolveReport, SolverStatus,
};
pub use marker::{classify, DomainEdges, EdgeCondition, Marker, Markers, SolidRule};
pub use solver::{GridPressureSolver, ProjectionReport, SinglePhasePressureSolver};
pub use system::{LinearOperator, PressureSystem, SystemLayout};
