//! Default numerical parameters for the pressure projection.
//!
//! ## Units
//!
//! Density is whatever the caller's momentum equation uses. The default of
//! 1.0 makes the solved pressure a kinematic pressure (p / rho), which is the
//! usual choice for single-phase solvers that never see a physical density.

/// Default fluid density.
pub const DEFAULT_DENSITY: f64 = 1.0;

/// Density of water (kg/m³), for callers working in physical units.
pub const WATER_DENSITY: f64 = 1000.0;

// =============================================================================
// LINEAR SOLVER DEFAULTS
// =============================================================================

/// Absolute max-norm residual below which an iterative solve counts as
/// converged.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Residual target relative to the max-norm of the right-hand side. The
/// attainable relative residual of a 2-D Poisson solve in double precision
/// grows roughly with the cell count along one axis squared; 1e-10 stays above
/// that floor well past 256x256.
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-10;

/// Iteration cap for the iterative solvers.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Stationary solvers (Jacobi, Gauss-Seidel) only measure the residual every
/// this many sweeps; a residual evaluation costs as much as a sweep.
pub const DEFAULT_RESIDUAL_CHECK_INTERVAL: usize = 5;

/// Weighted Jacobi factor. 2/3 damps the checkerboard mode that plain Jacobi
/// never removes on pure-Neumann regions.
pub const DEFAULT_JACOBI_RELAXATION: f64 = 2.0 / 3.0;

/// Successive over-relaxation factor for Gauss-Seidel (1.0 = plain GS).
pub const DEFAULT_SOR_FACTOR: f64 = 1.0;

/// Incomplete Cholesky pivots smaller than this fraction of the original
/// diagonal are replaced by the diagonal itself.
pub const ICC_PIVOT_SAFETY: f64 = 0.25;

/// CG treats `p·Ap` below this as a breakdown.
pub const CG_BREAKDOWN_THRESHOLD: f64 = 1e-300;
