//! Error types for the pressure projection.

use glam::DVec2;
use thiserror::Error;

use crate::grid::GridIndexSpace;

/// Which caller-supplied field produced a bad sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    BoundarySdf,
    FluidSdf,
    BoundaryVelocity,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::BoundarySdf => "boundary SDF",
            FieldKind::FluidSdf => "fluid SDF",
            FieldKind::BoundaryVelocity => "boundary velocity",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`GridPressureSolver::solve`](crate::GridPressureSolver::solve).
///
/// None of these leave the output grid partially written: every check that
/// can fail runs before the first write to `output`.
#[derive(Debug, Error)]
pub enum PressureError {
    #[error("input and output grids differ: input {input}, output {output}")]
    ShapeMismatch {
        input: GridIndexSpace,
        output: GridIndexSpace,
    },

    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),

    #[error("{field} returned non-finite value {value} at ({}, {})", position.x, position.y)]
    InvalidFieldSample {
        field: FieldKind,
        position: DVec2,
        value: f64,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Invalid [`PressureSolverConfig`](crate::PressureSolverConfig) values, or
/// failure to load one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("density must be finite and positive, got {0}")]
    InvalidDensity(f64),

    #[error("tolerance must be finite and positive, got {0}")]
    InvalidTolerance(f64),

    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    #[error("residual_check_interval must be at least 1")]
    ZeroCheckInterval,

    #[error("{name} must lie in {min}..{max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
