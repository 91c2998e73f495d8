//! Pressure solver configuration.
//!
//! Serializable so a simulation can keep its projection settings next to the
//! rest of its scene description.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DENSITY, DEFAULT_JACOBI_RELAXATION, DEFAULT_MAX_ITERATIONS,
    DEFAULT_RELATIVE_TOLERANCE, DEFAULT_RESIDUAL_CHECK_INTERVAL, DEFAULT_SOR_FACTOR,
    DEFAULT_TOLERANCE,
};
use crate::error::ConfigError;
use crate::linear_solver::IterationControl;

/// Which iterative method solves the pressure system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    Jacobi {
        relaxation: f64,
    },
    GaussSeidel {
        sor_factor: f64,
        red_black: bool,
    },
    ConjugateGradient,
    /// Incomplete-Cholesky preconditioned conjugate gradient
    #[default]
    Iccg,
}

impl LinearSolverKind {
    pub fn jacobi() -> Self {
        LinearSolverKind::Jacobi {
            relaxation: DEFAULT_JACOBI_RELAXATION,
        }
    }

    pub fn gauss_seidel() -> Self {
        LinearSolverKind::GaussSeidel {
            sor_factor: DEFAULT_SOR_FACTOR,
            red_black: false,
        }
    }
}

/// Settings for [`SinglePhasePressureSolver`](crate::SinglePhasePressureSolver).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureSolverConfig {
    /// Fluid density ρ in `∇·(∇p/ρ) = ∇·u*/dt`
    pub density: f64,
    pub linear_solver: LinearSolverKind,
    /// Absolute max-norm residual at which the linear solve stops
    pub tolerance: f64,
    /// Residual target as a fraction of the right-hand side's max-norm; the
    /// solve stops at whichever of the two targets is larger
    pub relative_tolerance: f64,
    pub max_iterations: usize,
    /// Jacobi and Gauss-Seidel only evaluate the residual every N sweeps
    pub residual_check_interval: usize,
}

impl Default for PressureSolverConfig {
    fn default() -> Self {
        Self {
            density: DEFAULT_DENSITY,
            linear_solver: LinearSolverKind::default(),
            tolerance: DEFAULT_TOLERANCE,
            relative_tolerance: DEFAULT_RELATIVE_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            residual_check_interval: DEFAULT_RESIDUAL_CHECK_INTERVAL,
        }
    }
}

impl PressureSolverConfig {
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_linear_solver(mut self, kind: LinearSolverKind) -> Self {
        self.linear_solver = kind;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_relative_tolerance(mut self, relative_tolerance: f64) -> Self {
        self.relative_tolerance = relative_tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_residual_check_interval(mut self, interval: usize) -> Self {
        self.residual_check_interval = interval;
        self
    }

    pub fn iteration_control(&self) -> IterationControl {
        IterationControl {
            tolerance: self.tolerance,
            relative_tolerance: self.relative_tolerance,
            max_iterations: self.max_iterations,
            residual_check_interval: self.residual_check_interval,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(ConfigError::InvalidDensity(self.density));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if !(0.0..1.0).contains(&self.relative_tolerance) {
            return Err(ConfigError::OutOfRange {
                name: "relative_tolerance",
                value: self.relative_tolerance,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.residual_check_interval == 0 {
            return Err(ConfigError::ZeroCheckInterval);
        }
        match self.linear_solver {
            LinearSolverKind::Jacobi { relaxation } => {
                check_open_closed("relaxation", relaxation, 0.0, 1.0)
            }
            LinearSolverKind::GaussSeidel { sor_factor, .. } => {
                check_open("sor_factor", sor_factor, 0.0, 2.0)
            }
            LinearSolverKind::ConjugateGradient | LinearSolverKind::Iccg => Ok(()),
        }
    }

    /// Save configuration to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file. Missing fields take
    /// their defaults.
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

/// value in (min, max]
fn check_open_closed(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value > min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

/// value in (min, max)
fn check_open(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value > min && value < max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PressureSolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.linear_solver, LinearSolverKind::Iccg);
        assert_eq!(config.density, 1.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_density = PressureSolverConfig::default().with_density(0.0);
        assert!(matches!(
            bad_density.validate(),
            Err(ConfigError::InvalidDensity(_))
        ));

        let bad_tol = PressureSolverConfig::default().with_tolerance(f64::NAN);
        assert!(matches!(bad_tol.validate(), Err(ConfigError::InvalidTolerance(_))));

        for rtol in [-1e-9, 1.0, f64::NAN] {
            let bad_rtol = PressureSolverConfig::default().with_relative_tolerance(rtol);
            assert!(matches!(
                bad_rtol.validate(),
                Err(ConfigError::OutOfRange {
                    name: "relative_tolerance",
                    ..
                })
            ));
        }
        assert!(PressureSolverConfig::default()
            .with_relative_tolerance(0.0)
            .validate()
            .is_ok());

        let no_iters = PressureSolverConfig::default().with_max_iterations(0);
        assert!(matches!(no_iters.validate(), Err(ConfigError::ZeroIterations)));

        let bad_sor = PressureSolverConfig::default().with_linear_solver(
            LinearSolverKind::GaussSeidel {
                sor_factor: 2.0,
                red_black: true,
            },
        );
        assert!(matches!(
            bad_sor.validate(),
            Err(ConfigError::OutOfRange {
                name: "sor_factor",
                ..
            })
        ));

        let bad_jacobi = PressureSolverConfig::default()
            .with_linear_solver(LinearSolverKind::Jacobi { relaxation: 1.5 });
        assert!(bad_jacobi.validate().is_err());
    }

    #[test]
    fn test_json_save_load() {
        let config = PressureSolverConfig::default()
            .with_density(crate::constants::WATER_DENSITY)
            .with_relative_tolerance(1e-8)
            .with_linear_solver(LinearSolverKind::gauss_seidel())
            .with_max_iterations(250);
        let path = std::env::temp_dir().join(format!(
            "pressure_config_test_{}.json",
            std::process::id()
        ));
        config.save_json(&path).unwrap();
        let loaded = PressureSolverConfig::load_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: PressureSolverConfig = serde_json::from_str(r#"{ "density": 2.5 }"#).unwrap();
        assert_eq!(config.density, 2.5);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.relative_tolerance, DEFAULT_RELATIVE_TOLERANCE);
        assert_eq!(
            config.iteration_control().threshold(1e6),
            DEFAULT_RELATIVE_TOLERANCE * 1e6
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = PressureSolverConfig::load_json(Path::new("/nonexistent/pressure.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
