//! Pressure projection diagnostic.
//!
//! Projects a divergent flow past a cylinder under a free surface with every
//! linear solver and both system layouts, and prints what each one reports.
//!
//! Run with `RUST_LOG=debug` to see per-solve logging. An optional JSON
//! config path overrides the defaults for the first run.

use std::path::Path;

use pressure::geometry::Circle;
use pressure::{
    Boundaries, DVec2, FaceCenteredGrid2, FnScalarField2, GridIndexSpace, GridPressureSolver,
    LinearSolverKind, PressureSolverConfig, SinglePhasePressureSolver, SystemLayout,
};

fn inflow(space: GridIndexSpace) -> FaceCenteredGrid2 {
    let mut velocity = FaceCenteredGrid2::new(space);
    for j in 0..space.height {
        for i in 0..=space.width {
            let p = space.u_position(i, j);
            // Shear profile with a bump, nowhere near divergence-free
            velocity.set_u(i, j, 1.0 + 0.5 * p.y + 0.3 * (3.0 * p.x).sin());
        }
    }
    velocity
}

fn main() {
    env_logger::init();

    println!("=== PRESSURE PROJECTION DIAGNOSTIC ===\n");

    let space = GridIndexSpace::uniform(48, 24, 1.0 / 16.0);
    let input = inflow(space);
    let cylinder = Circle::new(DVec2::new(1.0, 0.6), 0.25);
    let surface = FnScalarField2(|p: DVec2| p.y - 1.2);
    let boundaries = Boundaries::new()
        .with_solid_sdf(&cylinder)
        .with_fluid_sdf(&surface);
    let dt = 1.0 / 60.0;

    let first = match std::env::args().nth(1) {
        Some(path) => match PressureSolverConfig::load_json(Path::new(&path)) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => PressureSolverConfig::default(),
    };

    let configs = [
        first,
        PressureSolverConfig::default().with_linear_solver(LinearSolverKind::ConjugateGradient),
        PressureSolverConfig::default()
            .with_linear_solver(LinearSolverKind::GaussSeidel {
                sor_factor: 1.8,
                red_black: true,
            })
            .with_max_iterations(5000),
        PressureSolverConfig::default()
            .with_linear_solver(LinearSolverKind::jacobi())
            .with_max_iterations(20000)
            .with_tolerance(1e-6),
    ];

    println!("Grid: {}", space);
    println!(
        "Input max divergence: {:.3e}\n",
        input.max_abs_divergence(|_, _| true)
    );

    for config in configs {
        let solver = match SinglePhasePressureSolver::new(config) {
            Ok(solver) => solver,
            Err(err) => {
                eprintln!("Invalid config: {}", err);
                continue;
            }
        };

        for layout in [SystemLayout::Dense, SystemLayout::Compressed] {
            let mut output = FaceCenteredGrid2::new(space);
            let start = std::time::Instant::now();
            let report = match solver.solve(&input, dt, &mut output, &boundaries, layout) {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("Projection failed: {}", err);
                    continue;
                }
            };
            let elapsed = start.elapsed();
            let (p_min, p_max) = report.pressure.min_max();

            println!(
                "{:<20} {:<10?} {:?} after {:>5} iters ({:.2?})",
                solver.linear_solver().name(),
                layout,
                report.solve.status,
                report.solve.iterations,
                elapsed
            );
            println!(
                "    fluid cells: {}, isolated: {}, residual: {:.3e} (from {:.3e})",
                report.fluid_cells,
                report.isolated_cells.len(),
                report.solve.residual,
                report.solve.initial_residual
            );
            println!(
                "    pressure range: [{:.4}, {:.4}], max divergence: {:.3e}",
                p_min, p_max, report.max_divergence
            );
        }
    }
}
