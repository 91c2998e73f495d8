//! Pressure gradient subtraction.
//!
//! u_new = u* - (dt / ρ) ∂p/∂n on every face that is not solid and touches a
//! fluid cell. Pressure is zero in air cells and beyond open domain edges.

use rayon::prelude::*;

use crate::grid::{CellCenteredScalarGrid2, FaceCenteredGrid2};
use crate::marker::{Marker, Markers};

/// Pressure seen from a face: the solved value for fluid cells, zero for
/// air and for ghost cells outside the grid.
#[inline]
fn face_side_pressure(
    markers: &Markers,
    pressure: &CellCenteredScalarGrid2,
    cell: Option<(usize, usize)>,
) -> (f64, bool) {
    match cell {
        Some((i, j)) if markers.cell(i, j) == Marker::Fluid => (pressure.get(i, j), true),
        _ => (0.0, false),
    }
}

/// Write the projected velocity into `output`.
///
/// Solid faces keep the (already constrained) value from `velocity`, as do
/// faces with no fluid on either side.
pub fn apply_pressure_gradient(
    markers: &Markers,
    pressure: &CellCenteredScalarGrid2,
    velocity: &FaceCenteredGrid2,
    density: f64,
    dt: f64,
    output: &mut FaceCenteredGrid2,
) {
    let space = *markers.space();
    debug_assert_eq!(&space, velocity.space());
    debug_assert_eq!(&space, output.space());
    debug_assert_eq!(&space, pressure.space());

    let scale = dt / density;
    let scale_x = scale / space.spacing.x;
    let scale_y = scale / space.spacing.y;
    let (width, height) = (space.width, space.height);

    let (out_u, out_v) = output.uv_mut();

    out_u
        .par_iter_mut()
        .zip(velocity.u().par_iter())
        .zip(markers.u_faces().par_iter())
        .enumerate()
        .for_each(|(idx, ((out, &u), &face))| {
            *out = u;
            if face == Marker::Solid {
                return;
            }
            let (i, j) = space.u_coords(idx);
            let (p_lo, lo_fluid) =
                face_side_pressure(markers, pressure, (i > 0).then(|| (i - 1, j)));
            let (p_hi, hi_fluid) =
                face_side_pressure(markers, pressure, (i < width).then_some((i, j)));
            if lo_fluid || hi_fluid {
                *out = u - scale_x * (p_hi - p_lo);
            }
        });

    out_v
        .par_iter_mut()
        .zip(velocity.v().par_iter())
        .zip(markers.v_faces().par_iter())
        .enumerate()
        .for_each(|(idx, ((out, &v), &face))| {
            *out = v;
            if face == Marker::Solid {
                return;
            }
            let (i, j) = space.v_coords(idx);
            let (p_lo, lo_fluid) =
                face_side_pressure(markers, pressure, (j > 0).then(|| (i, j - 1)));
            let (p_hi, hi_fluid) =
                face_side_pressure(markers, pressure, (j < height).then_some((i, j)));
            if lo_fluid || hi_fluid {
                *out = v - scale_y * (p_hi - p_lo);
            }
        });
}

/// Largest |∇·u| over fluid cells.
pub fn max_fluid_divergence(markers: &Markers, velocity: &FaceCenteredGrid2) -> f64 {
    velocity.max_abs_divergence(|i, j| markers.is_fluid(i, j))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridIndexSpace;
    use crate::marker::DomainEdges;

    #[test]
    fn test_gradient_between_fluid_cells() {
        let space = GridIndexSpace::uniform(2, 1, 0.5);
        let markers = Markers::from_cells(space, vec![Marker::Fluid; 2], DomainEdges::all_open());
        let pressure = CellCenteredScalarGrid2::from_data(space, vec![1.0, 3.0]);
        let velocity = FaceCenteredGrid2::new(space);
        let mut out = FaceCenteredGrid2::new(space);

        apply_pressure_gradient(&markers, &pressure, &velocity, 2.0, 0.1, &mut out);

        // dt/ρ = 0.05, h = 0.5
        assert!((out.u_at(1, 0) - (-0.05 * 2.0 / 0.5)).abs() < 1e-12);
        // Open left edge: ghost pressure 0
        assert!((out.u_at(0, 0) - (-0.05 * 1.0 / 0.5)).abs() < 1e-12);
        assert!((out.u_at(2, 0) - (0.05 * 3.0 / 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_solid_and_air_faces_copy_input() {
        let space = GridIndexSpace::uniform(3, 1, 1.0);
        let cells = vec![Marker::Solid, Marker::Fluid, Marker::Air];
        let markers = Markers::from_cells(space, cells, DomainEdges::all_closed());
        let pressure = CellCenteredScalarGrid2::from_data(space, vec![0.0, 5.0, 0.0]);
        let mut velocity = FaceCenteredGrid2::new(space);
        velocity.u_mut().copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        let mut out = FaceCenteredGrid2::new(space);

        apply_pressure_gradient(&markers, &pressure, &velocity, 1.0, 1.0, &mut out);

        assert_eq!(out.u_at(0, 0), 0.1);
        assert_eq!(out.u_at(1, 0), 0.2, "solid face keeps its value");
        assert_eq!(out.u_at(2, 0), 0.3 - (0.0 - 5.0), "fluid-air face");
        assert_eq!(out.u_at(3, 0), 0.4, "closed edge");
    }
}
