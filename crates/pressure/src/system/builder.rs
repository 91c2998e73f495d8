//! Assembly of the pressure Poisson equations from markers and velocity.

use rayon::prelude::*;

use crate::grid::{FaceCenteredGrid2, GridIndexSpace};
use crate::marker::{Marker, Markers};

use super::compressed::{CompressedSystem, CsrMatrix, FluidIndexMap};
use super::dense::{DenseSystem, StencilMatrix, StencilRow};
use super::{PressureSystem, SystemLayout};

/// Five-point stencil of one fluid cell. Coefficients are zero where the
/// neighbor is not a coupled fluid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Stencil {
    pub center: f64,
    pub left: f64,
    pub right: f64,
    pub down: f64,
    pub up: f64,
    /// At least one open face leads to a zero-pressure cell (air or
    /// outside an open edge).
    pub dirichlet: bool,
}

impl Stencil {
    /// Coupled neighbors as (cell index, coefficient).
    pub fn neighbors(&self, idx: usize, width: usize) -> impl Iterator<Item = (usize, f64)> {
        // Nonzero coefficients imply the neighbor exists
        [
            (self.down != 0.0).then(|| (idx.wrapping_sub(width), self.down)),
            (self.left != 0.0).then(|| (idx.wrapping_sub(1), self.left)),
            (self.right != 0.0).then(|| (idx + 1, self.right)),
            (self.up != 0.0).then(|| (idx + width, self.up)),
        ]
        .into_iter()
        .flatten()
    }

    pub fn row(&self) -> StencilRow {
        StencilRow {
            center: self.center,
            right: self.right,
            up: self.up,
        }
    }
}

/// Contribution of one face to a fluid cell's stencil.
///
/// Returns `(diagonal, off_diagonal, dirichlet)`.
#[inline]
fn face_term(face: Marker, neighbor: Option<Marker>, inv_h2: f64) -> (f64, f64, bool) {
    if face == Marker::Solid {
        return (0.0, 0.0, false);
    }
    match neighbor {
        Some(Marker::Fluid) => (inv_h2, -inv_h2, false),
        // Air cell or ghost cell outside an open edge: p = 0
        _ => (inv_h2, 0.0, true),
    }
}

fn stencil_at(markers: &Markers, i: usize, j: usize) -> Option<Stencil> {
    if !markers.is_fluid(i, j) {
        return None;
    }
    let space = markers.space();
    let inv_hx2 = 1.0 / (space.spacing.x * space.spacing.x);
    let inv_hy2 = 1.0 / (space.spacing.y * space.spacing.y);

    let left = face_term(
        markers.u_face(i, j),
        (i > 0).then(|| markers.cell(i - 1, j)),
        inv_hx2,
    );
    let right = face_term(
        markers.u_face(i + 1, j),
        (i + 1 < space.width).then(|| markers.cell(i + 1, j)),
        inv_hx2,
    );
    let down = face_term(
        markers.v_face(i, j),
        (j > 0).then(|| markers.cell(i, j - 1)),
        inv_hy2,
    );
    let up = face_term(
        markers.v_face(i, j + 1),
        (j + 1 < space.height).then(|| markers.cell(i, j + 1)),
        inv_hy2,
    );

    Some(Stencil {
        center: left.0 + right.0 + down.0 + up.0,
        left: left.1,
        right: right.1,
        down: down.1,
        up: up.1,
        dirichlet: left.2 || right.2 || down.2 || up.2,
    })
}

/// Per-cell stencils (None for non-fluid cells) and right-hand side.
///
/// `rhs = -(density / dt) * div(u*)` at fluid cells, zero elsewhere.
fn assemble(
    markers: &Markers,
    velocity: &FaceCenteredGrid2,
    density: f64,
    dt: f64,
) -> (Vec<Option<Stencil>>, Vec<f64>) {
    let space = *markers.space();
    debug_assert_eq!(&space, velocity.space());
    let scale = -density / dt;

    let (stencils, mut rhs): (Vec<Option<Stencil>>, Vec<f64>) = (0..space.cell_count())
        .into_par_iter()
        .map(|idx| {
            let (i, j) = space.cell_coords(idx);
            match stencil_at(markers, i, j) {
                Some(stencil) => (Some(stencil), scale * velocity.divergence_at(i, j)),
                None => (None, 0.0),
            }
        })
        .unzip();

    let enclosed = remove_enclosed_means(&space, &stencils, &mut rhs);
    if enclosed > 0 {
        log::debug!(
            "Removed net source from {} enclosed fluid regions",
            enclosed
        );
    }

    (stencils, rhs)
}

/// A fluid region with no zero-pressure contact is pure Neumann: its matrix
/// is singular with the constant vector as null space. Subtracting the mean
/// of its right-hand side makes it consistent.
///
/// Returns the number of such regions.
fn remove_enclosed_means(
    space: &GridIndexSpace,
    stencils: &[Option<Stencil>],
    rhs: &mut [f64],
) -> usize {
    let width = space.width;
    let mut visited = vec![false; stencils.len()];
    let mut stack = Vec::new();
    let mut region = Vec::new();
    let mut enclosed = 0;

    for seed in 0..stencils.len() {
        if visited[seed] || stencils[seed].is_none() {
            continue;
        }
        visited[seed] = true;
        stack.push(seed);
        region.clear();
        let mut open = false;

        while let Some(idx) = stack.pop() {
            let Some(stencil) = stencils[idx] else {
                continue;
            };
            region.push(idx);
            open |= stencil.dirichlet;
            for (neighbor, _) in stencil.neighbors(idx, width) {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }

        if !open {
            let mean = region.iter().map(|&idx| rhs[idx]).sum::<f64>() / region.len() as f64;
            for &idx in &region {
                rhs[idx] -= mean;
            }
            enclosed += 1;
        }
    }

    enclosed
}

/// Assemble the system in the dense (one row per cell) layout.
pub fn build_dense_system(
    markers: &Markers,
    velocity: &FaceCenteredGrid2,
    density: f64,
    dt: f64,
) -> DenseSystem {
    let (stencils, rhs) = assemble(markers, velocity, density, dt);
    let rows = stencils
        .par_iter()
        .map(|stencil| stencil.map_or(StencilRow::IDENTITY, |s| s.row()))
        .collect();

    DenseSystem {
        matrix: StencilMatrix::from_rows(*markers.space(), rows),
        rhs,
    }
}

/// Assemble the system with rows only for fluid cells.
pub fn build_compressed_system(
    markers: &Markers,
    velocity: &FaceCenteredGrid2,
    density: f64,
    dt: f64,
) -> CompressedSystem {
    let (stencils, cell_rhs) = assemble(markers, velocity, density, dt);
    let index_map = FluidIndexMap::new(markers.cells());
    let width = markers.space().width;

    let rows: Vec<Vec<(usize, f64)>> = index_map
        .rows()
        .par_iter()
        .map(|&cell| {
            let Some(stencil) = stencils[cell] else {
                return Vec::new();
            };
            let mut entries: Vec<(usize, f64)> = stencil
                .neighbors(cell, width)
                .filter_map(|(neighbor, coeff)| index_map.row_of(neighbor).map(|col| (col, coeff)))
                .collect();
            if let Some(row) = index_map.row_of(cell) {
                entries.push((row, stencil.center));
            }
            entries.sort_unstable_by_key(|&(col, _)| col);
            entries
        })
        .collect();

    let rhs = index_map.rows().iter().map(|&cell| cell_rhs[cell]).collect();

    CompressedSystem {
        matrix: CsrMatrix::from_rows(&rows),
        rhs,
        index_map,
    }
}

/// Assemble the pressure system for the fluid cells of `markers`.
///
/// `velocity` must already carry the boundary velocity on solid faces.
pub fn build_system(
    markers: &Markers,
    velocity: &FaceCenteredGrid2,
    density: f64,
    dt: f64,
    layout: SystemLayout,
) -> PressureSystem {
    let system = match layout {
        SystemLayout::Dense => {
            PressureSystem::Dense(build_dense_system(markers, velocity, density, dt))
        }
        SystemLayout::Compressed => {
            PressureSystem::Compressed(build_compressed_system(markers, velocity, density, dt))
        }
    };
    log::debug!(
        "Assembled {:?} pressure system: {} rows for {} fluid cells",
        layout,
        system.dim(),
        markers.fluid_count()
    );
    system
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::DomainEdges;
    use crate::system::LinearOperator;
    use glam::DVec2;

    fn all_fluid(width: usize, height: usize, edges: DomainEdges) -> Markers {
        let space = GridIndexSpace::uniform(width, height, 1.0);
        Markers::from_cells(space, vec![Marker::Fluid; width * height], edges)
    }

    #[test]
    fn test_interior_stencil_is_five_point_laplacian() {
        let markers = all_fluid(3, 3, DomainEdges::all_open());
        let s = stencil_at(&markers, 1, 1).unwrap();
        assert_eq!(s.center, 4.0);
        assert_eq!([s.left, s.right, s.down, s.up], [-1.0; 4]);
        assert!(!s.dirichlet);
    }

    #[test]
    fn test_open_edge_adds_diagonal_only() {
        let markers = all_fluid(3, 3, DomainEdges::all_open());
        let corner = stencil_at(&markers, 0, 0).unwrap();
        assert_eq!(corner.center, 4.0);
        assert_eq!(corner.left, 0.0);
        assert_eq!(corner.down, 0.0);
        assert!(corner.dirichlet);
    }

    #[test]
    fn test_closed_edge_is_neumann() {
        let markers = all_fluid(3, 3, DomainEdges::all_closed());
        let corner = stencil_at(&markers, 0, 0).unwrap();
        assert_eq!(corner.center, 2.0);
        assert!(!corner.dirichlet);
    }

    #[test]
    fn test_anisotropic_spacing() {
        let space = GridIndexSpace::new(3, 3, DVec2::new(0.5, 2.0), DVec2::ZERO);
        let markers = Markers::from_cells(space, vec![Marker::Fluid; 9], DomainEdges::all_open());
        let s = stencil_at(&markers, 1, 1).unwrap();
        assert_eq!(s.left, -4.0);
        assert_eq!(s.up, -0.25);
        assert_eq!(s.center, 8.5);
    }

    #[test]
    fn test_air_neighbor_drops_off_diagonal() {
        let space = GridIndexSpace::uniform(2, 1, 1.0);
        let markers = Markers::from_cells(
            space,
            vec![Marker::Fluid, Marker::Air],
            DomainEdges::all_closed(),
        );
        let s = stencil_at(&markers, 0, 0).unwrap();
        assert_eq!(s.center, 1.0);
        assert_eq!(s.right, 0.0);
        assert!(s.dirichlet);
    }

    #[test]
    fn test_dense_and_compressed_agree() {
        let space = GridIndexSpace::uniform(4, 3, 1.0);
        let mut cells = vec![Marker::Fluid; 12];
        cells[space.cell_index(1, 1)] = Marker::Solid;
        cells[space.cell_index(3, 2)] = Marker::Air;
        let markers = Markers::from_cells(space, cells, DomainEdges::open_top());
        let mut velocity = FaceCenteredGrid2::new(space);
        for (idx, u) in velocity.u_mut().iter_mut().enumerate() {
            *u = (idx as f64 * 0.37).sin();
        }

        let dense = build_dense_system(&markers, &velocity, 1.0, 0.1);
        let compressed = build_compressed_system(&markers, &velocity, 1.0, 0.1);
        assert_eq!(compressed.matrix.dim(), markers.fluid_count());

        for (row, &cell) in compressed.index_map.rows().iter().enumerate() {
            assert_eq!(dense.matrix.diagonal(cell), compressed.matrix.diagonal(row));
            assert_eq!(dense.rhs[cell], compressed.rhs[row]);
            let mut dense_entries = Vec::new();
            dense
                .matrix
                .for_each_neighbor(cell, &mut |col, a| dense_entries.push((col, a)));
            let mut compressed_entries = Vec::new();
            compressed.matrix.for_each_neighbor(row, &mut |col, a| {
                compressed_entries.push((compressed.index_map.cell_of(col), a))
            });
            dense_entries.sort_by_key(|&(c, _)| c);
            compressed_entries.sort_by_key(|&(c, _)| c);
            assert_eq!(dense_entries, compressed_entries, "row for cell {}", cell);
        }
    }

    #[test]
    fn test_dense_non_fluid_rows_are_identity() {
        let space = GridIndexSpace::uniform(2, 2, 1.0);
        let cells = vec![Marker::Fluid, Marker::Solid, Marker::Air, Marker::Fluid];
        let markers = Markers::from_cells(space, cells, DomainEdges::all_open());
        let velocity = FaceCenteredGrid2::with_velocity(space, DVec2::new(1.0, 0.0));
        let dense = build_dense_system(&markers, &velocity, 1.0, 1.0);
        for idx in [1, 2] {
            assert_eq!(dense.matrix.diagonal(idx), 1.0);
            assert_eq!(dense.rhs[idx], 0.0);
            let mut count = 0;
            dense.matrix.for_each_neighbor(idx, &mut |_, _| count += 1);
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_rhs_sign_and_scale() {
        let space = GridIndexSpace::uniform(3, 1, 1.0);
        let markers = Markers::from_cells(space, vec![Marker::Fluid; 3], DomainEdges::all_open());
        let mut velocity = FaceCenteredGrid2::new(space);
        // Source in the middle cell: div = +2
        velocity.set_u(1, 0, -1.0);
        velocity.set_u(2, 0, 1.0);
        let dense = build_dense_system(&markers, &velocity, 2.0, 0.5);
        assert_eq!(dense.rhs[1], -8.0);
        assert_eq!(dense.rhs[0], 4.0);
    }

    #[test]
    fn test_enclosed_region_rhs_sums_to_zero() {
        let markers = all_fluid(3, 3, DomainEdges::all_closed());
        let space = *markers.space();
        let mut velocity = FaceCenteredGrid2::new(space);
        // Unconstrained wall face leaves a net source
        velocity.set_u(1, 1, 0.3);
        velocity.set_v(2, 2, -0.7);
        velocity.set_u(3, 0, 5.0);

        let dense = build_dense_system(&markers, &velocity, 1.0, 1.0);
        let sum: f64 = dense.rhs.iter().sum();
        assert!(sum.abs() < 1e-12, "enclosed rhs sum {}", sum);
    }
}
