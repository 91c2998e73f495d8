//! 2D MAC (Marker-and-Cell) staggered grids.
//!
//! These are the minimal containers the projection reads and writes. The
//! time integrator owns them; the projection only borrows them for one call.

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::field::{ScalarField2, VectorField2};
use crate::serde_utils::{deserialize_dvec2, serialize_dvec2};

/// Resolution, origin and spacing of a cell grid.
///
/// Two grids are compatible only if all three match exactly; nothing is
/// inferred or resampled.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridIndexSpace {
    /// Number of cells in X direction
    pub width: usize,
    /// Number of cells in Y direction
    pub height: usize,
    /// World position of the lower-left grid corner
    #[serde(serialize_with = "serialize_dvec2", deserialize_with = "deserialize_dvec2")]
    pub origin: DVec2,
    /// Cell size per axis in world units
    #[serde(serialize_with = "serialize_dvec2", deserialize_with = "deserialize_dvec2")]
    pub spacing: DVec2,
}

impl GridIndexSpace {
    /// Create an index space with the given resolution, spacing and origin.
    ///
    /// # Panics
    ///
    /// If either component of `spacing` is not positive.
    pub fn new(width: usize, height: usize, spacing: DVec2, origin: DVec2) -> Self {
        assert!(
            spacing.x > 0.0 && spacing.y > 0.0,
            "spacing must be positive, got {:?}",
            spacing
        );
        Self {
            width,
            height,
            origin,
            spacing,
        }
    }

    /// Square cells of size `cell_size`, origin at zero.
    pub fn uniform(width: usize, height: usize, cell_size: f64) -> Self {
        Self::new(width, height, DVec2::splat(cell_size), DVec2::ZERO)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// U array has dimensions (width+1) x height.
    #[inline]
    pub fn u_count(&self) -> usize {
        (self.width + 1) * self.height
    }

    /// V array has dimensions width x (height+1).
    #[inline]
    pub fn v_count(&self) -> usize {
        self.width * (self.height + 1)
    }

    // ========== Index functions ==========

    /// Row-major index into cell-centered arrays.
    #[inline]
    pub fn cell_index(&self, i: usize, j: usize) -> usize {
        j * self.width + i
    }

    /// Inverse of [`cell_index`](Self::cell_index).
    #[inline]
    pub fn cell_coords(&self, idx: usize) -> (usize, usize) {
        (idx % self.width, idx / self.width)
    }

    /// Index into U velocity array (on left faces).
    #[inline]
    pub fn u_index(&self, i: usize, j: usize) -> usize {
        j * (self.width + 1) + i
    }

    #[inline]
    pub fn u_coords(&self, idx: usize) -> (usize, usize) {
        (idx % (self.width + 1), idx / (self.width + 1))
    }

    /// Index into V velocity array (on bottom faces).
    #[inline]
    pub fn v_index(&self, i: usize, j: usize) -> usize {
        j * self.width + i
    }

    #[inline]
    pub fn v_coords(&self, idx: usize) -> (usize, usize) {
        (idx % self.width, idx / self.width)
    }

    // ========== World position helpers ==========

    /// World position of cell center at grid indices (i, j).
    #[inline]
    pub fn cell_center(&self, i: usize, j: usize) -> DVec2 {
        self.origin + DVec2::new(i as f64 + 0.5, j as f64 + 0.5) * self.spacing
    }

    /// U nodes are on left faces: x = i*dx, y = (j+0.5)*dy
    #[inline]
    pub fn u_position(&self, i: usize, j: usize) -> DVec2 {
        self.origin + DVec2::new(i as f64, j as f64 + 0.5) * self.spacing
    }

    /// V nodes are on bottom faces: x = (i+0.5)*dx, y = j*dy
    #[inline]
    pub fn v_position(&self, i: usize, j: usize) -> DVec2 {
        self.origin + DVec2::new(i as f64 + 0.5, j as f64) * self.spacing
    }

    /// Iterate over all cell coordinates, row-major (i fastest).
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + Clone + '_ {
        (0..self.height).flat_map(move |j| (0..self.width).map(move |i| (i, j)))
    }
}

impl fmt::Display for GridIndexSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} cells, origin ({}, {}), spacing ({}, {})",
            self.width, self.height, self.origin.x, self.origin.y, self.spacing.x, self.spacing.y
        )
    }
}

/// Bilinear interpolation over a `nx` x `ny` lattice whose node (0, 0) sits
/// at `offset` (in cell units). Indices are clamped to the lattice.
fn bilinear(
    values: &[f64],
    nx: usize,
    ny: usize,
    space: &GridIndexSpace,
    offset: DVec2,
    pos: DVec2,
) -> f64 {
    if nx == 0 || ny == 0 {
        return 0.0;
    }
    let local = (pos - space.origin) / space.spacing - offset;

    let i = local.x.floor() as i64;
    let j = local.y.floor() as i64;
    let fx = (local.x - i as f64).clamp(0.0, 1.0);
    let fy = (local.y - j as f64).clamp(0.0, 1.0);

    let max_i = nx as i64 - 1;
    let max_j = ny as i64 - 1;
    let i0 = i.clamp(0, max_i) as usize;
    let i1 = (i + 1).clamp(0, max_i) as usize;
    let j0 = j.clamp(0, max_j) as usize;
    let j1 = (j + 1).clamp(0, max_j) as usize;

    let v00 = values[j0 * nx + i0];
    let v10 = values[j0 * nx + i1];
    let v01 = values[j1 * nx + i0];
    let v11 = values[j1 * nx + i1];

    let v0 = v00 * (1.0 - fx) + v10 * fx;
    let v1 = v01 * (1.0 - fx) + v11 * fx;
    v0 * (1.0 - fy) + v1 * fy
}

/// Face-centered (staggered) 2D velocity grid.
///
/// Velocity components are stored on cell faces:
/// - u (X-velocity) on left faces at x = i * dx
/// - v (Y-velocity) on bottom faces at y = j * dy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceCenteredGrid2 {
    space: GridIndexSpace,

    /// Size: (width+1) * height
    u: Vec<f64>,

    /// Size: width * (height+1)
    v: Vec<f64>,
}

impl FaceCenteredGrid2 {
    /// Create a zero velocity grid.
    pub fn new(space: GridIndexSpace) -> Self {
        Self {
            space,
            u: vec![0.0; space.u_count()],
            v: vec![0.0; space.v_count()],
        }
    }

    /// Create a grid with the same velocity on every face.
    pub fn with_velocity(space: GridIndexSpace, velocity: DVec2) -> Self {
        Self {
            space,
            u: vec![velocity.x; space.u_count()],
            v: vec![velocity.y; space.v_count()],
        }
    }

    /// Sample a vector field at every face midpoint.
    pub fn from_field(space: GridIndexSpace, field: &dyn VectorField2) -> Self {
        let mut grid = Self::new(space);
        for (idx, u) in grid.u.iter_mut().enumerate() {
            let (i, j) = space.u_coords(idx);
            *u = field.sample(space.u_position(i, j)).x;
        }
        for (idx, v) in grid.v.iter_mut().enumerate() {
            let (i, j) = space.v_coords(idx);
            *v = field.sample(space.v_position(i, j)).y;
        }
        grid
    }

    #[inline]
    pub fn space(&self) -> &GridIndexSpace {
        &self.space
    }

    // ========== Field accessors ==========

    pub fn u(&self) -> &[f64] {
        &self.u
    }

    pub fn u_mut(&mut self) -> &mut [f64] {
        &mut self.u
    }

    pub fn v(&self) -> &[f64] {
        &self.v
    }

    pub fn v_mut(&mut self) -> &mut [f64] {
        &mut self.v
    }

    /// Both components at once, for writers that touch u and v together.
    pub fn uv_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.u, &mut self.v)
    }

    #[inline]
    pub fn u_at(&self, i: usize, j: usize) -> f64 {
        self.u[self.space.u_index(i, j)]
    }

    #[inline]
    pub fn v_at(&self, i: usize, j: usize) -> f64 {
        self.v[self.space.v_index(i, j)]
    }

    #[inline]
    pub fn set_u(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.space.u_index(i, j);
        self.u[idx] = value;
    }

    #[inline]
    pub fn set_v(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.space.v_index(i, j);
        self.v[idx] = value;
    }

    /// Set every face to the same velocity.
    pub fn fill(&mut self, velocity: DVec2) {
        self.u.fill(velocity.x);
        self.v.fill(velocity.y);
    }

    /// Copy face values from a grid with the same index space.
    pub fn copy_from(&mut self, other: &FaceCenteredGrid2) {
        debug_assert_eq!(self.space, other.space);
        self.u.copy_from_slice(&other.u);
        self.v.copy_from_slice(&other.v);
    }

    // ========== Differential operators ==========

    /// Discrete divergence at cell (i, j).
    /// div(v) = du/dx + dv/dy
    #[inline]
    pub fn divergence_at(&self, i: usize, j: usize) -> f64 {
        let u_right = self.u_at(i + 1, j);
        let u_left = self.u_at(i, j);
        let v_top = self.v_at(i, j + 1);
        let v_bottom = self.v_at(i, j);

        (u_right - u_left) / self.space.spacing.x + (v_top - v_bottom) / self.space.spacing.y
    }

    /// Largest |divergence| over the cells accepted by `include`.
    pub fn max_abs_divergence(&self, include: impl Fn(usize, usize) -> bool) -> f64 {
        self.space
            .cells()
            .filter(|&(i, j)| include(i, j))
            .map(|(i, j)| self.divergence_at(i, j).abs())
            .fold(0.0, f64::max)
    }

    // ========== Sampling ==========

    /// Sample U component (staggered - nodes at (i, j+0.5))
    pub fn sample_u(&self, pos: DVec2) -> f64 {
        bilinear(
            &self.u,
            self.space.width + 1,
            self.space.height,
            &self.space,
            DVec2::new(0.0, 0.5),
            pos,
        )
    }

    /// Sample V component (staggered - nodes at (i+0.5, j))
    pub fn sample_v(&self, pos: DVec2) -> f64 {
        bilinear(
            &self.v,
            self.space.width,
            self.space.height + 1,
            &self.space,
            DVec2::new(0.5, 0.0),
            pos,
        )
    }
}

impl VectorField2 for FaceCenteredGrid2 {
    fn sample(&self, position: DVec2) -> DVec2 {
        DVec2::new(self.sample_u(position), self.sample_v(position))
    }
}

/// One scalar per cell, stored at cell centers.
///
/// Holds the solved pressure, and doubles as a grid-backed SDF.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellCenteredScalarGrid2 {
    space: GridIndexSpace,
    data: Vec<f64>,
}

impl CellCenteredScalarGrid2 {
    pub fn new(space: GridIndexSpace) -> Self {
        Self {
            space,
            data: vec![0.0; space.cell_count()],
        }
    }

    /// Wrap existing row-major cell data.
    ///
    /// # Panics
    ///
    /// If `data.len()` differs from `space.cell_count()`.
    pub fn from_data(space: GridIndexSpace, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            space.cell_count(),
            "data length {} does not match {} cells",
            data.len(),
            space.cell_count()
        );
        Self { space, data }
    }

    /// Sample a scalar field at every cell center.
    pub fn from_field(space: GridIndexSpace, field: &dyn ScalarField2) -> Self {
        let data = space
            .cells()
            .map(|(i, j)| field.sample(space.cell_center(i, j)))
            .collect();
        Self { space, data }
    }

    #[inline]
    pub fn space(&self) -> &GridIndexSpace {
        &self.space
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.space.cell_index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.space.cell_index(i, j);
        self.data[idx] = value;
    }

    /// (min, max) over all cells; (0, 0) for an empty grid.
    pub fn min_max(&self) -> (f64, f64) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        self.data
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &x| (lo.min(x), hi.max(x)))
    }
}

impl ScalarField2 for CellCenteredScalarGrid2 {
    fn sample(&self, position: DVec2) -> f64 {
        bilinear(
            &self.data,
            self.space.width,
            self.space.height,
            &self.space,
            DVec2::splat(0.5),
            position,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "spacing must be positive")]
    fn test_zero_spacing_panics() {
        GridIndexSpace::new(2, 2, DVec2::new(1.0, 0.0), DVec2::ZERO);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_scalar_grid_wrong_length_panics() {
        CellCenteredScalarGrid2::from_data(GridIndexSpace::uniform(2, 2, 1.0), vec![0.0; 3]);
    }

    #[test]
    fn test_index_round_trip() {
        let space = GridIndexSpace::uniform(5, 3, 1.0);
        for (i, j) in space.cells() {
            assert_eq!(space.cell_coords(space.cell_index(i, j)), (i, j));
        }
        assert_eq!(space.u_coords(space.u_index(5, 2)), (5, 2));
        assert_eq!(space.v_coords(space.v_index(4, 3)), (4, 3));
        assert_eq!(space.u_count(), 18);
        assert_eq!(space.v_count(), 20);
    }

    #[test]
    fn test_face_positions_respect_origin_and_spacing() {
        let space = GridIndexSpace::new(4, 4, DVec2::new(0.5, 2.0), DVec2::new(-1.0, 10.0));
        assert_eq!(space.cell_center(0, 0), DVec2::new(-0.75, 11.0));
        assert_eq!(space.u_position(2, 1), DVec2::new(0.0, 13.0));
        assert_eq!(space.v_position(1, 2), DVec2::new(-0.25, 14.0));
    }

    #[test]
    fn test_divergence_uniform_field_is_zero() {
        let space = GridIndexSpace::uniform(4, 4, 1.0);
        let grid = FaceCenteredGrid2::with_velocity(space, DVec2::new(1.0, -2.0));
        assert_eq!(grid.max_abs_divergence(|_, _| true), 0.0);
    }

    #[test]
    fn test_divergence_uses_per_axis_spacing() {
        let space = GridIndexSpace::new(2, 2, DVec2::new(0.5, 0.25), DVec2::ZERO);
        let mut grid = FaceCenteredGrid2::new(space);
        grid.set_u(1, 0, 1.0);
        grid.set_v(0, 1, 1.0);
        // (1 - 0) / 0.5 + (1 - 0) / 0.25
        assert!((grid.divergence_at(0, 0) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_sampling_reproduces_linear_field() {
        let space = GridIndexSpace::uniform(8, 8, 0.5);
        let field = crate::field::FnVectorField2(|p: DVec2| DVec2::new(2.0 * p.y, p.x - 1.0));
        let grid = FaceCenteredGrid2::from_field(space, &field);

        let p = DVec2::new(1.3, 2.1);
        let sampled = grid.sample(p);
        assert!((sampled.x - 4.2).abs() < 1e-9, "u sample {}", sampled.x);
        assert!((sampled.y - 0.3).abs() < 1e-9, "v sample {}", sampled.y);
    }

    #[test]
    fn test_scalar_grid_sampling_at_centers() {
        let space = GridIndexSpace::uniform(3, 3, 1.0);
        let data: Vec<f64> = (0..9).map(|x| x as f64).collect();
        let grid = CellCenteredScalarGrid2::from_data(space, data);
        assert_eq!(grid.sample(space.cell_center(2, 1)), 5.0);
        // Clamped outside the lattice
        assert_eq!(grid.sample(DVec2::new(-5.0, -5.0)), 0.0);
        assert_eq!(grid.min_max(), (0.0, 8.0));
    }
}
