//! Pressure Poisson system.
//!
//! Two layouts of the same equations:
//! - [`DenseSystem`]: one row per grid cell, indexed by cell index. Non-fluid
//!   rows are the trivial `p = 0`.
//! - [`CompressedSystem`]: rows only for fluid cells, plus the map between
//!   compact rows and cells.
//!
//! Both matrices are symmetric positive (semi-)definite: the diagonal of a
//! fluid row is `Σ 1/h²` over its non-solid faces, and each fluid neighbor
//! contributes `-1/h²`.

mod builder;
mod compressed;
mod dense;

pub use builder::{build_compressed_system, build_dense_system, build_system};
pub use compressed::{CompressedSystem, CsrMatrix, FluidIndexMap};
pub use dense::{DenseSystem, StencilMatrix, StencilRow};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::grid::CellCenteredScalarGrid2;

/// Which matrix layout to assemble.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemLayout {
    /// Indexed by grid cell; wasteful for sparse fluid but directly indexable.
    #[default]
    Dense,
    /// Indexed by a compact enumeration of fluid cells.
    Compressed,
}

/// Square sparse operator seen by the linear solvers.
pub trait LinearOperator: Send + Sync {
    /// Number of rows (and columns).
    fn dim(&self) -> usize;

    /// A[row][row]
    fn diagonal(&self, row: usize) -> f64;

    /// Visit every nonzero off-diagonal entry `(col, A[row][col])` of `row`.
    fn for_each_neighbor(&self, row: usize, f: &mut dyn FnMut(usize, f64));

    /// y = A * x, parallel over rows.
    fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dim());
        debug_assert_eq!(y.len(), self.dim());
        y.par_iter_mut().enumerate().for_each(|(row, out)| {
            let mut sum = self.diagonal(row) * x[row];
            self.for_each_neighbor(row, &mut |col, a| sum += a * x[col]);
            *out = sum;
        });
    }
}

/// An assembled system in either layout.
#[derive(Clone, Debug)]
pub enum PressureSystem {
    Dense(DenseSystem),
    Compressed(CompressedSystem),
}

impl PressureSystem {
    pub fn layout(&self) -> SystemLayout {
        match self {
            PressureSystem::Dense(_) => SystemLayout::Dense,
            PressureSystem::Compressed(_) => SystemLayout::Compressed,
        }
    }

    pub fn operator(&self) -> &dyn LinearOperator {
        match self {
            PressureSystem::Dense(system) => &system.matrix,
            PressureSystem::Compressed(system) => &system.matrix,
        }
    }

    pub fn rhs(&self) -> &[f64] {
        match self {
            PressureSystem::Dense(system) => &system.rhs,
            PressureSystem::Compressed(system) => &system.rhs,
        }
    }

    pub fn dim(&self) -> usize {
        self.rhs().len()
    }

    /// Write a solution vector into a cell-centered pressure grid. Cells
    /// without an unknown get zero.
    pub fn scatter(&self, x: &[f64], pressure: &mut CellCenteredScalarGrid2) {
        match self {
            PressureSystem::Dense(_) => pressure.data_mut().copy_from_slice(x),
            PressureSystem::Compressed(system) => {
                let data = pressure.data_mut();
                data.fill(0.0);
                for (row, &cell) in system.index_map.rows().iter().enumerate() {
                    data[cell] = x[row];
                }
            }
        }
    }
}
