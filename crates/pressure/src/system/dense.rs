//! Grid-indexed five-point matrix.

use crate::grid::GridIndexSpace;

use super::LinearOperator;

/// One matrix row: the diagonal and the couplings to the +x and +y
/// neighbors. The -x and -y couplings are read from the neighbor's row,
/// which keeps the matrix symmetric by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StencilRow {
    pub center: f64,
    pub right: f64,
    pub up: f64,
}

impl StencilRow {
    /// Row of a cell without an unknown: `1 * p = 0`.
    pub const IDENTITY: StencilRow = StencilRow {
        center: 1.0,
        right: 0.0,
        up: 0.0,
    };
}

/// Square matrix with one row per grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct StencilMatrix {
    space: GridIndexSpace,
    rows: Vec<StencilRow>,
}

impl StencilMatrix {
    /// One row per cell of `space`, in cell-index order.
    ///
    /// # Panics
    ///
    /// If `rows.len()` differs from `space.cell_count()`.
    pub fn from_rows(space: GridIndexSpace, rows: Vec<StencilRow>) -> Self {
        assert_eq!(rows.len(), space.cell_count());
        Self { space, rows }
    }

    pub fn space(&self) -> &GridIndexSpace {
        &self.space
    }

    pub fn rows(&self) -> &[StencilRow] {
        &self.rows
    }
}

impl LinearOperator for StencilMatrix {
    fn dim(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    fn diagonal(&self, row: usize) -> f64 {
        self.rows[row].center
    }

    fn for_each_neighbor(&self, row: usize, f: &mut dyn FnMut(usize, f64)) {
        let width = self.space.width;
        let (i, j) = self.space.cell_coords(row);
        let this = self.rows[row];

        if j > 0 {
            let down = self.rows[row - width].up;
            if down != 0.0 {
                f(row - width, down);
            }
        }
        if i > 0 {
            let left = self.rows[row - 1].right;
            if left != 0.0 {
                f(row - 1, left);
            }
        }
        if this.right != 0.0 {
            f(row + 1, this.right);
        }
        if this.up != 0.0 {
            f(row + width, this.up);
        }
    }
}

/// Dense-layout system: `matrix * p = rhs`, indexed by cell.
#[derive(Clone, Debug)]
pub struct DenseSystem {
    pub matrix: StencilMatrix,
    pub rhs: Vec<f64>,
}
