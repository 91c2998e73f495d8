//! Compressed (fluid-only) layout: CSR matrix plus row ↔ cell mapping.

use crate::marker::Marker;

use super::LinearOperator;

/// Bijection between fluid cells and compact row indices. Rows follow
/// row-major cell order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FluidIndexMap {
    row_to_cell: Vec<usize>,
    cell_to_row: Vec<Option<usize>>,
}

impl FluidIndexMap {
    pub fn new(cells: &[Marker]) -> Self {
        let mut row_to_cell = Vec::new();
        let cell_to_row = cells
            .iter()
            .enumerate()
            .map(|(cell, &marker)| {
                (marker == Marker::Fluid).then(|| {
                    row_to_cell.push(cell);
                    row_to_cell.len() - 1
                })
            })
            .collect();
        Self {
            row_to_cell,
            cell_to_row,
        }
    }

    /// Cell index of each row.
    pub fn rows(&self) -> &[usize] {
        &self.row_to_cell
    }

    #[inline]
    pub fn cell_of(&self, row: usize) -> usize {
        self.row_to_cell[row]
    }

    #[inline]
    pub fn row_of(&self, cell: usize) -> Option<usize> {
        self.cell_to_row.get(cell).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.row_to_cell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_to_cell.is_empty()
    }
}

/// Square sparse matrix in compressed sparse row format.
///
/// Column indices within a row are sorted; every row stores its diagonal.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    /// Position of each row's diagonal in `values`
    diag_pos: Vec<usize>,
}

impl CsrMatrix {
    /// Build from per-row `(col, value)` lists sorted by column. A row
    /// without a stored diagonal gets an explicit zero.
    pub fn from_rows(rows: &[Vec<(usize, f64)>]) -> Self {
        let nnz_hint: usize = rows.iter().map(|r| r.len() + 1).sum();
        let mut row_ptr = Vec::with_capacity(rows.len() + 1);
        let mut col_idx = Vec::with_capacity(nnz_hint);
        let mut values = Vec::with_capacity(nnz_hint);
        let mut diag_pos = Vec::with_capacity(rows.len());

        row_ptr.push(0);
        for (row, entries) in rows.iter().enumerate() {
            debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
            let mut diag = None;
            for &(col, value) in entries {
                if col > row && diag.is_none() {
                    diag = Some(col_idx.len());
                    col_idx.push(row);
                    values.push(0.0);
                }
                if col == row {
                    diag = Some(col_idx.len());
                }
                col_idx.push(col);
                values.push(value);
            }
            let diag = diag.unwrap_or_else(|| {
                col_idx.push(row);
                values.push(0.0);
                col_idx.len() - 1
            });
            diag_pos.push(diag);
            row_ptr.push(col_idx.len());
        }

        Self {
            row_ptr,
            col_idx,
            values,
            diag_pos,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Entry (row, col), zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        match self.col_idx[range.clone()].binary_search(&col) {
            Ok(offset) => self.values[range.start + offset],
            Err(_) => 0.0,
        }
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.n_rows()).all(|row| {
            (self.row_ptr[row]..self.row_ptr[row + 1]).all(|k| {
                let col = self.col_idx[k];
                (self.values[k] - self.get(col, row)).abs() <= tol
            })
        })
    }
}

impl LinearOperator for CsrMatrix {
    fn dim(&self) -> usize {
        self.n_rows()
    }

    #[inline]
    fn diagonal(&self, row: usize) -> f64 {
        self.values[self.diag_pos[row]]
    }

    fn for_each_neighbor(&self, row: usize, f: &mut dyn FnMut(usize, f64)) {
        let diag = self.diag_pos[row];
        for k in self.row_ptr[row]..self.row_ptr[row + 1] {
            if k != diag {
                f(self.col_idx[k], self.values[k]);
            }
        }
    }
}

/// Compressed-layout system: `matrix * p = rhs` over fluid rows only.
#[derive(Clone, Debug)]
pub struct CompressedSystem {
    pub matrix: CsrMatrix,
    pub rhs: Vec<f64>,
    pub index_map: FluidIndexMap,
}
