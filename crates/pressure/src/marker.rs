//! Cell and face classification (Fluid / Air / Solid).
//!
//! Markers are derived from the boundary and fluid SDFs on every call and
//! thrown away afterwards.

use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FieldKind, PressureError};
use crate::field::ScalarField2;
use crate::grid::GridIndexSpace;

/// Classification of a cell or face for the pressure solve.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum Marker {
    /// Solid obstacle (no flow through)
    Solid,
    /// Contains fluid; gets a pressure unknown
    Fluid,
    /// Empty air; pressure fixed at zero
    #[default]
    Air,
}

/// How solid faces are detected.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SolidRule {
    /// Solid cells block their faces, and so does any face whose midpoint is
    /// inside the boundary. Catches walls thinner than a cell.
    FaceMidpoint,
    /// Only solid cells block faces.
    BlockedCells,
}

/// Treatment of one side of the domain rectangle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum EdgeCondition {
    /// Zero-pressure ghost cells outside; edge faces are projected.
    #[default]
    Open,
    /// Solid wall; edge faces take the boundary velocity.
    Closed,
}

/// Edge conditions for the four sides of the domain.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct DomainEdges {
    pub left: EdgeCondition,
    pub right: EdgeCondition,
    pub bottom: EdgeCondition,
    pub top: EdgeCondition,
}

impl DomainEdges {
    pub fn all(condition: EdgeCondition) -> Self {
        Self {
            left: condition,
            right: condition,
            bottom: condition,
            top: condition,
        }
    }

    pub fn all_open() -> Self {
        Self::all(EdgeCondition::Open)
    }

    pub fn all_closed() -> Self {
        Self::all(EdgeCondition::Closed)
    }

    /// Closed floor and side walls, open top (a tank).
    pub fn open_top() -> Self {
        Self {
            top: EdgeCondition::Open,
            ..Self::all_closed()
        }
    }
}

/// Per-cell and per-face markers for one grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Markers {
    space: GridIndexSpace,
    edges: DomainEdges,
    cells: Vec<Marker>,
    u_faces: Vec<Marker>,
    v_faces: Vec<Marker>,
    /// Fluid cells demoted to Solid because every face was solid
    isolated: Vec<usize>,
}

impl Markers {
    /// Build markers from explicit cell markers; faces are derived with the
    /// [`SolidRule::BlockedCells`] rule.
    ///
    /// # Panics
    ///
    /// If `cells.len()` differs from `space.cell_count()`.
    pub fn from_cells(space: GridIndexSpace, cells: Vec<Marker>, edges: DomainEdges) -> Self {
        assert_eq!(cells.len(), space.cell_count());
        Self::assemble(space, cells, None, None, edges)
    }

    fn assemble(
        space: GridIndexSpace,
        mut cells: Vec<Marker>,
        u_midpoint_solid: Option<Vec<bool>>,
        v_midpoint_solid: Option<Vec<bool>>,
        edges: DomainEdges,
    ) -> Self {
        let width = space.width;
        let height = space.height;

        let u_faces: Vec<Marker> = (0..space.u_count())
            .into_par_iter()
            .map(|idx| {
                let (i, j) = space.u_coords(idx);
                let left = (i > 0).then(|| cells[space.cell_index(i - 1, j)]);
                let right = (i < width).then(|| cells[space.cell_index(i, j)]);
                let midpoint = u_midpoint_solid.as_ref().is_some_and(|m| m[idx]);
                face_marker(left, right, edges.left, edges.right, midpoint)
            })
            .collect();

        let v_faces: Vec<Marker> = (0..space.v_count())
            .into_par_iter()
            .map(|idx| {
                let (i, j) = space.v_coords(idx);
                let bottom = (j > 0).then(|| cells[space.cell_index(i, j - 1)]);
                let top = (j < height).then(|| cells[space.cell_index(i, j)]);
                let midpoint = v_midpoint_solid.as_ref().is_some_and(|m| m[idx]);
                face_marker(bottom, top, edges.bottom, edges.top, midpoint)
            })
            .collect();

        // A fluid cell walled in on all four faces has a zero row; drop it.
        let isolated: Vec<usize> = space
            .cells()
            .filter(|&(i, j)| {
                cells[space.cell_index(i, j)] == Marker::Fluid
                    && u_faces[space.u_index(i, j)] == Marker::Solid
                    && u_faces[space.u_index(i + 1, j)] == Marker::Solid
                    && v_faces[space.v_index(i, j)] == Marker::Solid
                    && v_faces[space.v_index(i, j + 1)] == Marker::Solid
            })
            .map(|(i, j)| space.cell_index(i, j))
            .collect();
        for &idx in &isolated {
            cells[idx] = Marker::Solid;
        }

        Self {
            space,
            edges,
            cells,
            u_faces,
            v_faces,
            isolated,
        }
    }

    #[inline]
    pub fn space(&self) -> &GridIndexSpace {
        &self.space
    }

    #[inline]
    pub fn edges(&self) -> &DomainEdges {
        &self.edges
    }

    pub fn cells(&self) -> &[Marker] {
        &self.cells
    }

    pub fn u_faces(&self) -> &[Marker] {
        &self.u_faces
    }

    pub fn v_faces(&self) -> &[Marker] {
        &self.v_faces
    }

    /// Row-major indices of the cells excluded as isolated.
    pub fn isolated(&self) -> &[usize] {
        &self.isolated
    }

    #[inline]
    pub fn cell(&self, i: usize, j: usize) -> Marker {
        self.cells[self.space.cell_index(i, j)]
    }

    #[inline]
    pub fn u_face(&self, i: usize, j: usize) -> Marker {
        self.u_faces[self.space.u_index(i, j)]
    }

    #[inline]
    pub fn v_face(&self, i: usize, j: usize) -> Marker {
        self.v_faces[self.space.v_index(i, j)]
    }

    #[inline]
    pub fn is_fluid(&self, i: usize, j: usize) -> bool {
        self.cell(i, j) == Marker::Fluid
    }

    pub fn fluid_count(&self) -> usize {
        self.cells.iter().filter(|&&m| m == Marker::Fluid).count()
    }
}

fn face_marker(
    low: Option<Marker>,
    high: Option<Marker>,
    low_edge: EdgeCondition,
    high_edge: EdgeCondition,
    midpoint_solid: bool,
) -> Marker {
    let closed_edge = (low.is_none() && low_edge == EdgeCondition::Closed)
        || (high.is_none() && high_edge == EdgeCondition::Closed);
    if closed_edge || midpoint_solid {
        return Marker::Solid;
    }
    match (low, high) {
        (Some(Marker::Solid), _) | (_, Some(Marker::Solid)) => Marker::Solid,
        (Some(Marker::Fluid), _) | (_, Some(Marker::Fluid)) => Marker::Fluid,
        _ => Marker::Air,
    }
}

/// Sample a field, rejecting NaN and infinities.
pub(crate) fn sample_finite(
    field: &dyn ScalarField2,
    position: DVec2,
    kind: FieldKind,
) -> Result<f64, PressureError> {
    let value = field.sample(position);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PressureError::InvalidFieldSample {
            field: kind,
            position,
            value,
        })
    }
}

/// Classify every cell and face of `space`.
///
/// - Cell: boundary SDF < 0 at the center → Solid; else fluid SDF < 0 → Fluid;
///   else Air. `None` for an SDF means "no solid" / "all fluid".
/// - Face: Solid next to a Solid cell, on a closed edge, or (with
///   [`SolidRule::FaceMidpoint`]) when its midpoint is inside the boundary.
///   Otherwise Fluid if it touches a Fluid cell, else Air.
/// - Fluid cells with four solid faces become Solid and are listed in
///   [`Markers::isolated`].
pub fn classify(
    space: &GridIndexSpace,
    boundary_sdf: Option<&dyn ScalarField2>,
    fluid_sdf: Option<&dyn ScalarField2>,
    rule: SolidRule,
    edges: DomainEdges,
) -> Result<Markers, PressureError> {
    let space = *space;

    let cells = (0..space.cell_count())
        .into_par_iter()
        .map(|idx| {
            let (i, j) = space.cell_coords(idx);
            let center = space.cell_center(i, j);
            if let Some(sdf) = boundary_sdf {
                if sample_finite(sdf, center, FieldKind::BoundarySdf)? < 0.0 {
                    return Ok(Marker::Solid);
                }
            }
            match fluid_sdf {
                None => Ok(Marker::Fluid),
                Some(sdf) if sample_finite(sdf, center, FieldKind::FluidSdf)? < 0.0 => {
                    Ok(Marker::Fluid)
                }
                Some(_) => Ok(Marker::Air),
            }
        })
        .collect::<Result<Vec<_>, PressureError>>()?;

    let (u_midpoint, v_midpoint) = match (rule, boundary_sdf) {
        (SolidRule::FaceMidpoint, Some(sdf)) => {
            let u = (0..space.u_count())
                .into_par_iter()
                .map(|idx| {
                    let (i, j) = space.u_coords(idx);
                    Ok(sample_finite(sdf, space.u_position(i, j), FieldKind::BoundarySdf)? < 0.0)
                })
                .collect::<Result<Vec<_>, PressureError>>()?;
            let v = (0..space.v_count())
                .into_par_iter()
                .map(|idx| {
                    let (i, j) = space.v_coords(idx);
                    Ok(sample_finite(sdf, space.v_position(i, j), FieldKind::BoundarySdf)? < 0.0)
                })
                .collect::<Result<Vec<_>, PressureError>>()?;
            (Some(u), Some(v))
        }
        _ => (None, None),
    };

    let markers = Markers::assemble(space, cells, u_midpoint, v_midpoint, edges);
    if !markers.isolated.is_empty() {
        log::debug!(
            "Excluded {} isolated fluid cells from the pressure system",
            markers.isolated.len()
        );
    }
    Ok(markers)
}
