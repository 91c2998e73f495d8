//! Boundary inputs and boundary condition solvers.
//!
//! A boundary condition solver decides which faces are solid and writes the
//! no-penetration velocity onto them before the pressure solve. Pressure
//! solvers suggest the strategy they were designed around; callers may swap
//! in another.

use std::fmt;

use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FieldKind, PressureError};
use crate::field::{ScalarField2, VectorField2};
use crate::grid::{FaceCenteredGrid2, GridIndexSpace};
use crate::marker::{self, DomainEdges, Marker, Markers, SolidRule};

/// Where the solid obstacles are.
#[derive(Clone, Copy, Default)]
pub enum SolidRegion<'a> {
    /// No solid anywhere in the domain.
    #[default]
    None,
    /// Solid where the SDF is negative.
    Sdf(&'a dyn ScalarField2),
}

/// Where the fluid is.
#[derive(Clone, Copy, Default)]
pub enum FluidRegion<'a> {
    /// The whole domain is fluid (no free surface).
    #[default]
    All,
    /// Fluid where the SDF is negative, air elsewhere.
    Sdf(&'a dyn ScalarField2),
}

/// Boundary description for one projection call.
///
/// `Boundaries::default()` is an unobstructed domain completely filled with
/// fluid and static (zero-velocity) walls.
#[derive(Clone, Copy, Default)]
pub struct Boundaries<'a> {
    pub solid: SolidRegion<'a>,
    /// Velocity of the solid boundary; `None` means stationary.
    pub velocity: Option<&'a dyn VectorField2>,
    pub fluid: FluidRegion<'a>,
}

impl<'a> Boundaries<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solid_sdf(mut self, sdf: &'a dyn ScalarField2) -> Self {
        self.solid = SolidRegion::Sdf(sdf);
        self
    }

    pub fn with_boundary_velocity(mut self, velocity: &'a dyn VectorField2) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_fluid_sdf(mut self, sdf: &'a dyn ScalarField2) -> Self {
        self.fluid = FluidRegion::Sdf(sdf);
        self
    }

    pub fn solid_sdf(&self) -> Option<&'a dyn ScalarField2> {
        match self.solid {
            SolidRegion::None => None,
            SolidRegion::Sdf(sdf) => Some(sdf),
        }
    }

    pub fn fluid_sdf(&self) -> Option<&'a dyn ScalarField2> {
        match self.fluid {
            FluidRegion::All => None,
            FluidRegion::Sdf(sdf) => Some(sdf),
        }
    }
}

impl fmt::Debug for Boundaries<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boundaries")
            .field("solid", &matches!(self.solid, SolidRegion::Sdf(_)))
            .field("moving", &self.velocity.is_some())
            .field("free_surface", &matches!(self.fluid, FluidRegion::Sdf(_)))
            .finish()
    }
}

/// Enforces solid boundary conditions on a staggered velocity field.
pub trait BoundaryConditionSolver: fmt::Debug + Send + Sync {
    /// How solid faces are detected.
    fn solid_rule(&self) -> SolidRule;

    /// Treatment of the four domain edges.
    fn domain_edges(&self) -> DomainEdges;

    /// Derive cell and face markers for this strategy.
    fn classify(
        &self,
        space: &GridIndexSpace,
        boundaries: &Boundaries<'_>,
    ) -> Result<Markers, PressureError> {
        marker::classify(
            space,
            boundaries.solid_sdf(),
            boundaries.fluid_sdf(),
            self.solid_rule(),
            self.domain_edges(),
        )
    }

    /// Set the normal velocity of every solid face to the boundary velocity
    /// sampled at that face. On error `velocity` is left untouched.
    fn constrain_velocity(
        &self,
        markers: &Markers,
        boundary_velocity: Option<&dyn VectorField2>,
        velocity: &mut FaceCenteredGrid2,
    ) -> Result<(), PressureError> {
        constrain_solid_faces(markers, boundary_velocity, velocity)
    }
}

/// No-penetration: normal velocity on solid faces = boundary normal velocity.
///
/// All samples are taken and validated before the first write.
pub fn constrain_solid_faces(
    markers: &Markers,
    boundary_velocity: Option<&dyn VectorField2>,
    velocity: &mut FaceCenteredGrid2,
) -> Result<(), PressureError> {
    let space = *markers.space();
    debug_assert_eq!(&space, velocity.space());

    let sample = |position: DVec2, normal_x: bool| -> Result<f64, PressureError> {
        let Some(field) = boundary_velocity else {
            return Ok(0.0);
        };
        let value = field.sample(position);
        if !value.is_finite() {
            let bad = if value.x.is_finite() { value.y } else { value.x };
            return Err(PressureError::InvalidFieldSample {
                field: FieldKind::BoundaryVelocity,
                position,
                value: bad,
            });
        }
        Ok(if normal_x { value.x } else { value.y })
    };

    let u_values = markers
        .u_faces()
        .par_iter()
        .enumerate()
        .filter(|(_, m)| **m == Marker::Solid)
        .map(|(idx, _)| {
            let (i, j) = space.u_coords(idx);
            sample(space.u_position(i, j), true).map(|value| (idx, value))
        })
        .collect::<Result<Vec<_>, PressureError>>()?;

    let v_values = markers
        .v_faces()
        .par_iter()
        .enumerate()
        .filter(|(_, m)| **m == Marker::Solid)
        .map(|(idx, _)| {
            let (i, j) = space.v_coords(idx);
            sample(space.v_position(i, j), false).map(|value| (idx, value))
        })
        .collect::<Result<Vec<_>, PressureError>>()?;

    let (u, v) = velocity.uv_mut();
    for (idx, value) in u_values {
        u[idx] = value;
    }
    for (idx, value) in v_values {
        v[idx] = value;
    }
    Ok(())
}

/// Faces are solid when their midpoint lies inside the boundary or they
/// touch a solid cell. Domain edges default to open.
///
/// This is the strategy [`SinglePhasePressureSolver`](crate::SinglePhasePressureSolver)
/// suggests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceSampledBoundaryConditionSolver {
    pub edges: DomainEdges,
}

impl FaceSampledBoundaryConditionSolver {
    pub fn new(edges: DomainEdges) -> Self {
        Self { edges }
    }
}

impl BoundaryConditionSolver for FaceSampledBoundaryConditionSolver {
    fn solid_rule(&self) -> SolidRule {
        SolidRule::FaceMidpoint
    }

    fn domain_edges(&self) -> DomainEdges {
        self.edges
    }
}

/// Solid cells block all four faces; nothing else does. The whole domain
/// exterior is a closed wall by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedBoundaryConditionSolver {
    pub edges: DomainEdges,
}

impl BlockedBoundaryConditionSolver {
    pub fn new(edges: DomainEdges) -> Self {
        Self { edges }
    }
}

impl Default for BlockedBoundaryConditionSolver {
    fn default() -> Self {
        Self {
            edges: DomainEdges::all_closed(),
        }
    }
}

impl BoundaryConditionSolver for BlockedBoundaryConditionSolver {
    fn solid_rule(&self) -> SolidRule {
        SolidRule::BlockedCells
    }

    fn domain_edges(&self) -> DomainEdges {
        self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ConstantVectorField2, FnVectorField2};
    use crate::geometry::HalfPlane;
    use crate::marker::EdgeCondition;

    #[test]
    fn test_closed_domain_zeroes_edge_faces() {
        let space = GridIndexSpace::uniform(4, 4, 1.0);
        let solver = BlockedBoundaryConditionSolver::default();
        let markers = solver.classify(&space, &Boundaries::default()).unwrap();

        let mut velocity = FaceCenteredGrid2::with_velocity(space, DVec2::new(1.0, 1.0));
        solver.constrain_velocity(&markers, None, &mut velocity).unwrap();

        for j in 0..4 {
            assert_eq!(velocity.u_at(0, j), 0.0);
            assert_eq!(velocity.u_at(4, j), 0.0);
            assert_eq!(velocity.u_at(2, j), 1.0, "interior face untouched");
        }
        for i in 0..4 {
            assert_eq!(velocity.v_at(i, 0), 0.0);
            assert_eq!(velocity.v_at(i, 4), 0.0);
        }
    }

    #[test]
    fn test_moving_boundary_sets_normal_component() {
        let space = GridIndexSpace::uniform(4, 4, 1.0);
        let floor = HalfPlane::floor(1.0);
        let lid = FnVectorField2(|p: DVec2| DVec2::new(3.0, 0.25 * p.x));
        let boundaries = Boundaries::new()
            .with_solid_sdf(&floor)
            .with_boundary_velocity(&lid);

        let solver = FaceSampledBoundaryConditionSolver::default();
        let markers = solver.classify(&space, &boundaries).unwrap();
        let mut velocity = FaceCenteredGrid2::new(space);
        solver
            .constrain_velocity(&markers, boundaries.velocity, &mut velocity)
            .unwrap();

        // v faces on top of the floor row take v = 0.25 * x exactly
        for i in 0..4 {
            let expected = 0.25 * space.v_position(i, 1).x;
            assert_eq!(velocity.v_at(i, 1), expected);
        }
        // u faces inside the floor row take u = 3
        assert_eq!(velocity.u_at(2, 0), 3.0);
        // Fluid faces untouched
        assert_eq!(velocity.u_at(2, 2), 0.0);
    }

    #[test]
    fn test_bad_boundary_velocity_leaves_grid_untouched() {
        let space = GridIndexSpace::uniform(3, 3, 1.0);
        let solver = BlockedBoundaryConditionSolver::default();
        let markers = solver.classify(&space, &Boundaries::default()).unwrap();
        let bad = ConstantVectorField2(DVec2::new(f64::NAN, 0.0));

        let mut velocity = FaceCenteredGrid2::with_velocity(space, DVec2::ONE);
        let before = velocity.clone();
        let err = solver
            .constrain_velocity(&markers, Some(&bad), &mut velocity)
            .unwrap_err();
        assert!(matches!(
            err,
            PressureError::InvalidFieldSample {
                field: FieldKind::BoundaryVelocity,
                ..
            }
        ));
        assert_eq!(velocity, before);
    }

    #[test]
    fn test_non_finite_tangential_component_is_rejected() {
        // Only floor and ceiling are walls, so every solid face is a v-face
        // and the NaN sits in the component tangential to all of them
        let space = GridIndexSpace::uniform(3, 3, 1.0);
        let edges = DomainEdges {
            bottom: EdgeCondition::Closed,
            top: EdgeCondition::Closed,
            ..DomainEdges::all_open()
        };
        let solver = FaceSampledBoundaryConditionSolver::new(edges);
        let markers = solver.classify(&space, &Boundaries::default()).unwrap();
        assert!(markers.u_faces().iter().all(|&m| m != Marker::Solid));
        assert!(markers.v_faces().iter().any(|&m| m == Marker::Solid));

        let bad = ConstantVectorField2(DVec2::new(f64::NAN, 0.0));
        let mut velocity = FaceCenteredGrid2::with_velocity(space, DVec2::ONE);
        let before = velocity.clone();
        let err = solver
            .constrain_velocity(&markers, Some(&bad), &mut velocity)
            .unwrap_err();
        match err {
            PressureError::InvalidFieldSample { field, value, .. } => {
                assert_eq!(field, FieldKind::BoundaryVelocity);
                assert!(value.is_nan());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(velocity, before);
    }

    #[test]
    fn test_default_strategies() {
        assert_eq!(
            FaceSampledBoundaryConditionSolver::default().domain_edges(),
            DomainEdges::all_open()
        );
        assert_eq!(
            BlockedBoundaryConditionSolver::default().domain_edges(),
            DomainEdges::all_closed()
        );
    }
}
