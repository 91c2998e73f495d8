//! Analytic signed-distance shapes.
//!
//! Simple primitives for describing solid boundaries and fluid regions
//! without building an SDF grid:
//! - Circle: disc of a given radius
//! - Rectangle: axis-aligned box
//! - HalfPlane: everything on one side of a line
//! - Complement / Union: combine the above
//!
//! Convention everywhere: negative = inside the shape, positive = outside.

use glam::DVec2;

use crate::field::ScalarField2;

/// Disc of `radius` around `center`.
#[derive(Debug, Clone, Copy)]
pub struct Circle {
    pub center: DVec2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: DVec2, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn sdf(&self, point: DVec2) -> f64 {
        (point - self.center).length() - self.radius
    }
}

/// Axis-aligned box spanning `min`..`max`.
#[derive(Debug, Clone, Copy)]
pub struct Rectangle {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rectangle {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Exact box distance: Euclidean outside, distance to the nearest edge
    /// (negated) inside.
    pub fn sdf(&self, point: DVec2) -> f64 {
        let center = (self.min + self.max) * 0.5;
        let half = (self.max - self.min) * 0.5;
        let d = (point - center).abs() - half;
        let outside = d.max(DVec2::ZERO).length();
        let inside = d.x.max(d.y).min(0.0);
        outside + inside
    }
}

/// Solid below a line: inside where `(point - origin) · normal < 0`.
#[derive(Debug, Clone, Copy)]
pub struct HalfPlane {
    pub origin: DVec2,
    /// Outward normal, normalized on construction
    pub normal: DVec2,
}

impl HalfPlane {
    pub fn new(origin: DVec2, normal: DVec2) -> Self {
        Self {
            origin,
            normal: normal.normalize_or_zero(),
        }
    }

    /// Floor whose surface is the horizontal line `y`.
    pub fn floor(y: f64) -> Self {
        Self::new(DVec2::new(0.0, y), DVec2::Y)
    }

    pub fn sdf(&self, point: DVec2) -> f64 {
        (point - self.origin).dot(self.normal)
    }
}

/// Inside/outside swapped; turns a box into a container.
#[derive(Debug, Clone, Copy)]
pub struct Complement<S>(pub S);

/// Inside either shape.
#[derive(Debug, Clone, Copy)]
pub struct Union<A, B>(pub A, pub B);

impl ScalarField2 for Circle {
    fn sample(&self, position: DVec2) -> f64 {
        self.sdf(position)
    }
}

impl ScalarField2 for Rectangle {
    fn sample(&self, position: DVec2) -> f64 {
        self.sdf(position)
    }
}

impl ScalarField2 for HalfPlane {
    fn sample(&self, position: DVec2) -> f64 {
        self.sdf(position)
    }
}

impl<S: ScalarField2> ScalarField2 for Complement<S> {
    fn sample(&self, position: DVec2) -> f64 {
        -self.0.sample(position)
    }
}

impl<A: ScalarField2, B: ScalarField2> ScalarField2 for Union<A, B> {
    fn sample(&self, position: DVec2) -> f64 {
        self.0.sample(position).min(self.1.sample(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_sign() {
        let c = Circle::new(DVec2::new(1.0, 1.0), 0.5);
        assert!(c.sdf(DVec2::new(1.0, 1.0)) < 0.0);
        assert!((c.sdf(DVec2::new(2.0, 1.0)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rectangle_distance() {
        let r = Rectangle::new(DVec2::new(2.0, 2.0), DVec2::ZERO);
        assert!((r.sdf(DVec2::new(1.0, 1.0)) + 1.0).abs() < 1e-12);
        assert!((r.sdf(DVec2::new(3.0, 1.0)) - 1.0).abs() < 1e-12);
        assert!((r.sdf(DVec2::new(5.0, 6.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_container_is_complement_of_box() {
        let container = Complement(Rectangle::new(DVec2::ZERO, DVec2::splat(4.0)));
        assert!(container.sample(DVec2::splat(2.0)) > 0.0, "interior is open");
        assert!(container.sample(DVec2::new(-1.0, 2.0)) < 0.0, "exterior is solid");
    }

    #[test]
    fn test_union_takes_nearest_surface() {
        let shape = Union(HalfPlane::floor(1.0), Circle::new(DVec2::new(5.0, 5.0), 1.0));
        assert!(shape.sample(DVec2::new(0.0, 0.5)) < 0.0);
        assert!(shape.sample(DVec2::new(5.0, 5.0)) < 0.0);
        assert!(shape.sample(DVec2::new(0.0, 3.0)) > 0.0);
    }
}
