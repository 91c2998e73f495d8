//! Point-sampled fields supplied by the caller.
//!
//! The projection never assumes how a field is stored: analytic shapes,
//! closures and grids all sample the same way.

use glam::DVec2;

/// Scalar field queryable at any world position.
pub trait ScalarField2: Send + Sync {
    fn sample(&self, position: DVec2) -> f64;
}

/// Vector field queryable at any world position.
pub trait VectorField2: Send + Sync {
    fn sample(&self, position: DVec2) -> DVec2;
}

/// Same value everywhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantScalarField2(pub f64);

impl ScalarField2 for ConstantScalarField2 {
    fn sample(&self, _position: DVec2) -> f64 {
        self.0
    }
}

/// Same vector everywhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantVectorField2(pub DVec2);

impl VectorField2 for ConstantVectorField2 {
    fn sample(&self, _position: DVec2) -> DVec2 {
        self.0
    }
}

/// Adapts a closure into a [`ScalarField2`].
#[derive(Clone, Copy)]
pub struct FnScalarField2<F>(pub F);

impl<F> ScalarField2 for FnScalarField2<F>
where
    F: Fn(DVec2) -> f64 + Send + Sync,
{
    fn sample(&self, position: DVec2) -> f64 {
        (self.0)(position)
    }
}

/// Adapts a closure into a [`VectorField2`].
#[derive(Clone, Copy)]
pub struct FnVectorField2<F>(pub F);

impl<F> VectorField2 for FnVectorField2<F>
where
    F: Fn(DVec2) -> DVec2 + Send + Sync,
{
    fn sample(&self, position: DVec2) -> DVec2 {
        (self.0)(position)
    }
}

impl<T: ScalarField2 + ?Sized> ScalarField2 for &T {
    fn sample(&self, position: DVec2) -> f64 {
        (**self).sample(position)
    }
}

impl<T: VectorField2 + ?Sized> VectorField2 for &T {
    fn sample(&self, position: DVec2) -> DVec2 {
        (**self).sample(position)
    }
}

impl<T: ScalarField2 + ?Sized> ScalarField2 for Box<T> {
    fn sample(&self, position: DVec2) -> f64 {
        (**self).sample(position)
    }
}

impl<T: VectorField2 + ?Sized> VectorField2 for Box<T> {
    fn sample(&self, position: DVec2) -> DVec2 {
        (**self).sample(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_fields() {
        let s = ConstantScalarField2(3.5);
        let v = ConstantVectorField2(DVec2::new(1.0, -1.0));
        assert_eq!(s.sample(DVec2::new(100.0, -7.0)), 3.5);
        assert_eq!(v.sample(DVec2::ZERO), DVec2::new(1.0, -1.0));
    }

    #[test]
    fn test_closure_fields_through_trait_objects() {
        let s = FnScalarField2(|p: DVec2| p.length() - 1.0);
        let boxed: Box<dyn ScalarField2> = Box::new(s);
        assert!((boxed.sample(DVec2::new(3.0, 4.0)) - 4.0).abs() < 1e-12);

        let v = FnVectorField2(|p: DVec2| p.perp());
        let by_ref: &dyn VectorField2 = &v;
        assert_eq!(by_ref.sample(DVec2::X), DVec2::Y);
    }
}
