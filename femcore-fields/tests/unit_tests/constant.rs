use super::{bilinear_monomial, identity2, point2, tensor};
use femcore_fields::{constant, function, zero, FieldError, FieldRef, Tensor};
use nalgebra::{Matrix2, Point2, Vector2, U2};
use proptest::prelude::*;

#[test]
fn constant_field_evaluates_to_its_value_everywhere() {
    let c: FieldRef<f64, U2> = constant(Matrix2::new(1.0, 2.0, 3.0, 4.0));
    let expected = tensor(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
    let mut cache = c.return_cache(&Point2::origin());
    for x in [Point2::new(0.0, 0.0), Point2::new(-1.0, 5.0)] {
        assert_eq!(c.evaluate(&mut cache, &x).unwrap(), &expected);
    }
}

#[test]
fn constant_gradient_and_hessian_are_zero_of_higher_order() {
    let c: FieldRef<f64, U2> = constant(Vector2::new(1.0, 2.0));
    let x = Point2::new(0.3, 0.7);

    let grad = c.gradient().unwrap().evaluate_at(&x).unwrap();
    assert_eq!(grad, Tensor::zeros(&[2, 2]));

    let hessian = c.hessian().unwrap().evaluate_at(&x).unwrap();
    assert_eq!(hessian, Tensor::zeros(&[2, 2, 2]));
}

#[test]
fn zero_field_of_non_differentiable_field_has_derivatives() {
    // The wrapped field has no gradient, but its zero field does
    let h: FieldRef<f64, U2> = function(|x: &Point2<f64>| Vector2::new(x[0].sin(), x[0] * x[1]));
    assert!(matches!(h.gradient(), Err(FieldError::NotImplemented { .. })));

    let z = zero(&h);
    let x = Point2::new(1.0, 2.0);
    assert_eq!(z.evaluate_at(&x).unwrap(), Tensor::zeros(&[2]));
    assert_eq!(z.gradient().unwrap().evaluate_at(&x).unwrap(), Tensor::zeros(&[2, 2]));
    assert_eq!(z.hessian().unwrap().evaluate_at(&x).unwrap(), Tensor::zeros(&[2, 2, 2]));
}

#[test]
fn zero_field_rejects_foreign_cache() {
    let z = zero(&identity2());
    let mut cache = Default::default();
    let result = z.evaluate(&mut cache, &Point2::new(1.0, 1.0));
    assert!(matches!(result, Err(FieldError::InvalidCache { .. })));
}

proptest! {
    #[test]
    fn zero_field_is_additive_identity_of_range(x in point2(), y in point2()) {
        let h = bilinear_monomial();
        let z = zero(&h);
        let mut cache = z.return_cache(&x);
        prop_assert_eq!(z.evaluate(&mut cache, &x).unwrap(), &Tensor::scalar(0.0));
        prop_assert_eq!(z.evaluate(&mut cache, &y).unwrap(), &Tensor::scalar(0.0));

        let sum = &h + &z;
        prop_assert_eq!(sum.evaluate_at(&y).unwrap(), h.evaluate_at(&y).unwrap());

        let grad = z.gradient().unwrap();
        prop_assert_eq!(grad.evaluate_at(&x).unwrap(), Tensor::zeros(&[2]));
    }
}
