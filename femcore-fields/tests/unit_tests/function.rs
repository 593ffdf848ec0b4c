use super::{bilinear_monomial, identity2, points2, tensor};
use femcore_fields::testing::{check_field, check_field_gradient};
use femcore_fields::{function, FieldError, FunctionField, Tensor};
use nalgebra::{Point2, U2};
use proptest::prelude::*;

#[test]
fn function_field_evaluates_wrapped_function() {
    let f = bilinear_monomial();
    let value = f.evaluate_at(&Point2::new(2.0, 3.0)).unwrap();
    assert_eq!(value, Tensor::scalar(6.0));
}

#[test]
fn function_field_gradient_and_hessian_use_supplied_derivatives() {
    let f = bilinear_monomial();
    let x = Point2::new(2.0, 3.0);
    assert_eq!(f.gradient().unwrap().evaluate_at(&x).unwrap(), tensor(&[2], &[3.0, 2.0]));
    assert_eq!(f.hessian().unwrap().evaluate_at(&x).unwrap(), tensor(&[2, 2], &[0.0, 1.0, 1.0, 0.0]));
}

#[test]
fn third_derivative_is_unavailable() {
    let f = bilinear_monomial();
    let hessian = f.hessian().unwrap();
    assert_eq!(hessian.gradient().unwrap_err(), FieldError::DerivativeUnavailable { order: 3 });
}

#[test]
fn missing_derivatives_are_not_implemented() {
    let f = function(|x: &Point2<f64>| x[0]);
    assert!(matches!(f.gradient(), Err(FieldError::NotImplemented { .. })));

    let g = FunctionField::new(|x: &Point2<f64>| x[0])
        .with_gradient(|_| nalgebra::Vector2::new(1.0, 0.0))
        .into_field_ref();
    let hessian = g.hessian().unwrap();
    let err = hessian.evaluate_at(&Point2::origin()).unwrap_err();
    assert!(matches!(err, FieldError::NotImplemented { operation: "evaluate_hessian", .. }));
}

#[test]
fn identity_has_identity_gradient_and_zero_hessian() {
    let id = identity2();
    let x = Point2::new(-1.0, 4.0);
    assert_eq!(id.evaluate_at(&x).unwrap(), tensor(&[2], &[-1.0, 4.0]));
    assert_eq!(id.gradient().unwrap().evaluate_at(&x).unwrap(), tensor(&[2, 2], &[1.0, 0.0, 0.0, 1.0]));
    assert_eq!(id.hessian().unwrap().evaluate_at(&x).unwrap(), Tensor::zeros(&[2, 2, 2]));
}

#[test]
fn empty_batch_yields_no_values() {
    let f = bilinear_monomial();
    let xs: Vec<Point2<f64>> = Vec::new();
    let mut cache = f.return_batch_cache(&xs);
    assert!(f.evaluate_batch(&mut cache, &xs).unwrap().is_empty());
}

proptest! {
    #[test]
    fn batched_and_pointwise_evaluation_agree(xs in points2()) {
        let f = bilinear_monomial();
        check_field(&f, &xs, |x| Tensor::scalar(x[0] * x[1]), 1e-12);
        check_field_gradient(&f, &xs, |x| tensor(&[2], &[x[1], x[0]]), 1e-12);

        let id = FunctionField::<f64, U2>::identity().into_field_ref();
        check_field(&id, &xs, |x| tensor(&[2], &[x[0], x[1]]), 0.0);
    }
}
