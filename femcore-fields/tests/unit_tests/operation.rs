use super::{assert_tensor_approx_eq, bilinear_monomial, identity2, point2, points2, square_of_first, tensor};
use femcore_fields::testing::check_field;
use femcore_fields::{
    add, compose, constant, dot, map, mul, outer, sub, FieldError, FieldRef, FunctionField, OperationField,
    Operator, Tensor,
};
use nalgebra::{Point1, Point2, Vector1, U1, U2};
use proptest::prelude::*;

#[test]
fn sum_difference_and_negation() {
    let f = bilinear_monomial();
    let g = square_of_first();
    let x = Point2::new(2.0, 3.0);

    assert_eq!((&f + &g).evaluate_at(&x).unwrap(), Tensor::scalar(10.0));
    assert_eq!((&f - &g).evaluate_at(&x).unwrap(), Tensor::scalar(2.0));
    assert_eq!((-&f).evaluate_at(&x).unwrap(), Tensor::scalar(-6.0));

    let grad = sub(&f, &g).gradient().unwrap();
    assert_eq!(grad.evaluate_at(&x).unwrap(), tensor(&[2], &[3.0 - 4.0, 2.0]));
    let grad = (-f).gradient().unwrap();
    assert_eq!(grad.evaluate_at(&x).unwrap(), tensor(&[2], &[-3.0, -2.0]));
}

#[test]
fn sum_of_mismatched_shapes_fails_on_evaluation() {
    let sum = add(&bilinear_monomial(), &identity2());
    let err = sum.evaluate_at(&Point2::new(1.0, 1.0)).unwrap_err();
    assert!(matches!(err, FieldError::ShapeMismatch { operation: "add", .. }));
}

#[test]
fn product_rule_gradient_and_hessian() {
    // h = x0^3 x1
    let h = bilinear_monomial() * square_of_first();
    let x = Point2::new(2.0, 3.0);
    assert_eq!(h.evaluate_at(&x).unwrap(), Tensor::scalar(24.0));

    // ∇h = (3 x0^2 x1, x0^3)
    let grad = h.gradient().unwrap();
    assert_eq!(grad.evaluate_at(&x).unwrap(), tensor(&[2], &[36.0, 8.0]));

    // ∇²h = [[6 x0 x1, 3 x0^2], [3 x0^2, 0]]
    let hessian = h.hessian().unwrap();
    assert_eq!(hessian.evaluate_at(&x).unwrap(), tensor(&[2, 2], &[36.0, 12.0, 12.0, 0.0]));
}

#[test]
fn third_derivative_of_product_is_unavailable() {
    let h = mul(&bilinear_monomial(), &square_of_first());
    let hessian = h.hessian().unwrap();
    assert_eq!(hessian.gradient().unwrap_err(), FieldError::DerivativeUnavailable { order: 3 });
}

#[test]
fn scalar_times_vector_field() {
    let h = mul(&square_of_first(), &identity2());
    let x = Point2::new(2.0, 3.0);
    assert_eq!(h.evaluate_at(&x).unwrap(), tensor(&[2], &[8.0, 12.0]));

    // ∂_k (x0^2 x_i) = 2 x0 δ_k0 x_i + x0^2 δ_ki
    let grad = h.gradient().unwrap();
    assert_eq!(grad.evaluate_at(&x).unwrap(), tensor(&[2, 2], &[8.0 + 4.0, 12.0, 0.0, 4.0]));
}

#[test]
fn mul_of_two_vector_fields_is_unsupported() {
    let h = mul(&identity2(), &identity2());
    let err = h.evaluate_at(&Point2::new(1.0, 2.0)).unwrap_err();
    assert!(matches!(err, FieldError::UnsupportedInput { operation: "mul", .. }));
}

#[test]
fn dot_product_rule() {
    // |x|^2
    let id = identity2();
    let h = dot(&id, &id);
    let x = Point2::new(1.0, 2.0);
    assert_eq!(h.evaluate_at(&x).unwrap(), Tensor::scalar(5.0));
    assert_eq!(h.gradient().unwrap().evaluate_at(&x).unwrap(), tensor(&[2], &[2.0, 4.0]));
    assert_eq!(h.hessian().unwrap().evaluate_at(&x).unwrap(), tensor(&[2, 2], &[2.0, 0.0, 0.0, 2.0]));
}

#[test]
fn outer_product_rule() {
    // x x^T, with ∂_k (x_i x_j) = δ_ki x_j + x_i δ_kj
    let id = identity2();
    let h = outer(&id, &id);
    let x = Point2::new(1.0, 2.0);
    assert_eq!(h.evaluate_at(&x).unwrap(), tensor(&[2, 2], &[1.0, 2.0, 2.0, 4.0]));
    let expected = tensor(&[2, 2, 2], &[2.0, 2.0, 2.0, 0.0, 0.0, 1.0, 1.0, 4.0]);
    assert_eq!(h.gradient().unwrap().evaluate_at(&x).unwrap(), expected);
}

#[test]
fn chain_rule_for_sum_of_coordinates_after_identity() {
    let f = FunctionField::<f64, U2>::new(|x| x[0] + x[1])
        .with_gradient(|_| nalgebra::Vector2::new(1.0, 1.0))
        .into_field_ref();
    let g = identity2();
    let h = compose(&f, &g);
    let x = Point2::new(0.25, -3.0);

    let grad_f = f.gradient().unwrap();
    let grad_g = g.gradient().unwrap();
    let g_x = g.evaluate_at(&x).unwrap();
    let g_x = Point2::new(g_x.as_slice()[0], g_x.as_slice()[1]);
    let expected = grad_g
        .evaluate_at(&x)
        .unwrap()
        .dot(&grad_f.evaluate_at(&g_x).unwrap())
        .unwrap();

    let actual = h.gradient().unwrap().evaluate_at(&x).unwrap();
    assert_eq!(actual, expected);
    assert_eq!(actual, tensor(&[2], &[1.0, 1.0]));
}

#[test]
fn chain_rule_across_dimensions() {
    // f(y) = y^2 on 1D points, g(x) = x0 + x1, so (f ∘ g)(x) = (x0 + x1)^2
    let f = FunctionField::<f64, U1>::new(|y| y[0] * y[0])
        .with_gradient(|y: &Point1<f64>| Vector1::new(2.0 * y[0]))
        .into_field_ref();
    let g = FunctionField::<f64, U2>::new(|x| Vector1::new(x[0] + x[1]))
        .with_gradient(|_| tensor(&[2, 1], &[1.0, 1.0]))
        .into_field_ref();
    let h = compose(&f, &g);
    let x = Point2::new(1.0, 2.0);

    assert_eq!(h.evaluate_at(&x).unwrap(), Tensor::scalar(9.0));
    assert_eq!(h.gradient().unwrap().evaluate_at(&x).unwrap(), tensor(&[2], &[6.0, 6.0]));
}

#[test]
fn composition_requires_vector_of_matching_length() {
    let f: FieldRef<f64, U2> = identity2();
    let h = compose(&f, &bilinear_monomial());
    let err = h.evaluate_at(&Point2::new(1.0, 1.0)).unwrap_err();
    assert!(matches!(err, FieldError::ShapeMismatch { operation: "compose", .. }));
}

#[test]
fn map_applies_function_to_operand_values() {
    let h = map(&[bilinear_monomial(), square_of_first()], |values, out| {
        let a = values[0].to_scalar().unwrap();
        let b = values[1].to_scalar().unwrap();
        out.reshape_zeroed(&[]);
        out.as_mut_slice()[0] = a.max(b);
        Ok(())
    });
    assert_eq!(h.evaluate_at(&Point2::new(2.0, 3.0)).unwrap(), Tensor::scalar(6.0));
    assert_eq!(h.evaluate_at(&Point2::new(4.0, 1.0)).unwrap(), Tensor::scalar(16.0));
    assert!(matches!(h.gradient(), Err(FieldError::NotImplemented { .. })));
}

#[test]
fn operation_with_wrong_arity_is_rejected() {
    let result = OperationField::new(Operator::Add, vec![identity2()]);
    assert!(matches!(result, Err(FieldError::UnsupportedInput { operation: "add", .. })));
    assert!(OperationField::new(Operator::Neg, vec![identity2()]).is_ok());
}

#[test]
fn operations_on_constants_are_folded() {
    let c: FieldRef<f64, U2> = constant(2.0);
    let h = &c * &constant(Vector1::new(3.0));
    let mut cache = h.return_cache(&Point2::origin());
    assert_eq!(h.evaluate(&mut cache, &Point2::origin()).unwrap(), &tensor(&[1], &[6.0]));
    assert!(cache.is_frozen());
    assert_eq!(h.evaluate(&mut cache, &Point2::new(5.0, 5.0)).unwrap(), &tensor(&[1], &[6.0]));
}

proptest! {
    #[test]
    fn composite_fields_agree_batched_and_pointwise(xs in points2()) {
        let f = bilinear_monomial();
        let g = square_of_first();
        let id = identity2();
        let h = &(&f * &g) + &dot(&id, &id);
        check_field(&h, &xs, |x| Tensor::scalar(x[0].powi(3) * x[1] + x[0] * x[0] + x[1] * x[1]), 1e-9);
    }

    #[test]
    fn product_gradient_matches_closed_form(x in point2()) {
        let h = bilinear_monomial() * square_of_first();
        let grad = h.gradient().unwrap().evaluate_at(&x).unwrap();
        let expected = tensor(&[2], &[3.0 * x[0] * x[0] * x[1], x[0].powi(3)]);
        assert_tensor_approx_eq(&grad, &expected, 1e-9);
    }
}
