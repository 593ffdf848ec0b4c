//! Conformance checks for field implementations.
//!
//! The checks panic with a descriptive message on failure, so that they can be called directly
//! from tests of downstream field types.
use crate::{FieldRef, Tensor};
use femcore_traits::{PointAllocator, Real};
use nalgebra::{DefaultAllocator, DimName, OPoint};
use std::fmt::Debug;

fn assert_tensor_close<T: Real>(actual: &Tensor<T>, expected: &Tensor<T>, tol: T, context: impl Debug) {
    assert_eq!(actual.shape(), expected.shape(), "shape mismatch ({context:?})");
    let diff = actual
        .max_abs_diff(expected)
        .expect("shapes were checked to be equal");
    assert!(
        diff <= tol,
        "values differ by {diff} (tolerance {tol}) ({context:?}):\n  actual: {:?}\nexpected: {:?}",
        actual.as_slice(),
        expected.as_slice()
    );
}

/// Checks a field against a reference function at the given points.
///
/// Verifies that
/// - evaluation with a fresh cache agrees with `expected` at every point,
/// - evaluation with a single reused cache gives the same values, also when revisiting points,
/// - batched evaluation agrees with pointwise evaluation, also when the batch cache is reused
///   for a shorter batch.
pub fn check_field<T, D>(field: &FieldRef<T, D>, xs: &[OPoint<T, D>], expected: impl Fn(&OPoint<T, D>) -> Tensor<T>, tol: T)
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    let mut pointwise = Vec::with_capacity(xs.len());
    for (i, x) in xs.iter().enumerate() {
        let value = field
            .evaluate_at(x)
            .unwrap_or_else(|err| panic!("evaluation at point {i} failed: {err}"));
        assert_tensor_close(&value, &expected(x), tol, ("point", i));
        pointwise.push(value);
    }

    if let Some(first) = xs.first() {
        let mut cache = field.return_cache(first);
        for _ in 0..2 {
            for (i, x) in xs.iter().enumerate() {
                let value = field
                    .evaluate(&mut cache, x)
                    .unwrap_or_else(|err| panic!("evaluation with reused cache at point {i} failed: {err}"));
                assert_tensor_close(value, &pointwise[i], T::zero(), ("reused cache, point", i));
            }
        }
    }

    let mut batch_cache = field.return_batch_cache(xs);
    let batch = field
        .evaluate_batch(&mut batch_cache, xs)
        .unwrap_or_else(|err| panic!("batched evaluation failed: {err}"));
    assert_eq!(batch.len(), xs.len(), "batched evaluation returned wrong number of values");
    for (i, (value, reference)) in batch.iter().zip(&pointwise).enumerate() {
        assert_tensor_close(value, reference, T::zero(), ("batch, point", i));
    }

    let half = &xs[..xs.len() / 2];
    let batch = field
        .evaluate_batch(&mut batch_cache, half)
        .unwrap_or_else(|err| panic!("batched evaluation with reused cache failed: {err}"));
    assert_eq!(batch.len(), half.len(), "reused batch cache returned wrong number of values");
    for (i, (value, reference)) in batch.iter().zip(&pointwise).enumerate() {
        assert_tensor_close(value, reference, T::zero(), ("reused batch, point", i));
    }
}

/// Checks the gradient field of `field` against a reference gradient at the given points.
pub fn check_field_gradient<T, D>(
    field: &FieldRef<T, D>,
    xs: &[OPoint<T, D>],
    expected_gradient: impl Fn(&OPoint<T, D>) -> Tensor<T>,
    tol: T,
) where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    let gradient = field
        .gradient()
        .unwrap_or_else(|err| panic!("gradient of {field:?} is unavailable: {err}"));
    check_field(&gradient, xs, expected_gradient, tol);
}
