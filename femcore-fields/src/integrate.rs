use crate::{BatchCache, Field, FieldError, Tensor};
use femcore_traits::{PointAllocator, Real};
use nalgebra::{DefaultAllocator, DimName, OPoint};

/// Approximates the integral of a field by the weighted sum of its values at the given points.
///
/// `points` and `weights` are typically a quadrature rule mapped to the integration domain,
/// with the weights already scaled by the volume form.
pub fn integrate<T, D, F>(
    field: &F,
    cache: &mut BatchCache<T>,
    points: &[OPoint<T, D>],
    weights: &[T],
) -> Result<Tensor<T>, FieldError>
where
    T: Real,
    D: DimName,
    F: ?Sized + Field<T, D>,
    DefaultAllocator: PointAllocator<T, D>,
{
    if points.len() != weights.len() {
        return Err(FieldError::ShapeMismatch {
            operation: "integrate",
            expected: vec![points.len()],
            actual: vec![weights.len()],
        });
    }

    let values = field.evaluate_batch(cache, points)?;
    let Some(first) = values.first() else {
        return Err(FieldError::UnsupportedInput {
            operation: "integrate",
            reason: "at least one point is required",
        });
    };

    let mut result = Tensor::zeros(first.shape());
    for (value, w) in values.iter().zip(weights) {
        if value.shape() != result.shape() {
            return Err(FieldError::ShapeMismatch {
                operation: "integrate",
                expected: result.shape().to_vec(),
                actual: value.shape().to_vec(),
            });
        }
        for (r, v) in result.as_mut_slice().iter_mut().zip(value.as_slice()) {
            *r += *w * *v;
        }
    }
    Ok(result)
}
