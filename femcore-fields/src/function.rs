use crate::{Field, FieldCache, FieldError, FieldGradient, FieldRef, Tensor, TensorValue};
use femcore_traits::{PointAllocator, Real};
use nalgebra::{DefaultAllocator, DimName, OPoint};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type PointFunction<T, D> = Arc<dyn Fn(&OPoint<T, D>, &mut Tensor<T>) + Send + Sync>;

fn wrap_point_function<T, D, F, V>(function: F) -> PointFunction<T, D>
where
    T: Real,
    D: DimName,
    F: 'static + Send + Sync + Fn(&OPoint<T, D>) -> V,
    V: TensorValue<T>,
    DefaultAllocator: PointAllocator<T, D>,
{
    Arc::new(move |x: &OPoint<T, D>, out: &mut Tensor<T>| function(x).write_to(out))
}

/// An ordinary function of a point, treated as a field.
///
/// Derivatives are not computed automatically: the gradient and Hessian are available only if the
/// corresponding functions are supplied with [`with_gradient`](Self::with_gradient) and
/// [`with_hessian`](Self::with_hessian). By convention, the gradient of a function with values of
/// shape `S` has shape `(D, S)`, with entry `[i, ..]` holding the partial derivative with respect to
/// `x_i`, and the Hessian has shape `(D, D, S)`.
///
/// ```
/// # use femcore_fields::FunctionField;
/// # use nalgebra::{Point2, Vector2, U2};
/// let f = FunctionField::<f64, U2>::new(|x| x[0] * x[1])
///     .with_gradient(|x| Vector2::new(x[1], x[0]))
///     .into_field_ref();
/// let g = f.gradient().unwrap();
/// let value = g.evaluate_at(&Point2::new(2.0, 3.0)).unwrap();
/// assert_eq!(value.as_slice(), &[3.0, 2.0]);
/// ```
pub struct FunctionField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    function: PointFunction<T, D>,
    gradient: Option<PointFunction<T, D>>,
    hessian: Option<PointFunction<T, D>>,
}

impl<T, D> Debug for FunctionField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionField")
            .field("has_gradient", &self.gradient.is_some())
            .field("has_hessian", &self.hessian.is_some())
            .finish()
    }
}

impl<T, D> Clone for FunctionField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn clone(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
            gradient: self.gradient.clone(),
            hessian: self.hessian.clone(),
        }
    }
}

impl<T, D> FunctionField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    pub fn new<F, V>(function: F) -> Self
    where
        F: 'static + Send + Sync + Fn(&OPoint<T, D>) -> V,
        V: TensorValue<T>,
    {
        Self {
            function: wrap_point_function(function),
            gradient: None,
            hessian: None,
        }
    }

    pub fn with_gradient<G, V>(self, gradient: G) -> Self
    where
        G: 'static + Send + Sync + Fn(&OPoint<T, D>) -> V,
        V: TensorValue<T>,
    {
        Self {
            gradient: Some(wrap_point_function(gradient)),
            ..self
        }
    }

    pub fn with_hessian<H, V>(self, hessian: H) -> Self
    where
        H: 'static + Send + Sync + Fn(&OPoint<T, D>) -> V,
        V: TensorValue<T>,
    {
        Self {
            hessian: Some(wrap_point_function(hessian)),
            ..self
        }
    }

    /// The identity map `x -> x`, with the identity matrix as gradient and a zero Hessian.
    pub fn identity() -> Self {
        let d = D::dim();
        Self {
            function: wrap_point_function(|x: &OPoint<T, D>| x.clone()),
            gradient: Some(Arc::new(move |_: &OPoint<T, D>, out: &mut Tensor<T>| {
                out.reshape_zeroed(&[d, d]);
                for i in 0..d {
                    out.as_mut_slice()[i * d + i] = T::one();
                }
            })),
            hessian: Some(Arc::new(move |_: &OPoint<T, D>, out: &mut Tensor<T>| {
                out.reshape_zeroed(&[d, d, d])
            })),
        }
    }

    pub fn has_gradient(&self) -> bool {
        self.gradient.is_some()
    }

    pub fn has_hessian(&self) -> bool {
        self.hessian.is_some()
    }

    pub fn into_field_ref(self) -> FieldRef<T, D> {
        FieldRef::new(self)
    }
}

impl<T, D> Field<T, D> for FunctionField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn return_cache(&self, _x: &OPoint<T, D>) -> FieldCache<T> {
        FieldCache::default()
    }

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError> {
        (self.function)(x, cache.value_mut());
        Ok(cache.value())
    }

    fn evaluate_gradient<'c>(
        &self,
        cache: &'c mut FieldCache<T>,
        x: &OPoint<T, D>,
    ) -> Result<&'c Tensor<T>, FieldError> {
        let gradient = self.gradient.as_ref().ok_or(FieldError::NotImplemented {
            operation: "evaluate_gradient",
            field: "FunctionField without gradient",
        })?;
        gradient(x, cache.value_mut());
        Ok(cache.value())
    }

    fn evaluate_hessian<'c>(
        &self,
        cache: &'c mut FieldCache<T>,
        x: &OPoint<T, D>,
    ) -> Result<&'c Tensor<T>, FieldError> {
        let hessian = self.hessian.as_ref().ok_or(FieldError::NotImplemented {
            operation: "evaluate_hessian",
            field: "FunctionField without Hessian",
        })?;
        hessian(x, cache.value_mut());
        Ok(cache.value())
    }

    fn gradient(&self, this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        if self.gradient.is_none() {
            return Err(FieldError::NotImplemented {
                operation: "gradient",
                field: "FunctionField without gradient",
            });
        }
        Ok(FieldRef::new(FieldGradient::new(this.clone())))
    }
}

/// Wraps a function of a point as a field without derivatives.
pub fn function<T, D, F, V>(function: F) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    F: 'static + Send + Sync + Fn(&OPoint<T, D>) -> V,
    V: TensorValue<T>,
    DefaultAllocator: PointAllocator<T, D>,
{
    FunctionField::new(function).into_field_ref()
}
