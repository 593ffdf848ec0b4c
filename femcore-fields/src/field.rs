use crate::{BatchCache, FieldCache, FieldError, Tensor};
use femcore_traits::{PointAllocator, Real};
use nalgebra::{DefaultAllocator, DimName, OPoint};
use std::any::type_name;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// A function from points in `D` dimensions to tensors.
///
/// Implementors provide single-point evaluation into a cache they create themselves. Batched
/// evaluation is provided on top of single-point evaluation and reuses its output buffer between
/// calls.
///
/// Fields that can be differentiated either override [`Field::gradient`] to return an explicit
/// derivative field, or implement [`Field::evaluate_gradient`] (and possibly
/// [`Field::evaluate_hessian`]) and keep the default [`Field::gradient`], which wraps the field in a
/// [`FieldGradient`].
pub trait Field<T, D>: Debug + Send + Sync
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    /// Creates a cache for repeatedly evaluating the field at points like `x`.
    fn return_cache(&self, x: &OPoint<T, D>) -> FieldCache<T>;

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError>;

    /// Creates a cache for repeatedly evaluating the field at sequences of points like `xs`.
    fn return_batch_cache(&self, xs: &[OPoint<T, D>]) -> BatchCache<T> {
        let point_cache = match xs.first() {
            Some(x) => self.return_cache(x),
            None => self.return_cache(&OPoint::origin()),
        };
        BatchCache::new(point_cache, xs.len())
    }

    /// Evaluates the field at every point in `xs`.
    ///
    /// The returned slice has the same length as `xs`, and entry `i` is the value at `xs[i]`.
    fn evaluate_batch<'c>(
        &self,
        cache: &'c mut BatchCache<T>,
        xs: &[OPoint<T, D>],
    ) -> Result<&'c [Tensor<T>], FieldError> {
        let (point_cache, values) = cache.parts_mut();
        values.resize(xs.len());
        for (x, out) in xs.iter().zip(values.as_mut_slice()) {
            let value = self.evaluate(point_cache, x)?;
            out.assign(value.view());
        }
        Ok(values.as_slice())
    }

    fn return_gradient_cache(&self, _x: &OPoint<T, D>) -> FieldCache<T> {
        FieldCache::default()
    }

    fn evaluate_gradient<'c>(
        &self,
        _cache: &'c mut FieldCache<T>,
        _x: &OPoint<T, D>,
    ) -> Result<&'c Tensor<T>, FieldError> {
        Err(FieldError::NotImplemented {
            operation: "evaluate_gradient",
            field: type_name::<Self>(),
        })
    }

    fn return_hessian_cache(&self, _x: &OPoint<T, D>) -> FieldCache<T> {
        FieldCache::default()
    }

    fn evaluate_hessian<'c>(
        &self,
        _cache: &'c mut FieldCache<T>,
        _x: &OPoint<T, D>,
    ) -> Result<&'c Tensor<T>, FieldError> {
        Err(FieldError::NotImplemented {
            operation: "evaluate_hessian",
            field: type_name::<Self>(),
        })
    }

    /// Returns the field representing the gradient of this field.
    ///
    /// `this` must be the handle through which `self` is shared; it is what derived fields hold on to.
    fn gradient(&self, this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        Ok(FieldRef::new(FieldGradient::new(this.clone())))
    }
}

/// Shared handle to a field.
pub struct FieldRef<T, D>(Arc<dyn Field<T, D>>)
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>;

impl<T, D> Clone for FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T, D> Debug for FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T, D> Deref for FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    type Target = dyn Field<T, D>;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl<T, D> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    pub fn new<F: Field<T, D> + 'static>(field: F) -> Self {
        Self(Arc::new(field))
    }

    pub fn from_arc(field: Arc<dyn Field<T, D>>) -> Self {
        Self(field)
    }

    pub fn gradient(&self) -> Result<Self, FieldError> {
        self.0.gradient(self)
    }

    pub fn hessian(&self) -> Result<Self, FieldError> {
        self.gradient()?.gradient()
    }

    /// Evaluates the field at a single point with a freshly allocated cache.
    ///
    /// Intended for one-off evaluations. Repeated evaluation should go through
    /// [`Field::return_cache`] and [`Field::evaluate`].
    pub fn evaluate_at(&self, x: &OPoint<T, D>) -> Result<Tensor<T>, FieldError> {
        let mut cache = self.0.return_cache(x);
        self.0.evaluate(&mut cache, x).map(Clone::clone)
    }

    /// Evaluates the field at every point in `xs` with a freshly allocated cache.
    pub fn evaluate_all(&self, xs: &[OPoint<T, D>]) -> Result<Vec<Tensor<T>>, FieldError> {
        let mut cache = self.0.return_batch_cache(xs);
        self.0.evaluate_batch(&mut cache, xs).map(<[_]>::to_vec)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Returns the gradient of the given field.
pub fn gradient<T, D>(field: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    field.gradient()
}

/// Returns the Hessian of the given field.
pub fn hessian<T, D>(field: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    field.hessian()
}

/// The gradient of a field that implements [`Field::evaluate_gradient`].
#[derive(Debug)]
pub struct FieldGradient<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    field: FieldRef<T, D>,
}

impl<T, D> FieldGradient<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    pub fn new(field: FieldRef<T, D>) -> Self {
        Self { field }
    }

    pub fn differentiated_field(&self) -> &FieldRef<T, D> {
        &self.field
    }
}

impl<T, D> Field<T, D> for FieldGradient<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn return_cache(&self, x: &OPoint<T, D>) -> FieldCache<T> {
        self.field.return_gradient_cache(x)
    }

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError> {
        self.field.evaluate_gradient(cache, x)
    }

    fn return_gradient_cache(&self, x: &OPoint<T, D>) -> FieldCache<T> {
        self.field.return_hessian_cache(x)
    }

    fn evaluate_gradient<'c>(
        &self,
        cache: &'c mut FieldCache<T>,
        x: &OPoint<T, D>,
    ) -> Result<&'c Tensor<T>, FieldError> {
        self.field.evaluate_hessian(cache, x)
    }

    fn gradient(&self, _this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        Ok(FieldRef::new(FieldHessian::new(self.field.clone())))
    }
}

/// The Hessian of a field that implements [`Field::evaluate_hessian`].
#[derive(Debug)]
pub struct FieldHessian<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    field: FieldRef<T, D>,
}

impl<T, D> FieldHessian<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    pub fn new(field: FieldRef<T, D>) -> Self {
        Self { field }
    }
}

impl<T, D> Field<T, D> for FieldHessian<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn return_cache(&self, x: &OPoint<T, D>) -> FieldCache<T> {
        self.field.return_hessian_cache(x)
    }

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError> {
        self.field.evaluate_hessian(cache, x)
    }

    fn gradient(&self, _this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        Err(FieldError::DerivativeUnavailable { order: 3 })
    }
}
