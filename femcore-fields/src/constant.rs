use crate::{Field, FieldCache, FieldError, FieldRef, Tensor, TensorValue};
use femcore_traits::{PointAllocator, Real};
use nalgebra::{DefaultAllocator, DimName, OPoint};
use std::any::type_name;

/// A field with the same value at every point.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantField<T> {
    value: Tensor<T>,
}

impl<T: Real> ConstantField<T> {
    pub fn new(value: impl TensorValue<T>) -> Self {
        let mut tensor = Tensor::default();
        value.write_to(&mut tensor);
        Self { value: tensor }
    }

    pub fn value(&self) -> &Tensor<T> {
        &self.value
    }
}

impl<T, D> Field<T, D> for ConstantField<T>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn return_cache(&self, _x: &OPoint<T, D>) -> FieldCache<T> {
        FieldCache::new(self.value.clone()).frozen()
    }

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, _x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError> {
        if !cache.is_frozen() {
            cache.value_mut().assign(self.value.view());
            cache.freeze();
        }
        Ok(cache.value())
    }

    fn gradient(&self, this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        Ok(FieldRef::new(ZeroField::with_partials(this.clone(), 1)))
    }
}

/// A field that evaluates to the zero tensor of the same shape as the wrapped field.
///
/// Derivatives of a zero field are again zero fields, with one more leading index of extent `D`
/// per derivative. The wrapped field is only evaluated to discover its shape and never needs to
/// be differentiable itself.
#[derive(Debug)]
pub struct ZeroField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    field: FieldRef<T, D>,
    partials: usize,
}

impl<T, D> ZeroField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    pub fn new(field: FieldRef<T, D>) -> Self {
        Self::with_partials(field, 0)
    }

    /// The zero field shaped like the `partials`-th derivative of `field`.
    pub fn with_partials(field: FieldRef<T, D>, partials: usize) -> Self {
        Self { field, partials }
    }
}

impl<T, D> Field<T, D> for ZeroField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn return_cache(&self, x: &OPoint<T, D>) -> FieldCache<T> {
        FieldCache::default().with_children(vec![self.field.return_cache(x)])
    }

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError> {
        if !cache.is_frozen() {
            let (value, _, children) = cache.parts_mut();
            let Some(field_cache) = children.first_mut() else {
                return Err(FieldError::InvalidCache {
                    field: type_name::<Self>(),
                });
            };
            let field_value = self.field.evaluate(field_cache, x)?;
            // Only happens once per cache, so the allocation is fine
            let mut shape = vec![D::dim(); self.partials];
            shape.extend_from_slice(field_value.shape());
            value.reshape_zeroed(&shape);
            cache.freeze();
        }
        Ok(cache.value())
    }

    fn gradient(&self, _this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        Ok(FieldRef::new(ZeroField::with_partials(self.field.clone(), self.partials + 1)))
    }
}

/// Creates a field with the given constant value.
pub fn constant<T, D>(value: impl TensorValue<T>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    FieldRef::new(ConstantField::new(value))
}

/// Creates the zero field with the same shape as `field`.
pub fn zero<T, D>(field: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    FieldRef::new(ZeroField::new(field.clone()))
}
