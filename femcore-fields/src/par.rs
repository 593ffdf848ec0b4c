use crate::{CachedArray, FieldCache, FieldError, FieldRef, Tensor};
use femcore_traits::{PointAllocator, Real};
use nalgebra::{DefaultAllocator, DimName, OPoint};
use rayon::prelude::*;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// Evaluates a field at many points in parallel.
///
/// Every worker thread evaluates with its own cache, which is created on first use and kept
/// for subsequent calls.
#[derive(Debug)]
pub struct ParFieldEvaluator<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    field: FieldRef<T, D>,
    caches: ThreadLocal<RefCell<FieldCache<T>>>,
}

impl<T, D> ParFieldEvaluator<T, D>
where
    T: Real,
    D: DimName,
    OPoint<T, D>: Sync,
    DefaultAllocator: PointAllocator<T, D>,
{
    pub fn new(field: FieldRef<T, D>) -> Self {
        Self {
            field,
            caches: ThreadLocal::new(),
        }
    }

    pub fn field(&self) -> &FieldRef<T, D> {
        &self.field
    }

    /// Evaluates the field at every point in `xs`, storing the results in `values`.
    ///
    /// `values` is resized to the number of points, reusing previously allocated tensors.
    pub fn evaluate_batch(&self, xs: &[OPoint<T, D>], values: &mut CachedArray<Tensor<T>>) -> Result<(), FieldError> {
        values.resize(xs.len());
        xs.par_iter()
            .zip(values.as_mut_slice().par_iter_mut())
            .with_min_len(64)
            .try_for_each(|(x, out)| {
                let cache = self
                    .caches
                    .get_or(|| RefCell::new(self.field.return_cache(x)));
                let cache = &mut *cache.borrow_mut();
                let value = self.field.evaluate(cache, x)?;
                out.assign(value.view());
                Ok(())
            })
    }

    pub fn evaluate_all(&self, xs: &[OPoint<T, D>]) -> Result<Vec<Tensor<T>>, FieldError> {
        let mut values = CachedArray::default();
        self.evaluate_batch(xs, &mut values)?;
        Ok(values.as_slice().to_vec())
    }

    /// Drops the caches of all threads.
    pub fn clear(&mut self) {
        self.caches.clear();
    }
}
