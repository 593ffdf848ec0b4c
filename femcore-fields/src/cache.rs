//! Reusable evaluation buffers.
//!
//! Evaluating a field at many points (typically every quadrature point of every cell) must not
//! allocate for each evaluation. Every field therefore hands out a cache on request, and all
//! evaluations write into this cache. A cache belongs to the call site that requested it and must
//! not be shared between concurrent evaluations.
use crate::Tensor;

/// Opaque scratch storage for evaluating a single field at a single point.
///
/// The cache mirrors the structure of the field that created it: composite fields store the
/// caches of their constituent fields as children.
#[derive(Debug, Clone)]
pub struct FieldCache<T> {
    value: Tensor<T>,
    scratch: Vec<Tensor<T>>,
    children: Vec<FieldCache<T>>,
    frozen: bool,
}

impl<T> Default for FieldCache<T> {
    fn default() -> Self {
        Self::new(Tensor::default())
    }
}

impl<T> FieldCache<T> {
    pub fn new(value: Tensor<T>) -> Self {
        Self {
            value,
            scratch: Vec::new(),
            children: Vec::new(),
            frozen: false,
        }
    }

    pub fn with_children(mut self, children: Vec<FieldCache<T>>) -> Self {
        self.children = children;
        self
    }

    pub fn with_scratch(mut self, scratch: Vec<Tensor<T>>) -> Self {
        self.scratch = scratch;
        self
    }

    /// Marks the stored value as final, so that later evaluations may return it directly.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn value(&self) -> &Tensor<T> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Tensor<T> {
        &mut self.value
    }

    pub fn children_mut(&mut self) -> &mut [FieldCache<T>] {
        &mut self.children
    }

    /// Splits the cache into its output tensor, its scratch tensors and its child caches.
    pub fn parts_mut(&mut self) -> (&mut Tensor<T>, &mut [Tensor<T>], &mut [FieldCache<T>]) {
        (&mut self.value, &mut self.scratch, &mut self.children)
    }
}

/// A buffer whose logical length can change without releasing previously allocated elements.
///
/// Shrinking only changes the logical length, so that growing again later reuses the elements
/// (and their own allocations) that are already present.
#[derive(Debug, Clone)]
pub struct CachedArray<V> {
    buffer: Vec<V>,
    len: usize,
}

impl<V> Default for CachedArray<V> {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            len: 0,
        }
    }
}

impl<V: Default> CachedArray<V> {
    pub fn with_len(len: usize) -> Self {
        let mut array = Self::default();
        array.resize(len);
        array
    }

    pub fn resize(&mut self, len: usize) {
        if len > self.buffer.len() {
            self.buffer.resize_with(len, V::default);
        }
        self.len = len;
    }
}

impl<V> CachedArray<V> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of elements that are kept allocated.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_slice(&self) -> &[V] {
        &self.buffer[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.buffer[..self.len]
    }
}

/// Cache for evaluating a field at a sequence of points.
#[derive(Debug, Clone)]
pub struct BatchCache<T> {
    point: FieldCache<T>,
    values: CachedArray<Tensor<T>>,
}

impl<T> BatchCache<T> {
    pub fn new(point: FieldCache<T>, num_points: usize) -> Self {
        let mut values = CachedArray::default();
        values.resize(num_points);
        Self { point, values }
    }

    /// Splits the cache into the single-point cache and the output buffer.
    pub fn parts_mut(&mut self) -> (&mut FieldCache<T>, &mut CachedArray<Tensor<T>>) {
        (&mut self.point, &mut self.values)
    }

    pub fn values(&self) -> &[Tensor<T>] {
        self.values.as_slice()
    }
}
