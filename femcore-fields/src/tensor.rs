//! Dense tensors of arbitrary order used as field values.
//!
//! Tensors are stored in row-major order, so that the sub-tensor obtained by fixing the leading
//! index is contiguous in memory. Gradients prepend the derivative direction as the leading index,
//! which makes the individual partial derivatives cheap to slice out.
use crate::FieldError;
use femcore_traits::Real;
use nalgebra::allocator::Allocator;
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, DefaultAllocator, Dim, DimName, Matrix, OPoint};
use serde::{Deserialize, Serialize};

/// A dense tensor with row-major storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

/// A borrowed view of a tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorView<'a, T> {
    shape: &'a [usize],
    data: &'a [T],
}

fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl<T> Default for Tensor<T> {
    /// An empty vector, i.e. a tensor of order one with zero entries.
    fn default() -> Self {
        Self {
            shape: vec![0],
            data: Vec::new(),
        }
    }
}

impl<T> Tensor<T> {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn order(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn view(&self) -> TensorView<'_, T> {
        TensorView {
            shape: &self.shape,
            data: &self.data,
        }
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<T>) {
        (self.shape, self.data)
    }
}

impl<T: Real> Tensor<T> {
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![T::zero(); num_elements(shape)],
        }
    }

    pub fn scalar(value: T) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn from_shape_and_data(shape: Vec<usize>, data: Vec<T>) -> Result<Self, FieldError> {
        if num_elements(&shape) != data.len() {
            return Err(FieldError::ShapeMismatch {
                operation: "from_shape_and_data",
                expected: shape,
                actual: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    /// Creates a tensor of order one from the given entries.
    pub fn from_vector_slice(entries: &[T]) -> Self {
        Self {
            shape: vec![entries.len()],
            data: entries.to_vec(),
        }
    }

    /// Creates a tensor of order two from the given matrix, regardless of its dimensions.
    pub fn from_matrix<R, C, S>(matrix: &Matrix<T, R, C, S>) -> Self
    where
        R: Dim,
        C: Dim,
        S: Storage<T, R, C>,
    {
        let mut tensor = Self::default();
        tensor.assign_matrix(matrix, false);
        tensor
    }

    pub fn to_scalar(&self) -> Option<T> {
        (self.order() == 0).then(|| self.data[0])
    }

    pub fn to_dvector(&self) -> Option<DVector<T>> {
        (self.order() == 1).then(|| DVector::from_column_slice(&self.data))
    }

    pub fn to_dmatrix(&self) -> Option<DMatrix<T>> {
        (self.order() == 2).then(|| DMatrix::from_row_slice(self.shape[0], self.shape[1], &self.data))
    }

    /// Changes the shape of the tensor and sets all entries to zero.
    ///
    /// The storage is reused, so that no allocation takes place once the tensor has held
    /// a tensor of the same size before.
    pub fn reshape_zeroed(&mut self, shape: &[usize]) {
        self.shape.clear();
        self.shape.extend_from_slice(shape);
        self.zero_data();
    }

    fn zero_data(&mut self) {
        let n = num_elements(&self.shape);
        self.data.clear();
        self.data.resize(n, T::zero());
    }

    /// Copies the contents of `other` into `self`, reusing the existing storage.
    pub fn assign(&mut self, other: TensorView<T>) {
        self.shape.clear();
        self.shape.extend_from_slice(other.shape);
        self.data.clear();
        self.data.extend_from_slice(other.data);
    }

    fn assign_matrix<R, C, S>(&mut self, matrix: &Matrix<T, R, C, S>, as_vector: bool)
    where
        R: Dim,
        C: Dim,
        S: Storage<T, R, C>,
    {
        let (nrows, ncols) = matrix.shape();
        self.shape.clear();
        if as_vector {
            self.shape.push(nrows);
        } else {
            self.shape.extend_from_slice(&[nrows, ncols]);
        }
        self.data.clear();
        for i in 0..nrows {
            for j in 0..ncols {
                self.data.push(matrix[(i, j)]);
            }
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn scale_mut(&mut self, factor: T) {
        for x in &mut self.data {
            *x *= factor;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|x| *x == T::zero())
    }

    /// Returns the largest absolute entry-wise difference, or `None` if the shapes differ.
    pub fn max_abs_diff(&self, other: &Tensor<T>) -> Option<T> {
        (self.shape == other.shape).then(|| {
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (*a - *b).abs())
                .fold(T::zero(), |acc, d| acc.max(d))
        })
    }

    pub fn add(&self, other: &Tensor<T>) -> Result<Tensor<T>, FieldError> {
        let mut out = Tensor::default();
        linear_combination_into(&mut out, self.view(), other.view(), T::one(), "add")?;
        Ok(out)
    }

    pub fn sub(&self, other: &Tensor<T>) -> Result<Tensor<T>, FieldError> {
        let mut out = Tensor::default();
        linear_combination_into(&mut out, self.view(), other.view(), -T::one(), "sub")?;
        Ok(out)
    }

    pub fn product(&self, product: Product, other: &Tensor<T>) -> Result<Tensor<T>, FieldError> {
        let mut out = Tensor::default();
        product_with_partials_into(&mut out, product, self.view(), 0, other.view(), 0, false)?;
        Ok(out)
    }

    pub fn dot(&self, other: &Tensor<T>) -> Result<Tensor<T>, FieldError> {
        self.product(Product::Dot, other)
    }

    pub fn outer(&self, other: &Tensor<T>) -> Result<Tensor<T>, FieldError> {
        self.product(Product::Outer, other)
    }
}

impl<'a, T> TensorView<'a, T> {
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn order(&self) -> usize {
        self.shape.len()
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Splits the shape into the first `k` indices and the remaining indices.
    fn split_leading(&self, k: usize, operation: &'static str) -> Result<(&'a [usize], &'a [usize]), FieldError> {
        if k > self.shape.len() {
            return Err(FieldError::UnsupportedInput {
                operation,
                reason: "operand has fewer indices than the number of derivative indices",
            });
        }
        Ok(self.shape.split_at(k))
    }

    /// The contiguous sub-tensor at the given flat position of the first `k` indices.
    fn block(&self, k: usize, index: usize) -> TensorView<'a, T> {
        let tail = &self.shape[k..];
        let block_size = num_elements(tail);
        TensorView {
            shape: tail,
            data: &self.data[index * block_size..(index + 1) * block_size],
        }
    }
}

/// The bilinear products supported between tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    /// Product where at least one operand is a scalar.
    Mul,
    /// Contraction of the last index of the left operand with the first index of the right operand.
    Dot,
    /// Tensor (outer) product.
    Outer,
}

impl Product {
    pub fn name(self) -> &'static str {
        match self {
            Self::Mul => "mul",
            Self::Dot => "dot",
            Self::Outer => "outer",
        }
    }

    /// Appends the shape of the product of tensors with shapes `a` and `b` to `out`.
    fn push_result_shape(self, a: &[usize], b: &[usize], out: &mut Vec<usize>) -> Result<(), FieldError> {
        match self {
            Self::Mul => {
                if a.is_empty() {
                    out.extend_from_slice(b);
                } else if b.is_empty() {
                    out.extend_from_slice(a);
                } else {
                    return Err(FieldError::UnsupportedInput {
                        operation: "mul",
                        reason: "at least one operand must be a scalar, use `dot` or `outer` instead",
                    });
                }
            }
            Self::Dot => {
                let (Some(a_last), Some(b_first)) = (a.last(), b.first()) else {
                    return Err(FieldError::UnsupportedInput {
                        operation: "dot",
                        reason: "both operands must have order at least one",
                    });
                };
                if a_last != b_first {
                    return Err(FieldError::ShapeMismatch {
                        operation: "dot",
                        expected: vec![*a_last],
                        actual: vec![*b_first],
                    });
                }
                out.extend_from_slice(&a[..a.len() - 1]);
                out.extend_from_slice(&b[1..]);
            }
            Self::Outer => {
                out.extend_from_slice(a);
                out.extend_from_slice(b);
            }
        }
        Ok(())
    }

    /// Writes the product of `a` and `b` into `out`.
    ///
    /// The shapes must have been validated with `push_result_shape`.
    fn apply_into<T: Real>(self, a: TensorView<T>, b: TensorView<T>, out: &mut [T]) {
        match self {
            Self::Mul => {
                let (s, other) = if a.order() == 0 { (a.data[0], b.data) } else { (b.data[0], a.data) };
                for (o, x) in out.iter_mut().zip(other) {
                    *o = s * *x;
                }
            }
            Self::Dot => {
                let k = a.shape.last().copied().unwrap_or(0);
                if k == 0 {
                    out.fill(T::zero());
                    return;
                }
                let rows = a.data.len() / k;
                let cols = b.data.len() / k;
                for r in 0..rows {
                    for c in 0..cols {
                        let mut sum = T::zero();
                        for l in 0..k {
                            sum += a.data[r * k + l] * b.data[l * cols + c];
                        }
                        out[r * cols + c] = sum;
                    }
                }
            }
            Self::Outer => {
                let nb = b.data.len();
                for (r, x) in a.data.iter().enumerate() {
                    for (c, y) in b.data.iter().enumerate() {
                        out[r * nb + c] = *x * *y;
                    }
                }
            }
        }
    }
}

/// Computes `out = a + sign * b`.
pub(crate) fn linear_combination_into<T: Real>(
    out: &mut Tensor<T>,
    a: TensorView<T>,
    b: TensorView<T>,
    sign: T,
    operation: &'static str,
) -> Result<(), FieldError> {
    if a.shape != b.shape {
        return Err(FieldError::ShapeMismatch {
            operation,
            expected: a.shape.to_vec(),
            actual: b.shape.to_vec(),
        });
    }
    out.assign(a);
    for (o, x) in out.data.iter_mut().zip(b.data) {
        *o += sign * *x;
    }
    Ok(())
}

pub(crate) fn neg_into<T: Real>(out: &mut Tensor<T>, a: TensorView<T>) {
    out.assign(a);
    for x in &mut out.data {
        *x = -*x;
    }
}

/// Evaluates a bilinear product whose operands carry leading derivative indices.
///
/// `a` has `left_partials` leading derivative indices and `b` has `right_partials`. For every
/// combination of derivative indices `I` of `a` and `J` of `b`, the product of the sub-tensors
/// `a[I]` and `b[J]` is stored at `out[I, J]`, or at `out[J, I]` if `right_first` is set.
pub(crate) fn product_with_partials_into<T: Real>(
    out: &mut Tensor<T>,
    product: Product,
    a: TensorView<T>,
    left_partials: usize,
    b: TensorView<T>,
    right_partials: usize,
    right_first: bool,
) -> Result<(), FieldError> {
    let (a_lead, a_tail) = a.split_leading(left_partials, product.name())?;
    let (b_lead, b_tail) = b.split_leading(right_partials, product.name())?;
    let na = num_elements(a_lead);
    let nb = num_elements(b_lead);

    out.shape.clear();
    if right_first {
        out.shape.extend_from_slice(b_lead);
        out.shape.extend_from_slice(a_lead);
    } else {
        out.shape.extend_from_slice(a_lead);
        out.shape.extend_from_slice(b_lead);
    }
    product.push_result_shape(a_tail, b_tail, &mut out.shape)?;
    out.zero_data();

    let block_size = num_elements(&out.shape[left_partials + right_partials..]);
    for ia in 0..na {
        let a_block = a.block(left_partials, ia);
        for jb in 0..nb {
            let b_block = b.block(right_partials, jb);
            let idx = if right_first { jb * na + ia } else { ia * nb + jb };
            let out_block = &mut out.data[idx * block_size..(idx + 1) * block_size];
            product.apply_into(a_block, b_block, out_block);
        }
    }
    Ok(())
}

/// Values that can be written into a [`Tensor`] without intermediate allocation.
///
/// This is the conversion used for the return values of functions wrapped as fields.
pub trait TensorValue<T> {
    fn write_to(&self, out: &mut Tensor<T>);
}

impl TensorValue<f64> for f64 {
    fn write_to(&self, out: &mut Tensor<f64>) {
        out.reshape_zeroed(&[]);
        out.data[0] = *self;
    }
}

impl TensorValue<f32> for f32 {
    fn write_to(&self, out: &mut Tensor<f32>) {
        out.reshape_zeroed(&[]);
        out.data[0] = *self;
    }
}

/// Matrices whose column dimension is statically one are written as tensors of order one,
/// all other matrices as tensors of order two.
impl<T, R, C, S> TensorValue<T> for Matrix<T, R, C, S>
where
    T: Real,
    R: Dim,
    C: Dim,
    S: Storage<T, R, C>,
{
    fn write_to(&self, out: &mut Tensor<T>) {
        out.assign_matrix(self, C::try_to_usize() == Some(1));
    }
}

impl<T, D> TensorValue<T> for OPoint<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn write_to(&self, out: &mut Tensor<T>) {
        out.assign_matrix(&self.coords, true);
    }
}

impl<T: Real> TensorValue<T> for Tensor<T> {
    fn write_to(&self, out: &mut Tensor<T>) {
        out.assign(self.view());
    }
}
