//! Fields built from other fields.
//!
//! Composite fields are represented by an [`OperationField`] holding an [`Operator`] and its
//! operand fields, plus [`ComposedField`] for function composition. Gradients are derived
//! structurally by matching on the operator, and are themselves composite fields that are
//! only evaluated on demand.
use crate::tensor::{linear_combination_into, neg_into, product_with_partials_into};
use crate::{Field, FieldCache, FieldError, FieldRef, Product, Tensor};
use femcore_traits::{PointAllocator, Real};
use nalgebra::{DefaultAllocator, DimName, OPoint, OVector};
use std::any::type_name;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops;
use std::sync::Arc;

/// Pointwise function of the values of several fields.
pub type MapFunction<T> = Arc<dyn Fn(&[Tensor<T>], &mut Tensor<T>) -> Result<(), FieldError> + Send + Sync>;

/// The operation performed by an [`OperationField`] on the values of its operands.
#[derive(Clone)]
pub enum Operator<T> {
    Add,
    Sub,
    Neg,
    /// A bilinear product of two operands.
    ///
    /// The first `left_partials` indices of the left operand and the first `right_partials`
    /// indices of the right operand are derivative indices that are carried through the product
    /// rather than taking part in it. The derivative indices of the right operand come first in
    /// the result if `right_first` is set. Products without derivative indices are the ordinary
    /// products of two fields; the others only arise when differentiating products.
    Bilinear {
        product: Product,
        left_partials: usize,
        right_partials: usize,
        right_first: bool,
    },
    /// An arbitrary pointwise function of the operand values.
    Map(MapFunction<T>),
}

impl<T> Debug for Operator<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "Add"),
            Self::Sub => write!(f, "Sub"),
            Self::Neg => write!(f, "Neg"),
            Self::Bilinear {
                product,
                left_partials,
                right_partials,
                right_first,
            } => f
                .debug_struct("Bilinear")
                .field("product", product)
                .field("left_partials", left_partials)
                .field("right_partials", right_partials)
                .field("right_first", right_first)
                .finish(),
            Self::Map(_) => write!(f, "Map"),
        }
    }
}

impl<T> Operator<T> {
    /// The ordinary bilinear product of two fields.
    pub fn product(product: Product) -> Self {
        Self::Bilinear {
            product,
            left_partials: 0,
            right_partials: 0,
            right_first: false,
        }
    }

    /// The number of operands the operator expects, or `None` for any number.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Neg => Some(1),
            Self::Add | Self::Sub | Self::Bilinear { .. } => Some(2),
            Self::Map(_) => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Bilinear { product, .. } => product.name(),
            Self::Map(_) => "map",
        }
    }
}

/// A field obtained by applying an [`Operator`] to the values of other fields at the same point.
#[derive(Debug)]
pub struct OperationField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    operator: Operator<T>,
    operands: Vec<FieldRef<T, D>>,
}

impl<T, D> OperationField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    pub fn new(operator: Operator<T>, operands: Vec<FieldRef<T, D>>) -> Result<Self, FieldError> {
        if let Some(arity) = operator.arity() {
            if operands.len() != arity {
                return Err(FieldError::UnsupportedInput {
                    operation: operator.name(),
                    reason: "wrong number of operands for operator",
                });
            }
        }
        Ok(Self { operator, operands })
    }

    pub fn operator(&self) -> &Operator<T> {
        &self.operator
    }

    pub fn operands(&self) -> &[FieldRef<T, D>] {
        &self.operands
    }

    fn binary_operands(&self) -> Result<(&FieldRef<T, D>, &FieldRef<T, D>), FieldError> {
        match self.operands.as_slice() {
            [a, b] => Ok((a, b)),
            _ => Err(FieldError::UnsupportedInput {
                operation: self.operator.name(),
                reason: "operator requires exactly two operands",
            }),
        }
    }

    fn invalid_cache() -> FieldError {
        FieldError::InvalidCache {
            field: type_name::<Self>(),
        }
    }
}

/// Shorthand for constructing an operation whose arity is correct by construction.
fn operation<T, D>(operator: Operator<T>, operands: Vec<FieldRef<T, D>>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    FieldRef::new(OperationField { operator, operands })
}

fn bilinear<T, D>(
    product: Product,
    left_partials: usize,
    right_partials: usize,
    right_first: bool,
    a: FieldRef<T, D>,
    b: FieldRef<T, D>,
) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    let operator = Operator::Bilinear {
        product,
        left_partials,
        right_partials,
        right_first,
    };
    operation(operator, vec![a, b])
}

impl<T, D> Field<T, D> for OperationField<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    fn return_cache(&self, x: &OPoint<T, D>) -> FieldCache<T> {
        let children = self
            .operands
            .iter()
            .map(|operand| operand.return_cache(x))
            .collect();
        let scratch = match self.operator {
            Operator::Map(_) => vec![Tensor::default(); self.operands.len()],
            _ => Vec::new(),
        };
        FieldCache::default()
            .with_children(children)
            .with_scratch(scratch)
    }

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError> {
        if cache.is_frozen() {
            return Ok(cache.value());
        }

        let (value, scratch, children) = cache.parts_mut();
        if children.len() != self.operands.len() {
            return Err(Self::invalid_cache());
        }

        match &self.operator {
            Operator::Neg => {
                let a = self.operands[0].evaluate(&mut children[0], x)?;
                neg_into(value, a.view());
            }
            Operator::Add | Operator::Sub | Operator::Bilinear { .. } => {
                let (a_field, b_field) = self.binary_operands()?;
                let [a_cache, b_cache] = &mut *children else {
                    return Err(Self::invalid_cache());
                };
                let a = a_field.evaluate(a_cache, x)?;
                let b = b_field.evaluate(b_cache, x)?;
                match self.operator {
                    Operator::Add => linear_combination_into(value, a.view(), b.view(), T::one(), "add")?,
                    Operator::Sub => linear_combination_into(value, a.view(), b.view(), -T::one(), "sub")?,
                    Operator::Bilinear {
                        product,
                        left_partials,
                        right_partials,
                        right_first,
                    } => product_with_partials_into(
                        value,
                        product,
                        a.view(),
                        left_partials,
                        b.view(),
                        right_partials,
                        right_first,
                    )?,
                    _ => unreachable!("operator is binary"),
                }
            }
            Operator::Map(function) => {
                if scratch.len() != self.operands.len() {
                    return Err(Self::invalid_cache());
                }
                for ((operand, child), slot) in self.operands.iter().zip(children.iter_mut()).zip(scratch.iter_mut()) {
                    let operand_value = operand.evaluate(child, x)?;
                    slot.assign(operand_value.view());
                }
                function(scratch, value)?;
            }
        }

        // If no operand depends on the point, neither does the result
        let constant = !children.is_empty() && children.iter().all(FieldCache::is_frozen);
        if constant {
            cache.freeze();
        }
        Ok(cache.value())
    }

    fn gradient(&self, _this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        match &self.operator {
            Operator::Neg => Ok(neg(&self.operands[0].gradient()?)),
            Operator::Add => {
                let (a, b) = self.binary_operands()?;
                Ok(add(&a.gradient()?, &b.gradient()?))
            }
            Operator::Sub => {
                let (a, b) = self.binary_operands()?;
                Ok(sub(&a.gradient()?, &b.gradient()?))
            }
            &Operator::Bilinear {
                product,
                left_partials,
                right_partials,
                right_first: _,
            } => {
                let (a, b) = self.binary_operands()?;
                if left_partials + right_partials >= 2 {
                    return Err(FieldError::DerivativeUnavailable {
                        order: left_partials + right_partials + 1,
                    });
                }
                // The new derivative index always comes first. With at most one operand carrying
                // a derivative index, `right_first` does not affect the layout.
                let left_term = bilinear(product, left_partials + 1, right_partials, false, a.gradient()?, b.clone());
                let right_term = if left_partials == 0 {
                    bilinear(product, 0, right_partials + 1, false, a.clone(), b.gradient()?)
                } else {
                    bilinear(product, left_partials, 1, true, a.clone(), b.gradient()?)
                };
                Ok(add(&left_term, &right_term))
            }
            Operator::Map(_) => Err(FieldError::NotImplemented {
                operation: "gradient",
                field: "OperationField with Map operator",
            }),
        }
    }
}

/// The composition `f ∘ g` of a field `f` on `E`-dimensional points with a field `g` whose
/// values are vectors of length `E`.
#[derive(Debug)]
pub struct ComposedField<T, D, E>
where
    T: Real,
    D: DimName,
    E: DimName,
    DefaultAllocator: PointAllocator<T, D> + PointAllocator<T, E>,
{
    outer: FieldRef<T, E>,
    inner: FieldRef<T, D>,
}

impl<T, D, E> ComposedField<T, D, E>
where
    T: Real,
    D: DimName,
    E: DimName,
    DefaultAllocator: PointAllocator<T, D> + PointAllocator<T, E>,
{
    pub fn new(outer: FieldRef<T, E>, inner: FieldRef<T, D>) -> Self {
        Self { outer, inner }
    }

    pub fn outer(&self) -> &FieldRef<T, E> {
        &self.outer
    }

    pub fn inner(&self) -> &FieldRef<T, D> {
        &self.inner
    }
}

impl<T, D, E> Field<T, D> for ComposedField<T, D, E>
where
    T: Real,
    D: DimName,
    E: DimName,
    DefaultAllocator: PointAllocator<T, D> + PointAllocator<T, E>,
{
    fn return_cache(&self, x: &OPoint<T, D>) -> FieldCache<T> {
        let inner_cache = self.inner.return_cache(x);
        let outer_cache = self.outer.return_cache(&OPoint::origin());
        FieldCache::default().with_children(vec![inner_cache, outer_cache])
    }

    fn evaluate<'c>(&self, cache: &'c mut FieldCache<T>, x: &OPoint<T, D>) -> Result<&'c Tensor<T>, FieldError> {
        let (value, _, children) = cache.parts_mut();
        let [inner_cache, outer_cache] = children else {
            return Err(FieldError::InvalidCache {
                field: type_name::<Self>(),
            });
        };
        let y = self.inner.evaluate(inner_cache, x)?;
        if y.shape() != [E::dim()] {
            return Err(FieldError::ShapeMismatch {
                operation: "compose",
                expected: vec![E::dim()],
                actual: y.shape().to_vec(),
            });
        }
        let y = OPoint::from(OVector::<T, E>::from_column_slice(y.as_slice()));
        let outer_value = self.outer.evaluate(outer_cache, &y)?;
        value.assign(outer_value.view());
        Ok(cache.value())
    }

    fn gradient(&self, _this: &FieldRef<T, D>) -> Result<FieldRef<T, D>, FieldError> {
        // Chain rule with leading derivative indices: ∇(f ∘ g) = ∇g ⋅ ((∇f) ∘ g)
        let outer_gradient = self.outer.gradient()?;
        let inner_gradient = self.inner.gradient()?;
        Ok(dot(&inner_gradient, &compose(&outer_gradient, &self.inner)))
    }
}

pub fn add<T, D>(a: &FieldRef<T, D>, b: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    operation(Operator::Add, vec![a.clone(), b.clone()])
}

pub fn sub<T, D>(a: &FieldRef<T, D>, b: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    operation(Operator::Sub, vec![a.clone(), b.clone()])
}

pub fn neg<T, D>(a: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    operation(Operator::Neg, vec![a.clone()])
}

/// The product of two fields, at least one of which must be scalar-valued.
///
/// A violation is reported when the product is evaluated.
pub fn mul<T, D>(a: &FieldRef<T, D>, b: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    operation(Operator::product(Product::Mul), vec![a.clone(), b.clone()])
}

/// Contraction of the last index of `a` with the first index of `b`.
pub fn dot<T, D>(a: &FieldRef<T, D>, b: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    operation(Operator::product(Product::Dot), vec![a.clone(), b.clone()])
}

pub fn outer<T, D>(a: &FieldRef<T, D>, b: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    operation(Operator::product(Product::Outer), vec![a.clone(), b.clone()])
}

/// The field `x -> f(g(x))`.
pub fn compose<T, D, E>(f: &FieldRef<T, E>, g: &FieldRef<T, D>) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    E: DimName,
    DefaultAllocator: PointAllocator<T, D> + PointAllocator<T, E>,
{
    FieldRef::new(ComposedField::new(f.clone(), g.clone()))
}

/// Applies `function` pointwise to the values of `operands`.
///
/// The function receives the operand values in order and writes its result into the output
/// tensor. It must not depend on anything but its arguments. Fields built this way cannot be
/// differentiated.
pub fn map<T, D, F>(operands: &[FieldRef<T, D>], function: F) -> FieldRef<T, D>
where
    T: Real,
    D: DimName,
    F: 'static + Send + Sync + Fn(&[Tensor<T>], &mut Tensor<T>) -> Result<(), FieldError>,
    DefaultAllocator: PointAllocator<T, D>,
{
    operation(Operator::Map(Arc::new(function)), operands.to_vec())
}

macro_rules! impl_binary_field_op {
    ($trait:ident, $method:ident, $constructor:ident) => {
        impl<T, D> ops::$trait<FieldRef<T, D>> for FieldRef<T, D>
        where
            T: Real,
            D: DimName,
            DefaultAllocator: PointAllocator<T, D>,
        {
            type Output = FieldRef<T, D>;

            fn $method(self, rhs: FieldRef<T, D>) -> Self::Output {
                $constructor(&self, &rhs)
            }
        }

        impl<'a, T, D> ops::$trait<&'a FieldRef<T, D>> for &'a FieldRef<T, D>
        where
            T: Real,
            D: DimName,
            DefaultAllocator: PointAllocator<T, D>,
        {
            type Output = FieldRef<T, D>;

            fn $method(self, rhs: &'a FieldRef<T, D>) -> Self::Output {
                $constructor(self, rhs)
            }
        }
    };
}

impl_binary_field_op!(Add, add, add);
impl_binary_field_op!(Sub, sub, sub);
impl_binary_field_op!(Mul, mul, mul);

impl<T, D> ops::Neg for FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    type Output = FieldRef<T, D>;

    fn neg(self) -> Self::Output {
        neg(&self)
    }
}

impl<'a, T, D> ops::Neg for &'a FieldRef<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: PointAllocator<T, D>,
{
    type Output = FieldRef<T, D>;

    fn neg(self) -> Self::Output {
        neg(self)
    }
}
