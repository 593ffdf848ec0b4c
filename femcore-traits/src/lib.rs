//! Core numeric traits shared by the `femcore` crates.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, RealField};

pub use nalgebra;

/// Scalar type used for field values and assembled systems.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Allocator bounds needed to work with points of dimension `D`.
///
/// Used as a trait alias so that generic code does not need to repeat the full set of bounds.
pub trait PointAllocator<T: Real, D: DimName>: Allocator<T, D> + Allocator<T, D, D> {}

impl<T, D> PointAllocator<T, D> for DefaultAllocator
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D> + Allocator<T, D, D>,
{
}
