//! Differentiable fields: functions from points to tensors that can be composed lazily and
//! evaluated with reusable caches.
pub use femcore_traits::nalgebra;

mod cache;
mod constant;
mod error;
mod field;
mod function;
mod operation;
mod tensor;

pub use cache::*;
pub use constant::*;
pub use error::*;
pub use field::*;
pub use function::*;
pub use operation::*;
pub use tensor::{Product, Tensor, TensorValue, TensorView};

pub mod integrate;
pub mod par;
pub mod testing;
