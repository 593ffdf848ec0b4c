//! Differentiable fields and global assembly of finite element systems.
//!
//! Fields live in [`fields`]. The rest of the crate turns per-cell contributions computed over
//! integration domains into global matrices and vectors.
pub mod assembly;
pub mod cell;
pub mod dof;
pub mod domain;
pub mod error;
pub mod space;
pub mod table;

pub mod fields {
    pub use femcore_fields::*;
}

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use femcore_traits::Real;
