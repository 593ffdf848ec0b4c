//! Collection of domain contributions and assembly of global systems.
//!
//! Assembly proceeds in two stages. Collection turns the [`DomainContribution`]s of a bilinear
//! and a linear form into cell-indexed data, attaching the constraints of the trial and test
//! spaces and optionally lifting known Dirichlet values into the right-hand side. An
//! [`Assembler`] then writes the collected data into global storage.
use crate::domain::DomainContribution;
use crate::space::{CellDofValues, FESpace};
use femcore_traits::Real;
use nalgebra::DMatrix;

mod assembler;
mod collect;
mod data;
mod dense;
mod sparse;
mod strategy;

pub mod conformance;

pub use assembler::*;
pub use collect::*;
pub use data::*;
pub use dense::*;
pub use sparse::*;
pub use strategy::*;

/// Collects a bilinear form and assembles its matrix.
pub fn assemble_matrix_from_form<T, A, Trial, Test>(
    assembler: &A,
    trial: &Trial,
    test: &Test,
    a: DomainContribution<DMatrix<T>>,
) -> eyre::Result<A::Matrix>
where
    T: Real,
    A: Assembler<T>,
    Trial: FESpace<T>,
    Test: FESpace<T>,
{
    let data = collect_cell_matrix(trial, test, a)?;
    assembler.assemble_matrix(&data)
}

/// Collects a linear form and assembles its vector.
pub fn assemble_vector_from_form<T, A, Test>(
    assembler: &A,
    test: &Test,
    l: impl Into<LinearForm<T>>,
) -> eyre::Result<A::Vector>
where
    T: Real,
    A: Assembler<T>,
    Test: FESpace<T>,
{
    let data = collect_cell_vector(test, l)?;
    assembler.assemble_vector(&data)
}

/// Collects a bilinear and a linear form and assembles the system `A u = b`.
///
/// If `dirichlet` is given, its values are lifted into `b`, so that the returned system is the
/// system for the free dofs only.
pub fn assemble_affine_system<T, A, Trial, Test>(
    assembler: &A,
    trial: &Trial,
    test: &Test,
    a: DomainContribution<DMatrix<T>>,
    l: impl Into<LinearForm<T>>,
    dirichlet: Option<&dyn CellDofValues<T>>,
) -> eyre::Result<(A::Matrix, A::Vector)>
where
    T: Real,
    A: Assembler<T>,
    Trial: FESpace<T>,
    Test: FESpace<T>,
{
    let data = collect_cell_matrix_and_vector(trial, test, a, l, dirichlet)?;
    assembler.assemble_matrix_and_vector(&data)
}
