use crate::assembly::assembler::Assembler;
use crate::assembly::data::{AssemblyData, MatrixData, VectorData};
use crate::assembly::strategy::{AssemblyStrategy, DefaultAssemblyStrategy};
use crate::space::FESpace;
use femcore_traits::Real;
use log::debug;
use nalgebra::{DMatrix, DVector};
use std::marker::PhantomData;

/// An assembler for dense matrices.
///
/// Mostly useful for small systems and for verifying other assemblers.
#[derive(Debug, Clone)]
pub struct DenseMatrixAssembler<T, S = DefaultAssemblyStrategy> {
    num_rows: usize,
    num_cols: usize,
    strategy: S,
    marker: PhantomData<T>,
}

impl<T: Real> DenseMatrixAssembler<T> {
    pub fn new<Trial, Test>(trial: &Trial, test: &Test) -> Self
    where
        Trial: FESpace<T>,
        Test: FESpace<T>,
    {
        Self::from_parts(test.num_free_dofs(), trial.num_free_dofs(), DefaultAssemblyStrategy)
    }
}

impl<T: Real, S: AssemblyStrategy> DenseMatrixAssembler<T, S> {
    pub fn from_parts(num_rows: usize, num_cols: usize, strategy: S) -> Self {
        Self {
            num_rows,
            num_cols,
            strategy,
            marker: PhantomData,
        }
    }

    pub fn with_strategy<S2: AssemblyStrategy>(self, strategy: S2) -> DenseMatrixAssembler<T, S2> {
        DenseMatrixAssembler::from_parts(self.num_rows, self.num_cols, strategy)
    }
}

impl<T: Real, S: AssemblyStrategy> Assembler<T> for DenseMatrixAssembler<T, S> {
    type Matrix = DMatrix<T>;
    type Vector = DVector<T>;
    type Strategy = S;

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn strategy(&self) -> &S {
        &self.strategy
    }

    fn allocate_matrix(&self, _data: &MatrixData<T>) -> eyre::Result<DMatrix<T>> {
        debug!("Allocated {}x{} dense matrix", self.num_rows, self.num_cols);
        Ok(DMatrix::zeros(self.num_rows, self.num_cols))
    }

    fn allocate_vector(&self, _data: &VectorData<T>) -> eyre::Result<DVector<T>> {
        Ok(DVector::zeros(self.num_rows))
    }

    fn allocate_matrix_and_vector(&self, data: &AssemblyData<T>) -> eyre::Result<(DMatrix<T>, DVector<T>)> {
        Ok((self.allocate_matrix(&data.matrix)?, DVector::zeros(self.num_rows)))
    }
}
