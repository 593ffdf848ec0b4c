use crate::assembly::assembler::{storage_index, Assembler};
use crate::assembly::data::{AssemblyData, MatrixData, VectorData};
use crate::assembly::strategy::{AssemblyStrategy, DefaultAssemblyStrategy};
use crate::dof::DofId;
use crate::space::FESpace;
use eyre::{eyre, WrapErr};
use femcore_traits::Real;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::slice::ParallelSliceMut;
use std::marker::PhantomData;

/// An assembler for CSR matrices.
///
/// The sparsity pattern of allocated matrices is computed from the cell data, so every entry
/// that the data writes to is stored, and no others.
#[derive(Debug, Clone)]
pub struct SparseMatrixAssembler<T, S = DefaultAssemblyStrategy> {
    num_rows: usize,
    num_cols: usize,
    strategy: S,
    marker: PhantomData<T>,
}

impl<T: Real> SparseMatrixAssembler<T> {
    /// An assembler whose rows are the free dofs of `test` and whose columns are the free dofs
    /// of `trial`.
    pub fn new<Trial, Test>(trial: &Trial, test: &Test) -> Self
    where
        Trial: FESpace<T>,
        Test: FESpace<T>,
    {
        Self::from_parts(test.num_free_dofs(), trial.num_free_dofs(), DefaultAssemblyStrategy)
    }
}

impl<T: Real, S: AssemblyStrategy> SparseMatrixAssembler<T, S> {
    pub fn from_parts(num_rows: usize, num_cols: usize, strategy: S) -> Self {
        Self {
            num_rows,
            num_cols,
            strategy,
            marker: PhantomData,
        }
    }

    /// Replaces the strategy, keeping the number of rows and columns.
    pub fn with_strategy<S2: AssemblyStrategy>(self, strategy: S2) -> SparseMatrixAssembler<T, S2> {
        SparseMatrixAssembler::from_parts(self.num_rows, self.num_cols, strategy)
    }

    /// Computes the sparsity pattern of all entries written by the given cells.
    pub fn assemble_pattern<'a>(
        &self,
        cells: impl Iterator<Item = (&'a [DofId], &'a [DofId])>,
    ) -> eyre::Result<SparsityPattern> {
        let strategy = &self.strategy;
        let mut coordinates = Vec::new();
        let mut cols = Vec::new();
        for (row_ids, col_ids) in cells {
            cols.clear();
            for &dof in col_ids {
                let col = storage_index(dof, |j| strategy.col_mask(j), |j| strategy.col_map(j), self.num_cols, "column")?;
                cols.extend(col);
            }
            for &dof in row_ids {
                let row = storage_index(dof, |i| strategy.row_mask(i), |i| strategy.row_map(i), self.num_rows, "row")?;
                if let Some(row) = row {
                    coordinates.extend(cols.iter().map(|&col| (row, col)));
                }
            }
        }

        coordinates.par_sort_unstable();
        coordinates.dedup();

        let mut row_offsets = Vec::with_capacity(self.num_rows + 1);
        let mut column_indices = Vec::with_capacity(coordinates.len());
        row_offsets.push(0);
        let mut current_row = 0;
        for (i, j) in coordinates {
            while i > current_row {
                row_offsets.push(column_indices.len());
                current_row += 1;
            }
            column_indices.push(j);
        }
        // Remaining rows are empty
        while row_offsets.len() < self.num_rows + 1 {
            row_offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(self.num_rows, self.num_cols, row_offsets, column_indices)
            .wrap_err("Internal error: assembled sparsity pattern is invalid")
    }

    fn allocate_from_pattern(&self, pattern: SparsityPattern) -> eyre::Result<CsrMatrix<T>> {
        let nnz = pattern.nnz();
        debug!(
            "Allocated {}x{} sparse matrix with {} non-zeros",
            self.num_rows, self.num_cols, nnz
        );
        CsrMatrix::try_from_pattern_and_values(pattern, vec![T::zero(); nnz])
            .map_err(|err| eyre!("Internal error: CSR data must be valid by construction: {}", err))
    }
}

impl<T: Real, S: AssemblyStrategy> Assembler<T> for SparseMatrixAssembler<T, S> {
    type Matrix = CsrMatrix<T>;
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

    fn allocate_matrix(&self, data: &MatrixData<T>) -> eyre::Result<CsrMatrix<T>> {
        let pattern = self.assemble_pattern(data.cells().map(|(_, rows, cols)| (rows, cols)))?;
        self.allocate_from_pattern(pattern)
    }

    fn allocate_vector(&self, _data: &VectorData<T>) -> eyre::Result<DVector<T>> {
        Ok(DVector::zeros(self.num_rows))
    }

    fn allocate_matrix_and_vector(&self, data: &AssemblyData<T>) -> eyre::Result<(CsrMatrix<T>, DVector<T>)> {
        let matvec_cells = data.matvec.cells().map(|(_, rows, cols)| (rows, cols));
        let matrix_cells = data.matrix.cells().map(|(_, rows, cols)| (rows, cols));
        let pattern = self.assemble_pattern(matvec_cells.chain(matrix_cells))?;
        Ok((self.allocate_from_pattern(pattern)?, DVector::zeros(self.num_rows)))
    }
}
