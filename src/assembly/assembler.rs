use crate::assembly::data::{AssemblyData, MatrixData, VectorData};
use crate::assembly::strategy::AssemblyStrategy;
use crate::dof::DofId;
use crate::error::AssemblyError;
use femcore_traits::Real;
use itertools::izip;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use std::fmt::Debug;
use std::ops::Range;

/// Global matrix storage that assemblers write into.
pub trait GlobalMatrix<T: Real>: Clone + Debug {
    fn shape(&self) -> (usize, usize);

    /// Sets every stored entry to zero, keeping the storage structure.
    fn fill_zero(&mut self);

    /// Adds `value` to the entry at `(row, col)`.
    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()>;

    fn to_dense(&self) -> DMatrix<T>;
}

/// Global vector storage that assemblers write into.
pub trait GlobalVector<T: Real>: Clone + Debug {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fill_zero(&mut self);

    fn add_entry(&mut self, index: usize, value: T) -> eyre::Result<()>;

    fn to_dense(&self) -> DVector<T>;
}

fn check_entry(context: &'static str, index: usize, bound: usize) -> eyre::Result<()> {
    if index >= bound {
        return Err(AssemblyError::IndexOutOfBounds { context, index, bound }.into());
    }
    Ok(())
}

impl<T: Real> GlobalMatrix<T> for CsrMatrix<T> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn fill_zero(&mut self) {
        self.values_mut().fill(T::zero());
    }

    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        check_entry("sparse matrix row", row, self.nrows())?;
        let mut csr_row = self.row_mut(row);
        let (cols, values) = csr_row.cols_and_values_mut();
        let local_index = cols
            .binary_search(&col)
            .map_err(|_| AssemblyError::EntryOutsidePattern { row, col })?;
        values[local_index] += value;
        Ok(())
    }

    fn to_dense(&self) -> DMatrix<T> {
        DMatrix::from(self)
    }
}

impl<T: Real> GlobalMatrix<T> for DMatrix<T> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn fill_zero(&mut self) {
        self.fill(T::zero());
    }

    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        check_entry("dense matrix row", row, self.nrows())?;
        check_entry("dense matrix column", col, self.ncols())?;
        self[(row, col)] += value;
        Ok(())
    }

    fn to_dense(&self) -> DMatrix<T> {
        self.clone()
    }
}

impl<T: Real> GlobalVector<T> for DVector<T> {
    fn len(&self) -> usize {
        self.nrows()
    }

    fn fill_zero(&mut self) {
        self.fill(T::zero());
    }

    fn add_entry(&mut self, index: usize, value: T) -> eyre::Result<()> {
        check_entry("vector entry", index, self.nrows())?;
        self[index] += value;
        Ok(())
    }

    fn to_dense(&self) -> DVector<T> {
        self.clone()
    }
}

/// Translates a global dof into an index of assembler storage.
///
/// Returns `None` for dofs that do not participate: Dirichlet dofs and indices rejected by the
/// mask.
pub(crate) fn storage_index(
    dof: DofId,
    mask: impl Fn(usize) -> bool,
    map: impl Fn(usize) -> usize,
    bound: usize,
    context: &'static str,
) -> eyre::Result<Option<usize>> {
    let DofId::Free(index) = dof else {
        return Ok(None);
    };
    if !mask(index) {
        return Ok(None);
    }
    let mapped = map(index);
    check_entry(context, mapped, bound)?;
    Ok(Some(mapped))
}

fn check_shape(context: &'static str, expected: (usize, usize), actual: (usize, usize)) -> eyre::Result<()> {
    if expected != actual {
        return Err(AssemblyError::MismatchedDimensions {
            context,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn add_cell_matrix<T, S, M>(
    strategy: &S,
    shape: (usize, usize),
    global: &mut M,
    local: &DMatrix<T>,
    row_ids: &[DofId],
    col_ids: &[DofId],
) -> eyre::Result<()>
where
    T: Real,
    S: ?Sized + AssemblyStrategy,
    M: GlobalMatrix<T>,
{
    let (num_rows, num_cols) = shape;
    for (local_row, &row_dof) in row_ids.iter().enumerate() {
        let row = storage_index(row_dof, |i| strategy.row_mask(i), |i| strategy.row_map(i), num_rows, "row")?;
        let Some(row) = row else { continue };
        for (local_col, &col_dof) in col_ids.iter().enumerate() {
            let col = storage_index(col_dof, |j| strategy.col_mask(j), |j| strategy.col_map(j), num_cols, "column")?;
            if let Some(col) = col {
                global.add_entry(row, col, local[(local_row, local_col)])?;
            }
        }
    }
    Ok(())
}

fn add_cell_vector<T, S, V>(
    strategy: &S,
    num_rows: usize,
    global: &mut V,
    local: &DVector<T>,
    row_ids: &[DofId],
) -> eyre::Result<()>
where
    T: Real,
    S: ?Sized + AssemblyStrategy,
    V: GlobalVector<T>,
{
    for (&value, &row_dof) in izip!(local.iter(), row_ids) {
        let row = storage_index(row_dof, |i| strategy.row_mask(i), |i| strategy.row_map(i), num_rows, "row")?;
        if let Some(row) = row {
            global.add_entry(row, value)?;
        }
    }
    Ok(())
}

/// Assembles collected cell data into global storage.
///
/// An assembler has fixed row and column index sets, whose sizes determine the shape of all
/// storage it allocates, regardless of the data. Every entry of every cell is first checked
/// against the masks of the [strategy](Self::strategy) and then translated by its maps. Entries
/// of cells that share global dofs are summed.
///
/// Writing comes in three flavors:
/// - `assemble_*_into` overwrites previously allocated storage,
/// - `assemble_*_add` adds to previously allocated storage,
/// - `assemble_*` allocates storage and writes into it.
pub trait Assembler<T: Real> {
    type Matrix: GlobalMatrix<T>;
    type Vector: GlobalVector<T>;
    type Strategy: ?Sized + AssemblyStrategy;

    fn num_rows(&self) -> usize;

    fn num_cols(&self) -> usize;

    fn rows(&self) -> Range<usize> {
        0..self.num_rows()
    }

    fn cols(&self) -> Range<usize> {
        0..self.num_cols()
    }

    fn strategy(&self) -> &Self::Strategy;

    /// Allocates zeroed matrix storage of shape `(num_rows, num_cols)` able to hold `data`.
    fn allocate_matrix(&self, data: &MatrixData<T>) -> eyre::Result<Self::Matrix>;

    /// Allocates a zeroed vector of length `num_rows`.
    fn allocate_vector(&self, data: &VectorData<T>) -> eyre::Result<Self::Vector>;

    fn allocate_matrix_and_vector(&self, data: &AssemblyData<T>) -> eyre::Result<(Self::Matrix, Self::Vector)> {
        let (matrix, vector) = data.split();
        Ok((self.allocate_matrix(&matrix)?, self.allocate_vector(&vector)?))
    }

    fn assemble_matrix_add(&self, matrix: &mut Self::Matrix, data: &MatrixData<T>) -> eyre::Result<()> {
        let shape = (self.num_rows(), self.num_cols());
        check_shape("global matrix", shape, matrix.shape())?;
        for (local, row_ids, col_ids) in data.cells() {
            add_cell_matrix(self.strategy(), shape, matrix, local, row_ids, col_ids)?;
        }
        Ok(())
    }

    fn assemble_vector_add(&self, vector: &mut Self::Vector, data: &VectorData<T>) -> eyre::Result<()> {
        let num_rows = self.num_rows();
        check_shape("global vector", (num_rows, 1), (vector.len(), 1))?;
        for (local, row_ids) in data.cells() {
            add_cell_vector(self.strategy(), num_rows, vector, local, row_ids)?;
        }
        Ok(())
    }

    fn assemble_matrix_and_vector_add(
        &self,
        matrix: &mut Self::Matrix,
        vector: &mut Self::Vector,
        data: &AssemblyData<T>,
    ) -> eyre::Result<()> {
        let shape = (self.num_rows(), self.num_cols());
        check_shape("global matrix", shape, matrix.shape())?;
        check_shape("global vector", (shape.0, 1), (vector.len(), 1))?;
        for (pair, row_ids, col_ids) in data.matvec.cells() {
            add_cell_matrix(self.strategy(), shape, matrix, pair.matrix(), row_ids, col_ids)?;
            add_cell_vector(self.strategy(), shape.0, vector, pair.vector(), row_ids)?;
        }
        self.assemble_matrix_add(matrix, &data.matrix)?;
        self.assemble_vector_add(vector, &data.vector)
    }

    fn assemble_matrix_into(&self, matrix: &mut Self::Matrix, data: &MatrixData<T>) -> eyre::Result<()> {
        matrix.fill_zero();
        self.assemble_matrix_add(matrix, data)
    }

    fn assemble_vector_into(&self, vector: &mut Self::Vector, data: &VectorData<T>) -> eyre::Result<()> {
        vector.fill_zero();
        self.assemble_vector_add(vector, data)
    }

    fn assemble_matrix_and_vector_into(
        &self,
        matrix: &mut Self::Matrix,
        vector: &mut Self::Vector,
        data: &AssemblyData<T>,
    ) -> eyre::Result<()> {
        matrix.fill_zero();
        vector.fill_zero();
        self.assemble_matrix_and_vector_add(matrix, vector, data)
    }

    fn assemble_matrix(&self, data: &MatrixData<T>) -> eyre::Result<Self::Matrix> {
        let mut matrix = self.allocate_matrix(data)?;
        self.assemble_matrix_into(&mut matrix, data)?;
        Ok(matrix)
    }

    fn assemble_vector(&self, data: &VectorData<T>) -> eyre::Result<Self::Vector> {
        let mut vector = self.allocate_vector(data)?;
        self.assemble_vector_into(&mut vector, data)?;
        Ok(vector)
    }

    fn assemble_matrix_and_vector(&self, data: &AssemblyData<T>) -> eyre::Result<(Self::Matrix, Self::Vector)> {
        let (mut matrix, mut vector) = self.allocate_matrix_and_vector(data)?;
        self.assemble_matrix_and_vector_into(&mut matrix, &mut vector, data)?;
        Ok((matrix, vector))
    }
}
