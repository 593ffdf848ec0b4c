//! Cell-indexed data consumed by assemblers.
use crate::cell::{CellValue, MatVec};
use crate::dof::DofId;
use crate::error::AssemblyError;
use crate::table::Table;
use itertools::izip;
use femcore_traits::Real;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

fn check_cells<V: CellValue>(
    values: &[V],
    row_ids: &Table<DofId>,
    col_ids: Option<&Table<DofId>>,
) -> eyre::Result<()> {
    if values.len() != row_ids.len() {
        return Err(AssemblyError::MismatchedDimensions {
            context: "number of cell values and cell dof ids",
            expected: (row_ids.len(), 1),
            actual: (values.len(), 1),
        }
        .into());
    }
    for (cell_index, value) in values.iter().enumerate() {
        let rows = row_ids.get(cell_index).map_or(0, <[_]>::len);
        let cols = col_ids
            .and_then(|ids| ids.get(cell_index))
            .map_or(0, <[_]>::len);
        let expected = (rows, cols);
        let actual = (value.num_local_rows(), value.num_local_cols().unwrap_or(0));
        if expected != actual {
            return Err(AssemblyError::MismatchedDimensions {
                context: "cell value and cell dof ids",
                expected,
                actual,
            }
            .into());
        }
    }
    Ok(())
}

/// Per-domain cell matrices (or matrix-vector pairs) with the dof ids of their rows and columns.
///
/// For every domain `d` and cell `c`, the rows of `values[d][c]` correspond to `row_ids[d][c]`
/// and its columns to `col_ids[d][c]`.
#[derive(Debug, Clone)]
pub struct CellMatrixData<V> {
    values: Vec<Vec<V>>,
    row_ids: Vec<Arc<Table<DofId>>>,
    col_ids: Vec<Arc<Table<DofId>>>,
}

pub type MatrixData<T> = CellMatrixData<DMatrix<T>>;
pub type MatVecData<T> = CellMatrixData<MatVec<T>>;

impl<V> Default for CellMatrixData<V> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            row_ids: Vec::new(),
            col_ids: Vec::new(),
        }
    }
}

impl<V: CellValue> CellMatrixData<V> {
    pub fn new(
        values: Vec<Vec<V>>,
        row_ids: Vec<Arc<Table<DofId>>>,
        col_ids: Vec<Arc<Table<DofId>>>,
    ) -> eyre::Result<Self> {
        if values.len() != row_ids.len() || values.len() != col_ids.len() {
            return Err(AssemblyError::MismatchedDimensions {
                context: "number of domains in matrix data",
                expected: (values.len(), values.len()),
                actual: (row_ids.len(), col_ids.len()),
            }
            .into());
        }
        let mut data = Self::default();
        for ((v, r), c) in values.into_iter().zip(row_ids).zip(col_ids) {
            data.push_domain(v, r, c)?;
        }
        Ok(data)
    }

    /// Appends the data of one domain.
    pub fn push_domain(
        &mut self,
        values: Vec<V>,
        row_ids: Arc<Table<DofId>>,
        col_ids: Arc<Table<DofId>>,
    ) -> eyre::Result<()> {
        if row_ids.len() != col_ids.len() {
            return Err(AssemblyError::MismatchedDimensions {
                context: "number of cells in row and column dof ids",
                expected: (row_ids.len(), 1),
                actual: (col_ids.len(), 1),
            }
            .into());
        }
        check_cells(&values, &row_ids, Some(&*col_ids))?;
        self.values.push(values);
        self.row_ids.push(row_ids);
        self.col_ids.push(col_ids);
        Ok(())
    }
}

impl<V> CellMatrixData<V> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn num_domains(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Vec<V>] {
        &self.values
    }

    pub fn row_ids(&self) -> &[Arc<Table<DofId>>] {
        &self.row_ids
    }

    pub fn col_ids(&self) -> &[Arc<Table<DofId>>] {
        &self.col_ids
    }

    /// Iterates over `(value, row_ids, col_ids)` of every cell of every domain.
    pub fn cells(&self) -> impl '_ + Iterator<Item = (&V, &[DofId], &[DofId])> {
        self.values
            .iter()
            .zip(&self.row_ids)
            .zip(&self.col_ids)
            .flat_map(|((values, rows), cols)| izip!(values, rows.iter(), cols.iter()))
    }

    pub fn num_cells(&self) -> usize {
        self.values.iter().map(Vec::len).sum()
    }
}

impl<T: Real> MatVecData<T> {
    /// Splits the data into its matrix and vector parts.
    pub fn split(&self) -> (MatrixData<T>, VectorData<T>) {
        let matrices = self
            .values
            .iter()
            .map(|cells| cells.iter().map(|mv| mv.matrix().clone()).collect())
            .collect();
        let vectors = self
            .values
            .iter()
            .map(|cells| cells.iter().map(|mv| mv.vector().clone()).collect())
            .collect();
        let matrix_data = MatrixData {
            values: matrices,
            row_ids: self.row_ids.clone(),
            col_ids: self.col_ids.clone(),
        };
        let vector_data = VectorData {
            values: vectors,
            row_ids: self.row_ids.clone(),
        };
        (matrix_data, vector_data)
    }
}

/// Per-domain cell vectors with the dof ids of their rows.
#[derive(Debug, Clone)]
pub struct VectorData<T: Real> {
    values: Vec<Vec<DVector<T>>>,
    row_ids: Vec<Arc<Table<DofId>>>,
}

impl<T: Real> Default for VectorData<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            row_ids: Vec::new(),
        }
    }
}

impl<T: Real> VectorData<T> {
    pub fn new(values: Vec<Vec<DVector<T>>>, row_ids: Vec<Arc<Table<DofId>>>) -> eyre::Result<Self> {
        if values.len() != row_ids.len() {
            return Err(AssemblyError::MismatchedDimensions {
                context: "number of domains in vector data",
                expected: (values.len(), 1),
                actual: (row_ids.len(), 1),
            }
            .into());
        }
        let mut data = Self::default();
        for (v, r) in values.into_iter().zip(row_ids) {
            data.push_domain(v, r)?;
        }
        Ok(data)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push_domain(&mut self, values: Vec<DVector<T>>, row_ids: Arc<Table<DofId>>) -> eyre::Result<()> {
        check_cells(&values, &row_ids, None)?;
        self.values.push(values);
        self.row_ids.push(row_ids);
        Ok(())
    }

    pub fn num_domains(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Vec<DVector<T>>] {
        &self.values
    }

    pub fn row_ids(&self) -> &[Arc<Table<DofId>>] {
        &self.row_ids
    }

    /// Iterates over `(value, row_ids)` of every cell of every domain.
    pub fn cells(&self) -> impl '_ + Iterator<Item = (&DVector<T>, &[DofId])> {
        self.values
            .iter()
            .zip(&self.row_ids)
            .flat_map(|(values, rows)| values.iter().zip(rows.iter()))
    }

    pub fn num_cells(&self) -> usize {
        self.values.iter().map(Vec::len).sum()
    }
}

/// Data for assembling a matrix and a vector together.
///
/// Domains contributing to both are stored as matrix-vector pairs, so that both can be written in
/// a single pass over the cells.
#[derive(Debug, Clone)]
pub struct AssemblyData<T: Real> {
    pub matvec: MatVecData<T>,
    pub matrix: MatrixData<T>,
    pub vector: VectorData<T>,
}

impl<T: Real> Default for AssemblyData<T> {
    fn default() -> Self {
        Self {
            matvec: MatVecData::empty(),
            matrix: MatrixData::empty(),
            vector: VectorData::empty(),
        }
    }
}

impl<T: Real> AssemblyData<T> {
    pub fn new(matvec: MatVecData<T>, matrix: MatrixData<T>, vector: VectorData<T>) -> Self {
        Self { matvec, matrix, vector }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Separates the data into everything that contributes to the matrix and everything that
    /// contributes to the vector.
    pub fn split(&self) -> (MatrixData<T>, VectorData<T>) {
        let (mut matrix, mut vector) = self.matvec.split();
        matrix.values.extend(self.matrix.values.iter().cloned());
        matrix.row_ids.extend(self.matrix.row_ids.iter().cloned());
        matrix.col_ids.extend(self.matrix.col_ids.iter().cloned());
        vector.values.extend(self.vector.values.iter().cloned());
        vector.row_ids.extend(self.vector.row_ids.iter().cloned());
        (matrix, vector)
    }
}
