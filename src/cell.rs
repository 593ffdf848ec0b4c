//! Cell-local values and the operations collection needs from them.
use crate::error::AssemblyError;
use femcore_traits::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::Neg;

/// A value computed for a single cell: a local matrix, a local vector or both.
pub trait CellValue: Clone + Debug + Send + Sync {
    type Scalar: Real;

    /// Number of local rows, i.e. the number of local test dofs.
    fn num_local_rows(&self) -> usize;

    /// Number of local columns, or `None` for values without a matrix part.
    fn num_local_cols(&self) -> Option<usize>;

    fn add_assign_cell(&mut self, other: &Self) -> eyre::Result<()>;

    fn scale_cell(&mut self, factor: Self::Scalar);

    /// Computes `Cᵀ A` for the matrix part and `Cᵀ b` for the vector part.
    fn constrain_rows(&self, constraint: &DMatrix<Self::Scalar>) -> eyre::Result<Self>;

    /// Computes `A C` for the matrix part. Vector parts are left untouched.
    fn constrain_cols(&self, constraint: &DMatrix<Self::Scalar>) -> eyre::Result<Self>;
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

fn check_constraint_rows<T: Real>(constraint: &DMatrix<T>, num_local: usize) -> eyre::Result<()> {
    check_shape(
        "cell constraint",
        (num_local, constraint.ncols()),
        constraint.shape(),
    )
}

impl<T: Real> CellValue for DMatrix<T> {
    type Scalar = T;

    fn num_local_rows(&self) -> usize {
        self.nrows()
    }

    fn num_local_cols(&self) -> Option<usize> {
        Some(self.ncols())
    }

    fn add_assign_cell(&mut self, other: &Self) -> eyre::Result<()> {
        check_shape("cell matrix sum", self.shape(), other.shape())?;
        *self += other;
        Ok(())
    }

    fn scale_cell(&mut self, factor: T) {
        *self *= factor;
    }

    fn constrain_rows(&self, constraint: &DMatrix<T>) -> eyre::Result<Self> {
        check_constraint_rows(constraint, self.nrows())?;
        Ok(constraint.tr_mul(self))
    }

    fn constrain_cols(&self, constraint: &DMatrix<T>) -> eyre::Result<Self> {
        check_constraint_rows(constraint, self.ncols())?;
        Ok(self * constraint)
    }
}

impl<T: Real> CellValue for DVector<T> {
    type Scalar = T;

    fn num_local_rows(&self) -> usize {
        self.len()
    }

    fn num_local_cols(&self) -> Option<usize> {
        None
    }

    fn add_assign_cell(&mut self, other: &Self) -> eyre::Result<()> {
        check_shape("cell vector sum", self.shape(), other.shape())?;
        *self += other;
        Ok(())
    }

    fn scale_cell(&mut self, factor: T) {
        *self *= factor;
    }

    fn constrain_rows(&self, constraint: &DMatrix<T>) -> eyre::Result<Self> {
        check_constraint_rows(constraint, self.len())?;
        Ok(constraint.tr_mul(self))
    }

    fn constrain_cols(&self, _constraint: &DMatrix<T>) -> eyre::Result<Self> {
        Ok(self.clone())
    }
}

/// A cell matrix paired with a cell vector over the same local rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatVec<T: Real> {
    matrix: DMatrix<T>,
    vector: DVector<T>,
}

impl<T: Real> MatVec<T> {
    pub fn new(matrix: DMatrix<T>, vector: DVector<T>) -> eyre::Result<Self> {
        check_shape("matrix-vector pair", (matrix.nrows(), 1), (vector.len(), 1))?;
        Ok(Self { matrix, vector })
    }

    /// Pairs a matrix with a zero vector.
    pub fn from_matrix(matrix: DMatrix<T>) -> Self {
        let vector = DVector::zeros(matrix.nrows());
        Self { matrix, vector }
    }

    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    pub fn vector(&self) -> &DVector<T> {
        &self.vector
    }

    pub fn vector_mut(&mut self) -> &mut DVector<T> {
        &mut self.vector
    }

    pub fn into_parts(self) -> (DMatrix<T>, DVector<T>) {
        (self.matrix, self.vector)
    }
}

impl<T: Real> CellValue for MatVec<T> {
    type Scalar = T;

    fn num_local_rows(&self) -> usize {
        self.matrix.nrows()
    }

    fn num_local_cols(&self) -> Option<usize> {
        Some(self.matrix.ncols())
    }

    fn add_assign_cell(&mut self, other: &Self) -> eyre::Result<()> {
        self.matrix.add_assign_cell(&other.matrix)?;
        self.vector.add_assign_cell(&other.vector)
    }

    fn scale_cell(&mut self, factor: T) {
        self.matrix.scale_cell(factor);
        self.vector.scale_cell(factor);
    }

    fn constrain_rows(&self, constraint: &DMatrix<T>) -> eyre::Result<Self> {
        Ok(Self {
            matrix: self.matrix.constrain_rows(constraint)?,
            vector: self.vector.constrain_rows(constraint)?,
        })
    }

    fn constrain_cols(&self, constraint: &DMatrix<T>) -> eyre::Result<Self> {
        Ok(Self {
            matrix: self.matrix.constrain_cols(constraint)?,
            vector: self.vector.clone(),
        })
    }
}

impl<T: Real> Neg for MatVec<T> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            matrix: -self.matrix,
            vector: -self.vector,
        }
    }
}
