//! Strategies for generating consistent assembly data in property tests.
use crate::assembly::{AssemblyData, MatVecData, MatrixData, VectorData};
use crate::cell::MatVec;
use crate::dof::DofId;
use crate::table::Table;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// Strategy for the dof ids of a single cell.
///
/// Free dofs are drawn from `0 .. num_free_dofs`, which must not be empty. Some cells also
/// receive Dirichlet dofs.
pub fn cell_dof_ids(num_free_dofs: usize, max_cell_dofs: usize) -> impl Strategy<Value = Vec<DofId>> {
    assert!(num_free_dofs > 0, "at least one free dof is required");
    let dof = prop_oneof![
        4 => (0..num_free_dofs).prop_map(DofId::Free),
        1 => (0..3usize).prop_map(DofId::Dirichlet),
    ];
    vec(dof, 0..=max_cell_dofs)
}

pub fn cell_matrix(nrows: usize, ncols: usize) -> impl Strategy<Value = DMatrix<f64>> {
    vec(-10.0..10.0f64, nrows * ncols).prop_map(move |data| DMatrix::from_vec(nrows, ncols, data))
}

pub fn cell_vector(len: usize) -> impl Strategy<Value = DVector<f64>> {
    vec(-10.0..10.0f64, len).prop_map(DVector::from_vec)
}

type MatrixDomain<V> = (Vec<V>, Table<DofId>, Table<DofId>);

fn matrix_domain(num_rows: usize, num_cols: usize) -> impl Strategy<Value = MatrixDomain<DMatrix<f64>>> {
    vec((cell_dof_ids(num_rows, 4), cell_dof_ids(num_cols, 4)), 0..5)
        .prop_flat_map(|cells| {
            let matrices: Vec<_> = cells
                .iter()
                .map(|(rows, cols)| cell_matrix(rows.len(), cols.len()))
                .collect();
            (matrices, Just(cells))
        })
        .prop_map(|(matrices, cells)| {
            let (rows, cols): (Vec<_>, Vec<_>) = cells.into_iter().unzip();
            (matrices, Table::from(rows), Table::from(cols))
        })
}

fn matvec_domain(num_rows: usize, num_cols: usize) -> impl Strategy<Value = MatrixDomain<MatVec<f64>>> {
    matrix_domain(num_rows, num_cols)
        .prop_flat_map(|(matrices, rows, cols)| {
            let vectors: Vec<_> = matrices.iter().map(|m| cell_vector(m.nrows())).collect();
            (Just(matrices), vectors, Just(rows), Just(cols))
        })
        .prop_map(|(matrices, vectors, rows, cols)| {
            let pairs = matrices
                .into_iter()
                .zip(vectors)
                .map(|(m, v)| MatVec::new(m, v).expect("vector length matches by construction"))
                .collect();
            (pairs, rows, cols)
        })
}

fn vector_domain(num_rows: usize) -> impl Strategy<Value = (Vec<DVector<f64>>, Table<DofId>)> {
    vec(cell_dof_ids(num_rows, 4), 0..5)
        .prop_flat_map(|cells| {
            let vectors: Vec<_> = cells.iter().map(|rows| cell_vector(rows.len())).collect();
            (vectors, Just(cells))
        })
        .prop_map(|(vectors, cells)| (vectors, Table::from(cells)))
}

/// Strategy for matrix data targeting a system with the given number of rows and columns.
pub fn matrix_data(num_rows: usize, num_cols: usize) -> impl Strategy<Value = MatrixData<f64>> {
    vec(matrix_domain(num_rows, num_cols), 0..4).prop_map(|domains| {
        let mut data = MatrixData::empty();
        for (values, rows, cols) in domains {
            data.push_domain(values, Arc::new(rows), Arc::new(cols))
                .expect("generated matrix data is consistent");
        }
        data
    })
}

/// Strategy for vector data targeting a system with the given number of rows.
pub fn vector_data(num_rows: usize) -> impl Strategy<Value = VectorData<f64>> {
    vec(vector_domain(num_rows), 0..4).prop_map(|domains| {
        let mut data = VectorData::empty();
        for (values, rows) in domains {
            data.push_domain(values, Arc::new(rows))
                .expect("generated vector data is consistent");
        }
        data
    })
}

fn matvec_data(num_rows: usize, num_cols: usize) -> impl Strategy<Value = MatVecData<f64>> {
    vec(matvec_domain(num_rows, num_cols), 0..3).prop_map(|domains| {
        let mut data = MatVecData::empty();
        for (values, rows, cols) in domains {
            data.push_domain(values, Arc::new(rows), Arc::new(cols))
                .expect("generated matrix-vector data is consistent");
        }
        data
    })
}

/// Strategy for combined assembly data targeting a system with the given number of rows and
/// columns.
pub fn assembly_data(num_rows: usize, num_cols: usize) -> impl Strategy<Value = AssemblyData<f64>> {
    (
        matvec_data(num_rows, num_cols),
        matrix_data(num_rows, num_cols),
        vector_data(num_rows),
    )
        .prop_map(|(matvec, matrix, vector)| AssemblyData::new(matvec, matrix, vector))
}

/// Strategy for `(num_rows, num_cols, data)` with at most `max_dofs` rows and columns.
pub fn assembly_problem(max_dofs: usize) -> impl Strategy<Value = (usize, usize, AssemblyData<f64>)> {
    (1..=max_dofs.max(1), 1..=max_dofs.max(1))
        .prop_flat_map(|(num_rows, num_cols)| (Just(num_rows), Just(num_cols), assembly_data(num_rows, num_cols)))
}
