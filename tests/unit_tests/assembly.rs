use super::{assembly_error, free, two_cells_sharing_a_dof};
use femcore::assembly::conformance::test_assembler;
use femcore::assembly::{
    assemble_affine_system, assemble_matrix_from_form, assemble_vector_from_form, collect_cell_matrix,
    collect_cell_vector, Assembler, AssemblyData, DefaultAssemblyStrategy, DenseMatrixAssembler,
    GenericAssemblyStrategy, GlobalMatrix, MatrixData, OwnedRangeStrategy, SparseMatrixAssembler, VectorData,
};
use femcore::dof::DofId;
use femcore::domain::{CellDomain, DomainContribution, DomainId};
use femcore::error::AssemblyError;
use femcore::nalgebra::{DMatrix, DVector};
use femcore::proptest::assembly_problem;
use femcore::space::{CellDofValues, FEFunction, TableSpace};
use matrixcompare::assert_matrix_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn ones_on_shared_dof_example() -> (TableSpace<f64>, MatrixData<f64>) {
    let (domain, space) = two_cells_sharing_a_dof();
    let cells = vec![DMatrix::from_element(2, 2, 1.0); 2];
    let a = DomainContribution::from_domain(&domain, cells).unwrap();
    let data = collect_cell_matrix(&space, &space, a).unwrap();
    (space, data)
}

#[rustfmt::skip]
fn ones_on_shared_dof_expected() -> DMatrix<f64> {
    DMatrix::from_row_slice(3, 3, &[
        1.0, 1.0, 0.0,
        1.0, 2.0, 1.0,
        0.0, 1.0, 1.0,
    ])
}

#[test]
fn shared_dof_sums_cell_contributions() {
    let (space, data) = ones_on_shared_dof_example();
    let assembler = SparseMatrixAssembler::new(&space, &space);

    let mut matrix = assembler.allocate_matrix(&data).unwrap();
    assembler.assemble_matrix_into(&mut matrix, &data).unwrap();
    assert_eq!(matrix.nnz(), 7);
    assert_eq!(matrix.to_dense()[(1, 1)], 2.0);
    assert_eq!(matrix.to_dense(), ones_on_shared_dof_expected());

    assembler.assemble_matrix_add(&mut matrix, &data).unwrap();
    assert_eq!(matrix.to_dense()[(1, 1)], 4.0);
    assert_eq!(matrix.to_dense(), ones_on_shared_dof_expected() * 2.0);

    assembler.assemble_matrix_into(&mut matrix, &data).unwrap();
    assert_eq!(matrix.to_dense(), ones_on_shared_dof_expected());
}

#[test]
fn dense_and_sparse_assemblers_agree() {
    let (space, data) = ones_on_shared_dof_example();
    let sparse = SparseMatrixAssembler::new(&space, &space).assemble_matrix(&data).unwrap();
    let dense = DenseMatrixAssembler::new(&space, &space).assemble_matrix(&data).unwrap();
    assert_eq!(DMatrix::from(&sparse), dense);
}

#[test]
fn allocation_has_assembler_shape_regardless_of_data() {
    let (_, data) = ones_on_shared_dof_example();
    let assembler = SparseMatrixAssembler::<f64>::from_parts(5, 4, DefaultAssemblyStrategy);
    assert_eq!(assembler.allocate_matrix(&MatrixData::empty()).unwrap().shape(), (5, 4));
    assert_eq!(assembler.allocate_matrix(&data).unwrap().shape(), (5, 4));
    assert_eq!(assembler.allocate_vector(&VectorData::empty()).unwrap().len(), 5);

    let assembler = DenseMatrixAssembler::<f64>::from_parts(5, 4, DefaultAssemblyStrategy);
    assert_eq!(assembler.allocate_matrix(&data).unwrap().shape(), (5, 4));
    let (matrix, vector) = assembler.allocate_matrix_and_vector(&AssemblyData::empty()).unwrap();
    assert_eq!((matrix.shape(), vector.len()), ((5, 4), 5));
    assert_eq!(assembler.rows(), 0..5);
    assert_eq!(assembler.cols(), 0..4);
}

#[test]
fn zero_linear_form_leaves_vector_at_zero() {
    let domain = CellDomain::new(DomainId::new(0), 5);
    let ids: Vec<_> = (0..5).map(|i| free(&[i])).collect();
    let space = TableSpace::new(5, 0).with_domain(&domain, ids).unwrap();
    let assembler = SparseMatrixAssembler::new(&space, &space);

    let vector = assemble_vector_from_form(&assembler, &space, 0.0).unwrap();
    assert_eq!(vector, DVector::zeros(5));
}

#[test]
fn masked_entries_are_skipped() {
    let (space, data) = ones_on_shared_dof_example();
    let strategy = GenericAssemblyStrategy::new()
        .with_row_mask(|row| row != 1)
        .with_col_mask(|col| col != 0);
    let assembler = DenseMatrixAssembler::new(&space, &space).with_strategy(strategy);

    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 3, &[
        0.0, 1.0, 0.0,
        0.0, 0.0, 0.0,
        0.0, 1.0, 1.0,
    ]);
    assert_eq!(assembler.assemble_matrix(&data).unwrap(), expected);

    let sparse = SparseMatrixAssembler::new(&space, &space).with_strategy(assembler.strategy().clone());
    let matrix = sparse.assemble_matrix(&data).unwrap();
    assert_eq!(matrix.nnz(), 3);
    assert_eq!(matrix.to_dense(), expected);
}

#[test]
fn owned_range_assembles_a_block_of_rows() {
    let (_, data) = ones_on_shared_dof_example();
    let strategy = OwnedRangeStrategy::new(1..3, 0..3);
    let assembler = SparseMatrixAssembler::<f64, _>::from_parts(2, 3, strategy);

    let matrix = assembler.assemble_matrix(&data).unwrap();
    let full = ones_on_shared_dof_expected();
    assert_eq!(matrix.to_dense(), full.rows(1, 2).into_owned());
}

#[test]
fn mapped_indices_outside_storage_are_rejected() {
    let (space, data) = ones_on_shared_dof_example();
    let strategy = GenericAssemblyStrategy::new().with_row_map(|row| row + 1);
    let assembler = DenseMatrixAssembler::new(&space, &space).with_strategy(strategy);
    let err = assembler.assemble_matrix(&data).unwrap_err();
    assert_eq!(
        assembly_error(&err),
        &AssemblyError::IndexOutOfBounds {
            context: "row",
            index: 3,
            bound: 3
        }
    );
}

#[test]
fn writes_outside_the_sparsity_pattern_are_rejected() {
    let (space, data) = ones_on_shared_dof_example();
    let assembler = SparseMatrixAssembler::new(&space, &space);

    let first_cell = MatrixData::new(
        vec![vec![DMatrix::from_element(2, 2, 1.0)]],
        vec![Arc::new(vec![free(&[0, 1])].into())],
        vec![Arc::new(vec![free(&[0, 1])].into())],
    )
    .unwrap();
    let mut matrix = assembler.allocate_matrix(&first_cell).unwrap();
    let err = assembler.assemble_matrix_into(&mut matrix, &data).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::EntryOutsidePattern { .. }));
}

#[test]
fn storage_of_wrong_shape_is_rejected() {
    let (space, data) = ones_on_shared_dof_example();
    let assembler = DenseMatrixAssembler::new(&space, &space);
    let mut matrix = DMatrix::zeros(2, 3);
    let err = assembler.assemble_matrix_into(&mut matrix, &data).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::MismatchedDimensions { .. }));

    let mut vector = DVector::zeros(4);
    let err = assembler.assemble_vector_add(&mut vector, &VectorData::empty()).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::MismatchedDimensions { .. }));
}

#[test]
fn cell_data_must_match_dof_ids() {
    let err = MatrixData::new(
        vec![vec![DMatrix::<f64>::zeros(2, 1)]],
        vec![Arc::new(vec![free(&[0, 1])].into())],
        vec![Arc::new(vec![free(&[0, 1])].into())],
    )
    .unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::MismatchedDimensions { .. }));

    let err = VectorData::new(vec![vec![DVector::<f64>::zeros(1)]; 2], vec![]).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::MismatchedDimensions { .. }));
}

#[test]
fn affine_system_with_dirichlet_lifting() {
    // -u'' = 0 on three nodes with u = 1 and u = 3 at the ends
    let domain = CellDomain::new(DomainId::new(0), 2);
    let space = TableSpace::new(1, 2)
        .with_domain(
            &domain,
            vec![
                vec![DofId::Dirichlet(0), DofId::Free(0)],
                vec![DofId::Free(0), DofId::Dirichlet(1)],
            ],
        )
        .unwrap();
    let stiffness = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
    let a = DomainContribution::from_domain(&domain, vec![stiffness; 2]).unwrap();
    let u = FEFunction::from_dirichlet_values(&space, DVector::from_vec(vec![1.0, 3.0])).unwrap();
    let dirichlet: &dyn CellDofValues<f64> = &u;

    let assembler = SparseMatrixAssembler::new(&space, &space);
    let (matrix, vector) = assemble_affine_system(&assembler, &space, &space, a.clone(), 0.0, Some(dirichlet)).unwrap();
    assert_eq!(matrix.to_dense(), DMatrix::from_element(1, 1, 2.0));
    assert_eq!(vector, DVector::from_element(1, 4.0));

    let dense = DenseMatrixAssembler::new(&space, &space);
    assert_eq!(assemble_matrix_from_form(&dense, &space, &space, a).unwrap(), DMatrix::from_element(1, 1, 2.0));
}

#[test]
fn conformance_on_shared_dof_example() {
    let (domain, space) = two_cells_sharing_a_dof();
    let a = DomainContribution::from_domain(&domain, vec![DMatrix::from_element(2, 2, 1.0); 2]).unwrap();
    let l = DomainContribution::from_domain(&domain, vec![DVector::from_element(2, 1.0); 2]).unwrap();
    let data = femcore::assembly::collect_cell_matrix_and_vector(&space, &space, a, l, None).unwrap();

    test_assembler(&SparseMatrixAssembler::new(&space, &space), &data);
    test_assembler(&DenseMatrixAssembler::new(&space, &space), &data);

    let vector = collect_cell_vector(&space, DomainContribution::new()).unwrap();
    assert!(vector.is_empty());
}

proptest! {
    #[test]
    fn sparse_assembler_conforms((num_rows, num_cols, data) in assembly_problem(6)) {
        let assembler = SparseMatrixAssembler::<f64>::from_parts(num_rows, num_cols, DefaultAssemblyStrategy);
        test_assembler(&assembler, &data);
    }

    #[test]
    fn dense_assembler_conforms((num_rows, num_cols, data) in assembly_problem(6)) {
        let assembler = DenseMatrixAssembler::<f64>::from_parts(num_rows, num_cols, DefaultAssemblyStrategy);
        test_assembler(&assembler, &data);
    }

    #[test]
    fn sparse_and_dense_assembly_agree((num_rows, num_cols, data) in assembly_problem(6)) {
        let sparse = SparseMatrixAssembler::<f64>::from_parts(num_rows, num_cols, DefaultAssemblyStrategy);
        let dense = DenseMatrixAssembler::<f64>::from_parts(num_rows, num_cols, DefaultAssemblyStrategy);
        let (sparse_matrix, sparse_vector) = sparse.assemble_matrix_and_vector(&data).unwrap();
        let (dense_matrix, dense_vector) = dense.assemble_matrix_and_vector(&data).unwrap();
        assert_matrix_eq!(DMatrix::from(&sparse_matrix), dense_matrix, comp = abs, tol = 1e-12);
        assert_matrix_eq!(sparse_vector, dense_vector, comp = abs, tol = 1e-12);
    }
}
