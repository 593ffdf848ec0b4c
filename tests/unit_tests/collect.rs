use super::{assembly_error, free, two_cells_sharing_a_dof};
use femcore::assembly::{
    attach_dirichlet, collect_cell_matrix, collect_cell_matrix_and_vector, collect_cell_vector, pair_contributions,
    LinearForm,
};
use femcore::dof::DofId;
use femcore::domain::{CellDomain, DomainContribution, DomainId, Triangulation};
use femcore::error::AssemblyError;
use femcore::nalgebra::{DMatrix, DVector};
use femcore::space::{CellDofValues, FEFunction, TableSpace};

fn matrices(domain: &CellDomain, value: f64) -> DomainContribution<DMatrix<f64>> {
    let cells = vec![DMatrix::from_element(1, 1, value); domain.num_cells()];
    DomainContribution::from_domain(domain, cells).unwrap()
}

fn vectors(domain: &CellDomain, value: f64) -> DomainContribution<DVector<f64>> {
    let cells = vec![DVector::from_element(1, value); domain.num_cells()];
    DomainContribution::from_domain(domain, cells).unwrap()
}

#[test]
fn pairing_partitions_domains() {
    let omega1 = CellDomain::new(DomainId::new(1), 2);
    let omega2 = CellDomain::new(DomainId::new(2), 1);
    let omega3 = CellDomain::new(DomainId::new(3), 3);

    let a = matrices(&omega1, 1.0) + matrices(&omega2, 2.0);
    let l = vectors(&omega2, 3.0) + vectors(&omega3, 4.0);
    let paired = pair_contributions(a, l).unwrap();

    assert_eq!(paired.matvec.domains(), &[DomainId::new(2)]);
    assert_eq!(paired.matrix.domains(), &[DomainId::new(1)]);
    assert_eq!(paired.vector.domains(), &[DomainId::new(3)]);

    let pair = &paired.matvec.get_contribution(DomainId::new(2)).unwrap()[0];
    assert_eq!(pair.matrix()[(0, 0)], 2.0);
    assert_eq!(pair.vector()[0], 3.0);
}

#[test]
fn zero_linear_form_collects_to_empty_data() {
    let domain = CellDomain::new(DomainId::new(0), 5);
    let ids: Vec<_> = (0..5).map(|i| free(&[i])).collect();
    let space = TableSpace::new(5, 0).with_domain(&domain, ids).unwrap();

    let data = collect_cell_vector(&space, 0.0).unwrap();
    assert!(data.is_empty());
    assert!(data.values().is_empty());
    assert!(data.row_ids().is_empty());

    let data = collect_cell_vector(&space, LinearForm::Literal(0.0)).unwrap();
    assert_eq!(data.num_cells(), 0);
}

#[test]
fn nonzero_literal_linear_form_is_unsupported() {
    let (_, space) = two_cells_sharing_a_dof();
    let err = collect_cell_vector(&space, 1.0).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::UnsupportedInput { .. }));

    let a = DomainContribution::new();
    let err = collect_cell_matrix_and_vector(&space, &space, a, 2.0, None).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::UnsupportedInput { .. }));
}

#[test]
fn collection_attaches_column_constraints_before_row_constraints() {
    // Two local dofs that both coincide with the single global dof
    let domain = CellDomain::new(DomainId::new(0), 1);
    let c = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
    let trial = TableSpace::new(1, 0)
        .with_constrained_domain(&domain, vec![free(&[0])], vec![c.clone()])
        .unwrap();
    let test = TableSpace::new(1, 0)
        .with_constrained_domain(&domain, vec![free(&[0])], vec![c])
        .unwrap();

    let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    let a = DomainContribution::from_domain(&domain, vec![a]).unwrap();
    let data = collect_cell_matrix(&trial, &test, a).unwrap();
    assert_eq!(data.values()[0][0], DMatrix::from_element(1, 1, 10.0));
    assert_eq!(data.row_ids()[0].get(0).unwrap(), free(&[0]).as_slice());

    let l = DomainContribution::from_domain(&domain, vec![DVector::from_vec(vec![1.0, 2.0])]).unwrap();
    let data = collect_cell_vector(&test, l).unwrap();
    assert_eq!(data.values()[0][0], DVector::from_element(1, 3.0));
}

#[test]
fn combined_collection_groups_domains() {
    let omega1 = CellDomain::new(DomainId::new(1), 1);
    let omega2 = CellDomain::new(DomainId::new(2), 1);
    let omega3 = CellDomain::new(DomainId::new(3), 1);
    let space = TableSpace::new(1, 0)
        .with_domain(&omega1, vec![free(&[0])])
        .unwrap()
        .with_domain(&omega2, vec![free(&[0])])
        .unwrap()
        .with_domain(&omega3, vec![free(&[0])])
        .unwrap();

    let a = matrices(&omega1, 1.0) + matrices(&omega2, 2.0);
    let l = vectors(&omega2, 3.0) + vectors(&omega3, 4.0);
    let data = collect_cell_matrix_and_vector(&space, &space, a, l, None).unwrap();
    assert_eq!(data.matvec.num_domains(), 1);
    assert_eq!(data.matrix.num_domains(), 1);
    assert_eq!(data.vector.num_domains(), 1);
    assert_eq!(data.matvec.values()[0][0].vector()[0], 3.0);
}

#[test]
fn dirichlet_values_are_lifted_into_the_right_hand_side() {
    // 1D mesh with three nodes, the outer ones prescribed
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
    let a = DomainContribution::from_domain(&domain, vec![stiffness.clone(), stiffness]).unwrap();

    let u = FEFunction::from_dirichlet_values(&space, DVector::from_vec(vec![1.0, 3.0])).unwrap();
    let dirichlet: &dyn CellDofValues<f64> = &u;
    let data = collect_cell_matrix_and_vector(&space, &space, a, 0.0, Some(dirichlet)).unwrap();

    assert!(data.matrix.is_empty());
    assert!(data.vector.is_empty());
    let cells = &data.matvec.values()[0];
    assert_eq!(cells[0].vector(), &DVector::from_vec(vec![-1.0, 1.0]));
    assert_eq!(cells[1].vector(), &DVector::from_vec(vec![3.0, -3.0]));
}

#[test]
fn dirichlet_lifting_checks_cell_counts() {
    let (domain, space) = two_cells_sharing_a_dof();
    let paired = pair_contributions(matrices(&domain, 1.0), DomainContribution::new()).unwrap();
    let u = FEFunction::from_dirichlet_values(&space, DVector::zeros(0)).unwrap();
    // Cells are 1x1 while the space has two dofs per cell
    let err = attach_dirichlet(paired, &u).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::MismatchedDimensions { .. }));

    let other = CellDomain::new(DomainId::new(0), 1);
    let paired = pair_contributions(matrices(&other, 1.0), DomainContribution::new()).unwrap();
    let err = attach_dirichlet(paired, &u).unwrap_err();
    assert!(matches!(assembly_error(&err), AssemblyError::CellCountMismatch { .. }));
}
