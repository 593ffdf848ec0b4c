use femcore::dof::DofId;
use femcore::domain::{CellDomain, DomainId};
use femcore::error::AssemblyError;
use femcore::space::TableSpace;

mod assembly;
mod collect;

fn free(indices: &[usize]) -> Vec<DofId> {
    indices.iter().copied().map(DofId::Free).collect()
}

/// Two cells with two dofs each, sharing the middle dof of three.
fn two_cells_sharing_a_dof() -> (CellDomain, TableSpace<f64>) {
    let domain = CellDomain::new(DomainId::new(0), 2);
    let space = TableSpace::new(3, 0)
        .with_domain(&domain, vec![free(&[0, 1]), free(&[1, 2])])
        .unwrap();
    (domain, space)
}

fn assembly_error(report: &eyre::Report) -> &AssemblyError {
    report
        .downcast_ref::<AssemblyError>()
        .unwrap_or_else(|| panic!("expected an assembly error, got: {report:?}"))
}
