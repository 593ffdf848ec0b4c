//! Collection of domain contributions into cell-indexed data for assembly.
use crate::assembly::data::{AssemblyData, CellMatrixData, MatrixData, VectorData};
use crate::cell::{CellValue, MatVec};
use crate::domain::{DomainContribution, DomainId};
use crate::error::AssemblyError;
use crate::space::{CellDofValues, FESpace};
use eyre::WrapErr;
use femcore_traits::Real;
use log::{debug, trace, warn};
use nalgebra::{DMatrix, DVector};

/// The right-hand side of a system: either domain contributions or a literal number.
///
/// The only literal that is accepted during collection is zero, which stands for the absence of
/// any vector contribution.
#[derive(Debug, Clone)]
pub enum LinearForm<T: Real> {
    Literal(T),
    Contribution(DomainContribution<DVector<T>>),
}

impl<T: Real> LinearForm<T> {
    /// Returns the contribution of the form, which is empty for a literal zero.
    pub fn into_contribution(self) -> eyre::Result<DomainContribution<DVector<T>>> {
        match self {
            Self::Contribution(contribution) => Ok(contribution),
            Self::Literal(value) if value == T::zero() => Ok(DomainContribution::new()),
            Self::Literal(_) => Err(AssemblyError::UnsupportedInput {
                operation: "collect linear form",
                reason: "a literal linear form must be zero",
            }
            .into()),
        }
    }
}

impl<T: Real> From<DomainContribution<DVector<T>>> for LinearForm<T> {
    fn from(contribution: DomainContribution<DVector<T>>) -> Self {
        Self::Contribution(contribution)
    }
}

impl From<f64> for LinearForm<f64> {
    fn from(value: f64) -> Self {
        Self::Literal(value)
    }
}

impl From<f32> for LinearForm<f32> {
    fn from(value: f32) -> Self {
        Self::Literal(value)
    }
}

fn warn_if_empty<V: CellValue>(domain: DomainId, values: &[V]) {
    if !values.is_empty() && values.iter().all(|v| v.num_local_rows() == 0) {
        warn!("Every cell value of domain {} is empty", domain);
    }
}

fn collect_matrix_values<T, V, Trial, Test>(
    trial: &Trial,
    test: &Test,
    contribution: DomainContribution<V>,
) -> eyre::Result<CellMatrixData<V>>
where
    T: Real,
    V: CellValue<Scalar = T>,
    Trial: FESpace<T>,
    Test: FESpace<T>,
{
    let mut data = CellMatrixData::empty();
    for (domain, values) in contribution.into_domain_values() {
        trace!("Collecting {} cell matrices on domain {}", values.len(), domain);
        warn_if_empty(domain, &values);
        // Columns first, so that row constraints see the column-constrained values
        let values = trial.attach_constraints_cols(domain, values)?;
        let values = test.attach_constraints_rows(domain, values)?;
        let row_ids = test.cell_dof_ids(domain)?;
        let col_ids = trial.cell_dof_ids(domain)?;
        data.push_domain(values, row_ids, col_ids)
            .wrap_err_with(|| format!("Failed to collect cell matrices on domain {}", domain))?;
    }
    Ok(data)
}

fn collect_vector_values<T, Test>(test: &Test, contribution: DomainContribution<DVector<T>>) -> eyre::Result<VectorData<T>>
where
    T: Real,
    Test: FESpace<T>,
{
    let mut data = VectorData::empty();
    for (domain, values) in contribution.into_domain_values() {
        trace!("Collecting {} cell vectors on domain {}", values.len(), domain);
        warn_if_empty(domain, &values);
        let values = test.attach_constraints_rows(domain, values)?;
        let row_ids = test.cell_dof_ids(domain)?;
        data.push_domain(values, row_ids)
            .wrap_err_with(|| format!("Failed to collect cell vectors on domain {}", domain))?;
    }
    Ok(data)
}

/// Collects the cell matrices of a bilinear form.
///
/// The constraints of the trial space are attached to the columns before the constraints of the
/// test space are attached to the rows.
pub fn collect_cell_matrix<T, Trial, Test>(
    trial: &Trial,
    test: &Test,
    a: DomainContribution<DMatrix<T>>,
) -> eyre::Result<MatrixData<T>>
where
    T: Real,
    Trial: FESpace<T>,
    Test: FESpace<T>,
{
    collect_matrix_values(trial, test, a)
}

/// Collects the cell vectors of a linear form.
///
/// A literal zero gives empty data. Any other literal is rejected as unsupported input.
pub fn collect_cell_vector<T, Test>(test: &Test, l: impl Into<LinearForm<T>>) -> eyre::Result<VectorData<T>>
where
    T: Real,
    Test: FESpace<T>,
{
    collect_vector_values(test, l.into().into_contribution()?)
}

/// The contributions of a bilinear and a linear form, grouped by the domains they share.
#[derive(Debug, Clone)]
pub struct PairedContributions<T: Real> {
    /// Domains present in both forms.
    pub matvec: DomainContribution<MatVec<T>>,
    /// Domains present only in the bilinear form.
    pub matrix: DomainContribution<DMatrix<T>>,
    /// Domains present only in the linear form.
    pub vector: DomainContribution<DVector<T>>,
}

/// Partitions the domains of two forms into the three disjoint groups of [`PairedContributions`].
///
/// The relative order of domains within each group is preserved.
pub fn pair_contributions<T: Real>(
    a: DomainContribution<DMatrix<T>>,
    l: DomainContribution<DVector<T>>,
) -> eyre::Result<PairedContributions<T>> {
    let mut vector = l;
    let mut matvec = DomainContribution::new();
    let mut matrix = DomainContribution::new();

    for (domain, matrices) in a.into_domain_values() {
        match vector.remove(domain) {
            Some(vectors) => {
                if vectors.len() != matrices.len() {
                    return Err(AssemblyError::CellCountMismatch {
                        domain,
                        expected: matrices.len(),
                        actual: vectors.len(),
                    }
                    .into());
                }
                let pairs = matrices
                    .into_iter()
                    .zip(vectors)
                    .map(|(m, v)| MatVec::new(m, v))
                    .collect::<eyre::Result<Vec<_>>>()
                    .wrap_err_with(|| format!("Failed to pair cell values on domain {}", domain))?;
                matvec.insert_new(domain, pairs);
            }
            None => matrix.insert_new(domain, matrices),
        }
    }

    debug!(
        "Paired contributions: {} matrix-vector, {} matrix-only and {} vector-only domains",
        matvec.len(),
        matrix.len(),
        vector.len()
    );
    Ok(PairedContributions { matvec, matrix, vector })
}

fn lift_cell<T: Real>(pair: &mut MatVec<T>, u: &DVector<T>) -> eyre::Result<()> {
    if pair.matrix().ncols() != u.len() {
        return Err(AssemblyError::MismatchedDimensions {
            context: "cell matrix and Dirichlet cell values",
            expected: (pair.matrix().nrows(), u.len()),
            actual: pair.matrix().shape(),
        }
        .into());
    }
    let correction = pair.matrix() * u;
    *pair.vector_mut() -= correction;
    Ok(())
}

/// Moves the contribution of known dof values to the right-hand side.
///
/// For every cell with matrix `A` and known local values `u`, the vector part becomes `b - A u`.
/// Matrix-only domains become matrix-vector domains with vector part `-A u`.
pub fn attach_dirichlet<T: Real>(
    paired: PairedContributions<T>,
    dirichlet: &dyn CellDofValues<T>,
) -> eyre::Result<PairedContributions<T>> {
    let PairedContributions {
        matvec: paired_matvec,
        matrix,
        vector,
    } = paired;

    let mut matvec = DomainContribution::new();
    let domains = paired_matvec
        .into_domain_values()
        .chain(matrix.into_domain_values().map(|(domain, matrices)| {
            let pairs = matrices.into_iter().map(MatVec::from_matrix).collect::<Vec<_>>();
            (domain, pairs)
        }));

    for (domain, mut pairs) in domains {
        let values = dirichlet.cell_dof_values(domain)?;
        if values.len() != pairs.len() {
            return Err(AssemblyError::CellCountMismatch {
                domain,
                expected: pairs.len(),
                actual: values.len(),
            }
            .into());
        }
        for (pair, u) in pairs.iter_mut().zip(&values) {
            lift_cell(pair, u).wrap_err_with(|| format!("Failed to lift Dirichlet values on domain {}", domain))?;
        }
        matvec.insert_new(domain, pairs);
    }

    Ok(PairedContributions {
        matvec,
        matrix: DomainContribution::new(),
        vector,
    })
}

/// Collects a bilinear and a linear form for assembling a matrix and a vector together.
///
/// Domains shared by both forms are collected as matrix-vector pairs. If `dirichlet` is given,
/// its values are lifted into the right-hand side (see [`attach_dirichlet`]).
pub fn collect_cell_matrix_and_vector<T, Trial, Test>(
    trial: &Trial,
    test: &Test,
    a: DomainContribution<DMatrix<T>>,
    l: impl Into<LinearForm<T>>,
    dirichlet: Option<&dyn CellDofValues<T>>,
) -> eyre::Result<AssemblyData<T>>
where
    T: Real,
    Trial: FESpace<T>,
    Test: FESpace<T>,
{
    let mut paired = pair_contributions(a, l.into().into_contribution()?)?;
    if let Some(dirichlet) = dirichlet {
        paired = attach_dirichlet(paired, dirichlet)?;
    }
    Ok(AssemblyData::new(
        collect_matrix_values(trial, test, paired.matvec)?,
        collect_matrix_values(trial, test, paired.matrix)?,
        collect_vector_values(test, paired.vector)?,
    ))
}
