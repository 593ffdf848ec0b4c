//! The interface to finite element spaces needed for collection and assembly.
use crate::cell::CellValue;
use crate::dof::DofId;
use crate::domain::{DomainId, Triangulation};
use crate::error::AssemblyError;
use crate::table::Table;
use femcore_traits::Real;
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Per-cell constraint matrices of a domain.
pub type CellConstraints<T> = Arc<Vec<DMatrix<T>>>;

/// A finite element space, as seen by collection and assembly.
///
/// The space maps the local dofs of every cell of a domain to global dofs. Spaces may constrain
/// local dofs, in which case every cell has a matrix `C` of shape `n_local x n_cell_dofs` that
/// expresses the `n_local` local dofs in terms of the `n_cell_dofs` dofs listed by
/// [`cell_dof_ids`](Self::cell_dof_ids).
pub trait FESpace<T: Real> {
    fn num_free_dofs(&self) -> usize;

    fn num_dirichlet_dofs(&self) -> usize;

    /// The global dof ids of every cell in the given domain.
    fn cell_dof_ids(&self, domain: DomainId) -> eyre::Result<Arc<Table<DofId>>>;

    /// The constraint matrices of every cell in the given domain, if the domain is constrained.
    fn cell_constraints(&self, _domain: DomainId) -> eyre::Result<Option<CellConstraints<T>>> {
        Ok(None)
    }

    /// Transforms local values of a test space into values over the cell dofs.
    fn attach_constraints_rows<V>(&self, domain: DomainId, values: Vec<V>) -> eyre::Result<Vec<V>>
    where
        V: CellValue<Scalar = T>,
    {
        attach_constraints(self.cell_constraints(domain)?, domain, values, V::constrain_rows)
    }

    /// Transforms local values of a trial space into values over the cell dofs.
    fn attach_constraints_cols<V>(&self, domain: DomainId, values: Vec<V>) -> eyre::Result<Vec<V>>
    where
        V: CellValue<Scalar = T>,
    {
        attach_constraints(self.cell_constraints(domain)?, domain, values, V::constrain_cols)
    }
}

fn attach_constraints<T, V>(
    constraints: Option<CellConstraints<T>>,
    domain: DomainId,
    values: Vec<V>,
    constrain: impl Fn(&V, &DMatrix<T>) -> eyre::Result<V>,
) -> eyre::Result<Vec<V>>
where
    T: Real,
    V: CellValue<Scalar = T>,
{
    let Some(constraints) = constraints else {
        return Ok(values);
    };
    if constraints.len() != values.len() {
        return Err(AssemblyError::CellCountMismatch {
            domain,
            expected: constraints.len(),
            actual: values.len(),
        }
        .into());
    }
    values
        .iter()
        .zip(constraints.iter())
        .map(|(value, c)| constrain(value, c))
        .collect()
}

#[derive(Debug, Clone)]
struct SpaceDomain<T: Real> {
    dof_ids: Arc<Table<DofId>>,
    constraints: Option<CellConstraints<T>>,
}

/// A space defined directly by tables of cell dof ids.
#[derive(Debug, Clone)]
pub struct TableSpace<T: Real> {
    num_free_dofs: usize,
    num_dirichlet_dofs: usize,
    domains: FxHashMap<DomainId, SpaceDomain<T>>,
}

impl<T: Real> TableSpace<T> {
    pub fn new(num_free_dofs: usize, num_dirichlet_dofs: usize) -> Self {
        Self {
            num_free_dofs,
            num_dirichlet_dofs,
            domains: FxHashMap::default(),
        }
    }

    fn check_dof_ids(&self, domain: &dyn Triangulation, dof_ids: &Table<DofId>) -> eyre::Result<()> {
        if dof_ids.len() != domain.num_cells() {
            return Err(AssemblyError::CellCountMismatch {
                domain: domain.domain_id(),
                expected: domain.num_cells(),
                actual: dof_ids.len(),
            }
            .into());
        }
        for &dof in dof_ids.entries() {
            let valid = match dof {
                DofId::Free(i) => i < self.num_free_dofs,
                DofId::Dirichlet(i) => i < self.num_dirichlet_dofs,
            };
            if !valid {
                return Err(AssemblyError::InvalidDofId { dof }.into());
            }
        }
        Ok(())
    }

    /// Adds a domain whose cells map their local dofs directly to the given dof ids.
    pub fn with_domain(mut self, domain: &dyn Triangulation, dof_ids: impl Into<Table<DofId>>) -> eyre::Result<Self> {
        let dof_ids = dof_ids.into();
        self.check_dof_ids(domain, &dof_ids)?;
        let space_domain = SpaceDomain {
            dof_ids: Arc::new(dof_ids),
            constraints: None,
        };
        self.domains.insert(domain.domain_id(), space_domain);
        Ok(self)
    }

    /// Adds a domain whose local dofs are expressed in terms of the given dof ids through
    /// per-cell constraint matrices.
    pub fn with_constrained_domain(
        mut self,
        domain: &dyn Triangulation,
        dof_ids: impl Into<Table<DofId>>,
        constraints: Vec<DMatrix<T>>,
    ) -> eyre::Result<Self> {
        let dof_ids = dof_ids.into();
        self.check_dof_ids(domain, &dof_ids)?;
        if constraints.len() != dof_ids.len() {
            return Err(AssemblyError::CellCountMismatch {
                domain: domain.domain_id(),
                expected: dof_ids.len(),
                actual: constraints.len(),
            }
            .into());
        }
        for (c, ids) in constraints.iter().zip(dof_ids.iter()) {
            if c.ncols() != ids.len() {
                return Err(AssemblyError::MismatchedDimensions {
                    context: "cell constraint columns",
                    expected: (c.nrows(), ids.len()),
                    actual: c.shape(),
                }
                .into());
            }
        }
        let space_domain = SpaceDomain {
            dof_ids: Arc::new(dof_ids),
            constraints: Some(Arc::new(constraints)),
        };
        self.domains.insert(domain.domain_id(), space_domain);
        Ok(self)
    }

    fn domain(&self, domain: DomainId) -> eyre::Result<&SpaceDomain<T>> {
        self.domains
            .get(&domain)
            .ok_or_else(|| AssemblyError::MissingDomain { domain }.into())
    }
}

impl<T: Real> FESpace<T> for TableSpace<T> {
    fn num_free_dofs(&self) -> usize {
        self.num_free_dofs
    }

    fn num_dirichlet_dofs(&self) -> usize {
        self.num_dirichlet_dofs
    }

    fn cell_dof_ids(&self, domain: DomainId) -> eyre::Result<Arc<Table<DofId>>> {
        Ok(Arc::clone(&self.domain(domain)?.dof_ids))
    }

    fn cell_constraints(&self, domain: DomainId) -> eyre::Result<Option<CellConstraints<T>>> {
        Ok(self.domain(domain)?.constraints.clone())
    }
}

/// Something that has known values for the local dofs of every cell.
pub trait CellDofValues<T: Real> {
    /// The local dof values of every cell in the given domain.
    fn cell_dof_values(&self, domain: DomainId) -> eyre::Result<Vec<DVector<T>>>;
}

/// A finite element function given by its free and Dirichlet dof values.
#[derive(Debug, Clone)]
pub struct FEFunction<'a, T: Real, S> {
    space: &'a S,
    free_values: DVector<T>,
    dirichlet_values: DVector<T>,
}

impl<'a, T, S> FEFunction<'a, T, S>
where
    T: Real,
    S: FESpace<T>,
{
    pub fn new(space: &'a S, free_values: DVector<T>, dirichlet_values: DVector<T>) -> eyre::Result<Self> {
        let expected = (space.num_free_dofs(), space.num_dirichlet_dofs());
        let actual = (free_values.len(), dirichlet_values.len());
        if expected != actual {
            return Err(AssemblyError::MismatchedDimensions {
                context: "free and Dirichlet values",
                expected,
                actual,
            }
            .into());
        }
        Ok(Self {
            space,
            free_values,
            dirichlet_values,
        })
    }

    /// The function that vanishes on free dofs and takes the given Dirichlet values.
    ///
    /// This is the function used for Dirichlet lifting.
    pub fn from_dirichlet_values(space: &'a S, dirichlet_values: DVector<T>) -> eyre::Result<Self> {
        Self::new(space, DVector::zeros(space.num_free_dofs()), dirichlet_values)
    }

    pub fn space(&self) -> &S {
        self.space
    }

    pub fn free_values(&self) -> &DVector<T> {
        &self.free_values
    }

    pub fn dirichlet_values(&self) -> &DVector<T> {
        &self.dirichlet_values
    }

    fn dof_value(&self, dof: DofId) -> eyre::Result<T> {
        let value = match dof {
            DofId::Free(i) => self.free_values.get(i),
            DofId::Dirichlet(i) => self.dirichlet_values.get(i),
        };
        value
            .copied()
            .ok_or_else(|| AssemblyError::InvalidDofId { dof }.into())
    }
}

impl<'a, T, S> CellDofValues<T> for FEFunction<'a, T, S>
where
    T: Real,
    S: FESpace<T>,
{
    fn cell_dof_values(&self, domain: DomainId) -> eyre::Result<Vec<DVector<T>>> {
        let dof_ids = self.space.cell_dof_ids(domain)?;
        let constraints = self.space.cell_constraints(domain)?;

        let mut cell_values = Vec::with_capacity(dof_ids.len());
        for (cell_index, ids) in dof_ids.iter().enumerate() {
            let mut u = DVector::zeros(ids.len());
            for (u_i, dof) in u.iter_mut().zip(ids) {
                *u_i = self.dof_value(*dof)?;
            }
            if let Some(constraints) = &constraints {
                let c = constraints
                    .get(cell_index)
                    .ok_or(AssemblyError::CellCountMismatch {
                        domain,
                        expected: dof_ids.len(),
                        actual: constraints.len(),
                    })?;
                if c.ncols() != u.len() {
                    return Err(AssemblyError::MismatchedDimensions {
                        context: "cell constraint columns",
                        expected: (c.nrows(), u.len()),
                        actual: c.shape(),
                    }
                    .into());
                }
                u = c * u;
            }
            cell_values.push(u);
        }
        Ok(cell_values)
    }
}
