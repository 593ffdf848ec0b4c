//! Integration domains and the per-cell contributions computed over them.
use crate::cell::CellValue;
use crate::error::AssemblyError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Neg, Sub};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stable identifier of an integration domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainId(usize);

static NEXT_DOMAIN_ID: AtomicUsize = AtomicUsize::new(0);

impl DomainId {
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns an id that no other call to this function has returned.
    ///
    /// Fresh ids are drawn from a separate range than the small ids typically passed to
    /// [`DomainId::new`], so the two can be mixed safely.
    pub fn fresh() -> Self {
        Self((1 << (usize::BITS - 1)) | NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A collection of cells over which local contributions are computed.
pub trait Triangulation {
    fn domain_id(&self) -> DomainId;

    fn num_cells(&self) -> usize;
}

/// A domain described only by its id and number of cells.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDomain {
    id: DomainId,
    num_cells: usize,
}

impl CellDomain {
    pub fn new(id: DomainId, num_cells: usize) -> Self {
        Self { id, num_cells }
    }

    /// A domain with the given number of cells and a fresh id.
    pub fn with_num_cells(num_cells: usize) -> Self {
        Self::new(DomainId::fresh(), num_cells)
    }
}

impl Triangulation for CellDomain {
    fn domain_id(&self) -> DomainId {
        self.id
    }

    fn num_cells(&self) -> usize {
        self.num_cells
    }
}

/// Local values for every cell of one or more domains.
///
/// Domains are kept in the order in which they were first added, so that everything computed
/// from a contribution is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainContribution<V> {
    domains: Vec<DomainId>,
    values: Vec<Vec<V>>,
    index: FxHashMap<DomainId, usize>,
}

impl<V> Default for DomainContribution<V> {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            values: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<V> DomainContribution<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn domains(&self) -> &[DomainId] {
        &self.domains
    }

    pub fn contains(&self, domain: DomainId) -> bool {
        self.index.contains_key(&domain)
    }

    pub fn get_contribution(&self, domain: DomainId) -> Option<&[V]> {
        let i = *self.index.get(&domain)?;
        Some(&self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (DomainId, &[V])> {
        self.domains
            .iter()
            .copied()
            .zip(self.values.iter().map(Vec::as_slice))
    }

    /// Removes the values of the given domain, preserving the order of the remaining domains.
    pub fn remove(&mut self, domain: DomainId) -> Option<Vec<V>> {
        let i = self.index.remove(&domain)?;
        self.domains.remove(i);
        let values = self.values.remove(i);
        for j in self.index.values_mut() {
            if *j > i {
                *j -= 1;
            }
        }
        Some(values)
    }

    /// Inserts values for a domain that is not yet present.
    ///
    /// Panics if the domain is already present.
    pub(crate) fn insert_new(&mut self, domain: DomainId, values: Vec<V>) {
        let previous = self.index.insert(domain, self.domains.len());
        assert!(previous.is_none(), "Internal error: domain {} inserted twice", domain);
        self.domains.push(domain);
        self.values.push(values);
    }

    pub fn into_domain_values(self) -> impl Iterator<Item = (DomainId, Vec<V>)> {
        self.domains.into_iter().zip(self.values)
    }

    /// Applies `f` to the values of every cell.
    pub fn map<W>(self, mut f: impl FnMut(V) -> W) -> DomainContribution<W> {
        DomainContribution {
            domains: self.domains,
            values: self
                .values
                .into_iter()
                .map(|cells| cells.into_iter().map(&mut f).collect())
                .collect(),
            index: self.index,
        }
    }
}

impl<V: CellValue> DomainContribution<V> {
    /// A contribution consisting of the given values over a single domain.
    pub fn from_domain(domain: &dyn Triangulation, values: Vec<V>) -> eyre::Result<Self> {
        let mut contribution = Self::new();
        contribution.add_contribution(domain, values)?;
        Ok(contribution)
    }

    /// Adds cell values over the given domain.
    ///
    /// If the domain is already present, the values are added cell-wise to the existing values.
    pub fn add_contribution(&mut self, domain: &dyn Triangulation, values: Vec<V>) -> eyre::Result<()> {
        if values.len() != domain.num_cells() {
            return Err(AssemblyError::CellCountMismatch {
                domain: domain.domain_id(),
                expected: domain.num_cells(),
                actual: values.len(),
            }
            .into());
        }
        self.add_values(domain.domain_id(), values)
    }

    /// Computes the values of `domain` after adding `values`, without modifying `self`.
    fn summed_values(&self, domain: DomainId, values: Vec<V>) -> eyre::Result<Vec<V>> {
        let Some(&i) = self.index.get(&domain) else {
            return Ok(values);
        };
        let existing = &self.values[i];
        if existing.len() != values.len() {
            return Err(AssemblyError::CellCountMismatch {
                domain,
                expected: existing.len(),
                actual: values.len(),
            }
            .into());
        }
        let mut summed = existing.clone();
        for (a, b) in summed.iter_mut().zip(&values) {
            a.add_assign_cell(b)?;
        }
        Ok(summed)
    }

    fn replace_values(&mut self, domain: DomainId, values: Vec<V>) {
        match self.index.get(&domain) {
            Some(&i) => self.values[i] = values,
            None => self.insert_new(domain, values),
        }
    }

    fn add_values(&mut self, domain: DomainId, values: Vec<V>) -> eyre::Result<()> {
        let summed = self.summed_values(domain, values)?;
        self.replace_values(domain, summed);
        Ok(())
    }

    /// Adds all domain values of `other` to `self`.
    ///
    /// On error, `self` is left unchanged.
    pub fn merge(&mut self, other: Self) -> eyre::Result<()> {
        let merged = other
            .into_domain_values()
            .map(|(domain, values)| Ok((domain, self.summed_values(domain, values)?)))
            .collect::<eyre::Result<Vec<_>>>()?;
        for (domain, values) in merged {
            self.replace_values(domain, values);
        }
        Ok(())
    }

    pub fn scale(&mut self, factor: V::Scalar) {
        for value in self.values.iter_mut().flatten() {
            value.scale_cell(factor);
        }
    }

    pub fn scaled(mut self, factor: V::Scalar) -> Self {
        self.scale(factor);
        self
    }
}

/// # Panics
///
/// Panics if the same domain has different numbers of cells or incompatible cell values in the
/// two contributions. Use [`DomainContribution::merge`] to handle this as an error.
impl<V: CellValue> Add for DomainContribution<V> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl<V: CellValue> AddAssign for DomainContribution<V> {
    fn add_assign(&mut self, rhs: Self) {
        if let Err(err) = self.merge(rhs) {
            panic!("Cannot add domain contributions: {}", err);
        }
    }
}

impl<V: CellValue> Neg for DomainContribution<V> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.scaled(nalgebra::convert::<f64, V::Scalar>(-1.0))
    }
}

impl<V: CellValue> Sub for DomainContribution<V> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}
