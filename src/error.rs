//! Errors reported by collection and assembly.
use crate::dof::DofId;
use crate::domain::DomainId;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Error type for contract violations detected during collection and assembly.
///
/// Fallible operations return [`eyre::Result`], so callers that need to inspect the cause should
/// downcast the report to this type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssemblyError {
    /// The input is structurally disallowed, such as a nonzero literal used as a linear form.
    UnsupportedInput {
        operation: &'static str,
        reason: &'static str,
    },
    /// Storage or local values whose dimensions disagree with what the operation requires.
    MismatchedDimensions {
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// The number of cell values does not match the number of cells in the domain.
    CellCountMismatch {
        domain: DomainId,
        expected: usize,
        actual: usize,
    },
    /// The domain is not known to the space or function that was queried.
    MissingDomain { domain: DomainId },
    /// A mapped row or column index falls outside the storage of the assembler.
    IndexOutOfBounds {
        context: &'static str,
        index: usize,
        bound: usize,
    },
    /// A sparse matrix has no stored entry at the given coordinate.
    EntryOutsidePattern { row: usize, col: usize },
    /// A dof id refers to a dof that the space does not have.
    InvalidDofId { dof: DofId },
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedInput { operation, reason } => {
                write!(f, "Unsupported input to `{}`: {}", operation, reason)
            }
            Self::MismatchedDimensions {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Mismatched dimensions ({}): expected {}x{}, got {}x{}",
                    context, expected.0, expected.1, actual.0, actual.1
                )
            }
            Self::CellCountMismatch {
                domain,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Domain {} has {} cells, but {} cell values were given",
                    domain, expected, actual
                )
            }
            Self::MissingDomain { domain } => write!(f, "Domain {} is not available", domain),
            Self::IndexOutOfBounds { context, index, bound } => {
                write!(f, "Index {} out of bounds ({}): must be less than {}", index, context, bound)
            }
            Self::EntryOutsidePattern { row, col } => {
                write!(f, "Entry ({}, {}) is not part of the sparsity pattern", row, col)
            }
            Self::InvalidDofId { dof } => write!(f, "Invalid dof id {:?}", dof),
        }
    }
}

impl std::error::Error for AssemblyError {}
