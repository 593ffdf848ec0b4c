use std::fmt;
use std::fmt::{Display, Formatter};

/// Errors produced when constructing, differentiating or evaluating fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FieldError {
    /// The field type does not provide the requested operation.
    NotImplemented {
        operation: &'static str,
        field: &'static str,
    },
    /// Derivatives of the requested order are not available.
    DerivativeUnavailable { order: usize },
    /// The operands are structurally incompatible with the operation.
    UnsupportedInput {
        operation: &'static str,
        reason: &'static str,
    },
    /// A tensor did not have the shape required by the operation.
    ShapeMismatch {
        operation: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// The cache passed to an evaluation was not created by the evaluated field.
    InvalidCache { field: &'static str },
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented { operation, field } => {
                write!(f, "Operation `{}` is not implemented for {}", operation, field)
            }
            Self::DerivativeUnavailable { order } => {
                write!(f, "Derivatives of order {} are not available", order)
            }
            Self::UnsupportedInput { operation, reason } => {
                write!(f, "Unsupported input to `{}`: {}", operation, reason)
            }
            Self::ShapeMismatch {
                operation,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Shape mismatch in `{}`: expected {:?}, got {:?}",
                    operation, expected, actual
                )
            }
            Self::InvalidCache { field } => {
                write!(f, "The cache passed to {} was created by a different field", field)
            }
        }
    }
}

impl std::error::Error for FieldError {}
