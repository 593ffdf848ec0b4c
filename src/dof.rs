use serde::{Deserialize, Serialize};

/// Identifier of a degree of freedom.
///
/// Free dofs are the unknowns of the global system and index its rows and columns. Dirichlet dofs
/// have prescribed values; they are skipped during assembly and only enter through Dirichlet
/// lifting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DofId {
    Free(usize),
    Dirichlet(usize),
}

impl DofId {
    pub fn free_index(&self) -> Option<usize> {
        match self {
            Self::Free(i) => Some(*i),
            Self::Dirichlet(_) => None,
        }
    }

    pub fn dirichlet_index(&self) -> Option<usize> {
        match self {
            Self::Free(_) => None,
            Self::Dirichlet(i) => Some(*i),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free(_))
    }
}

impl From<usize> for DofId {
    fn from(index: usize) -> Self {
        Self::Free(index)
    }
}
