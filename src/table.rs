use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::ops::Range;

/// A compact table of variable-length rows, stored contiguously.
///
/// Used for per-cell data whose length varies between cells, such as the global dof ids of each
/// cell.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableParts<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Table<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

/// Unvalidated table data, checked when converted into a [`Table`].
#[derive(Deserialize)]
struct TableParts<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

impl<T> TryFrom<TableParts<T>> for Table<T> {
    type Error = String;

    fn try_from(parts: TableParts<T>) -> Result<Self, Self::Error> {
        let TableParts { data, offsets } = parts;
        if offsets.first() != Some(&0) {
            return Err("table offsets must start at zero".to_string());
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err("table offsets must be non-decreasing".to_string());
        }
        if offsets.last() != Some(&data.len()) {
            return Err(format!(
                "last table offset must equal the number of entries ({})",
                data.len()
            ));
        }
        Ok(Self { data, offsets })
    }
}

impl<T: Debug> Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Table<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of entries over all rows.
    pub fn num_entries(&self) -> usize {
        self.data.len()
    }

    fn row_range(&self, index: usize) -> Option<Range<usize>> {
        let begin = *self.offsets.get(index)?;
        let end = *self.offsets.get(index + 1)?;
        Some(begin..end)
    }

    pub fn get(&self, index: usize) -> Option<&[T]> {
        self.data.get(self.row_range(index)?)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut [T]> {
        let range = self.row_range(index)?;
        self.data.get_mut(range)
    }

    pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = &[T]> {
        self.offsets
            .windows(2)
            .map(move |w| &self.data[w[0]..w[1]])
    }

    /// Iterates over all entries of all rows.
    pub fn entries(&self) -> &[T] {
        &self.data
    }

    /// Appends a row consisting of the given entries.
    pub fn push_row(&mut self, row: impl IntoIterator<Item = T>) {
        self.data.extend(row);
        self.offsets.push(self.data.len());
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.offsets.clear();
        self.offsets.push(0);
    }
}

impl<T: Clone> Table<T> {
    pub fn push_row_slice(&mut self, row: &[T]) {
        self.data.extend_from_slice(row);
        self.offsets.push(self.data.len());
    }
}

impl<'a, T: Clone> From<&'a [Vec<T>]> for Table<T> {
    fn from(rows: &'a [Vec<T>]) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.push_row_slice(row);
        }
        table
    }
}

impl<T> From<Vec<Vec<T>>> for Table<T> {
    fn from(rows: Vec<Vec<T>>) -> Self {
        rows.into_iter().collect()
    }
}

impl<T, R> FromIterator<R> for Table<T>
where
    R: IntoIterator<Item = T>,
{
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let mut table = Self::new();
        for row in iter {
            table.push_row(row);
        }
        table
    }
}
