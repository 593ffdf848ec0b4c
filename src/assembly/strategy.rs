//! Policies that decide which global indices an assembler writes, and where.
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops::Range;
use std::sync::Arc;

/// Maps global row and column indices to the storage of an assembler.
///
/// Masks decide whether an index participates in assembly at all. Entries with a masked-out row
/// or column are skipped silently. Participating indices are translated by the maps before they
/// are written. The default implementations accept every index and leave it unchanged.
pub trait AssemblyStrategy: Debug + Send + Sync {
    fn row_map(&self, row: usize) -> usize {
        row
    }

    fn col_map(&self, col: usize) -> usize {
        col
    }

    fn row_mask(&self, _row: usize) -> bool {
        true
    }

    fn col_mask(&self, _col: usize) -> bool {
        true
    }
}

/// Assembles every index into the position it already has.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DefaultAssemblyStrategy;

impl AssemblyStrategy for DefaultAssemblyStrategy {}

type IndexMap = Arc<dyn Fn(usize) -> usize + Send + Sync>;
type IndexMask = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// A strategy built from arbitrary closures.
///
/// Operations that are not given behave as in [`DefaultAssemblyStrategy`].
#[derive(Clone, Default)]
pub struct GenericAssemblyStrategy {
    row_map: Option<IndexMap>,
    col_map: Option<IndexMap>,
    row_mask: Option<IndexMask>,
    col_mask: Option<IndexMask>,
}

impl Debug for GenericAssemblyStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericAssemblyStrategy")
            .field("row_map", &self.row_map.is_some())
            .field("col_map", &self.col_map.is_some())
            .field("row_mask", &self.row_mask.is_some())
            .field("col_mask", &self.col_mask.is_some())
            .finish()
    }
}

impl GenericAssemblyStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_map(mut self, map: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        self.row_map = Some(Arc::new(map));
        self
    }

    pub fn with_col_map(mut self, map: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        self.col_map = Some(Arc::new(map));
        self
    }

    pub fn with_row_mask(mut self, mask: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        self.row_mask = Some(Arc::new(mask));
        self
    }

    pub fn with_col_mask(mut self, mask: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        self.col_mask = Some(Arc::new(mask));
        self
    }
}

impl AssemblyStrategy for GenericAssemblyStrategy {
    fn row_map(&self, row: usize) -> usize {
        self.row_map.as_ref().map_or(row, |map| map(row))
    }

    fn col_map(&self, col: usize) -> usize {
        self.col_map.as_ref().map_or(col, |map| map(col))
    }

    fn row_mask(&self, row: usize) -> bool {
        self.row_mask.as_ref().map_or(true, |mask| mask(row))
    }

    fn col_mask(&self, col: usize) -> bool {
        self.col_mask.as_ref().map_or(true, |mask| mask(col))
    }
}

/// Restricts assembly to a contiguous block of owned rows and columns.
///
/// Owned indices are shifted so that the first owned row (column) is stored at index zero, which
/// is how a process assembles its share of a system that is distributed by index ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRangeStrategy {
    rows: Range<usize>,
    cols: Range<usize>,
}

impl OwnedRangeStrategy {
    pub fn new(rows: Range<usize>, cols: Range<usize>) -> Self {
        Self { rows, cols }
    }

    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub fn cols(&self) -> Range<usize> {
        self.cols.clone()
    }
}

impl AssemblyStrategy for OwnedRangeStrategy {
    fn row_map(&self, row: usize) -> usize {
        row - self.rows.start
    }

    fn col_map(&self, col: usize) -> usize {
        col - self.cols.start
    }

    fn row_mask(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    fn col_mask(&self, col: usize) -> bool {
        self.cols.contains(&col)
    }
}
