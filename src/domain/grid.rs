/// Grid topology: linear cell indices laid out row-major.
///
/// A `Grid` holds no per-cell data, only the shape needed to answer
/// adjacency questions. It is fixed for the lifetime of a session.

/// Linear, row-major index of a cell. The only identity a cell has.
pub type CellIndex = usize;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Grid {
    pub columns: usize,
    pub total_cells: usize,
}

impl Grid {
    pub fn new(columns: usize, total_cells: usize) -> Self {
        Grid { columns, total_cells }
    }

    /// Is `index` a cell of this grid?
    #[inline]
    pub fn contains(&self, index: CellIndex) -> bool {
        index < self.total_cells
    }

    /// Number of rows, counting a partially filled last row.
    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.total_cells.div_ceil(self.columns)
        }
    }

    /// (column, row) of a cell.
    #[inline]
    pub fn position(&self, index: CellIndex) -> Option<(usize, usize)> {
        if self.columns == 0 || !self.contains(index) {
            return None;
        }
        Some((index % self.columns, index / self.columns))
    }

    /// Index of the cell at (column, row), if there is one.
    pub fn index_at(&self, col: usize, row: usize) -> Option<CellIndex> {
        if col >= self.columns {
            return None;
        }
        let index = row.checked_mul(self.columns)?.checked_add(col)?;
        self.contains(index).then_some(index)
    }

    pub fn neighbors(&self, index: CellIndex) -> Vec<CellIndex> {
        neighbors(index, self.columns, self.total_cells)
    }
}

/// Adjacent cells in the order left, right, top, bottom.
///
/// The order is significant: the scheduler staggers neighbour triggers
/// in exactly this sequence.
pub fn neighbors(index: CellIndex, columns: usize, total: usize) -> Vec<CellIndex> {
    let mut out = Vec::with_capacity(4);
    if columns == 0 || index >= total {
        return out;
    }
    let row = index / columns;
    let col = index % columns;

    // Left
    if col > 0 {
        out.push(index - 1);
    }
    // Right (the last row may be short)
    if col + 1 < columns && index + 1 < total {
        out.push(index + 1);
    }
    // Top
    if row > 0 {
        out.push(index - columns);
    }
    // Bottom
    if index + columns < total {
        out.push(index + columns);
    }
    out
}
