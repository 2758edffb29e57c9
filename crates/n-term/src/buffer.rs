// SPDX-License-Identifier: MIT
//
// FrameBuffer: the 2D cell grid behind the surface.
//
// Flat `Vec<Cell>` in row-major order, so a row is a contiguous slice and
// the diff renderer can compare whole rows with one slice comparison.
// Addressing is `(row, col)`, matching the host's grid coordinates.

use crate::cell::Cell;

/// A fixed-size grid of cells.
///
/// ```
/// use n_term::buffer::FrameBuffer;
/// use n_term::cell::Cell;
///
/// let mut buf = FrameBuffer::new(24, 80);
/// assert!(buf.set(3, 5, Cell::new('X')));
/// assert_eq!(buf.get(3, 5).unwrap().character(), Some('X'));
/// assert!(!buf.set(24, 0, Cell::new('Y')));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    rows: u16,
    cols: u16,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    /// Create a grid of blank cells.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::EMPTY; usize::from(rows) * usize::from(cols)],
        }
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    /// Whether `(row, col)` lies inside the grid.
    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, row: u16, col: u16) -> bool {
        row < self.rows && col < self.cols
    }

    #[inline]
    const fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// The cell at `(row, col)`, or `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn get(&self, row: u16, col: u16) -> Option<&Cell> {
        if self.in_bounds(row, col) {
            Some(&self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    /// Overwrite the cell at `(row, col)`. Returns `false` outside the grid.
    #[inline]
    pub fn set(&mut self, row: u16, col: u16, cell: Cell) -> bool {
        if !self.in_bounds(row, col) {
            return false;
        }
        let idx = self.index(row, col);
        self.cells[idx] = cell;
        true
    }

    /// One row as a slice, or `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row < self.rows {
            let start = self.index(row, 0);
            Some(&self.cells[start..start + usize::from(self.cols)])
        } else {
            None
        }
    }

    /// Reset every cell to blank.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::EMPTY);
    }

    /// Change dimensions. All content is cleared.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = rows;
        self.cols = cols;
        self.cells.clear();
        self.cells
            .resize(usize::from(rows) * usize::from(cols), Cell::EMPTY);
    }

    /// Copy another buffer of identical dimensions into this one.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions differ.
    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "copy_from requires identical dimensions"
        );
        self.cells.copy_from_slice(&other.cells);
    }

    /// The text of one row, continuation cells skipped. Handy in tests.
    #[must_use]
    pub fn row_text(&self, row: u16) -> String {
        self.row(row)
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(|c| c.character().map(|ch| (ch, c.combining())))
                    .flat_map(|(ch, mark)| std::iter::once(ch).chain(mark))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameBuffer({}x{})", self.rows, self.cols)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_blank() {
        let buf = FrameBuffer::new(3, 4);
        assert_eq!(buf.rows(), 3);
        assert_eq!(buf.cols(), 4);
        assert_eq!(buf.row_text(0), "    ");
        assert_eq!(*buf.get(2, 3).unwrap(), Cell::EMPTY);
    }

    #[test]
    fn out_of_bounds_access() {
        let mut buf = FrameBuffer::new(2, 2);
        assert!(buf.get(2, 0).is_none());
        assert!(buf.get(0, 2).is_none());
        assert!(!buf.set(0, 2, Cell::new('x')));
        assert!(buf.row(2).is_none());
    }

    #[test]
    fn set_is_row_major() {
        let mut buf = FrameBuffer::new(2, 3);
        buf.set(1, 0, Cell::new('a'));
        assert_eq!(buf.row_text(0), "   ");
        assert_eq!(buf.row_text(1), "a  ");
    }

    #[test]
    fn clear_blanks_cells() {
        let mut buf = FrameBuffer::new(1, 2);
        buf.set(0, 1, Cell::new('z'));
        buf.clear();
        assert_eq!(buf.row_text(0), "  ");
    }

    #[test]
    fn resize_changes_dimensions_and_clears() {
        let mut buf = FrameBuffer::new(2, 2);
        buf.set(0, 0, Cell::new('q'));
        buf.resize(3, 5);
        assert_eq!((buf.rows(), buf.cols()), (3, 5));
        assert_eq!(buf.row_text(0), "     ");
        assert!(buf.get(2, 4).is_some());
    }

    #[test]
    fn copy_from_same_size() {
        let mut a = FrameBuffer::new(1, 3);
        let mut b = FrameBuffer::new(1, 3);
        b.set(0, 2, Cell::new('k'));
        a.copy_from(&b);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "identical dimensions")]
    fn copy_from_mismatch_panics() {
        let mut a = FrameBuffer::new(1, 3);
        a.copy_from(&FrameBuffer::new(2, 3));
    }

    #[test]
    fn row_text_skips_continuations() {
        let mut buf = FrameBuffer::new(1, 3);
        let wide = Cell::new('中');
        buf.set(0, 0, wide);
        buf.set(0, 1, Cell::continuation(&wide));
        buf.set(0, 2, Cell::new('!'));
        assert_eq!(buf.row_text(0), "中!");
    }
}
