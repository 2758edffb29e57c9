// SPDX-License-Identifier: MIT
//
// Surface: the character grid the host's redraw stream is painted onto.
//
// The `Surface` trait is the set of primitives the render engine is allowed
// to use: write text at a position with an attribute pair, move the cursor,
// read a cell back, copy one cell onto another, define attribute pairs,
// refresh, and resize. `Screen` is the real implementation: a FrameBuffer
// plus a diff renderer that pushes changes to the terminal on `refresh`.
//
// Write semantics follow a curses window, the model the
// host's grid protocol is usually rendered with:
//
//   - text wraps at the right edge onto the next row
//   - the cursor is left after the last cell written (drawing moves it)
//   - a write that starts off-grid, or runs past the bottom-right corner,
//     fails; whatever was drawn before the failure stays drawn
//
// Attribute pairs are resolved to colors at write time, so redefining a
// pair affects later draws only.

use std::collections::HashMap;
use std::io::{self, Write};

use thiserror::Error;
use unicode_width::UnicodeWidthChar;

use crate::ansi;
use crate::buffer::FrameBuffer;
use crate::cell::{Attr, Cell};
use crate::color::CellColor;
use crate::diff::DiffRenderer;
use crate::terminal::Size;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A primitive that could not be applied at the grid boundary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceError {
    /// The position lies outside the grid.
    #[error("position ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: u16,
        col: u16,
        rows: u16,
        cols: u16,
    },
    /// Text ran past the bottom-right corner.
    #[error("write ran past the bottom-right corner")]
    Overflow,
}

// ─── Width ───────────────────────────────────────────────────────────────────

/// Columns `text` occupies when written: wide characters count two,
/// combining marks nothing.
#[must_use]
pub fn text_width(text: &str) -> u16 {
    text.chars()
        .filter_map(UnicodeWidthChar::width)
        .map(|w| u16::try_from(w).unwrap_or(1))
        .fold(0u16, u16::saturating_add)
}

// ─── Surface ─────────────────────────────────────────────────────────────────

/// Primitives over a fixed-size character grid.
pub trait Surface {
    /// Current grid dimensions.
    fn size(&self) -> Size;

    /// Current cursor position as `(row, col)`.
    fn cursor(&self) -> (u16, u16);

    /// Move the cursor.
    ///
    /// # Errors
    ///
    /// Fails if `(row, col)` lies outside the grid.
    fn move_cursor(&mut self, row: u16, col: u16) -> Result<(), SurfaceError>;

    /// Draw `text` starting at `(row, col)` with attribute pair `pair`.
    ///
    /// # Errors
    ///
    /// Fails if the start lies outside the grid or the text runs past the
    /// bottom-right corner.
    fn write_str(
        &mut self,
        row: u16,
        col: u16,
        text: &str,
        pair: u32,
        attrs: Attr,
    ) -> Result<(), SurfaceError>;

    /// Read back the cell at `(row, col)`.
    fn cell(&self, row: u16, col: u16) -> Option<Cell>;

    /// Copy the cell at `src` onto `dst`, leaving the cursor after `dst`.
    ///
    /// # Errors
    ///
    /// Fails if either position lies outside the grid.
    fn copy_cell(&mut self, src: (u16, u16), dst: (u16, u16)) -> Result<(), SurfaceError>;

    /// Register (or redefine) attribute pair `id`.
    fn define_pair(&mut self, id: u32, fg: CellColor, bg: CellColor);

    /// Blank every cell and home the cursor.
    fn clear(&mut self);

    /// Make everything drawn so far visible.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    fn refresh(&mut self) -> io::Result<()>;

    /// Change the grid dimensions.
    fn resize(&mut self, size: Size);
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// The production [`Surface`]: a cell grid rendered to `W` on refresh.
pub struct Screen<W: Write> {
    frame: FrameBuffer,
    renderer: DiffRenderer,
    pairs: HashMap<u32, (CellColor, CellColor)>,
    cursor: (u16, u16),
    refreshes: u64,
    out: W,
}

impl<W: Write> Screen<W> {
    /// A blank screen of `size` writing to `out`.
    #[must_use]
    pub fn new(size: Size, out: W) -> Self {
        Self {
            frame: FrameBuffer::new(size.rows, size.cols),
            renderer: DiffRenderer::new(),
            pairs: HashMap::new(),
            cursor: (0, 0),
            refreshes: 0,
            out,
        }
    }

    /// The underlying cell grid.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// How many times [`Surface::refresh`] has completed.
    #[inline]
    #[must_use]
    pub const fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// The colors pair `id` currently resolves to.
    #[must_use]
    pub fn pair(&self, id: u32) -> Option<(CellColor, CellColor)> {
        self.pairs.get(&id).copied()
    }

    /// The terminal sink.
    #[inline]
    pub const fn output(&self) -> &W {
        &self.out
    }

    fn resolve(&self, pair: u32) -> (CellColor, CellColor) {
        self.pairs
            .get(&pair)
            .copied()
            .unwrap_or((CellColor::Default, CellColor::Default))
    }

    fn check(&self, row: u16, col: u16) -> Result<(), SurfaceError> {
        if self.frame.in_bounds(row, col) {
            Ok(())
        } else {
            Err(SurfaceError::OutOfBounds {
                row,
                col,
                rows: self.frame.rows(),
                cols: self.frame.cols(),
            })
        }
    }

    /// The position after `(row, col)`, or `None` past the last cell.
    fn advance(&self, row: u16, col: u16, width: u16) -> Option<(u16, u16)> {
        let next = col + width;
        if next < self.frame.cols() {
            Some((row, next))
        } else if row + 1 < self.frame.rows() {
            Some((row + 1, 0))
        } else {
            None
        }
    }
}

impl<W: Write> Surface for Screen<W> {
    fn size(&self) -> Size {
        Size {
            cols: self.frame.cols(),
            rows: self.frame.rows(),
        }
    }

    fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    fn move_cursor(&mut self, row: u16, col: u16) -> Result<(), SurfaceError> {
        self.check(row, col)?;
        self.cursor = (row, col);
        Ok(())
    }

    fn write_str(
        &mut self,
        row: u16,
        col: u16,
        text: &str,
        pair: u32,
        attrs: Attr,
    ) -> Result<(), SurfaceError> {
        self.check(row, col)?;
        let (fg, bg) = self.resolve(pair);
        let cols = self.frame.cols();
        let (mut r, mut c) = (row, col);
        self.cursor = (r, c);
        // Where the last base character of this write landed.
        let mut base = None;

        for ch in text.chars() {
            let width = match ch.width() {
                None => continue,
                Some(0) => {
                    if let Some((br, bc)) = base {
                        let cell = self.frame.get(br, bc).copied().unwrap_or_default();
                        self.frame.set(br, bc, cell.with_mark(ch));
                    }
                    continue;
                }
                Some(w) => u16::try_from(w).unwrap_or(1),
            };

            // A wide glyph that does not fit the rest of the row wraps whole.
            if width == 2 && c + 1 >= cols {
                self.frame.set(r, c, Cell::styled(' ', fg, bg, attrs, pair));
                match self.advance(r, c, 1) {
                    Some(pos) => (r, c) = pos,
                    None => return Err(SurfaceError::Overflow),
                }
                if c + 1 >= cols {
                    continue;
                }
            }

            let cell = Cell::styled(ch, fg, bg, attrs, pair);
            self.frame.set(r, c, cell);
            base = Some((r, c));
            if width == 2 {
                self.frame.set(r, c + 1, Cell::continuation(&cell));
            }

            match self.advance(r, c, width) {
                Some(pos) => {
                    (r, c) = pos;
                    self.cursor = pos;
                }
                None => {
                    self.cursor = (r, c);
                    return Err(SurfaceError::Overflow);
                }
            }
        }
        Ok(())
    }

    fn cell(&self, row: u16, col: u16) -> Option<Cell> {
        self.frame.get(row, col).copied()
    }

    fn copy_cell(&mut self, src: (u16, u16), dst: (u16, u16)) -> Result<(), SurfaceError> {
        self.check(src.0, src.1)?;
        self.check(dst.0, dst.1)?;
        let cell = self.frame.get(src.0, src.1).copied().unwrap_or_default();
        self.frame.set(dst.0, dst.1, cell);
        match self.advance(dst.0, dst.1, 1) {
            Some(pos) => {
                self.cursor = pos;
                Ok(())
            }
            None => {
                self.cursor = dst;
                Err(SurfaceError::Overflow)
            }
        }
    }

    fn define_pair(&mut self, id: u32, fg: CellColor, bg: CellColor) {
        self.pairs.insert(id, (fg, bg));
    }

    fn clear(&mut self) {
        self.frame.clear();
        self.cursor = (0, 0);
    }

    fn refresh(&mut self) -> io::Result<()> {
        // Drawing moves the terminal's cursor; keep it out of sight until
        // it is back where the host put it.
        ansi::cursor_hide(&mut self.out)?;
        self.renderer.render(&self.frame);
        self.renderer.flush_to(&mut self.out)?;
        let (row, col) = self.cursor;
        ansi::cursor_to(&mut self.out, row, col)?;
        ansi::cursor_show(&mut self.out)?;
        self.out.flush()?;
        self.refreshes += 1;
        Ok(())
    }

    fn resize(&mut self, size: Size) {
        self.frame.resize(size.rows, size.cols);
        self.renderer.force_redraw();
        self.cursor = (
            self.cursor.0.min(size.rows.saturating_sub(1)),
            self.cursor.1.min(size.cols.saturating_sub(1)),
        );
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
