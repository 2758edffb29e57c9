// SPDX-License-Identifier: MIT
//
// Output buffering and stateful cell rendering.
//
//   OutputBuffer: collects a whole refresh worth of escape sequences so it
//   reaches the terminal in a single write.
//
//   CellWriter: remembers the cursor position, colors, and attributes it
//   last emitted and skips whatever would not change anything.

use std::io::{self, Write};

use crate::ansi;
use crate::cell::{Attr, Cell};
use crate::color::CellColor;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

const DEFAULT_CAPACITY: usize = 16_384;

/// In-memory byte sink flushed once per refresh.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a codepoint as UTF-8. Invalid codepoints become `?`.
    pub fn write_codepoint(&mut self, cp: u32) {
        match char::from_u32(cp).filter(|_| cp != 0) {
            Some(ch) => {
                let mut enc = [0u8; 4];
                self.buf
                    .extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
            }
            None => self.buf.push(b'?'),
        }
    }

    /// Drop the accumulated bytes, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write everything to `w` and clear.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            self.buf.clear();
        }
        w.flush()
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── CellWriter ──────────────────────────────────────────────────────────────

/// Stateful cell renderer.
///
/// - Cursor moves are skipped when the next cell directly follows the last.
/// - An attribute change resets SGR state (SGR 0) when the old set was
///   non-empty, which invalidates the tracked colors.
/// - Colors are emitted only when they differ from the last ones sent.
/// - Continuation cells are skipped right after their wide owner.
#[allow(clippy::struct_field_names)]
pub struct CellWriter {
    last_row: i32,
    last_col: i32,
    last_fg: Option<CellColor>,
    last_bg: Option<CellColor>,
    last_attrs: Attr,
}

impl CellWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_row: -1,
            last_col: -1,
            last_fg: None,
            last_bg: None,
            last_attrs: Attr::empty(),
        }
    }

    /// Forget all tracked state (after a clear or an SGR reset).
    #[allow(clippy::missing_const_for_fn)]
    pub fn reset_state(&mut self) {
        *self = Self::new();
    }

    /// Render one cell at `(row, col)`.
    pub fn render_cell(&mut self, out: &mut OutputBuffer, row: u16, col: u16, cell: &Cell) {
        let r = i32::from(row);
        let c = i32::from(col);

        if cell.is_continuation() && r == self.last_row && c == self.last_col + 1 {
            // The wide owner already painted this column.
            self.last_col = c;
            return;
        }

        if r != self.last_row || c != self.last_col + 1 {
            ansi::cursor_to(out, row, col).ok();
        }

        self.apply_style(out, cell);
        if cell.is_continuation() {
            out.buf.push(b' ');
        } else {
            out.write_codepoint(cell.ch);
            if let Some(mark) = cell.combining() {
                out.write_codepoint(u32::from(mark));
            }
        }

        self.last_row = r;
        self.last_col = c;
    }

    fn apply_style(&mut self, out: &mut OutputBuffer, cell: &Cell) {
        if cell.attrs != self.last_attrs {
            if !self.last_attrs.is_empty() {
                ansi::reset(out).ok();
                self.last_fg = None;
                self.last_bg = None;
            }
            ansi::attrs(out, cell.attrs).ok();
            self.last_attrs = cell.attrs;
        }
        if self.last_fg != Some(cell.fg) {
            ansi::fg(out, cell.fg).ok();
            self.last_fg = Some(cell.fg);
        }
        if self.last_bg != Some(cell.bg) {
            ansi::bg(out, cell.bg).ok();
            self.last_bg = Some(cell.bg);
        }
    }
}

impl Default for CellWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
