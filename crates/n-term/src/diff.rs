// SPDX-License-Identifier: MIT
//
// Differential renderer.
//
// A refresh compares the surface's FrameBuffer against the frame sent last
// time and emits escape sequences only for cells that changed. Unchanged
// rows are skipped with one slice comparison. The whole frame goes out
// wrapped in synchronized output so the terminal never shows half a
// refresh.

use std::io::{self, Write};

use crate::ansi;
use crate::buffer::FrameBuffer;
use crate::output::{CellWriter, OutputBuffer};

/// Statistics from one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells that differed and were emitted.
    pub cells_rendered: usize,
    /// Cells that matched the previous frame.
    pub cells_skipped: usize,
    /// Bytes of escape output produced.
    pub bytes_written: usize,
}

/// Renders a [`FrameBuffer`] as the difference from the previous one.
pub struct DiffRenderer {
    output: OutputBuffer,
    writer: CellWriter,
    previous: Option<FrameBuffer>,
}

impl DiffRenderer {
    /// A renderer whose first render draws everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            output: OutputBuffer::new(),
            writer: CellWriter::new(),
            previous: None,
        }
    }

    /// Diff `current` against the previous frame into the output buffer.
    pub fn render(&mut self, current: &FrameBuffer) -> RenderStats {
        self.output.clear();
        self.writer.reset_state();

        let (rows, cols) = (current.rows(), current.cols());
        let mut stats = RenderStats::default();

        if rows == 0 || cols == 0 {
            self.store_frame(current);
            return stats;
        }

        ansi::begin_sync(&mut self.output).ok();

        let previous = self
            .previous
            .as_ref()
            .filter(|prev| prev.rows() == rows && prev.cols() == cols);

        if previous.is_none() {
            ansi::reset(&mut self.output).ok();
            ansi::clear_screen(&mut self.output).ok();
        }

        for row in 0..rows {
            let curr_row = current.row(row).unwrap_or_default();
            let prev_row = previous.and_then(|p| p.row(row));

            if prev_row == Some(curr_row) {
                stats.cells_skipped += curr_row.len();
                continue;
            }

            for (col, cell) in (0..cols).zip(curr_row) {
                let changed = prev_row
                    .and_then(|p| p.get(usize::from(col)))
                    .is_none_or(|old| old != cell);
                if changed {
                    self.writer.render_cell(&mut self.output, row, col, cell);
                    stats.cells_rendered += 1;
                } else {
                    stats.cells_skipped += 1;
                }
            }
        }

        ansi::reset(&mut self.output).ok();
        ansi::end_sync(&mut self.output).ok();

        stats.bytes_written = self.output.len();
        self.store_frame(current);
        stats
    }

    /// Bytes produced by the last render.
    #[must_use]
    pub fn output_bytes(&self) -> &[u8] {
        self.output.as_bytes()
    }

    /// Write the last render to `w`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        self.output.flush_to(w)
    }

    /// Forget the previous frame; the next render redraws everything.
    pub fn force_redraw(&mut self) {
        self.previous = None;
    }

    fn store_frame(&mut self, current: &FrameBuffer) {
        match &mut self.previous {
            Some(prev) if prev.rows() == current.rows() && prev.cols() == current.cols() => {
                prev.copy_from(current);
            }
            _ => self.previous = Some(current.clone()),
        }
    }
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
