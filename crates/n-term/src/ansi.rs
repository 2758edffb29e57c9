// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Stateless writers for the handful of terminal commands the client needs:
// cursor addressing, screen clearing, SGR colors and reverse video,
// synchronized output, and the alternate screen. Deciding *when* to emit
// any of these is the job of `CellWriter` and `Screen`.
//
// Coordinates are 0-indexed (row, col) in our API and converted to the
// terminal's 1-indexed CUP form here.
use std::io::{self, Write};

use crate::cell::Attr;
use crate::color::CellColor;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` using CUP.
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(row) + 1, u32::from(col) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes (SGR 0). Colors return to the terminal default.
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// Set the foreground color.
///
/// Palette indices 0–15 use the compact 30–37 / 90–97 codes, the rest of
/// the rest of the 256-color palette uses `38;5;N`.
pub fn fg(w: &mut impl Write, color: CellColor) -> io::Result<()> {
    match color {
        CellColor::Default => w.write_all(b"\x1b[39m"),
        CellColor::Ansi256(idx) if idx < 8 => write!(w, "\x1b[{}m", 30 + u16::from(idx)),
        CellColor::Ansi256(idx) if idx < 16 => write!(w, "\x1b[{}m", 82 + u16::from(idx)),
        CellColor::Ansi256(idx) => write!(w, "\x1b[38;5;{idx}m"),
    }
}

/// Set the background color. Same strategy as [`fg`] with the 40/100/48 codes.
pub fn bg(w: &mut impl Write, color: CellColor) -> io::Result<()> {
    match color {
        CellColor::Default => w.write_all(b"\x1b[49m"),
        CellColor::Ansi256(idx) if idx < 8 => write!(w, "\x1b[{}m", 40 + u16::from(idx)),
        CellColor::Ansi256(idx) if idx < 16 => write!(w, "\x1b[{}m", 92 + u16::from(idx)),
        CellColor::Ansi256(idx) => write!(w, "\x1b[48;5;{idx}m"),
    }
}

/// Emit SGR codes for cell attributes. Writes nothing for an empty set.
pub fn attrs(w: &mut impl Write, attr: Attr) -> io::Result<()> {
    if attr.contains(Attr::INVERSE) {
        w.write_all(b"\x1b[7m")?;
    }
    Ok(())
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC mode 2026): the terminal holds the frame
/// until [`end_sync`].
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026h")
}

/// End synchronized output.
#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026l")
}

// ─── Alternate Screen ───────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC mode 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Leave the alternate screen and restore the shell's content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    // ── Cursor ──────────────────────────────────────────────────

    #[test]
    fn cursor_to_origin_is_one_based() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
    }

    #[test]
    fn cursor_to_row_then_column() {
        assert_eq!(emit(|w| cursor_to(w, 4, 9)), "\x1b[5;10H");
    }

    #[test]
    fn cursor_to_max_does_not_overflow() {
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn cursor_visibility() {
        assert_eq!(emit(cursor_hide), "\x1b[?25l");
        assert_eq!(emit(cursor_show), "\x1b[?25h");
    }

    // ── Colors ──────────────────────────────────────────────────

    #[test]
    fn fg_default_and_palette() {
        assert_eq!(emit(|w| fg(w, CellColor::Default)), "\x1b[39m");
        assert_eq!(emit(|w| fg(w, CellColor::Ansi256(1))), "\x1b[31m");
        assert_eq!(emit(|w| fg(w, CellColor::Ansi256(9))), "\x1b[91m");
        assert_eq!(emit(|w| fg(w, CellColor::Ansi256(200))), "\x1b[38;5;200m");
    }

    #[test]
    fn bg_default_and_palette() {
        assert_eq!(emit(|w| bg(w, CellColor::Default)), "\x1b[49m");
        assert_eq!(emit(|w| bg(w, CellColor::Ansi256(2))), "\x1b[42m");
        assert_eq!(emit(|w| bg(w, CellColor::Ansi256(15))), "\x1b[107m");
        assert_eq!(emit(|w| bg(w, CellColor::Ansi256(16))), "\x1b[48;5;16m");
    }

    // ── Attributes ──────────────────────────────────────────────

    #[test]
    fn attrs_empty_emits_nothing() {
        assert_eq!(emit(|w| attrs(w, Attr::empty())), "");
    }

    #[test]
    fn attrs_inverse() {
        assert_eq!(emit(|w| attrs(w, Attr::INVERSE)), "\x1b[7m");
    }

    // ── Modes ───────────────────────────────────────────────────

    #[test]
    fn sync_and_alt_screen() {
        assert_eq!(emit(begin_sync), "\x1b[?2026h");
        assert_eq!(emit(end_sync), "\x1b[?2026l");
        assert_eq!(emit(enter_alt_screen), "\x1b[?1049h");
        assert_eq!(emit(exit_alt_screen), "\x1b[?1049l");
    }

    #[test]
    fn sequences_compose_in_order() {
        let s = emit(|w| {
            reset(w)?;
            clear_screen(w)?;
            cursor_to(w, 0, 0)
        });
        assert_eq!(s, "\x1b[0m\x1b[2J\x1b[1;1H");
    }
}
