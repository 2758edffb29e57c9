// SPDX-License-Identifier: MIT
//
// Cell: one character position of the surface.
//
// A cell records what was drawn at a position and how: the character, the
// colors its attribute pair resolved to *at draw time*, the attribute flags,
// and the pair id itself. Keeping the resolved colors (rather than only the
// id) is what makes pair redefinition non-retroactive: cells drawn before a
// redefinition keep their old colors until they are drawn again.
//
// Wide characters occupy two columns. The first cell holds the codepoint,
// the second is a continuation cell (ch = 0) that only carries style.
// A zero-width combining mark rides along with the base character it
// follows; one mark per cell.

use crate::color::CellColor;

// ─── Attributes ──────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Rendering attributes beyond color.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 7: swap foreground and background.
        const INVERSE = 1 << 0;
    }
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// A single surface cell.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Unicode codepoint; `0` marks a wide-character continuation.
    pub ch: u32,
    /// Combining mark drawn over `ch`, `0` for none.
    pub mark: u32,
    /// Foreground color resolved from the pair at draw time.
    pub fg: CellColor,
    /// Background color resolved from the pair at draw time.
    pub bg: CellColor,
    /// Attribute flags (reverse video).
    pub attrs: Attr,
    /// Attribute pair id the cell was drawn with (0 = default pair).
    pub pair: u32,
}

const CONTINUATION: u32 = 0;
const NO_MARK: u32 = 0;
const SPACE: u32 = b' ' as u32;

impl Cell {
    /// A blank cell: space, default colors, pair 0.
    pub const EMPTY: Self = Self {
        ch: SPACE,
        mark: NO_MARK,
        fg: CellColor::Default,
        bg: CellColor::Default,
        attrs: Attr::empty(),
        pair: 0,
    };

    /// A default-styled cell holding `ch`.
    #[inline]
    #[must_use]
    pub const fn new(ch: char) -> Self {
        Self {
            ch: ch as u32,
            ..Self::EMPTY
        }
    }

    /// A fully styled cell.
    #[inline]
    #[must_use]
    pub const fn styled(ch: char, fg: CellColor, bg: CellColor, attrs: Attr, pair: u32) -> Self {
        Self {
            ch: ch as u32,
            mark: NO_MARK,
            fg,
            bg,
            attrs,
            pair,
        }
    }

    /// The second column of a wide character, carrying its style.
    #[inline]
    #[must_use]
    pub const fn continuation(owner: &Self) -> Self {
        Self {
            ch: CONTINUATION,
            mark: NO_MARK,
            ..*owner
        }
    }

    /// This cell with `mark` combined over its character. A cell that
    /// already carries a mark keeps it.
    #[inline]
    #[must_use]
    pub const fn with_mark(self, mark: char) -> Self {
        if self.mark != NO_MARK || self.ch == CONTINUATION {
            return self;
        }
        Self {
            mark: mark as u32,
            ..self
        }
    }

    /// The combining mark, if any.
    #[inline]
    #[must_use]
    pub const fn combining(self) -> Option<char> {
        if self.mark == NO_MARK {
            None
        } else {
            char::from_u32(self.mark)
        }
    }

    /// Whether this is a continuation cell.
    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.ch == CONTINUATION
    }

    /// The character in this cell, `None` for continuation cells.
    #[inline]
    #[must_use]
    pub const fn character(self) -> Option<char> {
        if self.ch == CONTINUATION {
            None
        } else {
            char::from_u32(self.ch)
        }
    }

    /// Whether this cell is drawn in reverse video.
    #[inline]
    #[must_use]
    pub const fn is_reversed(self) -> bool {
        self.attrs.contains(Attr::INVERSE)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.character() {
            Some(ch) => write!(f, "Cell({ch:?}")?,
            None => write!(f, "Cell(<cont>")?,
        }
        if let Some(mark) = self.combining() {
            write!(f, " + {mark:?}")?;
        }
        write!(f, ", pair {}, {:?}/{:?}", self.pair, self.fg, self.bg)?;
        if self.is_reversed() {
            write!(f, ", reverse")?;
        }
        write!(f, ")")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_is_space_with_default_pair() {
        let c = Cell::EMPTY;
        assert_eq!(c.character(), Some(' '));
        assert_eq!(c.pair, 0);
        assert!(c.fg.is_default());
        assert!(!c.is_reversed());
    }

    #[test]
    fn default_matches_empty() {
        assert_eq!(Cell::default(), Cell::EMPTY);
    }

    #[test]
    fn styled_keeps_everything() {
        let c = Cell::styled('x', CellColor::Ansi256(1), CellColor::Ansi256(2), Attr::INVERSE, 7);
        assert_eq!(c.character(), Some('x'));
        assert_eq!(c.fg, CellColor::Ansi256(1));
        assert_eq!(c.bg, CellColor::Ansi256(2));
        assert_eq!(c.pair, 7);
        assert!(c.is_reversed());
    }

    #[test]
    fn continuation_inherits_style() {
        let owner = Cell::styled('中', CellColor::Ansi256(3), CellColor::Default, Attr::empty(), 4);
        let cont = Cell::continuation(&owner);
        assert!(cont.is_continuation());
        assert_eq!(cont.character(), None);
        assert_eq!(cont.pair, 4);
        assert_eq!(cont.fg, CellColor::Ansi256(3));
    }

    #[test]
    fn first_mark_sticks() {
        let c = Cell::new('e').with_mark('\u{301}').with_mark('\u{308}');
        assert_eq!(c.character(), Some('e'));
        assert_eq!(c.combining(), Some('\u{301}'));
        assert_eq!(Cell::continuation(&c).combining(), None);
        assert_eq!(Cell::EMPTY.combining(), None);
    }

    #[test]
    fn debug_mentions_reverse() {
        let c = Cell::styled('a', CellColor::Default, CellColor::Default, Attr::INVERSE, 5);
        let s = format!("{c:?}");
        assert!(s.contains("'a'"));
        assert!(s.contains("pair 5"));
        assert!(s.contains("reverse"));
    }
}
