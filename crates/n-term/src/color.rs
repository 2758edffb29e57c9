// SPDX-License-Identifier: MIT
//
// Cell colors.
//
// The host describes highlight colors as cterm palette indices, with the
// "unset" sentinel -1 meaning "use the terminal's own default". That maps
// directly onto the two shapes a cell carries: the terminal default color
// or a 256-color palette index.

use std::fmt;

/// Compact color stored in every cell and turned into SGR codes on output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellColor {
    /// ANSI 256-color palette index.
    Ansi256(u8),
    /// Terminal default color.
    #[default]
    Default,
}

impl CellColor {
    /// Resolve a cterm color number.
    ///
    /// Negative values (the host's "unset" sentinel) and anything outside
    /// the 256-color palette resolve to [`CellColor::Default`].
    #[must_use]
    pub fn from_cterm(value: i64) -> Self {
        u8::try_from(value).map_or(Self::Default, Self::Ansi256)
    }

    /// Whether this is the terminal default color.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }
}

impl fmt::Debug for CellColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ansi256(idx) => write!(f, "ansi({idx})"),
            Self::Default => write!(f, "default"),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_sentinel_is_default() {
        assert_eq!(CellColor::from_cterm(-1), CellColor::Default);
    }

    #[test]
    fn palette_indices_map_through() {
        assert_eq!(CellColor::from_cterm(0), CellColor::Ansi256(0));
        assert_eq!(CellColor::from_cterm(255), CellColor::Ansi256(255));
    }

    #[test]
    fn out_of_palette_is_default() {
        assert_eq!(CellColor::from_cterm(256), CellColor::Default);
        assert_eq!(CellColor::from_cterm(i64::MIN), CellColor::Default);
    }

    #[test]
    fn default_is_default() {
        assert!(CellColor::default().is_default());
        assert!(!CellColor::Ansi256(3).is_default());
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", CellColor::Ansi256(7)), "ansi(7)");
        assert_eq!(format!("{:?}", CellColor::Default), "default");
    }
}
