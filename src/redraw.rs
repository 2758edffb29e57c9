// SPDX-License-Identifier: MIT
//
// Redraw events: typed views of Neovim's `redraw` notification.
//
// A `redraw` notification carries a list of records, each
// `[subtype, instance, instance, ...]`. The subtypes the client renders
// form a closed set (`Subtype`); each has a struct parsed from one
// instance. Anything outside the set is skipped by the caller.
//
// Shapes (ext_linegrid):
//
//   grid_line         [grid, row, col_start, cells]   cell = [text, hl_id?, repeat?]
//   hl_attr_define    [id, rgb_attrs, cterm_attrs, info]
//   grid_scroll       [grid, top, bot, left, right, rows, cols]
//   grid_cursor_goto  [grid, row, col]
//   grid_clear        [grid]
//   flush             []

use rmpv::Value;

use crate::error::ProtocolError;

/// Cterm color "unset": use the terminal's default.
pub const UNSET_COLOR: i64 = -1;

// ─── Subtype ─────────────────────────────────────────────────────────────────

/// The redraw events the client handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtype {
    GridLine,
    HlAttrDefine,
    GridScroll,
    GridCursorGoto,
    GridClear,
    Flush,
}

impl Subtype {
    /// Look up a wire name. `None` for events the client ignores.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "grid_line" => Self::GridLine,
            "hl_attr_define" => Self::HlAttrDefine,
            "grid_scroll" => Self::GridScroll,
            "grid_cursor_goto" => Self::GridCursorGoto,
            "grid_clear" => Self::GridClear,
            "flush" => Self::Flush,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GridLine => "grid_line",
            Self::HlAttrDefine => "hl_attr_define",
            Self::GridScroll => "grid_scroll",
            Self::GridCursorGoto => "grid_cursor_goto",
            Self::GridClear => "grid_clear",
            Self::Flush => "flush",
        }
    }

    /// Whether handling this event moves the surface cursor as a side
    /// effect, so the cursor must be saved before and restored after.
    #[must_use]
    pub const fn saves_cursor(self) -> bool {
        matches!(self, Self::GridLine | Self::GridScroll)
    }
}

// ─── Instances ───────────────────────────────────────────────────────────────

/// `grid_line`: a run of cells on one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLine {
    pub grid: i64,
    pub row: u16,
    pub col_start: u16,
    pub cells: Vec<CellRun>,
}

/// One `grid_line` cell entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRun {
    pub text: String,
    /// Omitted when it equals the previous cell's.
    pub hl_id: Option<u32>,
    pub repeat: u32,
}

impl CellRun {
    /// The text as drawn: `text` repeated `repeat` times.
    #[must_use]
    pub fn expanded(&self) -> String {
        self.text.repeat(self.repeat as usize)
    }
}

/// `hl_attr_define`, reduced to what a cterm surface can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlAttrDefine {
    pub id: u32,
    pub fg: i64,
    pub bg: i64,
    pub reverse: bool,
}

/// `grid_scroll`: move `[top, bot) x [left, right)` up by `rows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridScroll {
    pub grid: i64,
    pub top: u16,
    pub bot: u16,
    pub left: u16,
    pub right: u16,
    pub rows: i64,
    pub cols: i64,
}

/// `grid_cursor_goto`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorGoto {
    pub grid: i64,
    pub row: u16,
    pub col: u16,
}

/// `grid_clear`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridClear {
    pub grid: i64,
}

impl GridLine {
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] if `inst` is not a `grid_line` instance.
    pub fn parse(inst: &Value) -> Result<Self, ProtocolError> {
        let p = Fields::new(Subtype::GridLine, inst, 4)?;
        let cells = p
            .array(3, "cells")?
            .iter()
            .map(CellRun::parse)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            grid: p.int(0, "grid")?,
            row: p.coord(1, "row")?,
            col_start: p.coord(2, "col_start")?,
            cells,
        })
    }
}

impl CellRun {
    fn parse(cell: &Value) -> Result<Self, ProtocolError> {
        let p = Fields::new(Subtype::GridLine, cell, 1)?;
        let text = match &p.items[0] {
            Value::String(s) => s.as_str().unwrap_or_default().to_owned(),
            _ => return Err(p.malformed("cell text is not a string")),
        };
        let hl_id = match p.items.get(1) {
            Some(v) => Some(
                v.as_u64()
                    .and_then(|id| u32::try_from(id).ok())
                    .ok_or_else(|| p.malformed("bad hl_id"))?,
            ),
            None => None,
        };
        let repeat = match p.items.get(2) {
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| p.malformed("bad repeat"))?,
            None => 1,
        };
        Ok(Self {
            text,
            hl_id,
            repeat,
        })
    }
}

impl HlAttrDefine {
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] if `inst` is not an `hl_attr_define`
    /// instance.
    pub fn parse(inst: &Value) -> Result<Self, ProtocolError> {
        let p = Fields::new(Subtype::HlAttrDefine, inst, 3)?;
        let id = p.int(0, "id")?;
        let Value::Map(cterm) = &p.items[2] else {
            return Err(p.malformed("cterm_attrs is not a map"));
        };
        let lookup = |key: &str| {
            cterm
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v)
        };
        let color = |key: &str| lookup(key).and_then(Value::as_i64).unwrap_or(UNSET_COLOR);

        Ok(Self {
            id: u32::try_from(id).map_err(|_| p.malformed("bad id"))?,
            fg: color("foreground"),
            bg: color("background"),
            // Boolean attributes are only sent when true.
            reverse: lookup("reverse").is_some(),
        })
    }
}

impl GridScroll {
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] if `inst` is not a `grid_scroll`
    /// instance.
    pub fn parse(inst: &Value) -> Result<Self, ProtocolError> {
        let p = Fields::new(Subtype::GridScroll, inst, 7)?;
        Ok(Self {
            grid: p.int(0, "grid")?,
            top: p.coord(1, "top")?,
            bot: p.coord(2, "bot")?,
            left: p.coord(3, "left")?,
            right: p.coord(4, "right")?,
            rows: p.int(5, "rows")?,
            cols: p.int(6, "cols")?,
        })
    }
}

impl CursorGoto {
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] if `inst` is not a `grid_cursor_goto`
    /// instance.
    pub fn parse(inst: &Value) -> Result<Self, ProtocolError> {
        let p = Fields::new(Subtype::GridCursorGoto, inst, 3)?;
        Ok(Self {
            grid: p.int(0, "grid")?,
            row: p.coord(1, "row")?,
            col: p.coord(2, "col")?,
        })
    }
}

impl GridClear {
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] if `inst` is not a `grid_clear`
    /// instance.
    pub fn parse(inst: &Value) -> Result<Self, ProtocolError> {
        let p = Fields::new(Subtype::GridClear, inst, 1)?;
        Ok(Self {
            grid: p.int(0, "grid")?,
        })
    }
}

// ─── Field Access ────────────────────────────────────────────────────────────

/// Positional access to an instance array, with errors naming the event.
struct Fields<'a> {
    event: Subtype,
    items: &'a [Value],
}

impl<'a> Fields<'a> {
    fn new(event: Subtype, inst: &'a Value, min_len: usize) -> Result<Self, ProtocolError> {
        let fields = Self { event, items: &[] };
        match inst.as_array() {
            Some(items) if items.len() >= min_len => Ok(Self { event, items }),
            Some(items) => Err(fields.malformed(format!(
                "expected {min_len} fields, got {}",
                items.len()
            ))),
            None => Err(fields.malformed("not an array")),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::Malformed {
            event: self.event.name(),
            reason: reason.into(),
        }
    }

    fn int(&self, idx: usize, what: &str) -> Result<i64, ProtocolError> {
        self.items[idx]
            .as_i64()
            .ok_or_else(|| self.malformed(format!("{what} is not an integer")))
    }

    fn coord(&self, idx: usize, what: &str) -> Result<u16, ProtocolError> {
        u16::try_from(self.int(idx, what)?)
            .map_err(|_| self.malformed(format!("{what} is out of range")))
    }

    fn array(&self, idx: usize, what: &str) -> Result<&'a [Value], ProtocolError> {
        self.items[idx]
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| self.malformed(format!("{what} is not an array")))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
