// SPDX-License-Identifier: MIT
//
// Key formatting.
//
// Renders a decoded key as text in the style of libtermkey's formatter,
// which with the Vim flags is exactly the `<...>` notation Neovim's
// `nvim_input` understands: `a`, `<C-a>`, `<M-x>`, `<S-Tab>`, `<F5>`.

use std::fmt::Write as _;

use bitflags::bitflags;

use crate::input::{KeyCode, KeyEvent, Modifiers};

bitflags! {
    /// Formatting options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyFormat: u8 {
        /// Spell modifiers out: `Ctrl-`, `Alt-`, `Shift-`.
        const LONG_MOD     = 0b0000_0001;
        /// Name Alt as Meta (`M-` / `Meta-`).
        const ALT_IS_META  = 0b0000_0010;
        /// Wrap named or modified keys in `<` `>`.
        const WRAP_BRACKET = 0b0000_0100;
        /// The combination Vim and Neovim expect.
        const VIM = Self::ALT_IS_META.bits() | Self::WRAP_BRACKET.bits();
    }
}

/// Canonical name of a non-character key.
#[must_use]
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    let name = match code {
        KeyCode::Backspace => "Backspace",
        KeyCode::Tab => "Tab",
        KeyCode::Enter => "Enter",
        KeyCode::Escape => "Escape",
        KeyCode::Char(' ') => "Space",
        KeyCode::Delete => "Delete",
        KeyCode::Insert => "Insert",
        KeyCode::Up => "Up",
        KeyCode::Down => "Down",
        KeyCode::Left => "Left",
        KeyCode::Right => "Right",
        KeyCode::Home => "Home",
        KeyCode::End => "End",
        KeyCode::PageUp => "PageUp",
        KeyCode::PageDown => "PageDown",
        KeyCode::Char(_) | KeyCode::F(_) => return None,
    };
    Some(name)
}

/// Format `key` according to `format`.
///
/// ```
/// use n_term::input::{KeyCode, KeyEvent, Modifiers};
/// use n_term::keys::{format_key, KeyFormat};
///
/// let key = KeyEvent::with(KeyCode::Char('w'), Modifiers::CTRL);
/// assert_eq!(format_key(&key, KeyFormat::VIM), "<C-w>");
/// assert_eq!(format_key(&key, KeyFormat::empty()), "C-w");
/// ```
#[must_use]
pub fn format_key(key: &KeyEvent, format: KeyFormat) -> String {
    let long = format.contains(KeyFormat::LONG_MOD);
    let mut out = String::new();

    let named = !matches!(key.code, KeyCode::Char(c) if c != ' ');
    let wrap = format.contains(KeyFormat::WRAP_BRACKET) && (named || !key.modifiers.is_empty());
    if wrap {
        out.push('<');
    }

    if key.modifiers.contains(Modifiers::ALT) {
        out.push_str(match (format.contains(KeyFormat::ALT_IS_META), long) {
            (true, true) => "Meta-",
            (true, false) => "M-",
            (false, true) => "Alt-",
            (false, false) => "A-",
        });
    }
    if key.modifiers.contains(Modifiers::CTRL) {
        out.push_str(if long { "Ctrl-" } else { "C-" });
    }
    if key.modifiers.contains(Modifiers::SHIFT) {
        out.push_str(if long { "Shift-" } else { "S-" });
    }

    match key.code {
        KeyCode::F(n) => {
            let _ = write!(out, "F{n}");
        }
        code => match key_name(code) {
            Some(name) => out.push_str(name),
            None => {
                if let KeyCode::Char(c) = code {
                    out.push(c);
                }
            }
        },
    }

    if wrap {
        out.push('>');
    }
    out
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vim(code: KeyCode, modifiers: Modifiers) -> String {
        format_key(&KeyEvent::with(code, modifiers), KeyFormat::VIM)
    }

    // ── Vim format ──────────────────────────────────────────────

    #[test]
    fn plain_characters_are_bare() {
        assert_eq!(vim(KeyCode::Char('a'), Modifiers::empty()), "a");
        assert_eq!(vim(KeyCode::Char('<'), Modifiers::empty()), "<");
        assert_eq!(vim(KeyCode::Char('中'), Modifiers::empty()), "中");
    }

    #[test]
    fn named_keys_are_bracketed() {
        assert_eq!(vim(KeyCode::Enter, Modifiers::empty()), "<Enter>");
        assert_eq!(vim(KeyCode::Escape, Modifiers::empty()), "<Escape>");
        assert_eq!(vim(KeyCode::Backspace, Modifiers::empty()), "<Backspace>");
        assert_eq!(vim(KeyCode::Char(' '), Modifiers::empty()), "<Space>");
        assert_eq!(vim(KeyCode::PageDown, Modifiers::empty()), "<PageDown>");
        assert_eq!(vim(KeyCode::F(12), Modifiers::empty()), "<F12>");
    }

    #[test]
    fn modifiers_in_alt_ctrl_shift_order() {
        assert_eq!(vim(KeyCode::Char('x'), Modifiers::CTRL), "<C-x>");
        assert_eq!(vim(KeyCode::Char('x'), Modifiers::ALT), "<M-x>");
        assert_eq!(vim(KeyCode::Tab, Modifiers::SHIFT), "<S-Tab>");
        assert_eq!(
            vim(KeyCode::Up, Modifiers::SHIFT | Modifiers::CTRL | Modifiers::ALT),
            "<M-C-S-Up>"
        );
    }

    // ── Other formats ───────────────────────────────────────────

    #[test]
    fn unbracketed_short_format() {
        let key = KeyEvent::with(KeyCode::Char('q'), Modifiers::ALT);
        assert_eq!(format_key(&key, KeyFormat::empty()), "A-q");
        assert_eq!(
            format_key(&KeyEvent::plain(KeyCode::Home), KeyFormat::empty()),
            "Home"
        );
    }

    #[test]
    fn long_modifier_names() {
        let key = KeyEvent::with(KeyCode::Left, Modifiers::ALT | Modifiers::CTRL);
        assert_eq!(
            format_key(&key, KeyFormat::VIM | KeyFormat::LONG_MOD),
            "<Meta-Ctrl-Left>"
        );
        assert_eq!(format_key(&key, KeyFormat::LONG_MOD), "Alt-Ctrl-Left");
    }

    #[test]
    fn key_names_cover_named_keys_only() {
        assert_eq!(key_name(KeyCode::Insert), Some("Insert"));
        assert_eq!(key_name(KeyCode::Char('z')), None);
        assert_eq!(key_name(KeyCode::F(3)), None);
    }
}
