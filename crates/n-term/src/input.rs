// SPDX-License-Identifier: MIT
//
// Terminal key parser.
//
// Turns raw tty bytes into key events:
//
// - Legacy CSI sequences (arrows, function keys, editing keys, xterm
//   modifier parameters)
// - SS3 sequences (F1-F4 and application-mode arrows)
// - Alt+key (ESC followed by another key)
// - Control characters
// - UTF-8 multi-byte characters
//
// Escape sequences can span several `read()` calls, so the parser keeps the
// unconsumed tail in a small buffer. A lone ESC stays pending until more
// bytes arrive or the caller gives up waiting and calls [`Parser::flush`].
//
// Numbers are parsed straight from `&[u8]`; nothing here allocates a
// `String`.

use bitflags::bitflags;

// ─── Key Types ──────────────────────────────────────────────────────────────

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// A key with no modifiers.
    #[inline]
    #[must_use]
    pub const fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
        }
    }

    /// A key with `modifiers`.
    #[inline]
    #[must_use]
    pub const fn with(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }
}

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// A Unicode character.
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// F1 through F20.
    F(u8),
}

bitflags! {
    /// Keyboard modifiers, in xterm's `param = 1 + bitmask` layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
    }
}

bitflags! {
    /// Canonicalization applied while decoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CanonFlags: u8 {
        /// Decode DEL (0x7F) as Backspace rather than Delete.
        const DELBS = 0b0000_0001;
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

/// Incremental key parser.
///
/// ```
/// use n_term::input::{CanonFlags, KeyCode, Parser};
///
/// let mut p = Parser::new(CanonFlags::DELBS);
/// let keys = p.advance(b"a\x1b[A\x7f");
/// let codes: Vec<_> = keys.iter().map(|k| k.code).collect();
/// assert_eq!(codes, [KeyCode::Char('a'), KeyCode::Up, KeyCode::Backspace]);
/// ```
pub struct Parser {
    buf: Vec<u8>,
    canon: CanonFlags,
}

impl Parser {
    #[must_use]
    pub fn new(canon: CanonFlags) -> Self {
        Self {
            buf: Vec::with_capacity(64),
            canon,
        }
    }

    /// Feed bytes and return every key that is now complete.
    pub fn advance(&mut self, data: &[u8]) -> Vec<KeyEvent> {
        self.buf.extend_from_slice(data);
        let mut keys = Vec::new();
        let mut pos = 0;

        while pos < self.buf.len() {
            match try_parse(&self.buf[pos..], self.canon) {
                Parsed::Key(key, consumed) => {
                    keys.push(key);
                    pos += consumed;
                }
                Parsed::Incomplete => break,
                Parsed::Skip(n) => pos += n,
            }
        }

        if pos > 0 {
            self.buf.drain(..pos);
        }
        keys
    }

    /// Whether bytes are waiting for the rest of a sequence.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Give up on the pending bytes and decode each one as a key on its own.
    /// A lone ESC becomes Escape.
    pub fn flush(&mut self) -> Vec<KeyEvent> {
        let keys = self
            .buf
            .iter()
            .filter_map(|&b| match single_byte(b, self.canon) {
                Parsed::Key(key, _) => Some(key),
                _ if b == 0x1B => Some(KeyEvent::plain(KeyCode::Escape)),
                _ => None,
            })
            .collect();
        self.buf.clear();
        keys
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(CanonFlags::empty())
    }
}

// ─── Stateless Parsing ──────────────────────────────────────────────────────

enum Parsed {
    Key(KeyEvent, usize),
    Incomplete,
    Skip(usize),
}

fn try_parse(buf: &[u8], canon: CanonFlags) -> Parsed {
    match buf.first() {
        None => Parsed::Skip(0),
        Some(0x1B) => parse_escape(buf, canon),
        Some(0xC0..=0xFF) => parse_utf8(buf),
        Some(&b) => single_byte(b, canon),
    }
}

/// Decode one byte that is a key by itself (ASCII and control characters).
fn single_byte(b: u8, canon: CanonFlags) -> Parsed {
    let key = match b {
        0x00 => KeyEvent::with(KeyCode::Char(' '), Modifiers::CTRL),
        // Only Tab and Enter have names; 0x08 and 0x0A stay <C-h> and <C-j>.
        0x09 => KeyEvent::plain(KeyCode::Tab),
        0x0D => KeyEvent::plain(KeyCode::Enter),
        0x01..=0x1A => KeyEvent::with(KeyCode::Char(char::from(b + b'a' - 1)), Modifiers::CTRL),
        0x1C..=0x1F => KeyEvent::with(KeyCode::Char(char::from(b + b'@')), Modifiers::CTRL),
        0x7F if canon.contains(CanonFlags::DELBS) => KeyEvent::plain(KeyCode::Backspace),
        0x7F => KeyEvent::plain(KeyCode::Delete),
        0x20..=0x7E => KeyEvent::plain(KeyCode::Char(char::from(b))),
        _ => return Parsed::Skip(1),
    };
    Parsed::Key(key, 1)
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8], canon: CanonFlags) -> Parsed {
    if buf.len() < 2 {
        return Parsed::Incomplete;
    }

    match buf[1] {
        b'[' => parse_csi(buf),
        b'O' => parse_ss3(buf),
        0x1B => Parsed::Key(KeyEvent::with(KeyCode::Escape, Modifiers::ALT), 2),
        // Alt + whatever the next key is.
        _ => match try_parse(&buf[1..], canon) {
            Parsed::Key(key, n) => Parsed::Key(
                KeyEvent::with(key.code, key.modifiers | Modifiers::ALT),
                n + 1,
            ),
            Parsed::Incomplete => Parsed::Incomplete,
            Parsed::Skip(_) => Parsed::Key(KeyEvent::plain(KeyCode::Escape), 1),
        },
    }
}

// ── CSI ─────────────────────────────────────────────────────────────────────

fn parse_csi(buf: &[u8]) -> Parsed {
    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    // Parameter bytes 0x30..=0x3F, intermediates 0x20..=0x2F, final 0x40..=0x7E.
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            return Parsed::Skip(end + 1);
        }
        end += 1;
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let params = parse_csi_params(&buf[2..end]);
    let consumed = end + 1;
    let modifiers = params.get(1).map_or(Modifiers::empty(), |&p| decode_modifiers(p));

    let code = if final_byte == b'~' {
        match params.first().copied().unwrap_or(0) {
            1 | 7 => KeyCode::Home,
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            4 | 8 => KeyCode::End,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            n @ 11..=15 => fkey(n - 10),
            n @ 17..=21 => fkey(n - 11),
            n @ 23..=26 => fkey(n - 12),
            n @ 28..=29 => fkey(n - 13),
            n @ 31..=34 => fkey(n - 14),
            _ => return Parsed::Skip(consumed),
        }
    } else {
        match final_byte {
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'R' => KeyCode::F(3),
            b'S' => KeyCode::F(4),
            b'Z' => {
                return Parsed::Key(KeyEvent::with(KeyCode::Tab, Modifiers::SHIFT), consumed);
            }
            _ => return Parsed::Skip(consumed),
        }
    };

    Parsed::Key(KeyEvent::with(code, modifiers), consumed)
}

// ── SS3 ─────────────────────────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    let code = match buf[2] {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'M' => KeyCode::Enter,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return Parsed::Skip(3),
    };
    Parsed::Key(KeyEvent::plain(code), 3)
}

// ── UTF-8 ───────────────────────────────────────────────────────────────────

fn parse_utf8(buf: &[u8]) -> Parsed {
    let expected = utf8_char_len(buf[0]);
    if expected == 0 {
        return Parsed::Skip(1);
    }
    if buf.len() < expected {
        return Parsed::Incomplete;
    }

    std::str::from_utf8(&buf[..expected])
        .ok()
        .and_then(|s| s.chars().next())
        .map_or(Parsed::Skip(1), |ch| {
            Parsed::Key(KeyEvent::plain(KeyCode::Char(ch)), expected)
        })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

#[allow(clippy::cast_possible_truncation)]
const fn fkey(n: u16) -> KeyCode {
    KeyCode::F(n as u8)
}

/// Semicolon-separated CSI parameters. Colon sub-parameters are ignored.
fn parse_csi_params(raw: &[u8]) -> Vec<u16> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            field
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .fold(0u16, |acc, &b| {
                    acc.saturating_mul(10).saturating_add(u16::from(b - b'0'))
                })
        })
        .collect()
}

/// xterm modifier parameter: `1 + bitmask`. 0 and 1 mean none.
#[allow(clippy::cast_possible_truncation)]
const fn decode_modifiers(param: u16) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_truncate(val as u8)
}

/// UTF-8 length from the lead byte, 0 if it cannot start a character.
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(bytes: &[u8]) -> Vec<KeyEvent> {
        Parser::new(CanonFlags::DELBS).advance(bytes)
    }

    fn one(bytes: &[u8]) -> KeyEvent {
        let keys = parse(bytes);
        assert_eq!(keys.len(), 1, "expected one key from {bytes:?}, got {keys:?}");
        keys[0]
    }

    const fn plain(code: KeyCode) -> KeyEvent {
        KeyEvent::plain(code)
    }

    // ── Plain & control ─────────────────────────────────────────

    #[test]
    fn printable_ascii() {
        assert_eq!(one(b"a"), plain(KeyCode::Char('a')));
        assert_eq!(one(b"<"), plain(KeyCode::Char('<')));
        assert_eq!(one(b" "), plain(KeyCode::Char(' ')));
    }

    #[test]
    fn control_characters() {
        assert_eq!(one(b"\x01"), KeyEvent::with(KeyCode::Char('a'), Modifiers::CTRL));
        assert_eq!(one(b"\x17"), KeyEvent::with(KeyCode::Char('w'), Modifiers::CTRL));
        assert_eq!(one(b"\x00"), KeyEvent::with(KeyCode::Char(' '), Modifiers::CTRL));
        assert_eq!(one(b"\x1d"), KeyEvent::with(KeyCode::Char(']'), Modifiers::CTRL));
    }

    #[test]
    fn named_control_bytes() {
        assert_eq!(one(b"\t"), plain(KeyCode::Tab));
        assert_eq!(one(b"\r"), plain(KeyCode::Enter));
    }

    #[test]
    fn linefeed_and_backspace_bytes_are_ctrl_letters() {
        let ctrl = |c| KeyEvent::with(KeyCode::Char(c), Modifiers::CTRL);
        assert_eq!(one(b"\n"), ctrl('j'));
        assert_eq!(one(b"\x08"), ctrl('h'));
    }

    #[test]
    fn del_canonicalization() {
        assert_eq!(one(b"\x7f"), plain(KeyCode::Backspace));
        let raw = Parser::new(CanonFlags::empty()).advance(b"\x7f");
        assert_eq!(raw, vec![plain(KeyCode::Delete)]);
    }

    #[test]
    fn utf8_characters() {
        assert_eq!(one("é".as_bytes()), plain(KeyCode::Char('é')));
        assert_eq!(one("中".as_bytes()), plain(KeyCode::Char('中')));
        assert_eq!(one("🦀".as_bytes()), plain(KeyCode::Char('🦀')));
    }

    // ── Escape sequences ────────────────────────────────────────

    #[test]
    fn csi_arrows_and_modifiers() {
        assert_eq!(one(b"\x1b[A"), plain(KeyCode::Up));
        assert_eq!(one(b"\x1b[D"), plain(KeyCode::Left));
        assert_eq!(
            one(b"\x1b[1;5C"),
            KeyEvent::with(KeyCode::Right, Modifiers::CTRL)
        );
        assert_eq!(
            one(b"\x1b[1;4B"),
            KeyEvent::with(KeyCode::Down, Modifiers::SHIFT | Modifiers::ALT)
        );
    }

    #[test]
    fn csi_tilde_keys() {
        assert_eq!(one(b"\x1b[2~"), plain(KeyCode::Insert));
        assert_eq!(one(b"\x1b[3~"), plain(KeyCode::Delete));
        assert_eq!(one(b"\x1b[5~"), plain(KeyCode::PageUp));
        assert_eq!(one(b"\x1b[6~"), plain(KeyCode::PageDown));
        assert_eq!(one(b"\x1b[15~"), plain(KeyCode::F(5)));
        assert_eq!(one(b"\x1b[24~"), plain(KeyCode::F(12)));
        assert_eq!(one(b"\x1b[34~"), plain(KeyCode::F(20)));
        assert_eq!(
            one(b"\x1b[3;2~"),
            KeyEvent::with(KeyCode::Delete, Modifiers::SHIFT)
        );
    }

    #[test]
    fn back_tab() {
        assert_eq!(one(b"\x1b[Z"), KeyEvent::with(KeyCode::Tab, Modifiers::SHIFT));
    }

    #[test]
    fn ss3_keys() {
        assert_eq!(one(b"\x1bOP"), plain(KeyCode::F(1)));
        assert_eq!(one(b"\x1bOA"), plain(KeyCode::Up));
        assert_eq!(one(b"\x1bOM"), plain(KeyCode::Enter));
    }

    #[test]
    fn alt_prefix() {
        assert_eq!(one(b"\x1bx"), KeyEvent::with(KeyCode::Char('x'), Modifiers::ALT));
        assert_eq!(
            one(b"\x1b\x01"),
            KeyEvent::with(KeyCode::Char('a'), Modifiers::ALT | Modifiers::CTRL)
        );
        assert_eq!(one(b"\x1b\x1b"), KeyEvent::with(KeyCode::Escape, Modifiers::ALT));
        assert_eq!(
            one("\x1bé".as_bytes()),
            KeyEvent::with(KeyCode::Char('é'), Modifiers::ALT)
        );
    }

    #[test]
    fn unknown_csi_is_skipped() {
        assert_eq!(parse(b"\x1b[99~a"), vec![plain(KeyCode::Char('a'))]);
        assert_eq!(parse(b"\x1b[5na"), vec![plain(KeyCode::Char('a'))]);
    }

    // ── Buffering ───────────────────────────────────────────────

    #[test]
    fn lone_escape_waits_for_flush() {
        let mut p = Parser::new(CanonFlags::DELBS);
        assert!(p.advance(b"\x1b").is_empty());
        assert!(p.has_pending());
        assert_eq!(p.flush(), vec![plain(KeyCode::Escape)]);
        assert!(!p.has_pending());
    }

    #[test]
    fn split_sequence_resumes() {
        let mut p = Parser::new(CanonFlags::DELBS);
        assert!(p.advance(b"\x1b[1;").is_empty());
        assert_eq!(
            p.advance(b"5A"),
            vec![KeyEvent::with(KeyCode::Up, Modifiers::CTRL)]
        );
    }

    #[test]
    fn split_utf8_resumes() {
        let mut p = Parser::new(CanonFlags::DELBS);
        let bytes = "中".as_bytes();
        assert!(p.advance(&bytes[..1]).is_empty());
        assert_eq!(p.advance(&bytes[1..]), vec![plain(KeyCode::Char('中'))]);
    }

    #[test]
    fn flush_of_partial_csi_yields_escape_and_bracket() {
        let mut p = Parser::new(CanonFlags::DELBS);
        assert!(p.advance(b"\x1b[").is_empty());
        assert_eq!(
            p.flush(),
            vec![plain(KeyCode::Escape), plain(KeyCode::Char('['))]
        );
    }

    #[test]
    fn several_keys_in_one_read() {
        let codes: Vec<_> = parse(b"ab\x1b[Bc").into_iter().map(|k| k.code).collect();
        assert_eq!(
            codes,
            [
                KeyCode::Char('a'),
                KeyCode::Char('b'),
                KeyCode::Down,
                KeyCode::Char('c')
            ]
        );
    }

    #[test]
    fn invalid_utf8_lead_is_skipped() {
        assert_eq!(parse(b"\xffz"), vec![plain(KeyCode::Char('z'))]);
    }
}
