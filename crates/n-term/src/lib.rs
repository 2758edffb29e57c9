// SPDX-License-Identifier: MIT
//
// n-term: the terminal side of n-client.
//
// Raw mode and the alternate screen, a cell surface that renders only what
// changed, and a key decoder that turns tty bytes into the `<C-x>` key
// notation Neovim accepts. Everything talks to the terminal directly with
// ANSI escape sequences and termios; there is no TUI framework underneath.
//
// The surface follows curses window semantics (see `surface`), and the
// decoder is interruptible through process signals and a wake pipe (see
// `decoder` and `signal`).

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod color;
pub mod diff;
pub mod input;
pub mod keys;
pub mod output;
pub mod surface;
pub mod terminal;

#[cfg(unix)]
pub mod decoder;
#[cfg(unix)]
pub mod signal;
