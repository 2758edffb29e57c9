// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Key decoder: a blocking "wait for the next key" over a tty fd.
//
// `wait_key` polls two descriptors: the input fd and the read end of a
// private wake pipe. Bytes from the input go through the `Parser`; a
// readable wake pipe (written by the signal handlers) ends the wait with
// an interrupted result, so an interruption that arrives while the loop
// is between waits is still seen by the next one.
//
// A lone ESC stays in the parser until ESC_TIMEOUT passes with no further
// input, then it is delivered as the Escape key.
//
// Results follow the C convention the key loop was designed around: on
// `WaitResult::Error` the reason is in the thread's OS error slot
// (`errno`), with EINTR meaning "interrupted".

use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use bitflags::bitflags;

use crate::input::{CanonFlags, KeyEvent, Parser};
use crate::keys::{self, KeyFormat};
use crate::signal::{self, Pending};

/// How long a lone ESC waits for the rest of a sequence.
pub const ESC_TIMEOUT_MS: libc::c_int = 50;

const READ_BUF_SIZE: usize = 4096;

bitflags! {
    /// Decoder behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DecoderFlags: u8 {
        /// Report interrupted waits as `WaitResult::Error` with errno EINTR
        /// instead of quietly waiting again.
        const EINTR = 0b0000_0001;
    }
}

/// Outcome of one [`KeySource::wait_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// A decoded key.
    Key(KeyEvent),
    /// The input reached end of file.
    Eof,
    /// The wait failed or was interrupted; see [`KeySource::errno`].
    Error,
}

/// The decoder boundary the input engine is written against.
pub trait KeySource {
    /// Install the resize and forced-interrupt handlers for this thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the handlers cannot be installed.
    fn install_signals(&mut self) -> io::Result<()>;

    /// Block until a key arrives, input ends, or the wait is interrupted.
    fn wait_key(&mut self) -> WaitResult;

    /// Signals recorded since the previous call.
    fn take_signals(&mut self) -> Pending;

    /// The OS error slot.
    fn errno(&self) -> i32;

    /// Overwrite the OS error slot.
    fn set_errno(&self, value: i32);

    /// Release every resource. Idempotent.
    fn stop(&mut self);

    /// Render `key` in the given format.
    fn format_key(&self, key: &KeyEvent, format: KeyFormat) -> String {
        keys::format_key(key, format)
    }
}

// ─── Waker ───────────────────────────────────────────────────────────────────

/// Interrupts a decoder's current or next wait from any thread, the way a
/// signal handler does.
#[cfg(test)]
#[derive(Clone)]
pub struct Waker {
    fd: Arc<OwnedFd>,
}

#[cfg(test)]
impl Waker {
    /// Wake the decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe write fails for a reason other than
    /// being full (a full pipe already guarantees a wakeup).
    pub fn wake(&self) -> io::Result<()> {
        let byte = [1u8];
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                byte.as_ptr().cast::<libc::c_void>(),
                1,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }
        Ok(())
    }
}

// ─── KeyDecoder ──────────────────────────────────────────────────────────────

/// Blocking key decoder over a raw fd.
pub struct KeyDecoder {
    input: RawFd,
    wake_read: Option<OwnedFd>,
    wake_write: Option<Arc<OwnedFd>>,
    parser: Parser,
    flags: DecoderFlags,
    queue: VecDeque<KeyEvent>,
    eof: bool,
    signals_installed: bool,
}

impl KeyDecoder {
    /// Decode keys from `input`. The fd is borrowed and never closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the wake pipe cannot be created.
    pub fn new(input: RawFd, flags: DecoderFlags, canon: CanonFlags) -> io::Result<Self> {
        let (read, write) = wake_pipe()?;
        Ok(Self {
            input,
            wake_read: Some(read),
            wake_write: Some(Arc::new(write)),
            parser: Parser::new(canon),
            flags,
            queue: VecDeque::new(),
            eof: false,
            signals_installed: false,
        })
    }

    /// Decode keys from stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if the wake pipe cannot be created.
    pub fn stdin(flags: DecoderFlags, canon: CanonFlags) -> io::Result<Self> {
        Self::new(libc::STDIN_FILENO, flags, canon)
    }

    /// A handle that interrupts this decoder's waits.
    ///
    /// Returns `None` once the decoder is stopped.
    #[cfg(test)]
    #[must_use]
    pub fn waker(&self) -> Option<Waker> {
        self.wake_write.as_ref().map(|fd| Waker { fd: Arc::clone(fd) })
    }

    /// Whether [`stop`](KeySource::stop) has run.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.wake_read.is_none()
    }

    fn drain_wake(&self) {
        let Some(fd) = &self.wake_read else {
            return;
        };
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                break;
            }
        }
    }

    /// Report an interruption, or swallow it when EINTR is not wanted.
    fn interrupted(&self) -> Option<WaitResult> {
        if self.flags.contains(DecoderFlags::EINTR) {
            signal::set_errno(libc::EINTR);
            Some(WaitResult::Error)
        } else {
            None
        }
    }

    fn read_input(&mut self) -> Option<WaitResult> {
        let mut buf = [0u8; READ_BUF_SIZE];
        let n = unsafe { libc::read(self.input, buf.as_mut_ptr().cast(), buf.len()) };

        match n {
            0 => {
                self.queue.extend(self.parser.flush());
                self.eof = true;
                None
            }
            n if n < 0 => match signal::errno() {
                libc::EAGAIN => None,
                libc::EINTR => {
                    self.drain_wake();
                    self.interrupted()
                }
                _ => Some(WaitResult::Error),
            },
            #[allow(clippy::cast_sign_loss)]
            n => {
                self.queue.extend(self.parser.advance(&buf[..n as usize]));
                None
            }
        }
    }
}

impl KeySource for KeyDecoder {
    fn install_signals(&mut self) -> io::Result<()> {
        let Some(write) = &self.wake_write else {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        };
        signal::install(write.as_raw_fd())?;
        self.signals_installed = true;
        Ok(())
    }

    fn wait_key(&mut self) -> WaitResult {
        loop {
            if let Some(key) = self.queue.pop_front() {
                return WaitResult::Key(key);
            }
            if self.eof {
                return WaitResult::Eof;
            }
            let Some(wake) = &self.wake_read else {
                signal::set_errno(libc::EBADF);
                return WaitResult::Error;
            };

            let timeout = if self.parser.has_pending() {
                ESC_TIMEOUT_MS
            } else {
                -1
            };
            let mut fds = [
                libc::pollfd {
                    fd: self.input,
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: wake.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            let ready = unsafe { libc::poll(fds.as_mut_ptr(), 2, timeout) };

            if ready < 0 {
                if signal::errno() == libc::EINTR {
                    self.drain_wake();
                    if let Some(result) = self.interrupted() {
                        return result;
                    }
                    continue;
                }
                return WaitResult::Error;
            }

            if ready == 0 {
                self.queue.extend(self.parser.flush());
                continue;
            }

            if fds[1].revents != 0 {
                self.drain_wake();
                if let Some(result) = self.interrupted() {
                    return result;
                }
            }

            if fds[0].revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
                if let Some(result) = self.read_input() {
                    return result;
                }
            } else if fds[0].revents & libc::POLLNVAL != 0 {
                signal::set_errno(libc::EBADF);
                return WaitResult::Error;
            }
        }
    }

    fn take_signals(&mut self) -> Pending {
        signal::take_pending()
    }

    fn errno(&self) -> i32 {
        signal::errno()
    }

    fn set_errno(&self, value: i32) {
        signal::set_errno(value);
    }

    fn stop(&mut self) {
        if self.is_stopped() {
            return;
        }
        if self.signals_installed {
            signal::uninstall();
            self.signals_installed = false;
        }
        self.wake_read = None;
        self.wake_write = None;
        self.queue.clear();
        log::debug!("key decoder stopped");
    }
}

impl Drop for KeyDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A non-blocking, close-on-exec pipe.
fn wake_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let pair = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    for fd in [fds[0], fds[1]] {
        unsafe {
            let fl = libc::fcntl(fd, libc::F_GETFL);
            if fl < 0 || libc::fcntl(fd, libc::F_SETFL, fl | libc::O_NONBLOCK) < 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) < 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }
    Ok(pair)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyCode, Modifiers};
    use pretty_assertions::assert_eq;

    /// An input pipe: the decoder reads the first fd, the test writes the second.
    fn input_pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0 as libc::c_int; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    fn send(fd: &OwnedFd, bytes: &[u8]) {
        let n = unsafe { libc::write(fd.as_raw_fd(), bytes.as_ptr().cast(), bytes.len()) };
        assert_eq!(usize::try_from(n).unwrap(), bytes.len());
    }

    fn decoder(input: &OwnedFd, flags: DecoderFlags) -> KeyDecoder {
        KeyDecoder::new(input.as_raw_fd(), flags, CanonFlags::DELBS).unwrap()
    }

    fn key(code: KeyCode) -> WaitResult {
        WaitResult::Key(KeyEvent::plain(code))
    }

    // ── Decoding ────────────────────────────────────────────────

    #[test]
    fn keys_arrive_in_order() {
        let (r, w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        send(&w, b"a\x1b[A\x7f");
        assert_eq!(dec.wait_key(), key(KeyCode::Char('a')));
        assert_eq!(dec.wait_key(), key(KeyCode::Up));
        assert_eq!(dec.wait_key(), key(KeyCode::Backspace));
    }

    #[test]
    fn lone_escape_resolves_after_timeout() {
        let (r, w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        send(&w, b"\x1b");
        assert_eq!(dec.wait_key(), key(KeyCode::Escape));
    }

    #[test]
    fn alt_sequence_is_one_key() {
        let (r, w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        send(&w, b"\x1bq");
        assert_eq!(
            dec.wait_key(),
            WaitResult::Key(KeyEvent::with(KeyCode::Char('q'), Modifiers::ALT))
        );
    }

    #[test]
    fn closed_input_is_eof_after_pending_keys() {
        let (r, w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        send(&w, b"z");
        drop(w);
        assert_eq!(dec.wait_key(), key(KeyCode::Char('z')));
        assert_eq!(dec.wait_key(), WaitResult::Eof);
        assert_eq!(dec.wait_key(), WaitResult::Eof);
    }

    // ── Interruption ────────────────────────────────────────────

    #[test]
    fn wake_interrupts_with_eintr() {
        let (r, _w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        dec.waker().unwrap().wake().unwrap();
        assert_eq!(dec.wait_key(), WaitResult::Error);
        assert_eq!(dec.errno(), libc::EINTR);
    }

    #[test]
    fn wake_from_another_thread_unblocks_the_wait() {
        let (r, _w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        let waker = dec.waker().unwrap();
        let t = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            waker.wake().unwrap();
        });
        assert_eq!(dec.wait_key(), WaitResult::Error);
        assert_eq!(dec.errno(), libc::EINTR);
        t.join().unwrap();
    }

    #[test]
    fn wake_without_eintr_flag_keeps_waiting() {
        let (r, w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::empty());
        dec.waker().unwrap().wake().unwrap();
        send(&w, b"k");
        assert_eq!(dec.wait_key(), key(KeyCode::Char('k')));
    }

    #[test]
    fn repeated_wakes_collapse_into_one_interruption() {
        let (r, w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        let waker = dec.waker().unwrap();
        waker.wake().unwrap();
        waker.wake().unwrap();
        assert_eq!(dec.wait_key(), WaitResult::Error);
        send(&w, b"x");
        assert_eq!(dec.wait_key(), key(KeyCode::Char('x')));
    }

    // ── Stop ────────────────────────────────────────────────────

    #[test]
    fn stop_is_idempotent_and_ends_waiting() {
        let (r, _w) = input_pipe();
        let mut dec = decoder(&r, DecoderFlags::EINTR);
        dec.stop();
        dec.stop();
        assert!(dec.is_stopped());
        assert!(dec.waker().is_none());
        assert_eq!(dec.wait_key(), WaitResult::Error);
        assert_eq!(dec.errno(), libc::EBADF);
    }

    #[test]
    fn format_key_defaults_to_the_formatter() {
        let (r, _w) = input_pipe();
        let dec = decoder(&r, DecoderFlags::EINTR);
        let k = KeyEvent::with(KeyCode::Char('v'), Modifiers::CTRL);
        assert_eq!(dec.format_key(&k, KeyFormat::VIM), "<C-v>");
    }
}
