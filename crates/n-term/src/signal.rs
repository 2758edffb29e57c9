// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Process signals for the key loop.
//
// Two signals matter to the client:
//
//   SIGWINCH  the terminal was resized
//   SIGQUIT   forced interrupt: quit, or "stop waiting for keys"
//
// Both are blocked in the main thread before any helper thread exists, so
// every helper inherits the block. `install` unblocks them again in the
// calling thread only, which makes that thread the one the kernel delivers
// them to.
//
// The handlers are installed without SA_RESTART so a blocked poll returns
// EINTR. Each handler only records the signal in an atomic and writes one
// byte to the decoder's wake pipe (covering the case where the signal
// lands just before the poll starts), and it leaves errno as it found it.
// The real work happens later on the key loop's own thread, after
// `take_pending`.

use std::io;
use std::os::fd::RawFd;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static RESIZE: AtomicBool = AtomicBool::new(false);
static QUIT: AtomicBool = AtomicBool::new(false);

/// Write end of the wake pipe, `-1` when no decoder is listening.
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

/// Actions in place before `install`, restored by `uninstall`.
static PREVIOUS: Mutex<Option<(libc::sigaction, libc::sigaction)>> = Mutex::new(None);

/// Signals recorded since the last [`take_pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pending {
    pub resize: bool,
    pub quit: bool,
}

impl Pending {
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.resize && !self.quit
    }
}

// ─── errno ──────────────────────────────────────────────────────────────────

#[cfg(any(target_os = "linux", target_os = "android"))]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__error() }
}

/// The calling thread's OS error slot.
#[must_use]
pub fn errno() -> i32 {
    unsafe { *errno_location() }
}

/// Overwrite the calling thread's OS error slot.
pub fn set_errno(value: i32) {
    unsafe { *errno_location() = value };
}

// ─── Handler ────────────────────────────────────────────────────────────────

extern "C" fn on_signal(sig: libc::c_int) {
    let saved = errno();

    match sig {
        libc::SIGWINCH => RESIZE.store(true, Ordering::SeqCst),
        libc::SIGQUIT => QUIT.store(true, Ordering::SeqCst),
        _ => {}
    }

    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        let byte = [1u8];
        unsafe {
            let _ = libc::write(fd, byte.as_ptr().cast::<libc::c_void>(), 1);
        }
    }

    set_errno(saved);
}

// ─── Masks & Installation ───────────────────────────────────────────────────

fn forwarded_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&raw mut set);
        libc::sigaddset(&raw mut set, libc::SIGWINCH);
        libc::sigaddset(&raw mut set, libc::SIGQUIT);
        set
    }
}

fn thread_mask(how: libc::c_int) -> io::Result<()> {
    let set = forwarded_set();
    let rc = unsafe { libc::pthread_sigmask(how, &raw const set, std::ptr::null_mut()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

/// Block SIGWINCH and SIGQUIT in the calling thread.
///
/// Call from `main` before spawning threads; they inherit the mask.
///
/// # Errors
///
/// Returns the error from `pthread_sigmask`.
pub fn block_forwarded() -> io::Result<()> {
    thread_mask(libc::SIG_BLOCK)
}

/// Install the handlers, wake `wake_fd` on delivery, and unblock both
/// signals in the calling thread.
///
/// # Errors
///
/// Returns the error from `sigaction` or `pthread_sigmask`.
pub fn install(wake_fd: RawFd) -> io::Result<()> {
    WAKE_FD.store(wake_fd, Ordering::SeqCst);

    let mut previous: (libc::sigaction, libc::sigaction) =
        unsafe { (std::mem::zeroed(), std::mem::zeroed()) };
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = on_signal as *const () as usize;
        sa.sa_flags = 0;
        libc::sigemptyset(&raw mut sa.sa_mask);

        if libc::sigaction(libc::SIGWINCH, &raw const sa, &raw mut previous.0) != 0
            || libc::sigaction(libc::SIGQUIT, &raw const sa, &raw mut previous.1) != 0
        {
            return Err(io::Error::last_os_error());
        }
    }

    if let Ok(mut guard) = PREVIOUS.lock() {
        guard.get_or_insert(previous);
    }

    thread_mask(libc::SIG_UNBLOCK)?;
    log::debug!("signal handlers installed (wake fd {wake_fd})");
    Ok(())
}

/// Restore the previous handlers and stop waking any pipe. The calling
/// thread blocks both signals again.
pub fn uninstall() {
    let _ = thread_mask(libc::SIG_BLOCK);
    WAKE_FD.store(-1, Ordering::SeqCst);

    let previous = PREVIOUS.lock().ok().and_then(|mut guard| guard.take());
    if let Some((winch, quit)) = previous {
        unsafe {
            libc::sigaction(libc::SIGWINCH, &raw const winch, std::ptr::null_mut());
            libc::sigaction(libc::SIGQUIT, &raw const quit, std::ptr::null_mut());
        }
        log::debug!("signal handlers restored");
    }
}

/// Take and clear the signals recorded so far.
pub fn take_pending() -> Pending {
    Pending {
        resize: RESIZE.swap(false, Ordering::SeqCst),
        quit: QUIT.swap(false, Ordering::SeqCst),
    }
}

/// Send SIGQUIT to this process.
///
/// # Errors
///
/// Returns the error from `kill`.
pub fn raise_quit() -> io::Result<()> {
    let rc = unsafe { libc::kill(libc::getpid(), libc::SIGQUIT) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
