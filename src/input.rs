// SPDX-License-Identifier: MIT
//
// Input engine: forwards decoded keys to the host.
//
// Runs on the main thread, the only thread with the resize and quit
// signals unblocked. Each wait on the decoder ends with a key, end of
// input, or an interruption; signals recorded during the wait are handled
// before the result is looked at, and the stopping flag is checked after
// every wait so a stop that lands between waits is never missed.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use n_rpc::{Host, Value};
use n_term::decoder::{KeySource, WaitResult};
use n_term::input::{KeyCode, KeyEvent};
use n_term::keys::KeyFormat;
use n_term::signal;
use n_term::surface::Surface;
use n_term::terminal::{self, Size};

use crate::error::InputError;
use crate::shutdown::{Coordinator, Stoppable};

/// Unblocks the key wait of a running input loop.
pub trait Interrupt: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the interruption could not be delivered.
    fn interrupt(&self) -> io::Result<()>;
}

/// Raises SIGQUIT against this process.
pub struct QuitSignal;

impl Interrupt for QuitSignal {
    fn interrupt(&self) -> io::Result<()> {
        signal::raise_quit()
    }
}

/// The host's key notation for `key`.
///
/// `<` opens a key name in that notation, so a literal one is sent as
/// `<lt>`. Escape always goes as `<Esc>`, whatever its modifiers.
pub fn encode_key<K: KeySource + ?Sized>(keys: &K, key: &KeyEvent) -> String {
    match key.code {
        KeyCode::Char('<') => "<lt>".to_owned(),
        KeyCode::Escape => "<Esc>".to_owned(),
        _ => keys.format_key(key, KeyFormat::VIM),
    }
}

/// Reads keys until stopped and sends them to the host as `nvim_input`.
pub struct InputEngine<H: Host, S: Surface> {
    host: Arc<H>,
    surface: Arc<Mutex<S>>,
    stopping: Mutex<bool>,
    interrupt: Box<dyn Interrupt>,
    coordinator: Arc<Coordinator>,
    size_probe: fn() -> Option<Size>,
}

impl<H, S> InputEngine<H, S>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
{
    /// An engine that interrupts with SIGQUIT and reads the terminal size
    /// from stdout.
    pub fn new(host: Arc<H>, surface: Arc<Mutex<S>>, coordinator: Arc<Coordinator>) -> Arc<Self> {
        Self::with_interrupt(host, surface, coordinator, QuitSignal, terminal::get_size)
    }

    pub fn with_interrupt(
        host: Arc<H>,
        surface: Arc<Mutex<S>>,
        coordinator: Arc<Coordinator>,
        interrupt: impl Interrupt + 'static,
        size_probe: fn() -> Option<Size>,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            surface,
            stopping: Mutex::new(false),
            interrupt: Box::new(interrupt),
            coordinator,
            size_probe,
        })
    }

    pub fn is_stopping(&self) -> bool {
        *lock(&self.stopping)
    }

    /// Run the key loop on the calling thread.
    ///
    /// However it ends, the engine is marked stopped, every engine on the
    /// coordinator is stopped, and `keys` is released.
    ///
    /// # Errors
    ///
    /// The signal handlers could not be installed, input reached end of
    /// file, or a wait failed with anything but EINTR.
    pub fn run<K: KeySource>(&self, keys: K) -> Result<(), InputError> {
        let mut exit = ExitGuard { engine: self, keys };
        exit.keys.install_signals().map_err(InputError::Signals)?;
        log::debug!("input loop started");

        loop {
            let result = exit.keys.wait_key();
            self.handle_signals(&mut exit.keys);
            if self.is_stopping() {
                log::debug!("input loop stopping");
                return Ok(());
            }

            match result {
                WaitResult::Key(key) => self.forward(&exit.keys, &key),
                WaitResult::Error if exit.keys.errno() == libc::EINTR => {
                    log::debug!("interrupted");
                }
                WaitResult::Error => {
                    let errno = exit.keys.errno();
                    return Err(InputError::Wait(io::Error::from_raw_os_error(errno)));
                }
                WaitResult::Eof => return Err(InputError::Eof),
            }
        }
    }

    fn forward<K: KeySource>(&self, keys: &K, key: &KeyEvent) {
        let encoded = encode_key(keys, key);
        log::trace!("key {key:?} -> {encoded}");
        if let Err(e) = self.host.async_call("nvim_input", vec![Value::from(encoded)]) {
            log::warn!("could not forward key: {e}");
        }
    }

    fn handle_signals<K: KeySource>(&self, keys: &mut K) {
        let pending = keys.take_signals();
        if pending.resize {
            self.on_resize(keys);
        }
        if pending.quit {
            log::debug!("quit signal");
            self.stop();
        }
    }

    /// Resize the surface and ask the host to follow, leaving the error
    /// slot as the interrupted wait left it.
    fn on_resize<K: KeySource>(&self, keys: &K) {
        let saved = keys.errno();
        match (self.size_probe)() {
            Some(size) => {
                log::debug!("resize to {}x{}", size.cols, size.rows);
                lock(&self.surface).resize(size);
                let args = vec![Value::from(size.cols), Value::from(size.rows)];
                if let Err(e) = self.host.async_call("nvim_ui_try_resize", args) {
                    log::warn!("could not request resize: {e}");
                }
            }
            None => log::debug!("resize signal, but the terminal size is unavailable"),
        }
        keys.set_errno(saved);
    }
}

impl<H, S> Stoppable for InputEngine<H, S>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
{
    /// Set the stopping flag and interrupt the key wait. Does not wait for
    /// the loop to exit: the caller may be the loop's own thread.
    fn stop(&self) {
        let mut stopping = lock(&self.stopping);
        if *stopping {
            return;
        }
        *stopping = true;
        log::debug!("stopping input loop");
        if let Err(e) = self.interrupt.interrupt() {
            log::warn!("could not interrupt the key wait: {e}");
        }
    }

    fn name(&self) -> &'static str {
        "input"
    }
}

/// Owns the key source for the loop's lifetime and tears everything down
/// on the way out.
struct ExitGuard<'a, H, S, K>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
    K: KeySource,
{
    engine: &'a InputEngine<H, S>,
    keys: K,
}

impl<H, S, K> Drop for ExitGuard<'_, H, S, K>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
    K: KeySource,
{
    fn drop(&mut self) {
        *lock(&self.engine.stopping) = true;
        self.engine.coordinator.stop_all();
        self.keys.stop();
        log::debug!("input loop finished");
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
