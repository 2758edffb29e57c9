// SPDX-License-Identifier: MIT
//
// Session: the running msgpack-rpc connection to the host.
//
// Two helper threads carry the traffic:
//
//   reader  decodes inbound messages. Requests and notifications go onto a
//           channel that `recv` drains; responses to our own calls are
//           consumed here (logged, and at warn level if they carry an
//           error).
//   writer  drains a FIFO of outbound messages, so `async_call` only
//           enqueues and returns. Message ids are handed out in call order.
//
// `stop_loop` is sticky: once called, every `recv` returns `Ok(None)`,
// including one that has not started yet.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rmpv::Value;

use crate::error::RpcError;
use crate::message::{Inbound, Message};

/// How long `close` waits for the host to exit before killing it.
const EXIT_GRACE: Duration = Duration::from_secs(1);
const EXIT_POLL: Duration = Duration::from_millis(10);

// ─── Host ────────────────────────────────────────────────────────────────────

/// The host connection as the engines see it.
pub trait Host: Send + Sync {
    /// Block for the next request or notification from the host.
    ///
    /// Returns `Ok(None)` once the stream has ended or [`stop_loop`]
    /// was called.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the stream.
    ///
    /// [`stop_loop`]: Host::stop_loop
    fn recv(&self) -> Result<Option<Inbound>, RpcError>;

    /// Make the current and every later [`recv`](Host::recv) return
    /// `Ok(None)`.
    fn stop_loop(&self);

    /// Queue a call to `method` and return without waiting for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Closed`] after [`close`](Host::close).
    fn async_call(&self, method: &str, args: Vec<Value>) -> Result<(), RpcError>;

    /// Answer a request from the host.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Closed`] after [`close`](Host::close).
    fn respond(&self, id: u32, result: Result<Value, Value>) -> Result<(), RpcError>;

    /// Shut the connection down. Idempotent.
    fn close(&self);
}

// ─── Session ─────────────────────────────────────────────────────────────────

enum Incoming {
    Message(Inbound),
    Closed(Option<RpcError>),
    Stop,
}

/// A msgpack-rpc session over a reader/writer pair, optionally owning the
/// host child process.
pub struct Session {
    incoming: Mutex<Receiver<Incoming>>,
    wake: Sender<Incoming>,
    outgoing: Mutex<Option<Sender<Message>>>,
    stopped: AtomicBool,
    next_id: AtomicU32,
    pending: Arc<Mutex<HashMap<u32, String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
}

impl Session {
    /// Start a session over `reader` (host → us) and `writer` (us → host).
    ///
    /// # Errors
    ///
    /// Returns an error if a helper thread cannot be spawned.
    pub fn new<R, W>(reader: R, writer: W) -> Result<Self, RpcError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (in_tx, in_rx) = mpsc::channel();
        let (out_tx, out_rx) = mpsc::channel();
        let pending = Arc::new(Mutex::new(HashMap::new()));

        let reader = {
            let tx = in_tx.clone();
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("rpc-reader".into())
                .spawn(move || read_loop(reader, &tx, &pending))?
        };
        let writer = thread::Builder::new()
            .name("rpc-writer".into())
            .spawn(move || write_loop(writer, &out_rx))?;

        Ok(Self {
            incoming: Mutex::new(in_rx),
            wake: in_tx,
            outgoing: Mutex::new(Some(out_tx)),
            stopped: AtomicBool::new(false),
            next_id: AtomicU32::new(0),
            pending,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            child: Mutex::new(None),
        })
    }

    /// Start `<program> --embed [file]` and open a session on its stdio.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Spawn`] if the program cannot be started.
    pub fn spawn(program: &str, file: Option<&Path>) -> Result<Self, RpcError> {
        let mut cmd = Command::new(program);
        cmd.arg("--embed")
            .args(file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let spawn_err = |source: std::io::Error| RpcError::Spawn {
            program: program.to_owned(),
            source,
        };
        let mut child = cmd.spawn().map_err(spawn_err)?;
        log::info!("started {program} --embed (pid {})", child.id());

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RpcError::Closed);
        };

        let session = Self::new(BufReader::new(stdout), BufWriter::new(stdin))?;
        *lock(&session.child) = Some(child);
        Ok(session)
    }

    fn send(&self, msg: Message) -> Result<(), RpcError> {
        lock(&self.outgoing)
            .as_ref()
            .ok_or(RpcError::Closed)?
            .send(msg)
            .map_err(|_| RpcError::Closed)
    }

    fn reap_child(&self) {
        let Some(mut child) = lock(&self.child).take() else {
            return;
        };
        let deadline = Instant::now() + EXIT_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("host exited: {status}");
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL),
                Ok(None) => break,
                Err(e) => {
                    log::warn!("waiting for host failed: {e}");
                    break;
                }
            }
        }
        log::warn!("host did not exit in {EXIT_GRACE:?}, killing it");
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl Host for Session {
    fn recv(&self) -> Result<Option<Inbound>, RpcError> {
        let rx = lock(&self.incoming);
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match rx.recv() {
            Ok(Incoming::Message(msg)) if !self.stopped.load(Ordering::SeqCst) => Ok(Some(msg)),
            Ok(Incoming::Closed(err)) => {
                self.stopped.store(true, Ordering::SeqCst);
                err.map_or(Ok(None), Err)
            }
            Ok(Incoming::Message(_) | Incoming::Stop) | Err(_) => Ok(None),
        }
    }

    fn stop_loop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            log::debug!("receive loop stop requested");
        }
        let _ = self.wake.send(Incoming::Stop);
    }

    fn async_call(&self, method: &str, args: Vec<Value>) -> Result<(), RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.pending).insert(id, method.to_owned());
        log::trace!("-> [{id}] {method}");
        self.send(Message::Request {
            id,
            method: method.to_owned(),
            params: args,
        })
    }

    fn respond(&self, id: u32, result: Result<Value, Value>) -> Result<(), RpcError> {
        let (error, result) = match result {
            Ok(value) => (Value::Nil, value),
            Err(error) => (error, Value::Nil),
        };
        self.send(Message::Response { id, error, result })
    }

    fn close(&self) {
        self.stop_loop();

        // Dropping the sender ends the writer, which closes the host's stdin.
        if lock(&self.outgoing).take().is_none() {
            return;
        }
        if let Some(handle) = lock(&self.writer).take() {
            let _ = handle.join();
        }

        self.reap_child();

        if let Some(handle) = lock(&self.reader).take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::debug!("reader still blocked, leaving it detached");
            }
        }
        log::debug!("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── Helper Threads ──────────────────────────────────────────────────────────

#[allow(clippy::needless_pass_by_value)]
fn read_loop<R: Read>(mut reader: R, tx: &Sender<Incoming>, pending: &Mutex<HashMap<u32, String>>) {
    loop {
        let inbound = match Message::decode(&mut reader) {
            Ok(Some(Message::Request { id, method, params })) => {
                Inbound::Request { id, method, params }
            }
            Ok(Some(Message::Notification { method, params })) => {
                Inbound::Notification { method, params }
            }
            Ok(Some(Message::Response { id, error, .. })) => {
                let method = lock(pending).remove(&id).unwrap_or_default();
                if error.is_nil() {
                    log::trace!("<- [{id}] {method} ok");
                } else {
                    log::warn!("host returned an error for {method} [{id}]: {error}");
                }
                continue;
            }
            Ok(None) => {
                log::debug!("host closed the stream");
                let _ = tx.send(Incoming::Closed(None));
                return;
            }
            Err(e) => {
                log::error!("reading from host failed: {e}");
                let _ = tx.send(Incoming::Closed(Some(e)));
                return;
            }
        };
        if tx.send(Incoming::Message(inbound)).is_err() {
            return;
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn write_loop<W: Write>(mut writer: W, rx: &Receiver<Message>) {
    for msg in rx {
        let written = msg
            .encode(&mut writer)
            .and_then(|()| writer.flush().map_err(RpcError::from));
        if let Err(e) = written {
            log::warn!("writing to host failed: {e}");
            return;
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
