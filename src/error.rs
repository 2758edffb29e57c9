// SPDX-License-Identifier: MIT
//
// Error types for the client.
//
// Terminal-boundary write failures never show up here: the render engine
// swallows them where they happen. Everything below ends the loop it
// occurs in, which then takes the other loop down with it.

use std::io;

use n_rpc::RpcError;
use thiserror::Error;

/// The host sent something the renderer cannot honor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Only the single global grid (id 1) is supported.
    #[error("multigrid not supported (grid {0})")]
    UnsupportedGrid(i64),

    /// `grid_scroll` with a non-zero column delta.
    #[error("column scroll not supported (cols = {0})")]
    ColumnScroll(i64),

    /// `grid_scroll` with a zero row delta.
    #[error("grid_scroll with rows = 0")]
    ZeroRowScroll,

    /// An event instance did not have the expected shape.
    #[error("malformed {event}: {reason}")]
    Malformed {
        event: &'static str,
        reason: String,
    },
}

/// Why the render loop ended abnormally.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("host connection failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("terminal output failed: {0}")]
    Io(#[from] io::Error),

    #[error("render thread panicked")]
    Panicked,
}

/// Why the key loop ended abnormally.
#[derive(Debug, Error)]
pub enum InputError {
    /// The key wait failed with something other than an interruption.
    #[error("waiting for a key failed: {0}")]
    Wait(io::Error),

    /// The terminal's input closed.
    #[error("terminal input closed")]
    Eof,

    #[error("installing signal handlers failed: {0}")]
    Signals(io::Error),
}

/// Top-level failure reported by `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not start the host: {0}")]
    Host(#[from] RpcError),

    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Input(#[from] InputError),
}
