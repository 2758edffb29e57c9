// SPDX-License-Identifier: MIT
//
// Transport errors.

use std::io;

use thiserror::Error;

/// Everything that can go wrong between us and the host process.
#[derive(Debug, Error)]
pub enum RpcError {
    /// I/O on the host's pipes failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The inbound stream was not valid msgpack.
    #[error("msgpack decode error: {0}")]
    Decode(#[from] rmpv::decode::Error),

    /// An outbound message could not be encoded.
    #[error("msgpack encode error: {0}")]
    Encode(#[from] rmpv::encode::Error),

    /// Valid msgpack, but not a msgpack-rpc message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The session was closed; nothing more can be sent.
    #[error("session closed")]
    Closed,

    /// The host executable could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// The executable we tried to run.
        program: String,
        #[source]
        source: io::Error,
    },
}
