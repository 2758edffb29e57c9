// SPDX-License-Identifier: MIT
//
// n-rpc: msgpack-rpc plumbing between n-client and an embedded Neovim.
//
// `message` is the wire model (request, response, notification as msgpack
// arrays). `session` runs the transport: one thread decodes what the host
// sends, one thread writes what we send, so callers never block on the
// pipe. The engines only see the `Host` trait.

pub mod error;
pub mod message;
pub mod session;

pub use error::RpcError;
pub use message::{Inbound, Message};
pub use session::{Host, Session};
pub use rmpv::Value;
