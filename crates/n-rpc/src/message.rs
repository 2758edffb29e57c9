// SPDX-License-Identifier: MIT
//
// msgpack-rpc messages.
//
//   Request       [0, msgid, method, params]
//   Response      [1, msgid, error, result]
//   Notification  [2, method, params]
//
// Each message is one msgpack array on the stream, back to back, with no
// framing beyond msgpack itself.

use std::io::{self, Read, Write};

use rmpv::Value;

use crate::error::RpcError;

/// One msgpack-rpc message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: u32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        id: u32,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

/// What the host sends us that needs handling: its requests and its
/// notifications. Responses to our own calls never leave the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request {
        id: u32,
        method: String,
        params: Vec<Value>,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

impl Inbound {
    /// The method name.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => method,
        }
    }
}

impl Message {
    /// The msgpack array for this message.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Request { id, method, params } => Value::Array(vec![
                Value::from(0),
                Value::from(id),
                Value::from(method),
                Value::Array(params),
            ]),
            Self::Response { id, error, result } => {
                Value::Array(vec![Value::from(1), Value::from(id), error, result])
            }
            Self::Notification { method, params } => Value::Array(vec![
                Value::from(2),
                Value::from(method),
                Value::Array(params),
            ]),
        }
    }

    /// Interpret a msgpack value as a message.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Malformed`] if `value` does not have one of the
    /// three message shapes.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let Value::Array(items) = value else {
            return Err(malformed("message is not an array"));
        };
        let mut it = items.into_iter();

        match it.next().and_then(|v| v.as_u64()) {
            Some(0) => Ok(Self::Request {
                id: msgid(it.next())?,
                method: string(it.next())?,
                params: array(it.next())?,
            }),
            Some(1) => Ok(Self::Response {
                id: msgid(it.next())?,
                error: it.next().unwrap_or(Value::Nil),
                result: it.next().unwrap_or(Value::Nil),
            }),
            Some(2) => Ok(Self::Notification {
                method: string(it.next())?,
                params: array(it.next())?,
            }),
            Some(kind) => Err(malformed(format!("unknown message type {kind}"))),
            None => Err(malformed("missing message type")),
        }
    }

    /// Write this message to `w`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn encode(self, w: &mut impl Write) -> Result<(), RpcError> {
        rmpv::encode::write_value(w, &self.into_value())?;
        Ok(())
    }

    /// Read the next message from `r`.
    ///
    /// Returns `Ok(None)` when the stream ends between messages.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, invalid msgpack, or a value that is
    /// not a message.
    pub fn decode(r: &mut impl Read) -> Result<Option<Self>, RpcError> {
        match rmpv::decode::read_value(r) {
            Ok(value) => Self::from_value(value).map(Some),
            Err(rmpv::decode::Error::InvalidMarkerRead(e))
                if e.kind() == io::ErrorKind::UnexpectedEof =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl From<Inbound> for Message {
    fn from(inbound: Inbound) -> Self {
        match inbound {
            Inbound::Request { id, method, params } => Self::Request { id, method, params },
            Inbound::Notification { method, params } => Self::Notification { method, params },
        }
    }
}

fn malformed(what: impl Into<String>) -> RpcError {
    RpcError::Malformed(what.into())
}

fn msgid(value: Option<Value>) -> Result<u32, RpcError> {
    value
        .and_then(|v| v.as_u64())
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| malformed("bad message id"))
}

fn string(value: Option<Value>) -> Result<String, RpcError> {
    match value {
        Some(Value::String(s)) => s.into_str().ok_or_else(|| malformed("method is not UTF-8")),
        _ => Err(malformed("method is not a string")),
    }
}

fn array(value: Option<Value>) -> Result<Vec<Value>, RpcError> {
    match value {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(malformed("params is not an array")),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bytes_of(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, value).unwrap();
        buf
    }

    #[test]
    fn request_layout() {
        let msg = Message::Request {
            id: 7,
            method: "nvim_input".into(),
            params: vec![Value::from("<Esc>")],
        };
        assert_eq!(
            msg.into_value(),
            Value::Array(vec![
                Value::from(0),
                Value::from(7),
                Value::from("nvim_input"),
                Value::Array(vec![Value::from("<Esc>")]),
            ])
        );
    }

    #[test]
    fn notification_decodes_from_stream() {
        let wire = Value::Array(vec![
            Value::from(2),
            Value::from("redraw"),
            Value::Array(vec![Value::Array(vec![Value::from("flush")])]),
        ]);
        let mut r = io::Cursor::new(bytes_of(&wire));
        let msg = Message::decode(&mut r).unwrap().unwrap();
        assert_eq!(
            msg,
            Message::Notification {
                method: "redraw".into(),
                params: vec![Value::Array(vec![Value::from("flush")])],
            }
        );
        assert_eq!(Message::decode(&mut r).unwrap(), None);
    }

    #[test]
    fn response_with_missing_fields_defaults_to_nil() {
        let msg = Message::from_value(Value::Array(vec![Value::from(1), Value::from(3)])).unwrap();
        assert_eq!(
            msg,
            Message::Response {
                id: 3,
                error: Value::Nil,
                result: Value::Nil
            }
        );
    }

    #[test]
    fn encode_then_decode_keeps_the_message() {
        let msg = Message::Response {
            id: 1,
            error: Value::Nil,
            result: Value::Boolean(true),
        };
        let mut buf = Vec::new();
        msg.clone().encode(&mut buf).unwrap();
        let back = Message::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(back, Some(msg));
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        for value in [
            Value::from(5),
            Value::Array(vec![]),
            Value::Array(vec![Value::from(9)]),
            Value::Array(vec![Value::from(2), Value::from(1), Value::Array(vec![])]),
            Value::Array(vec![Value::from(0), Value::from(-1), Value::from("m"), Value::Array(vec![])]),
            Value::Array(vec![Value::from(2), Value::from("m"), Value::Nil]),
        ] {
            assert!(
                matches!(Message::from_value(value.clone()), Err(RpcError::Malformed(_))),
                "{value:?} should be malformed"
            );
        }
    }

    #[test]
    fn empty_stream_is_end_not_error() {
        assert_eq!(Message::decode(&mut io::empty()).unwrap(), None);
    }

    #[test]
    fn inbound_converts_back_to_message() {
        let inbound = Inbound::Notification {
            method: "redraw".into(),
            params: vec![],
        };
        assert_eq!(inbound.method(), "redraw");
        assert!(matches!(Message::from(inbound), Message::Notification { .. }));
    }
}
