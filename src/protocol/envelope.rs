//! JSON-RPC envelope model.
//!
//! Incoming messages are classified once, at decode time, into
//! [`Envelope::Request`] or [`Envelope::Notification`] by the presence of the
//! `id` key. Outgoing messages are always [`Response`]s.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ProtocolViolation;

/// Protocol version tag written on every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// Error code for a request whose method has no handler.
pub const UNHANDLED_METHOD: i64 = 123;

/// Error code for a request received before `build/initialize` (strict mode).
pub const SERVER_NOT_INITIALIZED: i64 = -32002;

/// Error code for a request that is invalid in the current phase (strict mode).
pub const INVALID_REQUEST: i64 = -32600;

/// A message that expects exactly one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Value,
    pub method: String,
    pub params: Option<Value>,
}

/// A message that is never answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Option<Value>,
}

/// One decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request(Request),
    Notification(Notification),
}

/// Wire shape of an incoming message before classification.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default, deserialize_with = "deserialize_present")]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// Maps a present key to `Some`, including an explicit `null`.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// Decode a frame body into an envelope.
    pub fn decode(body: &str) -> Result<Self, ProtocolViolation> {
        let raw: RawEnvelope =
            serde_json::from_str(body).map_err(ProtocolViolation::InvalidEnvelope)?;

        Ok(match raw.id {
            Some(id) => Envelope::Request(Request {
                id,
                method: raw.method,
                params: raw.params,
            }),
            None => Envelope::Notification(Notification {
                method: raw.method,
                params: raw.params,
            }),
        })
    }

    pub fn method(&self) -> &str {
        match self {
            Envelope::Request(req) => &req.method,
            Envelope::Notification(note) => &note.method,
        }
    }

    pub fn params(&self) -> Option<&Value> {
        match self {
            Envelope::Request(req) => req.params.as_ref(),
            Envelope::Notification(note) => note.params.as_ref(),
        }
    }

    /// The request id, or `None` for notifications.
    pub fn id(&self) -> Option<&Value> {
        match self {
            Envelope::Request(req) => Some(&req.id),
            Envelope::Notification(_) => None,
        }
    }
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

/// Exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Result(Value),
    Error(ResponseError),
}

/// A reply to one [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Response {
    /// Create a success response. A `Value::Null` result is written as `"result":null`.
    pub fn result(id: Value, result: Value) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: Payload::Result(result),
        }
    }

    /// Create an error response.
    pub fn error<S: Into<String>>(id: Value, code: i64, message: S) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: Payload::Error(ResponseError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Create the error response for a method with no handler.
    pub fn unhandled_method(id: Value, method: &str) -> Self {
        Response::error(id, UNHANDLED_METHOD, format!("unhandled method {method}"))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, Payload::Error(_))
    }
}
