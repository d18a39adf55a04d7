//! Messages exchanged between the controller and the worker.
//!
//! On the wire a request is a positional array `[sender, type, payload]`.
//! The `sender` is an opaque token owned by whoever issued the request;
//! the worker never looks inside it and echoes it back unchanged so the
//! issuer can pair the asynchronous reply with its request.

use serde_json::Value;
use thiserror::Error;

use crate::channel::ReadRequest;

/// Opaque correlation token carried by every request and its reply.
pub type Sender = Value;

/// Why an inbound frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame is not an array")]
    NotAnArray,

    #[error("frame has {0} field(s), expected at least 2")]
    TooShort(usize),

    #[error("frame type is not a string")]
    BadType,

    #[error("unknown request type: {0}")]
    UnknownType(String),

    #[error("bad payload for {kind}: expected {expected}")]
    BadPayload {
        kind: &'static str,
        expected: &'static str,
    },
}

/// A request from the controller to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Read and evaluate one form.
    Eval { sender: Sender, source: String },
    /// Read one form and print its value as a datum.
    EvalQuote { sender: Sender, source: String },
    /// Read and evaluate every form in the source.
    EvalAll { sender: Sender, source: String },
    /// Change the engine's debug level.
    DebugLevel { sender: Sender, level: i32 },
}

impl Request {
    /// Wire name of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Eval { .. } => "eval",
            Request::EvalQuote { .. } => "evalquote",
            Request::EvalAll { .. } => "evalall",
            Request::DebugLevel { .. } => "debug_level",
        }
    }

    pub fn sender(&self) -> &Sender {
        match self {
            Request::Eval { sender, .. }
            | Request::EvalQuote { sender, .. }
            | Request::EvalAll { sender, .. }
            | Request::DebugLevel { sender, .. } => sender,
        }
    }

    /// Encode as a positional wire frame.
    pub fn to_frame(&self) -> Value {
        let payload = match self {
            Request::Eval { source, .. }
            | Request::EvalQuote { source, .. }
            | Request::EvalAll { source, .. } => Value::from(source.as_str()),
            Request::DebugLevel { level, .. } => Value::from(*level),
        };
        Value::Array(vec![
            self.sender().clone(),
            Value::from(self.kind()),
            payload,
        ])
    }

    /// Decode a positional wire frame.
    pub fn from_frame(frame: Value) -> Result<Self, ProtocolError> {
        let Value::Array(fields) = frame else {
            return Err(ProtocolError::NotAnArray);
        };
        if fields.len() < 2 {
            return Err(ProtocolError::TooShort(fields.len()));
        }
        let mut fields = fields.into_iter();
        let sender = fields.next().unwrap_or(Value::Null);
        let kind = match fields.next() {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::BadType),
        };
        let payload = fields.next();

        match kind.as_str() {
            "eval" => Ok(Request::Eval {
                sender,
                source: text_payload("eval", payload)?,
            }),
            "evalquote" => Ok(Request::EvalQuote {
                sender,
                source: text_payload("evalquote", payload)?,
            }),
            "evalall" => Ok(Request::EvalAll {
                sender,
                source: text_payload("evalall", payload)?,
            }),
            "debug_level" => {
                let level = payload
                    .as_ref()
                    .and_then(Value::as_i64)
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or(ProtocolError::BadPayload {
                        kind: "debug_level",
                        expected: "32-bit integer",
                    })?;
                Ok(Request::DebugLevel { sender, level })
            }
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }
}

fn text_payload(kind: &'static str, payload: Option<Value>) -> Result<String, ProtocolError> {
    match payload {
        Some(Value::String(text)) => Ok(text),
        _ => Err(ProtocolError::BadPayload {
            kind,
            expected: "string",
        }),
    }
}

/// A message from the worker to the controller.
///
/// `Eval` and `DebugLevel` answer a request; the rest are one-way
/// notifications raised by the worker or the engine.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Result of `eval`, `evalquote` or `evalall`.
    Eval { sender: Sender, text: String },
    /// Acknowledges `debug_level`.
    DebugLevel { sender: Sender },
    /// The primary module is instantiated and initialised.
    Init,
    /// Incremental output emitted while an evaluation runs.
    Print(String),
    /// The engine is blocked waiting for another line of input.
    Read(ReadRequest),
}

impl WorkerEvent {
    /// Wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Eval { .. } => "eval",
            WorkerEvent::DebugLevel { .. } => "debug_level",
            WorkerEvent::Init => "init",
            WorkerEvent::Print(_) => "print",
            WorkerEvent::Read(_) => "read",
        }
    }

    /// The echoed sender, for replies.
    pub fn sender(&self) -> Option<&Sender> {
        match self {
            WorkerEvent::Eval { sender, .. } | WorkerEvent::DebugLevel { sender } => Some(sender),
            WorkerEvent::Init | WorkerEvent::Print(_) | WorkerEvent::Read(_) => None,
        }
    }
}
