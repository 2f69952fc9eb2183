//! Typed protocol messages.
//!
//! Every DAP request, response, and event payload is an ordinary serde-able
//! struct; the traits here attach the wire names those payloads travel
//! under. The [`session::Session`](crate::session::Session) registries are
//! keyed by these names (and by the response's `TypeId` for sent hooks), so
//! handlers can be registered and invoked generically while the connection
//! machinery deals only in type-erased closures.

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};

/// A DAP request payload.
///
/// The `arguments` object of the wire message deserializes into the
/// implementing type; a request arriving without arguments yields
/// `Default::default()`. The associated [`Request::Response`] type
/// serializes into the `body` of the response message.
pub trait Request: Serialize + DeserializeOwned + Default + Send + 'static {
    /// The value of the `command` field this request travels under.
    const COMMAND: &'static str;

    /// The payload of a successful response.
    type Response: Serialize + DeserializeOwned + Default + Send + 'static;
}

/// A DAP event payload, serialized into the `body` of an event message.
pub trait Event: Serialize + DeserializeOwned + Default + Send + 'static {
    /// The value of the `event` field this event travels under.
    const EVENT: &'static str;
}

/// A protocol-level failure produced by a request handler.
///
/// Errors are rendered into a response with `success=false` and the message
/// as the human-readable reason. They are never fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// The reason for the failure, shown to the user by the client.
    pub message: String,
}

impl Error {
    /// Construct an error with the given reason.
    pub fn new(message: impl Into<String>) -> Error {
        Error {
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}

/// The result type returned by request handlers.
pub type HandlerResult<T> = Result<T, Error>;
