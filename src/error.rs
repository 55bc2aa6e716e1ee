//! Error handling.

mod capacity_error;
mod protocol_error;

pub use capacity_error::CapacityError;
pub use protocol_error::ProtocolError;

use std::{io, result};

/// Result type of all library calls.
pub type Result<T> = result::Result<T, Error>;

/// Errors produced while parsing requests, performing the handshake, or driving a WebSocket
/// connection.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The WebSocket connection was closed normally. Both directions have exchanged a Close
    /// frame; the only meaningful action left is to drop the connection.
    #[error("connection closed normally")]
    ConnectionClosed,
    /// An operation was attempted on a connection that has already sent (and is not waiting
    /// for) a Close frame, e.g. a second `close()` after the peer acknowledged.
    #[error("operation attempted on an already-closed connection")]
    AlreadyClosed,
    /// The incoming HTTP request could not be parsed (bad request line, header, or
    /// `Content-Length`). Surfaces as a 400 response; the connection is then closed.
    #[error("malformed HTTP request: {0}")]
    Parse(String),
    /// Input/output error talking to the underlying stream. Fatal to the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A configured size limit was exceeded (frame payload or request body).
    #[error("capacity exceeded: {0}")]
    Capacity(#[from] CapacityError),
    /// A WebSocket protocol violation was observed while reading frames.
    #[error("WebSocket protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// A Text frame (or an assembled Text message) was not valid UTF-8. Only produced when
    /// [`crate::config::ServerConfig::strict_utf8`] is enabled.
    #[error("invalid UTF-8 in text message")]
    Utf8,
    /// The peer closed the stream, or the runtime cancelled the operation, while a frame or
    /// request body was only partially read.
    #[error("connection reset before a complete frame/body was read")]
    UnexpectedEof,
    /// The pending operation was cancelled via the caller's `CancellationToken`.
    #[error("operation cancelled")]
    Cancelled,
    /// The user-supplied HTTP handler returned an error.
    #[error("HTTP handler error: {0}")]
    Handler(String),
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::Utf8
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::Utf8
    }
}
