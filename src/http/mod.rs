//! A minimal, lenient HTTP/1.x request parser and response writer.
//!
//! This is not a general-purpose HTTP implementation: chunked transfer encoding is rejected,
//! only `Content-Length` framing is understood, and header folding follows the same
//! case-insensitive, order-preserving multimap approach the rest of this crate uses for the
//! WebSocket handshake headers.

pub mod request;
pub(crate) mod response;

pub use request::{Headers, Request};
pub use response::Response;
