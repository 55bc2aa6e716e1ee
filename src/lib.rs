//! An embeddable, low-dependency HTTP/1.x server core built around an RFC 6455 WebSocket
//! transport engine.
//!
//! The library owns the socket, the HTTP request line/header/body parsing, the WebSocket
//! handshake, and the frame codec; applications provide an [`HttpHandler`] for plain requests and
//! a [`WsHandlerSelector`] that hands off upgraded connections to a [`WebSocketHandler`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use wslite::{start_server, NoWebSocketHandlers, Response, ServerConfig};
//!
//! # async fn run() -> wslite::Result<()> {
//! let handler = Arc::new(|_req| async { Ok(Response::ok("hello")) });
//! let handle = start_server(8080, handler, Arc::new(NoWebSocketHandlers), ServerConfig::default()).await?;
//! handle.stop();
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod http;
pub mod protocol;

mod buffer;
mod server;
mod worker;

pub use config::ServerConfig;
pub use error::{CapacityError, Error, ProtocolError, Result};
pub use handler::{BoxFuture, HttpHandler, NoWebSocketHandlers, WebSocketHandler, WsHandlerSelector};
pub use http::{Headers, Request, Response};
pub use protocol::{CloseFrame, Connection, IncompleteMessage, IncompleteMessageType, Message};
pub use server::{start_server, ServerHandle};
