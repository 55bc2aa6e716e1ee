//! Trait objects for the two pieces of user code a server is built from: the plain HTTP
//! handler and the per-path WebSocket handler selector.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::error::Result;
use crate::http::{Request, Response};
use crate::protocol::Connection;

/// A boxed, `Send` future, used to let handler traits accept `async fn`/async closures without
/// an `async-trait`-style proc macro.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handles one plain (non-upgrade) HTTP request and produces a response.
pub trait HttpHandler: Send + Sync {
    /// Handle `request`, returning the response to write back, or an error to surface as a
    /// `500 Internal Server Error`.
    fn handle(&self, request: Request) -> BoxFuture<'_, Result<Response>>;
}

impl<F, Fut> HttpHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn handle(&self, request: Request) -> BoxFuture<'_, Result<Response>> {
        Box::pin(self(request))
    }
}

/// Drives a WebSocket connection for as long as the application wants it. The worker retains
/// ownership of the `Connection` (the handler only borrows it) so it can perform the best-
/// effort half-close once the handler returns.
pub trait WebSocketHandler: Send + Sync {
    /// Drive `connection`, which has already completed the HTTP 101 handshake for `request`.
    fn handle<'a>(
        &'a self,
        request: Request,
        connection: &'a mut Connection<TcpStream>,
    ) -> BoxFuture<'a, ()>;
}

impl<F> WebSocketHandler for F
where
    F: for<'a> Fn(Request, &'a mut Connection<TcpStream>) -> BoxFuture<'a, ()> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        request: Request,
        connection: &'a mut Connection<TcpStream>,
    ) -> BoxFuture<'a, ()> {
        self(request, connection)
    }
}

/// Chooses which, if any, `WebSocketHandler` should own a connection to a given request path.
/// A `None` result means the request is not treated as a WebSocket upgrade candidate at all,
/// even if its headers otherwise qualify — it falls through to the plain `HttpHandler`.
pub trait WsHandlerSelector: Send + Sync {
    /// Look up the handler registered for `path`, if any.
    fn select(&self, path: &str) -> BoxFuture<'_, Option<Arc<dyn WebSocketHandler>>>;
}

impl<F, Fut> WsHandlerSelector for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Option<Arc<dyn WebSocketHandler>>> + Send + 'static,
{
    fn select(&self, path: &str) -> BoxFuture<'_, Option<Arc<dyn WebSocketHandler>>> {
        Box::pin(self(path.to_owned()))
    }
}

/// A selector with no registered paths; every request falls through to the HTTP handler.
pub struct NoWebSocketHandlers;

impl WsHandlerSelector for NoWebSocketHandlers {
    fn select(&self, _path: &str) -> BoxFuture<'_, Option<Arc<dyn WebSocketHandler>>> {
        Box::pin(async { None })
    }
}
