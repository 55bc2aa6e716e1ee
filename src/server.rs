//! The listener loop: accept connections and spawn one task per connection.
//!
//! Grounded on the teacher crate's `accept_async` examples (`examples/server.rs` pattern of
//! `TcpListener::accept` + `tokio::spawn`), generalized into a standalone `start_server` entry
//! point that owns the listener and a root `CancellationToken` for coordinated shutdown.

use std::sync::Arc;

use log::*;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::handler::{HttpHandler, WsHandlerSelector};
use crate::worker;

/// A handle to a running server, returned by [`start_server`].
pub struct ServerHandle {
    port: u16,
    cancel: CancellationToken,
    accept_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// The TCP port the listener is bound to. Useful when `start_server` was given port `0`
    /// (bind to an ephemeral port), e.g. in tests.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting new connections and cancel any in-flight reads/writes on open connections.
    /// Does not wait for in-flight handlers to finish; drop the returned `JoinHandle` if you need
    /// that (not currently exposed, since most handlers run for the lifetime of the process).
    pub fn stop(&self) {
        self.cancel.cancel();
        self.accept_task.abort();
    }
}

/// Bind a listener and serve HTTP/WebSocket connections until [`ServerHandle::stop`] is called.
///
/// Each accepted connection is handled in its own spawned task (task-per-connection, no shared
/// executor pool beyond tokio's own). Port `0` binds to an OS-assigned ephemeral port; read the
/// actual port back via [`ServerHandle::port`].
pub async fn start_server(
    port: u16,
    http_handler: Arc<dyn HttpHandler>,
    ws_selector: Arc<dyn WsHandlerSelector>,
    config: ServerConfig,
) -> Result<ServerHandle> {
    let listener = TcpListener::bind((config.bind_address, port)).await.map_err(Error::Io)?;
    let bound_port = listener.local_addr().map_err(Error::Io)?.port();
    let cancel = CancellationToken::new();

    info!("listening on {}:{bound_port}", config.bind_address);

    let accept_task = tokio::spawn(accept_loop(listener, http_handler, ws_selector, config, cancel.clone()));

    Ok(ServerHandle { port: bound_port, cancel, accept_task })
}

async fn accept_loop(
    listener: TcpListener,
    http_handler: Arc<dyn HttpHandler>,
    ws_selector: Arc<dyn WsHandlerSelector>,
    config: ServerConfig,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            res = listener.accept() => res,
            () = cancel.cancelled() => return,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        trace!("accepted connection from {peer}");

        let http_handler = Arc::clone(&http_handler);
        let ws_selector = Arc::clone(&ws_selector);
        let config = config.clone();
        let conn_cancel = cancel.child_token();

        tokio::spawn(async move {
            worker::serve_connection(stream, http_handler, ws_selector, config, conn_cancel).await;
        });
    }
}
