//! The per-connection worker: parses one HTTP request off a freshly accepted socket and either
//! dispatches it to the plain HTTP handler or, for a recognized WebSocket upgrade, completes the
//! handshake and hands the connection to the registered `WebSocketHandler`.
//!
//! Grounded on the teacher crate's `accept_hdr_async`/`server::ServerHandshake` flow, generalized
//! from its single blocking handshake call into a full request/response cycle that also serves
//! plain (non-upgrade) HTTP traffic on the same listener.

use std::sync::Arc;
use std::time::Duration;

use log::*;
use socket2::SockRef;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::buffer::LineReader;
use crate::config::ServerConfig;
use crate::error::{CapacityError, Error};
use crate::handler::{HttpHandler, WebSocketHandler, WsHandlerSelector};
use crate::handshake;
use crate::http::{Request, Response};
use crate::protocol::Connection;

/// Drive one accepted connection end-to-end, then close the socket.
///
/// Errors are not propagated to the caller: a malformed request or I/O failure results in a
/// best-effort error response (when possible) and the connection being dropped, matching a
/// per-request `Connection: close` server that never lets one bad client take down the listener.
pub(crate) async fn serve_connection(
    mut stream: TcpStream,
    http_handler: Arc<dyn HttpHandler>,
    ws_selector: Arc<dyn WsHandlerSelector>,
    config: ServerConfig,
    cancel: CancellationToken,
) {
    if let Err(e) = apply_linger(&stream, config.socket_linger_seconds) {
        warn!("failed to set SO_LINGER on accepted socket: {e}");
    }

    let mut reader = LineReader::new();
    let deadline = Duration::from_millis(config.http_read_timeout_ms);

    let request = match tokio::time::timeout(deadline, Request::parse(&mut reader, &mut stream, &config)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            debug!("request parse failed: {e}");
            let response = match e {
                Error::Capacity(CapacityError::BodyTooLarge { .. }) => Response::payload_too_large(),
                e => Response::bad_request(e.to_string()),
            };
            let _ = response.write(&mut stream, false).await;
            let _ = stream.shutdown().await;
            return;
        }
        Err(_) => {
            debug!("timed out waiting for a request");
            let _ = stream.shutdown().await;
            return;
        }
    };

    let ws_handler = if handshake::is_upgrade(&request) { ws_selector.select(&request.path).await } else { None };

    match ws_handler {
        Some(handler) => serve_websocket(stream, request, reader, handler, config, cancel).await,
        None => serve_http(stream, request, http_handler).await,
    }
}

async fn serve_websocket(
    mut stream: TcpStream,
    request: Request,
    mut reader: LineReader,
    handler: Arc<dyn WebSocketHandler>,
    config: ServerConfig,
    cancel: CancellationToken,
) {
    let Some(client_key) = handshake::client_key(&request.headers) else {
        let _ = Response::bad_request("missing Sec-WebSocket-Key").write(&mut stream, false).await;
        let _ = stream.shutdown().await;
        return;
    };
    let accept_key = handshake::compute_accept_key(client_key);

    if let Err(e) = handshake::emit_101(&mut stream, &accept_key).await {
        warn!("failed to write 101 response: {e}");
        return;
    }

    let residue = reader.take_residue();
    let mut connection = Connection::new(stream, residue, config, cancel);

    debug!("upgraded {} to a WebSocket connection", request.path);
    handler.handle(request, &mut connection).await;

    // Best-effort graceful half-close: the handler may have already closed, or the peer may be
    // gone, so a failure here is not reported.
    let _ = connection.close(Some(1000), "").await;
}

async fn serve_http(mut stream: TcpStream, request: Request, handler: Arc<dyn HttpHandler>) {
    let is_head = request.is_head();
    let response = match handler.handle(request).await {
        Ok(response) => response,
        Err(e) => {
            error!("HTTP handler error: {e}");
            Response::internal_error(e.to_string())
        }
    };

    if let Err(e) = response.write(&mut stream, is_head).await {
        debug!("failed to write response: {e}");
    }
    let _ = stream.shutdown().await;
}

fn apply_linger(stream: &TcpStream, seconds: u32) -> std::io::Result<()> {
    let linger = if seconds == 0 { None } else { Some(Duration::from_secs(u64::from(seconds))) };
    SockRef::from(stream).set_linger(linger)
}
