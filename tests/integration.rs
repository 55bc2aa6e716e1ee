//! End-to-end tests that drive `start_server` with a real `TcpListener` bound to an ephemeral
//! port, connecting as a raw client over `tokio::net::TcpStream` (no WebSocket client library in
//! this crate's own dependency stack).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use wslite::{start_server, Connection, NoWebSocketHandlers, Request, Response, ServerConfig, WsHandlerSelector};

async fn read_until_blank_line(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await.unwrap();
        buf.push(byte[0]);
        if buf.ends_with(b"\r\n\r\n") {
            return String::from_utf8_lossy(&buf).into_owned();
        }
    }
}

struct EchoSelector;

impl WsHandlerSelector for EchoSelector {
    fn select(&self, _path: &str) -> wslite::BoxFuture<'_, Option<Arc<dyn wslite::WebSocketHandler>>> {
        Box::pin(async { Some(Arc::new(echo_handler) as Arc<dyn wslite::WebSocketHandler>) })
    }
}

async fn echo_handler(_request: Request, connection: &mut Connection<TcpStream>) {
    loop {
        match connection.receive_message().await {
            Ok(msg) if msg.is_text() => {
                let _ = connection.send_text(msg.into_text().unwrap()).await;
            }
            Ok(msg) if msg.is_close() => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

#[tokio::test]
async fn plain_http_request_gets_a_response() {
    env_logger::try_init().ok();

    let handler = Arc::new(|req: Request| async move { Ok(Response::ok(format!("path={}", req.path))) });
    let handle =
        start_server(0, handler, Arc::new(NoWebSocketHandlers), ServerConfig::default()).await.unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", handle.port())).await.unwrap();
    client.write_all(b"GET /hi HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

    let headers = read_until_blank_line(&mut client).await;
    assert!(headers.starts_with("HTTP/1.0 200 OK"));

    let mut body = vec![0u8; "path=/hi".len()];
    client.read_exact(&mut body).await.unwrap();
    assert_eq!(body, b"path=/hi");

    handle.stop();
}

#[tokio::test]
async fn head_request_suppresses_body() {
    env_logger::try_init().ok();

    let handler = Arc::new(|_req: Request| async { Ok(Response::ok("hello")) });
    let handle =
        start_server(0, handler, Arc::new(NoWebSocketHandlers), ServerConfig::default()).await.unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", handle.port())).await.unwrap();
    client.write_all(b"HEAD / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

    let headers = read_until_blank_line(&mut client).await;
    assert!(headers.contains("Content-Length: 5"));

    // No body bytes should follow; the peer should instead see EOF/no data within a short wait.
    let mut probe = [0u8; 8];
    let res = tokio::time::timeout(Duration::from_millis(100), client.read(&mut probe)).await;
    match res {
        Ok(Ok(0)) => {}
        Err(_) => {}
        other => panic!("expected no body bytes for a HEAD response, got {other:?}"),
    }

    handle.stop();
}

#[tokio::test]
async fn websocket_handshake_and_echo_round_trip() {
    env_logger::try_init().ok();

    let http_handler = Arc::new(|_req: Request| async { Ok(Response::ok("not a websocket")) });
    let handle = start_server(0, http_handler, Arc::new(EchoSelector), ServerConfig::default()).await.unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", handle.port())).await.unwrap();
    client
        .write_all(
            b"GET /ws HTTP/1.1\r\n\
              Host: 127.0.0.1\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
              Sec-WebSocket-Version: 13\r\n\r\n",
        )
        .await
        .unwrap();

    let response = read_until_blank_line(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 101 Switching Protocols"));
    assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

    // An unmasked text frame "hi" (strict_masking defaults to false).
    client.write_all(&[0x81, 0x02, b'h', b'i']).await.unwrap();

    let mut reply = [0u8; 4];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x81, 0x02, b'h', b'i']);

    // A masked Close frame ends the exchange.
    client.write_all(&[0x88, 0x80, 0, 0, 0, 0]).await.unwrap();

    handle.stop();
}

#[tokio::test]
async fn oversize_body_gets_413() {
    env_logger::try_init().ok();

    let handler = Arc::new(|_req: Request| async { Ok(Response::ok("unreachable")) });
    let mut config = ServerConfig::default();
    config.max_request_body_bytes = 4;
    let handle = start_server(0, handler, Arc::new(NoWebSocketHandlers), config).await.unwrap();

    let mut client = TcpStream::connect(("127.0.0.1", handle.port())).await.unwrap();
    client
        .write_all(b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 1000\r\n\r\n")
        .await
        .unwrap();

    let headers = read_until_blank_line(&mut client).await;
    assert!(headers.starts_with("HTTP/1.0 413"));

    handle.stop();
}
