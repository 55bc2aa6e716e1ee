//! Recognizing and completing the WebSocket upgrade handshake.
//!
//! Grounded on the teacher crate's `handshake::server` module: the accept-key derivation
//! (`convert_key`) and the upgrade-request checks it runs before replying, generalized onto
//! this crate's own `Request` type and written directly against the accept-key constant rather
//! than threaded through `httparse`.

use data_encoding::BASE64;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::http::{request::Headers, Request};

/// The fixed GUID appended to the client's key before hashing, per RFC 6455 §1.3.
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// True iff `request` qualifies as a WebSocket upgrade per RFC 6455 §4.2.1.
pub fn is_upgrade(request: &Request) -> bool {
    request.method == "GET"
        && is_http_1_1_or_higher(&request.http_version)
        && request.headers.contains_token("Connection", "upgrade")
        && request.headers.get_first("Upgrade").is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
        && request.headers.get_first("Sec-WebSocket-Key").is_some_and(|k| !k.trim().is_empty())
        && request.headers.get_first("Sec-WebSocket-Version").map(str::trim) == Some("13")
}

fn is_http_1_1_or_higher(version: &str) -> bool {
    match version.strip_prefix("HTTP/") {
        Some(rest) => match rest.split_once('.') {
            Some((major, minor)) => {
                let major: u32 = major.parse().unwrap_or(0);
                let minor: u32 = minor.parse().unwrap_or(0);
                major > 1 || (major == 1 && minor >= 1)
            }
            None => rest.parse::<u32>().unwrap_or(0) > 1,
        },
        None => false,
    }
}

/// Derive the `Sec-WebSocket-Accept` value for a client's `Sec-WebSocket-Key`.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(&hasher.finalize())
}

/// The `Sec-WebSocket-Key` of an upgrade request, or `None` if absent. Used by the worker to
/// compute the accept key once `is_upgrade` has already confirmed the request qualifies.
pub fn client_key(headers: &Headers) -> Option<&str> {
    headers.get_first("Sec-WebSocket-Key")
}

/// Write the `101 Switching Protocols` response completing the handshake.
pub(crate) async fn emit_101<S>(stream: &mut S, accept_key: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    crate::http::response::write_101(stream, accept_key).await
}
