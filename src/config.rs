//! Tunable knobs for a server instance.

/// Configuration for a [`crate::server::start_server`] instance.
///
/// Mirrors the teacher crate's plain-struct-with-`Default` shape (`protocol::WebSocketConfig`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to. Defaults to all interfaces (`0.0.0.0`).
    pub bind_address: std::net::IpAddr,
    /// Read/write deadline for the HTTP phase of a connection (request line, headers, body).
    /// The WebSocket phase, once entered, has no deadline.
    pub http_read_timeout_ms: u64,
    /// Maximum payload size accepted for a single WebSocket frame.
    pub max_frame_payload_bytes: usize,
    /// Maximum `Content-Length` accepted for an HTTP request body.
    pub max_request_body_bytes: usize,
    /// `SO_LINGER` applied to accepted sockets so a close flushes pending data before the
    /// underlying TCP connection tears down.
    pub socket_linger_seconds: u32,
    /// When `true`, an unmasked frame received from a client is a protocol error (RFC 6455
    /// mandates this). When `false` (default), unmasked client frames are accepted for
    /// interoperability, matching observed reference behavior (see `SPEC_FULL.md` §9).
    pub strict_masking: bool,
    /// When `true`, Text messages (and Text frame fragments) are validated as UTF-8
    /// incrementally as they arrive; invalid UTF-8 closes the connection with status 1007.
    /// When `false` (default), Text payloads are delivered without validation.
    pub strict_utf8: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            http_read_timeout_ms: 2_000,
            max_frame_payload_bytes: 16 * 1024 * 1024,
            max_request_body_bytes: 8 * 1024 * 1024,
            socket_linger_seconds: 5,
            strict_masking: false,
            strict_utf8: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_read_timeout_ms, 2_000);
        assert_eq!(cfg.max_frame_payload_bytes, 16 * 1024 * 1024);
        assert_eq!(cfg.max_request_body_bytes, 8 * 1024 * 1024);
        assert_eq!(cfg.socket_linger_seconds, 5);
        assert!(!cfg.strict_masking);
        assert!(!cfg.strict_utf8);
    }
}
