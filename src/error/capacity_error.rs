/// Indicates the specific type/cause of a capacity error.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CapacityError {
    /// A single WebSocket frame's payload exceeded `ServerConfig::max_frame_payload_bytes`.
    #[error("frame payload too large: {size} > {max_size}")]
    FrameTooLarge {
        /// The declared size of the frame payload.
        size: usize,
        /// The configured maximum.
        max_size: usize,
    },
    /// An HTTP request body exceeded `ServerConfig::max_request_body_bytes`.
    #[error("request body too large: {size} > {max_size}")]
    BodyTooLarge {
        /// The declared `Content-Length`.
        size: usize,
        /// The configured maximum.
        max_size: usize,
    },
}
