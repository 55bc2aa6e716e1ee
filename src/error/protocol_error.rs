/// Indicates the specific type/cause of a protocol error.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProtocolError {
    /// Reserved bits in the frame header are non-zero, and no extension that would define
    /// their meaning is negotiated.
    #[error("reserved bits are non-zero")]
    NonZeroReservedBits,
    /// Control frames must not be fragmented.
    #[error("fragmented control frame")]
    FragmentedControlFrame,
    /// Control frames must have a payload of 125 bytes or less.
    #[error("control frame too big (payload must be 125 bytes or less)")]
    ControlFrameTooBig,
    /// The 64-bit extended payload length had its high bit set.
    #[error("64-bit payload length has the high bit set")]
    InvalidPayloadLength,
    /// An opcode nibble that does not correspond to a known data or control opcode.
    #[error("invalid opcode: {0}")]
    InvalidOpcode(u8),
    /// A Continuation frame arrived with no message in progress to continue.
    #[error("continuation frame but nothing to continue")]
    UnexpectedContinueFrame,
    /// A Text or Binary frame arrived while a message of a different type was still being
    /// assembled.
    #[error("received a new data frame while a fragmented message was in progress")]
    ExpectedFragment,
    /// The connection was reset (EOF) without a closing handshake ever taking place.
    #[error("connection reset without closing handshake")]
    ResetWithoutClosingHandshake,
    /// A Close frame's payload was exactly one byte (a status code needs at least two).
    #[error("invalid close frame payload")]
    InvalidCloseSequence,
    /// The client sent an unmasked frame and `ServerConfig::strict_masking` is enabled.
    #[error("received an unmasked frame from client")]
    UnmaskedFrameFromClient,
    /// The HTTP request did not qualify as a WebSocket upgrade when one was required.
    #[error("request is not a valid WebSocket upgrade")]
    NotAnUpgrade,
}
