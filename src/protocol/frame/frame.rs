use log::*;
use std::{
    fmt,
    io::{Cursor, ErrorKind, Read, Write},
    mem,
    string::String,
};

use super::{
    coding::{CloseCode, Control, Data, OpCode},
    mask::{apply_mask, generate_mask},
};
use crate::error::{Error, ProtocolError, Result};
use bytes::{Bytes, BytesMut};

/// A parsed Close frame payload: status code plus an optional human-readable reason.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CloseFrame {
    /// The reason as a code.
    pub code: CloseCode,
    /// The reason as text.
    pub reason: String,
}

impl fmt::Display for CloseFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.code)
    }
}

/// A WebSocket frame header: everything but the payload bytes.
#[allow(missing_copy_implementations)]
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FrameHeader {
    /// Indicates that the frame is the last one of a possibly fragmented message.
    pub is_final: bool,
    /// Reserved for protocol extensions. Must be zero; no extensions are negotiated.
    pub rsv1: bool,
    /// Reserved for protocol extensions. Must be zero; no extensions are negotiated.
    pub rsv2: bool,
    /// Reserved for protocol extensions. Must be zero; no extensions are negotiated.
    pub rsv3: bool,
    /// WebSocket protocol opcode.
    pub opcode: OpCode,
    /// A frame mask, if any.
    pub mask: Option<[u8; 4]>,
}

impl Default for FrameHeader {
    fn default() -> Self {
        FrameHeader {
            is_final: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::Control(Control::Close),
            mask: None,
        }
    }
}

impl FrameHeader {
    /// The longest possible header: 2 base bytes + 8-byte extended length + 4-byte mask.
    pub(crate) const MAX_SIZE: usize = 14;

    /// Parse a header from the front of `cursor`. Returns `None` if there isn't yet enough
    /// data buffered to know the full header length, leaving the cursor position unchanged
    /// so the caller can retry once more bytes have arrived. Returns the header along with
    /// the payload length found in the header.
    pub fn parse(cursor: &mut Cursor<impl AsRef<[u8]>>) -> Result<Option<(Self, u64)>> {
        let initial = cursor.position();
        match Self::parse_internal(cursor) {
            ret @ Ok(None) => {
                cursor.set_position(initial);
                ret
            }
            ret => ret,
        }
    }

    /// Size in bytes of the header that would be formatted for a payload of `length` bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self, length: u64) -> usize {
        2 + LengthFormat::for_length(length).extra_bytes() + if self.mask.is_some() { 4 } else { 0 }
    }

    /// Format a header for the given payload size.
    pub fn format(&self, length: u64, output: &mut impl Write) -> Result<()> {
        let code: u8 = self.opcode.into();

        let one = code
            | if self.is_final { 0x80 } else { 0 }
            | if self.rsv1 { 0x40 } else { 0 }
            | if self.rsv2 { 0x20 } else { 0 }
            | if self.rsv3 { 0x10 } else { 0 };

        let lenfmt = LengthFormat::for_length(length);
        let two = lenfmt.length_byte() | if self.mask.is_some() { 0x80 } else { 0 };

        output.write_all(&[one, two])?;
        match lenfmt {
            LengthFormat::U8(_) => (),
            LengthFormat::U16 => output.write_all(&(length as u16).to_be_bytes())?,
            LengthFormat::U64 => output.write_all(&length.to_be_bytes())?,
        }

        if let Some(ref mask) = self.mask {
            output.write_all(mask)?;
        }

        Ok(())
    }

    /// Generate a random frame mask and store it in the header. Does not touch the payload;
    /// the actual XOR happens when the frame is formatted.
    pub(crate) fn set_random_mask(&mut self) {
        self.mask = Some(generate_mask());
    }

    fn parse_internal(cursor: &mut impl Read) -> Result<Option<(Self, u64)>> {
        let (first, second) = {
            let mut head = [0u8; 2];
            if cursor.read(&mut head)? != 2 {
                return Ok(None);
            }
            (head[0], head[1])
        };

        let is_final = first & 0x80 != 0;
        let rsv1 = first & 0x40 != 0;
        let rsv2 = first & 0x20 != 0;
        let rsv3 = first & 0x10 != 0;

        let opcode = OpCode::from(first & 0x0F);
        let masked = second & 0x80 != 0;

        let length = {
            let length_byte = second & 0x7F;
            let length_length = LengthFormat::for_byte(length_byte).extra_bytes();
            if length_length > 0 {
                const SIZE: usize = mem::size_of::<u64>();
                let start = SIZE - length_length;
                let mut buffer = [0; SIZE];
                match cursor.read_exact(&mut buffer[start..]) {
                    Err(ref err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                    Err(err) => return Err(err.into()),
                    Ok(()) => {
                        let value = u64::from_be_bytes(buffer);
                        if length_length == 8 && value & (1 << 63) != 0 {
                            return Err(Error::Protocol(ProtocolError::InvalidPayloadLength));
                        }
                        value
                    }
                }
            } else {
                u64::from(length_byte)
            }
        };

        let mask = if masked {
            let mut mask_bytes = [0u8; 4];
            if cursor.read(&mut mask_bytes)? != 4 {
                return Ok(None);
            }
            Some(mask_bytes)
        } else {
            None
        };

        match opcode {
            OpCode::Control(Control::Reserved(_)) | OpCode::Data(Data::Reserved(_)) => {
                return Err(Error::Protocol(ProtocolError::InvalidOpcode(first & 0x0F)))
            }
            _ => (),
        }

        if rsv1 || rsv2 || rsv3 {
            return Err(Error::Protocol(ProtocolError::NonZeroReservedBits));
        }

        if opcode.is_control() {
            if !is_final {
                return Err(Error::Protocol(ProtocolError::FragmentedControlFrame));
            }
            if length > 125 {
                return Err(Error::Protocol(ProtocolError::ControlFrameTooBig));
            }
        }

        let hdr = FrameHeader { is_final, rsv1, rsv2, rsv3, opcode, mask };
        Ok(Some((hdr, length)))
    }
}

/// A complete WebSocket frame: header plus payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    header: FrameHeader,
    payload: Bytes,
}

impl Frame {
    /// Total encoded length: header bytes plus payload bytes.
    #[inline]
    pub fn len(&self) -> usize {
        let length = self.payload.len();
        self.header.len(length as u64) + length
    }

    /// True if the frame is empty (zero-length header-less frame; never actually occurs).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared reference to the frame's header.
    #[inline]
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// The frame's opcode.
    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// Whether this is the final frame of its message.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.header.is_final
    }

    /// Reference to the frame's payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True if the header carries a mask key.
    #[inline]
    pub fn is_masked(&self) -> bool {
        self.header.mask.is_some()
    }

    /// Generate a random mask for the frame. Only changes the header; the payload is masked
    /// when the frame is serialized.
    #[inline]
    pub(crate) fn set_random_mask(&mut self) {
        self.header.set_random_mask();
    }

    /// Consume the frame, returning its payload.
    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Consume a Close frame's payload into a parsed `CloseFrame`, or `None` for a bodyless
    /// close.
    #[inline]
    pub(crate) fn into_close(self) -> Result<Option<CloseFrame>> {
        match self.payload.len() {
            0 => Ok(None),
            1 => Err(Error::Protocol(ProtocolError::InvalidCloseSequence)),
            _ => {
                let code = u16::from_be_bytes([self.payload[0], self.payload[1]]).into();
                let reason = String::from_utf8(self.payload.slice(2..).to_vec())?;
                Ok(Some(CloseFrame { code, reason }))
            }
        }
    }

    /// Create a new data frame (Text, Binary, or Continuation).
    #[inline]
    pub fn message(data: impl Into<Bytes>, opcode: OpCode, is_final: bool) -> Frame {
        debug_assert!(matches!(opcode, OpCode::Data(_)), "invalid opcode for a data frame");
        Frame { header: FrameHeader { is_final, opcode, ..FrameHeader::default() }, payload: data.into() }
    }

    /// Create a new Pong control frame.
    #[inline]
    pub fn pong(data: impl Into<Bytes>) -> Frame {
        Frame {
            header: FrameHeader { opcode: OpCode::Control(Control::Pong), ..FrameHeader::default() },
            payload: data.into(),
        }
    }

    /// Create a new Ping control frame.
    #[inline]
    pub fn ping(data: impl Into<Bytes>) -> Frame {
        Frame {
            header: FrameHeader { opcode: OpCode::Control(Control::Ping), ..FrameHeader::default() },
            payload: data.into(),
        }
    }

    /// Create a new Close control frame.
    #[inline]
    pub fn close(msg: Option<CloseFrame>) -> Frame {
        let payload = if let Some(CloseFrame { code, reason }) = msg {
            let mut p = BytesMut::with_capacity(reason.len() + 2);
            p.extend(u16::from(code).to_be_bytes());
            p.extend_from_slice(reason.as_bytes());
            p
        } else {
            BytesMut::new()
        };

        Frame { header: FrameHeader::default(), payload: payload.into() }
    }

    /// Build a frame directly from a header and payload (used when re-emitting a frame read
    /// off the wire, e.g. echoing a Ping's payload back as a Pong).
    pub fn from_payload(header: FrameHeader, payload: Bytes) -> Self {
        Frame { header, payload }
    }

    /// Serialize the frame (header, then payload, masked in place if a mask is set) to the
    /// end of `buf`.
    pub(crate) fn format_into_buf(mut self, buf: &mut Vec<u8>) -> Result<()> {
        self.header.format(self.payload.len() as u64, buf)?;

        let start = buf.len();
        buf.extend_from_slice(&self.payload);

        if let Some(mask) = self.header.mask.take() {
            apply_mask(&mut buf[start..], mask);
        }

        Ok(())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use std::fmt::Write;

        write!(
            f,
            "<FRAME final={} rsv={}{}{} opcode={} len={} payload_len={} payload=0x{}>",
            self.header.is_final,
            self.header.rsv1 as u8,
            self.header.rsv2 as u8,
            self.header.rsv3 as u8,
            self.header.opcode,
            self.len(),
            self.payload.len(),
            self.payload.iter().fold(String::new(), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
        )
    }
}

/// The three ways a payload length can be encoded in a frame header.
enum LengthFormat {
    U8(u8),
    U16,
    U64,
}

impl LengthFormat {
    #[inline]
    fn for_length(length: u64) -> Self {
        if length < 126 {
            LengthFormat::U8(length as u8)
        } else if length < 65536 {
            LengthFormat::U16
        } else {
            LengthFormat::U64
        }
    }

    #[inline]
    fn extra_bytes(&self) -> usize {
        match *self {
            LengthFormat::U8(_) => 0,
            LengthFormat::U16 => 2,
            LengthFormat::U64 => 8,
        }
    }

    #[inline]
    fn length_byte(&self) -> u8 {
        match *self {
            LengthFormat::U8(b) => b,
            LengthFormat::U16 => 126,
            LengthFormat::U64 => 127,
        }
    }

    #[inline]
    fn for_byte(byte: u8) -> Self {
        match byte & 0x7F {
            126 => LengthFormat::U16,
            127 => LengthFormat::U64,
            b => LengthFormat::U8(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn parse_header_and_payload() {
        let mut raw: Cursor<Vec<u8>> =
            Cursor::new(vec![0x82, 0x07, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        let (header, length) = FrameHeader::parse(&mut raw).unwrap().unwrap();
        assert_eq!(length, 7);
        let mut payload = Vec::new();
        raw.read_to_end(&mut payload).unwrap();
        let frame = Frame::from_payload(header, payload.into());
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07][..]);
    }

    #[test]
    fn parse_returns_none_on_incomplete_header() {
        let mut raw: Cursor<Vec<u8>> = Cursor::new(vec![0x82]);
        assert!(FrameHeader::parse(&mut raw).unwrap().is_none());
        assert_eq!(raw.position(), 0);
    }

    #[test]
    fn format_into_buf_masks_payload() {
        let mut frame = Frame::ping(vec![0x01, 0x02]);
        frame.set_random_mask();
        let mut buf = Vec::new();
        frame.clone().format_into_buf(&mut buf).unwrap();
        assert_eq!(buf[0], 0x89);
        assert_eq!(buf[1] & 0x80, 0x80);
    }

    #[test]
    fn unmasked_ping_round_trip_bytes() {
        let frame = Frame::ping(vec![0x01, 0x02]);
        let mut buf = Vec::new();
        frame.format_into_buf(&mut buf).unwrap();
        assert_eq!(buf, vec![0x89, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let mut raw: Cursor<Vec<u8>> = Cursor::new(vec![0xA2, 0x00]);
        let err = FrameHeader::parse(&mut raw).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::NonZeroReservedBits)));
    }

    #[test]
    fn oversized_control_frame_is_rejected() {
        let mut raw: Cursor<Vec<u8>> = Cursor::new(vec![0x89, 126, 0, 200]);
        let err = FrameHeader::parse(&mut raw).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::ControlFrameTooBig)));
    }

    #[test]
    fn display() {
        let f = Frame::message(Bytes::from_static(b"hi there"), OpCode::Data(Data::Text), true);
        let view = format!("{f}");
        assert!(view.contains("payload="));
    }
}
