//! Opcodes and close codes as defined by RFC 6455.

use std::convert::From;
use std::fmt;

/// WebSocket message opcode as defined in [RFC 6455](https://tools.ietf.org/html/rfc6455#section-5.2).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OpCode {
    /// Opcodes that carry message data (Continuation, Text, Binary).
    Data(Data),
    /// Opcodes that carry protocol-level signaling (Close, Ping, Pong).
    Control(Control),
}

impl OpCode {
    /// True for `Continuation`, `Text`, and `Binary`.
    pub fn is_data(self) -> bool {
        matches!(self, OpCode::Data(_))
    }

    /// True for `Close`, `Ping`, and `Pong`.
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Control(_))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpCode::Data(d) => write!(f, "{d}"),
            OpCode::Control(c) => write!(f, "{c}"),
        }
    }
}

/// Opcodes belonging to data frames.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Data {
    /// 0x0: continuation of a fragmented message.
    Continue,
    /// 0x1: a text message fragment/frame.
    Text,
    /// 0x2: a binary message fragment/frame.
    Binary,
    /// 0x3-0x7: reserved for future non-control frames.
    Reserved(u8),
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Data::Continue => write!(f, "CONTINUE"),
            Data::Text => write!(f, "TEXT"),
            Data::Binary => write!(f, "BINARY"),
            Data::Reserved(i) => write!(f, "RESERVED_DATA_{i}"),
        }
    }
}

/// Opcodes belonging to control frames.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Control {
    /// 0x8: close handshake.
    Close,
    /// 0x9: a ping.
    Ping,
    /// 0xA: a pong.
    Pong,
    /// 0xB-0xF: reserved for future control frames.
    Reserved(u8),
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Control::Close => write!(f, "CLOSE"),
            Control::Ping => write!(f, "PING"),
            Control::Pong => write!(f, "PONG"),
            Control::Reserved(i) => write!(f, "RESERVED_CONTROL_{i}"),
        }
    }
}

impl From<u8> for OpCode {
    fn from(byte: u8) -> Self {
        match byte {
            0 => OpCode::Data(Data::Continue),
            1 => OpCode::Data(Data::Text),
            2 => OpCode::Data(Data::Binary),
            3..=7 => OpCode::Data(Data::Reserved(byte)),
            8 => OpCode::Control(Control::Close),
            9 => OpCode::Control(Control::Ping),
            10 => OpCode::Control(Control::Pong),
            11..=15 => OpCode::Control(Control::Reserved(byte)),
            _ => unreachable!("opcode nibble {byte} out of range"),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        match opcode {
            OpCode::Data(Data::Continue) => 0,
            OpCode::Data(Data::Text) => 1,
            OpCode::Data(Data::Binary) => 2,
            OpCode::Data(Data::Reserved(i)) => i,
            OpCode::Control(Control::Close) => 8,
            OpCode::Control(Control::Ping) => 9,
            OpCode::Control(Control::Pong) => 10,
            OpCode::Control(Control::Reserved(i)) => i,
        }
    }
}

/// Status code used in a Close frame, per
/// [RFC 6455 §7.4](https://tools.ietf.org/html/rfc6455#section-7.4).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CloseCode {
    /// 1000: normal closure.
    Normal,
    /// 1001: endpoint is going away (server shutdown, browser navigating off).
    Away,
    /// 1002: protocol error.
    Protocol,
    /// 1003: received a data type it cannot accept.
    Unsupported,
    /// 1005: reserved; no status code was present. Never sent on the wire.
    NoStatusRcvd,
    /// 1006: reserved; abnormal closure with no Close frame. Never sent on the wire.
    Abnormal,
    /// 1007: inconsistent data within a message (e.g. non-UTF-8 in a Text message).
    Invalid,
    /// 1008: generic policy violation.
    Policy,
    /// 1009: message too big to process.
    Size,
    /// 1010: client expected the server to negotiate one or more extensions.
    Extension,
    /// 1011: server encountered an unexpected condition.
    Error,
    /// 1015: reserved; TLS handshake failure. Never sent on the wire.
    Tls,
    /// An application-defined code in the 3000-4999 range, or any other value observed on
    /// the wire that this implementation does not otherwise interpret.
    Other(u16),
}

impl CloseCode {
    /// Whether this code is one a peer is permitted to echo back in a closing handshake reply,
    /// per RFC 6455 §7.4.1's table of defined codes plus the 3000-4999 application range.
    pub fn is_allowed(self) -> bool {
        !matches!(
            self,
            CloseCode::NoStatusRcvd | CloseCode::Abnormal | CloseCode::Tls | CloseCode::Other(_)
        ) || matches!(self, CloseCode::Other(code) if (3000..5000).contains(&code))
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::Protocol,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatusRcvd,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::Invalid,
            1008 => CloseCode::Policy,
            1009 => CloseCode::Size,
            1010 => CloseCode::Extension,
            1011 => CloseCode::Error,
            1015 => CloseCode::Tls,
            other => CloseCode::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatusRcvd => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::Invalid => 1007,
            CloseCode::Policy => 1008,
            CloseCode::Size => 1009,
            CloseCode::Extension => 1010,
            CloseCode::Error => 1011,
            CloseCode::Tls => 1015,
            CloseCode::Other(code) => code,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", u16::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips() {
        for byte in 0..16u8 {
            let opcode = OpCode::from(byte);
            assert_eq!(u8::from(opcode), byte);
        }
    }

    #[test]
    fn reserved_opcodes_are_neither_normal_data_nor_control_variant() {
        assert_eq!(OpCode::from(3), OpCode::Data(Data::Reserved(3)));
        assert_eq!(OpCode::from(11), OpCode::Control(Control::Reserved(11)));
    }

    #[test]
    fn close_code_round_trips() {
        for code in [1000u16, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 4000] {
            assert_eq!(u16::from(CloseCode::from(code)), code);
        }
    }

    #[test]
    fn reserved_close_codes_are_never_allowed_to_be_echoed() {
        assert!(!CloseCode::NoStatusRcvd.is_allowed());
        assert!(!CloseCode::Abnormal.is_allowed());
        assert!(!CloseCode::Tls.is_allowed());
        assert!(CloseCode::Normal.is_allowed());
        assert!(CloseCode::Other(4000).is_allowed());
        assert!(!CloseCode::Other(2999).is_allowed());
    }
}
