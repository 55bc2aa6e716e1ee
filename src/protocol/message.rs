//! Assembled WebSocket messages.

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::frame::CloseFrame;

mod string_collect {
    use crate::error::{Error, Result};

    /// Incrementally validates UTF-8 across message fragments as they arrive, so a bad
    /// sequence split across frame boundaries is still caught.
    pub struct StringCollector {
        data: String,
        decoder: utf8::Decoder,
    }

    impl StringCollector {
        pub fn new() -> Self {
            StringCollector { data: String::new(), decoder: utf8::Decoder::new() }
        }

        pub fn extend(&mut self, tail: &[u8]) -> Result<()> {
            let (sym, text, result) = self.decoder.decode(tail);
            self.data.push_str(sym);
            self.data.push_str(text);
            match result {
                utf8::Result::Ok | utf8::Result::Incomplete => Ok(()),
                utf8::Result::Error { .. } => Err(Error::Utf8),
            }
        }

        pub fn into_string(self) -> Result<String> {
            if self.decoder.has_incomplete_sequence() {
                Err(Error::Utf8)
            } else {
                Ok(self.data)
            }
        }
    }
}

use self::string_collect::StringCollector;

enum IncompleteMessageCollector {
    Text(StringCollector),
    LenientText(Vec<u8>),
    Binary(Vec<u8>),
}

/// The kind of message currently being reassembled from Continuation frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteMessageType {
    /// A Text message; fragments are accumulated as bytes until completion.
    Text,
    /// A Binary message.
    Binary,
}

/// A message that is still being reassembled from one or more Continuation frames.
pub struct IncompleteMessage {
    collector: IncompleteMessageCollector,
    size: usize,
}

impl IncompleteMessage {
    /// Begin assembling a new message. `strict_utf8` only matters for `Text`: when true,
    /// UTF-8 is validated incrementally as fragments arrive; when false, invalid sequences
    /// are replaced rather than rejected (matching `ServerConfig::strict_utf8`'s default).
    pub fn new(kind: IncompleteMessageType, strict_utf8: bool) -> Self {
        let collector = match kind {
            IncompleteMessageType::Binary => IncompleteMessageCollector::Binary(Vec::new()),
            IncompleteMessageType::Text if strict_utf8 => {
                IncompleteMessageCollector::Text(StringCollector::new())
            }
            IncompleteMessageType::Text => IncompleteMessageCollector::LenientText(Vec::new()),
        };
        IncompleteMessage { collector, size: 0 }
    }

    /// Number of payload bytes accumulated so far, used by the caller to enforce a
    /// whole-message size limit across fragments.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Append another fragment's payload.
    pub fn extend(&mut self, tail: &[u8]) -> Result<()> {
        self.size += tail.len();
        match &mut self.collector {
            IncompleteMessageCollector::Binary(v) | IncompleteMessageCollector::LenientText(v) => {
                v.extend_from_slice(tail);
                Ok(())
            }
            IncompleteMessageCollector::Text(t) => t.extend(tail),
        }
    }

    /// Finish assembly, producing the completed message.
    pub fn complete(self) -> Result<Message> {
        match self.collector {
            IncompleteMessageCollector::Binary(v) => Ok(Message::Binary(v)),
            IncompleteMessageCollector::Text(t) => Ok(Message::Text(t.into_string()?)),
            IncompleteMessageCollector::LenientText(v) => {
                Ok(Message::Text(String::from_utf8_lossy(&v).into_owned()))
            }
        }
    }
}

/// A complete WebSocket message as delivered to or accepted from application code.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Message {
    /// A UTF-8 text message.
    Text(String),
    /// An opaque binary message.
    Binary(Vec<u8>),
    /// A close handshake message: the peer's status code and reason, if it sent one.
    Close(Option<CloseFrame>),
}

impl Message {
    /// Create a new text message from anything stringable.
    pub fn text<S: Into<String>>(string: S) -> Message {
        Message::Text(string.into())
    }

    /// Create a new binary message from anything byte-vector-like.
    pub fn binary<B: Into<Vec<u8>>>(bin: B) -> Message {
        Message::Binary(bin.into())
    }

    /// True for `Text`.
    pub fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// True for `Binary`.
    pub fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// True for `Close`.
    pub fn is_close(&self) -> bool {
        matches!(self, Message::Close(_))
    }

    /// Length in bytes of the message's payload (0 for `Close`).
    pub fn len(&self) -> usize {
        match self {
            Message::Text(s) => s.len(),
            Message::Binary(b) => b.len(),
            Message::Close(_) => 0,
        }
    }

    /// True if the message carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the message and return its payload as bytes (empty for `Close`).
    pub fn into_data(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(b) => b,
            Message::Close(_) => Vec::new(),
        }
    }

    /// Attempt to consume the message as a `String`, converting a `Binary` payload if it is
    /// valid UTF-8.
    pub fn into_text(self) -> Result<String> {
        match self {
            Message::Text(s) => Ok(s),
            Message::Binary(b) => String::from_utf8(b).map_err(Error::from),
            Message::Close(_) => Ok(String::new()),
        }
    }
}

impl From<String> for Message {
    fn from(string: String) -> Message {
        Message::text(string)
    }
}

impl<'s> From<&'s str> for Message {
    fn from(string: &'s str) -> Message {
        Message::text(string)
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Message {
        Message::binary(data)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::Text(s) => write!(f, "{s}"),
            Message::Binary(b) => write!(f, "Binary Data<length={}>", b.len()),
            Message::Close(Some(frame)) => write!(f, "Close({frame})"),
            Message::Close(None) => write!(f, "Close"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        assert_eq!(Message::text("test").to_string(), "test");
        assert_eq!(Message::binary(vec![0, 1, 3, 4, 241]).to_string(), "Binary Data<length=5>");
    }

    #[test]
    fn lenient_text_replaces_invalid_utf8_instead_of_failing() {
        let mut msg = IncompleteMessage::new(IncompleteMessageType::Text, false);
        msg.extend(&[0xff, 0xfe]).unwrap();
        let completed = msg.complete().unwrap();
        assert!(matches!(completed, Message::Text(_)));
    }

    #[test]
    fn strict_text_rejects_invalid_utf8() {
        let mut msg = IncompleteMessage::new(IncompleteMessageType::Text, true);
        let err = msg.extend(&[0xff, 0xfe]);
        assert!(matches!(err, Err(Error::Utf8)));
    }

    #[test]
    fn strict_text_accepts_sequence_split_across_fragments() {
        let mut msg = IncompleteMessage::new(IncompleteMessageType::Text, true);
        let bytes = "héllo".as_bytes();
        msg.extend(&bytes[..2]).unwrap();
        msg.extend(&bytes[2..]).unwrap();
        assert_eq!(msg.complete().unwrap(), Message::Text("héllo".to_owned()));
    }

    #[test]
    fn binary_reassembly() {
        let mut msg = IncompleteMessage::new(IncompleteMessageType::Binary, false);
        msg.extend(&[1, 2]).unwrap();
        msg.extend(&[3, 4]).unwrap();
        assert_eq!(msg.complete().unwrap(), Message::Binary(vec![1, 2, 3, 4]));
    }
}
