//! Reading and writing raw WebSocket frames over an async stream.

pub mod coding;

#[allow(clippy::module_inception)]
mod frame;
mod mask;

use crate::error::{CapacityError, Error, Result};
use log::*;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub use self::frame::{CloseFrame, Frame, FrameHeader};
pub(crate) use self::mask::apply_mask;

const READ_CHUNK_SIZE: usize = 8192;

/// Reads and writes `Frame`s directly against an `AsyncRead + AsyncWrite` stream, buffering
/// partially-received frame headers and payloads across calls.
#[derive(Debug)]
pub(crate) struct FrameCodec {
    in_buffer: Vec<u8>,
    chunk: Box<[u8]>,
    header: Option<(FrameHeader, u64)>,
}

impl FrameCodec {
    pub(crate) fn new() -> Self {
        FrameCodec { in_buffer: Vec::new(), chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(), header: None }
    }

    /// Construct a codec that already has `residue` bytes buffered, e.g. leftover bytes read
    /// during the HTTP phase that turned out to belong to the first WebSocket frame.
    pub(crate) fn from_partially_read(residue: Vec<u8>) -> Self {
        FrameCodec { in_buffer: residue, chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(), header: None }
    }

    /// Read the next complete frame from `stream`, enforcing `max_size` on the payload length
    /// declared in the header. Returns `Ok(None)` on a clean EOF with no partial frame pending.
    pub(crate) async fn read_frame<S>(&mut self, stream: &mut S, max_size: usize) -> Result<Option<Frame>>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            {
                let mut cursor = Cursor::new(&self.in_buffer);

                if self.header.is_none() {
                    self.header = FrameHeader::parse(&mut cursor)?;
                }

                if let Some((_, length)) = self.header {
                    if length > max_size as u64 {
                        return Err(Error::Capacity(CapacityError::FrameTooLarge {
                            size: length as usize,
                            max_size,
                        }));
                    }

                    let available = self.in_buffer.len() as u64 - cursor.position();
                    if length <= available {
                        let start = cursor.position() as usize;
                        let end = start + length as usize;
                        let payload = self.in_buffer[start..end].to_vec();
                        self.in_buffer.drain(0..end);
                        let (header, _) = self.header.take().expect("frame header just matched");
                        let frame = Frame::from_payload(header, payload.into());
                        trace!("received frame {frame}");
                        return Ok(Some(frame));
                    }
                }
            }

            let n = stream.read(&mut self.chunk).await?;
            if n == 0 {
                return if self.in_buffer.is_empty() { Ok(None) } else { Err(Error::UnexpectedEof) };
            }
            self.in_buffer.extend_from_slice(&self.chunk[..n]);
        }
    }

}

/// Serialize and write a single frame, then flush. Stateless: safe to call from behind a
/// send-side mutex shared with other frame writes on the same stream.
pub(crate) async fn write_frame<S>(stream: &mut S, frame: Frame) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    trace!("writing frame {frame}");
    let mut out = Vec::with_capacity(frame.len());
    frame.format_into_buf(&mut out)?;
    stream.write_all(&out).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor as StdCursor;

    #[tokio::test]
    async fn reads_two_consecutive_frames_and_leaves_residue() {
        let mut raw = StdCursor::new(vec![
            0x82, 0x07, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x82, 0x03, 0x03, 0x02, 0x01,
            0x99,
        ]);
        let mut codec = FrameCodec::new();

        let first = codec.read_frame(&mut raw, usize::MAX).await.unwrap().unwrap();
        assert_eq!(first.payload(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);

        let second = codec.read_frame(&mut raw, usize::MAX).await.unwrap().unwrap();
        assert_eq!(second.payload(), &[0x03, 0x02, 0x01]);

        assert_eq!(codec.in_buffer, vec![0x99]);
    }

    #[tokio::test]
    async fn read_from_partially_read_residue() {
        let mut raw = StdCursor::new(vec![0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        let mut codec = FrameCodec::from_partially_read(vec![0x82, 0x07, 0x01]);
        let frame = codec.read_frame(&mut raw, usize::MAX).await.unwrap().unwrap();
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
    }

    #[tokio::test]
    async fn write_frames_back_to_back() {
        let mut sink = Vec::new();
        write_frame(&mut sink, Frame::ping(vec![0x04, 0x05])).await.unwrap();
        write_frame(&mut sink, Frame::pong(vec![0x01])).await.unwrap();
        assert_eq!(sink, vec![0x89, 0x02, 0x04, 0x05, 0x8a, 0x01, 0x01]);
    }

    #[tokio::test]
    async fn frame_size_limit_is_enforced() {
        let mut raw = StdCursor::new(vec![0x82, 0x07, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        let mut codec = FrameCodec::new();
        let err = codec.read_frame(&mut raw, 5).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Capacity(CapacityError::FrameTooLarge { size: 7, max_size: 5 })
        ));
    }

    #[tokio::test]
    async fn clean_eof_with_no_partial_frame_returns_none() {
        let mut raw = StdCursor::new(Vec::new());
        let mut codec = FrameCodec::new();
        assert!(codec.read_frame(&mut raw, usize::MAX).await.unwrap().is_none());
    }
}
