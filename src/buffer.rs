//! A line-oriented reader over an unbuffered async stream.
//!
//! `LineReader` is a FIFO residue buffer, the async counterpart of the teacher crate's
//! `ReadBuffer`: bytes pulled from the stream but not yet handed to a caller sit in `residue`
//! until consumed by `read_line` or `read_body`. The same residue slot is shared across both
//! operations so that bytes of the request body that were speculatively read along with the
//! final header line are not lost.
//!
//! Under cooperative (tokio) scheduling there is no distinct "would this read block" question
//! the way there is over a synchronous socket — `.await` already only suspends when the stream
//! has nothing buffered. The teacher's `force_read` parameter therefore collapses to "always
//! await"; there is no non-blocking variant here.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A FIFO buffer for reading lines and fixed-size bodies from the network.
#[derive(Debug)]
pub struct LineReader {
    residue: Vec<u8>,
    chunk: Box<[u8]>,
}

impl LineReader {
    /// Create a new, empty line reader with the default chunk size (4096 bytes).
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a new, empty line reader with a given read chunk size.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        LineReader { residue: Vec::new(), chunk: vec![0u8; chunk_size].into_boxed_slice() }
    }

    /// True if a complete line or body chunk might already be satisfiable without touching the
    /// stream.
    pub fn has_buffered(&self) -> bool {
        !self.residue.is_empty()
    }

    /// Drain and return whatever bytes are currently buffered. Used when a stream is handed off
    /// to a different reader (e.g. the WebSocket frame codec after a handshake) so buffered
    /// bytes that already belong to the next layer aren't lost.
    pub(crate) fn take_residue(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.residue)
    }

    /// Read one line terminated by CR, LF, or CRLF. The terminator is consumed but not
    /// included in the returned line. On end-of-input before any terminator is seen, returns
    /// whatever was accumulated (empty string if nothing was buffered).
    pub async fn read_line<S>(&mut self, stream: &mut S) -> Result<String>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            if let Some((line, consumed)) = Self::scan_line(&self.residue) {
                self.residue.drain(0..consumed);
                return Ok(line);
            }
            let n = self.fill(stream).await?;
            if n == 0 {
                let line = String::from_utf8_lossy(&self.residue).into_owned();
                self.residue.clear();
                return Ok(line);
            }
        }
    }

    /// Read exactly `len` bytes: residue first, then directly from the stream. Used for
    /// `Content-Length` bodies.
    pub async fn read_body<S>(&mut self, stream: &mut S, len: usize) -> Result<Vec<u8>>
    where
        S: AsyncRead + Unpin,
    {
        while self.residue.len() < len {
            let n = self.fill(stream).await?;
            if n == 0 {
                return Err(Error::UnexpectedEof);
            }
        }
        Ok(self.residue.drain(0..len).collect())
    }

    async fn fill<S>(&mut self, stream: &mut S) -> Result<usize>
    where
        S: AsyncRead + Unpin,
    {
        let n = stream.read(&mut self.chunk).await?;
        self.residue.extend_from_slice(&self.chunk[..n]);
        Ok(n)
    }

    /// Scan `buf` for the first CR/LF/CRLF terminator. Returns the decoded line and the number
    /// of bytes (including the terminator) consumed, or `None` if no terminator is present yet
    /// (including the ambiguous case of a trailing lone CR that might start a CRLF pair).
    fn scan_line(buf: &[u8]) -> Option<(String, usize)> {
        for i in 0..buf.len() {
            match buf[i] {
                b'\n' => {
                    let end = if i > 0 && buf[i - 1] == b'\r' { i - 1 } else { i };
                    return Some((String::from_utf8_lossy(&buf[..end]).into_owned(), i + 1));
                }
                b'\r' => {
                    if i + 1 >= buf.len() {
                        // Could be the start of a CRLF pair; wait for the next byte.
                        return None;
                    }
                    let consumed = if buf[i + 1] == b'\n' { i + 2 } else { i + 1 };
                    return Some((String::from_utf8_lossy(&buf[..i]).into_owned(), consumed));
                }
                _ => {}
            }
        }
        None
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_lf_terminated_line() {
        let mut input = Cursor::new(b"GET / HTTP/1.1\nHost: x\n\n".to_vec());
        let mut reader = LineReader::new();
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "GET / HTTP/1.1");
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "Host: x");
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "");
    }

    #[tokio::test]
    async fn reads_crlf_terminated_line() {
        let mut input = Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n".to_vec());
        let mut reader = LineReader::new();
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "GET / HTTP/1.1");
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "Host: x");
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "");
    }

    #[tokio::test]
    async fn preserves_residue_across_body_boundary() {
        // The header's final CRLF and the first body byte arrive in the same read.
        let mut input = Cursor::new(b"Host: x\r\nHELLOBODY".to_vec());
        let mut reader = LineReader::with_chunk_size(4096);
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "Host: x");
        let body = reader.read_body(&mut input, 9).await.unwrap();
        assert_eq!(body, b"HELLOBODY");
    }

    #[tokio::test]
    async fn small_chunk_size_splits_reads_across_many_fills() {
        let mut input = Cursor::new(b"abc\r\ndef\r\n".to_vec());
        let mut reader = LineReader::with_chunk_size(2);
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "abc");
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "def");
    }

    #[tokio::test]
    async fn eof_before_terminator_returns_accumulated_bytes() {
        let mut input = Cursor::new(b"no terminator here".to_vec());
        let mut reader = LineReader::new();
        assert_eq!(reader.read_line(&mut input).await.unwrap(), "no terminator here");
    }

    #[tokio::test]
    async fn read_body_errors_on_early_eof() {
        let mut input = Cursor::new(b"short".to_vec());
        let mut reader = LineReader::new();
        let err = reader.read_body(&mut input, 10).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
    }
}
