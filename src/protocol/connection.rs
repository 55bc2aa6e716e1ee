//! The async Connection State Machine: reassembles messages from frames, answers Pings with
//! Pongs, and serializes outgoing frames behind a single-slot send mutex.
//!
//! Grounded on the teacher crate's `protocol::WebSocket` (`read_message`/`write_message`/
//! `close`), generalized from its buffered synchronous `FrameSocket` to a pair of split
//! `tokio::io::{ReadHalf, WriteHalf}` halves so sends can be issued from a different task than
//! the one driving `receive_message`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::*;
use tokio::io::{split, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{CapacityError, Error, ProtocolError, Result};
use crate::protocol::frame::coding::{CloseCode, Control, Data, OpCode};
use crate::protocol::frame::{self, CloseFrame, Frame, FrameCodec};
use crate::protocol::message::{IncompleteMessage, IncompleteMessageType};
use crate::Message;

type PingHook = Box<dyn Fn(&[u8]) + Send + Sync>;

/// The close status to emit for an error that terminates `receive_message`, if any. Mirrors the
/// error-kind -> close-status table: protocol errors close with 1002, oversize frames with 1009,
/// and (when strict UTF-8 validation is enabled) invalid text with 1007. Errors outside this set
/// (I/O failure, cancellation, an already-closed connection) have no frame to send.
fn close_code_for(err: &Error) -> Option<u16> {
    match err {
        Error::Protocol(_) => Some(1002),
        Error::Capacity(CapacityError::FrameTooLarge { .. }) => Some(1009),
        Error::Utf8 => Some(1007),
        _ => None,
    }
}

/// A live, post-handshake WebSocket connection.
///
/// `receive_message` is single-reader (`&mut self`); the send methods take `&self` and may be
/// called concurrently from other tasks that hold a cloned handle to the same connection's
/// send side (see [`Connection::sender`]).
pub struct Connection<S> {
    read_half: ReadHalf<S>,
    read_codec: FrameCodec,
    write_half: Arc<Mutex<WriteHalf<S>>>,
    config: ServerConfig,
    incomplete: Option<IncompleteMessage>,
    is_open: bool,
    close_sent: Arc<AtomicBool>,
    on_ping: Option<PingHook>,
    on_pong: Option<PingHook>,
    cancel: CancellationToken,
}

/// A cloneable send-only handle to a [`Connection`]. Useful for broadcasting from a task other
/// than the one driving `receive_message`.
///
/// Shares its `close_sent` flag with the `Connection` it was obtained from (and with every other
/// clone/`Sender`), the way the teacher crate's `WriteHalf` tracks a `closed` flag alongside its
/// stream: once `Connection::close` has fired, every outstanding `Sender` rejects further sends
/// instead of racing a frame onto an already-closed wire.
#[derive(Clone)]
pub struct Sender<S> {
    write_half: Arc<Mutex<WriteHalf<S>>>,
    close_sent: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Build a connection from a stream that has just completed the WebSocket handshake.
    /// `residue` is any bytes read past the handshake's terminating blank line that already
    /// belong to the first WebSocket frame.
    pub(crate) fn new(stream: S, residue: Vec<u8>, config: ServerConfig, cancel: CancellationToken) -> Self {
        let (read_half, write_half) = split(stream);
        Connection {
            read_half,
            read_codec: FrameCodec::from_partially_read(residue),
            write_half: Arc::new(Mutex::new(write_half)),
            config,
            incomplete: None,
            is_open: true,
            close_sent: Arc::new(AtomicBool::new(false)),
            on_ping: None,
            on_pong: None,
            cancel,
        }
    }

    /// `false` once a Close frame has been received, or once we have sent one.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Register a callback invoked (synchronously, inline) whenever a Ping frame is received,
    /// after the automatic Pong has been queued.
    pub fn on_ping(&mut self, hook: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.on_ping = Some(Box::new(hook));
    }

    /// Register a callback invoked whenever a Pong frame is received.
    pub fn on_pong(&mut self, hook: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.on_pong = Some(Box::new(hook));
    }

    /// A cloneable handle that can send on this connection from another task.
    pub fn sender(&self) -> Sender<S> {
        Sender {
            write_half: Arc::clone(&self.write_half),
            close_sent: Arc::clone(&self.close_sent),
            cancel: self.cancel.clone(),
        }
    }

    /// Read and reassemble the next message, transparently answering Pings with Pongs and
    /// exposing Ping/Pong events via the registered hooks. Returns a `Close` message as soon
    /// as one is received; the caller decides whether/how to reply via `close()`.
    ///
    /// A terminating protocol or capacity error closes the connection with the matching
    /// WebSocket close status (1002/1009/1007) before being returned to the caller.
    pub async fn receive_message(&mut self) -> Result<Message> {
        match self.receive_message_inner().await {
            Ok(msg) => Ok(msg),
            Err(e) => {
                if let Some(code) = close_code_for(&e) {
                    let _ = self.close(Some(code), "").await;
                }
                Err(e)
            }
        }
    }

    async fn receive_message_inner(&mut self) -> Result<Message> {
        loop {
            let frame = self.read_one_frame().await?;

            match frame.opcode() {
                OpCode::Control(Control::Close) => {
                    self.is_open = false;
                    let close = frame.into_close()?;
                    debug!("received close frame: {close:?}");
                    return Ok(Message::Close(close));
                }
                OpCode::Control(Control::Ping) => {
                    let payload = frame.payload().to_vec();
                    if let Some(hook) = &self.on_ping {
                        hook(&payload);
                    }
                    self.send_pong(payload).await?;
                }
                OpCode::Control(Control::Pong) => {
                    if let Some(hook) = &self.on_pong {
                        hook(frame.payload());
                    }
                }
                OpCode::Control(Control::Reserved(i)) => {
                    return Err(Error::Protocol(ProtocolError::InvalidOpcode(i)));
                }
                OpCode::Data(Data::Continue) => {
                    let fin = frame.is_final();
                    match &mut self.incomplete {
                        Some(msg) => msg.extend(frame.payload())?,
                        None => return Err(Error::Protocol(ProtocolError::UnexpectedContinueFrame)),
                    }
                    if fin {
                        let msg = self.incomplete.take().expect("just matched Some above");
                        return msg.complete();
                    }
                }
                OpCode::Data(Data::Text) | OpCode::Data(Data::Binary) if self.incomplete.is_some() => {
                    return Err(Error::Protocol(ProtocolError::ExpectedFragment));
                }
                OpCode::Data(Data::Text) => {
                    let fin = frame.is_final();
                    let mut msg = IncompleteMessage::new(IncompleteMessageType::Text, self.config.strict_utf8);
                    msg.extend(frame.payload())?;
                    if fin {
                        return msg.complete();
                    }
                    self.incomplete = Some(msg);
                }
                OpCode::Data(Data::Binary) => {
                    let fin = frame.is_final();
                    let mut msg = IncompleteMessage::new(IncompleteMessageType::Binary, self.config.strict_utf8);
                    msg.extend(frame.payload())?;
                    if fin {
                        return msg.complete();
                    }
                    self.incomplete = Some(msg);
                }
                OpCode::Data(Data::Reserved(i)) => {
                    return Err(Error::Protocol(ProtocolError::InvalidOpcode(i)));
                }
            }
        }
    }

    async fn read_one_frame(&mut self) -> Result<Frame> {
        let max_size = self.config.max_frame_payload_bytes;
        let read = self.read_codec.read_frame(&mut self.read_half, max_size);
        let frame = tokio::select! {
            res = read => res?,
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
        };

        match frame {
            Some(frame) => {
                if self.config.strict_masking && !frame.is_masked() {
                    return Err(Error::Protocol(ProtocolError::UnmaskedFrameFromClient));
                }
                Ok(frame)
            }
            None if !self.is_open => Err(Error::ConnectionClosed),
            None => Err(Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)),
        }
    }

    /// Send a Text message.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_data(Frame::message(text.into().into_bytes(), OpCode::Data(Data::Text), true)).await
    }

    /// Send a Binary message.
    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_data(Frame::message(data.into(), OpCode::Data(Data::Binary), true)).await
    }

    /// Send a Ping with an optional application payload (must be 125 bytes or fewer).
    pub async fn send_ping(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_data(Frame::ping(data.into())).await
    }

    async fn send_pong(&self, data: Vec<u8>) -> Result<()> {
        self.send_data(Frame::pong(data)).await
    }

    async fn send_data(&self, frame: Frame) -> Result<()> {
        if self.close_sent.load(Ordering::SeqCst) {
            return Err(Error::AlreadyClosed);
        }
        send_frame(&self.write_half, &self.cancel, frame).await
    }

    /// Close the connection, optionally with a status code and reason. Idempotent: a second
    /// call (from this `Connection` or any `Sender` sharing its close flag) is a no-op that
    /// writes nothing and returns `Ok(())`.
    pub async fn close(&mut self, status: Option<u16>, reason: impl Into<String>) -> Result<()> {
        if self.close_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.is_open = false;

        let close_frame = status.map(|code| CloseFrame { code: CloseCode::from(code), reason: reason.into() });
        send_frame(&self.write_half, &self.cancel, Frame::close(close_frame)).await
    }
}

impl<S> Sender<S>
where
    S: AsyncWrite + Unpin,
{
    /// Send a Text message.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Frame::message(text.into().into_bytes(), OpCode::Data(Data::Text), true)).await
    }

    /// Send a Binary message.
    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Frame::message(data.into(), OpCode::Data(Data::Binary), true)).await
    }

    /// Send a Ping.
    pub async fn send_ping(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Frame::ping(data.into())).await
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        if self.close_sent.load(Ordering::SeqCst) {
            return Err(Error::AlreadyClosed);
        }
        send_frame(&self.write_half, &self.cancel, frame).await
    }
}

async fn send_frame<S>(write_half: &Arc<Mutex<WriteHalf<S>>>, cancel: &CancellationToken, frame: Frame) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut guard = write_half.lock();
    let mut guard = tokio::select! {
        g = &mut guard => g,
        () = cancel.cancelled() => return Err(Error::Cancelled),
    };
    let write = frame::write_frame(&mut *guard, frame);
    tokio::select! {
        res = write => res,
        () = cancel.cancelled() => Err(Error::Cancelled),
    }
}
