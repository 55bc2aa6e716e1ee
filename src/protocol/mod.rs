//! The WebSocket message/connection layer, built on top of the raw frame codec.

pub mod connection;
pub mod frame;
mod message;

pub use self::connection::Connection;
pub use self::frame::CloseFrame;
pub use self::message::{IncompleteMessage, IncompleteMessageType, Message};
