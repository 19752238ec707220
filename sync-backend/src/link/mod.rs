//! Link abstraction for ventsync.
//!
//! A link is the byte boundary to one peer. What a single `recv()` returns
//! depends on the peer:
//!
//! - the device link is a byte stream (serial port); chunks arrive in
//!   arbitrary pieces and are reassembled by the device receive filter
//! - the frontend link is message-oriented (one tagged message per `recv()`)
//!
//! # Design
//!
//! The link trait is async and connection-oriented:
//! - `send()` transmits bytes
//! - `recv()` waits for the next bytes
//! - `close()` gracefully terminates
//!
//! # Example
//!
//! ```ignore
//! let link = MockLink::connected();
//! link.queue_incoming(chunk_bytes);
//! let bytes = link.recv().await?;
//! ```

mod mock;
mod stream;

pub use mock::MockLink;
pub use stream::StreamLink;

use async_trait::async_trait;
use thiserror::Error;

/// Link errors.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Link trait for exchanging bytes with one peer.
#[async_trait]
pub trait Link: Send + Sync {
    /// Send bytes to the peer.
    async fn send(&self, data: &[u8]) -> Result<(), LinkError>;

    /// Receive bytes from the peer.
    ///
    /// Waits until data is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, LinkError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), LinkError>;
}
