//! # sync-transport
//!
//! Sans-I/O pipelines for the links between the backend, the device, the
//! frontend and the state files.
//!
//! Each layer is a pair of small, synchronous components: feed input, then
//! poll output until it returns `None`. Nothing here reads or writes a
//! port, sleeps, or locks.
//!
//! ## Layers (device link, innermost last)
//!
//! - [`frame`] - COBS chunks delimited by `0x00`
//! - [`integrity`] - CRC32C prefix
//! - [`datagram`] - 8-bit wrapping sequence numbers
//! - [`codec`] - one-byte tag plus MessagePack body
//!
//! [`device`], [`frontend`] and [`file`] compose these layers for each link.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod datagram;
pub mod device;
mod error;
pub mod file;
pub mod frame;
pub mod frontend;
pub mod integrity;

pub use codec::MessageCodec;
pub use datagram::{Datagram, DatagramError, DatagramReceiver, DatagramSender, SequenceGap};
pub use device::{ReceiveFilter, ReceiveStats, SendFilter};
pub use error::TransportError;
pub use file::{FileError, FileReceiver, FileSender, StateFile};
pub use frame::{ChunkSplitter, FrameError};
pub use integrity::IntegrityError;
