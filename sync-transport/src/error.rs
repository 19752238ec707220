//! Error types for the transport pipelines.

use thiserror::Error;
use ventsync_types::WireError;

use crate::datagram::DatagramError;
use crate::file::FileError;
use crate::frame::FrameError;
use crate::integrity::IntegrityError;

/// A unit of data that was discarded somewhere in a pipeline.
///
/// Every variant is recoverable: the pipeline keeps running and the next
/// call to `output` continues with the next unit.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Chunk could not be framed or unstuffed.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// Checksum rejected the datagram.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Datagram was out of sequence.
    #[error("sequence error: {0}")]
    Datagram(#[from] DatagramError),

    /// Message could not be encoded or decoded.
    #[error("message error: {0}")]
    Message(#[from] WireError),

    /// State file was inconsistent.
    #[error("file error: {0}")]
    File(#[from] FileError),
}
