//! Pipelines for the serial link to the device.
//!
//! Receive: bytes → chunks → COBS decode → CRC verify → sequence check →
//! message decode. Send runs the same layers in reverse.
//!
//! ```ignore
//! let mut receiver = ReceiveFilter::new();
//! receiver.input(&bytes_from_serial);
//! while let Some(result) = receiver.output() {
//!     match result {
//!         Ok(message) => store.apply_inbound(Peer::Mcu, message),
//!         Err(e) => tracing::warn!("Dropped datagram: {}", e),
//!     }
//! }
//! ```

use std::collections::VecDeque;

use ventsync_types::{Channel, Message};

use crate::codec::MessageCodec;
use crate::datagram::{DatagramReceiver, DatagramSender};
use crate::error::TransportError;
use crate::frame::{self, ChunkSplitter, DEFAULT_MAX_CHUNK_LEN};
use crate::integrity;

/// Counters kept by a [`ReceiveFilter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Chunks split off the byte stream.
    pub chunks: u64,
    /// Messages delivered.
    pub messages: u64,
    /// Chunks that could not be decoded.
    pub frame_errors: u64,
    /// Datagrams rejected by their checksum.
    pub integrity_errors: u64,
    /// Datagrams discarded as stale.
    pub stale_datagrams: u64,
    /// Gaps detected in the sequence.
    pub sequence_gaps: u64,
    /// Datagrams known to be lost across all gaps.
    pub lost_datagrams: u64,
    /// Datagrams whose message failed to decode.
    pub message_errors: u64,
}

/// Turns bytes from the device into messages.
#[derive(Debug)]
pub struct ReceiveFilter {
    splitter: ChunkSplitter,
    datagrams: DatagramReceiver,
    codec: MessageCodec,
    stats: ReceiveStats,
}

impl Default for ReceiveFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveFilter {
    /// Create a receive pipeline with the default chunk bound.
    pub fn new() -> Self {
        Self::with_max_chunk_len(DEFAULT_MAX_CHUNK_LEN)
    }

    /// Create a receive pipeline with a custom chunk bound.
    pub fn with_max_chunk_len(max_chunk_len: usize) -> Self {
        Self {
            splitter: ChunkSplitter::new(max_chunk_len),
            datagrams: DatagramReceiver::new(),
            codec: MessageCodec::new(Channel::Device),
            stats: ReceiveStats::default(),
        }
    }

    /// Feed bytes read from the link. Never fails.
    pub fn input(&mut self, bytes: &[u8]) {
        self.splitter.input(bytes);
    }

    /// Take the next message.
    ///
    /// Returns `None` when no complete chunk is buffered, and `Some(Err)`
    /// for each discarded chunk; keep polling after an error.
    pub fn output(&mut self) -> Option<Result<Message, TransportError>> {
        loop {
            let result = match self.splitter.output()? {
                Ok(chunk) => {
                    self.stats.chunks += 1;
                    self.process(&chunk)
                }
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(message) => {
                    self.stats.messages += 1;
                    return Some(Ok(message));
                }
                Err(TransportError::Frame(e)) if self.datagrams.expected_seq().is_none() => {
                    tracing::info!("Ignoring partial chunk before first datagram: {}", e);
                }
                Err(e) => {
                    self.count(&e);
                    return Some(Err(e));
                }
            }
        }
    }

    /// Counters since creation.
    pub fn stats(&self) -> &ReceiveStats {
        &self.stats
    }

    /// Drop buffered bytes and forget the sequence, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.splitter.reset();
        self.datagrams.reset();
    }

    fn process(&mut self, chunk: &[u8]) -> Result<Message, TransportError> {
        let body = frame::decode_chunk(chunk)?;
        let payload = integrity::verify(&body)?;
        let datagram = self.datagrams.receive(payload)?;
        if let Some(gap) = datagram.gap {
            self.stats.sequence_gaps += 1;
            self.stats.lost_datagrams += u64::from(gap.missed());
            tracing::warn!(
                "Lost {} datagram(s): expected {}, received {}",
                gap.missed(),
                gap.expected,
                gap.received
            );
        }
        let message = self.codec.decode(datagram.payload)?;
        tracing::debug!("Received {} from device", message.type_name());
        Ok(message)
    }

    fn count(&mut self, error: &TransportError) {
        match error {
            TransportError::Frame(_) => self.stats.frame_errors += 1,
            TransportError::Integrity(_) => self.stats.integrity_errors += 1,
            TransportError::Datagram(_) => self.stats.stale_datagrams += 1,
            TransportError::Message(_) | TransportError::File(_) => {
                self.stats.message_errors += 1
            }
        }
    }
}

/// Turns messages for the device into bytes.
#[derive(Debug)]
pub struct SendFilter {
    queue: VecDeque<Message>,
    datagrams: DatagramSender,
    codec: MessageCodec,
}

impl Default for SendFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SendFilter {
    /// Create a send pipeline.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            datagrams: DatagramSender::new(),
            codec: MessageCodec::new(Channel::Device),
        }
    }

    /// Queue a message for sending.
    pub fn input(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    /// Take the bytes of the next queued message.
    ///
    /// A message that cannot be encoded is reported and dropped without
    /// consuming a sequence number.
    pub fn output(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        let message = self.queue.pop_front()?;
        Some(self.encode(&message))
    }

    fn encode(&mut self, message: &Message) -> Result<Vec<u8>, TransportError> {
        let body = self.codec.encode(message)?;
        let datagram = self.datagrams.send(&body);
        tracing::debug!("Sending {} to device", message.type_name());
        Ok(frame::encode_chunk(&integrity::protect(&datagram)))
    }
}
