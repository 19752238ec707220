//! Datagram sequencing.
//!
//! A datagram is `[seq: u8][payload]`. The sender numbers datagrams
//! consecutively, wrapping at 256. The receiver never waits for a missing
//! datagram: it reports the gap and resynchronizes on whatever arrived.

use thiserror::Error;
use ventsync_types::SequenceNumber;

/// Length of the sequence number header.
pub const HEADER_LEN: usize = 1;

/// Sequencing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatagramError {
    /// No room for a sequence number.
    #[error("empty datagram")]
    Empty,

    /// Sequence number repeats or goes backwards; payload discarded.
    #[error("stale datagram: expected {expected}, received {received}")]
    Stale {
        /// Sequence number the receiver was waiting for.
        expected: SequenceNumber,
        /// Sequence number that arrived.
        received: SequenceNumber,
    },
}

/// Datagrams known to be lost between two received ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    /// Sequence number the receiver was waiting for.
    pub expected: SequenceNumber,
    /// Sequence number that arrived instead.
    pub received: SequenceNumber,
}

impl SequenceGap {
    /// Number of datagrams skipped.
    pub fn missed(&self) -> u8 {
        self.received.distance_from(self.expected)
    }
}

/// A received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram<'a> {
    /// Sequence number carried by the datagram.
    pub seq: SequenceNumber,
    /// Payload after the header.
    pub payload: &'a [u8],
    /// Set when datagrams were skipped before this one.
    pub gap: Option<SequenceGap>,
}

/// Numbers outgoing datagrams.
#[derive(Debug, Default)]
pub struct DatagramSender {
    next_seq: SequenceNumber,
}

impl DatagramSender {
    /// Create a sender starting at sequence number 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `payload` in a datagram with the next sequence number.
    pub fn send(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
        datagram.push(self.next_seq.value());
        datagram.extend_from_slice(payload);
        self.next_seq = self.next_seq.next();
        datagram
    }

    /// Sequence number the next datagram will carry.
    pub fn next_seq(&self) -> SequenceNumber {
        self.next_seq
    }
}

/// Checks the sequence of incoming datagrams.
#[derive(Debug, Default)]
pub struct DatagramReceiver {
    expected: Option<SequenceNumber>,
}

impl DatagramReceiver {
    /// Create a receiver that has not yet seen any datagram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one datagram and check its sequence number.
    ///
    /// Out-of-order datagrams resynchronize the receiver in every case, so
    /// a single reordering costs at most one error.
    pub fn receive<'a>(&mut self, body: &'a [u8]) -> Result<Datagram<'a>, DatagramError> {
        let (&seq, payload) = body.split_first().ok_or(DatagramError::Empty)?;
        let seq = SequenceNumber::new(seq);
        let previous = self.expected.replace(seq.next());

        let gap = match previous {
            None => None,
            Some(expected) if expected == seq => None,
            Some(expected) if seq.is_ahead_of(expected) => Some(SequenceGap {
                expected,
                received: seq,
            }),
            Some(expected) => {
                return Err(DatagramError::Stale {
                    expected,
                    received: seq,
                })
            }
        };

        Ok(Datagram { seq, payload, gap })
    }

    /// Sequence number expected next, `None` before the first datagram.
    pub fn expected_seq(&self) -> Option<SequenceNumber> {
        self.expected
    }

    /// Forget the sequence, e.g. after the peer reconnects.
    pub fn reset(&mut self) {
        self.expected = None;
    }
}
