//! Datagram sequence numbers.

use serde::{Deserialize, Serialize};

/// 8-bit datagram sequence number, wrapping modulo 256.
///
/// Ordering between two sequence numbers is only meaningful as a forward
/// distance: `b` is ahead of `a` when `b - a` (mod 256) is in `1..128`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    /// Number of distinct sequence numbers.
    pub const MODULUS: u16 = 256;

    /// Create a sequence number from its wire value.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Wire value.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The sequence number after this one.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Forward distance from `earlier` to `self`, modulo 256.
    pub const fn distance_from(self, earlier: SequenceNumber) -> u8 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Whether `self` lies strictly ahead of `other` within half the window.
    pub const fn is_ahead_of(self, other: SequenceNumber) -> bool {
        let distance = self.distance_from(other);
        distance != 0 && distance < 128
    }
}

impl From<u8> for SequenceNumber {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
