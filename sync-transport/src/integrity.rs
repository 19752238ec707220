//! CRC32C protection of datagrams.
//!
//! A protected body is `[crc: u32 big-endian][payload]`, where `crc` is the
//! CRC32C (Castagnoli) checksum of `payload`.

use thiserror::Error;

/// Length of the checksum prefix.
pub const CRC_LEN: usize = 4;

/// Integrity errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Body too short to hold a checksum.
    #[error("body of {len} bytes is too short for a checksum")]
    TooShort {
        /// Actual body length.
        len: usize,
    },

    /// Checksum does not match the payload.
    #[error("checksum mismatch: received {received:#010x}, computed {computed:#010x}")]
    Mismatch {
        /// Checksum carried in the body.
        received: u32,
        /// Checksum of the payload as received.
        computed: u32,
    },
}

/// CRC32C of `payload`.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32c::crc32c(payload)
}

/// Prefix `payload` with its checksum.
pub fn protect(payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(CRC_LEN + payload.len());
    body.extend_from_slice(&checksum(payload).to_be_bytes());
    body.extend_from_slice(payload);
    body
}

/// Check a protected body and return its payload.
pub fn verify(body: &[u8]) -> Result<&[u8], IntegrityError> {
    if body.len() < CRC_LEN {
        return Err(IntegrityError::TooShort { len: body.len() });
    }
    let (crc, payload) = body.split_at(CRC_LEN);
    let received = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
    let computed = checksum(payload);
    if received != computed {
        return Err(IntegrityError::Mismatch { received, computed });
    }
    Ok(payload)
}
