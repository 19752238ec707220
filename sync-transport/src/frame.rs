//! Chunk framing for byte-stream links.
//!
//! Payloads are COBS-stuffed so that the delimiter byte `0x00` never occurs
//! inside a chunk, then terminated with a single delimiter. A receiver that
//! joins mid-stream resynchronizes at the next delimiter.

use std::collections::VecDeque;

use thiserror::Error;

/// Chunk delimiter.
pub const DELIMITER: u8 = 0x00;

/// Default bound on a single encoded chunk, in bytes.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 1024;

/// Framing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Nothing between two delimiters.
    #[error("empty chunk")]
    Empty,

    /// Byte stuffing is inconsistent, or a delimiter occurs inside the chunk.
    #[error("malformed chunk encoding")]
    Encoding,

    /// A partial chunk grew past the buffer bound and was dropped.
    #[error("chunk exceeded {max_len} bytes and was discarded")]
    TooLong {
        /// The configured bound.
        max_len: usize,
    },
}

/// COBS-encode `payload` and append the delimiter.
pub fn encode_chunk(payload: &[u8]) -> Vec<u8> {
    let mut chunk = cobs::encode_vec(payload);
    chunk.push(DELIMITER);
    chunk
}

/// Decode one chunk, with or without its trailing delimiter.
pub fn decode_chunk(chunk: &[u8]) -> Result<Vec<u8>, FrameError> {
    let body = match chunk.split_last() {
        Some((&DELIMITER, body)) => body,
        _ => chunk,
    };
    if body.is_empty() {
        return Err(FrameError::Empty);
    }
    if body.contains(&DELIMITER) {
        return Err(FrameError::Encoding);
    }
    cobs::decode_vec(body).map_err(|_| FrameError::Encoding)
}

/// Splits an incoming byte stream into delimiter-terminated chunks.
///
/// Only one partial chunk is ever buffered. When it grows past
/// `max_chunk_len` its bytes are dropped until the next delimiter, which
/// then yields a single [`FrameError::TooLong`].
#[derive(Debug)]
pub struct ChunkSplitter {
    max_chunk_len: usize,
    partial: Vec<u8>,
    overflowed: bool,
    completed: VecDeque<Result<Vec<u8>, FrameError>>,
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_LEN)
    }
}

impl ChunkSplitter {
    /// Create a splitter with the given bound on partial chunks.
    pub fn new(max_chunk_len: usize) -> Self {
        Self {
            max_chunk_len,
            partial: Vec::new(),
            overflowed: false,
            completed: VecDeque::new(),
        }
    }

    /// Feed received bytes. Never fails.
    pub fn input(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == DELIMITER {
                self.finish_chunk();
            } else if self.overflowed {
                continue;
            } else if self.partial.len() >= self.max_chunk_len {
                tracing::warn!(
                    "Discarding partial chunk longer than {} bytes",
                    self.max_chunk_len
                );
                self.partial.clear();
                self.overflowed = true;
            } else {
                self.partial.push(byte);
            }
        }
    }

    /// Take the next complete chunk (without its delimiter), if any.
    pub fn output(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        self.completed.pop_front()
    }

    /// Number of bytes in the pending partial chunk.
    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }

    /// Drop all buffered bytes and chunks.
    pub fn reset(&mut self) {
        self.partial.clear();
        self.overflowed = false;
        self.completed.clear();
    }

    fn finish_chunk(&mut self) {
        if self.overflowed {
            self.overflowed = false;
            self.completed.push_back(Err(FrameError::TooLong {
                max_len: self.max_chunk_len,
            }));
        } else if !self.partial.is_empty() {
            self.completed.push_back(Ok(std::mem::take(&mut self.partial)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_has_single_trailing_delimiter() {
        let chunk = encode_chunk(&[0x00, 0x11, 0x00, 0x22]);
        assert_eq!(chunk.last(), Some(&DELIMITER));
        assert!(!chunk[..chunk.len() - 1].contains(&DELIMITER));
    }

    #[test]
    fn chunk_roundtrip_with_zeros() {
        let payload = vec![0x00, 0x00, 0x01, 0xFF, 0x00];
        let chunk = encode_chunk(&payload);
        assert_eq!(decode_chunk(&chunk).unwrap(), payload);
    }

    #[test]
    fn decode_accepts_chunk_without_delimiter() {
        let chunk = encode_chunk(b"abc");
        assert_eq!(decode_chunk(&chunk[..chunk.len() - 1]).unwrap(), b"abc");
    }

    #[test]
    fn decode_rejects_malformed_chunks() {
        assert_eq!(decode_chunk(&[]), Err(FrameError::Empty));
        assert_eq!(decode_chunk(&[DELIMITER]), Err(FrameError::Empty));
        assert_eq!(decode_chunk(&[0x03, 0x00, 0x01]), Err(FrameError::Encoding));
        // Code byte promises four data bytes, only two follow.
        assert_eq!(decode_chunk(&[0x05, 0x11, 0x22]), Err(FrameError::Encoding));
    }

    #[test]
    fn splitter_yields_chunks_in_order() {
        let mut splitter = ChunkSplitter::default();
        let mut stream = encode_chunk(b"first");
        stream.extend(encode_chunk(b"second"));

        splitter.input(&stream);

        let first = splitter.output().unwrap().unwrap();
        let second = splitter.output().unwrap().unwrap();
        assert_eq!(decode_chunk(&first).unwrap(), b"first");
        assert_eq!(decode_chunk(&second).unwrap(), b"second");
        assert!(splitter.output().is_none());
    }

    #[test]
    fn splitter_reassembles_across_inputs() {
        let mut splitter = ChunkSplitter::default();
        let chunk = encode_chunk(b"split across reads");
        let (head, tail) = chunk.split_at(5);

        splitter.input(head);
        assert!(splitter.output().is_none());
        assert_eq!(splitter.partial_len(), 5);

        splitter.input(tail);
        let received = splitter.output().unwrap().unwrap();
        assert_eq!(decode_chunk(&received).unwrap(), b"split across reads");
    }

    #[test]
    fn splitter_skips_empty_chunks() {
        let mut splitter = ChunkSplitter::default();
        splitter.input(&[DELIMITER, DELIMITER, DELIMITER]);
        assert!(splitter.output().is_none());
    }

    #[test]
    fn splitter_bounds_partial_chunk() {
        let mut splitter = ChunkSplitter::new(8);
        splitter.input(&[0x01; 20]);
        assert_eq!(splitter.partial_len(), 0);
        assert!(splitter.output().is_none());

        splitter.input(&[DELIMITER]);
        assert_eq!(
            splitter.output(),
            Some(Err(FrameError::TooLong { max_len: 8 }))
        );

        // Recovers on the next chunk.
        splitter.input(&encode_chunk(b"ok"));
        let chunk = splitter.output().unwrap().unwrap();
        assert_eq!(decode_chunk(&chunk).unwrap(), b"ok");
    }
}
