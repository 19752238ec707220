//! Send side of list synchronization.
//!
//! This module provides a bounded, ordered log of elements with:
//! - Caller-assigned, monotonically increasing ids
//! - Eviction of the oldest element once capacity is reached
//! - Windowed replies to a receiver's "next expected id" cursor
//!
//! The sender never retransmits on its own. The receiver keeps asking for
//! its cursor; every request is answered with a [`Segment`] starting at the
//! first retained element whose id is at or after that cursor.

use std::collections::VecDeque;

use thiserror::Error;
use ventsync_types::{LogEvent, NextLogEvents};

/// Elements with a position in a log.
pub trait Indexed {
    /// Position of the element in its log.
    fn id(&self) -> u32;

    /// Move the element to another position.
    fn set_id(&mut self, id: u32);
}

impl Indexed for LogEvent {
    fn id(&self) -> u32 {
        self.id
    }

    fn set_id(&mut self, id: u32) {
        self.id = id;
    }
}

/// Error type for list operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    /// Capacity must be at least 1 and countable in a `u32`.
    #[error("invalid log capacity: {capacity}")]
    InvalidCapacity {
        /// Requested capacity.
        capacity: usize,
    },

    /// Segment length must be at least 1.
    #[error("invalid segment length: {segment_len}")]
    InvalidSegmentLength {
        /// Requested segment length.
        segment_len: usize,
    },

    /// The receiver asked for an id before one it already acknowledged.
    #[error("cursor went back from {current} to {requested}")]
    CursorRegressed {
        /// Cursor before the request.
        current: u32,
        /// Cursor in the request.
        requested: u32,
    },
}

/// A window of a log, sent in reply to a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<T> {
    /// Sender session the ids belong to.
    pub session_id: u32,
    /// The cursor this segment answers.
    pub next_expected: u32,
    /// Number of elements the sender retains.
    pub total: u32,
    /// Number of retained elements at or after the cursor.
    pub remaining: u32,
    /// Elements in the window, in id order.
    pub elements: Vec<T>,
}

impl From<NextLogEvents> for Segment<LogEvent> {
    fn from(message: NextLogEvents) -> Self {
        Self {
            session_id: message.session_id,
            next_expected: message.next_expected,
            total: message.total,
            remaining: message.remaining,
            elements: message.elements,
        }
    }
}

impl From<Segment<LogEvent>> for NextLogEvents {
    fn from(segment: Segment<LogEvent>) -> Self {
        Self {
            next_expected: segment.next_expected,
            total: segment.total,
            remaining: segment.remaining,
            session_id: segment.session_id,
            elements: segment.elements,
        }
    }
}

/// Bounded log replicated to one receiver.
#[derive(Debug, Clone)]
pub struct ListSender<T> {
    /// Maximum number of retained elements.
    capacity: usize,
    /// Maximum number of elements per segment.
    segment_len: usize,
    /// Session announced in every segment.
    session_id: u32,
    /// Retained elements, oldest first.
    elements: VecDeque<T>,
    /// Last cursor received.
    next_expected: u32,
    /// Index of the first retained element at or after the cursor.
    next_expected_index: usize,
    /// Elements evicted before they were ever sent.
    discarded: u64,
}

impl<T: Indexed + Clone> ListSender<T> {
    /// Create an empty log.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` or `segment_len` is zero, or if
    /// `capacity` exceeds `u32::MAX` (segment counts are `u32` on the wire).
    pub fn new(capacity: usize, segment_len: usize) -> Result<Self, ListError> {
        if capacity == 0 || u32::try_from(capacity).is_err() {
            return Err(ListError::InvalidCapacity { capacity });
        }
        if segment_len == 0 {
            return Err(ListError::InvalidSegmentLength { segment_len });
        }
        Ok(Self {
            capacity,
            segment_len,
            session_id: 0,
            elements: VecDeque::new(),
            next_expected: 0,
            next_expected_index: 0,
            discarded: 0,
        })
    }

    /// Set the session announced in segments.
    pub fn with_session(mut self, session_id: u32) -> Self {
        self.session_id = session_id;
        self
    }

    /// Append an element, evicting the oldest ones if full.
    pub fn add(&mut self, element: T) {
        while self.elements.len() >= self.capacity {
            let Some(evicted) = self.elements.pop_front() else {
                break;
            };
            if self.next_expected_index > 0 {
                self.next_expected_index -= 1;
            } else {
                self.discarded += 1;
                tracing::warn!(
                    "Discarding log element {} without sending it",
                    evicted.id()
                );
            }
        }
        self.elements.push_back(element);
    }

    /// Answer a receiver's cursor with the next window of the log.
    ///
    /// # Errors
    ///
    /// A non-zero cursor behind the previous one returns
    /// [`ListError::CursorRegressed`]. The sender still moves to the
    /// requested cursor, so repeating the request succeeds.
    pub fn request(&mut self, next_expected: u32) -> Result<Segment<T>, ListError> {
        let current = self.next_expected;
        self.next_expected = next_expected;
        self.next_expected_index = self
            .elements
            .iter()
            .position(|element| element.id() >= next_expected)
            .unwrap_or(self.elements.len());

        if next_expected != 0 && next_expected < current {
            tracing::warn!(
                "Log cursor went back from {} to {}",
                current,
                next_expected
            );
            return Err(ListError::CursorRegressed {
                current,
                requested: next_expected,
            });
        }

        // Both counts are bounded by the capacity, which fits in a u32.
        Ok(Segment {
            session_id: self.session_id,
            next_expected,
            total: self.elements.len() as u32,
            remaining: (self.elements.len() - self.next_expected_index) as u32,
            elements: self
                .elements
                .iter()
                .skip(self.next_expected_index)
                .take(self.segment_len)
                .cloned()
                .collect(),
        })
    }

    /// Number of retained elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether no element is retained.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Last cursor received.
    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }

    /// Number of elements evicted before they were sent.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Session announced in segments.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }
}
