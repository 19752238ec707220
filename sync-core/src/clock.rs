//! Clock synchronization with a peer.
//!
//! The peer reports times in milliseconds on its own clock. The synchronizer
//! anchors one local time against one remote time and derives a constant
//! offset from that pair. It re-anchors only when the peer's clock goes
//! backwards (the peer restarted, or its counter rolled over) or after an
//! explicit [`reset`](ClockSynchronizer::reset).
//!
//! Drift between the two clocks is not corrected.

use thiserror::Error;

/// Clock errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    /// No remote time has been seen yet.
    #[error("clock synchronizer has not been initialized")]
    NotInitialized,

    /// The offset or the converted time does not fit in an `i64`.
    #[error("remote time {remote_time} is out of range")]
    OutOfRange {
        /// Remote time that could not be mapped.
        remote_time: i64,
    },
}

/// A local time paired with the remote time observed at that moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    /// Local time, in seconds.
    pub local_sync_time: f64,
    /// Remote time, in milliseconds.
    pub remote_sync_time: i64,
}

impl ClockAnchor {
    /// Milliseconds to add to a remote time to get local time, or `None`
    /// when the difference overflows.
    pub fn offset(&self) -> Option<i64> {
        ((self.local_sync_time * 1000.0).round() as i64).checked_sub(self.remote_sync_time)
    }
}

/// Maps a peer's clock onto the local clock.
#[derive(Debug, Clone, Default)]
pub struct ClockSynchronizer {
    anchor: Option<ClockAnchor>,
}

impl ClockSynchronizer {
    /// Create an uninitialized synchronizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe that the peer reported `remote_time` at `local_time`.
    pub fn update(&mut self, local_time: f64, remote_time: i64) {
        match self.anchor {
            Some(anchor) if remote_time >= anchor.remote_sync_time => {}
            previous => {
                if let Some(anchor) = previous {
                    tracing::debug!(
                        "Remote clock went back from {} to {}, re-anchoring",
                        anchor.remote_sync_time,
                        remote_time
                    );
                }
                self.anchor = Some(ClockAnchor {
                    local_sync_time: local_time,
                    remote_sync_time: remote_time,
                });
            }
        }
    }

    /// Current offset in milliseconds (local minus remote).
    pub fn offset(&self) -> Result<i64, ClockError> {
        let anchor = self.anchor.ok_or(ClockError::NotInitialized)?;
        anchor.offset().ok_or(ClockError::OutOfRange {
            remote_time: anchor.remote_sync_time,
        })
    }

    /// Convert a remote time to local milliseconds.
    pub fn to_local(&self, remote_time: i64) -> Result<i64, ClockError> {
        remote_time
            .checked_add(self.offset()?)
            .ok_or(ClockError::OutOfRange { remote_time })
    }

    /// The anchor in use, if any.
    pub fn anchor(&self) -> Option<ClockAnchor> {
        self.anchor
    }

    /// Force re-anchoring on the next update.
    pub fn reset(&mut self) {
        self.anchor = None;
    }
}
