//! # sync-core
//!
//! Pure synchronization logic for ventsync (no I/O, instant tests).
//!
//! This crate implements the state machines that keep the device, the
//! backend and the frontend in agreement, without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Time is pushed in by the caller, never read. This
//! enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//!
//! ## Modules
//!
//! - [`clock`] - Offset between a peer's clock and ours
//! - [`buffer`] / [`cursor`] - Windowed list replication (sender and receiver)
//! - [`event_log`] - Re-identified event log merged from device and backend
//! - [`store`] - Latest value of every state segment
//! - [`states`] / [`events`] / [`schedule`] - Per-destination output scheduling
//! - [`connections`] - Connection timeouts
//!
//! The actual I/O is performed by `sync-backend`, which owns the store and
//! drives these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod clock;
pub mod connections;
pub mod cursor;
pub mod event_log;
pub mod events;
pub mod schedule;
pub mod states;
pub mod store;

pub use buffer::{Indexed, ListError, ListSender, Segment};
pub use clock::{ClockAnchor, ClockError, ClockSynchronizer};
pub use connections::{ActionDebouncer, ConnectionStatus, TimeoutDetector};
pub use cursor::{ListReceiver, ListUpdate};
pub use event_log::{EphemeralLogReceiver, EphemeralUpdate, LocalLogSource, Timestamped};
pub use events::{ChangedStateSender, FilteredLookup, NotificationSender};
pub use schedule::{
    Multiplexer, ScheduleConfig, ScheduleError, SchedulesConfig, SendEvent, SubSchedule,
    Synchronizers,
};
pub use states::{Lookup, MappedSenders, SequentialSender, Sender, StoreLookup, TimedSender};
pub use store::{Peer, StateSegment, Store};
