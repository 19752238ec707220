//! Change-triggered sending.
//!
//! [`ChangedStateSender`] snapshots the tracked segments, and on every poll
//! marks the ones whose value differs from the snapshot as sendable. A
//! [`NotificationSender`] then emits each marked segment once, in schedule
//! order. When nothing is marked it may fall back to an idle round-robin,
//! so that a peer which missed a change still converges eventually.

use std::collections::{BTreeMap, BTreeSet};

use ventsync_types::Message;

use crate::states::{Lookup, SequentialSender, Sender, StoreLookup};
use crate::store::{StateSegment, Store};

/// Resolves only the segments that have been marked.
#[derive(Debug, Clone, Default)]
pub struct FilteredLookup {
    allowed: BTreeSet<StateSegment>,
}

impl FilteredLookup {
    /// Mark a segment as sendable.
    pub fn allow(&mut self, segment: StateSegment) {
        self.allowed.insert(segment);
    }

    /// Unmark a segment.
    pub fn deny(&mut self, segment: StateSegment) {
        self.allowed.remove(&segment);
    }

    /// Whether nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Whether `segment` is marked.
    pub fn is_allowed(&self, segment: StateSegment) -> bool {
        self.allowed.contains(&segment)
    }
}

impl Lookup<StateSegment> for FilteredLookup {
    fn lookup(&mut self, key: &StateSegment, store: &Store) -> Option<Message> {
        if !self.allowed.contains(key) {
            return None;
        }
        store.get(*key).cloned()
    }

    fn reset(&mut self) {
        self.allowed.clear();
    }
}

/// Sends marked segments once each, with optional idle round-robin.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    sendable: SequentialSender<StateSegment, FilteredLookup>,
    idle: SequentialSender<StateSegment, StoreLookup>,
    output_idle: bool,
}

impl NotificationSender {
    /// Create a sender over `schedule`.
    pub fn new(schedule: &[StateSegment], output_idle: bool) -> Self {
        Self {
            sendable: SequentialSender::new(schedule.to_vec(), FilteredLookup::default()),
            idle: SequentialSender::new(schedule.to_vec(), StoreLookup),
            output_idle,
        }
    }

    /// Mark a segment to be sent at the next opportunity.
    pub fn notify(&mut self, segment: StateSegment) {
        self.sendable.lookup_mut().allow(segment);
    }

    /// Whether `segment` is waiting to be sent.
    pub fn is_pending(&self, segment: StateSegment) -> bool {
        self.sendable.lookup().is_allowed(segment)
    }

    fn sent(&mut self, segment: Option<StateSegment>) {
        if let Some(segment) = segment {
            self.sendable.lookup_mut().deny(segment);
        }
    }
}

impl Sender for NotificationSender {
    fn output(&mut self, store: &Store) -> Option<Message> {
        if !self.sendable.lookup().is_empty() {
            if let Some(message) = self.sendable.output(store) {
                let segment = self.sendable.last_key().copied();
                self.sent(segment);
                return Some(message);
            }
        }
        if !self.output_idle {
            return None;
        }
        let message = self.idle.output(store)?;
        let segment = self.idle.last_key().copied();
        self.sent(segment);
        Some(message)
    }

    fn reset(&mut self) {
        self.sendable.reset();
    }
}

/// Sends tracked segments when their value changes.
#[derive(Debug, Clone)]
pub struct ChangedStateSender {
    trackable: Vec<StateSegment>,
    notifications: NotificationSender,
    snapshot: BTreeMap<StateSegment, Message>,
}

impl ChangedStateSender {
    /// Track `schedule`, optionally cycling through it when nothing changed.
    pub fn new(schedule: &[StateSegment], output_idle: bool) -> Self {
        Self {
            trackable: schedule.to_vec(),
            notifications: NotificationSender::new(schedule, output_idle),
            snapshot: BTreeMap::new(),
        }
    }

    fn detect_changes(&mut self, store: &Store) {
        for &segment in &self.trackable {
            let Some(current) = store.get(segment) else {
                continue;
            };
            if self.snapshot.get(&segment) != Some(current) {
                self.snapshot.insert(segment, current.clone());
                self.notifications.notify(segment);
            }
        }
    }
}

impl Sender for ChangedStateSender {
    fn output(&mut self, store: &Store) -> Option<Message> {
        self.detect_changes(store);
        self.notifications.output(store)
    }

    /// Forget the snapshot, so every present segment counts as changed.
    fn reset(&mut self) {
        self.snapshot.clear();
        self.notifications.reset();
    }
}
