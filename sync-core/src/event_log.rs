//! Event log aggregation.
//!
//! The device keeps the authoritative log of alarms and setting changes,
//! but may restart at any time and number its log from scratch. The backend
//! therefore re-publishes the log under its own id space:
//!
//! - [`EphemeralLogReceiver`] replicates a remote log whose session may end
//!   without notice, assigns every new remote element a fresh local id,
//!   and rewrites its timestamp onto the local clock.
//! - [`LocalLogSource`] produces events that originate in the backend
//!   itself; they share the same local id space.
//!
//! The merged log is then served to the frontend through a
//! [`ListSender`](crate::buffer::ListSender).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ventsync_types::{LogEvent, LogEventCode, LogEventType};

use crate::buffer::{Indexed, Segment};
use crate::clock::ClockSynchronizer;
use crate::cursor::ListReceiver;

/// Elements that carry a timestamp in milliseconds.
pub trait Timestamped {
    /// Timestamp in milliseconds.
    fn time(&self) -> u64;

    /// Replace the timestamp.
    fn set_time(&mut self, time: u64);
}

impl Timestamped for LogEvent {
    fn time(&self) -> u64 {
        self.time
    }

    fn set_time(&mut self, time: u64) {
        self.time = time;
    }
}

/// Result of receiving one remote segment.
#[derive(Debug, Clone, PartialEq)]
pub struct EphemeralUpdate<T> {
    /// Cursor to acknowledge back to the remote sender.
    pub next_expected: u32,
    /// Remote session the cursor belongs to.
    pub session_id: u32,
    /// New elements, renumbered into the local id space.
    pub new_elements: Vec<T>,
}

/// Receives a remote log whose session may be replaced at any time.
#[derive(Debug, Clone)]
pub struct EphemeralLogReceiver<T> {
    cursor: ListReceiver,
    clock: ClockSynchronizer,
    session_id: Option<u32>,
    previous_segment: Option<Segment<T>>,
    next_local_id: u32,
    remote_ids: HashMap<u32, u32>,
    local_ids: HashMap<u32, u32>,
    remote_active: BTreeSet<u32>,
    local_active: BTreeSet<u32>,
}

impl<T> Default for EphemeralLogReceiver<T> {
    fn default() -> Self {
        Self {
            cursor: ListReceiver::new(),
            clock: ClockSynchronizer::new(),
            session_id: None,
            previous_segment: None,
            next_local_id: 0,
            remote_ids: HashMap::new(),
            local_ids: HashMap::new(),
            remote_active: BTreeSet::new(),
            local_active: BTreeSet::new(),
        }
    }
}

impl<T: Indexed + Timestamped + Clone + PartialEq> EphemeralLogReceiver<T> {
    /// Create a receiver with an empty local log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one segment from the remote sender.
    ///
    /// `wall_time` is the local time (seconds) at which the segment was
    /// received; it anchors the remote element timestamps. Returns `None`
    /// when the segment repeats the previous one or carries no elements.
    pub fn receive_remote(
        &mut self,
        segment: &Segment<T>,
        wall_time: f64,
    ) -> Option<EphemeralUpdate<T>> {
        if self.previous_segment.as_ref() == Some(segment) {
            return None;
        }
        self.previous_segment = Some(segment.clone());

        if self.session_id != Some(segment.session_id) {
            if let Some(previous) = self.session_id {
                tracing::info!(
                    "Remote log session changed from {} to {}",
                    previous,
                    segment.session_id
                );
            }
            self.start_session(segment.session_id);
        }

        let update = self.cursor.receive(&segment.elements)?;
        let new_elements = update
            .new_elements
            .into_iter()
            .map(|element| self.adopt_remote(element, wall_time))
            .collect();

        Some(EphemeralUpdate {
            next_expected: update.next_expected,
            session_id: segment.session_id,
            new_elements,
        })
    }

    /// Replace the set of active remote elements.
    ///
    /// Ids that have not been received yet are ignored until they are.
    pub fn set_remote_active(&mut self, remote_ids: &[u32]) {
        self.remote_active = remote_ids
            .iter()
            .filter_map(|id| self.remote_ids.get(id).copied())
            .collect();
    }

    /// Adopt elements produced locally into the local id space.
    pub fn receive_local(&mut self, elements: Vec<T>) -> Vec<T> {
        elements
            .into_iter()
            .map(|mut element| {
                let local_id = self.allocate_id();
                self.local_ids.insert(element.id(), local_id);
                element.set_id(local_id);
                element
            })
            .collect()
    }

    /// Replace the set of active local elements, by their source ids.
    pub fn set_local_active(&mut self, source_ids: &[u32]) {
        self.local_active = source_ids
            .iter()
            .filter_map(|id| self.local_ids.get(id).copied())
            .collect();
    }

    /// Local ids of all active elements, sorted.
    pub fn active(&self) -> Vec<u32> {
        self.remote_active
            .union(&self.local_active)
            .copied()
            .collect()
    }

    /// Cursor into the remote log.
    pub fn next_expected(&self) -> u32 {
        self.cursor.next_expected()
    }

    /// Remote session currently tracked.
    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Forget the remote session, e.g. after the link to the sender dropped.
    pub fn reset_session(&mut self) {
        self.session_id = None;
        self.previous_segment = None;
        self.remote_ids.clear();
        self.remote_active.clear();
        self.clock.reset();
        self.cursor.reset();
    }

    fn start_session(&mut self, session_id: u32) {
        self.reset_session();
        self.session_id = Some(session_id);
    }

    fn adopt_remote(&mut self, mut element: T, wall_time: f64) -> T {
        match i64::try_from(element.time()) {
            Ok(remote_time) => {
                self.clock.update(wall_time, remote_time);
                match self.clock.to_local(remote_time) {
                    Ok(local_time) => {
                        element.set_time(u64::try_from(local_time).unwrap_or(0));
                    }
                    Err(e) => tracing::warn!(
                        "Keeping remote timestamp of log element {}: {}",
                        element.id(),
                        e
                    ),
                }
            }
            Err(_) => tracing::warn!(
                "Keeping out-of-range timestamp {} of log element {}",
                element.time(),
                element.id()
            ),
        }

        let local_id = self.allocate_id();
        self.remote_ids.insert(element.id(), local_id);
        element.set_id(local_id);
        element
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_local_id;
        self.next_local_id = self.next_local_id.wrapping_add(1);
        id
    }
}

/// Produces log events that originate in the backend.
///
/// Events are numbered consecutively from 0 and stamped with the wall
/// clock. Alarm-style events stay active until their code is deactivated.
#[derive(Debug, Clone, Default)]
pub struct LocalLogSource {
    next_id: u32,
    wall_time: f64,
    pending: Vec<LogEvent>,
    active: BTreeMap<LogEventCode, u32>,
}

impl LocalLogSource {
    /// Create a source with no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wall-clock time (seconds) used to stamp new events.
    pub fn set_wall_time(&mut self, wall_time: f64) {
        self.wall_time = wall_time;
    }

    /// Record an event with the given code.
    ///
    /// When `active` is set, the event stays in [`active_ids`](Self::active_ids)
    /// until [`deactivate`](Self::deactivate) is called with its code.
    pub fn push(&mut self, code: LogEventCode, kind: LogEventType, active: bool) {
        if active && self.active.contains_key(&code) {
            return;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.push(LogEvent {
            id,
            time: (self.wall_time * 1000.0).round() as u64,
            code,
            kind,
            ..Default::default()
        });
        if active {
            self.active.insert(code, id);
        }
    }

    /// Clear an active event.
    pub fn deactivate(&mut self, code: LogEventCode) {
        self.active.remove(&code);
    }

    /// Take events recorded since the last call.
    pub fn take(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Ids of active events.
    pub fn active_ids(&self) -> Vec<u32> {
        self.active.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u32, time: u64) -> LogEvent {
        LogEvent {
            id,
            time,
            ..Default::default()
        }
    }

    fn segment(session_id: u32, ids: std::ops::Range<u32>) -> Segment<LogEvent> {
        let elements: Vec<_> = ids.map(|id| event(id, 1000 + u64::from(id))).collect();
        Segment {
            session_id,
            next_expected: 0,
            total: elements.len() as u32,
            remaining: elements.len() as u32,
            elements,
        }
    }

    fn ids(events: &[LogEvent]) -> Vec<u32> {
        events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn remote_elements_get_local_ids_and_times() {
        let mut receiver = EphemeralLogReceiver::new();
        let update = receiver.receive_remote(&segment(7, 5..8), 100.0).unwrap();

        assert_eq!(update.next_expected, 8);
        assert_eq!(update.session_id, 7);
        assert_eq!(ids(&update.new_elements), vec![0, 1, 2]);
        // Anchored at remote 1005 = local 100 s.
        assert_eq!(update.new_elements[0].time, 100_000);
        assert_eq!(update.new_elements[2].time, 100_002);
    }

    #[test]
    fn identical_segment_is_ignored() {
        let mut receiver = EphemeralLogReceiver::new();
        let seg = segment(1, 0..3);

        assert!(receiver.receive_remote(&seg, 1.0).is_some());
        assert!(receiver.receive_remote(&seg, 1.1).is_none());
        assert!(receiver.receive_remote(&seg, 1.2).is_none());
    }

    #[test]
    fn session_change_resets_cursor() {
        let mut receiver = EphemeralLogReceiver::new();
        receiver.receive_remote(&segment(1, 0..5), 1.0).unwrap();
        assert_eq!(receiver.next_expected(), 5);

        let update = receiver.receive_remote(&segment(2, 3..5), 2.0).unwrap();
        assert_eq!(update.session_id, 2);
        assert_eq!(update.next_expected, 5);
        // Local ids keep increasing across sessions.
        assert_eq!(ids(&update.new_elements), vec![5, 6]);
        assert_eq!(receiver.session_id(), Some(2));
    }

    #[test]
    fn session_change_reanchors_clock() {
        let mut receiver = EphemeralLogReceiver::new();
        receiver.receive_remote(&segment(1, 0..1), 10.0).unwrap();

        // New session with later remote time still re-anchors.
        let update = receiver.receive_remote(&segment(2, 500..501), 20.0).unwrap();
        assert_eq!(update.new_elements[0].time, 20_000);
    }

    #[test]
    fn out_of_range_timestamp_is_kept() {
        let mut receiver = EphemeralLogReceiver::new();
        let huge = Segment {
            session_id: 1,
            next_expected: 0,
            total: 2,
            remaining: 2,
            elements: vec![event(0, 1 << 63), event(1, u64::MAX)],
        };

        let update = receiver.receive_remote(&huge, 1.7e9).unwrap();
        assert_eq!(ids(&update.new_elements), vec![0, 1]);
        assert_eq!(update.new_elements[0].time, 1 << 63);
        assert_eq!(update.new_elements[1].time, u64::MAX);

        // The clock was never anchored by those, so the next sane time anchors it.
        let update = receiver.receive_remote(&segment(1, 2..3), 10.0).unwrap();
        assert_eq!(update.new_elements[0].time, 10_000);
    }

    #[test]
    fn active_ids_are_translated() {
        let mut receiver = EphemeralLogReceiver::new();
        receiver.receive_remote(&segment(1, 10..13), 1.0).unwrap();

        receiver.set_remote_active(&[11, 12, 99]);
        assert_eq!(receiver.active(), vec![1, 2]);
    }

    #[test]
    fn local_and_remote_share_id_space() {
        let mut receiver = EphemeralLogReceiver::new();
        receiver.receive_remote(&segment(1, 0..2), 1.0).unwrap();

        let local = receiver.receive_local(vec![event(0, 5), event(1, 6)]);
        assert_eq!(ids(&local), vec![2, 3]);

        receiver.set_remote_active(&[0]);
        receiver.set_local_active(&[1]);
        assert_eq!(receiver.active(), vec![0, 3]);
    }

    #[test]
    fn reset_session_clears_remote_state() {
        let mut receiver = EphemeralLogReceiver::new();
        receiver.receive_remote(&segment(1, 0..3), 1.0).unwrap();
        receiver.set_remote_active(&[1]);

        receiver.reset_session();
        assert_eq!(receiver.session_id(), None);
        assert_eq!(receiver.next_expected(), 0);
        assert!(receiver.active().is_empty());

        // Same segment is accepted again after the reset.
        assert!(receiver.receive_remote(&segment(1, 0..3), 2.0).is_some());
    }

    #[test]
    fn local_source_numbers_and_stamps_events() {
        let mut source = LocalLogSource::new();
        source.set_wall_time(12.5);
        source.push(LogEventCode::BackendStarted, LogEventType::System, false);
        source.push(
            LogEventCode::BackendMcuConnectionDown,
            LogEventType::System,
            true,
        );

        let events = source.take();
        assert_eq!(ids(&events), vec![0, 1]);
        assert_eq!(events[0].time, 12_500);
        assert_eq!(source.active_ids(), vec![1]);
        assert!(source.take().is_empty());
    }

    #[test]
    fn local_source_does_not_repeat_active_events() {
        let mut source = LocalLogSource::new();
        let code = LogEventCode::BackendFrontendConnectionDown;

        source.push(code, LogEventType::System, true);
        source.push(code, LogEventType::System, true);
        assert_eq!(source.take().len(), 1);

        source.deactivate(code);
        assert!(source.active_ids().is_empty());
        source.push(code, LogEventType::System, true);
        assert_eq!(ids(&source.take()), vec![1]);
    }
}
