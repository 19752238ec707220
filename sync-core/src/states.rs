//! Building blocks of the state multiplexer.
//!
//! A [`Sender`] is polled with the current [`Store`] and yields at most one
//! message per call. Senders compose: a [`SequentialSender`] cycles through
//! keys, resolving each one through a [`Lookup`] that is either the store
//! itself or a map of further senders; a [`TimedSender`] rate-limits any
//! sender against a pushed clock.
//!
//! Nothing here blocks or reads a clock. Time is an input like any other.

use std::collections::{BTreeMap, VecDeque};

use ventsync_types::Message;

use crate::store::{StateSegment, Store};

/// Yields messages to send, one per poll.
pub trait Sender {
    /// Next message to send, if any.
    fn output(&mut self, store: &Store) -> Option<Message>;

    /// Forget any per-connection state.
    fn reset(&mut self) {}
}

/// Resolves a schedule key to a message.
pub trait Lookup<K> {
    /// Message for `key`, if one is available now.
    fn lookup(&mut self, key: &K, store: &Store) -> Option<Message>;

    /// Forget any per-connection state.
    fn reset(&mut self) {}
}

/// Resolves segments straight from the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreLookup;

impl Lookup<StateSegment> for StoreLookup {
    fn lookup(&mut self, key: &StateSegment, store: &Store) -> Option<Message> {
        store.get(*key).cloned()
    }
}

/// Named senders, addressable as a [`Lookup`].
pub struct MappedSenders<K> {
    senders: BTreeMap<K, Box<dyn Sender + Send>>,
}

impl<K: Ord> Default for MappedSenders<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> MappedSenders<K> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            senders: BTreeMap::new(),
        }
    }

    /// Register the sender for `key`, replacing any previous one.
    pub fn insert(&mut self, key: K, sender: Box<dyn Sender + Send>) {
        self.senders.insert(key, sender);
    }

    /// Whether a sender is registered for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.senders.contains_key(key)
    }
}

impl<K: Ord> Lookup<K> for MappedSenders<K> {
    fn lookup(&mut self, key: &K, store: &Store) -> Option<Message> {
        self.senders.get_mut(key)?.output(store)
    }

    fn reset(&mut self) {
        for sender in self.senders.values_mut() {
            sender.reset();
        }
    }
}

impl<K: std::fmt::Debug> std::fmt::Debug for MappedSenders<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedSenders")
            .field("keys", &self.senders.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Round-robin over a fixed sequence of keys.
///
/// Each poll advances one position. With `skip_unavailable` set (the
/// default), keys whose lookup yields nothing are skipped, for at most one
/// full lap.
#[derive(Debug, Clone)]
pub struct SequentialSender<K, L> {
    schedule: VecDeque<K>,
    lookup: L,
    skip_unavailable: bool,
    last_key: Option<K>,
}

impl<K: Clone, L: Lookup<K>> SequentialSender<K, L> {
    /// Create a sender cycling through `schedule`.
    pub fn new(schedule: impl IntoIterator<Item = K>, lookup: L) -> Self {
        Self {
            schedule: schedule.into_iter().collect(),
            lookup,
            skip_unavailable: true,
            last_key: None,
        }
    }

    /// Set whether unavailable keys are skipped within one poll.
    pub fn skip_unavailable(mut self, skip: bool) -> Self {
        self.skip_unavailable = skip;
        self
    }

    /// Key of the last message produced.
    pub fn last_key(&self) -> Option<&K> {
        self.last_key.as_ref()
    }

    /// The lookup keys are resolved through.
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Mutable access to the lookup.
    pub fn lookup_mut(&mut self) -> &mut L {
        &mut self.lookup
    }

    fn next_output(&mut self, store: &Store) -> Option<Message> {
        let key = self.schedule.front()?.clone();
        self.schedule.rotate_left(1);
        let message = self.lookup.lookup(&key, store)?;
        self.last_key = Some(key);
        Some(message)
    }
}

impl<K: Clone, L: Lookup<K>> Sender for SequentialSender<K, L> {
    fn output(&mut self, store: &Store) -> Option<Message> {
        if !self.skip_unavailable {
            return self.next_output(store);
        }
        for _ in 0..self.schedule.len() {
            if let Some(message) = self.next_output(store) {
                return Some(message);
            }
        }
        None
    }

    fn reset(&mut self) {
        self.lookup.reset();
    }
}

/// Gates another sender by a minimum interval between emissions.
#[derive(Debug, Clone)]
pub struct TimedSender<S> {
    sender: S,
    min_interval: f64,
    current_time: Option<f64>,
    last_output_time: Option<f64>,
}

impl<S: Sender> TimedSender<S> {
    /// Wrap `sender`, allowing at most one emission per `min_interval` seconds.
    pub fn new(sender: S, min_interval: f64) -> Self {
        Self {
            sender,
            min_interval,
            current_time: None,
            last_output_time: None,
        }
    }

    /// Push the current monotonic time, in seconds.
    pub fn input(&mut self, time: f64) {
        self.current_time = Some(time);
    }

    /// Minimum interval between emissions, in seconds.
    pub fn min_interval(&self) -> f64 {
        self.min_interval
    }

    /// The wrapped sender.
    pub fn inner(&self) -> &S {
        &self.sender
    }

    fn ready(&self) -> bool {
        if self.min_interval <= 0.0 {
            return true;
        }
        match (self.current_time, self.last_output_time) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(now), Some(last)) => now - last >= self.min_interval,
        }
    }
}

impl<S: Sender> Sender for TimedSender<S> {
    fn output(&mut self, store: &Store) -> Option<Message> {
        if !self.ready() {
            return None;
        }
        let message = self.sender.output(store)?;
        self.last_output_time = self.current_time;
        Some(message)
    }

    fn reset(&mut self) {
        self.sender.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsync_types::{AlarmLimits, MessageType, Parameters, SensorMeasurements};

    fn store() -> Store {
        let mut store = Store::new();
        store.set(StateSegment::SensorMeasurements, SensorMeasurements::default());
        store.set(StateSegment::Parameters, Parameters::default());
        store.set(StateSegment::AlarmLimits, AlarmLimits::default());
        store
    }

    fn types(sender: &mut impl Sender, store: &Store, polls: usize) -> Vec<Option<MessageType>> {
        (0..polls)
            .map(|_| sender.output(store).map(|m| m.message_type()))
            .collect()
    }

    #[test]
    fn sequential_cycles_through_keys() {
        let mut sender = SequentialSender::new(
            [StateSegment::Parameters, StateSegment::AlarmLimits],
            StoreLookup,
        );
        assert_eq!(
            types(&mut sender, &store(), 4),
            vec![
                Some(MessageType::Parameters),
                Some(MessageType::AlarmLimits),
                Some(MessageType::Parameters),
                Some(MessageType::AlarmLimits),
            ]
        );
        assert_eq!(sender.last_key(), Some(&StateSegment::AlarmLimits));
    }

    #[test]
    fn sequential_skips_missing_values() {
        let mut sender = SequentialSender::new(
            [
                StateSegment::CycleMeasurements,
                StateSegment::Parameters,
                StateSegment::ScreenStatus,
            ],
            StoreLookup,
        );
        assert_eq!(
            types(&mut sender, &store(), 2),
            vec![Some(MessageType::Parameters), Some(MessageType::Parameters)]
        );
    }

    #[test]
    fn sequential_without_skipping_yields_gaps() {
        let mut sender = SequentialSender::new(
            [StateSegment::CycleMeasurements, StateSegment::Parameters],
            StoreLookup,
        )
        .skip_unavailable(false);
        assert_eq!(
            types(&mut sender, &store(), 2),
            vec![None, Some(MessageType::Parameters)]
        );
    }

    #[test]
    fn sequential_gives_up_after_one_lap() {
        let mut sender = SequentialSender::new(
            [StateSegment::CycleMeasurements, StateSegment::ScreenStatus],
            StoreLookup,
        );
        assert_eq!(sender.output(&store()), None);
        assert_eq!(sender.last_key(), None);
    }

    #[test]
    fn empty_schedule_yields_nothing() {
        let mut sender = SequentialSender::new(Vec::<StateSegment>::new(), StoreLookup);
        assert_eq!(sender.output(&store()), None);
    }

    #[test]
    fn mapped_senders_nest() {
        let mut mapped = MappedSenders::new();
        mapped.insert(
            "fast",
            Box::new(SequentialSender::new(
                [StateSegment::SensorMeasurements],
                StoreLookup,
            )),
        );
        mapped.insert(
            "slow",
            Box::new(SequentialSender::new(
                [StateSegment::Parameters, StateSegment::AlarmLimits],
                StoreLookup,
            )),
        );
        assert!(mapped.contains(&"fast"));

        let mut root = SequentialSender::new(["fast", "slow", "fast", "slow"], mapped);
        assert_eq!(
            types(&mut root, &store(), 4),
            vec![
                Some(MessageType::SensorMeasurements),
                Some(MessageType::Parameters),
                Some(MessageType::SensorMeasurements),
                Some(MessageType::AlarmLimits),
            ]
        );
    }

    #[test]
    fn timed_sender_waits_for_clock() {
        let inner = SequentialSender::new([StateSegment::Parameters], StoreLookup);
        let mut sender = TimedSender::new(inner, 0.5);
        let store = store();

        assert!(sender.output(&store).is_none());

        sender.input(10.0);
        assert!(sender.output(&store).is_some());
        assert!(sender.output(&store).is_none());

        sender.input(10.4);
        assert!(sender.output(&store).is_none());

        sender.input(10.5);
        assert!(sender.output(&store).is_some());
    }

    #[test]
    fn timed_sender_with_zero_interval_is_ungated() {
        let inner = SequentialSender::new([StateSegment::Parameters], StoreLookup);
        let mut sender = TimedSender::new(inner, 0.0);
        let store = store();

        for _ in 0..3 {
            assert!(sender.output(&store).is_some());
        }
    }

    #[test]
    fn timed_sender_does_not_start_interval_without_output() {
        let inner = SequentialSender::new([StateSegment::ScreenStatus], StoreLookup);
        let mut sender = TimedSender::new(inner, 1.0);
        let mut store = store();

        sender.input(1.0);
        assert!(sender.output(&store).is_none());

        store.set(
            StateSegment::ScreenStatus,
            ventsync_types::ScreenStatus { lock: true },
        );
        sender.input(1.1);
        assert!(sender.output(&store).is_some());
    }
}
