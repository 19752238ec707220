//! Scheduled state multiplexer, one per destination peer.
//!
//! Each destination gets a root cycle over three sub-schedules:
//!
//! - `realtime` - high-rate data, sent round-robin whenever present
//! - `event` - sent only when changed (plus idle round-robin if enabled)
//! - `main` - everything else, round-robin
//!
//! The whole tree is gated by a minimum interval between emissions, so each
//! destination receives at most one message per interval.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ventsync_types::Message;

use crate::events::ChangedStateSender;
use crate::states::{MappedSenders, SequentialSender, Sender, StoreLookup, TimedSender};
use crate::store::{Peer, StateSegment, Store};

/// Sub-schedules addressable from a root schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSchedule {
    /// High-rate data
    Realtime,
    /// Change-triggered data
    Event,
    /// Low-rate round-robin
    Main,
}

/// Schedule configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// The root schedule has no entries.
    #[error("root schedule is empty")]
    EmptyRoot,

    /// The root schedule refers to a sub-schedule with no segments.
    #[error("root schedule refers to empty sub-schedule {0:?}")]
    EmptySubSchedule(SubSchedule),

    /// The minimum interval is negative or not finite.
    #[error("invalid minimum interval: {0}")]
    InvalidInterval(f64),
}

/// Output schedule of one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minimum time between two emissions, in seconds.
    pub min_interval: f64,
    /// Cycle over sub-schedules.
    pub root: Vec<SubSchedule>,
    /// Segments of the realtime sub-schedule.
    #[serde(default)]
    pub realtime: Vec<StateSegment>,
    /// Segments of the event sub-schedule.
    #[serde(default)]
    pub event: Vec<StateSegment>,
    /// Segments of the main sub-schedule.
    #[serde(default)]
    pub main: Vec<StateSegment>,
    /// Whether the event sub-schedule cycles through its segments when
    /// nothing changed (default: true).
    #[serde(default = "default_event_idle")]
    pub event_idle: bool,
}

fn default_event_idle() -> bool {
    true
}

impl ScheduleConfig {
    /// Schedule for the device: requests and the event log cursor.
    pub fn mcu() -> Self {
        use StateSegment as S;
        let requests = vec![
            S::ParametersRequest,
            S::AlarmLimitsRequest,
            S::AlarmMuteRequest,
            S::ScreenStatusRequest,
            S::BackendConnections,
        ];
        Self {
            min_interval: 0.02,
            root: vec![SubSchedule::Realtime, SubSchedule::Event, SubSchedule::Main],
            realtime: vec![S::ExpectedLogEventMcu],
            event: requests.clone(),
            main: requests,
            event_idle: default_event_idle(),
        }
    }

    /// Schedule for the frontend: measurements interleaved with all state.
    pub fn frontend() -> Self {
        use StateSegment as S;
        let state = vec![
            S::Parameters,
            S::ParametersRequest,
            S::AlarmLimits,
            S::AlarmLimitsRequest,
            S::NextLogEventsBe,
            S::ActiveLogEventsBe,
            S::AlarmMute,
            S::AlarmMuteRequest,
            S::McuPowerStatus,
            S::BackendConnections,
            S::ScreenStatus,
            S::CycleMeasurements,
            S::SystemSettings,
            S::SystemSettingsRequest,
            S::FrontendDisplaySetting,
        ];
        Self {
            min_interval: 0.01,
            root: vec![
                SubSchedule::Realtime,
                SubSchedule::Event,
                SubSchedule::Realtime,
                SubSchedule::Main,
            ],
            realtime: vec![S::SensorMeasurements],
            event: state.clone(),
            main: state,
            event_idle: default_event_idle(),
        }
    }

    /// Schedule for state files: settings worth restoring after a restart.
    pub fn file() -> Self {
        use StateSegment as S;
        Self {
            min_interval: 0.3,
            root: vec![SubSchedule::Event],
            realtime: Vec::new(),
            event: vec![
                S::Parameters,
                S::ParametersRequest,
                S::AlarmLimits,
                S::AlarmLimitsRequest,
            ],
            main: Vec::new(),
            event_idle: false,
        }
    }

    /// Default schedule for a destination.
    pub fn for_peer(peer: Peer) -> Self {
        match peer {
            Peer::Mcu => Self::mcu(),
            Peer::Frontend => Self::frontend(),
            Peer::File => Self::file(),
        }
    }

    /// Segments of one sub-schedule.
    pub fn segments(&self, sub_schedule: SubSchedule) -> &[StateSegment] {
        match sub_schedule {
            SubSchedule::Realtime => &self.realtime,
            SubSchedule::Event => &self.event,
            SubSchedule::Main => &self.main,
        }
    }

    /// Check that the schedule can produce output.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty root, a root entry naming an empty
    /// sub-schedule, or an interval that is negative or not finite.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !self.min_interval.is_finite() || self.min_interval < 0.0 {
            return Err(ScheduleError::InvalidInterval(self.min_interval));
        }
        if self.root.is_empty() {
            return Err(ScheduleError::EmptyRoot);
        }
        for &sub_schedule in &self.root {
            if self.segments(sub_schedule).is_empty() {
                return Err(ScheduleError::EmptySubSchedule(sub_schedule));
            }
        }
        Ok(())
    }
}

/// Schedules for every destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulesConfig {
    /// Device schedule.
    #[serde(default = "ScheduleConfig::mcu")]
    pub mcu: ScheduleConfig,
    /// Frontend schedule.
    #[serde(default = "ScheduleConfig::frontend")]
    pub frontend: ScheduleConfig,
    /// State file schedule.
    #[serde(default = "ScheduleConfig::file")]
    pub file: ScheduleConfig,
}

impl Default for SchedulesConfig {
    fn default() -> Self {
        Self {
            mcu: ScheduleConfig::mcu(),
            frontend: ScheduleConfig::frontend(),
            file: ScheduleConfig::file(),
        }
    }
}

impl SchedulesConfig {
    /// Schedule of one destination.
    pub fn get(&self, peer: Peer) -> &ScheduleConfig {
        match peer {
            Peer::Mcu => &self.mcu,
            Peer::Frontend => &self.frontend,
            Peer::File => &self.file,
        }
    }
}

type RootSender = SequentialSender<SubSchedule, MappedSenders<SubSchedule>>;

/// Rate-limited state multiplexer for one destination.
#[derive(Debug)]
pub struct Multiplexer {
    sender: TimedSender<RootSender>,
}

impl Multiplexer {
    /// Build the sender tree described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: &ScheduleConfig) -> Result<Self, ScheduleError> {
        config.validate()?;

        let mut senders = MappedSenders::new();
        if !config.realtime.is_empty() {
            senders.insert(
                SubSchedule::Realtime,
                Box::new(SequentialSender::new(config.realtime.clone(), StoreLookup)),
            );
        }
        if !config.event.is_empty() {
            senders.insert(
                SubSchedule::Event,
                Box::new(ChangedStateSender::new(&config.event, config.event_idle)),
            );
        }
        if !config.main.is_empty() {
            senders.insert(
                SubSchedule::Main,
                Box::new(SequentialSender::new(config.main.clone(), StoreLookup)),
            );
        }

        let root = SequentialSender::new(config.root.clone(), senders);
        Ok(Self {
            sender: TimedSender::new(root, config.min_interval),
        })
    }

    /// Push the current monotonic time, in seconds.
    pub fn input_time(&mut self, time: f64) {
        self.sender.input(time);
    }

    /// Next message for this destination, if one is due.
    pub fn output(&mut self, store: &Store) -> Option<Message> {
        self.sender.output(store)
    }

    /// Forget change snapshots, e.g. after the destination reconnected.
    pub fn reset(&mut self) {
        self.sender.reset();
    }
}

/// One message per destination, from a single poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendEvent {
    /// Message for the device.
    pub mcu: Option<Message>,
    /// Message for the frontend.
    pub frontend: Option<Message>,
    /// Message for the state files.
    pub file: Option<Message>,
}

impl SendEvent {
    /// Whether no destination has a message.
    pub fn is_empty(&self) -> bool {
        self.mcu.is_none() && self.frontend.is_none() && self.file.is_none()
    }
}

/// Multiplexers for every destination.
#[derive(Debug)]
pub struct Synchronizers {
    mcu: Multiplexer,
    frontend: Multiplexer,
    file: Multiplexer,
}

impl Synchronizers {
    /// Build all multiplexers.
    ///
    /// # Errors
    ///
    /// Returns the first schedule that does not validate.
    pub fn new(config: &SchedulesConfig) -> Result<Self, ScheduleError> {
        Ok(Self {
            mcu: Multiplexer::new(&config.mcu)?,
            frontend: Multiplexer::new(&config.frontend)?,
            file: Multiplexer::new(&config.file)?,
        })
    }

    /// Push the current monotonic time to every multiplexer.
    pub fn input_time(&mut self, time: f64) {
        self.mcu.input_time(time);
        self.frontend.input_time(time);
        self.file.input_time(time);
    }

    /// Poll every destination once.
    pub fn output(&mut self, store: &Store) -> SendEvent {
        SendEvent {
            mcu: self.mcu.output(store),
            frontend: self.frontend.output(store),
            file: self.file.output(store),
        }
    }

    /// Reset one destination's change snapshots.
    pub fn reset(&mut self, peer: Peer) {
        tracing::debug!("Resetting {:?} schedule", peer);
        self.get_mut(peer).reset();
    }

    fn get_mut(&mut self, peer: Peer) -> &mut Multiplexer {
        match peer {
            Peer::Mcu => &mut self.mcu,
            Peer::Frontend => &mut self.frontend,
            Peer::File => &mut self.file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsync_types::{
        AlarmLimits, AlarmMuteRequest, MessageType, Parameters, ParametersRequest,
        SensorMeasurements,
    };

    fn frontend_store() -> Store {
        let mut store = Store::new();
        store.set(StateSegment::SensorMeasurements, SensorMeasurements::default());
        store.set(StateSegment::Parameters, Parameters::default());
        store.set(StateSegment::AlarmLimits, AlarmLimits::default());
        store
    }

    fn drain(multiplexer: &mut Multiplexer, store: &Store, polls: usize) -> Vec<Option<MessageType>> {
        (0..polls)
            .map(|i| {
                multiplexer.input_time(i as f64);
                multiplexer.output(store).map(|m| m.message_type())
            })
            .collect()
    }

    #[test]
    fn default_schedules_validate() {
        for peer in Peer::ALL {
            ScheduleConfig::for_peer(peer).validate().unwrap();
        }
        Synchronizers::new(&SchedulesConfig::default()).unwrap();
    }

    #[test]
    fn invalid_schedules_rejected() {
        let mut config = ScheduleConfig::file();
        config.root.clear();
        assert_eq!(config.validate(), Err(ScheduleError::EmptyRoot));

        let mut config = ScheduleConfig::file();
        config.root.push(SubSchedule::Realtime);
        assert_eq!(
            config.validate(),
            Err(ScheduleError::EmptySubSchedule(SubSchedule::Realtime))
        );

        let mut config = ScheduleConfig::mcu();
        config.min_interval = -1.0;
        assert!(matches!(
            Multiplexer::new(&config),
            Err(ScheduleError::InvalidInterval(_))
        ));
    }

    #[test]
    fn realtime_interleaves_with_other_state() {
        let mut multiplexer = Multiplexer::new(&ScheduleConfig::frontend()).unwrap();
        let store = frontend_store();

        let sent = drain(&mut multiplexer, &store, 8);
        assert!(sent.iter().all(Option::is_some));
        for (index, message_type) in sent.iter().enumerate() {
            if index % 2 == 0 {
                assert_eq!(*message_type, Some(MessageType::SensorMeasurements));
            } else {
                assert_ne!(*message_type, Some(MessageType::SensorMeasurements));
            }
        }
    }

    #[test]
    fn interval_limits_rate() {
        let mut multiplexer = Multiplexer::new(&ScheduleConfig::frontend()).unwrap();
        let store = frontend_store();

        multiplexer.input_time(0.0);
        assert!(multiplexer.output(&store).is_some());
        assert!(multiplexer.output(&store).is_none());

        multiplexer.input_time(0.005);
        assert!(multiplexer.output(&store).is_none());

        multiplexer.input_time(0.01);
        assert!(multiplexer.output(&store).is_some());
    }

    #[test]
    fn file_schedule_writes_only_changes() {
        let mut multiplexer = Multiplexer::new(&ScheduleConfig::file()).unwrap();
        let mut store = frontend_store();

        let sent: Vec<_> = drain(&mut multiplexer, &store, 4)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(sent, vec![MessageType::Parameters, MessageType::AlarmLimits]);

        store.set(StateSegment::ParametersRequest, ParametersRequest::default());
        multiplexer.input_time(100.0);
        assert_eq!(
            multiplexer.output(&store).map(|m| m.message_type()),
            Some(MessageType::ParametersRequest)
        );
        multiplexer.input_time(200.0);
        assert!(multiplexer.output(&store).is_none());
    }

    #[test]
    fn event_idle_keeps_destination_alive() {
        let mut multiplexer = Multiplexer::new(&ScheduleConfig::mcu()).unwrap();
        let mut store = Store::new();
        store.set(StateSegment::AlarmMuteRequest, AlarmMuteRequest::default());

        // Only one segment present and it never changes: still sent every time.
        let sent = drain(&mut multiplexer, &store, 10);
        assert!(sent
            .iter()
            .all(|t| *t == Some(MessageType::AlarmMuteRequest)));
    }

    #[test]
    fn reset_resends_changed_state() {
        let config = ScheduleConfig {
            event_idle: false,
            ..ScheduleConfig::file()
        };
        let mut multiplexer = Multiplexer::new(&config).unwrap();
        let store = frontend_store();

        assert_eq!(drain(&mut multiplexer, &store, 4).iter().flatten().count(), 2);
        multiplexer.reset();
        assert_eq!(drain(&mut multiplexer, &store, 4).iter().flatten().count(), 2);
    }

    #[test]
    fn synchronizers_poll_every_destination() {
        let mut synchronizers = Synchronizers::new(&SchedulesConfig::default()).unwrap();
        let mut store = frontend_store();
        store.set(StateSegment::ParametersRequest, ParametersRequest::default());

        synchronizers.input_time(0.0);
        let event = synchronizers.output(&store);
        assert_eq!(
            event.mcu.map(|m| m.message_type()),
            Some(MessageType::ParametersRequest)
        );
        assert_eq!(
            event.frontend.map(|m| m.message_type()),
            Some(MessageType::SensorMeasurements)
        );
        assert_eq!(
            event.file.map(|m| m.message_type()),
            Some(MessageType::Parameters)
        );
    }

    #[test]
    fn schedule_from_toml() {
        let config: ScheduleConfig = toml::from_str(
            r#"
            min_interval = 0.05
            root = ["realtime", "main"]
            realtime = ["sensor_measurements"]
            main = ["parameters", "alarm_limits"]
            "#,
        )
        .unwrap();

        assert_eq!(config.min_interval, 0.05);
        assert!(config.event.is_empty());
        assert!(config.event_idle);
        config.validate().unwrap();
    }
}
