//! The State Store: latest value of every synchronized state segment.
//!
//! Segments are a fixed enumeration. Some message types are tracked twice,
//! once per direction of the event log (the `*Mcu` segments face the device,
//! the `*Be` segments are the backend's own log served to the frontend).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ventsync_types::{Message, MessageType};

/// Key of one entry in the [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSegment {
    /// Latest sensor readings
    SensorMeasurements,
    /// Latest per-breath measurements
    CycleMeasurements,
    /// Parameters in effect
    Parameters,
    /// Requested parameters
    ParametersRequest,
    /// Alarm limits in effect
    AlarmLimits,
    /// Requested alarm limits
    AlarmLimitsRequest,
    /// Backend's cursor into the device log
    ExpectedLogEventMcu,
    /// Window of the device log
    NextLogEventsMcu,
    /// Active alarms in the device log
    ActiveLogEventsMcu,
    /// Frontend's cursor into the backend log
    ExpectedLogEventBe,
    /// Window of the backend log
    NextLogEventsBe,
    /// Active alarms in the backend log
    ActiveLogEventsBe,
    /// Alarm mute status
    AlarmMute,
    /// Requested alarm mute status
    AlarmMuteRequest,
    /// Device battery status
    McuPowerStatus,
    /// Backend link status
    BackendConnections,
    /// Screen lock status
    ScreenStatus,
    /// Requested screen lock status
    ScreenStatusRequest,
    /// Rotary encoder input
    RotaryEncoder,
    /// System settings in effect
    SystemSettings,
    /// Requested system settings
    SystemSettingsRequest,
    /// Frontend display preferences
    FrontendDisplaySetting,
}

/// A peer the backend exchanges state with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    /// The embedded controller
    Mcu,
    /// The operator frontend
    Frontend,
    /// Persistent state files
    File,
}

impl Peer {
    /// Every peer.
    pub const ALL: [Peer; 3] = [Peer::Mcu, Peer::Frontend, Peer::File];

    /// Segment a message received from this peer is stored under.
    ///
    /// Returns `None` for message types this peer is not allowed to set.
    pub fn inbound_segment(self, message_type: MessageType) -> Option<StateSegment> {
        use crate::store::StateSegment as S;
        use ventsync_types::MessageType as T;

        match (self, message_type) {
            (Peer::Mcu, T::SensorMeasurements) => Some(S::SensorMeasurements),
            (Peer::Mcu, T::CycleMeasurements) => Some(S::CycleMeasurements),
            (Peer::Mcu, T::Parameters) => Some(S::Parameters),
            (Peer::Mcu, T::AlarmLimits) => Some(S::AlarmLimits),
            (Peer::Mcu, T::NextLogEvents) => Some(S::NextLogEventsMcu),
            (Peer::Mcu, T::ActiveLogEvents) => Some(S::ActiveLogEventsMcu),
            (Peer::Mcu, T::AlarmMute) => Some(S::AlarmMute),
            (Peer::Mcu, T::McuPowerStatus) => Some(S::McuPowerStatus),
            (Peer::Mcu, T::ScreenStatus) => Some(S::ScreenStatus),

            (Peer::Frontend, T::ParametersRequest) => Some(S::ParametersRequest),
            (Peer::Frontend, T::AlarmLimitsRequest) => Some(S::AlarmLimitsRequest),
            (Peer::Frontend, T::ExpectedLogEvent) => Some(S::ExpectedLogEventBe),
            (Peer::Frontend, T::AlarmMuteRequest) => Some(S::AlarmMuteRequest),
            (Peer::Frontend, T::ScreenStatusRequest) => Some(S::ScreenStatusRequest),
            (Peer::Frontend, T::RotaryEncoder) => Some(S::RotaryEncoder),
            (Peer::Frontend, T::SystemSettingsRequest) => Some(S::SystemSettingsRequest),
            (Peer::Frontend, T::FrontendDisplaySetting) => Some(S::FrontendDisplaySetting),

            (Peer::File, T::Parameters) => Some(S::Parameters),
            (Peer::File, T::ParametersRequest) => Some(S::ParametersRequest),
            (Peer::File, T::AlarmLimits) => Some(S::AlarmLimits),
            (Peer::File, T::AlarmLimitsRequest) => Some(S::AlarmLimitsRequest),

            _ => None,
        }
    }
}

/// Latest value of every state segment, owned by a single coordinator.
#[derive(Debug, Clone, Default)]
pub struct Store {
    states: BTreeMap<StateSegment, Message>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value of a segment.
    pub fn get(&self, segment: StateSegment) -> Option<&Message> {
        self.states.get(&segment)
    }

    /// Whether a segment has a value.
    pub fn contains(&self, segment: StateSegment) -> bool {
        self.states.contains_key(&segment)
    }

    /// Replace a segment, returning its previous value.
    pub fn set(&mut self, segment: StateSegment, message: impl Into<Message>) -> Option<Message> {
        self.states.insert(segment, message.into())
    }

    /// Clear a segment.
    pub fn remove(&mut self, segment: StateSegment) -> Option<Message> {
        self.states.remove(&segment)
    }

    /// All segments with a value, in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (StateSegment, &Message)> {
        self.states.iter().map(|(segment, message)| (*segment, message))
    }

    /// Store a message received from `peer` under its segment.
    ///
    /// Messages the peer may not set are dropped and `None` is returned.
    pub fn apply_inbound(&mut self, peer: Peer, message: Message) -> Option<StateSegment> {
        let message_type = message.message_type();
        match peer.inbound_segment(message_type) {
            Some(segment) => {
                self.states.insert(segment, message);
                Some(segment)
            }
            None => {
                tracing::debug!(
                    "Ignoring {} from {:?}",
                    message_type.name(),
                    peer
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsync_types::{ExpectedLogEvent, Parameters, RotaryEncoder, SensorMeasurements};

    #[test]
    fn empty_store_has_nothing() {
        let store = Store::new();
        assert!(store.get(StateSegment::Parameters).is_none());
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn set_replaces_value() {
        let mut store = Store::new();
        assert!(store
            .set(StateSegment::Parameters, Parameters::default())
            .is_none());

        let newer = Parameters {
            fio2: 30.0,
            ..Default::default()
        };
        let previous = store.set(StateSegment::Parameters, newer.clone());
        assert_eq!(previous, Some(Message::from(Parameters::default())));
        assert_eq!(store.get(StateSegment::Parameters), Some(&Message::from(newer)));
    }

    #[test]
    fn inbound_messages_land_in_peer_segments() {
        let mut store = Store::new();

        let segment = store.apply_inbound(
            Peer::Frontend,
            ExpectedLogEvent {
                id: 4,
                session_id: 0,
            }
            .into(),
        );
        assert_eq!(segment, Some(StateSegment::ExpectedLogEventBe));
        assert!(store.contains(StateSegment::ExpectedLogEventBe));
        assert!(!store.contains(StateSegment::ExpectedLogEventMcu));
    }

    #[test]
    fn peers_cannot_set_foreign_segments() {
        let mut store = Store::new();
        assert_eq!(
            store.apply_inbound(Peer::Frontend, SensorMeasurements::default().into()),
            None
        );
        assert_eq!(
            store.apply_inbound(Peer::Mcu, RotaryEncoder::default().into()),
            None
        );
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn segment_names_in_config_format() {
        #[derive(Deserialize)]
        struct Keys {
            keys: Vec<StateSegment>,
        }

        let keys: Keys =
            toml::from_str(r#"keys = ["sensor_measurements", "next_log_events_be"]"#).unwrap();
        assert_eq!(
            keys.keys,
            vec![
                StateSegment::SensorMeasurements,
                StateSegment::NextLogEventsBe
            ]
        );
    }
}
