//! Tag registry mapping one-byte message type codes to message variants.
//!
//! The device registry uses tags below 128. The frontend registry is a
//! superset that adds operator-panel messages at 129 and above. Both
//! [`MessageType`] and [`Message`] are generated from the single table at
//! the bottom of this file, so tag ↔ variant is a bijection by construction.

use crate::messages::*;
use crate::WireError;

macro_rules! registry {
    ($( $(#[$doc:meta])* $variant:ident = $tag:literal, )+) => {
        /// Message type discriminator, the first byte of every encoded message.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum MessageType {
            $( $(#[$doc])* $variant = $tag, )+
        }

        impl MessageType {
            /// Every registered message type, in tag order.
            pub const ALL: &'static [MessageType] = &[ $( MessageType::$variant, )+ ];

            /// Type name, also used as the name of state files.
            pub fn name(self) -> &'static str {
                match self {
                    $( MessageType::$variant => stringify!($variant), )+
                }
            }

            /// Look up a message type by its [`name`](Self::name).
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( stringify!($variant) => Some(MessageType::$variant), )+
                    _ => None,
                }
            }
        }

        impl TryFrom<u8> for MessageType {
            type Error = WireError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $tag => Ok(MessageType::$variant), )+
                    _ => Err(WireError::UnknownMessageType(value)),
                }
            }
        }

        /// Every message that can cross a channel.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $( $(#[$doc])* $variant($variant), )+
        }

        impl Message {
            /// The type discriminator for this message.
            pub fn message_type(&self) -> MessageType {
                match self {
                    $( Message::$variant(_) => MessageType::$variant, )+
                }
            }

            /// A message of the given type with a default body.
            pub fn default_for(message_type: MessageType) -> Self {
                match message_type {
                    $( MessageType::$variant => Message::$variant(<$variant>::default()), )+
                }
            }

            /// Serialize the message body (without tag) to MessagePack.
            pub fn body_to_bytes(&self) -> Result<Vec<u8>, WireError> {
                match self {
                    $( Message::$variant(body) => {
                        rmp_serde::to_vec(body).map_err(WireError::Serialization)
                    } )+
                }
            }

            /// Deserialize a MessagePack body of the given type.
            pub fn body_from_bytes(message_type: MessageType, bytes: &[u8]) -> Result<Self, WireError> {
                match message_type {
                    $( MessageType::$variant => rmp_serde::from_slice(bytes)
                        .map(Message::$variant)
                        .map_err(WireError::Deserialization), )+
                }
            }
        }

        $(
            impl From<$variant> for Message {
                fn from(body: $variant) -> Self {
                    Message::$variant(body)
                }
            }
        )+
    };
}

registry! {
    /// Raw sensor readings
    SensorMeasurements = 2,
    /// Per-breath measurements
    CycleMeasurements = 3,
    /// Parameters in effect
    Parameters = 4,
    /// Requested parameters
    ParametersRequest = 5,
    /// Alarm limits in effect
    AlarmLimits = 6,
    /// Requested alarm limits
    AlarmLimitsRequest = 7,
    /// Event log acknowledgement cursor
    ExpectedLogEvent = 8,
    /// Event log window
    NextLogEvents = 9,
    /// Active alarm ids
    ActiveLogEvents = 10,
    /// Alarm mute status
    AlarmMute = 11,
    /// Requested alarm mute status
    AlarmMuteRequest = 12,
    /// Device battery status
    McuPowerStatus = 20,
    /// Backend link status
    BackendConnections = 21,
    /// Screen lock status
    ScreenStatus = 22,
    /// Requested screen lock status
    ScreenStatusRequest = 23,
    /// Rotary encoder input
    RotaryEncoder = 129,
    /// System settings in effect
    SystemSettings = 130,
    /// Requested system settings
    SystemSettingsRequest = 131,
    /// Frontend display preferences
    FrontendDisplaySetting = 132,
    /// Liveness probe
    Ping = 254,
    /// Free-form announcement
    Announcement = 255,
}

/// Frontend-only tags start here; everything else is shared with the device.
const FRONTEND_ONLY_TAGS: core::ops::RangeInclusive<u8> = 128..=253;

impl Message {
    /// Type name of this message.
    pub fn type_name(&self) -> &'static str {
        self.message_type().name()
    }
}

/// A link whose registry determines which message types may cross it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Serial link to the embedded controller
    Device,
    /// Message link to the operator frontend (and state files)
    Frontend,
}

impl Channel {
    /// Whether `message_type` belongs to this channel's registry.
    pub fn supports(self, message_type: MessageType) -> bool {
        match self {
            Channel::Device => !FRONTEND_ONLY_TAGS.contains(&(message_type as u8)),
            Channel::Frontend => true,
        }
    }

    /// Every message type in this channel's registry.
    pub fn message_types(self) -> impl Iterator<Item = MessageType> {
        MessageType::ALL
            .iter()
            .copied()
            .filter(move |message_type| self.supports(*message_type))
    }
}
