//! # sync-types
//!
//! Wire types for the ventsync device protocol.
//!
//! This crate provides the foundational types used across all ventsync crates:
//! - [`Message`] and [`MessageType`] - Tagged messages and their one-byte registry
//! - [`Channel`] - Which registry applies to a link (device or frontend)
//! - [`SequenceNumber`] - Wrapping datagram sequence numbers
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod messages;
pub mod registry;
mod seq;

pub use error::WireError;
pub use messages::{
    ActiveLogEvents, AlarmLimits, AlarmLimitsRequest, AlarmMute, AlarmMuteRequest,
    Announcement, BackendConnections, CycleMeasurements, ExpectedLogEvent,
    FrontendDisplaySetting, LogEvent, LogEventCode, LogEventType, McuPowerStatus,
    NextLogEvents, Parameters, ParametersRequest, Ping, Range, RotaryEncoder, ScreenStatus,
    ScreenStatusRequest, SensorMeasurements, SystemSettings, SystemSettingsRequest,
    ThemeVariant, UnitVariant, VentilationMode,
};
pub use registry::{Channel, Message, MessageType};
pub use seq::SequenceNumber;
