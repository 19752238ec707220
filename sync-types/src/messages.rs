//! Message payloads exchanged with the device, the frontend and state files.
//!
//! Each struct here is the body of exactly one [`Message`](crate::Message)
//! variant. Bodies are encoded as MessagePack; the one-byte tag that selects
//! the variant lives in [`registry`](crate::registry).
//!
//! Times are milliseconds on the clock of whichever peer produced the
//! message, unless noted otherwise.

use serde::{Deserialize, Serialize};

/// Closed interval of alarm limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound (inclusive)
    pub lower: u32,
    /// Upper bound (inclusive)
    pub upper: u32,
}

impl Range {
    /// Create a new range.
    pub fn new(lower: u32, upper: u32) -> Self {
        Self { lower, upper }
    }
}

/// Operating mode of the ventilator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VentilationMode {
    /// Pressure control, assist/control
    #[default]
    PcAc,
    /// Volume control, assist/control
    VcAc,
    /// Pressure control, synchronized intermittent mandatory
    PcSimv,
    /// Volume control, synchronized intermittent mandatory
    VcSimv,
    /// Pressure support
    Psv,
    /// Non-invasive ventilation
    Niv,
    /// High-flow nasal cannula
    Hfnc,
}

/// Raw sensor readings, sampled at a fixed rate by the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorMeasurements {
    /// Device time of the sample
    pub time: u64,
    /// Breathing cycle counter
    pub cycle: u32,
    /// Fraction of inspired oxygen (%)
    pub fio2: f32,
    /// Oxygen saturation (%)
    pub spo2: f32,
    /// Heart rate (bpm)
    pub hr: f32,
    /// Airway pressure (cm H2O)
    pub paw: f32,
    /// Flow (L/min)
    pub flow: f32,
    /// Volume (mL)
    pub volume: f32,
}

/// Per-breath derived measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleMeasurements {
    /// Device time at the end of the cycle
    pub time: u64,
    /// Tidal volume (mL)
    pub vt: f32,
    /// Respiratory rate (b/min)
    pub rr: f32,
    /// Positive end-expiratory pressure (cm H2O)
    pub peep: f32,
    /// Peak inspiratory pressure (cm H2O)
    pub pip: f32,
    /// Inspiratory pressure (cm H2O)
    pub ip: f32,
    /// Minute ventilation (L/min)
    pub ve: f32,
}

/// Ventilation parameters currently in effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Time of the last change
    pub time: u64,
    /// Whether ventilation is running
    pub ventilating: bool,
    /// Ventilation mode
    pub mode: VentilationMode,
    /// Oxygen fraction setting (%)
    pub fio2: f32,
    /// Flow setting (L/min)
    pub flow: f32,
    /// Peak pressure setting (cm H2O)
    pub pip: f32,
    /// PEEP setting (cm H2O)
    pub peep: f32,
    /// Tidal volume setting (mL)
    pub vt: f32,
    /// Respiratory rate setting (b/min)
    pub rr: f32,
    /// Inspiratory:expiratory ratio
    pub ie: f32,
}

/// Requested ventilation parameters, same shape as [`Parameters`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParametersRequest {
    /// Time of the request
    pub time: u64,
    /// Whether ventilation should run
    pub ventilating: bool,
    /// Ventilation mode
    pub mode: VentilationMode,
    /// Oxygen fraction setting (%)
    pub fio2: f32,
    /// Flow setting (L/min)
    pub flow: f32,
    /// Peak pressure setting (cm H2O)
    pub pip: f32,
    /// PEEP setting (cm H2O)
    pub peep: f32,
    /// Tidal volume setting (mL)
    pub vt: f32,
    /// Respiratory rate setting (b/min)
    pub rr: f32,
    /// Inspiratory:expiratory ratio
    pub ie: f32,
}

/// Alarm limits currently in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmLimits {
    /// Time of the last change
    pub time: u64,
    /// Oxygen fraction
    pub fio2: Range,
    /// Flow
    pub flow: Range,
    /// Oxygen saturation
    pub spo2: Range,
    /// Heart rate
    pub hr: Range,
    /// Respiratory rate
    pub rr: Range,
    /// Peak inspiratory pressure
    pub pip: Range,
    /// PEEP
    pub peep: Range,
    /// Inspiratory pressure above PEEP
    pub ip_above_peep: Range,
    /// Inspiratory time
    pub insp_time: Range,
    /// Airway pressure
    pub paw: Range,
    /// Minute volume
    pub mve: Range,
    /// Tidal volume
    pub tv: Range,
    /// End-tidal CO2
    pub etco2: Range,
    /// Apnea
    pub apnea: Range,
}

/// Requested alarm limits, same shape as [`AlarmLimits`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmLimitsRequest {
    /// Time of the request
    pub time: u64,
    /// Oxygen fraction
    pub fio2: Range,
    /// Flow
    pub flow: Range,
    /// Oxygen saturation
    pub spo2: Range,
    /// Heart rate
    pub hr: Range,
    /// Respiratory rate
    pub rr: Range,
    /// Peak inspiratory pressure
    pub pip: Range,
    /// PEEP
    pub peep: Range,
    /// Inspiratory pressure above PEEP
    pub ip_above_peep: Range,
    /// Inspiratory time
    pub insp_time: Range,
    /// Airway pressure
    pub paw: Range,
    /// Minute volume
    pub mve: Range,
    /// Tidal volume
    pub tv: Range,
    /// End-tidal CO2
    pub etco2: Range,
    /// Apnea
    pub apnea: Range,
}

/// What a log event is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogEventCode {
    /// Oxygen fraction fell below its alarm limit
    #[default]
    Fio2TooLow,
    /// Oxygen fraction rose above its alarm limit
    Fio2TooHigh,
    /// Flow fell below its alarm limit
    FlowTooLow,
    /// Flow rose above its alarm limit
    FlowTooHigh,
    /// Oxygen saturation fell below its alarm limit
    Spo2TooLow,
    /// Oxygen saturation rose above its alarm limit
    Spo2TooHigh,
    /// Heart rate fell below its alarm limit
    HrTooLow,
    /// Heart rate rose above its alarm limit
    HrTooHigh,
    /// Ventilation was started or stopped
    VentilationOperationChanged,
    /// Ventilation mode changed
    VentilationModeChanged,
    /// Oxygen fraction setting changed
    Fio2SettingChanged,
    /// Flow setting changed
    FlowSettingChanged,
    /// Oxygen fraction alarm limits changed
    Fio2AlarmLimitsChanged,
    /// Flow alarm limits changed
    FlowAlarmLimitsChanged,
    /// Oxygen saturation alarm limits changed
    Spo2AlarmLimitsChanged,
    /// Heart rate alarm limits changed
    HrAlarmLimitsChanged,
    /// Device lost its connection to the backend
    McuBackendConnectionDown,
    /// Backend lost its connection to the device
    BackendMcuConnectionDown,
    /// Backend lost its connection to the frontend
    BackendFrontendConnectionDown,
    /// Frontend stopped responding
    FrontendConnectionDown,
    /// Backend started up
    BackendStarted,
    /// Device battery is low
    BatteryLow,
    /// Screen lock was toggled
    ScreenLocked,
}

/// Category of a log event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogEventType {
    /// Patient-related alarm
    #[default]
    Patient,
    /// Operator change to a control setting
    Control,
    /// Operator change to alarm limits
    AlarmLimits,
    /// System condition
    System,
}

/// One entry of the event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Position in the producer's log
    pub id: u32,
    /// Time the event occurred
    pub time: u64,
    /// What happened
    pub code: LogEventCode,
    /// Category
    #[serde(rename = "type")]
    pub kind: LogEventType,
    /// Limits in effect when an alarm fired
    pub alarm_limits: Range,
    /// Previous value of a float setting
    pub old_float: f32,
    /// New value of a float setting
    pub new_float: f32,
    /// Previous value of an integer setting
    pub old_uint32: u32,
    /// New value of an integer setting
    pub new_uint32: u32,
    /// Previous value of a boolean setting
    pub old_bool: bool,
    /// New value of a boolean setting
    pub new_bool: bool,
    /// Previous value of a range setting
    pub old_range: Range,
    /// New value of a range setting
    pub new_range: Range,
    /// Previous ventilation mode
    pub old_mode: VentilationMode,
    /// New ventilation mode
    pub new_mode: VentilationMode,
}

/// Receiver's acknowledgement cursor into a sender's event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedLogEvent {
    /// Next id the receiver wants
    pub id: u32,
    /// Session the cursor belongs to
    pub session_id: u32,
}

/// Window of the sender's event log starting at the receiver's cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextLogEvents {
    /// Cursor this window answers
    pub next_expected: u32,
    /// Number of events retained by the sender
    pub total: u32,
    /// Number of retained events at or after the cursor
    pub remaining: u32,
    /// Sender session; changes when the sender restarts
    pub session_id: u32,
    /// Events in the window, in id order
    pub elements: Vec<LogEvent>,
}

/// Ids of currently active alarm events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLogEvents {
    /// Active event ids
    pub id: Vec<u32>,
}

/// Alarm mute status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmMute {
    /// Whether alarms are muted
    pub active: bool,
    /// Seconds of mute remaining
    pub remaining: f32,
}

/// Requested alarm mute status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmMuteRequest {
    /// Whether alarms should be muted
    pub active: bool,
    /// Seconds of mute remaining
    pub remaining: f32,
}

/// Battery status reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McuPowerStatus {
    /// Charge left (%)
    pub power_left: u32,
    /// Whether the battery is charging
    pub charging: bool,
}

/// Which peers the backend currently hears from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConnections {
    /// Device link is up
    pub has_mcu: bool,
    /// Frontend link is up
    pub has_frontend: bool,
}

/// Screen lock status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenStatus {
    /// Whether the screen is locked
    pub lock: bool,
}

/// Requested screen lock status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenStatusRequest {
    /// Whether the screen should be locked
    pub lock: bool,
}

/// Liveness probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Sender time
    pub time: u64,
    /// Probe id
    pub id: u32,
}

/// Free-form text announced by a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Sender time
    pub time: u64,
    /// UTF-8 text, not validated
    pub announcement: Vec<u8>,
}

/// Rotary encoder input from the operator panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotaryEncoder {
    /// Accumulated step count
    pub step: i32,
    /// Seconds since the last step change
    pub last_step_change: f32,
    /// Whether the button is held down
    pub button_pressed: bool,
    /// Seconds since the last button press
    pub last_button_down: f32,
    /// Seconds since the last button release
    pub last_button_up: f32,
}

/// System settings in effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Wall-clock date (seconds since the Unix epoch)
    pub date: f64,
    /// Display brightness (%)
    pub display_brightness: u32,
    /// Change counter
    pub seq_num: u32,
}

/// Requested system settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSettingsRequest {
    /// Wall-clock date (seconds since the Unix epoch)
    pub date: f64,
    /// Display brightness (%)
    pub display_brightness: u32,
    /// Change counter
    pub seq_num: u32,
}

/// Frontend color theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeVariant {
    /// Dark theme
    #[default]
    Dark,
    /// Light theme
    Light,
}

/// Frontend measurement units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitVariant {
    /// Metric units
    #[default]
    Metric,
    /// Imperial units
    Imperial,
}

/// Frontend display preferences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendDisplaySetting {
    /// Color theme
    pub theme: ThemeVariant,
    /// Measurement units
    pub unit: UnitVariant,
}
