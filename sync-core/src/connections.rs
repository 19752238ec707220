//! Connection liveness from pushed clock values.
//!
//! A link can be up yet silent. [`TimeoutDetector`] tracks how long ago the
//! peer was last heard from, and [`ActionDebouncer`] decides when a reaction
//! to a timeout (resetting a link, logging an event) should run again.

/// Liveness of one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionStatus {
    /// Seconds since the connection came up, or 0 while it is down.
    pub uptime: f64,
    /// Whether nothing has been received for longer than the timeout.
    pub timed_out: bool,
}

/// Detects unresponsive connections.
#[derive(Debug, Clone)]
pub struct TimeoutDetector {
    timeout: f64,
    current_time: Option<f64>,
    last_event: Option<f64>,
    last_connection: Option<f64>,
}

impl TimeoutDetector {
    /// Create a detector with the given timeout, in seconds.
    pub fn new(timeout: f64) -> Self {
        Self {
            timeout,
            current_time: None,
            last_event: None,
            last_connection: None,
        }
    }

    /// Push the current monotonic time, in seconds.
    pub fn update(&mut self, time: f64) {
        self.current_time = Some(time);
    }

    /// Record that something was received at the current time.
    pub fn event_received(&mut self) {
        if let Some(now) = self.current_time {
            self.last_event = Some(now);
        }
    }

    /// Record that the connection went up or down at the current time.
    pub fn connection_changed(&mut self, connected: bool) {
        let Some(now) = self.current_time else {
            return;
        };
        self.last_event = Some(now);
        self.last_connection = connected.then_some(now);
    }

    /// Timeout in seconds.
    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    /// Current status, or `None` before the first clock value.
    pub fn status(&self) -> Option<ConnectionStatus> {
        let now = self.current_time?;
        Some(ConnectionStatus {
            uptime: self.last_connection.map_or(0.0, |since| now - since),
            timed_out: self
                .last_event
                .is_some_and(|last| now - last > self.timeout),
        })
    }
}

/// Gates how often a triggered action runs.
///
/// With no repeat interval the action runs once per trigger. With an
/// interval it is repeated while the trigger holds, at most once per
/// interval. Clearing the trigger re-arms it.
#[derive(Debug, Clone, Default)]
pub struct ActionDebouncer {
    repeat_interval: Option<f64>,
    triggered: bool,
    last_execution: Option<f64>,
}

impl ActionDebouncer {
    /// Create a debouncer.
    pub fn new(repeat_interval: Option<f64>) -> Self {
        Self {
            repeat_interval,
            triggered: false,
            last_execution: None,
        }
    }

    /// Feed the trigger state at `time`; returns whether to run the action.
    ///
    /// A `true` result counts as an execution.
    pub fn input(&mut self, time: f64, trigger: bool) -> bool {
        if !trigger {
            self.triggered = false;
            self.last_execution = None;
            return false;
        }
        self.triggered = true;

        let run = match (self.last_execution, self.repeat_interval) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(interval)) => time - last > interval,
        };
        if run {
            self.last_execution = Some(time);
        }
        run
    }

    /// Whether the trigger is currently held.
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }
}
