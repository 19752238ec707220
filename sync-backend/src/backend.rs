//! The backend coordinator.
//!
//! [`Backend`] owns the [`Store`] and every piece of synchronization state.
//! It is sans-I/O: the driver feeds it [`Inbound`] events (clock ticks,
//! decoded messages, link status) and polls [`Backend::output`] for the
//! next message to each destination.
//!
//! Besides relaying state between the device and the frontend, the backend
//! re-publishes the device's event log to the frontend under its own ids,
//! merged with events of its own (startup, lost connections).

use ventsync_core::{
    ActionDebouncer, EphemeralLogReceiver, ListSender, LocalLogSource, Peer, SendEvent,
    StateSegment, Store, Synchronizers, TimeoutDetector,
};
use ventsync_types::{
    ActiveLogEvents, BackendConnections, ExpectedLogEvent, LogEvent, LogEventCode, LogEventType,
    Message, NextLogEvents,
};

use crate::config::Config;
use crate::error::Result;

/// Input to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Clock tick.
    Clock {
        /// Wall-clock time in seconds since the Unix epoch.
        wall_time: f64,
        /// Monotonic time in seconds.
        monotonic_time: f64,
    },
    /// A message decoded from a peer.
    Received {
        /// Source of the message.
        peer: Peer,
        /// The message.
        message: Message,
    },
    /// A peer's link went up or down.
    Connection {
        /// The peer.
        peer: Peer,
        /// Whether the link is now up.
        connected: bool,
    },
    /// An event to record in the backend's own log.
    LocalEvent {
        /// Event code.
        code: LogEventCode,
        /// Event category.
        kind: LogEventType,
        /// Whether the event stays active until cleared.
        active: bool,
    },
}

/// Messages due for each destination after one poll.
pub type Outbound = SendEvent;

/// Liveness tracking of one peer link.
#[derive(Debug)]
struct LinkMonitor {
    detector: TimeoutDetector,
    alarm: ActionDebouncer,
    code: LogEventCode,
}

impl LinkMonitor {
    fn new(timeout: f64, code: LogEventCode) -> Self {
        Self {
            detector: TimeoutDetector::new(timeout),
            alarm: ActionDebouncer::new(None),
            code,
        }
    }

    /// Raise or clear the connection-down event.
    fn check(&mut self, time: f64, log: &mut LocalLogSource) {
        let timed_out = self
            .detector
            .status()
            .is_some_and(|status| status.timed_out);
        if !timed_out && self.alarm.is_triggered() {
            tracing::info!("{:?} is responsive again", self.code);
            log.deactivate(self.code);
        }
        if self.alarm.input(time, timed_out) {
            tracing::warn!(
                "No data for {}s, raising {:?}",
                self.detector.timeout(),
                self.code
            );
            log.push(self.code, LogEventType::System, true);
        }
    }
}

/// Single-owner coordinator of the backend's state.
#[derive(Debug)]
pub struct Backend {
    store: Store,
    synchronizers: Synchronizers,
    log_receiver: EphemeralLogReceiver<LogEvent>,
    local_log: LocalLogSource,
    log_sender: ListSender<LogEvent>,
    frontend_cursor: Option<ExpectedLogEvent>,
    log_changed: bool,
    mcu_link: LinkMonitor,
    frontend_link: LinkMonitor,
    wall_time: f64,
    started: bool,
}

impl Backend {
    /// Create a backend with an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if a schedule or the log configuration is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        let mut store = Store::new();
        store.set(StateSegment::ExpectedLogEventMcu, ExpectedLogEvent::default());
        store.set(StateSegment::BackendConnections, BackendConnections::default());

        Ok(Self {
            store,
            synchronizers: Synchronizers::new(&config.schedules)?,
            log_receiver: EphemeralLogReceiver::new(),
            local_log: LocalLogSource::new(),
            log_sender: ListSender::new(config.log.capacity, config.log.segment_len)?,
            frontend_cursor: None,
            log_changed: true,
            mcu_link: LinkMonitor::new(
                config.connections.mcu_timeout_secs,
                LogEventCode::BackendMcuConnectionDown,
            ),
            frontend_link: LinkMonitor::new(
                config.connections.frontend_timeout_secs,
                LogEventCode::BackendFrontendConnectionDown,
            ),
            wall_time: 0.0,
            started: false,
        })
    }

    /// Set the session announced with the backend's event log.
    ///
    /// A new session tells the frontend to drop its copy of the log.
    pub fn with_session(mut self, session_id: u32) -> Self {
        self.log_sender = self.log_sender.with_session(session_id);
        self
    }

    /// The state store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Process one input event.
    pub fn handle(&mut self, event: Inbound) {
        match event {
            Inbound::Clock {
                wall_time,
                monotonic_time,
            } => self.handle_clock(wall_time, monotonic_time),
            Inbound::Received { peer, message } => self.handle_received(peer, message),
            Inbound::Connection { peer, connected } => self.handle_connection(peer, connected),
            Inbound::LocalEvent { code, kind, active } => {
                self.local_log.push(code, kind, active);
            }
        }
        self.update_log();
    }

    /// Poll every destination for its next message.
    pub fn output(&mut self) -> Outbound {
        self.synchronizers.output(&self.store)
    }

    fn handle_clock(&mut self, wall_time: f64, monotonic_time: f64) {
        self.wall_time = wall_time;
        self.local_log.set_wall_time(wall_time);
        if !self.started {
            // Logged on the first tick so it carries a real timestamp.
            self.started = true;
            self.local_log
                .push(LogEventCode::BackendStarted, LogEventType::System, false);
        }
        self.synchronizers.input_time(monotonic_time);
        for monitor in [&mut self.mcu_link, &mut self.frontend_link] {
            monitor.detector.update(monotonic_time);
            monitor.check(monotonic_time, &mut self.local_log);
        }
    }

    fn handle_received(&mut self, peer: Peer, message: Message) {
        match peer {
            Peer::Mcu => self.mcu_link.detector.event_received(),
            Peer::Frontend => self.frontend_link.detector.event_received(),
            Peer::File => {}
        }

        match &message {
            Message::Ping(ping) => {
                tracing::debug!("Ping {} from {:?}", ping.id, peer);
                return;
            }
            Message::Announcement(announcement) => {
                tracing::info!(
                    "{:?} announced: {}",
                    peer,
                    String::from_utf8_lossy(&announcement.announcement)
                );
                return;
            }
            _ => {}
        }

        match (self.store.apply_inbound(peer, message.clone()), message) {
            (Some(StateSegment::NextLogEventsMcu), Message::NextLogEvents(next)) => {
                self.receive_device_log(next);
            }
            (Some(StateSegment::ActiveLogEventsMcu), Message::ActiveLogEvents(_)) => {
                self.apply_device_active();
            }
            (Some(StateSegment::ExpectedLogEventBe), Message::ExpectedLogEvent(expected)) => {
                if self.frontend_cursor != Some(expected) {
                    self.frontend_cursor = Some(expected);
                    self.log_changed = true;
                }
            }
            _ => {}
        }
    }

    fn receive_device_log(&mut self, next: NextLogEvents) {
        let Some(update) = self
            .log_receiver
            .receive_remote(&next.into(), self.wall_time)
        else {
            return;
        };
        self.store.set(
            StateSegment::ExpectedLogEventMcu,
            ExpectedLogEvent {
                id: update.next_expected,
                session_id: update.session_id,
            },
        );
        if !update.new_elements.is_empty() {
            tracing::debug!(
                "Received {} log events from the device",
                update.new_elements.len()
            );
            for element in update.new_elements {
                self.log_sender.add(element);
            }
            self.log_changed = true;
            // Active ids that named these elements before they arrived.
            self.apply_device_active();
        }
    }

    fn apply_device_active(&mut self) {
        if let Some(Message::ActiveLogEvents(active)) =
            self.store.get(StateSegment::ActiveLogEventsMcu)
        {
            self.log_receiver.set_remote_active(&active.id);
            self.log_changed = true;
        }
    }

    fn handle_connection(&mut self, peer: Peer, connected: bool) {
        if connected {
            tracing::info!("{:?} connected", peer);
        } else {
            tracing::warn!("{:?} disconnected", peer);
        }

        let mut status = match self.store.get(StateSegment::BackendConnections) {
            Some(Message::BackendConnections(status)) => *status,
            _ => BackendConnections::default(),
        };
        match peer {
            Peer::Mcu => {
                status.has_mcu = connected;
                self.mcu_link.detector.connection_changed(connected);
                if connected {
                    // The device may have restarted with a fresh log.
                    self.log_receiver.reset_session();
                    self.store
                        .set(StateSegment::ExpectedLogEventMcu, ExpectedLogEvent::default());
                }
            }
            Peer::Frontend => {
                status.has_frontend = connected;
                self.frontend_link.detector.connection_changed(connected);
            }
            Peer::File => {}
        }
        self.store.set(StateSegment::BackendConnections, status);

        if connected {
            self.synchronizers.reset(peer);
        }
    }

    fn update_log(&mut self) {
        let local_events = self.local_log.take();
        if !local_events.is_empty() {
            for element in self.log_receiver.receive_local(local_events) {
                self.log_sender.add(element);
            }
            self.log_changed = true;
        }
        self.log_receiver
            .set_local_active(&self.local_log.active_ids());

        let active = ActiveLogEvents {
            id: self.log_receiver.active(),
        };
        if self.store.get(StateSegment::ActiveLogEventsBe)
            != Some(&Message::ActiveLogEvents(active.clone()))
        {
            self.store.set(StateSegment::ActiveLogEventsBe, active);
        }

        if self.log_changed {
            self.log_changed = false;
            self.serve_log();
        }
    }

    fn serve_log(&mut self) {
        let session_id = self.log_sender.session_id();
        let next_expected = match self.frontend_cursor {
            Some(cursor) if cursor.session_id == session_id => cursor.id,
            _ => 0,
        };
        let segment = match self.log_sender.request(next_expected) {
            Ok(segment) => segment,
            // The sender has resynced to the requested cursor.
            Err(_) => match self.log_sender.request(next_expected) {
                Ok(segment) => segment,
                Err(e) => {
                    tracing::error!("Cannot serve event log: {}", e);
                    return;
                }
            },
        };
        self.store
            .set(StateSegment::NextLogEventsBe, NextLogEvents::from(segment));
    }
}
