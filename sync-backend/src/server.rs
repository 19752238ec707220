//! Tokio driver for the backend.
//!
//! One reader task per link forwards raw bytes into a single queue. The
//! coordinator loop is the only owner of the [`Backend`] and of every
//! transport filter: it decodes queued bytes, ticks the clock, and writes
//! whatever the backend schedules to the links and the state directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use ventsync_core::Peer;
use ventsync_transport::{
    frontend, FileReceiver, FileSender, ReceiveFilter, SendFilter, StateFile,
};

use crate::backend::{Backend, Inbound, Outbound};
use crate::config::Config;
use crate::error::Result;
use crate::link::Link;

/// What a reader task observed on its link.
#[derive(Debug)]
enum LinkEvent {
    Connected(Peer),
    Data(Peer, Vec<u8>),
    Closed(Peer),
}

/// Owns the links and runs the coordinator loop.
pub struct Server {
    config: Config,
    mcu: Arc<dyn Link>,
    frontend: Arc<dyn Link>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("mcu_connected", &self.mcu.is_connected())
            .field("frontend_connected", &self.frontend.is_connected())
            .finish()
    }
}

impl Server {
    /// Create a server over an open device link and frontend link.
    pub fn new(config: Config, mcu: Arc<dyn Link>, frontend: Arc<dyn Link>) -> Self {
        Self {
            config,
            mcu,
            frontend,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the state
    /// directory cannot be created.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.config.validate()?;
        let directory = self.config.files.directory.clone();
        tokio::fs::create_dir_all(&directory).await?;

        let mut coordinator = Coordinator {
            backend: Backend::new(&self.config)?.with_session(session_id()),
            device_rx: ReceiveFilter::new(),
            device_tx: SendFilter::new(),
            frontend_rx: frontend::Receiver::new(),
            frontend_tx: frontend::Sender::new(),
            file_tx: FileSender::new(),
            mcu: Arc::clone(&self.mcu),
            frontend: Arc::clone(&self.frontend),
            directory,
            started: Instant::now(),
        };
        coordinator.restore_state_files().await;

        let (events_tx, mut events_rx) = mpsc::channel(self.config.server.queue_capacity);
        let readers = [
            spawn_reader(Peer::Mcu, Arc::clone(&self.mcu), events_tx.clone()),
            spawn_reader(Peer::Frontend, Arc::clone(&self.frontend), events_tx),
        ];

        let mut ticker = interval(Duration::from_millis(self.config.server.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Backend started (tick: {}ms, state files: {})",
            self.config.server.tick_interval_ms,
            coordinator.directory.display()
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(event) = events_rx.recv() => coordinator.handle_link_event(event),
                _ = ticker.tick() => coordinator.tick().await,
            }
        }

        tracing::info!("Backend shutting down");
        for reader in readers {
            reader.abort();
        }
        for (peer, link) in [(Peer::Mcu, &self.mcu), (Peer::Frontend, &self.frontend)] {
            if let Err(e) = link.close().await {
                tracing::debug!("Closing {:?} link: {}", peer, e);
            }
        }
        let stats = coordinator.device_rx.stats();
        tracing::info!(
            "Device link: {} messages, {} datagrams lost, {} corrupted",
            stats.messages,
            stats.lost_datagrams,
            stats.integrity_errors
        );
        Ok(())
    }
}

/// Forward everything read from `link` to the coordinator.
fn spawn_reader(peer: Peer, link: Arc<dyn Link>, events: mpsc::Sender<LinkEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if link.is_connected() && events.send(LinkEvent::Connected(peer)).await.is_err() {
            return;
        }
        loop {
            match link.recv().await {
                Ok(bytes) => {
                    if events.send(LinkEvent::Data(peer, bytes)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::info!("{:?} link ended: {}", peer, e);
                    let _ = events.send(LinkEvent::Closed(peer)).await;
                    return;
                }
            }
        }
    })
}

/// Single owner of all mutable state.
struct Coordinator {
    backend: Backend,
    device_rx: ReceiveFilter,
    device_tx: SendFilter,
    frontend_rx: frontend::Receiver,
    frontend_tx: frontend::Sender,
    file_tx: FileSender,
    mcu: Arc<dyn Link>,
    frontend: Arc<dyn Link>,
    directory: PathBuf,
    started: Instant,
}

impl Coordinator {
    fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected(peer) => self.backend.handle(Inbound::Connection {
                peer,
                connected: true,
            }),
            LinkEvent::Closed(peer) => {
                if peer == Peer::Mcu {
                    self.device_rx.reset();
                }
                self.backend.handle(Inbound::Connection {
                    peer,
                    connected: false,
                });
            }
            LinkEvent::Data(Peer::Mcu, bytes) => {
                self.device_rx.input(&bytes);
                while let Some(result) = self.device_rx.output() {
                    match result {
                        Ok(message) => self.backend.handle(Inbound::Received {
                            peer: Peer::Mcu,
                            message,
                        }),
                        Err(e) => tracing::warn!("Dropped device data: {}", e),
                    }
                }
            }
            LinkEvent::Data(peer, bytes) => {
                self.frontend_rx.input(bytes);
                while let Some(result) = self.frontend_rx.output() {
                    match result {
                        Ok(message) => self.backend.handle(Inbound::Received { peer, message }),
                        Err(e) => tracing::warn!("Dropped frontend message: {}", e),
                    }
                }
            }
        }
    }

    async fn tick(&mut self) {
        self.backend.handle(Inbound::Clock {
            wall_time: wall_time(),
            monotonic_time: self.started.elapsed().as_secs_f64(),
        });
        let Outbound {
            mcu,
            frontend,
            file,
        } = self.backend.output();

        if let Some(message) = mcu {
            self.device_tx.input(message);
        }
        while let Some(result) = self.device_tx.output() {
            match result {
                Ok(bytes) => send(Peer::Mcu, self.mcu.as_ref(), &bytes).await,
                Err(e) => tracing::error!("Cannot encode device message: {}", e),
            }
        }

        if let Some(message) = frontend {
            self.frontend_tx.input(message);
        }
        while let Some(result) = self.frontend_tx.output() {
            match result {
                Ok(bytes) => send(Peer::Frontend, self.frontend.as_ref(), &bytes).await,
                Err(e) => tracing::error!("Cannot encode frontend message: {}", e),
            }
        }

        if let Some(message) = file {
            self.file_tx.input(message);
        }
        while let Some(result) = self.file_tx.output() {
            match result {
                Ok(file) => {
                    if let Err(e) = write_state_file(&self.directory, &file).await {
                        tracing::warn!("Cannot write state file {}: {}", file.name, e);
                    }
                }
                Err(e) => tracing::error!("Cannot encode state file: {}", e),
            }
        }
    }

    /// Feed every readable state file to the backend.
    async fn restore_state_files(&mut self) {
        let files = match read_state_files(&self.directory).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Cannot read state files: {}", e);
                return;
            }
        };

        let mut receiver = FileReceiver::new();
        for file in files {
            receiver.input(file);
        }
        while let Some(result) = receiver.output() {
            match result {
                Ok(message) => {
                    tracing::info!("Restored {}", message.type_name());
                    self.backend.handle(Inbound::Received {
                        peer: Peer::File,
                        message,
                    });
                }
                Err(e) => tracing::warn!("Ignoring state file: {}", e),
            }
        }
    }
}

async fn send(peer: Peer, link: &dyn Link, bytes: &[u8]) {
    if !link.is_connected() {
        return;
    }
    if let Err(e) = link.send(bytes).await {
        tracing::warn!("Send to {:?} failed: {}", peer, e);
    }
}

async fn read_state_files(directory: &Path) -> std::io::Result<Vec<StateFile>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(directory).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.ends_with(".tmp") {
            continue;
        }
        let data = tokio::fs::read(entry.path()).await?;
        files.push(StateFile { name, data });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Write through a temporary file so a crash never leaves a torn file.
async fn write_state_file(directory: &Path, file: &StateFile) -> std::io::Result<()> {
    let path = directory.join(&file.name);
    let temporary = directory.join(format!("{}.tmp", file.name));
    tokio::fs::write(&temporary, &file.data).await?;
    tokio::fs::rename(&temporary, &path).await
}

fn wall_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

fn session_id() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or_default()
}
