//! # sync-backend
//!
//! Backend of the ventsync stack: relays state between the device and the
//! frontend, persists settings to state files, and re-publishes the
//! device's event log.
//!
//! ## Architecture
//!
//! ```text
//! device link ──► ReceiveFilter ─┐                ┌─► SendFilter ──► device link
//!                                ├─► Backend ─────┤
//! frontend link ─► Receiver ─────┘   (Store)      ├─► Sender ──────► frontend link
//!                                                 └─► FileSender ──► state files
//! ```
//!
//! - [`backend`] - Sans-I/O coordinator owning the state store
//! - [`server`] - Tokio driver: link readers plus one coordinator loop
//! - [`link`] - Byte boundary to a peer, with a mock for tests
//! - [`config`] - TOML configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod link;
pub mod server;

pub use backend::{Backend, Inbound, Outbound};
pub use config::{Config, ConfigError};
pub use error::{BackendError, Result};
pub use link::{Link, LinkError, MockLink, StreamLink};
pub use server::Server;
