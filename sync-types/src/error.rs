//! Error types for the message layer.

use thiserror::Error;

use crate::registry::{Channel, MessageType};

/// Errors that can occur while encoding or decoding tagged messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Tag byte not present in any registry
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// Message type exists but is not part of this channel's registry
    #[error("message type {message_type:?} is not supported on the {channel:?} channel")]
    UnsupportedOnChannel {
        /// The offending message type.
        message_type: MessageType,
        /// The channel whose registry was consulted.
        channel: Channel,
    },

    /// Nothing to decode
    #[error("empty message")]
    Empty,
}
