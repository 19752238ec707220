//! Pipelines for the message-oriented link to the frontend.
//!
//! The link already delivers whole messages, so only the codec applies,
//! using the frontend registry.

use std::collections::VecDeque;

use ventsync_types::{Channel, Message};

use crate::codec::MessageCodec;
use crate::error::TransportError;

/// Decodes messages received from the frontend.
#[derive(Debug)]
pub struct Receiver {
    queue: VecDeque<Vec<u8>>,
    codec: MessageCodec,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    /// Create a receiver.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            codec: MessageCodec::new(Channel::Frontend),
        }
    }

    /// Queue one received message.
    pub fn input(&mut self, bytes: Vec<u8>) {
        self.queue.push_back(bytes);
    }

    /// Decode the next queued message.
    pub fn output(&mut self) -> Option<Result<Message, TransportError>> {
        let bytes = self.queue.pop_front()?;
        Some(self.codec.decode(&bytes).map_err(TransportError::from))
    }
}

/// Encodes messages for the frontend.
#[derive(Debug)]
pub struct Sender {
    queue: VecDeque<Message>,
    codec: MessageCodec,
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender {
    /// Create a sender.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            codec: MessageCodec::new(Channel::Frontend),
        }
    }

    /// Queue a message for sending.
    pub fn input(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    /// Encode the next queued message.
    pub fn output(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        let message = self.queue.pop_front()?;
        tracing::debug!("Sending {} to frontend", message.type_name());
        Some(self.codec.encode(&message).map_err(TransportError::from))
    }
}
