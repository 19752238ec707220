//! State files.
//!
//! Each file holds one message: its name is the message type name and its
//! contents are the CRC-protected tagged message. Files are read back at
//! startup to restore settings, so a file whose contents disagree with its
//! name is rejected rather than applied.

use std::collections::VecDeque;

use thiserror::Error;
use ventsync_types::{Channel, Message};

use crate::codec::MessageCodec;
use crate::error::TransportError;
use crate::integrity;

/// State file errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    /// File had no contents.
    #[error("state file {name} is empty")]
    Empty {
        /// File name.
        name: String,
    },

    /// File name does not match the message inside.
    #[error("state file {name} contains a {found} message")]
    NameMismatch {
        /// File name.
        name: String,
        /// Type name of the decoded message.
        found: &'static str,
    },
}

/// One named state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFile {
    /// File name, equal to the message type name.
    pub name: String,
    /// Protected message bytes.
    pub data: Vec<u8>,
}

/// Decodes state files into messages.
#[derive(Debug)]
pub struct FileReceiver {
    queue: VecDeque<StateFile>,
    codec: MessageCodec,
}

impl Default for FileReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FileReceiver {
    /// Create a receiver.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            codec: MessageCodec::new(Channel::Frontend),
        }
    }

    /// Queue a file that was read.
    pub fn input(&mut self, file: StateFile) {
        self.queue.push_back(file);
    }

    /// Decode the next queued file.
    pub fn output(&mut self) -> Option<Result<Message, TransportError>> {
        let file = self.queue.pop_front()?;
        Some(self.decode(file))
    }

    fn decode(&self, file: StateFile) -> Result<Message, TransportError> {
        if file.data.is_empty() {
            return Err(FileError::Empty { name: file.name }.into());
        }
        let payload = integrity::verify(&file.data)?;
        let message = self.codec.decode(payload)?;
        if message.type_name() != file.name {
            return Err(FileError::NameMismatch {
                name: file.name,
                found: message.type_name(),
            }
            .into());
        }
        Ok(message)
    }
}

/// Encodes messages into state files.
#[derive(Debug)]
pub struct FileSender {
    queue: VecDeque<Message>,
    codec: MessageCodec,
}

impl Default for FileSender {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSender {
    /// Create a sender.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            codec: MessageCodec::new(Channel::Frontend),
        }
    }

    /// Queue a message to persist.
    pub fn input(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    /// Encode the next queued message as a file.
    pub fn output(&mut self) -> Option<Result<StateFile, TransportError>> {
        let message = self.queue.pop_front()?;
        let file = self.codec.encode(&message).map(|bytes| StateFile {
            name: message.type_name().to_string(),
            data: integrity::protect(&bytes),
        });
        Some(file.map_err(TransportError::from))
    }
}
