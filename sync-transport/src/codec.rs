//! Tagged message codec.
//!
//! An encoded message is `[tag: u8][MessagePack body]`. Which tags are
//! accepted depends on the [`Channel`] the codec serves.

use ventsync_types::{Channel, Message, MessageType, WireError};

/// Encodes and decodes messages for one channel's registry.
#[derive(Debug, Clone, Copy)]
pub struct MessageCodec {
    channel: Channel,
}

impl MessageCodec {
    /// Create a codec for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// The channel this codec serves.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Encode `message` as tag followed by body.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, WireError> {
        let message_type = self.check(message.message_type())?;
        let body = message.body_to_bytes()?;

        let mut bytes = Vec::with_capacity(1 + body.len());
        bytes.push(message_type as u8);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decode a tag followed by a body.
    pub fn decode(&self, bytes: &[u8]) -> Result<Message, WireError> {
        let (&tag, body) = bytes.split_first().ok_or(WireError::Empty)?;
        let message_type = self.check(MessageType::try_from(tag)?)?;
        Message::body_from_bytes(message_type, body)
    }

    fn check(&self, message_type: MessageType) -> Result<MessageType, WireError> {
        if self.channel.supports(message_type) {
            Ok(message_type)
        } else {
            Err(WireError::UnsupportedOnChannel {
                message_type,
                channel: self.channel,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsync_types::{AlarmLimits, Ping, Range, RotaryEncoder, SensorMeasurements};

    #[test]
    fn encode_puts_tag_first() {
        let codec = MessageCodec::new(Channel::Device);
        let bytes = codec
            .encode(&Message::Ping(Ping { time: 1, id: 2 }))
            .unwrap();
        assert_eq!(bytes[0], 254);
    }

    #[test]
    fn device_roundtrip() {
        let codec = MessageCodec::new(Channel::Device);
        let message: Message = SensorMeasurements {
            time: 1_000,
            cycle: 3,
            fio2: 21.0,
            spo2: 97.5,
            hr: 70.0,
            paw: 12.5,
            flow: 30.0,
            volume: 450.0,
        }
        .into();

        let bytes = codec.encode(&message).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), message);
    }

    #[test]
    fn frontend_accepts_frontend_only_types() {
        let codec = MessageCodec::new(Channel::Frontend);
        let message: Message = RotaryEncoder {
            step: -3,
            button_pressed: true,
            ..Default::default()
        }
        .into();

        let bytes = codec.encode(&message).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), message);
    }

    #[test]
    fn device_rejects_frontend_only_types() {
        let device = MessageCodec::new(Channel::Device);
        let frontend = MessageCodec::new(Channel::Frontend);
        let message: Message = RotaryEncoder::default().into();

        assert!(matches!(
            device.encode(&message),
            Err(WireError::UnsupportedOnChannel { .. })
        ));

        let bytes = frontend.encode(&message).unwrap();
        assert!(matches!(
            device.decode(&bytes),
            Err(WireError::UnsupportedOnChannel {
                message_type: MessageType::RotaryEncoder,
                channel: Channel::Device,
            })
        ));
    }

    #[test]
    fn unknown_tag_rejected() {
        let codec = MessageCodec::new(Channel::Frontend);
        assert!(matches!(
            codec.decode(&[99, 0x90]),
            Err(WireError::UnknownMessageType(99))
        ));
    }

    #[test]
    fn empty_input_rejected() {
        let codec = MessageCodec::new(Channel::Device);
        assert!(matches!(codec.decode(&[]), Err(WireError::Empty)));
    }

    #[test]
    fn garbage_body_rejected() {
        let codec = MessageCodec::new(Channel::Device);
        let mut bytes = codec
            .encode(
                &AlarmLimits {
                    fio2: Range::new(21, 100),
                    ..Default::default()
                }
                .into(),
            )
            .unwrap();
        bytes.truncate(4);

        assert!(matches!(
            codec.decode(&bytes),
            Err(WireError::Deserialization(_))
        ));
    }
}
