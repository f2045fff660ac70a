//! Message commands: application payloads, dispatches, and acknowledgments.

use super::ids::{ConsumerId, Destination, LocalTransactionId, MessageId, ProducerId};
use super::response::BrokerError;

/// Distinguishes the wire representation of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    /// Raw byte payload.
    #[default]
    Bytes,
    /// UTF-8 text payload.
    Text,
}

/// An application message travelling producer → broker → consumer.
///
/// The payload is kept as raw bytes regardless of kind; [`Message::text`]
/// builds a text message and [`Message::body_text`] decodes one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub command_id: i32,
    pub response_required: bool,
    pub kind: MessageKind,
    pub message_id: Option<MessageId>,
    pub producer_id: Option<ProducerId>,
    pub destination: Option<Destination>,
    pub transaction_id: Option<LocalTransactionId>,
    pub correlation_id: Option<String>,
    pub persistent: bool,
    /// Absolute expiration time in milliseconds, 0 for never.
    pub expiration: i64,
    pub priority: i8,
    pub reply_to: Option<Destination>,
    pub timestamp: i64,
    pub message_type: Option<String>,
    /// Marshalled body bytes. For text messages this is the UTF-8 payload.
    pub content: Vec<u8>,
    pub compressed: bool,
    pub redelivery_counter: i32,
}

impl Message {
    /// Creates a bytes message with the given payload.
    pub fn bytes(destination: Destination, content: Vec<u8>) -> Self {
        Self {
            kind: MessageKind::Bytes,
            destination: Some(destination),
            content,
            ..Default::default()
        }
    }

    /// Creates a text message with the given payload.
    pub fn text(destination: Destination, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            destination: Some(destination),
            content: text.into().into_bytes(),
            ..Default::default()
        }
    }

    /// Decodes the body of a text message.
    ///
    /// Returns `None` for bytes messages or non-UTF-8 content.
    pub fn body_text(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Text => std::str::from_utf8(&self.content).ok(),
            MessageKind::Bytes => None,
        }
    }

    /// Approximate in-memory size, used for replay-cache accounting.
    pub fn cached_size(&self) -> usize {
        // Header fields round up to a fixed overhead; the body dominates.
        64 + self.content.len()
    }
}

/// Broker → consumer delivery of a single message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDispatch {
    pub command_id: i32,
    pub response_required: bool,
    pub consumer_id: ConsumerId,
    pub destination: Option<Destination>,
    pub message: Option<Box<Message>>,
    pub redelivery_counter: i32,
}

/// Acknowledgment modes carried by a [`MessageAck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckType {
    /// Message consumed; discard on the broker.
    #[default]
    Standard,
    /// Message delivered but not yet consumed.
    Delivered,
    /// Consumer poisoned; broker should dead-letter the message.
    Poison,
    /// Redelivery requested.
    Redelivered,
    /// Ack of an individual message rather than a range.
    Individual,
}

impl AckType {
    /// Returns the wire byte for this ack type.
    pub fn to_byte(self) -> i8 {
        match self {
            AckType::Delivered => 0,
            AckType::Poison => 1,
            AckType::Standard => 2,
            AckType::Redelivered => 3,
            AckType::Individual => 4,
        }
    }

    /// Decodes a wire byte into an ack type.
    pub fn from_byte(b: i8) -> Option<Self> {
        Some(match b {
            0 => AckType::Delivered,
            1 => AckType::Poison,
            2 => AckType::Standard,
            3 => AckType::Redelivered,
            4 => AckType::Individual,
            _ => return None,
        })
    }
}

/// Consumer → broker acknowledgment of one or more dispatched messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageAck {
    pub command_id: i32,
    pub response_required: bool,
    pub destination: Option<Destination>,
    pub transaction_id: Option<LocalTransactionId>,
    pub consumer_id: ConsumerId,
    pub ack_type: AckType,
    pub first_message_id: Option<MessageId>,
    pub last_message_id: Option<MessageId>,
    /// Number of messages covered by this ack.
    pub message_count: i32,
    /// Why the message was poisoned, if it was. Version 7 and later.
    pub poison_cause: Option<BrokerError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_body() {
        let msg = Message::text(Destination::Queue("q".into()), "hello");
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.body_text(), Some("hello"));
    }

    #[test]
    fn test_bytes_message_has_no_text_body() {
        let msg = Message::bytes(Destination::Queue("q".into()), vec![0xFF, 0x00]);
        assert_eq!(msg.body_text(), None);
    }

    #[test]
    fn test_ack_type_roundtrip() {
        for ack in [
            AckType::Delivered,
            AckType::Poison,
            AckType::Standard,
            AckType::Redelivered,
            AckType::Individual,
        ] {
            assert_eq!(AckType::from_byte(ack.to_byte()), Some(ack));
        }
        assert_eq!(AckType::from_byte(9), None);
    }

    #[test]
    fn test_cached_size_tracks_body() {
        let small = Message::bytes(Destination::Queue("q".into()), vec![0; 10]);
        let large = Message::bytes(Destination::Queue("q".into()), vec![0; 1000]);
        assert!(large.cached_size() > small.cached_size());
    }
}
