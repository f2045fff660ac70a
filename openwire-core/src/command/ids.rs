//! Identifier structures nested inside commands.
//!
//! Ids form a hierarchy mirroring the broker-side object tree: a connection
//! id scopes session ids, which scope producer and consumer ids. They travel
//! inside commands as nested data structures with their own wire type tags.

use super::types;

/// Identifies one client connection to a broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    /// Connection identity string, unique per client instance.
    pub value: String,
}

impl ConnectionId {
    /// Creates a connection id from the given identity string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Creates a connection id with a fresh random identity.
    pub fn generate() -> Self {
        Self {
            value: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Identifies a session within a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SessionId {
    /// The owning connection's identity string.
    pub connection_id: String,
    /// Session sequence within the connection.
    pub value: i64,
}

impl SessionId {
    /// Creates a session id scoped to the given connection.
    pub fn new(connection_id: &ConnectionId, value: i64) -> Self {
        Self {
            connection_id: connection_id.value.clone(),
            value,
        }
    }
}

/// Identifies a producer within a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProducerId {
    /// The owning connection's identity string.
    pub connection_id: String,
    /// Producer sequence within the session.
    pub value: i64,
    /// The owning session's sequence.
    pub session_id: i64,
}

impl ProducerId {
    /// Creates a producer id scoped to the given session.
    pub fn new(session_id: &SessionId, value: i64) -> Self {
        Self {
            connection_id: session_id.connection_id.clone(),
            value,
            session_id: session_id.value,
        }
    }

    /// Returns the id of the owning session.
    pub fn parent(&self) -> SessionId {
        SessionId {
            connection_id: self.connection_id.clone(),
            value: self.session_id,
        }
    }
}

/// Identifies a consumer within a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConsumerId {
    /// The owning connection's identity string.
    pub connection_id: String,
    /// Consumer sequence within the session.
    pub value: i64,
    /// The owning session's sequence.
    pub session_id: i64,
}

impl ConsumerId {
    /// Creates a consumer id scoped to the given session.
    pub fn new(session_id: &SessionId, value: i64) -> Self {
        Self {
            connection_id: session_id.connection_id.clone(),
            value,
            session_id: session_id.value,
        }
    }

    /// Returns the id of the owning session.
    pub fn parent(&self) -> SessionId {
        SessionId {
            connection_id: self.connection_id.clone(),
            value: self.session_id,
        }
    }
}

/// Identifies a single message from a specific producer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MessageId {
    /// The producer that created the message.
    pub producer_id: ProducerId,
    /// Producer-assigned sequence number.
    pub producer_sequence_id: i64,
    /// Broker-assigned sequence number.
    pub broker_sequence_id: i64,
}

/// Identifies a client-local (non-XA) transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LocalTransactionId {
    /// Transaction sequence within the connection.
    pub value: i64,
    /// The connection that owns the transaction.
    pub connection_id: ConnectionId,
}

/// A message destination on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Point-to-point queue.
    Queue(String),
    /// Publish/subscribe topic.
    Topic(String),
}

impl Destination {
    /// Returns the destination's physical name.
    pub fn physical_name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }

    /// Returns the wire type id for this destination kind.
    pub fn data_structure_type(&self) -> u8 {
        match self {
            Destination::Queue(_) => types::QUEUE,
            Destination::Topic(_) => types::TOPIC,
        }
    }
}

/// A non-command data structure that can be nested inside commands.
///
/// Nested structures are marshalled with a presence flag and a one-byte type
/// tag so the unmarshaller can re-dispatch without knowing the concrete type
/// in advance.
#[derive(Debug, Clone, PartialEq)]
pub enum DataStructure {
    /// A connection id.
    ConnectionId(ConnectionId),
    /// A session id.
    SessionId(SessionId),
    /// A producer id.
    ProducerId(ProducerId),
    /// A consumer id.
    ConsumerId(ConsumerId),
    /// A message id.
    MessageId(MessageId),
    /// A local transaction id.
    LocalTransactionId(LocalTransactionId),
    /// A queue or topic destination.
    Destination(Destination),
}

impl DataStructure {
    /// Returns the wire type id of the contained structure.
    pub fn data_structure_type(&self) -> u8 {
        match self {
            DataStructure::ConnectionId(_) => types::CONNECTION_ID,
            DataStructure::SessionId(_) => types::SESSION_ID,
            DataStructure::ProducerId(_) => types::PRODUCER_ID,
            DataStructure::ConsumerId(_) => types::CONSUMER_ID,
            DataStructure::MessageId(_) => types::MESSAGE_ID,
            DataStructure::LocalTransactionId(_) => types::LOCAL_TRANSACTION_ID,
            DataStructure::Destination(d) => d.data_structure_type(),
        }
    }
}
