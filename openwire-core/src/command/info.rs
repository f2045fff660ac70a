//! Lifecycle and topology commands exchanged with the broker.

use super::ids::{ConnectionId, ConsumerId, Destination, LocalTransactionId, ProducerId, SessionId};

/// Magic bytes opening every WireFormatInfo.
pub const WIREFORMAT_MAGIC: [u8; 8] = *b"ActiveMQ";

/// Capabilities/version handshake record.
///
/// Both peers send one of these as the first command on a fresh socket; the
/// negotiated options are the pairwise minimum (numbers) or logical AND
/// (flags) of the two.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFormatInfo {
    pub command_id: i32,
    pub response_required: bool,
    /// Highest protocol version this peer is willing to speak.
    pub version: i32,
    pub stack_trace_enabled: bool,
    pub tcp_no_delay_enabled: bool,
    pub cache_enabled: bool,
    pub tight_encoding_enabled: bool,
    pub size_prefix_disabled: bool,
    pub cache_size: i32,
    pub max_inactivity_duration: i64,
    pub max_inactivity_duration_initial_delay: i64,
}

impl Default for WireFormatInfo {
    fn default() -> Self {
        Self {
            command_id: 0,
            response_required: false,
            version: 1,
            stack_trace_enabled: false,
            tcp_no_delay_enabled: false,
            cache_enabled: false,
            tight_encoding_enabled: false,
            size_prefix_disabled: false,
            cache_size: 0,
            max_inactivity_duration: 0,
            max_inactivity_duration_initial_delay: 0,
        }
    }
}

/// Announces a new client connection and its identity to the broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionInfo {
    pub command_id: i32,
    pub response_required: bool,
    pub connection_id: ConnectionId,
    pub client_id: Option<String>,
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub broker_master_connector: bool,
    pub manageable: bool,
    /// Only on the wire for protocol version 2 and later.
    pub client_master: bool,
    /// Only on the wire for protocol version 6 and later.
    pub fault_tolerant: bool,
    /// Set during failover recovery so the broker can distinguish a replayed
    /// connection from a duplicate client id. Version 6 and later.
    pub failover_reconnect: bool,
}

impl ConnectionInfo {
    /// Creates a connection announcement for the given id.
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            ..Default::default()
        }
    }
}

/// Opens a session on an established connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub command_id: i32,
    pub response_required: bool,
    pub session_id: SessionId,
}

impl SessionInfo {
    /// Creates a session announcement for the given id.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            command_id: 0,
            response_required: false,
        }
    }
}

/// Registers a message producer on a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerInfo {
    pub command_id: i32,
    pub response_required: bool,
    pub producer_id: ProducerId,
    pub destination: Option<Destination>,
    pub dispatch_async: bool,
}

impl ProducerInfo {
    /// Creates a producer registration for the given id and destination.
    pub fn new(producer_id: ProducerId, destination: Option<Destination>) -> Self {
        Self {
            producer_id,
            destination,
            ..Default::default()
        }
    }
}

/// Registers a message consumer on a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerInfo {
    pub command_id: i32,
    pub response_required: bool,
    pub consumer_id: ConsumerId,
    pub browser: bool,
    pub destination: Option<Destination>,
    /// Number of messages the broker may push ahead of acknowledgment.
    pub prefetch_size: i32,
    pub dispatch_async: bool,
    pub selector: Option<String>,
    pub subscription_name: Option<String>,
    pub no_local: bool,
    pub exclusive: bool,
    pub retroactive: bool,
    pub priority: i8,
}

impl ConsumerInfo {
    /// Creates a consumer registration for the given id and destination.
    pub fn new(consumer_id: ConsumerId, destination: Option<Destination>) -> Self {
        Self {
            consumer_id,
            destination,
            prefetch_size: 1000,
            ..Default::default()
        }
    }
}

/// Transaction operation carried by a [`TransactionInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionOp {
    #[default]
    Begin,
    Prepare,
    CommitOnePhase,
    CommitTwoPhase,
    Rollback,
    Recover,
    Forget,
    End,
}

impl TransactionOp {
    /// Returns the wire byte for this operation.
    pub fn to_byte(self) -> i8 {
        match self {
            TransactionOp::Begin => 0,
            TransactionOp::Prepare => 1,
            TransactionOp::CommitOnePhase => 2,
            TransactionOp::CommitTwoPhase => 3,
            TransactionOp::Rollback => 4,
            TransactionOp::Recover => 5,
            TransactionOp::Forget => 6,
            TransactionOp::End => 7,
        }
    }

    /// Decodes a wire byte into an operation.
    pub fn from_byte(b: i8) -> Option<Self> {
        Some(match b {
            0 => TransactionOp::Begin,
            1 => TransactionOp::Prepare,
            2 => TransactionOp::CommitOnePhase,
            3 => TransactionOp::CommitTwoPhase,
            4 => TransactionOp::Rollback,
            5 => TransactionOp::Recover,
            6 => TransactionOp::Forget,
            7 => TransactionOp::End,
            _ => return None,
        })
    }
}

/// Begins, commits, or rolls back a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionInfo {
    pub command_id: i32,
    pub response_required: bool,
    pub connection_id: ConnectionId,
    pub transaction_id: Option<LocalTransactionId>,
    pub op: TransactionOp,
}

/// No-op heartbeat; also the sentinel decoded from a null frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeepAliveInfo {
    pub command_id: i32,
    pub response_required: bool,
}

/// Announces that the sender is closing the connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShutdownInfo {
    pub command_id: i32,
    pub response_required: bool,
}

/// Tears down a previously announced object (connection, session, producer,
/// consumer) identified by its nested id.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveInfo {
    pub command_id: i32,
    pub response_required: bool,
    pub object_id: super::ids::DataStructure,
    /// Only on the wire for protocol version 5 and later.
    pub last_delivered_sequence_id: i64,
}

impl RemoveInfo {
    /// Creates a removal command for the given object id.
    pub fn new(object_id: super::ids::DataStructure) -> Self {
        Self {
            command_id: 0,
            response_required: false,
            object_id,
            last_delivered_sequence_id: 0,
        }
    }
}
