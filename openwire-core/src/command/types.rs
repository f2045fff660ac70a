//! OpenWire data structure type ids.
//!
//! These values are fixed by the protocol and shared by every OpenWire
//! implementation; they tag each marshalled structure on the wire.

/// Marker for an absent command (also used for keepalive frames).
pub const NULL_TYPE: u8 = 0;

/// WireFormatInfo handshake command.
pub const WIREFORMAT_INFO: u8 = 1;
/// ConnectionInfo command.
pub const CONNECTION_INFO: u8 = 3;
/// SessionInfo command.
pub const SESSION_INFO: u8 = 4;
/// ConsumerInfo command.
pub const CONSUMER_INFO: u8 = 5;
/// ProducerInfo command.
pub const PRODUCER_INFO: u8 = 6;
/// TransactionInfo command.
pub const TRANSACTION_INFO: u8 = 7;
/// KeepAliveInfo command.
pub const KEEP_ALIVE_INFO: u8 = 10;
/// ShutdownInfo command.
pub const SHUTDOWN_INFO: u8 = 11;
/// RemoveInfo command.
pub const REMOVE_INFO: u8 = 12;
/// MessagePull command.
pub const MESSAGE_PULL: u8 = 20;
/// MessageDispatch command.
pub const MESSAGE_DISPATCH: u8 = 21;
/// MessageAck command.
pub const MESSAGE_ACK: u8 = 22;
/// Bytes message command.
pub const BYTES_MESSAGE: u8 = 24;
/// Text message command.
pub const TEXT_MESSAGE: u8 = 28;
/// Plain Response command.
pub const RESPONSE: u8 = 30;
/// ExceptionResponse command.
pub const EXCEPTION_RESPONSE: u8 = 31;
/// DataResponse command.
pub const DATA_RESPONSE: u8 = 32;
/// IntegerResponse command.
pub const INTEGER_RESPONSE: u8 = 34;

/// Queue destination.
pub const QUEUE: u8 = 100;
/// Topic destination.
pub const TOPIC: u8 = 101;
/// MessageId structure.
pub const MESSAGE_ID: u8 = 110;
/// LocalTransactionId structure.
pub const LOCAL_TRANSACTION_ID: u8 = 111;
/// ConnectionId structure.
pub const CONNECTION_ID: u8 = 120;
/// SessionId structure.
pub const SESSION_ID: u8 = 121;
/// ConsumerId structure.
pub const CONSUMER_ID: u8 = 122;
/// ProducerId structure.
pub const PRODUCER_ID: u8 = 123;
