//! The typed command model: one variant per wire command.
//!
//! Commands form a closed set, so the model is a single sum type with
//! `match`-based dispatch rather than an open class hierarchy. The wire type
//! id of each variant is fixed at construction by the variant itself and can
//! never disagree with the marshaller that handles it.

pub mod ids;
pub mod info;
pub mod message;
pub mod response;
pub mod types;

pub use ids::{
    ConnectionId, ConsumerId, DataStructure, Destination, LocalTransactionId, MessageId,
    ProducerId, SessionId,
};
pub use info::{
    ConnectionInfo, ConsumerInfo, KeepAliveInfo, ProducerInfo, RemoveInfo, SessionInfo,
    ShutdownInfo, TransactionInfo, TransactionOp, WireFormatInfo, WIREFORMAT_MAGIC,
};
pub use message::{AckType, Message, MessageAck, MessageDispatch, MessageKind};
pub use response::{
    BrokerError, DataResponse, ExceptionResponse, IntegerResponse, Response, StackTraceElement,
};

/// One discrete, typed unit of wire exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    WireFormatInfo(WireFormatInfo),
    ConnectionInfo(ConnectionInfo),
    SessionInfo(SessionInfo),
    ConsumerInfo(ConsumerInfo),
    ProducerInfo(ProducerInfo),
    TransactionInfo(TransactionInfo),
    KeepAliveInfo(KeepAliveInfo),
    ShutdownInfo(ShutdownInfo),
    RemoveInfo(RemoveInfo),
    Message(Message),
    MessageDispatch(MessageDispatch),
    MessageAck(MessageAck),
    Response(Response),
    ExceptionResponse(ExceptionResponse),
    DataResponse(DataResponse),
    IntegerResponse(IntegerResponse),
}

impl Command {
    /// Returns the wire type id of this command.
    pub fn data_structure_type(&self) -> u8 {
        match self {
            Command::WireFormatInfo(_) => types::WIREFORMAT_INFO,
            Command::ConnectionInfo(_) => types::CONNECTION_INFO,
            Command::SessionInfo(_) => types::SESSION_INFO,
            Command::ConsumerInfo(_) => types::CONSUMER_INFO,
            Command::ProducerInfo(_) => types::PRODUCER_INFO,
            Command::TransactionInfo(_) => types::TRANSACTION_INFO,
            Command::KeepAliveInfo(_) => types::KEEP_ALIVE_INFO,
            Command::ShutdownInfo(_) => types::SHUTDOWN_INFO,
            Command::RemoveInfo(_) => types::REMOVE_INFO,
            Command::Message(m) => match m.kind {
                MessageKind::Bytes => types::BYTES_MESSAGE,
                MessageKind::Text => types::TEXT_MESSAGE,
            },
            Command::MessageDispatch(_) => types::MESSAGE_DISPATCH,
            Command::MessageAck(_) => types::MESSAGE_ACK,
            Command::Response(_) => types::RESPONSE,
            Command::ExceptionResponse(_) => types::EXCEPTION_RESPONSE,
            Command::DataResponse(_) => types::DATA_RESPONSE,
            Command::IntegerResponse(_) => types::INTEGER_RESPONSE,
        }
    }

    /// Returns the sender-assigned command id.
    pub fn command_id(&self) -> i32 {
        match self {
            Command::WireFormatInfo(c) => c.command_id,
            Command::ConnectionInfo(c) => c.command_id,
            Command::SessionInfo(c) => c.command_id,
            Command::ConsumerInfo(c) => c.command_id,
            Command::ProducerInfo(c) => c.command_id,
            Command::TransactionInfo(c) => c.command_id,
            Command::KeepAliveInfo(c) => c.command_id,
            Command::ShutdownInfo(c) => c.command_id,
            Command::RemoveInfo(c) => c.command_id,
            Command::Message(c) => c.command_id,
            Command::MessageDispatch(c) => c.command_id,
            Command::MessageAck(c) => c.command_id,
            Command::Response(c) => c.command_id,
            Command::ExceptionResponse(c) => c.command_id,
            Command::DataResponse(c) => c.command_id,
            Command::IntegerResponse(c) => c.command_id,
        }
    }

    /// Sets the sender-assigned command id.
    pub fn set_command_id(&mut self, id: i32) {
        match self {
            Command::WireFormatInfo(c) => c.command_id = id,
            Command::ConnectionInfo(c) => c.command_id = id,
            Command::SessionInfo(c) => c.command_id = id,
            Command::ConsumerInfo(c) => c.command_id = id,
            Command::ProducerInfo(c) => c.command_id = id,
            Command::TransactionInfo(c) => c.command_id = id,
            Command::KeepAliveInfo(c) => c.command_id = id,
            Command::ShutdownInfo(c) => c.command_id = id,
            Command::RemoveInfo(c) => c.command_id = id,
            Command::Message(c) => c.command_id = id,
            Command::MessageDispatch(c) => c.command_id = id,
            Command::MessageAck(c) => c.command_id = id,
            Command::Response(c) => c.command_id = id,
            Command::ExceptionResponse(c) => c.command_id = id,
            Command::DataResponse(c) => c.command_id = id,
            Command::IntegerResponse(c) => c.command_id = id,
        }
    }

    /// Returns whether the sender expects a response.
    pub fn response_required(&self) -> bool {
        match self {
            Command::WireFormatInfo(c) => c.response_required,
            Command::ConnectionInfo(c) => c.response_required,
            Command::SessionInfo(c) => c.response_required,
            Command::ConsumerInfo(c) => c.response_required,
            Command::ProducerInfo(c) => c.response_required,
            Command::TransactionInfo(c) => c.response_required,
            Command::KeepAliveInfo(c) => c.response_required,
            Command::ShutdownInfo(c) => c.response_required,
            Command::RemoveInfo(c) => c.response_required,
            Command::Message(c) => c.response_required,
            Command::MessageDispatch(c) => c.response_required,
            Command::MessageAck(c) => c.response_required,
            Command::Response(c) => c.response_required,
            Command::ExceptionResponse(c) => c.response_required,
            Command::DataResponse(c) => c.response_required,
            Command::IntegerResponse(c) => c.response_required,
        }
    }

    /// Marks whether the sender expects a response.
    pub fn set_response_required(&mut self, required: bool) {
        match self {
            Command::WireFormatInfo(c) => c.response_required = required,
            Command::ConnectionInfo(c) => c.response_required = required,
            Command::SessionInfo(c) => c.response_required = required,
            Command::ConsumerInfo(c) => c.response_required = required,
            Command::ProducerInfo(c) => c.response_required = required,
            Command::TransactionInfo(c) => c.response_required = required,
            Command::KeepAliveInfo(c) => c.response_required = required,
            Command::ShutdownInfo(c) => c.response_required = required,
            Command::RemoveInfo(c) => c.response_required = required,
            Command::Message(c) => c.response_required = required,
            Command::MessageDispatch(c) => c.response_required = required,
            Command::MessageAck(c) => c.response_required = required,
            Command::Response(c) => c.response_required = required,
            Command::ExceptionResponse(c) => c.response_required = required,
            Command::DataResponse(c) => c.response_required = required,
            Command::IntegerResponse(c) => c.response_required = required,
        }
    }

    /// Returns `true` if this command answers an earlier request.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Command::Response(_)
                | Command::ExceptionResponse(_)
                | Command::DataResponse(_)
                | Command::IntegerResponse(_)
        )
    }

    /// Returns the correlation id for response commands.
    pub fn correlation_id(&self) -> Option<i32> {
        match self {
            Command::Response(c) => Some(c.correlation_id),
            Command::ExceptionResponse(c) => Some(c.correlation_id),
            Command::DataResponse(c) => Some(c.correlation_id),
            Command::IntegerResponse(c) => Some(c.correlation_id),
            _ => None,
        }
    }

    /// Returns `true` for application message commands.
    pub fn is_message(&self) -> bool {
        matches!(self, Command::Message(_))
    }

    /// Returns `true` for the WireFormatInfo handshake command.
    pub fn is_wireformat_info(&self) -> bool {
        matches!(self, Command::WireFormatInfo(_))
    }

    /// Returns a short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::WireFormatInfo(_) => "WireFormatInfo",
            Command::ConnectionInfo(_) => "ConnectionInfo",
            Command::SessionInfo(_) => "SessionInfo",
            Command::ConsumerInfo(_) => "ConsumerInfo",
            Command::ProducerInfo(_) => "ProducerInfo",
            Command::TransactionInfo(_) => "TransactionInfo",
            Command::KeepAliveInfo(_) => "KeepAliveInfo",
            Command::ShutdownInfo(_) => "ShutdownInfo",
            Command::RemoveInfo(_) => "RemoveInfo",
            Command::Message(_) => "Message",
            Command::MessageDispatch(_) => "MessageDispatch",
            Command::MessageAck(_) => "MessageAck",
            Command::Response(_) => "Response",
            Command::ExceptionResponse(_) => "ExceptionResponse",
            Command::DataResponse(_) => "DataResponse",
            Command::IntegerResponse(_) => "IntegerResponse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ids_match_variants() {
        let wf = Command::WireFormatInfo(WireFormatInfo::default());
        assert_eq!(wf.data_structure_type(), types::WIREFORMAT_INFO);

        let text = Command::Message(Message::text(Destination::Queue("q".into()), "hi"));
        assert_eq!(text.data_structure_type(), types::TEXT_MESSAGE);

        let bytes = Command::Message(Message::bytes(Destination::Queue("q".into()), vec![]));
        assert_eq!(bytes.data_structure_type(), types::BYTES_MESSAGE);
    }

    #[test]
    fn test_command_id_accessors() {
        let mut cmd = Command::ConnectionInfo(ConnectionInfo::new(ConnectionId::new("c")));
        assert_eq!(cmd.command_id(), 0);
        cmd.set_command_id(42);
        assert_eq!(cmd.command_id(), 42);
    }

    #[test]
    fn test_response_required_accessors() {
        let mut cmd = Command::SessionInfo(SessionInfo::default());
        assert!(!cmd.response_required());
        cmd.set_response_required(true);
        assert!(cmd.response_required());
    }

    #[test]
    fn test_response_classification() {
        let response = Command::Response(Response::for_request(3));
        assert!(response.is_response());
        assert_eq!(response.correlation_id(), Some(3));

        let info = Command::KeepAliveInfo(KeepAliveInfo::default());
        assert!(!info.is_response());
        assert_eq!(info.correlation_id(), None);
    }

    #[test]
    fn test_name_for_logging() {
        let cmd = Command::ShutdownInfo(ShutdownInfo::default());
        assert_eq!(cmd.name(), "ShutdownInfo");
    }
}
