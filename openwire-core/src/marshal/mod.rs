//! Command marshalling: versioned encode/decode of commands to wire bytes.
//!
//! Each command type has one [`DataStreamMarshaller`] registered by wire type
//! id in a [`MarshallerRegistry`]. The registry is built explicitly at wire
//! format construction and passed by reference; there is no global state.
//! Marshallers receive a [`MarshalContext`] carrying the negotiated protocol
//! version and branch on it for fields that only exist in later versions.
//! A version-N context must neither write nor read a field gated above N,
//! which is what keeps old and new peers compatible in both directions.

pub mod boolean_stream;
pub mod data_input;
pub mod data_output;
pub mod primitives;

mod info;
mod message;
mod response;

pub use boolean_stream::BooleanStream;
pub use data_input::{BufferInput, DataInput};
pub use data_output::{BufferOutput, DataOutput};

use std::collections::HashMap;

use crate::command::Command;
use crate::error::{OpenWireError, Result};

/// Negotiated options a marshaller needs while encoding or decoding.
#[derive(Debug, Clone, Copy)]
pub struct MarshalContext {
    /// Negotiated protocol version; gates version-dependent fields.
    pub version: i32,
    /// Whether broker error stack traces go on the wire.
    pub stack_trace_enabled: bool,
}

impl Default for MarshalContext {
    fn default() -> Self {
        Self {
            version: 1,
            stack_trace_enabled: false,
        }
    }
}

/// Per-command-type encode/decode routines for both wire encodings.
///
/// Tight marshalling is two-pass: `tight_marshal1` records presence bits and
/// returns the exact body size, `tight_marshal2` replays the bits while
/// writing bytes. The unmarshal side must consume bits and bytes in the
/// identical order or the boolean stream desyncs.
pub trait DataStreamMarshaller: std::fmt::Debug + Send + Sync {
    /// The wire type id this marshaller handles.
    fn data_structure_type(&self) -> u8;

    /// Creates the empty command this marshaller populates.
    fn create_command(&self) -> Command;

    /// Tight pass one: write presence bits, return the body size in bytes.
    fn tight_marshal1(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize>;

    /// Tight pass two: replay presence bits, write body bytes.
    fn tight_marshal2(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
        bs: &mut BooleanStream,
    ) -> Result<()>;

    /// Reconstructs a command from tight-encoded bytes and presence bits.
    fn tight_unmarshal(
        &self,
        ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command>;

    /// Writes the command in loose encoding.
    fn loose_marshal(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
    ) -> Result<()>;

    /// Reconstructs a command from loose-encoded bytes.
    fn loose_unmarshal(&self, ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command>;
}

/// Maps wire type ids to their marshallers.
pub struct MarshallerRegistry {
    marshallers: HashMap<u8, Box<dyn DataStreamMarshaller>>,
}

impl MarshallerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            marshallers: HashMap::new(),
        }
    }

    /// Creates a registry with every supported command type registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(info::WireFormatInfoMarshaller));
        registry.register(Box::new(info::ConnectionInfoMarshaller));
        registry.register(Box::new(info::SessionInfoMarshaller));
        registry.register(Box::new(info::ConsumerInfoMarshaller));
        registry.register(Box::new(info::ProducerInfoMarshaller));
        registry.register(Box::new(info::TransactionInfoMarshaller));
        registry.register(Box::new(info::KeepAliveInfoMarshaller));
        registry.register(Box::new(info::ShutdownInfoMarshaller));
        registry.register(Box::new(info::RemoveInfoMarshaller));
        registry.register(Box::new(message::MessageMarshaller::bytes()));
        registry.register(Box::new(message::MessageMarshaller::text()));
        registry.register(Box::new(message::MessageDispatchMarshaller));
        registry.register(Box::new(message::MessageAckMarshaller));
        registry.register(Box::new(response::ResponseMarshaller));
        registry.register(Box::new(response::ExceptionResponseMarshaller));
        registry.register(Box::new(response::DataResponseMarshaller));
        registry.register(Box::new(response::IntegerResponseMarshaller));
        registry
    }

    /// Registers a marshaller under its own type id, replacing any previous
    /// registration for that id.
    pub fn register(&mut self, marshaller: Box<dyn DataStreamMarshaller>) {
        self.marshallers
            .insert(marshaller.data_structure_type(), marshaller);
    }

    /// Returns the marshaller for the given type id.
    ///
    /// An unregistered id is a protocol error, not a programming error: the
    /// peer may simply speak a newer command set. Callers recover by closing
    /// the transport.
    pub fn get(&self, data_type: u8) -> Result<&dyn DataStreamMarshaller> {
        self.marshallers
            .get(&data_type)
            .map(|m| m.as_ref())
            .ok_or_else(|| OpenWireError::Protocol(format!("unknown data type: {}", data_type)))
    }

    /// Instantiates the empty command for a type id.
    pub fn create_command(&self, data_type: u8) -> Result<Command> {
        Ok(self.get(data_type)?.create_command())
    }

    /// Returns the number of registered marshallers.
    pub fn len(&self) -> usize {
        self.marshallers.len()
    }

    /// Returns `true` if no marshallers are registered.
    pub fn is_empty(&self) -> bool {
        self.marshallers.is_empty()
    }
}

impl Default for MarshallerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for MarshallerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarshallerRegistry")
            .field("registered", &self.marshallers.len())
            .finish()
    }
}

/// Tight pass one for the shared command header: the command id is a fixed
/// i32, response-required is a presence-stream bit.
pub(crate) fn tight_base1(response_required: bool, bs: &mut BooleanStream) -> usize {
    bs.write_boolean(response_required);
    4
}

/// Tight pass two for the shared command header.
pub(crate) fn tight_base2(
    command_id: i32,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    out.write_int(command_id)?;
    // The response-required bit lives in the stream; consume it to keep the
    // replay cursor aligned.
    let _ = bs.read_boolean()?;
    Ok(())
}

/// Tight unmarshal of the shared command header.
pub(crate) fn tight_base_unmarshal(
    input: &mut dyn DataInput,
    bs: &mut BooleanStream,
) -> Result<(i32, bool)> {
    let command_id = input.read_int()?;
    let response_required = bs.read_boolean()?;
    Ok((command_id, response_required))
}

/// Loose marshal of the shared command header.
pub(crate) fn loose_base(
    command_id: i32,
    response_required: bool,
    out: &mut dyn DataOutput,
) -> Result<()> {
    out.write_int(command_id)?;
    out.write_bool(response_required)
}

/// Loose unmarshal of the shared command header.
pub(crate) fn loose_base_unmarshal(input: &mut dyn DataInput) -> Result<(i32, bool)> {
    let command_id = input.read_int()?;
    let response_required = input.read_bool()?;
    Ok((command_id, response_required))
}

/// Builds the error for a command handed to the wrong marshaller.
pub(crate) fn type_mismatch(expected: &str, got: &Command) -> OpenWireError {
    OpenWireError::Protocol(format!(
        "marshaller mismatch: expected {}, got {}",
        expected,
        got.name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::types;

    #[test]
    fn test_standard_registry_covers_command_set() {
        let registry = MarshallerRegistry::standard();
        for id in [
            types::WIREFORMAT_INFO,
            types::CONNECTION_INFO,
            types::SESSION_INFO,
            types::CONSUMER_INFO,
            types::PRODUCER_INFO,
            types::TRANSACTION_INFO,
            types::KEEP_ALIVE_INFO,
            types::SHUTDOWN_INFO,
            types::REMOVE_INFO,
            types::BYTES_MESSAGE,
            types::TEXT_MESSAGE,
            types::MESSAGE_DISPATCH,
            types::MESSAGE_ACK,
            types::RESPONSE,
            types::EXCEPTION_RESPONSE,
            types::DATA_RESPONSE,
            types::INTEGER_RESPONSE,
        ] {
            let marshaller = registry.get(id).unwrap();
            assert_eq!(marshaller.data_structure_type(), id);
            assert_eq!(registry.create_command(id).unwrap().data_structure_type(), id);
        }
    }

    #[test]
    fn test_unknown_type_id_is_protocol_error() {
        let registry = MarshallerRegistry::standard();
        let err = registry.get(200).unwrap_err();
        assert!(matches!(err, OpenWireError::Protocol(_)));
        assert!(err.to_string().contains("unknown data type: 200"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = MarshallerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(types::RESPONSE).is_err());
    }
}
