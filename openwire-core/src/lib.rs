//! Core types and marshalling for the OpenWire binary protocol.
//!
//! This crate is the protocol layer of an ActiveMQ-compatible client: the
//! typed command model, the bit-packed optional-field presence stream, the
//! versioned marshaller registry, and the top-level frame (de)serializer
//! with its handshake negotiation rules. It performs no I/O of its own
//! beyond byte buffers; the transport layer lives in `openwire-client`.

pub mod command;
pub mod error;
pub mod marshal;
pub mod wireformat;

pub use command::Command;
pub use error::{OpenWireError, Result};
pub use marshal::{
    BooleanStream, BufferInput, BufferOutput, DataInput, DataOutput, DataStreamMarshaller,
    MarshalContext, MarshallerRegistry,
};
pub use wireformat::{
    OpenWireCodec, OpenWireFormat, WireFormatOptions, DEFAULT_VERSION, MAX_SUPPORTED_VERSION,
};
