//! Field-level marshalling helpers shared by every command marshaller.
//!
//! Tight encoding is two-pass: pass one (`*1` functions) records presence and
//! size-class bits in the [`BooleanStream`] and returns the exact number of
//! body bytes the field will occupy; pass two (`*2` functions) replays those
//! bits and writes the bytes. Unmarshalling consumes bits and bytes in the
//! identical order. Loose encoding writes presence flags inline as bytes.

use crate::command::ids::{
    ConnectionId, ConsumerId, DataStructure, Destination, LocalTransactionId, MessageId,
    ProducerId, SessionId,
};
use crate::command::response::{BrokerError, StackTraceElement};
use crate::command::types;
use crate::error::{OpenWireError, Result};
use crate::marshal::{BooleanStream, DataInput, DataOutput};

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Pass one for an optional string: presence bit, then an "ASCII only" bit
/// selecting the cheaper write path. Returns the body size in bytes.
pub fn tight_marshal_string1(value: Option<&str>, bs: &mut BooleanStream) -> Result<usize> {
    match value {
        Some(s) if !s.is_empty() => {
            bs.write_boolean(true);
            let bytes = s.as_bytes();
            if bytes.len() > u16::MAX as usize {
                return Err(OpenWireError::Marshal(format!(
                    "string too long to encode: {} bytes",
                    bytes.len()
                )));
            }
            bs.write_boolean(s.is_ascii());
            Ok(2 + bytes.len())
        }
        _ => {
            bs.write_boolean(false);
            Ok(0)
        }
    }
}

/// Pass two for an optional string.
pub fn tight_marshal_string2(
    value: Option<&str>,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_boolean()? {
        let s = value.unwrap_or_default();
        if bs.read_boolean()? {
            out.write_u16(s.len() as u16)?;
            out.write_bytes(s.as_bytes())?;
        } else {
            out.write_utf(s)?;
        }
    }
    Ok(())
}

/// Reads an optional string written by the tight passes.
pub fn tight_unmarshal_string(
    input: &mut dyn DataInput,
    bs: &mut BooleanStream,
) -> Result<Option<String>> {
    if bs.read_boolean()? {
        if bs.read_boolean()? {
            let len = input.read_u16()? as usize;
            let bytes = input.read_bytes(len)?;
            String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| OpenWireError::Marshal(format!("invalid ASCII string: {}", e)))
        } else {
            input.read_utf().map(Some)
        }
    } else {
        Ok(None)
    }
}

/// Writes an optional string in loose mode.
pub fn loose_marshal_string(value: Option<&str>, out: &mut dyn DataOutput) -> Result<()> {
    match value {
        Some(s) if !s.is_empty() => {
            out.write_bool(true)?;
            out.write_utf(s)
        }
        _ => out.write_bool(false),
    }
}

/// Reads an optional string in loose mode.
pub fn loose_unmarshal_string(input: &mut dyn DataInput) -> Result<Option<String>> {
    if input.read_bool()? {
        input.read_utf().map(Some)
    } else {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Longs
// ---------------------------------------------------------------------------

/// Pass one for an i64: two bits select the size class (0, u16, u32, or the
/// full 8 bytes). Returns the body size.
pub fn tight_marshal_long1(value: i64, bs: &mut BooleanStream) -> usize {
    if value == 0 {
        bs.write_boolean(false);
        bs.write_boolean(false);
        0
    } else if value as u64 & 0xFFFF_FFFF_FFFF_0000 == 0 {
        bs.write_boolean(false);
        bs.write_boolean(true);
        2
    } else if value as u64 & 0xFFFF_FFFF_0000_0000 == 0 {
        bs.write_boolean(true);
        bs.write_boolean(false);
        4
    } else {
        bs.write_boolean(true);
        bs.write_boolean(true);
        8
    }
}

/// Pass two for an i64.
pub fn tight_marshal_long2(
    value: i64,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_boolean()? {
        if bs.read_boolean()? {
            out.write_long(value)
        } else {
            out.write_u32(value as u32)
        }
    } else if bs.read_boolean()? {
        out.write_u16(value as u16)
    } else {
        Ok(())
    }
}

/// Reads an i64 written by the tight passes. Short forms zero-extend.
pub fn tight_unmarshal_long(input: &mut dyn DataInput, bs: &mut BooleanStream) -> Result<i64> {
    if bs.read_boolean()? {
        if bs.read_boolean()? {
            input.read_long()
        } else {
            Ok(i64::from(input.read_u32()?))
        }
    } else if bs.read_boolean()? {
        Ok(i64::from(input.read_u16()?))
    } else {
        Ok(0)
    }
}

/// Writes an i64 in loose mode (always the full 8 bytes).
pub fn loose_marshal_long(value: i64, out: &mut dyn DataOutput) -> Result<()> {
    out.write_long(value)
}

/// Reads an i64 in loose mode.
pub fn loose_unmarshal_long(input: &mut dyn DataInput) -> Result<i64> {
    input.read_long()
}

// ---------------------------------------------------------------------------
// Byte arrays
// ---------------------------------------------------------------------------

/// Pass one for an optional byte array. Returns the body size.
pub fn tight_marshal_bytes1(value: Option<&[u8]>, bs: &mut BooleanStream) -> usize {
    match value {
        Some(data) => {
            bs.write_boolean(true);
            4 + data.len()
        }
        None => {
            bs.write_boolean(false);
            0
        }
    }
}

/// Pass two for an optional byte array.
pub fn tight_marshal_bytes2(
    value: Option<&[u8]>,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_boolean()? {
        let data = value.unwrap_or_default();
        out.write_int(data.len() as i32)?;
        out.write_bytes(data)?;
    }
    Ok(())
}

/// Reads an optional byte array written by the tight passes.
pub fn tight_unmarshal_bytes(
    input: &mut dyn DataInput,
    bs: &mut BooleanStream,
) -> Result<Option<Vec<u8>>> {
    if bs.read_boolean()? {
        let len = input.read_int()?;
        if len < 0 {
            return Err(OpenWireError::Marshal(format!(
                "negative byte array length: {}",
                len
            )));
        }
        input.read_bytes(len as usize).map(Some)
    } else {
        Ok(None)
    }
}

/// Writes an optional byte array in loose mode.
pub fn loose_marshal_bytes(value: Option<&[u8]>, out: &mut dyn DataOutput) -> Result<()> {
    match value {
        Some(data) => {
            out.write_bool(true)?;
            out.write_int(data.len() as i32)?;
            out.write_bytes(data)
        }
        None => out.write_bool(false),
    }
}

/// Reads an optional byte array in loose mode.
pub fn loose_unmarshal_bytes(input: &mut dyn DataInput) -> Result<Option<Vec<u8>>> {
    if input.read_bool()? {
        let len = input.read_int()?;
        if len < 0 {
            return Err(OpenWireError::Marshal(format!(
                "negative byte array length: {}",
                len
            )));
        }
        input.read_bytes(len as usize).map(Some)
    } else {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Nested data structures
// ---------------------------------------------------------------------------

fn tight_fields_size(ds: &DataStructure, bs: &mut BooleanStream) -> Result<usize> {
    match ds {
        DataStructure::ConnectionId(v) => tight_marshal_string1(Some(&v.value), bs),
        DataStructure::SessionId(v) => {
            let mut size = tight_marshal_string1(Some(&v.connection_id), bs)?;
            size += tight_marshal_long1(v.value, bs);
            Ok(size)
        }
        DataStructure::ProducerId(v) => {
            let mut size = tight_marshal_string1(Some(&v.connection_id), bs)?;
            size += tight_marshal_long1(v.value, bs);
            size += tight_marshal_long1(v.session_id, bs);
            Ok(size)
        }
        DataStructure::ConsumerId(v) => {
            let mut size = tight_marshal_string1(Some(&v.connection_id), bs)?;
            size += tight_marshal_long1(v.value, bs);
            size += tight_marshal_long1(v.session_id, bs);
            Ok(size)
        }
        DataStructure::MessageId(v) => {
            let producer = DataStructure::ProducerId(v.producer_id.clone());
            let mut size = tight_marshal_nested1(Some(&producer), bs)?;
            size += tight_marshal_long1(v.producer_sequence_id, bs);
            size += tight_marshal_long1(v.broker_sequence_id, bs);
            Ok(size)
        }
        DataStructure::LocalTransactionId(v) => {
            let mut size = tight_marshal_long1(v.value, bs);
            let conn = DataStructure::ConnectionId(v.connection_id.clone());
            size += tight_marshal_nested1(Some(&conn), bs)?;
            Ok(size)
        }
        DataStructure::Destination(v) => tight_marshal_string1(Some(v.physical_name()), bs),
    }
}

fn tight_write_fields(
    ds: &DataStructure,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    match ds {
        DataStructure::ConnectionId(v) => tight_marshal_string2(Some(&v.value), out, bs),
        DataStructure::SessionId(v) => {
            tight_marshal_string2(Some(&v.connection_id), out, bs)?;
            tight_marshal_long2(v.value, out, bs)
        }
        DataStructure::ProducerId(v) => {
            tight_marshal_string2(Some(&v.connection_id), out, bs)?;
            tight_marshal_long2(v.value, out, bs)?;
            tight_marshal_long2(v.session_id, out, bs)
        }
        DataStructure::ConsumerId(v) => {
            tight_marshal_string2(Some(&v.connection_id), out, bs)?;
            tight_marshal_long2(v.value, out, bs)?;
            tight_marshal_long2(v.session_id, out, bs)
        }
        DataStructure::MessageId(v) => {
            let producer = DataStructure::ProducerId(v.producer_id.clone());
            tight_marshal_nested2(Some(&producer), out, bs)?;
            tight_marshal_long2(v.producer_sequence_id, out, bs)?;
            tight_marshal_long2(v.broker_sequence_id, out, bs)
        }
        DataStructure::LocalTransactionId(v) => {
            tight_marshal_long2(v.value, out, bs)?;
            let conn = DataStructure::ConnectionId(v.connection_id.clone());
            tight_marshal_nested2(Some(&conn), out, bs)
        }
        DataStructure::Destination(v) => tight_marshal_string2(Some(v.physical_name()), out, bs),
    }
}

fn tight_read_fields(
    tag: u8,
    input: &mut dyn DataInput,
    bs: &mut BooleanStream,
) -> Result<DataStructure> {
    Ok(match tag {
        types::CONNECTION_ID => DataStructure::ConnectionId(ConnectionId {
            value: tight_unmarshal_string(input, bs)?.unwrap_or_default(),
        }),
        types::SESSION_ID => DataStructure::SessionId(SessionId {
            connection_id: tight_unmarshal_string(input, bs)?.unwrap_or_default(),
            value: tight_unmarshal_long(input, bs)?,
        }),
        types::PRODUCER_ID => DataStructure::ProducerId(ProducerId {
            connection_id: tight_unmarshal_string(input, bs)?.unwrap_or_default(),
            value: tight_unmarshal_long(input, bs)?,
            session_id: tight_unmarshal_long(input, bs)?,
        }),
        types::CONSUMER_ID => DataStructure::ConsumerId(ConsumerId {
            connection_id: tight_unmarshal_string(input, bs)?.unwrap_or_default(),
            value: tight_unmarshal_long(input, bs)?,
            session_id: tight_unmarshal_long(input, bs)?,
        }),
        types::MESSAGE_ID => {
            let producer_id = match tight_unmarshal_nested(input, bs)? {
                Some(DataStructure::ProducerId(p)) => p,
                Some(other) => {
                    return Err(unexpected_nested("ProducerId", other.data_structure_type()))
                }
                None => ProducerId::default(),
            };
            DataStructure::MessageId(MessageId {
                producer_id,
                producer_sequence_id: tight_unmarshal_long(input, bs)?,
                broker_sequence_id: tight_unmarshal_long(input, bs)?,
            })
        }
        types::LOCAL_TRANSACTION_ID => {
            let value = tight_unmarshal_long(input, bs)?;
            let connection_id = match tight_unmarshal_nested(input, bs)? {
                Some(DataStructure::ConnectionId(c)) => c,
                Some(other) => {
                    return Err(unexpected_nested("ConnectionId", other.data_structure_type()))
                }
                None => ConnectionId::default(),
            };
            DataStructure::LocalTransactionId(LocalTransactionId {
                value,
                connection_id,
            })
        }
        types::QUEUE => DataStructure::Destination(Destination::Queue(
            tight_unmarshal_string(input, bs)?.unwrap_or_default(),
        )),
        types::TOPIC => DataStructure::Destination(Destination::Topic(
            tight_unmarshal_string(input, bs)?.unwrap_or_default(),
        )),
        other => {
            return Err(OpenWireError::Protocol(format!(
                "unknown data type: {}",
                other
            )))
        }
    })
}

fn unexpected_nested(expected: &str, got: u8) -> OpenWireError {
    OpenWireError::Protocol(format!(
        "unexpected nested data type: expected {}, got type id {}",
        expected, got
    ))
}

/// Pass one for an optional nested structure: presence bit, then the nested
/// fields' own presence bits. Returns body size including the type tag byte.
pub fn tight_marshal_nested1(
    value: Option<&DataStructure>,
    bs: &mut BooleanStream,
) -> Result<usize> {
    match value {
        Some(ds) => {
            bs.write_boolean(true);
            Ok(1 + tight_fields_size(ds, bs)?)
        }
        None => {
            bs.write_boolean(false);
            Ok(0)
        }
    }
}

/// Pass two for an optional nested structure: type tag byte, then fields.
pub fn tight_marshal_nested2(
    value: Option<&DataStructure>,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_boolean()? {
        let ds = value.ok_or_else(|| {
            OpenWireError::Marshal("presence bit set for absent nested structure".to_string())
        })?;
        out.write_u8(ds.data_structure_type())?;
        tight_write_fields(ds, out, bs)?;
    }
    Ok(())
}

/// Reads an optional nested structure, dispatching on its type tag.
pub fn tight_unmarshal_nested(
    input: &mut dyn DataInput,
    bs: &mut BooleanStream,
) -> Result<Option<DataStructure>> {
    if bs.read_boolean()? {
        let tag = input.read_u8()?;
        tight_read_fields(tag, input, bs).map(Some)
    } else {
        Ok(None)
    }
}

fn loose_write_fields(ds: &DataStructure, out: &mut dyn DataOutput) -> Result<()> {
    match ds {
        DataStructure::ConnectionId(v) => loose_marshal_string(Some(&v.value), out),
        DataStructure::SessionId(v) => {
            loose_marshal_string(Some(&v.connection_id), out)?;
            loose_marshal_long(v.value, out)
        }
        DataStructure::ProducerId(v) => {
            loose_marshal_string(Some(&v.connection_id), out)?;
            loose_marshal_long(v.value, out)?;
            loose_marshal_long(v.session_id, out)
        }
        DataStructure::ConsumerId(v) => {
            loose_marshal_string(Some(&v.connection_id), out)?;
            loose_marshal_long(v.value, out)?;
            loose_marshal_long(v.session_id, out)
        }
        DataStructure::MessageId(v) => {
            let producer = DataStructure::ProducerId(v.producer_id.clone());
            loose_marshal_nested(Some(&producer), out)?;
            loose_marshal_long(v.producer_sequence_id, out)?;
            loose_marshal_long(v.broker_sequence_id, out)
        }
        DataStructure::LocalTransactionId(v) => {
            loose_marshal_long(v.value, out)?;
            let conn = DataStructure::ConnectionId(v.connection_id.clone());
            loose_marshal_nested(Some(&conn), out)
        }
        DataStructure::Destination(v) => loose_marshal_string(Some(v.physical_name()), out),
    }
}

fn loose_read_fields(tag: u8, input: &mut dyn DataInput) -> Result<DataStructure> {
    Ok(match tag {
        types::CONNECTION_ID => DataStructure::ConnectionId(ConnectionId {
            value: loose_unmarshal_string(input)?.unwrap_or_default(),
        }),
        types::SESSION_ID => DataStructure::SessionId(SessionId {
            connection_id: loose_unmarshal_string(input)?.unwrap_or_default(),
            value: loose_unmarshal_long(input)?,
        }),
        types::PRODUCER_ID => DataStructure::ProducerId(ProducerId {
            connection_id: loose_unmarshal_string(input)?.unwrap_or_default(),
            value: loose_unmarshal_long(input)?,
            session_id: loose_unmarshal_long(input)?,
        }),
        types::CONSUMER_ID => DataStructure::ConsumerId(ConsumerId {
            connection_id: loose_unmarshal_string(input)?.unwrap_or_default(),
            value: loose_unmarshal_long(input)?,
            session_id: loose_unmarshal_long(input)?,
        }),
        types::MESSAGE_ID => {
            let producer_id = match loose_unmarshal_nested(input)? {
                Some(DataStructure::ProducerId(p)) => p,
                Some(other) => {
                    return Err(unexpected_nested("ProducerId", other.data_structure_type()))
                }
                None => ProducerId::default(),
            };
            DataStructure::MessageId(MessageId {
                producer_id,
                producer_sequence_id: loose_unmarshal_long(input)?,
                broker_sequence_id: loose_unmarshal_long(input)?,
            })
        }
        types::LOCAL_TRANSACTION_ID => {
            let value = loose_unmarshal_long(input)?;
            let connection_id = match loose_unmarshal_nested(input)? {
                Some(DataStructure::ConnectionId(c)) => c,
                Some(other) => {
                    return Err(unexpected_nested("ConnectionId", other.data_structure_type()))
                }
                None => ConnectionId::default(),
            };
            DataStructure::LocalTransactionId(LocalTransactionId {
                value,
                connection_id,
            })
        }
        types::QUEUE => DataStructure::Destination(Destination::Queue(
            loose_unmarshal_string(input)?.unwrap_or_default(),
        )),
        types::TOPIC => DataStructure::Destination(Destination::Topic(
            loose_unmarshal_string(input)?.unwrap_or_default(),
        )),
        other => {
            return Err(OpenWireError::Protocol(format!(
                "unknown data type: {}",
                other
            )))
        }
    })
}

/// Writes an optional nested structure in loose mode.
pub fn loose_marshal_nested(value: Option<&DataStructure>, out: &mut dyn DataOutput) -> Result<()> {
    match value {
        Some(ds) => {
            out.write_bool(true)?;
            out.write_u8(ds.data_structure_type())?;
            loose_write_fields(ds, out)
        }
        None => out.write_bool(false),
    }
}

/// Reads an optional nested structure in loose mode.
pub fn loose_unmarshal_nested(input: &mut dyn DataInput) -> Result<Option<DataStructure>> {
    if input.read_bool()? {
        let tag = input.read_u8()?;
        loose_read_fields(tag, input).map(Some)
    } else {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Broker errors (throwable form; no wire type id of its own)
// ---------------------------------------------------------------------------

/// Pass one for an optional broker error. The stack trace and cause chain
/// only go on the wire when `stack_trace_enabled` was negotiated.
pub fn tight_marshal_broker_error1(
    value: Option<&BrokerError>,
    stack_trace_enabled: bool,
    bs: &mut BooleanStream,
) -> Result<usize> {
    match value {
        Some(error) => {
            bs.write_boolean(true);
            let mut size = tight_marshal_string1(Some(&error.exception_class), bs)?;
            size += tight_marshal_string1(Some(&error.message), bs)?;
            if stack_trace_enabled {
                size += 2;
                for element in &error.stack_trace {
                    size += tight_marshal_string1(Some(&element.class_name), bs)?;
                    size += tight_marshal_string1(Some(&element.method_name), bs)?;
                    size += tight_marshal_string1(Some(&element.file_name), bs)?;
                    size += 4;
                }
                size += tight_marshal_broker_error1(
                    error.cause.as_deref(),
                    stack_trace_enabled,
                    bs,
                )?;
            }
            Ok(size)
        }
        None => {
            bs.write_boolean(false);
            Ok(0)
        }
    }
}

/// Pass two for an optional broker error.
pub fn tight_marshal_broker_error2(
    value: Option<&BrokerError>,
    stack_trace_enabled: bool,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    if bs.read_boolean()? {
        let error = value.ok_or_else(|| {
            OpenWireError::Marshal("presence bit set for absent broker error".to_string())
        })?;
        tight_marshal_string2(Some(&error.exception_class), out, bs)?;
        tight_marshal_string2(Some(&error.message), out, bs)?;
        if stack_trace_enabled {
            out.write_short(error.stack_trace.len() as i16)?;
            for element in &error.stack_trace {
                tight_marshal_string2(Some(&element.class_name), out, bs)?;
                tight_marshal_string2(Some(&element.method_name), out, bs)?;
                tight_marshal_string2(Some(&element.file_name), out, bs)?;
                out.write_int(element.line_number)?;
            }
            tight_marshal_broker_error2(error.cause.as_deref(), stack_trace_enabled, out, bs)?;
        }
    }
    Ok(())
}

/// Reads an optional broker error written by the tight passes.
pub fn tight_unmarshal_broker_error(
    input: &mut dyn DataInput,
    stack_trace_enabled: bool,
    bs: &mut BooleanStream,
) -> Result<Option<BrokerError>> {
    if bs.read_boolean()? {
        let exception_class = tight_unmarshal_string(input, bs)?.unwrap_or_default();
        let message = tight_unmarshal_string(input, bs)?.unwrap_or_default();
        let mut error = BrokerError::new(exception_class, message);
        if stack_trace_enabled {
            let count = input.read_short()?;
            for _ in 0..count.max(0) {
                error.stack_trace.push(StackTraceElement {
                    class_name: tight_unmarshal_string(input, bs)?.unwrap_or_default(),
                    method_name: tight_unmarshal_string(input, bs)?.unwrap_or_default(),
                    file_name: tight_unmarshal_string(input, bs)?.unwrap_or_default(),
                    line_number: input.read_int()?,
                });
            }
            error.cause = tight_unmarshal_broker_error(input, stack_trace_enabled, bs)?
                .map(Box::new);
        }
        Ok(Some(error))
    } else {
        Ok(None)
    }
}

/// Writes an optional broker error in loose mode.
pub fn loose_marshal_broker_error(
    value: Option<&BrokerError>,
    stack_trace_enabled: bool,
    out: &mut dyn DataOutput,
) -> Result<()> {
    match value {
        Some(error) => {
            out.write_bool(true)?;
            loose_marshal_string(Some(&error.exception_class), out)?;
            loose_marshal_string(Some(&error.message), out)?;
            if stack_trace_enabled {
                out.write_short(error.stack_trace.len() as i16)?;
                for element in &error.stack_trace {
                    loose_marshal_string(Some(&element.class_name), out)?;
                    loose_marshal_string(Some(&element.method_name), out)?;
                    loose_marshal_string(Some(&element.file_name), out)?;
                    out.write_int(element.line_number)?;
                }
                loose_marshal_broker_error(error.cause.as_deref(), stack_trace_enabled, out)?;
            }
            Ok(())
        }
        None => out.write_bool(false),
    }
}

/// Reads an optional broker error in loose mode.
pub fn loose_unmarshal_broker_error(
    input: &mut dyn DataInput,
    stack_trace_enabled: bool,
) -> Result<Option<BrokerError>> {
    if input.read_bool()? {
        let exception_class = loose_unmarshal_string(input)?.unwrap_or_default();
        let message = loose_unmarshal_string(input)?.unwrap_or_default();
        let mut error = BrokerError::new(exception_class, message);
        if stack_trace_enabled {
            let count = input.read_short()?;
            for _ in 0..count.max(0) {
                error.stack_trace.push(StackTraceElement {
                    class_name: loose_unmarshal_string(input)?.unwrap_or_default(),
                    method_name: loose_unmarshal_string(input)?.unwrap_or_default(),
                    file_name: loose_unmarshal_string(input)?.unwrap_or_default(),
                    line_number: input.read_int()?,
                });
            }
            error.cause = loose_unmarshal_broker_error(input, stack_trace_enabled)?.map(Box::new);
        }
        Ok(Some(error))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::{BufferInput, BufferOutput};

    fn tight_string_roundtrip(value: Option<&str>) -> Option<String> {
        let mut bs = BooleanStream::new();
        let size = tight_marshal_string1(value, &mut bs).unwrap();
        let mut out = BufferOutput::new();
        let mut header = BufferOutput::new();
        bs.marshal(&mut header).unwrap();
        tight_marshal_string2(value, &mut out, &mut bs).unwrap();
        assert_eq!(out.len(), size);

        let header_bytes = header.into_bytes();
        let mut bs2 = BooleanStream::new();
        let mut header_in = BufferInput::new(&header_bytes);
        bs2.unmarshal(&mut header_in).unwrap();
        let body = out.into_bytes();
        let mut input = BufferInput::new(&body);
        tight_unmarshal_string(&mut input, &mut bs2).unwrap()
    }

    #[test]
    fn test_tight_string_ascii() {
        assert_eq!(tight_string_roundtrip(Some("hello")), Some("hello".into()));
    }

    #[test]
    fn test_tight_string_utf8() {
        assert_eq!(
            tight_string_roundtrip(Some("héllo wörld")),
            Some("héllo wörld".into())
        );
    }

    #[test]
    fn test_tight_string_absent() {
        assert_eq!(tight_string_roundtrip(None), None);
        // Empty strings marshal as absent.
        assert_eq!(tight_string_roundtrip(Some("")), None);
    }

    fn tight_long_roundtrip(value: i64) -> (usize, i64) {
        let mut bs = BooleanStream::new();
        let size = tight_marshal_long1(value, &mut bs);
        let mut header = BufferOutput::new();
        bs.marshal(&mut header).unwrap();
        let mut out = BufferOutput::new();
        tight_marshal_long2(value, &mut out, &mut bs).unwrap();
        assert_eq!(out.len(), size);

        let header_bytes = header.into_bytes();
        let mut bs2 = BooleanStream::new();
        let mut header_in = BufferInput::new(&header_bytes);
        bs2.unmarshal(&mut header_in).unwrap();
        let body = out.into_bytes();
        let mut input = BufferInput::new(&body);
        (size, tight_unmarshal_long(&mut input, &mut bs2).unwrap())
    }

    #[test]
    fn test_tight_long_size_classes() {
        assert_eq!(tight_long_roundtrip(0), (0, 0));
        assert_eq!(tight_long_roundtrip(1), (2, 1));
        assert_eq!(tight_long_roundtrip(0xFFFF), (2, 0xFFFF));
        assert_eq!(tight_long_roundtrip(0x1_0000), (4, 0x1_0000));
        assert_eq!(tight_long_roundtrip(0xFFFF_FFFF), (4, 0xFFFF_FFFF));
        assert_eq!(tight_long_roundtrip(0x1_0000_0000), (8, 0x1_0000_0000));
        assert_eq!(tight_long_roundtrip(i64::MAX), (8, i64::MAX));
        // Negative values always take the full 8 bytes.
        assert_eq!(tight_long_roundtrip(-1), (8, -1));
        assert_eq!(tight_long_roundtrip(i64::MIN), (8, i64::MIN));
    }

    #[test]
    fn test_loose_long_roundtrip() {
        let mut out = BufferOutput::new();
        loose_marshal_long(-42, &mut out).unwrap();
        let bytes = out.into_bytes();
        let mut input = BufferInput::new(&bytes);
        assert_eq!(loose_unmarshal_long(&mut input).unwrap(), -42);
    }

    fn tight_nested_roundtrip(value: Option<&DataStructure>) -> Option<DataStructure> {
        let mut bs = BooleanStream::new();
        let size = tight_marshal_nested1(value, &mut bs).unwrap();
        let mut header = BufferOutput::new();
        bs.marshal(&mut header).unwrap();
        let mut out = BufferOutput::new();
        tight_marshal_nested2(value, &mut out, &mut bs).unwrap();
        assert_eq!(out.len(), size);

        let header_bytes = header.into_bytes();
        let mut bs2 = BooleanStream::new();
        let mut header_in = BufferInput::new(&header_bytes);
        bs2.unmarshal(&mut header_in).unwrap();
        let body = out.into_bytes();
        let mut input = BufferInput::new(&body);
        tight_unmarshal_nested(&mut input, &mut bs2).unwrap()
    }

    #[test]
    fn test_tight_nested_ids_roundtrip() {
        let conn = ConnectionId::new("client-1");
        let session = SessionId::new(&conn, 3);
        let cases = [
            DataStructure::ConnectionId(conn.clone()),
            DataStructure::SessionId(session.clone()),
            DataStructure::ProducerId(ProducerId::new(&session, 5)),
            DataStructure::ConsumerId(ConsumerId::new(&session, 6)),
            DataStructure::MessageId(MessageId {
                producer_id: ProducerId::new(&session, 5),
                producer_sequence_id: 1234,
                broker_sequence_id: 0,
            }),
            DataStructure::LocalTransactionId(LocalTransactionId {
                value: 9,
                connection_id: conn,
            }),
            DataStructure::Destination(Destination::Queue("orders".into())),
            DataStructure::Destination(Destination::Topic("prices".into())),
        ];

        for case in &cases {
            assert_eq!(tight_nested_roundtrip(Some(case)).as_ref(), Some(case));
        }
        assert_eq!(tight_nested_roundtrip(None), None);
    }

    #[test]
    fn test_loose_nested_roundtrip() {
        let session = SessionId::new(&ConnectionId::new("c"), 1);
        let ds = DataStructure::ProducerId(ProducerId::new(&session, 2));

        let mut out = BufferOutput::new();
        loose_marshal_nested(Some(&ds), &mut out).unwrap();
        let bytes = out.into_bytes();
        let mut input = BufferInput::new(&bytes);
        assert_eq!(loose_unmarshal_nested(&mut input).unwrap(), Some(ds));
    }

    #[test]
    fn test_unknown_nested_tag_fails() {
        // Presence byte, then a tag no structure uses.
        let bytes = [1u8, 99];
        let mut input = BufferInput::new(&bytes);
        let err = loose_unmarshal_nested(&mut input).unwrap_err();
        assert!(matches!(err, OpenWireError::Protocol(_)));
        assert!(err.to_string().contains("unknown data type"));
    }

    fn broker_error_fixture() -> BrokerError {
        let mut error = BrokerError::new("javax.jms.JMSException", "send failed");
        error.stack_trace.push(StackTraceElement {
            class_name: "org.apache.activemq.broker.Broker".into(),
            method_name: "send".into(),
            file_name: "Broker.java".into(),
            line_number: 120,
        });
        error.cause = Some(Box::new(BrokerError::new(
            "java.io.IOException",
            "disk full",
        )));
        error
    }

    fn tight_error_roundtrip(
        value: Option<&BrokerError>,
        stack_trace_enabled: bool,
    ) -> Option<BrokerError> {
        let mut bs = BooleanStream::new();
        let size = tight_marshal_broker_error1(value, stack_trace_enabled, &mut bs).unwrap();
        let mut header = BufferOutput::new();
        bs.marshal(&mut header).unwrap();
        let mut out = BufferOutput::new();
        tight_marshal_broker_error2(value, stack_trace_enabled, &mut out, &mut bs).unwrap();
        assert_eq!(out.len(), size);

        let header_bytes = header.into_bytes();
        let mut bs2 = BooleanStream::new();
        let mut header_in = BufferInput::new(&header_bytes);
        bs2.unmarshal(&mut header_in).unwrap();
        let body = out.into_bytes();
        let mut input = BufferInput::new(&body);
        tight_unmarshal_broker_error(&mut input, stack_trace_enabled, &mut bs2).unwrap()
    }

    #[test]
    fn test_broker_error_with_stack_trace() {
        let error = broker_error_fixture();
        let decoded = tight_error_roundtrip(Some(&error), true).unwrap();
        assert_eq!(decoded, error);
        assert_eq!(decoded.stack_trace.len(), 1);
        assert_eq!(decoded.cause.unwrap().message, "disk full");
    }

    #[test]
    fn test_broker_error_without_stack_trace() {
        let error = broker_error_fixture();
        let decoded = tight_error_roundtrip(Some(&error), false).unwrap();
        // Class and message survive; trace and cause are not on the wire.
        assert_eq!(decoded.exception_class, error.exception_class);
        assert_eq!(decoded.message, error.message);
        assert!(decoded.stack_trace.is_empty());
        assert!(decoded.cause.is_none());
    }

    #[test]
    fn test_loose_broker_error_roundtrip() {
        let error = broker_error_fixture();
        let mut out = BufferOutput::new();
        loose_marshal_broker_error(Some(&error), true, &mut out).unwrap();
        let bytes = out.into_bytes();
        let mut input = BufferInput::new(&bytes);
        let decoded = loose_unmarshal_broker_error(&mut input, true).unwrap();
        assert_eq!(decoded, Some(error));
    }

    #[test]
    fn test_tight_bytes_roundtrip() {
        let data = vec![1u8, 2, 3, 4, 5];
        let mut bs = BooleanStream::new();
        let size = tight_marshal_bytes1(Some(&data), &mut bs);
        assert_eq!(size, 4 + data.len());
        let mut header = BufferOutput::new();
        bs.marshal(&mut header).unwrap();
        let mut out = BufferOutput::new();
        tight_marshal_bytes2(Some(&data), &mut out, &mut bs).unwrap();

        let header_bytes = header.into_bytes();
        let mut bs2 = BooleanStream::new();
        let mut header_in = BufferInput::new(&header_bytes);
        bs2.unmarshal(&mut header_in).unwrap();
        let body = out.into_bytes();
        let mut input = BufferInput::new(&body);
        assert_eq!(
            tight_unmarshal_bytes(&mut input, &mut bs2).unwrap(),
            Some(data)
        );
    }
}
