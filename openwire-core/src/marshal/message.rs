//! Marshallers for message, dispatch, and acknowledgment commands.

use crate::command::ids::DataStructure;
use crate::command::message::{AckType, Message, MessageAck, MessageDispatch, MessageKind};
use crate::command::{types, Command};
use crate::error::{OpenWireError, Result};
use crate::marshal::primitives::*;
use crate::marshal::{
    loose_base, loose_base_unmarshal, tight_base1, tight_base2, tight_base_unmarshal,
    type_mismatch, BooleanStream, DataInput, DataOutput, DataStreamMarshaller, MarshalContext,
};

fn kind_for_type(tag: u8) -> Result<MessageKind> {
    match tag {
        types::BYTES_MESSAGE => Ok(MessageKind::Bytes),
        types::TEXT_MESSAGE => Ok(MessageKind::Text),
        other => Err(OpenWireError::Protocol(format!(
            "not a message type id: {}",
            other
        ))),
    }
}

fn content_option(msg: &Message) -> Option<&[u8]> {
    if msg.content.is_empty() {
        None
    } else {
        Some(&msg.content)
    }
}

// The full message field set is shared between the top-level message
// marshaller and MessageDispatch, which nests an entire message after a type
// tag byte.

fn tight_message_fields1(msg: &Message, bs: &mut BooleanStream) -> Result<usize> {
    let mut size = tight_base1(msg.response_required, bs);
    let producer = msg.producer_id.clone().map(DataStructure::ProducerId);
    size += tight_marshal_nested1(producer.as_ref(), bs)?;
    let dest = msg.destination.clone().map(DataStructure::Destination);
    size += tight_marshal_nested1(dest.as_ref(), bs)?;
    let txn = msg
        .transaction_id
        .clone()
        .map(DataStructure::LocalTransactionId);
    size += tight_marshal_nested1(txn.as_ref(), bs)?;
    let id = msg.message_id.clone().map(DataStructure::MessageId);
    size += tight_marshal_nested1(id.as_ref(), bs)?;
    size += tight_marshal_string1(msg.correlation_id.as_deref(), bs)?;
    bs.write_boolean(msg.persistent);
    size += tight_marshal_long1(msg.expiration, bs);
    size += 1;
    let reply_to = msg.reply_to.clone().map(DataStructure::Destination);
    size += tight_marshal_nested1(reply_to.as_ref(), bs)?;
    size += tight_marshal_long1(msg.timestamp, bs);
    size += tight_marshal_string1(msg.message_type.as_deref(), bs)?;
    size += tight_marshal_bytes1(content_option(msg), bs);
    bs.write_boolean(msg.compressed);
    size += 4;
    Ok(size)
}

fn tight_message_fields2(
    msg: &Message,
    out: &mut dyn DataOutput,
    bs: &mut BooleanStream,
) -> Result<()> {
    tight_base2(msg.command_id, out, bs)?;
    let producer = msg.producer_id.clone().map(DataStructure::ProducerId);
    tight_marshal_nested2(producer.as_ref(), out, bs)?;
    let dest = msg.destination.clone().map(DataStructure::Destination);
    tight_marshal_nested2(dest.as_ref(), out, bs)?;
    let txn = msg
        .transaction_id
        .clone()
        .map(DataStructure::LocalTransactionId);
    tight_marshal_nested2(txn.as_ref(), out, bs)?;
    let id = msg.message_id.clone().map(DataStructure::MessageId);
    tight_marshal_nested2(id.as_ref(), out, bs)?;
    tight_marshal_string2(msg.correlation_id.as_deref(), out, bs)?;
    let _ = bs.read_boolean()?;
    tight_marshal_long2(msg.expiration, out, bs)?;
    out.write_byte(msg.priority)?;
    let reply_to = msg.reply_to.clone().map(DataStructure::Destination);
    tight_marshal_nested2(reply_to.as_ref(), out, bs)?;
    tight_marshal_long2(msg.timestamp, out, bs)?;
    tight_marshal_string2(msg.message_type.as_deref(), out, bs)?;
    tight_marshal_bytes2(content_option(msg), out, bs)?;
    let _ = bs.read_boolean()?;
    out.write_int(msg.redelivery_counter)
}

fn tight_message_fields_read(
    kind: MessageKind,
    input: &mut dyn DataInput,
    bs: &mut BooleanStream,
) -> Result<Message> {
    let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
    let producer_id = match tight_unmarshal_nested(input, bs)? {
        Some(DataStructure::ProducerId(p)) => Some(p),
        _ => None,
    };
    let destination = match tight_unmarshal_nested(input, bs)? {
        Some(DataStructure::Destination(d)) => Some(d),
        _ => None,
    };
    let transaction_id = match tight_unmarshal_nested(input, bs)? {
        Some(DataStructure::LocalTransactionId(t)) => Some(t),
        _ => None,
    };
    let message_id = match tight_unmarshal_nested(input, bs)? {
        Some(DataStructure::MessageId(m)) => Some(m),
        _ => None,
    };
    let correlation_id = tight_unmarshal_string(input, bs)?;
    let persistent = bs.read_boolean()?;
    let expiration = tight_unmarshal_long(input, bs)?;
    let priority = input.read_byte()?;
    let reply_to = match tight_unmarshal_nested(input, bs)? {
        Some(DataStructure::Destination(d)) => Some(d),
        _ => None,
    };
    let timestamp = tight_unmarshal_long(input, bs)?;
    let message_type = tight_unmarshal_string(input, bs)?;
    let content = tight_unmarshal_bytes(input, bs)?.unwrap_or_default();
    let compressed = bs.read_boolean()?;
    let redelivery_counter = input.read_int()?;
    Ok(Message {
        command_id,
        response_required,
        kind,
        message_id,
        producer_id,
        destination,
        transaction_id,
        correlation_id,
        persistent,
        expiration,
        priority,
        reply_to,
        timestamp,
        message_type,
        content,
        compressed,
        redelivery_counter,
    })
}

fn loose_message_fields(msg: &Message, out: &mut dyn DataOutput) -> Result<()> {
    loose_base(msg.command_id, msg.response_required, out)?;
    let producer = msg.producer_id.clone().map(DataStructure::ProducerId);
    loose_marshal_nested(producer.as_ref(), out)?;
    let dest = msg.destination.clone().map(DataStructure::Destination);
    loose_marshal_nested(dest.as_ref(), out)?;
    let txn = msg
        .transaction_id
        .clone()
        .map(DataStructure::LocalTransactionId);
    loose_marshal_nested(txn.as_ref(), out)?;
    let id = msg.message_id.clone().map(DataStructure::MessageId);
    loose_marshal_nested(id.as_ref(), out)?;
    loose_marshal_string(msg.correlation_id.as_deref(), out)?;
    out.write_bool(msg.persistent)?;
    loose_marshal_long(msg.expiration, out)?;
    out.write_byte(msg.priority)?;
    let reply_to = msg.reply_to.clone().map(DataStructure::Destination);
    loose_marshal_nested(reply_to.as_ref(), out)?;
    loose_marshal_long(msg.timestamp, out)?;
    loose_marshal_string(msg.message_type.as_deref(), out)?;
    loose_marshal_bytes(content_option(msg), out)?;
    out.write_bool(msg.compressed)?;
    out.write_int(msg.redelivery_counter)
}

fn loose_message_fields_read(kind: MessageKind, input: &mut dyn DataInput) -> Result<Message> {
    let (command_id, response_required) = loose_base_unmarshal(input)?;
    let producer_id = match loose_unmarshal_nested(input)? {
        Some(DataStructure::ProducerId(p)) => Some(p),
        _ => None,
    };
    let destination = match loose_unmarshal_nested(input)? {
        Some(DataStructure::Destination(d)) => Some(d),
        _ => None,
    };
    let transaction_id = match loose_unmarshal_nested(input)? {
        Some(DataStructure::LocalTransactionId(t)) => Some(t),
        _ => None,
    };
    let message_id = match loose_unmarshal_nested(input)? {
        Some(DataStructure::MessageId(m)) => Some(m),
        _ => None,
    };
    let correlation_id = loose_unmarshal_string(input)?;
    let persistent = input.read_bool()?;
    let expiration = loose_unmarshal_long(input)?;
    let priority = input.read_byte()?;
    let reply_to = match loose_unmarshal_nested(input)? {
        Some(DataStructure::Destination(d)) => Some(d),
        _ => None,
    };
    let timestamp = loose_unmarshal_long(input)?;
    let message_type = loose_unmarshal_string(input)?;
    let content = loose_unmarshal_bytes(input)?.unwrap_or_default();
    let compressed = input.read_bool()?;
    let redelivery_counter = input.read_int()?;
    Ok(Message {
        command_id,
        response_required,
        kind,
        message_id,
        producer_id,
        destination,
        transaction_id,
        correlation_id,
        persistent,
        expiration,
        priority,
        reply_to,
        timestamp,
        message_type,
        content,
        compressed,
        redelivery_counter,
    })
}

/// Marshaller for application messages.
///
/// One instance is registered per message kind; both share the same field
/// layout and differ only in the wire type id.
#[derive(Debug)]
pub struct MessageMarshaller {
    kind: MessageKind,
}

impl MessageMarshaller {
    /// Marshaller for bytes messages.
    pub fn bytes() -> Self {
        Self {
            kind: MessageKind::Bytes,
        }
    }

    /// Marshaller for text messages.
    pub fn text() -> Self {
        Self {
            kind: MessageKind::Text,
        }
    }

    fn get<'a>(&self, cmd: &'a Command) -> Result<&'a Message> {
        match cmd {
            Command::Message(m) if m.kind == self.kind => Ok(m),
            other => Err(type_mismatch("Message", other)),
        }
    }
}

impl DataStreamMarshaller for MessageMarshaller {
    fn data_structure_type(&self) -> u8 {
        match self.kind {
            MessageKind::Bytes => types::BYTES_MESSAGE,
            MessageKind::Text => types::TEXT_MESSAGE,
        }
    }

    fn create_command(&self) -> Command {
        Command::Message(Message {
            kind: self.kind,
            ..Default::default()
        })
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        tight_message_fields1(self.get(cmd)?, bs)
    }

    fn tight_marshal2(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
        bs: &mut BooleanStream,
    ) -> Result<()> {
        tight_message_fields2(self.get(cmd)?, out, bs)
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        tight_message_fields_read(self.kind, input, bs).map(Command::Message)
    }

    fn loose_marshal(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
    ) -> Result<()> {
        loose_message_fields(self.get(cmd)?, out)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        loose_message_fields_read(self.kind, input).map(Command::Message)
    }
}

/// Marshaller for [`MessageDispatch`].
#[derive(Debug, Default)]
pub struct MessageDispatchMarshaller;

impl MessageDispatchMarshaller {
    fn get(cmd: &Command) -> Result<&MessageDispatch> {
        match cmd {
            Command::MessageDispatch(c) => Ok(c),
            other => Err(type_mismatch("MessageDispatch", other)),
        }
    }
}

impl DataStreamMarshaller for MessageDispatchMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::MESSAGE_DISPATCH
    }

    fn create_command(&self) -> Command {
        Command::MessageDispatch(MessageDispatch::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs);
        let id = DataStructure::ConsumerId(info.consumer_id.clone());
        size += tight_marshal_nested1(Some(&id), bs)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        size += tight_marshal_nested1(dest.as_ref(), bs)?;
        // The message nests like a data structure: presence bit, tag byte,
        // then its full field set on the same boolean stream.
        bs.write_boolean(info.message.is_some());
        if let Some(msg) = &info.message {
            size += 1 + tight_message_fields1(msg, bs)?;
        }
        size += 4;
        Ok(size)
    }

    fn tight_marshal2(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
        bs: &mut BooleanStream,
    ) -> Result<()> {
        let info = Self::get(cmd)?;
        tight_base2(info.command_id, out, bs)?;
        let id = DataStructure::ConsumerId(info.consumer_id.clone());
        tight_marshal_nested2(Some(&id), out, bs)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        tight_marshal_nested2(dest.as_ref(), out, bs)?;
        if bs.read_boolean()? {
            let msg = info.message.as_ref().ok_or_else(|| {
                OpenWireError::Marshal("presence bit set for absent message".to_string())
            })?;
            out.write_u8(match msg.kind {
                MessageKind::Bytes => types::BYTES_MESSAGE,
                MessageKind::Text => types::TEXT_MESSAGE,
            })?;
            tight_message_fields2(msg, out, bs)?;
        }
        out.write_int(info.redelivery_counter)
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let consumer_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::ConsumerId(c)) => c,
            _ => Default::default(),
        };
        let destination = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let message = if bs.read_boolean()? {
            let kind = kind_for_type(input.read_u8()?)?;
            Some(Box::new(tight_message_fields_read(kind, input, bs)?))
        } else {
            None
        };
        let redelivery_counter = input.read_int()?;
        Ok(Command::MessageDispatch(MessageDispatch {
            command_id,
            response_required,
            consumer_id,
            destination,
            message,
            redelivery_counter,
        }))
    }

    fn loose_marshal(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
    ) -> Result<()> {
        let info = Self::get(cmd)?;
        loose_base(info.command_id, info.response_required, out)?;
        let id = DataStructure::ConsumerId(info.consumer_id.clone());
        loose_marshal_nested(Some(&id), out)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        loose_marshal_nested(dest.as_ref(), out)?;
        out.write_bool(info.message.is_some())?;
        if let Some(msg) = &info.message {
            out.write_u8(match msg.kind {
                MessageKind::Bytes => types::BYTES_MESSAGE,
                MessageKind::Text => types::TEXT_MESSAGE,
            })?;
            loose_message_fields(msg, out)?;
        }
        out.write_int(info.redelivery_counter)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let consumer_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::ConsumerId(c)) => c,
            _ => Default::default(),
        };
        let destination = match loose_unmarshal_nested(input)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let message = if input.read_bool()? {
            let kind = kind_for_type(input.read_u8()?)?;
            Some(Box::new(loose_message_fields_read(kind, input)?))
        } else {
            None
        };
        let redelivery_counter = input.read_int()?;
        Ok(Command::MessageDispatch(MessageDispatch {
            command_id,
            response_required,
            consumer_id,
            destination,
            message,
            redelivery_counter,
        }))
    }
}

/// Marshaller for [`MessageAck`].
#[derive(Debug, Default)]
pub struct MessageAckMarshaller;

impl MessageAckMarshaller {
    fn get(cmd: &Command) -> Result<&MessageAck> {
        match cmd {
            Command::MessageAck(c) => Ok(c),
            other => Err(type_mismatch("MessageAck", other)),
        }
    }

    fn decode_ack(b: i8) -> Result<AckType> {
        AckType::from_byte(b)
            .ok_or_else(|| OpenWireError::Protocol(format!("unknown ack type: {}", b)))
    }
}

impl DataStreamMarshaller for MessageAckMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::MESSAGE_ACK
    }

    fn create_command(&self) -> Command {
        Command::MessageAck(MessageAck::default())
    }

    fn tight_marshal1(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs);
        let dest = info.destination.clone().map(DataStructure::Destination);
        size += tight_marshal_nested1(dest.as_ref(), bs)?;
        let txn = info
            .transaction_id
            .clone()
            .map(DataStructure::LocalTransactionId);
        size += tight_marshal_nested1(txn.as_ref(), bs)?;
        let id = DataStructure::ConsumerId(info.consumer_id.clone());
        size += tight_marshal_nested1(Some(&id), bs)?;
        size += 1;
        let first = info.first_message_id.clone().map(DataStructure::MessageId);
        size += tight_marshal_nested1(first.as_ref(), bs)?;
        let last = info.last_message_id.clone().map(DataStructure::MessageId);
        size += tight_marshal_nested1(last.as_ref(), bs)?;
        size += 4;
        if ctx.version >= 7 {
            size += tight_marshal_broker_error1(
                info.poison_cause.as_ref(),
                ctx.stack_trace_enabled,
                bs,
            )?;
        }
        Ok(size)
    }

    fn tight_marshal2(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
        bs: &mut BooleanStream,
    ) -> Result<()> {
        let info = Self::get(cmd)?;
        tight_base2(info.command_id, out, bs)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        tight_marshal_nested2(dest.as_ref(), out, bs)?;
        let txn = info
            .transaction_id
            .clone()
            .map(DataStructure::LocalTransactionId);
        tight_marshal_nested2(txn.as_ref(), out, bs)?;
        let id = DataStructure::ConsumerId(info.consumer_id.clone());
        tight_marshal_nested2(Some(&id), out, bs)?;
        out.write_byte(info.ack_type.to_byte())?;
        let first = info.first_message_id.clone().map(DataStructure::MessageId);
        tight_marshal_nested2(first.as_ref(), out, bs)?;
        let last = info.last_message_id.clone().map(DataStructure::MessageId);
        tight_marshal_nested2(last.as_ref(), out, bs)?;
        out.write_int(info.message_count)?;
        if ctx.version >= 7 {
            tight_marshal_broker_error2(
                info.poison_cause.as_ref(),
                ctx.stack_trace_enabled,
                out,
                bs,
            )?;
        }
        Ok(())
    }

    fn tight_unmarshal(
        &self,
        ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let destination = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let transaction_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::LocalTransactionId(t)) => Some(t),
            _ => None,
        };
        let consumer_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::ConsumerId(c)) => c,
            _ => Default::default(),
        };
        let ack_type = Self::decode_ack(input.read_byte()?)?;
        let first_message_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::MessageId(m)) => Some(m),
            _ => None,
        };
        let last_message_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::MessageId(m)) => Some(m),
            _ => None,
        };
        let message_count = input.read_int()?;
        let poison_cause = if ctx.version >= 7 {
            tight_unmarshal_broker_error(input, ctx.stack_trace_enabled, bs)?
        } else {
            None
        };
        Ok(Command::MessageAck(MessageAck {
            command_id,
            response_required,
            destination,
            transaction_id,
            consumer_id,
            ack_type,
            first_message_id,
            last_message_id,
            message_count,
            poison_cause,
        }))
    }

    fn loose_marshal(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
    ) -> Result<()> {
        let info = Self::get(cmd)?;
        loose_base(info.command_id, info.response_required, out)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        loose_marshal_nested(dest.as_ref(), out)?;
        let txn = info
            .transaction_id
            .clone()
            .map(DataStructure::LocalTransactionId);
        loose_marshal_nested(txn.as_ref(), out)?;
        let id = DataStructure::ConsumerId(info.consumer_id.clone());
        loose_marshal_nested(Some(&id), out)?;
        out.write_byte(info.ack_type.to_byte())?;
        let first = info.first_message_id.clone().map(DataStructure::MessageId);
        loose_marshal_nested(first.as_ref(), out)?;
        let last = info.last_message_id.clone().map(DataStructure::MessageId);
        loose_marshal_nested(last.as_ref(), out)?;
        out.write_int(info.message_count)?;
        if ctx.version >= 7 {
            loose_marshal_broker_error(info.poison_cause.as_ref(), ctx.stack_trace_enabled, out)?;
        }
        Ok(())
    }

    fn loose_unmarshal(&self, ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let destination = match loose_unmarshal_nested(input)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let transaction_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::LocalTransactionId(t)) => Some(t),
            _ => None,
        };
        let consumer_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::ConsumerId(c)) => c,
            _ => Default::default(),
        };
        let ack_type = Self::decode_ack(input.read_byte()?)?;
        let first_message_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::MessageId(m)) => Some(m),
            _ => None,
        };
        let last_message_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::MessageId(m)) => Some(m),
            _ => None,
        };
        let message_count = input.read_int()?;
        let poison_cause = if ctx.version >= 7 {
            loose_unmarshal_broker_error(input, ctx.stack_trace_enabled)?
        } else {
            None
        };
        Ok(Command::MessageAck(MessageAck {
            command_id,
            response_required,
            destination,
            transaction_id,
            consumer_id,
            ack_type,
            first_message_id,
            last_message_id,
            message_count,
            poison_cause,
        }))
    }
}
