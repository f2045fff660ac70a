//! Marshallers for lifecycle and topology commands.

use crate::command::ids::DataStructure;
use crate::command::info::*;
use crate::command::{types, Command};
use crate::error::{OpenWireError, Result};
use crate::marshal::primitives::*;
use crate::marshal::{
    loose_base, loose_base_unmarshal, tight_base1, tight_base2, tight_base_unmarshal,
    type_mismatch, BooleanStream, DataInput, DataOutput, DataStreamMarshaller, MarshalContext,
};

/// Marshaller for the [`WireFormatInfo`] handshake command.
///
/// Unlike every other command it carries no BaseCommand header; the frame
/// opens with the magic bytes so a peer can reject a non-OpenWire socket
/// before trusting anything else in the stream.
#[derive(Debug, Default)]
pub struct WireFormatInfoMarshaller;

impl WireFormatInfoMarshaller {
    fn get(cmd: &Command) -> Result<&WireFormatInfo> {
        match cmd {
            Command::WireFormatInfo(c) => Ok(c),
            other => Err(type_mismatch("WireFormatInfo", other)),
        }
    }

    fn read_magic(input: &mut dyn DataInput) -> Result<()> {
        let magic = input.read_bytes(8)?;
        if magic != WIREFORMAT_MAGIC {
            return Err(OpenWireError::Protocol(format!(
                "bad wire format magic: {:02x?}",
                magic
            )));
        }
        Ok(())
    }
}

impl DataStreamMarshaller for WireFormatInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::WIREFORMAT_INFO
    }

    fn create_command(&self) -> Command {
        Command::WireFormatInfo(WireFormatInfo::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = 8 + 4;
        bs.write_boolean(info.stack_trace_enabled);
        bs.write_boolean(info.tcp_no_delay_enabled);
        bs.write_boolean(info.cache_enabled);
        bs.write_boolean(info.tight_encoding_enabled);
        bs.write_boolean(info.size_prefix_disabled);
        size += 4;
        size += tight_marshal_long1(info.max_inactivity_duration, bs);
        size += tight_marshal_long1(info.max_inactivity_duration_initial_delay, bs);
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
        out.write_bytes(&WIREFORMAT_MAGIC)?;
        out.write_int(info.version)?;
        for _ in 0..5 {
            let _ = bs.read_boolean()?;
        }
        out.write_int(info.cache_size)?;
        tight_marshal_long2(info.max_inactivity_duration, out, bs)?;
        tight_marshal_long2(info.max_inactivity_duration_initial_delay, out, bs)
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        Self::read_magic(input)?;
        let version = input.read_int()?;
        let stack_trace_enabled = bs.read_boolean()?;
        let tcp_no_delay_enabled = bs.read_boolean()?;
        let cache_enabled = bs.read_boolean()?;
        let tight_encoding_enabled = bs.read_boolean()?;
        let size_prefix_disabled = bs.read_boolean()?;
        let cache_size = input.read_int()?;
        let max_inactivity_duration = tight_unmarshal_long(input, bs)?;
        let max_inactivity_duration_initial_delay = tight_unmarshal_long(input, bs)?;
        Ok(Command::WireFormatInfo(WireFormatInfo {
            command_id: 0,
            response_required: false,
            version,
            stack_trace_enabled,
            tcp_no_delay_enabled,
            cache_enabled,
            tight_encoding_enabled,
            size_prefix_disabled,
            cache_size,
            max_inactivity_duration,
            max_inactivity_duration_initial_delay,
        }))
    }

    fn loose_marshal(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
    ) -> Result<()> {
        let info = Self::get(cmd)?;
        out.write_bytes(&WIREFORMAT_MAGIC)?;
        out.write_int(info.version)?;
        out.write_bool(info.stack_trace_enabled)?;
        out.write_bool(info.tcp_no_delay_enabled)?;
        out.write_bool(info.cache_enabled)?;
        out.write_bool(info.tight_encoding_enabled)?;
        out.write_bool(info.size_prefix_disabled)?;
        out.write_int(info.cache_size)?;
        loose_marshal_long(info.max_inactivity_duration, out)?;
        loose_marshal_long(info.max_inactivity_duration_initial_delay, out)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        Self::read_magic(input)?;
        let version = input.read_int()?;
        let stack_trace_enabled = input.read_bool()?;
        let tcp_no_delay_enabled = input.read_bool()?;
        let cache_enabled = input.read_bool()?;
        let tight_encoding_enabled = input.read_bool()?;
        let size_prefix_disabled = input.read_bool()?;
        let cache_size = input.read_int()?;
        let max_inactivity_duration = loose_unmarshal_long(input)?;
        let max_inactivity_duration_initial_delay = loose_unmarshal_long(input)?;
        Ok(Command::WireFormatInfo(WireFormatInfo {
            command_id: 0,
            response_required: false,
            version,
            stack_trace_enabled,
            tcp_no_delay_enabled,
            cache_enabled,
            tight_encoding_enabled,
            size_prefix_disabled,
            cache_size,
            max_inactivity_duration,
            max_inactivity_duration_initial_delay,
        }))
    }
}

/// Marshaller for [`ConnectionInfo`].
#[derive(Debug, Default)]
pub struct ConnectionInfoMarshaller;

impl ConnectionInfoMarshaller {
    fn get(cmd: &Command) -> Result<&ConnectionInfo> {
        match cmd {
            Command::ConnectionInfo(c) => Ok(c),
            other => Err(type_mismatch("ConnectionInfo", other)),
        }
    }
}

impl DataStreamMarshaller for ConnectionInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::CONNECTION_INFO
    }

    fn create_command(&self) -> Command {
        Command::ConnectionInfo(ConnectionInfo::default())
    }

    fn tight_marshal1(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs);
        let conn = DataStructure::ConnectionId(info.connection_id.clone());
        size += tight_marshal_nested1(Some(&conn), bs)?;
        size += tight_marshal_string1(info.client_id.as_deref(), bs)?;
        size += tight_marshal_string1(info.password.as_deref(), bs)?;
        size += tight_marshal_string1(info.user_name.as_deref(), bs)?;
        bs.write_boolean(info.broker_master_connector);
        bs.write_boolean(info.manageable);
        if ctx.version >= 2 {
            bs.write_boolean(info.client_master);
        }
        if ctx.version >= 6 {
            bs.write_boolean(info.fault_tolerant);
            bs.write_boolean(info.failover_reconnect);
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
        let conn = DataStructure::ConnectionId(info.connection_id.clone());
        tight_marshal_nested2(Some(&conn), out, bs)?;
        tight_marshal_string2(info.client_id.as_deref(), out, bs)?;
        tight_marshal_string2(info.password.as_deref(), out, bs)?;
        tight_marshal_string2(info.user_name.as_deref(), out, bs)?;
        let _ = bs.read_boolean()?;
        let _ = bs.read_boolean()?;
        if ctx.version >= 2 {
            let _ = bs.read_boolean()?;
        }
        if ctx.version >= 6 {
            let _ = bs.read_boolean()?;
            let _ = bs.read_boolean()?;
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
        let connection_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::ConnectionId(c)) => c,
            _ => Default::default(),
        };
        let client_id = tight_unmarshal_string(input, bs)?;
        let password = tight_unmarshal_string(input, bs)?;
        let user_name = tight_unmarshal_string(input, bs)?;
        let broker_master_connector = bs.read_boolean()?;
        let manageable = bs.read_boolean()?;
        let client_master = if ctx.version >= 2 {
            bs.read_boolean()?
        } else {
            false
        };
        let (fault_tolerant, failover_reconnect) = if ctx.version >= 6 {
            (bs.read_boolean()?, bs.read_boolean()?)
        } else {
            (false, false)
        };
        Ok(Command::ConnectionInfo(ConnectionInfo {
            command_id,
            response_required,
            connection_id,
            client_id,
            password,
            user_name,
            broker_master_connector,
            manageable,
            client_master,
            fault_tolerant,
            failover_reconnect,
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
        let conn = DataStructure::ConnectionId(info.connection_id.clone());
        loose_marshal_nested(Some(&conn), out)?;
        loose_marshal_string(info.client_id.as_deref(), out)?;
        loose_marshal_string(info.password.as_deref(), out)?;
        loose_marshal_string(info.user_name.as_deref(), out)?;
        out.write_bool(info.broker_master_connector)?;
        out.write_bool(info.manageable)?;
        if ctx.version >= 2 {
            out.write_bool(info.client_master)?;
        }
        if ctx.version >= 6 {
            out.write_bool(info.fault_tolerant)?;
            out.write_bool(info.failover_reconnect)?;
        }
        Ok(())
    }

    fn loose_unmarshal(&self, ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let connection_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::ConnectionId(c)) => c,
            _ => Default::default(),
        };
        let client_id = loose_unmarshal_string(input)?;
        let password = loose_unmarshal_string(input)?;
        let user_name = loose_unmarshal_string(input)?;
        let broker_master_connector = input.read_bool()?;
        let manageable = input.read_bool()?;
        let client_master = if ctx.version >= 2 {
            input.read_bool()?
        } else {
            false
        };
        let (fault_tolerant, failover_reconnect) = if ctx.version >= 6 {
            (input.read_bool()?, input.read_bool()?)
        } else {
            (false, false)
        };
        Ok(Command::ConnectionInfo(ConnectionInfo {
            command_id,
            response_required,
            connection_id,
            client_id,
            password,
            user_name,
            broker_master_connector,
            manageable,
            client_master,
            fault_tolerant,
            failover_reconnect,
        }))
    }
}

/// Marshaller for [`SessionInfo`].
#[derive(Debug, Default)]
pub struct SessionInfoMarshaller;

impl SessionInfoMarshaller {
    fn get(cmd: &Command) -> Result<&SessionInfo> {
        match cmd {
            Command::SessionInfo(c) => Ok(c),
            other => Err(type_mismatch("SessionInfo", other)),
        }
    }
}

impl DataStreamMarshaller for SessionInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::SESSION_INFO
    }

    fn create_command(&self) -> Command {
        Command::SessionInfo(SessionInfo::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs);
        let session = DataStructure::SessionId(info.session_id.clone());
        size += tight_marshal_nested1(Some(&session), bs)?;
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
        let session = DataStructure::SessionId(info.session_id.clone());
        tight_marshal_nested2(Some(&session), out, bs)
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let session_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::SessionId(s)) => s,
            _ => Default::default(),
        };
        Ok(Command::SessionInfo(SessionInfo {
            command_id,
            response_required,
            session_id,
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
        let session = DataStructure::SessionId(info.session_id.clone());
        loose_marshal_nested(Some(&session), out)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let session_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::SessionId(s)) => s,
            _ => Default::default(),
        };
        Ok(Command::SessionInfo(SessionInfo {
            command_id,
            response_required,
            session_id,
        }))
    }
}

/// Marshaller for [`ConsumerInfo`].
#[derive(Debug, Default)]
pub struct ConsumerInfoMarshaller;

impl ConsumerInfoMarshaller {
    fn get(cmd: &Command) -> Result<&ConsumerInfo> {
        match cmd {
            Command::ConsumerInfo(c) => Ok(c),
            other => Err(type_mismatch("ConsumerInfo", other)),
        }
    }
}

impl DataStreamMarshaller for ConsumerInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::CONSUMER_INFO
    }

    fn create_command(&self) -> Command {
        Command::ConsumerInfo(ConsumerInfo::default())
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
        bs.write_boolean(info.browser);
        let dest = info.destination.clone().map(DataStructure::Destination);
        size += tight_marshal_nested1(dest.as_ref(), bs)?;
        size += 4;
        bs.write_boolean(info.dispatch_async);
        size += tight_marshal_string1(info.selector.as_deref(), bs)?;
        size += tight_marshal_string1(info.subscription_name.as_deref(), bs)?;
        bs.write_boolean(info.no_local);
        bs.write_boolean(info.exclusive);
        bs.write_boolean(info.retroactive);
        size += 1;
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
        let _ = bs.read_boolean()?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        tight_marshal_nested2(dest.as_ref(), out, bs)?;
        out.write_int(info.prefetch_size)?;
        let _ = bs.read_boolean()?;
        tight_marshal_string2(info.selector.as_deref(), out, bs)?;
        tight_marshal_string2(info.subscription_name.as_deref(), out, bs)?;
        let _ = bs.read_boolean()?;
        let _ = bs.read_boolean()?;
        let _ = bs.read_boolean()?;
        out.write_byte(info.priority)
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
        let browser = bs.read_boolean()?;
        let destination = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let prefetch_size = input.read_int()?;
        let dispatch_async = bs.read_boolean()?;
        let selector = tight_unmarshal_string(input, bs)?;
        let subscription_name = tight_unmarshal_string(input, bs)?;
        let no_local = bs.read_boolean()?;
        let exclusive = bs.read_boolean()?;
        let retroactive = bs.read_boolean()?;
        let priority = input.read_byte()?;
        Ok(Command::ConsumerInfo(ConsumerInfo {
            command_id,
            response_required,
            consumer_id,
            browser,
            destination,
            prefetch_size,
            dispatch_async,
            selector,
            subscription_name,
            no_local,
            exclusive,
            retroactive,
            priority,
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
        out.write_bool(info.browser)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        loose_marshal_nested(dest.as_ref(), out)?;
        out.write_int(info.prefetch_size)?;
        out.write_bool(info.dispatch_async)?;
        loose_marshal_string(info.selector.as_deref(), out)?;
        loose_marshal_string(info.subscription_name.as_deref(), out)?;
        out.write_bool(info.no_local)?;
        out.write_bool(info.exclusive)?;
        out.write_bool(info.retroactive)?;
        out.write_byte(info.priority)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let consumer_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::ConsumerId(c)) => c,
            _ => Default::default(),
        };
        let browser = input.read_bool()?;
        let destination = match loose_unmarshal_nested(input)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let prefetch_size = input.read_int()?;
        let dispatch_async = input.read_bool()?;
        let selector = loose_unmarshal_string(input)?;
        let subscription_name = loose_unmarshal_string(input)?;
        let no_local = input.read_bool()?;
        let exclusive = input.read_bool()?;
        let retroactive = input.read_bool()?;
        let priority = input.read_byte()?;
        Ok(Command::ConsumerInfo(ConsumerInfo {
            command_id,
            response_required,
            consumer_id,
            browser,
            destination,
            prefetch_size,
            dispatch_async,
            selector,
            subscription_name,
            no_local,
            exclusive,
            retroactive,
            priority,
        }))
    }
}

/// Marshaller for [`ProducerInfo`].
#[derive(Debug, Default)]
pub struct ProducerInfoMarshaller;

impl ProducerInfoMarshaller {
    fn get(cmd: &Command) -> Result<&ProducerInfo> {
        match cmd {
            Command::ProducerInfo(c) => Ok(c),
            other => Err(type_mismatch("ProducerInfo", other)),
        }
    }
}

impl DataStreamMarshaller for ProducerInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::PRODUCER_INFO
    }

    fn create_command(&self) -> Command {
        Command::ProducerInfo(ProducerInfo::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs);
        let id = DataStructure::ProducerId(info.producer_id.clone());
        size += tight_marshal_nested1(Some(&id), bs)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        size += tight_marshal_nested1(dest.as_ref(), bs)?;
        bs.write_boolean(info.dispatch_async);
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
        let id = DataStructure::ProducerId(info.producer_id.clone());
        tight_marshal_nested2(Some(&id), out, bs)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        tight_marshal_nested2(dest.as_ref(), out, bs)?;
        let _ = bs.read_boolean()?;
        Ok(())
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let producer_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::ProducerId(p)) => p,
            _ => Default::default(),
        };
        let destination = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let dispatch_async = bs.read_boolean()?;
        Ok(Command::ProducerInfo(ProducerInfo {
            command_id,
            response_required,
            producer_id,
            destination,
            dispatch_async,
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
        let id = DataStructure::ProducerId(info.producer_id.clone());
        loose_marshal_nested(Some(&id), out)?;
        let dest = info.destination.clone().map(DataStructure::Destination);
        loose_marshal_nested(dest.as_ref(), out)?;
        out.write_bool(info.dispatch_async)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let producer_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::ProducerId(p)) => p,
            _ => Default::default(),
        };
        let destination = match loose_unmarshal_nested(input)? {
            Some(DataStructure::Destination(d)) => Some(d),
            _ => None,
        };
        let dispatch_async = input.read_bool()?;
        Ok(Command::ProducerInfo(ProducerInfo {
            command_id,
            response_required,
            producer_id,
            destination,
            dispatch_async,
        }))
    }
}

/// Marshaller for [`TransactionInfo`].
#[derive(Debug, Default)]
pub struct TransactionInfoMarshaller;

impl TransactionInfoMarshaller {
    fn get(cmd: &Command) -> Result<&TransactionInfo> {
        match cmd {
            Command::TransactionInfo(c) => Ok(c),
            other => Err(type_mismatch("TransactionInfo", other)),
        }
    }

    fn decode_op(b: i8) -> Result<TransactionOp> {
        TransactionOp::from_byte(b)
            .ok_or_else(|| OpenWireError::Protocol(format!("unknown transaction op: {}", b)))
    }
}

impl DataStreamMarshaller for TransactionInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::TRANSACTION_INFO
    }

    fn create_command(&self) -> Command {
        Command::TransactionInfo(TransactionInfo::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs);
        let conn = DataStructure::ConnectionId(info.connection_id.clone());
        size += tight_marshal_nested1(Some(&conn), bs)?;
        let txn = info
            .transaction_id
            .clone()
            .map(DataStructure::LocalTransactionId);
        size += tight_marshal_nested1(txn.as_ref(), bs)?;
        size += 1;
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
        let conn = DataStructure::ConnectionId(info.connection_id.clone());
        tight_marshal_nested2(Some(&conn), out, bs)?;
        let txn = info
            .transaction_id
            .clone()
            .map(DataStructure::LocalTransactionId);
        tight_marshal_nested2(txn.as_ref(), out, bs)?;
        out.write_byte(info.op.to_byte())
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let connection_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::ConnectionId(c)) => c,
            _ => Default::default(),
        };
        let transaction_id = match tight_unmarshal_nested(input, bs)? {
            Some(DataStructure::LocalTransactionId(t)) => Some(t),
            _ => None,
        };
        let op = Self::decode_op(input.read_byte()?)?;
        Ok(Command::TransactionInfo(TransactionInfo {
            command_id,
            response_required,
            connection_id,
            transaction_id,
            op,
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
        let conn = DataStructure::ConnectionId(info.connection_id.clone());
        loose_marshal_nested(Some(&conn), out)?;
        let txn = info
            .transaction_id
            .clone()
            .map(DataStructure::LocalTransactionId);
        loose_marshal_nested(txn.as_ref(), out)?;
        out.write_byte(info.op.to_byte())
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let connection_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::ConnectionId(c)) => c,
            _ => Default::default(),
        };
        let transaction_id = match loose_unmarshal_nested(input)? {
            Some(DataStructure::LocalTransactionId(t)) => Some(t),
            _ => None,
        };
        let op = Self::decode_op(input.read_byte()?)?;
        Ok(Command::TransactionInfo(TransactionInfo {
            command_id,
            response_required,
            connection_id,
            transaction_id,
            op,
        }))
    }
}

/// Marshaller for [`KeepAliveInfo`]; only the base header crosses the wire.
#[derive(Debug, Default)]
pub struct KeepAliveInfoMarshaller;

impl DataStreamMarshaller for KeepAliveInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::KEEP_ALIVE_INFO
    }

    fn create_command(&self) -> Command {
        Command::KeepAliveInfo(KeepAliveInfo::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        match cmd {
            Command::KeepAliveInfo(c) => Ok(tight_base1(c.response_required, bs)),
            other => Err(type_mismatch("KeepAliveInfo", other)),
        }
    }

    fn tight_marshal2(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
        bs: &mut BooleanStream,
    ) -> Result<()> {
        match cmd {
            Command::KeepAliveInfo(c) => tight_base2(c.command_id, out, bs),
            other => Err(type_mismatch("KeepAliveInfo", other)),
        }
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        Ok(Command::KeepAliveInfo(KeepAliveInfo {
            command_id,
            response_required,
        }))
    }

    fn loose_marshal(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
    ) -> Result<()> {
        match cmd {
            Command::KeepAliveInfo(c) => loose_base(c.command_id, c.response_required, out),
            other => Err(type_mismatch("KeepAliveInfo", other)),
        }
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        Ok(Command::KeepAliveInfo(KeepAliveInfo {
            command_id,
            response_required,
        }))
    }
}

/// Marshaller for [`ShutdownInfo`]; only the base header crosses the wire.
#[derive(Debug, Default)]
pub struct ShutdownInfoMarshaller;

impl DataStreamMarshaller for ShutdownInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::SHUTDOWN_INFO
    }

    fn create_command(&self) -> Command {
        Command::ShutdownInfo(ShutdownInfo::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        match cmd {
            Command::ShutdownInfo(c) => Ok(tight_base1(c.response_required, bs)),
            other => Err(type_mismatch("ShutdownInfo", other)),
        }
    }

    fn tight_marshal2(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
        bs: &mut BooleanStream,
    ) -> Result<()> {
        match cmd {
            Command::ShutdownInfo(c) => tight_base2(c.command_id, out, bs),
            other => Err(type_mismatch("ShutdownInfo", other)),
        }
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        Ok(Command::ShutdownInfo(ShutdownInfo {
            command_id,
            response_required,
        }))
    }

    fn loose_marshal(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        out: &mut dyn DataOutput,
    ) -> Result<()> {
        match cmd {
            Command::ShutdownInfo(c) => loose_base(c.command_id, c.response_required, out),
            other => Err(type_mismatch("ShutdownInfo", other)),
        }
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        Ok(Command::ShutdownInfo(ShutdownInfo {
            command_id,
            response_required,
        }))
    }
}

/// Marshaller for [`RemoveInfo`].
#[derive(Debug, Default)]
pub struct RemoveInfoMarshaller;

impl RemoveInfoMarshaller {
    fn get(cmd: &Command) -> Result<&RemoveInfo> {
        match cmd {
            Command::RemoveInfo(c) => Ok(c),
            other => Err(type_mismatch("RemoveInfo", other)),
        }
    }
}

impl DataStreamMarshaller for RemoveInfoMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::REMOVE_INFO
    }

    fn create_command(&self) -> Command {
        Command::RemoveInfo(RemoveInfo::new(DataStructure::ConnectionId(
            Default::default(),
        )))
    }

    fn tight_marshal1(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs);
        size += tight_marshal_nested1(Some(&info.object_id), bs)?;
        if ctx.version >= 5 {
            size += tight_marshal_long1(info.last_delivered_sequence_id, bs);
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
        tight_marshal_nested2(Some(&info.object_id), out, bs)?;
        if ctx.version >= 5 {
            tight_marshal_long2(info.last_delivered_sequence_id, out, bs)?;
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
        let object_id = tight_unmarshal_nested(input, bs)?
            .unwrap_or(DataStructure::ConnectionId(Default::default()));
        let last_delivered_sequence_id = if ctx.version >= 5 {
            tight_unmarshal_long(input, bs)?
        } else {
            0
        };
        Ok(Command::RemoveInfo(RemoveInfo {
            command_id,
            response_required,
            object_id,
            last_delivered_sequence_id,
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
        loose_marshal_nested(Some(&info.object_id), out)?;
        if ctx.version >= 5 {
            loose_marshal_long(info.last_delivered_sequence_id, out)?;
        }
        Ok(())
    }

    fn loose_unmarshal(&self, ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let object_id = loose_unmarshal_nested(input)?
            .unwrap_or(DataStructure::ConnectionId(Default::default()));
        let last_delivered_sequence_id = if ctx.version >= 5 {
            loose_unmarshal_long(input)?
        } else {
            0
        };
        Ok(Command::RemoveInfo(RemoveInfo {
            command_id,
            response_required,
            object_id,
            last_delivered_sequence_id,
        }))
    }
}
