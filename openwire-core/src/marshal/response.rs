//! Marshallers for the response command family.

use crate::command::response::{DataResponse, ExceptionResponse, IntegerResponse, Response};
use crate::command::{types, Command};
use crate::error::Result;
use crate::marshal::primitives::*;
use crate::marshal::{
    loose_base, loose_base_unmarshal, tight_base1, tight_base2, tight_base_unmarshal,
    type_mismatch, BooleanStream, DataInput, DataOutput, DataStreamMarshaller, MarshalContext,
};

/// Marshaller for plain [`Response`] acknowledgments.
#[derive(Debug, Default)]
pub struct ResponseMarshaller;

impl ResponseMarshaller {
    fn get(cmd: &Command) -> Result<&Response> {
        match cmd {
            Command::Response(c) => Ok(c),
            other => Err(type_mismatch("Response", other)),
        }
    }
}

impl DataStreamMarshaller for ResponseMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::RESPONSE
    }

    fn create_command(&self) -> Command {
        Command::Response(Response::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        Ok(tight_base1(info.response_required, bs) + 4)
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
        out.write_int(info.correlation_id)
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let correlation_id = input.read_int()?;
        Ok(Command::Response(Response {
            command_id,
            response_required,
            correlation_id,
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
        out.write_int(info.correlation_id)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let correlation_id = input.read_int()?;
        Ok(Command::Response(Response {
            command_id,
            response_required,
            correlation_id,
        }))
    }
}

/// Marshaller for [`ExceptionResponse`].
#[derive(Debug, Default)]
pub struct ExceptionResponseMarshaller;

impl ExceptionResponseMarshaller {
    fn get(cmd: &Command) -> Result<&ExceptionResponse> {
        match cmd {
            Command::ExceptionResponse(c) => Ok(c),
            other => Err(type_mismatch("ExceptionResponse", other)),
        }
    }
}

impl DataStreamMarshaller for ExceptionResponseMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::EXCEPTION_RESPONSE
    }

    fn create_command(&self) -> Command {
        Command::ExceptionResponse(ExceptionResponse::default())
    }

    fn tight_marshal1(
        &self,
        ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs) + 4;
        size +=
            tight_marshal_broker_error1(info.exception.as_ref(), ctx.stack_trace_enabled, bs)?;
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
        out.write_int(info.correlation_id)?;
        tight_marshal_broker_error2(info.exception.as_ref(), ctx.stack_trace_enabled, out, bs)
    }

    fn tight_unmarshal(
        &self,
        ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let correlation_id = input.read_int()?;
        let exception = tight_unmarshal_broker_error(input, ctx.stack_trace_enabled, bs)?;
        Ok(Command::ExceptionResponse(ExceptionResponse {
            command_id,
            response_required,
            correlation_id,
            exception,
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
        out.write_int(info.correlation_id)?;
        loose_marshal_broker_error(info.exception.as_ref(), ctx.stack_trace_enabled, out)
    }

    fn loose_unmarshal(&self, ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let correlation_id = input.read_int()?;
        let exception = loose_unmarshal_broker_error(input, ctx.stack_trace_enabled)?;
        Ok(Command::ExceptionResponse(ExceptionResponse {
            command_id,
            response_required,
            correlation_id,
            exception,
        }))
    }
}

/// Marshaller for [`DataResponse`].
///
/// The payload is an arbitrary nested data structure; its one-byte type tag
/// is what lets the receiving side re-dispatch polymorphically.
#[derive(Debug, Default)]
pub struct DataResponseMarshaller;

impl DataResponseMarshaller {
    fn get(cmd: &Command) -> Result<&DataResponse> {
        match cmd {
            Command::DataResponse(c) => Ok(c),
            other => Err(type_mismatch("DataResponse", other)),
        }
    }
}

impl DataStreamMarshaller for DataResponseMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::DATA_RESPONSE
    }

    fn create_command(&self) -> Command {
        Command::DataResponse(DataResponse {
            command_id: 0,
            response_required: false,
            correlation_id: 0,
            data: None,
        })
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        let mut size = tight_base1(info.response_required, bs) + 4;
        size += tight_marshal_nested1(info.data.as_ref(), bs)?;
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
        out.write_int(info.correlation_id)?;
        tight_marshal_nested2(info.data.as_ref(), out, bs)
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let correlation_id = input.read_int()?;
        let data = tight_unmarshal_nested(input, bs)?;
        Ok(Command::DataResponse(DataResponse {
            command_id,
            response_required,
            correlation_id,
            data,
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
        out.write_int(info.correlation_id)?;
        loose_marshal_nested(info.data.as_ref(), out)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let correlation_id = input.read_int()?;
        let data = loose_unmarshal_nested(input)?;
        Ok(Command::DataResponse(DataResponse {
            command_id,
            response_required,
            correlation_id,
            data,
        }))
    }
}

/// Marshaller for [`IntegerResponse`].
#[derive(Debug, Default)]
pub struct IntegerResponseMarshaller;

impl IntegerResponseMarshaller {
    fn get(cmd: &Command) -> Result<&IntegerResponse> {
        match cmd {
            Command::IntegerResponse(c) => Ok(c),
            other => Err(type_mismatch("IntegerResponse", other)),
        }
    }
}

impl DataStreamMarshaller for IntegerResponseMarshaller {
    fn data_structure_type(&self) -> u8 {
        types::INTEGER_RESPONSE
    }

    fn create_command(&self) -> Command {
        Command::IntegerResponse(IntegerResponse::default())
    }

    fn tight_marshal1(
        &self,
        _ctx: &MarshalContext,
        cmd: &Command,
        bs: &mut BooleanStream,
    ) -> Result<usize> {
        let info = Self::get(cmd)?;
        Ok(tight_base1(info.response_required, bs) + 4 + 4)
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
        out.write_int(info.correlation_id)?;
        out.write_int(info.result)
    }

    fn tight_unmarshal(
        &self,
        _ctx: &MarshalContext,
        input: &mut dyn DataInput,
        bs: &mut BooleanStream,
    ) -> Result<Command> {
        let (command_id, response_required) = tight_base_unmarshal(input, bs)?;
        let correlation_id = input.read_int()?;
        let result = input.read_int()?;
        Ok(Command::IntegerResponse(IntegerResponse {
            command_id,
            response_required,
            correlation_id,
            result,
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
        out.write_int(info.correlation_id)?;
        out.write_int(info.result)
    }

    fn loose_unmarshal(&self, _ctx: &MarshalContext, input: &mut dyn DataInput) -> Result<Command> {
        let (command_id, response_required) = loose_base_unmarshal(input)?;
        let correlation_id = input.read_int()?;
        let result = input.read_int()?;
        Ok(Command::IntegerResponse(IntegerResponse {
            command_id,
            response_required,
            correlation_id,
            result,
        }))
    }
}
