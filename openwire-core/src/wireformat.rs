//! Top-level wire format: frames byte streams into commands and back.
//!
//! Frame layout is `[u32 big-endian size][u8 type id][body]`, with the size
//! prefix omitted when negotiated away. Tight-encoded bodies carry the
//! boolean presence stream between the type id and the field bytes; loose
//! bodies are just the fields. A type id of zero is the null/keepalive frame.

use bytes::{Buf, BufMut, BytesMut};

use crate::command::info::{KeepAliveInfo, WireFormatInfo};
use crate::command::{types, Command};
use crate::error::{OpenWireError, Result};
use crate::marshal::{
    BooleanStream, BufferInput, BufferOutput, DataInput, DataOutput, MarshalContext,
    MarshallerRegistry,
};

/// Lowest common denominator spoken before negotiation completes.
pub const DEFAULT_VERSION: i32 = 1;
/// Highest protocol version this implementation understands.
pub const MAX_SUPPORTED_VERSION: i32 = 9;

/// Preferred wire format settings, offered to the peer during the handshake.
#[derive(Debug, Clone)]
pub struct WireFormatOptions {
    /// Highest version to offer.
    pub version: i32,
    pub stack_trace_enabled: bool,
    pub tcp_no_delay_enabled: bool,
    pub cache_enabled: bool,
    pub tight_encoding_enabled: bool,
    pub size_prefix_disabled: bool,
    pub cache_size: i32,
    /// Negotiated inactivity window in milliseconds; 0 disables keepalives.
    pub max_inactivity_duration: i64,
    pub max_inactivity_duration_initial_delay: i64,
}

impl Default for WireFormatOptions {
    fn default() -> Self {
        Self {
            version: MAX_SUPPORTED_VERSION,
            stack_trace_enabled: true,
            tcp_no_delay_enabled: true,
            // Cached-object marshalling is not implemented, so never offer it.
            cache_enabled: false,
            tight_encoding_enabled: true,
            size_prefix_disabled: false,
            cache_size: 1024,
            max_inactivity_duration: 30_000,
            max_inactivity_duration_initial_delay: 10_000,
        }
    }
}

/// Framing (de)serializer with the negotiated per-connection options.
///
/// Starts at the lowest common denominator (version 1, loose encoding) and
/// moves up when [`OpenWireFormat::renegotiate`] applies the peer's
/// `WireFormatInfo` against our preferred settings.
#[derive(Debug)]
pub struct OpenWireFormat {
    registry: MarshallerRegistry,
    preferred: WireFormatOptions,
    version: i32,
    stack_trace_enabled: bool,
    tight_encoding_enabled: bool,
    size_prefix_disabled: bool,
    cache_enabled: bool,
    max_inactivity_duration: i64,
}

impl OpenWireFormat {
    /// Creates a wire format with the given preferred options and the
    /// standard marshaller registry.
    pub fn new(preferred: WireFormatOptions) -> Self {
        Self::with_registry(preferred, MarshallerRegistry::standard())
    }

    /// Creates a wire format with an explicit registry.
    pub fn with_registry(preferred: WireFormatOptions, registry: MarshallerRegistry) -> Self {
        Self {
            registry,
            preferred,
            version: DEFAULT_VERSION,
            stack_trace_enabled: false,
            tight_encoding_enabled: false,
            size_prefix_disabled: false,
            cache_enabled: false,
            max_inactivity_duration: 0,
        }
    }

    /// Returns the currently negotiated protocol version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Returns `true` once tight encoding has been negotiated.
    pub fn tight_encoding_enabled(&self) -> bool {
        self.tight_encoding_enabled
    }

    /// Returns `true` once cached-object marshalling has been negotiated.
    /// Always `false` with the default preferred options.
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Returns the negotiated inactivity window in milliseconds.
    pub fn max_inactivity_duration(&self) -> i64 {
        self.max_inactivity_duration
    }

    /// Builds the `WireFormatInfo` advertising our preferred options.
    pub fn preferred_info(&self) -> WireFormatInfo {
        WireFormatInfo {
            command_id: 0,
            response_required: false,
            version: self.preferred.version,
            stack_trace_enabled: self.preferred.stack_trace_enabled,
            tcp_no_delay_enabled: self.preferred.tcp_no_delay_enabled,
            cache_enabled: self.preferred.cache_enabled,
            tight_encoding_enabled: self.preferred.tight_encoding_enabled,
            size_prefix_disabled: self.preferred.size_prefix_disabled,
            cache_size: self.preferred.cache_size,
            max_inactivity_duration: self.preferred.max_inactivity_duration,
            max_inactivity_duration_initial_delay: self
                .preferred
                .max_inactivity_duration_initial_delay,
        }
    }

    /// Applies the peer's handshake info: version becomes the pairwise
    /// minimum, feature flags the logical AND, numeric limits the minimum.
    pub fn renegotiate(&mut self, info: &WireFormatInfo) -> Result<()> {
        let version = self.preferred.version.min(info.version);
        if version < 1 {
            return Err(OpenWireError::Protocol(format!(
                "cannot negotiate wire format version {}",
                info.version
            )));
        }
        self.version = version;
        self.stack_trace_enabled =
            self.preferred.stack_trace_enabled && info.stack_trace_enabled;
        self.tight_encoding_enabled =
            self.preferred.tight_encoding_enabled && info.tight_encoding_enabled;
        self.size_prefix_disabled =
            self.preferred.size_prefix_disabled && info.size_prefix_disabled;
        self.cache_enabled = self.preferred.cache_enabled && info.cache_enabled;
        self.max_inactivity_duration = self
            .preferred
            .max_inactivity_duration
            .min(info.max_inactivity_duration);
        tracing::debug!(
            version = self.version,
            tight = self.tight_encoding_enabled,
            stack_traces = self.stack_trace_enabled,
            max_inactivity_ms = self.max_inactivity_duration,
            "negotiated wire format"
        );
        Ok(())
    }

    fn context(&self) -> MarshalContext {
        MarshalContext {
            version: self.version,
            stack_trace_enabled: self.stack_trace_enabled,
        }
    }

    /// Marshals one command into `dst` as a complete frame.
    pub fn marshal(&self, cmd: &Command, dst: &mut BytesMut) -> Result<()> {
        let ctx = self.context();
        let data_type = cmd.data_structure_type();
        let marshaller = self.registry.get(data_type)?;

        if self.tight_encoding_enabled {
            let mut bs = BooleanStream::new();
            let body_size = marshaller.tight_marshal1(&ctx, cmd, &mut bs)?;
            let frame_size = 1 + bs.marshalled_size() + body_size;

            let mut out = BufferOutput::with_capacity(frame_size);
            out.write_u8(data_type)?;
            bs.marshal(&mut out)?;
            marshaller.tight_marshal2(&ctx, cmd, &mut out, &mut bs)?;

            if !self.size_prefix_disabled {
                dst.put_u32(frame_size as u32);
            }
            dst.extend_from_slice(out.as_bytes());
        } else {
            let mut out = BufferOutput::new();
            out.write_u8(data_type)?;
            marshaller.loose_marshal(&ctx, cmd, &mut out)?;

            if !self.size_prefix_disabled {
                dst.put_u32(out.len() as u32);
            }
            dst.extend_from_slice(out.as_bytes());
        }
        Ok(())
    }

    /// Attempts to decode one command from `src`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// frame; the caller reads more bytes and retries.
    pub fn unmarshal(&self, src: &mut BytesMut) -> Result<Option<Command>> {
        if self.size_prefix_disabled {
            return self.unmarshal_unframed(src);
        }

        if src.len() < 4 {
            return Ok(None);
        }
        let frame_size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if src.len() < 4 + frame_size {
            return Ok(None);
        }
        src.advance(4);
        let body = src.split_to(frame_size);
        self.decode_body(&body).map(Some)
    }

    /// Decode path for size-prefix-disabled streams: parse speculatively and
    /// wait for more bytes when the body is still incomplete.
    fn unmarshal_unframed(&self, src: &mut BytesMut) -> Result<Option<Command>> {
        if src.is_empty() {
            return Ok(None);
        }
        let mut input = BufferInput::new(&src[..]);
        match self.decode_from(&mut input) {
            Ok(cmd) => {
                let consumed = input.position() as usize;
                src.advance(consumed);
                Ok(Some(cmd))
            }
            // Incomplete data shows up as a bounds failure mid-parse.
            Err(OpenWireError::Marshal(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decodes a complete frame body (after the size prefix, if any).
    ///
    /// Trailing bytes a newer peer may have appended after the fields we
    /// know are ignored; that is what keeps an old reader compatible with a
    /// new writer.
    fn decode_body(&self, body: &[u8]) -> Result<Command> {
        let mut input = BufferInput::new(body);
        self.decode_from(&mut input)
    }

    fn decode_from(&self, input: &mut BufferInput<'_>) -> Result<Command> {
        let data_type = input.read_u8()?;
        if data_type == types::NULL_TYPE {
            return Ok(Command::KeepAliveInfo(KeepAliveInfo::default()));
        }
        let marshaller = self.registry.get(data_type)?;
        let ctx = self.context();
        if self.tight_encoding_enabled {
            let mut bs = BooleanStream::new();
            bs.unmarshal(input)?;
            marshaller.tight_unmarshal(&ctx, input, &mut bs)
        } else {
            marshaller.loose_unmarshal(&ctx, input)
        }
    }
}

impl Default for OpenWireFormat {
    fn default() -> Self {
        Self::new(WireFormatOptions::default())
    }
}

/// Codec adapter for tokio's framed I/O.
///
/// The format lives behind a shared handle so the transport can renegotiate
/// options mid-stream while reader and writer halves keep using it.
#[derive(Debug, Clone)]
pub struct OpenWireCodec {
    format: std::sync::Arc<std::sync::Mutex<OpenWireFormat>>,
}

impl OpenWireCodec {
    /// Creates a codec around the given wire format.
    pub fn new(format: OpenWireFormat) -> Self {
        Self {
            format: std::sync::Arc::new(std::sync::Mutex::new(format)),
        }
    }

    /// Runs a closure against the shared wire format.
    pub fn with_format<R>(&self, f: impl FnOnce(&mut OpenWireFormat) -> R) -> R {
        let mut guard = self.format.lock().expect("wire format lock poisoned");
        f(&mut guard)
    }
}

impl tokio_util::codec::Encoder<Command> for OpenWireCodec {
    type Error = OpenWireError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        self.with_format(|format| format.marshal(&item, dst))
    }
}

impl tokio_util::codec::Decoder for OpenWireCodec {
    type Item = Command;
    type Error = OpenWireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Command>> {
        self.with_format(|format| format.unmarshal(src))
    }
}
