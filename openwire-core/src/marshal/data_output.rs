//! Data output trait and buffer implementation for OpenWire marshalling.

use crate::error::{OpenWireError, Result};
use bytes::{BufMut, BytesMut};

/// Trait for writing primitive values in OpenWire's binary format.
///
/// All multi-byte values are written in big-endian byte order.
pub trait DataOutput {
    /// Writes a single signed byte.
    fn write_byte(&mut self, v: i8) -> Result<()>;

    /// Writes a single unsigned byte.
    fn write_u8(&mut self, v: u8) -> Result<()>;

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes a 16-bit signed integer in big-endian order.
    fn write_short(&mut self, v: i16) -> Result<()>;

    /// Writes a 16-bit unsigned integer in big-endian order.
    fn write_u16(&mut self, v: u16) -> Result<()>;

    /// Writes a 32-bit signed integer in big-endian order.
    fn write_int(&mut self, v: i32) -> Result<()>;

    /// Writes a 32-bit unsigned integer in big-endian order.
    fn write_u32(&mut self, v: u32) -> Result<()>;

    /// Writes a 64-bit signed integer in big-endian order.
    fn write_long(&mut self, v: i64) -> Result<()>;

    /// Writes raw bytes without a length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a string as a u16 byte-length prefix followed by UTF-8 bytes.
    fn write_utf(&mut self, v: &str) -> Result<()>;
}

/// A buffer-based implementation of `DataOutput`.
#[derive(Debug)]
pub struct BufferOutput {
    buffer: BytesMut,
}

impl BufferOutput {
    /// Creates a new `BufferOutput` with default capacity.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Creates a new `BufferOutput` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Consumes the output and returns the underlying buffer.
    pub fn into_inner(self) -> BytesMut {
        self.buffer
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for BufferOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DataOutput for BufferOutput {
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.buffer.put_i8(v);
        Ok(())
    }

    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.buffer.put_u8(v);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.buffer.put_u8(u8::from(v));
        Ok(())
    }

    fn write_short(&mut self, v: i16) -> Result<()> {
        self.buffer.put_i16(v);
        Ok(())
    }

    fn write_u16(&mut self, v: u16) -> Result<()> {
        self.buffer.put_u16(v);
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        self.buffer.put_i32(v);
        Ok(())
    }

    fn write_u32(&mut self, v: u32) -> Result<()> {
        self.buffer.put_u32(v);
        Ok(())
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        self.buffer.put_i64(v);
        Ok(())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.buffer.put_slice(v);
        Ok(())
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        let bytes = v.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(OpenWireError::Marshal(format!(
                "string too long to encode: {} bytes",
                bytes.len()
            )));
        }
        self.write_u16(bytes.len() as u16)?;
        self.write_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_is_empty() {
        let output = BufferOutput::new();
        assert!(output.is_empty());
        assert_eq!(output.len(), 0);
    }

    #[test]
    fn test_write_byte() {
        let mut output = BufferOutput::new();
        output.write_byte(-1).unwrap();
        assert_eq!(output.as_bytes(), &[0xFF]);
    }

    #[test]
    fn test_write_bool() {
        let mut output = BufferOutput::new();
        output.write_bool(true).unwrap();
        output.write_bool(false).unwrap();
        assert_eq!(output.as_bytes(), &[1, 0]);
    }

    #[test]
    fn test_write_short_big_endian() {
        let mut output = BufferOutput::new();
        output.write_short(0x0102).unwrap();
        assert_eq!(output.as_bytes(), &[0x01, 0x02]);
    }

    #[test]
    fn test_write_int_big_endian() {
        let mut output = BufferOutput::new();
        output.write_int(0x01020304).unwrap();
        assert_eq!(output.as_bytes(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_write_long_big_endian() {
        let mut output = BufferOutput::new();
        output.write_long(0x0102030405060708).unwrap();
        assert_eq!(
            output.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn test_write_utf() {
        let mut output = BufferOutput::new();
        output.write_utf("abc").unwrap();
        assert_eq!(output.as_bytes(), &[0x00, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn test_write_utf_empty() {
        let mut output = BufferOutput::new();
        output.write_utf("").unwrap();
        assert_eq!(output.as_bytes(), &[0x00, 0x00]);
    }

    #[test]
    fn test_write_utf_too_long_fails() {
        let mut output = BufferOutput::new();
        let long = "x".repeat(u16::MAX as usize + 1);
        assert!(matches!(
            output.write_utf(&long),
            Err(OpenWireError::Marshal(_))
        ));
    }

    #[test]
    fn test_clear() {
        let mut output = BufferOutput::new();
        output.write_int(42).unwrap();
        assert!(!output.is_empty());
        output.clear();
        assert!(output.is_empty());
    }
}
