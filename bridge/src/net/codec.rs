//! Byte-level codec for the host wire protocol
//!
//! `PacketWriter` appends protocol primitives to a growable buffer and
//! `PacketReader` walks the same layout back. All multi-byte values are
//! big-endian, as the host protocol requires.

use bytes::{BufMut, Bytes, BytesMut};

/// Metadata terminator byte
pub const METADATA_END: u8 = 0xFF;

/// Maximum encoded size of a varint (32-bit value, 7 bits per byte)
pub const MAX_VAR_INT_LEN: usize = 5;

/// Errors that can occur while reading protocol primitives
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Unexpected end of frame: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("VarInt longer than 5 bytes")]
    VarIntTooLong,
    #[error("String is not valid UTF-8")]
    InvalidUtf8,
    #[error("{0} unread trailing bytes")]
    TrailingBytes(usize),
}

/// Quantize degrees into the 256-step angle byte used by spawn and rotation packets.
///
/// `round(degrees * 256 / 360) mod 256`. Out-of-domain input (NaN, infinities)
/// still yields a byte; NaN saturates to 0.
pub fn angle_to_byte(degrees: f32) -> u8 {
    let steps = (degrees * 256.0 / 360.0).round() as i32;
    steps.rem_euclid(256) as u8
}

/// Inverse of [`angle_to_byte`], in `[0, 360)`
pub fn byte_to_angle(byte: u8) -> f32 {
    byte as f32 * 360.0 / 256.0
}

/// Number of bytes `value` occupies as a varint
pub fn var_int_len(value: i32) -> usize {
    let mut value = value as u32;
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Append-only writer for one logical packet
///
/// Not meant to be shared: every build call owns its writer.
#[derive(Debug)]
pub struct PacketWriter {
    buffer: BytesMut,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Clear the buffer so the writer can start a new packet
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Write a varint: 7 bits per byte, continuation bit set on all but the last byte.
    ///
    /// The value is treated as unsigned 32 bits, so negative numbers take 5 bytes.
    pub fn write_var_int(&mut self, value: i32) -> &mut Self {
        let mut value = value as u32;
        loop {
            if value & !0x7F == 0 {
                self.buffer.put_u8(value as u8);
                return self;
            }
            self.buffer.put_u8((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
    }

    /// Write a 64-bit varint (same scheme as [`PacketWriter::write_var_int`])
    pub fn write_var_long(&mut self, value: i64) -> &mut Self {
        let mut value = value as u64;
        loop {
            if value & !0x7F == 0 {
                self.buffer.put_u8(value as u8);
                return self;
            }
            self.buffer.put_u8((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
    }

    /// Write a 128-bit identifier as two big-endian 64-bit halves
    pub fn write_uuid(&mut self, value: u128) -> &mut Self {
        self.buffer.put_u64((value >> 64) as u64);
        self.buffer.put_u64(value as u64);
        self
    }

    pub fn write_byte(&mut self, value: u8) -> &mut Self {
        self.buffer.put_u8(value);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buffer.put_u8(value as u8);
        self
    }

    pub fn write_short(&mut self, value: i16) -> &mut Self {
        self.buffer.put_i16(value);
        self
    }

    pub fn write_unsigned_short(&mut self, value: u16) -> &mut Self {
        self.buffer.put_u16(value);
        self
    }

    pub fn write_int(&mut self, value: i32) -> &mut Self {
        self.buffer.put_i32(value);
        self
    }

    pub fn write_float(&mut self, value: f32) -> &mut Self {
        self.buffer.put_f32(value);
        self
    }

    pub fn write_double(&mut self, value: f64) -> &mut Self {
        self.buffer.put_f64(value);
        self
    }

    /// Write a varint length prefix followed by the UTF-8 bytes
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_var_int(value.len() as i32);
        self.buffer.put_slice(value.as_bytes());
        self
    }

    /// Write raw bytes without a prefix
    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buffer.put_slice(value);
        self
    }

    /// Write a rotation in degrees as a quantized angle byte
    pub fn write_angle_byte(&mut self, degrees: f32) -> &mut Self {
        self.buffer.put_u8(angle_to_byte(degrees));
        self
    }

    /// Write a metadata entry header: index byte then serializer type id.
    ///
    /// The caller writes the type-specific payload right after.
    pub fn write_metadata_header(&mut self, index: u8, type_id: i32) -> &mut Self {
        self.write_byte(index);
        self.write_var_int(type_id)
    }

    pub fn write_metadata_end(&mut self) -> &mut Self {
        self.write_byte(METADATA_END)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Take the written bytes, leaving the writer empty and reusable
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Consume the writer and return the written bytes
    pub fn finish(self) -> Bytes {
        self.buffer.freeze()
    }
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over an encoded packet body
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read n bytes
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.data.len() - self.position;
        if n > remaining {
            return Err(DecodeError::UnexpectedEof {
                needed: n,
                remaining,
            });
        }
        let slice = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_var_int(&mut self) -> Result<i32, DecodeError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VAR_INT_LEN {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(DecodeError::VarIntTooLong)
    }

    pub fn read_uuid(&mut self) -> Result<u128, DecodeError> {
        let high = u64::from_be_bytes(self.read_array()?);
        let low = u64::from_be_bytes(self.read_array()?);
        Ok(((high as u128) << 64) | low as u128)
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_short(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_int(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_float(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    pub fn read_string(&mut self) -> Result<&'a str, DecodeError> {
        let len = self.read_var_int()? as u32 as usize;
        let bytes = self.read(len)?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Read an angle byte back into degrees
    pub fn read_angle(&mut self) -> Result<f32, DecodeError> {
        Ok(byte_to_angle(self.read_byte()?))
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Fail if anything is left unread
    pub fn finish(&self) -> Result<(), DecodeError> {
        match self.data.len() - self.position {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}
