//! Byte-level primitives shared by every codec in the crate.
//!
//! These are extension traits over [`std::io::Read`] and [`std::io::Write`],
//! so a `Cursor<&[u8]>` or `&[u8]` works as an incoming buffer and a
//! `Vec<u8>` as an outgoing one.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::{CodecError, Result};

/// A 32-bit VarInt never takes more than five bytes.
pub const MAX_VAR_INT_LEN: usize = 5;

pub trait ReadWireExt: Read {
    /// Reads a little-endian base-128 VarInt.
    fn read_var_int(&mut self) -> Result<i32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VAR_INT_LEN {
            let byte = self
                .read_u8()
                .map_err(|e| CodecError::from_read(e, "varint"))?;
            value |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(CodecError::malformed("varint longer than 5 bytes"))
    }

    /// Reads exactly `len` raw bytes.
    fn read_raw(&mut self, len: usize, context: &'static str) -> Result<Vec<u8>> {
        // Grows with the data actually present instead of trusting `len`.
        let mut out = Vec::new();
        Read::take(&mut *self, len as u64)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::from_read(e, context))?;
        if out.len() < len {
            return Err(CodecError::TruncatedBuffer { context });
        }
        Ok(out)
    }

    /// Reads VarInt-length-prefixed UTF-8 text with no size cap.
    fn read_string(&mut self) -> Result<String> {
        self.read_string_capped(None)
    }

    /// Reads VarInt-length-prefixed UTF-8 text, failing when the declared
    /// byte length exceeds `cap`.
    fn read_string_capped(&mut self, cap: Option<usize>) -> Result<String> {
        let len = self.read_var_int()?;
        if len < 0 {
            return Err(CodecError::malformed(format!("negative text length {}", len)));
        }
        let len = len as usize;
        if let Some(cap) = cap {
            if len > cap {
                return Err(CodecError::malformed(format!(
                    "text of {} bytes exceeds maximum of {}",
                    len, cap
                )));
            }
        }
        let bytes = self.read_raw(len, "text")?;
        String::from_utf8(bytes).map_err(|e| CodecError::malformed(format!("invalid utf-8 text: {}", e)))
    }
}

impl<R: Read + ?Sized> ReadWireExt for R {}

pub trait WriteWireExt: Write {
    fn write_var_int(&mut self, value: i32) -> Result<()> {
        let mut value = value as u32;
        loop {
            if value & !0x7F == 0 {
                self.write_u8(value as u8)?;
                return Ok(());
            }
            self.write_u8((value & 0x7F) as u8 | 0x80)?;
            value >>= 7;
        }
    }

    fn write_string(&mut self, text: &str) -> Result<()> {
        let len = i32::try_from(text.len())
            .map_err(|_| CodecError::malformed(format!("text of {} bytes is too long", text.len())))?;
        self.write_var_int(len)?;
        self.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteWireExt for W {}

/// Number of bytes `value` occupies as a VarInt.
pub fn var_int_len(value: i32) -> usize {
    let bits = 32 - (value as u32).leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}
