//! Last-seen message acknowledgment window.
//!
//! ```text
//! [varint offset] [3B bitset, little-endian bit order] [1B checksum]   # checksum from 1.21.5
//! ```

use std::fmt;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::{CodecError, Result};
use crate::version::ProtocolVersion;
use crate::wire::{ReadWireExt, WriteWireExt};

/// Number of messages tracked by one window.
pub const WINDOW_SIZE: usize = 20;
/// Bytes the bitset always occupies on the wire.
pub const WINDOW_BYTES: usize = WINDOW_SIZE.div_ceil(8);

const WIRE_MASK: u32 = (1 << (WINDOW_BYTES * 8)) - 1;

/// Which of the last [`WINDOW_SIZE`] messages a client has seen.
///
/// Immutable: shifting or acknowledging returns a new window.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AckWindow {
    offset: i32,
    /// Bit `n` is slot `n`. Keeps every bit the wire bytes carry.
    acknowledged: u32,
    checksum: u8,
}

impl AckWindow {
    /// Bits beyond the wire bytes are dropped.
    pub fn new(offset: i32, acknowledged: u32, checksum: u8) -> Self {
        AckWindow {
            offset,
            acknowledged: acknowledged & WIRE_MASK,
            checksum,
        }
    }

    /// Window with the given slots set, or `None` if a slot is outside the window.
    pub fn from_slots(offset: i32, slots: impl IntoIterator<Item = usize>, checksum: u8) -> Option<Self> {
        slots
            .into_iter()
            .try_fold(AckWindow::new(offset, 0, checksum), |window, slot| window.acknowledge(slot))
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn acknowledged_bits(&self) -> u32 {
        self.acknowledged
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn is_acknowledged(&self, slot: usize) -> bool {
        slot < WINDOW_SIZE && self.acknowledged & (1 << slot) != 0
    }

    pub fn acknowledge(&self, slot: usize) -> Option<Self> {
        if slot >= WINDOW_SIZE {
            return None;
        }
        Some(AckWindow {
            acknowledged: self.acknowledged | (1 << slot),
            ..*self
        })
    }

    pub fn acknowledged_count(&self) -> u32 {
        (self.acknowledged & ((1 << WINDOW_SIZE) - 1)).count_ones()
    }

    /// Moves the cursor by `delta` messages. The bitset is not shifted.
    pub fn shift_by(&self, delta: i32) -> Self {
        AckWindow {
            offset: self.offset.wrapping_add(delta),
            ..*self
        }
    }

    /// Whether windows carry a checksum byte in `version`.
    pub fn has_checksum(version: ProtocolVersion) -> bool {
        version.no_less_than(ProtocolVersion::V1_21_5)
    }

    pub fn decode<R: Read + ?Sized>(reader: &mut R, version: ProtocolVersion) -> Result<Self> {
        let offset = reader.read_var_int()?;
        let bytes = reader.read_raw(WINDOW_BYTES, "acknowledgment window")?;
        let mut word = [0u8; 4];
        word[..WINDOW_BYTES].copy_from_slice(&bytes);

        let checksum = if Self::has_checksum(version) {
            reader
                .read_u8()
                .map_err(|e| CodecError::from_read(e, "acknowledgment checksum"))?
        } else {
            0
        };

        Ok(AckWindow {
            offset,
            acknowledged: u32::from_le_bytes(word),
            checksum,
        })
    }

    pub fn encode<W: Write + ?Sized>(&self, writer: &mut W, version: ProtocolVersion) -> Result<()> {
        writer.write_var_int(self.offset)?;
        writer.write_all(&self.acknowledged.to_le_bytes()[..WINDOW_BYTES])?;
        if Self::has_checksum(version) {
            writer.write_u8(self.checksum)?;
        }
        Ok(())
    }
}

impl fmt::Display for AckWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AckWindow{{offset={}, acknowledged={:0width$b}, checksum={}}}",
            self.offset,
            self.acknowledged & ((1 << WINDOW_SIZE) - 1),
            self.checksum,
            width = WINDOW_SIZE
        )
    }
}
