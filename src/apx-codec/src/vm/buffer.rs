//! Fixed-capacity write/read cursors over caller-owned byte slices.
//!
//! The VM never allocates its working buffer, it only walks a slice the
//! caller supplies, so every bounds violation is reported rather than
//! grown into.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ApxError, Result};
use crate::program::header::SizeVariant;

/// A caller-owned slice the VM packs values into.
pub struct WriteBuffer<'b> {
    bytes: &'b mut [u8],
    next: usize,
}

impl<'b> WriteBuffer<'b> {
    pub fn new(bytes: &'b mut [u8]) -> WriteBuffer<'b> {
        WriteBuffer { bytes, next: 0 }
    }

    pub fn bytes_written(&self) -> usize {
        self.next
    }

    fn reserve(&mut self, len: usize) -> Result<&mut [u8]> {
        let end = self.next.checked_add(len).ok_or(ApxError::BufferBoundary {
            needed: len,
            available: self.bytes.len() - self.next,
        })?;
        if end > self.bytes.len() {
            return Err(ApxError::BufferBoundary {
                needed: len,
                available: self.bytes.len() - self.next,
            });
        }
        let slice = &mut self.bytes[self.next..end];
        self.next = end;
        Ok(slice)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.reserve(1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        LittleEndian::write_u16(self.reserve(2)?, value);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        LittleEndian::write_u32(self.reserve(4)?, value);
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        LittleEndian::write_u64(self.reserve(8)?, value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_u64(value as u64)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Writes `len` bytes, padding with zero if `bytes` is shorter. Used
    /// for fixed-width char arrays where the value may be shorter than
    /// its declared slot.
    pub fn write_padded(&mut self, bytes: &[u8], len: usize) -> Result<()> {
        let slot = self.reserve(len)?;
        let copy_len = bytes.len().min(len);
        slot[..copy_len].copy_from_slice(&bytes[..copy_len]);
        for b in &mut slot[copy_len..] {
            *b = 0;
        }
        Ok(())
    }

    /// Writes `value` in the width named by `variant`. Used for
    /// self-describing array/queue length prefixes.
    pub fn write_uint_variant(&mut self, value: u32, variant: SizeVariant) -> Result<()> {
        match variant {
            SizeVariant::U8 => self.write_u8(value as u8),
            SizeVariant::U16 => self.write_u16(value as u16),
            SizeVariant::U32 => self.write_u32(value),
        }
    }
}

/// A caller-owned slice the VM unpacks values from.
pub struct ReadBuffer<'b> {
    bytes: &'b [u8],
    next: usize,
}

impl<'b> ReadBuffer<'b> {
    pub fn new(bytes: &'b [u8]) -> ReadBuffer<'b> {
        ReadBuffer { bytes, next: 0 }
    }

    pub fn bytes_read(&self) -> usize {
        self.next
    }

    fn take(&mut self, len: usize) -> Result<&'b [u8]> {
        let end = self.next.checked_add(len).ok_or(ApxError::BufferBoundary {
            needed: len,
            available: self.bytes.len() - self.next,
        })?;
        if end > self.bytes.len() {
            return Err(ApxError::BufferBoundary {
                needed: len,
                available: self.bytes.len() - self.next,
            });
        }
        let slice = &self.bytes[self.next..end];
        self.next = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'b [u8]> {
        self.take(len)
    }

    pub fn read_uint_variant(&mut self, variant: SizeVariant) -> Result<u32> {
        match variant {
            SizeVariant::U8 => Ok(self.read_u8()? as u32),
            SizeVariant::U16 => Ok(self.read_u16()? as u32),
            SizeVariant::U32 => self.read_u32(),
        }
    }
}
