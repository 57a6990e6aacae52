//! Program header encode/decode (spec §4.A).
//!
//! Bit layout resolution note (recorded in full in `DESIGN.md`): spec.md's
//! ASCII-art `PPTT TVVV` names only two distinct `T` flags (dynamic,
//! queued) but draws three `T` positions; we treat the third as a
//! reserved zero bit, giving a clean `PP T T _ VVV` split that still
//! reserves all eight bits of the header byte:
//!
//! ```text
//! bit:    7 6 5 4 3 2 1 0
//! field:  P P T T R V V V
//! ```
//!
//! - `PP` (bits 7-6): program type, `01` = pack, `10` = unpack.
//! - `T` (bit 5): has-dynamic-data flag.
//! - `T` (bit 4): is-queued flag.
//! - `R` (bit 3): reserved, always `0`.
//! - `VVV` (bits 2-0): data-size variant, `0` = u8, `1` = u16, `2` = u32.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ApxError, Result};

const PROG_TYPE_PACK: u8 = 0b0100_0000;
const PROG_TYPE_UNPACK: u8 = 0b1000_0000;
const PROG_TYPE_MASK: u8 = 0b1100_0000;
const FLAG_DYNAMIC_DATA: u8 = 0b0010_0000;
const FLAG_QUEUED_DATA: u8 = 0b0001_0000;
const DATA_VARIANT_MASK: u8 = 0b0000_0111;

/// Which direction a program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramType {
    Pack,
    Unpack,
}

/// A little-endian integer width: 1, 2 or 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeVariant {
    U8,
    U16,
    U32,
}

impl SizeVariant {
    pub const fn width(self) -> u8 {
        match self {
            SizeVariant::U8 => 1,
            SizeVariant::U16 => 2,
            SizeVariant::U32 => 4,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            SizeVariant::U8 => 0,
            SizeVariant::U16 => 1,
            SizeVariant::U32 => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<SizeVariant> {
        match code {
            0 => Ok(SizeVariant::U8),
            1 => Ok(SizeVariant::U16),
            2 => Ok(SizeVariant::U32),
            other => Err(ApxError::InvalidHeader(format!(
                "unknown data-size variant {other}"
            ))),
        }
    }

    /// The smallest variant able to hold `value`.
    pub fn smallest_for(value: u32) -> SizeVariant {
        if value <= u8::MAX as u32 {
            SizeVariant::U8
        } else if value <= u16::MAX as u32 {
            SizeVariant::U16
        } else {
            SizeVariant::U32
        }
    }

    pub fn read(self, bytes: &[u8]) -> Result<u32> {
        let width = self.width() as usize;
        if bytes.len() < width {
            return Err(ApxError::Parse("truncated size integer".to_string()));
        }
        Ok(match self {
            SizeVariant::U8 => bytes[0] as u32,
            SizeVariant::U16 => LittleEndian::read_u16(bytes) as u32,
            SizeVariant::U32 => LittleEndian::read_u32(bytes),
        })
    }

    pub fn write(self, value: u32, out: &mut Vec<u8>) {
        match self {
            SizeVariant::U8 => out.push(value as u8),
            SizeVariant::U16 => {
                let mut buf = [0u8; 2];
                LittleEndian::write_u16(&mut buf, value as u16);
                out.extend_from_slice(&buf);
            }
            SizeVariant::U32 => {
                let mut buf = [0u8; 4];
                LittleEndian::write_u32(&mut buf, value);
                out.extend_from_slice(&buf);
            }
        }
    }
}

/// The decoded program header (spec §3/§4.A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramHeader {
    pub program_type: ProgramType,
    pub data_size: u32,
    pub element_size: u32,
    pub queue_length: u32,
    pub has_dynamic_data: bool,
}

impl ProgramHeader {
    pub fn is_queued(&self) -> bool {
        self.queue_length > 0
    }
}

/// Encodes a program header. `queue_size == 0` means "not queued".
///
/// Returns `(bytes, total_header_len)`. Fails with `LengthError` if the
/// total encoded data size would exceed `u32::MAX`.
pub fn encode_header(
    program_type: ProgramType,
    element_size: u32,
    queue_size: u32,
    is_dynamic: bool,
) -> Result<Vec<u8>> {
    let is_queued = queue_size > 0;

    let data_size: u64 = if is_queued {
        let queue_variant = SizeVariant::smallest_for(queue_size);
        let queue_length_width = queue_variant.width() as u64;
        queue_length_width + (element_size as u64) * (queue_size as u64)
    } else {
        element_size as u64
    };

    if data_size > u32::MAX as u64 {
        return Err(ApxError::LengthError {
            size: data_size,
            max: u32::MAX as u64,
        });
    }
    let data_size = data_size as u32;

    let data_size_variant = SizeVariant::smallest_for(data_size);

    let mut program_byte = match program_type {
        ProgramType::Pack => PROG_TYPE_PACK,
        ProgramType::Unpack => PROG_TYPE_UNPACK,
    };
    program_byte |= data_size_variant.code() & DATA_VARIANT_MASK;
    if is_dynamic {
        program_byte |= FLAG_DYNAMIC_DATA;
    }
    if is_queued {
        program_byte |= FLAG_QUEUED_DATA;
    }

    let mut out = Vec::with_capacity(8);
    out.push(program_byte);
    data_size_variant.write(data_size, &mut out);

    if is_queued {
        let element_variant = SizeVariant::smallest_for(element_size);
        let queue_variant = SizeVariant::smallest_for(queue_size);
        let variant = crate::program::instruction::encode_data_size_variant(
            element_variant,
            queue_variant,
        );
        let instruction =
            crate::program::instruction::encode_instruction(
                crate::program::instruction::Opcode::DataSize,
                variant,
                false,
            );
        out.push(instruction);
        element_variant.write(element_size, &mut out);
    }

    log::trace!(
        "encoded program header: type={:?} data_size={} element_size={} queue_size={} dynamic={}",
        program_type,
        data_size,
        element_size,
        queue_size,
        is_dynamic
    );

    Ok(out)
}

/// Decodes a program header from the start of `bytes`. Returns the header
/// and the remaining (unconsumed) slice.
pub fn decode_header(bytes: &[u8]) -> Result<(ProgramHeader, &[u8])> {
    if bytes.is_empty() {
        return Err(ApxError::InvalidArgument("empty program".to_string()));
    }
    let program_byte = bytes[0];
    let program_type = if program_byte & PROG_TYPE_MASK == PROG_TYPE_PACK {
        ProgramType::Pack
    } else {
        ProgramType::Unpack
    };
    let has_dynamic_data = program_byte & FLAG_DYNAMIC_DATA != 0;
    let is_queued = program_byte & FLAG_QUEUED_DATA != 0;
    let data_variant = SizeVariant::from_code(program_byte & DATA_VARIANT_MASK)?;

    let mut rest = &bytes[1..];
    let width = data_variant.width() as usize;
    if rest.len() < width {
        return Err(ApxError::Parse("truncated program header".to_string()));
    }
    let data_size = data_variant.read(rest)?;
    rest = &rest[width..];

    let mut header = ProgramHeader {
        program_type,
        data_size,
        element_size: data_size,
        queue_length: 0,
        has_dynamic_data,
    };

    if is_queued {
        if rest.is_empty() {
            return Err(ApxError::Parse("truncated queued header trailer".to_string()));
        }
        let (opcode, variant, _flag) =
            crate::program::instruction::decode_instruction(rest[0])?;
        if opcode != crate::program::instruction::Opcode::DataSize {
            return Err(ApxError::InvalidHeader(
                "expected DATA_SIZE trailer instruction".to_string(),
            ));
        }
        let (element_variant, queue_variant) =
            crate::program::instruction::decode_data_size_variant(variant)?;
        rest = &rest[1..];

        let element_width = element_variant.width() as usize;
        if rest.len() < element_width {
            return Err(ApxError::Parse("truncated element-size integer".to_string()));
        }
        let element_size = element_variant.read(rest)?;
        rest = &rest[element_width..];

        let queue_length_width = queue_variant.width() as u32;
        if element_size == 0 {
            return Err(ApxError::InvalidHeader(
                "element size cannot be zero for a queued port".to_string(),
            ));
        }
        let payload = data_size
            .checked_sub(queue_length_width)
            .ok_or_else(|| ApxError::InvalidHeader("data size smaller than queue length field".to_string()))?;
        if payload % element_size != 0 {
            return Err(ApxError::InvalidHeader(
                "queued payload is not a whole number of elements".to_string(),
            ));
        }
        header.element_size = element_size;
        header.queue_length = payload / element_size;
    }

    log::trace!("decoded program header: {header:?}");
    Ok((header, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_u8_pack_header() {
        let bytes = encode_header(ProgramType::Pack, 1, 0, false).unwrap();
        assert_eq!(bytes, vec![PROG_TYPE_PACK, 1]);
        let (header, rest) = decode_header(&bytes).unwrap();
        assert_eq!(header.program_type, ProgramType::Pack);
        assert_eq!(header.data_size, 1);
        assert_eq!(header.queue_length, 0);
        assert!(rest.is_empty());
    }

    #[test]
    fn header_round_trips_for_queued_port() {
        let bytes = encode_header(ProgramType::Pack, 1, 10, false).unwrap();
        let (header, _) = decode_header(&bytes).unwrap();
        assert_eq!(header.element_size, 1);
        assert_eq!(header.queue_length, 10);
    }

    #[test]
    fn header_round_trips_across_widths() {
        for element_size in [1u32, 2, 255, 256, 65535, 70000] {
            for queue_size in [0u32, 1, 255, 300, 70000] {
                for dynamic in [false, true] {
                    if dynamic && queue_size > 0 {
                        continue; // spec §3 invariant: mutually exclusive
                    }
                    let bytes =
                        encode_header(ProgramType::Unpack, element_size, queue_size, dynamic)
                            .unwrap();
                    let (header, _) = decode_header(&bytes).unwrap();
                    assert_eq!(header.has_dynamic_data, dynamic);
                    if queue_size > 0 {
                        assert_eq!(header.queue_length, queue_size);
                        assert_eq!(header.element_size, element_size);
                    } else {
                        assert_eq!(header.data_size, element_size);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_element_size_in_queued_header_is_invalid_header_error() {
        // Construct a header directly: data_size holds only the queue
        // length field width (1 byte for u8 queue length) but declares an
        // element size of zero via the trailer, which decode must reject.
        let mut bytes = vec![PROG_TYPE_PACK | FLAG_QUEUED_DATA, 1u8];
        let instr = crate::program::instruction::encode_instruction(
            crate::program::instruction::Opcode::DataSize,
            crate::program::instruction::encode_data_size_variant(
                SizeVariant::U8,
                SizeVariant::U8,
            ),
            false,
        );
        bytes.push(instr);
        bytes.push(0u8); // element_size = 0
        let result = decode_header(&bytes);
        assert!(matches!(result, Err(ApxError::InvalidHeader(_))));
    }
}
