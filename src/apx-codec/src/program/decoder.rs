//! Cursor over a compiled program's instruction stream (spec §4.A/§4.C).
//!
//! A program slice plus a cursor (`next`), a remembered mark used to
//! rewind when the VM loops over an array of records, and the
//! field-name/is-last-field bookkeeping a record walk needs. Reads are
//! composed from small bounds-checked `read_u8`/`read_u32`-style
//! primitives into the higher-level per-opcode decode methods below.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ApxError, Result};
use crate::program::header::{decode_header, ProgramHeader, SizeVariant};
use crate::program::instruction::{
    decode_data_size_variant, decode_instruction, decode_type_code_variant, DataCtrlKind,
    FlowCtrlKind, Opcode,
};
use crate::program::operation::Operation;

/// Reads instructions out of a compiled program buffer.
///
/// The decoder owns only a cursor into the caller-provided program bytes;
/// it never copies the program. Mirrors the reference decoder's
/// program_begin/next/end/mark pointers as slice offsets instead of raw
/// pointers.
pub struct Decoder<'p> {
    program: &'p [u8],
    next: usize,
    mark: Option<usize>,
}

impl<'p> Decoder<'p> {
    pub fn new(program: &'p [u8]) -> Decoder<'p> {
        Decoder {
            program,
            next: 0,
            mark: None,
        }
    }

    /// Parses the header at the start of the program and advances the
    /// cursor past it.
    pub fn parse_program_header(&mut self) -> Result<ProgramHeader> {
        let (header, rest) = decode_header(self.program)?;
        self.next = self.program.len() - rest.len();
        Ok(header)
    }

    /// Records the current cursor position for a later `recall_position`.
    pub fn save_position(&mut self) {
        self.mark = Some(self.next);
    }

    /// Rewinds the cursor to the last saved position.
    pub fn recall_position(&mut self) -> Result<()> {
        self.next = self
            .mark
            .ok_or_else(|| ApxError::Internal("no saved program position".to_string()))?;
        Ok(())
    }

    pub fn has_saved_position(&self) -> bool {
        self.mark.is_some()
    }

    pub fn is_at_end(&self) -> bool {
        self.next >= self.program.len()
    }

    /// Advances past one `Pack`/`Unpack` sub-tree without producing or
    /// consuming any value. Used when a compiled array turns out to have
    /// zero elements at runtime: the instruction stream for its element
    /// type must still be consumed once so the cursor lands on whatever
    /// instruction follows the array.
    pub fn skip_element(&mut self) -> Result<()> {
        match self
            .parse_next_operation()?
            .ok_or_else(|| ApxError::Internal("program ended while skipping".to_string()))?
        {
            Operation::RangeCheckInt32 { .. }
            | Operation::RangeCheckUint32 { .. }
            | Operation::RangeCheckInt64 { .. }
            | Operation::RangeCheckUint64 { .. } => self.skip_element(),
            Operation::Pack { type_code, .. } | Operation::Unpack { type_code, .. } => {
                if type_code.is_record() {
                    self.skip_record_fields()
                } else {
                    Ok(())
                }
            }
            other => Err(ApxError::Internal(format!(
                "unexpected operation while skipping: {other:?}"
            ))),
        }
    }

    pub(crate) fn skip_record_fields(&mut self) -> Result<()> {
        loop {
            match self
                .parse_next_operation()?
                .ok_or_else(|| ApxError::Internal("program ended while skipping record".to_string()))?
            {
                Operation::RecordSelect { is_last_field, .. } => {
                    self.skip_element()?;
                    if is_last_field {
                        return Ok(());
                    }
                }
                other => {
                    return Err(ApxError::Internal(format!(
                        "expected RECORD_SELECT while skipping, found {other:?}"
                    )))
                }
            }
        }
    }

    fn take(&mut self, len: usize) -> Result<&'p [u8]> {
        let end = self
            .next
            .checked_add(len)
            .ok_or_else(|| ApxError::Internal("program cursor overflow".to_string()))?;
        if end > self.program.len() {
            return Err(ApxError::Parse("program truncated".to_string()));
        }
        let slice = &self.program[self.next..end];
        self.next = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn take_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    fn take_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// Reads an integer in the width named by `variant`, advancing the
    /// cursor. Used to read a compiled array length following its leading
    /// `DATA_SIZE` instruction (spec §4.B).
    fn take_variant(&mut self, variant: SizeVariant) -> Result<u32> {
        match variant {
            SizeVariant::U8 => Ok(self.take_u8()? as u32),
            SizeVariant::U16 => Ok(LittleEndian::read_u16(self.take(2)?) as u32),
            SizeVariant::U32 => self.take_u32(),
        }
    }

    /// Reads a NUL-terminated ASCII field name (spec §4.B/§4.C/§6),
    /// advancing the cursor past the terminator.
    fn take_nul_terminated_name(&mut self) -> Result<String> {
        let start = self.next;
        let nul_offset = self.program[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ApxError::Parse("unterminated field name".to_string()))?;
        let name_bytes = self.take(nul_offset)?;
        let field_name = std::str::from_utf8(name_bytes)
            .map_err(|_| ApxError::InvalidProgram("field name is not valid utf-8".to_string()))?
            .to_string();
        self.take(1)?; // consume the NUL terminator
        Ok(field_name)
    }

    /// Consumes the `DATA_SIZE` instruction + length integer that follows
    /// an array-flagged `Pack`/`Unpack` instruction, returning the
    /// compiled (maximum) length and whether the array is dynamic.
    fn take_array_size(&mut self) -> Result<(u32, bool)> {
        let instruction = self.take_u8()?;
        let (opcode, variant, dynamic) = decode_instruction(instruction)?;
        if opcode != Opcode::DataSize {
            return Err(ApxError::InvalidProgram(
                "expected DATA_SIZE instruction after an array Pack/Unpack".to_string(),
            ));
        }
        let width = SizeVariant::from_code(variant)?;
        let len = self.take_variant(width)?;
        Ok((len, dynamic))
    }

    /// Parses the next operation, or `Ok(None)` at end of program.
    pub fn parse_next_operation(&mut self) -> Result<Option<Operation>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let instruction = self.take_u8()?;
        let (opcode, variant, flag) = decode_instruction(instruction)?;
        let operation = match opcode {
            Opcode::Unpack => {
                let type_code = decode_type_code_variant(variant)?;
                let (array_len, dynamic) = if flag {
                    let (len, dynamic) = self.take_array_size()?;
                    (Some(len), dynamic)
                } else {
                    (None, false)
                };
                Operation::Unpack {
                    type_code,
                    array_len,
                    dynamic,
                }
            }
            Opcode::Pack => {
                let type_code = decode_type_code_variant(variant)?;
                let (array_len, dynamic) = if flag {
                    let (len, dynamic) = self.take_array_size()?;
                    (Some(len), dynamic)
                } else {
                    (None, false)
                };
                Operation::Pack {
                    type_code,
                    array_len,
                    dynamic,
                }
            }
            Opcode::DataSize => {
                // Only appears as a header trailer; parse_program_header
                // consumes it directly, so reaching it here is malformed.
                log::warn!("decoder found a stray DATA_SIZE instruction outside the header");
                return Err(ApxError::InvalidProgram(
                    "unexpected DATA_SIZE instruction outside header".to_string(),
                ));
            }
            Opcode::DataCtrl => match DataCtrlKind::from_variant(variant)? {
                DataCtrlKind::RecordSelect => {
                    let field_name = self.take_nul_terminated_name()?;
                    Operation::RecordSelect {
                        field_name,
                        is_last_field: flag,
                    }
                }
                DataCtrlKind::ArrayNext => Operation::ArrayNext { is_last: flag },
                DataCtrlKind::RangeCheckInt32 => Operation::RangeCheckInt32 {
                    lo: self.take_i32()?,
                    hi: self.take_i32()?,
                },
                DataCtrlKind::RangeCheckUint32 => Operation::RangeCheckUint32 {
                    lo: self.take_u32()?,
                    hi: self.take_u32()?,
                },
                DataCtrlKind::RangeCheckInt64 => Operation::RangeCheckInt64 {
                    lo: self.take_i64()?,
                    hi: self.take_i64()?,
                },
                DataCtrlKind::RangeCheckUint64 => Operation::RangeCheckUint64 {
                    lo: self.take_u64()?,
                    hi: self.take_u64()?,
                },
            },
            Opcode::FlowCtrl => match FlowCtrlKind::from_variant(variant)? {
                FlowCtrlKind::QueuedWriteBegin => {
                    let (element_variant, _) = decode_data_size_variant(self.take_u8()?)?;
                    Operation::QueuedWriteBegin {
                        element_size: element_variant.width() as u32,
                        max_length: self.take_u32()?,
                    }
                }
                FlowCtrlKind::QueuedWriteEnd => Operation::QueuedWriteEnd,
                FlowCtrlKind::QueuedReadBegin => {
                    let (element_variant, _) = decode_data_size_variant(self.take_u8()?)?;
                    Operation::QueuedReadBegin {
                        element_size: element_variant.width() as u32,
                        max_length: self.take_u32()?,
                    }
                }
                FlowCtrlKind::QueuedReadEnd => Operation::QueuedReadEnd,
            },
        };
        Ok(Some(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::header::{encode_header, ProgramType};
    use crate::program::instruction::{encode_instruction, encode_type_code_variant};
    use crate::type_code::TypeCode;

    #[test]
    fn decodes_a_trivial_scalar_program() {
        let mut program = encode_header(ProgramType::Pack, 4, 0, false).unwrap();
        program.push(encode_instruction(
            Opcode::Pack,
            encode_type_code_variant(TypeCode::U32),
            false,
        ));

        let mut decoder = Decoder::new(&program);
        let header = decoder.parse_program_header().unwrap();
        assert_eq!(header.element_size, 4);

        let op = decoder.parse_next_operation().unwrap().unwrap();
        assert_eq!(
            op,
            Operation::Pack {
                type_code: TypeCode::U32,
                array_len: None,
                dynamic: false
            }
        );
        assert!(decoder.parse_next_operation().unwrap().is_none());
    }

    #[test]
    fn save_and_recall_position_rewinds_cursor() {
        let mut program = encode_header(ProgramType::Unpack, 1, 0, false).unwrap();
        program.push(encode_instruction(
            Opcode::Unpack,
            encode_type_code_variant(TypeCode::U8),
            false,
        ));
        program.push(encode_instruction(
            Opcode::Unpack,
            encode_type_code_variant(TypeCode::U8),
            false,
        ));

        let mut decoder = Decoder::new(&program);
        decoder.parse_program_header().unwrap();
        decoder.save_position();
        let first = decoder.parse_next_operation().unwrap();
        decoder.recall_position().unwrap();
        let second = decoder.parse_next_operation().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn recall_without_save_is_an_error() {
        let mut decoder = Decoder::new(&[]);
        assert!(decoder.recall_position().is_err());
    }
}
