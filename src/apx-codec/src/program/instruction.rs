//! Instruction byte encode/decode (spec §4.A "instruction word").
//!
//! Resolved bit layout (see `DESIGN.md` "Open Question Resolutions" and the
//! note atop `header.rs`): spec.md's `FVVV OOOO` sketch gives the variant
//! field only 3 bits, too narrow for the 15-member `TypeCode` enumeration a
//! `Pack`/`Unpack` instruction's variant must name. We widen variant to 4
//! bits and narrow opcode to 3 bits, which is exactly enough for the five
//! opcode kinds this format needs:
//!
//! ```text
//! bit:    7 6 5 4 3 2 1 0
//! field:  F V V V V O O O
//! ```

use crate::error::{ApxError, Result};
use crate::program::header::SizeVariant;
use crate::type_code::TypeCode;

const OPCODE_MASK: u8 = 0b0000_0111;
const VARIANT_SHIFT: u8 = 3;
const VARIANT_MASK: u8 = 0b0000_1111;
const FLAG_BIT: u8 = 0b1000_0000;

/// The five instruction kinds a program may contain (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Unpack,
    Pack,
    DataSize,
    DataCtrl,
    FlowCtrl,
}

impl Opcode {
    const fn code(self) -> u8 {
        match self {
            Opcode::Unpack => 0,
            Opcode::Pack => 1,
            Opcode::DataSize => 2,
            Opcode::DataCtrl => 3,
            Opcode::FlowCtrl => 4,
        }
    }

    fn from_code(code: u8) -> Result<Opcode> {
        match code {
            0 => Ok(Opcode::Unpack),
            1 => Ok(Opcode::Pack),
            2 => Ok(Opcode::DataSize),
            3 => Ok(Opcode::DataCtrl),
            4 => Ok(Opcode::FlowCtrl),
            other => Err(ApxError::InvalidProgram(format!(
                "unknown opcode {other}"
            ))),
        }
    }
}

/// Sub-operations carried in a `DataCtrl` instruction's variant field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCtrlKind {
    RecordSelect,
    ArrayNext,
    RangeCheckInt32,
    RangeCheckUint32,
    RangeCheckInt64,
    RangeCheckUint64,
}

impl DataCtrlKind {
    pub const fn variant(self) -> u8 {
        match self {
            DataCtrlKind::RecordSelect => 0,
            DataCtrlKind::ArrayNext => 1,
            DataCtrlKind::RangeCheckInt32 => 2,
            DataCtrlKind::RangeCheckUint32 => 3,
            DataCtrlKind::RangeCheckInt64 => 4,
            DataCtrlKind::RangeCheckUint64 => 5,
        }
    }

    pub fn from_variant(variant: u8) -> Result<DataCtrlKind> {
        match variant {
            0 => Ok(DataCtrlKind::RecordSelect),
            1 => Ok(DataCtrlKind::ArrayNext),
            2 => Ok(DataCtrlKind::RangeCheckInt32),
            3 => Ok(DataCtrlKind::RangeCheckUint32),
            4 => Ok(DataCtrlKind::RangeCheckInt64),
            5 => Ok(DataCtrlKind::RangeCheckUint64),
            other => Err(ApxError::InvalidProgram(format!(
                "unknown data-ctrl variant {other}"
            ))),
        }
    }
}

/// Sub-operations carried in a `FlowCtrl` instruction's variant field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCtrlKind {
    QueuedWriteBegin,
    QueuedWriteEnd,
    QueuedReadBegin,
    QueuedReadEnd,
}

impl FlowCtrlKind {
    pub const fn variant(self) -> u8 {
        match self {
            FlowCtrlKind::QueuedWriteBegin => 0,
            FlowCtrlKind::QueuedWriteEnd => 1,
            FlowCtrlKind::QueuedReadBegin => 2,
            FlowCtrlKind::QueuedReadEnd => 3,
        }
    }

    pub fn from_variant(variant: u8) -> Result<FlowCtrlKind> {
        match variant {
            0 => Ok(FlowCtrlKind::QueuedWriteBegin),
            1 => Ok(FlowCtrlKind::QueuedWriteEnd),
            2 => Ok(FlowCtrlKind::QueuedReadBegin),
            3 => Ok(FlowCtrlKind::QueuedReadEnd),
            other => Err(ApxError::InvalidProgram(format!(
                "unknown flow-ctrl variant {other}"
            ))),
        }
    }
}

/// Packs `opcode`/`variant`/`flag` into a single instruction byte.
pub const fn encode_instruction(opcode: Opcode, variant: u8, flag: bool) -> u8 {
    let mut result = opcode.code() & OPCODE_MASK;
    result |= (variant & VARIANT_MASK) << VARIANT_SHIFT;
    if flag {
        result |= FLAG_BIT;
    }
    result
}

/// Unpacks an instruction byte into `(opcode, variant, flag)`.
pub fn decode_instruction(instruction: u8) -> Result<(Opcode, u8, bool)> {
    let opcode = Opcode::from_code(instruction & OPCODE_MASK)?;
    let variant = (instruction >> VARIANT_SHIFT) & VARIANT_MASK;
    let flag = instruction & FLAG_BIT != 0;
    Ok((opcode, variant, flag))
}

/// Encodes a `TypeCode` as a `Pack`/`Unpack` instruction's variant field.
pub const fn encode_type_code_variant(type_code: TypeCode) -> u8 {
    type_code as u8
}

/// The reverse of [`encode_type_code_variant`].
pub fn decode_type_code_variant(variant: u8) -> Result<TypeCode> {
    TypeCode::ALL
        .get(variant as usize)
        .copied()
        .ok_or_else(|| ApxError::InvalidProgram(format!("unknown type-code variant {variant}")))
}

/// Combines an element-size variant and a queue-length variant into the
/// single variant field of a header's trailing `DataSize` instruction:
/// the element variant selects a base offset, and the queue variant is
/// added to it.
pub const fn encode_data_size_variant(element: SizeVariant, queue: SizeVariant) -> u8 {
    const GROUP: u8 = 3; // three queue variants (u8/u16/u32) per group
    element.code() * GROUP + queue.code()
}

pub fn decode_data_size_variant(variant: u8) -> Result<(SizeVariant, SizeVariant)> {
    const GROUP: u8 = 3;
    let element_code = variant / GROUP;
    let queue_code = variant % GROUP;
    Ok((
        SizeVariant::from_code(element_code)?,
        SizeVariant::from_code(queue_code)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_round_trips() {
        for opcode in [
            Opcode::Unpack,
            Opcode::Pack,
            Opcode::DataSize,
            Opcode::DataCtrl,
            Opcode::FlowCtrl,
        ] {
            for variant in 0..16u8 {
                for flag in [false, true] {
                    let byte = encode_instruction(opcode, variant, flag);
                    let (o, v, f) = decode_instruction(byte).unwrap();
                    assert_eq!(o, opcode);
                    assert_eq!(v, variant);
                    assert_eq!(f, flag);
                }
            }
        }
    }

    #[test]
    fn type_code_variant_round_trips_for_all_variants() {
        for tc in TypeCode::ALL {
            let variant = encode_type_code_variant(*tc);
            let decoded = decode_type_code_variant(variant).unwrap();
            assert_eq!(decoded, *tc);
        }
    }

    #[test]
    fn data_size_variant_round_trips() {
        for element in [SizeVariant::U8, SizeVariant::U16, SizeVariant::U32] {
            for queue in [SizeVariant::U8, SizeVariant::U16, SizeVariant::U32] {
                let variant = encode_data_size_variant(element, queue);
                let (e, q) = decode_data_size_variant(variant).unwrap();
                assert_eq!(e.width(), element.width());
                assert_eq!(q.width(), queue.width());
            }
        }
    }
}
