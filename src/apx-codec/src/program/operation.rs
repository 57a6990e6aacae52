//! The decoded, semantically-typed form of a single program instruction
//! (spec §4.A "operations"). The `Decoder` turns raw instruction bytes into
//! these; the VM's serializer/deserializer act on them directly.

use crate::program::instruction::{DataCtrlKind, FlowCtrlKind, Opcode};
use crate::type_code::TypeCode;

/// A single decoded program operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Unpack one element of `type_code` from the read buffer into the
    /// value tree. `array_len` is the compiled length (the maximum length,
    /// for dynamic arrays); `None` means this is a plain scalar/record.
    /// `dynamic` is meaningless when `array_len` is `None`.
    Unpack {
        type_code: TypeCode,
        array_len: Option<u32>,
        dynamic: bool,
    },
    /// Pack one element of `type_code` from the value tree into the write
    /// buffer. `array_len` is the compiled (maximum) length.
    Pack {
        type_code: TypeCode,
        array_len: Option<u32>,
        dynamic: bool,
    },
    /// Selects the next field of the record currently being packed or
    /// unpacked. `is_last_field` ends the record.
    RecordSelect {
        field_name: String,
        is_last_field: bool,
    },
    /// Advances to the next element of an array or queue currently being
    /// packed or unpacked. `is_last` signals the final element.
    ArrayNext { is_last: bool },
    RangeCheckInt32 { lo: i32, hi: i32 },
    RangeCheckUint32 { lo: u32, hi: u32 },
    RangeCheckInt64 { lo: i64, hi: i64 },
    RangeCheckUint64 { lo: u64, hi: u64 },
    QueuedWriteBegin { element_size: u32, max_length: u32 },
    QueuedWriteEnd,
    QueuedReadBegin { element_size: u32, max_length: u32 },
    QueuedReadEnd,
}

impl Operation {
    /// The coarse opcode family this operation belongs to, for diagnostics.
    pub fn opcode(&self) -> Opcode {
        match self {
            Operation::Unpack { .. } => Opcode::Unpack,
            Operation::Pack { .. } => Opcode::Pack,
            Operation::RecordSelect { .. } | Operation::ArrayNext { .. } => Opcode::DataCtrl,
            Operation::RangeCheckInt32 { .. }
            | Operation::RangeCheckUint32 { .. }
            | Operation::RangeCheckInt64 { .. }
            | Operation::RangeCheckUint64 { .. } => Opcode::DataCtrl,
            Operation::QueuedWriteBegin { .. }
            | Operation::QueuedWriteEnd
            | Operation::QueuedReadBegin { .. }
            | Operation::QueuedReadEnd => Opcode::FlowCtrl,
        }
    }

    pub(crate) fn data_ctrl_kind(&self) -> Option<DataCtrlKind> {
        match self {
            Operation::RecordSelect { .. } => Some(DataCtrlKind::RecordSelect),
            Operation::ArrayNext { .. } => Some(DataCtrlKind::ArrayNext),
            Operation::RangeCheckInt32 { .. } => Some(DataCtrlKind::RangeCheckInt32),
            Operation::RangeCheckUint32 { .. } => Some(DataCtrlKind::RangeCheckUint32),
            Operation::RangeCheckInt64 { .. } => Some(DataCtrlKind::RangeCheckInt64),
            Operation::RangeCheckUint64 { .. } => Some(DataCtrlKind::RangeCheckUint64),
            _ => None,
        }
    }

    pub(crate) fn flow_ctrl_kind(&self) -> Option<FlowCtrlKind> {
        match self {
            Operation::QueuedWriteBegin { .. } => Some(FlowCtrlKind::QueuedWriteBegin),
            Operation::QueuedWriteEnd => Some(FlowCtrlKind::QueuedWriteEnd),
            Operation::QueuedReadBegin { .. } => Some(FlowCtrlKind::QueuedReadBegin),
            Operation::QueuedReadEnd => Some(FlowCtrlKind::QueuedReadEnd),
            _ => None,
        }
    }
}
