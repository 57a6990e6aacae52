//! Turns a resolved `DataElement` tree into a compiled program (spec §4.B).
//!
//! Emits a flat instruction stream that a single forward pass of the VM
//! executes, with no jump instructions. An array of records is not
//! unrolled into the stream; the VM re-runs the body once per element by
//! rewinding the decoder's cursor, which is why `Operation::ArrayNext`
//! (kept for decoder/spec symmetry) is never emitted here.

use crate::element::{DataElement, RangeLimit};
use crate::error::{ApxError, Result};
use crate::program::header::{encode_header, ProgramType, SizeVariant};
use crate::program::instruction::{encode_instruction, encode_type_code_variant, DataCtrlKind, Opcode};
use crate::type_code::TypeCode;

/// Longest record field name this compiler will encode as a `RECORD_SELECT`
/// operand, chosen as a single-byte-length-prefixable bound.
const MAX_FIELD_NAME_LEN: usize = 255;

/// Computes the fixed, non-queued byte size of one instance of `element`.
/// Queue multiplication is handled entirely by [`encode_header`]; this
/// walk never applies it, so a queued element's own size here is the size
/// of a single queue item.
pub fn static_byte_size(element: &DataElement) -> Result<u32> {
    match element {
        DataElement::Scalar {
            type_code,
            attributes,
            ..
        } => {
            let unit = type_code.element_size() as u32;
            if attributes.is_array() {
                unit
                    .checked_mul(attributes.array_len)
                    .ok_or_else(|| ApxError::InvalidArgument("array size overflow".to_string()))
            } else {
                Ok(unit)
            }
        }
        DataElement::Record { fields, attributes } => {
            let mut total = 0u32;
            for field in fields {
                total = total
                    .checked_add(static_byte_size(&field.element)?)
                    .ok_or_else(|| ApxError::InvalidArgument("record size overflow".to_string()))?;
            }
            if attributes.is_array() {
                total
                    .checked_mul(attributes.array_len)
                    .ok_or_else(|| ApxError::InvalidArgument("array size overflow".to_string()))
            } else {
                Ok(total)
            }
        }
    }
}

/// Compiles the full program (header + instruction stream) for `element`.
pub fn compile_program(element: &DataElement, program_type: ProgramType) -> Result<Vec<u8>> {
    if let Err(err) = element.validate() {
        log::warn!("compiler rejected element tree: {err}");
        return Err(err);
    }

    let element_size = static_byte_size(element)?;
    let queue_size = element.attributes().queue_len;
    let is_dynamic = element.has_dynamic_data();

    let mut program = encode_header(program_type, element_size, queue_size, is_dynamic)?;
    emit_element(&mut program, element, program_type)?;
    log::debug!(
        "compiled {:?} program: {} bytes",
        program_type,
        program.len()
    );
    Ok(program)
}

fn range_check_instruction(out: &mut Vec<u8>, type_code: TypeCode, range: RangeLimit) {
    let wide = type_code.element_size() > 4;
    match (range, wide) {
        (RangeLimit::Signed { lo, hi }, false) => {
            out.push(encode_instruction(
                Opcode::DataCtrl,
                DataCtrlKind::RangeCheckInt32.variant(),
                false,
            ));
            out.extend_from_slice(&(lo as i32).to_le_bytes());
            out.extend_from_slice(&(hi as i32).to_le_bytes());
        }
        (RangeLimit::Signed { lo, hi }, true) => {
            out.push(encode_instruction(
                Opcode::DataCtrl,
                DataCtrlKind::RangeCheckInt64.variant(),
                false,
            ));
            out.extend_from_slice(&lo.to_le_bytes());
            out.extend_from_slice(&hi.to_le_bytes());
        }
        (RangeLimit::Unsigned { lo, hi }, false) => {
            out.push(encode_instruction(
                Opcode::DataCtrl,
                DataCtrlKind::RangeCheckUint32.variant(),
                false,
            ));
            out.extend_from_slice(&(lo as u32).to_le_bytes());
            out.extend_from_slice(&(hi as u32).to_le_bytes());
        }
        (RangeLimit::Unsigned { lo, hi }, true) => {
            out.push(encode_instruction(
                Opcode::DataCtrl,
                DataCtrlKind::RangeCheckUint64.variant(),
                false,
            ));
            out.extend_from_slice(&lo.to_le_bytes());
            out.extend_from_slice(&hi.to_le_bytes());
        }
    }
}

/// Emits the `DATA_SIZE` instruction + length operand that follows an
/// array-flagged `Pack`/`Unpack` instruction (spec §4.B step 2): the
/// instruction's variant names the narrowest width holding `array_len`,
/// its flag carries the dynamic-array bit, and the length itself follows
/// encoded little-endian in that width.
fn emit_array_size(out: &mut Vec<u8>, array_len: u32, dynamic: bool) {
    let width = SizeVariant::smallest_for(array_len);
    out.push(encode_instruction(Opcode::DataSize, width.code(), dynamic));
    width.write(array_len, out);
}

fn emit_element(out: &mut Vec<u8>, element: &DataElement, program_type: ProgramType) -> Result<()> {
    let opcode = match program_type {
        ProgramType::Pack => Opcode::Pack,
        ProgramType::Unpack => Opcode::Unpack,
    };

    match element {
        DataElement::Scalar {
            type_code,
            attributes,
            range,
        } => {
            if let Some(range) = range {
                range_check_instruction(out, *type_code, *range);
            }
            out.push(encode_instruction(
                opcode,
                encode_type_code_variant(*type_code),
                attributes.is_array(),
            ));
            if attributes.is_array() {
                emit_array_size(out, attributes.array_len, attributes.dynamic);
            }
        }
        DataElement::Record { fields, attributes } => {
            out.push(encode_instruction(
                opcode,
                encode_type_code_variant(TypeCode::Record),
                attributes.is_array(),
            ));
            if attributes.is_array() {
                emit_array_size(out, attributes.array_len, attributes.dynamic);
            }
            let last = fields.len().saturating_sub(1);
            for (i, field) in fields.iter().enumerate() {
                if field.name.is_empty() {
                    return Err(ApxError::NameMissing);
                }
                if field.name.len() > MAX_FIELD_NAME_LEN {
                    return Err(ApxError::NameTooLong {
                        len: field.name.len(),
                        max: MAX_FIELD_NAME_LEN,
                    });
                }
                if field.name.as_bytes().contains(&0) {
                    return Err(ApxError::InvalidArgument(
                        "field name must not contain a NUL byte".to_string(),
                    ));
                }
                out.push(encode_instruction(
                    Opcode::DataCtrl,
                    DataCtrlKind::RecordSelect.variant(),
                    i == last,
                ));
                out.extend_from_slice(field.name.as_bytes());
                out.push(0u8);
                emit_element(out, &field.element, program_type)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Field;
    use crate::program::decoder::Decoder;
    use crate::program::operation::Operation;

    #[test]
    fn compiles_a_flat_scalar_pack_program() {
        let element = DataElement::scalar(TypeCode::U16);
        let program = compile_program(&element, ProgramType::Pack).unwrap();

        let mut decoder = Decoder::new(&program);
        let header = decoder.parse_program_header().unwrap();
        assert_eq!(header.data_size, 2);

        let op = decoder.parse_next_operation().unwrap().unwrap();
        assert_eq!(
            op,
            Operation::Pack {
                type_code: TypeCode::U16,
                array_len: None,
                dynamic: false
            }
        );
        assert!(decoder.parse_next_operation().unwrap().is_none());
    }

    #[test]
    fn compiles_a_record_with_field_selects() {
        let element = DataElement::record(vec![
            Field {
                name: "a".into(),
                element: DataElement::scalar(TypeCode::U8),
            },
            Field {
                name: "b".into(),
                element: DataElement::scalar(TypeCode::U32),
            },
        ]);
        let program = compile_program(&element, ProgramType::Unpack).unwrap();

        let mut decoder = Decoder::new(&program);
        let header = decoder.parse_program_header().unwrap();
        assert_eq!(header.data_size, 5);

        let ops: Vec<_> = std::iter::from_fn(|| decoder.parse_next_operation().transpose())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            ops,
            vec![
                Operation::Unpack {
                    type_code: TypeCode::Record,
                    array_len: None,
                    dynamic: false
                },
                Operation::RecordSelect {
                    field_name: "a".to_string(),
                    is_last_field: false
                },
                Operation::Unpack {
                    type_code: TypeCode::U8,
                    array_len: None,
                    dynamic: false
                },
                Operation::RecordSelect {
                    field_name: "b".to_string(),
                    is_last_field: true
                },
                Operation::Unpack {
                    type_code: TypeCode::U32,
                    array_len: None,
                    dynamic: false
                },
            ]
        );
    }

    #[test]
    fn fixed_array_carries_its_length_operand() {
        let element = DataElement::scalar(TypeCode::U8).with_array(10, false);
        let program = compile_program(&element, ProgramType::Pack).unwrap();
        let mut decoder = Decoder::new(&program);
        decoder.parse_program_header().unwrap();
        let op = decoder.parse_next_operation().unwrap().unwrap();
        assert_eq!(
            op,
            Operation::Pack {
                type_code: TypeCode::U8,
                array_len: Some(10),
                dynamic: false
            }
        );
    }

    #[test]
    fn dynamic_array_flag_round_trips_through_the_program() {
        let element = DataElement::scalar(TypeCode::U8).with_array(10, true);
        let program = compile_program(&element, ProgramType::Pack).unwrap();
        let mut decoder = Decoder::new(&program);
        decoder.parse_program_header().unwrap();
        let op = decoder.parse_next_operation().unwrap().unwrap();
        assert_eq!(
            op,
            Operation::Pack {
                type_code: TypeCode::U8,
                array_len: Some(10),
                dynamic: true
            }
        );
    }

    #[test]
    fn queued_port_header_reflects_element_and_queue_size() {
        let element = DataElement::scalar(TypeCode::U32).with_queue(5);
        let program = compile_program(&element, ProgramType::Pack).unwrap();
        let mut decoder = Decoder::new(&program);
        let header = decoder.parse_program_header().unwrap();
        assert_eq!(header.element_size, 4);
        assert_eq!(header.queue_length, 5);
    }
}
