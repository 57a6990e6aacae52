//! Packs a `Value` tree into a byte buffer by walking a compiled program
//! (spec §4.D). The walk is native Rust recursion over the decoded
//! operation stream (`pack_element` calling itself through
//! `pack_record_fields`/`pack_array`), rather than the explicit
//! stack-of-frames state machine spec §9 describes — see DESIGN.md's VM
//! section for why, and the tradeoff that comes with it. `Decoder::
//! save_position`/`recall_position` handle array-of-record rewinds.
//!
//! A fixed (non-dynamic) array or record-array has no runtime length
//! prefix: its compiled length is the actual length, so `N*element_size`
//! bytes are written directly (spec §8's quantified invariant). A
//! *dynamic* array is self-describing: an actual-length prefix, in the
//! narrowest width holding the compiled maximum, precedes the payload,
//! and only the actual elements are written — the reserved maximum only
//! bounds the port's overall data-region size (computed by the Compiler),
//! it is not padding applied to each individual pack/unpack call. A
//! top-level queue is handled the same way, with the queue-length
//! variant from the program header standing in for the per-array width.

use crate::element::DataElement;
use crate::error::{ApxError, Result};
use crate::program::decoder::Decoder;
use crate::program::header::SizeVariant;
use crate::program::operation::Operation;
use crate::type_code::TypeCode;
use crate::value::Value;
use crate::vm::buffer::WriteBuffer;
use crate::vm::frame::pack_scalar;

/// Packs `value` according to `program` into `out`, returning the number
/// of bytes written.
pub fn pack_value(program: &[u8], value: &Value, out: &mut [u8]) -> Result<usize> {
    let mut decoder = Decoder::new(program);
    let header = decoder.parse_program_header()?;
    let mut buffer = WriteBuffer::new(out);

    if header.is_queued() {
        let items = value.as_array()?;
        let len = items.len() as u32;
        if len > header.queue_length {
            // Spec §8 scenario 6: a queue pack that would exceed the
            // declared maximum is a full queue, not a mere length mismatch.
            log::warn!(
                "pack rejected: queue full ({len} items against a maximum of {})",
                header.queue_length
            );
            return Err(ApxError::QueueFull);
        }
        let variant = SizeVariant::smallest_for(header.queue_length);
        buffer.write_uint_variant(len, variant)?;
        if items.is_empty() {
            decoder.skip_element()?;
        } else {
            decoder.save_position();
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    decoder.recall_position()?;
                }
                pack_element(&mut decoder, &mut buffer, item)?;
            }
        }
    } else {
        pack_element(&mut decoder, &mut buffer, value)?;
    }

    log::trace!("pack_value wrote {} bytes", buffer.bytes_written());
    Ok(buffer.bytes_written())
}

fn pack_element(decoder: &mut Decoder, buffer: &mut WriteBuffer, value: &Value) -> Result<()> {
    match decoder
        .parse_next_operation()?
        .ok_or_else(|| ApxError::Internal("program ended while packing".to_string()))?
    {
        Operation::RangeCheckInt32 { lo, hi } => {
            check_signed_range(value, lo as i64, hi as i64)?;
            pack_element(decoder, buffer, value)
        }
        Operation::RangeCheckInt64 { lo, hi } => {
            check_signed_range(value, lo, hi)?;
            pack_element(decoder, buffer, value)
        }
        Operation::RangeCheckUint32 { lo, hi } => {
            check_unsigned_range(value, lo as u64, hi as u64)?;
            pack_element(decoder, buffer, value)
        }
        Operation::RangeCheckUint64 { lo, hi } => {
            check_unsigned_range(value, lo, hi)?;
            pack_element(decoder, buffer, value)
        }
        Operation::Pack { type_code, array_len, dynamic } => {
            if let Some(max_len) = array_len {
                pack_array(decoder, buffer, type_code, value, max_len, dynamic)
            } else if type_code.is_record() {
                pack_record_fields(decoder, buffer, value)
            } else {
                pack_scalar(buffer, type_code, value)
            }
        }
        other => Err(ApxError::Internal(format!(
            "unexpected operation while packing: {other:?}"
        ))),
    }
}

fn check_signed_range(value: &Value, lo: i64, hi: i64) -> Result<()> {
    let n = value.coerce_i64()?;
    if n < lo || n > hi {
        return Err(ApxError::ValueRange { value: n, lo, hi });
    }
    Ok(())
}

fn check_unsigned_range(value: &Value, lo: u64, hi: u64) -> Result<()> {
    let n = value.coerce_u64()?;
    if n < lo || n > hi {
        return Err(ApxError::ValueRange {
            value: n as i64,
            lo: lo as i64,
            hi: hi as i64,
        });
    }
    Ok(())
}

fn pack_record_fields(decoder: &mut Decoder, buffer: &mut WriteBuffer, value: &Value) -> Result<()> {
    let hash = value.as_hash()?;
    loop {
        match decoder
            .parse_next_operation()?
            .ok_or_else(|| ApxError::Internal("program ended mid-record".to_string()))?
        {
            Operation::RecordSelect {
                field_name,
                is_last_field,
            } => {
                let field_value = hash
                    .get(&field_name)
                    .ok_or_else(|| ApxError::NotFound(field_name.clone()))?;
                pack_element(decoder, buffer, field_value)?;
                if is_last_field {
                    return Ok(());
                }
            }
            other => {
                return Err(ApxError::Internal(format!(
                    "expected RECORD_SELECT, found {other:?}"
                )))
            }
        }
    }
}

/// Writes the runtime length prefix for a dynamic array, in the narrowest
/// width holding the compiled maximum (spec §4.B/§4.D).
fn write_dynamic_prefix(buffer: &mut WriteBuffer, len: u32, max_len: u32) -> Result<()> {
    buffer.write_uint_variant(len, SizeVariant::smallest_for(max_len))
}

fn check_array_len(len: u32, max_len: u32, dynamic: bool) -> Result<()> {
    if len > max_len {
        return Err(ApxError::ValueLength {
            expected: max_len,
            actual: len,
        });
    }
    if !dynamic && len != max_len {
        return Err(ApxError::ValueLength {
            expected: max_len,
            actual: len,
        });
    }
    Ok(())
}

fn pack_array(
    decoder: &mut Decoder,
    buffer: &mut WriteBuffer,
    type_code: TypeCode,
    value: &Value,
    max_len: u32,
    dynamic: bool,
) -> Result<()> {
    if type_code.is_record() {
        let elements = value.as_array()?;
        let len = elements.len() as u32;
        check_array_len(len, max_len, dynamic)?;
        if dynamic {
            write_dynamic_prefix(buffer, len, max_len)?;
        }
        if elements.is_empty() {
            decoder.skip_record_fields()?;
        } else {
            decoder.save_position();
            for (i, elem) in elements.iter().enumerate() {
                if i > 0 {
                    decoder.recall_position()?;
                }
                pack_record_fields(decoder, buffer, elem)?;
            }
        }
        return Ok(());
    }

    match type_code {
        TypeCode::Char | TypeCode::Char8 => {
            let s = value.coerce_string()?;
            let len = s.len() as u32;
            if len > max_len {
                return Err(ApxError::ValueLength {
                    expected: max_len,
                    actual: len,
                });
            }
            if dynamic {
                write_dynamic_prefix(buffer, len, max_len)?;
                buffer.write_bytes(s.as_bytes())
            } else {
                // Fixed char arrays are always exactly max_len bytes,
                // zero-padded (the unpack side stops at the first NUL but
                // still advances to the full element-sized boundary).
                buffer.write_padded(s.as_bytes(), max_len as usize)
            }
        }
        TypeCode::Byte => {
            let bytes = value.coerce_bytearray()?;
            let len = bytes.len() as u32;
            check_array_len(len, max_len, dynamic)?;
            if dynamic {
                write_dynamic_prefix(buffer, len, max_len)?;
            }
            buffer.write_bytes(bytes)
        }
        _ => {
            let items = value.as_array()?;
            let len = items.len() as u32;
            check_array_len(len, max_len, dynamic)?;
            if dynamic {
                write_dynamic_prefix(buffer, len, max_len)?;
            }
            for item in items {
                pack_scalar(buffer, type_code, item)?;
            }
            Ok(())
        }
    }
}

/// Computes the worst-case packed size for `element`, for callers sizing
/// their write buffer. Adds the self-describing length prefixes this
/// serializer emits on top of the compiler's flat `static_byte_size`.
pub fn max_packed_size(element: &DataElement) -> Result<u32> {
    crate::program::compiler::static_byte_size(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Field;
    use crate::program::compiler::compile_program;
    use crate::program::header::ProgramType;
    use crate::value::Scalar;
    use crate::vm::deserializer::unpack_value;
    use indexmap::IndexMap;

    #[test]
    fn packs_a_flat_u32_scalar() {
        let element = DataElement::scalar(TypeCode::U32);
        let program = compile_program(&element, ProgramType::Pack).unwrap();
        let value = Value::scalar(Scalar::U32(42));
        let mut out = [0u8; 4];
        let written = pack_value(&program, &value, &mut out).unwrap();
        assert_eq!(written, 4);
        assert_eq!(out, 42u32.to_le_bytes());
    }

    #[test]
    fn range_check_rejects_out_of_bounds_value() {
        let element = DataElement::scalar(TypeCode::I32)
            .with_range(crate::element::RangeLimit::Signed { lo: 0, hi: 10 });
        let program = compile_program(&element, ProgramType::Pack).unwrap();
        let value = Value::scalar(Scalar::I32(99));
        let mut out = [0u8; 4];
        let result = pack_value(&program, &value, &mut out);
        assert!(matches!(result, Err(ApxError::ValueRange { .. })));
    }

    #[test]
    fn packs_and_unpacks_a_record_with_a_scalar_array_field() {
        let element = DataElement::record(vec![
            Field {
                name: "id".into(),
                element: DataElement::scalar(TypeCode::U16),
            },
            Field {
                name: "samples".into(),
                element: DataElement::scalar(TypeCode::U8).with_array(4, true),
            },
        ]);
        let program_pack = compile_program(&element, ProgramType::Pack).unwrap();
        let program_unpack = compile_program(&element, ProgramType::Unpack).unwrap();

        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), Value::scalar(Scalar::U32(7)));
        fields.insert(
            "samples".to_string(),
            Value::array(vec![
                Value::scalar(Scalar::U32(1)),
                Value::scalar(Scalar::U32(2)),
            ]),
        );
        let value = Value::hash(fields);

        let mut out = vec![0u8; 64];
        let written = pack_value(&program_pack, &value, &mut out).unwrap();

        let (decoded, read) = unpack_value(&program_unpack, &out[..written]).unwrap();
        assert_eq!(read, written);
        let decoded_hash = decoded.as_hash().unwrap();
        assert_eq!(decoded_hash.get("id").unwrap().coerce_u64().unwrap(), 7);
        assert_eq!(decoded_hash.get("samples").unwrap().as_array().unwrap().len(), 2);
    }
}
