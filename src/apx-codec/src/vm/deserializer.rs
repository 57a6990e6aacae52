//! Unpacks a byte buffer into a `Value` tree by walking a compiled program
//! (spec §4.E). Symmetric to `vm::serializer`: same native-recursion walk
//! over the same operation stream, same self-describing array/queue
//! length prefixes, values flow the other way.

use indexmap::IndexMap;

use crate::error::{ApxError, Result};
use crate::program::decoder::Decoder;
use crate::program::header::SizeVariant;
use crate::program::operation::Operation;
use crate::type_code::TypeCode;
use crate::value::{Scalar, Value};
use crate::vm::buffer::ReadBuffer;
use crate::vm::frame::unpack_scalar;

/// Unpacks a value according to `program` from `input`, returning the
/// value and the number of bytes consumed.
pub fn unpack_value(program: &[u8], input: &[u8]) -> Result<(Value, usize)> {
    let mut decoder = Decoder::new(program);
    let header = decoder.parse_program_header()?;
    let mut buffer = ReadBuffer::new(input);

    let value = if header.is_queued() {
        let variant = SizeVariant::smallest_for(header.queue_length);
        let len = buffer.read_uint_variant(variant)?;
        if len > header.queue_length {
            log::warn!(
                "unpack rejected: queue length prefix {len} exceeds declared maximum {}",
                header.queue_length
            );
            return Err(ApxError::ValueLength {
                expected: header.queue_length,
                actual: len,
            });
        }
        if len == 0 {
            decoder.skip_element()?;
            Value::array(Vec::new())
        } else {
            decoder.save_position();
            let mut items = Vec::with_capacity(len as usize);
            for i in 0..len {
                if i > 0 {
                    decoder.recall_position()?;
                }
                items.push(unpack_element(&mut decoder, &mut buffer)?);
            }
            Value::array(items)
        }
    } else {
        unpack_element(&mut decoder, &mut buffer)?
    };

    log::trace!("unpack_value read {} bytes", buffer.bytes_read());
    Ok((value, buffer.bytes_read()))
}

fn unpack_element(decoder: &mut Decoder, buffer: &mut ReadBuffer) -> Result<Value> {
    match decoder
        .parse_next_operation()?
        .ok_or_else(|| ApxError::Internal("program ended while unpacking".to_string()))?
    {
        Operation::RangeCheckInt32 { lo, hi } => {
            let value = unpack_element(decoder, buffer)?;
            check_signed_range(&value, lo as i64, hi as i64)?;
            Ok(value)
        }
        Operation::RangeCheckInt64 { lo, hi } => {
            let value = unpack_element(decoder, buffer)?;
            check_signed_range(&value, lo, hi)?;
            Ok(value)
        }
        Operation::RangeCheckUint32 { lo, hi } => {
            let value = unpack_element(decoder, buffer)?;
            check_unsigned_range(&value, lo as u64, hi as u64)?;
            Ok(value)
        }
        Operation::RangeCheckUint64 { lo, hi } => {
            let value = unpack_element(decoder, buffer)?;
            check_unsigned_range(&value, lo, hi)?;
            Ok(value)
        }
        Operation::Unpack { type_code, array_len, dynamic } => {
            if let Some(max_len) = array_len {
                unpack_array(decoder, buffer, type_code, max_len, dynamic)
            } else if type_code.is_record() {
                unpack_record_fields(decoder, buffer)
            } else {
                unpack_scalar(buffer, type_code)
            }
        }
        other => Err(ApxError::Internal(format!(
            "unexpected operation while unpacking: {other:?}"
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

fn unpack_record_fields(decoder: &mut Decoder, buffer: &mut ReadBuffer) -> Result<Value> {
    let mut fields = IndexMap::new();
    loop {
        match decoder
            .parse_next_operation()?
            .ok_or_else(|| ApxError::Internal("program ended mid-record".to_string()))?
        {
            Operation::RecordSelect {
                field_name,
                is_last_field,
            } => {
                let value = unpack_element(decoder, buffer)?;
                fields.insert(field_name, value);
                if is_last_field {
                    return Ok(Value::hash(fields));
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

/// Reads the runtime length of an array: the dynamic-prefix integer (in
/// the narrowest width holding `max_len`) when dynamic, or simply
/// `max_len` itself when the array's length is fixed by the program.
fn read_array_len(buffer: &mut ReadBuffer, max_len: u32, dynamic: bool) -> Result<u32> {
    if dynamic {
        let len = buffer.read_uint_variant(SizeVariant::smallest_for(max_len))?;
        if len > max_len {
            return Err(ApxError::ValueLength {
                expected: max_len,
                actual: len,
            });
        }
        Ok(len)
    } else {
        Ok(max_len)
    }
}

fn unpack_array(
    decoder: &mut Decoder,
    buffer: &mut ReadBuffer,
    type_code: TypeCode,
    max_len: u32,
    dynamic: bool,
) -> Result<Value> {
    if type_code.is_record() {
        let len = read_array_len(buffer, max_len, dynamic)?;
        if len == 0 {
            decoder.skip_record_fields()?;
            return Ok(Value::array(Vec::new()));
        }
        decoder.save_position();
        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            if i > 0 {
                decoder.recall_position()?;
            }
            items.push(unpack_record_fields(decoder, buffer)?);
        }
        return Ok(Value::array(items));
    }

    match type_code {
        TypeCode::Char | TypeCode::Char8 => {
            if dynamic {
                let len = read_array_len(buffer, max_len, dynamic)?;
                let bytes = buffer.read_bytes(len as usize)?;
                Ok(Value::scalar(Scalar::String(
                    String::from_utf8_lossy(bytes).into_owned(),
                )))
            } else {
                // Fixed char arrays always occupy max_len bytes; the
                // string ends at the first NUL (C-style truncation) but
                // the cursor still advances past the whole slot.
                let raw = buffer.read_bytes(max_len as usize)?;
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Ok(Value::scalar(Scalar::String(
                    String::from_utf8_lossy(&raw[..end]).into_owned(),
                )))
            }
        }
        TypeCode::Byte => {
            let len = read_array_len(buffer, max_len, dynamic)?;
            let bytes = buffer.read_bytes(len as usize)?.to_vec();
            Ok(Value::scalar(Scalar::ByteArray(bytes)))
        }
        _ => {
            let len = read_array_len(buffer, max_len, dynamic)?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(unpack_scalar(buffer, type_code)?);
            }
            Ok(Value::array(items))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DataElement;
    use crate::program::compiler::compile_program;
    use crate::program::header::ProgramType;
    use crate::vm::serializer::pack_value;

    #[test]
    fn unpacks_a_dynamic_char_array_roundtrip() {
        let element = DataElement::scalar(TypeCode::Char8).with_array(16, true);
        let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
        let unpack_program = compile_program(&element, ProgramType::Unpack).unwrap();

        let value = Value::scalar(Scalar::String("hello".to_string()));
        let mut out = vec![0u8; 32];
        let written = pack_value(&pack_program, &value, &mut out).unwrap();

        let (decoded, read) = unpack_value(&unpack_program, &out[..written]).unwrap();
        assert_eq!(read, written);
        assert_eq!(decoded.coerce_string().unwrap(), "hello");
    }

    #[test]
    fn queued_port_round_trips_zero_and_many_elements() {
        let element = DataElement::scalar(TypeCode::U16).with_queue(4);
        let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
        let unpack_program = compile_program(&element, ProgramType::Unpack).unwrap();

        for count in [0usize, 1, 4] {
            let values: Vec<Value> = (0..count)
                .map(|i| Value::scalar(Scalar::U32(i as u32)))
                .collect();
            let queue = Value::array(values);
            let mut out = vec![0u8; 32];
            let written = pack_value(&pack_program, &queue, &mut out).unwrap();
            let (decoded, read) = unpack_value(&unpack_program, &out[..written]).unwrap();
            assert_eq!(read, written);
            assert_eq!(decoded.as_array().unwrap().len(), count);
        }
    }
}
