//! Scalar codec shared by the serializer and deserializer.
//!
//! Spec §4.D describes the deserializer as "symmetric to the serializer":
//! both walk the same operation stream and the same field layout, one
//! writing bytes from a `Value`, the other reading bytes into one. This
//! module holds the single-scalar encode/decode pair each type code needs
//! so neither side duplicates the `match TypeCode { .. }` dispatch. Each
//! type code maps to exactly one native width, with `char`/`char8`
//! packed as a single byte and `bool` as 0/1.

use crate::error::{ApxError, Result};
use crate::type_code::TypeCode;
use crate::value::{Scalar, Value};
use crate::vm::buffer::{ReadBuffer, WriteBuffer};

/// Coerces `value` to `i64` and, unless `type_code` has no natural bound
/// (`U64`/`I64`, whose full range needs no check), enforces it (spec §4.D
/// "default-range-check against the type's natural bounds" — applies even
/// when the element carries no declared `RangeLimit`).
fn checked_natural(value: &Value, type_code: TypeCode) -> Result<i64> {
    let n = value.coerce_i64()?;
    if let Some((lo, hi)) = type_code.natural_bounds_i64() {
        if n < lo || n > hi {
            return Err(ApxError::ValueRange { value: n, lo, hi });
        }
    }
    Ok(n)
}

pub fn pack_scalar(buffer: &mut WriteBuffer, type_code: TypeCode, value: &Value) -> Result<()> {
    match type_code {
        TypeCode::U8 => buffer.write_u8(checked_natural(value, type_code)? as u8),
        TypeCode::U16 => buffer.write_u16(checked_natural(value, type_code)? as u16),
        TypeCode::U32 => buffer.write_u32(checked_natural(value, type_code)? as u32),
        TypeCode::U64 => buffer.write_u64(value.coerce_u64()?),
        TypeCode::I8 => buffer.write_u8(checked_natural(value, type_code)? as i8 as u8),
        TypeCode::I16 => buffer.write_u16(checked_natural(value, type_code)? as i16 as u16),
        TypeCode::I32 => buffer.write_i32(checked_natural(value, type_code)? as i32),
        TypeCode::I64 => buffer.write_i64(value.coerce_i64()?),
        TypeCode::Bool => match value.as_scalar()? {
            Scalar::Bool(b) => buffer.write_u8(*b as u8),
            other => Err(ApxError::ValueConversion(format!("{other:?} is not a bool"))),
        },
        TypeCode::Byte => match value.as_scalar()? {
            Scalar::Byte(b) => buffer.write_u8(*b),
            other => Err(ApxError::ValueConversion(format!("{other:?} is not a byte"))),
        },
        TypeCode::Char | TypeCode::Char8 => match value.as_scalar()? {
            Scalar::Char(c) => buffer.write_u8(*c as u8),
            other => Err(ApxError::ValueConversion(format!("{other:?} is not a char"))),
        },
        TypeCode::Char16 => match value.as_scalar()? {
            Scalar::Char(c) => buffer.write_u16(*c as u16),
            other => Err(ApxError::ValueConversion(format!("{other:?} is not a char"))),
        },
        TypeCode::Char32 => match value.as_scalar()? {
            Scalar::Char(c) => buffer.write_u32(*c as u32),
            other => Err(ApxError::ValueConversion(format!("{other:?} is not a char"))),
        },
        TypeCode::Record => Err(ApxError::Internal(
            "pack_scalar called on a record type code".to_string(),
        )),
    }
}

pub fn unpack_scalar(buffer: &mut ReadBuffer, type_code: TypeCode) -> Result<Value> {
    Ok(match type_code {
        TypeCode::U8 => Value::scalar(Scalar::U32(buffer.read_u8()? as u32)),
        TypeCode::U16 => Value::scalar(Scalar::U32(buffer.read_u16()? as u32)),
        TypeCode::U32 => Value::scalar(Scalar::U32(buffer.read_u32()?)),
        TypeCode::U64 => Value::scalar(Scalar::U64(buffer.read_u64()?)),
        TypeCode::I8 => Value::scalar(Scalar::I32(buffer.read_u8()? as i8 as i32)),
        TypeCode::I16 => Value::scalar(Scalar::I32(buffer.read_u16()? as i16 as i32)),
        TypeCode::I32 => Value::scalar(Scalar::I32(buffer.read_i32()?)),
        TypeCode::I64 => Value::scalar(Scalar::I64(buffer.read_i64()?)),
        TypeCode::Bool => Value::scalar(Scalar::Bool(buffer.read_u8()? != 0)),
        TypeCode::Byte => Value::scalar(Scalar::Byte(buffer.read_u8()?)),
        TypeCode::Char | TypeCode::Char8 => {
            Value::scalar(Scalar::Char(buffer.read_u8()? as char))
        }
        TypeCode::Char16 => {
            let code = buffer.read_u16()? as u32;
            Value::scalar(Scalar::Char(
                char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
            ))
        }
        TypeCode::Char32 => {
            let code = buffer.read_u32()?;
            Value::scalar(Scalar::Char(
                char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
            ))
        }
        TypeCode::Record => {
            return Err(ApxError::Internal(
                "unpack_scalar called on a record type code".to_string(),
            ))
        }
    })
}
