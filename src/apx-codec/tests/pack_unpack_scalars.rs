//! Scalar and array pack/unpack round trips through the `Vm` façade (spec
//! §4.F, §8 scenarios 1-2 and the primitive round-trip law).

use apx_codec::element::DataElement;
use apx_codec::program::compiler::compile_program;
use apx_codec::program::header::ProgramType;
use apx_codec::type_code::TypeCode;
use apx_codec::value::Scalar;
use apx_codec::{Value, Vm};

fn round_trip(element: &DataElement, value: Value, buf_len: usize) -> (Value, usize, usize) {
    let pack_program = compile_program(element, ProgramType::Pack).unwrap();
    let unpack_program = compile_program(element, ProgramType::Unpack).unwrap();

    let mut pack_vm = Vm::select_program(&pack_program).unwrap();
    let mut out = vec![0u8; buf_len];
    pack_vm.pack_value(&value, &mut out).unwrap();
    let written = pack_vm.bytes_written();

    let mut unpack_vm = Vm::select_program(&unpack_program).unwrap();
    let decoded = unpack_vm.unpack_value(&out[..written]).unwrap();
    (decoded, written, unpack_vm.bytes_read())
}

#[test]
fn scenario_u8_pack_writes_exactly_one_byte() {
    let element = DataElement::scalar(TypeCode::U8);
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let mut vm = Vm::select_program(&pack_program).unwrap();
    let mut out = [0u8; 1];
    vm.pack_value(&Value::scalar(Scalar::U32(255)), &mut out).unwrap();
    assert_eq!(out, [0xFF]);
    assert_eq!(vm.bytes_written(), 1);
}

#[test]
fn scalar_round_trip_preserves_value_for_every_natural_bound() {
    let cases: &[(TypeCode, Value)] = &[
        (TypeCode::U8, Value::scalar(Scalar::U32(0))),
        (TypeCode::U8, Value::scalar(Scalar::U32(255))),
        (TypeCode::I32, Value::scalar(Scalar::I32(i32::MIN))),
        (TypeCode::I32, Value::scalar(Scalar::I32(i32::MAX))),
        (TypeCode::U64, Value::scalar(Scalar::U64(u64::MAX))),
    ];
    for (type_code, value) in cases {
        let element = DataElement::scalar(*type_code);
        let (decoded, written, read) = round_trip(&element, value.clone(), 16);
        assert_eq!(written, type_code.element_size() as usize);
        assert_eq!(read, written);
        assert_eq!(&decoded, value);
    }
}

#[test]
fn scenario_u8_range_0_3_rejects_value_out_of_range() {
    use apx_codec::element::RangeLimit;

    let element = DataElement::scalar(TypeCode::U8).with_range(RangeLimit::Unsigned { lo: 0, hi: 3 });
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let mut vm = Vm::select_program(&pack_program).unwrap();

    let mut out = [0u8; 1];
    vm.pack_value(&Value::scalar(Scalar::U32(3)), &mut out).unwrap();
    assert_eq!(out, [3]);

    let result = vm.pack_value(&Value::scalar(Scalar::U32(4)), &mut out);
    assert!(result.is_err());
}

#[test]
fn pack_rejects_a_value_outside_the_target_types_natural_bounds_even_without_a_declared_range() {
    use apx_codec::error::ApxError;

    let element = DataElement::scalar(TypeCode::U8);
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let mut vm = Vm::select_program(&pack_program).unwrap();
    let mut out = [0u8; 1];

    // No RangeLimit was declared on this element, but a u8 slot still must
    // not silently truncate a too-large value (spec §4.D "default-range-
    // check against the type's natural bounds").
    let result = vm.pack_value(&Value::scalar(Scalar::U32(256)), &mut out);
    assert!(matches!(result, Err(ApxError::ValueRange { .. })));
}

#[test]
fn scenario_u16_array_length_two_packs_little_endian() {
    let element = DataElement::scalar(TypeCode::U16).with_array(2, false);
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let mut vm = Vm::select_program(&pack_program).unwrap();
    let mut out = vec![0u8; 16];
    let value = Value::array(vec![
        Value::scalar(Scalar::U32(0x1234)),
        Value::scalar(Scalar::U32(0x5678)),
    ]);
    vm.pack_value(&value, &mut out).unwrap();
    // A fixed (non-dynamic) array carries no runtime length prefix: its
    // compiled length is its actual length, so exactly N*element_size
    // bytes are written (spec §8 scenario 2).
    assert_eq!(vm.bytes_written(), 4);
    assert_eq!(&out[0..2], &0x1234u16.to_le_bytes());
    assert_eq!(&out[2..4], &0x5678u16.to_le_bytes());
}

#[test]
fn fixed_array_rejects_a_value_with_the_wrong_length() {
    let element = DataElement::scalar(TypeCode::U16).with_array(2, false);
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let mut vm = Vm::select_program(&pack_program).unwrap();
    let mut out = vec![0u8; 16];
    let value = Value::array(vec![Value::scalar(Scalar::U32(1))]);
    assert!(vm.pack_value(&value, &mut out).is_err());
}

#[test]
fn scenario_dynamic_byte_array_unpacks_the_prefixed_length() {
    let element = DataElement::scalar(TypeCode::Byte).with_array(10, true);
    let (decoded, written, read) = round_trip(
        &element,
        Value::scalar(Scalar::ByteArray(vec![0x18, 0x22, 0x31, 0x14])),
        32,
    );
    assert_eq!(read, written);
    assert_eq!(decoded.coerce_bytearray().unwrap(), &[0x18, 0x22, 0x31, 0x14]);
}

#[test]
fn pack_writes_exactly_size_of_type_for_every_scalar() {
    for type_code in TypeCode::ALL {
        if type_code.is_record() {
            continue;
        }
        let element = DataElement::scalar(*type_code);
        let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
        let mut vm = Vm::select_program(&pack_program).unwrap();
        let mut out = vec![0u8; 8];
        let value = element.default_value();
        vm.pack_value(&value, &mut out).unwrap();
        assert_eq!(vm.bytes_written(), type_code.element_size() as usize);
    }
}
