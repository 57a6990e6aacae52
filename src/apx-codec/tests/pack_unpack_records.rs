//! Record pack/unpack round trips, including arrays of records (spec §4.D/
//! §4.E, §8 scenario 4).

use apx_codec::element::{DataElement, Field};
use apx_codec::program::compiler::compile_program;
use apx_codec::program::header::ProgramType;
use apx_codec::type_code::TypeCode;
use apx_codec::value::Scalar;
use apx_codec::{Value, Vm};
use indexmap::IndexMap;

fn point_element() -> DataElement {
    DataElement::record(vec![
        Field {
            name: "X".into(),
            element: DataElement::scalar(TypeCode::I16),
        },
        Field {
            name: "Y".into(),
            element: DataElement::scalar(TypeCode::I16),
        },
    ])
}

#[test]
fn scenario_record_unpacks_fields_in_declared_order() {
    let element = point_element();
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let unpack_program = compile_program(&element, ProgramType::Unpack).unwrap();

    let mut fields = IndexMap::new();
    fields.insert("X".to_string(), Value::scalar(Scalar::I32(-3)));
    fields.insert("Y".to_string(), Value::scalar(Scalar::I32(12)));
    let value = Value::hash(fields);

    let mut pack_vm = Vm::select_program(&pack_program).unwrap();
    let mut out = [0u8; 4];
    pack_vm.pack_value(&value, &mut out).unwrap();
    assert_eq!(pack_vm.bytes_written(), 4);

    let mut unpack_vm = Vm::select_program(&unpack_program).unwrap();
    let decoded = unpack_vm.unpack_value(&out).unwrap();
    let hash = decoded.as_hash().unwrap();
    assert_eq!(hash.get("X").unwrap().coerce_i64().unwrap(), -3);
    assert_eq!(hash.get("Y").unwrap().coerce_i64().unwrap(), 12);
}

#[test]
fn array_of_records_round_trips_each_element_independently() {
    let element = point_element().with_array(3, false);
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let unpack_program = compile_program(&element, ProgramType::Unpack).unwrap();

    let points = vec![(1, 2), (3, 4), (5, 6)];
    let value = Value::array(
        points
            .iter()
            .map(|(x, y)| {
                let mut fields = IndexMap::new();
                fields.insert("X".to_string(), Value::scalar(Scalar::I32(*x)));
                fields.insert("Y".to_string(), Value::scalar(Scalar::I32(*y)));
                Value::hash(fields)
            })
            .collect(),
    );

    let mut pack_vm = Vm::select_program(&pack_program).unwrap();
    let mut out = vec![0u8; 64];
    pack_vm.pack_value(&value, &mut out).unwrap();
    let written = pack_vm.bytes_written();

    let mut unpack_vm = Vm::select_program(&unpack_program).unwrap();
    let decoded = unpack_vm.unpack_value(&out[..written]).unwrap();
    let items = decoded.as_array().unwrap();
    assert_eq!(items.len(), 3);
    for (item, (x, y)) in items.iter().zip(points.iter()) {
        let hash = item.as_hash().unwrap();
        assert_eq!(hash.get("X").unwrap().coerce_i64().unwrap(), *x);
        assert_eq!(hash.get("Y").unwrap().coerce_i64().unwrap(), *y);
    }
}

#[test]
fn record_pack_fails_when_a_declared_field_is_missing_from_the_value() {
    let element = point_element();
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let mut pack_vm = Vm::select_program(&pack_program).unwrap();

    let mut fields = IndexMap::new();
    fields.insert("X".to_string(), Value::scalar(Scalar::I32(1)));
    let value = Value::hash(fields);

    let mut out = [0u8; 4];
    let result = pack_vm.pack_value(&value, &mut out);
    assert!(result.is_err());
}

#[test]
fn nested_record_field_round_trips() {
    let element = DataElement::record(vec![
        Field {
            name: "Id".into(),
            element: DataElement::scalar(TypeCode::U8),
        },
        Field {
            name: "Position".into(),
            element: point_element(),
        },
    ]);
    let pack_program = compile_program(&element, ProgramType::Pack).unwrap();
    let unpack_program = compile_program(&element, ProgramType::Unpack).unwrap();

    let mut position = IndexMap::new();
    position.insert("X".to_string(), Value::scalar(Scalar::I32(7)));
    position.insert("Y".to_string(), Value::scalar(Scalar::I32(-7)));
    let mut fields = IndexMap::new();
    fields.insert("Id".to_string(), Value::scalar(Scalar::U32(9)));
    fields.insert("Position".to_string(), Value::hash(position));
    let value = Value::hash(fields);

    let mut pack_vm = Vm::select_program(&pack_program).unwrap();
    let mut out = [0u8; 5];
    pack_vm.pack_value(&value, &mut out).unwrap();

    let mut unpack_vm = Vm::select_program(&unpack_program).unwrap();
    let decoded = unpack_vm.unpack_value(&out).unwrap();
    let hash = decoded.as_hash().unwrap();
    assert_eq!(hash.get("Id").unwrap().coerce_i64().unwrap(), 9);
    let nested = hash.get("Position").unwrap().as_hash().unwrap();
    assert_eq!(nested.get("X").unwrap().coerce_i64().unwrap(), 7);
    assert_eq!(nested.get("Y").unwrap().coerce_i64().unwrap(), -7);
}
