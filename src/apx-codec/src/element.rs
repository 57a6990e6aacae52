//! The resolved data-element tree (spec §3) that the Compiler consumes.
//! Produced, in the real system, by the (out-of-scope) AST/typedef-
//! resolution layer; here it is the Compiler's sole public input type.

use crate::error::{ApxError, Result};
use crate::type_code::TypeCode;
use crate::value::Value;

/// Optional integer range limits carried by a scalar element (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeLimit {
    Signed { lo: i64, hi: i64 },
    Unsigned { lo: u64, hi: u64 },
}

/// Array/queue/dynamic attributes that may decorate any element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementAttributes {
    /// Array length. `0` means "not an array".
    pub array_len: u32,
    /// When set, `array_len` is the *maximum* length and the actual
    /// length is carried inline at pack/unpack time.
    pub dynamic: bool,
    /// Queue length. Only valid at the top level of a port.
    pub queue_len: u32,
}

impl ElementAttributes {
    pub fn is_array(&self) -> bool {
        self.array_len > 0
    }

    pub fn is_queued(&self) -> bool {
        self.queue_len > 0
    }

    /// Validates the invariant from spec §3: dynamic-array and queued
    /// cannot both be set on the same element.
    pub fn validate(&self) -> Result<()> {
        if self.dynamic && self.is_queued() {
            return Err(ApxError::InvalidArgument(
                "an element cannot be both a dynamic array and queued".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named field of a record element.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub element: DataElement,
}

/// The resolved (typedefs inlined) data-element tree. Recursive: either a
/// scalar of some type code, or a record of ordered named fields.
#[derive(Debug, Clone, PartialEq)]
pub enum DataElement {
    Scalar {
        type_code: TypeCode,
        attributes: ElementAttributes,
        range: Option<RangeLimit>,
    },
    Record {
        fields: Vec<Field>,
        attributes: ElementAttributes,
    },
}

impl DataElement {
    pub fn scalar(type_code: TypeCode) -> DataElement {
        DataElement::Scalar {
            type_code,
            attributes: ElementAttributes::default(),
            range: None,
        }
    }

    pub fn with_array(mut self, array_len: u32, dynamic: bool) -> DataElement {
        self.attributes_mut().array_len = array_len;
        self.attributes_mut().dynamic = dynamic;
        self
    }

    pub fn with_queue(mut self, queue_len: u32) -> DataElement {
        self.attributes_mut().queue_len = queue_len;
        self
    }

    pub fn with_range(mut self, range: RangeLimit) -> DataElement {
        if let DataElement::Scalar { range: r, .. } = &mut self {
            *r = Some(range);
        }
        self
    }

    pub fn record(fields: Vec<Field>) -> DataElement {
        DataElement::Record {
            fields,
            attributes: ElementAttributes::default(),
        }
    }

    pub fn attributes(&self) -> &ElementAttributes {
        match self {
            DataElement::Scalar { attributes, .. } => attributes,
            DataElement::Record { attributes, .. } => attributes,
        }
    }

    fn attributes_mut(&mut self) -> &mut ElementAttributes {
        match self {
            DataElement::Scalar { attributes, .. } => attributes,
            DataElement::Record { attributes, .. } => attributes,
        }
    }

    pub fn type_code(&self) -> TypeCode {
        match self {
            DataElement::Scalar { type_code, .. } => *type_code,
            DataElement::Record { .. } => TypeCode::Record,
        }
    }

    /// Whether this element, or any element nested within it, is a
    /// dynamic array (spec §3 header "dynamic-data flag").
    pub fn has_dynamic_data(&self) -> bool {
        if self.attributes().dynamic {
            return true;
        }
        match self {
            DataElement::Record { fields, .. } => {
                fields.iter().any(|f| f.element.has_dynamic_data())
            }
            DataElement::Scalar { .. } => false,
        }
    }

    /// Validates the element tree recursively (array/queue/dynamic
    /// invariants from spec §3).
    pub fn validate(&self) -> Result<()> {
        self.attributes().validate()?;
        if let DataElement::Record { fields, .. } = self {
            for field in fields {
                field.element.validate()?;
            }
        }
        Ok(())
    }

    /// Produces the init value this element should pack when no explicit
    /// initializer was supplied by the AST/attribute layer: zeroed
    /// scalars, empty strings/bytearrays, zero-filled arrays, and
    /// recursively-defaulted records.
    pub fn default_value(&self) -> Value {
        use crate::type_code::TypeCode as T;
        use crate::value::Scalar;

        match self {
            DataElement::Scalar {
                type_code,
                attributes,
                ..
            } => {
                if attributes.is_array() {
                    match type_code {
                        T::Char | T::Char8 => Value::scalar(Scalar::String(String::new())),
                        T::Byte => Value::scalar(Scalar::ByteArray(Vec::new())),
                        _ => Value::array(
                            (0..attributes.array_len)
                                .map(|_| default_scalar(*type_code))
                                .collect(),
                        ),
                    }
                } else {
                    default_scalar(*type_code)
                }
            }
            DataElement::Record { fields, attributes } => {
                let record = |fields: &[Field]| {
                    let mut map = indexmap::IndexMap::new();
                    for f in fields {
                        map.insert(f.name.clone(), f.element.default_value());
                    }
                    Value::hash(map)
                };
                if attributes.is_array() {
                    Value::array(
                        (0..attributes.array_len)
                            .map(|_| record(fields))
                            .collect(),
                    )
                } else {
                    record(fields)
                }
            }
        }
    }
}

fn default_scalar(type_code: TypeCode) -> Value {
    use crate::type_code::TypeCode as T;
    use crate::value::Scalar;

    Value::scalar(match type_code {
        T::U8 | T::U16 | T::U32 => Scalar::U32(0),
        T::U64 => Scalar::U64(0),
        T::I8 | T::I16 | T::I32 => Scalar::I32(0),
        T::I64 => Scalar::I64(0),
        T::Bool => Scalar::Bool(false),
        T::Byte => Scalar::Byte(0),
        T::Char | T::Char8 => Scalar::Char('\0'),
        T::Char16 | T::Char32 => Scalar::Char('\0'),
        T::Record => unreachable!("record has no scalar default"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_and_queued_together_is_invalid() {
        let attrs = ElementAttributes {
            array_len: 4,
            dynamic: true,
            queue_len: 2,
        };
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn has_dynamic_data_is_recursive() {
        let inner = DataElement::scalar(TypeCode::U8).with_array(10, true);
        let outer = DataElement::record(vec![Field {
            name: "a".into(),
            element: inner,
        }]);
        assert!(outer.has_dynamic_data());
    }
}
