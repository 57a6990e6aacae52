//! The shared value tree ("dtl_dv" in the reference system), spec §3/§9.
//!
//! `Value` is reference-counted and immutable once built: the codec never
//! mutates a value it did not itself create, so a `Value` handed in by a
//! caller can be packed without cloning its contents, and a `Value` built
//! by the deserializer can be handed back out and shared freely.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{ApxError, Result};

/// A scalar leaf of the value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Bool(bool),
    Char(char),
    Byte(u8),
    String(String),
    ByteArray(Vec<u8>),
}

/// A node of the value tree: absent, a scalar, an ordered array, or a
/// named-field hash (record).
#[derive(Debug, Clone, PartialEq)]
pub enum ValueInner {
    Null,
    Scalar(Scalar),
    Array(Vec<Value>),
    Hash(IndexMap<String, Value>),
}

/// Shared handle to a value-tree node. Cheap to clone (reference count
/// bump only); cycles are impossible because there is no way to construct
/// a `Value` that contains itself.
#[derive(Clone, PartialEq)]
pub struct Value(Rc<ValueInner>);

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Value {
    pub fn null() -> Value {
        Value(Rc::new(ValueInner::Null))
    }

    pub fn scalar(s: Scalar) -> Value {
        Value(Rc::new(ValueInner::Scalar(s)))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value(Rc::new(ValueInner::Array(items)))
    }

    pub fn hash(fields: IndexMap<String, Value>) -> Value {
        Value(Rc::new(ValueInner::Hash(fields)))
    }

    pub fn inner(&self) -> &ValueInner {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        matches!(*self.0, ValueInner::Null)
    }

    pub fn as_hash(&self) -> Result<&IndexMap<String, Value>> {
        match &*self.0 {
            ValueInner::Hash(h) => Ok(h),
            _ => Err(ApxError::ValueType {
                expected: "hash",
            }),
        }
    }

    pub fn as_array(&self) -> Result<&[Value]> {
        match &*self.0 {
            ValueInner::Array(a) => Ok(a),
            _ => Err(ApxError::ValueType { expected: "array" }),
        }
    }

    pub fn as_scalar(&self) -> Result<&Scalar> {
        match &*self.0 {
            ValueInner::Scalar(s) => Ok(s),
            _ => Err(ApxError::ValueType { expected: "scalar" }),
        }
    }

    /// Coerce to a signed 64-bit integer, widening or narrowing as needed.
    /// Used by both pack-side range checks and scalar packs.
    pub fn coerce_i64(&self) -> Result<i64> {
        match self.as_scalar()? {
            Scalar::I32(v) => Ok(*v as i64),
            Scalar::U32(v) => Ok(*v as i64),
            Scalar::I64(v) => Ok(*v),
            Scalar::U64(v) => i64::try_from(*v)
                .map_err(|_| ApxError::ValueConversion(format!("u64 {v} does not fit in i64"))),
            Scalar::Bool(v) => Ok(*v as i64),
            Scalar::Byte(v) => Ok(*v as i64),
            Scalar::Char(v) => Ok(*v as i64),
            other => Err(ApxError::ValueConversion(format!(
                "{other:?} is not numeric"
            ))),
        }
    }

    pub fn coerce_u64(&self) -> Result<u64> {
        match self.as_scalar()? {
            Scalar::I32(v) => u64::try_from(*v)
                .map_err(|_| ApxError::ValueConversion(format!("i32 {v} is negative"))),
            Scalar::U32(v) => Ok(*v as u64),
            Scalar::I64(v) => u64::try_from(*v)
                .map_err(|_| ApxError::ValueConversion(format!("i64 {v} is negative"))),
            Scalar::U64(v) => Ok(*v),
            Scalar::Bool(v) => Ok(*v as u64),
            Scalar::Byte(v) => Ok(*v as u64),
            Scalar::Char(v) => Ok(*v as u64),
            other => Err(ApxError::ValueConversion(format!(
                "{other:?} is not numeric"
            ))),
        }
    }

    pub fn coerce_string(&self) -> Result<&str> {
        match self.as_scalar()? {
            Scalar::String(s) => Ok(s.as_str()),
            other => Err(ApxError::ValueConversion(format!(
                "{other:?} is not a string"
            ))),
        }
    }

    pub fn coerce_bytearray(&self) -> Result<&[u8]> {
        match self.as_scalar()? {
            Scalar::ByteArray(b) => Ok(b.as_slice()),
            other => Err(ApxError::ValueConversion(format!(
                "{other:?} is not a byte array"
            ))),
        }
    }
}
