//! Runtime value model for decoded structure instances.
//!
//! A [`Record`] is an opaque decoded object conforming to some schema
//! table: it carries no schema metadata itself, only an ordered field
//! vector aligned with the table's serializable columns. The schema is
//! external and supplied by the caller or the binding layer.

use std::rc::Rc;

use crate::io::{Error, Result};
use crate::multival::MultiValue;
use crate::schema::Table;

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Str(String),
    /// File reference, resolved through the container's file table.
    /// `None` is the absent reference (index -1 on the wire).
    CurrentFile(Option<String>),
    Bool(bool),
    /// Boolean stored as a flag byte.
    Flag(bool),
    /// Bit-packed value; the file codec stores all 32 bits.
    Bit(u32),
    Multi(MultiValue),
    /// Nested structure; `None` for an absent optional.
    Struct(Option<Record>),
    /// Polymorphic structure: variant index plus the instance.
    Poly(Option<(usize, Record)>),
}

macro_rules! impl_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> Result<$ty> {
            match self {
                Value::$variant(v) => Ok(v.clone()),
                other => Err(Error::Contract(format!(
                    concat!("expected ", stringify!($variant), " value, got {:?}"),
                    other.kind_name()
                ))),
            }
        }
    };
}

impl Value {
    impl_accessor!(as_byte, Byte, u8);
    impl_accessor!(as_int16, Int16, i16);
    impl_accessor!(as_int32, Int32, i32);
    impl_accessor!(as_int64, Int64, i64);
    impl_accessor!(as_float, Float, f32);
    impl_accessor!(as_str, Str, String);
    impl_accessor!(as_bool, Bool, bool);
    impl_accessor!(as_flag, Flag, bool);
    impl_accessor!(as_bit, Bit, u32);

    pub fn as_current_file(&self) -> Result<Option<&str>> {
        match self {
            Value::CurrentFile(v) => Ok(v.as_deref()),
            other => Err(Error::Contract(format!(
                "expected CurrentFile value, got {:?}",
                other.kind_name()
            ))),
        }
    }

    pub fn as_multi(&self) -> Result<&MultiValue> {
        match self {
            Value::Multi(v) => Ok(v),
            other => Err(Error::Contract(format!(
                "expected MultiValue value, got {:?}",
                other.kind_name()
            ))),
        }
    }

    pub fn as_struct(&self) -> Result<Option<&Record>> {
        match self {
            Value::Struct(v) => Ok(v.as_ref()),
            other => Err(Error::Contract(format!(
                "expected Structure value, got {:?}",
                other.kind_name()
            ))),
        }
    }

    pub fn as_poly(&self) -> Result<Option<(usize, &Record)>> {
        match self {
            Value::Poly(v) => Ok(v.as_ref().map(|(i, r)| (*i, r))),
            other => Err(Error::Contract(format!(
                "expected Polymorph value, got {:?}",
                other.kind_name()
            ))),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Value::Byte(_) => "Byte",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::CurrentFile(_) => "CurrentFile",
            Value::Bool(_) => "Bool",
            Value::Flag(_) => "Flag",
            Value::Bit(_) => "Bit",
            Value::Multi(_) => "Multi",
            Value::Struct(_) => "Struct",
            Value::Poly(_) => "Poly",
        }
    }
}

/// One field slot of a record: single value, fixed array, or list.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    Array(Vec<Value>),
    List(Vec<Value>),
}

impl Field {
    pub fn value(&self) -> Result<&Value> {
        match self {
            Field::Value(v) => Ok(v),
            _ => Err(Error::Contract("expected single-value field".into())),
        }
    }

    pub fn elements(&self) -> Result<&[Value]> {
        match self {
            Field::Array(v) | Field::List(v) => Ok(v),
            _ => Err(Error::Contract("expected array or list field".into())),
        }
    }
}

/// A decoded structure instance conforming to one table.
///
/// Fields are stored in the order of the table's serializable columns;
/// columns excluded by flags occupy no slot.
#[derive(Debug, Clone)]
pub struct Record {
    pub table: Rc<Table>,
    pub fields: Vec<Field>,
}

impl Record {
    pub fn new(table: Rc<Table>, fields: Vec<Field>) -> Record {
        Record { table, fields }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.table, &other.table) && self.fields == other.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_contract_errors() {
        let v = Value::Int32(7);
        assert_eq!(v.as_int32().unwrap(), 7);
        assert!(matches!(v.as_str(), Err(Error::Contract(_))));
        assert!(matches!(v.as_struct(), Err(Error::Contract(_))));
    }

    #[test]
    fn field_shapes() {
        let f = Field::List(vec![Value::Byte(1), Value::Byte(2)]);
        assert_eq!(f.elements().unwrap().len(), 2);
        assert!(f.value().is_err());
    }
}
