//! Schema-to-codec binding.
//!
//! Binding walks a table once and resolves, for every column that has a
//! wire representation, which codec operation applies: shape
//! (value/array/list), base operation from the type token, an enum
//! annotation, and recursive bindings for subtables and polymorph
//! variants. The resolved [`BoundTable`] is the authoritative layout
//! contract: encode and decode both walk it in declared column order,
//! and packet field indices address its binding list.

use std::rc::Rc;

use crate::io::file::EnumWidth;
use crate::io::packet::Role;
use crate::io::{Error, Result};
use crate::multival::MultiValue;
use crate::schema::{Column, ColumnFlags, Table, TypeToken};
use crate::value::{Field, Record, Value};

/// Field shape resolved from the array flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Value,
    /// Fixed count from the schema; nothing is written to the stream.
    Array(usize),
    /// Variable count, length-prefixed on the wire.
    List,
}

/// Base codec operation resolved from the type token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseOp {
    Byte,
    Int16,
    Int32,
    Int64,
    Float,
    Str,
    CurrentFile,
    Boolean,
    Flag,
    Bit,
    Multi,
    Structure,
    Polymorph,
}

impl BaseOp {
    fn name(self) -> &'static str {
        match self {
            BaseOp::Byte => "Byte",
            BaseOp::Int16 => "Int16",
            BaseOp::Int32 => "Int32",
            BaseOp::Int64 => "Int64",
            BaseOp::Float => "Float",
            BaseOp::Str => "String",
            BaseOp::CurrentFile => "CurrentFile",
            BaseOp::Boolean => "Boolean",
            BaseOp::Flag => "BooleanFlag",
            BaseOp::Bit => "Bit",
            BaseOp::Multi => "MultiVal",
            BaseOp::Structure => "Structure",
            BaseOp::Polymorph => "Polymorph",
        }
    }
}

/// One resolved codec operation for one serializable column.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Index of the column in the source table (skipped columns keep
    /// their gaps).
    pub column: usize,
    pub name: String,
    pub shape: Shape,
    pub op: BaseOp,
    /// Presence-prefixed framing for structure/polymorph columns.
    pub optional: bool,
    /// Set for enum-flavored integer columns; the wire carries the
    /// underlying integer at this width.
    pub enum_width: Option<EnumWidth>,
    /// Declared bit width for `Bit` columns (packet codec only).
    pub bit_width: u8,
    /// Role restriction from CLIENT_ONLY/SERVER_ONLY.
    pub scope: Option<Role>,
    /// Resolved subtable for structure columns.
    pub sub: Option<Rc<BoundTable>>,
    /// Resolved variant tables for polymorph columns, in declared order.
    pub variants: Vec<Rc<BoundTable>>,
}

impl Binding {
    /// Diagnostic operation name: shape, base token, enum suffix.
    /// `ListInt32Enum` reads as "length-prefixed list of int32 enums".
    pub fn op_name(&self) -> String {
        let shape = match self.shape {
            Shape::Value => "Value",
            Shape::Array(_) => "Array",
            Shape::List => "List",
        };
        let suffix = if self.enum_width.is_some() { "Enum" } else { "" };
        format!("{shape}{}{suffix}", self.op.name())
    }

    /// Default value for one element of this binding.
    pub fn default_value(&self) -> Value {
        match self.op {
            BaseOp::Byte => Value::Byte(0),
            BaseOp::Int16 => Value::Int16(0),
            BaseOp::Int32 => Value::Int32(0),
            BaseOp::Int64 => Value::Int64(0),
            BaseOp::Float => Value::Float(0.0),
            BaseOp::Str => Value::Str(String::new()),
            BaseOp::CurrentFile => Value::CurrentFile(None),
            BaseOp::Boolean => Value::Bool(false),
            BaseOp::Flag => Value::Flag(false),
            BaseOp::Bit => Value::Bit(0),
            BaseOp::Multi => Value::Multi(MultiValue::default()),
            BaseOp::Structure => Value::Struct(None),
            BaseOp::Polymorph => Value::Poly(None),
        }
    }

    /// Default field slot: default value, default-filled array, or
    /// empty list.
    pub fn default_field(&self) -> Field {
        match self.shape {
            Shape::Value => {
                let v = if self.enum_width.is_some() {
                    Value::Int32(0)
                } else {
                    self.default_value()
                };
                Field::Value(v)
            }
            Shape::Array(count) => {
                let v = if self.enum_width.is_some() {
                    Value::Int32(0)
                } else {
                    self.default_value()
                };
                Field::Array(vec![v; count])
            }
            Shape::List => Field::List(Vec::new()),
        }
    }
}

/// A table with its resolved bindings; the unit both record drivers
/// operate on.
#[derive(Debug)]
pub struct BoundTable {
    pub table: Rc<Table>,
    pub bindings: Vec<Binding>,
}

impl BoundTable {
    /// Binding-list index of a column name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name == name)
    }

    /// A record of this table with every field at its default.
    pub fn default_record(&self) -> Record {
        Record::new(
            self.table.clone(),
            self.bindings.iter().map(Binding::default_field).collect(),
        )
    }
}

/// Resolves a table into its ordered binding list.
///
/// Columns excluded by flags (ALIAS/UNOWNED/NO_WRITE/REDUNDANTNAME) and
/// non-wire tokens (Ignore/Start/End/Command) are skipped entirely; they
/// have no wire representation. Resolution is deterministic, so encode
/// and decode paths always agree on layout.
pub fn bind(table: &Rc<Table>) -> Result<Rc<BoundTable>> {
    let mut bindings = Vec::new();

    for (index, column) in table.columns.iter().enumerate() {
        if !column.token.is_wire() || column.flags.excluded() {
            continue;
        }
        bindings.push(bind_column(table, index, column)?);
    }

    Ok(Rc::new(BoundTable {
        table: table.clone(),
        bindings,
    }))
}

fn bind_column(table: &Table, index: usize, column: &Column) -> Result<Binding> {
    let contract = |msg: String| Error::Contract(format!("{}.{}: {msg}", table.name, column.name));

    let shape = match (
        column.flags.contains(ColumnFlags::EARRAY),
        column.flags.contains(ColumnFlags::FIXED_ARRAY),
    ) {
        (true, true) => {
            return Err(contract("EARRAY and FIXED_ARRAY are mutually exclusive".into()))
        }
        (true, false) => Shape::List,
        (false, true) => {
            if column.count == 0 {
                return Err(contract("FIXED_ARRAY requires a nonzero element count".into()));
            }
            Shape::Array(column.count)
        }
        (false, false) => Shape::Value,
    };

    let op = match column.token {
        TypeToken::Byte => BaseOp::Byte,
        TypeToken::Int16 => BaseOp::Int16,
        TypeToken::Int32 => BaseOp::Int32,
        TypeToken::Int64 => BaseOp::Int64,
        TypeToken::Float => BaseOp::Float,
        TypeToken::String => BaseOp::Str,
        TypeToken::CurrentFile => BaseOp::CurrentFile,
        TypeToken::Boolean => BaseOp::Boolean,
        TypeToken::BooleanFlag => BaseOp::Flag,
        TypeToken::Bit => BaseOp::Bit,
        TypeToken::MultiValue => BaseOp::Multi,
        TypeToken::Structure => BaseOp::Structure,
        TypeToken::Polymorph => BaseOp::Polymorph,
        // Non-wire tokens were filtered by the caller.
        other => return Err(contract(format!("token {other:?} has no codec operation"))),
    };

    let enum_width = if column.defines.is_some() {
        Some(match op {
            BaseOp::Byte => EnumWidth::Byte,
            BaseOp::Int16 => EnumWidth::Int16,
            BaseOp::Int32 => EnumWidth::Int32,
            BaseOp::Bit => EnumWidth::Bit,
            _ => {
                return Err(contract(format!(
                    "static-define list on non-integer token {:?}",
                    column.token
                )))
            }
        })
    } else {
        None
    };

    let optional = column.flags.contains(ColumnFlags::INDIRECT);
    if optional && !matches!(op, BaseOp::Structure | BaseOp::Polymorph) {
        return Err(contract("INDIRECT is only valid on structure columns".into()));
    }

    let scope = match (
        column.flags.contains(ColumnFlags::CLIENT_ONLY),
        column.flags.contains(ColumnFlags::SERVER_ONLY),
    ) {
        (true, true) => {
            return Err(contract("CLIENT_ONLY and SERVER_ONLY are mutually exclusive".into()))
        }
        (true, false) => Some(Role::Client),
        (false, true) => Some(Role::Server),
        (false, false) => None,
    };

    let sub = match op {
        BaseOp::Structure => {
            let subtable = column
                .subtable
                .as_ref()
                .ok_or_else(|| contract("structure column without a subtable".into()))?;
            Some(bind(subtable)?)
        }
        _ => None,
    };

    let variants = match op {
        BaseOp::Polymorph => {
            if column.variants.is_empty() {
                return Err(contract("polymorph column without declared variants".into()));
            }
            column
                .variants
                .iter()
                .map(bind)
                .collect::<Result<Vec<_>>>()?
        }
        _ => Vec::new(),
    };

    Ok(Binding {
        column: index,
        name: column.name.clone(),
        shape,
        op,
        optional,
        enum_width,
        bit_width: column.bit_width,
        scope,
        sub,
        variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StaticDefines;

    fn leaf_table() -> Rc<Table> {
        Table::new("Leaf")
            .column(Column::new("id", TypeToken::Int32))
            .column(Column::new("tag", TypeToken::String))
            .into_rc()
    }

    #[test]
    fn skips_excluded_and_nonwire_columns() {
        let table = Table::new("Thing")
            .column(Column::new("hdr", TypeToken::Start))
            .column(Column::new("id", TypeToken::Int32))
            .column(
                Column::new("legacy", TypeToken::Int32).with_flags(ColumnFlags::REDUNDANTNAME),
            )
            .column(Column::new("scratch", TypeToken::Float).with_flags(ColumnFlags::NO_WRITE))
            .column(Column::new("name", TypeToken::String))
            .column(Column::new("end", TypeToken::End))
            .into_rc();

        let bound = bind(&table).unwrap();
        let names: Vec<_> = bound.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["id", "name"]);
        // Source column indices keep their gaps.
        assert_eq!(bound.bindings[0].column, 1);
        assert_eq!(bound.bindings[1].column, 4);
    }

    #[test]
    fn op_names_follow_shape_token_enum() {
        let defines = Rc::new(StaticDefines::new("Kind").define("A", 0).define("B", 1));
        let table = Table::new("Ops")
            .column(Column::new("a", TypeToken::Int32))
            .column(Column::new("b", TypeToken::Float).fixed_array(3))
            .column(Column::new("c", TypeToken::Int32).earray().defines(defines))
            .column(Column::new("d", TypeToken::Structure).subtable(leaf_table()))
            .into_rc();

        let bound = bind(&table).unwrap();
        let names: Vec<_> = bound.bindings.iter().map(Binding::op_name).collect();
        assert_eq!(
            names,
            ["ValueInt32", "ArrayFloat", "ListInt32Enum", "ValueStructure"]
        );
    }

    #[test]
    fn conflicting_flags_are_contract_errors() {
        let table = Table::new("Bad")
            .column(
                Column::new("x", TypeToken::Int32)
                    .earray()
                    .fixed_array(2),
            )
            .into_rc();
        assert!(matches!(bind(&table), Err(Error::Contract(_))));

        let table = Table::new("Bad")
            .column(
                Column::new("x", TypeToken::Int32)
                    .with_flags(ColumnFlags::CLIENT_ONLY | ColumnFlags::SERVER_ONLY),
            )
            .into_rc();
        assert!(matches!(bind(&table), Err(Error::Contract(_))));
    }

    #[test]
    fn structure_requires_subtable_and_polymorph_requires_variants() {
        let table = Table::new("Bad")
            .column(Column::new("s", TypeToken::Structure))
            .into_rc();
        assert!(matches!(bind(&table), Err(Error::Contract(_))));

        let table = Table::new("Bad")
            .column(Column::new("p", TypeToken::Polymorph))
            .into_rc();
        assert!(matches!(bind(&table), Err(Error::Contract(_))));
    }

    #[test]
    fn optional_is_structure_only() {
        let table = Table::new("Bad")
            .column(Column::new("x", TypeToken::Int32).optional())
            .into_rc();
        assert!(matches!(bind(&table), Err(Error::Contract(_))));

        let table = Table::new("Ok")
            .column(Column::new("s", TypeToken::Structure).optional().subtable(leaf_table()))
            .into_rc();
        assert!(bind(&table).unwrap().bindings[0].optional);
    }

    #[test]
    fn default_record_matches_bindings() {
        let table = Table::new("Defaults")
            .column(Column::new("n", TypeToken::Int32))
            .column(Column::new("pos", TypeToken::Float).fixed_array(3))
            .column(Column::new("tags", TypeToken::String).earray())
            .column(Column::new("child", TypeToken::Structure).optional().subtable(leaf_table()))
            .into_rc();

        let bound = bind(&table).unwrap();
        let rec = bound.default_record();
        assert_eq!(rec.fields.len(), 4);
        assert_eq!(rec.fields[0], Field::Value(Value::Int32(0)));
        assert_eq!(
            rec.fields[1],
            Field::Array(vec![Value::Float(0.0); 3])
        );
        assert_eq!(rec.fields[2], Field::List(Vec::new()));
        assert_eq!(rec.fields[3], Field::Value(Value::Struct(None)));
    }

    #[test]
    fn field_index_lookup() {
        let bound = bind(&leaf_table()).unwrap();
        assert_eq!(bound.field_index("tag"), Some(1));
        assert_eq!(bound.field_index("nope"), None);
    }
}
