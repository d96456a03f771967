use std::rc::Rc;

use bitflags::bitflags;
use indexmap::IndexMap;

/// The type token of a schema column.
///
/// The first group of tokens never reaches the wire: they exist only to
/// structure schema sources (parser directives, grouping markers) and are
/// skipped entirely during binding. Every other token maps to exactly one
/// family of codec operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeToken {
    /// Parser directive, no wire representation.
    Ignore,
    /// Group start marker, no wire representation.
    Start,
    /// Group end marker, no wire representation.
    End,
    /// Command/tool annotation, no wire representation.
    Command,

    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit IEEE float.
    Float,
    /// Length-prefixed string.
    String,
    /// A reference to another asset file, stored as an index into the
    /// container's file table rather than as an inline string.
    CurrentFile,
    /// Plain boolean. Not supported by the file codec in this format
    /// generation; the packet codec sends it as a single flag byte.
    Boolean,
    /// Boolean stored as a single 0/1 byte in both codecs.
    BooleanFlag,
    /// Bit-packed unsigned value. The file codec stores the full 32 bits;
    /// the declared width only matters to the packet codec.
    Bit,
    /// Tagged union used by the expression mini-language.
    MultiValue,
    /// Nested structure conforming to the column's subtable.
    Structure,
    /// Structure whose concrete table is chosen at runtime from the
    /// column's declared variant list.
    Polymorph,
}

impl TypeToken {
    /// Tokens that have no wire representation and are skipped by binding.
    pub fn is_wire(self) -> bool {
        !matches!(
            self,
            TypeToken::Ignore | TypeToken::Start | TypeToken::End | TypeToken::Command
        )
    }
}

bitflags! {
    /// Flag set carried by every schema column.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColumnFlags: u32 {
        /// Variable-length list; a count precedes the elements.
        const EARRAY        = 0x0001;
        /// Fixed-size array; the count comes from the schema, not the wire.
        const FIXED_ARRAY   = 0x0002;
        /// Optional/indirect field; framed with a presence flag.
        const INDIRECT      = 0x0004;
        /// Field only visible to client-role endpoints.
        const CLIENT_ONLY   = 0x0008;
        /// Field only visible to server-role endpoints.
        const SERVER_ONLY   = 0x0010;
        /// Never serialized.
        const NO_WRITE      = 0x0020;
        /// Alternate name for another column, never serialized.
        const ALIAS         = 0x0040;
        /// Legacy duplicate name, never serialized.
        const REDUNDANTNAME = 0x0080;
        /// Storage owned elsewhere, never serialized.
        const UNOWNED       = 0x0100;
    }
}

impl ColumnFlags {
    /// True if any exclusion flag removes the column from the wire.
    pub fn excluded(self) -> bool {
        self.intersects(
            ColumnFlags::NO_WRITE
                | ColumnFlags::ALIAS
                | ColumnFlags::REDUNDANTNAME
                | ColumnFlags::UNOWNED,
        )
    }
}

/// A named enumeration (static-define list) attached to integer columns.
///
/// The codecs always move the underlying integer; the define list exists
/// for diagnostics and tooling. Unknown numeric values pass through
/// undamaged in both directions.
#[derive(Debug, Clone, Default)]
pub struct StaticDefines {
    pub name: String,
    values: IndexMap<String, i32>,
}

impl StaticDefines {
    pub fn new(name: impl Into<String>) -> Self {
        StaticDefines {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    pub fn define(mut self, name: impl Into<String>, value: i32) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.values.get(name).copied()
    }

    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, &v)| v == value)
            .map(|(k, _)| k.as_str())
    }
}

/// One schema-declared field within a [`Table`].
///
/// A column's effective binary shape is fully determined by the tuple
/// (type token, array flag, optional flag, enum annotation); binding maps
/// that tuple to exactly one codec operation.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub token: TypeToken,
    pub flags: ColumnFlags,
    /// Element count for `FIXED_ARRAY` columns.
    pub count: usize,
    /// Declared bit width for `Bit` columns. Only the packet codec
    /// cares; the file codec always stores the full 32 bits.
    pub bit_width: u8,
    /// Subtable for `Structure` columns.
    pub subtable: Option<Rc<Table>>,
    /// Ordered valid concrete tables for `Polymorph` columns.
    pub variants: Vec<Rc<Table>>,
    /// Static-define annotation for enum-flavored integer columns.
    pub defines: Option<Rc<StaticDefines>>,
}

impl Column {
    pub fn new(name: impl Into<String>, token: TypeToken) -> Self {
        Column {
            name: name.into(),
            token,
            flags: ColumnFlags::empty(),
            count: 0,
            bit_width: 0,
            subtable: None,
            variants: Vec::new(),
            defines: None,
        }
    }

    pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Marks the column as a variable-length list.
    pub fn earray(mut self) -> Self {
        self.flags |= ColumnFlags::EARRAY;
        self
    }

    /// Marks the column as a fixed array of `count` elements.
    pub fn fixed_array(mut self, count: usize) -> Self {
        self.flags |= ColumnFlags::FIXED_ARRAY;
        self.count = count;
        self
    }

    /// Marks the column optional (presence-prefixed framing).
    pub fn optional(mut self) -> Self {
        self.flags |= ColumnFlags::INDIRECT;
        self
    }

    pub fn bit_width(mut self, width: u8) -> Self {
        self.bit_width = width;
        self
    }

    pub fn subtable(mut self, table: Rc<Table>) -> Self {
        self.subtable = Some(table);
        self
    }

    pub fn variant(mut self, table: Rc<Table>) -> Self {
        self.variants.push(table);
        self
    }

    pub fn defines(mut self, defines: Rc<StaticDefines>) -> Self {
        self.defines = Some(defines);
        self
    }
}

/// An ordered sequence of columns defining a structure's binary layout.
///
/// Column order is the authoritative field order for both the file and
/// packet encodings and is never reordered between encode and decode.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn into_rc(self) -> Rc<Table> {
        Rc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tokens() {
        assert!(!TypeToken::Ignore.is_wire());
        assert!(!TypeToken::Command.is_wire());
        assert!(TypeToken::Byte.is_wire());
        assert!(TypeToken::Polymorph.is_wire());
    }

    #[test]
    fn exclusion_flags() {
        assert!(ColumnFlags::ALIAS.excluded());
        assert!(ColumnFlags::NO_WRITE.excluded());
        assert!((ColumnFlags::EARRAY | ColumnFlags::CLIENT_ONLY).excluded() == false);
    }

    #[test]
    fn defines_lookup() {
        let defs = StaticDefines::new("DamageType")
            .define("None", 0)
            .define("Fire", 1)
            .define("Cold", 2);
        assert_eq!(defs.value_of("Fire"), Some(1));
        assert_eq!(defs.name_of(2), Some("Cold"));
        assert_eq!(defs.name_of(9), None);
    }
}
