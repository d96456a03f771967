//! Record-level drivers: walk a resolved [`BoundTable`] in declared
//! column order and move whole structure instances through either codec.
//!
//! This is the data-driven counterpart of a generated per-schema
//! serializer: the binding table is resolved once per schema, and these
//! drivers dispatch on it per record. Layout is therefore identical
//! between encode and decode by construction.

use std::io::{Read, Write};

use log::trace;

use crate::bind::{BaseOp, Binding, BoundTable, Shape};
use crate::io::file::{FileReader, FileWriter};
use crate::io::packet::{PacketReader, PacketWriter};
use crate::io::{Error, FileIndex, Result};
use crate::value::{Field, Record, Value};

// --- file codec ---

/// Encodes a record as a framed structure (4-byte size prefix, exact
/// payload length).
pub fn write_record<W: Write>(
    w: &mut FileWriter<'_, W>,
    bound: &BoundTable,
    rec: &Record,
) -> Result<()> {
    let payload = fields_to_bytes(w.files(), bound, rec)?;
    w.write_frame(&payload)
}

/// Optional-framing variant: a 4-byte presence flag precedes the frame.
pub fn write_record_optional<W: Write>(
    w: &mut FileWriter<'_, W>,
    bound: &BoundTable,
    rec: Option<&Record>,
) -> Result<()> {
    w.write_presence(rec.is_some())?;
    match rec {
        Some(rec) => write_record(w, bound, rec),
        None => Ok(()),
    }
}

/// Decodes a framed record and verifies the frame consumed exactly its
/// declared byte count.
pub fn read_record<R: Read>(r: &mut FileReader<'_, R>, bound: &BoundTable) -> Result<Record> {
    let frame = r.begin_frame()?;
    let rec = read_fields(r, bound)?;
    r.end_frame(frame)?;
    Ok(rec)
}

/// Mirror of [`write_record_optional`].
pub fn read_record_optional<R: Read>(
    r: &mut FileReader<'_, R>,
    bound: &BoundTable,
) -> Result<Option<Record>> {
    if !r.read_presence()? {
        return Ok(None);
    }
    read_record(r, bound).map(Some)
}

/// Serializes the field sequence into a scoped buffer so the enclosing
/// frame can be size-prefixed without a seekable output.
fn fields_to_bytes(
    files: Option<&dyn FileIndex>,
    bound: &BoundTable,
    rec: &Record,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut nested = match files {
        Some(f) => FileWriter::with_files(&mut buf, f),
        None => FileWriter::new(&mut buf),
    };
    write_fields(&mut nested, bound, rec)?;
    drop(nested);
    Ok(buf)
}

fn write_fields<W: Write>(
    w: &mut FileWriter<'_, W>,
    bound: &BoundTable,
    rec: &Record,
) -> Result<()> {
    check_field_count(bound, rec)?;
    for (binding, field) in bound.bindings.iter().zip(&rec.fields) {
        trace!(
            "file write {}.{} ({})",
            bound.table.name,
            binding.name,
            binding.op_name()
        );
        write_field(w, binding, field)?;
    }
    Ok(())
}

fn check_field_count(bound: &BoundTable, rec: &Record) -> Result<()> {
    if rec.fields.len() != bound.bindings.len() {
        return Err(Error::Contract(format!(
            "record carries {} fields but table `{}` binds {}",
            rec.fields.len(),
            bound.table.name,
            bound.bindings.len()
        )));
    }
    Ok(())
}

fn write_field<W: Write>(w: &mut FileWriter<'_, W>, b: &Binding, field: &Field) -> Result<()> {
    match b.shape {
        Shape::Value => write_element(w, b, field.value()?),
        Shape::Array(count) => {
            let values = field.elements()?;
            if values.len() != count {
                return Err(Error::Contract(format!(
                    "array field `{}` carries {} elements, schema declares {count}",
                    b.name,
                    values.len()
                )));
            }
            // Fixed arrays write no count; the schema supplies it.
            for v in values {
                write_element(w, b, v)?;
            }
            Ok(())
        }
        Shape::List => {
            let values = field.elements()?;
            w.write_list_count(values.len())?;
            for v in values {
                write_element(w, b, v)?;
            }
            Ok(())
        }
    }
}

fn write_element<W: Write>(w: &mut FileWriter<'_, W>, b: &Binding, v: &Value) -> Result<()> {
    // Enum-flavored columns travel as their underlying integer at the
    // declared width; the runtime value is always Int32.
    if let Some(width) = b.enum_width {
        return w.write_value_enum(v.as_int32()?, width);
    }
    match b.op {
        BaseOp::Byte => w.write_value_byte(v.as_byte()?),
        BaseOp::Int16 => w.write_value_int16(v.as_int16()?),
        BaseOp::Int32 => w.write_value_int32(v.as_int32()?),
        BaseOp::Int64 => w.write_value_int64(v.as_int64()?),
        BaseOp::Float => w.write_value_float(v.as_float()?),
        BaseOp::Str => w.write_value_string(&v.as_str()?),
        BaseOp::CurrentFile => w.write_value_current_file(v.as_current_file()?),
        BaseOp::Boolean => w.write_value_boolean(v.as_bool()?),
        BaseOp::Flag => w.write_value_flag(v.as_flag()?),
        BaseOp::Bit => w.write_value_bit(v.as_bit()?),
        BaseOp::Multi => w.write_value_multival(v.as_multi()?),
        BaseOp::Structure => {
            let sub = required_sub(b)?;
            let rec = v.as_struct()?;
            if b.optional {
                w.write_presence(rec.is_some())?;
            }
            match rec {
                Some(rec) => {
                    let payload = fields_to_bytes(w.files(), sub, rec)?;
                    w.write_frame(&payload)
                }
                None if b.optional => Ok(()),
                None => Err(Error::Contract(format!(
                    "required structure field `{}` is empty",
                    b.name
                ))),
            }
        }
        BaseOp::Polymorph => {
            let value = v.as_poly()?;
            if b.optional {
                w.write_presence(value.is_some())?;
            }
            match value {
                Some((index, rec)) => {
                    w.write_type_index(index, b.variants.len())?;
                    let payload = fields_to_bytes(w.files(), &b.variants[index], rec)?;
                    w.write_frame(&payload)
                }
                None if b.optional => Ok(()),
                None => Err(Error::Contract(format!(
                    "required polymorph field `{}` is empty",
                    b.name
                ))),
            }
        }
    }
}

fn read_fields<R: Read>(r: &mut FileReader<'_, R>, bound: &BoundTable) -> Result<Record> {
    let mut fields = Vec::with_capacity(bound.bindings.len());
    for binding in &bound.bindings {
        fields.push(read_field(r, binding)?);
    }
    Ok(Record::new(bound.table.clone(), fields))
}

fn read_field<R: Read>(r: &mut FileReader<'_, R>, b: &Binding) -> Result<Field> {
    match b.shape {
        Shape::Value => Ok(Field::Value(read_element(r, b)?)),
        Shape::Array(count) => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(read_element(r, b)?);
            }
            Ok(Field::Array(values))
        }
        Shape::List => {
            let count = r.read_list_count()?;
            let mut values = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                values.push(read_element(r, b)?);
            }
            Ok(Field::List(values))
        }
    }
}

fn read_element<R: Read>(r: &mut FileReader<'_, R>, b: &Binding) -> Result<Value> {
    if let Some(width) = b.enum_width {
        return Ok(Value::Int32(r.read_value_enum(width)?));
    }
    Ok(match b.op {
        BaseOp::Byte => Value::Byte(r.read_value_byte()?),
        BaseOp::Int16 => Value::Int16(r.read_value_int16()?),
        BaseOp::Int32 => Value::Int32(r.read_value_int32()?),
        BaseOp::Int64 => Value::Int64(r.read_value_int64()?),
        BaseOp::Float => Value::Float(r.read_value_float()?),
        BaseOp::Str => Value::Str(r.read_value_string()?),
        BaseOp::CurrentFile => Value::CurrentFile(r.read_value_current_file()?),
        BaseOp::Boolean => Value::Bool(r.read_value_boolean()?),
        BaseOp::Flag => Value::Flag(r.read_value_flag()?),
        BaseOp::Bit => Value::Bit(r.read_value_bit()?),
        BaseOp::Multi => Value::Multi(r.read_value_multival()?),
        BaseOp::Structure => {
            let sub = required_sub(b)?;
            if b.optional && !r.read_presence()? {
                return Ok(Value::Struct(None));
            }
            let frame = r.begin_frame()?;
            let rec = read_fields(r, sub)?;
            r.end_frame(frame)?;
            Value::Struct(Some(rec))
        }
        BaseOp::Polymorph => {
            if b.optional && !r.read_presence()? {
                return Ok(Value::Poly(None));
            }
            let index = r.read_type_index(b.variants.len())?;
            let frame = r.begin_frame()?;
            let rec = read_fields(r, &b.variants[index])?;
            r.end_frame(frame)?;
            Value::Poly(Some((index, rec)))
        }
    })
}

fn required_sub(b: &Binding) -> Result<&BoundTable> {
    b.sub
        .as_deref()
        .ok_or_else(|| Error::Contract(format!("structure binding `{}` lost its subtable", b.name)))
}

// --- packet codec ---

/// Encodes a record in the sparse packet form: presence boolean, then
/// one (index, payload) entry per non-default visible field, then the
/// terminator. Default-valued fields are omitted entirely.
pub fn write_packet_record<W: Write>(
    w: &mut PacketWriter<W>,
    bound: &BoundTable,
    rec: &Record,
) -> Result<()> {
    write_packet_struct(w, bound, Some(rec), false)
}

/// Decodes a sparse packet record. Omitted fields keep their defaults;
/// an absent top-level structure decodes as an all-default record.
pub fn read_packet_record<R: Read>(
    r: &mut PacketReader<R>,
    bound: &BoundTable,
) -> Result<Record> {
    match read_packet_struct(r, bound, false)? {
        Some(rec) => Ok(rec),
        None => Ok(bound.default_record()),
    }
}

fn write_packet_struct<W: Write>(
    w: &mut PacketWriter<W>,
    bound: &BoundTable,
    rec: Option<&Record>,
    unknown: bool,
) -> Result<()> {
    w.write_bool(rec.is_some())?;
    let Some(rec) = rec else {
        return Ok(());
    };
    write_sparse_fields(w, bound, rec, unknown)
}

fn write_sparse_fields<W: Write>(
    w: &mut PacketWriter<W>,
    bound: &BoundTable,
    rec: &Record,
    unknown: bool,
) -> Result<()> {
    check_field_count(bound, rec)?;
    for (index, (binding, field)) in bound.bindings.iter().zip(&rec.fields).enumerate() {
        if let Some(scope) = binding.scope {
            // Fields outside this endpoint's view are never sent.
            if scope != w.role() {
                continue;
            }
        }
        if *field == binding.default_field() {
            continue;
        }
        trace!(
            "packet write {}.{} (index {index})",
            bound.table.name,
            binding.name
        );
        w.write_field_index(index)?;
        write_packet_field(w, binding, field, unknown)?;
    }
    w.write_field_terminator()
}

fn write_packet_field<W: Write>(
    w: &mut PacketWriter<W>,
    b: &Binding,
    field: &Field,
    unknown: bool,
) -> Result<()> {
    match b.shape {
        Shape::Value => write_packet_element(w, b, field.value()?, unknown),
        Shape::Array(count) => {
            let values = field.elements()?;
            if values.len() != count {
                return Err(Error::Contract(format!(
                    "array field `{}` carries {} elements, schema declares {count}",
                    b.name,
                    values.len()
                )));
            }
            for v in values {
                write_packet_element(w, b, v, unknown)?;
            }
            Ok(())
        }
        Shape::List => {
            let values = field.elements()?;
            w.write_list_header(values.len(), false)?;
            for v in values {
                write_packet_element(w, b, v, unknown)?;
            }
            Ok(())
        }
    }
}

fn write_packet_element<W: Write>(
    w: &mut PacketWriter<W>,
    b: &Binding,
    v: &Value,
    unknown: bool,
) -> Result<()> {
    if b.enum_width.is_some() {
        return w.write_packed_i32(v.as_int32()?);
    }
    match b.op {
        BaseOp::Byte => w.write_u32_field(v.as_byte()? as u32, unknown),
        BaseOp::Int16 => w.write_packed_i32(v.as_int16()? as i32),
        BaseOp::Int32 => w.write_packed_i32(v.as_int32()?),
        BaseOp::Int64 => w.write_packed_i64(v.as_int64()?),
        BaseOp::Float => w.write_float_field(v.as_float()?, unknown),
        BaseOp::Str => w.write_string_field(&v.as_str()?, unknown),
        // No file table travels with a packet; the name goes inline,
        // presence-prefixed so the absent reference stays one byte.
        BaseOp::CurrentFile => {
            w.write_string_field(v.as_current_file()?.unwrap_or(""), true)
        }
        BaseOp::Boolean => w.write_bool(v.as_bool()?),
        BaseOp::Flag => w.write_bool(v.as_flag()?),
        BaseOp::Bit => w.write_u32_field(v.as_bit()? & bit_mask(b.bit_width), unknown),
        BaseOp::Multi => w.write_multival(v.as_multi()?),
        BaseOp::Structure => {
            let sub = required_sub(b)?;
            write_packet_struct(w, sub, v.as_struct()?, unknown)
        }
        BaseOp::Polymorph => {
            let value = v.as_poly()?;
            w.write_bool(value.is_some())?;
            match value {
                Some((index, rec)) => {
                    w.write_type_index(index, b.variants.len())?;
                    write_sparse_fields(w, &b.variants[index], rec, unknown)
                }
                None => Ok(()),
            }
        }
    }
}

fn read_packet_struct<R: Read>(
    r: &mut PacketReader<R>,
    bound: &BoundTable,
    unknown: bool,
) -> Result<Option<Record>> {
    if !r.read_bool()? {
        return Ok(None);
    }
    read_sparse_fields(r, bound, unknown).map(Some)
}

fn read_sparse_fields<R: Read>(
    r: &mut PacketReader<R>,
    bound: &BoundTable,
    unknown: bool,
) -> Result<Record> {
    let mut rec = bound.default_record();
    while let Some(index) = r.read_field_index(bound.bindings.len())? {
        let binding = &bound.bindings[index];
        if let Some(scope) = binding.scope {
            if scope != r.role() {
                return Err(Error::ScopeViolation {
                    column: format!("{}.{}", bound.table.name, binding.name),
                    scope: scope.as_str(),
                    role: r.role().as_str(),
                });
            }
        }
        rec.fields[index] = read_packet_field(r, binding, unknown)?;
    }
    Ok(rec)
}

fn read_packet_field<R: Read>(
    r: &mut PacketReader<R>,
    b: &Binding,
    unknown: bool,
) -> Result<Field> {
    match b.shape {
        Shape::Value => Ok(Field::Value(read_packet_element(r, b, unknown)?)),
        Shape::Array(count) => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(read_packet_element(r, b, unknown)?);
            }
            Ok(Field::Array(values))
        }
        Shape::List => {
            let (count, list_unknown) = r.read_list_header()?;
            // The list's own flag is OR'd into the inherited context for
            // every element.
            let unknown = unknown || list_unknown;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(read_packet_element(r, b, unknown)?);
            }
            Ok(Field::List(values))
        }
    }
}

fn read_packet_element<R: Read>(
    r: &mut PacketReader<R>,
    b: &Binding,
    unknown: bool,
) -> Result<Value> {
    if b.enum_width.is_some() {
        return Ok(Value::Int32(r.read_packed_i32()?));
    }
    Ok(match b.op {
        BaseOp::Byte => Value::Byte(r.read_u32_field(unknown)? as u8),
        BaseOp::Int16 => Value::Int16(r.read_packed_i32()? as i16),
        BaseOp::Int32 => Value::Int32(r.read_packed_i32()?),
        BaseOp::Int64 => Value::Int64(r.read_packed_i64()?),
        BaseOp::Float => Value::Float(r.read_float_field(unknown)?),
        BaseOp::Str => Value::Str(r.read_string_field(unknown)?),
        BaseOp::CurrentFile => {
            let name = r.read_string_field(true)?;
            Value::CurrentFile(if name.is_empty() { None } else { Some(name) })
        }
        BaseOp::Boolean => Value::Bool(r.read_bool()?),
        BaseOp::Flag => Value::Flag(r.read_bool()?),
        BaseOp::Bit => Value::Bit(r.read_u32_field(unknown)? & bit_mask(b.bit_width)),
        BaseOp::Multi => Value::Multi(r.read_multival()?),
        BaseOp::Structure => {
            let sub = required_sub(b)?;
            Value::Struct(read_packet_struct(r, sub, unknown)?)
        }
        BaseOp::Polymorph => {
            if !r.read_bool()? {
                return Ok(Value::Poly(None));
            }
            let index = r.read_type_index(b.variants.len())?;
            let rec = read_sparse_fields(r, &b.variants[index], unknown)?;
            Value::Poly(Some((index, rec)))
        }
    })
}

/// Mask for a declared bit width; width 0 or ≥32 keeps all bits.
fn bit_mask(width: u8) -> u32 {
    if width == 0 || width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind;
    use crate::io::packet::Role;
    use crate::schema::{Column, ColumnFlags, Table, TypeToken};
    use std::io::Cursor;
    use std::rc::Rc;

    fn point_table() -> Rc<Table> {
        Table::new("Point")
            .column(Column::new("x", TypeToken::Float))
            .column(Column::new("y", TypeToken::Float))
            .into_rc()
    }

    fn point(x: f32, y: f32, table: &Rc<Table>) -> Record {
        Record::new(
            table.clone(),
            vec![
                Field::Value(Value::Float(x)),
                Field::Value(Value::Float(y)),
            ],
        )
    }

    #[test]
    fn file_record_roundtrip_with_nesting() {
        let point_tbl = point_table();
        let table = Table::new("Shape")
            .column(Column::new("id", TypeToken::Int32))
            .column(Column::new("origin", TypeToken::Structure).subtable(point_tbl.clone()))
            .column(
                Column::new("points", TypeToken::Structure)
                    .earray()
                    .subtable(point_tbl.clone()),
            )
            .column(
                Column::new("label", TypeToken::Structure)
                    .optional()
                    .subtable(point_tbl.clone()),
            )
            .into_rc();
        let bound = bind(&table).unwrap();

        let rec = Record::new(
            table.clone(),
            vec![
                Field::Value(Value::Int32(7)),
                Field::Value(Value::Struct(Some(point(1.0, 2.0, &point_tbl)))),
                Field::List(vec![
                    Value::Struct(Some(point(3.0, 4.0, &point_tbl))),
                    Value::Struct(Some(point(5.0, 6.0, &point_tbl))),
                ]),
                Field::Value(Value::Struct(None)),
            ],
        );

        let mut buf = Vec::new();
        {
            let mut w = FileWriter::new(&mut buf);
            write_record(&mut w, &bound, &rec).unwrap();
        }
        let mut r = FileReader::new(Cursor::new(buf));
        let decoded = read_record(&mut r, &bound).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn corrupting_the_frame_size_is_fatal() {
        let table = point_table();
        let bound = bind(&table).unwrap();
        let rec = point(1.0, 2.0, &table);

        let mut buf = Vec::new();
        {
            let mut w = FileWriter::new(&mut buf);
            write_record(&mut w, &bound, &rec).unwrap();
        }
        for delta in [-1i32, 1] {
            let mut corrupt = buf.clone();
            let size = u32::from_le_bytes(corrupt[..4].try_into().unwrap());
            corrupt[..4]
                .copy_from_slice(&(size.wrapping_add_signed(delta)).to_le_bytes());
            // One byte short trips the consumption check; one byte long
            // underruns the stream or trips it as well.
            let mut r = FileReader::new(Cursor::new(corrupt));
            let result = read_record(&mut r, &bound);
            assert!(matches!(
                result,
                Err(Error::FramingMismatch { .. }) | Err(Error::Io(_))
            ));
        }
    }

    #[test]
    fn fixed_array_length_is_enforced_on_write() {
        let table = Table::new("Arr")
            .column(Column::new("pos", TypeToken::Float).fixed_array(3))
            .into_rc();
        let bound = bind(&table).unwrap();
        let rec = Record::new(
            table.clone(),
            vec![Field::Array(vec![Value::Float(0.0); 2])],
        );
        let mut buf = Vec::new();
        let mut w = FileWriter::new(&mut buf);
        assert!(matches!(
            write_record(&mut w, &bound, &rec),
            Err(Error::Contract(_))
        ));
    }

    #[test]
    fn packet_roundtrip_and_sparse_omission() {
        let table = Table::new("Entity")
            .column(Column::new("a", TypeToken::Int32))
            .column(Column::new("b", TypeToken::Int32))
            .column(Column::new("c", TypeToken::Int32))
            .column(Column::new("d", TypeToken::Int32))
            .column(Column::new("e", TypeToken::Int32))
            .into_rc();
        let bound = bind(&table).unwrap();

        let mut rec = bound.default_record();
        rec.fields[2] = Field::Value(Value::Int32(41));

        let mut buf = Vec::new();
        write_packet_record(
            &mut PacketWriter::new(&mut buf, Role::Server),
            &bound,
            &rec,
        )
        .unwrap();

        // presence, (has-field, index 2, packed 41), terminator
        assert_eq!(buf, [1, 1, 2 << 2, 1, 0, 41 << 2, 0]);

        let mut r = PacketReader::new(Cursor::new(buf), Role::Server);
        let decoded = read_packet_record(&mut r, &bound).unwrap();
        assert_eq!(decoded, rec);
        assert_eq!(decoded.fields[0], Field::Value(Value::Int32(0)));
        assert_eq!(decoded.fields[4], Field::Value(Value::Int32(0)));
    }

    #[test]
    fn packet_scope_enforcement() {
        let table = Table::new("Scoped")
            .column(Column::new("shared", TypeToken::Int32))
            .column(
                Column::new("prediction", TypeToken::Int32)
                    .with_flags(ColumnFlags::CLIENT_ONLY),
            )
            .into_rc();
        let bound = bind(&table).unwrap();

        let mut rec = bound.default_record();
        rec.fields[1] = Field::Value(Value::Int32(5));

        let mut buf = Vec::new();
        write_packet_record(
            &mut PacketWriter::new(&mut buf, Role::Client),
            &bound,
            &rec,
        )
        .unwrap();

        // A client-configured reader accepts the field.
        let mut r = PacketReader::new(Cursor::new(buf.clone()), Role::Client);
        assert_eq!(read_packet_record(&mut r, &bound).unwrap(), rec);

        // A server-configured reader must reject it as a protocol
        // violation.
        let mut r = PacketReader::new(Cursor::new(buf), Role::Server);
        assert!(matches!(
            read_packet_record(&mut r, &bound),
            Err(Error::ScopeViolation { .. })
        ));
    }

    #[test]
    fn packet_writer_skips_fields_outside_its_role() {
        let table = Table::new("Scoped")
            .column(
                Column::new("server_secret", TypeToken::Int32)
                    .with_flags(ColumnFlags::SERVER_ONLY),
            )
            .into_rc();
        let bound = bind(&table).unwrap();
        let mut rec = bound.default_record();
        rec.fields[0] = Field::Value(Value::Int32(9));

        let mut buf = Vec::new();
        write_packet_record(
            &mut PacketWriter::new(&mut buf, Role::Client),
            &bound,
            &rec,
        )
        .unwrap();
        // presence + terminator only.
        assert_eq!(buf, [1, 0]);
    }

    #[test]
    fn packet_unknown_context_threads_into_list_elements() {
        let table = Table::new("L")
            .column(Column::new("vals", TypeToken::Byte).earray())
            .into_rc();
        let bound = bind(&table).unwrap();

        // Hand-crafted stream with the list's unknown flag set: each
        // element is presence-prefixed.
        let buf = vec![
            1,      // presence
            1,      // has field
            0 << 2, // field index 0
            0,      // indexed = false
            1, 0, 2 << 2, // packed count = 2 (present, positive, magnitude)
            1,      // unknown = true
            0,      // element 0: absent -> default
            1, 7 << 2, // element 1: present, packed 7
            0,      // terminator
        ];
        let mut r = PacketReader::new(Cursor::new(buf), Role::Server);
        let rec = read_packet_record(&mut r, &bound).unwrap();
        assert_eq!(
            rec.fields[0],
            Field::List(vec![Value::Byte(0), Value::Byte(7)])
        );
    }

    #[test]
    fn packet_polymorph_roundtrip() {
        let circle = Table::new("Circle")
            .column(Column::new("r", TypeToken::Float))
            .into_rc();
        let square = Table::new("Square")
            .column(Column::new("side", TypeToken::Float))
            .into_rc();
        let table = Table::new("Holder")
            .column(
                Column::new("shape", TypeToken::Polymorph)
                    .variant(circle)
                    .variant(square.clone()),
            )
            .into_rc();
        let bound = bind(&table).unwrap();

        let inner = Record::new(
            square.clone(),
            vec![Field::Value(Value::Float(4.0))],
        );
        let mut rec = bound.default_record();
        rec.fields[0] = Field::Value(Value::Poly(Some((1, inner))));

        let mut buf = Vec::new();
        write_packet_record(
            &mut PacketWriter::new(&mut buf, Role::Server),
            &bound,
            &rec,
        )
        .unwrap();
        let mut r = PacketReader::new(Cursor::new(buf), Role::Server);
        assert_eq!(read_packet_record(&mut r, &bound).unwrap(), rec);
    }
}
