//! The file codec: length-prefixed little-endian encoding used inside
//! blob containers.
//!
//! [`FileWriter`] and [`FileReader`] expose one operation per field kind;
//! the binding layer drives them in schema column order. Structure
//! framing is size-prefixed and self-checking: the reader verifies that
//! decoding a frame consumed exactly the declared byte count, which is
//! the core defense against schema drift between producer and consumer.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use log::trace;

use crate::io::primitives::{CountingReader, ReadPrimitives, WritePrimitives};
use crate::io::{Error, FileIndex, Result, MAX_FILE_LIST_LEN};
use crate::multival::{MultiValue, Opcode, Payload};

/// Integer width used for enum-flavored columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumWidth {
    Byte,
    Int16,
    Int32,
    /// Bit columns store a full unsigned 32-bit value in this codec.
    Bit,
}

/// Writer half of the file codec.
///
/// The optional [`FileIndex`] resolver is only needed when the schema
/// contains `CurrentFile` columns.
pub struct FileWriter<'a, W: Write> {
    w: W,
    files: Option<&'a dyn FileIndex>,
}

impl<'a, W: Write> FileWriter<'a, W> {
    pub fn new(w: W) -> FileWriter<'a, W> {
        FileWriter { w, files: None }
    }

    pub fn with_files(w: W, files: &'a dyn FileIndex) -> FileWriter<'a, W> {
        FileWriter {
            w,
            files: Some(files),
        }
    }

    pub(crate) fn files(&self) -> Option<&'a dyn FileIndex> {
        self.files
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    pub fn write_value_byte(&mut self, v: u8) -> Result<()> {
        self.w.write_u8(v)?;
        Ok(())
    }

    pub fn write_value_int16(&mut self, v: i16) -> Result<()> {
        self.w.write_i16::<LE>(v)?;
        Ok(())
    }

    pub fn write_value_int32(&mut self, v: i32) -> Result<()> {
        self.w.write_i32::<LE>(v)?;
        Ok(())
    }

    pub fn write_value_int64(&mut self, v: i64) -> Result<()> {
        self.w.write_i64::<LE>(v)?;
        Ok(())
    }

    pub fn write_value_float(&mut self, v: f32) -> Result<()> {
        self.w.write_f32::<LE>(v)?;
        Ok(())
    }

    pub fn write_value_string(&mut self, v: &str) -> Result<()> {
        self.w.write_pascal_string(v)
    }

    /// Booleans in flag form are a single 0/1 byte.
    pub fn write_value_flag(&mut self, v: bool) -> Result<()> {
        self.w.write_bool_byte(v)
    }

    /// Plain booleans have no file encoding in this codec generation.
    pub fn write_value_boolean(&mut self, _v: bool) -> Result<()> {
        Err(Error::Unsupported("Boolean value in file codec"))
    }

    /// Bit columns store the full 32-bit value regardless of declared
    /// width.
    pub fn write_value_bit(&mut self, v: u32) -> Result<()> {
        self.w.write_u32::<LE>(v)?;
        Ok(())
    }

    pub fn write_value_enum(&mut self, v: i32, width: EnumWidth) -> Result<()> {
        match width {
            EnumWidth::Byte => self.w.write_u8(v as u8)?,
            EnumWidth::Int16 => self.w.write_i16::<LE>(v as i16)?,
            EnumWidth::Int32 => self.w.write_i32::<LE>(v)?,
            EnumWidth::Bit => self.w.write_u32::<LE>(v as u32)?,
        }
        Ok(())
    }

    /// Resolves the file name against the container table and stores the
    /// index; `None` stores -1.
    pub fn write_value_current_file(&mut self, v: Option<&str>) -> Result<()> {
        let index = match v {
            None => -1,
            Some(name) => {
                let files = self.files.ok_or(Error::NoFileTable)?;
                files
                    .index_of(name)
                    .ok_or_else(|| Error::FileNameUnresolved(name.to_owned()))?
            }
        };
        self.w.write_i32::<LE>(index)?;
        Ok(())
    }

    pub fn write_value_multival(&mut self, v: &MultiValue) -> Result<()> {
        self.w.write_all(&v.op().mnemonic())?;
        match v.payload() {
            Payload::None => {}
            Payload::StaticVar(id) => self.w.write_u32::<LE>(*id)?,
            Payload::Int(i) => self.w.write_i64::<LE>(*i)?,
            Payload::Float(f) => self.w.write_f64::<LE>(*f)?,
            Payload::Str(s) => self.w.write_pascal_string(s)?,
        }
        Ok(())
    }

    /// Writes the 4-byte presence flag of an optional frame.
    pub fn write_presence(&mut self, present: bool) -> Result<()> {
        self.w.write_u32::<LE>(present as u32)?;
        Ok(())
    }

    /// Writes a structure frame: 4-byte size followed by the payload.
    ///
    /// The payload is produced by serializing the nested value into a
    /// scoped buffer first, so no seekable output is required; the
    /// buffer is released once the frame is emitted.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let size = u32::try_from(payload.len())
            .map_err(|_| Error::Contract("framed structure exceeds u32 size".into()))?;
        self.w.write_u32::<LE>(size)?;
        self.w.write_all(payload)?;
        trace!("frame emitted ({size} bytes)");
        Ok(())
    }

    /// Writes a list count, enforcing the 800 000-element sanity bound.
    pub fn write_list_count(&mut self, count: usize) -> Result<()> {
        if count > MAX_FILE_LIST_LEN as usize {
            return Err(Error::ListBound {
                count: count as i64,
                max: MAX_FILE_LIST_LEN,
            });
        }
        self.w.write_i32::<LE>(count as i32)?;
        Ok(())
    }

    /// Writes a polymorph type index after validating it against the
    /// declared variant list.
    pub fn write_type_index(&mut self, index: usize, variants: usize) -> Result<()> {
        if index >= variants {
            return Err(Error::TypeIndexOutOfRange {
                index: index as i32,
                variants,
            });
        }
        self.w.write_i32::<LE>(index as i32)?;
        Ok(())
    }
}

/// An in-progress size-prefixed frame on the read side.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    declared: u32,
    start: u64,
}

/// Reader half of the file codec.
pub struct FileReader<'a, R: Read> {
    r: CountingReader<R>,
    files: Option<&'a dyn FileIndex>,
}

impl<'a, R: Read> FileReader<'a, R> {
    pub fn new(r: R) -> FileReader<'a, R> {
        FileReader {
            r: CountingReader::new(r),
            files: None,
        }
    }

    pub fn with_files(r: R, files: &'a dyn FileIndex) -> FileReader<'a, R> {
        FileReader {
            r: CountingReader::new(r),
            files: Some(files),
        }
    }

    /// Total bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.r.position()
    }

    pub fn read_value_byte(&mut self) -> Result<u8> {
        Ok(self.r.read_u8()?)
    }

    pub fn read_value_int16(&mut self) -> Result<i16> {
        Ok(self.r.read_i16::<LE>()?)
    }

    pub fn read_value_int32(&mut self) -> Result<i32> {
        Ok(self.r.read_i32::<LE>()?)
    }

    pub fn read_value_int64(&mut self) -> Result<i64> {
        Ok(self.r.read_i64::<LE>()?)
    }

    pub fn read_value_float(&mut self) -> Result<f32> {
        Ok(self.r.read_f32::<LE>()?)
    }

    pub fn read_value_string(&mut self) -> Result<String> {
        self.r.read_pascal_string()
    }

    pub fn read_value_flag(&mut self) -> Result<bool> {
        self.r.read_bool_byte()
    }

    pub fn read_value_boolean(&mut self) -> Result<bool> {
        Err(Error::Unsupported("Boolean value in file codec"))
    }

    pub fn read_value_bit(&mut self) -> Result<u32> {
        Ok(self.r.read_u32::<LE>()?)
    }

    /// Enum decode reconstructs the value numerically; unknown
    /// enumerators pass through unchecked.
    pub fn read_value_enum(&mut self, width: EnumWidth) -> Result<i32> {
        let v = match width {
            EnumWidth::Byte => self.r.read_u8()? as i32,
            EnumWidth::Int16 => self.r.read_i16::<LE>()? as i32,
            EnumWidth::Int32 => self.r.read_i32::<LE>()?,
            EnumWidth::Bit => self.r.read_u32::<LE>()? as i32,
        };
        Ok(v)
    }

    pub fn read_value_current_file(&mut self) -> Result<Option<String>> {
        let index = self.r.read_i32::<LE>()?;
        if index == -1 {
            return Ok(None);
        }
        let files = self.files.ok_or(Error::NoFileTable)?;
        let name = files
            .name_of(index)
            .ok_or(Error::FileIndexUnresolved(index))?;
        Ok(Some(name))
    }

    pub fn read_value_multival(&mut self) -> Result<MultiValue> {
        let mut mnemonic = [0u8; 4];
        self.r.read_exact(&mut mnemonic)?;
        let op = Opcode::from_mnemonic(mnemonic).ok_or(Error::UnknownOpcode(mnemonic))?;
        let payload = match op.mask() {
            crate::multival::TypeMask::None => Payload::None,
            crate::multival::TypeMask::StaticVar => Payload::StaticVar(self.r.read_u32::<LE>()?),
            crate::multival::TypeMask::Int => Payload::Int(self.r.read_i64::<LE>()?),
            crate::multival::TypeMask::Float => Payload::Float(self.r.read_f64::<LE>()?),
            crate::multival::TypeMask::Str => Payload::Str(self.r.read_pascal_string()?),
        };
        MultiValue::new(op, payload)
    }

    /// Reads the 4-byte presence flag of an optional frame. Any value
    /// other than 0 or 1 is corrupt.
    pub fn read_presence(&mut self) -> Result<bool> {
        match self.r.read_u32::<LE>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::BadPresenceFlag(other)),
        }
    }

    /// Reads a frame's size prefix and records the cursor for the
    /// exact-consumption check in [`FileReader::end_frame`].
    pub fn begin_frame(&mut self) -> Result<Frame> {
        let declared = self.r.read_u32::<LE>()?;
        Ok(Frame {
            declared,
            start: self.r.position(),
        })
    }

    /// Asserts that exactly the declared byte count was consumed since
    /// [`FileReader::begin_frame`]. Any mismatch is fatal.
    pub fn end_frame(&mut self, frame: Frame) -> Result<()> {
        let consumed = self.r.position() - frame.start;
        if consumed != frame.declared as u64 {
            return Err(Error::FramingMismatch {
                declared: frame.declared,
                consumed,
            });
        }
        Ok(())
    }

    /// Reads a list count, enforcing the 800 000-element sanity bound.
    pub fn read_list_count(&mut self) -> Result<usize> {
        let count = self.r.read_i32::<LE>()?;
        if count < 0 || count > MAX_FILE_LIST_LEN {
            return Err(Error::ListBound {
                count: count as i64,
                max: MAX_FILE_LIST_LEN,
            });
        }
        Ok(count as usize)
    }

    /// Reads and validates a polymorph type index.
    pub fn read_type_index(&mut self, variants: usize) -> Result<usize> {
        let index = self.r.read_i32::<LE>()?;
        if index < 0 || index as usize >= variants {
            return Err(Error::TypeIndexOutOfRange { index, variants });
        }
        Ok(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FileTable;
    use std::io::Cursor;

    #[test]
    fn fixed_width_values_roundtrip() {
        let mut buf = Vec::new();
        {
            let mut w = FileWriter::new(&mut buf);
            w.write_value_byte(0xAB).unwrap();
            w.write_value_int16(-2).unwrap();
            w.write_value_int32(i32::MIN).unwrap();
            w.write_value_int64(i64::MAX).unwrap();
            w.write_value_float(2.5).unwrap();
            w.write_value_string("blob").unwrap();
            w.write_value_flag(true).unwrap();
            w.write_value_bit(0xDEAD_BEEF).unwrap();
        }
        let mut r = FileReader::new(Cursor::new(buf));
        assert_eq!(r.read_value_byte().unwrap(), 0xAB);
        assert_eq!(r.read_value_int16().unwrap(), -2);
        assert_eq!(r.read_value_int32().unwrap(), i32::MIN);
        assert_eq!(r.read_value_int64().unwrap(), i64::MAX);
        assert_eq!(r.read_value_float().unwrap(), 2.5);
        assert_eq!(r.read_value_string().unwrap(), "blob");
        assert!(r.read_value_flag().unwrap());
        assert_eq!(r.read_value_bit().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn boolean_is_unsupported() {
        let mut buf = Vec::new();
        let mut w = FileWriter::new(&mut buf);
        assert!(matches!(
            w.write_value_boolean(true),
            Err(Error::Unsupported(_))
        ));
        let mut r = FileReader::new(Cursor::new(vec![1u8]));
        assert!(matches!(
            r.read_value_boolean(),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn presence_flag_is_strict() {
        let mut r = FileReader::new(Cursor::new(2u32.to_le_bytes().to_vec()));
        assert!(matches!(
            r.read_presence(),
            Err(Error::BadPresenceFlag(2))
        ));
    }

    #[test]
    fn frame_consumption_is_checked() {
        let mut buf = Vec::new();
        {
            let mut w = FileWriter::new(&mut buf);
            w.write_frame(&[1, 2, 3, 4]).unwrap();
        }
        let mut r = FileReader::new(Cursor::new(buf.clone()));
        let frame = r.begin_frame().unwrap();
        let mut payload = [0u8; 4];
        r.r.read_exact(&mut payload).unwrap();
        r.end_frame(frame).unwrap();

        // Consuming one byte short must trip the mismatch check.
        let mut r = FileReader::new(Cursor::new(buf));
        let frame = r.begin_frame().unwrap();
        let mut short = [0u8; 3];
        r.r.read_exact(&mut short).unwrap();
        assert!(matches!(
            r.end_frame(frame),
            Err(Error::FramingMismatch {
                declared: 4,
                consumed: 3
            })
        ));
    }

    #[test]
    fn list_count_bound() {
        let mut buf = Vec::new();
        {
            let mut w = FileWriter::new(&mut buf);
            w.write_list_count(MAX_FILE_LIST_LEN as usize).unwrap();
            assert!(matches!(
                w.write_list_count(MAX_FILE_LIST_LEN as usize + 1),
                Err(Error::ListBound { .. })
            ));
        }
        let mut r = FileReader::new(Cursor::new(
            (MAX_FILE_LIST_LEN + 1).to_le_bytes().to_vec(),
        ));
        assert!(matches!(r.read_list_count(), Err(Error::ListBound { .. })));

        let mut r = FileReader::new(Cursor::new((-5i32).to_le_bytes().to_vec()));
        assert!(matches!(r.read_list_count(), Err(Error::ListBound { .. })));
    }

    #[test]
    fn current_file_goes_through_the_resolver() {
        let table = FileTable::new(vec!["ui/icon.tex".into(), "fx/burst.part".into()]);
        let mut buf = Vec::new();
        {
            let mut w = FileWriter::with_files(&mut buf, &table);
            w.write_value_current_file(Some("fx/burst.part")).unwrap();
            w.write_value_current_file(None).unwrap();
            assert!(matches!(
                w.write_value_current_file(Some("missing.tex")),
                Err(Error::FileNameUnresolved(_))
            ));
        }
        let mut r = FileReader::with_files(Cursor::new(buf), &table);
        assert_eq!(
            r.read_value_current_file().unwrap().as_deref(),
            Some("fx/burst.part")
        );
        assert_eq!(r.read_value_current_file().unwrap(), None);
    }

    #[test]
    fn current_file_without_resolver_is_a_contract_error() {
        let mut buf = Vec::new();
        let mut w = FileWriter::new(&mut buf);
        assert!(matches!(
            w.write_value_current_file(Some("a.tex")),
            Err(Error::NoFileTable)
        ));
    }

    #[test]
    fn multival_wire_format() {
        let mv = MultiValue::new(Opcode::Int, Payload::Int(-42)).unwrap();
        let mut buf = Vec::new();
        {
            let mut w = FileWriter::new(&mut buf);
            w.write_value_multival(&mv).unwrap();
        }
        assert_eq!(&buf[..4], b"INT#");
        assert_eq!(&buf[4..], &(-42i64).to_le_bytes());

        let mut r = FileReader::new(Cursor::new(buf));
        assert_eq!(r.read_value_multival().unwrap(), mv);
    }

    #[test]
    fn multival_unknown_mnemonic_is_fatal() {
        let mut r = FileReader::new(Cursor::new(b"ZZZZ".to_vec()));
        assert!(matches!(
            r.read_value_multival(),
            Err(Error::UnknownOpcode(_))
        ));
    }

    #[test]
    fn type_index_validation() {
        let mut buf = Vec::new();
        {
            let mut w = FileWriter::new(&mut buf);
            w.write_type_index(1, 3).unwrap();
            assert!(matches!(
                w.write_type_index(3, 3),
                Err(Error::TypeIndexOutOfRange { .. })
            ));
        }
        let mut r = FileReader::new(Cursor::new(buf));
        assert_eq!(r.read_type_index(3).unwrap(), 1);

        let mut r = FileReader::new(Cursor::new(7i32.to_le_bytes().to_vec()));
        assert!(matches!(
            r.read_type_index(3),
            Err(Error::TypeIndexOutOfRange { index: 7, .. })
        ));
    }
}
