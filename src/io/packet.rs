//! The packet codec: the denser wire encoding used for live network
//! traffic.
//!
//! Small integers are packed with a 2-bit size-class tag, signed values
//! as presence/sign/magnitude (zero is simply absent), and structures as
//! a sparse self-describing field stream so default-valued fields can be
//! omitted entirely. Field visibility is role-scoped: a column marked
//! for the other endpoint is a protocol violation, not a schema nicety.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use crate::io::primitives::{ReadPrimitives, WritePrimitives};
use crate::io::{Error, Result, MAX_PACKET_LIST_LEN};
use crate::multival::{MultiValue, Opcode, Payload};

/// Endpoint role, enforced against CLIENT_ONLY/SERVER_ONLY columns
/// during sparse field dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

/// Writer half of the packet codec.
pub struct PacketWriter<W: Write> {
    w: W,
    role: Role,
}

impl<W: Write> PacketWriter<W> {
    pub fn new(w: W, role: Role) -> PacketWriter<W> {
        PacketWriter { w, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.w.write_bool_byte(v)
    }

    /// Packs an unsigned 32-bit value: the leading byte's low 2 bits are
    /// the size class (0/1/2/3 extra bytes: 0, 1, 2, 4) and its upper 6
    /// bits are the value's low 6 bits; extra bytes carry the rest, LE.
    pub fn write_packed_u32(&mut self, v: u32) -> Result<()> {
        let rest = v >> 6;
        let low = ((v & 0x3F) as u8) << 2;
        if rest == 0 {
            self.w.write_u8(low)?;
        } else if rest < 1 << 8 {
            self.w.write_u8(low | 1)?;
            self.w.write_u8(rest as u8)?;
        } else if rest < 1 << 16 {
            self.w.write_u8(low | 2)?;
            self.w.write_u16::<LE>(rest as u16)?;
        } else {
            self.w.write_u8(low | 3)?;
            self.w.write_u32::<LE>(rest)?;
        }
        Ok(())
    }

    /// Signed packing: a presence boolean, then (if non-zero) a sign
    /// boolean and the packed magnitude. Zero is encoded as absent.
    pub fn write_packed_i32(&mut self, v: i32) -> Result<()> {
        self.write_bool(v != 0)?;
        if v != 0 {
            self.write_bool(v < 0)?;
            self.write_packed_u32(v.unsigned_abs())?;
        }
        Ok(())
    }

    /// 64-bit variant of the signed packing; the magnitude travels as
    /// two packed 32-bit halves, low then high.
    pub fn write_packed_i64(&mut self, v: i64) -> Result<()> {
        self.write_bool(v != 0)?;
        if v != 0 {
            self.write_bool(v < 0)?;
            let mag = v.unsigned_abs();
            self.write_packed_u32(mag as u32)?;
            self.write_packed_u32((mag >> 32) as u32)?;
        }
        Ok(())
    }

    /// Unsigned value in field position. With `may_default` set the
    /// value is presence-prefixed so a default can be omitted; otherwise
    /// the caller asserts it is non-default and the payload follows
    /// directly.
    pub fn write_u32_field(&mut self, v: u32, may_default: bool) -> Result<()> {
        if may_default {
            self.write_bool(v != 0)?;
            if v == 0 {
                return Ok(());
            }
        }
        self.write_packed_u32(v)
    }

    pub fn write_float_field(&mut self, v: f32, may_default: bool) -> Result<()> {
        if may_default {
            self.write_bool(v != 0.0)?;
            if v == 0.0 {
                return Ok(());
            }
        }
        self.w.write_f32::<LE>(v)?;
        Ok(())
    }

    pub fn write_string_field(&mut self, v: &str, may_default: bool) -> Result<()> {
        if may_default {
            self.write_bool(!v.is_empty())?;
            if v.is_empty() {
                return Ok(());
            }
        }
        self.w.write_pascal_string(v)
    }

    pub fn write_multival(&mut self, v: &MultiValue) -> Result<()> {
        self.w.write_all(&v.op().mnemonic())?;
        match v.payload() {
            Payload::None => {}
            Payload::StaticVar(id) => self.write_packed_u32(*id)?,
            Payload::Int(i) => self.write_packed_i64(*i)?,
            Payload::Float(f) => self.w.write_f64::<LE>(*f)?,
            Payload::Str(s) => self.w.write_pascal_string(s)?,
        }
        Ok(())
    }

    /// Opens a list: indexed flag (not implemented in this generation,
    /// always false), packed signed count, and the per-list unknown
    /// flag that gets OR'd into every element's encoding context.
    pub fn write_list_header(&mut self, count: usize, unknown: bool) -> Result<()> {
        if count > MAX_PACKET_LIST_LEN as usize {
            return Err(Error::ListBound {
                count: count as i64,
                max: MAX_PACKET_LIST_LEN,
            });
        }
        self.write_bool(false)?;
        self.write_packed_i32(count as i32)?;
        self.write_bool(unknown)?;
        Ok(())
    }

    /// Writes a sparse field header: the has-field marker plus the
    /// field's index in the serializable column list.
    pub fn write_field_index(&mut self, index: usize) -> Result<()> {
        self.write_bool(true)?;
        self.write_packed_u32(index as u32)?;
        Ok(())
    }

    /// Terminates a sparse field stream.
    pub fn write_field_terminator(&mut self) -> Result<()> {
        self.write_bool(false)
    }
}

/// Reader half of the packet codec.
pub struct PacketReader<R: Read> {
    r: R,
    role: Role,
}

impl<R: Read> PacketReader<R> {
    pub fn new(r: R, role: Role) -> PacketReader<R> {
        PacketReader { r, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.r.read_bool_byte()
    }

    pub fn read_packed_u32(&mut self) -> Result<u32> {
        let lead = self.r.read_u8()?;
        let low = (lead >> 2) as u32;
        let rest = match lead & 0x03 {
            0 => 0,
            1 => self.r.read_u8()? as u32,
            2 => self.r.read_u16::<LE>()? as u32,
            _ => self.r.read_u32::<LE>()?,
        };
        Ok(low | rest << 6)
    }

    pub fn read_packed_i32(&mut self) -> Result<i32> {
        if !self.read_bool()? {
            return Ok(0);
        }
        let negative = self.read_bool()?;
        let mag = self.read_packed_u32()?;
        Ok(if negative {
            (mag as i64).wrapping_neg() as i32
        } else {
            mag as i32
        })
    }

    pub fn read_packed_i64(&mut self) -> Result<i64> {
        if !self.read_bool()? {
            return Ok(0);
        }
        let negative = self.read_bool()?;
        let low = self.read_packed_u32()? as u64;
        let high = self.read_packed_u32()? as u64;
        let mag = low | high << 32;
        Ok(if negative {
            (mag as i64).wrapping_neg()
        } else {
            mag as i64
        })
    }

    pub fn read_u32_field(&mut self, may_default: bool) -> Result<u32> {
        if may_default && !self.read_bool()? {
            return Ok(0);
        }
        self.read_packed_u32()
    }

    pub fn read_float_field(&mut self, may_default: bool) -> Result<f32> {
        if may_default && !self.read_bool()? {
            return Ok(0.0);
        }
        Ok(self.r.read_f32::<LE>()?)
    }

    pub fn read_string_field(&mut self, may_default: bool) -> Result<String> {
        if may_default && !self.read_bool()? {
            return Ok(String::new());
        }
        self.r.read_pascal_string()
    }

    pub fn read_multival(&mut self) -> Result<MultiValue> {
        let mut mnemonic = [0u8; 4];
        self.r.read_exact(&mut mnemonic)?;
        let op = Opcode::from_mnemonic(mnemonic).ok_or(Error::UnknownOpcode(mnemonic))?;
        let payload = match op.mask() {
            crate::multival::TypeMask::None => Payload::None,
            crate::multival::TypeMask::StaticVar => Payload::StaticVar(self.read_packed_u32()?),
            crate::multival::TypeMask::Int => Payload::Int(self.read_packed_i64()?),
            crate::multival::TypeMask::Float => Payload::Float(self.r.read_f64::<LE>()?),
            crate::multival::TypeMask::Str => Payload::Str(self.r.read_pascal_string()?),
        };
        MultiValue::new(op, payload)
    }

    /// Reads a list header, returning (count, unknown). Indexed lists
    /// are not implemented in this codec generation.
    pub fn read_list_header(&mut self) -> Result<(usize, bool)> {
        if self.read_bool()? {
            return Err(Error::Unsupported("indexed packet list"));
        }
        let count = self.read_packed_i32()?;
        if count < 0 || count > MAX_PACKET_LIST_LEN {
            return Err(Error::ListBound {
                count: count as i64,
                max: MAX_PACKET_LIST_LEN,
            });
        }
        let unknown = self.read_bool()?;
        Ok((count as usize, unknown))
    }

    /// Reads the next sparse field index, or `None` at the stream
    /// terminator. The index is validated against `columns`.
    pub fn read_field_index(&mut self, columns: usize) -> Result<Option<usize>> {
        if !self.read_bool()? {
            return Ok(None);
        }
        let index = self.read_packed_u32()? as usize;
        if index >= columns {
            return Err(Error::FieldIndexOutOfRange { index, columns });
        }
        Ok(Some(index))
    }

    /// Reads and validates a polymorph type index (reserved boolean
    /// included).
    pub fn read_type_index(&mut self, variants: usize) -> Result<usize> {
        let _reserved = self.read_bool()?;
        let index = self.read_packed_u32()? as usize;
        if index >= variants {
            return Err(Error::TypeIndexOutOfRange {
                index: index as i32,
                variants,
            });
        }
        Ok(index)
    }
}

impl<W: Write> PacketWriter<W> {
    /// Writes a polymorph type index: reserved boolean then the packed
    /// index, validated against the variant list.
    pub fn write_type_index(&mut self, index: usize, variants: usize) -> Result<()> {
        if index >= variants {
            return Err(Error::TypeIndexOutOfRange {
                index: index as i32,
                variants,
            });
        }
        self.write_bool(false)?;
        self.write_packed_u32(index as u32)
    }
}
