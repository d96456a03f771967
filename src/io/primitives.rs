use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::io::{Error, Result};

/// Byte-level helpers shared by both codecs.
///
/// Counts are 7-bit variable-width integers (low 7 bits of each byte are
/// value bits, the high bit continues); strings are Pascal-style, a
/// varint length followed by UTF-8 bytes.
pub trait WritePrimitives: Write {
    fn write_var_count(&mut self, mut value: usize) -> Result<()> {
        while value >= 0x80 {
            self.write_u8((value as u8 & 0x7F) | 0x80)?;
            value >>= 7;
        }
        self.write_u8(value as u8)?;
        Ok(())
    }

    fn write_pascal_string(&mut self, s: &str) -> Result<()> {
        self.write_var_count(s.len())?;
        self.write_all(s.as_bytes())?;
        Ok(())
    }

    fn write_bool_byte(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)?;
        Ok(())
    }

    fn write_seq<T>(
        &mut self,
        values: &[T],
        f: impl Fn(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        for value in values.iter() {
            f(self, value)?;
        }
        Ok(())
    }
}

impl<W: Write + ?Sized> WritePrimitives for W {}

pub trait ReadPrimitives: Read {
    fn read_var_count(&mut self) -> Result<usize> {
        let mut result: usize = 0;
        let mut bits_read: usize = 0;
        loop {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as usize) << bits_read;
            bits_read += 7;
            if bits_read > usize::BITS as usize {
                return Err(Error::Contract(
                    "varint count exceeds usize range".into(),
                ));
            }
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(result)
    }

    fn read_pascal_string(&mut self) -> Result<String> {
        let len = self.read_var_count()?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Reads a one-byte boolean, rejecting anything but 0 or 1.
    fn read_bool_byte(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::BadBool(other)),
        }
    }

    fn read_seq<T>(
        &mut self,
        len: usize,
        f: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut values = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            values.push(f(self)?);
        }
        Ok(values)
    }
}

impl<R: Read + ?Sized> ReadPrimitives for R {}

/// `Read` adapter that tracks how many bytes have been consumed.
///
/// The framing protocol's exact-consumption check is built on this
/// counter; every file-codec read goes through it.
pub struct CountingReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> CountingReader<R> {
        CountingReader { inner, consumed: 0 }
    }

    /// Total bytes consumed since construction.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn var_count_roundtrip() {
        for value in [0usize, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 1_000_000] {
            let mut buf = Vec::new();
            buf.write_var_count(value).unwrap();
            let read = Cursor::new(&buf).read_var_count().unwrap();
            assert_eq!(read, value);
        }
    }

    #[test]
    fn var_count_width() {
        let mut buf = Vec::new();
        buf.write_var_count(0x7F).unwrap();
        assert_eq!(buf.len(), 1);
        buf.clear();
        buf.write_var_count(0x80).unwrap();
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn pascal_string_roundtrip() {
        for s in ["", "x", "hello blob", "ünïcode"] {
            let mut buf = Vec::new();
            buf.write_pascal_string(s).unwrap();
            assert_eq!(Cursor::new(&buf).read_pascal_string().unwrap(), s);
        }
    }

    #[test]
    fn pascal_string_rejects_bad_utf8() {
        let mut buf = Vec::new();
        buf.write_var_count(2).unwrap();
        buf.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(
            Cursor::new(&buf).read_pascal_string(),
            Err(Error::BadUtf8(_))
        ));
    }

    #[test]
    fn bool_byte_validation() {
        assert!(!Cursor::new([0u8]).read_bool_byte().unwrap());
        assert!(Cursor::new([1u8]).read_bool_byte().unwrap());
        assert!(matches!(
            Cursor::new([2u8]).read_bool_byte(),
            Err(Error::BadBool(2))
        ));
    }

    #[test]
    fn counting_reader_tracks_consumption() {
        let mut r = CountingReader::new(Cursor::new(vec![0u8; 16]));
        let mut buf = [0u8; 5];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(r.position(), 5);
        r.read_exact(&mut buf).unwrap();
        assert_eq!(r.position(), 10);
    }
}
