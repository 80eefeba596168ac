//! Little-endian primitives shared by every ROP structure.
//!
//! Reads are bounds-checked: running out of bytes yields
//! [`ProtocolError::Truncated`] naming the field being read, never a panic.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// Cursor over a received buffer.
#[derive(Debug, Clone)]
pub struct Reader {
    buf: Bytes,
    consumed: usize,
}

impl Reader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, consumed: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes consumed since the reader was created.
    pub fn position(&self) -> usize {
        self.consumed
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    fn ensure(&self, needed: usize, field: &'static str) -> Result<(), ProtocolError> {
        if self.buf.len() < needed {
            return Err(ProtocolError::Truncated {
                field,
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        self.ensure(1, field)?;
        self.consumed += 1;
        Ok(self.buf.get_u8())
    }

    /// Reads a one-byte boolean; any nonzero value is true.
    pub fn bool(&mut self, field: &'static str) -> Result<bool, ProtocolError> {
        Ok(self.u8(field)? != 0)
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, ProtocolError> {
        self.ensure(2, field)?;
        self.consumed += 2;
        Ok(self.buf.get_u16_le())
    }

    pub fn i16(&mut self, field: &'static str) -> Result<i16, ProtocolError> {
        self.ensure(2, field)?;
        self.consumed += 2;
        Ok(self.buf.get_i16_le())
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        self.ensure(4, field)?;
        self.consumed += 4;
        Ok(self.buf.get_u32_le())
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32, ProtocolError> {
        self.ensure(4, field)?;
        self.consumed += 4;
        Ok(self.buf.get_i32_le())
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, ProtocolError> {
        self.ensure(8, field)?;
        self.consumed += 8;
        Ok(self.buf.get_u64_le())
    }

    pub fn i64(&mut self, field: &'static str) -> Result<i64, ProtocolError> {
        self.ensure(8, field)?;
        self.consumed += 8;
        Ok(self.buf.get_i64_le())
    }

    pub fn f32(&mut self, field: &'static str) -> Result<f32, ProtocolError> {
        self.ensure(4, field)?;
        self.consumed += 4;
        Ok(self.buf.get_f32_le())
    }

    pub fn f64(&mut self, field: &'static str) -> Result<f64, ProtocolError> {
        self.ensure(8, field)?;
        self.consumed += 8;
        Ok(self.buf.get_f64_le())
    }

    pub fn bytes(&mut self, len: usize, field: &'static str) -> Result<Bytes, ProtocolError> {
        self.ensure(len, field)?;
        self.consumed += len;
        Ok(self.buf.split_to(len))
    }

    pub fn vec(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>, ProtocolError> {
        Ok(self.bytes(len, field)?.to_vec())
    }

    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ProtocolError> {
        self.ensure(N, field)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        self.consumed += N;
        Ok(out)
    }

    /// Reads a GUID in its little-endian wire layout.
    pub fn guid(&mut self, field: &'static str) -> Result<Uuid, ProtocolError> {
        Ok(Uuid::from_bytes_le(self.array::<16>(field)?))
    }

    /// Reads a null-terminated 8-bit string.
    pub fn string8(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let end = self
            .buf
            .iter()
            .position(|b| *b == 0)
            .ok_or(ProtocolError::Truncated {
                field,
                needed: self.buf.len() + 1,
                available: self.buf.len(),
            })?;
        let raw = self.bytes(end + 1, field)?;
        String::from_utf8(raw[..end].to_vec()).map_err(|_| ProtocolError::InvalidString(field))
    }

    /// Reads a null-terminated UTF-16LE string.
    pub fn string16(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let mut units = Vec::new();
        loop {
            let unit = self.u16(field)?;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        String::from_utf16(&units).map_err(|_| ProtocolError::InvalidString(field))
    }

    /// Takes everything left in the buffer.
    pub fn rest(&mut self) -> Bytes {
        self.consumed += self.buf.len();
        self.buf.split_off(0)
    }
}

/// Writers for the composite primitives `BufMut` lacks.
pub trait WireWrite {
    fn put_bool(&mut self, value: bool);
    fn put_guid(&mut self, value: &Uuid);
    fn put_string8(&mut self, value: &str, field: &'static str) -> Result<(), ProtocolError>;
    fn put_string16(&mut self, value: &str, field: &'static str) -> Result<(), ProtocolError>;
}

impl WireWrite for BytesMut {
    fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    fn put_guid(&mut self, value: &Uuid) {
        self.put_slice(&value.to_bytes_le());
    }

    fn put_string8(&mut self, value: &str, field: &'static str) -> Result<(), ProtocolError> {
        if value.as_bytes().contains(&0) {
            return Err(ProtocolError::InvalidString(field));
        }
        self.put_slice(value.as_bytes());
        self.put_u8(0);
        Ok(())
    }

    fn put_string16(&mut self, value: &str, field: &'static str) -> Result<(), ProtocolError> {
        if value.contains('\0') {
            return Err(ProtocolError::InvalidString(field));
        }
        for unit in value.encode_utf16() {
            self.put_u16_le(unit);
        }
        self.put_u16_le(0);
        Ok(())
    }
}

/// Converts a collection length to a `u16` count field.
pub fn count_u16(len: usize, what: &'static str) -> Result<u16, ProtocolError> {
    u16::try_from(len).map_err(|_| ProtocolError::TooLarge {
        what,
        size: len,
        max: u16::MAX as usize,
    })
}

/// Converts a collection length to a `u8` count field.
pub fn count_u8(len: usize, what: &'static str) -> Result<u8, ProtocolError> {
    u8::try_from(len).map_err(|_| ProtocolError::TooLarge {
        what,
        size: len,
        max: u8::MAX as usize,
    })
}

/// Converts a collection length to a `u32` count field.
pub fn count_u32(len: usize, what: &'static str) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::TooLarge {
        what,
        size: len,
        max: u32::MAX as usize,
    })
}

/// Size in bytes of a null-terminated 8-bit string on the wire.
pub fn string8_size(value: &str) -> usize {
    value.len() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_primitives() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x7F);
        buf.put_u16_le(0xBEEF);
        buf.put_u32_le(0xDEAD_BEEF);
        buf.put_u64_le(0x0102_0304_0506_0708);
        buf.put_i32_le(-5);

        let mut reader = Reader::new(buf.freeze());
        assert_eq!(reader.u8("a").unwrap(), 0x7F);
        assert_eq!(reader.u16("b").unwrap(), 0xBEEF);
        assert_eq!(reader.u32("c").unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.u64("d").unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(reader.i32("e").unwrap(), -5);
        assert!(reader.is_empty());
        assert_eq!(reader.position(), 19);
    }

    #[test]
    fn test_truncated_names_field() {
        let mut reader = Reader::new(Bytes::from_static(&[0x01, 0x02]));
        let err = reader.u32("ReturnValue").unwrap_err();
        match err {
            ProtocolError::Truncated {
                field,
                needed,
                available,
            } => {
                assert_eq!(field, "ReturnValue");
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strings() {
        let mut buf = BytesMut::new();
        buf.put_string8("Inbox", "name").unwrap();
        buf.put_string16("Boîte", "name").unwrap();

        let mut reader = Reader::new(buf.freeze());
        assert_eq!(reader.string8("name").unwrap(), "Inbox");
        assert_eq!(reader.string16("name").unwrap(), "Boîte");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_unterminated_string() {
        let mut reader = Reader::new(Bytes::from_static(b"abc"));
        assert!(matches!(
            reader.string8("ServerName"),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_interior_nul_rejected() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            buf.put_string8("a\0b", "Essdn"),
            Err(ProtocolError::InvalidString("Essdn"))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_guid_wire_order() {
        let guid = Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let mut buf = BytesMut::new();
        buf.put_guid(&guid);
        assert_eq!(&buf[..4], &[0x33, 0x22, 0x11, 0x00]);

        let mut reader = Reader::new(buf.freeze());
        assert_eq!(reader.guid("guid").unwrap(), guid);
    }

    #[test]
    fn test_count_overflow() {
        assert_eq!(count_u16(3, "items").unwrap(), 3);
        assert!(matches!(
            count_u16(70_000, "items"),
            Err(ProtocolError::TooLarge { size: 70_000, .. })
        ));
        assert!(count_u8(256, "rows").is_err());
    }
}
