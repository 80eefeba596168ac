//! Property values as they appear inside ROP buffers.
//!
//! Only the layout is modelled here: enough to delimit values and rows so
//! the rest of a buffer stays readable. What a property means belongs to
//! the caller.

use crate::error::ProtocolError;
use crate::types::PropertyTag;
use crate::wire::{count_u16, count_u32, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property type codes.
pub mod property_type {
    pub const UNSPECIFIED: u16 = 0x0000;
    pub const NULL: u16 = 0x0001;
    pub const INTEGER16: u16 = 0x0002;
    pub const INTEGER32: u16 = 0x0003;
    pub const FLOATING32: u16 = 0x0004;
    pub const FLOATING64: u16 = 0x0005;
    pub const CURRENCY: u16 = 0x0006;
    pub const FLOATING_TIME: u16 = 0x0007;
    pub const ERROR_CODE: u16 = 0x000A;
    pub const BOOLEAN: u16 = 0x000B;
    pub const INTEGER64: u16 = 0x0014;
    pub const STRING8: u16 = 0x001E;
    pub const STRING: u16 = 0x001F;
    pub const TIME: u16 = 0x0040;
    pub const GUID: u16 = 0x0048;
    pub const SERVER_ID: u16 = 0x00FB;
    pub const BINARY: u16 = 0x0102;
    pub const MULTIPLE_INTEGER16: u16 = 0x1002;
    pub const MULTIPLE_INTEGER32: u16 = 0x1003;
    pub const MULTIPLE_INTEGER64: u16 = 0x1014;
    pub const MULTIPLE_STRING8: u16 = 0x101E;
    pub const MULTIPLE_STRING: u16 = 0x101F;
    pub const MULTIPLE_TIME: u16 = 0x1040;
    pub const MULTIPLE_GUID: u16 = 0x1048;
    pub const MULTIPLE_BINARY: u16 = 0x1102;
}

use property_type as pt;

/// 100ns intervals between 1601-01-01 and the Unix epoch.
const FILETIME_UNIX_OFFSET: u64 = 116_444_736_000_000_000;

/// Converts a FILETIME to UTC, or `None` if it predates the Unix epoch.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let since_epoch = filetime.checked_sub(FILETIME_UNIX_OFFSET)?;
    let secs = i64::try_from(since_epoch / 10_000_000).ok()?;
    let nanos = ((since_epoch % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Converts UTC to a FILETIME, saturating at the Unix epoch.
pub fn datetime_to_filetime(time: &DateTime<Utc>) -> u64 {
    let secs = time.timestamp().max(0) as u64;
    let ticks = secs * 10_000_000 + u64::from(time.timestamp_subsec_nanos() / 100);
    ticks + FILETIME_UNIX_OFFSET
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Null,
    Integer16(i16),
    Integer32(i32),
    Floating32(f32),
    Floating64(f64),
    Currency(i64),
    FloatingTime(f64),
    ErrorCode(u32),
    Boolean(bool),
    Integer64(i64),
    String8(String),
    String(String),
    /// FILETIME, 100ns ticks since 1601-01-01 UTC.
    Time(u64),
    Guid(Uuid),
    ServerId(Vec<u8>),
    Binary(Vec<u8>),
    MultipleInteger16(Vec<i16>),
    MultipleInteger32(Vec<i32>),
    MultipleInteger64(Vec<i64>),
    MultipleString8(Vec<String>),
    MultipleString(Vec<String>),
    MultipleTime(Vec<u64>),
    MultipleGuid(Vec<Uuid>),
    MultipleBinary(Vec<Vec<u8>>),
}

impl PropertyValue {
    pub fn property_type(&self) -> u16 {
        match self {
            PropertyValue::Null => pt::NULL,
            PropertyValue::Integer16(_) => pt::INTEGER16,
            PropertyValue::Integer32(_) => pt::INTEGER32,
            PropertyValue::Floating32(_) => pt::FLOATING32,
            PropertyValue::Floating64(_) => pt::FLOATING64,
            PropertyValue::Currency(_) => pt::CURRENCY,
            PropertyValue::FloatingTime(_) => pt::FLOATING_TIME,
            PropertyValue::ErrorCode(_) => pt::ERROR_CODE,
            PropertyValue::Boolean(_) => pt::BOOLEAN,
            PropertyValue::Integer64(_) => pt::INTEGER64,
            PropertyValue::String8(_) => pt::STRING8,
            PropertyValue::String(_) => pt::STRING,
            PropertyValue::Time(_) => pt::TIME,
            PropertyValue::Guid(_) => pt::GUID,
            PropertyValue::ServerId(_) => pt::SERVER_ID,
            PropertyValue::Binary(_) => pt::BINARY,
            PropertyValue::MultipleInteger16(_) => pt::MULTIPLE_INTEGER16,
            PropertyValue::MultipleInteger32(_) => pt::MULTIPLE_INTEGER32,
            PropertyValue::MultipleInteger64(_) => pt::MULTIPLE_INTEGER64,
            PropertyValue::MultipleString8(_) => pt::MULTIPLE_STRING8,
            PropertyValue::MultipleString(_) => pt::MULTIPLE_STRING,
            PropertyValue::MultipleTime(_) => pt::MULTIPLE_TIME,
            PropertyValue::MultipleGuid(_) => pt::MULTIPLE_GUID,
            PropertyValue::MultipleBinary(_) => pt::MULTIPLE_BINARY,
        }
    }

    /// The value as a calendar time, for `Time` values.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::Time(filetime) => filetime_to_datetime(*filetime),
            _ => None,
        }
    }

    /// Writes the value bytes only; the type is implied by context.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            PropertyValue::Null => {}
            PropertyValue::Integer16(v) => buf.put_i16_le(*v),
            PropertyValue::Integer32(v) => buf.put_i32_le(*v),
            PropertyValue::Floating32(v) => buf.put_f32_le(*v),
            PropertyValue::Floating64(v) | PropertyValue::FloatingTime(v) => buf.put_f64_le(*v),
            PropertyValue::Currency(v) | PropertyValue::Integer64(v) => buf.put_i64_le(*v),
            PropertyValue::ErrorCode(v) => buf.put_u32_le(*v),
            PropertyValue::Boolean(v) => buf.put_bool(*v),
            PropertyValue::String8(s) => buf.put_string8(s, "PropertyValue")?,
            PropertyValue::String(s) => buf.put_string16(s, "PropertyValue")?,
            PropertyValue::Time(v) => buf.put_u64_le(*v),
            PropertyValue::Guid(g) => buf.put_guid(g),
            PropertyValue::ServerId(bytes) | PropertyValue::Binary(bytes) => {
                buf.put_u16_le(count_u16(bytes.len(), "PropertyValue")?);
                buf.put_slice(bytes);
            }
            PropertyValue::MultipleInteger16(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                values.iter().for_each(|v| buf.put_i16_le(*v));
            }
            PropertyValue::MultipleInteger32(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                values.iter().for_each(|v| buf.put_i32_le(*v));
            }
            PropertyValue::MultipleInteger64(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                values.iter().for_each(|v| buf.put_i64_le(*v));
            }
            PropertyValue::MultipleTime(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                values.iter().for_each(|v| buf.put_u64_le(*v));
            }
            PropertyValue::MultipleGuid(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                values.iter().for_each(|g| buf.put_guid(g));
            }
            PropertyValue::MultipleString8(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                for s in values {
                    buf.put_string8(s, "PropertyValue")?;
                }
            }
            PropertyValue::MultipleString(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                for s in values {
                    buf.put_string16(s, "PropertyValue")?;
                }
            }
            PropertyValue::MultipleBinary(values) => {
                buf.put_u32_le(count_u32(values.len(), "PropertyValue")?);
                for bytes in values {
                    buf.put_u16_le(count_u16(bytes.len(), "PropertyValue")?);
                    buf.put_slice(bytes);
                }
            }
        }
        Ok(())
    }

    /// Reads a value of the given type.
    pub fn decode(property_type: u16, src: &mut Reader) -> Result<Self, ProtocolError> {
        const F: &str = "PropertyValue";
        let value = match property_type {
            pt::NULL => PropertyValue::Null,
            pt::INTEGER16 => PropertyValue::Integer16(src.i16(F)?),
            pt::INTEGER32 => PropertyValue::Integer32(src.i32(F)?),
            pt::FLOATING32 => PropertyValue::Floating32(src.f32(F)?),
            pt::FLOATING64 => PropertyValue::Floating64(src.f64(F)?),
            pt::CURRENCY => PropertyValue::Currency(src.i64(F)?),
            pt::FLOATING_TIME => PropertyValue::FloatingTime(src.f64(F)?),
            pt::ERROR_CODE => PropertyValue::ErrorCode(src.u32(F)?),
            pt::BOOLEAN => PropertyValue::Boolean(src.bool(F)?),
            pt::INTEGER64 => PropertyValue::Integer64(src.i64(F)?),
            pt::STRING8 => PropertyValue::String8(src.string8(F)?),
            pt::STRING => PropertyValue::String(src.string16(F)?),
            pt::TIME => PropertyValue::Time(src.u64(F)?),
            pt::GUID => PropertyValue::Guid(src.guid(F)?),
            pt::SERVER_ID => {
                let len = src.u16(F)? as usize;
                PropertyValue::ServerId(src.vec(len, F)?)
            }
            pt::BINARY => {
                let len = src.u16(F)? as usize;
                PropertyValue::Binary(src.vec(len, F)?)
            }
            pt::MULTIPLE_INTEGER16 => {
                let count = src.u32(F)?;
                PropertyValue::MultipleInteger16(
                    (0..count).map(|_| src.i16(F)).collect::<Result<_, _>>()?,
                )
            }
            pt::MULTIPLE_INTEGER32 => {
                let count = src.u32(F)?;
                PropertyValue::MultipleInteger32(
                    (0..count).map(|_| src.i32(F)).collect::<Result<_, _>>()?,
                )
            }
            pt::MULTIPLE_INTEGER64 => {
                let count = src.u32(F)?;
                PropertyValue::MultipleInteger64(
                    (0..count).map(|_| src.i64(F)).collect::<Result<_, _>>()?,
                )
            }
            pt::MULTIPLE_TIME => {
                let count = src.u32(F)?;
                PropertyValue::MultipleTime(
                    (0..count).map(|_| src.u64(F)).collect::<Result<_, _>>()?,
                )
            }
            pt::MULTIPLE_GUID => {
                let count = src.u32(F)?;
                PropertyValue::MultipleGuid(
                    (0..count).map(|_| src.guid(F)).collect::<Result<_, _>>()?,
                )
            }
            pt::MULTIPLE_STRING8 => {
                let count = src.u32(F)?;
                PropertyValue::MultipleString8(
                    (0..count).map(|_| src.string8(F)).collect::<Result<_, _>>()?,
                )
            }
            pt::MULTIPLE_STRING => {
                let count = src.u32(F)?;
                PropertyValue::MultipleString(
                    (0..count).map(|_| src.string16(F)).collect::<Result<_, _>>()?,
                )
            }
            pt::MULTIPLE_BINARY => {
                let count = src.u32(F)?;
                let mut values = Vec::new();
                for _ in 0..count {
                    let len = src.u16(F)? as usize;
                    values.push(src.vec(len, F)?);
                }
                PropertyValue::MultipleBinary(values)
            }
            other => return Err(ProtocolError::UnsupportedPropertyType(other)),
        };
        Ok(value)
    }

    /// Writes the type code followed by the value.
    pub fn encode_typed(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(self.property_type());
        self.encode(buf)
    }

    /// Reads a type code followed by a value of that type.
    pub fn decode_typed(src: &mut Reader) -> Result<Self, ProtocolError> {
        let property_type = src.u16("TypedPropertyValue.PropertyType")?;
        Self::decode(property_type, src)
    }
}

/// A property tag with its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedPropertyValue {
    pub property_tag: PropertyTag,
    pub value: PropertyValue,
}

impl TaggedPropertyValue {
    /// Builds a tagged value whose tag type matches the value.
    pub fn new(property_id: u16, value: PropertyValue) -> Self {
        Self {
            property_tag: PropertyTag::new(property_id, value.property_type()),
            value,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.property_tag.property_type != self.value.property_type() {
            return Err(ProtocolError::InvalidValue {
                field: "TaggedPropertyValue.PropertyTag",
                value: self.property_tag.as_u32(),
            });
        }
        self.property_tag.encode(buf);
        self.value.encode(buf)
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let property_tag = PropertyTag::decode(src)?;
        let value = PropertyValue::decode(property_tag.property_type, src)?;
        Ok(Self {
            property_tag,
            value,
        })
    }

    pub fn encoded_len(&self) -> Result<usize, ProtocolError> {
        let mut scratch = BytesMut::new();
        self.encode(&mut scratch)?;
        Ok(scratch.len())
    }
}

/// A cell in a flagged row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FlaggedValue {
    Present(PropertyValue),
    Absent,
    Error(u32),
}

/// One row of property values laid out against a known column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum PropertyRow {
    Standard(Vec<PropertyValue>),
    Flagged(Vec<FlaggedValue>),
}

impl PropertyRow {
    pub fn len(&self) -> usize {
        match self {
            PropertyRow::Standard(values) => values.len(),
            PropertyRow::Flagged(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encode(&self, columns: &[PropertyTag], buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.len() != columns.len() {
            return Err(ProtocolError::InvalidValue {
                field: "PropertyRow.ValueCount",
                value: self.len() as u32,
            });
        }
        match self {
            PropertyRow::Standard(values) => {
                buf.put_u8(0x00);
                for (column, value) in columns.iter().zip(values) {
                    encode_cell(column, value, buf)?;
                }
            }
            PropertyRow::Flagged(values) => {
                buf.put_u8(0x01);
                for (column, cell) in columns.iter().zip(values) {
                    match cell {
                        FlaggedValue::Present(value) => {
                            buf.put_u8(0x00);
                            encode_cell(column, value, buf)?;
                        }
                        FlaggedValue::Absent => buf.put_u8(0x01),
                        FlaggedValue::Error(code) => {
                            buf.put_u8(0x0A);
                            buf.put_u32_le(*code);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn decode(columns: &[PropertyTag], src: &mut Reader) -> Result<Self, ProtocolError> {
        match src.u8("PropertyRow.Flag")? {
            0x00 => {
                let values = columns
                    .iter()
                    .map(|column| decode_cell(column, src))
                    .collect::<Result<_, _>>()?;
                Ok(PropertyRow::Standard(values))
            }
            0x01 => {
                let mut values = Vec::with_capacity(columns.len());
                for column in columns {
                    let cell = match src.u8("FlaggedPropertyValue.Flag")? {
                        0x00 => FlaggedValue::Present(decode_cell(column, src)?),
                        0x01 => FlaggedValue::Absent,
                        0x0A => FlaggedValue::Error(src.u32("FlaggedPropertyValue.ErrorCode")?),
                        other => {
                            return Err(ProtocolError::InvalidValue {
                                field: "FlaggedPropertyValue.Flag",
                                value: other as u32,
                            })
                        }
                    };
                    values.push(cell);
                }
                Ok(PropertyRow::Flagged(values))
            }
            other => Err(ProtocolError::InvalidValue {
                field: "PropertyRow.Flag",
                value: other as u32,
            }),
        }
    }
}

fn encode_cell(
    column: &PropertyTag,
    value: &PropertyValue,
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    if column.property_type == pt::UNSPECIFIED {
        value.encode_typed(buf)
    } else {
        value.encode(buf)
    }
}

fn decode_cell(column: &PropertyTag, src: &mut Reader) -> Result<PropertyValue, ProtocolError> {
    if column.property_type == pt::UNSPECIFIED {
        PropertyValue::decode_typed(src)
    } else {
        PropertyValue::decode(column.property_type, src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    const PID_TAG_SUBJECT: PropertyTag = PropertyTag::new(0x0037, pt::STRING);
    const PID_TAG_MESSAGE_SIZE: PropertyTag = PropertyTag::new(0x0E08, pt::INTEGER32);
    const PID_TAG_ENTRY_ID: PropertyTag = PropertyTag::new(0x0FFF, pt::BINARY);

    #[test]
    fn test_value_layouts() {
        let mut buf = BytesMut::new();
        PropertyValue::Boolean(true).encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01]);

        buf.clear();
        PropertyValue::Binary(vec![0xAA, 0xBB]).encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x02, 0x00, 0xAA, 0xBB]);

        buf.clear();
        PropertyValue::MultipleInteger32(vec![1, 2])
            .encode(&mut buf)
            .unwrap();
        assert_eq!(&buf[..4], &[0x02, 0x00, 0x00, 0x00]);
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn test_multivalue_roundtrip() {
        let values = vec![
            PropertyValue::MultipleString(vec!["a".into(), "bc".into()]),
            PropertyValue::MultipleString8(vec!["x".into()]),
            PropertyValue::MultipleBinary(vec![vec![1], vec![]]),
            PropertyValue::MultipleGuid(vec![Uuid::from_u128(7)]),
        ];
        for value in values {
            let mut buf = BytesMut::new();
            value.encode(&mut buf).unwrap();
            let mut src = Reader::new(buf.freeze());
            assert_eq!(
                PropertyValue::decode(value.property_type(), &mut src).unwrap(),
                value
            );
            assert!(src.is_empty());
        }
    }

    #[test]
    fn test_unsupported_type() {
        let mut src = Reader::new(Bytes::from_static(&[0; 8]));
        assert!(matches!(
            PropertyValue::decode(0x00FD, &mut src),
            Err(ProtocolError::UnsupportedPropertyType(0x00FD))
        ));
    }

    #[test]
    fn test_tagged_value_type_mismatch() {
        let tagged = TaggedPropertyValue {
            property_tag: PID_TAG_SUBJECT,
            value: PropertyValue::Integer32(5),
        };
        let mut buf = BytesMut::new();
        assert!(tagged.encode(&mut buf).is_err());

        let tagged = TaggedPropertyValue::new(0x0037, PropertyValue::String("Hi".into()));
        assert_eq!(tagged.property_tag, PID_TAG_SUBJECT);
        assert_eq!(tagged.encoded_len().unwrap(), 4 + 6);
    }

    #[test]
    fn test_standard_row() {
        let columns = [PID_TAG_SUBJECT, PID_TAG_MESSAGE_SIZE, PID_TAG_ENTRY_ID];
        let row = PropertyRow::Standard(vec![
            PropertyValue::String("Status".into()),
            PropertyValue::Integer32(1024),
            PropertyValue::Binary(vec![0; 46]),
        ]);
        let mut buf = BytesMut::new();
        row.encode(&columns, &mut buf).unwrap();
        assert_eq!(buf[0], 0x00);

        let mut src = Reader::new(buf.freeze());
        assert_eq!(PropertyRow::decode(&columns, &mut src).unwrap(), row);
        assert!(src.is_empty());
    }

    #[test]
    fn test_flagged_row_cells() {
        let columns = [PID_TAG_SUBJECT, PID_TAG_MESSAGE_SIZE, PID_TAG_ENTRY_ID];
        let row = PropertyRow::Flagged(vec![
            FlaggedValue::Present(PropertyValue::String("Hello".into())),
            FlaggedValue::Absent,
            FlaggedValue::Error(0x8004_010F),
        ]);
        let mut buf = BytesMut::new();
        row.encode(&columns, &mut buf).unwrap();

        let mut src = Reader::new(buf.freeze());
        assert_eq!(PropertyRow::decode(&columns, &mut src).unwrap(), row);
    }

    #[test]
    fn test_unspecified_column_carries_type() {
        let columns = [PropertyTag::new(0x3001, pt::UNSPECIFIED)];
        let row = PropertyRow::Standard(vec![PropertyValue::String8("Inbox".into())]);
        let mut buf = BytesMut::new();
        row.encode(&columns, &mut buf).unwrap();
        assert_eq!(&buf[1..3], &[0x1E, 0x00]);

        let mut src = Reader::new(buf.freeze());
        assert_eq!(PropertyRow::decode(&columns, &mut src).unwrap(), row);
    }

    #[test]
    fn test_row_width_must_match_columns() {
        let row = PropertyRow::Standard(vec![PropertyValue::Integer32(1)]);
        let mut buf = BytesMut::new();
        assert!(row
            .encode(&[PID_TAG_SUBJECT, PID_TAG_MESSAGE_SIZE], &mut buf)
            .is_err());
    }

    #[test]
    fn test_filetime_conversion() {
        assert_eq!(
            filetime_to_datetime(FILETIME_UNIX_OFFSET).map(|t| t.timestamp()),
            Some(0)
        );
        assert_eq!(filetime_to_datetime(0), None);

        let time = DateTime::from_timestamp(1_700_000_000, 500).unwrap();
        let filetime = datetime_to_filetime(&time);
        assert_eq!(
            PropertyValue::Time(filetime).as_datetime().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }
}
