//! Value types shared across ROP structures.

use crate::error::ProtocolError;
use crate::wire::{count_u16, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque object handle assigned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerObjectHandle(pub u32);

impl ServerObjectHandle {
    /// Placeholder for an unmapped index or an output slot not yet filled.
    pub const INVALID: ServerObjectHandle = ServerObjectHandle(crate::INVALID_HANDLE);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for ServerObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Kind of store a logon was opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogonKind {
    #[default]
    Private,
    Public,
}

/// Logon kind per LogonId, needed to decode the few request layouts that
/// differ between private mailboxes and public folders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogonKinds {
    kinds: HashMap<u8, LogonKind>,
}

impl LogonKinds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, logon_id: u8, kind: LogonKind) {
        self.kinds.insert(logon_id, kind);
    }

    pub fn remove(&mut self, logon_id: u8) {
        self.kinds.remove(&logon_id);
    }

    /// Unknown logons are treated as private mailboxes.
    pub fn get(&self, logon_id: u8) -> LogonKind {
        self.kinds.get(&logon_id).copied().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
    }
}

/// Location-independent object identifier.
///
/// Wire layout: 16-byte database GUID, 6-byte global counter, 2 pad bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LongTermId {
    pub database_guid: Uuid,
    pub global_counter: [u8; 6],
}

impl LongTermId {
    pub const SIZE: usize = 24;

    pub fn new(database_guid: Uuid, global_counter: [u8; 6]) -> Self {
        Self {
            database_guid,
            global_counter,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_guid(&self.database_guid);
        buf.put_slice(&self.global_counter);
        buf.put_u16_le(0);
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let database_guid = src.guid("LongTermId.DatabaseGuid")?;
        let global_counter = src.array::<6>("LongTermId.GlobalCounter")?;
        src.u16("LongTermId.Pad")?;
        Ok(Self {
            database_guid,
            global_counter,
        })
    }
}

/// Property type and identifier packed as on the wire (type first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyTag {
    pub property_type: u16,
    pub property_id: u16,
}

impl PropertyTag {
    pub const SIZE: usize = 4;

    pub const fn new(property_id: u16, property_type: u16) -> Self {
        Self {
            property_type,
            property_id,
        }
    }

    /// Builds a tag from its conventional `0xIIIITTTT` form.
    pub const fn from_u32(tag: u32) -> Self {
        Self {
            property_type: (tag & 0xFFFF) as u16,
            property_id: (tag >> 16) as u16,
        }
    }

    pub const fn as_u32(&self) -> u32 {
        ((self.property_id as u32) << 16) | self.property_type as u32
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.property_type);
        buf.put_u16_le(self.property_id);
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let property_type = src.u16("PropertyTag.PropertyType")?;
        let property_id = src.u16("PropertyTag.PropertyId")?;
        Ok(Self {
            property_type,
            property_id,
        })
    }

    pub(crate) fn encode_list(
        tags: &[PropertyTag],
        buf: &mut BytesMut,
        what: &'static str,
    ) -> Result<(), ProtocolError> {
        buf.put_u16_le(count_u16(tags.len(), what)?);
        for tag in tags {
            tag.encode(buf);
        }
        Ok(())
    }

    pub(crate) fn decode_list(
        src: &mut Reader,
        what: &'static str,
    ) -> Result<Vec<PropertyTag>, ProtocolError> {
        let count = src.u16(what)?;
        (0..count).map(|_| PropertyTag::decode(src)).collect()
    }
}

impl fmt::Display for PropertyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.as_u32())
    }
}

/// A string whose encoding is announced by a leading type byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedString {
    /// No string present (type 0x00).
    Absent,
    /// Present but empty (type 0x01).
    Empty,
    /// Null-terminated 8-bit string (type 0x02).
    String8(String),
    /// Unicode string sent as 8-bit characters (type 0x03).
    ReducedUnicode(String),
    /// Null-terminated UTF-16 string (type 0x04).
    Unicode(String),
}

impl TypedString {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedString::Absent => None,
            TypedString::Empty => Some(""),
            TypedString::String8(s) | TypedString::ReducedUnicode(s) | TypedString::Unicode(s) => {
                Some(s)
            }
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            TypedString::Absent => buf.put_u8(0x00),
            TypedString::Empty => buf.put_u8(0x01),
            TypedString::String8(s) => {
                buf.put_u8(0x02);
                buf.put_string8(s, "TypedString")?;
            }
            TypedString::ReducedUnicode(s) => {
                buf.put_u8(0x03);
                buf.put_string8(s, "TypedString")?;
            }
            TypedString::Unicode(s) => {
                buf.put_u8(0x04);
                buf.put_string16(s, "TypedString")?;
            }
        }
        Ok(())
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        match src.u8("TypedString.StringType")? {
            0x00 => Ok(TypedString::Absent),
            0x01 => Ok(TypedString::Empty),
            0x02 => Ok(TypedString::String8(src.string8("TypedString")?)),
            0x03 => Ok(TypedString::ReducedUnicode(src.string8("TypedString")?)),
            0x04 => Ok(TypedString::Unicode(src.string16("TypedString")?)),
            other => Err(ProtocolError::InvalidValue {
                field: "TypedString.StringType",
                value: other as u32,
            }),
        }
    }
}

/// Replica servers returned for a ghosted public folder.
///
/// On the wire: `ServerCount u16`, `CheapServerCount u16`, then
/// `ServerCount` null-terminated 8-bit server names. The first
/// `cheap_server_count` entries are the cheapest to reach.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplicaServers {
    pub cheap_server_count: u16,
    pub servers: Vec<String>,
}

impl ReplicaServers {
    pub fn new(servers: Vec<String>, cheap_server_count: u16) -> Self {
        Self {
            cheap_server_count,
            servers,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(count_u16(self.servers.len(), "Servers")?);
        buf.put_u16_le(self.cheap_server_count);
        for server in &self.servers {
            buf.put_string8(server, "Servers")?;
        }
        Ok(())
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let server_count = src.u16("ServerCount")?;
        let cheap_server_count = src.u16("CheapServerCount")?;
        let servers = (0..server_count)
            .map(|_| src.string8("Servers"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            cheap_server_count,
            servers,
        })
    }
}

/// Server-local logon time, as returned in a private-mailbox logon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogonTime {
    pub seconds: u8,
    pub minutes: u8,
    pub hour: u8,
    /// 0 is Sunday.
    pub day_of_week: u8,
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl LogonTime {
    pub const SIZE: usize = 8;

    pub fn from_datetime(time: &NaiveDateTime) -> Self {
        Self {
            seconds: time.second() as u8,
            minutes: time.minute() as u8,
            hour: time.hour() as u8,
            day_of_week: time.weekday().num_days_from_sunday() as u8,
            day: time.day() as u8,
            month: time.month() as u8,
            year: time.year().clamp(0, u16::MAX as i32) as u16,
        }
    }

    /// Converts to a calendar time, or `None` if the fields are out of range.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, self.minutes as u32, self.seconds as u32)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.seconds);
        buf.put_u8(self.minutes);
        buf.put_u8(self.hour);
        buf.put_u8(self.day_of_week);
        buf.put_u8(self.day);
        buf.put_u8(self.month);
        buf.put_u16_le(self.year);
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            seconds: src.u8("LogonTime.Seconds")?,
            minutes: src.u8("LogonTime.Minutes")?,
            hour: src.u8("LogonTime.Hour")?,
            day_of_week: src.u8("LogonTime.DayOfWeek")?,
            day: src.u8("LogonTime.Day")?,
            month: src.u8("LogonTime.Month")?,
            year: src.u16("LogonTime.Year")?,
        })
    }
}

/// A property that could not be read, written or copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyProblem {
    /// Position of the property in the request.
    pub index: u16,
    pub property_tag: PropertyTag,
    pub error_code: u32,
}

impl PropertyProblem {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.index);
        self.property_tag.encode(buf);
        buf.put_u32_le(self.error_code);
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            index: src.u16("PropertyProblem.Index")?,
            property_tag: PropertyTag::decode(src)?,
            error_code: src.u32("PropertyProblem.ErrorCode")?,
        })
    }

    pub(crate) fn encode_list(
        problems: &[PropertyProblem],
        buf: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        buf.put_u16_le(count_u16(problems.len(), "PropertyProblems")?);
        for problem in problems {
            problem.encode(buf);
        }
        Ok(())
    }

    pub(crate) fn decode_list(src: &mut Reader) -> Result<Vec<PropertyProblem>, ProtocolError> {
        let count = src.u16("PropertyProblemCount")?;
        (0..count).map(|_| PropertyProblem::decode(src)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn reader(buf: BytesMut) -> Reader {
        Reader::new(buf.freeze())
    }

    #[test]
    fn test_long_term_id_layout() {
        let ltid = LongTermId::new(Uuid::from_u128(0xAABB), [1, 2, 3, 4, 5, 6]);
        let mut buf = BytesMut::new();
        ltid.encode(&mut buf);
        assert_eq!(buf.len(), LongTermId::SIZE);
        assert_eq!(&buf[16..22], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&buf[22..], &[0, 0]);

        assert_eq!(LongTermId::decode(&mut reader(buf)).unwrap(), ltid);
    }

    #[test]
    fn test_property_tag_packing() {
        let tag = PropertyTag::from_u32(0x0037_001F);
        assert_eq!(tag.property_id, 0x0037);
        assert_eq!(tag.property_type, 0x001F);
        assert_eq!(tag.as_u32(), 0x0037_001F);
        assert_eq!(tag.to_string(), "0x0037001f");

        let mut buf = BytesMut::new();
        tag.encode(&mut buf);
        assert_eq!(&buf[..], &[0x1F, 0x00, 0x37, 0x00]);
    }

    #[test]
    fn test_typed_string_variants() {
        let cases = vec![
            TypedString::Absent,
            TypedString::Empty,
            TypedString::String8("RE: ".to_string()),
            TypedString::ReducedUnicode("FW: ".to_string()),
            TypedString::Unicode("Réunion".to_string()),
        ];
        let mut buf = BytesMut::new();
        for case in &cases {
            case.encode(&mut buf).unwrap();
        }
        let mut src = reader(buf);
        for case in &cases {
            assert_eq!(&TypedString::decode(&mut src).unwrap(), case);
        }
        assert!(src.is_empty());
        assert_eq!(TypedString::Absent.as_str(), None);
        assert_eq!(TypedString::Empty.as_str(), Some(""));
    }

    #[test]
    fn test_typed_string_bad_type() {
        let mut src = Reader::new(Bytes::from_static(&[0x09]));
        assert!(matches!(
            TypedString::decode(&mut src),
            Err(ProtocolError::InvalidValue { value: 9, .. })
        ));
    }

    #[test]
    fn test_replica_servers_count_computed() {
        let servers = ReplicaServers::new(vec!["mbx1".into(), "mbx2".into()], 1);
        let mut buf = BytesMut::new();
        servers.encode(&mut buf).unwrap();
        assert_eq!(&buf[..4], &[2, 0, 1, 0]);
        assert_eq!(ReplicaServers::decode(&mut reader(buf)).unwrap(), servers);
    }

    #[test]
    fn test_logon_time_conversion() {
        let time = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(13, 45, 7)
            .unwrap();
        let logon_time = LogonTime::from_datetime(&time);
        assert_eq!(logon_time.day_of_week, 4);
        assert_eq!(logon_time.to_datetime(), Some(time));

        let bogus = LogonTime {
            month: 13,
            ..logon_time
        };
        assert_eq!(bogus.to_datetime(), None);
    }

    #[test]
    fn test_logon_kinds_default_private() {
        let mut kinds = LogonKinds::new();
        assert_eq!(kinds.get(3), LogonKind::Private);
        kinds.set(3, LogonKind::Public);
        assert_eq!(kinds.get(3), LogonKind::Public);
        kinds.clear();
        assert_eq!(kinds.get(3), LogonKind::Private);
    }

    #[test]
    fn test_invalid_handle() {
        assert!(!ServerObjectHandle::INVALID.is_valid());
        assert!(ServerObjectHandle(0x10).is_valid());
        assert_eq!(ServerObjectHandle(0x10).to_string(), "0x00000010");
    }
}
