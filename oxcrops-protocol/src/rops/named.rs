//! Named property ROPs.
//!
//! Named properties are addressed on the wire by a 16-bit id the store
//! assigns per mailbox. These ROPs translate between those ids and the
//! (property set GUID, name or LID) pairs clients know them by.

use super::{
    DecodeContext, HandleSlots, RopOutcome, RopRequestBody, RopResponseBody, RopStructure,
};
use crate::error::ProtocolError;
use crate::rop_id::RopId;
use crate::wire::{count_u16, count_u8, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flags of GetPropertyIdsFromNames.
pub mod id_from_name_flags {
    pub const NONE: u8 = 0x00;
    /// Assign ids to names the store has not seen.
    pub const CREATE: u8 = 0x02;
}

/// QueryFlags of QueryNamedProperties.
pub mod query_flags {
    pub const NO_STRINGS: u8 = 0x01;
    pub const NO_IDS: u8 = 0x02;
}

const KIND_LID: u8 = 0x00;
const KIND_NAME: u8 = 0x01;
const KIND_NONE: u8 = 0xFF;

/// A named property as clients address it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyName {
    Lid { guid: Uuid, lid: u32 },
    Name { guid: Uuid, name: String },
    /// The id maps to no name.
    None { guid: Uuid },
}

impl PropertyName {
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            PropertyName::Lid { guid, lid } => {
                buf.put_u8(KIND_LID);
                buf.put_guid(guid);
                buf.put_u32_le(*lid);
            }
            PropertyName::Name { guid, name } => {
                buf.put_u8(KIND_NAME);
                buf.put_guid(guid);
                let mut raw = BytesMut::new();
                raw.put_string16(name, "Name")?;
                buf.put_u8(count_u8(raw.len(), "Name")?);
                buf.put_slice(&raw);
            }
            PropertyName::None { guid } => {
                buf.put_u8(KIND_NONE);
                buf.put_guid(guid);
            }
        }
        Ok(())
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let kind = src.u8("Kind")?;
        let guid = src.guid("Guid")?;
        match kind {
            KIND_LID => Ok(PropertyName::Lid {
                guid,
                lid: src.u32("LID")?,
            }),
            KIND_NAME => {
                let size = src.u8("NameSize")? as usize;
                // The terminator is counted in NameSize.
                let mut name = Reader::new(src.bytes(size, "Name")?);
                let decoded = name.string16("Name")?;
                if !name.is_empty() {
                    return Err(ProtocolError::InvalidString("Name"));
                }
                Ok(PropertyName::Name {
                    guid,
                    name: decoded,
                })
            }
            KIND_NONE => Ok(PropertyName::None { guid }),
            other => Err(ProtocolError::InvalidValue {
                field: "Kind",
                value: other as u32,
            }),
        }
    }
}

fn encode_names(names: &[PropertyName], buf: &mut BytesMut) -> Result<(), ProtocolError> {
    for name in names {
        name.encode(buf)?;
    }
    Ok(())
}

fn decode_names(src: &mut Reader, count: u16) -> Result<Vec<PropertyName>, ProtocolError> {
    (0..count).map(|_| PropertyName::decode(src)).collect()
}

fn encode_ids(ids: &[u16], buf: &mut BytesMut, field: &'static str) -> Result<(), ProtocolError> {
    buf.put_u16_le(count_u16(ids.len(), field)?);
    for id in ids {
        buf.put_u16_le(*id);
    }
    Ok(())
}

fn decode_ids(src: &mut Reader, count_field: &'static str) -> Result<Vec<u16>, ProtocolError> {
    let count = src.u16(count_field)?;
    (0..count).map(|_| src.u16("PropertyId")).collect()
}

// =========================================================================
// GetPropertyIdsFromNames
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPropertyIdsFromNamesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub flags: u8,
    /// Empty asks for every named property of the mailbox.
    pub property_names: Vec<PropertyName>,
}

impl RopStructure for GetPropertyIdsFromNamesRequest {
    const ROP_ID: RopId = RopId::GetPropertyIdsFromNames;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.flags);
        buf.put_u16_le(count_u16(self.property_names.len(), "PropertyNames")?);
        encode_names(&self.property_names, buf)
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let flags = src.u8("Flags")?;
        let count = src.u16("PropertyNameCount")?;
        Ok(Self {
            logon_id,
            input_handle_index,
            flags,
            property_names: decode_names(src, count)?,
        })
    }
}

impl RopRequestBody for GetPropertyIdsFromNamesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPropertyIdsFromNamesResponse {
    pub input_handle_index: u8,
    /// One id per requested name; 0 where a name has none.
    pub outcome: RopOutcome<Vec<u16>>,
}

impl RopStructure for GetPropertyIdsFromNamesResponse {
    const ROP_ID: RopId = RopId::GetPropertyIdsFromNames;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome
            .encode_with(buf, |ids, buf| encode_ids(ids, buf, "PropertyIds"))
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| decode_ids(src, "PropertyIdCount"))?,
        })
    }
}

impl RopResponseBody for GetPropertyIdsFromNamesResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// GetNamesFromPropertyIds
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNamesFromPropertyIdsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub property_ids: Vec<u16>,
}

impl RopStructure for GetNamesFromPropertyIdsRequest {
    const ROP_ID: RopId = RopId::GetNamesFromPropertyIds;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        encode_ids(&self.property_ids, buf, "PropertyIds")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            property_ids: decode_ids(src, "PropertyIdCount")?,
        })
    }
}

impl RopRequestBody for GetNamesFromPropertyIdsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNamesFromPropertyIdsResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<PropertyName>>,
}

impl RopStructure for GetNamesFromPropertyIdsResponse {
    const ROP_ID: RopId = RopId::GetNamesFromPropertyIds;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |names, buf| {
            buf.put_u16_le(count_u16(names.len(), "PropertyNames")?);
            encode_names(names, buf)
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let count = src.u16("PropertyNameCount")?;
                decode_names(src, count)
            })?,
        })
    }
}

impl RopResponseBody for GetNamesFromPropertyIdsResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// QueryNamedProperties
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryNamedPropertiesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub query_flags: u8,
    /// Restricts the answer to one property set.
    pub property_guid: Option<Uuid>,
}

impl RopStructure for QueryNamedPropertiesRequest {
    const ROP_ID: RopId = RopId::QueryNamedProperties;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.query_flags);
        buf.put_bool(self.property_guid.is_some());
        if let Some(guid) = &self.property_guid {
            buf.put_guid(guid);
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let query_flags = src.u8("QueryFlags")?;
        let property_guid = if src.bool("HasGuid")? {
            Some(src.guid("PropertyGuid")?)
        } else {
            None
        };
        Ok(Self {
            logon_id,
            input_handle_index,
            query_flags,
            property_guid,
        })
    }
}

impl RopRequestBody for QueryNamedPropertiesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedProperty {
    pub property_id: u16,
    pub name: PropertyName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryNamedPropertiesResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<NamedProperty>>,
}

impl RopStructure for QueryNamedPropertiesResponse {
    const ROP_ID: RopId = RopId::QueryNamedProperties;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        // All ids come first, then the names in the same order.
        self.outcome.encode_with(buf, |named, buf| {
            buf.put_u16_le(count_u16(named.len(), "PropertyIds")?);
            for property in named {
                buf.put_u16_le(property.property_id);
            }
            for property in named {
                property.name.encode(buf)?;
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let ids = decode_ids(src, "IdCount")?;
                ids.into_iter()
                    .map(|property_id| {
                        Ok(NamedProperty {
                            property_id,
                            name: PropertyName::decode(src)?,
                        })
                    })
                    .collect()
            })?,
        })
    }
}

impl RopResponseBody for QueryNamedPropertiesResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rops::test_support::reencode;

    const PS_PUBLIC_STRINGS: Uuid = Uuid::from_u128(0x0002_0329_0000_0000_c000_0000_0000_0046);
    const PSETID_COMMON: Uuid = Uuid::from_u128(0x0006_2008_0000_0000_c000_0000_0000_0046);

    #[test]
    fn test_property_name_kinds() {
        let mut buf = BytesMut::new();
        PropertyName::Lid {
            guid: PSETID_COMMON,
            lid: 0x8503,
        }
        .encode(&mut buf)
        .unwrap();
        assert_eq!(buf.len(), 1 + 16 + 4);

        let mut buf = BytesMut::new();
        PropertyName::Name {
            guid: PS_PUBLIC_STRINGS,
            name: "Keywords".into(),
        }
        .encode(&mut buf)
        .unwrap();
        // "Keywords" plus terminator in UTF-16.
        assert_eq!(buf[17], 18);
        assert_eq!(buf.len(), 1 + 16 + 1 + 18);

        let mut buf = BytesMut::new();
        PropertyName::None {
            guid: PS_PUBLIC_STRINGS,
        }
        .encode(&mut buf)
        .unwrap();
        assert_eq!(buf.len(), 1 + 16);
    }

    #[test]
    fn test_property_name_unknown_kind() {
        let mut raw = vec![0x05];
        raw.extend_from_slice(&[0u8; 16]);
        let mut src = Reader::new(raw.into());
        assert!(matches!(
            PropertyName::decode(&mut src),
            Err(ProtocolError::InvalidValue { field: "Kind", .. })
        ));
    }

    #[test]
    fn test_ids_from_names() {
        let request = GetPropertyIdsFromNamesRequest {
            logon_id: 0,
            input_handle_index: 0,
            flags: id_from_name_flags::CREATE,
            property_names: vec![
                PropertyName::Lid {
                    guid: PSETID_COMMON,
                    lid: 0x8503,
                },
                PropertyName::Name {
                    guid: PS_PUBLIC_STRINGS,
                    name: "Keywords".into(),
                },
            ],
        };
        let (_, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(decoded, request);

        let response = GetPropertyIdsFromNamesResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Success(vec![0x8001, 0x8002]),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 2 + 4);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_query_named_properties_ids_then_names() {
        let request = QueryNamedPropertiesRequest {
            logon_id: 0,
            input_handle_index: 0,
            query_flags: query_flags::NO_STRINGS,
            property_guid: Some(PSETID_COMMON),
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 4 + 16);
        assert_eq!(decoded, request);

        let response = QueryNamedPropertiesResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Success(vec![
                NamedProperty {
                    property_id: 0x8001,
                    name: PropertyName::Lid {
                        guid: PSETID_COMMON,
                        lid: 0x8503,
                    },
                },
                NamedProperty {
                    property_id: 0x8002,
                    name: PropertyName::Lid {
                        guid: PSETID_COMMON,
                        lid: 0x8506,
                    },
                },
            ]),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(&bytes[5..11], &[0x02, 0x00, 0x01, 0x80, 0x02, 0x80]);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_names_from_ids_failure() {
        let response = GetNamesFromPropertyIdsResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Failure(0x8004_010F),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4);
        assert_eq!(decoded, response);
    }
}
