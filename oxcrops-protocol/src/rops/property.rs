//! Property ROPs.
//!
//! GetPropertiesSpecific returns a bare row whose cells are laid out
//! against the tags of its own request, so the decoder must be handed
//! those tags as the column set.

use super::{
    DecodeContext, DualHandleOutcome, HandleSlots, RopOutcome, RopRequestBody, RopResponseBody,
    RopStructure,
};
use crate::classify::ResponseKind;
use crate::error::ProtocolError;
use crate::property::{PropertyRow, TaggedPropertyValue};
use crate::rop_id::RopId;
use crate::types::{PropertyProblem, PropertyTag};
use crate::wire::{count_u16, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// CopyFlags of CopyProperties and CopyTo.
pub mod copy_flags {
    pub const MOVE: u8 = 0x01;
    pub const NO_OVERWRITE: u8 = 0x02;
}

// =========================================================================
// Reading properties
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPropertiesSpecificRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    /// Largest value size the server should return; 0 means no limit.
    pub property_size_limit: u16,
    pub want_unicode: u16,
    pub property_tags: Vec<PropertyTag>,
}

impl GetPropertiesSpecificRequest {
    pub fn new(logon_id: u8, input_handle_index: u8, property_tags: Vec<PropertyTag>) -> Self {
        Self {
            logon_id,
            input_handle_index,
            property_size_limit: 0,
            want_unicode: 1,
            property_tags,
        }
    }
}

impl RopStructure for GetPropertiesSpecificRequest {
    const ROP_ID: RopId = RopId::GetPropertiesSpecific;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u16_le(self.property_size_limit);
        buf.put_u16_le(self.want_unicode);
        PropertyTag::encode_list(&self.property_tags, buf, "PropertyTags")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            property_size_limit: src.u16("PropertySizeLimit")?,
            want_unicode: src.u16("WantUnicode")?,
            property_tags: PropertyTag::decode_list(src, "PropertyTagCount")?,
        })
    }
}

impl RopRequestBody for GetPropertiesSpecificRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

/// A row together with the columns it was laid out against.
///
/// `columns` is not transmitted; it is the context the row was decoded
/// with and the layout used to encode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub columns: Vec<PropertyTag>,
    pub row: PropertyRow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPropertiesSpecificResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<ColumnRow>,
}

impl RopStructure for GetPropertiesSpecificResponse {
    const ROP_ID: RopId = RopId::GetPropertiesSpecific;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome
            .encode_with(buf, |data, buf| data.row.encode(&data.columns, buf))
    }

    fn decode_body(src: &mut Reader, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let input_handle_index = src.u8("InputHandleIndex")?;
        let outcome = RopOutcome::decode_with(src, |src| {
            let columns = ctx.require_columns(input_handle_index)?;
            Ok(ColumnRow {
                columns: columns.to_vec(),
                row: PropertyRow::decode(columns, src)?,
            })
        })?;
        Ok(Self {
            input_handle_index,
            outcome,
        })
    }
}

impl RopResponseBody for GetPropertiesSpecificResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPropertiesAllRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub property_size_limit: u16,
    pub want_unicode: u16,
}

impl RopStructure for GetPropertiesAllRequest {
    const ROP_ID: RopId = RopId::GetPropertiesAll;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u16_le(self.property_size_limit);
        buf.put_u16_le(self.want_unicode);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            property_size_limit: src.u16("PropertySizeLimit")?,
            want_unicode: src.u16("WantUnicode")?,
        })
    }
}

impl RopRequestBody for GetPropertiesAllRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

pub(crate) fn encode_tagged_values(
    values: &[TaggedPropertyValue],
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    buf.put_u16_le(count_u16(values.len(), "PropertyValues")?);
    for value in values {
        value.encode(buf)?;
    }
    Ok(())
}

pub(crate) fn decode_tagged_values(
    src: &mut Reader,
) -> Result<Vec<TaggedPropertyValue>, ProtocolError> {
    let count = src.u16("PropertyValueCount")?;
    (0..count).map(|_| TaggedPropertyValue::decode(src)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPropertiesAllResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<TaggedPropertyValue>>,
}

impl RopStructure for GetPropertiesAllResponse {
    const ROP_ID: RopId = RopId::GetPropertiesAll;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome
            .encode_with(buf, |values, buf| encode_tagged_values(values, buf))
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, decode_tagged_values)?,
        })
    }
}

impl RopResponseBody for GetPropertiesAllResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

super::input_only_request!(GetPropertiesListRequest, RopId::GetPropertiesList);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPropertiesListResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<PropertyTag>>,
}

impl RopStructure for GetPropertiesListResponse {
    const ROP_ID: RopId = RopId::GetPropertiesList;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome
            .encode_with(buf, |tags, buf| PropertyTag::encode_list(tags, buf, "PropertyTags"))
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                PropertyTag::decode_list(src, "PropertyTagCount")
            })?,
        })
    }
}

impl RopResponseBody for GetPropertiesListResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Writing and deleting properties
// =========================================================================

/// Declares a response whose success body is a PropertyProblem list.
macro_rules! problems_response {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub input_handle_index: u8,
            pub outcome: RopOutcome<Vec<PropertyProblem>>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.input_handle_index);
                self.outcome
                    .encode_with(buf, |problems, buf| PropertyProblem::encode_list(problems, buf))
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    input_handle_index: src.u8("InputHandleIndex")?,
                    outcome: RopOutcome::decode_with(src, PropertyProblem::decode_list)?,
                })
            }
        }

        impl RopResponseBody for $name {
            fn handle_index(&self) -> Option<u8> {
                Some(self.input_handle_index)
            }

            fn return_value(&self) -> u32 {
                self.outcome.return_value()
            }
        }
    };
}

/// Declares a SetProperties-shaped request.
///
/// PropertyValueSize counts the PropertyValueCount field and the values.
macro_rules! set_properties_request {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub property_values: Vec<TaggedPropertyValue>,
        }

        impl $name {
            pub fn new(
                logon_id: u8,
                input_handle_index: u8,
                property_values: Vec<TaggedPropertyValue>,
            ) -> Self {
                Self {
                    logon_id,
                    input_handle_index,
                    property_values,
                }
            }
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                let mut values = BytesMut::new();
                encode_tagged_values(&self.property_values, &mut values)?;
                buf.put_u16_le(count_u16(values.len(), "PropertyValueSize")?);
                buf.put_slice(&values);
                Ok(())
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                let logon_id = src.u8("LogonId")?;
                let input_handle_index = src.u8("InputHandleIndex")?;
                let size = src.u16("PropertyValueSize")? as usize;
                let mut values = Reader::new(src.bytes(size, "PropertyValues")?);
                let property_values = decode_tagged_values(&mut values)?;
                if !values.is_empty() {
                    return Err(ProtocolError::InvalidValue {
                        field: "PropertyValueSize",
                        value: size as u32,
                    });
                }
                Ok(Self {
                    logon_id,
                    input_handle_index,
                    property_values,
                })
            }
        }

        impl RopRequestBody for $name {
            fn logon_id(&self) -> u8 {
                self.logon_id
            }

            fn handle_slots(&self) -> HandleSlots {
                HandleSlots::input(self.input_handle_index)
            }
        }
    };
}

/// Declares a DeleteProperties-shaped request.
macro_rules! delete_properties_request {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub property_tags: Vec<PropertyTag>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                PropertyTag::encode_list(&self.property_tags, buf, "PropertyTags")
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    logon_id: src.u8("LogonId")?,
                    input_handle_index: src.u8("InputHandleIndex")?,
                    property_tags: PropertyTag::decode_list(src, "PropertyTagCount")?,
                })
            }
        }

        impl RopRequestBody for $name {
            fn logon_id(&self) -> u8 {
                self.logon_id
            }

            fn handle_slots(&self) -> HandleSlots {
                HandleSlots::input(self.input_handle_index)
            }
        }
    };
}

set_properties_request!(SetPropertiesRequest, RopId::SetProperties);
set_properties_request!(SetPropertiesNoReplicateRequest, RopId::SetPropertiesNoReplicate);
problems_response!(SetPropertiesResponse, RopId::SetProperties);
problems_response!(SetPropertiesNoReplicateResponse, RopId::SetPropertiesNoReplicate);

delete_properties_request!(DeletePropertiesRequest, RopId::DeleteProperties);
delete_properties_request!(
    DeletePropertiesNoReplicateRequest,
    RopId::DeletePropertiesNoReplicate
);
problems_response!(DeletePropertiesResponse, RopId::DeleteProperties);
problems_response!(
    DeletePropertiesNoReplicateResponse,
    RopId::DeletePropertiesNoReplicate
);

// =========================================================================
// Copying properties between objects
// =========================================================================

/// Declares a dual-handle response whose success body is a problem list.
/// The Null Destination shape carries only DestHandleIndex.
macro_rules! copy_response {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub source_handle_index: u8,
            pub outcome: DualHandleOutcome<Vec<PropertyProblem>, ()>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.source_handle_index);
                self.outcome.encode_with(
                    buf,
                    |problems, buf| PropertyProblem::encode_list(problems, buf),
                    |_, _| Ok(()),
                    |_, _| Ok(()),
                )
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    source_handle_index: src.u8("SourceHandleIndex")?,
                    outcome: DualHandleOutcome::decode_with(
                        src,
                        PropertyProblem::decode_list,
                        |_| Ok(()),
                        |_| Ok(()),
                    )?,
                })
            }
        }

        impl RopResponseBody for $name {
            fn handle_index(&self) -> Option<u8> {
                Some(self.source_handle_index)
            }

            fn return_value(&self) -> u32 {
                self.outcome.return_value()
            }

            fn kind(&self) -> ResponseKind {
                self.outcome.kind()
            }
        }
    };
}

copy_response!(CopyPropertiesResponse, RopId::CopyProperties);
copy_response!(CopyToResponse, RopId::CopyTo);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyPropertiesRequest {
    pub logon_id: u8,
    pub source_handle_index: u8,
    pub dest_handle_index: u8,
    pub want_asynchronous: bool,
    pub copy_flags: u8,
    pub property_tags: Vec<PropertyTag>,
}

impl RopStructure for CopyPropertiesRequest {
    const ROP_ID: RopId = RopId::CopyProperties;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.source_handle_index);
        buf.put_u8(self.dest_handle_index);
        buf.put_bool(self.want_asynchronous);
        buf.put_u8(self.copy_flags);
        PropertyTag::encode_list(&self.property_tags, buf, "PropertyTags")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            source_handle_index: src.u8("SourceHandleIndex")?,
            dest_handle_index: src.u8("DestHandleIndex")?,
            want_asynchronous: src.bool("WantAsynchronous")?,
            copy_flags: src.u8("CopyFlags")?,
            property_tags: PropertyTag::decode_list(src, "PropertyTagCount")?,
        })
    }
}

impl RopRequestBody for CopyPropertiesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::source_destination(self.source_handle_index, self.dest_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyToRequest {
    pub logon_id: u8,
    pub source_handle_index: u8,
    pub dest_handle_index: u8,
    pub want_asynchronous: bool,
    pub want_sub_objects: bool,
    pub copy_flags: u8,
    pub excluded_tags: Vec<PropertyTag>,
}

impl RopStructure for CopyToRequest {
    const ROP_ID: RopId = RopId::CopyTo;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.source_handle_index);
        buf.put_u8(self.dest_handle_index);
        buf.put_bool(self.want_asynchronous);
        buf.put_bool(self.want_sub_objects);
        buf.put_u8(self.copy_flags);
        PropertyTag::encode_list(&self.excluded_tags, buf, "ExcludedTags")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            source_handle_index: src.u8("SourceHandleIndex")?,
            dest_handle_index: src.u8("DestHandleIndex")?,
            want_asynchronous: src.bool("WantAsynchronous")?,
            want_sub_objects: src.bool("WantSubObjects")?,
            copy_flags: src.u8("CopyFlags")?,
            excluded_tags: PropertyTag::decode_list(src, "ExcludedTagCount")?,
        })
    }
}

impl RopRequestBody for CopyToRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::source_destination(self.source_handle_index, self.dest_handle_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{property_type, FlaggedValue, PropertyValue};
    use crate::rops::test_support::reencode;

    const PR_SUBJECT: PropertyTag = PropertyTag::new(0x0037, property_type::STRING);
    const PR_MESSAGE_SIZE: PropertyTag = PropertyTag::new(0x0E08, property_type::INTEGER32);

    #[test]
    fn test_get_properties_specific_uses_request_tags() {
        let columns = vec![PR_SUBJECT, PR_MESSAGE_SIZE];
        let response = GetPropertiesSpecificResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(ColumnRow {
                columns: columns.clone(),
                row: PropertyRow::Flagged(vec![
                    FlaggedValue::Present(PropertyValue::String("Hello".into())),
                    FlaggedValue::Error(0x8004_010F),
                ]),
            }),
        };
        let ctx = DecodeContext {
            logons: None,
            columns: Some(&columns),
        };
        let (_, decoded) = reencode(&response, &ctx);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_get_properties_specific_without_columns() {
        let mut buf = BytesMut::new();
        buf.put_u8(4);
        buf.put_u32_le(0);
        buf.put_u8(0);
        let mut src = Reader::new(buf.freeze());
        let err = GetPropertiesSpecificResponse::decode_body(&mut src, &DecodeContext::default())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownColumns(4)));
    }

    #[test]
    fn test_failed_get_properties_specific_needs_no_columns() {
        let mut buf = BytesMut::new();
        buf.put_u8(4);
        buf.put_u32_le(0x8004_0108);
        let mut src = Reader::new(buf.freeze());
        let response =
            GetPropertiesSpecificResponse::decode_body(&mut src, &DecodeContext::default())
                .unwrap();
        assert_eq!(response.outcome, RopOutcome::Failure(0x8004_0108));
    }

    #[test]
    fn test_set_properties_value_size() {
        let request = SetPropertiesRequest::new(
            0,
            2,
            vec![
                TaggedPropertyValue::new(0x0037, PropertyValue::String("Hi".into())),
                TaggedPropertyValue::new(0x0E07, PropertyValue::Integer32(1)),
            ],
        );
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        let value_size = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        // count + (tag + "Hi\0" UTF-16) + (tag + i32)
        assert_eq!(value_size, 2 + (4 + 6) + (4 + 4));
        assert_eq!(bytes.len(), 4 + value_size);
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_set_properties_size_mismatch() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u16_le(4);
        buf.put_u16_le(0); // zero values, but two bytes left inside the size
        buf.put_u16_le(0);
        let mut src = Reader::new(buf.freeze());
        assert!(matches!(
            SetPropertiesRequest::decode_body(&mut src, &DecodeContext::default()),
            Err(ProtocolError::InvalidValue {
                field: "PropertyValueSize",
                ..
            })
        ));
    }

    #[test]
    fn test_copy_properties_null_destination_has_no_problems() {
        let response = CopyPropertiesResponse {
            source_handle_index: 0,
            outcome: DualHandleOutcome::NullDestination {
                dest_handle_index: 1,
                body: (),
            },
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 4);
        assert_eq!(decoded, response);
        assert_eq!(decoded.kind(), ResponseKind::NullDestinationFailure);
    }

    #[test]
    fn test_copy_to_problems() {
        let response = CopyToResponse {
            source_handle_index: 0,
            outcome: DualHandleOutcome::Success {
                body: vec![PropertyProblem {
                    index: 0,
                    property_tag: PR_SUBJECT,
                    error_code: 0x8007_0005,
                }],
            },
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 2 + 10);
        assert_eq!(decoded, response);
    }
}
