//! Transport and spooler ROPs.

use super::property::{decode_tagged_values, encode_tagged_values};
use super::{
    input_only_request, status_response, DecodeContext, HandleSlots, RopOutcome,
    RopRequestBody, RopResponseBody, RopStructure,
};
use crate::error::ProtocolError;
use crate::property::TaggedPropertyValue;
use crate::rop_id::RopId;
use crate::wire::{count_u16, string8_size, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// LockState of SpoolerLockMessage.
pub mod lock_state {
    pub const LOCK: u8 = 0x00;
    pub const UNLOCK: u8 = 0x01;
    pub const FINISHED: u8 = 0x02;
}

// =========================================================================
// Spooler
// =========================================================================

input_only_request!(SetSpoolerRequest, RopId::SetSpooler);
status_response!(SetSpoolerResponse, RopId::SetSpooler, input_handle_index);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolerLockMessageRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub message_id: u64,
    pub lock_state: u8,
}

impl RopStructure for SpoolerLockMessageRequest {
    const ROP_ID: RopId = RopId::SpoolerLockMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.message_id);
        buf.put_u8(self.lock_state);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            message_id: src.u64("MessageId")?,
            lock_state: src.u8("LockState")?,
        })
    }
}

impl RopRequestBody for SpoolerLockMessageRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    SpoolerLockMessageResponse,
    RopId::SpoolerLockMessage,
    input_handle_index
);

// =========================================================================
// Sending
// =========================================================================

input_only_request!(TransportSendRequest, RopId::TransportSend);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSendResponse {
    pub input_handle_index: u8,
    /// `None` when the server returned no properties of the sent message.
    pub outcome: RopOutcome<Option<Vec<TaggedPropertyValue>>>,
}

impl RopStructure for TransportSendResponse {
    const ROP_ID: RopId = RopId::TransportSend;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |values, buf| {
            buf.put_bool(values.is_none());
            match values {
                Some(values) => encode_tagged_values(values, buf),
                None => Ok(()),
            }
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                if src.bool("NoPropertiesReturned")? {
                    Ok(None)
                } else {
                    decode_tagged_values(src).map(Some)
                }
            })?,
        })
    }
}

impl RopResponseBody for TransportSendResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportNewMailRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub message_id: u64,
    pub folder_id: u64,
    pub message_class: String,
    pub message_flags: u32,
}

impl RopStructure for TransportNewMailRequest {
    const ROP_ID: RopId = RopId::TransportNewMail;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.message_id);
        buf.put_u64_le(self.folder_id);
        buf.put_string8(&self.message_class, "MessageClass")?;
        buf.put_u32_le(self.message_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            message_id: src.u64("MessageId")?,
            folder_id: src.u64("FolderId")?,
            message_class: src.string8("MessageClass")?,
            message_flags: src.u32("MessageFlags")?,
        })
    }
}

impl RopRequestBody for TransportNewMailRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    TransportNewMailResponse,
    RopId::TransportNewMail,
    input_handle_index
);

input_only_request!(GetTransportFolderRequest, RopId::GetTransportFolder);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTransportFolderResponse {
    pub input_handle_index: u8,
    /// FolderId of the folder outgoing messages are staged in.
    pub outcome: RopOutcome<u64>,
}

impl RopStructure for GetTransportFolderResponse {
    const ROP_ID: RopId = RopId::GetTransportFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |folder_id, buf| {
            buf.put_u64_le(*folder_id);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u64("FolderId"))?,
        })
    }
}

impl RopResponseBody for GetTransportFolderResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Address types
// =========================================================================

input_only_request!(GetAddressTypesRequest, RopId::GetAddressTypes);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAddressTypesResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<String>>,
}

impl RopStructure for GetAddressTypesResponse {
    const ROP_ID: RopId = RopId::GetAddressTypes;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |types, buf| {
            buf.put_u16_le(count_u16(types.len(), "AddressTypes")?);
            let size: usize = types.iter().map(|t| string8_size(t)).sum();
            buf.put_u16_le(count_u16(size, "AddressTypeSize")?);
            for address_type in types {
                buf.put_string8(address_type, "AddressTypes")?;
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let count = src.u16("AddressTypeCount")?;
                let size = src.u16("AddressTypeSize")? as usize;
                let mut types = Reader::new(src.bytes(size, "AddressTypes")?);
                let decoded = (0..count)
                    .map(|_| types.string8("AddressTypes"))
                    .collect::<Result<Vec<_>, _>>()?;
                if !types.is_empty() {
                    return Err(ProtocolError::InvalidValue {
                        field: "AddressTypeSize",
                        value: size as u32,
                    });
                }
                Ok(decoded)
            })?,
        })
    }
}

impl RopResponseBody for GetAddressTypesResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsDataRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub address_type: String,
    pub want_win32: bool,
}

impl RopStructure for OptionsDataRequest {
    const ROP_ID: RopId = RopId::OptionsData;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_string8(&self.address_type, "AddressType")?;
        buf.put_bool(self.want_win32);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            address_type: src.string8("AddressType")?,
            want_win32: src.bool("WantWin32")?,
        })
    }
}

impl RopRequestBody for OptionsDataRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpFile {
    pub data: Vec<u8>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressOptions {
    pub reserved: u8,
    pub options_info: Vec<u8>,
    /// HelpFileName is only sent with a non-empty help file.
    pub help_file: Option<HelpFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsDataResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<AddressOptions>,
}

impl RopStructure for OptionsDataResponse {
    const ROP_ID: RopId = RopId::OptionsData;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |options, buf| {
            buf.put_u8(options.reserved);
            buf.put_u16_le(count_u16(options.options_info.len(), "OptionsInfo")?);
            buf.put_slice(&options.options_info);
            match &options.help_file {
                Some(help) if !help.data.is_empty() => {
                    buf.put_u16_le(count_u16(help.data.len(), "HelpFile")?);
                    buf.put_slice(&help.data);
                    buf.put_string8(&help.name, "HelpFileName")?;
                }
                _ => buf.put_u16_le(0),
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let reserved = src.u8("Reserved")?;
                let size = src.u16("OptionsInfoSize")? as usize;
                let options_info = src.vec(size, "OptionsInfo")?;
                let help_size = src.u16("HelpFileSize")? as usize;
                let help_file = if help_size == 0 {
                    None
                } else {
                    let data = src.vec(help_size, "HelpFile")?;
                    Some(HelpFile {
                        data,
                        name: src.string8("HelpFileName")?,
                    })
                };
                Ok(AddressOptions {
                    reserved,
                    options_info,
                    help_file,
                })
            })?,
        })
    }
}

impl RopResponseBody for OptionsDataResponse {
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
    use crate::property::PropertyValue;
    use crate::rops::test_support::reencode;

    #[test]
    fn test_spooler_lock_message() {
        let request = SpoolerLockMessageRequest {
            logon_id: 0,
            input_handle_index: 0,
            message_id: 0x0001_0000_0000_2001,
            lock_state: lock_state::FINISHED,
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 2 + 8 + 1);
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_transport_send_properties_flag() {
        let none = TransportSendResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(None),
        };
        let (bytes, decoded) = reencode(&none, &DecodeContext::default());
        assert_eq!(&bytes[5..], &[0x01]);
        assert_eq!(decoded, none);

        let some = TransportSendResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(Some(vec![TaggedPropertyValue::new(
                0x0E07,
                PropertyValue::Integer32(0x09),
            )])),
        };
        let (bytes, decoded) = reencode(&some, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 1 + 2 + 4 + 4);
        assert_eq!(decoded, some);
    }

    #[test]
    fn test_transport_new_mail_request() {
        let request = TransportNewMailRequest {
            logon_id: 0,
            input_handle_index: 0,
            message_id: 0x0001_0000_0000_2001,
            folder_id: 0x0001_0000_0000_0005,
            message_class: "IPM.Note".into(),
            message_flags: 0x0000_0001,
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 2 + 16 + 9 + 4);
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_address_types_size_counts_terminators() {
        let response = GetAddressTypesResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Success(vec!["SMTP".into(), "EX".into()]),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(u16::from_le_bytes([bytes[7], bytes[8]]), 5 + 3);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_address_types_size_mismatch() {
        // One type announced in three bytes; one byte is left over.
        let raw = vec![0x00, 0, 0, 0, 0, 0x01, 0x00, 0x03, 0x00, b'X', 0, 0];
        let mut src = Reader::new(raw.into());
        assert!(GetAddressTypesResponse::decode_body(&mut src, &DecodeContext::default()).is_err());
    }

    #[test]
    fn test_options_data_help_file_name_only_with_help_file() {
        let without = OptionsDataResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Success(AddressOptions {
                reserved: 1,
                options_info: vec![0xAA, 0xBB],
                help_file: None,
            }),
        };
        let (bytes, decoded) = reencode(&without, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 1 + 2 + 2 + 2);
        assert_eq!(decoded, without);

        let with = OptionsDataResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Success(AddressOptions {
                reserved: 1,
                options_info: Vec::new(),
                help_file: Some(HelpFile {
                    data: vec![0x01, 0x02, 0x03],
                    name: "smtp.hlp".into(),
                }),
            }),
        };
        let (bytes, decoded) = reencode(&with, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 1 + 2 + 2 + 3 + 9);
        assert_eq!(decoded, with);
    }
}
