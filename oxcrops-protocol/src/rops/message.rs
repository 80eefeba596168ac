//! Message and attachment ROPs.

use super::folder::{partial_completion_response, table_flags};
use super::{
    status_response, DecodeContext, HandleSlots, RopOutcome, RopRequestBody,
    RopResponseBody, RopStructure,
};
use crate::error::ProtocolError;
use crate::rop_id::RopId;
use crate::types::{LogonKind, PropertyTag, TypedString};
use crate::wire::{count_u16, count_u8, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// OpenModeFlags of OpenMessage.
pub mod message_open_flags {
    pub const READ_ONLY: u8 = 0x00;
    pub const READ_WRITE: u8 = 0x01;
    pub const BEST_ACCESS: u8 = 0x03;
    pub const OPEN_SOFT_DELETED: u8 = 0x04;
}

/// SaveFlags of SaveChangesMessage and SaveChangesAttachment.
pub mod save_flags {
    pub const KEEP_OPEN_READ_ONLY: u8 = 0x01;
    pub const KEEP_OPEN_READ_WRITE: u8 = 0x02;
    pub const FORCE_SAVE: u8 = 0x04;
}

/// ReadFlags of SetMessageReadFlag.
pub mod read_flags {
    pub const READ: u8 = 0x00;
    pub const SUPPRESS_RECEIPT: u8 = 0x01;
    pub const CLEAR_READ_FLAG: u8 = 0x04;
    pub const GENERATE_RECEIPT_ONLY: u8 = 0x10;
    pub const CLEAR_NOTIFY_READ: u8 = 0x20;
    pub const CLEAR_NOTIFY_UNREAD: u8 = 0x40;
}

/// MessageStatusFlags of GetMessageStatus and SetMessageStatus.
pub mod message_status {
    pub const HIGHLIGHTED: u32 = 0x0000_0001;
    pub const TAGGED: u32 = 0x0000_0002;
    pub const HIDDEN: u32 = 0x0000_0004;
    pub const DELETE_MARKED: u32 = 0x0000_0008;
    pub const DRAFT: u32 = 0x0000_0100;
    pub const ANSWERED: u32 = 0x0000_0200;
    pub const IN_CONFLICT: u32 = 0x0000_0800;
    pub const REMOTE_DOWNLOAD: u32 = 0x0000_1000;
    pub const REMOTE_DELETE: u32 = 0x0000_2000;
}

/// Size of the ClientData blob exchanged by SetMessageReadFlag on public
/// folders.
pub const CLIENT_DATA_SIZE: usize = 24;

// =========================================================================
// OpenMessage
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMessageRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub code_page_id: u16,
    pub folder_id: u64,
    pub open_mode_flags: u8,
    pub message_id: u64,
}

impl RopStructure for OpenMessageRequest {
    const ROP_ID: RopId = RopId::OpenMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u16_le(self.code_page_id);
        buf.put_u64_le(self.folder_id);
        buf.put_u8(self.open_mode_flags);
        buf.put_u64_le(self.message_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            code_page_id: src.u16("CodePageId")?,
            folder_id: src.u64("FolderId")?,
            open_mode_flags: src.u8("OpenModeFlags")?,
            message_id: src.u64("MessageId")?,
        })
    }
}

impl RopRequestBody for OpenMessageRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

/// A recipient row returned with an opened message.
///
/// The row itself is kept as raw bytes; its layout depends on flags inside
/// it and on the recipient columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRecipientRow {
    pub recipient_type: u8,
    pub code_page_id: u16,
    pub reserved: u16,
    pub recipient_row: Vec<u8>,
}

impl OpenRecipientRow {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.recipient_type);
        buf.put_u16_le(self.code_page_id);
        buf.put_u16_le(self.reserved);
        buf.put_u16_le(count_u16(self.recipient_row.len(), "RecipientRow")?);
        buf.put_slice(&self.recipient_row);
        Ok(())
    }

    fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let recipient_type = src.u8("RecipientType")?;
        let code_page_id = src.u16("CodePageId")?;
        let reserved = src.u16("Reserved")?;
        let size = src.u16("RecipientRowSize")? as usize;
        Ok(Self {
            recipient_type,
            code_page_id,
            reserved,
            recipient_row: src.vec(size, "RecipientRow")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedMessage {
    pub has_named_properties: bool,
    pub subject_prefix: TypedString,
    pub normalized_subject: TypedString,
    /// Total recipients on the message; may exceed the rows returned.
    pub recipient_count: u16,
    pub recipient_columns: Vec<PropertyTag>,
    pub recipient_rows: Vec<OpenRecipientRow>,
}

impl OpenedMessage {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_bool(self.has_named_properties);
        self.subject_prefix.encode(buf)?;
        self.normalized_subject.encode(buf)?;
        buf.put_u16_le(self.recipient_count);
        PropertyTag::encode_list(&self.recipient_columns, buf, "RecipientColumns")?;
        buf.put_u8(count_u8(self.recipient_rows.len(), "RecipientRows")?);
        for row in &self.recipient_rows {
            row.encode(buf)?;
        }
        Ok(())
    }

    fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let has_named_properties = src.bool("HasNamedProperties")?;
        let subject_prefix = TypedString::decode(src)?;
        let normalized_subject = TypedString::decode(src)?;
        let recipient_count = src.u16("RecipientCount")?;
        let recipient_columns = PropertyTag::decode_list(src, "ColumnCount")?;
        let row_count = src.u8("RowCount")?;
        let recipient_rows = (0..row_count)
            .map(|_| OpenRecipientRow::decode(src))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            has_named_properties,
            subject_prefix,
            normalized_subject,
            recipient_count,
            recipient_columns,
            recipient_rows,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMessageResponse {
    pub output_handle_index: u8,
    pub outcome: RopOutcome<OpenedMessage>,
}

impl RopStructure for OpenMessageResponse {
    const ROP_ID: RopId = RopId::OpenMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        self.outcome.encode_with(buf, OpenedMessage::encode)
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            output_handle_index: src.u8("OutputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, OpenedMessage::decode)?,
        })
    }
}

impl RopResponseBody for OpenMessageResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// CreateMessage / SaveChangesMessage
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub code_page_id: u16,
    pub folder_id: u64,
    /// Create a folder-associated information message.
    pub associated_flag: bool,
}

impl CreateMessageRequest {
    /// Plain message in the given folder, using the logon code page.
    pub fn new(logon_id: u8, input_handle_index: u8, output_handle_index: u8, folder_id: u64) -> Self {
        Self {
            logon_id,
            input_handle_index,
            output_handle_index,
            code_page_id: 0x0FFF,
            folder_id,
            associated_flag: false,
        }
    }
}

impl RopStructure for CreateMessageRequest {
    const ROP_ID: RopId = RopId::CreateMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u16_le(self.code_page_id);
        buf.put_u64_le(self.folder_id);
        buf.put_bool(self.associated_flag);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            code_page_id: src.u16("CodePageId")?,
            folder_id: src.u64("FolderId")?,
            associated_flag: src.bool("AssociatedFlag")?,
        })
    }
}

impl RopRequestBody for CreateMessageRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub output_handle_index: u8,
    /// MessageId, when the server assigned one up front.
    pub outcome: RopOutcome<Option<u64>>,
}

impl RopStructure for CreateMessageResponse {
    const ROP_ID: RopId = RopId::CreateMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        self.outcome.encode_with(buf, |message_id, buf| {
            buf.put_bool(message_id.is_some());
            if let Some(id) = message_id {
                buf.put_u64_le(*id);
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            output_handle_index: src.u8("OutputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                if src.bool("HasMessageId")? {
                    Ok(Some(src.u64("MessageId")?))
                } else {
                    Ok(None)
                }
            })?,
        })
    }
}

impl RopResponseBody for CreateMessageResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveChangesMessageRequest {
    pub logon_id: u8,
    pub response_handle_index: u8,
    pub input_handle_index: u8,
    pub save_flags: u8,
}

impl SaveChangesMessageRequest {
    pub fn new(logon_id: u8, response_handle_index: u8, input_handle_index: u8) -> Self {
        Self {
            logon_id,
            response_handle_index,
            input_handle_index,
            save_flags: save_flags::KEEP_OPEN_READ_WRITE,
        }
    }
}

impl RopStructure for SaveChangesMessageRequest {
    const ROP_ID: RopId = RopId::SaveChangesMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.response_handle_index);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.save_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            response_handle_index: src.u8("ResponseHandleIndex")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            save_flags: src.u8("SaveFlags")?,
        })
    }
}

impl RopRequestBody for SaveChangesMessageRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::response_input(self.response_handle_index, self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMessage {
    pub input_handle_index: u8,
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveChangesMessageResponse {
    pub response_handle_index: u8,
    pub outcome: RopOutcome<SavedMessage>,
}

impl RopStructure for SaveChangesMessageResponse {
    const ROP_ID: RopId = RopId::SaveChangesMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.response_handle_index);
        self.outcome.encode_with(buf, |saved, buf| {
            buf.put_u8(saved.input_handle_index);
            buf.put_u64_le(saved.message_id);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            response_handle_index: src.u8("ResponseHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                Ok(SavedMessage {
                    input_handle_index: src.u8("InputHandleIndex")?,
                    message_id: src.u64("MessageId")?,
                })
            })?,
        })
    }
}

impl RopResponseBody for SaveChangesMessageResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.response_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Recipients, read state and submission
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveAllRecipientsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub reserved: u32,
}

impl RopStructure for RemoveAllRecipientsRequest {
    const ROP_ID: RopId = RopId::RemoveAllRecipients;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u32_le(self.reserved);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            reserved: src.u32("Reserved")?,
        })
    }
}

impl RopRequestBody for RemoveAllRecipientsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    RemoveAllRecipientsResponse,
    RopId::RemoveAllRecipients,
    input_handle_index
);

/// Sets or clears the read flag of a message.
///
/// ClientData is part of the request only on public folders logons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMessageReadFlagRequest {
    pub logon_id: u8,
    pub response_handle_index: u8,
    pub input_handle_index: u8,
    pub read_flags: u8,
    pub client_data: Option<[u8; CLIENT_DATA_SIZE]>,
}

impl RopStructure for SetMessageReadFlagRequest {
    const ROP_ID: RopId = RopId::SetMessageReadFlag;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.response_handle_index);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.read_flags);
        if let Some(data) = &self.client_data {
            buf.put_slice(data);
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let response_handle_index = src.u8("ResponseHandleIndex")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let read_flags = src.u8("ReadFlags")?;
        let client_data = if ctx.logon_kind(logon_id) == LogonKind::Public {
            Some(src.array::<CLIENT_DATA_SIZE>("ClientData")?)
        } else {
            None
        };
        Ok(Self {
            logon_id,
            response_handle_index,
            input_handle_index,
            read_flags,
            client_data,
        })
    }
}

impl RopRequestBody for SetMessageReadFlagRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::response_input(self.response_handle_index, self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStatusChange {
    pub logon_id: u8,
    pub client_data: [u8; CLIENT_DATA_SIZE],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMessageReadFlagResponse {
    pub response_handle_index: u8,
    /// `Some` when the read status actually changed.
    pub outcome: RopOutcome<Option<ReadStatusChange>>,
}

impl RopStructure for SetMessageReadFlagResponse {
    const ROP_ID: RopId = RopId::SetMessageReadFlag;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.response_handle_index);
        self.outcome.encode_with(buf, |change, buf| {
            buf.put_bool(change.is_some());
            if let Some(change) = change {
                buf.put_u8(change.logon_id);
                buf.put_slice(&change.client_data);
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            response_handle_index: src.u8("ResponseHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                if src.bool("ReadStatusChanged")? {
                    Ok(Some(ReadStatusChange {
                        logon_id: src.u8("LogonId")?,
                        client_data: src.array::<CLIENT_DATA_SIZE>("ClientData")?,
                    }))
                } else {
                    Ok(None)
                }
            })?,
        })
    }
}

impl RopResponseBody for SetMessageReadFlagResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.response_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitMessageRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub submit_flags: u8,
}

impl RopStructure for SubmitMessageRequest {
    const ROP_ID: RopId = RopId::SubmitMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.submit_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            submit_flags: src.u8("SubmitFlags")?,
        })
    }
}

impl RopRequestBody for SubmitMessageRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(SubmitMessageResponse, RopId::SubmitMessage, input_handle_index);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortSubmitRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub folder_id: u64,
    pub message_id: u64,
}

impl RopStructure for AbortSubmitRequest {
    const ROP_ID: RopId = RopId::AbortSubmit;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.folder_id);
        buf.put_u64_le(self.message_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            folder_id: src.u64("FolderId")?,
            message_id: src.u64("MessageId")?,
        })
    }
}

impl RopRequestBody for AbortSubmitRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(AbortSubmitResponse, RopId::AbortSubmit, input_handle_index);

// =========================================================================
// Recipient rows
// =========================================================================

/// A recipient row to add, replace or delete. An empty `recipient_row`
/// deletes the recipient with `row_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyRecipientRow {
    pub row_id: u32,
    pub recipient_type: u8,
    pub recipient_row: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyRecipientsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub recipient_columns: Vec<PropertyTag>,
    pub recipient_rows: Vec<ModifyRecipientRow>,
}

impl RopStructure for ModifyRecipientsRequest {
    const ROP_ID: RopId = RopId::ModifyRecipients;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        PropertyTag::encode_list(&self.recipient_columns, buf, "RecipientColumns")?;
        buf.put_u16_le(count_u16(self.recipient_rows.len(), "RecipientRows")?);
        for row in &self.recipient_rows {
            buf.put_u32_le(row.row_id);
            buf.put_u8(row.recipient_type);
            buf.put_u16_le(count_u16(row.recipient_row.len(), "RecipientRow")?);
            buf.put_slice(&row.recipient_row);
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let recipient_columns = PropertyTag::decode_list(src, "ColumnCount")?;
        let row_count = src.u16("RowCount")?;
        let recipient_rows = (0..row_count)
            .map(|_| {
                let row_id = src.u32("RowId")?;
                let recipient_type = src.u8("RecipientType")?;
                let size = src.u16("RecipientRowSize")? as usize;
                Ok(ModifyRecipientRow {
                    row_id,
                    recipient_type,
                    recipient_row: src.vec(size, "RecipientRow")?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;
        Ok(Self {
            logon_id,
            input_handle_index,
            recipient_columns,
            recipient_rows,
        })
    }
}

impl RopRequestBody for ModifyRecipientsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    ModifyRecipientsResponse,
    RopId::ModifyRecipients,
    input_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecipientsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    /// First row to return.
    pub row_id: u32,
    pub reserved: u16,
}

impl RopStructure for ReadRecipientsRequest {
    const ROP_ID: RopId = RopId::ReadRecipients;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u32_le(self.row_id);
        buf.put_u16_le(self.reserved);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            row_id: src.u32("RowId")?,
            reserved: src.u16("Reserved")?,
        })
    }
}

impl RopRequestBody for ReadRecipientsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecipientRow {
    pub row_id: u32,
    pub recipient: OpenRecipientRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecipientsResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<ReadRecipientRow>>,
}

impl RopStructure for ReadRecipientsResponse {
    const ROP_ID: RopId = RopId::ReadRecipients;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |rows, buf| {
            buf.put_u8(count_u8(rows.len(), "RecipientRows")?);
            for row in rows {
                buf.put_u32_le(row.row_id);
                row.recipient.encode(buf)?;
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let row_count = src.u8("RowCount")?;
                (0..row_count)
                    .map(|_| {
                        Ok(ReadRecipientRow {
                            row_id: src.u32("RowId")?,
                            recipient: OpenRecipientRow::decode(src)?,
                        })
                    })
                    .collect()
            })?,
        })
    }
}

impl RopResponseBody for ReadRecipientsResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Embedded messages
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenEmbeddedMessageRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub code_page_id: u16,
    pub open_mode_flags: u8,
}

impl RopStructure for OpenEmbeddedMessageRequest {
    const ROP_ID: RopId = RopId::OpenEmbeddedMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u16_le(self.code_page_id);
        buf.put_u8(self.open_mode_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            code_page_id: src.u16("CodePageId")?,
            open_mode_flags: src.u8("OpenModeFlags")?,
        })
    }
}

impl RopRequestBody for OpenEmbeddedMessageRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedEmbeddedMessage {
    pub reserved: u8,
    pub message_id: u64,
    pub message: OpenedMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenEmbeddedMessageResponse {
    pub output_handle_index: u8,
    pub outcome: RopOutcome<OpenedEmbeddedMessage>,
}

impl RopStructure for OpenEmbeddedMessageResponse {
    const ROP_ID: RopId = RopId::OpenEmbeddedMessage;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        self.outcome.encode_with(buf, |opened, buf| {
            buf.put_u8(opened.reserved);
            buf.put_u64_le(opened.message_id);
            opened.message.encode(buf)
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            output_handle_index: src.u8("OutputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                Ok(OpenedEmbeddedMessage {
                    reserved: src.u8("Reserved")?,
                    message_id: src.u64("MessageId")?,
                    message: OpenedMessage::decode(src)?,
                })
            })?,
        })
    }
}

impl RopResponseBody for OpenEmbeddedMessageResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Read flags and message status
// =========================================================================

/// Sets read flags on messages of a folder. An empty `message_ids`
/// targets every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReadFlagsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub want_asynchronous: bool,
    pub read_flags: u8,
    pub message_ids: Vec<u64>,
}

impl RopStructure for SetReadFlagsRequest {
    const ROP_ID: RopId = RopId::SetReadFlags;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_bool(self.want_asynchronous);
        buf.put_u8(self.read_flags);
        buf.put_u16_le(count_u16(self.message_ids.len(), "MessageIds")?);
        for id in &self.message_ids {
            buf.put_u64_le(*id);
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let want_asynchronous = src.bool("WantAsynchronous")?;
        let read_flags = src.u8("ReadFlags")?;
        let count = src.u16("MessageIdCount")?;
        let message_ids = (0..count)
            .map(|_| src.u64("MessageId"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            logon_id,
            input_handle_index,
            want_asynchronous,
            read_flags,
            message_ids,
        })
    }
}

impl RopRequestBody for SetReadFlagsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

partial_completion_response!(SetReadFlagsResponse, RopId::SetReadFlags);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMessageStatusRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub message_id: u64,
}

impl RopStructure for GetMessageStatusRequest {
    const ROP_ID: RopId = RopId::GetMessageStatus;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.message_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            message_id: src.u64("MessageId")?,
        })
    }
}

impl RopRequestBody for GetMessageStatusRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMessageStatusRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub message_id: u64,
    pub message_status_flags: u32,
    /// Bits of `message_status_flags` to apply.
    pub message_status_mask: u32,
}

impl RopStructure for SetMessageStatusRequest {
    const ROP_ID: RopId = RopId::SetMessageStatus;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.message_id);
        buf.put_u32_le(self.message_status_flags);
        buf.put_u32_le(self.message_status_mask);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            message_id: src.u64("MessageId")?,
            message_status_flags: src.u32("MessageStatusFlags")?,
            message_status_mask: src.u32("MessageStatusMask")?,
        })
    }
}

impl RopRequestBody for SetMessageStatusRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

/// Declares a response whose success body is the message's status flags.
/// SetMessageStatus answers with the flags as they were before the change.
macro_rules! message_status_response {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub input_handle_index: u8,
            /// MessageStatusFlags.
            pub outcome: RopOutcome<u32>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.input_handle_index);
                self.outcome.encode_with(buf, |flags, buf| {
                    buf.put_u32_le(*flags);
                    Ok(())
                })
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    input_handle_index: src.u8("InputHandleIndex")?,
                    outcome: RopOutcome::decode_with(src, |src| src.u32("MessageStatusFlags"))?,
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

message_status_response!(GetMessageStatusResponse, RopId::GetMessageStatus);
message_status_response!(SetMessageStatusResponse, RopId::SetMessageStatus);

// =========================================================================
// Attachments
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAttachmentTableRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub table_flags: u8,
}

impl GetAttachmentTableRequest {
    pub fn new(logon_id: u8, input_handle_index: u8, output_handle_index: u8) -> Self {
        Self {
            logon_id,
            input_handle_index,
            output_handle_index,
            table_flags: table_flags::USE_UNICODE,
        }
    }
}

impl RopStructure for GetAttachmentTableRequest {
    const ROP_ID: RopId = RopId::GetAttachmentTable;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.table_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            table_flags: src.u8("TableFlags")?,
        })
    }
}

impl RopRequestBody for GetAttachmentTableRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(
    GetAttachmentTableResponse,
    RopId::GetAttachmentTable,
    output_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAttachmentRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub open_attachment_flags: u8,
    pub attachment_id: u32,
}

impl RopStructure for OpenAttachmentRequest {
    const ROP_ID: RopId = RopId::OpenAttachment;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.open_attachment_flags);
        buf.put_u32_le(self.attachment_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            open_attachment_flags: src.u8("OpenAttachmentFlags")?,
            attachment_id: src.u32("AttachmentID")?,
        })
    }
}

impl RopRequestBody for OpenAttachmentRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(
    OpenAttachmentResponse,
    RopId::OpenAttachment,
    output_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAttachmentRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
}

impl RopStructure for CreateAttachmentRequest {
    const ROP_ID: RopId = RopId::CreateAttachment;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
        })
    }
}

impl RopRequestBody for CreateAttachmentRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAttachmentResponse {
    pub output_handle_index: u8,
    /// AttachmentID of the new attachment.
    pub outcome: RopOutcome<u32>,
}

impl RopStructure for CreateAttachmentResponse {
    const ROP_ID: RopId = RopId::CreateAttachment;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        self.outcome.encode_with(buf, |id, buf| {
            buf.put_u32_le(*id);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            output_handle_index: src.u8("OutputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u32("AttachmentID"))?,
        })
    }
}

impl RopResponseBody for CreateAttachmentResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAttachmentRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub attachment_id: u32,
}

impl RopStructure for DeleteAttachmentRequest {
    const ROP_ID: RopId = RopId::DeleteAttachment;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u32_le(self.attachment_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            attachment_id: src.u32("AttachmentID")?,
        })
    }
}

impl RopRequestBody for DeleteAttachmentRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    DeleteAttachmentResponse,
    RopId::DeleteAttachment,
    input_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveChangesAttachmentRequest {
    pub logon_id: u8,
    pub response_handle_index: u8,
    pub input_handle_index: u8,
    pub save_flags: u8,
}

impl RopStructure for SaveChangesAttachmentRequest {
    const ROP_ID: RopId = RopId::SaveChangesAttachment;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.response_handle_index);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.save_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            response_handle_index: src.u8("ResponseHandleIndex")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            save_flags: src.u8("SaveFlags")?,
        })
    }
}

impl RopRequestBody for SaveChangesAttachmentRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::response_input(self.response_handle_index, self.input_handle_index)
    }
}

status_response!(
    SaveChangesAttachmentResponse,
    RopId::SaveChangesAttachment,
    response_handle_index
);
