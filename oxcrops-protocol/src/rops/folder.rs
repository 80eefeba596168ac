//! Folder ROPs: open, create, delete, move, copy, empty, and the
//! hierarchy and contents tables.

use super::logon::{decode_ghost, encode_ghost};
use super::{
    DecodeContext, DualHandleOutcome, HandleSlots, RopOutcome, RopRequestBody, RopResponseBody,
    RopStructure,
};
use crate::classify::ResponseKind;
use crate::error::ProtocolError;
use crate::rop_id::RopId;
use crate::types::ReplicaServers;
use crate::wire::{count_u16, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// OpenModeFlags of OpenFolder.
pub mod folder_open_flags {
    pub const OPEN_SOFT_DELETED: u8 = 0x04;
}

/// FolderType of CreateFolder.
pub mod folder_type {
    pub const GENERIC: u8 = 0x01;
    pub const SEARCH: u8 = 0x02;
}

/// DeleteFolderFlags of DeleteFolder.
pub mod delete_folder_flags {
    pub const DEL_MESSAGES: u8 = 0x01;
    pub const DEL_FOLDERS: u8 = 0x04;
    pub const DELETE_HARD_DELETE: u8 = 0x10;
}

/// TableFlags of the table-opening ROPs.
pub mod table_flags {
    pub const ASSOCIATED: u8 = 0x02;
    pub const DEPTH: u8 = 0x04;
    pub const DEFERRED_ERRORS: u8 = 0x08;
    pub const NO_NOTIFICATIONS: u8 = 0x10;
    pub const SOFT_DELETES: u8 = 0x20;
    pub const USE_UNICODE: u8 = 0x40;
    pub const SUPPRESS_NOTIFICATIONS: u8 = 0x80;
}

/// Writes a string in the width chosen by a UseUnicode flag.
fn put_flagged_string(
    buf: &mut BytesMut,
    unicode: bool,
    value: &str,
    field: &'static str,
) -> Result<(), ProtocolError> {
    if unicode {
        buf.put_string16(value, field)
    } else {
        buf.put_string8(value, field)
    }
}

fn read_flagged_string(
    src: &mut Reader,
    unicode: bool,
    field: &'static str,
) -> Result<String, ProtocolError> {
    if unicode {
        src.string16(field)
    } else {
        src.string8(field)
    }
}

fn put_message_ids(buf: &mut BytesMut, ids: &[u64]) -> Result<(), ProtocolError> {
    buf.put_u16_le(count_u16(ids.len(), "MessageIds")?);
    for id in ids {
        buf.put_u64_le(*id);
    }
    Ok(())
}

fn read_message_ids(src: &mut Reader) -> Result<Vec<u64>, ProtocolError> {
    let count = src.u16("MessageIdCount")?;
    (0..count).map(|_| src.u64("MessageIds")).collect()
}

// =========================================================================
// OpenFolder / CreateFolder
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFolderRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub folder_id: u64,
    pub open_mode_flags: u8,
}

impl OpenFolderRequest {
    pub fn new(logon_id: u8, input_handle_index: u8, output_handle_index: u8, folder_id: u64) -> Self {
        Self {
            logon_id,
            input_handle_index,
            output_handle_index,
            folder_id,
            open_mode_flags: 0,
        }
    }
}

impl RopStructure for OpenFolderRequest {
    const ROP_ID: RopId = RopId::OpenFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u64_le(self.folder_id);
        buf.put_u8(self.open_mode_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            folder_id: src.u64("FolderId")?,
            open_mode_flags: src.u8("OpenModeFlags")?,
        })
    }
}

impl RopRequestBody for OpenFolderRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenedFolder {
    pub has_rules: bool,
    /// Replica servers, present when the folder is a ghost.
    pub ghost: Option<ReplicaServers>,
}

impl OpenedFolder {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_bool(self.has_rules);
        encode_ghost(&self.ghost, buf)
    }

    fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            has_rules: src.bool("HasRules")?,
            ghost: decode_ghost(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFolderResponse {
    pub output_handle_index: u8,
    pub outcome: RopOutcome<OpenedFolder>,
}

impl RopStructure for OpenFolderResponse {
    const ROP_ID: RopId = RopId::OpenFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        self.outcome.encode_with(buf, OpenedFolder::encode)
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            output_handle_index: src.u8("OutputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, OpenedFolder::decode)?,
        })
    }
}

impl RopResponseBody for OpenFolderResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFolderRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub folder_type: u8,
    /// Selects UTF-16 for DisplayName and Comment.
    pub use_unicode_strings: bool,
    pub open_existing: bool,
    pub reserved: u8,
    pub display_name: String,
    pub comment: String,
}

impl RopStructure for CreateFolderRequest {
    const ROP_ID: RopId = RopId::CreateFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.folder_type);
        buf.put_bool(self.use_unicode_strings);
        buf.put_bool(self.open_existing);
        buf.put_u8(self.reserved);
        put_flagged_string(buf, self.use_unicode_strings, &self.display_name, "DisplayName")?;
        put_flagged_string(buf, self.use_unicode_strings, &self.comment, "Comment")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let output_handle_index = src.u8("OutputHandleIndex")?;
        let folder_type = src.u8("FolderType")?;
        let use_unicode_strings = src.bool("UseUnicodeStrings")?;
        let open_existing = src.bool("OpenExisting")?;
        let reserved = src.u8("Reserved")?;
        let display_name = read_flagged_string(src, use_unicode_strings, "DisplayName")?;
        let comment = read_flagged_string(src, use_unicode_strings, "Comment")?;
        Ok(Self {
            logon_id,
            input_handle_index,
            output_handle_index,
            folder_type,
            use_unicode_strings,
            open_existing,
            reserved,
            display_name,
            comment,
        })
    }
}

impl RopRequestBody for CreateFolderRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedFolder {
    pub folder_id: u64,
    /// Set when OpenExisting matched a folder that was already there.
    pub existing: Option<OpenedFolder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFolderResponse {
    pub output_handle_index: u8,
    pub outcome: RopOutcome<CreatedFolder>,
}

impl RopStructure for CreateFolderResponse {
    const ROP_ID: RopId = RopId::CreateFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        self.outcome.encode_with(buf, |created, buf| {
            buf.put_u64_le(created.folder_id);
            buf.put_bool(created.existing.is_some());
            match &created.existing {
                Some(existing) => existing.encode(buf),
                None => Ok(()),
            }
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            output_handle_index: src.u8("OutputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let folder_id = src.u64("FolderId")?;
                let existing = if src.bool("IsExistingFolder")? {
                    Some(OpenedFolder::decode(src)?)
                } else {
                    None
                };
                Ok(CreatedFolder {
                    folder_id,
                    existing,
                })
            })?,
        })
    }
}

impl RopResponseBody for CreateFolderResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Delete / empty family
// =========================================================================

/// Declares a response that carries PartialCompletion whatever the
/// ReturnValue.
macro_rules! partial_completion_response {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub input_handle_index: u8,
            pub return_value: u32,
            /// The operation skipped some of the targeted objects.
            pub partial_completion: bool,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.input_handle_index);
                buf.put_u32_le(self.return_value);
                buf.put_bool(self.partial_completion);
                Ok(())
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    input_handle_index: src.u8("InputHandleIndex")?,
                    return_value: src.u32("ReturnValue")?,
                    partial_completion: src.bool("PartialCompletion")?,
                })
            }
        }

        impl RopResponseBody for $name {
            fn handle_index(&self) -> Option<u8> {
                Some(self.input_handle_index)
            }

            fn return_value(&self) -> u32 {
                self.return_value
            }
        }
    };
}

pub(crate) use partial_completion_response;

partial_completion_response!(DeleteFolderResponse, RopId::DeleteFolder);
partial_completion_response!(EmptyFolderResponse, RopId::EmptyFolder);
partial_completion_response!(
    HardDeleteMessagesAndSubfoldersResponse,
    RopId::HardDeleteMessagesAndSubfolders
);
partial_completion_response!(DeleteMessagesResponse, RopId::DeleteMessages);
partial_completion_response!(HardDeleteMessagesResponse, RopId::HardDeleteMessages);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFolderRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub delete_folder_flags: u8,
    pub folder_id: u64,
}

impl RopStructure for DeleteFolderRequest {
    const ROP_ID: RopId = RopId::DeleteFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.delete_folder_flags);
        buf.put_u64_le(self.folder_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            delete_folder_flags: src.u8("DeleteFolderFlags")?,
            folder_id: src.u64("FolderId")?,
        })
    }
}

impl RopRequestBody for DeleteFolderRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

/// Declares an EmptyFolder-shaped request.
macro_rules! empty_folder_request {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub want_asynchronous: bool,
            pub want_delete_associated: bool,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                buf.put_bool(self.want_asynchronous);
                buf.put_bool(self.want_delete_associated);
                Ok(())
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    logon_id: src.u8("LogonId")?,
                    input_handle_index: src.u8("InputHandleIndex")?,
                    want_asynchronous: src.bool("WantAsynchronous")?,
                    want_delete_associated: src.bool("WantDeleteAssociated")?,
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

empty_folder_request!(EmptyFolderRequest, RopId::EmptyFolder);
empty_folder_request!(
    HardDeleteMessagesAndSubfoldersRequest,
    RopId::HardDeleteMessagesAndSubfolders
);

/// Declares a DeleteMessages-shaped request.
macro_rules! delete_messages_request {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub want_asynchronous: bool,
            pub notify_non_read: bool,
            pub message_ids: Vec<u64>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                buf.put_bool(self.want_asynchronous);
                buf.put_bool(self.notify_non_read);
                put_message_ids(buf, &self.message_ids)
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    logon_id: src.u8("LogonId")?,
                    input_handle_index: src.u8("InputHandleIndex")?,
                    want_asynchronous: src.bool("WantAsynchronous")?,
                    notify_non_read: src.bool("NotifyNonRead")?,
                    message_ids: read_message_ids(src)?,
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

delete_messages_request!(DeleteMessagesRequest, RopId::DeleteMessages);
delete_messages_request!(HardDeleteMessagesRequest, RopId::HardDeleteMessages);

// =========================================================================
// Move / copy family
// =========================================================================

/// Declares a dual-handle response whose body is PartialCompletion.
macro_rules! dual_partial_response {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub source_handle_index: u8,
            /// PartialCompletion follows every return value.
            pub outcome: DualHandleOutcome<bool>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.source_handle_index);
                let put = |partial: &bool, buf: &mut BytesMut| -> Result<(), ProtocolError> {
                    buf.put_bool(*partial);
                    Ok(())
                };
                self.outcome.encode_with(buf, put, put, put)
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    source_handle_index: src.u8("SourceHandleIndex")?,
                    outcome: DualHandleOutcome::decode_with(
                        src,
                        |src| src.bool("PartialCompletion"),
                        |src| src.bool("PartialCompletion"),
                        |src| src.bool("PartialCompletion"),
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

dual_partial_response!(MoveFolderResponse, RopId::MoveFolder);
dual_partial_response!(CopyFolderResponse, RopId::CopyFolder);
dual_partial_response!(MoveCopyMessagesResponse, RopId::MoveCopyMessages);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFolderRequest {
    pub logon_id: u8,
    pub source_handle_index: u8,
    pub dest_handle_index: u8,
    pub want_asynchronous: bool,
    pub use_unicode: bool,
    pub folder_id: u64,
    pub new_folder_name: String,
}

impl RopStructure for MoveFolderRequest {
    const ROP_ID: RopId = RopId::MoveFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.source_handle_index);
        buf.put_u8(self.dest_handle_index);
        buf.put_bool(self.want_asynchronous);
        buf.put_bool(self.use_unicode);
        buf.put_u64_le(self.folder_id);
        put_flagged_string(buf, self.use_unicode, &self.new_folder_name, "NewFolderName")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let source_handle_index = src.u8("SourceHandleIndex")?;
        let dest_handle_index = src.u8("DestHandleIndex")?;
        let want_asynchronous = src.bool("WantAsynchronous")?;
        let use_unicode = src.bool("UseUnicode")?;
        let folder_id = src.u64("FolderId")?;
        let new_folder_name = read_flagged_string(src, use_unicode, "NewFolderName")?;
        Ok(Self {
            logon_id,
            source_handle_index,
            dest_handle_index,
            want_asynchronous,
            use_unicode,
            folder_id,
            new_folder_name,
        })
    }
}

impl RopRequestBody for MoveFolderRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::source_destination(self.source_handle_index, self.dest_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFolderRequest {
    pub logon_id: u8,
    pub source_handle_index: u8,
    pub dest_handle_index: u8,
    pub want_asynchronous: bool,
    pub want_recursive: bool,
    pub use_unicode: bool,
    pub folder_id: u64,
    pub new_folder_name: String,
}

impl RopStructure for CopyFolderRequest {
    const ROP_ID: RopId = RopId::CopyFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.source_handle_index);
        buf.put_u8(self.dest_handle_index);
        buf.put_bool(self.want_asynchronous);
        buf.put_bool(self.want_recursive);
        buf.put_bool(self.use_unicode);
        buf.put_u64_le(self.folder_id);
        put_flagged_string(buf, self.use_unicode, &self.new_folder_name, "NewFolderName")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let source_handle_index = src.u8("SourceHandleIndex")?;
        let dest_handle_index = src.u8("DestHandleIndex")?;
        let want_asynchronous = src.bool("WantAsynchronous")?;
        let want_recursive = src.bool("WantRecursive")?;
        let use_unicode = src.bool("UseUnicode")?;
        let folder_id = src.u64("FolderId")?;
        let new_folder_name = read_flagged_string(src, use_unicode, "NewFolderName")?;
        Ok(Self {
            logon_id,
            source_handle_index,
            dest_handle_index,
            want_asynchronous,
            want_recursive,
            use_unicode,
            folder_id,
            new_folder_name,
        })
    }
}

impl RopRequestBody for CopyFolderRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::source_destination(self.source_handle_index, self.dest_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCopyMessagesRequest {
    pub logon_id: u8,
    pub source_handle_index: u8,
    pub dest_handle_index: u8,
    pub message_ids: Vec<u64>,
    pub want_asynchronous: bool,
    /// Copy rather than move.
    pub want_copy: bool,
}

impl RopStructure for MoveCopyMessagesRequest {
    const ROP_ID: RopId = RopId::MoveCopyMessages;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.source_handle_index);
        buf.put_u8(self.dest_handle_index);
        put_message_ids(buf, &self.message_ids)?;
        buf.put_bool(self.want_asynchronous);
        buf.put_bool(self.want_copy);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            source_handle_index: src.u8("SourceHandleIndex")?,
            dest_handle_index: src.u8("DestHandleIndex")?,
            message_ids: read_message_ids(src)?,
            want_asynchronous: src.bool("WantAsynchronous")?,
            want_copy: src.bool("WantCopy")?,
        })
    }
}

impl RopRequestBody for MoveCopyMessagesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::source_destination(self.source_handle_index, self.dest_handle_index)
    }
}

// =========================================================================
// Hierarchy and contents tables
// =========================================================================

/// Declares a table-opening request and its RowCount response.
macro_rules! open_table_rop {
    ($request:ident, $response:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $request {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub output_handle_index: u8,
            pub table_flags: u8,
        }

        impl RopStructure for $request {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                buf.put_u8(self.output_handle_index);
                buf.put_u8(self.table_flags);
                Ok(())
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    logon_id: src.u8("LogonId")?,
                    input_handle_index: src.u8("InputHandleIndex")?,
                    output_handle_index: src.u8("OutputHandleIndex")?,
                    table_flags: src.u8("TableFlags")?,
                })
            }
        }

        impl RopRequestBody for $request {
            fn logon_id(&self) -> u8 {
                self.logon_id
            }

            fn handle_slots(&self) -> HandleSlots {
                HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
            }
        }

        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $response {
            pub output_handle_index: u8,
            /// RowCount of the opened table.
            pub outcome: RopOutcome<u32>,
        }

        impl RopStructure for $response {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.output_handle_index);
                self.outcome.encode_with(buf, |count, buf| {
                    buf.put_u32_le(*count);
                    Ok(())
                })
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    output_handle_index: src.u8("OutputHandleIndex")?,
                    outcome: RopOutcome::decode_with(src, |src| src.u32("RowCount"))?,
                })
            }
        }

        impl RopResponseBody for $response {
            fn handle_index(&self) -> Option<u8> {
                Some(self.output_handle_index)
            }

            fn return_value(&self) -> u32 {
                self.outcome.return_value()
            }
        }
    };
}

open_table_rop!(
    GetHierarchyTableRequest,
    GetHierarchyTableResponse,
    RopId::GetHierarchyTable
);
open_table_rop!(
    GetContentsTableRequest,
    GetContentsTableResponse,
    RopId::GetContentsTable
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rops::test_support::reencode;
    use bytes::Bytes;

    #[test]
    fn test_open_folder_request_layout() {
        let request = OpenFolderRequest::new(0, 0, 1, 0x0001_0000_0000_0005);
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 12);
        assert_eq!(decoded, request);
        assert_eq!(decoded.handle_slots(), HandleSlots::input_output(0, 1));
    }

    #[test]
    fn test_open_folder_ghosted_response() {
        let response = OpenFolderResponse {
            output_handle_index: 1,
            outcome: RopOutcome::Success(OpenedFolder {
                has_rules: true,
                ghost: Some(ReplicaServers::new(vec!["pf01".into()], 1)),
            }),
        };
        let (_, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_create_folder_unicode_names() {
        let request = CreateFolderRequest {
            logon_id: 0,
            input_handle_index: 1,
            output_handle_index: 2,
            folder_type: folder_type::GENERIC,
            use_unicode_strings: true,
            open_existing: false,
            reserved: 0,
            display_name: "Entwürfe".into(),
            comment: String::new(),
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        // 7 fixed bytes, 8 UTF-16 units + NUL, empty comment NUL
        assert_eq!(bytes.len(), 7 + 18 + 2);
        assert_eq!(decoded, request);

        let narrow = CreateFolderRequest {
            use_unicode_strings: false,
            display_name: "Drafts".into(),
            ..request
        };
        let (bytes, decoded) = reencode(&narrow, &DecodeContext::default());
        assert_eq!(bytes.len(), 7 + 7 + 1);
        assert_eq!(decoded, narrow);
    }

    #[test]
    fn test_create_folder_existing() {
        let response = CreateFolderResponse {
            output_handle_index: 2,
            outcome: RopOutcome::Success(CreatedFolder {
                folder_id: 42,
                existing: Some(OpenedFolder::default()),
            }),
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 8 + 1 + 2);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_delete_family_keeps_partial_completion_on_failure() {
        let mut src = Reader::new(Bytes::from_static(&[
            0x00, // InputHandleIndex
            0x05, 0x00, 0x07, 0x80, // AccessDenied
            0x01, // PartialCompletion
        ]));
        let response = DeleteMessagesResponse::decode_body(&mut src, &DecodeContext::default())
            .unwrap();
        assert!(src.is_empty());
        assert_eq!(response.return_value, 0x8007_0005);
        assert!(response.partial_completion);
        assert_eq!(response.kind(), ResponseKind::Failure);
    }

    #[test]
    fn test_move_folder_null_destination() {
        let response = MoveFolderResponse {
            source_handle_index: 0,
            outcome: DualHandleOutcome::NullDestination {
                dest_handle_index: 1,
                body: false,
            },
        };
        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(&bytes[1..5], &0x503u32.to_le_bytes());
        assert_eq!(bytes.len(), 1 + 4 + 4 + 1);
        assert_eq!(decoded, response);
        assert_eq!(decoded.kind(), ResponseKind::NullDestinationFailure);
    }

    #[test]
    fn test_move_folder_failure_keeps_partial_completion() {
        let mut src = Reader::new(Bytes::from_static(&[
            0x00, // SourceHandleIndex
            0x05, 0x40, 0x00, 0x80, // NotSupported
            0x01, // PartialCompletion
        ]));
        let response =
            MoveFolderResponse::decode_body(&mut src, &DecodeContext::default()).unwrap();
        assert!(src.is_empty());
        assert_eq!(
            response.outcome,
            DualHandleOutcome::Failure {
                return_value: 0x8000_4005,
                body: true
            }
        );

        let (bytes, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(bytes.len(), 1 + 4 + 1);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_move_copy_messages_request() {
        let request = MoveCopyMessagesRequest {
            logon_id: 0,
            source_handle_index: 1,
            dest_handle_index: 2,
            message_ids: vec![10, 11, 12],
            want_asynchronous: false,
            want_copy: true,
        };
        let (bytes, decoded) = reencode(&request, &DecodeContext::default());
        assert_eq!(bytes.len(), 3 + 2 + 24 + 2);
        assert_eq!(decoded, request);
        assert_eq!(
            decoded.handle_slots(),
            HandleSlots::source_destination(1, 2)
        );
    }

    #[test]
    fn test_contents_table_response() {
        let response = GetContentsTableResponse {
            output_handle_index: 3,
            outcome: RopOutcome::Success(17),
        };
        let (_, decoded) = reencode(&response, &DecodeContext::default());
        assert_eq!(decoded, response);
    }
}
