//! Incremental change synchronization ROPs.
//!
//! Download contexts come from SynchronizationConfigure and are read with
//! FastTransferSourceGetBuffer. Upload contexts come from
//! SynchronizationOpenCollector and take the Import* ROPs. Both carry an
//! opaque state stream uploaded with the UploadStateStream* ROPs.

use super::fasttransfer::source_request;
use super::property::{decode_tagged_values, encode_tagged_values};
use super::{
    input_only_request, status_response, DecodeContext, HandleSlots, RopOutcome,
    RopRequestBody, RopResponseBody, RopStructure,
};
use crate::error::ProtocolError;
use crate::property::TaggedPropertyValue;
use crate::rop_id::RopId;
use crate::types::PropertyTag;
use crate::wire::{count_u16, count_u32, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// SynchronizationType values.
pub mod synchronization_type {
    pub const CONTENTS: u8 = 0x01;
    pub const HIERARCHY: u8 = 0x02;
}

/// ImportDeleteFlags bits.
pub mod import_delete_flags {
    pub const HIERARCHY: u8 = 0x01;
    pub const HARD_DELETE: u8 = 0x02;
}

// =========================================================================
// Download and upload contexts
// =========================================================================

/// Opens a download context. The restriction stays in its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub synchronization_type: u8,
    pub send_options: u8,
    pub synchronization_flags: u16,
    pub restriction: Vec<u8>,
    pub synchronization_extra_flags: u32,
    pub property_tags: Vec<PropertyTag>,
}

impl RopStructure for ConfigureRequest {
    const ROP_ID: RopId = RopId::SynchronizationConfigure;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.synchronization_type);
        buf.put_u8(self.send_options);
        buf.put_u16_le(self.synchronization_flags);
        buf.put_u16_le(count_u16(self.restriction.len(), "RestrictionData")?);
        buf.put_slice(&self.restriction);
        buf.put_u32_le(self.synchronization_extra_flags);
        PropertyTag::encode_list(&self.property_tags, buf, "PropertyTags")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let output_handle_index = src.u8("OutputHandleIndex")?;
        let synchronization_type = src.u8("SynchronizationType")?;
        let send_options = src.u8("SendOptions")?;
        let synchronization_flags = src.u16("SynchronizationFlags")?;
        let size = src.u16("RestrictionDataSize")? as usize;
        Ok(Self {
            logon_id,
            input_handle_index,
            output_handle_index,
            synchronization_type,
            send_options,
            synchronization_flags,
            restriction: src.vec(size, "RestrictionData")?,
            synchronization_extra_flags: src.u32("SynchronizationExtraFlags")?,
            property_tags: PropertyTag::decode_list(src, "PropertyTagCount")?,
        })
    }
}

impl RopRequestBody for ConfigureRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(
    ConfigureResponse,
    RopId::SynchronizationConfigure,
    output_handle_index
);

source_request!(OpenCollectorRequest, RopId::SynchronizationOpenCollector, {
    is_contents_collector: bool => put_bool, bool("IsContentsCollector"),
});

status_response!(
    OpenCollectorResponse,
    RopId::SynchronizationOpenCollector,
    output_handle_index
);

source_request!(
    /// Snapshots the state of a download or upload context into a new
    /// FastTransfer source.
    GetTransferStateRequest,
    RopId::SynchronizationGetTransferState,
    {}
);

status_response!(
    GetTransferStateResponse,
    RopId::SynchronizationGetTransferState,
    output_handle_index
);

// =========================================================================
// Imports
// =========================================================================

/// Response whose success body is one 64-bit id.
macro_rules! id_response {
    ($name:ident, $rop:expr, $index:ident($index_wire:literal), $wire:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub $index: u8,
            pub outcome: RopOutcome<u64>,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.$index);
                self.outcome.encode_with(buf, |id, buf| {
                    buf.put_u64_le(*id);
                    Ok(())
                })
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    $index: src.u8($index_wire)?,
                    outcome: RopOutcome::decode_with(src, |src| src.u64($wire))?,
                })
            }
        }

        impl RopResponseBody for $name {
            fn handle_index(&self) -> Option<u8> {
                Some(self.$index)
            }

            fn return_value(&self) -> u32 {
                self.outcome.return_value()
            }
        }
    };
}

/// Imports a new or changed message; the output handle receives the
/// message to fill in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportMessageChangeRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub import_flag: u8,
    pub property_values: Vec<TaggedPropertyValue>,
}

impl RopStructure for ImportMessageChangeRequest {
    const ROP_ID: RopId = RopId::SynchronizationImportMessageChange;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.import_flag);
        encode_tagged_values(&self.property_values, buf)
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            import_flag: src.u8("ImportFlag")?,
            property_values: decode_tagged_values(src)?,
        })
    }
}

impl RopRequestBody for ImportMessageChangeRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

id_response!(
    ImportMessageChangeResponse,
    RopId::SynchronizationImportMessageChange,
    output_handle_index("OutputHandleIndex"),
    "MessageId"
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHierarchyChangeRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub hierarchy_values: Vec<TaggedPropertyValue>,
    pub property_values: Vec<TaggedPropertyValue>,
}

impl RopStructure for ImportHierarchyChangeRequest {
    const ROP_ID: RopId = RopId::SynchronizationImportHierarchyChange;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        encode_tagged_values(&self.hierarchy_values, buf)?;
        encode_tagged_values(&self.property_values, buf)
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            hierarchy_values: decode_tagged_values(src)?,
            property_values: decode_tagged_values(src)?,
        })
    }
}

impl RopRequestBody for ImportHierarchyChangeRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

id_response!(
    ImportHierarchyChangeResponse,
    RopId::SynchronizationImportHierarchyChange,
    input_handle_index("InputHandleIndex"),
    "FolderId"
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDeletesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub import_delete_flags: u8,
    /// Normally one binary value listing the deleted source keys.
    pub property_values: Vec<TaggedPropertyValue>,
}

impl RopStructure for ImportDeletesRequest {
    const ROP_ID: RopId = RopId::SynchronizationImportDeletes;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.import_delete_flags);
        encode_tagged_values(&self.property_values, buf)
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            import_delete_flags: src.u8("ImportDeleteFlags")?,
            property_values: decode_tagged_values(src)?,
        })
    }
}

impl RopRequestBody for ImportDeletesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    ImportDeletesResponse,
    RopId::SynchronizationImportDeletes,
    input_handle_index
);

fn put_sized_u32(
    buf: &mut BytesMut,
    data: &[u8],
    field: &'static str,
) -> Result<(), ProtocolError> {
    buf.put_u32_le(count_u32(data.len(), field)?);
    buf.put_slice(data);
    Ok(())
}

fn read_sized_u32(
    src: &mut Reader,
    size_field: &'static str,
    field: &'static str,
) -> Result<Vec<u8>, ProtocolError> {
    let size = src.u32(size_field)? as usize;
    src.vec(size, field)
}

/// Reports a message moved between folders. Ids are in their
/// source-key wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMessageMoveRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub source_folder_id: Vec<u8>,
    pub source_message_id: Vec<u8>,
    pub predecessor_change_list: Vec<u8>,
    pub destination_message_id: Vec<u8>,
    pub change_number: Vec<u8>,
}

impl RopStructure for ImportMessageMoveRequest {
    const ROP_ID: RopId = RopId::SynchronizationImportMessageMove;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        put_sized_u32(buf, &self.source_folder_id, "SourceFolderId")?;
        put_sized_u32(buf, &self.source_message_id, "SourceMessageId")?;
        put_sized_u32(buf, &self.predecessor_change_list, "PredecessorChangeList")?;
        put_sized_u32(buf, &self.destination_message_id, "DestinationMessageId")?;
        put_sized_u32(buf, &self.change_number, "ChangeNumber")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            source_folder_id: read_sized_u32(src, "SourceFolderIdSize", "SourceFolderId")?,
            source_message_id: read_sized_u32(src, "SourceMessageIdSize", "SourceMessageId")?,
            predecessor_change_list: read_sized_u32(
                src,
                "PredecessorChangeListSize",
                "PredecessorChangeList",
            )?,
            destination_message_id: read_sized_u32(
                src,
                "DestinationMessageIdSize",
                "DestinationMessageId",
            )?,
            change_number: read_sized_u32(src, "ChangeNumberSize", "ChangeNumber")?,
        })
    }
}

impl RopRequestBody for ImportMessageMoveRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

id_response!(
    ImportMessageMoveResponse,
    RopId::SynchronizationImportMessageMove,
    input_handle_index("InputHandleIndex"),
    "MessageId"
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReadStateChangesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    /// MessageReadState entries in their wire form.
    pub message_read_states: Vec<u8>,
}

impl RopStructure for ImportReadStateChangesRequest {
    const ROP_ID: RopId = RopId::SynchronizationImportReadStateChanges;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u16_le(count_u16(self.message_read_states.len(), "MessageReadStates")?);
        buf.put_slice(&self.message_read_states);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let size = src.u16("MessageReadStateSize")? as usize;
        Ok(Self {
            logon_id,
            input_handle_index,
            message_read_states: src.vec(size, "MessageReadStates")?,
        })
    }
}

impl RopRequestBody for ImportReadStateChangesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    ImportReadStateChangesResponse,
    RopId::SynchronizationImportReadStateChanges,
    input_handle_index
);

// =========================================================================
// State upload
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStateStreamBeginRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    /// MetaTagIdsetGiven, MetaTagCnsetSeen and the like.
    pub state_property: PropertyTag,
    pub transfer_buffer_size: u32,
}

impl RopStructure for UploadStateStreamBeginRequest {
    const ROP_ID: RopId = RopId::SynchronizationUploadStateStreamBegin;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        self.state_property.encode(buf);
        buf.put_u32_le(self.transfer_buffer_size);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            state_property: PropertyTag::decode(src)?,
            transfer_buffer_size: src.u32("TransferBufferSize")?,
        })
    }
}

impl RopRequestBody for UploadStateStreamBeginRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    UploadStateStreamBeginResponse,
    RopId::SynchronizationUploadStateStreamBegin,
    input_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStateStreamContinueRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub stream_data: Vec<u8>,
}

impl RopStructure for UploadStateStreamContinueRequest {
    const ROP_ID: RopId = RopId::SynchronizationUploadStateStreamContinue;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        put_sized_u32(buf, &self.stream_data, "StreamData")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            stream_data: read_sized_u32(src, "StreamDataSize", "StreamData")?,
        })
    }
}

impl RopRequestBody for UploadStateStreamContinueRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    UploadStateStreamContinueResponse,
    RopId::SynchronizationUploadStateStreamContinue,
    input_handle_index
);

input_only_request!(
    UploadStateStreamEndRequest,
    RopId::SynchronizationUploadStateStreamEnd
);
status_response!(
    UploadStateStreamEndResponse,
    RopId::SynchronizationUploadStateStreamEnd,
    input_handle_index
);

// =========================================================================
// Local replica ids
// =========================================================================

/// Reserves a range of ids for objects created offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLocalReplicaIdsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub id_count: u32,
}

impl RopStructure for GetLocalReplicaIdsRequest {
    const ROP_ID: RopId = RopId::GetLocalReplicaIds;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u32_le(self.id_count);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            id_count: src.u32("IdCount")?,
        })
    }
}

impl RopRequestBody for GetLocalReplicaIdsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalReplicaIds {
    pub replica_guid: Uuid,
    /// First counter of the reserved range.
    pub global_count: [u8; 6],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLocalReplicaIdsResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<LocalReplicaIds>,
}

impl RopStructure for GetLocalReplicaIdsResponse {
    const ROP_ID: RopId = RopId::GetLocalReplicaIds;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |ids, buf| {
            buf.put_guid(&ids.replica_guid);
            buf.put_slice(&ids.global_count);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                Ok(LocalReplicaIds {
                    replica_guid: src.guid("ReplGuid")?,
                    global_count: src.array::<6>("GlobalCount")?,
                })
            })?,
        })
    }
}

impl RopResponseBody for GetLocalReplicaIdsResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}
