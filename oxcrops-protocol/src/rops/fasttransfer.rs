//! FastTransfer ROPs.
//!
//! A FastTransfer download configures a source context on an output
//! handle and then pulls the stream through SourceGetBuffer. An upload
//! configures a destination context and pushes the stream through
//! DestinationPutBuffer. The stream itself stays opaque bytes here.

use super::{
    status_response, DecodeContext, HandleSlots, RopRequestBody, RopResponseBody, RopStructure,
};
use crate::error::{ErrorCode, ProtocolError};
use crate::rop_id::RopId;
use crate::types::PropertyTag;
use crate::wire::{count_u16, Reader};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// SendOptions bits.
pub mod send_options {
    pub const UNICODE: u8 = 0x01;
    pub const USE_CPID: u8 = 0x02;
    pub const FOR_UPLOAD: u8 = 0x03;
    pub const RECOVER_MODE: u8 = 0x04;
    pub const FORCE_UNICODE: u8 = 0x08;
    pub const PARTIAL_ITEM: u8 = 0x10;
}

/// TransferStatus values.
pub mod transfer_status {
    pub const ERROR: u16 = 0x0000;
    pub const PARTIAL: u16 = 0x0001;
    pub const NO_ROOM: u16 = 0x0002;
    pub const DONE: u16 = 0x0003;
}

/// SourceOperation of DestinationConfigure.
pub mod source_operation {
    pub const COPY_TO: u8 = 0x01;
    pub const COPY_PROPERTIES: u8 = 0x02;
    pub const COPY_MESSAGES: u8 = 0x03;
    pub const COPY_FOLDER: u8 = 0x04;
}

/// BufferSize value announcing a trailing MaximumBufferSize.
pub const EXTENDED_BUFFER_MARKER: u16 = 0xBABE;

/// Declares a source-configuring request: logon, input and output
/// indexes, then `$field`s written in order.
macro_rules! source_request {
    ($(#[$meta:meta])* $name:ident, $rop:expr, { $($field:ident: $ty:ty => $put:ident, $get:ident($wire:literal)),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub output_handle_index: u8,
            $(pub $field: $ty,)*
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                buf.put_u8(self.output_handle_index);
                $(buf.$put(self.$field);)*
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
                    $($field: src.$get($wire)?,)*
                })
            }
        }

        impl RopRequestBody for $name {
            fn logon_id(&self) -> u8 {
                self.logon_id
            }

            fn handle_slots(&self) -> HandleSlots {
                HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
            }
        }
    };
}

pub(crate) use source_request;

// =========================================================================
// Download
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCopyToRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    /// Nonzero excludes subobjects.
    pub level: u8,
    pub copy_flags: u32,
    pub send_options: u8,
    /// Properties to leave out.
    pub property_tags: Vec<PropertyTag>,
}

impl RopStructure for SourceCopyToRequest {
    const ROP_ID: RopId = RopId::FastTransferSourceCopyTo;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.level);
        buf.put_u32_le(self.copy_flags);
        buf.put_u8(self.send_options);
        PropertyTag::encode_list(&self.property_tags, buf, "PropertyTags")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            level: src.u8("Level")?,
            copy_flags: src.u32("CopyFlags")?,
            send_options: src.u8("SendOptions")?,
            property_tags: PropertyTag::decode_list(src, "PropertyTagCount")?,
        })
    }
}

impl RopRequestBody for SourceCopyToRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(
    SourceCopyToResponse,
    RopId::FastTransferSourceCopyTo,
    output_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCopyPropertiesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub level: u8,
    pub copy_flags: u8,
    pub send_options: u8,
    /// Properties to include.
    pub property_tags: Vec<PropertyTag>,
}

impl RopStructure for SourceCopyPropertiesRequest {
    const ROP_ID: RopId = RopId::FastTransferSourceCopyProperties;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.level);
        buf.put_u8(self.copy_flags);
        buf.put_u8(self.send_options);
        PropertyTag::encode_list(&self.property_tags, buf, "PropertyTags")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            level: src.u8("Level")?,
            copy_flags: src.u8("CopyFlags")?,
            send_options: src.u8("SendOptions")?,
            property_tags: PropertyTag::decode_list(src, "PropertyTagCount")?,
        })
    }
}

impl RopRequestBody for SourceCopyPropertiesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(
    SourceCopyPropertiesResponse,
    RopId::FastTransferSourceCopyProperties,
    output_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCopyMessagesRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub message_ids: Vec<u64>,
    pub copy_flags: u8,
    pub send_options: u8,
}

impl RopStructure for SourceCopyMessagesRequest {
    const ROP_ID: RopId = RopId::FastTransferSourceCopyMessages;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        buf.put_u16_le(count_u16(self.message_ids.len(), "MessageIds")?);
        for id in &self.message_ids {
            buf.put_u64_le(*id);
        }
        buf.put_u8(self.copy_flags);
        buf.put_u8(self.send_options);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let output_handle_index = src.u8("OutputHandleIndex")?;
        let count = src.u16("MessageIdCount")?;
        let message_ids = (0..count)
            .map(|_| src.u64("MessageId"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            logon_id,
            input_handle_index,
            output_handle_index,
            message_ids,
            copy_flags: src.u8("CopyFlags")?,
            send_options: src.u8("SendOptions")?,
        })
    }
}

impl RopRequestBody for SourceCopyMessagesRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(
    SourceCopyMessagesResponse,
    RopId::FastTransferSourceCopyMessages,
    output_handle_index
);

source_request!(SourceCopyFolderRequest, RopId::FastTransferSourceCopyFolder, {
    copy_flags: u8 => put_u8, u8("CopyFlags"),
    send_options: u8 => put_u8, u8("SendOptions"),
});

status_response!(
    SourceCopyFolderResponse,
    RopId::FastTransferSourceCopyFolder,
    output_handle_index
);

/// How much of the stream SourceGetBuffer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "size", rename_all = "snake_case")]
pub enum BufferSize {
    Bytes(u16),
    /// Let the server pick, up to a maximum.
    UpTo(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGetBufferRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub buffer_size: BufferSize,
}

impl RopStructure for SourceGetBufferRequest {
    const ROP_ID: RopId = RopId::FastTransferSourceGetBuffer;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        match self.buffer_size {
            BufferSize::Bytes(EXTENDED_BUFFER_MARKER) => {
                return Err(ProtocolError::InvalidValue {
                    field: "BufferSize",
                    value: EXTENDED_BUFFER_MARKER as u32,
                });
            }
            BufferSize::Bytes(size) => buf.put_u16_le(size),
            BufferSize::UpTo(max) => {
                buf.put_u16_le(EXTENDED_BUFFER_MARKER);
                buf.put_u16_le(max);
            }
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let buffer_size = match src.u16("BufferSize")? {
            EXTENDED_BUFFER_MARKER => BufferSize::UpTo(src.u16("MaximumBufferSize")?),
            size => BufferSize::Bytes(size),
        };
        Ok(Self {
            logon_id,
            input_handle_index,
            buffer_size,
        })
    }
}

impl RopRequestBody for SourceGetBufferRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

/// Transfer progress reported by both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub transfer_status: u16,
    pub in_progress_count: u16,
    pub total_step_count: u16,
    pub reserved: u8,
}

impl TransferProgress {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.transfer_status);
        buf.put_u16_le(self.in_progress_count);
        buf.put_u16_le(self.total_step_count);
        buf.put_u8(self.reserved);
    }

    fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            transfer_status: src.u16("TransferStatus")?,
            in_progress_count: src.u16("InProgressCount")?,
            total_step_count: src.u16("TotalStepCount")?,
            reserved: src.u8("Reserved")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBuffer {
    pub progress: TransferProgress,
    pub data: Vec<u8>,
}

impl TransferBuffer {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.progress.encode(buf);
        buf.put_u16_le(count_u16(self.data.len(), "TransferBuffer")?);
        buf.put_slice(&self.data);
        Ok(())
    }

    fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let progress = TransferProgress::decode(src)?;
        let size = src.u16("TransferBufferSize")? as usize;
        Ok(Self {
            progress,
            data: src.vec(size, "TransferBuffer")?,
        })
    }
}

/// SourceGetBuffer answers ServerBusy with the buffer layout plus a
/// backoff; other failures carry nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GetBufferOutcome {
    Success(TransferBuffer),
    ServerBusy {
        buffer: TransferBuffer,
        /// Milliseconds to wait before asking again.
        backoff_time: u32,
    },
    Failure { return_value: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGetBufferResponse {
    pub input_handle_index: u8,
    pub outcome: GetBufferOutcome,
}

impl RopStructure for SourceGetBufferResponse {
    const ROP_ID: RopId = RopId::FastTransferSourceGetBuffer;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        buf.put_u32_le(self.return_value());
        match &self.outcome {
            GetBufferOutcome::Success(buffer) => buffer.encode(buf)?,
            GetBufferOutcome::ServerBusy {
                buffer,
                backoff_time,
            } => {
                buffer.encode(buf)?;
                buf.put_u32_le(*backoff_time);
            }
            GetBufferOutcome::Failure { .. } => {}
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let input_handle_index = src.u8("InputHandleIndex")?;
        let return_value = src.u32("ReturnValue")?;
        let outcome = match ErrorCode::from_u32(return_value) {
            Some(ErrorCode::Success) => GetBufferOutcome::Success(TransferBuffer::decode(src)?),
            Some(ErrorCode::ServerBusy) => GetBufferOutcome::ServerBusy {
                buffer: TransferBuffer::decode(src)?,
                backoff_time: src.u32("BackoffTime")?,
            },
            _ => GetBufferOutcome::Failure { return_value },
        };
        Ok(Self {
            input_handle_index,
            outcome,
        })
    }
}

impl RopResponseBody for SourceGetBufferResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        match &self.outcome {
            GetBufferOutcome::Success(_) => ErrorCode::Success.value(),
            GetBufferOutcome::ServerBusy { .. } => ErrorCode::ServerBusy.value(),
            GetBufferOutcome::Failure { return_value } => *return_value,
        }
    }
}

// =========================================================================
// Upload
// =========================================================================

source_request!(DestinationConfigureRequest, RopId::FastTransferDestinationConfigure, {
    source_operation: u8 => put_u8, u8("SourceOperation"),
    copy_flags: u8 => put_u8, u8("CopyFlags"),
});

status_response!(
    DestinationConfigureResponse,
    RopId::FastTransferDestinationConfigure,
    output_handle_index
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPutBufferRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub data: Vec<u8>,
}

impl RopStructure for DestinationPutBufferRequest {
    const ROP_ID: RopId = RopId::FastTransferDestinationPutBuffer;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u16_le(count_u16(self.data.len(), "TransferData")?);
        buf.put_slice(&self.data);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let size = src.u16("TransferDataSize")? as usize;
        Ok(Self {
            logon_id,
            input_handle_index,
            data: src.vec(size, "TransferData")?,
        })
    }
}

impl RopRequestBody for DestinationPutBufferRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

/// Progress and the consumed byte count follow every return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPutBufferResponse {
    pub input_handle_index: u8,
    pub return_value: u32,
    pub progress: TransferProgress,
    pub buffer_used_size: u16,
}

impl RopStructure for DestinationPutBufferResponse {
    const ROP_ID: RopId = RopId::FastTransferDestinationPutBuffer;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        buf.put_u32_le(self.return_value);
        self.progress.encode(buf);
        buf.put_u16_le(self.buffer_used_size);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            return_value: src.u32("ReturnValue")?,
            progress: TransferProgress::decode(src)?,
            buffer_used_size: src.u16("BufferUsedSize")?,
        })
    }
}

impl RopResponseBody for DestinationPutBufferResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.return_value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TellVersionRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    /// Product major, build major and build minor of the peer server.
    pub version: [u16; 3],
}

impl RopStructure for TellVersionRequest {
    const ROP_ID: RopId = RopId::TellVersion;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        for part in self.version {
            buf.put_u16_le(part);
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            version: [
                src.u16("Version")?,
                src.u16("Version")?,
                src.u16("Version")?,
            ],
        })
    }
}

impl RopRequestBody for TellVersionRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(TellVersionResponse, RopId::TellVersion, input_handle_index);
