//! Stream ROPs.

use super::{
    input_only_request, status_response, DecodeContext, DualHandleOutcome, HandleSlots,
    RopOutcome, RopRequestBody, RopResponseBody, RopStructure,
};
use crate::classify::ResponseKind;
use crate::error::ProtocolError;
use crate::rop_id::RopId;
use crate::types::PropertyTag;
use crate::wire::{count_u16, Reader};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// OpenModeFlags of OpenStream.
pub mod stream_open_flags {
    pub const READ_ONLY: u8 = 0x00;
    pub const READ_WRITE: u8 = 0x01;
    pub const CREATE: u8 = 0x02;
}

/// Origin of SeekStream and SeekRow.
pub mod seek_origin {
    pub const BEGINNING: u8 = 0x00;
    pub const CURRENT: u8 = 0x01;
    pub const END: u8 = 0x02;
}

/// ByteCount value announcing a trailing 32-bit MaximumByteCount.
pub const EXTENDED_READ_MARKER: u16 = 0xBAAD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStreamRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
    pub property_tag: PropertyTag,
    pub open_mode_flags: u8,
}

impl RopStructure for OpenStreamRequest {
    const ROP_ID: RopId = RopId::OpenStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.output_handle_index);
        self.property_tag.encode(buf);
        buf.put_u8(self.open_mode_flags);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            output_handle_index: src.u8("OutputHandleIndex")?,
            property_tag: PropertyTag::decode(src)?,
            open_mode_flags: src.u8("OpenModeFlags")?,
        })
    }
}

impl RopRequestBody for OpenStreamRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStreamResponse {
    pub output_handle_index: u8,
    /// StreamSize.
    pub outcome: RopOutcome<u32>,
}

impl RopStructure for OpenStreamResponse {
    const ROP_ID: RopId = RopId::OpenStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        self.outcome.encode_with(buf, |size, buf| {
            buf.put_u32_le(*size);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            output_handle_index: src.u8("OutputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u32("StreamSize"))?,
        })
    }
}

impl RopResponseBody for OpenStreamResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

/// How much a ReadStream asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSize {
    /// Plain 16-bit ByteCount. `EXTENDED_READ_MARKER` is not a valid count.
    Bytes(u16),
    /// ByteCount 0xBAAD followed by a 32-bit MaximumByteCount.
    Maximum(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStreamRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub size: ReadSize,
}

impl RopStructure for ReadStreamRequest {
    const ROP_ID: RopId = RopId::ReadStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        match self.size {
            ReadSize::Bytes(EXTENDED_READ_MARKER) => {
                return Err(ProtocolError::InvalidValue {
                    field: "ByteCount",
                    value: u32::from(EXTENDED_READ_MARKER),
                })
            }
            ReadSize::Bytes(count) => buf.put_u16_le(count),
            ReadSize::Maximum(max) => {
                buf.put_u16_le(EXTENDED_READ_MARKER);
                buf.put_u32_le(max);
            }
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let size = match src.u16("ByteCount")? {
            EXTENDED_READ_MARKER => ReadSize::Maximum(src.u32("MaximumByteCount")?),
            count => ReadSize::Bytes(count),
        };
        Ok(Self {
            logon_id,
            input_handle_index,
            size,
        })
    }
}

impl RopRequestBody for ReadStreamRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStreamResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<u8>>,
}

impl RopStructure for ReadStreamResponse {
    const ROP_ID: RopId = RopId::ReadStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |data, buf| {
            buf.put_u16_le(count_u16(data.len(), "Data")?);
            buf.put_slice(data);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let size = src.u16("DataSize")? as usize;
                src.vec(size, "Data")
            })?,
        })
    }
}

impl RopResponseBody for ReadStreamResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

/// Declares the request and response of a ROP writing one chunk of
/// data to a stream. WriteAndCommitStream also commits it.
macro_rules! write_stream_rop {
    ($request:ident, $response:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $request {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub data: Vec<u8>,
        }

        impl RopStructure for $request {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                buf.put_u16_le(count_u16(self.data.len(), "Data")?);
                buf.put_slice(&self.data);
                Ok(())
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                let logon_id = src.u8("LogonId")?;
                let input_handle_index = src.u8("InputHandleIndex")?;
                let size = src.u16("DataSize")? as usize;
                Ok(Self {
                    logon_id,
                    input_handle_index,
                    data: src.vec(size, "Data")?,
                })
            }
        }

        impl RopRequestBody for $request {
            fn logon_id(&self) -> u8 {
                self.logon_id
            }

            fn handle_slots(&self) -> HandleSlots {
                HandleSlots::input(self.input_handle_index)
            }
        }

        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $response {
            pub input_handle_index: u8,
            /// WrittenSize.
            pub outcome: RopOutcome<u16>,
        }

        impl RopStructure for $response {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.input_handle_index);
                self.outcome.encode_with(buf, |written, buf| {
                    buf.put_u16_le(*written);
                    Ok(())
                })
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    input_handle_index: src.u8("InputHandleIndex")?,
                    outcome: RopOutcome::decode_with(src, |src| src.u16("WrittenSize"))?,
                })
            }
        }

        impl RopResponseBody for $response {
            fn handle_index(&self) -> Option<u8> {
                Some(self.input_handle_index)
            }

            fn return_value(&self) -> u32 {
                self.outcome.return_value()
            }
        }
    };
}

write_stream_rop!(WriteStreamRequest, WriteStreamResponse, RopId::WriteStream);
write_stream_rop!(
    WriteAndCommitStreamRequest,
    WriteAndCommitStreamResponse,
    RopId::WriteAndCommitStream
);

input_only_request!(CommitStreamRequest, RopId::CommitStream);
status_response!(CommitStreamResponse, RopId::CommitStream, input_handle_index);

input_only_request!(GetStreamSizeRequest, RopId::GetStreamSize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStreamSizeResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<u32>,
}

impl RopStructure for GetStreamSizeResponse {
    const ROP_ID: RopId = RopId::GetStreamSize;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |size, buf| {
            buf.put_u32_le(*size);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u32("StreamSize"))?,
        })
    }
}

impl RopResponseBody for GetStreamSizeResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStreamSizeRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub stream_size: u64,
}

impl RopStructure for SetStreamSizeRequest {
    const ROP_ID: RopId = RopId::SetStreamSize;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.stream_size);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            stream_size: src.u64("StreamSize")?,
        })
    }
}

impl RopRequestBody for SetStreamSizeRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(SetStreamSizeResponse, RopId::SetStreamSize, input_handle_index);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekStreamRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub origin: u8,
    pub offset: i64,
}

impl RopStructure for SeekStreamRequest {
    const ROP_ID: RopId = RopId::SeekStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u8(self.origin);
        buf.put_i64_le(self.offset);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            origin: src.u8("Origin")?,
            offset: src.i64("Offset")?,
        })
    }
}

impl RopRequestBody for SeekStreamRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekStreamResponse {
    pub input_handle_index: u8,
    /// NewPosition.
    pub outcome: RopOutcome<u64>,
}

impl RopStructure for SeekStreamResponse {
    const ROP_ID: RopId = RopId::SeekStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |position, buf| {
            buf.put_u64_le(*position);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u64("NewPosition"))?,
        })
    }
}

impl RopResponseBody for SeekStreamResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyToStreamRequest {
    pub logon_id: u8,
    pub source_handle_index: u8,
    pub dest_handle_index: u8,
    pub byte_count: u64,
}

impl RopStructure for CopyToStreamRequest {
    const ROP_ID: RopId = RopId::CopyToStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.source_handle_index);
        buf.put_u8(self.dest_handle_index);
        buf.put_u64_le(self.byte_count);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            source_handle_index: src.u8("SourceHandleIndex")?,
            dest_handle_index: src.u8("DestHandleIndex")?,
            byte_count: src.u64("ByteCount")?,
        })
    }
}

impl RopRequestBody for CopyToStreamRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::source_destination(self.source_handle_index, self.dest_handle_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopiedBytes {
    pub read_byte_count: u64,
    pub written_byte_count: u64,
}

impl CopiedBytes {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u64_le(self.read_byte_count);
        buf.put_u64_le(self.written_byte_count);
        Ok(())
    }

    fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            read_byte_count: src.u64("ReadByteCount")?,
            written_byte_count: src.u64("WrittenByteCount")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyToStreamResponse {
    pub source_handle_index: u8,
    pub outcome: DualHandleOutcome<CopiedBytes>,
}

impl RopStructure for CopyToStreamResponse {
    const ROP_ID: RopId = RopId::CopyToStream;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.source_handle_index);
        self.outcome.encode_with(
            buf,
            CopiedBytes::encode,
            CopiedBytes::encode,
            CopiedBytes::encode,
        )
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            source_handle_index: src.u8("SourceHandleIndex")?,
            outcome: DualHandleOutcome::decode_with(
                src,
                CopiedBytes::decode,
                CopiedBytes::decode,
                CopiedBytes::decode,
            )?,
        })
    }
}

impl RopResponseBody for CopyToStreamResponse {
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

// =========================================================================
// Region locks and clones
// =========================================================================

/// LockFlags of LockRegionStream and UnlockRegionStream.
pub mod lock_flags {
    /// Other openers may still read the region.
    pub const WRITE: u32 = 0x0000_0000;
    pub const EXCLUSIVE: u32 = 0x0000_0001;
}

macro_rules! region_request {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub region_offset: u64,
            pub region_size: u64,
            pub lock_flags: u32,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                buf.put_u64_le(self.region_offset);
                buf.put_u64_le(self.region_size);
                buf.put_u32_le(self.lock_flags);
                Ok(())
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    logon_id: src.u8("LogonId")?,
                    input_handle_index: src.u8("InputHandleIndex")?,
                    region_offset: src.u64("RegionOffset")?,
                    region_size: src.u64("RegionSize")?,
                    lock_flags: src.u32("LockFlags")?,
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

region_request!(LockRegionStreamRequest, RopId::LockRegionStream);
status_response!(
    LockRegionStreamResponse,
    RopId::LockRegionStream,
    input_handle_index
);

region_request!(UnlockRegionStreamRequest, RopId::UnlockRegionStream);
status_response!(
    UnlockRegionStreamResponse,
    RopId::UnlockRegionStream,
    input_handle_index
);

/// Opens a second stream object over the same data with its own seek
/// pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneStreamRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub output_handle_index: u8,
}

impl RopStructure for CloneStreamRequest {
    const ROP_ID: RopId = RopId::CloneStream;

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

impl RopRequestBody for CloneStreamRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input_output(self.input_handle_index, self.output_handle_index)
    }
}

status_response!(CloneStreamResponse, RopId::CloneStream, output_handle_index);
