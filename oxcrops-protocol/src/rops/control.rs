//! Release, server-originated pseudo-responses, and untyped ROPs.

use super::{input_only_request, DecodeContext, RopResponseBody, RopStructure};
use crate::classify::ResponseKind;
use crate::error::{ProtocolError, RpcErrorCode};
use crate::rop_id::RopId;
use crate::wire::{count_u16, count_u8, Reader};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

input_only_request!(
    /// Frees the object at `input_handle_index`. The server sends nothing back.
    ReleaseRequest,
    RopId::Release
);

/// The output buffer could not hold the next response.
///
/// Always the last ROP in a response buffer. `request_buffers` holds the
/// request bytes the server did not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferTooSmallResponse {
    pub size_needed: u16,
    pub request_buffers: Vec<u8>,
}

impl RopStructure for BufferTooSmallResponse {
    const ROP_ID: RopId = RopId::BufferTooSmall;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(self.size_needed);
        buf.put_slice(&self.request_buffers);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            size_needed: src.u16("SizeNeeded")?,
            request_buffers: src.rest().to_vec(),
        })
    }
}

impl RopResponseBody for BufferTooSmallResponse {
    fn handle_index(&self) -> Option<u8> {
        None
    }

    fn return_value(&self) -> u32 {
        RpcErrorCode::BUFFER_TOO_SMALL
    }

    fn kind(&self) -> ResponseKind {
        ResponseKind::Failure
    }
}

/// Notifications are waiting on the session at `session_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResponse {
    pub session_index: u16,
}

impl RopStructure for PendingResponse {
    const ROP_ID: RopId = RopId::Pending;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u16_le(self.session_index);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            session_index: src.u16("SessionIndex")?,
        })
    }
}

impl RopResponseBody for PendingResponse {
    fn handle_index(&self) -> Option<u8> {
        None
    }

    fn return_value(&self) -> u32 {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffRop {
    pub rop_id: u8,
    /// Milliseconds.
    pub duration: u32,
}

/// The server asks the client to slow down, for the whole logon or per ROP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffResponse {
    pub logon_id: u8,
    /// Milliseconds.
    pub duration: u32,
    pub rops: Vec<BackoffRop>,
    pub additional_data: Vec<u8>,
}

impl RopStructure for BackoffResponse {
    const ROP_ID: RopId = RopId::Backoff;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u32_le(self.duration);
        buf.put_u8(count_u8(self.rops.len(), "BackoffRopData")?);
        for rop in &self.rops {
            buf.put_u8(rop.rop_id);
            buf.put_u32_le(rop.duration);
        }
        buf.put_u16_le(count_u16(self.additional_data.len(), "AdditionalData")?);
        buf.put_slice(&self.additional_data);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let duration = src.u32("Duration")?;
        let count = src.u8("BackoffRopCount")?;
        let rops = (0..count)
            .map(|_| {
                Ok(BackoffRop {
                    rop_id: src.u8("RopIdBackoff")?,
                    duration: src.u32("Duration")?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;
        let size = src.u16("AdditionalDataSize")? as usize;
        Ok(Self {
            logon_id,
            duration,
            rops,
            additional_data: src.vec(size, "AdditionalData")?,
        })
    }
}

impl RopResponseBody for BackoffResponse {
    fn handle_index(&self) -> Option<u8> {
        None
    }

    fn return_value(&self) -> u32 {
        0
    }
}

/// A request with an arbitrary RopId and an opaque body.
///
/// Used for ROPs without a typed structure and to provoke protocol errors
/// on purpose. The body runs to the end of the ROP section, so a raw
/// request can only be decoded in last position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    pub rop_id: u8,
    pub logon_id: u8,
    pub input_handle_index: u8,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl RawRequest {
    pub fn new(rop_id: u8, logon_id: u8, input_handle_index: u8) -> Self {
        Self {
            rop_id,
            logon_id,
            input_handle_index,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Writes the whole request, RopId included.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.rop_id);
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_slice(&self.payload);
    }

    /// Reads the bytes that follow an already consumed RopId.
    pub fn decode_after_id(rop_id: u8, src: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            rop_id,
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            payload: src.rest().to_vec(),
        })
    }
}

/// A response kept as bytes because no typed structure covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub rop_id: u8,
    pub payload: Vec<u8>,
}

impl RawResponse {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.rop_id);
        buf.put_slice(&self.payload);
    }

    pub fn decode_after_id(rop_id: u8, src: &mut Reader) -> Self {
        Self {
            rop_id,
            payload: src.rest().to_vec(),
        }
    }

    /// The InputHandleIndex and ReturnValue most responses start with, if
    /// the payload is long enough to hold them.
    pub fn return_value(&self) -> Option<u32> {
        self.payload
            .get(1..5)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u32::from_le_bytes)
    }
}
