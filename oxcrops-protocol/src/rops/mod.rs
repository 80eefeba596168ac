//! ROP structure catalog.
//!
//! One request struct and one response struct per RopId, grouped by the
//! object family they operate on. Every structure knows its own RopId and
//! how to write and read the bytes that follow it.
//!
//! Response payloads that only exist on success are carried inside
//! [`RopOutcome::Success`], so a failed response cannot hold success-only
//! fields. Fields gated by a sibling flag are `Option`s whose presence is
//! decided while decoding, from the flag read just before them.

pub mod control;
pub mod fasttransfer;
pub mod folder;
pub mod logon;
pub mod message;
pub mod named;
pub mod notification;
pub mod property;
pub mod stream;
pub mod synchronization;
pub mod table;
pub mod transport;

use crate::classify::ResponseKind;
use crate::error::{ErrorCode, ProtocolError};
use crate::rop_id::RopId;
use crate::types::{LogonKind, LogonKinds, PropertyTag};
use crate::wire::Reader;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Per-call knowledge a decoder needs beyond the bytes themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeContext<'a> {
    /// Logon kinds by LogonId, for request layouts that differ by store.
    pub logons: Option<&'a LogonKinds>,
    /// Column set for the response being decoded, for row-bearing ROPs.
    pub columns: Option<&'a [PropertyTag]>,
}

impl<'a> DecodeContext<'a> {
    pub fn with_logons(logons: &'a LogonKinds) -> Self {
        Self {
            logons: Some(logons),
            columns: None,
        }
    }

    pub fn logon_kind(&self, logon_id: u8) -> LogonKind {
        self.logons
            .map(|kinds| kinds.get(logon_id))
            .unwrap_or_default()
    }

    pub(crate) fn require_columns(&self, handle_index: u8) -> Result<&'a [PropertyTag], ProtocolError> {
        self.columns
            .ok_or(ProtocolError::UnknownColumns(handle_index))
    }
}

/// A structure identified by a RopId.
pub trait RopStructure: Sized {
    const ROP_ID: RopId;

    /// Writes everything after the RopId byte.
    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError>;

    /// Reads everything after the RopId byte.
    fn decode_body(src: &mut Reader, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError>;
}

/// Handle-table indices a request names.
///
/// Indices are positions in the handle list sent with the call, not
/// server handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleSlots {
    /// Object the ROP acts on (InputHandleIndex or SourceHandleIndex).
    pub input: Option<u8>,
    /// Slot receiving a newly opened or created object.
    pub output: Option<u8>,
    /// Destination object of a dual-handle ROP.
    pub destination: Option<u8>,
    /// Slot the response is echoed under without creating an object.
    pub response: Option<u8>,
}

impl HandleSlots {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn input(input: u8) -> Self {
        Self {
            input: Some(input),
            ..Self::default()
        }
    }

    pub fn output(output: u8) -> Self {
        Self {
            output: Some(output),
            ..Self::default()
        }
    }

    pub fn input_output(input: u8, output: u8) -> Self {
        Self {
            input: Some(input),
            output: Some(output),
            ..Self::default()
        }
    }

    pub fn source_destination(source: u8, destination: u8) -> Self {
        Self {
            input: Some(source),
            destination: Some(destination),
            ..Self::default()
        }
    }

    pub fn response_input(response: u8, input: u8) -> Self {
        Self {
            input: Some(input),
            response: Some(response),
            ..Self::default()
        }
    }

    /// Highest index named, if any.
    pub fn max_index(&self) -> Option<u8> {
        [self.input, self.output, self.destination, self.response]
            .into_iter()
            .flatten()
            .max()
    }
}

/// Common accessors of request structures.
pub trait RopRequestBody: RopStructure {
    fn logon_id(&self) -> u8;
    fn handle_slots(&self) -> HandleSlots;
}

/// Common accessors of response structures.
pub trait RopResponseBody: RopStructure {
    /// Handle index echoed in the response header, if the layout has one.
    fn handle_index(&self) -> Option<u8>;

    fn return_value(&self) -> u32;

    fn kind(&self) -> ResponseKind {
        if self.return_value() == ErrorCode::Success.value() {
            ResponseKind::Success
        } else {
            ResponseKind::Failure
        }
    }
}

/// Result of a ROP whose payload is only sent on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "body", rename_all = "snake_case")]
pub enum RopOutcome<T> {
    Success(T),
    /// Nonzero return value. A zero here would encode as success.
    Failure(u32),
}

impl<T> RopOutcome<T> {
    pub fn return_value(&self) -> u32 {
        match self {
            RopOutcome::Success(_) => ErrorCode::Success.value(),
            RopOutcome::Failure(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RopOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            RopOutcome::Success(body) => Some(body),
            RopOutcome::Failure(_) => None,
        }
    }

    pub fn into_success(self) -> Option<T> {
        match self {
            RopOutcome::Success(body) => Some(body),
            RopOutcome::Failure(_) => None,
        }
    }

    pub(crate) fn encode_with<F>(&self, buf: &mut BytesMut, encode: F) -> Result<(), ProtocolError>
    where
        F: FnOnce(&T, &mut BytesMut) -> Result<(), ProtocolError>,
    {
        match self {
            RopOutcome::Success(body) => {
                buf.put_u32_le(ErrorCode::Success.value());
                encode(body, buf)
            }
            RopOutcome::Failure(code) => {
                buf.put_u32_le(*code);
                Ok(())
            }
        }
    }

    pub(crate) fn decode_with<F>(src: &mut Reader, decode: F) -> Result<Self, ProtocolError>
    where
        F: FnOnce(&mut Reader) -> Result<T, ProtocolError>,
    {
        let return_value = src.u32("ReturnValue")?;
        if return_value == ErrorCode::Success.value() {
            Ok(RopOutcome::Success(decode(src)?))
        } else {
            Ok(RopOutcome::Failure(return_value))
        }
    }
}

/// Result of a ROP with a source and a destination object.
///
/// When the destination index does not resolve to an object the server
/// answers with a layout of its own: the offending index followed by
/// `N`. Other failures are followed by `F`, which is empty for the copy
/// family and PartialCompletion or the byte counts for the move family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DualHandleOutcome<T, N = T, F = N> {
    Success { body: T },
    NullDestination { dest_handle_index: u32, body: N },
    Failure { return_value: u32, body: F },
}

impl<T, N, F> DualHandleOutcome<T, N, F> {
    pub fn return_value(&self) -> u32 {
        match self {
            DualHandleOutcome::Success { .. } => ErrorCode::Success.value(),
            DualHandleOutcome::NullDestination { .. } => ErrorCode::NullDestinationObject.value(),
            DualHandleOutcome::Failure { return_value, .. } => *return_value,
        }
    }

    pub fn kind(&self) -> ResponseKind {
        match self {
            DualHandleOutcome::Success { .. } => ResponseKind::Success,
            DualHandleOutcome::NullDestination { .. } => ResponseKind::NullDestinationFailure,
            DualHandleOutcome::Failure { .. } => ResponseKind::Failure,
        }
    }

    pub(crate) fn encode_with<E, G, H>(
        &self,
        buf: &mut BytesMut,
        encode: E,
        encode_null: G,
        encode_failure: H,
    ) -> Result<(), ProtocolError>
    where
        E: FnOnce(&T, &mut BytesMut) -> Result<(), ProtocolError>,
        G: FnOnce(&N, &mut BytesMut) -> Result<(), ProtocolError>,
        H: FnOnce(&F, &mut BytesMut) -> Result<(), ProtocolError>,
    {
        buf.put_u32_le(self.return_value());
        match self {
            DualHandleOutcome::Success { body } => encode(body, buf),
            DualHandleOutcome::NullDestination {
                dest_handle_index,
                body,
            } => {
                buf.put_u32_le(*dest_handle_index);
                encode_null(body, buf)
            }
            DualHandleOutcome::Failure { body, .. } => encode_failure(body, buf),
        }
    }

    pub(crate) fn decode_with<D, G, H>(
        src: &mut Reader,
        decode: D,
        decode_null: G,
        decode_failure: H,
    ) -> Result<Self, ProtocolError>
    where
        D: FnOnce(&mut Reader) -> Result<T, ProtocolError>,
        G: FnOnce(&mut Reader) -> Result<N, ProtocolError>,
        H: FnOnce(&mut Reader) -> Result<F, ProtocolError>,
    {
        let return_value = src.u32("ReturnValue")?;
        if return_value == ErrorCode::Success.value() {
            Ok(DualHandleOutcome::Success { body: decode(src)? })
        } else if return_value == ErrorCode::NullDestinationObject.value() {
            let dest_handle_index = src.u32("DestHandleIndex")?;
            Ok(DualHandleOutcome::NullDestination {
                dest_handle_index,
                body: decode_null(src)?,
            })
        } else {
            Ok(DualHandleOutcome::Failure {
                return_value,
                body: decode_failure(src)?,
            })
        }
    }
}

/// Declares a response made of a handle index and a return value only.
macro_rules! status_response {
    ($(#[$meta:meta])* $name:ident, $rop:expr, $index:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            pub $index: u8,
            pub return_value: u32,
        }

        impl $name {
            pub fn new($index: u8, return_value: u32) -> Self {
                Self { $index, return_value }
            }
        }

        impl $crate::rops::RopStructure for $name {
            const ROP_ID: $crate::rop_id::RopId = $rop;

            fn encode_body(
                &self,
                buf: &mut bytes::BytesMut,
            ) -> Result<(), $crate::error::ProtocolError> {
                bytes::BufMut::put_u8(buf, self.$index);
                bytes::BufMut::put_u32_le(buf, self.return_value);
                Ok(())
            }

            fn decode_body(
                src: &mut $crate::wire::Reader,
                _ctx: &$crate::rops::DecodeContext<'_>,
            ) -> Result<Self, $crate::error::ProtocolError> {
                Ok(Self {
                    $index: src.u8(stringify!($index))?,
                    return_value: src.u32("ReturnValue")?,
                })
            }
        }

        impl $crate::rops::RopResponseBody for $name {
            fn handle_index(&self) -> Option<u8> {
                Some(self.$index)
            }

            fn return_value(&self) -> u32 {
                self.return_value
            }
        }
    };
}

/// Declares a request that names only its input object.
macro_rules! input_only_request {
    ($(#[$meta:meta])* $name:ident, $rop:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
        }

        impl $name {
            pub fn new(logon_id: u8, input_handle_index: u8) -> Self {
                Self {
                    logon_id,
                    input_handle_index,
                }
            }
        }

        impl $crate::rops::RopStructure for $name {
            const ROP_ID: $crate::rop_id::RopId = $rop;

            fn encode_body(
                &self,
                buf: &mut bytes::BytesMut,
            ) -> Result<(), $crate::error::ProtocolError> {
                bytes::BufMut::put_u8(buf, self.logon_id);
                bytes::BufMut::put_u8(buf, self.input_handle_index);
                Ok(())
            }

            fn decode_body(
                src: &mut $crate::wire::Reader,
                _ctx: &$crate::rops::DecodeContext<'_>,
            ) -> Result<Self, $crate::error::ProtocolError> {
                Ok(Self {
                    logon_id: src.u8("LogonId")?,
                    input_handle_index: src.u8("InputHandleIndex")?,
                })
            }
        }

        impl $crate::rops::RopRequestBody for $name {
            fn logon_id(&self) -> u8 {
                self.logon_id
            }

            fn handle_slots(&self) -> $crate::rops::HandleSlots {
                $crate::rops::HandleSlots::input(self.input_handle_index)
            }
        }
    };
}

pub(crate) use input_only_request;
pub(crate) use status_response;
