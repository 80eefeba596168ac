//! # oxcrops-protocol
//!
//! Remote Operations (ROP) codec for the mailbox access protocol.
//!
//! This crate provides:
//! - The ROP structure catalog: typed request/response pairs per RopId
//! - RPC extended buffer framing (`RPC_HEADER_EXT`, handle tables, XOR)
//! - An encoder and a request-correlated response decoder
//! - Response classification and RPC-level limits
//!
//! Nothing here performs I/O.

pub mod buffer;
pub mod classify;
pub mod codec;
pub mod error;
pub mod limits;
pub mod property;
pub mod request;
pub mod response;
pub mod rop_id;
pub mod rops;
pub mod types;
pub mod wire;

pub use buffer::{HeaderFlags, RopPayload, RpcHeaderExt, RPC_HEADER_EXT_SIZE, XOR_MAGIC};
pub use classify::{classify, reconcile, ExpectedResponse, Observed, ResponseKind, ResponseMismatch};
pub use codec::{
    CorrelatedResponse, DecodedRequest, DecodedResponses, Decoder, Encoder, ResponsePlan,
    TableColumns,
};
pub use error::{ErrorCode, ProtocolError, RpcErrorCode};
pub use limits::RpcLimits;
pub use property::{PropertyRow, PropertyValue, TaggedPropertyValue};
pub use request::RopRequest;
pub use response::RopResponse;
pub use rop_id::{ReservedRopIds, RopId};
pub use types::{LogonKind, LogonKinds, LongTermId, PropertyTag, ServerObjectHandle};

/// Handle-table entry for an index with no object behind it.
pub const INVALID_HANDLE: u32 = 0xFFFF_FFFF;

/// Output buffer size requested when the caller names none.
pub const DEFAULT_OUTPUT_BUFFER_SIZE: u32 = 0x1_0008;

/// Smallest output buffer size servers accept.
pub const MIN_OUTPUT_BUFFER_SIZE: u32 = 0x8008;

/// Largest output buffer size servers honour.
pub const MAX_OUTPUT_BUFFER_SIZE: u32 = 0x4_0000;
