//! Protocol error types, ROP return values and RPC status codes.

use crate::rop_id::RopId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while framing, encoding or decoding ROP buffers.
///
/// Every variant means the buffer as a whole cannot be trusted. A ROP that
/// failed on the server is not an error at this layer; it decodes normally
/// with a nonzero return value.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("buffer truncated reading {field}: need {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("RopId {0:#04x} is reserved")]
    ReservedRopId(u8),

    #[error("unknown RopId {0:#04x}")]
    UnknownRopId(u8),

    #[error("no structure registered for {0}")]
    UnsupportedRop(RopId),

    #[error("response to request {position}: expected RopId {expected:#04x}, got {actual:#04x}")]
    UnexpectedRopId {
        position: usize,
        expected: u8,
        actual: u8,
    },

    #[error("no response for request {position} (RopId {rop_id:#04x})")]
    MissingResponse { position: usize, rop_id: u8 },

    #[error("{0} unexpected bytes after the last response")]
    TrailingBytes(usize),

    #[error("invalid RPC header: {0}")]
    InvalidHeader(String),

    #[error("invalid RPC header flags: {0:#06x}")]
    InvalidFlags(u16),

    #[error("compressed payloads are not supported")]
    CompressedPayload,

    #[error("{what} too large: {size} (max {max})")]
    TooLarge {
        what: &'static str,
        size: usize,
        max: usize,
    },

    #[error("handle table of {0} bytes is not a whole number of handles")]
    InvalidHandleTable(usize),

    #[error("invalid string in {0}")]
    InvalidString(&'static str),

    #[error("unsupported property type {0:#06x}")]
    UnsupportedPropertyType(u16),

    #[error("no column set known for the table at handle index {0}")]
    UnknownColumns(u8),

    #[error("invalid value {value:#x} for {field}")]
    InvalidValue { field: &'static str, value: u32 },
}

/// Well-known ROP return values.
///
/// The wire carries a raw `u32`; this enum only names the values callers
/// branch on. Unlisted values stay raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0x0000_0000,
    WrongServer = 0x0000_0478,
    ServerBusy = 0x0000_0480,
    NullDestinationObject = 0x0000_0503,
    ErrorsReturned = 0x0004_0380,
    GeneralFailure = 0x8000_4005,
    NotSupported = 0x8004_0102,
    InvalidObject = 0x8004_0108,
    OutOfResources = 0x8004_010E,
    NotFound = 0x8004_010F,
    LogonFailed = 0x8004_0111,
    TooComplex = 0x8004_0117,
    InvalidCodepage = 0x8004_011E,
    InvalidLocale = 0x8004_011F,
    TableTooBig = 0x8004_0403,
    InvalidBookmark = 0x8004_0405,
    AmbiguousRecipient = 0x8004_0700,
    AccessDenied = 0x8007_0005,
    NotEnoughMemory = 0x8007_000E,
    InvalidParameter = 0x8007_0057,
}

impl ErrorCode {
    const ALL: [ErrorCode; 20] = [
        ErrorCode::Success,
        ErrorCode::WrongServer,
        ErrorCode::ServerBusy,
        ErrorCode::NullDestinationObject,
        ErrorCode::ErrorsReturned,
        ErrorCode::GeneralFailure,
        ErrorCode::NotSupported,
        ErrorCode::InvalidObject,
        ErrorCode::OutOfResources,
        ErrorCode::NotFound,
        ErrorCode::LogonFailed,
        ErrorCode::TooComplex,
        ErrorCode::InvalidCodepage,
        ErrorCode::InvalidLocale,
        ErrorCode::TableTooBig,
        ErrorCode::InvalidBookmark,
        ErrorCode::AmbiguousRecipient,
        ErrorCode::AccessDenied,
        ErrorCode::NotEnoughMemory,
        ErrorCode::InvalidParameter,
    ];

    /// Looks up a raw return value.
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.value() == value)
    }

    pub fn value(self) -> u32 {
        self as u32
    }

    /// Returns whether retrying the same ROP later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ServerBusy | ErrorCode::OutOfResources | ErrorCode::NotEnoughMemory
        )
    }

    /// Formats a raw return value, using its name when known.
    pub fn describe(value: u32) -> String {
        match Self::from_u32(value) {
            Some(code) => format!("{} ({:#010x})", code, value),
            None => format!("{:#010x}", value),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Success => "SUCCESS",
            ErrorCode::WrongServer => "WRONG_SERVER",
            ErrorCode::ServerBusy => "SERVER_BUSY",
            ErrorCode::NullDestinationObject => "NULL_DESTINATION_OBJECT",
            ErrorCode::ErrorsReturned => "ERRORS_RETURNED",
            ErrorCode::GeneralFailure => "GENERAL_FAILURE",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::InvalidObject => "INVALID_OBJECT",
            ErrorCode::OutOfResources => "OUT_OF_RESOURCES",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::LogonFailed => "LOGON_FAILED",
            ErrorCode::TooComplex => "TOO_COMPLEX",
            ErrorCode::InvalidCodepage => "INVALID_CODEPAGE",
            ErrorCode::InvalidLocale => "INVALID_LOCALE",
            ErrorCode::TableTooBig => "TABLE_TOO_BIG",
            ErrorCode::InvalidBookmark => "INVALID_BOOKMARK",
            ErrorCode::AmbiguousRecipient => "AMBIGUOUS_RECIPIENT",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::NotEnoughMemory => "NOT_ENOUGH_MEMORY",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
        };
        f.write_str(name)
    }
}

/// Status returned by the RPC call itself rather than by a ROP.
///
/// A nonzero status aborts the whole call; no per-ROP result is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcErrorCode {
    /// Malformed input buffer, including reserved RopIds.
    RpcFormat,
    /// Output buffer size outside the accepted range.
    BufferTooSmall,
    /// Any other nonzero status.
    Other(u32),
}

impl RpcErrorCode {
    pub const RPC_FORMAT: u32 = 0x0000_04B6;
    pub const BUFFER_TOO_SMALL: u32 = 0x0000_047D;

    pub fn from_u32(value: u32) -> Self {
        match value {
            Self::RPC_FORMAT => RpcErrorCode::RpcFormat,
            Self::BUFFER_TOO_SMALL => RpcErrorCode::BufferTooSmall,
            other => RpcErrorCode::Other(other),
        }
    }

    pub fn value(&self) -> u32 {
        match self {
            RpcErrorCode::RpcFormat => Self::RPC_FORMAT,
            RpcErrorCode::BufferTooSmall => Self::BUFFER_TOO_SMALL,
            RpcErrorCode::Other(value) => *value,
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcErrorCode::RpcFormat => write!(f, "ecRpcFormat ({:#x})", Self::RPC_FORMAT),
            RpcErrorCode::BufferTooSmall => {
                write!(f, "ecBufferTooSmall ({:#x})", Self::BUFFER_TOO_SMALL)
            }
            RpcErrorCode::Other(value) => write!(f, "RPC status {:#x}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_lookup() {
        assert_eq!(ErrorCode::from_u32(0), Some(ErrorCode::Success));
        assert_eq!(ErrorCode::from_u32(0x478), Some(ErrorCode::WrongServer));
        assert_eq!(
            ErrorCode::from_u32(0x8004_010F),
            Some(ErrorCode::NotFound)
        );
        assert_eq!(ErrorCode::from_u32(0x1234_5678), None);

        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_u32(code.value()), Some(code));
        }
    }

    #[test]
    fn test_error_code_retryable() {
        assert!(ErrorCode::OutOfResources.is_retryable());
        assert!(ErrorCode::NotEnoughMemory.is_retryable());
        assert!(ErrorCode::ServerBusy.is_retryable());

        assert!(!ErrorCode::NotFound.is_retryable());
        assert!(!ErrorCode::AccessDenied.is_retryable());
        assert!(!ErrorCode::WrongServer.is_retryable());
    }

    #[test]
    fn test_error_code_describe() {
        assert_eq!(ErrorCode::describe(0x8004_010F), "NOT_FOUND (0x8004010f)");
        assert_eq!(ErrorCode::describe(0xDEAD), "0x0000dead");
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::NullDestinationObject).unwrap();
        assert_eq!(json, "\"NULL_DESTINATION_OBJECT\"");

        let parsed: ErrorCode = serde_json::from_str("\"ACCESS_DENIED\"").unwrap();
        assert_eq!(parsed, ErrorCode::AccessDenied);
    }

    #[test]
    fn test_rpc_error_code_mapping() {
        assert_eq!(RpcErrorCode::from_u32(0x4B6), RpcErrorCode::RpcFormat);
        assert_eq!(RpcErrorCode::from_u32(0x47D), RpcErrorCode::BufferTooSmall);
        assert_eq!(RpcErrorCode::from_u32(1726), RpcErrorCode::Other(1726));
        assert_eq!(RpcErrorCode::Other(1726).value(), 1726);
        assert!(RpcErrorCode::RpcFormat.to_string().contains("ecRpcFormat"));
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::Truncated {
            field: "ReturnValue",
            needed: 4,
            available: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("ReturnValue"));
        assert!(msg.contains('4'));

        let err = ProtocolError::ReservedRopId(0x28);
        assert!(err.to_string().contains("0x28"));

        let err = ProtocolError::UnsupportedRop(RopId::Notify);
        assert!(err.to_string().contains("Notify"));

        let err = ProtocolError::InvalidFlags(0x00F0);
        assert!(err.to_string().contains("0x00f0"));
    }
}
