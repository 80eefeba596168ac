//! Response classification.
//!
//! A decoded response is one of four shapes. Callers state which shape they
//! expect; [`reconcile`] checks the observation against it, with an RPC
//! failure of the whole call as a fifth possible observation.

use crate::error::RpcErrorCode;
use crate::response::RopResponse;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Shape of a decoded ROP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// ReturnValue 0.
    Success,
    /// Nonzero ReturnValue in the generic failure layout.
    Failure,
    /// Logon answered with WrongServer and a server name.
    Redirect,
    /// Dual-handle ROP whose destination did not resolve.
    NullDestinationFailure,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseKind::Success => "success",
            ResponseKind::Failure => "failure",
            ResponseKind::Redirect => "redirect",
            ResponseKind::NullDestinationFailure => "null-destination failure",
        };
        f.write_str(name)
    }
}

/// What a caller expects a call to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedResponse {
    Success,
    Failure,
    Redirect,
    NullDestinationFailure,
    /// The RPC call itself fails; no ROP responses.
    RpcError,
    /// Any well-formed response.
    #[default]
    Any,
}

impl From<ResponseKind> for ExpectedResponse {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Success => ExpectedResponse::Success,
            ResponseKind::Failure => ExpectedResponse::Failure,
            ResponseKind::Redirect => ExpectedResponse::Redirect,
            ResponseKind::NullDestinationFailure => ExpectedResponse::NullDestinationFailure,
        }
    }
}

impl fmt::Display for ExpectedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedResponse::Success => ResponseKind::Success.fmt(f),
            ExpectedResponse::Failure => ResponseKind::Failure.fmt(f),
            ExpectedResponse::Redirect => ResponseKind::Redirect.fmt(f),
            ExpectedResponse::NullDestinationFailure => ResponseKind::NullDestinationFailure.fmt(f),
            ExpectedResponse::RpcError => f.write_str("RPC error"),
            ExpectedResponse::Any => f.write_str("any response"),
        }
    }
}

/// What a call actually produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "observed", content = "value", rename_all = "snake_case")]
pub enum Observed {
    Response(ResponseKind),
    RpcError(RpcErrorCode),
    /// The call produced no response to classify, e.g. a lone Release.
    Nothing,
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Response(kind) => kind.fmt(f),
            Observed::RpcError(code) => write!(f, "RPC error {}", code),
            Observed::Nothing => f.write_str("no response"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected}, got {actual}")]
pub struct ResponseMismatch {
    pub expected: ExpectedResponse,
    pub actual: Observed,
}

/// Classifies a decoded response from its own fields.
pub fn classify(response: &RopResponse) -> ResponseKind {
    response.kind()
}

/// Checks an observation against an expectation.
pub fn reconcile(expected: ExpectedResponse, actual: Observed) -> Result<(), ResponseMismatch> {
    let matches = match (expected, actual) {
        (ExpectedResponse::Any, Observed::Response(_) | Observed::Nothing) => true,
        (ExpectedResponse::RpcError, Observed::RpcError(_)) => true,
        (expected, Observed::Response(kind)) => expected == ExpectedResponse::from(kind),
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(ResponseMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rops::logon::{LogonFlags, LogonOutcome, LogonResponse};
    use crate::rops::RopOutcome;
    use crate::rops::table::ResetTableResponse;

    #[test]
    fn test_classify_redirect() {
        let response = RopResponse::Logon(LogonResponse {
            output_handle_index: 0,
            outcome: LogonOutcome::Redirect {
                logon_flags: LogonFlags::private(),
                server_name: "/o=First Organization/cn=Servers/cn=MBX02".into(),
            },
        });
        assert_eq!(classify(&response), ResponseKind::Redirect);
        assert_eq!(response.return_value(), ErrorCode::WrongServer.value());
    }

    #[test]
    fn test_classify_failure_and_success() {
        let ok = RopResponse::ResetTable(ResetTableResponse::new(0, 0));
        assert_eq!(classify(&ok), ResponseKind::Success);

        let failed = RopResponse::GetStoreState(crate::rops::logon::GetStoreStateResponse {
            input_handle_index: 0,
            outcome: RopOutcome::Failure(ErrorCode::NotSupported.value()),
        });
        assert_eq!(classify(&failed), ResponseKind::Failure);
    }

    #[test]
    fn test_reconcile() {
        let success = Observed::Response(ResponseKind::Success);
        assert!(reconcile(ExpectedResponse::Success, success).is_ok());
        assert!(reconcile(ExpectedResponse::Any, success).is_ok());
        assert!(reconcile(ExpectedResponse::Any, Observed::Nothing).is_ok());

        let err = reconcile(ExpectedResponse::Failure, success).unwrap_err();
        assert_eq!(err.expected, ExpectedResponse::Failure);
        assert_eq!(err.to_string(), "expected failure, got success");

        let rpc = Observed::RpcError(RpcErrorCode::RpcFormat);
        assert!(reconcile(ExpectedResponse::RpcError, rpc).is_ok());
        assert!(reconcile(ExpectedResponse::Any, rpc).is_err());
        assert!(reconcile(
            ExpectedResponse::RpcError,
            Observed::Response(ResponseKind::Failure)
        )
        .is_err());
    }

    #[test]
    fn test_null_destination_is_not_generic_failure() {
        let observed = Observed::Response(ResponseKind::NullDestinationFailure);
        assert!(reconcile(ExpectedResponse::NullDestinationFailure, observed).is_ok());
        assert!(reconcile(ExpectedResponse::Failure, observed).is_err());
    }
}
