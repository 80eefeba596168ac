//! Client error types.

use crate::config::ConfigError;
use crate::transport::TransportError;
use oxcrops_protocol::{ExpectedResponse, Observed, ProtocolError, ResponseMismatch, RpcErrorCode};
use thiserror::Error;

/// Client errors.
///
/// A ROP that failed on the server is not an error here; it comes back as a
/// decoded response with a nonzero return value.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The RPC call as a whole was rejected. No ROP result is meaningful.
    #[error("RPC error: {code}")]
    Rpc { code: RpcErrorCode },

    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("request timeout")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("already connected to {0}")]
    AlreadyConnected(String),

    #[error("not logged on")]
    NotLoggedOn,

    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: ExpectedResponse,
        actual: Observed,
    },

    #[error("redirect limit of {limit} reached, last redirected to {server}")]
    RedirectLimit { limit: u32, server: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Timeout => true,
            ClientError::Transport(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// RPC status of the failed call, if the call itself failed.
    pub fn rpc_code(&self) -> Option<RpcErrorCode> {
        match self {
            ClientError::Rpc { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rpc(code) => ClientError::Rpc { code },
            other => ClientError::Transport(other),
        }
    }
}

impl From<ResponseMismatch> for ClientError {
    fn from(err: ResponseMismatch) -> Self {
        ClientError::UnexpectedResponse {
            expected: err.expected,
            actual: err.actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxcrops_protocol::ResponseKind;

    #[test]
    fn test_transport_rpc_status_maps_to_rpc_tier() {
        let err = ClientError::from(TransportError::Rpc(RpcErrorCode::RpcFormat));
        assert_eq!(err.rpc_code(), Some(RpcErrorCode::RpcFormat));
        assert!(!err.is_retryable());

        let err = ClientError::from(TransportError::Closed);
        assert!(matches!(err, ClientError::Transport(TransportError::Closed)));
        assert!(err.is_retryable());
        assert_eq!(err.rpc_code(), None);
    }

    #[test]
    fn test_mismatch_message() {
        let err = ClientError::from(ResponseMismatch {
            expected: ExpectedResponse::Success,
            actual: Observed::Response(ResponseKind::Redirect),
        });
        assert_eq!(
            err.to_string(),
            "unexpected response: expected success, got redirect"
        );
    }
}
