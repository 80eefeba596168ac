//! RPC transport seam.
//!
//! The session never touches sockets. It hands a framed ROP input buffer
//! and an output size to a [`Transport`] and gets a framed output buffer
//! back. [`LoopbackTransport`] answers in-process through a [`Responder`].

use crate::config::TransportSequence;
use async_trait::async_trait;
use bytes::Bytes;
use oxcrops_protocol::RpcErrorCode;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Account used to connect.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub domain: String,
    password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, domain: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            domain: domain.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub server: String,
    pub transport: TransportSequence,
    pub credentials: Credentials,
}

impl ConnectTarget {
    pub fn new(server: impl Into<String>, transport: TransportSequence, credentials: Credentials) -> Self {
        Self {
            server: server.into(),
            transport,
            credentials,
        }
    }

    /// Same account and transport, another server.
    pub fn redirected(&self, server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..self.clone()
        }
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The call completed with a nonzero RPC status. The connection is
    /// still usable.
    #[error("RPC status {0}")]
    Rpc(RpcErrorCode),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    Closed,

    #[error("connection to {server} refused: {reason}")]
    Refused { server: String, reason: String },
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Io(_) | TransportError::Closed)
    }
}

/// An RPC channel carrying ROP buffers.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self, target: &ConnectTarget) -> Result<(), TransportError>;

    /// Sends one ROP input buffer and returns the output buffer.
    async fn execute(&mut self, request: Bytes, max_output_size: u32) -> Result<Bytes, TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Server side of a [`LoopbackTransport`].
pub trait Responder: Send {
    /// Called when a connection to `target` is opened.
    fn connect(&mut self, _target: &ConnectTarget) -> Result<(), TransportError> {
        Ok(())
    }

    /// Answers one ROP input buffer sent to `server`.
    fn respond(
        &mut self,
        server: &str,
        request: Bytes,
        max_output_size: u32,
    ) -> Result<Bytes, TransportError>;

    fn disconnect(&mut self, _server: &str) {}
}

/// In-process transport backed by a shared [`Responder`].
pub struct LoopbackTransport<R> {
    responder: Arc<Mutex<R>>,
    server: Option<String>,
}

impl<R: Responder> LoopbackTransport<R> {
    pub fn new(responder: R) -> Self {
        Self::shared(Arc::new(Mutex::new(responder)))
    }

    /// Uses a responder the caller keeps a reference to.
    pub fn shared(responder: Arc<Mutex<R>>) -> Self {
        Self {
            responder,
            server: None,
        }
    }

    pub fn responder(&self) -> Arc<Mutex<R>> {
        self.responder.clone()
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }
}

#[async_trait]
impl<R: Responder> Transport for LoopbackTransport<R> {
    async fn connect(&mut self, target: &ConnectTarget) -> Result<(), TransportError> {
        self.responder.lock().connect(target)?;
        self.server = Some(target.server.clone());
        Ok(())
    }

    async fn execute(&mut self, request: Bytes, max_output_size: u32) -> Result<Bytes, TransportError> {
        let server = self.server.as_deref().ok_or(TransportError::Closed)?;
        self.responder.lock().respond(server, request, max_output_size)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(server) = self.server.take() {
            self.responder.lock().disconnect(&server);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        calls: usize,
    }

    impl Responder for Echo {
        fn respond(&mut self, _server: &str, request: Bytes, _max: u32) -> Result<Bytes, TransportError> {
            self.calls += 1;
            Ok(request)
        }
    }

    #[tokio::test]
    async fn test_loopback_requires_connection() {
        let mut transport = LoopbackTransport::new(Echo { calls: 0 });
        let err = transport.execute(Bytes::from_static(b"x"), 0x8008).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));

        let target = ConnectTarget::new("mbx01", TransportSequence::MapiHttp, Credentials::default());
        transport.connect(&target).await.unwrap();
        assert_eq!(transport.server(), Some("mbx01"));

        let echoed = transport.execute(Bytes::from_static(b"abc"), 0x8008).await.unwrap();
        assert_eq!(&echoed[..], b"abc");
        assert_eq!(transport.responder().lock().calls, 1);

        transport.disconnect().await.unwrap();
        assert!(transport.server().is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("user1", "CONTOSO", "hunter2");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("user1"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(credentials.password(), "hunter2");
    }

    #[test]
    fn test_redirected_target_keeps_account() {
        let target = ConnectTarget::new(
            "mbx01",
            TransportSequence::NcacnIpTcp,
            Credentials::new("user1", "CONTOSO", "pw"),
        );
        let next = target.redirected("mbx02");
        assert_eq!(next.server, "mbx02");
        assert_eq!(next.credentials, target.credentials);
        assert_eq!(next.transport, TransportSequence::NcacnIpTcp);
    }
}
