//! # oxcrops-client
//!
//! Session layer for the mailbox remote operations protocol.
//!
//! This crate provides:
//! - The Server Object Handle Table
//! - An async session that batches ROPs into single RPC round trips
//! - Logon redirect handling and RPC timeouts
//! - YAML / environment configuration

pub mod config;
pub mod error;
pub mod handle_table;
pub mod session;
pub mod transport;

pub use config::{ConfigError, SessionConfig, TransportSequence};
pub use error::ClientError;
pub use handle_table::{HandleTable, InvalidHandle, LOGON_ANCHOR_INDEX};
pub use session::{CallOutcome, RopCall, Session, SessionState};
pub use transport::{
    ConnectTarget, Credentials, LoopbackTransport, Responder, Transport, TransportError,
};
