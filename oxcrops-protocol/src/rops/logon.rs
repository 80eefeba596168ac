//! Logon and store-level ROPs.
//!
//! A Logon response has four shapes: a private mailbox, a public folders
//! store, a redirect to another server, or a failure. The first byte after
//! a zero ReturnValue (LogonFlags) tells the two success shapes apart.

use super::{
    input_only_request, status_response, DecodeContext, HandleSlots, RopOutcome, RopRequestBody,
    RopResponseBody, RopStructure,
};
use crate::classify::ResponseKind;
use crate::error::{ErrorCode, ProtocolError};
use crate::rop_id::RopId;
use crate::types::{LogonKind, LogonTime, LongTermId, ReplicaServers};
use crate::wire::{count_u16, count_u8, Reader, WireWrite};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of Folder IDs returned by every successful Logon.
pub const FOLDER_ID_COUNT: usize = 13;

/// LogonFlags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogonFlags(u8);

impl LogonFlags {
    /// Log on to a private mailbox rather than public folders.
    pub const PRIVATE: u8 = 0x01;
    pub const UNDERCOVER: u8 = 0x02;
    pub const GHOSTED: u8 = 0x04;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn private() -> Self {
        Self(Self::PRIVATE)
    }

    pub fn public() -> Self {
        Self(0)
    }

    pub fn with_undercover(mut self) -> Self {
        self.0 |= Self::UNDERCOVER;
        self
    }

    pub fn with_ghosted(mut self) -> Self {
        self.0 |= Self::GHOSTED;
        self
    }

    pub fn is_private(&self) -> bool {
        self.0 & Self::PRIVATE != 0
    }

    pub fn logon_kind(&self) -> LogonKind {
        if self.is_private() {
            LogonKind::Private
        } else {
            LogonKind::Public
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
}

/// OpenFlags values of a Logon request.
pub mod open_flags {
    pub const USE_ADMIN_PRIVILEGE: u32 = 0x0000_0001;
    pub const PUBLIC: u32 = 0x0000_0002;
    pub const HOME_LOGON: u32 = 0x0000_0004;
    pub const TAKE_OWNERSHIP: u32 = 0x0000_0008;
    pub const ALTERNATE_SERVER: u32 = 0x0000_0100;
    pub const IGNORE_HOME_MDB: u32 = 0x0000_0200;
    pub const NO_MAIL: u32 = 0x0000_0400;
    pub const USE_PER_MDB_REPLID_MAPPING: u32 = 0x0100_0000;
    pub const SUPPORT_PROGRESS: u32 = 0x2000_0000;
}

/// ResponseFlags values of a private-mailbox Logon response.
pub mod response_flags {
    pub const RESERVED: u8 = 0x01;
    pub const OWNER_RIGHT: u8 = 0x02;
    pub const SEND_AS_RIGHT: u8 = 0x04;
    pub const OOF: u8 = 0x10;
}

/// Positions of the well-known folders in a private-mailbox Logon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivateFolder {
    Root = 0,
    DeferredAction = 1,
    SpoolerQueue = 2,
    IpmSubtree = 3,
    Inbox = 4,
    Outbox = 5,
    SentItems = 6,
    DeletedItems = 7,
    CommonViews = 8,
    Schedule = 9,
    Search = 10,
    Views = 11,
    Shortcuts = 12,
}

/// Positions of the well-known folders in a public folders Logon.
/// Entries 10 to 12 are unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicFolder {
    Root = 0,
    IpmSubtree = 1,
    NonIpmSubtree = 2,
    EformsRegistry = 3,
    FreeBusy = 4,
    OfflineAddressBook = 5,
    LocalizedEformsRegistry = 6,
    LocalSiteFreeBusy = 7,
    LocalSiteOfflineAddressBook = 8,
    NntpArticleIndex = 9,
}

/// Resolves a redirect server name to a host.
///
/// Servers answer with a distinguished name such as
/// `/o=Org/ou=Group/cn=Configuration/cn=Servers/cn=HOST`; the host is the
/// text after the last `=`. Names without `=` are returned unchanged.
pub fn resolve_redirect_server(server_name: &str) -> &str {
    match server_name.rfind('=') {
        Some(pos) => &server_name[pos + 1..],
        None => server_name,
    }
}

// =========================================================================
// Logon
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogonRequest {
    pub logon_id: u8,
    pub output_handle_index: u8,
    pub logon_flags: LogonFlags,
    pub open_flags: u32,
    /// Ignored by servers.
    pub store_state: u32,
    /// Mailbox DN for a private logon; `None` for public folders.
    pub essdn: Option<String>,
}

impl LogonRequest {
    pub fn private(logon_id: u8, output_handle_index: u8, essdn: impl Into<String>) -> Self {
        Self {
            logon_id,
            output_handle_index,
            logon_flags: LogonFlags::private(),
            open_flags: open_flags::USE_PER_MDB_REPLID_MAPPING | open_flags::HOME_LOGON,
            store_state: 0,
            essdn: Some(essdn.into()),
        }
    }

    pub fn public(logon_id: u8, output_handle_index: u8) -> Self {
        Self {
            logon_id,
            output_handle_index,
            logon_flags: LogonFlags::public(),
            open_flags: open_flags::PUBLIC | open_flags::USE_PER_MDB_REPLID_MAPPING,
            store_state: 0,
            essdn: None,
        }
    }
}

impl RopStructure for LogonRequest {
    const ROP_ID: RopId = RopId::Logon;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.output_handle_index);
        buf.put_u8(self.logon_flags.bits());
        buf.put_u32_le(self.open_flags);
        buf.put_u32_le(self.store_state);
        match &self.essdn {
            Some(essdn) => {
                buf.put_u16_le(count_u16(essdn.len() + 1, "Essdn")?);
                buf.put_string8(essdn, "Essdn")?;
            }
            None => buf.put_u16_le(0),
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let output_handle_index = src.u8("OutputHandleIndex")?;
        let logon_flags = LogonFlags::from_bits(src.u8("LogonFlags")?);
        let open_flags = src.u32("OpenFlags")?;
        let store_state = src.u32("StoreState")?;
        let essdn_size = src.u16("EssdnSize")? as usize;
        let essdn = if essdn_size == 0 {
            None
        } else {
            let raw = src.bytes(essdn_size, "Essdn")?;
            let mut nested = Reader::new(raw);
            let essdn = nested.string8("Essdn")?;
            if !nested.is_empty() {
                return Err(ProtocolError::InvalidString("Essdn"));
            }
            Some(essdn)
        };
        Ok(Self {
            logon_id,
            output_handle_index,
            logon_flags,
            open_flags,
            store_state,
            essdn,
        })
    }
}

impl RopRequestBody for LogonRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::output(self.output_handle_index)
    }
}

/// Successful logon to a private mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateLogon {
    pub logon_flags: LogonFlags,
    pub folder_ids: [u64; FOLDER_ID_COUNT],
    pub response_flags: u8,
    pub mailbox_guid: Uuid,
    pub replica_id: u16,
    pub replica_guid: Uuid,
    pub logon_time: LogonTime,
    pub gwart_time: u64,
    pub store_state: u32,
}

impl PrivateLogon {
    pub fn folder_id(&self, folder: PrivateFolder) -> u64 {
        self.folder_ids[folder as usize]
    }
}

/// Successful logon to the public folders store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLogon {
    pub logon_flags: LogonFlags,
    pub folder_ids: [u64; FOLDER_ID_COUNT],
    pub replica_id: u16,
    pub replica_guid: Uuid,
    pub per_user_guid: Uuid,
}

impl PublicLogon {
    pub fn folder_id(&self, folder: PublicFolder) -> u64 {
        self.folder_ids[folder as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LogonOutcome {
    Private(PrivateLogon),
    Public(PublicLogon),
    /// ReturnValue WrongServer: the mailbox lives on another server.
    Redirect { logon_flags: LogonFlags, server_name: String },
    Failure { return_value: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogonResponse {
    pub output_handle_index: u8,
    pub outcome: LogonOutcome,
}

impl LogonResponse {
    /// Server name of a redirect, as sent.
    pub fn redirect_server(&self) -> Option<&str> {
        match &self.outcome {
            LogonOutcome::Redirect { server_name, .. } => Some(server_name),
            _ => None,
        }
    }

    pub fn logon_kind(&self) -> Option<LogonKind> {
        match &self.outcome {
            LogonOutcome::Private(_) => Some(LogonKind::Private),
            LogonOutcome::Public(_) => Some(LogonKind::Public),
            _ => None,
        }
    }
}

fn put_folder_ids(buf: &mut BytesMut, ids: &[u64; FOLDER_ID_COUNT]) {
    for id in ids {
        buf.put_u64_le(*id);
    }
}

fn read_folder_ids(src: &mut Reader) -> Result<[u64; FOLDER_ID_COUNT], ProtocolError> {
    let mut ids = [0u64; FOLDER_ID_COUNT];
    for id in ids.iter_mut() {
        *id = src.u64("FolderIds")?;
    }
    Ok(ids)
}

impl RopStructure for LogonResponse {
    const ROP_ID: RopId = RopId::Logon;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.output_handle_index);
        buf.put_u32_le(self.return_value());
        match &self.outcome {
            LogonOutcome::Private(logon) => {
                buf.put_u8(logon.logon_flags.bits() | LogonFlags::PRIVATE);
                put_folder_ids(buf, &logon.folder_ids);
                buf.put_u8(logon.response_flags);
                buf.put_guid(&logon.mailbox_guid);
                buf.put_u16_le(logon.replica_id);
                buf.put_guid(&logon.replica_guid);
                logon.logon_time.encode(buf);
                buf.put_u64_le(logon.gwart_time);
                buf.put_u32_le(logon.store_state);
            }
            LogonOutcome::Public(logon) => {
                buf.put_u8(logon.logon_flags.bits() & !LogonFlags::PRIVATE);
                put_folder_ids(buf, &logon.folder_ids);
                buf.put_u16_le(logon.replica_id);
                buf.put_guid(&logon.replica_guid);
                buf.put_guid(&logon.per_user_guid);
            }
            LogonOutcome::Redirect {
                logon_flags,
                server_name,
            } => {
                buf.put_u8(logon_flags.bits());
                buf.put_u8(count_u8(server_name.len() + 1, "ServerName")?);
                buf.put_string8(server_name, "ServerName")?;
            }
            LogonOutcome::Failure { .. } => {}
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let output_handle_index = src.u8("OutputHandleIndex")?;
        let return_value = src.u32("ReturnValue")?;

        let outcome = if return_value == ErrorCode::Success.value() {
            let logon_flags = LogonFlags::from_bits(src.u8("LogonFlags")?);
            let folder_ids = read_folder_ids(src)?;
            if logon_flags.is_private() {
                LogonOutcome::Private(PrivateLogon {
                    logon_flags,
                    folder_ids,
                    response_flags: src.u8("ResponseFlags")?,
                    mailbox_guid: src.guid("MailboxGuid")?,
                    replica_id: src.u16("ReplId")?,
                    replica_guid: src.guid("ReplGuid")?,
                    logon_time: LogonTime::decode(src)?,
                    gwart_time: src.u64("GwartTime")?,
                    store_state: src.u32("StoreState")?,
                })
            } else {
                LogonOutcome::Public(PublicLogon {
                    logon_flags,
                    folder_ids,
                    replica_id: src.u16("ReplId")?,
                    replica_guid: src.guid("ReplGuid")?,
                    per_user_guid: src.guid("PerUserGuid")?,
                })
            }
        } else if return_value == ErrorCode::WrongServer.value() {
            let logon_flags = LogonFlags::from_bits(src.u8("LogonFlags")?);
            let size = src.u8("ServerNameSize")? as usize;
            let raw = src.bytes(size, "ServerName")?;
            let mut nested = Reader::new(raw);
            let server_name = nested.string8("ServerName")?;
            LogonOutcome::Redirect {
                logon_flags,
                server_name,
            }
        } else {
            LogonOutcome::Failure { return_value }
        };

        Ok(Self {
            output_handle_index,
            outcome,
        })
    }
}

impl RopResponseBody for LogonResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.output_handle_index)
    }

    fn return_value(&self) -> u32 {
        match &self.outcome {
            LogonOutcome::Private(_) | LogonOutcome::Public(_) => ErrorCode::Success.value(),
            LogonOutcome::Redirect { .. } => ErrorCode::WrongServer.value(),
            LogonOutcome::Failure { return_value } => *return_value,
        }
    }

    fn kind(&self) -> ResponseKind {
        match &self.outcome {
            LogonOutcome::Private(_) | LogonOutcome::Public(_) => ResponseKind::Success,
            LogonOutcome::Redirect { .. } => ResponseKind::Redirect,
            LogonOutcome::Failure { .. } => ResponseKind::Failure,
        }
    }
}

// =========================================================================
// Receive folders and store state
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReceiveFolderRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub message_class: String,
}

impl RopStructure for GetReceiveFolderRequest {
    const ROP_ID: RopId = RopId::GetReceiveFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_string8(&self.message_class, "MessageClass")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            message_class: src.string8("MessageClass")?,
        })
    }
}

impl RopRequestBody for GetReceiveFolderRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveFolder {
    pub folder_id: u64,
    pub explicit_message_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReceiveFolderResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<ReceiveFolder>,
}

impl RopStructure for GetReceiveFolderResponse {
    const ROP_ID: RopId = RopId::GetReceiveFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |folder, buf| {
            buf.put_u64_le(folder.folder_id);
            buf.put_string8(&folder.explicit_message_class, "ExplicitMessageClass")
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                Ok(ReceiveFolder {
                    folder_id: src.u64("FolderId")?,
                    explicit_message_class: src.string8("ExplicitMessageClass")?,
                })
            })?,
        })
    }
}

impl RopResponseBody for GetReceiveFolderResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReceiveFolderRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub folder_id: u64,
    pub message_class: String,
}

impl RopStructure for SetReceiveFolderRequest {
    const ROP_ID: RopId = RopId::SetReceiveFolder;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.folder_id);
        buf.put_string8(&self.message_class, "MessageClass")
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            folder_id: src.u64("FolderId")?,
            message_class: src.string8("MessageClass")?,
        })
    }
}

impl RopRequestBody for SetReceiveFolderRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(SetReceiveFolderResponse, RopId::SetReceiveFolder, input_handle_index);

input_only_request!(GetStoreStateRequest, RopId::GetStoreState);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStoreStateResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<u32>,
}

impl RopStructure for GetStoreStateResponse {
    const ROP_ID: RopId = RopId::GetStoreState;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |state, buf| {
            buf.put_u32_le(*state);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u32("StoreState"))?,
        })
    }
}

impl RopResponseBody for GetStoreStateResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Public folder replicas
// =========================================================================

/// Request naming a folder by ID on the logon object.
macro_rules! folder_id_request {
    ($name:ident, $rop:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub logon_id: u8,
            pub input_handle_index: u8,
            pub folder_id: u64,
        }

        impl RopStructure for $name {
            const ROP_ID: RopId = $rop;

            fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                buf.put_u8(self.logon_id);
                buf.put_u8(self.input_handle_index);
                buf.put_u64_le(self.folder_id);
                Ok(())
            }

            fn decode_body(
                src: &mut Reader,
                _ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    logon_id: src.u8("LogonId")?,
                    input_handle_index: src.u8("InputHandleIndex")?,
                    folder_id: src.u64("FolderId")?,
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

folder_id_request!(GetOwningServersRequest, RopId::GetOwningServers);
folder_id_request!(PublicFolderIsGhostedRequest, RopId::PublicFolderIsGhosted);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetOwningServersResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<ReplicaServers>,
}

impl RopStructure for GetOwningServersResponse {
    const ROP_ID: RopId = RopId::GetOwningServers;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |servers, buf| servers.encode(buf))
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, ReplicaServers::decode)?,
        })
    }
}

impl RopResponseBody for GetOwningServersResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

/// Ghost state of a public folder: replica servers are listed only when
/// IsGhosted is set.
pub(crate) fn encode_ghost(
    ghost: &Option<ReplicaServers>,
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    buf.put_bool(ghost.is_some());
    match ghost {
        Some(servers) => servers.encode(buf),
        None => Ok(()),
    }
}

pub(crate) fn decode_ghost(src: &mut Reader) -> Result<Option<ReplicaServers>, ProtocolError> {
    if src.bool("IsGhosted")? {
        Ok(Some(ReplicaServers::decode(src)?))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicFolderIsGhostedResponse {
    pub input_handle_index: u8,
    /// `Some(servers)` when the folder is a ghost.
    pub outcome: RopOutcome<Option<ReplicaServers>>,
}

impl RopStructure for PublicFolderIsGhostedResponse {
    const ROP_ID: RopId = RopId::PublicFolderIsGhosted;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, encode_ghost)
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, decode_ghost)?,
        })
    }
}

impl RopResponseBody for PublicFolderIsGhostedResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Identifier mapping
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermIdFromIdRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub object_id: u64,
}

impl RopStructure for LongTermIdFromIdRequest {
    const ROP_ID: RopId = RopId::LongTermIdFromId;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_u64_le(self.object_id);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            object_id: src.u64("ObjectId")?,
        })
    }
}

impl RopRequestBody for LongTermIdFromIdRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermIdFromIdResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<LongTermId>,
}

impl RopStructure for LongTermIdFromIdResponse {
    const ROP_ID: RopId = RopId::LongTermIdFromId;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |id, buf| {
            id.encode(buf);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, LongTermId::decode)?,
        })
    }
}

impl RopResponseBody for LongTermIdFromIdResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdFromLongTermIdRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub long_term_id: LongTermId,
}

impl RopStructure for IdFromLongTermIdRequest {
    const ROP_ID: RopId = RopId::IdFromLongTermId;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        self.long_term_id.encode(buf);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            long_term_id: LongTermId::decode(src)?,
        })
    }
}

impl RopRequestBody for IdFromLongTermIdRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdFromLongTermIdResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<u64>,
}

impl RopStructure for IdFromLongTermIdResponse {
    const ROP_ID: RopId = RopId::IdFromLongTermId;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |id, buf| {
            buf.put_u64_le(*id);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.u64("ObjectId"))?,
        })
    }
}

impl RopResponseBody for IdFromLongTermIdResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

// =========================================================================
// Per-user information
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPerUserLongTermIdsRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub database_guid: Uuid,
}

impl RopStructure for GetPerUserLongTermIdsRequest {
    const ROP_ID: RopId = RopId::GetPerUserLongTermIds;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        buf.put_guid(&self.database_guid);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            database_guid: src.guid("DatabaseGuid")?,
        })
    }
}

impl RopRequestBody for GetPerUserLongTermIdsRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPerUserLongTermIdsResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Vec<LongTermId>>,
}

impl RopStructure for GetPerUserLongTermIdsResponse {
    const ROP_ID: RopId = RopId::GetPerUserLongTermIds;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |ids, buf| {
            buf.put_u16_le(count_u16(ids.len(), "LongTermIds")?);
            for id in ids {
                id.encode(buf);
            }
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let count = src.u16("LongTermIdCount")?;
                (0..count).map(|_| LongTermId::decode(src)).collect()
            })?,
        })
    }
}

impl RopResponseBody for GetPerUserLongTermIdsResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPerUserGuidRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub long_term_id: LongTermId,
}

impl RopStructure for GetPerUserGuidRequest {
    const ROP_ID: RopId = RopId::GetPerUserGuid;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        self.long_term_id.encode(buf);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            long_term_id: LongTermId::decode(src)?,
        })
    }
}

impl RopRequestBody for GetPerUserGuidRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPerUserGuidResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<Uuid>,
}

impl RopStructure for GetPerUserGuidResponse {
    const ROP_ID: RopId = RopId::GetPerUserGuid;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |guid, buf| {
            buf.put_guid(guid);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| src.guid("DatabaseGuid"))?,
        })
    }
}

impl RopResponseBody for GetPerUserGuidResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPerUserInformationRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub folder_id: LongTermId,
    pub reserved: u8,
    pub data_offset: u32,
    pub max_data_size: u16,
}

impl RopStructure for ReadPerUserInformationRequest {
    const ROP_ID: RopId = RopId::ReadPerUserInformation;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        self.folder_id.encode(buf);
        buf.put_u8(self.reserved);
        buf.put_u32_le(self.data_offset);
        buf.put_u16_le(self.max_data_size);
        Ok(())
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            logon_id: src.u8("LogonId")?,
            input_handle_index: src.u8("InputHandleIndex")?,
            folder_id: LongTermId::decode(src)?,
            reserved: src.u8("Reserved")?,
            data_offset: src.u32("DataOffset")?,
            max_data_size: src.u16("MaxDataSize")?,
        })
    }
}

impl RopRequestBody for ReadPerUserInformationRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerUserData {
    pub has_finished: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPerUserInformationResponse {
    pub input_handle_index: u8,
    pub outcome: RopOutcome<PerUserData>,
}

impl RopStructure for ReadPerUserInformationResponse {
    const ROP_ID: RopId = RopId::ReadPerUserInformation;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.input_handle_index);
        self.outcome.encode_with(buf, |chunk, buf| {
            buf.put_bool(chunk.has_finished);
            buf.put_u16_le(count_u16(chunk.data.len(), "Data")?);
            buf.put_slice(&chunk.data);
            Ok(())
        })
    }

    fn decode_body(src: &mut Reader, _ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            input_handle_index: src.u8("InputHandleIndex")?,
            outcome: RopOutcome::decode_with(src, |src| {
                let has_finished = src.bool("HasFinished")?;
                let size = src.u16("DataSize")? as usize;
                Ok(PerUserData {
                    has_finished,
                    data: src.vec(size, "Data")?,
                })
            })?,
        })
    }
}

impl RopResponseBody for ReadPerUserInformationResponse {
    fn handle_index(&self) -> Option<u8> {
        Some(self.input_handle_index)
    }

    fn return_value(&self) -> u32 {
        self.outcome.return_value()
    }
}

/// Writes per-user read state for a folder.
///
/// ReplGuid is on the wire only for the first chunk (DataOffset 0) of a
/// write against a private mailbox logon. Decoding therefore needs to know
/// the kind of the logon the request names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePerUserInformationRequest {
    pub logon_id: u8,
    pub input_handle_index: u8,
    pub folder_id: LongTermId,
    pub has_finished: bool,
    pub data_offset: u32,
    pub data: Vec<u8>,
    pub replica_guid: Option<Uuid>,
}

impl RopStructure for WritePerUserInformationRequest {
    const ROP_ID: RopId = RopId::WritePerUserInformation;

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(self.logon_id);
        buf.put_u8(self.input_handle_index);
        self.folder_id.encode(buf);
        buf.put_bool(self.has_finished);
        buf.put_u32_le(self.data_offset);
        buf.put_u16_le(count_u16(self.data.len(), "Data")?);
        buf.put_slice(&self.data);
        if let Some(guid) = &self.replica_guid {
            buf.put_guid(guid);
        }
        Ok(())
    }

    fn decode_body(src: &mut Reader, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let logon_id = src.u8("LogonId")?;
        let input_handle_index = src.u8("InputHandleIndex")?;
        let folder_id = LongTermId::decode(src)?;
        let has_finished = src.bool("HasFinished")?;
        let data_offset = src.u32("DataOffset")?;
        let size = src.u16("DataSize")? as usize;
        let data = src.vec(size, "Data")?;
        let replica_guid =
            if data_offset == 0 && ctx.logon_kind(logon_id) == LogonKind::Private {
                Some(src.guid("ReplGuid")?)
            } else {
                None
            };
        Ok(Self {
            logon_id,
            input_handle_index,
            folder_id,
            has_finished,
            data_offset,
            data,
            replica_guid,
        })
    }
}

impl RopRequestBody for WritePerUserInformationRequest {
    fn logon_id(&self) -> u8 {
        self.logon_id
    }

    fn handle_slots(&self) -> HandleSlots {
        HandleSlots::input(self.input_handle_index)
    }
}

status_response!(
    WritePerUserInformationResponse,
    RopId::WritePerUserInformation,
    input_handle_index
);
