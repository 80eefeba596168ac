//! RopId catalog.
//!
//! Every assigned RopId, its static properties, and the configurable table of
//! byte values that must never be sent as a RopId.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte tag identifying a ROP request/response structure pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum RopId {
    Release = 0x01,
    OpenFolder = 0x02,
    OpenMessage = 0x03,
    GetHierarchyTable = 0x04,
    GetContentsTable = 0x05,
    CreateMessage = 0x06,
    GetPropertiesSpecific = 0x07,
    GetPropertiesAll = 0x08,
    GetPropertiesList = 0x09,
    SetProperties = 0x0A,
    DeleteProperties = 0x0B,
    SaveChangesMessage = 0x0C,
    RemoveAllRecipients = 0x0D,
    ModifyRecipients = 0x0E,
    ReadRecipients = 0x0F,
    ReloadCachedInformation = 0x10,
    SetMessageReadFlag = 0x11,
    SetColumns = 0x12,
    SortTable = 0x13,
    Restrict = 0x14,
    QueryRows = 0x15,
    GetStatus = 0x16,
    QueryPosition = 0x17,
    SeekRow = 0x18,
    SeekRowBookmark = 0x19,
    SeekRowFractional = 0x1A,
    CreateBookmark = 0x1B,
    CreateFolder = 0x1C,
    DeleteFolder = 0x1D,
    DeleteMessages = 0x1E,
    GetMessageStatus = 0x1F,
    SetMessageStatus = 0x20,
    GetAttachmentTable = 0x21,
    OpenAttachment = 0x22,
    CreateAttachment = 0x23,
    DeleteAttachment = 0x24,
    SaveChangesAttachment = 0x25,
    SetReceiveFolder = 0x26,
    GetReceiveFolder = 0x27,
    RegisterNotification = 0x29,
    Notify = 0x2A,
    OpenStream = 0x2B,
    ReadStream = 0x2C,
    WriteStream = 0x2D,
    SeekStream = 0x2E,
    SetStreamSize = 0x2F,
    SetSearchCriteria = 0x30,
    GetSearchCriteria = 0x31,
    SubmitMessage = 0x32,
    MoveCopyMessages = 0x33,
    AbortSubmit = 0x34,
    MoveFolder = 0x35,
    CopyFolder = 0x36,
    QueryColumnsAll = 0x37,
    Abort = 0x38,
    CopyTo = 0x39,
    CopyToStream = 0x3A,
    CloneStream = 0x3B,
    GetPermissionsTable = 0x3E,
    GetRulesTable = 0x3F,
    ModifyPermissions = 0x40,
    ModifyRules = 0x41,
    GetOwningServers = 0x42,
    LongTermIdFromId = 0x43,
    IdFromLongTermId = 0x44,
    PublicFolderIsGhosted = 0x45,
    OpenEmbeddedMessage = 0x46,
    SetSpooler = 0x47,
    SpoolerLockMessage = 0x48,
    GetAddressTypes = 0x49,
    TransportSend = 0x4A,
    FastTransferSourceCopyMessages = 0x4B,
    FastTransferSourceCopyFolder = 0x4C,
    FastTransferSourceCopyTo = 0x4D,
    FastTransferSourceGetBuffer = 0x4E,
    FindRow = 0x4F,
    Progress = 0x50,
    TransportNewMail = 0x51,
    GetValidAttachments = 0x52,
    FastTransferDestinationConfigure = 0x53,
    FastTransferDestinationPutBuffer = 0x54,
    GetNamesFromPropertyIds = 0x55,
    GetPropertyIdsFromNames = 0x56,
    UpdateDeferredActionMessages = 0x57,
    EmptyFolder = 0x58,
    ExpandRow = 0x59,
    CollapseRow = 0x5A,
    LockRegionStream = 0x5B,
    UnlockRegionStream = 0x5C,
    CommitStream = 0x5D,
    GetStreamSize = 0x5E,
    QueryNamedProperties = 0x5F,
    GetPerUserLongTermIds = 0x60,
    GetPerUserGuid = 0x61,
    ReadPerUserInformation = 0x63,
    WritePerUserInformation = 0x64,
    SetReadFlags = 0x66,
    CopyProperties = 0x67,
    GetReceiveFolderTable = 0x68,
    FastTransferSourceCopyProperties = 0x69,
    GetCollapseState = 0x6B,
    SetCollapseState = 0x6C,
    GetTransportFolder = 0x6D,
    Pending = 0x6E,
    OptionsData = 0x6F,
    SynchronizationConfigure = 0x70,
    SynchronizationImportMessageChange = 0x72,
    SynchronizationImportHierarchyChange = 0x73,
    SynchronizationImportDeletes = 0x74,
    SynchronizationUploadStateStreamBegin = 0x75,
    SynchronizationUploadStateStreamContinue = 0x76,
    SynchronizationUploadStateStreamEnd = 0x77,
    SynchronizationImportMessageMove = 0x78,
    SetPropertiesNoReplicate = 0x79,
    DeletePropertiesNoReplicate = 0x7A,
    GetStoreState = 0x7B,
    SynchronizationOpenCollector = 0x7E,
    GetLocalReplicaIds = 0x7F,
    SynchronizationImportReadStateChanges = 0x80,
    ResetTable = 0x81,
    SynchronizationGetTransferState = 0x82,
    TellVersion = 0x86,
    FreeBookmark = 0x89,
    WriteAndCommitStream = 0x90,
    HardDeleteMessages = 0x91,
    HardDeleteMessagesAndSubfolders = 0x92,
    SetLocalReplicaMidsetDeleted = 0x93,
    Backoff = 0xF9,
    Logon = 0xFE,
    BufferTooSmall = 0xFF,
}

impl RopId {
    /// All assigned RopIds in ascending order.
    pub const ALL: [RopId; 130] = [
        RopId::Release,
        RopId::OpenFolder,
        RopId::OpenMessage,
        RopId::GetHierarchyTable,
        RopId::GetContentsTable,
        RopId::CreateMessage,
        RopId::GetPropertiesSpecific,
        RopId::GetPropertiesAll,
        RopId::GetPropertiesList,
        RopId::SetProperties,
        RopId::DeleteProperties,
        RopId::SaveChangesMessage,
        RopId::RemoveAllRecipients,
        RopId::ModifyRecipients,
        RopId::ReadRecipients,
        RopId::ReloadCachedInformation,
        RopId::SetMessageReadFlag,
        RopId::SetColumns,
        RopId::SortTable,
        RopId::Restrict,
        RopId::QueryRows,
        RopId::GetStatus,
        RopId::QueryPosition,
        RopId::SeekRow,
        RopId::SeekRowBookmark,
        RopId::SeekRowFractional,
        RopId::CreateBookmark,
        RopId::CreateFolder,
        RopId::DeleteFolder,
        RopId::DeleteMessages,
        RopId::GetMessageStatus,
        RopId::SetMessageStatus,
        RopId::GetAttachmentTable,
        RopId::OpenAttachment,
        RopId::CreateAttachment,
        RopId::DeleteAttachment,
        RopId::SaveChangesAttachment,
        RopId::SetReceiveFolder,
        RopId::GetReceiveFolder,
        RopId::RegisterNotification,
        RopId::Notify,
        RopId::OpenStream,
        RopId::ReadStream,
        RopId::WriteStream,
        RopId::SeekStream,
        RopId::SetStreamSize,
        RopId::SetSearchCriteria,
        RopId::GetSearchCriteria,
        RopId::SubmitMessage,
        RopId::MoveCopyMessages,
        RopId::AbortSubmit,
        RopId::MoveFolder,
        RopId::CopyFolder,
        RopId::QueryColumnsAll,
        RopId::Abort,
        RopId::CopyTo,
        RopId::CopyToStream,
        RopId::CloneStream,
        RopId::GetPermissionsTable,
        RopId::GetRulesTable,
        RopId::ModifyPermissions,
        RopId::ModifyRules,
        RopId::GetOwningServers,
        RopId::LongTermIdFromId,
        RopId::IdFromLongTermId,
        RopId::PublicFolderIsGhosted,
        RopId::OpenEmbeddedMessage,
        RopId::SetSpooler,
        RopId::SpoolerLockMessage,
        RopId::GetAddressTypes,
        RopId::TransportSend,
        RopId::FastTransferSourceCopyMessages,
        RopId::FastTransferSourceCopyFolder,
        RopId::FastTransferSourceCopyTo,
        RopId::FastTransferSourceGetBuffer,
        RopId::FindRow,
        RopId::Progress,
        RopId::TransportNewMail,
        RopId::GetValidAttachments,
        RopId::FastTransferDestinationConfigure,
        RopId::FastTransferDestinationPutBuffer,
        RopId::GetNamesFromPropertyIds,
        RopId::GetPropertyIdsFromNames,
        RopId::UpdateDeferredActionMessages,
        RopId::EmptyFolder,
        RopId::ExpandRow,
        RopId::CollapseRow,
        RopId::LockRegionStream,
        RopId::UnlockRegionStream,
        RopId::CommitStream,
        RopId::GetStreamSize,
        RopId::QueryNamedProperties,
        RopId::GetPerUserLongTermIds,
        RopId::GetPerUserGuid,
        RopId::ReadPerUserInformation,
        RopId::WritePerUserInformation,
        RopId::SetReadFlags,
        RopId::CopyProperties,
        RopId::GetReceiveFolderTable,
        RopId::FastTransferSourceCopyProperties,
        RopId::GetCollapseState,
        RopId::SetCollapseState,
        RopId::GetTransportFolder,
        RopId::Pending,
        RopId::OptionsData,
        RopId::SynchronizationConfigure,
        RopId::SynchronizationImportMessageChange,
        RopId::SynchronizationImportHierarchyChange,
        RopId::SynchronizationImportDeletes,
        RopId::SynchronizationUploadStateStreamBegin,
        RopId::SynchronizationUploadStateStreamContinue,
        RopId::SynchronizationUploadStateStreamEnd,
        RopId::SynchronizationImportMessageMove,
        RopId::SetPropertiesNoReplicate,
        RopId::DeletePropertiesNoReplicate,
        RopId::GetStoreState,
        RopId::SynchronizationOpenCollector,
        RopId::GetLocalReplicaIds,
        RopId::SynchronizationImportReadStateChanges,
        RopId::ResetTable,
        RopId::SynchronizationGetTransferState,
        RopId::TellVersion,
        RopId::FreeBookmark,
        RopId::WriteAndCommitStream,
        RopId::HardDeleteMessages,
        RopId::HardDeleteMessagesAndSubfolders,
        RopId::SetLocalReplicaMidsetDeleted,
        RopId::Backoff,
        RopId::Logon,
        RopId::BufferTooSmall,
    ];

    /// Looks up an assigned RopId.
    pub fn from_u8(value: u8) -> Option<Self> {
        let id = match value {
            0x01 => RopId::Release,
            0x02 => RopId::OpenFolder,
            0x03 => RopId::OpenMessage,
            0x04 => RopId::GetHierarchyTable,
            0x05 => RopId::GetContentsTable,
            0x06 => RopId::CreateMessage,
            0x07 => RopId::GetPropertiesSpecific,
            0x08 => RopId::GetPropertiesAll,
            0x09 => RopId::GetPropertiesList,
            0x0A => RopId::SetProperties,
            0x0B => RopId::DeleteProperties,
            0x0C => RopId::SaveChangesMessage,
            0x0D => RopId::RemoveAllRecipients,
            0x0E => RopId::ModifyRecipients,
            0x0F => RopId::ReadRecipients,
            0x10 => RopId::ReloadCachedInformation,
            0x11 => RopId::SetMessageReadFlag,
            0x12 => RopId::SetColumns,
            0x13 => RopId::SortTable,
            0x14 => RopId::Restrict,
            0x15 => RopId::QueryRows,
            0x16 => RopId::GetStatus,
            0x17 => RopId::QueryPosition,
            0x18 => RopId::SeekRow,
            0x19 => RopId::SeekRowBookmark,
            0x1A => RopId::SeekRowFractional,
            0x1B => RopId::CreateBookmark,
            0x1C => RopId::CreateFolder,
            0x1D => RopId::DeleteFolder,
            0x1E => RopId::DeleteMessages,
            0x1F => RopId::GetMessageStatus,
            0x20 => RopId::SetMessageStatus,
            0x21 => RopId::GetAttachmentTable,
            0x22 => RopId::OpenAttachment,
            0x23 => RopId::CreateAttachment,
            0x24 => RopId::DeleteAttachment,
            0x25 => RopId::SaveChangesAttachment,
            0x26 => RopId::SetReceiveFolder,
            0x27 => RopId::GetReceiveFolder,
            0x29 => RopId::RegisterNotification,
            0x2A => RopId::Notify,
            0x2B => RopId::OpenStream,
            0x2C => RopId::ReadStream,
            0x2D => RopId::WriteStream,
            0x2E => RopId::SeekStream,
            0x2F => RopId::SetStreamSize,
            0x30 => RopId::SetSearchCriteria,
            0x31 => RopId::GetSearchCriteria,
            0x32 => RopId::SubmitMessage,
            0x33 => RopId::MoveCopyMessages,
            0x34 => RopId::AbortSubmit,
            0x35 => RopId::MoveFolder,
            0x36 => RopId::CopyFolder,
            0x37 => RopId::QueryColumnsAll,
            0x38 => RopId::Abort,
            0x39 => RopId::CopyTo,
            0x3A => RopId::CopyToStream,
            0x3B => RopId::CloneStream,
            0x3E => RopId::GetPermissionsTable,
            0x3F => RopId::GetRulesTable,
            0x40 => RopId::ModifyPermissions,
            0x41 => RopId::ModifyRules,
            0x42 => RopId::GetOwningServers,
            0x43 => RopId::LongTermIdFromId,
            0x44 => RopId::IdFromLongTermId,
            0x45 => RopId::PublicFolderIsGhosted,
            0x46 => RopId::OpenEmbeddedMessage,
            0x47 => RopId::SetSpooler,
            0x48 => RopId::SpoolerLockMessage,
            0x49 => RopId::GetAddressTypes,
            0x4A => RopId::TransportSend,
            0x4B => RopId::FastTransferSourceCopyMessages,
            0x4C => RopId::FastTransferSourceCopyFolder,
            0x4D => RopId::FastTransferSourceCopyTo,
            0x4E => RopId::FastTransferSourceGetBuffer,
            0x4F => RopId::FindRow,
            0x50 => RopId::Progress,
            0x51 => RopId::TransportNewMail,
            0x52 => RopId::GetValidAttachments,
            0x53 => RopId::FastTransferDestinationConfigure,
            0x54 => RopId::FastTransferDestinationPutBuffer,
            0x55 => RopId::GetNamesFromPropertyIds,
            0x56 => RopId::GetPropertyIdsFromNames,
            0x57 => RopId::UpdateDeferredActionMessages,
            0x58 => RopId::EmptyFolder,
            0x59 => RopId::ExpandRow,
            0x5A => RopId::CollapseRow,
            0x5B => RopId::LockRegionStream,
            0x5C => RopId::UnlockRegionStream,
            0x5D => RopId::CommitStream,
            0x5E => RopId::GetStreamSize,
            0x5F => RopId::QueryNamedProperties,
            0x60 => RopId::GetPerUserLongTermIds,
            0x61 => RopId::GetPerUserGuid,
            0x63 => RopId::ReadPerUserInformation,
            0x64 => RopId::WritePerUserInformation,
            0x66 => RopId::SetReadFlags,
            0x67 => RopId::CopyProperties,
            0x68 => RopId::GetReceiveFolderTable,
            0x69 => RopId::FastTransferSourceCopyProperties,
            0x6B => RopId::GetCollapseState,
            0x6C => RopId::SetCollapseState,
            0x6D => RopId::GetTransportFolder,
            0x6E => RopId::Pending,
            0x6F => RopId::OptionsData,
            0x70 => RopId::SynchronizationConfigure,
            0x72 => RopId::SynchronizationImportMessageChange,
            0x73 => RopId::SynchronizationImportHierarchyChange,
            0x74 => RopId::SynchronizationImportDeletes,
            0x75 => RopId::SynchronizationUploadStateStreamBegin,
            0x76 => RopId::SynchronizationUploadStateStreamContinue,
            0x77 => RopId::SynchronizationUploadStateStreamEnd,
            0x78 => RopId::SynchronizationImportMessageMove,
            0x79 => RopId::SetPropertiesNoReplicate,
            0x7A => RopId::DeletePropertiesNoReplicate,
            0x7B => RopId::GetStoreState,
            0x7E => RopId::SynchronizationOpenCollector,
            0x7F => RopId::GetLocalReplicaIds,
            0x80 => RopId::SynchronizationImportReadStateChanges,
            0x81 => RopId::ResetTable,
            0x82 => RopId::SynchronizationGetTransferState,
            0x86 => RopId::TellVersion,
            0x89 => RopId::FreeBookmark,
            0x90 => RopId::WriteAndCommitStream,
            0x91 => RopId::HardDeleteMessages,
            0x92 => RopId::HardDeleteMessagesAndSubfolders,
            0x93 => RopId::SetLocalReplicaMidsetDeleted,
            0xF9 => RopId::Backoff,
            0xFE => RopId::Logon,
            0xFF => RopId::BufferTooSmall,
            _ => return None,
        };
        Some(id)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the server writes a response for this ROP.
    ///
    /// Release is the only request the server answers with nothing; the
    /// decoder consults this instead of special-casing Release.
    pub fn produces_response(self) -> bool {
        !matches!(self, RopId::Release)
    }

    /// Whether the ROP addresses a source and a destination object.
    ///
    /// These are the ROPs whose failure can take the null-destination shape.
    pub fn is_dual_handle(self) -> bool {
        matches!(
            self,
            RopId::MoveFolder
                | RopId::CopyFolder
                | RopId::MoveCopyMessages
                | RopId::CopyTo
                | RopId::CopyProperties
                | RopId::CopyToStream
        )
    }

    /// Whether only the server ever emits this RopId.
    pub fn is_server_only(self) -> bool {
        matches!(
            self,
            RopId::Notify | RopId::Pending | RopId::Backoff | RopId::BufferTooSmall
        )
    }
}

impl TryFrom<u8> for RopId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RopId::from_u8(value).ok_or(ProtocolError::UnknownRopId(value))
    }
}

impl From<RopId> for u8 {
    fn from(id: RopId) -> u8 {
        id as u8
    }
}

impl fmt::Display for RopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rop{:?}", self)
    }
}

/// RopId byte values rejected before a buffer is sent.
const DEFAULT_RESERVED: &[(u8, u8)] = &[
    (0x00, 0x00),
    (0x28, 0x28),
    (0x3C, 0x3D),
    (0x52, 0x52),
    (0x62, 0x62),
    (0x65, 0x65),
    (0x6A, 0x6A),
    (0x71, 0x71),
    (0x7C, 0x7D),
    (0x83, 0x85),
    (0x87, 0x88),
    (0x8A, 0x8E),
    (0x94, 0xF8),
    (0xFA, 0xFD),
];

/// Set of byte values that must not appear as a request RopId.
///
/// Which values a server rejects varies by product version, so the set is
/// data rather than code. The default matches current servers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct ReservedRopIds {
    bits: [u64; 4],
}

impl ReservedRopIds {
    /// An empty table: every byte value may be sent.
    pub fn none() -> Self {
        Self { bits: [0; 4] }
    }

    pub fn from_ids(ids: impl IntoIterator<Item = u8>) -> Self {
        let mut table = Self::none();
        for id in ids {
            table.insert(id);
        }
        table
    }

    pub fn insert(&mut self, id: u8) {
        self.bits[(id >> 6) as usize] |= 1u64 << (id & 63);
    }

    pub fn remove(&mut self, id: u8) {
        self.bits[(id >> 6) as usize] &= !(1u64 << (id & 63));
    }

    pub fn contains(&self, id: u8) -> bool {
        self.bits[(id >> 6) as usize] & (1u64 << (id & 63)) != 0
    }

    /// Fails with [`ProtocolError::ReservedRopId`] if `id` is reserved.
    pub fn check(&self, id: u8) -> Result<(), ProtocolError> {
        if self.contains(id) {
            return Err(ProtocolError::ReservedRopId(id));
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |id| self.contains(*id))
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }
}

impl Default for ReservedRopIds {
    fn default() -> Self {
        Self::from_ids(
            DEFAULT_RESERVED
                .iter()
                .flat_map(|&(first, last)| first..=last),
        )
    }
}

impl From<Vec<u8>> for ReservedRopIds {
    fn from(ids: Vec<u8>) -> Self {
        Self::from_ids(ids)
    }
}

impl From<ReservedRopIds> for Vec<u8> {
    fn from(table: ReservedRopIds) -> Self {
        table.iter().collect()
    }
}

impl fmt::Debug for ReservedRopIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|id| format!("{:#04x}", id)))
            .finish()
    }
}
