//! The closed set of ROP requests.

use crate::error::ProtocolError;
use crate::rop_id::RopId;
use crate::rops::control::{RawRequest, ReleaseRequest};
use crate::rops::{
    fasttransfer, folder, logon, message, named, notification, property, stream,
    synchronization, table, transport, DecodeContext, HandleSlots, RopRequestBody, RopStructure,
};
use crate::wire::Reader;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Declares [`RopRequest`] with one variant per typed request structure.
macro_rules! rop_requests {
    ($($variant:ident($ty:ty),)+) => {
        /// Any ROP request, tagged by RopId.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "rop")]
        pub enum RopRequest {
            $($variant($ty),)+
            /// Untyped request with an arbitrary RopId byte.
            Raw(RawRequest),
        }

        $(
            impl From<$ty> for RopRequest {
                fn from(request: $ty) -> Self {
                    RopRequest::$variant(request)
                }
            }
        )+

        impl From<RawRequest> for RopRequest {
            fn from(request: RawRequest) -> Self {
                RopRequest::Raw(request)
            }
        }

        impl RopRequest {
            /// The RopId byte as it goes on the wire.
            pub fn rop_id_byte(&self) -> u8 {
                match self {
                    $(RopRequest::$variant(_) => <$ty as RopStructure>::ROP_ID.as_u8(),)+
                    RopRequest::Raw(raw) => raw.rop_id,
                }
            }

            pub fn logon_id(&self) -> u8 {
                match self {
                    $(RopRequest::$variant(request) => request.logon_id(),)+
                    RopRequest::Raw(raw) => raw.logon_id,
                }
            }

            pub fn handle_slots(&self) -> HandleSlots {
                match self {
                    $(RopRequest::$variant(request) => request.handle_slots(),)+
                    RopRequest::Raw(raw) => HandleSlots::input(raw.input_handle_index),
                }
            }

            /// Writes the request, RopId first.
            pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                match self {
                    $(
                        RopRequest::$variant(request) => {
                            buf.put_u8(<$ty as RopStructure>::ROP_ID.as_u8());
                            request.encode_body(buf)
                        }
                    )+
                    RopRequest::Raw(raw) => {
                        raw.encode(buf);
                        Ok(())
                    }
                }
            }

            /// Reads the body of a typed request whose RopId was already
            /// consumed.
            pub fn decode_typed(
                rop_id: RopId,
                src: &mut Reader,
                ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                $(
                    if rop_id == <$ty as RopStructure>::ROP_ID {
                        return Ok(RopRequest::$variant(
                            <$ty as RopStructure>::decode_body(src, ctx)?,
                        ));
                    }
                )+
                Err(ProtocolError::UnsupportedRop(rop_id))
            }

            /// RopIds with a typed request structure.
            pub fn typed_rop_ids() -> &'static [RopId] {
                &[$(<$ty as RopStructure>::ROP_ID,)+]
            }
        }
    };
}

rop_requests! {
    Release(ReleaseRequest),

    Logon(logon::LogonRequest),
    GetReceiveFolder(logon::GetReceiveFolderRequest),
    SetReceiveFolder(logon::SetReceiveFolderRequest),
    GetStoreState(logon::GetStoreStateRequest),
    GetOwningServers(logon::GetOwningServersRequest),
    PublicFolderIsGhosted(logon::PublicFolderIsGhostedRequest),
    LongTermIdFromId(logon::LongTermIdFromIdRequest),
    IdFromLongTermId(logon::IdFromLongTermIdRequest),
    GetPerUserLongTermIds(logon::GetPerUserLongTermIdsRequest),
    GetPerUserGuid(logon::GetPerUserGuidRequest),
    ReadPerUserInformation(logon::ReadPerUserInformationRequest),
    WritePerUserInformation(logon::WritePerUserInformationRequest),

    OpenFolder(folder::OpenFolderRequest),
    CreateFolder(folder::CreateFolderRequest),
    DeleteFolder(folder::DeleteFolderRequest),
    MoveFolder(folder::MoveFolderRequest),
    CopyFolder(folder::CopyFolderRequest),
    MoveCopyMessages(folder::MoveCopyMessagesRequest),
    EmptyFolder(folder::EmptyFolderRequest),
    HardDeleteMessagesAndSubfolders(folder::HardDeleteMessagesAndSubfoldersRequest),
    DeleteMessages(folder::DeleteMessagesRequest),
    HardDeleteMessages(folder::HardDeleteMessagesRequest),
    GetHierarchyTable(folder::GetHierarchyTableRequest),
    GetContentsTable(folder::GetContentsTableRequest),

    OpenMessage(message::OpenMessageRequest),
    CreateMessage(message::CreateMessageRequest),
    SaveChangesMessage(message::SaveChangesMessageRequest),
    RemoveAllRecipients(message::RemoveAllRecipientsRequest),
    SetMessageReadFlag(message::SetMessageReadFlagRequest),
    SubmitMessage(message::SubmitMessageRequest),
    AbortSubmit(message::AbortSubmitRequest),
    ModifyRecipients(message::ModifyRecipientsRequest),
    ReadRecipients(message::ReadRecipientsRequest),
    OpenEmbeddedMessage(message::OpenEmbeddedMessageRequest),
    SetReadFlags(message::SetReadFlagsRequest),
    GetMessageStatus(message::GetMessageStatusRequest),
    SetMessageStatus(message::SetMessageStatusRequest),
    GetAttachmentTable(message::GetAttachmentTableRequest),
    OpenAttachment(message::OpenAttachmentRequest),
    CreateAttachment(message::CreateAttachmentRequest),
    DeleteAttachment(message::DeleteAttachmentRequest),
    SaveChangesAttachment(message::SaveChangesAttachmentRequest),

    GetPropertiesSpecific(property::GetPropertiesSpecificRequest),
    GetPropertiesAll(property::GetPropertiesAllRequest),
    GetPropertiesList(property::GetPropertiesListRequest),
    SetProperties(property::SetPropertiesRequest),
    SetPropertiesNoReplicate(property::SetPropertiesNoReplicateRequest),
    DeleteProperties(property::DeletePropertiesRequest),
    DeletePropertiesNoReplicate(property::DeletePropertiesNoReplicateRequest),
    CopyProperties(property::CopyPropertiesRequest),
    CopyTo(property::CopyToRequest),

    GetPropertyIdsFromNames(named::GetPropertyIdsFromNamesRequest),
    GetNamesFromPropertyIds(named::GetNamesFromPropertyIdsRequest),
    QueryNamedProperties(named::QueryNamedPropertiesRequest),

    OpenStream(stream::OpenStreamRequest),
    ReadStream(stream::ReadStreamRequest),
    WriteStream(stream::WriteStreamRequest),
    CommitStream(stream::CommitStreamRequest),
    GetStreamSize(stream::GetStreamSizeRequest),
    SetStreamSize(stream::SetStreamSizeRequest),
    SeekStream(stream::SeekStreamRequest),
    CopyToStream(stream::CopyToStreamRequest),
    WriteAndCommitStream(stream::WriteAndCommitStreamRequest),
    LockRegionStream(stream::LockRegionStreamRequest),
    UnlockRegionStream(stream::UnlockRegionStreamRequest),
    CloneStream(stream::CloneStreamRequest),

    SetColumns(table::SetColumnsRequest),
    SortTable(table::SortTableRequest),
    QueryRows(table::QueryRowsRequest),
    QueryPosition(table::QueryPositionRequest),
    SeekRow(table::SeekRowRequest),
    QueryColumnsAll(table::QueryColumnsAllRequest),
    GetStatus(table::GetStatusRequest),
    Abort(table::AbortRequest),
    ResetTable(table::ResetTableRequest),
    CreateBookmark(table::CreateBookmarkRequest),
    FreeBookmark(table::FreeBookmarkRequest),
    SeekRowBookmark(table::SeekRowBookmarkRequest),
    FindRow(table::FindRowRequest),
    ExpandRow(table::ExpandRowRequest),
    CollapseRow(table::CollapseRowRequest),

    SetSpooler(transport::SetSpoolerRequest),
    SpoolerLockMessage(transport::SpoolerLockMessageRequest),
    TransportSend(transport::TransportSendRequest),
    TransportNewMail(transport::TransportNewMailRequest),
    GetTransportFolder(transport::GetTransportFolderRequest),
    GetAddressTypes(transport::GetAddressTypesRequest),
    OptionsData(transport::OptionsDataRequest),

    RegisterNotification(notification::RegisterNotificationRequest),

    FastTransferSourceCopyTo(fasttransfer::SourceCopyToRequest),
    FastTransferSourceCopyProperties(fasttransfer::SourceCopyPropertiesRequest),
    FastTransferSourceCopyMessages(fasttransfer::SourceCopyMessagesRequest),
    FastTransferSourceCopyFolder(fasttransfer::SourceCopyFolderRequest),
    FastTransferSourceGetBuffer(fasttransfer::SourceGetBufferRequest),
    FastTransferDestinationConfigure(fasttransfer::DestinationConfigureRequest),
    FastTransferDestinationPutBuffer(fasttransfer::DestinationPutBufferRequest),
    TellVersion(fasttransfer::TellVersionRequest),

    SynchronizationConfigure(synchronization::ConfigureRequest),
    SynchronizationOpenCollector(synchronization::OpenCollectorRequest),
    SynchronizationGetTransferState(synchronization::GetTransferStateRequest),
    SynchronizationImportMessageChange(synchronization::ImportMessageChangeRequest),
    SynchronizationImportHierarchyChange(synchronization::ImportHierarchyChangeRequest),
    SynchronizationImportDeletes(synchronization::ImportDeletesRequest),
    SynchronizationImportMessageMove(synchronization::ImportMessageMoveRequest),
    SynchronizationImportReadStateChanges(synchronization::ImportReadStateChangesRequest),
    SynchronizationUploadStateStreamBegin(synchronization::UploadStateStreamBeginRequest),
    SynchronizationUploadStateStreamContinue(synchronization::UploadStateStreamContinueRequest),
    SynchronizationUploadStateStreamEnd(synchronization::UploadStateStreamEndRequest),
    GetLocalReplicaIds(synchronization::GetLocalReplicaIdsRequest),
}

impl RopRequest {
    /// The RopId, or `None` for a raw request with an unassigned byte.
    pub fn rop_id(&self) -> Option<RopId> {
        RopId::from_u8(self.rop_id_byte())
    }

    /// Whether the server answers this request. Raw requests with an
    /// unassigned RopId are assumed to be answered.
    pub fn produces_response(&self) -> bool {
        self.rop_id().map_or(true, RopId::produces_response)
    }

    /// Reads one request, RopId included.
    ///
    /// An assigned RopId without a typed structure fails with
    /// [`ProtocolError::UnsupportedRop`] unless `raw_fallback` is set, in
    /// which case it becomes a [`RawRequest`] holding the rest of `src`.
    pub fn decode(
        src: &mut Reader,
        ctx: &DecodeContext<'_>,
        raw_fallback: bool,
    ) -> Result<Self, ProtocolError> {
        let byte = src.u8("RopId")?;
        let rop_id = RopId::try_from(byte)?;
        match RopRequest::decode_typed(rop_id, src, ctx) {
            Err(ProtocolError::UnsupportedRop(_)) if raw_fallback => {
                Ok(RopRequest::Raw(RawRequest::decode_after_id(byte, src)?))
            }
            other => other,
        }
    }

    /// Index of the object a successful response installs, if any.
    pub fn output_handle_index(&self) -> Option<u8> {
        self.handle_slots().output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogonKinds;
    use bytes::Bytes;

    fn decode_one(bytes: Bytes, raw_fallback: bool) -> Result<RopRequest, ProtocolError> {
        let logons = LogonKinds::new();
        let mut src = Reader::new(bytes);
        RopRequest::decode(&mut src, &DecodeContext::with_logons(&logons), raw_fallback)
    }

    #[test]
    fn test_release_request_layout() {
        let request: RopRequest = ReleaseRequest::new(0, 3).into();
        let mut buf = BytesMut::new();
        request.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x00, 0x03]);
        assert!(!request.produces_response());
        assert_eq!(request.handle_slots(), HandleSlots::input(3));

        let decoded = decode_one(buf.freeze(), false).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_untyped_rop_is_unsupported() {
        // SetSearchCriteria has no typed structure.
        let bytes = Bytes::from_static(&[0x30, 0x00, 0x01, 0xAA, 0xBB]);
        assert!(matches!(
            decode_one(bytes.clone(), false),
            Err(ProtocolError::UnsupportedRop(RopId::SetSearchCriteria))
        ));

        let decoded = decode_one(bytes, true).unwrap();
        assert_eq!(
            decoded,
            RopRequest::Raw(RawRequest::new(0x30, 0, 1).with_payload(vec![0xAA, 0xBB]))
        );
    }

    #[test]
    fn test_unassigned_rop_id() {
        let bytes = Bytes::from_static(&[0x28, 0x00, 0x00]);
        assert!(matches!(
            decode_one(bytes, true),
            Err(ProtocolError::UnknownRopId(0x28))
        ));
    }

    #[test]
    fn test_raw_request_keeps_its_byte() {
        let request: RopRequest = RawRequest::new(0x28, 0, 0).into();
        assert_eq!(request.rop_id_byte(), 0x28);
        assert_eq!(request.rop_id(), None);
        assert!(request.produces_response());
    }

    #[test]
    fn test_catalog_covers_distinct_rop_ids() {
        let ids = RopRequest::typed_rop_ids();
        let mut sorted = ids.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert!(ids.iter().all(|id| !id.is_server_only()));
    }

    #[test]
    fn test_request_json_is_tagged_by_rop() {
        let request: RopRequest = table::QueryRowsRequest::new(0, 1, 10).into();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["rop"], "QueryRows");
        assert_eq!(json["row_count"], 10);

        let back: RopRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}
