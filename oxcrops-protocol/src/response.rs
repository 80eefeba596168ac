//! The closed set of ROP responses.

use crate::classify::ResponseKind;
use crate::error::ProtocolError;
use crate::rop_id::RopId;
use crate::rops::control::{BackoffResponse, BufferTooSmallResponse, PendingResponse, RawResponse};
use crate::rops::{
    fasttransfer, folder, logon, message, named, notification, property, stream,
    synchronization, table, transport, DecodeContext, RopResponseBody, RopStructure,
};
use crate::wire::Reader;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Declares [`RopResponse`] with one variant per typed response structure.
macro_rules! rop_responses {
    ($($variant:ident($ty:ty),)+) => {
        /// Any ROP response, tagged by RopId.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "rop")]
        pub enum RopResponse {
            $($variant($ty),)+
            /// Response kept as bytes; only ever the last in a buffer.
            Raw(RawResponse),
        }

        $(
            impl From<$ty> for RopResponse {
                fn from(response: $ty) -> Self {
                    RopResponse::$variant(response)
                }
            }
        )+

        impl From<RawResponse> for RopResponse {
            fn from(response: RawResponse) -> Self {
                RopResponse::Raw(response)
            }
        }

        impl RopResponse {
            pub fn rop_id_byte(&self) -> u8 {
                match self {
                    $(RopResponse::$variant(_) => <$ty as RopStructure>::ROP_ID.as_u8(),)+
                    RopResponse::Raw(raw) => raw.rop_id,
                }
            }

            /// Handle index echoed by the response, if its layout has one.
            pub fn handle_index(&self) -> Option<u8> {
                match self {
                    $(RopResponse::$variant(response) => response.handle_index(),)+
                    RopResponse::Raw(raw) => raw.payload.first().copied(),
                }
            }

            /// ReturnValue. Raw responses too short to carry one read as
            /// success.
            pub fn return_value(&self) -> u32 {
                match self {
                    $(RopResponse::$variant(response) => response.return_value(),)+
                    RopResponse::Raw(raw) => raw.return_value().unwrap_or_default(),
                }
            }

            pub fn kind(&self) -> ResponseKind {
                match self {
                    $(RopResponse::$variant(response) => response.kind(),)+
                    RopResponse::Raw(raw) => match raw.return_value() {
                        Some(0) | None => ResponseKind::Success,
                        Some(_) => ResponseKind::Failure,
                    },
                }
            }

            /// Writes the response, RopId first.
            pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                match self {
                    $(
                        RopResponse::$variant(response) => {
                            buf.put_u8(<$ty as RopStructure>::ROP_ID.as_u8());
                            response.encode_body(buf)
                        }
                    )+
                    RopResponse::Raw(raw) => {
                        raw.encode(buf);
                        Ok(())
                    }
                }
            }

            /// Reads the body of a typed response whose RopId was already
            /// consumed.
            pub fn decode_typed(
                rop_id: RopId,
                src: &mut Reader,
                ctx: &DecodeContext<'_>,
            ) -> Result<Self, ProtocolError> {
                $(
                    if rop_id == <$ty as RopStructure>::ROP_ID {
                        return Ok(RopResponse::$variant(
                            <$ty as RopStructure>::decode_body(src, ctx)?,
                        ));
                    }
                )+
                Err(ProtocolError::UnsupportedRop(rop_id))
            }

            /// RopIds with a typed response structure.
            pub fn typed_rop_ids() -> &'static [RopId] {
                &[$(<$ty as RopStructure>::ROP_ID,)+]
            }
        }
    };
}

rop_responses! {
    Logon(logon::LogonResponse),
    GetReceiveFolder(logon::GetReceiveFolderResponse),
    SetReceiveFolder(logon::SetReceiveFolderResponse),
    GetStoreState(logon::GetStoreStateResponse),
    GetOwningServers(logon::GetOwningServersResponse),
    PublicFolderIsGhosted(logon::PublicFolderIsGhostedResponse),
    LongTermIdFromId(logon::LongTermIdFromIdResponse),
    IdFromLongTermId(logon::IdFromLongTermIdResponse),
    GetPerUserLongTermIds(logon::GetPerUserLongTermIdsResponse),
    GetPerUserGuid(logon::GetPerUserGuidResponse),
    ReadPerUserInformation(logon::ReadPerUserInformationResponse),
    WritePerUserInformation(logon::WritePerUserInformationResponse),

    OpenFolder(folder::OpenFolderResponse),
    CreateFolder(folder::CreateFolderResponse),
    DeleteFolder(folder::DeleteFolderResponse),
    MoveFolder(folder::MoveFolderResponse),
    CopyFolder(folder::CopyFolderResponse),
    MoveCopyMessages(folder::MoveCopyMessagesResponse),
    EmptyFolder(folder::EmptyFolderResponse),
    HardDeleteMessagesAndSubfolders(folder::HardDeleteMessagesAndSubfoldersResponse),
    DeleteMessages(folder::DeleteMessagesResponse),
    HardDeleteMessages(folder::HardDeleteMessagesResponse),
    GetHierarchyTable(folder::GetHierarchyTableResponse),
    GetContentsTable(folder::GetContentsTableResponse),

    OpenMessage(message::OpenMessageResponse),
    CreateMessage(message::CreateMessageResponse),
    SaveChangesMessage(message::SaveChangesMessageResponse),
    RemoveAllRecipients(message::RemoveAllRecipientsResponse),
    SetMessageReadFlag(message::SetMessageReadFlagResponse),
    SubmitMessage(message::SubmitMessageResponse),
    AbortSubmit(message::AbortSubmitResponse),
    ModifyRecipients(message::ModifyRecipientsResponse),
    ReadRecipients(message::ReadRecipientsResponse),
    OpenEmbeddedMessage(message::OpenEmbeddedMessageResponse),
    SetReadFlags(message::SetReadFlagsResponse),
    GetMessageStatus(message::GetMessageStatusResponse),
    SetMessageStatus(message::SetMessageStatusResponse),
    GetAttachmentTable(message::GetAttachmentTableResponse),
    OpenAttachment(message::OpenAttachmentResponse),
    CreateAttachment(message::CreateAttachmentResponse),
    DeleteAttachment(message::DeleteAttachmentResponse),
    SaveChangesAttachment(message::SaveChangesAttachmentResponse),

    GetPropertiesSpecific(property::GetPropertiesSpecificResponse),
    GetPropertiesAll(property::GetPropertiesAllResponse),
    GetPropertiesList(property::GetPropertiesListResponse),
    SetProperties(property::SetPropertiesResponse),
    SetPropertiesNoReplicate(property::SetPropertiesNoReplicateResponse),
    DeleteProperties(property::DeletePropertiesResponse),
    DeletePropertiesNoReplicate(property::DeletePropertiesNoReplicateResponse),
    CopyProperties(property::CopyPropertiesResponse),
    CopyTo(property::CopyToResponse),

    GetPropertyIdsFromNames(named::GetPropertyIdsFromNamesResponse),
    GetNamesFromPropertyIds(named::GetNamesFromPropertyIdsResponse),
    QueryNamedProperties(named::QueryNamedPropertiesResponse),

    OpenStream(stream::OpenStreamResponse),
    ReadStream(stream::ReadStreamResponse),
    WriteStream(stream::WriteStreamResponse),
    CommitStream(stream::CommitStreamResponse),
    GetStreamSize(stream::GetStreamSizeResponse),
    SetStreamSize(stream::SetStreamSizeResponse),
    SeekStream(stream::SeekStreamResponse),
    CopyToStream(stream::CopyToStreamResponse),
    WriteAndCommitStream(stream::WriteAndCommitStreamResponse),
    LockRegionStream(stream::LockRegionStreamResponse),
    UnlockRegionStream(stream::UnlockRegionStreamResponse),
    CloneStream(stream::CloneStreamResponse),

    SetColumns(table::SetColumnsResponse),
    SortTable(table::SortTableResponse),
    QueryRows(table::QueryRowsResponse),
    QueryPosition(table::QueryPositionResponse),
    SeekRow(table::SeekRowResponse),
    QueryColumnsAll(table::QueryColumnsAllResponse),
    GetStatus(table::GetStatusResponse),
    Abort(table::AbortResponse),
    ResetTable(table::ResetTableResponse),
    CreateBookmark(table::CreateBookmarkResponse),
    FreeBookmark(table::FreeBookmarkResponse),
    SeekRowBookmark(table::SeekRowBookmarkResponse),
    FindRow(table::FindRowResponse),
    ExpandRow(table::ExpandRowResponse),
    CollapseRow(table::CollapseRowResponse),

    SetSpooler(transport::SetSpoolerResponse),
    SpoolerLockMessage(transport::SpoolerLockMessageResponse),
    TransportSend(transport::TransportSendResponse),
    TransportNewMail(transport::TransportNewMailResponse),
    GetTransportFolder(transport::GetTransportFolderResponse),
    GetAddressTypes(transport::GetAddressTypesResponse),
    OptionsData(transport::OptionsDataResponse),

    RegisterNotification(notification::RegisterNotificationResponse),

    FastTransferSourceCopyTo(fasttransfer::SourceCopyToResponse),
    FastTransferSourceCopyProperties(fasttransfer::SourceCopyPropertiesResponse),
    FastTransferSourceCopyMessages(fasttransfer::SourceCopyMessagesResponse),
    FastTransferSourceCopyFolder(fasttransfer::SourceCopyFolderResponse),
    FastTransferSourceGetBuffer(fasttransfer::SourceGetBufferResponse),
    FastTransferDestinationConfigure(fasttransfer::DestinationConfigureResponse),
    FastTransferDestinationPutBuffer(fasttransfer::DestinationPutBufferResponse),
    TellVersion(fasttransfer::TellVersionResponse),

    SynchronizationConfigure(synchronization::ConfigureResponse),
    SynchronizationOpenCollector(synchronization::OpenCollectorResponse),
    SynchronizationGetTransferState(synchronization::GetTransferStateResponse),
    SynchronizationImportMessageChange(synchronization::ImportMessageChangeResponse),
    SynchronizationImportHierarchyChange(synchronization::ImportHierarchyChangeResponse),
    SynchronizationImportDeletes(synchronization::ImportDeletesResponse),
    SynchronizationImportMessageMove(synchronization::ImportMessageMoveResponse),
    SynchronizationImportReadStateChanges(synchronization::ImportReadStateChangesResponse),
    SynchronizationUploadStateStreamBegin(synchronization::UploadStateStreamBeginResponse),
    SynchronizationUploadStateStreamContinue(synchronization::UploadStateStreamContinueResponse),
    SynchronizationUploadStateStreamEnd(synchronization::UploadStateStreamEndResponse),
    GetLocalReplicaIds(synchronization::GetLocalReplicaIdsResponse),

    BufferTooSmall(BufferTooSmallResponse),
    Pending(PendingResponse),
    Backoff(BackoffResponse),
}

impl RopResponse {
    pub fn rop_id(&self) -> Option<RopId> {
        RopId::from_u8(self.rop_id_byte())
    }

    pub fn is_success(&self) -> bool {
        self.kind() == ResponseKind::Success
    }

    /// Whether this is a pseudo-response the server emits on its own
    /// rather than an answer to a request.
    pub fn is_server_originated(&self) -> bool {
        matches!(
            self,
            RopResponse::BufferTooSmall(_) | RopResponse::Pending(_) | RopResponse::Backoff(_)
        )
    }

    pub fn as_logon(&self) -> Option<&logon::LogonResponse> {
        match self {
            RopResponse::Logon(response) => Some(response),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rops::{DualHandleOutcome, RopOutcome};
    use bytes::Bytes;

    fn decode_one(bytes: Bytes) -> RopResponse {
        let mut src = Reader::new(bytes);
        let rop_id = RopId::try_from(src.u8("RopId").unwrap()).unwrap();
        let response = RopResponse::decode_typed(rop_id, &mut src, &DecodeContext::default()).unwrap();
        assert!(src.is_empty());
        response
    }

    #[test]
    fn test_status_response_round_trip() {
        let response: RopResponse = table::ResetTableResponse::new(1, 0).into();
        let mut buf = BytesMut::new();
        response.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x81, 0x01, 0, 0, 0, 0]);
        assert_eq!(decode_one(buf.freeze()), response);
        assert_eq!(response.handle_index(), Some(1));
    }

    #[test]
    fn test_null_destination_kind() {
        let response: RopResponse = folder::MoveFolderResponse {
            source_handle_index: 0,
            outcome: DualHandleOutcome::NullDestination {
                dest_handle_index: 1,
                body: false,
            },
        }
        .into();
        assert_eq!(response.kind(), ResponseKind::NullDestinationFailure);
        assert_eq!(
            response.return_value(),
            ErrorCode::NullDestinationObject.value()
        );

        let mut buf = BytesMut::new();
        response.encode(&mut buf).unwrap();
        assert_eq!(decode_one(buf.freeze()), response);
    }

    #[test]
    fn test_failure_carries_no_body() {
        let response: RopResponse = message::CreateMessageResponse {
            output_handle_index: 1,
            outcome: RopOutcome::Failure(ErrorCode::AccessDenied.value()),
        }
        .into();
        let mut buf = BytesMut::new();
        response.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 1 + 1 + 4);
        assert_eq!(response.kind(), ResponseKind::Failure);
    }

    #[test]
    fn test_server_originated() {
        let response: RopResponse = PendingResponse { session_index: 1 }.into();
        assert!(response.is_server_originated());
        assert_eq!(response.handle_index(), None);
    }

    #[test]
    fn test_raw_response_kind() {
        let response = RopResponse::Raw(RawResponse {
            rop_id: 0x31,
            payload: vec![0x00, 0x05, 0x01, 0x07, 0x80],
        });
        assert_eq!(response.kind(), ResponseKind::Failure);
        assert_eq!(response.handle_index(), Some(0));
        assert_eq!(response.rop_id(), Some(RopId::GetSearchCriteria));
    }
}
