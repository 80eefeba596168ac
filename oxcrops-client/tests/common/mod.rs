//! Scripted in-memory mailbox server for session tests.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use oxcrops_client::{ConnectTarget, LoopbackTransport, Responder, Session, SessionConfig, TransportError};
use oxcrops_protocol::codec::{DecodedRequest, Decoder, Encoder};
use oxcrops_protocol::property::{property_type, PropertyRow, PropertyValue};
use oxcrops_protocol::rops::control::BufferTooSmallResponse;
use oxcrops_protocol::rops::folder::{
    GetContentsTableResponse, MoveFolderResponse, OpenFolderResponse, OpenedFolder,
};
use oxcrops_protocol::rops::logon::{
    LogonFlags, LogonOutcome, LogonResponse, PerUserData, PrivateLogon, PublicLogon,
    ReadPerUserInformationResponse, FOLDER_ID_COUNT,
};
use oxcrops_protocol::rops::message::{
    CreateMessageResponse, RemoveAllRecipientsResponse, SaveChangesMessageResponse, SavedMessage,
};
use oxcrops_protocol::rops::table::{
    bookmark, table_status, QueriedRows, QueryRowsResponse, SetColumnsResponse,
};
use oxcrops_protocol::rops::{DualHandleOutcome, RopOutcome};
use oxcrops_protocol::types::LogonTime;
use oxcrops_protocol::{
    ErrorCode, PropertyTag, RopRequest, RopResponse, RpcErrorCode, INVALID_HANDLE,
    MIN_OUTPUT_BUFFER_SIZE,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const HOME_SERVER: &str = "mbx01";
pub const MAILBOX_DN: &str = "/o=First Organization/ou=Exchange/cn=Recipients/cn=user1";
pub const PID_TAG_SUBJECT: PropertyTag = PropertyTag::new(0x0037, property_type::STRING);
pub const PID_TAG_MID: PropertyTag = PropertyTag::new(0x674A, property_type::INTEGER64);

/// Folder IDs returned by a private logon, indexed by well-known folder.
pub fn private_folder_ids() -> [u64; FOLDER_ID_COUNT] {
    let mut ids = [0u64; FOLDER_ID_COUNT];
    for (position, id) in ids.iter_mut().enumerate() {
        *id = 0x0001_0000_0000_0001 + position as u64;
    }
    ids
}

#[derive(Debug, Clone)]
enum Object {
    Logon,
    Folder(u64),
    Message { saved_id: Option<u64> },
    Table { columns: Vec<PropertyTag> },
}

/// A mailbox server with just enough behavior for the session tests.
pub struct MockMailbox {
    pub home_server: String,
    /// Messages listed by every contents table: (mid, subject).
    pub contents: Vec<(u64, String)>,
    /// Bytes of ROP responses the server fits in one buffer, overriding
    /// the caller's output size.
    pub response_budget: Option<usize>,
    /// Bytes cut from the end of the next response buffer.
    pub truncate_next: Option<usize>,
    /// Per-user read state returned by ReadPerUserInformation.
    pub per_user_data: Vec<u8>,
    /// Servers connected to, in order.
    pub connects: Vec<String>,
    /// Every request buffer received, decoded.
    pub received: Vec<DecodedRequest>,
    /// Output sizes received.
    pub output_sizes: Vec<u32>,
    objects: HashMap<u32, Object>,
    next_handle: u32,
    next_message_id: u64,
}

impl Default for MockMailbox {
    fn default() -> Self {
        Self {
            home_server: HOME_SERVER.to_string(),
            contents: vec![
                (0x0001_0000_0000_1001, "Quarterly report".to_string()),
                (0x0001_0000_0000_1002, "Lunch?".to_string()),
            ],
            response_budget: None,
            truncate_next: None,
            per_user_data: vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
            connects: Vec::new(),
            received: Vec::new(),
            output_sizes: Vec::new(),
            objects: HashMap::new(),
            next_handle: 0x100,
            next_message_id: 0x0001_0000_0000_2001,
        }
    }
}

impl MockMailbox {
    pub fn open_objects(&self) -> usize {
        self.objects.len()
    }

    fn allocate(&mut self, object: Object) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.objects.insert(handle, object);
        handle
    }

    fn object(&self, handles: &[u32], index: u8) -> Option<&Object> {
        let handle = handles.get(index as usize).copied()?;
        if handle == INVALID_HANDLE {
            return None;
        }
        self.objects.get(&handle)
    }

    fn redirect(&self, request: &DecodedRequest) -> Vec<RopResponse> {
        request
            .requests
            .iter()
            .filter_map(|r| match r {
                RopRequest::Logon(logon) => Some(RopResponse::Logon(LogonResponse {
                    output_handle_index: logon.output_handle_index,
                    outcome: LogonOutcome::Redirect {
                        logon_flags: logon.logon_flags,
                        server_name: format!(
                            "/o=First Organization/ou=Exchange/cn=Configuration/cn=Servers/cn={}",
                            self.home_server
                        ),
                    },
                })),
                _ => None,
            })
            .collect()
    }

    /// Answers one request, filling new handles into `handles`.
    fn answer(&mut self, request: &RopRequest, handles: &mut Vec<u32>) -> Option<RopResponse> {
        let invalid = ErrorCode::InvalidObject.value();
        let response = match request {
            RopRequest::Release(release) => {
                if let Some(handle) = handles.get(release.input_handle_index as usize) {
                    self.objects.remove(handle);
                }
                return None;
            }
            RopRequest::Logon(logon) => {
                // StoreState is ignored.
                let outcome = match &logon.essdn {
                    Some(dn) if dn == MAILBOX_DN => LogonOutcome::Private(PrivateLogon {
                        logon_flags: logon.logon_flags,
                        folder_ids: private_folder_ids(),
                        response_flags: 0x01,
                        mailbox_guid: Uuid::new_v4(),
                        replica_id: 1,
                        replica_guid: Uuid::new_v4(),
                        logon_time: LogonTime::default(),
                        gwart_time: 0,
                        store_state: 0,
                    }),
                    Some(_) => LogonOutcome::Failure {
                        return_value: ErrorCode::NotFound.value(),
                    },
                    None => LogonOutcome::Public(PublicLogon {
                        logon_flags: LogonFlags::public(),
                        folder_ids: [0x0001_0000_0000_0100; FOLDER_ID_COUNT],
                        replica_id: 1,
                        replica_guid: Uuid::new_v4(),
                        per_user_guid: Uuid::new_v4(),
                    }),
                };
                if matches!(outcome, LogonOutcome::Private(_) | LogonOutcome::Public(_)) {
                    let handle = self.allocate(Object::Logon);
                    set_handle(handles, logon.output_handle_index, handle);
                }
                RopResponse::Logon(LogonResponse {
                    output_handle_index: logon.output_handle_index,
                    outcome,
                })
            }
            RopRequest::OpenFolder(open) => {
                let outcome = match self.object(handles, open.input_handle_index) {
                    Some(Object::Logon | Object::Folder(_)) => {
                        let handle = self.allocate(Object::Folder(open.folder_id));
                        set_handle(handles, open.output_handle_index, handle);
                        RopOutcome::Success(OpenedFolder {
                            has_rules: false,
                            ghost: None,
                        })
                    }
                    _ => RopOutcome::Failure(invalid),
                };
                RopResponse::OpenFolder(OpenFolderResponse {
                    output_handle_index: open.output_handle_index,
                    outcome,
                })
            }
            RopRequest::CreateMessage(create) => {
                let outcome = match self.object(handles, create.input_handle_index) {
                    Some(Object::Logon | Object::Folder(_)) => {
                        let handle = self.allocate(Object::Message { saved_id: None });
                        set_handle(handles, create.output_handle_index, handle);
                        RopOutcome::Success(None)
                    }
                    _ => RopOutcome::Failure(invalid),
                };
                RopResponse::CreateMessage(CreateMessageResponse {
                    output_handle_index: create.output_handle_index,
                    outcome,
                })
            }
            RopRequest::SaveChangesMessage(save) => {
                let handle = handles
                    .get(save.input_handle_index as usize)
                    .copied()
                    .unwrap_or(INVALID_HANDLE);
                let next_id = self.next_message_id;
                let outcome = match self.objects.get_mut(&handle) {
                    Some(Object::Message { saved_id }) => {
                        let message_id = *saved_id.get_or_insert(next_id);
                        RopOutcome::Success(SavedMessage {
                            input_handle_index: save.input_handle_index,
                            message_id,
                        })
                    }
                    _ => RopOutcome::Failure(invalid),
                };
                if outcome.is_success() {
                    self.next_message_id += 1;
                }
                RopResponse::SaveChangesMessage(SaveChangesMessageResponse {
                    response_handle_index: save.response_handle_index,
                    outcome,
                })
            }
            RopRequest::RemoveAllRecipients(remove) => {
                // Reserved is ignored.
                let return_value = match self.object(handles, remove.input_handle_index) {
                    Some(Object::Message { .. }) => ErrorCode::Success.value(),
                    _ => invalid,
                };
                RopResponse::RemoveAllRecipients(RemoveAllRecipientsResponse::new(
                    remove.input_handle_index,
                    return_value,
                ))
            }
            RopRequest::ReadPerUserInformation(read) => {
                // Reserved is ignored.
                let outcome = match self.object(handles, read.input_handle_index) {
                    Some(Object::Logon) => {
                        let start = (read.data_offset as usize).min(self.per_user_data.len());
                        let end = (start + read.max_data_size as usize).min(self.per_user_data.len());
                        RopOutcome::Success(PerUserData {
                            has_finished: end == self.per_user_data.len(),
                            data: self.per_user_data[start..end].to_vec(),
                        })
                    }
                    _ => RopOutcome::Failure(invalid),
                };
                RopResponse::ReadPerUserInformation(ReadPerUserInformationResponse {
                    input_handle_index: read.input_handle_index,
                    outcome,
                })
            }
            RopRequest::MoveFolder(move_folder) => {
                let source = self.object(handles, move_folder.source_handle_index).is_some();
                let destination = self.object(handles, move_folder.dest_handle_index).is_some();
                let outcome = match (source, destination) {
                    (false, _) => DualHandleOutcome::Failure {
                        return_value: invalid,
                        body: false,
                    },
                    (true, false) => DualHandleOutcome::NullDestination {
                        dest_handle_index: move_folder.dest_handle_index as u32,
                        body: false,
                    },
                    (true, true) => DualHandleOutcome::Success { body: false },
                };
                RopResponse::MoveFolder(MoveFolderResponse {
                    source_handle_index: move_folder.source_handle_index,
                    outcome,
                })
            }
            RopRequest::GetContentsTable(get) => {
                let outcome = match self.object(handles, get.input_handle_index) {
                    Some(Object::Folder(_)) => {
                        let handle = self.allocate(Object::Table {
                            columns: Vec::new(),
                        });
                        set_handle(handles, get.output_handle_index, handle);
                        RopOutcome::Success(self.contents.len() as u32)
                    }
                    _ => RopOutcome::Failure(invalid),
                };
                RopResponse::GetContentsTable(GetContentsTableResponse {
                    output_handle_index: get.output_handle_index,
                    outcome,
                })
            }
            RopRequest::SetColumns(set) => {
                let handle = handles
                    .get(set.input_handle_index as usize)
                    .copied()
                    .unwrap_or(INVALID_HANDLE);
                let outcome = match self.objects.get_mut(&handle) {
                    Some(Object::Table { columns }) => {
                        *columns = set.property_tags.clone();
                        RopOutcome::Success(table_status::COMPLETE)
                    }
                    _ => RopOutcome::Failure(invalid),
                };
                RopResponse::SetColumns(SetColumnsResponse {
                    input_handle_index: set.input_handle_index,
                    outcome,
                })
            }
            RopRequest::QueryRows(query) => {
                let outcome = match self.object(handles, query.input_handle_index) {
                    Some(Object::Table { columns }) => {
                        let columns = columns.clone();
                        let rows = self
                            .contents
                            .iter()
                            .take(query.row_count as usize)
                            .map(|(mid, subject)| row_for(&columns, *mid, subject))
                            .collect();
                        RopOutcome::Success(QueriedRows {
                            origin: bookmark::END,
                            columns,
                            rows,
                        })
                    }
                    _ => RopOutcome::Failure(invalid),
                };
                RopResponse::QueryRows(QueryRowsResponse {
                    input_handle_index: query.input_handle_index,
                    outcome,
                })
            }
            other => panic!("mock mailbox does not handle {:?}", other.rop_id()),
        };
        Some(response)
    }
}

impl Responder for MockMailbox {
    fn connect(&mut self, target: &ConnectTarget) -> Result<(), TransportError> {
        self.connects.push(target.server.clone());
        Ok(())
    }

    fn respond(&mut self, server: &str, request: Bytes, max_output_size: u32) -> Result<Bytes, TransportError> {
        self.output_sizes.push(max_output_size);
        if max_output_size < MIN_OUTPUT_BUFFER_SIZE {
            return Err(TransportError::Rpc(RpcErrorCode::BufferTooSmall));
        }
        let decoded = Decoder::new()
            .decode_request(request)
            .map_err(|_| TransportError::Rpc(RpcErrorCode::RpcFormat))?;
        self.received.push(decoded.clone());

        let encoder = Encoder::new();
        if server != self.home_server {
            let responses = self.redirect(&decoded);
            return encode(&encoder, responses, decoded.handles);
        }

        let mut handles = decoded.handles.clone();
        let mut responses = Vec::new();
        let mut used = 0usize;
        for (position, request) in decoded.requests.iter().enumerate() {
            let Some(response) = self.answer(request, &mut handles) else {
                continue;
            };
            let mut bytes = BytesMut::new();
            response
                .encode(&mut bytes)
                .map_err(|_| TransportError::Rpc(RpcErrorCode::RpcFormat))?;
            if let Some(budget) = self.response_budget {
                if used + bytes.len() > budget {
                    let mut unprocessed = BytesMut::new();
                    for rest in &decoded.requests[position..] {
                        rest.encode(&mut unprocessed)
                            .map_err(|_| TransportError::Rpc(RpcErrorCode::RpcFormat))?;
                    }
                    responses.push(RopResponse::BufferTooSmall(BufferTooSmallResponse {
                        size_needed: bytes.len() as u16,
                        request_buffers: unprocessed.to_vec(),
                    }));
                    break;
                }
            }
            used += bytes.len();
            responses.push(response);
        }
        let encoded = encode(&encoder, responses, handles)?;
        match self.truncate_next.take() {
            Some(cut) => Ok(encoded.slice(..encoded.len().saturating_sub(cut))),
            None => Ok(encoded),
        }
    }

    fn disconnect(&mut self, _server: &str) {
        self.objects.clear();
    }
}

fn set_handle(handles: &mut Vec<u32>, index: u8, handle: u32) {
    let index = index as usize;
    if handles.len() <= index {
        handles.resize(index + 1, INVALID_HANDLE);
    }
    handles[index] = handle;
}

fn row_for(columns: &[PropertyTag], mid: u64, subject: &str) -> PropertyRow {
    let values = columns
        .iter()
        .map(|tag| match tag.property_type {
            property_type::INTEGER64 => PropertyValue::Integer64(mid as i64),
            property_type::INTEGER32 => PropertyValue::Integer32(0),
            property_type::BOOLEAN => PropertyValue::Boolean(false),
            _ => PropertyValue::String(subject.to_string()),
        })
        .collect();
    PropertyRow::Standard(values)
}

fn encode(encoder: &Encoder, responses: Vec<RopResponse>, handles: Vec<u32>) -> Result<Bytes, TransportError> {
    encoder
        .encode_responses(&[(responses, handles)])
        .map(BytesMut::freeze)
        .map_err(|_| TransportError::Rpc(RpcErrorCode::RpcFormat))
}

pub type MockSession = Session<LoopbackTransport<MockMailbox>>;

/// A session over a fresh mock mailbox, plus a handle on the mailbox.
pub fn mock_session(config: SessionConfig) -> (MockSession, Arc<Mutex<MockMailbox>>) {
    let mailbox = Arc::new(Mutex::new(MockMailbox::default()));
    let session = Session::new(LoopbackTransport::shared(mailbox.clone()), config);
    (session, mailbox)
}
