//! Encoder and decoder for ROP buffers.
//!
//! Requests encode into a single framed chunk. Responses decode against
//! the requests that produced them: response `i` answers the `i`-th request
//! that produces a response, and a mismatch in RopId aborts the decode
//! rather than reordering.

use crate::buffer::{self, RopPayload};
use crate::error::ProtocolError;
use crate::request::RopRequest;
use crate::response::RopResponse;
use crate::rop_id::{ReservedRopIds, RopId};
use crate::rops::control::{BufferTooSmallResponse, RawRequest, RawResponse};
use crate::rops::DecodeContext;
use crate::types::{LogonKinds, PropertyTag};
use crate::wire::Reader;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

/// Column sets by table handle index.
pub type TableColumns = HashMap<u8, Vec<PropertyTag>>;

/// Encodes requests into framed ROP input buffers.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    reserved: ReservedRopIds,
    xor_magic: bool,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reserved(mut self, reserved: ReservedRopIds) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn with_xor_magic(mut self, enabled: bool) -> Self {
        self.xor_magic = enabled;
        self
    }

    /// Concatenates the ROP bytes of `requests`.
    ///
    /// Fails on the first reserved RopId before writing anything.
    pub fn encode_rops(&self, requests: &[RopRequest]) -> Result<BytesMut, ProtocolError> {
        for request in requests {
            self.reserved.check(request.rop_id_byte())?;
        }
        let mut buf = BytesMut::new();
        for request in requests {
            request.encode(&mut buf)?;
        }
        Ok(buf)
    }

    /// Encodes `requests` with the Server Object handle list they index.
    pub fn encode(&self, requests: &[RopRequest], handles: &[u32]) -> Result<BytesMut, ProtocolError> {
        let rops = self.encode_rops(requests)?;
        let payload = RopPayload::new(rops.freeze(), handles.to_vec());
        buffer::frame_request(&payload, self.xor_magic)
    }

    /// Encodes response chunks, each with its own handle table.
    ///
    /// This is the server side of the exchange; it backs test doubles and
    /// the command-line tool.
    pub fn encode_responses(
        &self,
        chunks: &[(Vec<RopResponse>, Vec<u32>)],
    ) -> Result<BytesMut, ProtocolError> {
        let payloads = chunks
            .iter()
            .map(|(responses, handles)| {
                let mut rops = BytesMut::new();
                for response in responses {
                    response.encode(&mut rops)?;
                }
                Ok(RopPayload::new(rops.freeze(), handles.clone()))
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;
        buffer::frame_response(&payloads, self.xor_magic)
    }
}

/// A decoded request buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRequest {
    pub requests: Vec<RopRequest>,
    pub handles: Vec<u32>,
}

/// One request the server is expected to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedResponse {
    /// Position of the request in the submitted list.
    pub request_index: usize,
    pub rop_id: u8,
}

/// The responses a request list should produce, in order.
///
/// Requests that produce no response (Release) are left out, which is
/// what keeps positions aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePlan {
    entries: Vec<PlannedResponse>,
}

impl ResponsePlan {
    pub fn new(requests: &[RopRequest]) -> Self {
        let entries = requests
            .iter()
            .enumerate()
            .filter(|(_, request)| request.produces_response())
            .map(|(request_index, request)| PlannedResponse {
                request_index,
                rop_id: request.rop_id_byte(),
            })
            .collect();
        Self { entries }
    }

    pub fn expected_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, position: usize) -> Option<&PlannedResponse> {
        self.entries.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedResponse> {
        self.entries.iter()
    }
}

/// A response paired with the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedResponse {
    pub request_index: usize,
    /// Chunk the response arrived in; its handle table holds new handles.
    pub chunk: usize,
    pub response: RopResponse,
}

/// Everything decoded from one response buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedResponses {
    /// Answers to requests, in request order.
    pub responses: Vec<CorrelatedResponse>,
    /// Pending and Backoff pseudo-responses, in arrival order.
    pub server_responses: Vec<RopResponse>,
    /// Set when the server ran out of output space; decoding stopped there.
    pub buffer_too_small: Option<BufferTooSmallResponse>,
    /// Handle table of each chunk.
    pub handle_tables: Vec<Vec<u32>>,
}

impl DecodedResponses {
    /// The handle at `index` in the table of the chunk `response` arrived in.
    pub fn handle_for(&self, response: &CorrelatedResponse, index: u8) -> Option<u32> {
        self.handle_tables
            .get(response.chunk)
            .and_then(|table| table.get(index as usize))
            .copied()
    }

    /// Whether every planned response arrived.
    pub fn is_complete(&self, plan: &ResponsePlan) -> bool {
        self.responses.len() == plan.expected_count()
    }

    pub fn last(&self) -> Option<&CorrelatedResponse> {
        self.responses.last()
    }
}

/// Decodes ROP buffers.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    logons: LogonKinds,
    columns: TableColumns,
    raw_fallback: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logon kinds known before the buffer, for request layouts that
    /// depend on them.
    pub fn with_logons(mut self, logons: LogonKinds) -> Self {
        self.logons = logons;
        self
    }

    /// Column sets established by earlier buffers.
    pub fn with_columns(mut self, columns: TableColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Keep an untyped request as raw bytes instead of failing. Only the
    /// last ROP of a buffer can be kept this way.
    pub fn with_raw_fallback(mut self, enabled: bool) -> Self {
        self.raw_fallback = enabled;
        self
    }

    /// Decodes a framed request buffer.
    pub fn decode_request(&self, buf: Bytes) -> Result<DecodedRequest, ProtocolError> {
        let chunk = buffer::parse_request(buf)?;
        let requests = self.decode_request_rops(chunk.payload.rops)?;
        Ok(DecodedRequest {
            requests,
            handles: chunk.payload.handles,
        })
    }

    /// Decodes the ROP section of a request buffer.
    pub fn decode_request_rops(&self, rops: Bytes) -> Result<Vec<RopRequest>, ProtocolError> {
        let mut logons = self.logons.clone();
        let mut src = Reader::new(rops);
        let mut requests = Vec::new();
        while !src.is_empty() {
            let request =
                RopRequest::decode(&mut src, &DecodeContext::with_logons(&logons), self.raw_fallback)?;
            if let RopRequest::Logon(logon) = &request {
                logons.set(logon.logon_id, logon.logon_flags.logon_kind());
            }
            requests.push(request);
        }
        Ok(requests)
    }

    /// Decodes a framed response buffer against the requests it answers.
    pub fn decode_responses(
        &self,
        requests: &[RopRequest],
        buf: Bytes,
    ) -> Result<DecodedResponses, ProtocolError> {
        let plan = ResponsePlan::new(requests);
        let chunks = buffer::parse_chunks(buf)?;
        let mut state = ResponseState {
            plan: &plan,
            requests,
            columns: self.columns.clone(),
            next: 0,
            decoded: DecodedResponses {
                handle_tables: chunks.iter().map(|c| c.payload.handles.clone()).collect(),
                ..DecodedResponses::default()
            },
        };

        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let mut src = Reader::new(chunk.payload.rops);
            while !src.is_empty() {
                if state.decode_one(&mut src, chunk_index)? {
                    return Ok(state.decoded);
                }
            }
        }

        if let Some(missing) = plan.get(state.next) {
            return Err(ProtocolError::MissingResponse {
                position: missing.request_index,
                rop_id: missing.rop_id,
            });
        }
        Ok(state.decoded)
    }
}

struct ResponseState<'a> {
    plan: &'a ResponsePlan,
    requests: &'a [RopRequest],
    columns: TableColumns,
    next: usize,
    decoded: DecodedResponses,
}

impl ResponseState<'_> {
    /// Decodes one ROP. Returns true when decoding must stop.
    fn decode_one(&mut self, src: &mut Reader, chunk: usize) -> Result<bool, ProtocolError> {
        let byte = src.u8("RopId")?;

        match RopId::from_u8(byte) {
            Some(RopId::BufferTooSmall) => {
                let response = RopResponse::decode_typed(
                    RopId::BufferTooSmall,
                    src,
                    &DecodeContext::default(),
                )?;
                if let RopResponse::BufferTooSmall(body) = response {
                    self.decoded.buffer_too_small = Some(body);
                }
                return Ok(true);
            }
            Some(rop_id @ (RopId::Pending | RopId::Backoff)) => {
                let response = RopResponse::decode_typed(rop_id, src, &DecodeContext::default())?;
                self.decoded.server_responses.push(response);
                return Ok(false);
            }
            _ => {}
        }

        let Some(planned) = self.plan.get(self.next).copied() else {
            return Err(ProtocolError::TrailingBytes(src.remaining() + 1));
        };
        if byte != planned.rop_id {
            return Err(ProtocolError::UnexpectedRopId {
                position: planned.request_index,
                expected: planned.rop_id,
                actual: byte,
            });
        }
        let is_last = self.next + 1 == self.plan.expected_count();
        let requests = self.requests;
        let request = &requests[planned.request_index];

        let response = match request {
            RopRequest::Raw(RawRequest { rop_id, .. }) => {
                raw_response(*rop_id, src, is_last)?
            }
            _ => {
                let rop_id = RopId::try_from(byte)?;
                let columns = self.columns_for(request);
                let ctx = DecodeContext {
                    logons: None,
                    columns: columns.as_deref(),
                };
                match RopResponse::decode_typed(rop_id, src, &ctx) {
                    Err(ProtocolError::UnsupportedRop(_)) => {
                        raw_response(byte, src, is_last)?
                    }
                    other => other?,
                }
            }
        };

        self.track_columns(request, &response);
        self.decoded.responses.push(CorrelatedResponse {
            request_index: planned.request_index,
            chunk,
            response,
        });
        self.next += 1;
        Ok(false)
    }

    /// The column layout a row-bearing response is decoded against.
    fn columns_for(&self, request: &RopRequest) -> Option<Vec<PropertyTag>> {
        match request {
            RopRequest::GetPropertiesSpecific(request) => Some(request.property_tags.clone()),
            RopRequest::QueryRows(request) => self.columns.get(&request.input_handle_index).cloned(),
            RopRequest::FindRow(request) => self.columns.get(&request.input_handle_index).cloned(),
            RopRequest::ExpandRow(request) => self.columns.get(&request.input_handle_index).cloned(),
            _ => None,
        }
    }

    fn track_columns(&mut self, request: &RopRequest, response: &RopResponse) {
        if let RopRequest::SetColumns(set) = request {
            if response.is_success() {
                self.columns
                    .insert(set.input_handle_index, set.property_tags.clone());
            }
            return;
        }
        // A new object at an index starts without a column set.
        if let Some(output) = request.output_handle_index() {
            if response.is_success() {
                self.columns.remove(&output);
            }
        }
    }
}

/// Keeps a response as bytes. Its body runs to the end of the section, so
/// this only works for the last planned response.
fn raw_response(rop_id: u8, src: &mut Reader, is_last: bool) -> Result<RopResponse, ProtocolError> {
    if !is_last {
        return Err(match RopId::from_u8(rop_id) {
            Some(id) => ProtocolError::UnsupportedRop(id),
            None => ProtocolError::UnknownRopId(rop_id),
        });
    }
    Ok(RopResponse::Raw(RawResponse::decode_after_id(rop_id, src)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ResponseKind;
    use crate::error::ErrorCode;
    use crate::property::{property_type, PropertyRow, PropertyValue};
    use crate::rops::control::ReleaseRequest;
    use crate::rops::folder::{
        MoveFolderRequest, MoveFolderResponse, OpenFolderRequest, OpenFolderResponse, OpenedFolder,
    };
    use crate::rops::message::{
        CreateMessageRequest, CreateMessageResponse, ModifyRecipientRow, ModifyRecipientsRequest,
        ModifyRecipientsResponse, SaveChangesMessageRequest, SaveChangesMessageResponse,
        SavedMessage,
    };
    use crate::rops::table::{
        find_row_flags, FindRowRequest, FindRowResponse, FoundRow, QueriedRows, QueryRowsRequest,
        QueryRowsResponse, SetColumnsRequest, SetColumnsResponse,
    };
    use crate::rops::{DualHandleOutcome, RopOutcome};
    use crate::INVALID_HANDLE;

    const INBOX: u64 = 0x0001_0000_0000_0005;

    fn opened() -> RopResponse {
        OpenFolderResponse {
            output_handle_index: 1,
            outcome: RopOutcome::Success(OpenedFolder {
                has_rules: false,
                ghost: None,
            }),
        }
        .into()
    }

    fn single_chunk(responses: Vec<RopResponse>, handles: Vec<u32>) -> Bytes {
        Encoder::new()
            .encode_responses(&[(responses, handles)])
            .unwrap()
            .freeze()
    }

    #[test]
    fn test_encode_rejects_reserved_rop_id() {
        let requests = vec![
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(RawRequest::new(0x3C, 0, 0)),
        ];
        let result = Encoder::new().encode(&requests, &[0x10]);
        assert!(matches!(result, Err(ProtocolError::ReservedRopId(0x3C))));

        let permissive = Encoder::new().with_reserved(ReservedRopIds::none());
        assert!(permissive.encode(&requests, &[0x10]).is_ok());
    }

    #[test]
    fn test_request_buffer_round_trip() {
        let requests = vec![
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(CreateMessageRequest::new(0, 1, 2, INBOX)),
            RopRequest::from(SaveChangesMessageRequest::new(0, 3, 2)),
            RopRequest::from(ReleaseRequest::new(0, 2)),
        ];
        let handles = vec![0x0000_1001, INVALID_HANDLE, INVALID_HANDLE, INVALID_HANDLE];
        let buf = Encoder::new().with_xor_magic(true).encode(&requests, &handles).unwrap();

        let decoded = Decoder::new().decode_request(buf.freeze()).unwrap();
        assert_eq!(decoded.requests, requests);
        assert_eq!(decoded.handles, handles);
    }

    #[test]
    fn test_three_responses_correlate_in_order() {
        let requests = vec![
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(CreateMessageRequest::new(0, 1, 2, INBOX)),
            RopRequest::from(SaveChangesMessageRequest::new(0, 3, 2)),
        ];
        let responses = vec![
            opened(),
            CreateMessageResponse {
                output_handle_index: 2,
                outcome: RopOutcome::Success(None),
            }
            .into(),
            SaveChangesMessageResponse {
                response_handle_index: 3,
                outcome: RopOutcome::Success(SavedMessage {
                    input_handle_index: 2,
                    message_id: 0x0001_0000_0000_0100,
                }),
            }
            .into(),
        ];
        let buf = single_chunk(responses, vec![0x1001, 0x2002, 0x3003, INVALID_HANDLE]);

        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses.len(), 3);
        assert!(matches!(decoded.responses[0].response, RopResponse::OpenFolder(_)));
        assert!(matches!(decoded.responses[1].response, RopResponse::CreateMessage(_)));
        assert!(matches!(
            decoded.responses[2].response,
            RopResponse::SaveChangesMessage(_)
        ));
        for (i, correlated) in decoded.responses.iter().enumerate() {
            assert_eq!(correlated.request_index, i);
        }
        assert_eq!(decoded.handle_for(&decoded.responses[0], 1), Some(0x2002));
    }

    #[test]
    fn test_modify_recipients_then_save() {
        let requests = vec![
            RopRequest::from(CreateMessageRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(ModifyRecipientsRequest {
                logon_id: 0,
                input_handle_index: 1,
                recipient_columns: vec![PropertyTag::new(0x3001, property_type::STRING)],
                recipient_rows: vec![ModifyRecipientRow {
                    row_id: 0,
                    recipient_type: 0x01,
                    recipient_row: vec![0x51, 0x00, 0x41, 0x00, 0x00, 0x00],
                }],
            }),
            RopRequest::from(SaveChangesMessageRequest::new(0, 2, 1)),
        ];
        let handles = vec![0x1001, INVALID_HANDLE, INVALID_HANDLE];
        let buf = Encoder::new().encode(&requests, &handles).unwrap();
        let decoded = Decoder::new().decode_request(buf.freeze()).unwrap();
        assert_eq!(decoded.requests, requests);

        let responses = vec![
            CreateMessageResponse {
                output_handle_index: 1,
                outcome: RopOutcome::Success(None),
            }
            .into(),
            ModifyRecipientsResponse::new(1, 0).into(),
            SaveChangesMessageResponse {
                response_handle_index: 2,
                outcome: RopOutcome::Success(SavedMessage {
                    input_handle_index: 1,
                    message_id: 0x0001_0000_0000_0200,
                }),
            }
            .into(),
        ];
        let buf = single_chunk(responses.clone(), vec![0x1001, 0x2002, INVALID_HANDLE]);
        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses.len(), 3);
        assert!(matches!(
            decoded.responses[1].response,
            RopResponse::ModifyRecipients(ModifyRecipientsResponse {
                input_handle_index: 1,
                return_value: 0,
            })
        ));
        assert_eq!(decoded.responses[2].response, responses[2]);
        assert_eq!(decoded.responses[2].request_index, 2);
    }

    #[test]
    fn test_find_row_uses_columns_set_in_same_buffer() {
        let columns = vec![PropertyTag::new(0x0037, property_type::STRING)];
        let requests = vec![
            RopRequest::from(SetColumnsRequest::new(0, 2, columns.clone())),
            RopRequest::from(FindRowRequest {
                logon_id: 0,
                input_handle_index: 2,
                find_row_flags: find_row_flags::FORWARD,
                restriction: vec![0x08, 0x00],
                origin: 0,
                bookmark: Vec::new(),
            }),
        ];
        let set: RopResponse = SetColumnsResponse {
            input_handle_index: 2,
            outcome: RopOutcome::Success(0),
        }
        .into();
        let found: RopResponse = FindRowResponse {
            input_handle_index: 2,
            outcome: RopOutcome::Success(FoundRow {
                row_no_longer_visible: false,
                columns: columns.clone(),
                row: Some(PropertyRow::Standard(vec![PropertyValue::String(
                    "Quarterly".into(),
                )])),
            }),
        }
        .into();
        let buf = single_chunk(vec![set, found.clone()], vec![0, 0, 0x3003]);

        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses[1].response, found);
    }

    #[test]
    fn test_release_has_no_response_slot() {
        let requests = vec![
            RopRequest::from(ReleaseRequest::new(0, 1)),
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
        ];
        let plan = ResponsePlan::new(&requests);
        assert_eq!(plan.expected_count(), 1);
        assert_eq!(plan.get(0).map(|p| p.request_index), Some(1));

        let buf = single_chunk(vec![opened()], vec![0x1001, 0x2002]);
        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses.len(), 1);
        assert_eq!(decoded.responses[0].request_index, 1);
    }

    #[test]
    fn test_mismatched_rop_id() {
        let requests = vec![RopRequest::from(CreateMessageRequest::new(0, 0, 1, INBOX))];
        let buf = single_chunk(vec![opened()], vec![0x1001]);
        assert!(matches!(
            Decoder::new().decode_responses(&requests, buf),
            Err(ProtocolError::UnexpectedRopId {
                position: 0,
                expected: 0x06,
                actual: 0x02
            })
        ));
    }

    #[test]
    fn test_missing_and_extra_responses() {
        let requests = vec![
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(OpenFolderRequest::new(0, 0, 2, INBOX)),
        ];
        let buf = single_chunk(vec![opened()], vec![0x1001, 0x2002]);
        assert!(matches!(
            Decoder::new().decode_responses(&requests, buf),
            Err(ProtocolError::MissingResponse { position: 1, .. })
        ));

        let buf = single_chunk(vec![opened(), opened(), opened()], vec![0x1001, 0x2002]);
        assert!(matches!(
            Decoder::new().decode_responses(&requests, buf),
            Err(ProtocolError::TrailingBytes(_))
        ));
    }

    #[test]
    fn test_truncated_response_is_fatal() {
        let requests = vec![RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX))];
        let payload = RopPayload::new(vec![0x02, 0x01, 0x00, 0x00], vec![0x1001]);
        let buf = buffer::frame_response(&[payload], false).unwrap().freeze();
        assert!(matches!(
            Decoder::new().decode_responses(&requests, buf),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_buffer_too_small_stops_decoding() {
        let requests = vec![
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(OpenFolderRequest::new(0, 0, 2, INBOX)),
        ];
        let too_small = BufferTooSmallResponse {
            size_needed: 0x100,
            request_buffers: vec![0x02, 0x00, 0x00, 0x02],
        };
        let buf = single_chunk(vec![opened(), too_small.clone().into()], vec![0x1001]);
        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses.len(), 1);
        assert_eq!(decoded.buffer_too_small, Some(too_small));
    }

    #[test]
    fn test_responses_continue_across_chunks() {
        let requests = vec![
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(OpenFolderRequest::new(0, 0, 2, INBOX)),
        ];
        let second: RopResponse = OpenFolderResponse {
            output_handle_index: 2,
            outcome: RopOutcome::Failure(ErrorCode::NotFound.value()),
        }
        .into();
        let buf = Encoder::new()
            .encode_responses(&[
                (vec![opened()], vec![0x1001, 0x2002]),
                (vec![second], vec![0x1001, 0x2002, INVALID_HANDLE]),
            ])
            .unwrap()
            .freeze();
        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses[1].chunk, 1);
        assert_eq!(decoded.responses[1].response.kind(), ResponseKind::Failure);
        assert_eq!(decoded.handle_for(&decoded.responses[1], 2), Some(INVALID_HANDLE));
    }

    #[test]
    fn test_query_rows_uses_columns_set_in_same_buffer() {
        let columns = vec![
            PropertyTag::new(0x0037, property_type::STRING),
            PropertyTag::new(0x0E08, property_type::INTEGER32),
        ];
        let requests = vec![
            RopRequest::from(SetColumnsRequest::new(0, 2, columns.clone())),
            RopRequest::from(QueryRowsRequest::new(0, 2, 5)),
        ];
        let rows: RopResponse = QueryRowsResponse {
            input_handle_index: 2,
            outcome: RopOutcome::Success(QueriedRows {
                origin: 0,
                columns: columns.clone(),
                rows: vec![PropertyRow::Standard(vec![
                    PropertyValue::String("Hello".into()),
                    PropertyValue::Integer32(512),
                ])],
            }),
        }
        .into();
        let set: RopResponse = SetColumnsResponse {
            input_handle_index: 2,
            outcome: RopOutcome::Success(0),
        }
        .into();
        let buf = single_chunk(vec![set, rows.clone()], vec![0, 0, 0x3003]);

        let decoded = Decoder::new().decode_responses(&requests, buf.clone()).unwrap();
        assert_eq!(decoded.responses[1].response, rows);

        // Without the SetColumns the layout is unknown.
        let only_rows = vec![RopRequest::from(QueryRowsRequest::new(0, 2, 5))];
        let buf = single_chunk(vec![rows.clone()], vec![0, 0, 0x3003]);
        assert!(matches!(
            Decoder::new().decode_responses(&only_rows, buf.clone()),
            Err(ProtocolError::UnknownColumns(2))
        ));

        // Columns remembered from an earlier buffer.
        let known = TableColumns::from([(2, columns)]);
        let decoded = Decoder::new()
            .with_columns(known)
            .decode_responses(&only_rows, buf)
            .unwrap();
        assert_eq!(decoded.responses[0].response, rows);
    }

    #[test]
    fn test_null_destination_shape() {
        let requests = vec![RopRequest::from(MoveFolderRequest {
            logon_id: 0,
            source_handle_index: 0,
            dest_handle_index: 1,
            want_asynchronous: false,
            use_unicode: true,
            folder_id: INBOX,
            new_folder_name: "Moved".into(),
        })];
        let response: RopResponse = MoveFolderResponse {
            source_handle_index: 0,
            outcome: DualHandleOutcome::NullDestination {
                dest_handle_index: 1,
                body: false,
            },
        }
        .into();
        let buf = single_chunk(vec![response], vec![0x1001]);
        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(
            decoded.responses[0].response.kind(),
            ResponseKind::NullDestinationFailure
        );
    }

    #[test]
    fn test_failed_move_folder_keeps_alignment() {
        let requests = vec![
            RopRequest::from(MoveFolderRequest {
                logon_id: 0,
                source_handle_index: 0,
                dest_handle_index: 1,
                want_asynchronous: false,
                use_unicode: true,
                folder_id: INBOX,
                new_folder_name: "Moved".into(),
            }),
            RopRequest::from(OpenFolderRequest::new(0, 0, 2, INBOX)),
        ];
        let rops = vec![
            0x35, 0x00, 0x05, 0x40, 0x00, 0x80, 0x01, // MoveFolder, NotSupported, partial
            0x02, 0x02, 0x0F, 0x01, 0x04, 0x80, // OpenFolder, NotFound
        ];
        let payload = RopPayload::new(rops, vec![0x1001, 0x2002, INVALID_HANDLE]);
        let buf = buffer::frame_response(&[payload], false).unwrap().freeze();

        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses.len(), 2);
        assert_eq!(
            decoded.responses[0].response,
            RopResponse::MoveFolder(MoveFolderResponse {
                source_handle_index: 0,
                outcome: DualHandleOutcome::Failure {
                    return_value: 0x8000_4005,
                    body: true,
                },
            })
        );
        assert_eq!(
            decoded.responses[1].response.return_value(),
            ErrorCode::NotFound.value()
        );
        assert_eq!(decoded.responses[1].request_index, 1);
    }

    #[test]
    fn test_raw_response_only_in_last_position() {
        let requests = vec![
            RopRequest::from(RawRequest::new(0x31, 0, 0)),
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
        ];
        let raw = RopResponse::Raw(RawResponse {
            rop_id: 0x31,
            payload: vec![0x00, 0x0F, 0x01, 0x04, 0x80],
        });
        let buf = single_chunk(vec![raw.clone(), opened()], vec![0x1001]);
        assert!(Decoder::new().decode_responses(&requests, buf).is_err());

        let requests = vec![
            RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX)),
            RopRequest::from(RawRequest::new(0x31, 0, 0)),
        ];
        let buf = single_chunk(vec![opened(), raw.clone()], vec![0x1001]);
        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses[1].response, raw);
        assert_eq!(decoded.responses[1].response.kind(), ResponseKind::Failure);
    }

    #[test]
    fn test_pending_may_trail() {
        let requests = vec![RopRequest::from(OpenFolderRequest::new(0, 0, 1, INBOX))];
        let pending: RopResponse = crate::rops::control::PendingResponse { session_index: 0 }.into();
        let buf = single_chunk(vec![opened(), pending.clone()], vec![0x1001]);
        let decoded = Decoder::new().decode_responses(&requests, buf).unwrap();
        assert_eq!(decoded.responses.len(), 1);
        assert_eq!(decoded.server_responses, vec![pending]);
    }
}
