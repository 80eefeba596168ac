//! Session / transport adapter.
//!
//! A session owns one transport connection and one [`HandleTable`]. Each
//! call encodes every ROP into one buffer, makes a single round trip,
//! decodes every response, and only then applies handle-table effects in
//! response order.

use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::handle_table::{HandleTable, LOGON_ANCHOR_INDEX};
use crate::transport::{ConnectTarget, Credentials, Transport, TransportError};
use bytes::Bytes;
use oxcrops_protocol::codec::{CorrelatedResponse, DecodedResponses, Decoder, Encoder, TableColumns};
use oxcrops_protocol::rops::logon::{resolve_redirect_server, LogonOutcome};
use oxcrops_protocol::{
    reconcile, ExpectedResponse, LogonKinds, Observed, PropertyTag, ProtocolError, ResponseKind,
    RopRequest, RopResponse, RpcErrorCode, ServerObjectHandle, INVALID_HANDLE,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    /// At least one Logon object is open.
    LoggedOn,
}

/// How a call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The server answered; `response` is the framed output buffer.
    Completed {
        response: Bytes,
        decoded: DecodedResponses,
    },
    /// The call as a whole failed, locally or on the server.
    RpcError(RpcErrorCode),
}

/// One submitted ROP buffer and what came back.
#[derive(Debug, Clone, PartialEq)]
pub struct RopCall {
    pub requests: Vec<RopRequest>,
    /// Handle list sent with the requests.
    pub handles: Vec<u32>,
    /// Framed input buffer; empty when the call was rejected before sending.
    pub request: Bytes,
    pub outcome: CallOutcome,
    /// Logon redirects followed on the way to this result.
    pub redirects: u32,
}

impl RopCall {
    pub fn decoded(&self) -> Option<&DecodedResponses> {
        match &self.outcome {
            CallOutcome::Completed { decoded, .. } => Some(decoded),
            CallOutcome::RpcError(_) => None,
        }
    }

    pub fn response_bytes(&self) -> Option<&Bytes> {
        match &self.outcome {
            CallOutcome::Completed { response, .. } => Some(response),
            CallOutcome::RpcError(_) => None,
        }
    }

    pub fn rpc_error(&self) -> Option<RpcErrorCode> {
        match self.outcome {
            CallOutcome::RpcError(code) => Some(code),
            CallOutcome::Completed { .. } => None,
        }
    }

    /// Decoded responses in request order.
    pub fn responses(&self) -> impl Iterator<Item = &RopResponse> {
        self.decoded()
            .into_iter()
            .flat_map(|decoded| decoded.responses.iter().map(|c| &c.response))
    }

    /// The response to the request at `request_index`, if one arrived.
    pub fn response_to(&self, request_index: usize) -> Option<&RopResponse> {
        self.decoded()?
            .responses
            .iter()
            .find(|c| c.request_index == request_index)
            .map(|c| &c.response)
    }

    /// What the call produced, judged by its last response.
    pub fn observed(&self) -> Observed {
        match &self.outcome {
            CallOutcome::RpcError(code) => Observed::RpcError(*code),
            CallOutcome::Completed { decoded, .. } => {
                if decoded.buffer_too_small.is_some() {
                    return Observed::Response(ResponseKind::Failure);
                }
                decoded
                    .last()
                    .map_or(Observed::Nothing, |c| Observed::Response(c.response.kind()))
            }
        }
    }
}

/// Result of one exchange before it is paired with its inputs.
struct Exchange {
    request: Bytes,
    outcome: CallOutcome,
    redirects: u32,
}

impl Exchange {
    fn rejected(code: RpcErrorCode) -> Self {
        Self {
            request: Bytes::new(),
            outcome: CallOutcome::RpcError(code),
            redirects: 0,
        }
    }
}

/// A session against one mailbox server.
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    target: Option<ConnectTarget>,
    handles: HandleTable,
    columns: TableColumns,
    logons: LogonKinds,
    /// Handle index of each open Logon object, with its LogonId.
    logon_slots: HashMap<u8, u8>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Disconnected,
            target: None,
            handles: HandleTable::new(),
            columns: TableColumns::new(),
            logons: LogonKinds::new(),
            logon_slots: HashMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn target(&self) -> Option<&ConnectTarget> {
        self.target.as_ref()
    }

    pub fn server(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.server.as_str())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Column set of the table at `index`, from its last successful SetColumns.
    pub fn columns(&self, index: u8) -> Option<&[PropertyTag]> {
        self.columns.get(&index).map(Vec::as_slice)
    }

    pub fn logons(&self) -> &LogonKinds {
        &self.logons
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether a Logon redirect is followed or returned to the caller.
    pub fn set_auto_redirect(&mut self, enabled: bool) {
        self.config.auto_redirect = enabled;
    }

    /// Connects over the configured transport sequence.
    pub async fn connect(
        &mut self,
        server: impl Into<String>,
        credentials: Credentials,
    ) -> Result<(), ClientError> {
        let target = ConnectTarget::new(server, self.config.transport, credentials);
        self.connect_to(target).await
    }

    pub async fn connect_to(&mut self, target: ConnectTarget) -> Result<(), ClientError> {
        if let Some(current) = &self.target {
            return Err(ClientError::AlreadyConnected(current.server.clone()));
        }
        self.open(target).await
    }

    /// Closes the connection and forgets every server object.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        let result = self.transport.disconnect().await;
        if let Some(target) = &self.target {
            info!(server = %target.server, "disconnected");
        }
        self.reset();
        result.map_err(ClientError::from)
    }

    /// Submits one ROP against a single server handle.
    pub async fn submit_single(
        &mut self,
        request: RopRequest,
        input_handle: u32,
        expected: ExpectedResponse,
    ) -> Result<RopCall, ClientError> {
        let size = self.config.output_buffer_size;
        self.submit(vec![request], vec![input_handle], expected, size)
            .await
    }

    /// Submits several ROPs in one buffer with an explicit handle list.
    pub async fn submit_multiple(
        &mut self,
        requests: Vec<RopRequest>,
        handles: Vec<u32>,
        expected: ExpectedResponse,
    ) -> Result<RopCall, ClientError> {
        let size = self.config.output_buffer_size;
        self.submit(requests, handles, expected, size).await
    }

    /// Submits one ROP with a caller-chosen output buffer size.
    pub async fn submit_with_output_size(
        &mut self,
        request: RopRequest,
        input_handle: u32,
        expected: ExpectedResponse,
        max_output_size: u32,
    ) -> Result<RopCall, ClientError> {
        self.submit(vec![request], vec![input_handle], expected, max_output_size)
            .await
    }

    /// Submits ROPs with the handle list built from the session's table.
    pub async fn execute(
        &mut self,
        requests: Vec<RopRequest>,
        expected: ExpectedResponse,
    ) -> Result<RopCall, ClientError> {
        let handles = self.handle_list(&requests);
        let size = self.config.output_buffer_size;
        self.submit(requests, handles, expected, size).await
    }

    /// Sends `requests` and checks the result against `expected`.
    ///
    /// `handles` is padded with [`INVALID_HANDLE`] up to the highest index
    /// the requests name. An RPC-level failure is returned as a
    /// [`CallOutcome::RpcError`] when `expected` allows it.
    pub async fn submit(
        &mut self,
        requests: Vec<RopRequest>,
        mut handles: Vec<u32>,
        expected: ExpectedResponse,
        max_output_size: u32,
    ) -> Result<RopCall, ClientError> {
        pad_handles(&mut handles, &requests);
        let exchange = self.call(&requests, &handles, max_output_size).await?;
        let call = RopCall {
            requests,
            handles,
            request: exchange.request,
            outcome: exchange.outcome,
            redirects: exchange.redirects,
        };
        reconcile(expected, call.observed())?;
        Ok(call)
    }

    /// Handle list for `requests` from the session table.
    ///
    /// Slots whose first use is as an output are sent as [`INVALID_HANDLE`]
    /// placeholders, as are unmapped slots.
    pub fn handle_list(&self, requests: &[RopRequest]) -> Vec<u32> {
        let mut placeholder = BTreeMap::new();
        for request in requests {
            let slots = request.handle_slots();
            for index in [slots.input, slots.destination, slots.response]
                .into_iter()
                .flatten()
            {
                placeholder.entry(index).or_insert(false);
            }
            if let Some(output) = slots.output {
                placeholder.entry(output).or_insert(true);
            }
        }

        let Some(max) = placeholder.keys().next_back().copied() else {
            return Vec::new();
        };
        (0..=max)
            .map(|index| match placeholder.get(&index) {
                Some(true) => INVALID_HANDLE,
                _ => self.handles.wire_handle(index),
            })
            .collect()
    }

    async fn open(&mut self, target: ConnectTarget) -> Result<(), ClientError> {
        debug!("Connecting to {} over {}...", target.server, target.transport);

        tokio::time::timeout(self.config.connect_timeout(), self.transport.connect(&target))
            .await
            .map_err(|_| {
                debug!("Connection timeout");
                ClientError::Timeout
            })??;

        info!(server = %target.server, transport = %target.transport, "connected");
        self.target = Some(target);
        self.state = SessionState::Connected;
        Ok(())
    }

    fn reset(&mut self) {
        self.handles.clear();
        self.columns.clear();
        self.logons.clear();
        self.logon_slots.clear();
        self.target = None;
        self.state = SessionState::Disconnected;
    }

    async fn teardown(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!("Disconnect during teardown failed: {}", e);
        }
        self.reset();
    }

    fn encoder(&self) -> Encoder {
        Encoder::new()
            .with_reserved(self.config.limits.reserved_rop_ids.clone())
            .with_xor_magic(self.config.xor_magic)
    }

    fn decoder(&self) -> Decoder {
        Decoder::new()
            .with_logons(self.logons.clone())
            .with_columns(self.columns.clone())
    }

    fn ensure_ready(&self, requests: &[RopRequest]) -> Result<(), ClientError> {
        match self.state {
            SessionState::Disconnected => Err(ClientError::NotConnected),
            SessionState::Connected
                if !requests.iter().any(|r| matches!(r, RopRequest::Logon(_))) =>
            {
                Err(ClientError::NotLoggedOn)
            }
            _ => Ok(()),
        }
    }

    async fn call(
        &mut self,
        requests: &[RopRequest],
        handles: &[u32],
        max_output_size: u32,
    ) -> Result<Exchange, ClientError> {
        self.ensure_ready(requests)?;

        if let Err(code) = self.config.limits.check_output_size(max_output_size) {
            warn!(max_output_size, "output buffer size rejected before sending");
            return Ok(Exchange::rejected(code));
        }

        let request = match self.encoder().encode(requests, handles) {
            Ok(buf) => buf.freeze(),
            Err(ProtocolError::ReservedRopId(rop_id)) => {
                warn!("RopId {:#04x} is reserved, call rejected before sending", rop_id);
                return Ok(Exchange::rejected(RpcErrorCode::RpcFormat));
            }
            Err(err) => return Err(err.into()),
        };

        let mut redirects = 0;
        loop {
            debug!(
                rops = requests.len(),
                bytes = request.len(),
                max_output_size,
                "sending ROP buffer"
            );
            let response = match self.round_trip(request.clone(), max_output_size).await {
                Ok(response) => response,
                Err(ClientError::Rpc { code }) => {
                    debug!(%code, "RPC call failed");
                    return Ok(Exchange {
                        request,
                        outcome: CallOutcome::RpcError(code),
                        redirects,
                    });
                }
                Err(err) => return Err(err),
            };

            let decoded = match self.decoder().decode_responses(requests, response.clone()) {
                Ok(decoded) => decoded,
                Err(err) => {
                    // Handles in an undecodable buffer are lost, so the
                    // table can no longer mirror the server.
                    warn!(error = %err, "undecodable response buffer, closing session");
                    self.teardown().await;
                    return Err(err.into());
                }
            };

            if self.config.auto_redirect {
                if let Some(server_name) = redirect_server(&decoded) {
                    let host = resolve_redirect_server(&server_name).to_string();
                    if redirects >= self.config.max_redirects {
                        warn!(server = %host, redirects, "redirect limit reached");
                        return Err(ClientError::RedirectLimit {
                            limit: self.config.max_redirects,
                            server: host,
                        });
                    }
                    redirects += 1;
                    self.follow_redirect(host).await?;
                    continue;
                }
            }

            self.apply(requests, &decoded);
            return Ok(Exchange {
                request,
                outcome: CallOutcome::Completed { response, decoded },
                redirects,
            });
        }
    }

    async fn round_trip(&mut self, request: Bytes, max_output_size: u32) -> Result<Bytes, ClientError> {
        let result = tokio::time::timeout(
            self.config.request_timeout(),
            self.transport.execute(request, max_output_size),
        )
        .await;

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(TransportError::Rpc(code))) => Err(ClientError::Rpc { code }),
            Ok(Err(err)) => {
                warn!(error = %err, "transport failed, closing session");
                self.teardown().await;
                Err(ClientError::Transport(err))
            }
            Err(_) => {
                warn!("request timed out, closing session");
                self.teardown().await;
                Err(ClientError::Timeout)
            }
        }
    }

    async fn follow_redirect(&mut self, host: String) -> Result<(), ClientError> {
        let target = self
            .target
            .as_ref()
            .ok_or(ClientError::NotConnected)?
            .redirected(host);
        info!(
            from = self.server().unwrap_or_default(),
            to = %target.server,
            "following logon redirect"
        );
        self.teardown().await;
        self.open(target).await
    }

    /// Applies handle-table effects in request order, stopping at the
    /// first request the server did not answer.
    fn apply(&mut self, requests: &[RopRequest], decoded: &DecodedResponses) {
        for response in &decoded.server_responses {
            debug!(rop = ?response.rop_id(), "server-originated response");
        }
        if let Some(too_small) = &decoded.buffer_too_small {
            warn!(
                size_needed = too_small.size_needed,
                unprocessed = too_small.request_buffers.len(),
                "output buffer too small, server stopped early"
            );
        }

        let mut answered = decoded.responses.iter().peekable();
        for (index, request) in requests.iter().enumerate() {
            if !request.produces_response() {
                if let RopRequest::Release(release) = request {
                    self.release_slot(release.input_handle_index);
                }
                continue;
            }
            let Some(correlated) = answered.next_if(|c| c.request_index == index) else {
                break;
            };
            self.apply_response(request, correlated, decoded);
        }
    }

    fn apply_response(
        &mut self,
        request: &RopRequest,
        correlated: &CorrelatedResponse,
        decoded: &DecodedResponses,
    ) {
        let response = &correlated.response;
        if !response.is_success() {
            return;
        }

        if let Some(output) = request.output_handle_index() {
            match decoded.handle_for(correlated, output) {
                Some(handle) if handle != INVALID_HANDLE => {
                    let handle = ServerObjectHandle(handle);
                    if output == LOGON_ANCHOR_INDEX
                        && !matches!(request, RopRequest::Logon(_))
                        && self.logon_slots.contains_key(&output)
                    {
                        warn!(
                            rop = ?request.rop_id(),
                            "output handle replaces the logon at index 0"
                        );
                    }
                    self.evict(output);
                    self.handles.install(output, handle);
                    debug!(index = output, %handle, "installed server object");
                }
                _ => warn!(
                    index = output,
                    rop = ?request.rop_id(),
                    "successful response without a server handle"
                ),
            }
        }

        match (request, response) {
            (RopRequest::Logon(logon), RopResponse::Logon(answer)) => {
                if let Some(kind) = answer.logon_kind() {
                    self.logons.set(logon.logon_id, kind);
                    self.logon_slots
                        .insert(logon.output_handle_index, logon.logon_id);
                    self.state = SessionState::LoggedOn;
                    info!(logon_id = logon.logon_id, ?kind, "logged on");
                }
            }
            (RopRequest::SetColumns(set), _) => {
                self.columns
                    .insert(set.input_handle_index, set.property_tags.clone());
            }
            _ => {}
        }
    }

    fn release_slot(&mut self, index: u8) {
        if self.handles.release(index).is_none() {
            debug!(index, "released an empty handle slot");
        }
        self.evict(index);
    }

    /// Forgets per-object state at `index`.
    fn evict(&mut self, index: u8) {
        self.columns.remove(&index);
        if let Some(logon_id) = self.logon_slots.remove(&index) {
            self.logons.remove(logon_id);
        }
        if self.logon_slots.is_empty() && self.state == SessionState::LoggedOn {
            self.state = SessionState::Connected;
        }
    }
}

/// Server name of the first Logon redirect in `decoded`.
fn redirect_server(decoded: &DecodedResponses) -> Option<String> {
    decoded.responses.iter().find_map(|c| match c.response.as_logon() {
        Some(answer) => match &answer.outcome {
            LogonOutcome::Redirect { server_name, .. } => Some(server_name.clone()),
            _ => None,
        },
        None => None,
    })
}

/// Extends `handles` to cover every index `requests` name.
fn pad_handles(handles: &mut Vec<u32>, requests: &[RopRequest]) {
    let needed = requests
        .iter()
        .filter_map(|r| r.handle_slots().max_index())
        .max()
        .map_or(0, |max| max as usize + 1);
    if handles.len() < needed {
        handles.resize(needed, INVALID_HANDLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LoopbackTransport, Responder};
    use oxcrops_protocol::rops::control::ReleaseRequest;
    use oxcrops_protocol::rops::folder::{MoveFolderRequest, OpenFolderRequest};
    use oxcrops_protocol::rops::logon::LogonRequest;

    struct Unreachable;

    impl Responder for Unreachable {
        fn respond(&mut self, _: &str, _: Bytes, _: u32) -> Result<Bytes, TransportError> {
            Err(TransportError::Closed)
        }
    }

    fn session() -> Session<LoopbackTransport<Unreachable>> {
        Session::new(LoopbackTransport::new(Unreachable), SessionConfig::default())
    }

    #[test]
    fn test_pad_handles() {
        let requests: Vec<RopRequest> = vec![OpenFolderRequest::new(0, 0, 2, 1).into()];
        let mut handles = vec![0x10];
        pad_handles(&mut handles, &requests);
        assert_eq!(handles, vec![0x10, INVALID_HANDLE, INVALID_HANDLE]);

        let mut longer = vec![1, 2, 3, 4];
        pad_handles(&mut longer, &requests);
        assert_eq!(longer.len(), 4);
    }

    #[test]
    fn test_handle_list_placeholders() {
        let mut session = session();
        session.handles.install(0, ServerObjectHandle(0xA0));
        session.handles.install(1, ServerObjectHandle(0xA1));

        // Slot 1 is first written by OpenFolder, so its old handle is not sent.
        let requests: Vec<RopRequest> = vec![
            OpenFolderRequest::new(0, 0, 1, 5).into(),
            MoveFolderRequest {
                logon_id: 0,
                source_handle_index: 1,
                dest_handle_index: 3,
                want_asynchronous: false,
                use_unicode: true,
                folder_id: 7,
                new_folder_name: "Moved".into(),
            }
            .into(),
        ];
        assert_eq!(
            session.handle_list(&requests),
            vec![0xA0, INVALID_HANDLE, INVALID_HANDLE, INVALID_HANDLE]
        );

        let release: Vec<RopRequest> = vec![ReleaseRequest::new(0, 1).into()];
        assert_eq!(session.handle_list(&release), vec![0xA0, 0xA1]);
        assert!(session.handle_list(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_state_guards() {
        let mut session = session();
        let logon: RopRequest = LogonRequest::public(0, 0).into();
        let err = session
            .execute(vec![logon], ExpectedResponse::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));

        session
            .connect("mbx01", Credentials::default())
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Connected);

        let err = session
            .execute(vec![ReleaseRequest::new(0, 0).into()], ExpectedResponse::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotLoggedOn));

        let err = session
            .connect("mbx02", Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AlreadyConnected(server) if server == "mbx01"));

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_tears_down() {
        let mut session = session();
        session
            .connect("mbx01", Credentials::default())
            .await
            .unwrap();
        let logon: RopRequest = LogonRequest::private(0, 0, "/o=Org/cn=user1").into();
        let err = session
            .execute(vec![logon], ExpectedResponse::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(TransportError::Closed)));
        assert!(err.is_retryable());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.server().is_none());
    }
}
