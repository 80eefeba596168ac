//! Session round-trip benchmarks over an in-process transport.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oxcrops_client::{
    Credentials, LoopbackTransport, Responder, Session, SessionConfig, TransportError,
};
use oxcrops_protocol::rops::control::ReleaseRequest;
use oxcrops_protocol::rops::folder::{OpenFolderRequest, OpenFolderResponse, OpenedFolder};
use oxcrops_protocol::rops::logon::{
    LogonOutcome, LogonRequest, LogonResponse, PrivateLogon, FOLDER_ID_COUNT,
};
use oxcrops_protocol::rops::RopOutcome;
use oxcrops_protocol::types::LogonTime;
use oxcrops_protocol::{
    Decoder, Encoder, ExpectedResponse, RopRequest, RopResponse, RpcErrorCode, INVALID_HANDLE,
};
use tokio::runtime::Runtime;
use uuid::Uuid;

const MAILBOX_DN: &str = "/o=Bench/ou=Exchange/cn=Recipients/cn=bench";
const INBOX: u64 = 0x0001_0000_0000_0005;

/// Answers Logon and OpenFolder with fresh handles; everything else is
/// a format error.
#[derive(Default)]
struct BenchMailbox {
    next_handle: u32,
}

impl BenchMailbox {
    fn allocate(&mut self, handles: &mut Vec<u32>, index: u8) {
        self.next_handle += 1;
        let index = index as usize;
        if handles.len() <= index {
            handles.resize(index + 1, INVALID_HANDLE);
        }
        handles[index] = self.next_handle;
    }
}

impl Responder for BenchMailbox {
    fn respond(
        &mut self,
        _server: &str,
        request: Bytes,
        _max_output_size: u32,
    ) -> Result<Bytes, TransportError> {
        let format_error = |_| TransportError::Rpc(RpcErrorCode::RpcFormat);
        let decoded = Decoder::new().decode_request(request).map_err(format_error)?;
        let mut handles = decoded.handles;
        let mut responses = Vec::new();

        for request in &decoded.requests {
            match request {
                RopRequest::Release(_) => {}
                RopRequest::Logon(logon) => {
                    self.allocate(&mut handles, logon.output_handle_index);
                    responses.push(RopResponse::Logon(LogonResponse {
                        output_handle_index: logon.output_handle_index,
                        outcome: LogonOutcome::Private(PrivateLogon {
                            logon_flags: logon.logon_flags,
                            folder_ids: [INBOX; FOLDER_ID_COUNT],
                            response_flags: 0x01,
                            mailbox_guid: Uuid::nil(),
                            replica_id: 1,
                            replica_guid: Uuid::nil(),
                            logon_time: LogonTime::default(),
                            gwart_time: 0,
                            store_state: 0,
                        }),
                    }));
                }
                RopRequest::OpenFolder(open) => {
                    self.allocate(&mut handles, open.output_handle_index);
                    responses.push(RopResponse::OpenFolder(OpenFolderResponse {
                        output_handle_index: open.output_handle_index,
                        outcome: RopOutcome::Success(OpenedFolder {
                            has_rules: false,
                            ghost: None,
                        }),
                    }));
                }
                _ => return Err(TransportError::Rpc(RpcErrorCode::RpcFormat)),
            }
        }

        Encoder::new()
            .encode_responses(&[(responses, handles)])
            .map(BytesMut::freeze)
            .map_err(format_error)
    }
}

type BenchSession = Session<LoopbackTransport<BenchMailbox>>;

fn logged_on_session(rt: &Runtime, config: SessionConfig) -> BenchSession {
    let mut session = Session::new(LoopbackTransport::new(BenchMailbox::default()), config);
    rt.block_on(async {
        session
            .connect("mbx01", Credentials::new("bench", "BENCH", "bench"))
            .await
            .unwrap();
        session
            .execute(
                vec![LogonRequest::private(0, 0, MAILBOX_DN).into()],
                ExpectedResponse::Success,
            )
            .await
            .unwrap();
    });
    session
}

fn bench_open_release(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut session = logged_on_session(&rt, SessionConfig::default());
    let mut group = c.benchmark_group("session_open_release");

    for count in [1usize, 8, 32] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut requests: Vec<RopRequest> = (1..=count)
                    .map(|slot| OpenFolderRequest::new(0, 0, slot as u8, INBOX).into())
                    .collect();
                requests.extend((1..=count).map(|slot| ReleaseRequest::new(0, slot as u8).into()));
                rt.block_on(async {
                    black_box(
                        session
                            .execute(requests, ExpectedResponse::Success)
                            .await
                            .unwrap(),
                    )
                })
            });
        });
    }

    group.finish();
}

fn bench_xor_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut plain = logged_on_session(&rt, SessionConfig::default());
    let mut xor = logged_on_session(&rt, SessionConfig::default().with_xor_magic(true));
    let mut group = c.benchmark_group("session_round_trip");

    for (name, session) in [("plain", &mut plain), ("xor", &mut xor)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(
                        session
                            .execute(
                                vec![
                                    OpenFolderRequest::new(0, 0, 1, INBOX).into(),
                                    ReleaseRequest::new(0, 1).into(),
                                ],
                                ExpectedResponse::Success,
                            )
                            .await
                            .unwrap(),
                    )
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_open_release, bench_xor_round_trip);
criterion_main!(benches);
