//! ROP encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oxcrops_protocol::buffer::{self, RopPayload};
use oxcrops_protocol::property::{property_type, PropertyRow, PropertyValue};
use oxcrops_protocol::rops::folder::OpenFolderRequest;
use oxcrops_protocol::rops::table::{
    bookmark, table_status, QueriedRows, QueryRowsRequest, QueryRowsResponse, SetColumnsRequest,
    SetColumnsResponse,
};
use oxcrops_protocol::rops::RopOutcome;
use oxcrops_protocol::{Decoder, Encoder, PropertyTag, RopRequest, RopResponse};

const INBOX: u64 = 0x0001_0000_0000_0005;

fn columns() -> Vec<PropertyTag> {
    vec![
        PropertyTag::new(0x674A, property_type::INTEGER64),
        PropertyTag::new(0x0037, property_type::STRING),
        PropertyTag::new(0x0E08, property_type::INTEGER32),
    ]
}

fn open_folder_batch(count: usize) -> Vec<RopRequest> {
    (0..count)
        .map(|i| OpenFolderRequest::new(0, 0, (i + 1) as u8, INBOX + i as u64).into())
        .collect()
}

fn table_requests(row_count: u16) -> Vec<RopRequest> {
    vec![
        SetColumnsRequest::new(0, 1, columns()).into(),
        QueryRowsRequest::new(0, 1, row_count).into(),
    ]
}

fn table_responses(row_count: usize) -> Vec<RopResponse> {
    let rows = (0..row_count)
        .map(|i| {
            PropertyRow::Standard(vec![
                PropertyValue::Integer64(0x0001_0000_0000_1000 + i as i64),
                PropertyValue::String(format!("Message subject number {}", i)),
                PropertyValue::Integer32(4096),
            ])
        })
        .collect();
    vec![
        RopResponse::SetColumns(SetColumnsResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(table_status::COMPLETE),
        }),
        RopResponse::QueryRows(QueryRowsResponse {
            input_handle_index: 1,
            outcome: RopOutcome::Success(QueriedRows {
                origin: bookmark::END,
                columns: columns(),
                rows,
            }),
        }),
    ]
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_request");

    for size in [100, 1000, 10000] {
        let payload = RopPayload::new(Bytes::from(vec![0x42u8; size]), vec![0x100; 16]);

        group.throughput(Throughput::Bytes(size as u64));
        for xor in [false, true] {
            let id = format!("{}{}", size, if xor { "-xor" } else { "" });
            group.bench_with_input(BenchmarkId::from_parameter(id), &payload, |b, payload| {
                b.iter(|| black_box(buffer::frame_request(payload, xor).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_parse_chunks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_chunks");

    for size in [100, 1000, 10000] {
        let payload = RopPayload::new(Bytes::from(vec![0x42u8; size]), vec![0x100; 16]);
        let framed = buffer::frame_request(&payload, true).unwrap().freeze();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &framed, |b, framed| {
            b.iter(|| black_box(buffer::parse_chunks(framed.clone()).unwrap()));
        });
    }

    group.finish();
}

fn bench_request_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_encode");
    let encoder = Encoder::new();

    for count in [1, 10, 50] {
        let requests = open_folder_batch(count);
        let handles = vec![0x100; count + 1];

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &requests, |b, requests| {
            b.iter(|| black_box(encoder.encode(requests, &handles).unwrap()));
        });
    }

    group.finish();
}

fn bench_request_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_decode");
    let decoder = Decoder::new();

    for count in [1, 10, 50] {
        let encoded = Encoder::new()
            .encode(&open_folder_batch(count), &vec![0x100; count + 1])
            .unwrap()
            .freeze();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &encoded, |b, encoded| {
            b.iter(|| black_box(decoder.decode_request(encoded.clone()).unwrap()));
        });
    }

    group.finish();
}

fn bench_response_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_decode");
    let decoder = Decoder::new();

    for rows in [1u16, 50, 200] {
        let requests = table_requests(rows);
        let encoded = Encoder::new()
            .encode_responses(&[(table_responses(rows as usize), vec![0x100, 0x200])])
            .unwrap()
            .freeze();

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &encoded, |b, encoded| {
            b.iter(|| black_box(decoder.decode_responses(&requests, encoded.clone()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame,
    bench_parse_chunks,
    bench_request_encode,
    bench_request_decode,
    bench_response_decode,
);

criterion_main!(benches);
