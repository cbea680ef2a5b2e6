//! Stream and parser benchmark suite.
//!
//! Benchmarks the hot paths of live sessions:
//! - SSE parsing at different chunk sizes
//! - History recording at capacity
//! - Response fan-out to several subscribers
//!
//! Run with: cargo bench --bench streams
//! Results saved to: target/criterion/

use std::hint::black_box;

use api_probe::{ApiRequest, ApiResponse, ApiType, HistoryLog, ResponseStream, SseParser};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const EVENT_COUNT: usize = 1_000;
const CHUNK_SIZES: &[usize] = &[16, 256, 4096];
const SUBSCRIBER_COUNTS: &[usize] = &[1, 8];

// ============================================================================
// Benchmark: SSE Parser
// ============================================================================

fn event_stream_body() -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..EVENT_COUNT {
        body.extend_from_slice(
            format!("event: tick\nid: {i}\ndata: {{\"seq\":{i},\"payload\":\"abcdefgh\"}}\n\n")
                .as_bytes(),
        );
    }
    body
}

fn bench_sse_parser(c: &mut Criterion) {
    let body = event_stream_body();

    let mut group = c.benchmark_group("sse_parser");
    group.throughput(Throughput::Bytes(body.len() as u64));

    for &chunk_size in CHUNK_SIZES {
        group.bench_with_input(BenchmarkId::new("feed", chunk_size), &chunk_size, |b, &size| {
            b.iter(|| {
                let mut parser = SseParser::new();
                let mut frames = 0;
                for chunk in body.chunks(size) {
                    frames += parser.feed(black_box(chunk)).unwrap().len();
                }
                assert_eq!(frames, EVENT_COUNT);
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: History
// ============================================================================

fn bench_history(c: &mut Criterion) {
    let log = HistoryLog::default();
    for i in 0..log.capacity() {
        log.record(ApiRequest::sse(format!("http://localhost/{i}")));
    }
    let _subscriber = log.subscribe();

    c.bench_function("history_record_at_capacity", |b| {
        b.iter(|| log.record(black_box(ApiRequest::websocket("ws://localhost/ws"))));
    });
}

// ============================================================================
// Benchmark: Response Fan-out
// ============================================================================

fn bench_response_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("response_fanout");

    for &subscribers in SUBSCRIBER_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("publish_receive", subscribers),
            &subscribers,
            |b, &count| {
                b.to_async(&rt).iter(|| async move {
                    let stream = ResponseStream::default();
                    let mut receivers: Vec<_> = (0..count).map(|_| stream.subscribe()).collect();

                    stream.publish(ApiResponse::live(ApiType::WebSocket, json!({"seq": 1})));

                    for receiver in &mut receivers {
                        black_box(receiver.recv().await.unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sse_parser, bench_history, bench_response_fanout);
criterion_main!(benches);
