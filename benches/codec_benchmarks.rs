//! Codec benchmarks
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use voice_bid_relay::core::audio::FRAME_SIZE;
use voice_bid_relay::core::audio::pcm::{decode_base64_audio, encode_frame_base64, encode_pcm16};
use voice_bid_relay::core::audio::wav::decode_fragment;
use voice_bid_relay::core::bid::intercept_function_call;

fn sine(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 24_000.0).sin() * 0.8)
        .collect()
}

/// Capture path: one frame to a base64 transport payload
fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encoding");
    group.measurement_time(Duration::from_secs(5));

    for len in [1024, FRAME_SIZE] {
        let frame = sine(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("encode_frame_base64", len), &frame, |b, f| {
            b.iter(|| encode_frame_base64(black_box(f)));
        });
    }

    group.finish();
}

/// Playback path: base64 delta to samples
fn bench_fragment_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragment_decoding");
    group.measurement_time(Duration::from_secs(5));

    for len in [480, 2400, 24_000] {
        let payload = encode_frame_base64(&sine(len));
        let pcm = encode_pcm16(&sine(len));

        group.throughput(Throughput::Bytes(pcm.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode_base64_audio", len), &payload, |b, p| {
            b.iter(|| decode_base64_audio(black_box(p)));
        });
        group.bench_with_input(BenchmarkId::new("decode_fragment", len), &pcm, |b, p| {
            b.iter(|| decode_fragment(black_box(p)));
        });
    }

    group.finish();
}

fn bench_bid_extraction(c: &mut Criterion) {
    let arguments = r#"{"name":"Midwest dry van","bid_type":"contract","priority":"high","budget":250000,"start_date":"2025-01-01","end_date":"2025-12-31","submission_deadline":"2024-11-15","equipment_type":"dry van"}"#;
    let frame = serde_json::json!({
        "type": "response.function_call_arguments.done",
        "call_id": "call-1",
        "name": "create_bid",
        "arguments": arguments,
    })
    .to_string();
    let passthrough = r#"{"type":"response.audio_transcript.delta","delta":"Sure, what lanes?"}"#;

    c.bench_function("intercept_function_call/create_bid", |b| {
        b.iter(|| intercept_function_call(black_box(&frame)));
    });
    c.bench_function("intercept_function_call/passthrough", |b| {
        b.iter(|| intercept_function_call(black_box(passthrough)));
    });
}

criterion_group!(
    benches,
    bench_frame_encoding,
    bench_fragment_decoding,
    bench_bid_extraction
);
criterion_main!(benches);
