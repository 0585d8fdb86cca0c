//! Criterion benchmarks for the size header and capture formatting.
//!
//! Run with:
//! ```bash
//! cargo bench --package relay-core --bench framing_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relay_core::protocol::capture::{ascii_preview, hex_spaced, truncate_display, DISPLAY_LIMIT};
use relay_core::{decode_size_header, encode_size_header, DeliveryEvent};

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks header encoding and decoding for a spread of payload sizes.
fn bench_size_header(c: &mut Criterion) {
    let mut group = c.benchmark_group("size_header");
    for len in [0usize, 64, 64 * 1024, 16 * 1024 * 1024] {
        group.bench_with_input(BenchmarkId::new("encode", len), &len, |b, &len| {
            b.iter(|| encode_size_header(black_box(len)).expect("length fits in u32"))
        });

        let header = encode_size_header(len).expect("length fits in u32");
        group.bench_with_input(BenchmarkId::new("decode", len), &header, |b, header| {
            b.iter(|| decode_size_header(black_box(header)).expect("valid header"))
        });
    }
    group.finish();
}

/// Benchmarks the per-chunk work done when the device sends data back.
fn bench_capture_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture");
    for size in [16usize, 1460, 65536] {
        let chunk: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();

        group.bench_with_input(BenchmarkId::new("log_lines", size), &chunk, |b, chunk| {
            b.iter(|| {
                let hex = truncate_display(&hex_spaced(black_box(chunk)), DISPLAY_LIMIT);
                let ascii = truncate_display(&ascii_preview(black_box(chunk)), DISPLAY_LIMIT);
                (hex, ascii)
            })
        });

        group.bench_with_input(BenchmarkId::new("data_event", size), &chunk, |b, chunk| {
            b.iter(|| DeliveryEvent::data(black_box(chunk)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_size_header, bench_capture_formatting);
criterion_main!(benches);
