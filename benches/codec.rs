// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Codec benchmarks.
//
// Run with:
//   cargo bench --bench codec
//
// Groups:
//   cobs_encode — incremental COBS encoding of a zero-sprinkled body
//   tx_frame    — full transmit pipeline (header + CRC + COBS + emitter)
//
// Each group exercises three payload sizes:
//   small  — 16 bytes   (sensor sample)
//   medium — 256 bytes  (just past one COBS chunk)
//   large  — 4096 bytes (bulk transfer)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cyphal_serial::cobs::{self, CobsEncoder};
use cyphal_serial::{NodeId, Priority, Transport, TransferKind, TransferMetadata};

const SIZES: &[(&str, usize)] = &[
    ("small_16", 16),
    ("medium_256", 256),
    ("large_4096", 4096),
];

fn payload_of(size: usize) -> Vec<u8> {
    // Every ninth byte is a zero so the encoder's chunk logic stays busy.
    (0..size).map(|i| if i % 9 == 0 { 0 } else { i as u8 }).collect()
}

fn bench_cobs_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("cobs_encode");

    for &(label, size) in SIZES {
        let payload = payload_of(size);
        let mut out = vec![0u8; cobs::encoded_size(size + 1) + 1];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &payload, |b, data| {
            b.iter(|| {
                let mut encoder = CobsEncoder::new();
                encoder.extend(&mut out, data);
                encoder.push(&mut out, 0x00);
                black_box(encoder.bytes_written())
            });
        });
    }

    group.finish();
}

fn bench_tx_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("tx_frame");

    for &(label, size) in SIZES {
        let payload = payload_of(size);
        let mut transport = Transport::new();
        transport.set_node_id(NodeId::new(42));
        let metadata = TransferMetadata {
            priority: Priority::Nominal,
            transfer_kind: TransferKind::Message,
            port_id: 4919,
            remote_node_id: None,
            transfer_id: 0,
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &payload, |b, data| {
            b.iter(|| {
                let mut emitted = 0usize;
                let sent = transport
                    .tx_push(&metadata, data, |chunk| {
                        emitted += chunk.len();
                        true
                    })
                    .unwrap();
                black_box((sent, emitted))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cobs_encode, bench_tx_frame);
criterion_main!(benches);
