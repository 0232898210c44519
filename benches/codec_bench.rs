use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use shard_ipc::core::codec::{self, FrameCodec};
use shard_ipc::core::packet::{Packet, Value};
use tokio_util::codec::{Decoder, Encoder};

fn sample_packet(size: usize) -> Packet {
    Packet::new("dm-message")
        .with_id("c42")
        .with("user_id", 123_456_789u64)
        .with("content", "x".repeat(size))
        .with("flags", Value::set([1i64, 2, 3]))
}

#[allow(clippy::unwrap_used)]
fn bench_frame_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode_decode");
    let content_sizes = [16usize, 512, 4096, 32_768, 60_000];

    for &size in &content_sizes {
        let packet = sample_packet(size);
        let frame = codec::encode(&packet).unwrap();
        group.throughput(Throughput::Bytes(frame.len() as u64));

        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || BytesMut::with_capacity(frame.len()),
                |mut buf| {
                    let mut codec = FrameCodec;
                    codec.encode(&packet, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("decode_{size}b"), |b| {
            b.iter_batched(
                || frame.clone(),
                |mut buf| {
                    let mut codec = FrameCodec;
                    let decoded = codec.decode(&mut buf).unwrap();
                    assert!(decoded.is_some());
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_nested_broadcast(c: &mut Criterion) {
    let inner = Packet::new("cooldown-reset").with("user_id", 42i64);
    let outer = Packet::new("broadcast-request")
        .with_id("c7")
        .with("packet", Value::from(inner));
    let frame = codec::encode(&outer).unwrap();

    c.bench_function("broadcast_request_roundtrip", |b| {
        b.iter(|| {
            let bytes = codec::encode(&outer).unwrap();
            let decoded = codec::decode(&bytes[4..]).unwrap();
            assert_eq!(decoded.packet_type, "broadcast-request");
        })
    });

    c.bench_function("broadcast_request_decode", |b| {
        b.iter(|| codec::decode(&frame[4..]).unwrap())
    });
}

criterion_group!(benches, bench_frame_encode_decode, bench_nested_broadcast);
criterion_main!(benches);
