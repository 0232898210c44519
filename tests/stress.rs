#![allow(clippy::unwrap_used)]

use bytes::BytesMut;
use shard_ipc::core::codec::FrameCodec;
use shard_ipc::core::packet::{Packet, Value};
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn stress_packet_encode_decode_large_series() {
    // Heavy burst of packets through one buffer, the way a busy connection sees them
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();

    for size in [0usize, 1, 64, 512, 4096, 32_768, 65_000] {
        let packet = Packet::new("dm-message")
            .with_id("c1")
            .with("content", "m".repeat(size))
            .with("tags", Value::set(["a", "b", "c"]));

        for _ in 0..1_000 {
            codec.encode(&packet, &mut buf).unwrap();
            let decoded = codec.decode(&mut buf).unwrap();
            assert_eq!(decoded.as_ref(), Some(&packet));
            assert!(buf.is_empty());
        }
    }
}

#[test]
fn stress_many_frames_in_one_buffer() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();

    for i in 0..10_000u64 {
        let packet = Packet::new("command-ran").with("n", i);
        codec.encode(&packet, &mut buf).unwrap();
    }

    let mut count = 0u64;
    while let Some(packet) = codec.decode(&mut buf).unwrap() {
        assert_eq!(packet.get("n").and_then(|v| v.as_u64()), Some(count));
        count += 1;
    }
    assert_eq!(count, 10_000);
}
