//! Property-based tests using proptest
//!
//! These tests validate wire-format invariants across a wide range of randomly
//! generated packets and byte streams.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use proptest::prelude::*;
use shard_ipc::config::{LENGTH_PREFIX_LEN, MAX_PAYLOAD_SIZE};
use shard_ipc::core::codec::{decode, encode, frame_payload, FrameCodec};
use shard_ipc::core::packet::{Packet, Value};
use shard_ipc::error::ProtocolError;
use tokio_util::codec::Decoder;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("f_[a-z]{1,8}", inner, 0..6).prop_map(Value::Object),
            prop::collection::vec(scalar(), 0..6).prop_map(Value::set),
        ]
    })
}

fn packet() -> impl Strategy<Value = Packet> {
    (
        "[a-z]{1,8}(-[a-z]{1,8})?",
        prop::option::of("c[0-9]{1,6}"),
        prop::option::of("[a-zA-Z0-9]{1,16}"),
        prop::collection::btree_map("f_[a-z]{1,8}", value(), 0..8),
    )
        .prop_map(|(packet_type, id, auth, fields)| Packet {
            packet_type,
            id,
            auth,
            fields,
        })
}

// Property: any packet survives encode then decode
proptest! {
    #[test]
    fn prop_packet_roundtrip(packet in packet()) {
        let frame = encode(&packet).expect("generated packets fit in a frame");
        let decoded = decode(&frame[LENGTH_PREFIX_LEN..]).expect("Decoding should not fail");

        prop_assert_eq!(decoded, packet);
    }
}

// Property: the length prefix always matches the payload length
proptest! {
    #[test]
    fn prop_frame_shape(len in 0usize..=MAX_PAYLOAD_SIZE) {
        let payload = vec![b'x'; len];
        let frame = frame_payload(&payload).expect("payload within limit");

        prop_assert_eq!(frame.len(), LENGTH_PREFIX_LEN + len);
        prop_assert_eq!(&frame[..LENGTH_PREFIX_LEN], &(len as u32).to_be_bytes()[..]);
    }
}

// Property: payloads past the limit are always refused
proptest! {
    #[test]
    fn prop_oversized_payload_rejected(extra in 1usize..4096) {
        let payload = vec![b'x'; MAX_PAYLOAD_SIZE + extra];
        let result = frame_payload(&payload);

        prop_assert!(matches!(result, Err(ProtocolError::OversizedPacket(_))));
    }
}

// Property: a frame split at any point decodes once all bytes have arrived
proptest! {
    #[test]
    fn prop_split_frames_reassemble(packet in packet(), split in any::<prop::sample::Index>()) {
        let frame = encode(&packet).unwrap();
        let at = split.index(frame.len());

        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&frame[..at]);
        prop_assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[at..]);
        let decoded = codec.decode(&mut buf).unwrap();
        prop_assert_eq!(decoded, Some(packet));
        prop_assert!(buf.is_empty());
    }
}

// Property: sets compare equal regardless of element order
proptest! {
    #[test]
    fn prop_set_order_irrelevant(items in prop::collection::vec(any::<i64>(), 0..16)) {
        let forward = Value::set(items.clone());
        let backward = Value::set(items.into_iter().rev());

        prop_assert_eq!(forward, backward);
    }
}

// Property: arbitrary bytes never panic the decoder
proptest! {
    #[test]
    fn prop_decoder_never_panics(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&data[..]);
        while let Ok(Some(_)) = codec.decode(&mut buf) {}

        let _ = decode(&data);
    }
}
