#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use shard_ipc::core::codec::{decode, FrameCodec};
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Raw payloads: malformed JSON, wrong shapes, bogus set encodings
    let _ = decode(data);

    // Framed stream: arbitrary prefixes, truncated frames, trailing garbage
    let mut codec = FrameCodec;
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
    let _ = codec.decode_eof(&mut buf);
});
