#![allow(clippy::unwrap_used, clippy::expect_used)]

use shard_ipc::core::packet::Packet;
use shard_ipc::transport::connection::{Connection, ConnectionSet};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_writers_never_interleave_frames() {
    let (a, b) = tokio::io::duplex(1024);
    let writer = Arc::new(Connection::new(a));
    let reader = Connection::new(b);

    let writers = 16usize;
    let per_writer = 200usize;

    let mut tasks = JoinSet::new();
    for w in 0..writers {
        let writer = writer.clone();
        tasks.spawn(async move {
            for i in 0..per_writer {
                // Frames larger than the pipe buffer force partial writes
                let packet = Packet::new("command-ran")
                    .with("writer", w as u64)
                    .with("seq", i as u64)
                    .with("padding", "p".repeat(1500 + w * 37));
                writer.write_packet(&packet).await.unwrap();
            }
        });
    }

    let mut seen = HashSet::new();
    let mut last_seq = vec![None::<u64>; writers];
    for _ in 0..writers * per_writer {
        let packet = reader.read_packet().await.expect("frame should decode cleanly");
        let w = packet.get("writer").and_then(|v| v.as_u64()).unwrap() as usize;
        let seq = packet.get("seq").and_then(|v| v.as_u64()).unwrap();

        // Each writer's own frames keep their order
        if let Some(prev) = last_seq[w] {
            assert!(seq > prev);
        }
        last_seq[w] = Some(seq);
        assert!(seen.insert((w, seq)));
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    assert_eq!(seen.len(), writers * per_writer);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broadcast_reaches_every_connection() {
    let set = Arc::new(ConnectionSet::new());
    let mut peers = Vec::new();

    for _ in 0..10 {
        let (a, b) = tokio::io::duplex(4096);
        set.insert(Arc::new(Connection::new(a)));
        peers.push(Connection::new(b));
    }

    let delivered = set
        .broadcast(&Packet::new("cooldown-reset").with("user_id", 7))
        .await;
    assert_eq!(delivered, 10);

    for peer in &peers {
        let packet = peer.read_packet().await.unwrap();
        assert!(packet.is_type("cooldown-reset"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broadcast_skips_closed_connections() {
    let set = ConnectionSet::new();

    let (a, _b) = tokio::io::duplex(4096);
    let live = Arc::new(Connection::new(a));
    set.insert(live);

    let (c, _d) = tokio::io::duplex(4096);
    let closed = Arc::new(Connection::new(c));
    closed.close().await;
    set.insert(closed);

    assert_eq!(set.broadcast(&Packet::new("shard-ready")).await, 1);
}
