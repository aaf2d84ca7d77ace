// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests: an in-process scriptable timing
//! server speaking the probe wire protocol on a loopback socket.

// Integration test helpers are `pub` so each `tests/*.rs` file can import them
// via `mod common`, but clippy flags them as unreachable outside the crate.
#![allow(unreachable_pub)]
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

use lagprobe::protocol::{
    ConstPackedSizeBytes, DataHeader, SyncProbe, SyncReply, WriteBytes,
};

/// Behavior script for one test server instance.
#[derive(Clone, Debug)]
pub struct ServerScript {
    /// Data packet sequence numbers to stream, in this exact order.
    pub sequences: Vec<u32>,
    /// Spacing between consecutive data packets.
    pub tick: Duration,
    /// Added to every server timestamp, simulating a skewed server clock.
    pub clock_skew_ns: i64,
    /// Ignore sync probes entirely (for sync-timeout tests).
    pub mute_sync: bool,
    /// Stop answering sync probes after this many replies (for testing
    /// resync loss mid-stream).
    pub max_sync_replies: usize,
    /// Counts every sync probe received, shared with the test body.
    pub sync_probes_seen: Option<Arc<AtomicUsize>>,
    /// Payload bytes appended to each data header.
    pub payload_size: usize,
}

impl Default for ServerScript {
    fn default() -> Self {
        ServerScript {
            sequences: Vec::new(),
            tick: Duration::from_millis(5),
            clock_skew_ns: 0,
            mute_sync: false,
            max_sync_replies: usize::MAX,
            sync_probes_seen: None,
            payload_size: 0,
        }
    }
}

impl ServerScript {
    /// A clean in-order stream of `count` packets.
    pub fn in_order(count: u32) -> Self {
        ServerScript {
            sequences: (0..count).collect(),
            ..ServerScript::default()
        }
    }
}

/// Spawn a scripted timing server on an ephemeral loopback port.
///
/// The server answers 8-byte sync probes with 16-byte sync replies (unless
/// muted) and answers the first measurement request by streaming the
/// scripted data packets on a separate task, so sync probes keep being
/// served while the stream is in flight — exactly what the periodic resync
/// path needs.
pub async fn spawn_test_server(script: ServerScript) -> SocketAddr {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap();
    let epoch = Instant::now();

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        let mut sync_count = 0usize;
        loop {
            let (n, peer) = match socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(_) => return,
            };
            if n == SyncProbe::PACKED_SIZE_BYTES {
                sync_count += 1;
                if let Some(counter) = &script.sync_probes_seen {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                if script.mute_sync || sync_count > script.max_sync_replies {
                    continue;
                }
                let reply = SyncReply {
                    server_time_ns: server_now_ns(epoch, script.clock_skew_ns),
                    server_id: 1,
                    tick_ms: script.tick.as_millis() as u32,
                };
                let mut reply_buf = [0u8; SyncReply::PACKED_SIZE_BYTES];
                (&mut reply_buf[..]).write_bytes(reply).unwrap();
                let _ = socket.send_to(&reply_buf, peer).await;
            } else if n >= 20 {
                // Measurement request: stream the script on its own task so
                // resync probes are still answered in the meantime.
                let socket = Arc::clone(&socket);
                let script = script.clone();
                tokio::spawn(async move {
                    for &seq in &script.sequences {
                        let header = DataHeader {
                            sequence: seq,
                            timestamp_ns: server_now_ns(epoch, script.clock_skew_ns),
                            server_id: 1,
                            tick_ms: script.tick.as_millis() as u32,
                        };
                        let mut pkt =
                            vec![0u8; DataHeader::PACKED_SIZE_BYTES + script.payload_size];
                        (&mut pkt[..]).write_bytes(header).unwrap();
                        let _ = socket.send_to(&pkt, peer).await;
                        if !script.tick.is_zero() {
                            tokio::time::sleep(script.tick).await;
                        }
                    }
                });
            }
            // Anything else is debris; real servers ignore it too.
        }
    });

    addr
}

fn server_now_ns(epoch: Instant, skew_ns: i64) -> i64 {
    epoch.elapsed().as_nanos() as i64 + skew_ns
}
