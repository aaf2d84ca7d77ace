// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/*!
UDP latency probe engine: one-way latency, packet loss, reordering and clock
offset measurement against a remote timing server.

Latency is computed from an estimated clock offset (minimum-round-trip
selection over sync exchanges, the same principle simple NTP-style clients
use) rather than naive RTT/2 halving, so results remain meaningful over
asymmetric paths and under clock drift.

# Example

```no_run
# async fn example() -> Result<(), lagprobe::ProbeError> {
let session = lagprobe::ProbeSession::builder()
    .server("192.0.2.10:9000".parse().unwrap())
    .packet_count(500)
    .tick_interval_ms(20)
    .build()
    .await?;

let (handle, mut progress) = session.start();
tokio::spawn(async move {
    while let Some(update) = progress.recv().await {
        println!(
            "seq={} avg={:.2}ms lost={}",
            update.sequence,
            update.stats.avg_ms(),
            update.stats.lost
        );
    }
});
let report = handle.join().await?;
println!("{:?}", report.stats);
# Ok(())
# }
```

The engine is deliberately UI-free: it emits a stream of progress snapshots
and a single terminal report, and a rendering layer (out of scope here) is
just a subscriber.
*/

#![warn(missing_docs)]

/// Wire codec for the four datagram shapes exchanged with the timing server.
pub mod protocol;

/// Clock offset estimation via minimum-round-trip selection, and the
/// session-local monotonic time source.
pub mod clock;

/// Sequence classification: in-order, gap (loss), reordered.
pub mod tracker;

/// Running latency statistics, including synthesized penalty samples.
pub mod stats;

/// The probe session state machine and its public handle.
pub mod session;

/// Error types for the probe engine.
pub mod error;

pub use error::{ConfigError, ProbeError};
pub use session::{
    DEFAULT_RECV_TIMEOUT, INIT_SYNC_COUNT, ProbeConfig, ProbeHandle, ProbeOutcome, ProbeProgress,
    ProbeReport, ProbeSession, ProbeSessionBuilder, SYNC_INTERVAL,
};
pub use stats::{LATENCY_CEILING_MS, ProbeStats};
