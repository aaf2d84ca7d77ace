// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! The probe session state machine.
//!
//! A session moves through `InitialSync → Streaming → Finished`, with
//! cooperative cancellation reachable from both active states and any fatal
//! transport condition ending the session early. One session occupies one
//! spawned task for its entire lifetime and exclusively owns its socket; all
//! receives are bounded by the configured timeout.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> Result<(), lagprobe::ProbeError> {
//! let session = lagprobe::ProbeSession::builder()
//!     .server("192.0.2.10:9000".parse().unwrap())
//!     .packet_count(200)
//!     .tick_interval_ms(20)
//!     .build()
//!     .await?;
//!
//! let (handle, mut progress) = session.start();
//! while let Some(update) = progress.recv().await {
//!     println!("seq {} avg {:.2} ms", update.sequence, update.stats.avg_ms());
//! }
//! let report = handle.join().await?;
//! println!("{:?}: {} samples", report.outcome, report.stats.sample_count);
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::clock::{ClockState, ProbeClock, SyncSample};
use crate::error::{ConfigError, ProbeError};
use crate::protocol::{
    ConstPackedSizeBytes, Datagram, ProbeRequest, SyncProbe, WriteBytes, classify,
};
use crate::stats::ProbeStats;
use crate::tracker::{Arrival, SequenceTracker};

/// Number of sync probes in the initial synchronization burst.
///
/// The best (minimum round trip) exchange of the burst seeds the offset
/// estimate; individual losses within the burst are tolerated as long as at
/// least one exchange succeeds.
pub const INIT_SYNC_COUNT: u32 = 4;

/// Default interval between periodic resynchronization probes.
pub const SYNC_INTERVAL: Duration = Duration::from_millis(5000);

/// Default bound on any single blocking receive.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Receive buffer size: data header plus the largest payload we expect.
const RECV_BUF_LEN: usize = 2048;

/// Immutable inputs for one probe session.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// Timing server address and port.
    pub server: SocketAddr,
    /// Number of data packets the server should stream (≥ 1).
    pub packet_count: u32,
    /// Requested spacing between data packets in milliseconds (≥ 1).
    pub tick_interval_ms: u32,
    /// Payload bytes appended to every data packet (may be 0).
    pub payload_size: u32,
    /// Opaque client identifier carried in the request.
    pub client_id: u32,
    /// Bound on any single receive. A property of the transport, not the
    /// protocol; tests set it low.
    pub recv_timeout: Duration,
    /// Interval between periodic resync probes.
    pub sync_interval: Duration,
}

/// Builder for configuring and creating a [`ProbeSession`].
#[derive(Clone, Debug)]
pub struct ProbeSessionBuilder {
    server: Option<SocketAddr>,
    packet_count: u32,
    tick_interval_ms: u32,
    payload_size: u32,
    client_id: u32,
    recv_timeout: Duration,
    sync_interval: Duration,
}

impl ProbeSessionBuilder {
    fn new() -> Self {
        ProbeSessionBuilder {
            server: None,
            packet_count: 100,
            tick_interval_ms: 20,
            payload_size: 0,
            client_id: 0,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            sync_interval: SYNC_INTERVAL,
        }
    }

    /// Set the timing server address.
    pub fn server(mut self, addr: SocketAddr) -> Self {
        self.server = Some(addr);
        self
    }

    /// Number of data packets to request (default 100).
    pub fn packet_count(mut self, count: u32) -> Self {
        self.packet_count = count;
        self
    }

    /// Requested tick interval in milliseconds (default 20).
    pub fn tick_interval_ms(mut self, tick: u32) -> Self {
        self.tick_interval_ms = tick;
        self
    }

    /// Payload bytes per data packet (default 0).
    pub fn payload_size(mut self, size: u32) -> Self {
        self.payload_size = size;
        self
    }

    /// Opaque client identifier (default 0).
    pub fn client_id(mut self, id: u32) -> Self {
        self.client_id = id;
        self
    }

    /// Bound on any single receive (default 3 s).
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Interval between periodic resync probes (default 5 s).
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Validate the configuration and bind the session socket.
    pub async fn build(self) -> Result<ProbeSession, ProbeError> {
        let server = self.server.ok_or(ConfigError::NoServer)?;
        if self.packet_count == 0 {
            return Err(ConfigError::ZeroPacketCount.into());
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval.into());
        }

        let socket = UdpSocket::bind(bind_addr_for(&server)).await?;
        // Connecting filters datagrams from other sources at the kernel and
        // lets the rest of the session use send/recv.
        socket.connect(server).await?;

        Ok(ProbeSession {
            config: ProbeConfig {
                server,
                packet_count: self.packet_count,
                tick_interval_ms: self.tick_interval_ms,
                payload_size: self.payload_size,
                client_id: self.client_id,
                recv_timeout: self.recv_timeout,
                sync_interval: self.sync_interval,
            },
            socket,
        })
    }
}

/// Select the appropriate bind address based on the target address family.
fn bind_addr_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

/// How a session ended when it did not fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProbeOutcome {
    /// Every requested sample was accounted for.
    Finished,
    /// Cancellation was requested; the attached statistics are partial.
    Cancelled,
}

/// The terminal result of a session.
#[derive(Clone, Debug)]
pub struct ProbeReport {
    /// How the session ended.
    pub outcome: ProbeOutcome,
    /// Statistics accumulated up to the end of the session.
    pub stats: ProbeStats,
}

/// One progress event, emitted after every accepted or synthesized sample.
#[derive(Clone, Debug)]
pub struct ProbeProgress {
    /// The sequence number this event accounts for.
    pub sequence: u32,
    /// Snapshot of the cumulative statistics.
    pub stats: ProbeStats,
}

/// Handle to a running session: cancellation and completion.
pub struct ProbeHandle {
    cancel: watch::Sender<bool>,
    task: tokio::task::JoinHandle<Result<ProbeReport, ProbeError>>,
}

impl ProbeHandle {
    /// Request cooperative cancellation. Idempotent.
    ///
    /// The worker checks the flag before every blocking receive and between
    /// initial-sync probes, so worst-case cancellation latency equals the
    /// configured receive timeout.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Wait for the session to end. Resolves exactly once.
    pub async fn join(self) -> Result<ProbeReport, ProbeError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ProbeError::Transport(io::Error::other(e))),
        }
    }
}

/// A configured probe session, ready to run.
///
/// Created via [`ProbeSession::builder()`]. Call [`start()`](Self::start) to
/// spawn the worker, or [`run()`](Self::run) to drive the future directly.
pub struct ProbeSession {
    config: ProbeConfig,
    socket: UdpSocket,
}

impl ProbeSession {
    /// Create a builder for configuring the session.
    pub fn builder() -> ProbeSessionBuilder {
        ProbeSessionBuilder::new()
    }

    /// The session's immutable configuration.
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Spawn the session onto the current runtime.
    ///
    /// Returns a handle for cancellation/completion and the progress stream.
    /// Non-blocking from the caller's perspective.
    pub fn start(self) -> (ProbeHandle, mpsc::UnboundedReceiver<ProbeProgress>) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(cancel_rx, progress_tx));
        (
            ProbeHandle {
                cancel: cancel_tx,
                task,
            },
            progress_rx,
        )
    }

    /// Run the session to completion.
    ///
    /// Performs the initial sync burst, sends the measurement request, then
    /// consumes the data stream while interleaving periodic resyncs. Emits
    /// one progress event per accepted or synthesized sample. The socket is
    /// released on every exit path (it is owned by the future).
    pub async fn run(
        self,
        cancel: watch::Receiver<bool>,
        progress: mpsc::UnboundedSender<ProbeProgress>,
    ) -> Result<ProbeReport, ProbeError> {
        let clock = ProbeClock::new();
        let mut clock_state = ClockState::new();
        let mut stats = ProbeStats::new();

        debug!(server = %self.config.server, count = self.config.packet_count, "probe session starting");

        // ── InitialSync ─────────────────────────────────────────────
        for attempt in 0..INIT_SYNC_COUNT {
            if *cancel.borrow() {
                debug!("cancelled during initial sync");
                return Ok(ProbeReport {
                    outcome: ProbeOutcome::Cancelled,
                    stats,
                });
            }
            match self.sync_exchange(&clock).await {
                Ok(sample) => {
                    if clock_state.update(&sample) {
                        debug!(
                            offset_ns = clock_state.offset_ns(),
                            round_trip_ns = clock_state.best_round_trip_ns(),
                            attempt,
                            "clock estimate improved"
                        );
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    debug!(attempt, "sync probe timed out");
                }
                Err(e) => return Err(ProbeError::Transport(e)),
            }
        }
        if !clock_state.has_estimate() {
            warn!("initial synchronization failed: no sync reply received");
            return Err(ProbeError::SyncTimeout);
        }

        // ── Streaming ───────────────────────────────────────────────
        let request = ProbeRequest {
            count: self.config.packet_count,
            send_time_ns: clock.now_ns(),
            client_id: self.config.client_id,
            payload_size: self.config.payload_size,
            tick_interval_ms: self.config.tick_interval_ms,
        };
        let mut req_buf = [0u8; ProbeRequest::PACKED_SIZE_BYTES];
        (&mut req_buf[..]).write_bytes(request)?;
        self.socket.send(&req_buf).await?;
        debug!(count = request.count, "measurement request sent");

        let mut tracker = SequenceTracker::new();
        let mut recv_buf = [0u8; RECV_BUF_LEN];
        // Local send time and expiry of the resync probe in flight, if any.
        // At most one outstanding at a time; timer ticks are suppressed while
        // in flight, and a probe whose reply never arrives is expired so a
        // single lost datagram cannot stop resynchronization for good.
        let mut resync_in_flight: Option<(i64, tokio::time::Instant)> = None;
        let mut next_resync = tokio::time::Instant::now() + self.config.sync_interval;

        while stats.sample_count < u64::from(self.config.packet_count) {
            if *cancel.borrow() {
                debug!(samples = stats.sample_count, "cancelled mid-stream");
                return Ok(ProbeReport {
                    outcome: ProbeOutcome::Cancelled,
                    stats,
                });
            }

            if let Some((_, expiry)) = resync_in_flight {
                if tokio::time::Instant::now() >= expiry {
                    debug!("resync probe went unanswered, re-arming");
                    resync_in_flight = None;
                    next_resync = tokio::time::Instant::now() + self.config.sync_interval;
                }
            }

            if resync_in_flight.is_none() && tokio::time::Instant::now() >= next_resync {
                let t0 = clock.now_ns();
                let mut probe_buf = [0u8; SyncProbe::PACKED_SIZE_BYTES];
                (&mut probe_buf[..]).write_bytes(SyncProbe { send_time_ns: t0 })?;
                self.socket.send(&probe_buf).await?;
                resync_in_flight =
                    Some((t0, tokio::time::Instant::now() + self.config.recv_timeout));
                debug!("resync probe sent");
            }

            let n = match timeout(self.config.recv_timeout, self.socket.recv(&mut recv_buf)).await
            {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(ProbeError::Transport(e)),
                Err(_) => return Err(ProbeError::ReceiveTimeout),
            };
            let now_ns = clock.now_ns();

            match classify(&recv_buf[..n]) {
                Some(Datagram::Sync(reply)) => {
                    // Attributed to the outstanding resync probe; never
                    // counted toward stream completion.
                    if let Some((t0, _)) = resync_in_flight.take() {
                        let sample = SyncSample::single(t0, reply.server_time_ns, now_ns);
                        if clock_state.update(&sample) {
                            debug!(
                                offset_ns = clock_state.offset_ns(),
                                round_trip_ns = clock_state.best_round_trip_ns(),
                                "resync improved clock estimate"
                            );
                        }
                        next_resync = tokio::time::Instant::now() + self.config.sync_interval;
                    } else {
                        debug!("sync reply with no probe outstanding, dropping");
                    }
                }
                Some(Datagram::Data(header)) => {
                    let latency_ms =
                        (now_ns - (header.timestamp_ns - clock_state.offset_ns())) as f64 / 1e6;
                    match tracker.observe(header.sequence) {
                        Arrival::InOrder => {
                            stats.record(latency_ms);
                            stats.expected_next = tracker.expected_next();
                            emit(&progress, header.sequence, &stats);
                        }
                        Arrival::Gap { lost } => {
                            warn!(seq = header.sequence, lost, "sequence gap detected");
                            // A corrupt header can claim an enormous jump;
                            // never synthesize more penalties than the
                            // session has samples left to account for.
                            let budget = u64::from(self.config.packet_count);
                            let first_missing = header.sequence - lost;
                            for missing in first_missing..header.sequence {
                                if stats.sample_count >= budget {
                                    break;
                                }
                                stats.record_penalty();
                                stats.expected_next = missing + 1;
                                emit(&progress, missing, &stats);
                            }
                            stats.record(latency_ms);
                            stats.expected_next = tracker.expected_next();
                            emit(&progress, header.sequence, &stats);
                        }
                        Arrival::Reordered => {
                            debug!(seq = header.sequence, "reordered packet");
                            stats.record_reordered(latency_ms);
                            emit(&progress, header.sequence, &stats);
                        }
                    }
                }
                None => {
                    debug!(len = n, "dropping malformed datagram");
                }
            }
        }

        debug!(
            samples = stats.sample_count,
            lost = stats.lost,
            out_of_order = stats.out_of_order,
            "probe session finished"
        );
        Ok(ProbeReport {
            outcome: ProbeOutcome::Finished,
            stats,
        })
    }

    /// Perform one sync exchange: send a probe, wait for the 16-byte reply.
    ///
    /// Non-sync datagrams arriving while we wait are dropped; the deadline
    /// bounds the whole wait.
    async fn sync_exchange(&self, clock: &ProbeClock) -> io::Result<SyncSample> {
        let t0 = clock.now_ns();
        let mut probe_buf = [0u8; SyncProbe::PACKED_SIZE_BYTES];
        (&mut probe_buf[..]).write_bytes(SyncProbe { send_time_ns: t0 })?;
        self.socket.send(&probe_buf).await?;

        let deadline = tokio::time::Instant::now() + self.config.recv_timeout;
        let mut recv_buf = [0u8; RECV_BUF_LEN];
        loop {
            let n = match tokio::time::timeout_at(deadline, self.socket.recv(&mut recv_buf)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "sync reply timed out",
                    ));
                }
            };
            let t3 = clock.now_ns();
            match classify(&recv_buf[..n]) {
                Some(Datagram::Sync(reply)) => {
                    return Ok(SyncSample::single(t0, reply.server_time_ns, t3));
                }
                Some(Datagram::Data(_)) | None => {
                    debug!(len = n, "ignoring non-sync datagram during sync exchange");
                }
            }
        }
    }
}

/// Deliver one progress snapshot. Send errors are ignored (no receivers).
fn emit(progress: &mpsc::UnboundedSender<ProbeProgress>, sequence: u32, stats: &ProbeStats) {
    let _ = progress.send(ProbeProgress {
        sequence,
        stats: stats.clone(),
    });
}
