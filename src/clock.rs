// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Clock offset estimation from sync exchanges.
//!
//! Each request/reply exchange yields a [`SyncSample`] with four timestamps.
//! The sample with the smallest round trip across the whole session gives the
//! least-biased offset estimate (round trip is a reasonable proxy for path
//! symmetry), so [`ClockState`] is a strict minimum-selection filter: it
//! retains the minimum-round-trip sample's offset and never averages. This is
//! the same principle used by simple NTP-style clients.

use std::time::Instant;

/// One clock-offset observation from a sync exchange.
///
/// Timestamps are nanoseconds: `t0`/`t3` on the local probe clock, `t1`/`t2`
/// on the server clock. When the server reports a single timestamp, `t2`
/// equals `t1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncSample {
    /// Local send time.
    pub t0: i64,
    /// Remote receive time, as reported by the server.
    pub t1: i64,
    /// Remote send time, as reported by the server.
    pub t2: i64,
    /// Local receive time.
    pub t3: i64,
}

impl SyncSample {
    /// Build a sample from a server reply carrying a single timestamp.
    pub fn single(t0: i64, server_time_ns: i64, t3: i64) -> Self {
        SyncSample {
            t0,
            t1: server_time_ns,
            t2: server_time_ns,
            t3,
        }
    }

    /// Local-observed elapsed time for the exchange, corrected for the
    /// server's residence time: `(t3 - t0) - (t2 - t1)`.
    pub fn round_trip_ns(&self) -> i64 {
        (self.t3 - self.t0) - (self.t2 - self.t1)
    }

    /// Estimated clock offset (server minus local):
    /// `((t1 - t0) + (t2 - t3)) / 2`.
    pub fn offset_ns(&self) -> i64 {
        ((self.t1 - self.t0) + (self.t2 - self.t3)) / 2
    }
}

/// The session-scoped clock offset estimate.
///
/// Updated monotonically: a new sample replaces the estimate only when its
/// round trip is strictly smaller than the best seen so far, so the estimate
/// never regresses to a worse sample. Every latency computation in the
/// session reads the offset valid at that moment; already-reported samples
/// are never recomputed.
#[derive(Clone, Copy, Debug)]
pub struct ClockState {
    offset_ns: i64,
    best_round_trip_ns: i64,
}

impl ClockState {
    /// A fresh estimate: zero offset, no round trip seen.
    pub fn new() -> Self {
        ClockState {
            offset_ns: 0,
            best_round_trip_ns: i64::MAX,
        }
    }

    /// Fold one sync sample into the estimate.
    ///
    /// Returns `true` if the sample improved the estimate.
    pub fn update(&mut self, sample: &SyncSample) -> bool {
        let round_trip = sample.round_trip_ns();
        if round_trip < self.best_round_trip_ns {
            self.best_round_trip_ns = round_trip;
            self.offset_ns = sample.offset_ns();
            true
        } else {
            false
        }
    }

    /// Current offset estimate in nanoseconds (server clock minus local clock).
    pub fn offset_ns(&self) -> i64 {
        self.offset_ns
    }

    /// Smallest round trip seen so far, or `i64::MAX` before any sample.
    pub fn best_round_trip_ns(&self) -> i64 {
        self.best_round_trip_ns
    }

    /// Whether at least one sample has been folded in.
    pub fn has_estimate(&self) -> bool {
        self.best_round_trip_ns != i64::MAX
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic nanosecond time source for one probe session.
///
/// The epoch is the moment of construction. The epoch is arbitrary: the
/// estimated offset absorbs whatever epoch the local and server clocks use,
/// so only differences of readings matter.
#[derive(Clone, Copy, Debug)]
pub struct ProbeClock {
    epoch: Instant,
}

impl ProbeClock {
    /// Anchor a new clock at the current instant.
    pub fn new() -> Self {
        ProbeClock {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the epoch.
    pub fn now_ns(&self) -> i64 {
        self.epoch.elapsed().as_nanos() as i64
    }
}

impl Default for ProbeClock {
    fn default() -> Self {
        Self::new()
    }
}
