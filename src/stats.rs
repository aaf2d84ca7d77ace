// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Running latency statistics for one probe session.
//!
//! Accumulates every sample the session produces: measured latencies for
//! packets that arrived, and synthesized penalty samples (at the ceiling) for
//! packets inferred lost from sequence gaps. Invariant: `sample_count` equals
//! the number of sequence numbers seen or skipped, moving in lock-step with
//! `expected_next` — a reordered late arrival replaces the penalty that was
//! synthesized for its sequence number instead of adding a new sample.

/// Maximum latency value reportable, in milliseconds.
///
/// Measured latencies are clamped to this ceiling, and a clamped packet is
/// also counted as lost: a very late packet is operationally
/// indistinguishable from a lost one for the consumer. Penalty samples for
/// sequence gaps are synthesized at exactly this value.
pub const LATENCY_CEILING_MS: f64 = 100.0;

/// Running statistics over one measurement stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeStats {
    /// Samples accumulated: real packets plus synthesized penalties.
    pub sample_count: u64,
    /// Sum of all sample values in milliseconds (for the average).
    pub sum_ms: f64,
    /// Smallest sample seen, or `f64::INFINITY` before any sample.
    pub min_ms: f64,
    /// Largest sample seen.
    pub max_ms: f64,
    /// Packets counted as lost: gap penalties plus over-ceiling arrivals.
    pub lost: u64,
    /// Packets that arrived below the expected sequence number.
    pub out_of_order: u64,
    /// Mirror of the tracker's next expected sequence number.
    pub expected_next: u32,
    // Gap penalties not yet retracted by a late arrival. Over-ceiling
    // arrivals count as lost but never open a penalty.
    open_penalties: u64,
}

impl ProbeStats {
    /// Empty statistics.
    pub fn new() -> Self {
        ProbeStats {
            sample_count: 0,
            sum_ms: 0.0,
            min_ms: f64::INFINITY,
            max_ms: 0.0,
            lost: 0,
            out_of_order: 0,
            expected_next: 0,
            open_penalties: 0,
        }
    }

    /// Mean sample value in milliseconds, or 0 before any sample.
    pub fn avg_ms(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.sum_ms / self.sample_count as f64
        }
    }

    /// Clamp a raw latency to `[0, LATENCY_CEILING_MS]`.
    fn clamp(latency_ms: f64) -> f64 {
        latency_ms.clamp(0.0, LATENCY_CEILING_MS)
    }

    /// Record the measured latency of an in-order packet (including the
    /// packet that closes a gap).
    ///
    /// Values above the ceiling are clamped and additionally counted as
    /// lost. Returns the value actually recorded.
    pub fn record(&mut self, latency_ms: f64) -> f64 {
        let value = Self::clamp(latency_ms);
        if latency_ms > LATENCY_CEILING_MS {
            self.lost += 1;
        }
        self.fold(value);
        value
    }

    /// Record one penalty sample for a sequence number inferred lost.
    pub fn record_penalty(&mut self) {
        self.lost += 1;
        self.open_penalties += 1;
        self.fold(LATENCY_CEILING_MS);
    }

    /// Record a reordered late arrival.
    ///
    /// A sequence below the expected value was already penalized when its gap
    /// was detected, so its real latency replaces that penalty: the sum is
    /// adjusted by the difference and the loss count drops by one, keeping
    /// `sample_count` in lock-step with `expected_next`. A late packet that
    /// is itself over the ceiling leaves the penalty standing, and a
    /// duplicate with no outstanding penalty changes nothing beyond the
    /// reorder count. Losses from over-ceiling arrivals are not penalties
    /// and are never retracted. Returns the value recorded.
    pub fn record_reordered(&mut self, latency_ms: f64) -> f64 {
        let value = Self::clamp(latency_ms);
        self.out_of_order += 1;
        if self.open_penalties > 0 && latency_ms <= LATENCY_CEILING_MS {
            self.open_penalties -= 1;
            self.lost -= 1;
            self.sum_ms += value - LATENCY_CEILING_MS;
            if value < self.min_ms {
                self.min_ms = value;
            }
        }
        value
    }

    fn fold(&mut self, value: f64) {
        self.sample_count += 1;
        self.sum_ms += value;
        if value < self.min_ms {
            self.min_ms = value;
        }
        if value > self.max_ms {
            self.max_ms = value;
        }
    }
}

impl Default for ProbeStats {
    fn default() -> Self {
        Self::new()
    }
}
