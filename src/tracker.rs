// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Sequence tracking for the incoming data stream.
//!
//! The server assigns sequence numbers monotonically starting at 0. The
//! tracker classifies each arrival relative to the next expected sequence:
//! an exact match is in order, a jump forward reveals a gap (every skipped
//! number is a lost packet), and anything below the expected value is a
//! reordered late arrival. The expected sequence never rewinds.

/// Classification of one arriving sequence number.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Arrival {
    /// The sequence matched the expected value.
    InOrder,
    /// The sequence jumped forward; `lost` numbers in between never arrived.
    Gap {
        /// How many sequence numbers were skipped.
        lost: u32,
    },
    /// The sequence is below the expected value: a late, reordered packet.
    Reordered,
}

/// Tracks the next expected sequence number of a data stream.
#[derive(Clone, Copy, Debug)]
pub struct SequenceTracker {
    expected_next: u32,
}

impl SequenceTracker {
    /// A fresh tracker. Streams contractually start at sequence 0.
    pub fn new() -> Self {
        SequenceTracker { expected_next: 0 }
    }

    /// The sequence number the next in-order packet should carry.
    pub fn expected_next(&self) -> u32 {
        self.expected_next
    }

    /// Observe one arriving sequence number and classify it.
    ///
    /// For [`Arrival::Gap`] the tracker treats the arrival itself as in
    /// order after the gap, so `expected_next` becomes `seq + 1` (saturating
    /// at `u32::MAX`). For [`Arrival::Reordered`] the expected value is left
    /// untouched.
    pub fn observe(&mut self, seq: u32) -> Arrival {
        if seq == self.expected_next {
            self.expected_next = self.expected_next.saturating_add(1);
            Arrival::InOrder
        } else if seq > self.expected_next {
            let lost = seq - self.expected_next;
            self.expected_next = seq.saturating_add(1);
            Arrival::Gap { lost }
        } else {
            Arrival::Reordered
        }
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_stream() {
        let mut t = SequenceTracker::new();
        for seq in 0..10 {
            assert_eq!(t.observe(seq), Arrival::InOrder);
            assert_eq!(t.expected_next(), seq + 1);
        }
    }

    #[test]
    fn test_gap_counts_every_skipped_sequence() {
        let mut t = SequenceTracker::new();
        assert_eq!(t.observe(0), Arrival::InOrder);
        // 1..=4 never arrive.
        assert_eq!(t.observe(5), Arrival::Gap { lost: 4 });
        assert_eq!(t.expected_next(), 6);
    }

    #[test]
    fn test_gap_at_stream_start() {
        // The server starts at 0; a first arrival of 3 means 0, 1, 2 were lost.
        let mut t = SequenceTracker::new();
        assert_eq!(t.observe(3), Arrival::Gap { lost: 3 });
        assert_eq!(t.expected_next(), 4);
    }

    #[test]
    fn test_reordered_does_not_rewind() {
        let mut t = SequenceTracker::new();
        t.observe(0);
        t.observe(2); // gap: 1 lost
        assert_eq!(t.observe(1), Arrival::Reordered);
        assert_eq!(t.expected_next(), 3);
        assert_eq!(t.observe(3), Arrival::InOrder);
    }

    #[test]
    fn test_duplicate_is_reordered() {
        let mut t = SequenceTracker::new();
        t.observe(0);
        assert_eq!(t.observe(0), Arrival::Reordered);
        assert_eq!(t.expected_next(), 1);
    }

    #[test]
    fn test_max_sequence_saturates() {
        let mut t = SequenceTracker::new();
        assert_eq!(t.observe(u32::MAX), Arrival::Gap { lost: u32::MAX });
        assert_eq!(t.expected_next(), u32::MAX);
        // Repeats at the saturation point stay at the high-water mark.
        assert_eq!(t.observe(u32::MAX), Arrival::InOrder);
        assert_eq!(t.expected_next(), u32::MAX);
        assert_eq!(t.observe(0), Arrival::Reordered);
    }

    #[test]
    fn test_gap_then_late_arrival_sequence() {
        // 0, 2, 1, 3: the gap fill at 2 advances past 1, whose late arrival
        // is reordered and does not rewind.
        let mut t = SequenceTracker::new();
        assert_eq!(t.observe(0), Arrival::InOrder);
        assert_eq!(t.observe(2), Arrival::Gap { lost: 1 });
        assert_eq!(t.observe(1), Arrival::Reordered);
        assert_eq!(t.observe(3), Arrival::InOrder);
        assert_eq!(t.expected_next(), 4);
    }
}
