/// Per-instrument sequence gap detection
///
/// Each instrument carries its own sequence, starting at 1. The first number
/// seen for an instrument is taken as the baseline, so a receiver joining a
/// running feed does not report the ticks it missed before joining.
/// Only the most recent gap ranges are kept; the counters cover all of them.

use std::collections::{HashMap, VecDeque};

const GAP_HISTORY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First message seen for this instrument
    First,
    InOrder,
    /// Missing range `start..=end`
    Gap { start: u32, end: u32 },
    /// At or below the last sequence seen (duplicate or reordered)
    Stale { last: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub instrument_id: u32,
    pub start: u32,
    pub end: u32,
}

impl Gap {
    pub fn len(&self) -> u32 {
        self.end.wrapping_sub(self.start).wrapping_add(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GapDetector {
    last_sequence: HashMap<u32, u32>,
    gaps: VecDeque<Gap>,
    gap_ranges: u64,
    missing: u64,
    stale: u64,
}

impl GapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, instrument_id: u32, seq: u32) -> SequenceCheck {
        let Some(last) = self.last_sequence.get_mut(&instrument_id) else {
            self.last_sequence.insert(instrument_id, seq);
            return SequenceCheck::First;
        };

        let expected = last.wrapping_add(1);
        if seq == expected {
            *last = seq;
            return SequenceCheck::InOrder;
        }

        // distance forward from the last seen number, modulo 2^32
        let ahead = seq.wrapping_sub(*last);
        if ahead == 0 || ahead > u32::MAX / 2 {
            self.stale += 1;
            return SequenceCheck::Stale { last: *last };
        }

        let gap = Gap {
            instrument_id,
            start: expected,
            end: seq.wrapping_sub(1),
        };
        *last = seq;
        self.missing += gap.len() as u64;
        self.gap_ranges += 1;
        if self.gaps.len() >= GAP_HISTORY {
            self.gaps.pop_front();
        }
        self.gaps.push_back(gap);
        SequenceCheck::Gap {
            start: gap.start,
            end: gap.end,
        }
    }

    /// Most recent gap ranges, oldest first
    pub fn gaps(&self) -> &VecDeque<Gap> {
        &self.gaps
    }

    /// Gap ranges detected since start, including ones no longer retained
    pub fn gap_ranges(&self) -> u64 {
        self.gap_ranges
    }

    /// Total number of missing sequence numbers across instruments
    pub fn missing(&self) -> u64 {
        self.missing
    }

    pub fn stale(&self) -> u64 {
        self.stale
    }

    pub fn instruments_seen(&self) -> usize {
        self.last_sequence.len()
    }
}
