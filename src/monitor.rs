/// Diagnostic consumer for a received feed
///
/// Decodes each datagram, measures one-way latency against the sender
/// timestamp, checks per-instrument sequences and emits a rate estimate
/// every `report_every` messages. Undersized or malformed datagrams are
/// counted and skipped.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::codec::{DecodeError, Decoder};
use crate::gap_detector::{GapDetector, SequenceCheck};
use crate::protocol::MarketMessage;
use crate::stats::FeedStats;

pub const DEFAULT_REPORT_EVERY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub message: MarketMessage,
    /// Receive time minus sender timestamp; negative under clock skew
    pub latency_us: i64,
    pub sequence: SequenceCheck,
    /// Present on every `report_every`-th datagram
    pub rate: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FeedMonitor {
    label: String,
    report_every: u64,
    stats: FeedStats,
    gaps: GapDetector,
}

impl FeedMonitor {
    pub fn new(label: &str) -> Self {
        Self::with_report_interval(label, DEFAULT_REPORT_EVERY)
    }

    pub fn with_report_interval(label: &str, report_every: u64) -> Self {
        FeedMonitor {
            label: label.to_string(),
            report_every: report_every.max(1),
            stats: FeedStats::new(),
            gaps: GapDetector::new(),
        }
    }

    pub fn observe(&mut self, payload: &[u8], now_us: u64) -> Result<Observation, DecodeError> {
        self.observe_at(payload, now_us, Instant::now())
    }

    /// Process one datagram received at wall-clock `now_us` / monotonic `at`
    pub fn observe_at(&mut self, payload: &[u8], now_us: u64, at: Instant) -> Result<Observation, DecodeError> {
        self.stats.record_message_at(payload.len(), at);
        let count = self.stats.total_messages();
        let rate = if count % self.report_every == 0 {
            let rate = self.stats.messages_per_sec_at(at);
            info!(feed = %self.label, messages = count, "message rate: {:.0} msgs/sec", rate);
            Some(rate)
        } else {
            None
        };

        let message = match Decoder::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                self.stats.record_decode_failure();
                warn!(feed = %self.label, bytes = payload.len(), "skipping datagram: {}", e);
                return Err(e);
            }
        };

        let latency_us = (now_us as i128 - message.timestamp_us as i128)
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        self.stats.record_latency(latency_us);

        let sequence = self.gaps.process(message.instrument_id, message.sequence);
        match sequence {
            SequenceCheck::Gap { start, end } => warn!(
                feed = %self.label,
                instrument_id = message.instrument_id,
                "sequence gap {}..={}",
                start,
                end
            ),
            SequenceCheck::Stale { last } => warn!(
                feed = %self.label,
                instrument_id = message.instrument_id,
                sequence = message.sequence,
                last,
                "stale sequence"
            ),
            SequenceCheck::First | SequenceCheck::InOrder => {}
        }

        debug!(
            feed = %self.label,
            timestamp = message.timestamp_us,
            instrument_id = message.instrument_id,
            price = message.price,
            volume = message.volume,
            side = ?message.side,
            sequence = message.sequence,
            latency_us,
            "tick"
        );

        Ok(Observation {
            message,
            latency_us,
            sequence,
            rate,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    pub fn gaps(&self) -> &GapDetector {
        &self.gaps
    }

    pub fn log_summary(&self) {
        self.stats.log_summary(&self.label);
        info!(
            feed = %self.label,
            instruments = self.gaps.instruments_seen(),
            missing = self.gaps.missing(),
            gap_ranges = self.gaps.gap_ranges(),
            stale = self.gaps.stale(),
            "sequence summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::protocol::Side;

    fn tick(id: u32, seq: u32, ts: u64) -> [u8; 33] {
        encode(&MarketMessage {
            timestamp_us: ts,
            instrument_id: id,
            price: 50.0,
            volume: 100,
            side: Side::Buy,
            sequence: seq,
        })
    }

    #[test]
    fn test_latency_from_timestamp() {
        let mut monitor = FeedMonitor::new("t");
        let obs = monitor.observe(&tick(1, 1, 1_000), 1_250).unwrap();
        assert_eq!(obs.latency_us, 250);
        assert_eq!(obs.sequence, SequenceCheck::First);

        let obs = monitor.observe(&tick(1, 2, 2_000), 1_900).unwrap();
        assert_eq!(obs.latency_us, -100);
    }

    #[test]
    fn test_short_datagram_skipped() {
        let mut monitor = FeedMonitor::new("t");
        let err = monitor.observe(&[0u8; 10], 0).unwrap_err();
        assert_eq!(err, DecodeError::BufferTooSmall { need: 33, have: 10 });
        assert_eq!(monitor.stats().decode_failures(), 1);

        assert!(monitor.observe(&tick(1, 1, 0), 0).is_ok());
    }

    #[test]
    fn test_rate_reported_every_interval() {
        let mut monitor = FeedMonitor::with_report_interval("t", 3);
        let mut reports = 0;
        for seq in 1..=9 {
            if monitor.observe(&tick(1, seq, 0), 0).unwrap().rate.is_some() {
                reports += 1;
            }
        }
        assert_eq!(reports, 3);
    }

    #[test]
    fn test_far_future_timestamps_are_not_fatal() {
        let mut monitor = FeedMonitor::new("t");
        for seq in 1..=2 {
            let obs = monitor.observe(&tick(1, seq, u64::MAX), 1_700_000_000_000_000).unwrap();
            assert_eq!(obs.latency_us, i64::MIN);
        }

        let latency = monitor.stats().latency_stats().unwrap();
        assert_eq!(latency.min_us, i64::MIN);
        monitor.log_summary();
    }

    #[test]
    fn test_gap_surfaces_in_observation() {
        let mut monitor = FeedMonitor::new("t");
        monitor.observe(&tick(3, 1, 0), 0).unwrap();
        let obs = monitor.observe(&tick(3, 4, 0), 0).unwrap();
        assert_eq!(obs.sequence, SequenceCheck::Gap { start: 2, end: 3 });
        assert_eq!(monitor.gaps().missing(), 2);
    }
}
