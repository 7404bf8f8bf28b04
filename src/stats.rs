/// Receiver-side feed statistics
///
/// Counts datagrams and bytes, keeps a sliding window of one-way latencies
/// (sender timestamp to receive time) and derives a message rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

const WINDOW_SIZE: usize = 10000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub min_us: i64,
    pub max_us: i64,
    pub mean_us: f64,
    pub p50_us: i64,
    pub p99_us: i64,
}

#[derive(Debug, Clone)]
pub struct FeedStats {
    start_time: Option<Instant>,
    total_messages: u64,
    total_bytes: u64,
    decode_failures: u64,
    // signed: sender and receiver clocks may disagree
    latencies: VecDeque<i64>,
}

impl FeedStats {
    pub fn new() -> Self {
        FeedStats {
            start_time: None,
            total_messages: 0,
            total_bytes: 0,
            decode_failures: 0,
            latencies: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    /// Record a datagram; the rate clock starts at the first one
    pub fn record_message(&mut self, size: usize) {
        self.record_message_at(size, Instant::now());
    }

    pub fn record_message_at(&mut self, size: usize, at: Instant) {
        if self.start_time.is_none() {
            self.start_time = Some(at);
        }
        self.total_messages += 1;
        self.total_bytes += size as u64;
    }

    pub fn record_latency(&mut self, micros: i64) {
        if self.latencies.len() >= WINDOW_SIZE {
            self.latencies.pop_front();
        }
        self.latencies.push_back(micros);
    }

    pub fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    pub fn messages_per_sec(&self) -> f64 {
        self.messages_per_sec_at(Instant::now())
    }

    pub fn messages_per_sec_at(&self, now: Instant) -> f64 {
        match self.start_time {
            None => 0.0,
            Some(start) => {
                let elapsed = now.saturating_duration_since(start).as_secs_f64();
                if elapsed > 0.0 {
                    self.total_messages as f64 / elapsed
                } else {
                    0.0
                }
            }
        }
    }

    pub fn latency_stats(&self) -> Option<LatencyStats> {
        if self.latencies.is_empty() {
            return None;
        }

        let mut sorted: Vec<i64> = self.latencies.iter().copied().collect();
        sorted.sort_unstable();

        // widened: a window of extreme values overflows an i64 sum
        let sum: i128 = sorted.iter().map(|&v| v as i128).sum();
        let mean = sum as f64 / sorted.len() as f64;
        Some(LatencyStats {
            min_us: sorted[0],
            max_us: sorted[sorted.len() - 1],
            mean_us: mean,
            p50_us: sorted[sorted.len() / 2],
            p99_us: sorted[(sorted.len() * 99) / 100],
        })
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| st.elapsed())
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    pub fn log_summary(&self, label: &str) {
        info!(
            feed = label,
            messages = self.total_messages,
            bytes = self.total_bytes,
            decode_failures = self.decode_failures,
            rate = self.messages_per_sec(),
            elapsed = ?self.elapsed(),
            "feed statistics"
        );

        if let Some(stats) = self.latency_stats() {
            info!(
                feed = label,
                min_us = stats.min_us,
                max_us = stats.max_us,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "latency"
            );
        }
    }
}

impl Default for FeedStats {
    fn default() -> Self {
        Self::new()
    }
}
