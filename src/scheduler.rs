/// Rate-controlled busy-wait scheduler
///
/// The loop compares the time since the last tick against the target
/// interval `1_000_000 / effective_rate` microseconds. When due it fires one
/// tick, otherwise it sleeps a short quantum and re-checks. The stop flag is
/// observed at least once per quantum.
///
/// Rate settings are independent atomics. Each field is read on its own, so
/// a tick decision may combine values from before and after a concurrent
/// update.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_MESSAGES_PER_SECOND: u32 = 1000;
/// Multiplier in effect until `set_burst_mode` is first called
pub const DEFAULT_BURST_MULTIPLIER: u32 = 5;
pub const BURST_ON_MULTIPLIER: u32 = 10;
pub const BURST_OFF_MULTIPLIER: u32 = 1;
pub const SLEEP_QUANTUM: Duration = Duration::from_micros(10);

#[derive(Debug)]
pub struct RateControl {
    messages_per_second: AtomicU32,
    burst_multiplier: AtomicU32,
    market_open: AtomicBool,
}

impl RateControl {
    pub fn new(messages_per_second: u32, burst_multiplier: u32, market_open: bool) -> Self {
        RateControl {
            messages_per_second: AtomicU32::new(messages_per_second),
            burst_multiplier: AtomicU32::new(burst_multiplier),
            market_open: AtomicBool::new(market_open),
        }
    }

    pub fn set_message_rate(&self, messages_per_second: u32) {
        self.messages_per_second.store(messages_per_second, Ordering::Relaxed);
    }

    pub fn set_burst_mode(&self, enabled: bool) {
        let multiplier = if enabled { BURST_ON_MULTIPLIER } else { BURST_OFF_MULTIPLIER };
        self.burst_multiplier.store(multiplier, Ordering::Relaxed);
    }

    pub fn set_market_open(&self, open: bool) {
        self.market_open.store(open, Ordering::Relaxed);
    }

    pub fn message_rate(&self) -> u32 {
        self.messages_per_second.load(Ordering::Relaxed)
    }

    pub fn burst_multiplier(&self) -> u32 {
        self.burst_multiplier.load(Ordering::Relaxed)
    }

    pub fn is_market_open(&self) -> bool {
        self.market_open.load(Ordering::Relaxed)
    }

    /// Messages per second after applying burst; closed market forces 1x
    pub fn effective_rate(&self) -> u32 {
        let multiplier = if self.is_market_open() { self.burst_multiplier() } else { 1 };
        self.message_rate().saturating_mul(multiplier)
    }

    /// Whole-microsecond tick interval, `None` while the rate is zero
    pub fn target_interval(&self) -> Option<Duration> {
        match self.effective_rate() {
            0 => None,
            rate => Some(Duration::from_micros(1_000_000 / rate as u64)),
        }
    }
}

impl Default for RateControl {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGES_PER_SECOND, DEFAULT_BURST_MULTIPLIER, true)
    }
}

/// How the reference time moves after a tick fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Reset to the firing time. Per-tick overhead accumulates, so the
    /// achieved rate sits slightly below target under load.
    #[default]
    Drifting,
    /// Advance by exactly one interval, snapping to the firing time when
    /// more than one interval behind.
    Fixed,
}

impl Pacing {
    pub fn next_reference(self, reference: Instant, now: Instant, interval: Duration) -> Instant {
        match self {
            Pacing::Drifting => now,
            Pacing::Fixed => {
                let next = reference + interval;
                if now.saturating_duration_since(next) > interval {
                    now
                } else {
                    next
                }
            }
        }
    }
}

pub struct Scheduler<'a> {
    control: &'a RateControl,
    running: &'a AtomicBool,
    pacing: Pacing,
    quantum: Duration,
}

impl<'a> Scheduler<'a> {
    pub fn new(control: &'a RateControl, running: &'a AtomicBool, pacing: Pacing) -> Self {
        Scheduler {
            control,
            running,
            pacing,
            quantum: SLEEP_QUANTUM,
        }
    }

    pub fn with_quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }

    /// Run until the running flag clears; returns the number of ticks fired
    pub fn run<F: FnMut()>(&self, mut on_tick: F) -> u64 {
        let mut reference = Instant::now();
        let mut fired = 0u64;

        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            match self.control.target_interval() {
                Some(interval) if now.duration_since(reference) >= interval => {
                    on_tick();
                    fired += 1;
                    reference = self.pacing.next_reference(reference, now, interval);
                }
                _ => thread::sleep(self.quantum),
            }
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_default_rate_uses_initial_burst_multiplier() {
        let control = RateControl::default();
        assert_eq!(control.effective_rate(), 5000);
        assert_eq!(control.target_interval(), Some(Duration::from_micros(200)));
    }

    #[test]
    fn test_burst_and_market_open() {
        let control = RateControl::default();
        control.set_message_rate(100);
        control.set_burst_mode(false);
        assert_eq!(control.effective_rate(), 100);

        control.set_burst_mode(true);
        assert_eq!(control.effective_rate(), 1000);

        control.set_market_open(false);
        assert_eq!(control.effective_rate(), 100);
        assert_eq!(control.burst_multiplier(), 10);

        control.set_market_open(true);
        assert_eq!(control.effective_rate(), 1000);
    }

    #[test]
    fn test_zero_rate_pauses() {
        let control = RateControl::new(0, 1, true);
        assert_eq!(control.target_interval(), None);
    }

    #[test]
    fn test_interval_truncates_to_whole_micros() {
        let control = RateControl::new(3, 1, true);
        assert_eq!(control.target_interval(), Some(Duration::from_micros(333_333)));
        control.set_message_rate(2_000_000);
        assert_eq!(control.target_interval(), Some(Duration::ZERO));
    }

    #[test]
    fn test_pacing_reference() {
        let start = Instant::now();
        let interval = Duration::from_millis(10);

        let late = start + Duration::from_millis(12);
        assert_eq!(Pacing::Drifting.next_reference(start, late, interval), late);
        assert_eq!(Pacing::Fixed.next_reference(start, late, interval), start + interval);

        let far_behind = start + Duration::from_millis(35);
        assert_eq!(Pacing::Fixed.next_reference(start, far_behind, interval), far_behind);
    }

    #[test]
    fn test_run_exits_on_stop_flag() {
        let control = Arc::new(RateControl::new(1000, 1, true));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let control = control.clone();
            let running = running.clone();
            thread::spawn(move || Scheduler::new(&control, &running, Pacing::Drifting).run(|| {}))
        };

        thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::Release);
        let fired = handle.join().unwrap();
        assert!(fired > 0);
    }

    #[test]
    fn test_run_returns_immediately_when_not_running() {
        let control = RateControl::default();
        let running = AtomicBool::new(false);
        let mut ticks = 0;
        let fired = Scheduler::new(&control, &running, Pacing::Fixed).run(|| ticks += 1);
        assert_eq!(fired, 0);
        assert_eq!(ticks, 0);
    }
}
