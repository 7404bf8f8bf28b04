/// Feed engine: composition root for one simulated feed
///
/// Owns the instrument set, the random source, the rate controls and the
/// sink. `start` hands the scheduler loop to one dedicated thread; `stop`
/// clears the running flag and joins it, so no send happens after `stop`
/// returns. Separate engines share nothing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::codec::encode_into;
use crate::config::{EngineConfig, FeedConfig};
use crate::error::{ConfigError, FeedError, FeedResult};
use crate::generator::TickGenerator;
use crate::instrument::{Instrument, InstrumentSet};
use crate::protocol::{unix_micros, MESSAGE_SIZE};
use crate::scheduler::{Pacing, RateControl, Scheduler};
use crate::transport::{MulticastTransport, TickSink};

/// Clears the running flag when the scheduler thread exits, including by panic
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

#[derive(Debug, Default)]
struct SendCounters {
    sent: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time send counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub sent: u64,
    pub failed: u64,
}

/// State touched on every tick; only the scheduler thread locks it while running
struct FeedCore<S> {
    instruments: InstrumentSet,
    generator: TickGenerator,
    sink: S,
    buf: [u8; MESSAGE_SIZE],
}

impl<S: TickSink> FeedCore<S> {
    fn emit_tick(&mut self, counters: &SendCounters) {
        let idx = self.generator.pick(self.instruments.len());
        let tick_size = self.instruments.tick_size();
        let Some(instrument) = self.instruments.by_index_mut(idx) else {
            return;
        };

        let msg = self.generator.generate(instrument, tick_size, unix_micros());
        encode_into(&msg, &mut self.buf);

        match self.sink.send(&self.buf) {
            Ok(n) if n == MESSAGE_SIZE => {
                counters.sent.fetch_add(1, Ordering::Relaxed);
            }
            Ok(n) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    instrument_id = msg.instrument_id,
                    sequence = msg.sequence,
                    "partial send: {} of {} bytes",
                    n,
                    MESSAGE_SIZE
                );
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    instrument_id = msg.instrument_id,
                    sequence = msg.sequence,
                    "failed to send tick: {}",
                    e
                );
            }
        }
    }
}

pub struct FeedEngine<S: TickSink = MulticastTransport> {
    name: String,
    control: Arc<RateControl>,
    running: Arc<AtomicBool>,
    counters: Arc<SendCounters>,
    pacing: Pacing,
    core: Arc<Mutex<FeedCore<S>>>,
    worker: Option<JoinHandle<()>>,
}

impl FeedEngine<MulticastTransport> {
    /// Build a feed from configuration, opening its multicast socket and
    /// registering the configured instruments
    pub fn from_config(config: &FeedConfig) -> FeedResult<Self> {
        let transport = MulticastTransport::with_options(config.group, config.port, config.ttl, config.loopback)?;
        let engine = Self::with_sink(&config.name, &config.engine, transport)?;
        for inst in &config.instruments {
            engine.add_instrument(inst.id, &inst.symbol, inst.base_price, inst.volatility)?;
        }
        Ok(engine)
    }
}

impl<S: TickSink> FeedEngine<S> {
    pub fn with_sink(name: &str, config: &EngineConfig, sink: S) -> Result<Self, ConfigError> {
        if config.burst_multiplier == 0 {
            return Err(ConfigError::InvalidBurstMultiplier);
        }
        let instruments = InstrumentSet::new(config.tick_size)?;

        Ok(FeedEngine {
            name: name.to_string(),
            control: Arc::new(RateControl::new(
                config.messages_per_second,
                config.burst_multiplier,
                config.market_open,
            )),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(SendCounters::default()),
            pacing: config.pacing,
            core: Arc::new(Mutex::new(FeedCore {
                instruments,
                generator: TickGenerator::new(config.seed),
                sink,
                buf: [0u8; MESSAGE_SIZE],
            })),
            worker: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an instrument; only allowed while stopped
    pub fn add_instrument(&self, id: u32, symbol: &str, base_price: f64, volatility: f64) -> Result<(), ConfigError> {
        if self.state() == EngineState::Running {
            return Err(ConfigError::EngineRunning);
        }
        self.core.lock().instruments.register(id, symbol, base_price, volatility)?;
        debug!(feed = %self.name, id, symbol, base_price, volatility, "instrument registered");
        Ok(())
    }

    pub fn set_message_rate(&self, messages_per_second: u32) {
        self.control.set_message_rate(messages_per_second);
    }

    pub fn set_burst_mode(&self, enabled: bool) {
        self.control.set_burst_mode(enabled);
    }

    pub fn set_market_open(&self, open: bool) {
        self.control.set_market_open(open);
    }

    /// Shared handle to the rate settings, usable from other threads
    pub fn control(&self) -> Arc<RateControl> {
        self.control.clone()
    }

    pub fn state(&self) -> EngineState {
        if self.running.load(Ordering::Acquire) {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    pub fn send_stats(&self) -> SendStats {
        SendStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Copy of the current per-instrument state
    pub fn instruments(&self) -> Vec<Instrument> {
        self.core.lock().instruments.iter().cloned().collect()
    }

    pub fn start(&mut self) -> FeedResult<()> {
        let count = self.core.lock().instruments.len();
        if count == 0 {
            return Err(ConfigError::NoInstruments.into());
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ConfigError::EngineRunning.into());
        }
        // a worker that died on its own has already cleared the flag
        if let Some(stale) = self.worker.take() {
            if stale.join().is_err() {
                error!(feed = %self.name, "previous scheduler thread panicked");
            }
        }

        let control = self.control.clone();
        let running = self.running.clone();
        let counters = self.counters.clone();
        let core = self.core.clone();
        let pacing = self.pacing;

        let spawned = thread::Builder::new()
            .name(format!("feed-{}", self.name))
            .spawn(move || {
                let _guard = RunningGuard(running.clone());
                let fired = Scheduler::new(&control, &running, pacing).run(|| core.lock().emit_tick(&counters));
                debug!(fired, "scheduler loop exited");
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                info!(
                    feed = %self.name,
                    instruments = count,
                    rate = self.control.message_rate(),
                    "market feed started"
                );
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(FeedError::Spawn(e))
            }
        }
    }

    /// Stop the scheduler and wait for it to exit. No-op when stopped.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.worker.take() else {
            return;
        };
        if handle.join().is_err() {
            error!(feed = %self.name, "scheduler thread panicked");
        }

        let stats = self.send_stats();
        info!(feed = %self.name, sent = stats.sent, failed = stats.failed, "market feed stopped");
    }
}

impl<S: TickSink> Drop for FeedEngine<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct NullSink;

    impl TickSink for NullSink {
        fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
            Ok(payload.len())
        }
    }

    struct FailingSink;

    impl TickSink for FailingSink {
        fn send(&mut self, _payload: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "network unreachable"))
        }
    }

    struct ShortSink;

    impl TickSink for ShortSink {
        fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
            Ok(payload.len() - 1)
        }
    }

    struct PanickingSink(Arc<AtomicBool>);

    impl TickSink for PanickingSink {
        fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
            if self.0.load(Ordering::Acquire) {
                panic!("sink failure");
            }
            Ok(payload.len())
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            seed: Some(1),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_start_without_instruments_fails() {
        let mut engine = FeedEngine::with_sink("empty", &config(), NullSink).unwrap();
        let err = engine.start().unwrap_err();
        assert!(matches!(err, FeedError::Config(ConfigError::NoInstruments)));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_register_rejected_while_running() {
        let mut engine = FeedEngine::with_sink("t", &config(), NullSink).unwrap();
        engine.add_instrument(1, "TEST", 100.0, 0.02).unwrap();
        engine.start().unwrap();

        assert_eq!(engine.add_instrument(2, "MORE", 50.0, 0.02), Err(ConfigError::EngineRunning));
        assert!(matches!(engine.start(), Err(FeedError::Config(ConfigError::EngineRunning))));

        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(engine.instruments().len(), 1);
    }

    #[test]
    fn test_zero_burst_multiplier_rejected() {
        let cfg = EngineConfig {
            burst_multiplier: 0,
            ..config()
        };
        assert!(matches!(
            FeedEngine::with_sink("t", &cfg, NullSink),
            Err(ConfigError::InvalidBurstMultiplier)
        ));
    }

    #[test]
    fn test_send_failure_is_not_fatal() {
        let mut engine = FeedEngine::with_sink("t", &config(), FailingSink).unwrap();
        engine.add_instrument(1, "TEST", 100.0, 0.02).unwrap();
        engine.set_message_rate(1000);
        engine.start().unwrap();
        thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(engine.state(), EngineState::Running);
        engine.stop();

        let stats = engine.send_stats();
        assert_eq!(stats.sent, 0);
        assert!(stats.failed > 0);
        // lost ticks still consume sequence numbers
        let inst = &engine.instruments()[0];
        assert_eq!(inst.next_sequence() as u64, stats.failed + 1);
    }

    #[test]
    fn test_partial_send_counted_as_failure() {
        let mut engine = FeedEngine::with_sink("t", &config(), ShortSink).unwrap();
        engine.add_instrument(1, "TEST", 100.0, 0.02).unwrap();
        engine.start().unwrap();
        thread::sleep(std::time::Duration::from_millis(20));
        engine.stop();

        let stats = engine.send_stats();
        assert_eq!(stats.sent, 0);
        assert!(stats.failed > 0);
    }

    #[test]
    fn test_restart_continues_sequences() {
        let mut engine = FeedEngine::with_sink("t", &config(), NullSink).unwrap();
        engine.add_instrument(1, "TEST", 100.0, 0.02).unwrap();

        engine.start().unwrap();
        thread::sleep(std::time::Duration::from_millis(20));
        engine.stop();
        let first = engine.send_stats().sent;

        engine.start().unwrap();
        thread::sleep(std::time::Duration::from_millis(20));
        engine.stop();
        let total = engine.send_stats().sent;

        assert!(total > first);
        assert_eq!(engine.instruments()[0].next_sequence() as u64, total + 1);
    }

    #[test]
    fn test_worker_panic_clears_running() {
        let armed = Arc::new(AtomicBool::new(true));
        let mut engine = FeedEngine::with_sink("t", &config(), PanickingSink(armed.clone())).unwrap();
        engine.add_instrument(1, "TEST", 100.0, 0.02).unwrap();
        engine.start().unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while engine.state() == EngineState::Running && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(engine.state(), EngineState::Stopped);

        armed.store(false, Ordering::Release);
        engine.start().unwrap();
        thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(engine.state(), EngineState::Running);
        engine.stop();
        assert!(engine.send_stats().sent > 0);
    }
}
