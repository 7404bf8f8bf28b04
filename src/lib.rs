/// Market Feed Simulator - synthetic multicast price-tick feed
///
/// Generates a simplified exchange tick stream for testing trading
/// infrastructure, and decodes it again on the receive side. Features include:
/// - Per-instrument random-walk price and volume model on a tick-size grid
/// - Rate-controlled busy-wait scheduler with runtime burst/market-open control
/// - Fixed 33-byte binary tick record (host byte order, no padding)
/// - Best-effort multicast UDP transport (TTL 1, loopback enabled)
/// - Receiver monitor with latency, rate and per-instrument gap tracking

pub mod protocol;
pub mod codec;
pub mod instrument;
pub mod generator;
pub mod scheduler;
pub mod transport;
pub mod engine;
pub mod config;
pub mod error;
pub mod gap_detector;
pub mod stats;
pub mod monitor;

pub use protocol::{MarketMessage, RawMarketMessage, Side, MESSAGE_SIZE};
pub use codec::{encode, encode_into, Decoder, DecodeError};
pub use instrument::{Instrument, InstrumentSet, DEFAULT_VOLATILITY};
pub use generator::{price_step, quantize, TickGenerator};
pub use scheduler::{Pacing, RateControl, Scheduler};
pub use transport::{MulticastReceiver, MulticastTransport, TickSink};
pub use engine::{EngineState, FeedEngine, SendStats};
pub use config::{EngineConfig, FeedConfig, InstrumentConfig, SimulatorConfig};
pub use error::{ConfigError, FeedError, FeedResult, TransportError};
pub use gap_detector::{Gap, GapDetector, SequenceCheck};
pub use stats::{FeedStats, LatencyStats};
pub use monitor::{FeedMonitor, Observation};
