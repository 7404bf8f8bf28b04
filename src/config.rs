/// Simulator configuration
///
/// Loaded from TOML. Every field except a feed's group/port and an
/// instrument's id/symbol/base price has a default.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::ConfigError;
use crate::instrument::DEFAULT_VOLATILITY;
use crate::scheduler::{Pacing, DEFAULT_BURST_MULTIPLIER, DEFAULT_MESSAGES_PER_SECOND};
use crate::transport::DEFAULT_TTL;

pub const DEFAULT_TICK_SIZE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_name")]
    pub name: String,
    pub group: Ipv4Addr,
    pub port: u16,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default = "default_loopback")]
    pub loopback: bool,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_size: f64,
    pub messages_per_second: u32,
    pub burst_multiplier: u32,
    pub market_open: bool,
    /// Fixed seed for reproducible runs; entropy when absent
    pub seed: Option<u64>,
    pub pacing: Pacing,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tick_size: DEFAULT_TICK_SIZE,
            messages_per_second: DEFAULT_MESSAGES_PER_SECOND,
            burst_multiplier: DEFAULT_BURST_MULTIPLIER,
            market_open: true,
            seed: None,
            pacing: Pacing::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub id: u32,
    pub symbol: String,
    pub base_price: f64,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
}

fn default_feed_name() -> String {
    "feed".to_string()
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_loopback() -> bool {
    true
}

fn default_volatility() -> f64 {
    DEFAULT_VOLATILITY
}

impl InstrumentConfig {
    pub fn new(id: u32, symbol: &str, base_price: f64, volatility: f64) -> Self {
        InstrumentConfig {
            id,
            symbol: symbol.to_string(),
            base_price,
            volatility,
        }
    }
}

impl FeedConfig {
    pub fn new(name: &str, group: Ipv4Addr, port: u16) -> Self {
        FeedConfig {
            name: name.to_string(),
            group,
            port,
            ttl: DEFAULT_TTL,
            loopback: true,
            engine: EngineConfig::default(),
            instruments: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn feed(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.name == name)
    }
}

/// Two simulated exchanges on separate groups
impl Default for SimulatorConfig {
    fn default() -> Self {
        let mut nyse = FeedConfig::new("NYSE", Ipv4Addr::new(224, 1, 1, 1), 9001);
        nyse.engine.messages_per_second = 800;
        nyse.instruments = vec![
            InstrumentConfig::new(1, "AAPL", 150.00, 0.025),
            InstrumentConfig::new(2, "GOOGL", 2500.00, 0.030),
            InstrumentConfig::new(3, "MSFT", 300.00, 0.020),
            InstrumentConfig::new(4, "TSLA", 800.00, 0.050),
            InstrumentConfig::new(5, "AMZN", 3200.00, 0.030),
        ];

        let mut nasdaq = FeedConfig::new("NASDAQ", Ipv4Addr::new(224, 1, 1, 2), 9002);
        nasdaq.engine.messages_per_second = 600;
        nasdaq.instruments = vec![
            InstrumentConfig::new(101, "NVDA", 400.00, 0.040),
            InstrumentConfig::new(102, "META", 250.00, 0.035),
            InstrumentConfig::new(103, "NFLX", 400.00, 0.035),
            InstrumentConfig::new(104, "AMD", 80.00, 0.045),
            InstrumentConfig::new(105, "INTC", 50.00, 0.025),
        ];

        SimulatorConfig {
            feeds: vec![nyse, nasdaq],
        }
    }
}
