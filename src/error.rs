/// Error types for feed configuration, sockets and engine control

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Rejected configuration or control call. The engine state is unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no instruments registered")]
    NoInstruments,

    #[error("instrument id {0} already registered")]
    DuplicateInstrument(u32),

    #[error("base price must be positive, got {0}")]
    InvalidBasePrice(f64),

    #[error("volatility must be positive, got {0}")]
    InvalidVolatility(f64),

    #[error("tick size must be positive, got {0}")]
    InvalidTickSize(f64),

    #[error("base price {price} rounds to zero at tick size {tick_size}")]
    PriceBelowTick { price: f64, tick_size: f64 },

    #[error("burst multiplier must be at least 1")]
    InvalidBurstMultiplier,

    #[error("engine is running")]
    EngineRunning,

    #[error("failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to create UDP socket: {0}")]
    Create(#[source] io::Error),

    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("failed to set {option}: {source}")]
    SocketOption { option: &'static str, source: io::Error },

    #[error("failed to join multicast group {group}: {source}")]
    JoinGroup { group: SocketAddr, source: io::Error },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[source] io::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
