/// Binary tick record layout
///
/// One datagram carries one fixed-size record, 33 bytes, no padding:
///   - timestamp: u64 (8 bytes) - microseconds since Unix epoch
///   - instrument_id: u32 (4 bytes)
///   - price: f64 (8 bytes) - IEEE-754 double
///   - volume: u64 (8 bytes) - traded quantity of this tick
///   - side: u8 (1 byte) - ASCII 'B' or 'S'
///   - sequence: u32 (4 bytes) - per-instrument sequence number
///
/// All fields are written in host byte order. Feeds are only wire-compatible
/// between hosts of the same endianness.

use std::mem::{self, offset_of};
use std::time::{SystemTime, UNIX_EPOCH};

/// Packed record as it appears on the wire
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct RawMarketMessage {
    pub timestamp: u64,
    pub instrument_id: u32,
    pub price: f64,
    pub volume: u64,
    pub side: u8,
    pub sequence: u32,
}

pub const MESSAGE_SIZE: usize = mem::size_of::<RawMarketMessage>();

pub const TIMESTAMP_OFFSET: usize = offset_of!(RawMarketMessage, timestamp);
pub const INSTRUMENT_ID_OFFSET: usize = offset_of!(RawMarketMessage, instrument_id);
pub const PRICE_OFFSET: usize = offset_of!(RawMarketMessage, price);
pub const VOLUME_OFFSET: usize = offset_of!(RawMarketMessage, volume);
pub const SIDE_OFFSET: usize = offset_of!(RawMarketMessage, side);
pub const SEQUENCE_OFFSET: usize = offset_of!(RawMarketMessage, sequence);

// Compile-time assertions for wire layout
const _: () = {
    assert!(MESSAGE_SIZE == 33);
    assert!(TIMESTAMP_OFFSET == 0);
    assert!(INSTRUMENT_ID_OFFSET == 8);
    assert!(PRICE_OFFSET == 12);
    assert!(VOLUME_OFFSET == 20);
    assert!(SIDE_OFFSET == 28);
    assert!(SEQUENCE_OFFSET == 29);
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_byte(self) -> u8 {
        match self {
            Side::Buy => b'B',
            Side::Sell => b'S',
        }
    }

    pub fn from_byte(v: u8) -> Option<Self> {
        match v {
            b'B' => Some(Side::Buy),
            b'S' => Some(Side::Sell),
            _ => None,
        }
    }
}

/// One decoded or to-be-encoded tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketMessage {
    pub timestamp_us: u64,
    pub instrument_id: u32,
    pub price: f64,
    pub volume: u64,
    pub side: Side,
    pub sequence: u32,
}

/// Microseconds since the Unix epoch, 0 if the clock is set before it
pub fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
