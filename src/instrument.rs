/// Per-symbol price/volume state and the instrument registry
///
/// The registry is filled while the engine is stopped and only read for
/// selection afterwards. Indices `0..len()` form the uniform selection space.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::generator::{quantize, RECOVERY_FRACTION};

pub const DEFAULT_VOLATILITY: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub id: u32,
    pub symbol: String,
    pub base_price: f64,
    pub current_price: f64,
    pub volatility: f64,
    pub cumulative_volume: u64,
    next_sequence: u32,
}

impl Instrument {
    /// Sequence number the next emitted tick will carry
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Apply one tick; returns the sequence number assigned to it
    pub fn record_tick(&mut self, price: f64, volume: u64) -> u32 {
        self.current_price = price;
        self.cumulative_volume = self.cumulative_volume.saturating_add(volume);
        let seq = self.next_sequence;
        self.next_sequence = seq.wrapping_add(1);
        seq
    }
}

#[derive(Debug, Clone)]
pub struct InstrumentSet {
    tick_size: f64,
    instruments: Vec<Instrument>,
    index: HashMap<u32, usize>,
}

impl InstrumentSet {
    pub fn new(tick_size: f64) -> Result<Self, ConfigError> {
        if !(tick_size > 0.0 && tick_size.is_finite()) {
            return Err(ConfigError::InvalidTickSize(tick_size));
        }
        Ok(InstrumentSet {
            tick_size,
            instruments: Vec::new(),
            index: HashMap::new(),
        })
    }

    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    /// Add an instrument. The starting price is the base price on the tick grid.
    pub fn register(
        &mut self,
        id: u32,
        symbol: &str,
        base_price: f64,
        volatility: f64,
    ) -> Result<(), ConfigError> {
        if self.index.contains_key(&id) {
            return Err(ConfigError::DuplicateInstrument(id));
        }
        if !(base_price > 0.0 && base_price.is_finite()) {
            return Err(ConfigError::InvalidBasePrice(base_price));
        }
        if !(volatility > 0.0 && volatility.is_finite()) {
            return Err(ConfigError::InvalidVolatility(volatility));
        }

        // Both the start price and the recovery floor must stay on a positive tick
        let recovery = quantize(base_price * RECOVERY_FRACTION, self.tick_size);
        if recovery <= 0.0 {
            return Err(ConfigError::PriceBelowTick {
                price: base_price,
                tick_size: self.tick_size,
            });
        }

        self.index.insert(id, self.instruments.len());
        self.instruments.push(Instrument {
            id,
            symbol: symbol.to_string(),
            base_price,
            current_price: quantize(base_price, self.tick_size),
            volatility,
            cumulative_volume: 0,
            next_sequence: 1,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Instrument> {
        self.index.get(&id).map(|&i| &self.instruments[i])
    }

    pub fn by_index_mut(&mut self, idx: usize) -> Option<&mut Instrument> {
        self.instruments.get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut set = InstrumentSet::new(0.01).unwrap();
        set.register(1, "AAPL", 150.0, 0.025).unwrap();
        set.register(2, "MSFT", 300.0, DEFAULT_VOLATILITY).unwrap();

        assert_eq!(set.len(), 2);
        let aapl = set.get(1).unwrap();
        assert_eq!(aapl.symbol, "AAPL");
        assert_eq!(aapl.current_price, 150.0);
        assert_eq!(aapl.cumulative_volume, 0);
        assert_eq!(aapl.next_sequence(), 1);
        assert!(set.get(3).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut set = InstrumentSet::new(0.01).unwrap();
        set.register(1, "AAPL", 150.0, 0.02).unwrap();
        assert_eq!(
            set.register(1, "OTHER", 10.0, 0.02),
            Err(ConfigError::DuplicateInstrument(1))
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut set = InstrumentSet::new(0.01).unwrap();
        assert_eq!(set.register(1, "A", 0.0, 0.02), Err(ConfigError::InvalidBasePrice(0.0)));
        assert_eq!(set.register(1, "A", -5.0, 0.02), Err(ConfigError::InvalidBasePrice(-5.0)));
        assert_eq!(set.register(1, "A", 10.0, 0.0), Err(ConfigError::InvalidVolatility(0.0)));
        assert!(matches!(
            set.register(1, "A", 0.004, 0.02),
            Err(ConfigError::PriceBelowTick { .. })
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_invalid_tick_size() {
        assert_eq!(InstrumentSet::new(0.0).unwrap_err(), ConfigError::InvalidTickSize(0.0));
        assert!(InstrumentSet::new(f64::NAN).is_err());
    }

    #[test]
    fn test_start_price_on_tick_grid() {
        let mut set = InstrumentSet::new(0.05).unwrap();
        set.register(9, "ODD", 10.01, 0.02).unwrap();
        assert_eq!(set.get(9).unwrap().current_price, quantize(10.01, 0.05));
        assert_eq!(set.get(9).unwrap().base_price, 10.01);
    }

    #[test]
    fn test_record_tick_advances_state() {
        let mut set = InstrumentSet::new(0.01).unwrap();
        set.register(1, "TEST", 100.0, 0.02).unwrap();
        let inst = set.by_index_mut(0).unwrap();

        assert_eq!(inst.record_tick(100.5, 300), 1);
        assert_eq!(inst.record_tick(100.4, 200), 2);
        assert_eq!(inst.current_price, 100.4);
        assert_eq!(inst.cumulative_volume, 500);
        assert_eq!(inst.next_sequence(), 3);
    }
}
