/// Price/volume tick generation
///
/// The step functions are pure: given the current state and a drawn variate
/// they return the next price. `TickGenerator` owns the random source and
/// draws the variates, one generator per engine.
///
/// Price step: `current + current * volatility * u`, `u ~ U[-0.01, 0.01]`.
/// This is a bounded scaled random walk, not a log-normal step. A result
/// at or below zero resets to half the base price. The result is always
/// snapped to the tick grid, rounding halves away from zero.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::instrument::Instrument;
use crate::protocol::{MarketMessage, Side};

/// Bound of the uniform price factor
pub const PRICE_FACTOR_BOUND: f64 = 0.01;
pub const MIN_VOLUME: f64 = 100.0;
pub const MAX_VOLUME: f64 = 10_000.0;
/// Fraction of the base price used when a step would go non-positive
pub const RECOVERY_FRACTION: f64 = 0.5;

/// Snap a price to the nearest multiple of `tick_size`, halves away from zero
pub fn quantize(price: f64, tick_size: f64) -> f64 {
    (price / tick_size).round() * tick_size
}

/// Next price for one step with an already drawn factor
pub fn price_step(current: f64, volatility: f64, factor: f64, base_price: f64, tick_size: f64) -> f64 {
    let next = current + current * volatility * factor;
    let recovery = quantize(base_price * RECOVERY_FRACTION, tick_size);
    if next <= 0.0 {
        return recovery;
    }

    let snapped = quantize(next, tick_size);
    // a positive price below half a tick would snap to zero
    if snapped <= 0.0 {
        recovery
    } else {
        snapped
    }
}

/// Owned random source for one feed
#[derive(Debug, Clone)]
pub struct TickGenerator {
    rng: StdRng,
}

impl TickGenerator {
    pub fn from_entropy() -> Self {
        TickGenerator {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        TickGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Uniform index in `0..len`; `len` must be non-zero
    pub fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    pub fn price_factor(&mut self) -> f64 {
        self.rng.gen_range(-PRICE_FACTOR_BOUND..=PRICE_FACTOR_BOUND)
    }

    pub fn next_price(&mut self, current: f64, volatility: f64, base_price: f64, tick_size: f64) -> f64 {
        let factor = self.price_factor();
        price_step(current, volatility, factor, base_price, tick_size)
    }

    /// Uniform real in [100, 10000], truncated
    pub fn next_volume(&mut self) -> u64 {
        self.rng.gen_range(MIN_VOLUME..=MAX_VOLUME) as u64
    }

    /// Independent coin flip, uncorrelated with the price move
    pub fn next_side(&mut self) -> Side {
        if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// Advance `instrument` by one tick and build the outgoing message
    pub fn generate(&mut self, instrument: &mut Instrument, tick_size: f64, timestamp_us: u64) -> MarketMessage {
        let price = self.next_price(
            instrument.current_price,
            instrument.volatility,
            instrument.base_price,
            tick_size,
        );
        let volume = self.next_volume();
        let side = self.next_side();
        let sequence = instrument.record_tick(price, volume);

        MarketMessage {
            timestamp_us,
            instrument_id: instrument.id,
            price,
            volume,
            side,
            sequence,
        }
    }
}
