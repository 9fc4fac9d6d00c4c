// 24h statistics layered on top of a raw price.
//
// Only the reference ("24h ago") price persists between ticks; volume and the
// high/low band are drawn fresh on every sample.

use std::ops::Range;

use rand::Rng;
use tracing::debug;

use crate::engine::types::{PriceSample, PriceSource};

pub const SYNTHETIC_CONFIDENCE: f64 = 0.95;
/// Max relative distance of the reference price from the price it is drawn around.
pub const REFERENCE_DRIFT: f64 = 0.05;
pub const HIGH_LOW_BAND: f64 = 0.05;
pub const VOLUME_RANGE: Range<f64> = 1_000_000.0..10_000_000.0;

#[derive(Debug, Clone)]
pub struct Ticker24h {
    symbol: String,
    reference_price: Option<f64>,
}

impl Ticker24h {
    pub fn new(symbol: &str) -> Self {
        Self { symbol: symbol.to_string(), reference_price: None }
    }

    pub fn reference_price(&self) -> Option<f64> {
        self.reference_price
    }

    /// Re-anchor the reference to a random point near `price`.
    pub fn reset_reference<R: Rng>(&mut self, price: f64, rng: &mut R) {
        let reference = price * (1.0 + (rng.gen::<f64>() - 0.5) * 2.0 * REFERENCE_DRIFT);
        debug!(symbol = %self.symbol, price, reference, "Reset 24h reference price");
        self.reference_price = Some(reference);
    }

    pub fn sample<R: Rng>(
        &mut self,
        price: f64,
        confidence: f64,
        last_update: u64,
        source: PriceSource,
        rng: &mut R,
    ) -> PriceSample {
        let reference = match self.reference_price {
            Some(r) => r,
            None => {
                self.reset_reference(price, rng);
                self.reference_price.unwrap_or(price)
            }
        };

        let change_24h = price - reference;
        let change_percent_24h = if reference != 0.0 { change_24h / reference * 100.0 } else { 0.0 };

        PriceSample {
            symbol: self.symbol.clone(),
            price,
            change_24h,
            change_percent_24h,
            volume_24h: rng.gen_range(VOLUME_RANGE),
            high_24h: price * (1.0 + rng.gen::<f64>() * HIGH_LOW_BAND),
            low_24h: price * (1.0 - rng.gen::<f64>() * HIGH_LOW_BAND),
            last_update,
            confidence,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_first_sample_sets_reference_near_price() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ticker = Ticker24h::new("BTC-PERP");
        assert!(ticker.reference_price().is_none());
        let sample = ticker.sample(45_000.0, SYNTHETIC_CONFIDENCE, 10, PriceSource::Synthetic, &mut rng);
        let reference = ticker.reference_price().unwrap();
        assert!((reference - 45_000.0).abs() <= 45_000.0 * REFERENCE_DRIFT);
        assert!((sample.change_24h - (45_000.0 - reference)).abs() < 1e-9);
        assert!((sample.change_percent_24h - sample.change_24h / reference * 100.0).abs() < 1e-9);
        assert_eq!(sample.last_update, 10);
        assert_eq!(sample.confidence, 0.95);
    }

    #[test]
    fn test_reference_persists_until_reset() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut ticker = Ticker24h::new("ETH-PERP");
        ticker.sample(2_800.0, 1.0, 0, PriceSource::Synthetic, &mut rng);
        let first = ticker.reference_price();
        ticker.sample(2_900.0, 1.0, 0, PriceSource::Synthetic, &mut rng);
        assert_eq!(ticker.reference_price(), first);
        ticker.reset_reference(3_000.0, &mut rng);
        let reset = ticker.reference_price().unwrap();
        assert!((reset - 3_000.0).abs() <= 3_000.0 * REFERENCE_DRIFT);
    }

    #[test]
    fn test_high_low_bracket_price() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ticker = Ticker24h::new("SOL-PERP");
        for i in 0..1_000 {
            let price = 100.0 + i as f64 * 0.01;
            let s = ticker.sample(price, 0.95, 0, PriceSource::Synthetic, &mut rng);
            assert!(s.high_24h >= s.price && s.price >= s.low_24h);
            assert!(VOLUME_RANGE.contains(&s.volume_24h));
        }
    }
}
