use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::engine::simulator::PriceSimulator;
use crate::engine::types::{SimError, SimResult, SymbolConfig};

pub type SharedSimulator = Arc<Mutex<PriceSimulator>>;

/// Independent random streams handed out per symbol.
pub const SIMULATOR_STREAM: u64 = 0;
pub const TICKER_STREAM: u64 = 1;
pub const BOOK_STREAM: u64 = 2;
pub const JITTER_STREAM: u64 = 3;

/// Symbol -> config table plus the simulators created from it.
///
/// Owned by whoever runs the feeds and passed down explicitly. Simulators are
/// created on first `get` and kept for the lifetime of the registry. The
/// price feed records the last price it published per symbol so that other
/// consumers (the order book) follow the same price, oracle or synthetic.
#[derive(Debug)]
pub struct SymbolRegistry {
    configs: AHashMap<String, SymbolConfig>,
    live: Mutex<AHashMap<String, SharedSimulator>>,
    published: Mutex<AHashMap<String, f64>>,
    seed: Option<u64>,
}

impl SymbolRegistry {
    pub fn new<I, S>(configs: I, seed: Option<u64>) -> SimResult<Self>
    where
        I: IntoIterator<Item = (S, SymbolConfig)>,
        S: Into<String>,
    {
        let mut table = AHashMap::new();
        for (symbol, config) in configs {
            let symbol = symbol.into();
            config.validate(&symbol)?;
            table.insert(symbol, config);
        }
        info!(symbols = table.len(), seeded = seed.is_some(), "Symbol registry ready");
        Ok(Self { configs: table, live: Mutex::new(AHashMap::new()), published: Mutex::new(AHashMap::new()), seed })
    }

    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        Self::new(settings.symbols.iter().map(|e| (e.symbol.clone(), e.config())), settings.seed)
    }

    pub fn config(&self, symbol: &str) -> SimResult<&SymbolConfig> {
        self.configs.get(symbol).ok_or_else(|| {
            warn!(symbol, "Requested symbol has no configuration");
            SimError::UnknownSymbol { symbol: symbol.to_string() }
        })
    }

    /// Return the live simulator for `symbol`, creating it on first use.
    #[instrument(level = "debug", skip(self))]
    pub fn get(&self, symbol: &str) -> SimResult<SharedSimulator> {
        let config = self.config(symbol)?;
        let mut live = self.live.lock();
        if let Some(sim) = live.get(symbol) {
            return Ok(Arc::clone(sim));
        }
        let sim = Arc::new(Mutex::new(PriceSimulator::new(
            symbol,
            config,
            self.rng_for(symbol, SIMULATOR_STREAM),
        )));
        live.insert(symbol.to_string(), Arc::clone(&sim));
        debug!(symbol, base_price = config.base_price, volatility = config.volatility, "Created simulator");
        Ok(sim)
    }

    pub fn publish_price(&self, symbol: &str, price: f64) {
        self.published.lock().insert(symbol.to_string(), price);
    }

    /// Last published price for `symbol`, or its simulator's current price
    /// when no feed has published one yet.
    pub fn latest_price(&self, symbol: &str) -> SimResult<f64> {
        if let Some(price) = self.published.lock().get(symbol).copied() {
            return Ok(price);
        }
        Ok(self.get(symbol)?.lock().current_price())
    }

    /// Deterministic when the registry was seeded, entropy-backed otherwise.
    pub fn rng_for(&self, symbol: &str, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mixed = seed ^ symbol_hash(symbol) ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
                StdRng::seed_from_u64(mixed)
            }
            None => StdRng::from_entropy(),
        }
    }

    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.configs.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.configs.contains_key(symbol)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

// FNV-1a; stable across runs unlike the std/ahash hashers
fn symbol_hash(symbol: &str) -> u64 {
    symbol.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn registry(seed: Option<u64>) -> SymbolRegistry {
        SymbolRegistry::new(
            [
                ("BTC-PERP", SymbolConfig::new(45_000.0, 0.025)),
                ("ETH-PERP", SymbolConfig::new(2_800.0, 0.03)),
            ],
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_symbol_fails() {
        let reg = registry(None);
        let err = reg.get("ZZZ-PERP").unwrap_err();
        assert_eq!(err, SimError::UnknownSymbol { symbol: "ZZZ-PERP".into() });
        assert_eq!(reg.live_count(), 0);
    }

    #[test]
    fn test_get_caches_instance() {
        let reg = registry(Some(7));
        let a = reg.get("BTC-PERP").unwrap();
        a.lock().generate_price();
        let b = reg.get("BTC-PERP").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.lock().ticks(), 1);
        assert_eq!(reg.live_count(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = SymbolRegistry::new([("BAD", SymbolConfig::new(-1.0, 0.1))], None).unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { symbol, .. } if symbol == "BAD"));
    }

    #[test]
    fn test_seeded_streams_are_reproducible_and_distinct() {
        let reg = registry(Some(11));
        let a: u64 = reg.rng_for("BTC-PERP", BOOK_STREAM).gen();
        let b: u64 = reg.rng_for("BTC-PERP", BOOK_STREAM).gen();
        let c: u64 = reg.rng_for("BTC-PERP", TICKER_STREAM).gen();
        let d: u64 = reg.rng_for("ETH-PERP", BOOK_STREAM).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        // jitter offsets must not replay the ticker's first draws
        let mut ticker = reg.rng_for("BTC-PERP", TICKER_STREAM);
        let mut jitter = reg.rng_for("BTC-PERP", JITTER_STREAM);
        let ticker: Vec<u64> = (0..4).map(|_| ticker.gen()).collect();
        let jitter: Vec<u64> = (0..4).map(|_| jitter.gen()).collect();
        assert_ne!(ticker, jitter);
    }

    #[test]
    fn test_latest_price_prefers_published() {
        let reg = registry(Some(3));
        assert_eq!(reg.latest_price("BTC-PERP").unwrap(), 45_000.0);
        reg.publish_price("BTC-PERP", 123.0);
        assert_eq!(reg.latest_price("BTC-PERP").unwrap(), 123.0);
        assert_eq!(reg.latest_price("ETH-PERP").unwrap(), 2_800.0);
        assert!(reg.latest_price("ZZZ-PERP").is_err());
    }

    #[test]
    fn test_symbols_sorted() {
        let reg = registry(None);
        assert_eq!(reg.symbols(), vec!["BTC-PERP", "ETH-PERP"]);
        assert!(reg.contains("ETH-PERP"));
        assert!(!reg.contains("ZZZ-PERP"));
    }
}
