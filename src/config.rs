use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::engine::book::BookParams;
use crate::engine::types::SymbolConfig;

/// One row of the symbol table. Kept as a list since config keys are not case-preserving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub symbol: String,
    pub base_price: f64,
    pub volatility: f64,
}

impl SymbolEntry {
    pub fn config(&self) -> SymbolConfig {
        SymbolConfig::new(self.base_price, self.volatility)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub interval_ms: u64,
    pub jitter_ms: u64,
    pub reference_reset_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { interval_ms: 1000, jitter_ms: 200, reference_reset_secs: 3600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConfig {
    pub initial_levels: usize,
    pub max_levels: usize,
    pub min_levels: usize,
    pub protected_levels: usize,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub highlight_ms: u64,
}

impl Default for BookConfig {
    fn default() -> Self {
        let params = BookParams::default();
        Self {
            initial_levels: params.initial_levels,
            max_levels: params.max_levels,
            min_levels: params.min_levels,
            protected_levels: params.protected_levels,
            min_interval_ms: params.min_interval.as_millis() as u64,
            max_interval_ms: params.max_interval.as_millis() as u64,
            highlight_ms: params.highlight.as_millis() as u64,
        }
    }
}

impl BookConfig {
    pub fn params(&self) -> BookParams {
        BookParams {
            initial_levels: self.initial_levels,
            max_levels: self.max_levels,
            min_levels: self.min_levels,
            protected_levels: self.protected_levels,
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            highlight: Duration::from_millis(self.highlight_ms),
            ..BookParams::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
    /// Whether a wallet/chain connection is assumed; live data is only tried when set.
    pub connected: bool,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub symbols: Vec<SymbolEntry>,
    pub seed: Option<u64>,
    pub metrics_port: u16,
    pub feed: FeedConfig,
    pub book: BookConfig,
    pub oracle: OracleConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let symbols = [
            ("BTC-PERP", 45_000.0, 0.025),
            ("ETH-PERP", 2_800.0, 0.03),
            ("SOL-PERP", 100.0, 0.04),
            ("ARB-PERP", 1.2, 0.05),
            ("AVAX-PERP", 35.0, 0.045),
            ("MATIC-PERP", 0.8, 0.05),
        ]
        .into_iter()
        .map(|(symbol, base_price, volatility)| SymbolEntry {
            symbol: symbol.to_string(),
            base_price,
            volatility,
        })
        .collect();

        Self {
            symbols,
            seed: None,
            metrics_port: 9000,
            feed: FeedConfig::default(),
            book: BookConfig::default(),
            oracle: OracleConfig { timeout_ms: 2_000, ..OracleConfig::default() },
        }
    }
}

impl Settings {
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolEntry> {
        self.symbols.iter().find(|e| e.symbol == symbol)
    }

    /// Defaults, then `simfeed.toml` (or `path`), then `SIMFEED__*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name("simfeed").required(false),
        };

        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(Environment::with_prefix("SIMFEED").separator("__"))
            .build()?
            .try_deserialize()
    }
}
