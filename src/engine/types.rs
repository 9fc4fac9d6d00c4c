use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

// Static per-symbol simulator settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub base_price: f64,
    pub volatility: f64,
}

impl SymbolConfig {
    pub fn new(base_price: f64, volatility: f64) -> Self {
        Self { base_price, volatility }
    }

    pub fn validate(&self, symbol: &str) -> Result<(), SimError> {
        if !self.base_price.is_finite() || self.base_price <= 0.0 {
            return Err(SimError::InvalidConfig {
                symbol: symbol.to_string(),
                reason: format!("base price must be positive, got {}", self.base_price),
            });
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(SimError::InvalidConfig {
                symbol: symbol.to_string(),
                reason: format!("volatility must be non-negative, got {}", self.volatility),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Synthetic,
    Oracle,
}

/// One published price update with its derived 24h statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSample {
    pub symbol: String,
    pub price: f64,
    #[serde(rename = "change24h")]
    pub change_24h: f64,
    #[serde(rename = "changePercent24h")]
    pub change_percent_24h: f64,
    #[serde(rename = "volume24h")]
    pub volume_24h: f64,
    #[serde(rename = "high24h")]
    pub high_24h: f64,
    #[serde(rename = "low24h")]
    pub low_24h: f64,
    pub last_update: u64,
    pub confidence: f64,
    pub source: PriceSource,
}

// A single rung of the synthetic ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookLevel {
    pub price: f64,
    pub amount: f64,
    /// Running sum of `amount` from the top of book down to this level.
    pub total: f64,
    /// Display ratio in `0..=100`.
    pub depth: f64,
    pub id: u64,
    pub timestamp: u64,
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSnapshot {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub last_price: f64,
    pub spread: f64,
    pub spread_percent: f64,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }

    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("no configuration found for symbol {symbol}")]
    UnknownSymbol { symbol: String },
    #[error("invalid configuration for symbol {symbol}: {reason}")]
    InvalidConfig { symbol: String, reason: String },
}

pub type SimResult<T> = Result<T, SimError>;

/// Wall-clock Unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64) -> OrderBookLevel {
        OrderBookLevel { price, amount: 1.0, total: 1.0, depth: 10.0, id: 0, timestamp: 0, is_new: false }
    }

    #[test]
    fn test_validate_rejects_non_positive_base_price() {
        let err = SymbolConfig::new(0.0, 0.02).validate("BTC-PERP").unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { .. }));
        assert!(SymbolConfig::new(100.0, -0.1).validate("BTC-PERP").is_err());
        assert!(SymbolConfig::new(f64::NAN, 0.1).validate("BTC-PERP").is_err());
        assert!(SymbolConfig::new(100.0, 0.0).validate("BTC-PERP").is_ok());
    }

    #[test]
    fn test_unknown_symbol_message() {
        let err = SimError::UnknownSymbol { symbol: "ZZZ-PERP".into() };
        assert_eq!(err.to_string(), "no configuration found for symbol ZZZ-PERP");
    }

    #[test]
    fn test_crossed_detection() {
        let mut snap = OrderBookSnapshot {
            bids: vec![level(99.0)],
            asks: vec![level(101.0)],
            last_price: 100.0,
            spread: 2.0,
            spread_percent: 2.0,
        };
        assert!(!snap.is_crossed());
        snap.bids[0].price = 101.5;
        assert!(snap.is_crossed());
    }

    #[test]
    fn test_sample_serializes_camel_case() {
        let sample = PriceSample {
            symbol: "ETH-PERP".into(),
            price: 2800.0,
            change_24h: 10.0,
            change_percent_24h: 0.36,
            volume_24h: 1.0,
            high_24h: 2810.0,
            low_24h: 2790.0,
            last_update: 1,
            confidence: 0.95,
            source: PriceSource::Synthetic,
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert!(json.get("change24h").is_some());
        assert!(json.get("changePercent24h").is_some());
        assert!(json.get("lastUpdate").is_some());
        assert_eq!(json["source"], "synthetic");
    }
}
