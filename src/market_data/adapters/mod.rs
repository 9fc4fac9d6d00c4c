// Shared trait + types for live price oracles.
//
// A live quote, when available, preempts the synthetic path; the feeds fall
// back to the simulator on any error here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleQuote {
    pub price: f64,
    pub timestamp: u64,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("client is not connected")]
    NotConnected,
    #[error("no quote available for {symbol}")]
    Unavailable { symbol: String },
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed oracle quote: {0}")]
    Malformed(String),
}

#[async_trait::async_trait]
pub trait PriceOracle: Send + Sync {
    async fn latest(&self, symbol: &str) -> Result<OracleQuote, OracleError>;
}

/// Wallet/chain connection state gating live reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionContext {
    pub connected: bool,
    pub chain_id: Option<u64>,
}

impl ConnectionContext {
    pub fn connected(chain_id: Option<u64>) -> Self {
        Self { connected: true, chain_id }
    }

    pub fn prefers_live(&self) -> bool {
        self.connected
    }
}

pub mod http;
