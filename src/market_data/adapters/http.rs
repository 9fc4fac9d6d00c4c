// HTTP price oracle: GET {base_url}/{symbol} -> {"price": .., "timestamp": .., "confidence": ..}

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{OracleError, OracleQuote, PriceOracle};
use crate::engine::types::now_ms;

pub const DEFAULT_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Deserialize)]
struct QuoteBody {
    price: f64,
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    confidence: Option<f64>,
}

pub struct HttpPriceOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn quote_url(&self, symbol: &str) -> String {
        format!("{}/{}", self.base_url, symbol)
    }
}

/// Validate a raw JSON body into a quote. Missing timestamp means "now".
pub fn parse_quote(body: &str) -> Result<OracleQuote, OracleError> {
    let raw: QuoteBody = serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;
    if !raw.price.is_finite() || raw.price <= 0.0 {
        return Err(OracleError::Malformed(format!("price must be positive, got {}", raw.price)));
    }
    let confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(OracleError::Malformed(format!("confidence out of range: {confidence}")));
    }
    Ok(OracleQuote { price: raw.price, timestamp: raw.timestamp.unwrap_or_else(now_ms), confidence })
}

#[async_trait::async_trait]
impl PriceOracle for HttpPriceOracle {
    #[instrument(level = "debug", skip(self))]
    async fn latest(&self, symbol: &str) -> Result<OracleQuote, OracleError> {
        let res = self
            .client
            .get(self.quote_url(symbol))
            .send()
            .await?
            .error_for_status()?;
        let body = res.text().await?;
        let quote = parse_quote(&body)?;
        debug!(symbol, price = quote.price, "Oracle quote");
        Ok(quote)
    }
}
