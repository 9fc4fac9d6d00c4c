use tracing_subscriber::EnvFilter;

use crate::engine::types::PriceSource;

pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
    {
        tracing::debug!(error = %e, "Tracing subscriber already installed, keeping it");
    }
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    tracing::info!(port, "Prometheus exporter listening on /metrics");
    metrics::gauge!("simfeed_up").set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(_port: u16) -> anyhow::Result<()> {
    Ok(())
}

pub fn record_price_tick(symbol: &str, price: f64, source: PriceSource) {
    let source = match source {
        PriceSource::Synthetic => "synthetic",
        PriceSource::Oracle => "oracle",
    };
    metrics::counter!("simfeed_price_ticks_total", "symbol" => symbol.to_string(), "source" => source)
        .increment(1);
    metrics::gauge!("simfeed_price", "symbol" => symbol.to_string()).set(price);
}

pub fn record_oracle_fallback(symbol: &str) {
    metrics::counter!("simfeed_oracle_fallbacks_total", "symbol" => symbol.to_string()).increment(1);
}

pub fn record_book_tick(symbol: &str, levels: usize, crossed: bool) {
    metrics::counter!("simfeed_book_ticks_total", "symbol" => symbol.to_string()).increment(1);
    metrics::gauge!("simfeed_book_levels", "symbol" => symbol.to_string()).set(levels as f64);
    if crossed {
        metrics::counter!("simfeed_book_crossed_total", "symbol" => symbol.to_string()).increment(1);
    }
}
