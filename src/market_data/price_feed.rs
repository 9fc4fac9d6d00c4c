// Refresh scheduler: one task per symbol ticks the simulator (or the live
// oracle) and pushes samples to the subscriber.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::engine::registry::{SharedSimulator, SymbolRegistry, JITTER_STREAM, TICKER_STREAM};
use crate::engine::types::{now_ms, PriceSample, PriceSource, SimResult};
use crate::market_data::adapters::{ConnectionContext, OracleError, PriceOracle};
use crate::market_data::feed::{FeedHandle, Sink};
use crate::market_data::ticker::{Ticker24h, SYNTHETIC_CONFIDENCE};
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub interval: Duration,
    /// Upper bound of the per-symbol offset added in multi-symbol feeds.
    pub jitter: Duration,
    pub reference_reset: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for FeedSettings {
    fn from(cfg: &FeedConfig) -> Self {
        Self {
            interval: Duration::from_millis(cfg.interval_ms),
            jitter: Duration::from_millis(cfg.jitter_ms),
            reference_reset: Duration::from_secs(cfg.reference_reset_secs),
        }
    }
}

pub struct PriceFeed {
    registry: Arc<SymbolRegistry>,
    settings: FeedSettings,
    oracle: Option<Arc<dyn PriceOracle>>,
    connection: ConnectionContext,
}

impl PriceFeed {
    pub fn new(registry: Arc<SymbolRegistry>, settings: FeedSettings) -> Self {
        Self { registry, settings, oracle: None, connection: ConnectionContext::default() }
    }

    /// Prefer `oracle` over the simulator whenever `connection` says so.
    pub fn with_oracle(mut self, oracle: Arc<dyn PriceOracle>, connection: ConnectionContext) -> Self {
        self.oracle = Some(oracle);
        self.connection = connection;
        self
    }

    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    /// Tick `symbol` now and then every `interval`. Must run inside a tokio runtime.
    #[instrument(skip(self, on_update))]
    pub fn start<F>(&self, symbol: &str, on_update: F) -> SimResult<FeedHandle<PriceSample>>
    where
        F: FnMut(PriceSample) + Send + 'static,
    {
        let task = self.symbol_task(symbol, self.settings.interval)?;
        let sink = Sink::new(on_update);
        let join = tokio::spawn(run_symbol(task, sink.clone()));
        info!(symbol, interval_ms = self.settings.interval.as_millis() as u64, "Price feed started");
        Ok(FeedHandle::new(sink, vec![join]))
    }

    /// Like `start` for several symbols sharing one subscriber. Each symbol's
    /// period gets its own random offset in `[0, jitter]`. Every symbol is
    /// resolved before anything is spawned.
    #[instrument(skip(self, on_update))]
    pub fn start_many<S, F>(&self, symbols: &[S], on_update: F) -> SimResult<FeedHandle<PriceSample>>
    where
        S: AsRef<str> + std::fmt::Debug,
        F: FnMut(PriceSample) + Send + 'static,
    {
        let mut tasks = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.as_ref();
            let jitter_ms = self.settings.jitter.as_millis() as u64;
            let offset = self.registry.rng_for(symbol, JITTER_STREAM).gen_range(0..=jitter_ms);
            let period = self.settings.interval + Duration::from_millis(offset);
            tasks.push(self.symbol_task(symbol, period)?);
        }

        let sink = Sink::new(on_update);
        let joins = tasks
            .into_iter()
            .map(|task| {
                debug!(symbol = %task.symbol, period_ms = task.period.as_millis() as u64, "Spawning symbol loop");
                tokio::spawn(run_symbol(task, sink.clone()))
            })
            .collect();
        info!(symbols = symbols.len(), "Multi-symbol price feed started");
        Ok(FeedHandle::new(sink, joins))
    }

    fn symbol_task(&self, symbol: &str, period: Duration) -> SimResult<SymbolTask> {
        let simulator = self.registry.get(symbol)?;
        Ok(SymbolTask {
            symbol: symbol.to_string(),
            registry: Arc::clone(&self.registry),
            simulator,
            last_price: None,
            ticker: Ticker24h::new(symbol),
            rng: self.registry.rng_for(symbol, TICKER_STREAM),
            period: period.max(Duration::from_millis(1)),
            reference_reset: self.settings.reference_reset.max(Duration::from_millis(1)),
            oracle: self.oracle.clone().filter(|_| self.connection.prefers_live()),
        })
    }
}

struct SymbolTask {
    symbol: String,
    registry: Arc<SymbolRegistry>,
    simulator: SharedSimulator,
    /// Price of the last emitted sample, oracle or synthetic.
    last_price: Option<f64>,
    ticker: Ticker24h,
    rng: StdRng,
    period: Duration,
    reference_reset: Duration,
    oracle: Option<Arc<dyn PriceOracle>>,
}

impl SymbolTask {
    async fn next_sample(&mut self) -> PriceSample {
        if let Some(oracle) = self.oracle.as_ref() {
            match oracle.latest(&self.symbol).await {
                Ok(quote) => {
                    return self.ticker.sample(
                        quote.price,
                        quote.confidence,
                        quote.timestamp,
                        PriceSource::Oracle,
                        &mut self.rng,
                    );
                }
                Err(e) => self.log_fallback(&e),
            }
        }

        let price = self.simulator.lock().generate_price();
        self.ticker.sample(price, SYNTHETIC_CONFIDENCE, now_ms(), PriceSource::Synthetic, &mut self.rng)
    }

    fn log_fallback(&self, error: &OracleError) {
        warn!(symbol = %self.symbol, error = %error, "Oracle read failed, using synthetic price");
        telemetry::record_oracle_fallback(&self.symbol);
    }

    fn record(&mut self, sample: &PriceSample) {
        self.last_price = Some(sample.price);
        self.registry.publish_price(&self.symbol, sample.price);
        telemetry::record_price_tick(&sample.symbol, sample.price, sample.source);
    }

    fn reset_reference(&mut self) {
        let price = match self.last_price {
            Some(price) => price,
            None => self.simulator.lock().current_price(),
        };
        self.ticker.reset_reference(price, &mut self.rng);
    }
}

async fn run_symbol(mut task: SymbolTask, sink: Sink<PriceSample>) {
    let mut ticks = interval(task.period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut resets = interval_at(Instant::now() + task.reference_reset, task.reference_reset);
    resets.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let sample = task.next_sample().await;
                task.record(&sample);
                if !sink.emit(sample) {
                    break;
                }
            }
            _ = resets.tick() => task.reset_reference(),
        }
    }
    debug!(symbol = %task.symbol, "Symbol loop exited");
}
