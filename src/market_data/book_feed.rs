use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument};

use crate::engine::book::{BookParams, SyntheticBook};
use crate::engine::registry::{SymbolRegistry, BOOK_STREAM};
use crate::engine::types::{OrderBookSnapshot, SimResult};
use crate::market_data::feed::{FeedHandle, Sink};
use crate::telemetry;

/// Running order-book subscription with a pause switch.
pub struct BookFeedHandle {
    feed: FeedHandle<OrderBookSnapshot>,
    running: watch::Sender<bool>,
}

impl BookFeedHandle {
    pub fn pause(&self) {
        self.running.send_replace(false);
    }

    pub fn resume(&self) {
        self.running.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow() && !self.feed.is_cancelled()
    }

    pub fn cancel(&self) {
        self.feed.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.feed.is_cancelled()
    }
}

/// Start the synthetic ladder for `symbol`, centred on the last price the
/// price feed published (the simulator's price until one exists).
#[instrument(skip(registry, params, on_update))]
pub fn start_book_feed<F>(
    registry: &Arc<SymbolRegistry>,
    symbol: &str,
    params: BookParams,
    on_update: F,
) -> SimResult<BookFeedHandle>
where
    F: FnMut(OrderBookSnapshot) + Send + 'static,
{
    let mid = registry.latest_price(symbol)?;
    let book = SyntheticBook::new(params, registry.rng_for(symbol, BOOK_STREAM));
    let (running, running_rx) = watch::channel(true);
    let sink = Sink::new(on_update);
    let task = BookTask { symbol: symbol.to_string(), registry: Arc::clone(registry), book };
    let join = tokio::spawn(run_book(task, mid, running_rx, sink.clone()));
    info!(symbol, "Order book feed started");
    Ok(BookFeedHandle { feed: FeedHandle::new(sink, vec![join]), running })
}

struct BookTask {
    symbol: String,
    registry: Arc<SymbolRegistry>,
    book: SyntheticBook,
}

impl BookTask {
    fn mid(&self, fallback: f64) -> f64 {
        self.registry.latest_price(&self.symbol).unwrap_or(fallback)
    }
}

// Tick instants are spaced by the drawn delay; the highlight window runs
// inside that delay rather than after it.
async fn run_book(mut task: BookTask, mid: f64, mut running: watch::Receiver<bool>, sink: Sink<OrderBookSnapshot>) {
    if !sink.emit(task.book.initialize(mid)) {
        return;
    }
    let highlight = task.book.params().highlight;
    let mut last_mid = mid;
    let mut next_tick = Instant::now() + task.book.next_delay();

    loop {
        sleep_until(next_tick).await;
        if !*running.borrow() {
            debug!(symbol = %task.symbol, "Book feed paused, skipping tick");
            if running.wait_for(|r| *r).await.is_err() {
                break;
            }
            next_tick = Instant::now() + task.book.next_delay();
            continue;
        }

        let tick_at = Instant::now();
        last_mid = task.mid(last_mid);
        let snapshot = task.book.tick(last_mid);
        telemetry::record_book_tick(&task.symbol, snapshot.bids.len() + snapshot.asks.len(), snapshot.is_crossed());
        if !sink.emit(snapshot) {
            break;
        }
        next_tick = tick_at + task.book.next_delay();

        let clear_at = (tick_at + highlight).min(next_tick);
        if highlight > Duration::ZERO {
            sleep_until(clear_at).await;
        }
        if task.book.clear_highlights() > 0 && !sink.emit(task.book.snapshot()) {
            break;
        }
    }
    debug!(symbol = %task.symbol, "Book loop exited");
}
