use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use simfeed_rs::config::Settings;
use simfeed_rs::engine::registry::SymbolRegistry;
use simfeed_rs::engine::types::{OrderBookSnapshot, PriceSample};
use simfeed_rs::market_data::adapters::http::HttpPriceOracle;
use simfeed_rs::market_data::adapters::ConnectionContext;
use simfeed_rs::market_data::book_feed::start_book_feed;
use simfeed_rs::market_data::price_feed::{FeedSettings, PriceFeed};
use simfeed_rs::telemetry;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "simfeed-rs", about = "Synthetic price and order book feed")]
struct Cli {
    /// Settings file (defaults to ./simfeed.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_delimiter = ',', default_value = "BTC-PERP,ETH-PERP")]
    symbols: Vec<String>,
    /// Also run the synthetic order book for this symbol
    #[arg(long)]
    book: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    /// Base URL of a live price oracle; implies a connected client
    #[arg(long)]
    oracle_url: Option<String>,
    #[arg(long)]
    duration_secs: Option<u64>,
    /// Print JSON lines instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug)]
enum Update {
    Price(PriceSample),
    Book(String, OrderBookSnapshot),
}

fn print_price(sample: &PriceSample) {
    println!(
        "{:<11} {:>14.4} | 24h {:>+10.4} ({:>+6.2}%) | H {:.4} L {:.4} | vol {:.0} | {:?} conf {:.2}",
        sample.symbol,
        sample.price,
        sample.change_24h,
        sample.change_percent_24h,
        sample.high_24h,
        sample.low_24h,
        sample.volume_24h,
        sample.source,
        sample.confidence
    );
}

// Top of book plus level counts
fn print_book_summary(symbol: &str, book: &OrderBookSnapshot) {
    println!("\n=== {} Book ===", symbol);
    println!("Bid levels: {}, Ask levels: {}", book.bids.len(), book.asks.len());

    match book.best_bid() {
        Some(level) => println!("Best bid: {:.4} @ {:.4}", level.amount, level.price),
        None => println!("Best bid: None"),
    }
    match book.best_ask() {
        Some(level) => println!("Best ask: {:.4} @ {:.4}", level.amount, level.price),
        None => println!("Best ask: None"),
    }
    println!("Spread: {:.4} ({:.4}%){}", book.spread, book.spread_percent, if book.is_crossed() { " CROSSED" } else { "" });
    println!("====================\n");
}

fn print_update(update: &Update, json: bool) -> anyhow::Result<()> {
    match (update, json) {
        (Update::Price(sample), true) => println!("{}", serde_json::to_string(sample)?),
        (Update::Book(symbol, book), true) => {
            println!("{}", serde_json::json!({ "symbol": symbol, "book": book }))
        }
        (Update::Price(sample), false) => print_price(sample),
        (Update::Book(symbol, book), false) => print_book_summary(symbol, book),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    telemetry::init_tracing("info");

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.seed.is_some() {
        settings.seed = cli.seed;
    }
    if let Some(url) = cli.oracle_url.clone() {
        settings.oracle.url = Some(url);
        settings.oracle.connected = true;
    }
    telemetry::init_metrics(settings.metrics_port)?;

    let registry = Arc::new(SymbolRegistry::from_settings(&settings)?);
    let mut feed = PriceFeed::new(Arc::clone(&registry), FeedSettings::from(&settings.feed));
    if let Some(url) = settings.oracle.url.as_deref() {
        let oracle = HttpPriceOracle::new(url, Duration::from_millis(settings.oracle.timeout_ms))?;
        let connection = ConnectionContext { connected: settings.oracle.connected, chain_id: settings.oracle.chain_id };
        info!(url, connected = connection.connected, "Live oracle configured");
        feed = feed.with_oracle(Arc::new(oracle), connection);
    }

    let (tx, mut rx) = mpsc::channel::<Update>(1000);

    let price_tx = tx.clone();
    let prices = feed.start_many(&cli.symbols, move |sample| {
        if price_tx.try_send(Update::Price(sample)).is_err() {
            warn!("Update channel full, dropping price sample");
        }
    })?;

    let book = match cli.book.clone() {
        Some(symbol) => {
            let book_tx = tx.clone();
            let book_symbol = symbol.clone();
            Some(start_book_feed(&registry, &symbol, settings.book.params(), move |snap| {
                if book_tx.try_send(Update::Book(book_symbol.clone(), snap)).is_err() {
                    warn!("Update channel full, dropping book snapshot");
                }
            })?)
        }
        None => None,
    };
    drop(tx);

    let deadline = async {
        match cli.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(update) = rx.recv() => print_update(&update, cli.json)?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("Duration elapsed");
                break;
            }
        }
    }

    prices.cancel();
    if let Some(book) = book {
        book.cancel();
    }
    info!(live_simulators = registry.live_count(), "Feeds stopped");
    Ok(())
}
