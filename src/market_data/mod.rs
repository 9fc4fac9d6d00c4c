// Market data module entrypoint
pub mod adapters;       // live price oracles (HTTP) and the connection gate
pub mod ticker;         // 24h statistics derived from each price
pub mod feed;           // subscription handle + subscriber slot
pub mod price_feed;     // per-symbol refresh scheduler
pub mod book_feed;      // synthetic order book refresh loop
