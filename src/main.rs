//! Coinscout - cryptocurrency price lookup backend
//!
//! An HTTP service that proxies search terms to the CoinGecko market data
//! API, caches consolidated results on disk with a TTL, records search
//! history, and serves stale cache entries when the upstream is unavailable.

mod cache;
mod cli;
mod data;
mod history;
mod lookup;
mod server;

use std::fs;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cache::CacheStore;
use cli::{Cli, Config};
use data::MarketClient;
use history::HistoryStore;
use lookup::LookupService;
use server::AppServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    let cache = Arc::new(CacheStore::load(config.cache_file.clone(), config.ttl));

    if let Some(parent) = config.history_db.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let history = HistoryStore::open(&config.history_db)?;

    let client = match &config.api_base {
        Some(base_url) => MarketClient::with_base_url(base_url),
        None => MarketClient::new(),
    };
    let lookup = LookupService::new(client, cache, history.clone());

    let server = AppServer::new(config.port, lookup, history);
    server.run().await?;

    Ok(())
}
