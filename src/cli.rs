//! Command-line interface parsing for the coinscout backend
//!
//! This module handles CLI arguments using clap and resolves them into the
//! runtime configuration, filling in XDG-compliant default locations for the
//! cache snapshot and the history database.

use std::path::PathBuf;

use chrono::Duration;
use clap::Parser;
use directories::ProjectDirs;
use thiserror::Error;

/// Error types for configuration resolution
#[derive(Debug, Error)]
pub enum CliError {
    /// No home directory, so default storage paths cannot be derived
    #[error("Could not determine a home directory for default storage paths; pass --cache-file and --history-db explicitly")]
    NoProjectDirs,
}

/// Coinscout - cryptocurrency price lookup backend with cached market data
#[derive(Parser, Debug)]
#[command(name = "coinscout")]
#[command(about = "Cryptocurrency price lookup backend with cached market data and search history")]
#[command(version)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Cache freshness window in seconds
    #[arg(long, default_value_t = 300)]
    pub ttl_secs: u64,

    /// Path of the cache snapshot file (defaults to the XDG cache directory)
    #[arg(long, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,

    /// Path of the search history database (defaults to the XDG data directory)
    #[arg(long, value_name = "FILE")]
    pub history_db: Option<PathBuf>,

    /// Market data API base URL (defaults to the public CoinGecko API)
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,
}

/// Runtime configuration resolved from CLI arguments
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to
    pub port: u16,
    /// Cache entry freshness window
    pub ttl: Duration,
    /// Where the cache snapshot document lives
    pub cache_file: PathBuf,
    /// Where the search history database lives
    pub history_db: PathBuf,
    /// Override for the market data API base URL
    pub api_base: Option<String>,
}

impl Config {
    /// Resolves parsed CLI arguments into a runtime configuration.
    ///
    /// Storage paths not given on the command line default to the
    /// XDG-compliant cache and data directories (`~/.cache/coinscout/` and
    /// `~/.local/share/coinscout/` on Linux).
    ///
    /// # Returns
    /// * `Ok(Config)` with all paths resolved
    /// * `Err(CliError)` if defaults are needed but no home directory exists
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let (cache_file, history_db) = match (&cli.cache_file, &cli.history_db) {
            (Some(cache_file), Some(history_db)) => (cache_file.clone(), history_db.clone()),
            (cache_file, history_db) => {
                let dirs = ProjectDirs::from("", "", "coinscout").ok_or(CliError::NoProjectDirs)?;
                (
                    cache_file
                        .clone()
                        .unwrap_or_else(|| dirs.cache_dir().join("cache.json")),
                    history_db
                        .clone()
                        .unwrap_or_else(|| dirs.data_dir().join("history.db")),
                )
            }
        };

        Ok(Self {
            port: cli.port,
            ttl: Duration::seconds(cli.ttl_secs as i64),
            cache_file,
            history_db,
            api_base: cli.api_base.clone(),
        })
    }
}
