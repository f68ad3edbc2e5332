//! Upstream market data access
//!
//! This module contains the client for the public market data API and the
//! provider trait the lookup path is written against, so tests can substitute
//! an in-process double for the real HTTP client.

pub mod market;

pub use market::{Candidate, MarketClient, MarketError};

use async_trait::async_trait;
use serde_json::Value;

/// Source of coin candidates and consolidated market data
///
/// `MarketClient` is the production implementation; tests provide stubs with
/// canned responses or failures.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    /// Resolve candidate coins matching a search term
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, MarketError>;

    /// Fetch market data for a set of coin ids in one batched call
    async fn markets(&self, ids: &[String]) -> Result<Value, MarketError>;
}
