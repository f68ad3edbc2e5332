//! Cache module for storing upstream lookup results
//!
//! This module provides a cache store that keeps market data responses in
//! memory with a fixed TTL and persists the full mapping to a single JSON
//! snapshot file on every write. Expired entries are kept around and remain
//! readable, allowing the lookup path to serve stale data when the upstream
//! API is unavailable.

mod store;

pub use store::{CacheEntry, CacheStore};
