//! Per-request lookup decision procedure
//!
//! Decides, for each incoming query, whether to serve from cache, refresh
//! from the upstream market API, or degrade to a stale cache entry. On a
//! successful refresh the query is appended to the search history and the
//! payload is written back to the cache (which flushes its snapshot).

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::data::{MarketError, MarketProvider};
use crate::history::HistoryStore;

/// Maximum number of search candidates enriched with market data
const CANDIDATE_LIMIT: usize = 5;

/// Errors surfaced to the caller when a lookup cannot be answered at all
///
/// Upstream failures are only surfaced when no cache entry (fresh or stale)
/// exists for the key; otherwise the lookup degrades to the cached payload.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Upstream search or market data fetch failed with nothing to fall back on
    #[error("Market data fetch failed: {0}")]
    Upstream(#[from] MarketError),
}

/// Normalizes a raw search term into a cache key
///
/// Keys are case-folded so "Bitcoin" and "bitcoin" share one cache entry.
pub fn normalize_query(query: &str) -> String {
    query.to_lowercase()
}

/// Cache-aware lookup service over an upstream market data provider
pub struct LookupService<P> {
    provider: P,
    cache: Arc<CacheStore>,
    history: HistoryStore,
}

impl<P: MarketProvider> LookupService<P> {
    /// Creates a new LookupService
    ///
    /// # Arguments
    /// * `provider` - Upstream market data source
    /// * `cache` - Shared cache store, loaded once at startup
    /// * `history` - Search history log
    pub fn new(provider: P, cache: Arc<CacheStore>, history: HistoryStore) -> Self {
        Self {
            provider,
            cache,
            history,
        }
    }

    /// Looks up market data for a search term
    ///
    /// A fresh cache entry is returned immediately without touching upstream
    /// or the history log. Otherwise the upstream is queried; on success the
    /// result is recorded in history and cache, and on failure any existing
    /// cache entry for the key (fresh or expired) is served as a degraded
    /// response.
    ///
    /// # Returns
    /// * `Ok(Value)` - A JSON array of market entries, possibly empty
    /// * `Err(LookupError)` - Upstream failed and no cache entry exists
    pub async fn lookup(&self, query: &str) -> Result<Value, LookupError> {
        let key = normalize_query(query);

        if let Some(entry) = self.cache.get_fresh(&key, Utc::now()) {
            debug!("Serving cached data for {}", key);
            return Ok(entry.payload);
        }

        match self.refresh(&key).await {
            Ok(payload) => Ok(payload),
            Err(err) => {
                // Serve cached data even if expired
                if let Some(entry) = self.cache.get(&key) {
                    warn!("Upstream fetch failed for {}, serving stale cache: {}", key, err);
                    Ok(entry.payload)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Fetches fresh market data for a normalized key and records it
    async fn refresh(&self, key: &str) -> Result<Value, LookupError> {
        let candidates = self.provider.search(key).await?;
        if candidates.is_empty() {
            // No matching coins: empty result, nothing cached or logged
            return Ok(Value::Array(Vec::new()));
        }

        let ids: Vec<String> = candidates
            .iter()
            .take(CANDIDATE_LIMIT)
            .map(|candidate| candidate.id.clone())
            .collect();
        let payload = self.provider.markets(&ids).await?;

        if let Err(err) = self.history.append(key, Utc::now()) {
            warn!("Failed to record search history for {}: {}", key, err);
        }

        self.cache.put(key, payload.clone(), Utc::now());
        info!("Cached fresh market data for {}", key);
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Candidate;
    use async_trait::async_trait;
    use chrono::Duration;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Provider double with canned candidates/payload and failure switches
    struct StubProvider {
        candidates: Vec<Candidate>,
        payload: Value,
        fail_search: bool,
        fail_markets: bool,
        search_calls: Arc<AtomicUsize>,
        markets_calls: Arc<AtomicUsize>,
        last_ids: Arc<Mutex<Vec<String>>>,
    }

    impl StubProvider {
        fn new(candidates: Vec<Candidate>, payload: Value) -> Self {
            Self {
                candidates,
                payload,
                fail_search: false,
                fail_markets: false,
                search_calls: Arc::new(AtomicUsize::new(0)),
                markets_calls: Arc::new(AtomicUsize::new(0)),
                last_ids: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing_search() -> Self {
            let mut stub = Self::new(Vec::new(), json!([]));
            stub.fail_search = true;
            stub
        }
    }

    #[async_trait]
    impl MarketProvider for StubProvider {
        async fn search(&self, _query: &str) -> Result<Vec<Candidate>, MarketError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_search {
                return Err(MarketError::BadStatus(StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(self.candidates.clone())
        }

        async fn markets(&self, ids: &[String]) -> Result<Value, MarketError> {
            self.markets_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_markets {
                return Err(MarketError::BadStatus(StatusCode::SERVICE_UNAVAILABLE));
            }
            *self.last_ids.lock().expect("lock poisoned") = ids.to_vec();
            Ok(self.payload.clone())
        }
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: id.to_string(),
            symbol: id.to_string(),
        }
    }

    fn create_cache(ttl_secs: i64) -> (Arc<CacheStore>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");
        (
            Arc::new(CacheStore::load(path, Duration::seconds(ttl_secs))),
            temp_dir,
        )
    }

    fn create_service(
        stub: StubProvider,
        cache: Arc<CacheStore>,
    ) -> (LookupService<StubProvider>, HistoryStore) {
        let history = HistoryStore::open_in_memory().expect("Should open history store");
        let service = LookupService::new(stub, cache, history.clone());
        (service, history)
    }

    #[test]
    fn test_normalize_query_case_folds() {
        assert_eq!(normalize_query("BiTcOiN"), "bitcoin");
        assert_eq!(normalize_query("doge"), "doge");
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_upstream_and_history() {
        let (cache, _tmp) = create_cache(300);
        cache.put("bitcoin", json!([{"id": "bitcoin"}]), Utc::now());

        let stub = StubProvider::new(vec![candidate("bitcoin")], json!([]));
        let search_calls = stub.search_calls.clone();
        let (service, history) = create_service(stub, cache);

        let payload = service.lookup("Bitcoin").await.expect("Lookup should succeed");

        assert_eq!(payload, json!([{"id": "bitcoin"}]));
        assert_eq!(search_calls.load(Ordering::SeqCst), 0, "Fresh hit must not call upstream");
        assert!(
            history.recent(10).expect("Should query history").is_empty(),
            "Fresh hit must not write history"
        );
    }

    #[tokio::test]
    async fn test_miss_refreshes_and_records() {
        let (cache, _tmp) = create_cache(300);
        let payload = json!([{"id": "bitcoin", "current_price": 64000.0}]);
        let stub = StubProvider::new(vec![candidate("bitcoin")], payload.clone());
        let (service, history) = create_service(stub, cache.clone());

        let result = service.lookup("Bitcoin").await.expect("Lookup should succeed");

        assert_eq!(result, payload);
        let entry = cache.get("bitcoin").expect("Payload should be cached under the folded key");
        assert_eq!(entry.payload, payload);
        let records = history.recent(10).expect("Should query history");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query, "bitcoin");
    }

    #[tokio::test]
    async fn test_zero_candidates_short_circuits() {
        let (cache, _tmp) = create_cache(300);
        let stub = StubProvider::new(Vec::new(), json!([{"should": "not appear"}]));
        let markets_calls = stub.markets_calls.clone();
        let (service, history) = create_service(stub, cache.clone());

        let result = service.lookup("xyzzznotacoin").await.expect("Lookup should succeed");

        assert_eq!(result, json!([]));
        assert_eq!(markets_calls.load(Ordering::SeqCst), 0, "No market call without candidates");
        assert!(cache.is_empty(), "Empty result must not be cached");
        assert!(history.recent(10).expect("Should query history").is_empty());
    }

    #[tokio::test]
    async fn test_candidates_bounded_to_five() {
        let (cache, _tmp) = create_cache(300);
        let candidates: Vec<Candidate> = (0..7).map(|i| candidate(&format!("coin-{}", i))).collect();
        let stub = StubProvider::new(candidates, json!([]));
        let last_ids = stub.last_ids.clone();
        let (service, _history) = create_service(stub, cache);

        service.lookup("coin").await.expect("Lookup should succeed");

        let ids = last_ids.lock().expect("lock poisoned").clone();
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], "coin-0");
        assert_eq!(ids[4], "coin-4");
    }

    #[tokio::test]
    async fn test_upstream_failure_serves_stale_entry() {
        let (cache, _tmp) = create_cache(300);
        let stale_payload = json!([{"id": "bitcoin", "current_price": 1.0}]);
        // Stored well past the TTL, so the entry is expired but present
        cache.put("bitcoin", stale_payload.clone(), Utc::now() - Duration::seconds(400));

        let (service, history) = create_service(StubProvider::failing_search(), cache);

        let result = service.lookup("bitcoin").await.expect("Stale fallback should succeed");

        assert_eq!(result, stale_payload);
        assert!(history.recent(10).expect("Should query history").is_empty());
    }

    #[tokio::test]
    async fn test_markets_failure_also_falls_back() {
        let (cache, _tmp) = create_cache(300);
        let stale_payload = json!([{"id": "bitcoin"}]);
        cache.put("bitcoin", stale_payload.clone(), Utc::now() - Duration::seconds(400));

        let mut stub = StubProvider::new(vec![candidate("bitcoin")], json!([]));
        stub.fail_markets = true;
        let (service, _history) = create_service(stub, cache);

        let result = service.lookup("bitcoin").await.expect("Stale fallback should succeed");
        assert_eq!(result, stale_payload);
    }

    #[tokio::test]
    async fn test_upstream_failure_without_entry_surfaces_error() {
        let (cache, _tmp) = create_cache(300);
        let (service, _history) = create_service(StubProvider::failing_search(), cache);

        let result = service.lookup("bitcoin").await;

        assert!(matches!(result, Err(LookupError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_refresh() {
        let (cache, _tmp) = create_cache(300);
        cache.put("bitcoin", json!([{"current_price": 1.0}]), Utc::now() - Duration::seconds(400));

        let fresh_payload = json!([{"current_price": 2.0}]);
        let stub = StubProvider::new(vec![candidate("bitcoin")], fresh_payload.clone());
        let search_calls = stub.search_calls.clone();
        let (service, _history) = create_service(stub, cache.clone());

        let result = service.lookup("bitcoin").await.expect("Lookup should succeed");

        assert_eq!(search_calls.load(Ordering::SeqCst), 1, "Expired entry must refetch");
        assert_eq!(result, fresh_payload);
        let entry = cache.get("bitcoin").expect("Entry should exist");
        assert_eq!(entry.payload, fresh_payload, "Refresh replaces the entry wholesale");
    }
}
