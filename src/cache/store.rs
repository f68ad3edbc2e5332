//! TTL-aware cache store backed by a single JSON snapshot file
//!
//! Provides a `CacheStore` that keeps upstream lookup results in memory keyed
//! by normalized query, mirrors the full mapping to disk on every write, and
//! supports stale reads for graceful degradation when the upstream API is
//! unavailable.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// A single cached lookup result
///
/// The payload is the upstream response stored verbatim; a refresh replaces
/// the whole entry rather than mutating it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The upstream market data, served back to clients as-is
    pub payload: Value,
    /// When the entry was last refreshed from upstream
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Returns true if the entry is still fresh at `now`
    ///
    /// An entry is fresh while `now - stored_at < ttl`; at exactly the TTL
    /// boundary it is stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.stored_at < ttl
    }
}

/// Durable, TTL-aware key-value cache for upstream lookup results
///
/// The store owns an in-memory mapping from normalized query to `CacheEntry`
/// for the lifetime of the process. Every successful `put` rewrites the full
/// mapping to the snapshot file, and `load` repopulates the mapping from that
/// file once at startup. Entries are never evicted; the TTL only governs
/// freshness, and expired entries remain readable through `get` so callers
/// can serve them when a refresh fails.
#[derive(Debug)]
pub struct CacheStore {
    /// In-memory mapping, guarded for concurrent request handlers
    entries: Mutex<HashMap<String, CacheEntry>>,
    /// Path of the on-disk snapshot document
    snapshot_path: PathBuf,
    /// Fixed freshness window applied to every entry
    ttl: Duration,
}

impl CacheStore {
    /// Loads the cache from the snapshot file, or starts empty
    ///
    /// A missing, unreadable, or unparsable snapshot never fails startup;
    /// the store begins with an empty mapping and a warning is logged.
    ///
    /// # Arguments
    /// * `snapshot_path` - Where the snapshot document lives on disk
    /// * `ttl` - Freshness window applied to every entry
    pub fn load(snapshot_path: PathBuf, ttl: Duration) -> Self {
        let entries = match fs::read_to_string(&snapshot_path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&raw) {
                Ok(map) => {
                    info!("Cache loaded from {} with {} entries", snapshot_path.display(), map.len());
                    map
                }
                Err(err) => {
                    warn!("Cache snapshot {} is unparsable, starting empty: {}", snapshot_path.display(), err);
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                warn!("Failed to read cache snapshot {}, starting empty: {}", snapshot_path.display(), err);
                HashMap::new()
            }
        };

        Self {
            entries: Mutex::new(entries),
            snapshot_path,
            ttl,
        }
    }

    /// Returns the entry for `key` regardless of freshness
    ///
    /// Used by the degraded path: an expired entry is still a better answer
    /// than no answer when the upstream API is down.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock_entries().get(key).cloned()
    }

    /// Returns the entry for `key` only if it is fresh at `now`
    pub fn get_fresh(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.lock_entries()
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .cloned()
    }

    /// Inserts or replaces the entry for `key` and flushes the snapshot
    ///
    /// The whole mapping is rewritten to disk synchronously. A write failure
    /// is logged and absorbed so the in-flight request still succeeds; the
    /// next successful `put` re-attempts persistence.
    pub fn put(&self, key: &str, payload: Value, now: DateTime<Utc>) {
        let serialized = {
            let mut entries = self.lock_entries();
            entries.insert(
                key.to_string(),
                CacheEntry {
                    payload,
                    stored_at: now,
                },
            );
            serde_json::to_string_pretty(&*entries)
        };

        match serialized {
            Ok(document) => {
                if let Err(err) = self.flush(&document) {
                    warn!("Failed to write cache snapshot {}: {}", self.snapshot_path.display(), err);
                }
            }
            Err(err) => {
                warn!("Failed to serialize cache snapshot: {}", err);
            }
        }
    }

    /// Number of entries currently in the mapping
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Returns true if the mapping holds no entries
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// The freshness window applied to every entry
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the snapshot document via a sibling temp file and rename,
    /// so a crash or concurrent writer never leaves a partial document.
    fn flush(&self, document: &str) -> io::Result<()> {
        if let Some(parent) = self.snapshot_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.snapshot_path.with_extension("json.tmp");
        fs::write(&tmp_path, document)?;
        fs::rename(&tmp_path, &self.snapshot_path)
    }
}
