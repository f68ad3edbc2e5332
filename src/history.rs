//! Search history storage
//!
//! SQLite-backed append-only log of search queries. Records are never updated
//! or deleted; the monotonic row id defines recency, and the HTTP layer reads
//! back the most recent entries newest-first.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when reading or writing search history
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Underlying SQLite error
    #[error("History database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A single recorded search query
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    /// Monotonic row id; higher means more recent
    pub id: i64,
    /// The search term as it reached the lookup layer
    pub query: String,
    /// Insertion timestamp
    pub created_at: DateTime<Utc>,
}

/// Append-only store for search history
///
/// Cloning is cheap; clones share the same underlying connection.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl HistoryStore {
    /// Opens (or creates) the history database at the given path
    ///
    /// The schema is applied on open. An unopenable database is a startup
    /// failure; the service cannot run without its history store.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory history store, used by tests
    pub fn open_in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS search_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Appends a query to the history log
    pub fn append(&self, query: &str, now: DateTime<Utc>) -> Result<(), HistoryError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO search_history (query, created_at) VALUES (?1, ?2)",
            (query, now.to_rfc3339()),
        )?;
        Ok(())
    }

    /// Returns the most recent records, newest first
    ///
    /// # Arguments
    /// * `limit` - Maximum number of records to return
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, query, created_at FROM search_history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            let created_at: String = row.get(2)?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(err),
                    )
                })?;
            Ok(HistoryRecord {
                id: row.get(0)?,
                query: row.get(1)?,
                created_at,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
