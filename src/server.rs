//! HTTP server and API routes
//!
//! Exposes the lookup and history operations over HTTP:
//!
//! - `GET /api/search/:query` - market data for a search term (cached)
//! - `GET /api/history` - the 10 most recent searches, newest first
//! - `POST /api/history` - record a search query directly
//!
//! CORS is permissive so a browser frontend on another origin can call the
//! API directly.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::data::MarketClient;
use crate::history::{HistoryRecord, HistoryStore};
use crate::lookup::LookupService;

/// How many history records the history endpoint returns
const HISTORY_LIMIT: usize = 10;

/// Shared state handed to every request handler
pub struct AppState {
    lookup: LookupService<MarketClient>,
    history: HistoryStore,
}

/// Errors surfaced to HTTP clients as a JSON error envelope
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upstream fetch failed and no cache entry could substitute
    #[error("API fetch failed")]
    UpstreamFailed,

    /// The history store could not be read
    #[error("Failed to load search history")]
    HistoryUnavailable,

    /// The history store could not be written
    #[error("Failed to save search history")]
    SaveFailed,

    /// A required query parameter or body field is missing
    #[error("Missing query")]
    MissingQuery,
}

impl ApiError {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingQuery => StatusCode::BAD_REQUEST,
            ApiError::UpstreamFailed | ApiError::HistoryUnavailable | ApiError::SaveFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}

/// The coinscout HTTP server
pub struct AppServer {
    port: u16,
    state: Arc<AppState>,
}

impl AppServer {
    /// Creates a new server from its injected collaborators
    pub fn new(port: u16, lookup: LookupService<MarketClient>, history: HistoryStore) -> Self {
        Self {
            port,
            state: Arc::new(AppState { lookup, history }),
        }
    }

    /// Binds and serves until the process is stopped
    pub async fn run(&self) -> std::io::Result<()> {
        let app = self.create_router();
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));

        info!("Backend running on port {}", self.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await
    }

    fn create_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        Router::new()
            .route("/api/search/:query", get(search))
            .route("/api/history", get(history).post(save_search))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Port the server will bind to
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// GET /api/search/:query
///
/// Returns a JSON array of market entries for the search term, `[]` when no
/// coin matches. Serves the cache when fresh and falls back to stale cache
/// data when the upstream is unavailable.
async fn search(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.lookup.lookup(&query).await {
        Ok(payload) => Ok(Json(payload)),
        Err(err) => {
            error!("Error fetching market data for {}: {}", query, err);
            Err(ApiError::UpstreamFailed)
        }
    }
}

/// GET /api/history
///
/// Returns the 10 most recent search queries, newest first.
async fn history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    match state.history.recent(HISTORY_LIMIT) {
        Ok(records) => Ok(Json(records)),
        Err(err) => {
            error!("Error fetching history: {}", err);
            Err(ApiError::HistoryUnavailable)
        }
    }
}

/// Query parameters accepted by the save-search endpoint
#[derive(Debug, Deserialize)]
struct SaveSearchParams {
    q: Option<String>,
}

/// JSON body accepted by the save-search endpoint
#[derive(Debug, Deserialize)]
struct SaveSearchBody {
    q: Option<String>,
}

/// POST /api/history
///
/// Records a search query directly, taking the term from the JSON body or
/// the `q` query parameter.
async fn save_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SaveSearchParams>,
    body: Option<Json<SaveSearchBody>>,
) -> Result<Json<Value>, ApiError> {
    let query = body
        .and_then(|Json(body)| body.q)
        .or(params.q)
        .filter(|q| !q.is_empty())
        .ok_or(ApiError::MissingQuery)?;

    state.history.append(&query, Utc::now()).map_err(|err| {
        error!("Error saving search {}: {}", query, err);
        ApiError::SaveFailed
    })?;

    Ok(Json(json!({ "ok": true })))
}
