use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::error::{NotYetAvailable, StoreError};
use crate::ingest::scheduler::RefreshRuntime;
use crate::model::Feed;
use crate::report::AnalysisReport;
use crate::snapshot::{FeedCache, FeedSnapshot, FeedStatus};
use crate::store::{self, DynStore};

/// Hint sent with 503 while a feed has not published yet.
pub const RETRY_AFTER_SECS: u64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub cache: FeedCache,
    pub store: DynStore,
    pub collection: String,
    /// Held so the shutdown channel outlives the router.
    pub runtime: Arc<RefreshRuntime>,
}

#[derive(Debug)]
pub enum ApiError {
    NotReady(NotYetAvailable),
    Store(StoreError),
    NoReport,
}

impl From<NotYetAvailable> for ApiError {
    fn from(e: NotYetAvailable) -> Self {
        ApiError::NotReady(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotReady(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                Json(json!({ "error": e.to_string(), "feed": e.feed.as_str() })),
            )
                .into_response(),
            ApiError::Store(e) => {
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::NoReport => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no analysis has been stored yet" })),
            )
                .into_response(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/health/feeds", get(feed_health))
        .route("/stocks", get(stocks))
        .route("/news", get(news))
        .route("/pizza", get(pizza))
        .route("/update", get(update))
        .route("/read", get(read_latest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Doomsday monitor",
        "endpoints": {
            "/stocks": "Latest defense stocks snapshot",
            "/news": "Latest news risk snapshot",
            "/pizza": "Latest Pentagon-area pizza busyness snapshot",
            "/update": "Compose the full analysis from live snapshots and persist it",
            "/read": "Most recent persisted analysis",
            "/health/feeds": "Per-feed refresh health",
            "/metrics": "Prometheus metrics"
        }
    }))
}

async fn feed_health(State(state): State<AppState>) -> Json<Vec<FeedStatus>> {
    Json(state.cache.status())
}

async fn stocks(State(state): State<AppState>) -> Result<Json<FeedSnapshot>, ApiError> {
    Ok(Json(state.cache.get(Feed::Quotes)?))
}

async fn news(State(state): State<AppState>) -> Result<Json<FeedSnapshot>, ApiError> {
    Ok(Json(state.cache.get(Feed::Risk)?))
}

async fn pizza(State(state): State<AppState>) -> Result<Json<FeedSnapshot>, ApiError> {
    Ok(Json(state.cache.get(Feed::Venues)?))
}

async fn update(State(state): State<AppState>) -> Result<Json<AnalysisReport>, ApiError> {
    let report = AnalysisReport::from_cache(&state.cache, Utc::now())?;
    store::persist_report(state.store.as_ref(), &state.collection, &report).await?;
    Ok(Json(report))
}

async fn read_latest(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    store::load_latest(state.store.as_ref(), &state.collection)
        .await?
        .map(Json)
        .ok_or(ApiError::NoReport)
}
