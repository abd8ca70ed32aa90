//! HTTP Boundary
//!
//! Thin axum router next to the WebSocket server:
//!
//! - `GET /seed`, `GET /seed/{mode}` -- fresh room id and its seed
//! - `POST /poe` -- sign a completion claim
//! - `GET|POST /ops/state` -- chaos knobs
//! - `GET /events/{roomId}/stream` -- SSE tail of a room's event log
//! - `GET /rooms/{roomId}` -- live room summary
//! - `GET /healthz`, `GET /readyz`, `GET /metrics`

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::network::ops::ChaosKnobs;
use crate::network::room::RoomInfo;
use crate::network::server::{AppState, ServerError, DEFAULT_MODE};
use crate::proof::receipt::ReceiptClaim;
use crate::store::EventTail;

/// Note returned by `/poe` when the receipt could not be stored.
pub const UNPERSISTED_NOTE: &str = "receipt signed but not persisted";

// =============================================================================
// ERRORS
// =============================================================================

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed request fields.
    #[error("bad request")]
    BadRequest,

    /// Unknown resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// A dependency is unreachable.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest => (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad request" }))).into_response(),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, Json(json!({ "error": what }))).into_response(),
            Self::Unavailable(why) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false, "error": why }))).into_response()
            }
        }
    }
}

// =============================================================================
// BODIES
// =============================================================================

/// Response of the seed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedResponse {
    /// Seed for the new room
    pub seed: String,
    /// Freshly generated room id
    pub room_id: String,
    /// Map format version
    pub map_version: u32,
    /// WebSocket URL to connect to
    pub ws: String,
}

/// Response of a successful `/poe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoeResponse {
    /// Always true
    pub ok: bool,
    /// Stored receipt id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    /// Hex signature
    pub signature: String,
    /// Present when the receipt was not stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Body of `POST /ops/state`; absent knobs reset to zero.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChaosUpdate {
    inject_latency_ms: Option<f64>,
    drop_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    from: Option<u64>,
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/seed", get(seed_default))
        .route("/seed/{mode}", get(seed_for_mode))
        .route("/poe", post(poe))
        .route("/ops/state", get(ops_get).post(ops_set))
        .route("/events/{room_id}/stream", get(event_stream))
        .route("/rooms/{room_id}", get(room_info))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on `listener` until the process ends.
pub async fn serve_http(state: Arc<AppState>, listener: TcpListener) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn seed_default(State(state): State<Arc<AppState>>) -> Json<SeedResponse> {
    Json(issue_seed(&state, DEFAULT_MODE))
}

async fn seed_for_mode(State(state): State<Arc<AppState>>, Path(mode): Path<String>) -> Json<SeedResponse> {
    Json(issue_seed(&state, &mode))
}

fn issue_seed(state: &AppState, mode: &str) -> SeedResponse {
    let room_id = uuid::Uuid::new_v4().to_string();
    SeedResponse {
        seed: state.registry.seed_for(mode, &room_id),
        room_id,
        map_version: state.config.room.map_version,
        ws: state.config.public_ws.clone(),
    }
}

async fn poe(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<PoeResponse>, ApiError> {
    let claim: ReceiptClaim = serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest)?;
    claim.validate().map_err(|_| ApiError::BadRequest)?;

    let issued = state.issuer.issue(claim).await;
    let note = issued.receipt_id.is_none().then(|| UNPERSISTED_NOTE.to_string());
    Ok(Json(PoeResponse {
        ok: true,
        receipt_id: issued.receipt_id,
        signature: issued.receipt.signature,
        note,
    }))
}

async fn ops_get(State(state): State<Arc<AppState>>) -> Json<ChaosKnobs> {
    Json(state.chaos.get().await)
}

async fn ops_set(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<ChaosKnobs>, ApiError> {
    let update: ChaosUpdate = if body.is_empty() {
        ChaosUpdate::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest)?
    };
    let knobs = ChaosKnobs::from_update(update.inject_latency_ms, update.drop_pct);
    state.chaos.set(knobs).await;
    warn!(inject_latency_ms = knobs.inject_latency_ms, drop_pct = knobs.drop_pct, "chaos knobs updated");
    Ok(Json(knobs))
}

async fn event_stream(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let store = state.store.clone();
    let tail = match query.from {
        Some(offset) => EventTail::from_offset(store, room_id, offset),
        None => EventTail::from_latest(store, room_id)
            .await
            .map_err(|e| ApiError::Unavailable(e.to_string()))?,
    };

    let events = tail.into_stream().filter_map(|record| async move {
        match Event::default().event("event").json_data(&record) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(offset = record.offset, error = %e, "event not encodable for stream");
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn room_info(State(state): State<Arc<AppState>>, Path(room_id): Path<String>) -> Result<Json<RoomInfo>, ApiError> {
    let room = state
        .registry
        .get(&room_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("room {room_id}")))?;
    let info = room.read().await.info();
    Ok(Json(info))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn readyz(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .store
        .ping()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(json!({ "ok": true, "store": state.store.backend() })))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rooms = state.registry.room_count().await;
    let connections = state.registry.connection_count().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(rooms, connections),
    )
}
