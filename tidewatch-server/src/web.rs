//! REST and WebSocket API
//!
//! | Route | |
//! |---|---|
//! | `GET /v1/tracks` | live tracks in creation order |
//! | `GET /v1/tracks/{id}` | one track, 404 if unknown or evicted |
//! | `DELETE /v1/tracks/{id}` | drop a track with its estimator and pair |
//! | `GET /v1/tracks/{id}/prediction` | one-step prediction, estimator left as is |
//! | `GET /v1/stats` | pool and track counts plus counters |
//! | `GET /v1/snapshot` | contacts, tracks and statistics in one read |
//! | `GET /v1/stream` | WebSocket, one JSON message per track change |
//!
//! The stream carries the track itself on every upsert and
//! `{"removed": id, "reason": "merged" | "evicted" | "removed"}` when a
//! track leaves the list.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_graceful_shutdown::SubsystemHandle;
use tidewatch_core::{
    FusedTrack, FusionEngine, FusionStatistics, GeoPoint, ProcessingCounters, RemovalReason,
    Snapshot,
};

/// Track updates buffered per WebSocket client before it starts lagging
const STREAM_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no track {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<FusionEngine>,
    updates: broadcast::Sender<String>,
}

#[derive(Serialize)]
struct Stats {
    statistics: FusionStatistics,
    counters: ProcessingCounters,
}

#[derive(Serialize)]
struct Removal<'a> {
    removed: &'a str,
    reason: RemovalReason,
}

#[derive(Serialize)]
struct Prediction {
    id: String,
    position: GeoPoint,
}

pub struct WebServer {
    port: u16,
    state: AppState,
}

impl WebServer {
    /// Build the server and hook it into the engine's listeners
    pub fn new(engine: Arc<FusionEngine>, port: u16) -> Self {
        let (updates, _) = broadcast::channel(STREAM_CAPACITY);

        let sender = updates.clone();
        engine.register_listener(move |track: &FusedTrack| {
            if sender.receiver_count() == 0 {
                return;
            }
            match serde_json::to_string(track) {
                Ok(json) => {
                    let _ = sender.send(json);
                }
                Err(e) => log::warn!("Cannot serialize track {}: {}", track.id, e),
            }
        });

        let sender = updates.clone();
        engine.register_removal_listener(move |id: &str, reason: RemovalReason| {
            if sender.receiver_count() == 0 {
                return;
            }
            match serde_json::to_string(&Removal { removed: id, reason }) {
                Ok(json) => {
                    let _ = sender.send(json);
                }
                Err(e) => log::warn!("Cannot serialize removal of {}: {}", id, e),
            }
        });

        WebServer {
            port,
            state: AppState { engine, updates },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/tracks", get(list_tracks))
            .route("/v1/tracks/{id}", get(get_track).delete(delete_track))
            .route("/v1/tracks/{id}/prediction", get(predict_track))
            .route("/v1/stats", get(stats))
            .route("/v1/snapshot", get(snapshot))
            .route("/v1/stream", get(stream))
            .with_state(self.state.clone())
    }

    pub async fn run(self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port));
        let listener = TcpListener::bind(addr).await?;
        log::info!("HTTP server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { subsys.on_shutdown_requested().await })
            .await?;

        log::debug!("HTTP server stopped");
        Ok(())
    }
}

async fn list_tracks(State(state): State<AppState>) -> Json<Vec<FusedTrack>> {
    Json(state.engine.fused_tracks())
}

async fn get_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FusedTrack>, ApiError> {
    state.engine.track(&id).map(Json).ok_or(ApiError::NotFound(id))
}

async fn delete_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.engine.remove_track(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}

async fn predict_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Prediction>, ApiError> {
    // Reading the track evicts it first if it went stale
    if state.engine.track(&id).is_none() {
        return Err(ApiError::NotFound(id));
    }
    match state.engine.predict_track(&id) {
        Some(position) => Ok(Json(Prediction { id, position })),
        None => Err(ApiError::NotFound(id)),
    }
}

async fn stats(State(state): State<AppState>) -> Json<Stats> {
    Json(Stats {
        statistics: state.engine.statistics(),
        counters: state.engine.counters(),
    })
}

async fn snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.engine.snapshot())
}

async fn stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.updates.subscribe();
    ws.on_upgrade(move |socket| handle_stream_client(socket, rx))
}

async fn handle_stream_client(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    log::debug!("Stream client connected");

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("Stream client lagged, skipped {} updates", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        log::debug!("Stream client error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    log::debug!("Stream client disconnected");
}
