//! HTTP + WebSocket API for markerlock
//!
//! Endpoints:
//! - POST /session/new - Create new session
//! - GET /session/{id} - Get session status
//! - POST /session/{id}/tick - Feed one observation batch
//! - POST /session/{id}/control - Run a control call
//! - GET /session/{id}/layout - Get the locked layout snapshot
//! - WS /ws/{id} - Live tick outputs
//! - GET /health - Health check

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::core::{MarkerSession, SnapshotGenerator};
use crate::types::{
    LayoutSnapshot, LockerState, MarkerError, ObservationBatch, ReasonCode, TickOutput,
    TrackerConfig, TrustMode,
};

/// One hosted session plus its live update channel
#[derive(Debug)]
pub struct HostedSession {
    pub session: MarkerSession,
    pub update_tx: broadcast::Sender<TickOutput>,
}

/// App state
#[derive(Debug, Default)]
pub struct AppState {
    pub sessions: RwLock<HashMap<String, HostedSession>>,
}

/// Create new session request
#[derive(Debug, Default, Deserialize)]
pub struct NewSessionRequest {
    #[serde(default)]
    pub config: Option<TrackerConfig>,
}

/// Create new session response
#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
}

/// Session status response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub trust_mode: TrustMode,
    pub locker_state: LockerState,
    pub current_trust: f64,
    pub visible: Vec<String>,
    pub locked_count: usize,
    pub total_hits: u64,
}

/// Control calls available over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    BeginSetup,
    BeginCollect,
    BeginGameplay,
    Retry,
    Reset,
}

/// Control request
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub action: ControlAction,
    /// Session time the call applies at
    #[serde(default)]
    pub time: f64,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, err: &MarkerError) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: err.reason().code().to_string(),
            message: err.to_string(),
        }),
    )
}

fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            code: "NOT_FOUND".to_string(),
            message: "unknown session".to_string(),
        }),
    )
}

/// Create the API router
pub fn create_router() -> Router {
    let state = Arc::new(AppState::default());

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session))
        .route("/session/:id/tick", post(tick_session))
        .route("/session/:id/control", post(control_session))
        .route("/session/:id/layout", get(get_layout))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
    })
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, ApiError> {
    let config = req.config.unwrap_or_default();
    let session = MarkerSession::new(config).map_err(|e| {
        log::warn!("session rejected: {}", e);
        api_error(StatusCode::BAD_REQUEST, &e)
    })?;

    let session_id = generate_session_id();
    let (tx, _) = broadcast::channel(100);

    let mut sessions = state.sessions.write().await;
    sessions.insert(
        session_id.clone(),
        HostedSession {
            session,
            update_tx: tx,
        },
    );
    log::info!("session {} created", session_id);

    Ok(Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
    }))
}

fn status_of(id: String, session: &MarkerSession) -> SessionStatusResponse {
    SessionStatusResponse {
        session_id: id,
        trust_mode: session.trust_mode(),
        locker_state: session.locker_state(),
        current_trust: session.current_trust(),
        visible: session.tracker().visible_ids(),
        locked_count: session.aggregator().locked_count(),
        total_hits: session.hits().total_hits(),
    }
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let sessions = state.sessions.read().await;
    let hosted = sessions.get(&id).ok_or_else(not_found)?;
    Ok(Json(status_of(id, &hosted.session)))
}

/// Feed one observation batch
async fn tick_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(batch): Json<ObservationBatch>,
) -> Result<Json<TickOutput>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let hosted = sessions.get_mut(&id).ok_or_else(not_found)?;

    let output = hosted.session.tick(batch.time, &batch.observations);
    // no subscribers is fine
    let _ = hosted.update_tx.send(output.clone());

    Ok(Json(output))
}

/// Run a control call
async fn control_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let hosted = sessions.get_mut(&id).ok_or_else(not_found)?;
    let session = &mut hosted.session;

    let result = match req.action {
        ControlAction::BeginSetup => session.begin_setup(req.time),
        ControlAction::BeginCollect => {
            session.begin_collect(req.time);
            Ok(())
        }
        ControlAction::BeginGameplay => session.begin_gameplay().map(|_| ()),
        ControlAction::Retry => session.retry(req.time),
        ControlAction::Reset => {
            session.reset();
            Ok(())
        }
    };
    result.map_err(|e| api_error(StatusCode::CONFLICT, &e))?;

    Ok(Json(status_of(id, session)))
}

/// Get the locked layout
async fn get_layout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LayoutSnapshot>, ApiError> {
    let sessions = state.sessions.read().await;
    let hosted = sessions.get(&id).ok_or_else(not_found)?;

    SnapshotGenerator::new()
        .generate(hosted.session.aggregator(), hosted.session.trust())
        .map(Json)
        .map_err(|e| match e.reason() {
            ReasonCode::R501_SNAPSHOT_NOT_LOCKED => api_error(StatusCode::NOT_FOUND, &e),
            _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, &e),
        })
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.read().await;
    let hosted = sessions.get(&id).ok_or_else(not_found)?;
    let rx = hosted.update_tx.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    }))
}

/// Handle WebSocket connection
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<TickOutput>) {
    loop {
        let output = match rx.recv().await {
            Ok(output) => output,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("websocket subscriber lagged, {} updates skipped", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let json = match serde_json::to_string(&output) {
            Ok(json) => json,
            Err(e) => {
                log::error!("tick output not serializable: {}", e);
                continue;
            }
        };
        if socket.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate session ID
fn generate_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("session_{:x}_{}", millis, n)
}

/// Run the API server
pub async fn run_server(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("markerlock API running on {}", addr);
    println!("  POST /session/new          - Create session");
    println!("  GET  /session/:id          - Get status");
    println!("  POST /session/:id/tick     - Feed observations");
    println!("  POST /session/:id/control  - Control call");
    println!("  GET  /session/:id/layout   - Locked layout");
    println!("  WS   /ws/:id               - Live updates");
    println!("  GET  /health               - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
