//! Relay HTTP server: routes, status mapping, graceful shutdown

use crate::service::RelayService;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parley_core::{
    CreateSessionRequest, CreateSessionResponse, ErrorBody, HistoryResponse, PollResponse,
    RelayError, SendMessageRequest, SendMessageResponse, UpdatedSessionsResponse,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Relay errors as HTTP responses with a JSON `detail` body.
pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Collaborator { .. } => StatusCode::BAD_GATEWAY,
            RelayError::StoreCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { detail: self.0.to_string() })).into_response()
    }
}

pub fn router(service: Arc<RelayService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/find", post(find_session_handler))
        .route("/api/sessions/updated", get(updated_sessions_handler))
        .route("/api/sessions/:session_id/history", get(history_handler))
        .route("/api/messages", post(send_message_handler))
        .route("/api/poll", get(poll_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(service)
}

/// Bind and serve until the token is cancelled. In-flight requests finish.
pub async fn serve(
    service: Arc<RelayService>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(service);
    info!("Relay API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn health_handler(State(service): State<Arc<RelayService>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": service.store().session_count(),
    }))
}

/// 201 when a session was created, 200 when an existing one was returned
/// (explicit id or participant-pair match).
async fn create_session_handler(
    State(service): State<Arc<RelayService>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (session_id, created) =
        service.create_or_find_session(&payload.participants, payload.session_id.as_deref())?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(CreateSessionResponse { session_id })))
}

async fn find_session_handler(
    State(service): State<Arc<RelayService>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session_id = service.find_session(&payload.participants)?;
    Ok(Json(CreateSessionResponse { session_id }))
}

async fn send_message_handler(
    State(service): State<Arc<RelayService>>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    service
        .send_message(&payload.session_id, &payload.user, &payload.message)
        .await?;
    Ok((StatusCode::CREATED, Json(SendMessageResponse { ok: true })))
}

#[derive(Deserialize)]
struct PollQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Read-only. A blank or missing session id answers `false` rather than
/// erroring, so transports can poll before their session exists.
async fn poll_handler(
    State(service): State<Arc<RelayService>>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, ApiError> {
    let session_id = query.session_id.unwrap_or_default();
    if session_id.trim().is_empty() {
        return Ok(Json(PollResponse { has_unseen: false }));
    }
    let has_unseen = service.poll(session_id.trim())?;
    Ok(Json(PollResponse { has_unseen }))
}

async fn updated_sessions_handler(
    State(service): State<Arc<RelayService>>,
) -> Json<UpdatedSessionsResponse> {
    Json(UpdatedSessionsResponse {
        session_ids: service.list_updated_sessions(),
    })
}

#[derive(Deserialize)]
struct HistoryQuery {
    clear_unseen: Option<bool>,
}

async fn history_handler(
    State(service): State<Arc<RelayService>>,
    AxumPath(session_id): AxumPath<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let clear_unseen = query.clear_unseen.unwrap_or(true);
    let (participants, messages) = service.read_history(&session_id, clear_unseen).await?;
    Ok(Json(HistoryResponse {
        participants,
        messages,
    }))
}
