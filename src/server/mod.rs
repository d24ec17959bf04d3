use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::controller::{self, BuildOutcome, Navigation};
use crate::errors::BlueprintError;
use crate::pipeline::Pipeline;
use crate::wire::{CodeBundle, ConceptsRequest, DesignConcept, GenerateCodeRequest};
use crate::wizard::{Session, WizardState};

/// Sketches arrive as base64 data URLs and can be large.
const BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Sessions untouched for this long are evicted when a new one is created.
pub const SESSION_IDLE: Duration = Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    /// Wizard misuse is the caller's problem; everything else is ours.
    pub fn internal(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<BlueprintError>() {
            Some(BlueprintError::Wizard(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("API error: {err:#}");
        }
        Self {
            status,
            message: format!("{err:#}"),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct SessionEntry {
    session: Session,
    touched: Instant,
}

/// In-memory session registry. Nothing persists; sessions leave on DELETE or
/// after [`SESSION_IDLE`] without a request.
#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    fn session(&self, id: Uuid) -> Result<Session, AppError> {
        self.sessions
            .write()
            .get_mut(&id)
            .map(|e| {
                e.touched = Instant::now();
                e.session.clone()
            })
            .ok_or_else(|| AppError::not_found(format!("session {id} not found")))
    }

    fn insert(&self, id: Uuid, session: Session, now: Instant) {
        self.sessions.write().insert(id, SessionEntry { session, touched: now });
    }

    /// Drop sessions idle for longer than [`SESSION_IDLE`]; returns how many.
    fn evict_idle(&self, now: Instant) -> usize {
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, e| now.saturating_duration_since(e.touched) <= SESSION_IDLE);
        before - map.len()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub state: WizardState,
    pub redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildOutcome>,
}

impl SessionResponse {
    fn new(id: Uuid, session: &Session, nav: Navigation) -> Self {
        Self { id, state: session.snapshot(), redirect: nav.redirect(), build: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct IntentBody {
    #[serde(default)]
    pub intent: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchBody {
    #[serde(default)]
    pub sketch_data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBody {
    pub concept_id: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/concepts", post(concepts))
        .route("/api/generate-code", post(generate_code))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/intent", post(session_intent))
        .route("/api/sessions/{id}/sketch", post(session_sketch))
        .route("/api/sessions/{id}/select", get(session_select_guard).post(session_select))
        .route("/api/sessions/{id}/confirm", post(session_confirm))
        .route("/api/sessions/{id}/build", post(session_build))
        .route("/api/sessions/{id}/reset", post(session_reset))
        .route("/api/sessions/{id}/next", post(session_next))
        .route("/api/sessions/{id}/prev", post(session_prev))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pipeline: Pipeline, bind: &str, port: u16) -> Result<()> {
    let app = build_router(AppState::new(pipeline));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("blueprint listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("blueprint shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Stateless handlers
// ---------------------------------------------------------------------------

async fn concepts(
    State(state): State<AppState>,
    Json(body): Json<ConceptsRequest>,
) -> Result<Json<Vec<DesignConcept>>, AppError> {
    let concepts = state
        .pipeline
        .concepts(&body.intent, &body.sketch_data, &body.metadata)
        .await?;
    Ok(Json(concepts))
}

async fn generate_code(
    State(state): State<AppState>,
    Json(body): Json<GenerateCodeRequest>,
) -> Result<Json<CodeBundle>, AppError> {
    let bundle = state.pipeline.generate_code(&body.intent, &body.concept).await?;
    Ok(Json(bundle))
}

// ---------------------------------------------------------------------------
// Session handlers
// ---------------------------------------------------------------------------

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let now = Instant::now();
    let evicted = state.evict_idle(now);
    if evicted > 0 {
        tracing::debug!(evicted, "idle sessions evicted");
    }
    let id = Uuid::new_v4();
    let session = Session::new();
    state.insert(id, session.clone(), now);
    tracing::debug!(%id, "session created");
    (StatusCode::CREATED, Json(SessionResponse::new(id, &session, Navigation::Stay)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    Ok(Json(SessionResponse::new(id, &session, Navigation::Stay)))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    match state.sessions.write().remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::not_found(format!("session {id} not found"))),
    }
}

async fn session_intent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<IntentBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    let nav = controller::submit_intent(&session, &body.intent);
    Ok(Json(SessionResponse::new(id, &session, nav)))
}

async fn session_sketch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SketchBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    let nav = controller::generate_concepts(&session, &state.pipeline, &body.sketch_data).await?;
    Ok(Json(SessionResponse::new(id, &session, nav)))
}

async fn session_select_guard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    let nav = controller::select_guard(&session);
    Ok(Json(SessionResponse::new(id, &session, nav)))
}

async fn session_select(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SelectBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    controller::select_concept(&session, &body.concept_id)?;
    Ok(Json(SessionResponse::new(id, &session, Navigation::Stay)))
}

async fn session_confirm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    let nav = controller::confirm_selection(&session);
    Ok(Json(SessionResponse::new(id, &session, nav)))
}

async fn session_build(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    let outcome = controller::build(&session, &state.pipeline).await?;
    let mut resp = SessionResponse::new(id, &session, Navigation::Stay);
    resp.build = Some(outcome);
    Ok(Json(resp))
}

async fn session_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    let nav = controller::restart(&session);
    Ok(Json(SessionResponse::new(id, &session, nav)))
}

async fn session_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    session.with(|s| s.next_step());
    Ok(Json(SessionResponse::new(id, &session, Navigation::Stay)))
}

async fn session_prev(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id)?;
    session.with(|s| s.prev_step());
    Ok(Json(SessionResponse::new(id, &session, Navigation::Stay)))
}
