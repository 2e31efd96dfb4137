//! REST host for domplay.
//!
//! The server plays the editor and page-chrome roles for a browser
//! front-end: it owns one [`Playground`] and exposes each editor instance
//! under `/api/instances/{id}`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use domplay_core::graph::Graph;
use domplay_core::playground::{Playground, PlaygroundConfig, PlaygroundError, Preview, RunState};
use domplay_core::sandbox::{Executor, SandboxExecutor};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared server state.
pub struct AppState {
    playground: Mutex<Playground>,
    executor: SandboxExecutor,
    config: ServerConfig,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Period of the simulation timer; `None` leaves ticking to clients.
    pub tick_interval: Option<Duration>,
    pub playground: PlaygroundConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3848,
            tick_interval: Some(Duration::from_millis(16)),
            playground: PlaygroundConfig::default(),
        }
    }
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            playground: Mutex::new(Playground::new(config.playground.clone())),
            executor: SandboxExecutor::new(config.playground.policy.clone()),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn playground(&self) -> MutexGuard<'_, Playground> {
        self.playground
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One timer tick for every instance. Returns how many are still moving.
    pub fn tick_all(&self) -> usize {
        self.playground().tick_all()
    }
}

/// Drive every simulation from a fixed-period timer until the task is dropped.
pub async fn run_ticker(state: Arc<AppState>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        state.tick_all();
    }
}

/// Bind `0.0.0.0:{port}`, start the simulation timer and serve until the
/// listener fails.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let port = config.port;
    let tick_interval = config.tick_interval;
    let state = Arc::new(AppState::new(config));
    let app = build_router(state.clone());

    if let Some(period) = tick_interval {
        tokio::spawn(run_ticker(state, period));
    }
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("domplay server listening on http://localhost:{port}");
    axum::serve(listener, app).await
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateParams {
    pub source: String,
    pub tree_visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    pub source: String,
    pub tree_visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleParams {
    pub visible: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TickParams {
    pub steps: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    Start,
    Move,
    End,
}

#[derive(Debug, Deserialize)]
pub struct DragParams {
    pub phase: DragPhase,
    pub node: usize,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ResizeParams {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct InstanceInfo {
    pub id: String,
    pub state: RunState,
    pub tree_visible: bool,
    pub generation: u64,
    pub preview: Preview,
}

#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub running: bool,
    pub ticks: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by every handler.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PlaygroundError> for ApiError {
    fn from(e: PlaygroundError) -> Self {
        let status = match &e {
            PlaygroundError::UnknownInstance(_) | PlaygroundError::UnknownNode { .. } => {
                StatusCode::NOT_FOUND
            }
            PlaygroundError::DuplicateInstance(_) => StatusCode::CONFLICT,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn instance_info(pg: &Playground, id: &str) -> Result<InstanceInfo, PlaygroundError> {
    Ok(InstanceInfo {
        id: id.to_string(),
        state: pg.state(id)?,
        tree_visible: pg.is_tree_visible(id)?,
        generation: pg.generation(id)?,
        preview: pg.preview(id)?.clone(),
    })
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/instances", post(create_instance).get(list_instances))
        .route(
            "/api/instances/{id}",
            put(put_instance).delete(delete_instance),
        )
        .route("/api/instances/{id}/run", post(run))
        .route("/api/instances/{id}/toggle", post(toggle))
        .route("/api/instances/{id}/tick", post(tick))
        .route("/api/instances/{id}/drag", post(drag))
        .route("/api/instances/{id}/resize", post(resize))
        .route("/api/instances/{id}/graph", get(graph))
        .route("/api/instances/{id}/scene", get(scene))
        .route("/api/instances/{id}/svg", get(svg))
        .route("/api/instances/{id}/preview", get(preview))
        .route("/api/instances/{id}/state", get(instance_state))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "no such route".into(),
    }
}

/// POST /api/instances  { source?, tree_visible? }
async fn create_instance(
    State(state): State<Arc<AppState>>,
    Json(params): Json<CreateParams>,
) -> ApiResult<(StatusCode, Json<InstanceInfo>)> {
    let id = Uuid::new_v4().to_string();
    let mut pg = state.playground();
    pg.register_with_toggle(&id, params.source, params.tree_visible.unwrap_or(true))?;
    info!(instance = %id, "instance created");
    Ok((StatusCode::CREATED, Json(instance_info(&pg, &id)?)))
}

/// GET /api/instances
async fn list_instances(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let ids = state
        .playground()
        .instance_ids()
        .into_iter()
        .map(String::from)
        .collect();
    Json(ids)
}

/// PUT /api/instances/{id}  { source, tree_visible? }
///
/// Creates the instance when it does not exist yet.
async fn put_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(params): Json<UpdateParams>,
) -> ApiResult<Json<InstanceInfo>> {
    let mut pg = state.playground();
    match pg.set_source(&id, params.source.clone()) {
        Ok(()) => {
            if let Some(visible) = params.tree_visible {
                if visible != pg.is_tree_visible(&id)? {
                    pg.toggle(&id, visible)?;
                }
            }
        }
        Err(PlaygroundError::UnknownInstance(_)) => {
            pg.register_with_toggle(&id, params.source, params.tree_visible.unwrap_or(true))?;
            info!(instance = %id, "instance created");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Json(instance_info(&pg, &id)?))
}

/// DELETE /api/instances/{id}
async fn delete_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.playground().remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/instances/{id}/run
///
/// The source executes outside the playground lock; a run that finishes
/// after a newer one started is reported as stale.
async fn run(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Response> {
    let (ticket, source) = {
        let mut pg = state.playground();
        let ticket = pg.begin_run(&id)?;
        (ticket, pg.source(&id)?.to_string())
    };

    let exec_state = state.clone();
    let result = tokio::task::spawn_blocking(move || exec_state.executor.execute(&source))
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("executor task failed: {e}"),
        })?;

    let outcome = state.playground().complete_run(ticket, result)?;
    debug!(instance = %id, outcome = ?outcome, "run finished");
    Ok(Json(outcome).into_response())
}

/// POST /api/instances/{id}/toggle  { visible }
async fn toggle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(params): Json<ToggleParams>,
) -> ApiResult<Response> {
    let outcome = state.playground().toggle(&id, params.visible)?;
    Ok(Json(outcome).into_response())
}

/// POST /api/instances/{id}/tick  { steps? }
async fn tick(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(params): Json<TickParams>,
) -> ApiResult<Json<TickResponse>> {
    let steps = params.steps.unwrap_or(1);
    let mut pg = state.playground();
    let mut ticks = 0;
    let mut running = pg.simulation(&id)?.is_some_and(|sim| sim.is_running());
    while ticks < steps && running {
        running = pg.tick(&id)?;
        ticks += 1;
    }
    Ok(Json(TickResponse { running, ticks }))
}

/// POST /api/instances/{id}/drag  { phase, node, x?, y? }
async fn drag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(params): Json<DragParams>,
) -> ApiResult<StatusCode> {
    let mut pg = state.playground();
    match params.phase {
        DragPhase::Start => pg.drag_start(&id, params.node)?,
        DragPhase::Move => {
            let (Some(x), Some(y)) = (params.x, params.y) else {
                return Err(ApiError::bad_request("drag move needs x and y"));
            };
            pg.drag_to(&id, params.node, x, y)?
        }
        DragPhase::End => pg.drag_end(&id, params.node)?,
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/instances/{id}/resize  { width, height }
async fn resize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(params): Json<ResizeParams>,
) -> ApiResult<StatusCode> {
    if !(params.width.is_finite() && params.height.is_finite()) {
        return Err(ApiError::bad_request("width and height must be finite"));
    }
    state.playground().resize(&id, params.width, params.height)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/instances/{id}/graph
///
/// The empty graph when no tree is shown.
async fn graph(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Graph>> {
    let pg = state.playground();
    let graph = pg.graph(&id)?.cloned().unwrap_or_else(Graph::empty);
    Ok(Json(graph))
}

/// GET /api/instances/{id}/scene  (`null` when nothing is drawn)
async fn scene(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Response> {
    let pg = state.playground();
    Ok(Json(pg.scene(&id)?).into_response())
}

/// GET /api/instances/{id}/svg
async fn svg(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Response> {
    let svg = state.playground().svg(&id)?;
    Ok(match svg {
        Some(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// GET /api/instances/{id}/preview
async fn preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Preview>> {
    let preview = state.playground().preview(&id)?.clone();
    Ok(Json(preview))
}

/// GET /api/instances/{id}/state
async fn instance_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<InstanceInfo>> {
    let pg = state.playground();
    Ok(Json(instance_info(&pg, &id)?))
}
