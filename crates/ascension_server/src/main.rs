use ascension_core::{
    metrics::init_logging, Collaborators, Engine, EngineConfig, EngineError, Host, TokioClock,
};
use ascension_core::collab::LogIntegrator;
use ascension_io::{BackgroundStore, FileStore};
use ascension_observer::{HeuristicNarrator, Herald, Narration};
use ascension_data::{EngineSnapshot, PhaseSnapshot};
use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;

/// Server state: the scheduled engine plus the narration queue it reports to.
struct AppState {
    host: Host,
    herald: Arc<Herald>,
    /// Required bearer token for intents; `None` leaves them open.
    api_key: Option<String>,
}

fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("ASCENSION_CONFIG").ok().filter(|p| !p.is_empty()) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            tracing::info!("Loaded configuration from {}", path);
            EngineConfig::from_toml(&content)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let state_path =
        std::env::var("ASCENSION_STATE").unwrap_or_else(|_| "./ascension_world.json".into());

    let herald = Arc::new(Herald::new(Box::new(HeuristicNarrator)));
    let collaborators = Collaborators {
        store: Box::new(BackgroundStore::new(FileStore::new(&state_path))),
        notifier: Box::new(Arc::clone(&herald)),
        integrator: Box::new(LogIntegrator),
    };
    let engine = match Engine::new(&config, collaborators) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to build engine: {}", e);
            std::process::exit(1);
        }
    };
    let host = Host::new(engine, config.schedule.clone(), Arc::new(TokioClock::default()));
    host.start();

    let api_key = std::env::var("ASCENSION_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled for write endpoints");
    } else {
        tracing::warn!("No ASCENSION_API_KEY set, write endpoints are open");
    }

    let state = Arc::new(AppState {
        host,
        herald,
        api_key,
    });
    let app = router(Arc::clone(&state)).layer(CorsLayer::permissive());

    let addr: SocketAddr = std::env::var("ASCENSION_ADDR")
        .ok()
        .and_then(|a| a.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));
    tracing::info!("Ascension server listening on {}", addr);
    tracing::info!("    Snapshot API: http://{}/api/snapshot", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await;
    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
    }
    if let Err(e) = state.host.shutdown() {
        tracing::error!("Final save failed: {}", e);
        std::process::exit(1);
    }
}

fn router(state: Arc<AppState>) -> Router {
    let intents = Router::new()
        .route("/api/phases/:id/activate", post(activate_phase))
        .route("/api/phases/:id/deactivate", post(deactivate_phase))
        .route("/api/pools/:id/shares", post(set_share))
        .route("/api/capabilities/:id/unlock", post(unlock_capability))
        .route("/api/techniques/:id/activate", post(activate_technique))
        .route("/api/techniques/:id/deactivate", post(deactivate_technique))
        .route("/api/autonomous", post(set_autonomous))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/narrations", get(get_narrations))
        .merge(intents)
        .with_state(state)
}

/// Engine errors as HTTP responses: gate failures are conflicts the UI shows
/// as "not ready", bad input is 400, unknown ids 404.
struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidShare { .. } => StatusCode::BAD_REQUEST,
            EngineError::UnknownEntity { .. } => StatusCode::NOT_FOUND,
            EngineError::ContractViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::RequirementNotMet { .. }
            | EngineError::MaxLevelReached { .. }
            | EngineError::OnCooldown { .. }
            | EngineError::CapabilityTooLow { .. } => StatusCode::CONFLICT,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string(), "kind": self.0.kind() })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Write endpoints need `Authorization: Bearer <key>` once a key is configured.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")));
    if presented == Some(expected) {
        return next.run(request).await;
    }
    tracing::warn!(path = %request.uri().path(), "Rejected intent without a valid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "invalid or missing API key", "kind": "unauthorized" })),
    )
        .into_response()
}

async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<EngineSnapshot> {
    Json(state.host.snapshot())
}

async fn get_narrations(State(state): State<Arc<AppState>>) -> Json<Vec<Narration>> {
    Json(state.herald.narrations())
}

fn phase_state(state: &AppState, id: &str) -> Json<Option<PhaseSnapshot>> {
    Json(state.host.snapshot().phase(id).cloned())
}

async fn activate_phase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Option<PhaseSnapshot>> {
    state.host.activate_phase(&id)?;
    Ok(phase_state(&state, &id))
}

async fn deactivate_phase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Option<PhaseSnapshot>> {
    state.host.deactivate_phase(&id)?;
    Ok(phase_state(&state, &id))
}

#[derive(Deserialize)]
struct ShareRequest {
    name: String,
    value: f64,
}

async fn set_share(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ShareRequest>,
) -> Result<Response, ApiError> {
    let pool = state.host.with_engine(|engine, _| {
        engine.set_share(&id, &req.name, req.value)?;
        Ok::<_, EngineError>(engine.pool(&id).map(|p| p.snapshot()))
    })?;
    Ok(Json(pool).into_response())
}

async fn unlock_capability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let level = state
        .host
        .with_engine(|engine, _| engine.unlock_capability(&id))?;
    Ok(Json(serde_json::json!({ "id": id, "level": level })))
}

async fn activate_technique(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let technique = state.host.with_engine(|engine, now| {
        engine.activate_technique(&id, now)?;
        Ok::<_, EngineError>(engine.snapshot(now).technique(&id).cloned())
    })?;
    Ok(Json(technique).into_response())
}

async fn deactivate_technique(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let changed = state
        .host
        .with_engine(|engine, _| engine.deactivate_technique(&id))?;
    Ok(Json(serde_json::json!({ "id": id, "changed": changed })))
}

#[derive(Deserialize)]
struct AutonomousRequest {
    enabled: bool,
}

async fn set_autonomous(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutonomousRequest>,
) -> Json<serde_json::Value> {
    state.host.set_autonomous(req.enabled);
    Json(serde_json::json!({ "autonomous": req.enabled }))
}
