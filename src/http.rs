//! HTTP API surface.
//!
//! JSON over HTTP with axum. Handlers are thin: they deserialize
//! query parameters into the façade's typed args, dispatch, and map
//! errors to their HTTP status codes. Ingest runs on the blocking pool
//! since the store write path is synchronous.

use crate::config::{BuildInfo, Config};
use crate::error::ServiceError;
use crate::grep::{GrepPipeline, GrepRequest};
use crate::ingest::{IngestRequest, Ingestor};
use crate::memory::MemoryIndex;
use crate::query::{
    BrowseAssetsArgs, BrowseModuleArgs, ExplainTypeArgs, FindAssetArgs, FindChildrenArgs,
    FindFileArgs, FindMemberArgs, FindTypeArgs, ListAssetFoldersArgs, ListModulesArgs,
    QueryRequest, QueryService,
};
use ahash::AHashMap;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Watcher heartbeats older than this are pruned.
const HEARTBEAT_TTL: Duration = Duration::from_secs(60);
/// Maximum queries per /batch call.
const BATCH_LIMIT: usize = 10;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
    pub grep: Arc<GrepPipeline>,
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<crate::store::Store>,
    pub memory: Arc<RwLock<MemoryIndex>>,
    pub config: Arc<Config>,
    pub build: BuildInfo,
    pub started: Instant,
    heartbeats: Arc<Mutex<AHashMap<String, Instant>>>,
}

impl AppState {
    pub fn new(
        query: Arc<QueryService>,
        grep: Arc<GrepPipeline>,
        ingestor: Arc<Ingestor>,
        store: Arc<crate::store::Store>,
        memory: Arc<RwLock<MemoryIndex>>,
        config: Arc<Config>,
        build: BuildInfo,
    ) -> Self {
        Self {
            query,
            grep,
            ingestor,
            store,
            memory,
            config,
            build,
            started: Instant::now(),
            heartbeats: Arc::new(Mutex::new(AHashMap::new())),
        }
    }
}

/// Error payload; `hints` guides callers toward a working query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hints: Vec<String>,
}

struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.code(),
            message: self.0.to_string(),
            hints: self.0.hints(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = std::result::Result<Response, ApiError>;

/// Builds the router with every endpoint of the API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/find-type", get(find_type))
        .route("/find-member", get(find_member))
        .route("/find-file", get(find_file))
        .route("/find-asset", get(find_asset))
        .route("/find-children", get(find_children))
        .route("/list-modules", get(list_modules))
        .route("/browse-module", get(browse_module))
        .route("/browse-assets", get(browse_assets))
        .route("/list-asset-folders", get(list_asset_folders))
        .route("/explain-type", get(explain_type))
        .route("/grep", get(grep))
        .route("/batch", post(batch))
        .route("/internal/ingest", post(ingest))
        .route("/internal/heartbeat", post(heartbeat))
        .route("/internal/status", get(internal_status))
        .route("/internal/file-mtimes", get(file_mtimes))
        .route("/internal/asset-mtimes", get(asset_mtimes))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/summary", get(summary))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves until shutdown.
///
/// # Errors
///
/// Returns `ServiceError::Io` if the listener cannot bind.
pub async fn serve(state: AppState) -> crate::error::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, router(state))
        .await
        .map_err(ServiceError::Io)?;
    Ok(())
}

async fn dispatch(state: &AppState, request: QueryRequest) -> ApiResult {
    let response = state.query.dispatch(request).await?;
    Ok(Json(response).into_response())
}

async fn find_type(State(state): State<AppState>, Query(args): Query<FindTypeArgs>) -> ApiResult {
    dispatch(&state, QueryRequest::FindType(args)).await
}

async fn find_member(
    State(state): State<AppState>,
    Query(args): Query<FindMemberArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::FindMember(args)).await
}

async fn find_file(State(state): State<AppState>, Query(args): Query<FindFileArgs>) -> ApiResult {
    dispatch(&state, QueryRequest::FindFile(args)).await
}

async fn find_asset(
    State(state): State<AppState>,
    Query(args): Query<FindAssetArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::FindAsset(args)).await
}

async fn find_children(
    State(state): State<AppState>,
    Query(args): Query<FindChildrenArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::FindChildren(args)).await
}

async fn list_modules(
    State(state): State<AppState>,
    Query(args): Query<ListModulesArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::ListModules(args)).await
}

async fn browse_module(
    State(state): State<AppState>,
    Query(args): Query<BrowseModuleArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::BrowseModule(args)).await
}

async fn browse_assets(
    State(state): State<AppState>,
    Query(args): Query<BrowseAssetsArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::BrowseAssets(args)).await
}

async fn list_asset_folders(
    State(state): State<AppState>,
    Query(args): Query<ListAssetFoldersArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::ListAssetFolders(args)).await
}

async fn explain_type(
    State(state): State<AppState>,
    Query(args): Query<ExplainTypeArgs>,
) -> ApiResult {
    dispatch(&state, QueryRequest::ExplainType(args)).await
}

async fn grep(State(state): State<AppState>, Query(request): Query<GrepRequest>) -> ApiResult {
    let response = state.grep.run(&request).await?;
    Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    queries: Vec<QueryRequest>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum BatchItem {
    Ok { result: crate::query::QueryResponse },
    Err { error: ErrorBody },
}

async fn batch(State(state): State<AppState>, Json(request): Json<BatchRequest>) -> ApiResult {
    if request.queries.len() > BATCH_LIMIT {
        return Err(ServiceError::InvalidParameter(format!(
            "batch accepts at most {BATCH_LIMIT} queries"
        ))
        .into());
    }

    let mut items = Vec::with_capacity(request.queries.len());
    for query in request.queries {
        match state.query.dispatch(query).await {
            Ok(result) => items.push(BatchItem::Ok { result }),
            Err(e) => items.push(BatchItem::Err {
                error: ErrorBody {
                    error: e.code(),
                    message: e.to_string(),
                    hints: e.hints(),
                },
            }),
        }
    }
    Ok(Json(items).into_response())
}

async fn ingest(State(state): State<AppState>, Json(request): Json<IngestRequest>) -> ApiResult {
    let ingestor = Arc::clone(&state.ingestor);
    let response = tokio::task::spawn_blocking(move || ingestor.apply(request))
        .await
        .map_err(|e| ServiceError::Internal(format!("ingest task panicked: {e}")))?;
    Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
struct HeartbeatRequest {
    source: String,
}

async fn heartbeat(
    State(state): State<AppState>,
    Json(request): Json<HeartbeatRequest>,
) -> ApiResult {
    if let Ok(mut beats) = state.heartbeats.lock() {
        let now = Instant::now();
        beats.insert(request.source, now);
        beats.retain(|_, at| now.duration_since(*at) <= HEARTBEAT_TTL);
    }
    Ok(Json(serde_json::json!({"ok": true})).into_response())
}

async fn internal_status(State(state): State<AppState>) -> ApiResult {
    let statuses = state.store.index_statuses().map_err(ServiceError::Store)?;
    let heartbeats: Vec<String> = state
        .heartbeats
        .lock()
        .map(|beats| {
            let now = Instant::now();
            beats
                .iter()
                .filter(|(_, at)| now.duration_since(**at) <= HEARTBEAT_TTL)
                .map(|(source, _)| source.clone())
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(serde_json::json!({
        "indexStatus": statuses,
        "activeWatchers": heartbeats,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct MtimeParams {
    project: Option<String>,
}

async fn file_mtimes(
    State(state): State<AppState>,
    Query(params): Query<MtimeParams>,
) -> ApiResult {
    let pairs = state
        .store
        .file_mtimes(params.project.as_deref())
        .map_err(ServiceError::Store)?;
    let map: AHashMap<String, i64> = pairs.into_iter().collect();
    Ok(Json(map).into_response())
}

async fn asset_mtimes(
    State(state): State<AppState>,
    Query(params): Query<MtimeParams>,
) -> ApiResult {
    let pairs = state
        .store
        .asset_mtimes(params.project.as_deref())
        .map_err(ServiceError::Store)?;
    let map: AHashMap<String, i64> = pairs.into_iter().collect();
    Ok(Json(map).into_response())
}

async fn health(State(state): State<AppState>) -> ApiResult {
    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": state.build.version,
        "uptimeSeconds": state.started.elapsed().as_secs(),
    }))
    .into_response())
}

async fn stats(State(state): State<AppState>) -> ApiResult {
    // Zeroed counters while the startup loader holds the lock
    let mem_stats = state
        .memory
        .try_read()
        .map(|m| m.stats())
        .unwrap_or_default();
    let store_stats = state.store.stats().map_err(ServiceError::Store)?;
    let slowest = state.store.slowest_queries(10).unwrap_or_default();

    Ok(Json(serde_json::json!({
        "memory": mem_stats,
        "store": store_stats,
        "slowestQueries": slowest,
    }))
    .into_response())
}

async fn summary(State(state): State<AppState>) -> ApiResult {
    let (projects, loaded) = state
        .memory
        .try_read()
        .map(|m| {
            let projects: Vec<serde_json::Value> = m
                .project_names()
                .into_iter()
                .map(|name| {
                    let files = m.project_file_count(&name);
                    serde_json::json!({"name": name, "files": files})
                })
                .collect();
            (projects, m.is_loaded())
        })
        .unwrap_or_else(|_| (Vec::new(), false));

    let statuses = state.store.index_statuses().map_err(ServiceError::Store)?;
    let store_stats = state.store.stats().map_err(ServiceError::Store)?;

    Ok(Json(serde_json::json!({
        "loaded": loaded,
        "projects": projects,
        "languages": statuses,
        "totals": store_stats,
    }))
    .into_response())
}

async fn status(State(state): State<AppState>) -> ApiResult {
    let loaded = state.memory.try_read().map(|m| m.is_loaded()).unwrap_or(false);
    let last_build = state
        .store
        .metadata_get(crate::store::meta_keys::LAST_BUILD)
        .ok()
        .flatten();
    Ok(Json(serde_json::json!({
        "ready": loaded,
        "lastBuild": last_build,
    }))
    .into_response())
}
