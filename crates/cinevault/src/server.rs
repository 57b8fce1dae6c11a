use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

use crate::{
    annotations::PatchPayload,
    catalog::OmdbClient,
    config::{CineConfig, RestConfig},
    error::{CineError, CineResult},
    metrics::MetricsService,
    record::MovieRecord,
    service::{ByIdPayload, ByTitlePayload, MovieService},
    storage::open_store,
    telemetry::{ActivitySummary, TelemetryHub},
};

pub struct CineServer {
    config: CineConfig,
    state: ApiState,
}

#[derive(Clone)]
pub struct ApiState {
    service: MovieService,
    metrics: MetricsService,
}

impl ApiState {
    pub fn new(service: MovieService, metrics: MetricsService) -> Self {
        Self { service, metrics }
    }
}

impl CineServer {
    pub fn new(config: CineConfig) -> CineResult<Self> {
        config.validate()?;
        if config.catalog.api_key.is_none() {
            warn!("catalog.api_key is not set, catalog lookups will be rejected upstream");
        }
        let store = open_store(&config.storage)?;
        let catalog = Arc::new(OmdbClient::new(&config.catalog)?);
        let telemetry = TelemetryHub::new(1024);
        let metrics = MetricsService::initialize(&config.telemetry)?;
        let service = MovieService::new(catalog, store, telemetry);
        Ok(Self {
            config,
            state: ApiState::new(service, metrics),
        })
    }

    pub fn router(&self) -> CineResult<Router> {
        build_router(self.state.clone(), &self.config.rest)
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> CineResult<()> {
        let addr: SocketAddr = self
            .config
            .rest
            .bind_addr
            .parse()
            .map_err(|err: std::net::AddrParseError| CineError::Configuration(err.to_string()))?;
        let app = self.router()?;

        info!(?addr, "CineVault listening");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| CineError::Internal(err.to_string()))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| CineError::Internal(err.to_string()))?;

        info!("closing storage");
        self.state.service.store().close()
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("ctrl-c received, shutting down"),
        Err(err) => error!(?err, "failed to listen for ctrl-c"),
    }
}

pub fn build_router(state: ApiState, rest: &RestConfig) -> CineResult<Router> {
    let router = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/movies", get(list_handler))
        .route("/api/movies/by-id", post(upsert_by_id_handler))
        .route("/api/movies/by-title", post(upsert_by_title_handler))
        .route("/api/review/by-id", post(review_by_id_handler))
        .route("/api/review/by-title", post(review_by_title_handler))
        .route(
            "/api/movies/:imdb_id",
            get(get_handler).patch(patch_handler).delete(delete_handler),
        )
        .fallback(fallback_handler)
        .with_state(state)
        .layer(cors_layer(rest)?)
        .layer(TraceLayer::new_for_http());
    Ok(router)
}

fn cors_layer(rest: &RestConfig) -> CineResult<CorsLayer> {
    let origins = if rest.cors_allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins = rest
            .cors_allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|err| {
                    CineError::Configuration(format!("invalid CORS origin {origin}: {err}"))
                })
            })
            .collect::<CineResult<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: &'static str,
    activity: ActivitySummary,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    message: String,
    #[serde(rename = "deletedMovie")]
    deleted_movie: MovieRecord,
}

async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage: state.service.store().backend(),
        activity: state.service.telemetry().summary(),
    })
}

async fn metrics_handler(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .ok_or_else(|| CineError::NotFound("metrics are disabled".into()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

async fn list_handler(State(state): State<ApiState>) -> Result<Json<Vec<MovieRecord>>, ApiError> {
    Ok(Json(state.service.list().await?))
}

async fn upsert_by_id_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ByIdPayload>, JsonRejection>,
) -> Result<Json<MovieRecord>, ApiError> {
    let Json(payload) = payload?;
    Ok(Json(state.service.upsert_by_id(payload).await?))
}

async fn upsert_by_title_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ByTitlePayload>, JsonRejection>,
) -> Result<Json<MovieRecord>, ApiError> {
    let Json(payload) = payload?;
    Ok(Json(state.service.upsert_by_title(payload).await?))
}

async fn review_by_id_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ByIdPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<MovieRecord>), ApiError> {
    let Json(payload) = payload?;
    let record = state.service.upsert_by_id(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn review_by_title_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ByTitlePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<MovieRecord>), ApiError> {
    let Json(payload) = payload?;
    let record = state.service.upsert_by_title(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_handler(
    State(state): State<ApiState>,
    Path(imdb_id): Path<String>,
) -> Result<Json<MovieRecord>, ApiError> {
    Ok(Json(state.service.get(&imdb_id).await?))
}

async fn patch_handler(
    State(state): State<ApiState>,
    Path(imdb_id): Path<String>,
    payload: Result<Json<PatchPayload>, JsonRejection>,
) -> Result<Json<MovieRecord>, ApiError> {
    let Json(payload) = payload?;
    Ok(Json(state.service.patch(&imdb_id, payload).await?))
}

async fn delete_handler(
    State(state): State<ApiState>,
    Path(imdb_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted_movie = state.service.delete(&imdb_id).await?;
    Ok(Json(DeleteResponse {
        message: "Movie deleted successfully".to_string(),
        deleted_movie,
    }))
}

async fn fallback_handler() -> ApiError {
    ApiError(CineError::NotFound("Route not found".into()))
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    message: String,
}

pub struct ApiError(CineError);

impl From<CineError> for ApiError {
    fn from(value: CineError) -> Self {
        Self(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self(CineError::InvalidRequest(value.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        let body = Json(ApiErrorBody {
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}
