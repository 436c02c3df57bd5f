//! HTTP boundary for the shipwright pipeline.
//!
//! Exposes `router`, which serves:
//! - `GET /health`
//! - `POST /api` (round 1 creates, round 2 updates)
//! - `POST /api/update` (round 2 only)
//! - `POST /evaluation` (records receipt, never runs the pipeline)

pub mod auth;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use shipwright_pipeline::{Orchestrator, PipelineError};
use shipwright_types::{redact_credentials, Config, GenerationRequest, PipelineOutcome, ShipwrightError};

use crate::auth::SecretVerifier;
use crate::schema::{
    AppRequest, AppResponse, EvaluationRequest, EvaluationResponse, HealthResponse,
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// What the handlers need from the pipeline.
#[async_trait]
pub trait AppPipeline: Send + Sync {
    async fn run(&self, request: &GenerationRequest) -> Result<PipelineOutcome, PipelineError>;
}

#[async_trait]
impl AppPipeline for Orchestrator {
    async fn run(&self, request: &GenerationRequest) -> Result<PipelineOutcome, PipelineError> {
        Orchestrator::run(self, request).await
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    verifier: Arc<SecretVerifier>,
    pipeline: Arc<dyn AppPipeline>,
}

impl AppState {
    pub fn new(config: Arc<Config>, pipeline: Arc<dyn AppPipeline>) -> Self {
        let verifier = Arc::new(SecretVerifier::new(config.shared_secret.clone()));
        Self {
            config,
            verifier,
            pipeline,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api", post(generate))
        .route("/api/update", post(update))
        .route("/evaluation", post(evaluation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error response: a status code plus `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

fn auth_error(err: ShipwrightError) -> ApiError {
    match err {
        ShipwrightError::Config(reason) => {
            tracing::error!(reason = %reason, "Rejecting request: server secret missing");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
        }
        ShipwrightError::Auth => ApiError::new(StatusCode::UNAUTHORIZED, "Invalid secret"),
        other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[derive(Clone, Copy)]
enum Mode {
    Create,
    Update,
}

impl Mode {
    fn success_message(self) -> &'static str {
        match self {
            Mode::Create => "App request processed successfully",
            Mode::Update => "App update processed successfully",
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            Mode::Create => "Failed to process app request",
            Mode::Update => "Failed to process app update",
        }
    }
}

/// Parse, validate and authenticate; round gating is left to the caller.
fn admit(state: &AppState, body: Result<Json<AppRequest>, JsonRejection>) -> Result<AppRequest, ApiError> {
    let Json(request) = body?;
    request
        .validate()
        .map_err(|detail| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, detail))?;
    state.verifier.verify(&request.secret).map_err(auth_error)?;
    Ok(request)
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<AppRequest>, JsonRejection>,
) -> Result<Json<AppResponse>, ApiError> {
    let request = admit(&state, body)?;
    let mode = match request.round {
        1 => Mode::Create,
        2 => Mode::Update,
        other => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("Round must be 1 or 2, got {other}"),
            ))
        }
    };
    tracing::info!(task = %request.task, round = request.round, "Received app request");
    process(&state, request, mode).await
}

async fn update(
    State(state): State<AppState>,
    body: Result<Json<AppRequest>, JsonRejection>,
) -> Result<Json<AppResponse>, ApiError> {
    let request = admit(&state, body)?;
    if request.round != 2 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "This endpoint is only for round 2 updates",
        ));
    }
    tracing::info!(task = %request.task, "Received round 2 update request");
    process(&state, request, Mode::Update).await
}

async fn process(
    state: &AppState,
    request: AppRequest,
    mode: Mode,
) -> Result<Json<AppResponse>, ApiError> {
    let request = request
        .into_generation_request()
        .map_err(|detail| ApiError::new(StatusCode::BAD_REQUEST, detail))?;

    match state.pipeline.run(&request).await {
        Ok(outcome) => Ok(Json(AppResponse::success(
            mode.success_message(),
            &request,
            outcome,
        ))),
        Err(err) => {
            let cause = redact_credentials(&err.to_string(), &state.config.secret_values());
            tracing::error!(task = %request.task, stage = %err.stage, error = %cause, "App request failed");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}: {cause}", mode.failure_prefix()),
            ))
        }
    }
}

async fn evaluation(
    body: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let Json(request) = body?;
    request
        .validate()
        .map_err(|detail| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, detail))?;

    tracing::info!(
        received_at = %chrono::Utc::now().to_rfc3339(),
        email = %request.email,
        task = %request.task,
        round = request.round,
        nonce = %request.nonce,
        repo_url = %request.repo_url,
        commit_sha = %request.commit_sha,
        pages_url = %request.pages_url,
        "Evaluation submission received"
    );

    Ok(Json(EvaluationResponse {
        status: "success".into(),
        message: "Evaluation submission received successfully".into(),
        task: request.task,
        round: request.round,
        nonce: request.nonce,
    }))
}
