//! REST API handlers for flow validation, lottery draws, and operational
//! endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use instantwin_core::error::InstantWinError;
use instantwin_core::types::TemplateId;
use instantwin_flow::{FlowSnapshot, FlowSource, FlowValidator, ValidationResult};
use instantwin_lottery::{InMemoryHistoryStore, LotteryEngine, LotteryRequest, LotteryResult, LotteryStats};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::locks::DrawLocks;

/// Maximum nodes accepted in an inline validation request.
const MAX_FLOW_NODES: usize = 5_000;

/// Maximum edges accepted in an inline validation request.
const MAX_FLOW_EDGES: usize = 20_000;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<FlowValidator>,
    pub flows: Arc<dyn FlowSource>,
    pub lottery: Arc<LotteryEngine>,
    pub history: Arc<InMemoryHistoryStore>,
    pub draw_locks: Arc<DrawLocks>,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// Domain error carried to the transport layer.
#[derive(Debug)]
pub struct ApiError(pub InstantWinError);

impl From<InstantWinError> for ApiError {
    fn from(err: InstantWinError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            InstantWinError::Validation(_) => StatusCode::BAD_REQUEST,
            InstantWinError::TemplateNotFound(_) | InstantWinError::ConversationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            InstantWinError::EmptyTemplate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            metrics::counter!("api.errors").increment(1);
        } else {
            warn!(error = %self.0, "Request rejected");
        }
        let message = if status.is_server_error() {
            "Internal processing error".to_string()
        } else {
            self.0.to_string()
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.code().to_string(),
                message,
            }),
        )
            .into_response()
    }
}

fn check_flow_size(snapshot: &FlowSnapshot) -> Result<(), InstantWinError> {
    if snapshot.nodes.is_empty() {
        return Err(InstantWinError::Validation(
            "flow must contain at least one node".to_string(),
        ));
    }
    if snapshot.nodes.len() > MAX_FLOW_NODES {
        return Err(InstantWinError::Validation(format!(
            "flow exceeds {} nodes",
            MAX_FLOW_NODES
        )));
    }
    if snapshot.edges.len() > MAX_FLOW_EDGES {
        return Err(InstantWinError::Validation(format!(
            "flow exceeds {} edges",
            MAX_FLOW_EDGES
        )));
    }
    Ok(())
}

/// POST /v1/flows/validate: Validate an inline node/edge collection.
#[utoipa::path(
    post,
    path = "/v1/flows/validate",
    tag = "Flows",
    request_body = FlowSnapshot,
    responses(
        (status = 200, description = "Validation result", body = ValidationResult),
        (status = 400, description = "Malformed or empty flow", body = ErrorResponse),
    )
)]
pub async fn handle_validate_flow(
    State(state): State<AppState>,
    Json(snapshot): Json<FlowSnapshot>,
) -> Result<Json<ValidationResult>, ApiError> {
    check_flow_size(&snapshot)?;
    Ok(Json(state.validator.validate_snapshot(&snapshot)))
}

/// GET /v1/templates/:template_id/validation: Load and validate a stored flow.
#[utoipa::path(
    get,
    path = "/v1/templates/{template_id}/validation",
    tag = "Flows",
    params(("template_id" = i64, Path, description = "Template identifier")),
    responses(
        (status = 200, description = "Validation result", body = ValidationResult),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 422, description = "Template has no nodes", body = ErrorResponse),
    )
)]
pub async fn handle_validate_template(
    State(state): State<AppState>,
    Path(template_id): Path<TemplateId>,
) -> Result<Json<ValidationResult>, ApiError> {
    let snapshot = state.flows.load_flow(template_id)?;
    Ok(Json(state.validator.validate_snapshot(&snapshot)))
}

/// POST /v1/lottery/draw: Execute one draw for a user.
#[utoipa::path(
    post,
    path = "/v1/lottery/draw",
    tag = "Lottery",
    request_body = LotteryRequest,
    responses(
        (status = 200, description = "Draw outcome, win or loss", body = LotteryResult),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
    )
)]
pub async fn handle_draw(
    State(state): State<AppState>,
    Json(request): Json<LotteryRequest>,
) -> Result<Json<LotteryResult>, ApiError> {
    let template_id = state.lottery.resolve_template(&request)?;
    let request = request.with_template(template_id);

    let _guard = state.draw_locks.acquire(&request.user_id, template_id).await;
    let lottery = state.lottery.clone();
    let result = tokio::task::spawn_blocking(move || lottery.execute_lottery(&request))
        .await
        .map_err(|e| InstantWinError::Internal(e.into()))??;

    metrics::counter!("api.lottery.draws").increment(1);
    Ok(Json(result))
}

/// GET /v1/lottery/stats/:template_id: Aggregate draw statistics.
#[utoipa::path(
    get,
    path = "/v1/lottery/stats/{template_id}",
    tag = "Lottery",
    params(("template_id" = i64, Path, description = "Template identifier")),
    responses(
        (status = 200, description = "Draw statistics", body = LotteryStats),
    )
)]
pub async fn handle_lottery_stats(
    State(state): State<AppState>,
    Path(template_id): Path<TemplateId>,
) -> Json<LotteryStats> {
    Json(state.history.stats(template_id))
}

/// GET /health: Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: Readiness probe.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses((status = 200, description = "Ready to accept traffic"))
)]
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live: Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
