// SPDX-License-Identifier: MIT

use crate::warden::appeal::{AppealService, NewAppeal};
use crate::warden::clock::Clock;
use crate::warden::domain::ApprovalAction;
use crate::warden::errors::{AppealError, ErrorKind, PolicyError};
use crate::warden::jobs;
use crate::warden::policy::{PolicyFile, PolicyService};
use crate::warden::store::AppealFilter;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub appeals: Arc<AppealService>,
    pub policies: Arc<PolicyService>,
    pub clock: Arc<dyn Clock>,
}

pub async fn serve(
    port: u16,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/policies", get(list_policies).post(create_policy))
        .route("/api/policies/{id}/versions/{version}", get(get_policy))
        .route("/api/appeals", get(list_appeals).post(create_appeal))
        .route("/api/appeals/{id}", get(get_appeal))
        .route("/api/appeals/{id}/action", post(make_action))
        .route("/api/appeals/{id}/cancel", post(cancel_appeal))
        .route("/api/appeals/{id}/revoke", post(revoke_appeal))
        .route("/api/jobs/expiration-sweep", post(run_sweep))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

struct ApiError(AppealError);

impl From<AppealError> for ApiError {
    fn from(e: AppealError) -> Self {
        Self(e)
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        Self(AppealError::Policy(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Status => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Configuration | ErrorKind::Downstream => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_policies(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let policies = state.policies.list().await?;
    Ok(Json(json!(policies)))
}

async fn create_policy(
    State(state): State<AppState>,
    Json(file): Json<PolicyFile>,
) -> Result<Json<Value>, ApiError> {
    let policy = state.policies.create(file).await?;
    Ok(Json(json!(policy)))
}

async fn get_policy(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, u32)>,
) -> Result<Json<Value>, ApiError> {
    let policy = state.policies.get(&id, version).await?;
    Ok(Json(json!(policy)))
}

async fn list_appeals(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let appeals = state.appeals.find(&AppealFilter::default()).await?;
    Ok(Json(json!(appeals)))
}

async fn create_appeal(
    State(state): State<AppState>,
    Json(input): Json<NewAppeal>,
) -> Result<Json<Value>, ApiError> {
    let appeal = state.appeals.create(input).await?;
    Ok(Json(json!(appeal)))
}

async fn get_appeal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let appeal = state.appeals.get(&id).await?;
    Ok(Json(json!(appeal)))
}

#[derive(Deserialize)]
struct ActionRequest {
    approval_name: String,
    actor: String,
    action: String,
}

async fn make_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<Value>, ApiError> {
    let appeal = state
        .appeals
        .make_action(ApprovalAction {
            appeal_id: id,
            approval_name: req.approval_name,
            actor: req.actor,
            action: req.action,
        })
        .await?;
    Ok(Json(json!(appeal)))
}

#[derive(Deserialize)]
struct CancelRequest {
    actor: String,
}

async fn cancel_appeal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Value>, ApiError> {
    let appeal = state.appeals.cancel(&id, &req.actor).await?;
    Ok(Json(json!(appeal)))
}

#[derive(Deserialize)]
struct RevokeRequest {
    actor: String,
    #[serde(default)]
    reason: String,
}

async fn revoke_appeal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RevokeRequest>,
) -> Result<Json<Value>, ApiError> {
    let appeal = state.appeals.revoke(&id, &req.actor, &req.reason).await?;
    Ok(Json(json!(appeal)))
}

async fn run_sweep(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let summary = jobs::revoke_expired_appeals(&state.appeals, &state.clock).await?;
    Ok(Json(json!(summary)))
}
