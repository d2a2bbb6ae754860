//! REST API handlers for rollout management.
//!
//! Exposes the controller's start / status / abort operations. Only one
//! deployment may be in flight; a second start answers 409.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use todo_rollout::{Deployment, MetricSampler, RolloutError};

use crate::RolloutApiState;

/// Request body to start a deployment.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDeploymentRequest {
    pub version_id: String,
}

/// Serializable deployment status for API responses.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    pub id: String,
    pub version_id: String,
    pub prior_version: String,
    pub state: todo_rollout::DeploymentState,
    pub weight: u8,
    pub started_at: u64,
}

impl From<&Deployment> for DeploymentStatus {
    fn from(d: &Deployment) -> Self {
        Self {
            id: d.id.clone(),
            version_id: d.version_id.clone(),
            prior_version: d.prior_version.clone(),
            state: d.state.clone(),
            weight: d.weight,
            started_at: d.started_at,
        }
    }
}

fn rollout_error(err: RolloutError) -> Response {
    let status = match &err {
        RolloutError::DeploymentInProgress => StatusCode::CONFLICT,
        RolloutError::UnknownDeployment(_) => StatusCode::NOT_FOUND,
    };
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// POST /api/deployments
pub async fn start_deployment<S: MetricSampler>(
    State(state): State<RolloutApiState<S>>,
    Json(req): Json<StartDeploymentRequest>,
) -> Response {
    match state.controller.start(&req.version_id).await {
        Ok(id) => {
            // The deployment was just registered, so the snapshot exists.
            match state.controller.deployment(&id).await {
                Some(d) => {
                    (StatusCode::CREATED, Json(DeploymentStatus::from(&d))).into_response()
                }
                None => rollout_error(RolloutError::UnknownDeployment(id)),
            }
        }
        Err(e) => rollout_error(e),
    }
}

/// GET /api/deployments/{id}
pub async fn get_deployment<S: MetricSampler>(
    State(state): State<RolloutApiState<S>>,
    Path(id): Path<String>,
) -> Response {
    match state.controller.deployment(&id).await {
        Some(d) => Json(DeploymentStatus::from(&d)).into_response(),
        None => rollout_error(RolloutError::UnknownDeployment(id)),
    }
}

/// POST /api/deployments/{id}/abort
pub async fn abort_deployment<S: MetricSampler>(
    State(state): State<RolloutApiState<S>>,
    Path(id): Path<String>,
) -> Response {
    match state.controller.abort(&id, "operator abort").await {
        Ok(()) => match state.controller.deployment(&id).await {
            Some(d) => Json(DeploymentStatus::from(&d)).into_response(),
            None => rollout_error(RolloutError::UnknownDeployment(id)),
        },
        Err(e) => rollout_error(e),
    }
}
