//! REST API handlers for todo records.
//!
//! Thin contract mapping: each handler calls one service operation and
//! translates the result to a status code. Bodies are the camelCase JSON
//! record form; error bodies are `{"error": "..."}`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use todo_service::ServiceError;
use todo_store::TodoPatch;

use crate::ApiState;

/// Request body for creating a todo.
#[derive(serde::Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
}

/// Translate a domain error to its HTTP form.
fn service_error(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// GET /api/todos
pub async fn list_todos(State(state): State<ApiState>) -> Response {
    match state.service.list() {
        Ok(todos) => Json(todos).into_response(),
        Err(e) => service_error(e),
    }
}

/// GET /api/todos/{id}
pub async fn get_todo(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.service.get(&id) {
        Ok(record) => Json(record).into_response(),
        Err(e) => service_error(e),
    }
}

/// POST /api/todos
pub async fn create_todo(
    State(state): State<ApiState>,
    Json(req): Json<CreateTodoRequest>,
) -> Response {
    match state.service.create(&req.title) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => service_error(e),
    }
}

/// PUT /api/todos/{id}
pub async fn update_todo(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<TodoPatch>,
) -> Response {
    match state.service.update(&id, &patch) {
        Ok(record) => Json(record).into_response(),
        Err(e) => service_error(e),
    }
}

/// DELETE /api/todos/{id}
pub async fn delete_todo(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.service.delete(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => service_error(e),
    }
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
