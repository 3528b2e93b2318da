//! Consistent JSON error responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use mailroom_core::WorkflowError;

pub fn workflow_error_to_response(err: WorkflowError) -> axum::response::Response {
    match err {
        WorkflowError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("package {id} not found"))
        }
        WorkflowError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        WorkflowError::InvalidState(msg) => {
            json_error(StatusCode::CONFLICT, "invalid_state", msg)
        }
        e @ WorkflowError::PreconditionFailed { .. } => {
            json_error(StatusCode::CONFLICT, "conflict", e.to_string())
        }
        e @ WorkflowError::NotReady(_) => {
            json_error(StatusCode::CONFLICT, "not_ready", e.to_string())
        }
        e @ WorkflowError::AlreadyComplete => {
            json_error(StatusCode::CONFLICT, "already_complete", e.to_string())
        }
        e @ WorkflowError::DuplicateJob(_) => {
            json_error(StatusCode::CONFLICT, "duplicate_job", e.to_string())
        }
        WorkflowError::UploadFailed(msg) => {
            json_error(StatusCode::BAD_GATEWAY, "upload_failed", msg)
        }
        WorkflowError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
