//! Package workflow endpoints.
//!
//! The gateways are synchronous (the SQLite store blocks on its own
//! runtime), so every handler hops onto the blocking pool before touching
//! them.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use mailroom_core::{PackageId, WorkflowResult};
use mailroom_infra::{PackageStore, ScanSubmission, SurveyAnswers};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_package).get(list_packages))
        .route("/:id", get(get_package))
        .route("/:id/scans", post(append_scans))
        .route("/:id/finalize", post(finalize_package))
        .route("/:id/survey", post(submit_survey))
        .route("/:id/retry", post(retry_package))
}

fn parse_id(raw: &str) -> Result<PackageId, axum::response::Response> {
    PackageId::from_str(raw).map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
    })
}

/// Run a synchronous workflow call on the blocking pool.
async fn run_workflow<T, F>(f: F) -> Result<T, axum::response::Response>
where
    T: Send + 'static,
    F: FnOnce() -> WorkflowResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(errors::workflow_error_to_response(e)),
        Err(e) => Err(errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            e.to_string(),
        )),
    }
}

pub async fn create_package(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubmitScanRequest>,
) -> axum::response::Response {
    let images = match dto::decode_images(body.images) {
        Ok(images) => images,
        Err(response) => return response,
    };
    let submission = ScanSubmission {
        images,
        ocr_text: body.ocr_text,
    };

    match run_workflow(move || services.ingestion.submit_scan(None, submission)).await {
        Ok(package) => (
            StatusCode::CREATED,
            Json(dto::PackageResponse::from(package)),
        )
            .into_response(),
        Err(response) => response,
    }
}

pub async fn append_scans(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SubmitScanRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let images = match dto::decode_images(body.images) {
        Ok(images) => images,
        Err(response) => return response,
    };
    let submission = ScanSubmission {
        images,
        ocr_text: body.ocr_text,
    };

    match run_workflow(move || services.ingestion.submit_scan(Some(id), submission)).await {
        Ok(package) => Json(dto::PackageResponse::from(package)).into_response(),
        Err(response) => response,
    }
}

pub async fn finalize_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::FinalizeRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match run_workflow(move || services.ingestion.finalize_scan(id, body.ocr_text)).await {
        Ok(package) => Json(dto::PackageResponse::from(package)).into_response(),
        Err(response) => response,
    }
}

pub async fn get_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match run_workflow(move || services.store.get(id)).await {
        Ok(package) => Json(dto::PackageResponse::from(package)).into_response(),
        Err(response) => response,
    }
}

pub async fn list_packages(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match run_workflow(move || services.projector.overview()).await {
        Ok(views) => Json(views).into_response(),
        Err(response) => response,
    }
}

pub async fn submit_survey(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SurveyRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let answers = SurveyAnswers {
        confirmed: body.confirmed,
        approved: body.approved,
        notes: body.notes,
    };

    match run_workflow(move || services.survey.submit_survey(id, answers)).await {
        Ok(package) => Json(dto::PackageResponse::from(package)).into_response(),
        Err(response) => response,
    }
}

pub async fn retry_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match run_workflow(move || services.ingestion.retry_failed(id)).await {
        Ok(package) => (
            StatusCode::ACCEPTED,
            Json(dto::PackageResponse::from(package)),
        )
            .into_response(),
        Err(response) => response,
    }
}
