//! Request/response DTOs and JSON mapping helpers.

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailroom_core::{DisplayState, Enrichment, FailureInfo, MailPackage, SurveyResult};
use mailroom_infra::ScanImage;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ScanImageDto {
    /// Base64-encoded image bytes.
    pub data: String,
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitScanRequest {
    #[serde(default)]
    pub images: Vec<ScanImageDto>,
    /// When present, the scan is finalized in the same request.
    pub ocr_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub ocr_text: String,
}

#[derive(Debug, Deserialize)]
pub struct SurveyRequest {
    pub confirmed: Enrichment,
    pub approved: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

pub fn decode_images(images: Vec<ScanImageDto>) -> Result<Vec<ScanImage>, axum::response::Response> {
    images
        .into_iter()
        .map(|img| {
            let bytes = BASE64.decode(img.data.as_bytes()).map_err(|e| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_image",
                    format!("image data is not valid base64: {e}"),
                )
            })?;
            Ok(ScanImage {
                bytes,
                content_type: img.content_type,
            })
        })
        .collect()
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub id: String,
    pub status: DisplayState,
    pub status_label: &'static str,
    pub images: Vec<String>,
    pub ocr_text: Option<String>,
    pub enrichment: Option<Enrichment>,
    pub survey: Option<SurveyResult>,
    pub retry_count: u32,
    pub failure: Option<FailureInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MailPackage> for PackageResponse {
    fn from(package: MailPackage) -> Self {
        let status = DisplayState::from(package.state);
        Self {
            id: package.id.to_string(),
            status,
            status_label: status.label(),
            images: package.images,
            ocr_text: package.ocr_text,
            enrichment: package.enrichment,
            survey: package.survey,
            retry_count: package.retry_count,
            failure: package.failure,
            created_at: package.created_at,
            updated_at: package.updated_at,
        }
    }
}
