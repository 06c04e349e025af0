//! API request handlers

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use super::server::AppState;
use crate::convert::{self, Preview, DEFAULT_PREVIEW_ROWS};
use crate::error::ConvertError;
use crate::types::{ConversionSummary, RawInput, XLSX_MIME};

/// Multipart field carrying the CSV upload
pub const UPLOAD_FIELD: &str = "file";

const INDEX_HTML: &str = include_str!("index.html");

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
            hint: None,
        }
    }

    pub fn err(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
            hint: hint.map(str::to_string),
        }
    }
}

/// Failure of a single request, rendered as a JSON `ApiResponse`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Upload(MultipartError),
    Convert(ConvertError),
    Internal(String),
}

impl From<ConvertError> for ApiError {
    fn from(e: ConvertError) -> Self {
        ApiError::Convert(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, hint) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::Upload(e) => (e.status(), e.body_text(), None),
            ApiError::Convert(e) => {
                let status = if e.is_user_input() {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, e.to_string(), Some(e.remediation_hint()))
            }
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message, None),
        };
        if status.is_server_error() {
            error!(%status, "{}", message);
        } else {
            warn!(%status, "{}", message);
        }
        (status, Json(ApiResponse::<()>::err(message, hint))).into_response()
    }
}

/// GET / - Upload page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub template_present: bool,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let template_present = state.converter.check_template().is_ok();
    Json(ApiResponse::ok(HealthResponse {
        status: if template_present {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        template_present,
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub sheet: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        sheet: state.converter.sheet_name().to_string(),
        features: vec!["preview".to_string(), "convert".to_string()],
    }))
}

/// Preview query parameters
#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    #[serde(default = "default_preview_rows")]
    pub rows: usize,
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

/// POST /api/v1/preview - Decode an upload and return its first rows
pub async fn preview(
    Query(params): Query<PreviewParams>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<Preview>>, ApiError> {
    let upload = read_upload(multipart).await?;
    let preview = tokio::task::spawn_blocking(move || convert::preview(&upload.bytes, params.rows))
        .await
        .map_err(|e| ApiError::Internal(format!("preview task failed: {}", e)))??;
    Ok(Json(ApiResponse::ok(preview)))
}

/// POST /api/v1/convert - Write an upload into the template and return the workbook
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let artifact = tokio::task::spawn_blocking(move || state.converter.convert(upload))
        .await
        .map_err(|e| ApiError::Internal(format!("conversion task failed: {}", e)))??;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MIME)),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.filename)?,
        ),
    ];
    let summary = summary_headers(&artifact.summary)?;
    Ok((headers, summary, artifact.bytes).into_response())
}

/// Pull the `file` field out of a multipart body
async fn read_upload(mut multipart: Multipart) -> Result<RawInput, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::Upload)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field.bytes().await.map_err(ApiError::Upload)?;
        return Ok(RawInput::new(bytes.to_vec(), filename));
    }
    Err(ApiError::BadRequest(format!(
        "missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

/// `attachment` header with an ASCII fallback and an RFC 5987 UTF-8 name
pub fn content_disposition(filename: &str) -> Result<HeaderValue, ApiError> {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        percent_encode(filename)
    );
    HeaderValue::from_str(&value)
        .map_err(|e| ApiError::Internal(format!("invalid download name: {}", e)))
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn summary_headers(summary: &ConversionSummary) -> Result<[(&'static str, HeaderValue); 3], ApiError> {
    let num = |n: usize| HeaderValue::from(n as u64);
    let encoding = HeaderValue::from_str(summary.encoding.unwrap_or("-"))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok([
        ("x-csvfill-rows", num(summary.rows)),
        ("x-csvfill-skipped-rows", num(summary.skipped_rows)),
        ("x-csvfill-encoding", encoding),
    ])
}
