use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::state::{AppState, UploadOutcome};
use crate::error::IngestError;
use crate::ingest::validate_file_count;

/// Error body in the `{detail}` shape the client expects
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub index_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files_processed: usize,
    pub files_cached: usize,
    pub errors: Vec<String>,
    pub total_files: usize,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    pub files: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub status: String,
    pub message: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        index_loaded: state.index_loaded(),
    })
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read {}: {}", filename, e)))?;
        files.push((filename, content.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }
    validate_file_count(files.len(), state.config.max_files_per_upload)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut workspace = state.workspace.lock().await;
    let mut files_processed = 0;
    let mut files_cached = 0;
    let mut errors = Vec::new();

    for (filename, content) in &files {
        match workspace.ingest_upload(&state.config, filename, content).await {
            Ok(UploadOutcome::Indexed { .. }) => files_processed += 1,
            Ok(UploadOutcome::Cached) => files_cached += 1,
            Err(e) => {
                let rejected = e
                    .downcast_ref::<IngestError>()
                    .is_some_and(IngestError::is_validation);
                if rejected {
                    info!("Rejected upload {}: {}", filename, e);
                } else {
                    warn!("Upload of {} failed: {:#}", filename, e);
                }
                errors.push(format!("{}: {:#}", filename, e));
            }
        }
    }

    state.sync_index_loaded(&workspace);

    info!(
        "Upload finished: {} processed, {} cached, {} failed",
        files_processed,
        files_cached,
        errors.len()
    );

    let status = if workspace.index.is_empty() { "no_files" } else { "ready" };
    Ok(Json(UploadResponse {
        files_processed,
        files_cached,
        errors,
        total_files: files.len(),
        status: status.to_string(),
    }))
}

pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let mut guard = state.workspace.lock().await;
    let workspace = &mut *guard;
    if workspace.index.is_empty() {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "No files uploaded yet. Please upload .mrt files first.",
        ));
    }

    let answer = workspace
        .engine
        .chat(&workspace.index, message)
        .await
        .map_err(|e| {
            error!("Chat failed: {:#}", e);
            ApiError::new(StatusCode::BAD_GATEWAY, format!("Error generating response: {}", e))
        })?;

    Ok(Json(ChatResponse {
        response: answer.response,
    }))
}

pub async fn list_files(State(state): State<AppState>) -> Json<FilesResponse> {
    let workspace = state.workspace.lock().await;
    let files = workspace.cache.filenames().to_vec();
    Json(FilesResponse {
        count: files.len(),
        files,
    })
}

pub async fn clear_files(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let mut workspace = state.workspace.lock().await;
    let cleared = workspace.clear();
    state.sync_index_loaded(&workspace);
    cleared.map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to clear files: {}", e),
        )
    })?;
    info!("Cleared all files and index");

    Ok(Json(ClearResponse {
        status: "cleared".to_string(),
        message: "All files and index cleared".to_string(),
    }))
}
