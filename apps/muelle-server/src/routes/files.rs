//! Stored file routes
//!
//! The read half of the upload API: listing merged files and serving
//! them for download.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::store::StoredFile;

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_files))
        .route("/:filename", get(download_file))
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<StoredFile>,
    pub total: usize,
}

/// List merged files
async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>> {
    let files = state.store().list().await?;
    let total = files.len();
    Ok(Json(FileListResponse { files, total }))
}

/// Serve a merged file as an attachment
async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let data = state.store().load(&filename).await?;
    let size = data.len();

    tracing::debug!(file = %filename, bytes = size, "Serving download");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, guess_content_type(&filename))
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))?)
}

/// Guess content type from file extension
fn guess_content_type(name: &str) -> String {
    let ext = name.rsplit('.').next().unwrap_or("");
    match ext.to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "json" => "application/json",
        "csv" => "text/csv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
    .to_string()
}
