//! Upload Routes
//!
//! The write half of the upload API.
//!
//! Endpoints:
//! - POST /api/upload/files/part   - store one chunk of a session
//! - POST /api/upload/files/merge  - assemble a completed session
//! - POST /api/upload/files/upload - whole-file upload without chunking
//!
//! A chunk request is a multipart form carrying the session `guid`, the
//! zero-based `chunk` index, the declared `chunks` total, the `fileName`,
//! an optional SHA-256 `checksum`, and the `file` part itself. Merge is a
//! urlencoded form naming `guid` and `fileName`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiStatus, AppError, Result};
use crate::sessions::PartStatus;
use crate::state::AppState;
use crate::store::sanitize_name;

/// Upper bound on one request body. Chunks are far smaller; the limit
/// mostly matters for the whole-file endpoint.
const MAX_UPLOAD_BODY: usize = 128 * 1024 * 1024;

/// Create the upload router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/part", post(upload_part))
        .route("/merge", post(merge))
        .route("/upload", post(upload_whole))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY))
}

// ============================================================================
// Handlers
// ============================================================================

/// Fields of one chunk envelope, gathered from the multipart stream.
#[derive(Debug, Default)]
struct PartFields {
    guid: Option<String>,
    chunk: Option<u32>,
    chunks: Option<u32>,
    file_name: Option<String>,
    checksum: Option<String>,
    data: Option<Bytes>,
    part_file_name: Option<String>,
}

/// POST /api/upload/files/part
///
/// Store one chunk. The session is created implicitly by its first part;
/// a re-sent index overwrites the stored part.
async fn upload_part(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiStatus>> {
    let mut fields = PartFields::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "guid" => fields.guid = Some(field.text().await?),
            "chunk" => fields.chunk = Some(parse_number(&field.text().await?, "chunk")?),
            "chunks" => fields.chunks = Some(parse_number(&field.text().await?, "chunks")?),
            "fileName" => fields.file_name = Some(field.text().await?),
            "checksum" => fields.checksum = Some(field.text().await?),
            "file" => {
                fields.part_file_name = field.file_name().map(|s| s.to_string());
                fields.data = Some(field.bytes().await?);
            }
            // Upload widgets send extra metadata fields; ignore them
            _ => {}
        }
    }

    let guid = parse_guid(fields.guid.as_deref())?;
    let data = fields
        .data
        .ok_or_else(|| AppError::BadRequest("missing file field".to_string()))?;

    // Single-chunk clients may omit the index and total entirely
    let index = fields.chunk.unwrap_or(0);
    let total = fields.chunks.unwrap_or(1);

    // Prefer the explicit fileName field, fall back to the file part's name
    let file_name = fields
        .file_name
        .or(fields.part_file_name)
        .ok_or_else(|| AppError::BadRequest("missing fileName".to_string()))?;
    sanitize_name(&file_name)?;

    let session = state
        .tracker()
        .record_part(guid, &file_name, index, total)
        .await?;
    state
        .store()
        .store_part(guid, index, &data, fields.checksum.as_deref())
        .await?;

    tracing::debug!(
        guid = %guid,
        chunk = index,
        chunks = total,
        received = session.received.len(),
        bytes = data.len(),
        "Part stored"
    );

    Ok(Json(ApiStatus::ok()))
}

#[derive(Debug, Deserialize)]
struct MergeForm {
    guid: String,
    #[serde(rename = "fileName")]
    file_name: String,
}

/// POST /api/upload/files/merge
///
/// Assemble a completed session into its final file. Merging is
/// idempotent: repeating the request for an already-merged session
/// answers success without touching the file again.
async fn merge(
    State(state): State<AppState>,
    Form(form): Form<MergeForm>,
) -> Result<Json<ApiStatus>> {
    let guid = parse_guid(Some(&form.guid))?;
    sanitize_name(&form.file_name)?;

    let session = match state.tracker().get(guid).await {
        Some(session) => session,
        None => {
            // The tracker forgot the session (restart or sweep). If the
            // final file is already there, the merge happened; answer
            // success so a retried merge stays idempotent.
            if state.store().file_exists(&form.file_name).await? {
                tracing::debug!(guid = %guid, file = %form.file_name, "Merge for unknown session, file exists");
                return Ok(Json(ApiStatus::ok()));
            }
            return Err(AppError::UnknownSession(form.guid.clone()));
        }
    };

    if session.status == PartStatus::Merged {
        tracing::debug!(guid = %guid, "Repeated merge for merged session");
        return Ok(Json(ApiStatus::ok()));
    }

    if session.file_name != form.file_name {
        return Err(AppError::BadRequest(format!(
            "file name does not match session (expected {:?})",
            session.file_name
        )));
    }

    if !session.is_complete() {
        return Err(AppError::IncompleteUpload {
            received: session.received.len(),
            expected: session.total_chunks as usize,
        });
    }

    let written = state
        .store()
        .merge(guid, &form.file_name, session.total_chunks)
        .await?;
    state.tracker().mark_merged(guid).await?;

    tracing::info!(
        guid = %guid,
        file = %form.file_name,
        chunks = session.total_chunks,
        bytes = written,
        "Merged upload"
    );

    Ok(Json(ApiStatus::ok()))
}

/// POST /api/upload/files/upload
///
/// Store a whole file from a single multipart request, bypassing the
/// part/merge machinery.
async fn upload_whole(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiStatus>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::BadRequest("file part has no filename".to_string()))?;
        let data = field.bytes().await?;

        if data.is_empty() {
            return Err(AppError::BadRequest(
                "refusing to store empty file".to_string(),
            ));
        }

        state.store().store_file(&file_name, &data).await?;

        tracing::info!(file = %file_name, bytes = data.len(), "Stored whole upload");
        return Ok(Json(ApiStatus::ok()));
    }

    Err(AppError::BadRequest(
        "no file field in upload".to_string(),
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_guid(guid: Option<&str>) -> Result<Uuid> {
    let raw = guid
        .filter(|g| !g.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing guid".to_string()))?;
    Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest(format!("guid is not a valid uuid: {}", raw)))
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        AppError::BadRequest(format!("field {} is not a number: {:?}", field, value))
    })
}
