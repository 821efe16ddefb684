//! Muelle Server Library
//!
//! The server binary lives in main.rs; the router and its collaborators
//! are exposed here so integration tests can mount the full application
//! in-process.
//!
//! # Modules
//!
//! - `store`: filesystem layout for parts and merged files
//! - `sessions`: in-memory part session tracking
//! - `routes`: the HTTP surface of the upload API

pub mod config;
pub mod error;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod store;

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the application router.
///
/// The upload API sits under `/api/upload/files`, matching the path
/// layout chunked-upload clients expect:
///
/// - `GET  /api/upload/files`            list merged files
/// - `GET  /api/upload/files/:filename`  download a merged file
/// - `POST /api/upload/files/part`       store one chunk
/// - `POST /api/upload/files/merge`      assemble a session
/// - `POST /api/upload/files/upload`     whole-file upload
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/upload/files",
            routes::files::router().merge(routes::upload::router()),
        )
        .with_state(state)
}
