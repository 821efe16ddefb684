//! Merge requester
//!
//! Once every chunk is acknowledged, the client asks the server to
//! assemble the session: one urlencoded POST naming the session guid and
//! the file. The answer is a JSON envelope whose `code` field decides the
//! outcome; 200 means the file exists on the server, anything else is
//! surfaced as an explicit, distinguishable failure.

use serde::Deserialize;

use crate::config::UploadConfig;
use crate::error::{Result, UploadError};

/// Envelope returned by the merge endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeResponse {
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
}

/// Ask the server to assemble the session's chunks into `file_name`.
///
/// The request itself is idempotent on the server side, so callers may
/// safely repeat it after a transport failure.
pub async fn request_merge(
    client: &reqwest::Client,
    config: &UploadConfig,
    guid: &str,
    file_name: &str,
) -> Result<()> {
    let url = config.endpoint("files/merge");

    tracing::debug!(guid = %guid, file = %file_name, "Requesting merge");

    let response = client
        .post(&url)
        .form(&[("guid", guid), ("fileName", file_name)])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    let parsed: MergeResponse = serde_json::from_str(&body).map_err(|_| {
        UploadError::InvalidMergeResponse(format!(
            "status {}, body {:?}",
            status.as_u16(),
            truncate(&body)
        ))
    })?;

    if parsed.code == 200 {
        Ok(())
    } else {
        tracing::warn!(
            guid = %guid,
            file = %file_name,
            code = parsed.code,
            message = ?parsed.message,
            "Merge rejected"
        );
        Err(UploadError::MergeRejected {
            file_name: file_name.to_string(),
            code: parsed.code,
        })
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(120).collect()
}
