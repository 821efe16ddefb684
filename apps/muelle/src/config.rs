//! Client configuration
//!
//! Defaults match what browser chunked-upload widgets ship with:
//! chunking on at 1 MiB, strictly sequential transmission, retries
//! disabled, no payload transform.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, UploadError};
use crate::retry::RetryPolicy;
use crate::transform::PayloadTransform;

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default prefix of the upload API.
pub const DEFAULT_SERVER: &str = "http://localhost:8080/api/upload";

#[derive(Clone)]
pub struct UploadConfig {
    /// Base URL prefix of the upload API, without a trailing slash.
    pub server: String,
    /// Split payloads into chunks. When off, files go to the whole-file
    /// endpoint in a single request and no merge is issued.
    pub chunked: bool,
    /// Bytes per chunk.
    pub chunk_size: usize,
    /// Per-chunk retry policy.
    pub retry: RetryPolicy,
    /// Maximum concurrent in-flight chunks.
    pub max_in_flight: usize,
    /// Optional transform applied to the payload before chunking.
    pub transform: Option<Arc<dyn PayloadTransform>>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            chunked: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::disabled(),
            max_in_flight: 1,
            transform: None,
        }
    }
}

impl UploadConfig {
    /// Reject values the transport cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(UploadError::Config("server must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(UploadError::Config(
                "chunk_size must be at least 1 byte".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(UploadError::Config(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Join a path onto the server prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("server", &self.server)
            .field("chunked", &self.chunked)
            .field("chunk_size", &self.chunk_size)
            .field("retry", &self.retry)
            .field("max_in_flight", &self.max_in_flight)
            .field(
                "transform",
                &self.transform.as_ref().map(|t| t.name().to_string()),
            )
            .finish()
    }
}
