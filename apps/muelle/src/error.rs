//! Error types for the upload client

use thiserror::Error;

/// Client-wide result type
pub type Result<T> = std::result::Result<T, UploadError>;

/// Everything that can go wrong between staging a file and the merge
/// confirmation.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("cannot read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server rejected chunk {index} with status {status}")]
    ChunkRejected { index: u32, status: u16 },

    #[error("chunk {index} still failing after {attempts} attempts")]
    RetriesExhausted {
        index: u32,
        attempts: u32,
        #[source]
        source: Box<UploadError>,
    },

    #[error("server rejected upload with status {status}")]
    UploadRejected { status: u16 },

    #[error("merge of {file_name} rejected: server answered code {code}")]
    MergeRejected { file_name: String, code: u16 },

    #[error("merge response not understood: {0}")]
    InvalidMergeResponse(String),

    #[error("download failed with status {status}")]
    FetchRejected { status: u16 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("payload transform failed: {0}")]
    Transform(String),
}
