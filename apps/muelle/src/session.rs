//! Upload sessions
//!
//! A session owns the guid that scopes every chunk and merge request
//! issued through it. The guid is minted once, when the session is
//! created, and never changes; uploading several files through one
//! session reuses it.
//!
//! Staging a file ([`UploadSession::add_file`]) performs no network
//! activity. Transmission starts only on the explicit
//! [`UploadSession::upload`] call.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Deserialize;
use uuid::Uuid;

use crate::chunker::{self, ChunkSource, ChunkSpec};
use crate::config::UploadConfig;
use crate::error::{Result, UploadError};
use crate::merge;
use crate::progress::{UploadEvent, UploadObserver};
use crate::transport::ChunkTransport;

// =============================================================================
// Upload jobs
// =============================================================================

/// Name and size of the payload, carried in every chunk envelope and
/// named again at merge time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub size: u64,
}

/// Where an upload currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// Staged, nothing sent yet.
    Idle,
    /// Chunks are being transmitted.
    Chunking,
    /// Every chunk has been acknowledged.
    AllChunksAcked,
    /// The merge request has been issued.
    MergeRequested,
    /// The server confirmed the final file.
    Merged,
    /// The upload or its merge failed.
    Failed,
}

/// One file staged for upload.
pub struct UploadJob {
    record: FileRecord,
    source: ChunkSource,
    plan: Vec<ChunkSpec>,
    phase: Mutex<UploadPhase>,
}

impl UploadJob {
    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    pub fn total_chunks(&self) -> u32 {
        self.plan.len() as u32
    }

    pub fn phase(&self) -> UploadPhase {
        *self.phase.lock().unwrap()
    }

    fn set_phase(&self, phase: UploadPhase) {
        *self.phase.lock().unwrap() = phase;
    }
}

/// Summary of a finished upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub file_name: String,
    pub bytes_sent: u64,
    pub chunks_sent: u32,
    pub elapsed: Duration,
}

// =============================================================================
// Upload session
// =============================================================================

pub struct UploadSession {
    guid: Uuid,
    client: reqwest::Client,
    config: UploadConfig,
}

impl UploadSession {
    /// Create a session with a fresh guid.
    pub fn new(config: UploadConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder().build()?;

        let session = Self {
            guid: Uuid::new_v4(),
            client,
            config,
        };
        tracing::debug!(guid = %session.guid, config = ?session.config, "Upload session created");
        Ok(session)
    }

    /// The session guid. Stable for the lifetime of the session.
    pub fn token(&self) -> Uuid {
        self.guid
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Stage a file: read its metadata, apply the configured transform,
    /// and lay out the chunk plan. Nothing touches the network until
    /// [`upload`](Self::upload).
    pub async fn add_file(&self, path: impl AsRef<Path>) -> Result<UploadJob> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                UploadError::Config(format!("path has no usable file name: {}", path.display()))
            })?;

        let (source, size) = match &self.config.transform {
            Some(transform) => {
                // Transforms need the whole payload in memory; the chunk
                // plan is laid over the transformed bytes.
                let raw = tokio::fs::read(path).await.map_err(|e| UploadError::File {
                    path: path.display().to_string(),
                    source: e,
                })?;
                tracing::debug!(file = %name, transform = transform.name(), "Applying payload transform");
                let transformed = transform.apply(raw)?;
                let size = transformed.len() as u64;
                (ChunkSource::Buffer(Arc::new(transformed)), size)
            }
            None => {
                let metadata =
                    tokio::fs::metadata(path)
                        .await
                        .map_err(|e| UploadError::File {
                            path: path.display().to_string(),
                            source: e,
                        })?;
                if !metadata.is_file() {
                    return Err(UploadError::Config(format!(
                        "not a regular file: {}",
                        path.display()
                    )));
                }
                (ChunkSource::File(path.to_path_buf()), metadata.len())
            }
        };

        let plan = if self.config.chunked {
            chunker::plan_chunks(size, self.config.chunk_size)
        } else {
            vec![ChunkSpec {
                index: 0,
                offset: 0,
                len: size as usize,
            }]
        };

        tracing::debug!(
            file = %name,
            bytes = size,
            chunks = plan.len(),
            "File staged"
        );

        Ok(UploadJob {
            record: FileRecord { name, size },
            source,
            plan,
            phase: Mutex::new(UploadPhase::Idle),
        })
    }

    /// Transmit a staged job: every chunk, then the merge request. This
    /// is the manual trigger; nothing before this call transmits.
    ///
    /// Event order per file: `Started`, zero or more
    /// `Progress`/`ChunkAccepted`/`ChunkRetried`, then exactly one
    /// `Uploaded` once all chunks are acked, then the merge events.
    pub async fn upload(
        &self,
        job: &UploadJob,
        observer: &dyn UploadObserver,
    ) -> Result<UploadReport> {
        let started = Instant::now();
        let record = &job.record;
        let guid = self.guid.to_string();
        let transport = ChunkTransport::new(&self.client, &self.config, guid.clone());

        observer.on_event(UploadEvent::Started {
            file_name: record.name.clone(),
            total_bytes: record.size,
            total_chunks: job.total_chunks(),
        });
        job.set_phase(UploadPhase::Chunking);

        let sent = if self.config.chunked {
            transport
                .send_chunks(record, &job.source, &job.plan, observer)
                .await
        } else {
            transport.send_whole(record, &job.source, observer).await
        };

        let bytes_sent = match sent {
            Ok(bytes) => bytes,
            Err(err) => {
                job.set_phase(UploadPhase::Failed);
                observer.on_event(UploadEvent::Failed {
                    file_name: record.name.clone(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        job.set_phase(UploadPhase::AllChunksAcked);
        observer.on_event(UploadEvent::Uploaded {
            file_name: record.name.clone(),
        });

        if self.config.chunked {
            job.set_phase(UploadPhase::MergeRequested);
            observer.on_event(UploadEvent::MergeRequested {
                file_name: record.name.clone(),
            });

            if let Err(err) =
                merge::request_merge(&self.client, &self.config, &guid, &record.name).await
            {
                job.set_phase(UploadPhase::Failed);
                observer.on_event(UploadEvent::MergeFailed {
                    file_name: record.name.clone(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        }

        job.set_phase(UploadPhase::Merged);
        observer.on_event(UploadEvent::Merged {
            file_name: record.name.clone(),
        });

        let report = UploadReport {
            file_name: record.name.clone(),
            bytes_sent,
            chunks_sent: job.total_chunks(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            file = %report.file_name,
            bytes = report.bytes_sent,
            chunks = report.chunks_sent,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Upload finished"
        );
        Ok(report)
    }

    /// Stage and upload in one call.
    pub async fn upload_path(
        &self,
        path: impl AsRef<Path>,
        observer: &dyn UploadObserver,
    ) -> Result<UploadReport> {
        let job = self.add_file(path).await?;
        self.upload(&job, observer).await
    }

    // =========================================================================
    // Read-side helpers against the same server
    // =========================================================================

    /// List files stored on the server.
    pub async fn list(&self) -> Result<Vec<RemoteFile>> {
        let url = self.config.endpoint("files");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::FetchRejected {
                status: status.as_u16(),
            });
        }

        let listing: FileListing = response.json().await?;
        Ok(listing.files)
    }

    /// Download a stored file into `dest`.
    pub async fn fetch(&self, name: &str, dest: &Path) -> Result<u64> {
        let url = self.config.endpoint(&format!("files/{}", urlencoding::encode(name)));
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::FetchRejected {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// A file visible in the server's listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct FileListing {
    files: Vec<RemoteFile>,
}
