//! Chunk transport
//!
//! Sends the chunks of one payload to the part endpoint: a multipart
//! envelope per chunk, bounded concurrency, optional per-chunk retry with
//! backoff, and progress accounting over acknowledged bytes.
//!
//! The first unrecoverable chunk failure aborts the run; chunks still in
//! flight are dropped, and the caller never sees a success notification
//! for a partially-acknowledged payload.

use std::sync::Mutex;

use futures::stream::{self, TryStreamExt};
use reqwest::multipart::{Form, Part};
use sha2::{Digest, Sha256};

use crate::chunker::{ChunkSource, ChunkSpec};
use crate::config::UploadConfig;
use crate::error::{Result, UploadError};
use crate::progress::{UploadEvent, UploadObserver};
use crate::retry;
use crate::session::FileRecord;

pub struct ChunkTransport<'a> {
    client: &'a reqwest::Client,
    config: &'a UploadConfig,
    guid: String,
}

struct Acked {
    bytes: u64,
    chunks: u32,
}

impl<'a> ChunkTransport<'a> {
    pub fn new(client: &'a reqwest::Client, config: &'a UploadConfig, guid: String) -> Self {
        Self {
            client,
            config,
            guid,
        }
    }

    /// Upload every chunk in `plan`, emitting progress as chunks are
    /// acknowledged. Returns the payload size once all chunks are acked;
    /// the caller owns the exactly-once uploaded notification.
    pub async fn send_chunks(
        &self,
        record: &FileRecord,
        source: &ChunkSource,
        plan: &[ChunkSpec],
        observer: &dyn UploadObserver,
    ) -> Result<u64> {
        let total_bytes: u64 = plan.iter().map(|c| c.len as u64).sum();
        let total_chunks = plan.len() as u32;

        // Progress updates are computed and emitted under one lock, so
        // the observed fraction never runs backwards even with several
        // chunks in flight.
        let acked = Mutex::new(Acked { bytes: 0, chunks: 0 });
        let acked = &acked;

        observer.on_event(UploadEvent::Progress {
            fraction: 0.0,
            bytes_acked: 0,
            total_bytes,
        });

        stream::iter(plan.iter().copied().map(Ok::<_, UploadError>))
            .try_for_each_concurrent(self.config.max_in_flight, |spec| async move {
                let attempt = self
                    .send_chunk_with_retry(record, source, spec, total_chunks, observer)
                    .await?;

                let mut acked = acked.lock().unwrap();
                acked.bytes += spec.len as u64;
                acked.chunks += 1;

                // An all-empty payload still reaches 1.0 through the
                // chunk count.
                let fraction = if total_bytes == 0 {
                    acked.chunks as f64 / total_chunks as f64
                } else {
                    acked.bytes as f64 / total_bytes as f64
                };

                observer.on_event(UploadEvent::ChunkAccepted {
                    index: spec.index,
                    attempt,
                });
                observer.on_event(UploadEvent::Progress {
                    fraction,
                    bytes_acked: acked.bytes,
                    total_bytes,
                });

                Ok(())
            })
            .await?;

        Ok(total_bytes)
    }

    /// Send one chunk, retrying per the configured policy. Returns the
    /// attempt number that succeeded (1-based).
    async fn send_chunk_with_retry(
        &self,
        record: &FileRecord,
        source: &ChunkSource,
        spec: ChunkSpec,
        total_chunks: u32,
        observer: &dyn UploadObserver,
    ) -> Result<u32> {
        let policy = &self.config.retry;
        let mut attempt = 1u32;

        loop {
            match self.send_chunk(record, source, spec, total_chunks).await {
                Ok(()) => return Ok(attempt),
                Err(err) => {
                    let retries_used = attempt - 1;
                    let retryable = retry::is_retryable(&err);

                    if !retryable {
                        return Err(err);
                    }
                    if retries_used >= policy.max_retries {
                        if policy.is_enabled() {
                            return Err(UploadError::RetriesExhausted {
                                index: spec.index,
                                attempts: attempt,
                                source: Box::new(err),
                            });
                        }
                        return Err(err);
                    }

                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        chunk = spec.index,
                        attempt = attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Chunk failed, retrying"
                    );
                    observer.on_event(UploadEvent::ChunkRetried {
                        index: spec.index,
                        attempt,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One POST of one chunk. The multipart envelope carries the session
    /// guid, the chunk's position, the file record, and a SHA-256
    /// checksum of the chunk body.
    async fn send_chunk(
        &self,
        record: &FileRecord,
        source: &ChunkSource,
        spec: ChunkSpec,
        total_chunks: u32,
    ) -> Result<()> {
        let data = source.read(spec).await?;
        let checksum = hex::encode(Sha256::digest(&data));

        let part = Part::bytes(data)
            .file_name(record.name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text("guid", self.guid.clone())
            .text("chunk", spec.index.to_string())
            .text("chunks", total_chunks.to_string())
            .text("fileName", record.name.clone())
            .text("fileSize", record.size.to_string())
            .text("checksum", checksum)
            .part("file", part);

        let url = self.config.endpoint("files/part");
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(UploadError::ChunkRejected {
                index: spec.index,
                status: status.as_u16(),
            });
        }

        tracing::trace!(chunk = spec.index, bytes = spec.len, "Chunk acknowledged");
        Ok(())
    }

    /// Whole-file mode: one multipart POST to the whole-file endpoint.
    /// The payload is read into memory, so this path is meant for files
    /// small enough that chunking was turned off on purpose.
    pub async fn send_whole(
        &self,
        record: &FileRecord,
        source: &ChunkSource,
        observer: &dyn UploadObserver,
    ) -> Result<u64> {
        observer.on_event(UploadEvent::Progress {
            fraction: 0.0,
            bytes_acked: 0,
            total_bytes: record.size,
        });

        let data = source
            .read(ChunkSpec {
                index: 0,
                offset: 0,
                len: record.size as usize,
            })
            .await?;

        let part = Part::bytes(data)
            .file_name(record.name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text("guid", self.guid.clone())
            .part("file", part);

        let url = self.config.endpoint("files/upload");
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(UploadError::UploadRejected {
                status: status.as_u16(),
            });
        }

        observer.on_event(UploadEvent::Progress {
            fraction: 1.0,
            bytes_acked: record.size,
            total_bytes: record.size,
        });

        Ok(record.size)
    }
}
