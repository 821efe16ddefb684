//! File Store
//!
//! Filesystem layout for uploads. Merged files live at the storage root;
//! each in-flight chunked session keeps its parts in a directory named
//! after the session guid until merge:
//!
//! ```text
//! {root}/report.pdf                  merged file
//! {root}/{guid}/{guid}_0.part        chunk 0 of session {guid}
//! {root}/{guid}/{guid}_1.part        chunk 1
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

// ============================================================================
// File Store
// ============================================================================

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

/// A merged file visible to the listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
}

impl FileStore {
    /// Open the store, creating the root directory if it does not exist.
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, guid: Uuid) -> PathBuf {
        self.root.join(guid.to_string())
    }

    fn part_path(&self, guid: Uuid, index: u32) -> PathBuf {
        self.session_dir(guid)
            .join(format!("{}_{}.part", guid, index))
    }

    /// Store one chunk of a session.
    ///
    /// Re-sending an index overwrites the previous part, which keeps
    /// chunk retries idempotent.
    pub async fn store_part(
        &self,
        guid: Uuid,
        index: u32,
        data: &[u8],
        checksum: Option<&str>,
    ) -> Result<()> {
        if let Some(expected) = checksum {
            let actual = compute_hash(data);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(AppError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let dir = self.session_dir(guid);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.part_path(guid, index), data).await?;

        Ok(())
    }

    /// Store a whole file in one shot, bypassing the part machinery.
    pub async fn store_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let name = sanitize_name(name)?;
        tokio::fs::write(self.root.join(name), data).await?;
        Ok(())
    }

    /// Concatenate the parts of a session into the final file, in index
    /// order, then drop the part directory.
    ///
    /// Assembly happens in a scratch file that is renamed into place, so
    /// the final name never names a half-written file. Returns the number
    /// of bytes in the merged file.
    pub async fn merge(&self, guid: Uuid, file_name: &str, total: u32) -> Result<u64> {
        let name = sanitize_name(file_name)?;
        let session_dir = self.session_dir(guid);
        let dest = self.root.join(name);
        // Scratch names are unique per call, so two racing merges of one
        // session cannot interleave writes into the same file.
        let scratch = self
            .root
            .join(format!(".{}.{}.merge", guid, Uuid::new_v4().simple()));

        let written = match self.assemble(guid, total, &scratch).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&scratch).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&scratch, &dest).await?;

        if let Err(e) = tokio::fs::remove_dir_all(&session_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(guid = %guid, "Failed to remove part directory: {}", e);
            }
        }

        Ok(written)
    }

    async fn assemble(&self, guid: Uuid, total: u32, scratch: &Path) -> Result<u64> {
        let mut out = tokio::fs::File::create(scratch).await?;
        let mut written = 0u64;

        for index in 0..total {
            let part = self.part_path(guid, index);
            let data = match tokio::fs::read(&part).await {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(AppError::IncompleteUpload {
                        received: index as usize,
                        expected: total as usize,
                    });
                }
                Err(e) => return Err(e.into()),
            };
            out.write_all(&data).await?;
            written += data.len() as u64;
        }

        out.sync_all().await?;
        Ok(written)
    }

    /// Whether a merged file with this name exists at the root.
    pub async fn file_exists(&self, name: &str) -> Result<bool> {
        let name = sanitize_name(name)?;
        Ok(tokio::fs::try_exists(self.root.join(name)).await?)
    }

    /// List merged files at the store root. Part directories and scratch
    /// files are not included.
    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            files.push(StoredFile {
                name,
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Read a merged file for download.
    pub async fn load(&self, name: &str) -> Result<Vec<u8>> {
        let name = sanitize_name(name)?;
        match tokio::fs::read(self.root.join(name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a session's part directory without merging.
    pub async fn discard_session(&self, guid: Uuid) -> Result<()> {
        match tokio::fs::remove_dir_all(self.session_dir(guid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Reject names that could escape the storage root: no parent-directory
/// sequences, no path separators, non-empty.
pub fn sanitize_name(name: &str) -> Result<&str> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(AppError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Compute SHA-256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ============================================================================
// Tests
// ============================================================================
