//! Chunk planning and reading
//!
//! A payload is split into fixed-size chunks ahead of transmission; each
//! chunk is a contiguous byte range read on demand, so a large file is
//! never held in memory whole.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Result, UploadError};

/// One contiguous byte range of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Zero-based chunk index.
    pub index: u32,
    /// Byte offset into the payload.
    pub offset: u64,
    /// Bytes in this chunk.
    pub len: usize,
}

/// Split `total_size` bytes into chunks of at most `chunk_size`.
///
/// The final chunk carries the remainder. An empty payload still yields
/// one empty chunk, so the server has something to materialize the file
/// from.
pub fn plan_chunks(total_size: u64, chunk_size: usize) -> Vec<ChunkSpec> {
    debug_assert!(chunk_size > 0);

    if total_size == 0 {
        return vec![ChunkSpec {
            index: 0,
            offset: 0,
            len: 0,
        }];
    }

    let chunk_size = chunk_size as u64;
    let count = (total_size + chunk_size - 1) / chunk_size;

    (0..count)
        .map(|i| {
            let offset = i * chunk_size;
            ChunkSpec {
                index: i as u32,
                offset,
                len: (total_size - offset).min(chunk_size) as usize,
            }
        })
        .collect()
}

/// Where chunk bytes come from: straight off disk, or from an in-memory
/// payload produced by a transform.
#[derive(Debug, Clone)]
pub enum ChunkSource {
    File(PathBuf),
    Buffer(Arc<Vec<u8>>),
}

impl ChunkSource {
    /// Read the bytes of one chunk.
    ///
    /// File sources open their own handle per read, so concurrent chunk
    /// reads never share seek state.
    pub async fn read(&self, spec: ChunkSpec) -> Result<Vec<u8>> {
        match self {
            ChunkSource::File(path) => {
                let mut file =
                    tokio::fs::File::open(path)
                        .await
                        .map_err(|e| UploadError::File {
                            path: path.display().to_string(),
                            source: e,
                        })?;
                file.seek(SeekFrom::Start(spec.offset)).await?;
                let mut buf = vec![0u8; spec.len];
                file.read_exact(&mut buf).await?;
                Ok(buf)
            }
            ChunkSource::Buffer(data) => {
                let start = spec.offset as usize;
                let end = start + spec.len;
                let slice = data.get(start..end).ok_or_else(|| {
                    UploadError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("chunk {} extends past the payload", spec.index),
                    ))
                })?;
                Ok(slice.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_payload_yields_one_chunk() {
        let plan = plan_chunks(0, 1024);
        assert_eq!(
            plan,
            vec![ChunkSpec {
                index: 0,
                offset: 0,
                len: 0
            }]
        );
    }

    #[test]
    fn test_exact_multiple() {
        let plan = plan_chunks(2048, 1024);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].len, 1024);
        assert_eq!(plan[1].len, 1024);
        assert_eq!(plan[1].offset, 1024);
    }

    #[test]
    fn test_remainder_chunk() {
        let plan = plan_chunks(1025, 1024);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].len, 1);
        assert_eq!(plan[1].offset, 1024);
    }

    #[test]
    fn test_plan_is_contiguous() {
        let plan = plan_chunks(3 * 1024 + 17, 1024);
        assert_eq!(plan.len(), 4);

        let mut expected_offset = 0u64;
        for (i, spec) in plan.iter().enumerate() {
            assert_eq!(spec.index as usize, i);
            assert_eq!(spec.offset, expected_offset);
            expected_offset += spec.len as u64;
        }
        assert_eq!(expected_offset, 3 * 1024 + 17);
    }

    #[tokio::test]
    async fn test_read_from_buffer() {
        let source = ChunkSource::Buffer(Arc::new(b"abcdefgh".to_vec()));
        let plan = plan_chunks(8, 3);

        assert_eq!(source.read(plan[0]).await.unwrap(), b"abc");
        assert_eq!(source.read(plan[1]).await.unwrap(), b"def");
        assert_eq!(source.read(plan[2]).await.unwrap(), b"gh");
    }

    #[tokio::test]
    async fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let source = ChunkSource::File(file.path().to_path_buf());
        let plan = plan_chunks(10, 4);

        assert_eq!(source.read(plan[0]).await.unwrap(), b"0123");
        assert_eq!(source.read(plan[2]).await.unwrap(), b"89");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let source = ChunkSource::File(PathBuf::from("/definitely/not/here.bin"));
        let result = source
            .read(ChunkSpec {
                index: 0,
                offset: 0,
                len: 4,
            })
            .await;
        assert!(matches!(result, Err(UploadError::File { .. })));
    }
}
