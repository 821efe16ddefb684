//! Chunked file-upload client
//!
//! Splits files into fixed-size chunks, posts each chunk as a multipart
//! request, then asks the server to merge the parts back into one file.
//! The moving pieces:
//!
//! - [`config::UploadConfig`] — chunking, retry, and concurrency knobs
//! - [`session::UploadSession`] — owns the guid; stages and transmits files
//! - [`chunker`] — chunk planning and payload reads
//! - [`transport`] — the HTTP leg, with bounded concurrency and retry
//! - [`merge`] — the merge request and its `{"code": 200}` envelope
//! - [`progress`] — upload events and observers
//!
//! ```no_run
//! use muelle::{UploadConfig, UploadSession};
//! use muelle::progress::NoOpObserver;
//!
//! # async fn demo() -> muelle::Result<()> {
//! let session = UploadSession::new(UploadConfig::default())?;
//! let job = session.add_file("report.pdf").await?;
//! let report = session.upload(&job, &NoOpObserver).await?;
//! println!("sent {} bytes in {} chunks", report.bytes_sent, report.chunks_sent);
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod cli;
pub mod config;
pub mod error;
pub mod merge;
pub mod progress;
pub mod retry;
pub mod session;
pub mod transform;
pub mod transport;

pub use config::UploadConfig;
pub use error::{Result, UploadError};
pub use session::{UploadJob, UploadPhase, UploadReport, UploadSession};
