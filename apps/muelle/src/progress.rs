//! Upload events and progress rendering
//!
//! Consumers observe an upload through a callback interface, invoked
//! synchronously as the transport makes progress. The CLI ships a
//! progress-bar observer; library users bring their own or use
//! [`NoOpObserver`].

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

/// Events emitted while a file is uploaded.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Transmission of a file is starting.
    Started {
        file_name: String,
        total_bytes: u64,
        total_chunks: u32,
    },
    /// Fraction of the payload acknowledged so far, in [0, 1]. Within one
    /// upload the fraction never decreases.
    Progress {
        fraction: f64,
        bytes_acked: u64,
        total_bytes: u64,
    },
    /// A chunk was acknowledged by the server.
    ChunkAccepted { index: u32, attempt: u32 },
    /// A chunk attempt failed and will be retried after the given delay.
    ChunkRetried {
        index: u32,
        attempt: u32,
        delay: std::time::Duration,
    },
    /// Every chunk of the file has been acknowledged. Emitted exactly
    /// once per file.
    Uploaded { file_name: String },
    /// The merge request is on its way to the server.
    MergeRequested { file_name: String },
    /// The server confirmed the merge; the upload is complete.
    Merged { file_name: String },
    /// The server answered the merge with a non-success code, or the
    /// merge request itself failed.
    MergeFailed { file_name: String, reason: String },
    /// The upload failed before all chunks were acknowledged.
    Failed { file_name: String, reason: String },
}

/// Callback for upload events.
///
/// The callback is invoked synchronously by the transport; heavy work
/// belongs on the consumer's side of the channel, not in here.
pub trait UploadObserver: Send + Sync {
    fn on_event(&self, event: UploadEvent);
}

/// An observer that ignores all events.
pub struct NoOpObserver;

impl UploadObserver for NoOpObserver {
    fn on_event(&self, _event: UploadEvent) {}
}

/// A function-based observer.
pub struct FnObserver<F>
where
    F: Fn(UploadEvent) + Send + Sync,
{
    f: F,
}

impl<F> FnObserver<F>
where
    F: Fn(UploadEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> UploadObserver for FnObserver<F>
where
    F: Fn(UploadEvent) + Send + Sync,
{
    fn on_event(&self, event: UploadEvent) {
        (self.f)(event)
    }
}

/// Helper to create an Arc-wrapped observer from a closure.
pub fn observer<F>(f: F) -> Arc<dyn UploadObserver>
where
    F: Fn(UploadEvent) + Send + Sync + 'static,
{
    Arc::new(FnObserver::new(f))
}

/// Render a progress fraction as a percent string: `0.5` becomes
/// `"50%"`.
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", fraction * 100.0)
}

// =============================================================================
// Indicatif-based observer
// =============================================================================

/// Observer that renders a terminal progress bar.
pub struct ProgressBarObserver {
    state: Mutex<BarState>,
}

struct BarState {
    bar: Option<ProgressBar>,
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BarState { bar: None }),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("=>-")
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadObserver for ProgressBarObserver {
    fn on_event(&self, event: UploadEvent) {
        let mut state = self.state.lock().unwrap();

        match event {
            UploadEvent::Started {
                file_name,
                total_bytes,
                ..
            } => {
                let bar = ProgressBar::new(total_bytes);
                bar.set_style(Self::style());
                bar.set_message(file_name);
                state.bar = Some(bar);
            }
            UploadEvent::Progress {
                fraction,
                bytes_acked,
                ..
            } => {
                if let Some(ref bar) = state.bar {
                    bar.set_position(bytes_acked);
                    bar.set_message(format_percent(fraction));
                }
            }
            UploadEvent::ChunkRetried {
                index,
                attempt,
                delay,
            } => {
                eprintln!(
                    "chunk {}: attempt {} failed, retrying in {:?}",
                    index, attempt, delay
                );
            }
            UploadEvent::Uploaded { .. } => {
                if let Some(ref bar) = state.bar {
                    bar.set_message("uploaded");
                }
            }
            UploadEvent::MergeRequested { .. } => {
                if let Some(ref bar) = state.bar {
                    bar.set_message("merging...");
                }
            }
            UploadEvent::Merged { file_name } => {
                if let Some(bar) = state.bar.take() {
                    bar.finish_with_message("merged");
                }
                eprintln!("{}: upload complete", file_name);
            }
            UploadEvent::MergeFailed { file_name, reason } => {
                if let Some(bar) = state.bar.take() {
                    bar.abandon_with_message("merge failed");
                }
                eprintln!("{}: merge failed: {}", file_name, reason);
            }
            UploadEvent::Failed { file_name, reason } => {
                if let Some(bar) = state.bar.take() {
                    bar.abandon_with_message("failed");
                }
                eprintln!("{}: upload failed: {}", file_name, reason);
            }
            UploadEvent::ChunkAccepted { .. } => {}
        }
    }
}
