//! Shared helpers for the HTTP-level integration tests.
#![allow(dead_code)]

use std::sync::Mutex;

use muelle::progress::{UploadEvent, UploadObserver};

/// Observer that records every event so tests can assert on ordering,
/// counts, and progress monotonicity after the fact.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<UploadEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UploadEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_uploaded(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UploadEvent::Uploaded { .. }))
            .count()
    }

    pub fn count_merged(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UploadEvent::Merged { .. }))
            .count()
    }

    pub fn count_merge_failed(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UploadEvent::MergeFailed { .. }))
            .count()
    }

    pub fn count_retried(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UploadEvent::ChunkRetried { .. }))
            .count()
    }

    /// Progress fractions in emission order.
    pub fn fractions(&self) -> Vec<f64> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { fraction, .. } => Some(*fraction),
                _ => None,
            })
            .collect()
    }

    /// Every fraction is in [0, 1] and never decreases.
    pub fn assert_progress_monotone(&self) {
        let fractions = self.fractions();
        let mut last = 0.0_f64;
        for f in &fractions {
            assert!(
                (0.0..=1.0).contains(f),
                "fraction {} out of range in {:?}",
                f,
                fractions
            );
            assert!(*f >= last, "fraction went backwards in {:?}", fractions);
            last = *f;
        }
    }

    pub fn assert_completed(&self) {
        self.assert_progress_monotone();
        let fractions = self.fractions();
        assert_eq!(
            fractions.last().copied(),
            Some(1.0),
            "final fraction should be 1.0, got {:?}",
            fractions
        );
    }
}

impl UploadObserver for RecordingObserver {
    fn on_event(&self, event: UploadEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Deterministic non-repeating test payload.
pub fn patterned_bytes(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}
