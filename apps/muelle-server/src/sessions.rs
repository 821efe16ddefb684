//! Part Session Tracker
//!
//! In-memory bookkeeping for chunked uploads. There is no handshake in
//! this protocol: the server learns about a session from its first part.
//! The tracker records which indices have arrived so merge can verify
//! completeness, remembers merged sessions so a repeated merge stays
//! idempotent, and sweeps sessions that never finish.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::store::FileStore;

// ============================================================================
// Part Session
// ============================================================================

/// Lifecycle of one part session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartStatus {
    /// Parts are still arriving
    Receiving,
    /// Every declared index has been received
    Complete,
    /// The final file has been assembled
    Merged,
}

/// One chunked upload in flight
#[derive(Debug, Clone)]
pub struct PartSession {
    pub guid: Uuid,
    pub file_name: String,
    pub total_chunks: u32,
    pub received: BTreeSet<u32>,
    pub status: PartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartSession {
    fn new(guid: Uuid, file_name: &str, total_chunks: u32) -> Self {
        let now = Utc::now();
        Self {
            guid,
            file_name: file_name.to_string(),
            total_chunks,
            received: BTreeSet::new(),
            status: PartStatus::Receiving,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.received.len() as u32 == self.total_chunks
    }

    /// Fraction of declared chunks received, in [0, 1]
    pub fn progress(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        self.received.len() as f64 / self.total_chunks as f64
    }
}

// ============================================================================
// Part Tracker
// ============================================================================

/// Tracks part sessions by guid
#[derive(Clone)]
pub struct PartTracker {
    inner: Arc<RwLock<HashMap<Uuid, PartSession>>>,
}

impl PartTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record one received part, creating the session on first contact.
    ///
    /// The declared chunk total and file name must stay consistent across
    /// the parts of one session; a re-sent index is accepted silently.
    pub async fn record_part(
        &self,
        guid: Uuid,
        file_name: &str,
        index: u32,
        total: u32,
    ) -> Result<PartSession> {
        if total == 0 {
            return Err(AppError::BadRequest(
                "chunk total must be at least 1".to_string(),
            ));
        }
        if index >= total {
            return Err(AppError::BadRequest(format!(
                "chunk index {} out of bounds (total {})",
                index, total
            )));
        }

        let mut sessions = self.inner.write().await;
        let session = sessions
            .entry(guid)
            .or_insert_with(|| PartSession::new(guid, file_name, total));

        if session.status == PartStatus::Merged {
            return Err(AppError::BadRequest(format!(
                "session {} is already merged",
                guid
            )));
        }
        if session.total_chunks != total {
            return Err(AppError::BadRequest(format!(
                "chunk total changed mid-session: {} then {}",
                session.total_chunks, total
            )));
        }
        if session.file_name != file_name {
            return Err(AppError::BadRequest(format!(
                "file name changed mid-session: {:?} then {:?}",
                session.file_name, file_name
            )));
        }

        session.received.insert(index);
        session.updated_at = Utc::now();
        if session.is_complete() {
            session.status = PartStatus::Complete;
        }

        Ok(session.clone())
    }

    /// Get a session by guid
    pub async fn get(&self, guid: Uuid) -> Option<PartSession> {
        let sessions = self.inner.read().await;
        sessions.get(&guid).cloned()
    }

    /// Mark a session merged. The entry is kept so a repeated merge
    /// request can be answered idempotently.
    pub async fn mark_merged(&self, guid: Uuid) -> Result<()> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&guid)
            .ok_or_else(|| AppError::UnknownSession(guid.to_string()))?;

        session.status = PartStatus::Merged;
        session.updated_at = Utc::now();

        tracing::info!(
            guid = %guid,
            file_name = %session.file_name,
            "Part session merged"
        );

        Ok(())
    }

    /// Number of tracked sessions
    pub async fn session_count(&self) -> usize {
        let sessions = self.inner.read().await;
        sessions.len()
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Remove sessions idle longer than `ttl` and return them, so the
    /// caller can discard their part directories.
    pub async fn sweep_stale(&self, ttl: Duration) -> Vec<PartSession> {
        let cutoff = Utc::now() - ttl;
        let mut sessions = self.inner.write().await;

        let stale: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, s)| s.updated_at < cutoff)
            .map(|(id, _)| *id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }

    /// Start the background sweep task. Stale sessions are dropped from
    /// the tracker and their part directories removed from the store.
    pub fn start_sweeper(
        self,
        store: FileStore,
        ttl: Duration,
        every: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;
                let removed = self.sweep_stale(ttl).await;
                for session in &removed {
                    if session.status != PartStatus::Merged {
                        if let Err(e) = store.discard_session(session.guid).await {
                            tracing::warn!(
                                guid = %session.guid,
                                "Failed to discard stale parts: {}",
                                e
                            );
                        }
                    }
                }
                if !removed.is_empty() {
                    tracing::info!(count = removed.len(), "Swept stale part sessions");
                }
            }
        })
    }
}

impl Default for PartTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
