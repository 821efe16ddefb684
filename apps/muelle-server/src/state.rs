//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::sessions::PartTracker;
use crate::store::FileStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: FileStore,
    tracker: PartTracker,
}

impl AppState {
    /// Create a new application state, opening the upload directory.
    pub fn new(config: Config) -> std::io::Result<Self> {
        let store = FileStore::open(&config.storage.upload_dir)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tracker: PartTracker::new(),
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the file store
    pub fn store(&self) -> &FileStore {
        &self.inner.store
    }

    /// Get the part session tracker
    pub fn tracker(&self) -> &PartTracker {
        &self.inner.tracker
    }
}
