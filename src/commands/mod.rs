//! Command implementations for the CLI
//!
//! - status: provider table and routing flags
//! - provider: per-provider mutators (enable, credential, quota, ...)
//! - state: routing flags, export/import, reset to defaults
//! - test: configuration validity

pub mod provider;
pub mod state;
pub mod status;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use provider_orchestrator::config::Settings;
use provider_orchestrator::persistence::JsonFilePersistence;
use provider_orchestrator::recognition::EmptyFallback;
use provider_orchestrator::Orchestrator;

use crate::lock::StateLock;

/// Orchestrator bound to a locked state file for the duration of one command
pub struct Session {
    pub orchestrator: Orchestrator,
    _lock: StateLock,
}

impl Session {
    pub async fn open(settings: &Settings, state_path: &Path) -> Result<Self> {
        let lock = StateLock::acquire(state_path)?;
        let persistence = Arc::new(JsonFilePersistence::new(state_path));
        let orchestrator =
            Orchestrator::bootstrap(settings, persistence, Arc::new(EmptyFallback)).await;

        Ok(Self {
            orchestrator,
            _lock: lock,
        })
    }

    /// Flush pending saves, then release the lock
    pub async fn close(self) {
        self.orchestrator.flush().await;
    }
}
