use chrono::Utc;
use std::sync::Arc;

use crate::codec::{decode_state, encode_state, StateRecord};
use crate::context::Shared;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::provider::{ProviderConfig, ProviderStats};
use crate::registry::{ProviderPatch, UpdateStatus};
use crate::state::OrchestratorState;
use crate::tracker::UsageTracker;

/// Operator-facing configuration surface.
///
/// Every mutator applies in full or not at all, persists on success and
/// reports an unknown id as [`OrchestratorError::ProviderNotFound`].
#[derive(Clone)]
pub struct ConfigFacade {
    shared: Arc<Shared>,
}

impl ConfigFacade {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub async fn enable(&self, id: &str) -> OrchestratorResult<()> {
        self.mutate(id, |tracker| tracker.enable(id)).await
    }

    pub async fn disable(&self, id: &str) -> OrchestratorResult<()> {
        self.mutate(id, |tracker| tracker.disable(id)).await
    }

    /// Replace the credential; an empty one disables the provider
    pub async fn set_credential(&self, id: &str, credential: impl Into<String>) -> OrchestratorResult<()> {
        let credential = credential.into();
        self.mutate(id, |tracker| tracker.set_credential(id, credential))
            .await
    }

    /// Lower values are tried first
    pub async fn set_priority(&self, id: &str, priority: i64) -> OrchestratorResult<()> {
        self.mutate(id, |tracker| tracker.update(id, ProviderPatch::priority(priority)))
            .await
    }

    pub async fn set_quota_limit(&self, id: &str, quota_limit: u64) -> OrchestratorResult<()> {
        self.mutate(id, |tracker| {
            tracker.update(id, ProviderPatch::quota_limit(quota_limit))
        })
        .await
    }

    pub async fn set_max_errors(&self, id: &str, max_errors: u32) -> OrchestratorResult<()> {
        if max_errors < 1 {
            return Err(OrchestratorError::InvalidConfiguration(
                "max_errors must be >= 1".to_string(),
            ));
        }
        self.mutate(id, |tracker| tracker.update(id, ProviderPatch::max_errors(max_errors)))
            .await
    }

    /// Start a fresh quota period for `id` right now
    pub async fn reset_quota(&self, id: &str) -> OrchestratorResult<()> {
        let now = Utc::now();
        self.mutate(id, |tracker| tracker.reset_quota(id, now)).await
    }

    /// Update routing flags; `None` leaves a flag unchanged
    pub async fn set_routing(&self, auto_fallback: Option<bool>, fallback_to_local: Option<bool>) {
        let mut state = self.shared.write().await;
        if let Some(auto_fallback) = auto_fallback {
            state.auto_fallback = auto_fallback;
        }
        if let Some(fallback_to_local) = fallback_to_local {
            state.fallback_to_local = fallback_to_local;
        }

        tracing::info!(
            auto_fallback = state.auto_fallback,
            fallback_to_local = state.fallback_to_local,
            "Routing updated"
        );
        self.shared.persist(&state);
    }

    /// Replace the whole state with an exported JSON document.
    ///
    /// The document is decoded and validated before the lock is taken, so a
    /// rejected import leaves the live state untouched.
    pub async fn import_state(&self, document: &str) -> OrchestratorResult<()> {
        let imported = decode_state(document).map_err(|e| {
            tracing::warn!(error = %e, "Rejected state import");
            e
        })?;

        self.replace_state(imported, "Imported orchestrator state").await;
        Ok(())
    }

    /// Serializable snapshot of the current state
    pub async fn export_state(&self) -> StateRecord {
        StateRecord::from(&*self.shared.read_current().await)
    }

    /// Current state as pretty-printed JSON, suitable for [`Self::import_state`]
    pub async fn export_json(&self) -> OrchestratorResult<String> {
        let state = self.shared.read_current().await;
        Ok(encode_state(&state)?)
    }

    /// Discard all provider state and restore the configured seeds
    pub async fn reset_to_defaults(&self) {
        let seeded = self.shared.seeded_state();
        self.replace_state(seeded, "Orchestrator state reset to defaults")
            .await;
    }

    /// Copy of the current state with due quota periods rolled over
    pub async fn snapshot(&self) -> OrchestratorState {
        self.shared.read_current().await.clone()
    }

    /// Providers a request would try right now, in order
    pub async fn eligible(&self) -> Vec<ProviderConfig> {
        let state = self.shared.read_current().await;
        state.providers.eligible().into_iter().cloned().collect()
    }

    pub async fn stats(&self, id: &str) -> OrchestratorResult<ProviderStats> {
        let state = self.shared.read_current().await;
        state
            .providers
            .get(id)
            .map(ProviderConfig::stats)
            .ok_or_else(|| OrchestratorError::ProviderNotFound(id.to_string()))
    }

    pub async fn all_stats(&self) -> Vec<ProviderStats> {
        let state = self.shared.read_current().await;
        state.providers.iter().map(ProviderConfig::stats).collect()
    }

    async fn mutate<F>(&self, id: &str, apply: F) -> OrchestratorResult<()>
    where
        F: FnOnce(&mut UsageTracker<'_>) -> UpdateStatus,
    {
        let mut state = self.shared.write().await;
        let status = apply(&mut UsageTracker::new(&mut state.providers));

        match status {
            UpdateStatus::Updated => {
                self.shared.persist(&state);
                Ok(())
            }
            UpdateStatus::NotFound => Err(OrchestratorError::ProviderNotFound(id.to_string())),
        }
    }

    async fn replace_state(&self, new_state: OrchestratorState, message: &'static str) {
        let mut state = self.shared.write().await;
        *state = new_state;

        for provider in state.providers.iter() {
            crate::metrics::record_provider_status(&provider.id, provider.status);
        }
        tracing::info!(providers = state.providers.len(), "{}", message);

        self.shared.persist(&state);
    }
}
