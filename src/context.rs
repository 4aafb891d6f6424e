use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ProviderSeed, RoutingConfig, Settings};
use crate::facade::ConfigFacade;
use crate::orchestrator::CallOrchestrator;
use crate::persistence::{PersistenceGateway, StateWriter};
use crate::recognition::LocalFallback;
use crate::state::OrchestratorState;
use crate::tracker::UsageTracker;

/// State and collaborators shared by [`CallOrchestrator`] and [`ConfigFacade`]
pub(crate) struct Shared {
    state: RwLock<OrchestratorState>,
    writer: StateWriter,
    pub(crate) local_fallback: Arc<dyn LocalFallback>,
    seeds: Vec<ProviderSeed>,
    routing_defaults: RoutingConfig,
}

impl Shared {
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, OrchestratorState> {
        self.state.write().await
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, OrchestratorState> {
        self.state.read().await
    }

    /// Read access after rolling over any quota period that has ended
    pub(crate) async fn read_current(&self) -> RwLockReadGuard<'_, OrchestratorState> {
        let mut state = self.state.write().await;
        let reset = UsageTracker::new(&mut state.providers).apply_due_resets(Utc::now());
        if !reset.is_empty() {
            self.persist(&state);
        }
        state.downgrade()
    }

    /// Queue a snapshot of `state` for saving.
    ///
    /// Callers hold the write guard while calling this, which is what keeps
    /// snapshots in mutation order.
    pub(crate) fn persist(&self, state: &OrchestratorState) {
        self.writer.save(state.clone());
    }

    pub(crate) fn seeded_state(&self) -> OrchestratorState {
        OrchestratorState::seeded(&self.seeds, &self.routing_defaults, Utc::now())
    }
}

/// Explicitly owned orchestrator context.
///
/// Cloning is cheap; every clone, [`CallOrchestrator`] and [`ConfigFacade`]
/// handed out by it share the same state.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Load persisted state (or seed it from `settings`) and start the
    /// background writer. Must be called inside a tokio runtime.
    ///
    /// A load failure is not fatal: the orchestrator starts from seeded
    /// defaults and the broken document is left alone until the next
    /// mutation overwrites it.
    pub async fn bootstrap(
        settings: &Settings,
        gateway: Arc<dyn PersistenceGateway>,
        local_fallback: Arc<dyn LocalFallback>,
    ) -> Self {
        let (loaded, persist_seeded) = match gateway.load().await {
            Ok(Some(state)) => {
                tracing::info!(providers = state.providers.len(), "Loaded orchestrator state");
                (Some(state), false)
            }
            Ok(None) => {
                tracing::info!("No saved orchestrator state, seeding defaults");
                (None, true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load orchestrator state, seeding defaults");
                (None, false)
            }
        };

        let writer = StateWriter::spawn(gateway);
        let state = loaded.unwrap_or_else(|| {
            OrchestratorState::seeded(&settings.providers, &settings.routing, Utc::now())
        });
        if persist_seeded {
            writer.save(state.clone());
        }

        crate::metrics::init_metric_descriptions();
        for provider in state.providers.iter() {
            crate::metrics::record_provider_status(&provider.id, provider.status);
        }

        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                writer,
                local_fallback,
                seeds: settings.providers.clone(),
                routing_defaults: settings.routing.clone(),
            }),
        }
    }

    /// Request execution entry point
    pub fn calls(&self) -> CallOrchestrator {
        CallOrchestrator::new(self.shared.clone())
    }

    /// Operator/configuration entry point
    pub fn config(&self) -> ConfigFacade {
        ConfigFacade::new(self.shared.clone())
    }

    /// Wait until every state change made so far has been handed to storage
    pub async fn flush(&self) {
        self.shared.writer.flush().await;
    }
}
