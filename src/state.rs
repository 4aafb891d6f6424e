use chrono::{DateTime, Utc};

use crate::config::{ProviderSeed, RoutingConfig};
use crate::provider::ProviderConfig;
use crate::registry::ProviderRegistry;

/// Process-level orchestrator state, persisted as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorState {
    pub providers: ProviderRegistry,
    pub auto_fallback: bool,
    pub fallback_to_local: bool,
    /// Last provider that produced a result. Informational only.
    pub current_provider_id: Option<String>,
}

impl OrchestratorState {
    /// Fresh state from configured seeds.
    ///
    /// Seeds are validated for unique ids when settings are loaded, so a
    /// duplicate here is skipped with a warning rather than failing startup.
    pub fn seeded(seeds: &[ProviderSeed], routing: &RoutingConfig, now: DateTime<Utc>) -> Self {
        let mut providers = ProviderRegistry::new();
        for seed in seeds {
            if let Err(e) = providers.insert(ProviderConfig::from_seed(seed, now)) {
                tracing::warn!(provider = %seed.id, error = %e, "Skipping provider seed");
            }
        }

        Self {
            providers,
            auto_fallback: routing.auto_fallback,
            fallback_to_local: routing.fallback_to_local,
            current_provider_id: None,
        }
    }
}
