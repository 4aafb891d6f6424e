use chrono::{DateTime, Utc};

use crate::logging::SensitiveCredential;
use crate::provider::{ProviderConfig, ProviderStatus};
use crate::registry::{ProviderPatch, ProviderRegistry, UpdateStatus};

/// Outcome-driven and operator-driven mutations of provider counters.
///
/// Owns the status state machine: every counter/status change to a
/// provider goes through here so transitions are logged and exported as
/// metrics in one place.
pub struct UsageTracker<'a> {
    providers: &'a mut ProviderRegistry,
}

impl<'a> UsageTracker<'a> {
    pub fn new(providers: &'a mut ProviderRegistry) -> Self {
        Self { providers }
    }

    /// Record the outcome of one completed invocation attempt
    pub fn record_outcome(&mut self, id: &str, success: bool, now: DateTime<Utc>) -> UpdateStatus {
        self.mutate(id, |provider| {
            let previous = if success {
                provider.apply_success(now)
            } else {
                provider.apply_failure(now)
            };

            if success {
                tracing::debug!(
                    provider = %provider.id,
                    used = provider.used_count,
                    quota_limit = provider.quota_limit,
                    "Success recorded"
                );
            } else {
                tracing::debug!(
                    provider = %provider.id,
                    error_count = provider.error_count,
                    max_errors = provider.max_errors,
                    "⚠️ Failure recorded ({}/{})",
                    provider.error_count,
                    provider.max_errors
                );
            }

            previous
        })
    }

    pub fn enable(&mut self, id: &str) -> UpdateStatus {
        self.mutate(id, ProviderConfig::apply_enable)
    }

    pub fn disable(&mut self, id: &str) -> UpdateStatus {
        self.mutate(id, ProviderConfig::apply_disable)
    }

    pub fn reset_quota(&mut self, id: &str, now: DateTime<Utc>) -> UpdateStatus {
        self.mutate(id, |provider| {
            let previous = provider.apply_quota_reset(now);
            tracing::info!(
                provider = %provider.id,
                next_reset = %provider.quota_reset_at.to_rfc3339(),
                "Quota reset"
            );
            previous
        })
    }

    /// Operator edit of thresholds or ordering; status is reconciled
    pub fn update(&mut self, id: &str, patch: ProviderPatch) -> UpdateStatus {
        self.mutate(id, |provider| {
            tracing::info!(provider = %provider.id, patch = ?patch, "Provider updated");
            patch.apply_to(provider)
        })
    }

    pub fn set_credential(&mut self, id: &str, credential: String) -> UpdateStatus {
        self.mutate(id, |provider| {
            tracing::info!(
                provider = %provider.id,
                credential = %SensitiveCredential::new(&credential),
                "Credential updated"
            );
            provider.apply_credential(credential)
        })
    }

    /// Lazy period rollover: reset every provider whose `quota_reset_at`
    /// has passed. Returns the ids that were reset.
    pub fn apply_due_resets(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let due: Vec<String> = self
            .providers
            .iter()
            .filter(|p| p.is_quota_reset_due(now))
            .map(|p| p.id.clone())
            .collect();

        for id in &due {
            self.reset_quota(id, now);
        }

        due
    }

    fn mutate<F>(&mut self, id: &str, apply: F) -> UpdateStatus
    where
        F: FnOnce(&mut ProviderConfig) -> ProviderStatus,
    {
        let Some(provider) = self.providers.get_mut(id) else {
            tracing::debug!(provider = id, "Ignoring mutation for unknown provider");
            return UpdateStatus::NotFound;
        };

        let previous = apply(provider);
        log_transition(provider, previous);
        crate::metrics::record_provider_status(&provider.id, provider.status);

        UpdateStatus::Updated
    }
}

fn log_transition(provider: &ProviderConfig, previous: ProviderStatus) {
    if previous == provider.status {
        return;
    }

    match provider.status {
        ProviderStatus::Error => tracing::warn!(
            provider = %provider.id,
            error_count = provider.error_count,
            "🔴 Provider circuit-broken after {} consecutive failures",
            provider.error_count
        ),
        ProviderStatus::QuotaExceeded => tracing::warn!(
            provider = %provider.id,
            used = provider.used_count,
            quota_limit = provider.quota_limit,
            "Provider quota exhausted until {}",
            provider.quota_reset_at.to_rfc3339()
        ),
        ProviderStatus::Active => tracing::info!(
            provider = %provider.id,
            from = %previous,
            "✅ Provider active"
        ),
        ProviderStatus::Disabled => tracing::info!(
            provider = %provider.id,
            from = %previous,
            "Provider disabled"
        ),
    }
}
